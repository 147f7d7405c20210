//! The install pipeline.
//!
//! preflight → release lookup → (manifest ∥ archive) → verify → extract and place.
//! Every temp file the run creates lives beside the final binary and is
//! owned by a guard, so returning early (error, timeout, cancellation) cleans
//! up without any explicit rollback.

use std::path::{Path, PathBuf};

use reqwest::Client;
use shipbin_core::http::build_client;
use shipbin_core::manifest::fetch_manifest;
use shipbin_core::{
    ArchiveFetcher, ArchiveInstaller, ChecksumManifest, ChecksumPolicy, InstallTarget,
    IntegrityVerifier, ReleaseLocator, ResolvedRelease, Verification,
};
use shipbin_schema::{AssetNaming, ReleaseCoordinate, TargetDescriptor};
use tracing::{debug, info, warn};

use super::error::InstallError;
use crate::config::{Environment, InstallConfig};

/// Rejections that must happen before anything touches the network or the
/// package descriptor.
pub fn preflight(env: &Environment) -> Result<TargetDescriptor, InstallError> {
    if env.global_install {
        return Err(InstallError::GlobalInstallRejected);
    }
    Ok(TargetDescriptor::resolve(&env.raw_os, &env.raw_arch)?)
}

/// Everything resolved before the first byte is downloaded.
#[derive(Debug, Clone)]
pub struct InstallPlan {
    pub release: ResolvedRelease,
    pub naming: AssetNaming,
    pub target: InstallTarget,
    pub checksum_policy: ChecksumPolicy,
}

impl InstallPlan {
    /// Asset name looked up in the checksum manifest.
    pub fn asset_name(&self) -> String {
        self.naming.archive_name()
    }
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct InstallOutcome {
    pub name: String,
    pub version: semver::Version,
    pub path: PathBuf,
    pub verification: Verification,
}

/// Resolve the release and target paths without downloading anything.
pub async fn plan(config: &InstallConfig) -> Result<InstallPlan, InstallError> {
    let client = build_client(&config.http())?;
    resolve(&client, config).await
}

/// Full install, bounded by `config.timeout`.
pub async fn run(config: &InstallConfig) -> Result<InstallOutcome, InstallError> {
    tokio::time::timeout(config.timeout, install(config))
        .await
        .map_err(|_| InstallError::TimedOut(config.timeout))?
}

async fn resolve(client: &Client, config: &InstallConfig) -> Result<InstallPlan, InstallError> {
    let platform = preflight(&config.env)?;
    let coordinate = ReleaseCoordinate::parse(&config.repository, &config.version)?;
    let naming = AssetNaming::new(&config.binary_name, platform);

    let release = ReleaseLocator::new(client, &config.hosts)
        .locate(&coordinate, &naming)
        .await?;
    debug!("Archive URL: {}", release.assets.binary_archive_url);
    debug!("Manifest URL: {}", release.assets.checksum_manifest_url);

    let target = InstallTarget::new(executable_path(&config.bin_path, platform), &naming);

    Ok(InstallPlan {
        release,
        naming,
        target,
        checksum_policy: config.checksum_policy,
    })
}

async fn install(config: &InstallConfig) -> Result<InstallOutcome, InstallError> {
    let client = build_client(&config.http())?;
    let plan = resolve(&client, config).await?;
    let asset = plan.asset_name();
    let assets = &plan.release.assets;

    info!(
        "Installing {} {} for {}",
        plan.release.repository,
        plan.release.version,
        plan.naming.target()
    );

    let dir = plan.target.install_dir().to_path_buf();
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|source| InstallError::Io {
            path: dir.clone(),
            source,
        })?;

    let fetcher = ArchiveFetcher::new(&client, &dir);
    let (manifest, archive) = futures::join!(
        fetch_manifest(&client, &assets.checksum_manifest_url),
        fetcher.fetch(&assets.binary_archive_url),
    );
    let archive = archive?;
    info!("Downloaded {} ({} bytes)", archive.url(), archive.size());
    let manifest = accept_manifest(manifest, plan.checksum_policy)?;

    let verification =
        IntegrityVerifier::new(plan.checksum_policy).verify(&archive, &asset, manifest.as_ref())?;

    // Dropping this future (timeout, Ctrl-C) does not stop the blocking task,
    // so the guard tells the installer to abandon the final rename instead.
    let installer = ArchiveInstaller::new();
    let _cancel = CancelOnDrop(installer.clone());
    let target = plan.target.clone();
    let path = tokio::task::spawn_blocking(move || {
        let placed = installer.install(archive.path(), &target);
        drop(archive);
        placed
    })
    .await??;

    Ok(InstallOutcome {
        name: config.binary_name.clone(),
        version: plan.release.version,
        path,
        verification,
    })
}

/// Cancels the wrapped installer when dropped.
struct CancelOnDrop(ArchiveInstaller);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// A manifest that could not be fetched is fatal only under the strict policy.
fn accept_manifest(
    fetched: Result<ChecksumManifest, shipbin_core::ManifestError>,
    policy: ChecksumPolicy,
) -> Result<Option<ChecksumManifest>, InstallError> {
    match fetched {
        Ok(manifest) => {
            debug!("Checksum manifest lists {} assets", manifest.len());
            Ok(Some(manifest))
        }
        Err(e) if policy == ChecksumPolicy::Strict => Err(e.into()),
        Err(e) => {
            warn!("{e}");
            Ok(None)
        }
    }
}

/// Windows executables need an `.exe` suffix to be runnable.
pub fn executable_path(bin_path: &Path, platform: TargetDescriptor) -> PathBuf {
    let has_suffix = bin_path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("exe"));
    if !platform.is_windows() || has_suffix {
        return bin_path.to_path_buf();
    }
    let mut raw = bin_path.as_os_str().to_os_string();
    raw.push(platform.executable_suffix());
    PathBuf::from(raw)
}
