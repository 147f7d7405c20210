//! Release asset naming.
//!
//! The `{base}_{os}_{arch}` stem shows up in three places: the archive
//! download URL, the checksum manifest row for that archive, and the
//! directory the archive unpacks into. All three are derived here.

use std::path::PathBuf;

use crate::platform::TargetDescriptor;
use crate::release::GitHubRepo;

/// Archive extension used by published releases.
pub const ARCHIVE_EXTENSION: &str = "tar.gz";

/// Names every asset of a release for one binary on one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetNaming {
    base: String,
    target: TargetDescriptor,
}

impl AssetNaming {
    /// `base` is the binary base-name used in asset filenames (e.g. `supabase`).
    pub fn new(base: impl Into<String>, target: TargetDescriptor) -> Self {
        Self {
            base: base.into(),
            target,
        }
    }

    /// Binary base-name.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Target the assets are named for.
    pub fn target(&self) -> TargetDescriptor {
        self.target
    }

    /// `{base}_{os}_{arch}`
    pub fn platform_stem(&self) -> String {
        format!("{}_{}", self.base, self.target)
    }

    /// `{base}_{os}_{arch}.tar.gz`, also the key looked up in the manifest.
    pub fn archive_name(&self) -> String {
        format!("{}.{ARCHIVE_EXTENSION}", self.platform_stem())
    }

    /// `{base}_{version}_checksums.txt`
    pub fn checksum_manifest_name(&self, version: &semver::Version) -> String {
        format!("{}_{version}_checksums.txt", self.base)
    }

    /// `{repo}/releases/download/v{version}/{file}`, relative to the download host.
    pub fn release_download_path(
        repo: &GitHubRepo,
        version: &semver::Version,
        file: &str,
    ) -> String {
        format!("{repo}/releases/download/v{version}/{file}")
    }

    /// Paths, relative to the extraction root, where the executable may live.
    ///
    /// Ordered by priority: nested platform directory, then flat; on windows
    /// both layouts are retried with `{base}.exe`. `exec_name` is the file
    /// name the executable will be installed under.
    pub fn candidate_paths(&self, exec_name: &str) -> Vec<PathBuf> {
        let stem = self.platform_stem();
        let mut candidates = vec![
            PathBuf::from(&stem).join(exec_name),
            PathBuf::from(exec_name),
        ];

        if self.target.is_windows() {
            let exe = format!("{}{}", self.base, self.target.executable_suffix());
            candidates.push(PathBuf::from(&stem).join(&exe));
            candidates.push(PathBuf::from(exe));
        }

        let mut seen = std::collections::HashSet::new();
        candidates.retain(|p| seen.insert(p.clone()));
        candidates
    }
}
