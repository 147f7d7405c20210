//! Core library for shipbin.
//!
//! Release lookup, checksum manifests, archive download, integrity
//! verification and installation. Each step is usable on its own; the CLI
//! crate sequences them into a single install run.

pub mod http;
pub mod installer;
pub mod io;
pub mod manifest;
pub mod release;
pub mod verify;

pub use installer::{ArchiveInstaller, InstallTarget, InstallerError};
pub use io::download::{ArchiveFetcher, DownloadError, DownloadedArtifact};
pub use manifest::{ChecksumManifest, ManifestError};
pub use release::{AssetSet, ReleaseError, ReleaseHosts, ReleaseLocator, ResolvedRelease};
pub use verify::{ChecksumPolicy, IntegrityVerifier, Verification, VerifyError};

/// User Agent string for core operations
pub const USER_AGENT: &str = concat!("shipbin/", env!("CARGO_PKG_VERSION"));
