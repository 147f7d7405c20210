//! Failure taxonomy of an install run

use std::path::PathBuf;
use std::time::Duration;

use shipbin_core::http::HttpError;
use shipbin_core::{DownloadError, InstallerError, ManifestError, ReleaseError, VerifyError};
use shipbin_schema::{CoordinateError, PlatformError, Sha256Digest};
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("{0}")]
    UnsupportedPlatform(#[from] PlatformError),

    #[error(
        "Installing this package globally is not supported. Install it as a project dependency instead."
    )]
    GlobalInstallRejected,

    #[error("Invalid package configuration: {0}")]
    Descriptor(#[from] ConfigError),

    #[error("Invalid release coordinate: {0}")]
    Coordinate(#[from] CoordinateError),

    #[error("Release lookup failed: {0}")]
    ReleaseLookupFailed(#[from] ReleaseError),

    #[error("Checksum manifest unavailable: {0}")]
    ManifestFetchFailed(#[from] ManifestError),

    #[error("Download failed: {0}")]
    DownloadFailed(#[from] DownloadError),

    #[error("Checksum mismatch for {asset}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        asset: String,
        expected: Sha256Digest,
        actual: Sha256Digest,
    },

    #[error("Cannot verify {asset}: {reason}")]
    ChecksumMissing { asset: String, reason: String },

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Binary not found in archive (looked for {})", display_paths(.searched))]
    BinaryNotFound { searched: Vec<PathBuf> },

    #[error("Install failed: {0}")]
    Install(InstallerError),

    #[error("HTTP client error: {0}")]
    Http(#[from] HttpError),

    #[error("Failed to prepare {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Install task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Install did not finish within {}s", .0.as_secs())]
    TimedOut(Duration),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<VerifyError> for InstallError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::Mismatch {
                asset,
                expected,
                actual,
            } => Self::ChecksumMismatch {
                asset,
                expected,
                actual,
            },
            VerifyError::NoManifest { ref asset } | VerifyError::NoEntry { ref asset } => {
                Self::ChecksumMissing {
                    asset: asset.clone(),
                    reason: err.to_string(),
                }
            }
        }
    }
}

impl From<InstallerError> for InstallError {
    fn from(err: InstallerError) -> Self {
        match err {
            InstallerError::Extraction { .. } => Self::ExtractionFailed(err.to_string()),
            InstallerError::BinaryNotFound { searched, .. } => Self::BinaryNotFound { searched },
            other => Self::Install(other),
        }
    }
}
