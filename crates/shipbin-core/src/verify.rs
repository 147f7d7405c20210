//! Integrity verification of downloaded archives against the checksum manifest.

use shipbin_schema::Sha256Digest;
use thiserror::Error;
use tracing::{info, warn};

use crate::io::download::DownloadedArtifact;
use crate::manifest::ChecksumManifest;

/// What to do when a digest cannot be checked.
///
/// A digest that *is* listed and does not match always fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumPolicy {
    /// Missing manifest or missing entry is an error.
    #[default]
    Strict,
    /// Missing manifest or missing entry is a warning; install continues unverified.
    Permissive,
}

impl ChecksumPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Permissive => "permissive",
        }
    }
}

impl std::fmt::Display for ChecksumPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ChecksumPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "permissive" => Ok(Self::Permissive),
            _ => Err(format!(
                "Unknown checksum policy: {s} (expected 'strict' or 'permissive')"
            )),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("Checksum mismatch for {asset}: expected {expected}, got {actual}. Downloaded data might be corrupted.")]
    Mismatch {
        asset: String,
        expected: Sha256Digest,
        actual: Sha256Digest,
    },

    #[error("No checksum manifest available to verify {asset}")]
    NoManifest { asset: String },

    #[error("Checksum manifest has no entry for {asset}")]
    NoEntry { asset: String },
}

/// Outcome of a verification that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Verified(Sha256Digest),
    /// Not checked; carries the reason that was logged.
    Skipped(String),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IntegrityVerifier {
    policy: ChecksumPolicy,
}

impl IntegrityVerifier {
    pub fn new(policy: ChecksumPolicy) -> Self {
        Self { policy }
    }

    /// Check `artifact`, published as `asset`, against `manifest`.
    ///
    /// `manifest` is `None` when it could not be fetched.
    pub fn verify(
        &self,
        artifact: &DownloadedArtifact,
        asset: &str,
        manifest: Option<&ChecksumManifest>,
    ) -> Result<Verification, VerifyError> {
        self.check_digest(artifact.sha256(), asset, manifest)
    }

    fn check_digest(
        &self,
        actual: &Sha256Digest,
        asset: &str,
        manifest: Option<&ChecksumManifest>,
    ) -> Result<Verification, VerifyError> {
        let Some(manifest) = manifest else {
            return self.unverifiable(VerifyError::NoManifest {
                asset: asset.to_string(),
            });
        };

        let Some(expected) = manifest.get(asset) else {
            return self.unverifiable(VerifyError::NoEntry {
                asset: asset.to_string(),
            });
        };

        if expected != actual {
            return Err(VerifyError::Mismatch {
                asset: asset.to_string(),
                expected: expected.clone(),
                actual: actual.clone(),
            });
        }

        info!("Checksum verified for {asset}");
        Ok(Verification::Verified(actual.clone()))
    }

    fn unverifiable(&self, reason: VerifyError) -> Result<Verification, VerifyError> {
        match self.policy {
            ChecksumPolicy::Strict => Err(reason),
            ChecksumPolicy::Permissive => {
                warn!("{reason}; skipping verification");
                Ok(Verification::Skipped(reason.to_string()))
            }
        }
    }
}
