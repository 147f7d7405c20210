//! Archive download with streaming SHA256.
//!
//! The body is written to a temp file next to the install destination (same
//! volume, so the final placement never crosses filesystems) and hashed on
//! the way through.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use reqwest::Client;
use sha2::{Digest, Sha256};
use shipbin_schema::Sha256Digest;
use tempfile::TempPath;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("failed to download {url}: HTTP {status}")]
    Status { status: u16, url: String },

    #[error("failed to download {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to write download to {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Temp archive file, deleted when dropped.
#[derive(Debug)]
struct TempArchive(Option<TempPath>);

impl TempArchive {
    fn path(&self) -> &Path {
        self.0.as_deref().unwrap_or(Path::new(""))
    }
}

impl Drop for TempArchive {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            let shown = path.display().to_string();
            match path.close() {
                Ok(()) => debug!("Removed {shown}"),
                Err(e) => warn!("Could not clean up temporary file {shown}: {e}"),
            }
        }
    }
}

/// A fully downloaded archive.
///
/// Owns its temp file: dropping the artifact deletes it.
#[derive(Debug)]
pub struct DownloadedArtifact {
    file: TempArchive,
    url: String,
    sha256: Sha256Digest,
    size: u64,
}

impl DownloadedArtifact {
    /// Location of the archive on disk.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// URL the archive came from.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// SHA256 of the bytes written.
    pub fn sha256(&self) -> &Sha256Digest {
        &self.sha256
    }

    /// Number of bytes written.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Take ownership of an archive already on disk.
    #[cfg(test)]
    pub(crate) fn adopt(path: TempPath, url: impl Into<String>) -> std::io::Result<Self> {
        let bytes = std::fs::read(&path)?;
        Ok(Self {
            file: TempArchive(Some(path)),
            url: url.into(),
            sha256: Sha256Digest::from_bytes(&Sha256::digest(&bytes)),
            size: bytes.len() as u64,
        })
    }
}

/// Downloads archives into a fixed directory.
#[derive(Debug)]
pub struct ArchiveFetcher<'a> {
    client: &'a Client,
    dir: &'a Path,
}

impl<'a> ArchiveFetcher<'a> {
    /// `dir` must exist; temp files are created inside it.
    pub fn new(client: &'a Client, dir: &'a Path) -> Self {
        Self { client, dir }
    }

    /// GET `url` and persist the body to a uniquely named temp file.
    pub async fn fetch(&self, url: &str) -> Result<DownloadedArtifact, DownloadError> {
        info!("Downloading {url}");

        let http_err = |source| DownloadError::Http {
            url: url.to_string(),
            source,
        };

        let response = self.client.get(url).send().await.map_err(http_err)?;
        if !response.status().is_success() {
            return Err(DownloadError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        let io_err = |source| DownloadError::Io {
            path: self.dir.to_path_buf(),
            source,
        };

        let (file, path) = tempfile::Builder::new()
            .prefix(".shipbin-download-")
            .suffix(".tar.gz")
            .tempfile_in(self.dir)
            .map_err(io_err)?
            .into_parts();
        let guard = TempArchive(Some(path));

        let mut file = tokio::fs::File::from_std(file);
        let mut stream = response.bytes_stream();
        let mut hasher = Sha256::new();
        let mut size: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(http_err)?;
            file.write_all(&chunk).await.map_err(io_err)?;
            hasher.update(&chunk);
            size += chunk.len() as u64;
        }
        file.flush().await.map_err(io_err)?;
        drop(file);

        debug!("Wrote {size} bytes to {}", guard.path().display());

        Ok(DownloadedArtifact {
            file: guard,
            url: url.to_string(),
            sha256: Sha256Digest::from_bytes(&hasher.finalize()),
            size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_body_and_hashes_it() {
        let mut server = mockito::Server::new_async().await;
        let body = b"archive bytes".to_vec();
        let _m = server
            .mock("GET", "/tool.tar.gz")
            .with_status(200)
            .with_body(body.clone())
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = Client::new();
        let url = format!("{}/tool.tar.gz", server.url());
        let artifact = ArchiveFetcher::new(&client, dir.path())
            .fetch(&url)
            .await
            .unwrap();

        assert_eq!(std::fs::read(artifact.path()).unwrap(), body);
        assert!(artifact.path().starts_with(dir.path()));
        assert_eq!(artifact.size(), body.len() as u64);
        assert_eq!(artifact.url(), url);
        assert_eq!(
            artifact.sha256(),
            &Sha256Digest::from_bytes(&Sha256::digest(&body))
        );

        let path = artifact.path().to_path_buf();
        drop(artifact);
        assert!(!path.exists(), "temp archive removed on drop");
    }

    #[tokio::test]
    async fn non_success_status_leaves_nothing_behind() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/missing.tar.gz")
            .with_status(404)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = Client::new();
        let err = ArchiveFetcher::new(&client, dir.path())
            .fetch(&format!("{}/missing.tar.gz", server.url()))
            .await
            .unwrap_err();

        match err {
            DownloadError::Status { status, url } => {
                assert_eq!(status, 404);
                assert!(url.ends_with("/missing.tar.gz"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
