//! Checksum manifests (`{base}_{version}_checksums.txt`).
//!
//! One row per asset, `<sha256><whitespace><filename>`, as written by
//! `sha256sum` and goreleaser.

use std::collections::HashMap;

use reqwest::Client;
use shipbin_schema::Sha256Digest;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("could not fetch checksum file {url}: HTTP {status}")]
    Status { status: u16, url: String },

    #[error("could not fetch checksum file {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Expected digests keyed by asset filename.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChecksumManifest {
    entries: HashMap<String, Sha256Digest>,
}

impl ChecksumManifest {
    /// Parse manifest text, keeping only well-formed rows.
    ///
    /// A row is a 64-hex digest, whitespace, then the filename (which may
    /// itself contain spaces). A leading `*` (binary mode marker) on the
    /// filename is dropped. If a filename repeats, the last row wins.
    pub fn parse(text: &str) -> Self {
        let mut entries = HashMap::new();
        let mut skipped = 0usize;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let Some((digest, name)) = line.split_once(char::is_whitespace) else {
                skipped += 1;
                continue;
            };

            let name = name.trim().trim_start_matches('*');
            match Sha256Digest::new(digest) {
                Ok(digest) if !name.is_empty() => {
                    entries.insert(name.to_string(), digest);
                }
                _ => skipped += 1,
            }
        }

        if skipped > 0 {
            debug!("Skipped {skipped} malformed checksum rows");
        }

        Self { entries }
    }

    /// Expected digest for `asset`, if listed.
    pub fn get(&self, asset: &str) -> Option<&Sha256Digest> {
        self.entries.get(asset)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Download and parse a checksum manifest.
pub async fn fetch_manifest(client: &Client, url: &str) -> Result<ChecksumManifest, ManifestError> {
    info!("Downloading {url}");

    let http_err = |source| ManifestError::Http {
        url: url.to_string(),
        source,
    };

    let response = client.get(url).send().await.map_err(http_err)?;
    if !response.status().is_success() {
        return Err(ManifestError::Status {
            status: response.status().as_u16(),
            url: url.to_string(),
        });
    }

    let text = response.text().await.map_err(http_err)?;
    Ok(ChecksumManifest::parse(&text))
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "2c26b46b68ffc68ff99b453c1d30413413422d706483bfa0f98a5e886266e7ae";
    const B: &str = "fcde2b2edba56bf408601fb721fe9b5c338d10ee429ea04fae5511b68fbf8fb9";

    #[test]
    fn parses_well_formed_rows() {
        let text = format!("{A}  tool_linux_amd64.tar.gz\n{B}  tool_darwin_arm64.tar.gz\n");
        let manifest = ChecksumManifest::parse(&text);

        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.get("tool_linux_amd64.tar.gz").unwrap().as_str(), A);
        assert_eq!(manifest.get("tool_darwin_arm64.tar.gz").unwrap().as_str(), B);
    }

    #[test]
    fn tolerates_noise() {
        let text = format!(
            "\n\n{A}\ttool_linux_amd64.tar.gz   \n\
             \x20\x20\n\
             not-a-digest tool_windows_amd64.tar.gz\n\
             {B}\n\
             {}  *tool_darwin_arm64.tar.gz\r\n\
             # comment line\n",
            B.to_uppercase()
        );
        let manifest = ChecksumManifest::parse(&text);

        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.get("tool_linux_amd64.tar.gz").unwrap().as_str(), A);
        assert_eq!(manifest.get("tool_darwin_arm64.tar.gz").unwrap().as_str(), B);
    }

    #[test]
    fn filenames_may_contain_spaces() {
        let text = format!("{A}  tool for linux.tar.gz\n{B} *release notes.txt  \n");
        let manifest = ChecksumManifest::parse(&text);

        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.get("tool for linux.tar.gz").unwrap().as_str(), A);
        assert_eq!(manifest.get("release notes.txt").unwrap().as_str(), B);
    }

    #[test]
    fn parsing_is_idempotent() {
        let text = format!("{A} x.tar.gz\n\nbogus\n{B} y.tar.gz\n");
        assert_eq!(ChecksumManifest::parse(&text), ChecksumManifest::parse(&text));
    }

    #[test]
    fn empty_text_gives_empty_manifest() {
        assert!(ChecksumManifest::parse("").is_empty());
    }

    #[tokio::test]
    async fn fetch_reports_http_status() {
        let mut server = mockito::Server::new_async().await;
        let _ok = server
            .mock("GET", "/sums.txt")
            .with_status(200)
            .with_body(format!("{A}  tool_linux_amd64.tar.gz\n"))
            .create_async()
            .await;
        let _gone = server
            .mock("GET", "/gone.txt")
            .with_status(404)
            .create_async()
            .await;

        let client = Client::new();
        let manifest = fetch_manifest(&client, &format!("{}/sums.txt", server.url()))
            .await
            .unwrap();
        assert_eq!(manifest.len(), 1);

        let err = fetch_manifest(&client, &format!("{}/gone.txt", server.url()))
            .await
            .unwrap_err();
        assert!(matches!(err, ManifestError::Status { status: 404, .. }));
    }
}
