//! Release lookup and asset URL construction.

use reqwest::Client;
use serde::Deserialize;
use shipbin_schema::{
    AssetNaming, CoordinateError, GitHubRepo, ReleaseCoordinate, ReleaseVersion, parse_tag,
};
use thiserror::Error;
use tracing::info;

/// GitHub REST endpoint for repository queries.
pub const DEFAULT_API_BASE: &str = "https://api.github.com/repos";
/// GitHub host serving release asset downloads.
pub const DEFAULT_DOWNLOAD_BASE: &str = "https://github.com";

#[derive(Error, Debug)]
pub enum ReleaseError {
    #[error("failed to get latest release from {url}: HTTP {status}")]
    Status { status: u16, url: String },

    #[error("failed to get latest release from {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("latest release from {url} has an unusable tag: {source}")]
    Tag {
        url: String,
        #[source]
        source: CoordinateError,
    },
}

/// Base URLs of the release host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseHosts {
    /// Prefix for `{repo}/releases/latest`.
    pub api_base: String,
    /// Prefix for `{repo}/releases/download/...`.
    pub download_base: String,
}

impl Default for ReleaseHosts {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            download_base: DEFAULT_DOWNLOAD_BASE.to_string(),
        }
    }
}

/// Download URLs for one release on one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetSet {
    pub binary_archive_url: String,
    pub checksum_manifest_url: String,
}

impl AssetSet {
    /// Build both URLs for a concrete version.
    pub fn new(
        hosts: &ReleaseHosts,
        repo: &GitHubRepo,
        version: &semver::Version,
        naming: &AssetNaming,
    ) -> Self {
        let base = hosts.download_base.trim_end_matches('/');
        let url = |file: &str| {
            format!(
                "{base}/{}",
                AssetNaming::release_download_path(repo, version, file)
            )
        };

        Self {
            binary_archive_url: url(&naming.archive_name()),
            checksum_manifest_url: url(&naming.checksum_manifest_name(version)),
        }
    }
}

/// A release with `latest` resolved away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRelease {
    pub repository: GitHubRepo,
    pub version: semver::Version,
    pub assets: AssetSet,
}

#[derive(Debug, Deserialize)]
struct LatestRelease {
    tag_name: String,
}

/// Turns a [`ReleaseCoordinate`] into concrete download URLs.
#[derive(Debug)]
pub struct ReleaseLocator<'a> {
    client: &'a Client,
    hosts: &'a ReleaseHosts,
}

impl<'a> ReleaseLocator<'a> {
    pub fn new(client: &'a Client, hosts: &'a ReleaseHosts) -> Self {
        Self { client, hosts }
    }

    /// Resolve the version (one request, only for `latest`) and build the asset URLs.
    pub async fn locate(
        &self,
        coordinate: &ReleaseCoordinate,
        naming: &AssetNaming,
    ) -> Result<ResolvedRelease, ReleaseError> {
        let version = match &coordinate.version {
            ReleaseVersion::Pinned(v) => v.clone(),
            ReleaseVersion::Latest => self.latest_version(&coordinate.repository).await?,
        };

        let assets = AssetSet::new(self.hosts, &coordinate.repository, &version, naming);
        Ok(ResolvedRelease {
            repository: coordinate.repository.clone(),
            version,
            assets,
        })
    }

    async fn latest_version(&self, repo: &GitHubRepo) -> Result<semver::Version, ReleaseError> {
        let url = format!(
            "{}/{repo}/releases/latest",
            self.hosts.api_base.trim_end_matches('/')
        );
        info!("Querying {url}");

        let http_err = |source| ReleaseError::Http {
            url: url.clone(),
            source,
        };

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(http_err)?;

        if !response.status().is_success() {
            return Err(ReleaseError::Status {
                status: response.status().as_u16(),
                url,
            });
        }

        let release: LatestRelease = response.json().await.map_err(http_err)?;
        parse_tag(&release.tag_name).map_err(|source| ReleaseError::Tag { url, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipbin_schema::{Arch, Os, TargetDescriptor};

    fn naming() -> AssetNaming {
        AssetNaming::new("tool", TargetDescriptor::new(Os::Linux, Arch::Amd64))
    }

    fn hosts(base: &str) -> ReleaseHosts {
        ReleaseHosts {
            api_base: base.to_string(),
            download_base: base.to_string(),
        }
    }

    #[test]
    fn urls_are_deterministic() {
        let hosts = ReleaseHosts::default();
        let repo = GitHubRepo::new("org/tool").unwrap();
        let version = semver::Version::new(1, 2, 3);

        let first = AssetSet::new(&hosts, &repo, &version, &naming());
        let second = AssetSet::new(&hosts, &repo, &version, &naming());
        assert_eq!(first, second);
        assert_eq!(
            first.binary_archive_url,
            "https://github.com/org/tool/releases/download/v1.2.3/tool_linux_amd64.tar.gz"
        );
        assert_eq!(
            first.checksum_manifest_url,
            "https://github.com/org/tool/releases/download/v1.2.3/tool_1.2.3_checksums.txt"
        );
    }

    #[test]
    fn trailing_slash_on_host_is_ignored() {
        let repo = GitHubRepo::new("org/tool").unwrap();
        let version = semver::Version::new(1, 2, 3);
        let a = AssetSet::new(&hosts("https://mirror.example/"), &repo, &version, &naming());
        let b = AssetSet::new(&hosts("https://mirror.example"), &repo, &version, &naming());
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn pinned_version_makes_no_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let client = Client::new();
        let hosts = hosts(&server.url());
        let coordinate = ReleaseCoordinate::parse("org/tool", "1.2.3").unwrap();
        let resolved = ReleaseLocator::new(&client, &hosts)
            .locate(&coordinate, &naming())
            .await
            .unwrap();

        assert_eq!(resolved.version, semver::Version::new(1, 2, 3));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn latest_strips_tag_prefix() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/org/tool/releases/latest")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"tag_name": "v1.2.3", "name": "Release 1.2.3"}"#)
            .expect(1)
            .create_async()
            .await;

        let client = Client::new();
        let hosts = hosts(&server.url());
        let coordinate = ReleaseCoordinate::parse("org/tool", "latest").unwrap();
        let resolved = ReleaseLocator::new(&client, &hosts)
            .locate(&coordinate, &naming())
            .await
            .unwrap();

        assert_eq!(resolved.version.to_string(), "1.2.3");
        assert!(
            resolved
                .assets
                .binary_archive_url
                .ends_with("/org/tool/releases/download/v1.2.3/tool_linux_amd64.tar.gz")
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn latest_lookup_failures_are_reported() {
        let mut server = mockito::Server::new_async().await;
        let _missing = server
            .mock("GET", "/org/missing/releases/latest")
            .with_status(404)
            .create_async()
            .await;
        let _garbled = server
            .mock("GET", "/org/garbled/releases/latest")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;
        let _untagged = server
            .mock("GET", "/org/untagged/releases/latest")
            .with_status(200)
            .with_body(r#"{"tag_name": "nightly"}"#)
            .create_async()
            .await;

        let client = Client::new();
        let hosts = hosts(&server.url());
        let locator = ReleaseLocator::new(&client, &hosts);
        let locate = |repo: &str| {
            let coordinate = ReleaseCoordinate::parse(repo, "latest").unwrap();
            let locator = &locator;
            async move { locator.locate(&coordinate, &naming()).await }
        };

        assert!(matches!(
            locate("org/missing").await,
            Err(ReleaseError::Status { status: 404, .. })
        ));
        assert!(matches!(
            locate("org/garbled").await,
            Err(ReleaseError::Http { .. })
        ));
        assert!(matches!(
            locate("org/untagged").await,
            Err(ReleaseError::Tag { .. })
        ));
    }
}
