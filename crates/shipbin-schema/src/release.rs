//! Release coordinates: which repository, which version.

use thiserror::Error;

/// Errors from parsing release coordinates.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinateError {
    /// Repository is not `owner/name`.
    #[error("invalid repository: expected 'owner/name', got '{0}'")]
    Repository(String),

    /// Version is neither `latest` nor a semantic version.
    #[error("invalid release version '{input}': {reason}")]
    Version {
        /// Original input.
        input: String,
        /// Parser message.
        reason: String,
    },
}

/// A validated GitHub repository reference in `owner/name` format.
///
/// # Example
///
/// ```
/// use shipbin_schema::GitHubRepo;
///
/// let repo = GitHubRepo::new("supabase/cli").unwrap();
/// assert_eq!(repo.as_str(), "supabase/cli");
/// assert!(GitHubRepo::new("supabase").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GitHubRepo(String);

impl GitHubRepo {
    /// Create a new `GitHubRepo`, validating the `owner/name` format.
    pub fn new(s: &str) -> Result<Self, CoordinateError> {
        match s.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok(Self(s.to_string()))
            }
            _ => Err(CoordinateError::Repository(s.to_string())),
        }
    }

    /// Return the raw `owner/name` string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GitHubRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Requested release version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseVersion {
    /// Ask the release host for its newest published release.
    Latest,
    /// A specific version (no leading `v`).
    Pinned(semver::Version),
}

impl ReleaseVersion {
    /// Sentinel accepted in place of a version number.
    pub const LATEST: &'static str = "latest";

    /// Parse `latest` or a semantic version, tolerating a `v` prefix.
    pub fn parse(s: &str) -> Result<Self, CoordinateError> {
        let s = s.trim();
        if s.eq_ignore_ascii_case(Self::LATEST) {
            return Ok(Self::Latest);
        }
        parse_tag(s).map(Self::Pinned)
    }
}

impl std::fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Latest => f.write_str(Self::LATEST),
            Self::Pinned(v) => write!(f, "{v}"),
        }
    }
}

/// Parse a release tag such as `v1.2.3` into a version.
pub fn parse_tag(tag: &str) -> Result<semver::Version, CoordinateError> {
    let stripped = tag.strip_prefix('v').unwrap_or(tag);
    semver::Version::parse(stripped).map_err(|e| CoordinateError::Version {
        input: tag.to_string(),
        reason: e.to_string(),
    })
}

/// The (repository, version) pair identifying a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseCoordinate {
    /// `owner/name` repository on the release host.
    pub repository: GitHubRepo,
    /// Requested version, possibly still `latest`.
    pub version: ReleaseVersion,
}

impl ReleaseCoordinate {
    /// Parse both halves of a coordinate.
    pub fn parse(repository: &str, version: &str) -> Result<Self, CoordinateError> {
        Ok(Self {
            repository: GitHubRepo::new(repository)?,
            version: ReleaseVersion::parse(version)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_validation() {
        assert!(GitHubRepo::new("org/tool").is_ok());
        for bad in ["org", "/tool", "org/", "a/b/c", ""] {
            assert!(
                matches!(GitHubRepo::new(bad), Err(CoordinateError::Repository(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn version_parsing() {
        assert_eq!(ReleaseVersion::parse("latest").unwrap(), ReleaseVersion::Latest);
        assert_eq!(ReleaseVersion::parse("LATEST").unwrap(), ReleaseVersion::Latest);

        let pinned = ReleaseVersion::parse("v1.2.3").unwrap();
        assert_eq!(pinned, ReleaseVersion::parse("1.2.3").unwrap());
        assert_eq!(pinned.to_string(), "1.2.3");

        assert!(ReleaseVersion::parse("1.2.3-beta.4").is_ok());
        assert!(matches!(
            ReleaseVersion::parse("one"),
            Err(CoordinateError::Version { .. })
        ));
    }
}
