//! Run configuration.
//!
//! Everything the install run reads from the outside world is collected
//! here, once, before the pipeline starts: process environment (platform,
//! proxy, token, global-install flags), the package descriptor, and CLI
//! flags. The orchestrator only ever sees an [`InstallConfig`].

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use shipbin_core::http::HttpConfig;
use shipbin_core::{ChecksumPolicy, ReleaseHosts};
use thiserror::Error;

use crate::InstallArgs;

/// Proxy variables, highest priority first.
pub const PROXY_VARS: [&str; 9] = [
    "npm_config_https_proxy",
    "npm_config_http_proxy",
    "npm_config_proxy",
    "HTTPS_PROXY",
    "https_proxy",
    "HTTP_PROXY",
    "http_proxy",
    "ALL_PROXY",
    "all_proxy",
];

/// Package descriptor read when flags leave gaps.
pub const DESCRIPTOR_FILE: &str = "package.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no {field} configured: pass --{flag} or set it in package.json")]
    Missing {
        field: &'static str,
        flag: &'static str,
    },
}

/// Process environment, captured once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    /// Raw OS identifier (`std::env::consts::OS` or Node's `process.platform`).
    pub raw_os: String,
    /// Raw architecture identifier (`std::env::consts::ARCH` or Node's `process.arch`).
    pub raw_arch: String,
    pub proxy: Option<String>,
    pub token: Option<String>,
    /// The package manager is performing a global install.
    pub global_install: bool,
}

impl Environment {
    /// Read the real process environment.
    pub fn capture() -> Self {
        Self::from_lookup(
            std::env::consts::OS,
            std::env::consts::ARCH,
            |key| std::env::var(key).ok(),
        )
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup(
        raw_os: &str,
        raw_arch: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            raw_os: raw_os.to_string(),
            raw_arch: raw_arch.to_string(),
            proxy: PROXY_VARS.iter().find_map(|key| non_empty(key)),
            token: non_empty("GITHUB_TOKEN"),
            global_install: is_global_install(&lookup),
        }
    }
}

/// npm exports `npm_config_global`; yarn v1 only records the original argv.
fn is_global_install(lookup: &impl Fn(&str) -> Option<String>) -> bool {
    let npm_global = lookup("npm_config_global").is_some_and(|v| {
        let v = v.trim();
        !v.is_empty() && v != "false" && v != "0"
    });

    let yarn_global = lookup("npm_config_argv")
        .and_then(|argv| serde_json::from_str::<serde_json::Value>(&argv).ok())
        .and_then(|argv| {
            argv.get("original")?
                .as_array()
                .map(|args| args.iter().any(|a| a == "global"))
        })
        .unwrap_or(false);

    npm_global || yarn_global
}

/// The subset of `package.json` this tool reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageDescriptor {
    pub name: Option<String>,
    pub version: Option<String>,
    /// Normalized to `owner/name`.
    pub repository: Option<String>,
    /// First `bin` entry: (command name, path relative to the package).
    pub bin: Option<(String, PathBuf)>,
}

#[derive(Deserialize)]
struct RawDescriptor {
    name: Option<String>,
    version: Option<String>,
    repository: Option<RawRepository>,
    bin: Option<RawBin>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRepository {
    Short(String),
    Full { url: String },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBin {
    Single(String),
    Map(serde_json::Map<String, serde_json::Value>),
}

impl PackageDescriptor {
    /// Read `package.json` from `dir`.
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(DESCRIPTOR_FILE);
        let text = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Self::parse(&text).map_err(|source| ConfigError::Parse { path, source })
    }

    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let raw: RawDescriptor = serde_json::from_str(text)?;

        let repository = raw.repository.map(|r| match r {
            RawRepository::Short(s) | RawRepository::Full { url: s } => normalize_repository(&s),
        });

        let bin = match raw.bin {
            Some(RawBin::Single(path)) => raw
                .name
                .as_deref()
                .map(|name| (unscoped(name).to_string(), PathBuf::from(path))),
            Some(RawBin::Map(map)) => map
                .into_iter()
                .find_map(|(key, value)| value.as_str().map(|p| (key, PathBuf::from(p)))),
            None => None,
        };

        Ok(Self {
            name: raw.name,
            version: raw.version,
            repository,
            bin,
        })
    }
}

/// `@scope/name` -> `name`
fn unscoped(name: &str) -> &str {
    name.rsplit_once('/').map_or(name, |(_, n)| n)
}

/// Reduce the forms npm accepts for `repository` to `owner/name`.
pub fn normalize_repository(raw: &str) -> String {
    let mut s = raw.trim();
    for prefix in [
        "git+",
        "github:",
        "https://",
        "http://",
        "ssh://",
        "git://",
        "git@",
        "github.com/",
        "github.com:",
        "www.github.com/",
    ] {
        s = s.strip_prefix(prefix).unwrap_or(s);
    }
    let s = s.trim_end_matches('/');
    s.strip_suffix(".git").unwrap_or(s).to_string()
}

/// Fully resolved settings for one install run.
#[derive(Debug, Clone)]
pub struct InstallConfig {
    /// `owner/name`
    pub repository: String,
    /// Semantic version or `latest`.
    pub version: String,
    /// Base name used in asset filenames.
    pub binary_name: String,
    /// Where the executable goes (before any platform suffix is applied).
    pub bin_path: PathBuf,
    pub hosts: ReleaseHosts,
    pub checksum_policy: ChecksumPolicy,
    /// Bound on the whole run, and on each request.
    pub timeout: Duration,
    pub env: Environment,
}

impl InstallConfig {
    /// Merge CLI flags (which already carry env overrides) with the descriptor.
    ///
    /// The descriptor is only read when a flag is missing.
    pub fn from_args(args: &InstallArgs, env: Environment) -> Result<Self, ConfigError> {
        let complete = args.repo.is_some()
            && args.release.is_some()
            && args.binary_name.is_some()
            && args.bin_path.is_some();
        let descriptor = if complete {
            PackageDescriptor::default()
        } else {
            PackageDescriptor::load(&args.package_dir)?
        };

        let repository = args
            .repo
            .as_deref()
            .map(normalize_repository)
            .or(descriptor.repository)
            .ok_or(ConfigError::Missing {
                field: "repository",
                flag: "repo",
            })?;

        let version = args
            .release
            .clone()
            .or(descriptor.version)
            .ok_or(ConfigError::Missing {
                field: "version",
                flag: "release",
            })?;

        let (bin_name, bin_rel) = descriptor.bin.unzip();
        let binary_name = args
            .binary_name
            .clone()
            .or(bin_name)
            .ok_or(ConfigError::Missing {
                field: "binary name",
                flag: "binary-name",
            })?;

        let bin_path = args
            .bin_path
            .clone()
            .or_else(|| bin_rel.map(|rel| args.package_dir.join(rel)))
            .ok_or(ConfigError::Missing {
                field: "bin path",
                flag: "bin-path",
            })?;

        Ok(Self {
            repository,
            version,
            binary_name,
            bin_path,
            hosts: ReleaseHosts {
                api_base: args.api_base.clone(),
                download_base: args.download_base.clone(),
            },
            checksum_policy: args.checksum_policy,
            timeout: Duration::from_secs(args.timeout_secs),
            env,
        })
    }

    /// Settings for the shared HTTP client.
    pub fn http(&self) -> HttpConfig {
        HttpConfig {
            proxy: self.env.proxy.clone(),
            token: self.env.token.clone(),
            timeout: self.timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::collections::HashMap;

    fn env_with(vars: &[(&str, &str)]) -> Environment {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Environment::from_lookup("linux", "x86_64", |k| vars.get(k).cloned())
    }

    #[test]
    fn proxy_priority() {
        let env = env_with(&[
            ("HTTPS_PROXY", "http://system:1"),
            ("npm_config_http_proxy", "http://npm-http:2"),
            ("npm_config_proxy", "http://npm-generic:3"),
        ]);
        assert_eq!(env.proxy.as_deref(), Some("http://npm-http:2"));

        let env = env_with(&[("npm_config_https_proxy", ""), ("ALL_PROXY", "http://all:4")]);
        assert_eq!(env.proxy.as_deref(), Some("http://all:4"));

        assert_eq!(env_with(&[]).proxy, None);
    }

    #[test]
    fn global_install_detection() {
        assert!(env_with(&[("npm_config_global", "true")]).global_install);
        assert!(!env_with(&[("npm_config_global", "")]).global_install);
        assert!(!env_with(&[("npm_config_global", "false")]).global_install);
        assert!(
            env_with(&[(
                "npm_config_argv",
                r#"{"remain":[],"cooked":["global","add"],"original":["global","add","pkg"]}"#
            )])
            .global_install
        );
        assert!(
            !env_with(&[("npm_config_argv", r#"{"original":["install"]}"#)]).global_install
        );
        assert!(!env_with(&[("npm_config_argv", "not json")]).global_install);
    }

    #[test]
    fn repository_forms() {
        for raw in [
            "org/tool",
            "github:org/tool",
            "https://github.com/org/tool",
            "https://github.com/org/tool.git",
            "git+https://github.com/org/tool.git",
            "git@github.com:org/tool.git",
            "https://github.com/org/tool/",
        ] {
            assert_eq!(normalize_repository(raw), "org/tool", "{raw}");
        }
    }

    #[test]
    fn descriptor_bin_map_keeps_first_entry() {
        let descriptor = PackageDescriptor::parse(
            r#"{
                "name": "tool",
                "version": "1.2.3",
                "repository": {"type": "git", "url": "git+https://github.com/org/tool.git"},
                "bin": {"zeta": "bin/zeta", "alpha": "bin/alpha"}
            }"#,
        )
        .unwrap();

        assert_eq!(descriptor.repository.as_deref(), Some("org/tool"));
        assert_eq!(descriptor.version.as_deref(), Some("1.2.3"));
        assert_eq!(
            descriptor.bin,
            Some(("zeta".to_string(), PathBuf::from("bin/zeta")))
        );
    }

    #[test]
    fn descriptor_bin_string_uses_unscoped_name() {
        let descriptor =
            PackageDescriptor::parse(r#"{"name": "@org/tool", "bin": "bin/tool"}"#).unwrap();
        assert_eq!(
            descriptor.bin,
            Some(("tool".to_string(), PathBuf::from("bin/tool")))
        );
    }

    #[test]
    fn flags_override_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(DESCRIPTOR_FILE),
            r#"{"name": "tool", "version": "1.0.0", "repository": "org/tool", "bin": {"tool": "bin/tool"}}"#,
        )
        .unwrap();

        let cli = crate::Cli::parse_from([
            "shipbin",
            "--package-dir",
            dir.path().to_str().unwrap(),
            "--release",
            "latest",
            "--timeout-secs",
            "5",
        ]);
        let config = InstallConfig::from_args(&cli.install, env_with(&[])).unwrap();

        assert_eq!(config.repository, "org/tool");
        assert_eq!(config.version, "latest");
        assert_eq!(config.binary_name, "tool");
        assert_eq!(config.bin_path, dir.path().join("bin/tool"));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.checksum_policy, ChecksumPolicy::Strict);
    }

    #[test]
    fn missing_fields_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(DESCRIPTOR_FILE), r#"{"name": "tool"}"#).unwrap();

        let cli = crate::Cli::parse_from([
            "shipbin",
            "--package-dir",
            dir.path().to_str().unwrap(),
        ]);
        let err = InstallConfig::from_args(&cli.install, env_with(&[])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Missing {
                field: "repository",
                ..
            }
        ));
    }

    #[test]
    fn missing_descriptor_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let cli = crate::Cli::parse_from(["shipbin", "--package-dir", dir.path().to_str().unwrap()]);
        let err = InstallConfig::from_args(&cli.install, env_with(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
