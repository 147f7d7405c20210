//! Platform resolution.
//!
//! Release assets are named with Go-style platform identifiers
//! (`darwin`, `linux`, `windows` / `amd64`, `arm64`). The running process
//! reports its platform in a different vocabulary (Rust's
//! `std::env::consts`, or Node's `process.platform` / `process.arch` when
//! invoked from a package-manager lifecycle script), so every raw value goes
//! through a fixed allow-list before anything touches the network.
//!
//! # Example
//!
//! ```
//! use shipbin_schema::{Arch, Os, TargetDescriptor};
//!
//! let target = TargetDescriptor::resolve("win32", "x64").unwrap();
//! assert_eq!(target, TargetDescriptor::new(Os::Windows, Arch::Amd64));
//! assert_eq!(target.executable_suffix(), ".exe");
//! ```

use thiserror::Error;

/// The host platform could not be mapped onto a release asset.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("installation is not supported for {os} {arch}")]
pub struct PlatformError {
    /// Raw operating-system identifier as reported by the process.
    pub os: String,
    /// Raw CPU-architecture identifier as reported by the process.
    pub arch: String,
}

/// Operating systems for which releases are published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
    /// macOS
    Darwin,
    /// Linux
    Linux,
    /// Windows
    Windows,
}

impl Os {
    /// Map a raw OS identifier onto the release naming convention.
    pub fn from_raw(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "darwin" | "macos" => Some(Self::Darwin),
            "linux" => Some(Self::Linux),
            "win32" | "windows" => Some(Self::Windows),
            _ => None,
        }
    }

    /// Name used in release asset filenames.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Darwin => "darwin",
            Self::Linux => "linux",
            Self::Windows => "windows",
        }
    }
}

impl std::fmt::Display for Os {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CPU architectures for which releases are published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    /// 64-bit x86 (`x86_64`, Node's `x64`)
    Amd64,
    /// 64-bit ARM (`aarch64`)
    Arm64,
}

impl Arch {
    /// Map a raw architecture identifier onto the release naming convention.
    pub fn from_raw(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "x64" | "x86_64" | "amd64" => Some(Self::Amd64),
            "arm64" | "aarch64" => Some(Self::Arm64),
            _ => None,
        }
    }

    /// Name used in release asset filenames.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Amd64 => "amd64",
            Self::Arm64 => "arm64",
        }
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved (os, arch) pair. Can only be built from allow-listed values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetDescriptor {
    os: Os,
    arch: Arch,
}

impl TargetDescriptor {
    /// Build a descriptor from already-resolved parts.
    pub fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }

    /// Resolve raw identifiers reported by the running process.
    ///
    /// Both values must be recognized; otherwise the whole pair is rejected.
    pub fn resolve(raw_os: &str, raw_arch: &str) -> Result<Self, PlatformError> {
        match (Os::from_raw(raw_os), Arch::from_raw(raw_arch)) {
            (Some(os), Some(arch)) => Ok(Self { os, arch }),
            _ => Err(PlatformError {
                os: raw_os.to_string(),
                arch: raw_arch.to_string(),
            }),
        }
    }

    /// Whether executables on this platform carry an `.exe` suffix.
    pub fn is_windows(&self) -> bool {
        self.os == Os::Windows
    }

    /// Executable filename suffix for this platform.
    pub fn executable_suffix(&self) -> &'static str {
        if self.is_windows() { ".exe" } else { "" }
    }
}

impl std::fmt::Display for TargetDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.os, self.arch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_pairs_map_to_release_names() {
        let cases = [
            ("darwin", "x64", Os::Darwin, Arch::Amd64),
            ("darwin", "arm64", Os::Darwin, Arch::Arm64),
            ("macos", "aarch64", Os::Darwin, Arch::Arm64),
            ("linux", "x64", Os::Linux, Arch::Amd64),
            ("linux", "x86_64", Os::Linux, Arch::Amd64),
            ("linux", "arm64", Os::Linux, Arch::Arm64),
            ("win32", "x64", Os::Windows, Arch::Amd64),
            ("windows", "aarch64", Os::Windows, Arch::Arm64),
        ];

        for (raw_os, raw_arch, os, arch) in cases {
            let target = TargetDescriptor::resolve(raw_os, raw_arch).unwrap();
            assert_eq!(target, TargetDescriptor::new(os, arch), "{raw_os} {raw_arch}");
        }
    }

    #[test]
    fn unsupported_pairs_are_rejected() {
        for (raw_os, raw_arch) in [
            ("freebsd", "x64"),
            ("linux", "ia32"),
            ("aix", "ppc64"),
            ("", ""),
            ("win32", "riscv64"),
        ] {
            let err = TargetDescriptor::resolve(raw_os, raw_arch).unwrap_err();
            assert_eq!(err.os, raw_os);
            assert_eq!(err.arch, raw_arch);
        }
    }

    #[test]
    fn display_matches_asset_infix() {
        let target = TargetDescriptor::new(Os::Linux, Arch::Arm64);
        assert_eq!(target.to_string(), "linux_arm64");
        assert_eq!(target.executable_suffix(), "");
    }
}
