//! Placing the executable from a release archive at its final path.
//!
//! Archives are not consistent about layout: some wrap the binary in a
//! `{base}_{os}_{arch}/` directory, some put it at the root, and windows
//! archives may name it `{base}.exe` regardless of the installed name. The
//! installer extracts everything into a scratch directory and searches a fixed
//! list of candidates.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use shipbin_schema::AssetNaming;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::io::extract::{self, ExtractError, ScratchDir};

#[derive(Error, Debug)]
pub enum InstallerError {
    #[error("failed to create extraction directory in {}: {source}", .dir.display())]
    Scratch {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to extract {}: {source}", .archive.display())]
    Extraction {
        archive: PathBuf,
        #[source]
        source: ExtractError,
    },

    #[error("could not find extracted binary (looked for {})", display_paths(.searched))]
    BinaryNotFound {
        searched: Vec<PathBuf>,
        /// Indented listing of what the archive did contain.
        contents: Vec<String>,
    },

    #[error("install of {} was cancelled", .0.display())]
    Cancelled(PathBuf),

    #[error("failed to copy {} to {}: {source}", .from.display(), .to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Where the executable goes and where to look for it inside the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallTarget {
    pub final_path: PathBuf,
    /// Relative to the extraction root, highest priority first.
    pub candidates: Vec<PathBuf>,
}

impl InstallTarget {
    pub fn new(final_path: impl Into<PathBuf>, naming: &AssetNaming) -> Self {
        let final_path = final_path.into();
        let exec_name = final_path.file_name().map_or_else(
            || format!("{}{}", naming.base(), naming.target().executable_suffix()),
            |name| name.to_string_lossy().into_owned(),
        );
        let candidates = naming.candidate_paths(&exec_name);
        Self {
            final_path,
            candidates,
        }
    }

    /// Directory holding the final path; temp files are created here.
    pub fn install_dir(&self) -> &Path {
        install_dir(&self.final_path)
    }
}

/// Parent directory of `path`, `.` for a bare file name.
pub fn install_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Extracts an archive and places the executable.
///
/// Clones share one cancellation flag. Once it is set, an install in
/// progress stops before the final rename and leaves `final_path` untouched.
#[derive(Debug, Clone, Default)]
pub struct ArchiveInstaller {
    cancelled: Arc<AtomicBool>,
}

impl ArchiveInstaller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask any install running on a clone of this installer to stop.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Extract `archive` and copy the executable to `target.final_path`.
    ///
    /// The scratch directory is gone by the time this returns, whatever the
    /// outcome. On error nothing has been written to the final path.
    pub fn install(&self, archive: &Path, target: &InstallTarget) -> Result<PathBuf, InstallerError> {
        if self.is_cancelled() {
            return Err(InstallerError::Cancelled(target.final_path.clone()));
        }

        let dir = target.install_dir();
        let scratch = ScratchDir::new_in(dir).map_err(|source| InstallerError::Scratch {
            dir: dir.to_path_buf(),
            source,
        })?;

        info!("Extracting {}", archive.display());
        let files = extract::extract_tar_gz(archive, scratch.path()).map_err(|source| {
            InstallerError::Extraction {
                archive: archive.to_path_buf(),
                source,
            }
        })?;
        debug!("Extracted {} files", files.len());

        let Some(source) = Self::find_candidate(scratch.path(), &target.candidates) else {
            let contents = extract::list_tree(scratch.path());
            error!("Binary not found! Listing extracted contents:");
            for line in &contents {
                error!("{line}");
            }
            return Err(InstallerError::BinaryNotFound {
                searched: target.candidates.clone(),
                contents,
            });
        };

        info!("Found binary at: {}", source.display());
        let placed = self
            .place(&source, &target.final_path)
            .map_err(|e| InstallerError::Copy {
                from: source.clone(),
                to: target.final_path.clone(),
                source: e,
            })?;
        if !placed {
            return Err(InstallerError::Cancelled(target.final_path.clone()));
        }
        info!("Binary copied to: {}", target.final_path.display());

        Ok(target.final_path.clone())
    }

    fn find_candidate(root: &Path, candidates: &[PathBuf]) -> Option<PathBuf> {
        candidates.iter().map(|c| root.join(c)).find(|path| {
            // symlink_metadata: a link is never taken for the binary
            let found = fs::symlink_metadata(path).is_ok_and(|m| m.is_file());
            if !found {
                debug!("Binary not found at: {}", path.display());
            }
            found
        })
    }

    /// Copy into a staging file beside `dest`, then rename over it.
    ///
    /// Returns `false`, with the staged copy discarded, if cancelled before the rename.
    fn place(&self, source: &Path, dest: &Path) -> io::Result<bool> {
        let mut staged = tempfile::Builder::new()
            .prefix(".shipbin-staged-")
            .tempfile_in(install_dir(dest))?;
        io::copy(&mut File::open(source)?, staged.as_file_mut())?;
        staged.as_file().sync_all()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            staged
                .as_file()
                .set_permissions(fs::Permissions::from_mode(0o755))?;
        }

        if self.is_cancelled() {
            return Ok(false);
        }
        staged.persist(dest).map_err(|e| e.error)?;
        Ok(true)
    }
}
