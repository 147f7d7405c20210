//! Archive extraction module
//!
//! Release archives are gzip-compressed tarballs.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid path in archive: {}", .0.display())]
    UnsafePath(PathBuf),
}

/// Extraction workspace, removed recursively when dropped.
#[derive(Debug)]
pub struct ScratchDir(Option<TempDir>);

impl ScratchDir {
    /// Create a fresh, uniquely named directory inside `parent`.
    pub fn new_in(parent: &Path) -> io::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(".shipbin-extract-")
            .tempdir_in(parent)?;
        Ok(Self(Some(dir)))
    }

    pub fn path(&self) -> &Path {
        self.0.as_ref().map_or(Path::new(""), TempDir::path)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Some(dir) = self.0.take() {
            let shown = dir.path().display().to_string();
            match dir.close() {
                Ok(()) => debug!("Removed {shown}"),
                Err(e) => warn!("Could not clean up temporary directory {shown}: {e}"),
            }
        }
    }
}

/// Extract a tar.gz archive to a destination directory.
///
/// Symlink and hardlink entries are skipped. Returns the relative paths of
/// the files written.
pub fn extract_tar_gz(archive_path: &Path, dest_dir: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    let file = File::open(archive_path)?;
    let reader = BufReader::new(file);
    let gz_decoder = flate2::read::GzDecoder::new(reader);

    extract_tar(gz_decoder, dest_dir)
}

/// Extract a tar archive from a reader
fn extract_tar<R: Read>(reader: R, dest_dir: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    fs::create_dir_all(dest_dir)?;

    let mut archive = tar::Archive::new(reader);
    let mut extracted = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let relative_path: PathBuf = entry.path()?.components().collect();

        // Sanitize path to prevent Zip Slip
        if relative_path
            .components()
            .any(|c| !matches!(c, std::path::Component::Normal(_) | std::path::Component::CurDir))
        {
            return Err(ExtractError::UnsafePath(relative_path));
        }

        let kind = entry.header().entry_type();
        if kind.is_symlink() || kind.is_hard_link() {
            warn!("Skipping link entry in archive: {}", relative_path.display());
            continue;
        }

        if kind.is_dir() {
            fs::create_dir_all(dest_dir.join(&relative_path))?;
            continue;
        }

        // unpack_in refuses to write through anything that resolves outside dest_dir
        if !entry.unpack_in(dest_dir)? {
            return Err(ExtractError::UnsafePath(relative_path));
        }
        extracted.push(relative_path);
    }

    Ok(extracted)
}

/// Indented listing of everything under `root`, directories suffixed with `/`.
pub fn list_tree(root: &Path) -> Vec<String> {
    WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .map(|entry| {
            let indent = "  ".repeat(entry.depth() - 1);
            let name = entry.file_name().to_string_lossy();
            if entry.file_type().is_dir() {
                format!("{indent}{name}/")
            } else {
                format!("{indent}{name}")
            }
        })
        .collect()
}
