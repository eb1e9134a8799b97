//! Directory tree copy and move used while staging host data

use crate::error::{Result, TransferError};
use crate::progress::CopyProgress;
use filetime::{set_file_mtime, FileTime};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Statistics for copy operations
#[derive(Debug, Default, Clone)]
pub struct CopyStats {
    pub files_copied: u64,
    pub bytes_copied: u64,
    pub dirs_created: u64,
}

impl CopyStats {
    pub fn add_file(&mut self, bytes: u64) {
        self.files_copied += 1;
        self.bytes_copied += bytes;
    }
}

/// Copy `src` into a new directory `dst`, preserving file mtimes.
///
/// `dst` must not exist yet. Symlinks are copied as the files they point to.
pub fn copy_tree(src: &Path, dst: &Path, progress: &CopyProgress) -> Result<CopyStats> {
    if !src.is_dir() {
        return Err(TransferError::NotFound(src.to_path_buf()));
    }
    if dst.exists() {
        return Err(TransferError::Conflict(format!(
            "copy destination {} already exists",
            dst.display()
        )));
    }

    let mut stats = CopyStats::default();
    for entry in WalkDir::new(src).follow_links(true) {
        let entry = entry?;
        let rel = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dst.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
            stats.dirs_created += 1;
            continue;
        }

        progress.file(entry.path());
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = fs::copy(entry.path(), &target)?;
        let metadata = entry.metadata()?;
        set_file_mtime(&target, FileTime::from_last_modification_time(&metadata))?;
        stats.add_file(bytes);
    }
    progress.finish(stats.files_copied, stats.bytes_copied);
    Ok(stats)
}

/// Move a directory, falling back to copy-then-delete across filesystems.
pub fn move_dir(src: &Path, dst: &Path, progress: &CopyProgress) -> Result<()> {
    if !src.is_dir() {
        return Err(TransferError::NotFound(src.to_path_buf()));
    }
    if dst.exists() {
        return Err(TransferError::Conflict(format!(
            "move destination {} already exists",
            dst.display()
        )));
    }
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    if fs::rename(src, dst).is_ok() {
        return Ok(());
    }
    copy_then_swap(src, dst, progress)
}

/// Hidden sibling of `path` named `.<name>.<suffix>`.
fn hidden_sibling(path: &Path, suffix: &str) -> PathBuf {
    let name = path.file_name().unwrap_or_default().to_string_lossy();
    path.with_file_name(format!(".{name}.{suffix}"))
}

/// Cross-device move. The copy is staged beside `dst` and only renamed into
/// place once complete; `src` is renamed aside before that, so at no point do
/// a complete `src` and a (partial or complete) `dst` both exist.
fn copy_then_swap(src: &Path, dst: &Path, progress: &CopyProgress) -> Result<()> {
    let staging = hidden_sibling(dst, "partial");
    if staging.exists() {
        fs::remove_dir_all(&staging)?;
    }
    copy_tree(src, &staging, progress)?;

    let retired = hidden_sibling(src, "moved");
    if retired.exists() {
        fs::remove_dir_all(&retired)?;
    }
    fs::rename(src, &retired)?;
    if let Err(e) = fs::rename(&staging, dst) {
        // Put the source back so the move can be retried.
        fs::rename(&retired, src)?;
        return Err(TransferError::Io(e));
    }

    if let Err(e) = fs::remove_dir_all(&retired) {
        eprintln!(
            "Warning: moved {} but could not remove {}: {}",
            src.display(),
            retired.display(),
            e
        );
    }
    Ok(())
}
