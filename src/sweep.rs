//! Age-based purge of the archive directory
//!
//! Each top-level entry of the archive root (one per subject) is aged by its
//! modification time. Entries strictly older than the lifetime, in whole
//! days, are deleted recursively. Nothing is transactional: an interrupted
//! sweep leaves a mix, and the next sweep finishes the job.

use crate::error::Result;
use crate::logger::Logger;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Clone)]
pub struct SweepReport {
    pub removed: Vec<(PathBuf, i64)>,
    pub kept: Vec<PathBuf>,
}

pub struct RetentionSweeper<'a> {
    archive_root: PathBuf,
    lifetime_days: i64,
    logger: &'a dyn Logger,
}

impl<'a> RetentionSweeper<'a> {
    pub fn new(archive_root: impl Into<PathBuf>, lifetime_days: i64, logger: &'a dyn Logger) -> Self {
        Self {
            archive_root: archive_root.into(),
            lifetime_days,
            logger,
        }
    }

    pub fn sweep(&self) -> Result<SweepReport> {
        self.sweep_at(Utc::now())
    }

    /// Sweep as if the current time were `now`.
    pub fn sweep_at(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let mut report = SweepReport::default();
        if !self.archive_root.is_dir() {
            return Ok(report);
        }

        for entry in fs::read_dir(&self.archive_root)? {
            let entry = entry?;
            let path = entry.path();
            let modified: DateTime<Utc> = fs::symlink_metadata(&path)?.modified()?.into();
            let age_days = (now - modified).num_days();

            if age_days > self.lifetime_days {
                println!("Removing {} since it is {} days old", path.display(), age_days);
                remove_entry(&path)?;
                self.logger.removed(&path, age_days);
                report.removed.push((path, age_days));
            } else {
                report.kept.push(path);
            }
        }
        Ok(report)
    }
}

fn remove_entry(path: &Path) -> Result<()> {
    let file_type = fs::symlink_metadata(path)?.file_type();
    if file_type.is_dir() {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }
    Ok(())
}

/// Convenience wrapper over [`RetentionSweeper`].
pub fn sweep(archive_root: &Path, lifetime_days: i64, logger: &dyn Logger) -> Result<SweepReport> {
    RetentionSweeper::new(archive_root, lifetime_days, logger).sweep()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::NoopLogger;
    use filetime::{set_file_mtime, FileTime};
    use std::time::{Duration, SystemTime};

    fn aged_dir(root: &Path, name: &str, days: u64, now: SystemTime) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir_all(dir.join("FR1/session_0")).unwrap();
        fs::write(dir.join("FR1/session_0/eeg.edf"), b"x").unwrap();
        let mtime = now - Duration::from_secs(days * 86_400);
        set_file_mtime(&dir, FileTime::from_system_time(mtime)).unwrap();
        dir
    }

    #[test]
    fn missing_archive_is_a_no_op() {
        let tmp = tempfile::tempdir().unwrap();
        let report = sweep(&tmp.path().join("nope"), 7, &NoopLogger).unwrap();
        assert!(report.removed.is_empty() && report.kept.is_empty());
    }

    #[test]
    fn removes_plain_files_too() {
        let tmp = tempfile::tempdir().unwrap();
        let now = SystemTime::now();
        let file = tmp.path().join("stray.txt");
        fs::write(&file, b"x").unwrap();
        set_file_mtime(&file, FileTime::from_system_time(now - Duration::from_secs(10 * 86_400)))
            .unwrap();
        let report = RetentionSweeper::new(tmp.path(), 3, &NoopLogger)
            .sweep_at(now.into())
            .unwrap();
        assert_eq!(report.removed.len(), 1);
        assert!(!file.exists());
    }

    #[test]
    fn age_is_measured_in_whole_days() {
        let tmp = tempfile::tempdir().unwrap();
        let now = SystemTime::now();
        let almost = aged_dir(tmp.path(), "R1", 0, now);
        let mtime = now - Duration::from_secs(5 * 86_400 - 60);
        set_file_mtime(&almost, FileTime::from_system_time(mtime)).unwrap();
        let report = RetentionSweeper::new(tmp.path(), 4, &NoopLogger)
            .sweep_at(now.into())
            .unwrap();
        // 4 days 23h59m old: age 4, not strictly above 4.
        assert!(report.removed.is_empty());
        assert!(almost.exists());
    }
}
