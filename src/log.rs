//! JSON-lines audit log, readable back for reconciliation

use crate::logger::Logger;
use anyhow::{Context, Result};
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    Completed,
    Failed,
    Fault,
    Removed,
    Warning,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AuditEntry {
    pub timestamp: String,
    pub run_id: String,
    pub host: String,
    pub operation: String,
    pub status: OutcomeStatus,
    pub path: Option<PathBuf>,
    pub detail: Option<String>,
}

pub struct JsonLogger {
    log_file_path: PathBuf,
    run_id: String,
    host: String,
    file: Mutex<File>,
}

impl JsonLogger {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let log_file_path = path.as_ref().to_path_buf();
        if let Some(parent) = log_file_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file_path)
            .context("Failed to open audit log file")?;
        let host = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            log_file_path,
            run_id: uuid::Uuid::new_v4().to_string(),
            host,
            file: Mutex::new(file),
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    fn add_entry(
        &self,
        operation: &str,
        status: OutcomeStatus,
        path: Option<&Path>,
        detail: Option<String>,
    ) -> Result<()> {
        let entry = AuditEntry {
            timestamp: Utc::now().to_rfc3339(),
            run_id: self.run_id.clone(),
            host: self.host.clone(),
            operation: operation.to_string(),
            status,
            path: path.map(Path::to_path_buf),
            detail,
        };
        let mut file = self.file.lock();
        let mut writer = BufWriter::new(&mut *file);
        serde_json::to_writer(&mut writer, &entry)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    pub fn read_log(&self) -> Result<Vec<AuditEntry>> {
        read_log(&self.log_file_path)
    }
}

pub fn read_log(path: &Path) -> Result<Vec<AuditEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(path).context("Failed to open audit log file for reading")?;
    let reader = BufReader::new(file);
    let mut entries = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let entry: AuditEntry = serde_json::from_str(&line)?;
        entries.push(entry);
    }
    Ok(entries)
}

impl Logger for JsonLogger {
    fn completed(&self, operation: &str) {
        let _ = self.add_entry(operation, OutcomeStatus::Completed, None, None);
    }
    fn failed(&self, operation: &str) {
        let _ = self.add_entry(operation, OutcomeStatus::Failed, None, None);
    }
    fn fault(&self, operation: &str, msg: &str) {
        let _ = self.add_entry(operation, OutcomeStatus::Fault, None, Some(msg.to_string()));
    }
    fn removed(&self, path: &Path, age_days: i64) {
        let _ = self.add_entry(
            "sweep",
            OutcomeStatus::Removed,
            Some(path),
            Some(format!("{age_days} days old")),
        );
    }
    fn warning(&self, context: &str, path: &Path, msg: &str) {
        let _ = self.add_entry(context, OutcomeStatus::Warning, Some(path), Some(msg.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_round_trip_through_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let logger = JsonLogger::new(dir.path().join("audit.jsonl")).unwrap();
        logger.completed("fetch_host_data");
        logger.fault("sync", "transfer command `rsync` failed: exit status: 23");
        logger.removed(Path::new("/archive/R1111M"), 45);

        let entries = logger.read_log().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].operation, "fetch_host_data");
        assert_eq!(entries[0].status, OutcomeStatus::Completed);
        assert_eq!(entries[1].status, OutcomeStatus::Fault);
        assert!(entries[1].detail.as_deref().unwrap().contains("rsync"));
        assert_eq!(entries[2].path.as_deref(), Some(Path::new("/archive/R1111M")));
        assert!(entries.iter().all(|e| e.run_id == logger.run_id()));
    }

    #[test]
    fn missing_log_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_log(&dir.path().join("none.jsonl")).unwrap().is_empty());
    }
}
