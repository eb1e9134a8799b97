use anyhow::Result;
use chrono::Utc;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Audit sink for pipeline outcomes. One call per finished operation.
pub trait Logger: Send + Sync {
    fn completed(&self, _operation: &str) {}
    fn failed(&self, _operation: &str) {}
    fn fault(&self, _operation: &str, _msg: &str) {}
    fn removed(&self, _path: &Path, _age_days: i64) {}
    fn warning(&self, _context: &str, _path: &Path, _msg: &str) {}
}

pub struct NoopLogger;
impl Logger for NoopLogger {}

/// Append-only text log, one timestamped line per record.
pub struct TextLogger {
    file: Mutex<File>,
}

impl TextLogger {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let f = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(f),
        })
    }

    fn line(&self, s: &str) {
        let mut f = self.file.lock();
        let _ = writeln!(f, "[{}] {}", Utc::now().to_rfc3339(), s);
    }
}

impl Logger for TextLogger {
    fn completed(&self, operation: &str) {
        self.line(&format!("{operation} successfully completed"));
    }
    fn failed(&self, operation: &str) {
        self.line(&format!("{operation} failed!"));
    }
    fn fault(&self, operation: &str, msg: &str) {
        self.line(&format!("Uncaught exception from {operation}: {msg}"));
    }
    fn removed(&self, path: &Path, age_days: i64) {
        self.line(&format!(
            "Removing {} since it is {} days old",
            path.display(),
            age_days
        ));
    }
    fn warning(&self, context: &str, path: &Path, msg: &str) {
        self.line(&format!(
            "WARNING ctx={} path={} msg={}",
            context,
            path.display(),
            msg
        ));
    }
}

/// Whether a returned value counts as a successful operation.
pub trait Outcome {
    fn succeeded(&self) -> bool;
}

impl Outcome for bool {
    fn succeeded(&self) -> bool {
        *self
    }
}

impl Outcome for () {
    fn succeeded(&self) -> bool {
        true
    }
}

impl<T> Outcome for Option<T> {
    fn succeeded(&self) -> bool {
        self.is_some()
    }
}

/// Run `f` and write its outcome to `logger` before returning it.
///
/// Exactly one record per call: completed, failed, or fault (for `Err`).
/// The error is passed through untouched.
pub fn record<T, E, F>(logger: &dyn Logger, operation: &str, f: F) -> std::result::Result<T, E>
where
    T: Outcome,
    E: std::fmt::Display,
    F: FnOnce() -> std::result::Result<T, E>,
{
    let result = f();
    match &result {
        Ok(v) if v.succeeded() => logger.completed(operation),
        Ok(_) => logger.failed(operation),
        Err(e) => logger.fault(operation, &e.to_string()),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Lines(Mutex<Vec<String>>);

    impl Logger for Lines {
        fn completed(&self, operation: &str) {
            self.0.lock().push(format!("ok {operation}"));
        }
        fn failed(&self, operation: &str) {
            self.0.lock().push(format!("failed {operation}"));
        }
        fn fault(&self, operation: &str, msg: &str) {
            self.0.lock().push(format!("fault {operation} {msg}"));
        }
    }

    #[test]
    fn record_writes_exactly_one_line_per_outcome() {
        let log = Lines::default();
        let ok: Result<bool, String> = record(&log, "sync", || Ok(true));
        assert!(ok.unwrap());
        let failed: Result<bool, String> = record(&log, "sync", || Ok(false));
        assert!(!failed.unwrap());
        let fault: Result<(), String> = record(&log, "archive", || Err("disk full".into()));
        assert_eq!(fault.unwrap_err(), "disk full");
        assert_eq!(
            *log.0.lock(),
            vec!["ok sync", "failed sync", "fault archive disk full"]
        );
    }

    #[test]
    fn text_logger_appends_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/upload.log");
        let logger = TextLogger::new(&path).unwrap();
        logger.completed("sync");
        logger.failed("archive");
        logger.fault("fetch_host_data", "path not found: /x");

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("sync successfully completed"));
        assert!(lines[1].ends_with("archive failed!"));
        assert!(lines[2].contains("Uncaught exception from fetch_host_data"));
    }

    #[test]
    fn text_logger_reopens_in_append_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.log");
        TextLogger::new(&path).unwrap().completed("first");
        TextLogger::new(&path).unwrap().completed("second");
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
    }
}
