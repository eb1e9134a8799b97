//! Synchronisation through an external tool (rsync by default)

use crate::command::{display_command, execute, CommandTemplate, Vars};
use crate::endpoint::RemoteEndpoint;
use crate::error::{Result, TransferError};
use crate::logger::{record, Logger};
use std::path::{Path, MAIN_SEPARATOR};
use std::sync::Arc;

pub trait Transport {
    /// Copy the contents of `source` to `destination`.
    fn sync(&self, source: &Path, destination: &str) -> Result<bool>;
}

pub fn default_local_command() -> CommandTemplate {
    CommandTemplate::new(["rsync", "-a", "{src}", "{local_dir}"])
}

pub fn default_remote_command() -> CommandTemplate {
    CommandTemplate::new([
        "rsync",
        "-az",
        "-e",
        "ssh -i {key}",
        "{src}",
        "{user}@{hostname}:{remote_dir}",
    ])
}

/// `source` with exactly one trailing separator, so the tool copies the
/// directory's contents rather than nesting the directory itself.
pub fn normalize_source(source: &Path) -> String {
    let s = source.to_string_lossy();
    let trimmed = s.trim_end_matches(|c: char| c == '/' || c == MAIN_SEPARATOR);
    format!("{trimmed}{MAIN_SEPARATOR}")
}

pub struct SyncTransport {
    pub endpoint: RemoteEndpoint,
    pub local_command: CommandTemplate,
    pub remote_command: CommandTemplate,
    logger: Arc<dyn Logger>,
}

impl SyncTransport {
    pub fn new(endpoint: RemoteEndpoint, logger: Arc<dyn Logger>) -> Self {
        Self {
            endpoint,
            local_command: default_local_command(),
            remote_command: default_remote_command(),
            logger,
        }
    }

    pub fn with_commands(mut self, local: CommandTemplate, remote: CommandTemplate) -> Self {
        self.local_command = local;
        self.remote_command = remote;
        self
    }

    fn run(&self, source: &Path, destination: &str) -> Result<bool> {
        if !source.exists() {
            return Err(TransferError::NotFound(source.to_path_buf()));
        }

        let mut vars = Vars::new();
        vars.insert("src", normalize_source(source));
        vars.insert("dest", destination.to_string());
        vars.insert("user", self.endpoint.user.clone());
        vars.insert("hostname", self.endpoint.hostname.clone());
        vars.insert("remote_dir", self.endpoint.remote_dir.clone());
        vars.insert("key", self.endpoint.key.clone());

        // An existing local destination means a local "upload" (testing, dry runs).
        let template = if Path::new(destination).exists() {
            vars.insert("local_dir", destination.to_string());
            &self.local_command
        } else {
            &self.remote_command
        };

        let argv = template.render(&vars)?;
        println!("{}", display_command(&argv, None));
        let status = execute(&argv)?;
        if !status.success() {
            return Err(TransferError::TransferFailure {
                command: display_command(&argv, None),
                status: status.to_string(),
            });
        }
        Ok(true)
    }
}

impl Transport for SyncTransport {
    fn sync(&self, source: &Path, destination: &str) -> Result<bool> {
        record(&*self.logger, "sync", || self.run(source, destination))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::NoopLogger;

    fn endpoint() -> RemoteEndpoint {
        RemoteEndpoint {
            user: "tech".into(),
            hostname: "archive.invalid".into(),
            remote_dir: "/incoming".into(),
            key: "/nonexistent/id_rsa".into(),
        }
    }

    #[test]
    fn normalize_appends_exactly_one_separator() {
        let sep = MAIN_SEPARATOR.to_string();
        assert_eq!(normalize_source(Path::new("/data/s0")), format!("/data/s0{sep}"));
        assert_eq!(normalize_source(Path::new("/data/s0/")), format!("/data/s0{sep}"));
        assert_eq!(normalize_source(Path::new("/data/s0//")), format!("/data/s0{sep}"));
        assert!(!normalize_source(Path::new("rel/dir")).ends_with(&format!("{sep}{sep}")));
    }

    #[test]
    fn missing_source_is_not_found() {
        let t = SyncTransport::new(endpoint(), Arc::new(NoopLogger));
        let err = t.sync(Path::new("/definitely/not/here"), "/tmp").unwrap_err();
        assert!(matches!(err, TransferError::NotFound(_)));
    }

    #[cfg(unix)]
    #[test]
    fn picks_local_template_for_existing_destination() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let t = SyncTransport::new(endpoint(), Arc::new(NoopLogger)).with_commands(
            CommandTemplate::new(["true", "{src}", "{local_dir}"]),
            CommandTemplate::new(["false"]),
        );
        assert!(t.sync(src.path(), &dest.path().to_string_lossy()).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_is_a_transfer_failure() {
        let src = tempfile::tempdir().unwrap();
        let t = SyncTransport::new(endpoint(), Arc::new(NoopLogger)).with_commands(
            CommandTemplate::new(["true"]),
            CommandTemplate::new(["false", "{src}", "{user}@{hostname}:{remote_dir}"]),
        );
        let err = t.sync(src.path(), &endpoint().url()).unwrap_err();
        assert!(matches!(err, TransferError::TransferFailure { .. }));
    }
}
