//! Per-session transfer state, read from the filesystem on demand

use crate::error::{Result, TransferError};
use crate::paths::{archive_entry, DataLayout, SessionId};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No `host_pc` directory and no archive entry.
    NotFetched,
    /// `host_pc` is present in the staging directory.
    Fetched,
    /// Synced but not yet archived. Only ever held in memory as a sync receipt.
    Uploaded,
    /// The host data has been moved under the archive root.
    Archived,
}

impl SessionState {
    /// Derive the state of `id` from directory presence. Metadata reads only.
    pub fn inspect(layout: &DataLayout, archive_root: &Path, id: &SessionId) -> Result<Self> {
        let fetched = layout.host_dir(id).is_dir();
        let archived = archive_entry(archive_root, &id.subject, &id.experiment, id.session).exists();
        match (fetched, archived) {
            (false, false) => Ok(SessionState::NotFetched),
            (true, false) => Ok(SessionState::Fetched),
            (false, true) => Ok(SessionState::Archived),
            (true, true) => Err(TransferError::Conflict(format!(
                "{id} has both a host_pc directory and an archive entry"
            ))),
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::NotFetched => "not fetched",
            SessionState::Fetched => "fetched",
            SessionState::Uploaded => "uploaded",
            SessionState::Archived => "archived",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn state_follows_directory_presence() {
        let data = tempfile::tempdir().unwrap();
        let archive = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(data.path());
        let id = SessionId::new("R1111M", "FR1", 0);

        assert_eq!(
            SessionState::inspect(&layout, archive.path(), &id).unwrap(),
            SessionState::NotFetched
        );

        fs::create_dir_all(layout.host_dir(&id)).unwrap();
        assert_eq!(
            SessionState::inspect(&layout, archive.path(), &id).unwrap(),
            SessionState::Fetched
        );

        let entry = archive_entry(archive.path(), "R1111M", "FR1", 0);
        fs::create_dir_all(&entry).unwrap();
        assert!(matches!(
            SessionState::inspect(&layout, archive.path(), &id),
            Err(TransferError::Conflict(_))
        ));

        fs::remove_dir_all(layout.host_dir(&id)).unwrap();
        assert_eq!(
            SessionState::inspect(&layout, archive.path(), &id).unwrap(),
            SessionState::Archived
        );
    }

    #[test]
    fn partial_copy_does_not_count_as_fetched() {
        let data = tempfile::tempdir().unwrap();
        let archive = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(data.path());
        let id = SessionId::new("R1111M", "FR1", 1);
        fs::create_dir_all(layout.partial_host_dir(&id)).unwrap();
        assert_eq!(
            SessionState::inspect(&layout, archive.path(), &id).unwrap(),
            SessionState::NotFetched
        );
    }
}
