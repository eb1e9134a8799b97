//! Session directory conventions and discovery of staged data
//!
//! Layout under a data root:
//! `root/<experiment>/<subject>/session_<n>/` with fetched host data in
//! `session_<n>/host_pc/`. The archive root holds
//! `archive/<subject>/<experiment>/session_<n>/`.

use crate::error::{Result, TransferError};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Directory holding data fetched from the host PC.
pub const HOST_DIR_NAME: &str = "host_pc";

/// In-flight copy of the host data; renamed to `host_pc` once complete.
pub const PARTIAL_HOST_DIR_NAME: &str = ".host_pc.partial";

/// Sessions probed by `available_sessions` when no limit is configured.
pub const DEFAULT_MAX_SESSIONS: u32 = 20;

/// Files whose presence marks a usable session.
const SESSION_LOG_PATTERN: &str = "*.*log";

/// Identity of one transferable unit of data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId {
    pub subject: String,
    pub experiment: String,
    pub session: u32,
}

impl SessionId {
    pub fn new(subject: impl Into<String>, experiment: impl Into<String>, session: u32) -> Self {
        Self {
            subject: subject.into(),
            experiment: experiment.into(),
            session,
        }
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/session_{}", self.subject, self.experiment, self.session)
    }
}

fn session_dir_name(session: u32) -> String {
    format!("session_{session}")
}

/// `root/experiment/subject/session_<n>`. No I/O.
pub fn session_directory(root: &Path, experiment: &str, subject: &str, session: u32) -> PathBuf {
    root.join(experiment)
        .join(subject)
        .join(session_dir_name(session))
}

/// Session directory as seen on the mounted host share.
///
/// The host numbers sessions from 1 while the task laptop numbers them from
/// 0, so local session N lives in `session_<N+1>` on the host. Nothing
/// checks that the two sides agree; a mismatch here copies the wrong session.
pub fn host_session_directory(
    mount_point: &Path,
    subject: &str,
    experiment: &str,
    session: u32,
) -> PathBuf {
    mount_point
        .join(subject)
        .join(experiment)
        .join(session_dir_name(session + 1))
}

/// `archive_root/subject/experiment/session_<n>`. No I/O.
pub fn archive_entry(archive_root: &Path, subject: &str, experiment: &str, session: u32) -> PathBuf {
    archive_root
        .join(subject)
        .join(experiment)
        .join(session_dir_name(session))
}

/// Data root plus the derived locations for one session.
#[derive(Debug, Clone)]
pub struct DataLayout {
    pub root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn session_dir(&self, id: &SessionId) -> PathBuf {
        session_directory(&self.root, &id.experiment, &id.subject, id.session)
    }

    pub fn host_dir(&self, id: &SessionId) -> PathBuf {
        self.session_dir(id).join(HOST_DIR_NAME)
    }

    pub fn partial_host_dir(&self, id: &SessionId) -> PathBuf {
        self.session_dir(id).join(PARTIAL_HOST_DIR_NAME)
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

fn require_root(root: &Path) -> Result<()> {
    if !root.is_dir() {
        return Err(TransferError::NotFound(root.to_path_buf()));
    }
    Ok(())
}

fn visible_subdirs(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_hidden(&name) || !entry.file_type()?.is_dir() {
            continue;
        }
        names.push(name);
    }
    Ok(names)
}

/// Map each subject found under `root` to the experiments it has data for.
pub fn discover(root: &Path) -> Result<BTreeMap<String, BTreeSet<String>>> {
    require_root(root)?;
    let mut subjects: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for experiment in visible_subdirs(root)? {
        for subject in visible_subdirs(&root.join(&experiment))? {
            subjects
                .entry(subject)
                .or_default()
                .insert(experiment.clone());
        }
    }
    Ok(subjects)
}

/// Experiments to offer for a subject; the calibration experiment is always included.
pub fn experiments_for(
    discovered: &BTreeMap<String, BTreeSet<String>>,
    subject: &str,
    calibration: &str,
) -> BTreeSet<String> {
    let mut experiments = discovered.get(subject).cloned().unwrap_or_default();
    experiments.insert(calibration.to_string());
    experiments
}

/// Session indices in `0..max_index` with at least one session log on disk.
pub fn available_sessions(
    subject: &str,
    experiment: &str,
    root: &Path,
    max_index: u32,
) -> Result<Vec<u32>> {
    require_root(root)?;
    let mut sessions = Vec::new();
    for session in 0..max_index {
        let dir = session_directory(root, experiment, subject, session);
        if has_session_log(&dir) {
            sessions.push(session);
        }
    }
    Ok(sessions)
}

fn has_session_log(dir: &Path) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };
    entries.filter_map(|e| e.ok()).any(|entry| {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        !is_hidden(&name) && glob_match(SESSION_LOG_PATTERN, &name)
    })
}

/// Wildcard match supporting `*` and `?`.
fn glob_match(pattern: &str, text: &str) -> bool {
    let p = pattern.as_bytes();
    let s = text.as_bytes();
    let (mut pi, mut si) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;
    while si < s.len() {
        if pi < p.len() && (p[pi] == b'?' || p[pi] == s[si]) {
            pi += 1;
            si += 1;
        } else if pi < p.len() && p[pi] == b'*' {
            star = Some((pi, si));
            pi += 1;
        } else if let Some((star_pi, star_si)) = star {
            pi = star_pi + 1;
            si = star_si + 1;
            star = Some((star_pi, star_si + 1));
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == b'*' {
        pi += 1;
    }
    pi == p.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn session_directory_follows_convention() {
        let p = session_directory(Path::new("/data"), "FR1", "R1111M", 3);
        assert_eq!(p, PathBuf::from("/data/FR1/R1111M/session_3"));
        assert_eq!(p, session_directory(Path::new("/data"), "FR1", "R1111M", 3));
    }

    #[test]
    fn host_sessions_are_offset_by_one() {
        let p = host_session_directory(Path::new("/mnt"), "R1111M", "FR1", 0);
        assert_eq!(p, PathBuf::from("/mnt/R1111M/FR1/session_1"));
    }

    #[test]
    fn archive_entry_is_keyed_by_subject_first() {
        let p = archive_entry(Path::new("/arch"), "R1111M", "FR1", 2);
        assert_eq!(p, PathBuf::from("/arch/R1111M/FR1/session_2"));
    }

    #[test]
    fn glob_matches_session_logs() {
        assert!(glob_match("*.*log", "session.log"));
        assert!(glob_match("*.*log", "events.jsonlog"));
        assert!(glob_match("*.*log", ".log"));
        assert!(!glob_match("*.*log", "sessionlog"));
        assert!(!glob_match("*.*log", "session.log.bak"));
        assert!(glob_match("a?c", "abc"));
    }

    #[test]
    fn discover_skips_hidden_and_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("FR1/R1111M")).unwrap();
        fs::create_dir_all(root.join("FR1/R2222J")).unwrap();
        fs::create_dir_all(root.join("catFR1/R1111M")).unwrap();
        fs::create_dir_all(root.join(".git/objects")).unwrap();
        fs::create_dir_all(root.join("FR1/.DS_Store_dir")).unwrap();
        touch(&root.join("README.txt"));

        let found = discover(root).unwrap();
        assert_eq!(found.len(), 2);
        let r1: Vec<_> = found["R1111M"].iter().cloned().collect();
        assert_eq!(r1, vec!["FR1".to_string(), "catFR1".to_string()]);
        assert!(found["R2222J"].contains("FR1"));
    }

    #[test]
    fn discover_empty_and_missing_roots() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover(dir.path()).unwrap().is_empty());
        let err = discover(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, TransferError::NotFound(_)));
    }

    #[test]
    fn available_sessions_requires_a_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&session_directory(root, "FR1", "R1111M", 0).join("session.log"));
        touch(&session_directory(root, "FR1", "R1111M", 2).join("eeg.jsonlog"));
        touch(&session_directory(root, "FR1", "R1111M", 3).join("notes.txt"));
        touch(&session_directory(root, "FR1", "R1111M", 25).join("session.log"));

        let sessions = available_sessions("R1111M", "FR1", root, DEFAULT_MAX_SESSIONS).unwrap();
        assert_eq!(sessions, vec![0, 2]);
    }

    #[test]
    fn experiments_for_injects_calibration() {
        let mut discovered = BTreeMap::new();
        discovered.insert(
            "R1111M".to_string(),
            BTreeSet::from(["FR1".to_string()]),
        );
        let exps = experiments_for(&discovered, "R1111M", "AmplitudeDetermination");
        assert!(exps.contains("FR1"));
        assert!(exps.contains("AmplitudeDetermination"));
        let none = experiments_for(&discovered, "R9999X", "AmplitudeDetermination");
        assert_eq!(none.len(), 1);
    }
}
