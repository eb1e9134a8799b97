//! Host PC password, kept in a per-user file outside the main configuration

use crate::error::{Result, TransferError};
use serde::{Deserialize, Serialize};
use std::io::Write as _;
use std::path::{Path, PathBuf};

pub trait PasswordSource {
    fn host_password(&self) -> Result<String>;
}

/// Fixed password, for tests and non-interactive runs.
pub struct StaticPassword(pub String);

impl PasswordSource for StaticPassword {
    fn host_password(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Asked for a password when none is stored.
pub trait PasswordPrompt {
    fn ask(&self, message: &str) -> Result<String>;
}

impl<F> PasswordPrompt for F
where
    F: Fn(&str) -> Result<String>,
{
    fn ask(&self, message: &str) -> Result<String> {
        self(message)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct UserFile {
    host_pc: Option<HostSecret>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct HostSecret {
    password: Option<String>,
}

/// `~/.stagesync.toml` with a `[host_pc] password` entry.
pub struct CredentialStore<P> {
    path: PathBuf,
    prompt: P,
}

pub fn default_credentials_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".stagesync.toml")
}

impl<P: PasswordPrompt> CredentialStore<P> {
    pub fn new(path: impl Into<PathBuf>, prompt: P) -> Self {
        Self {
            path: path.into(),
            prompt,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stored_password(&self) -> Result<Option<String>> {
        Ok(load(&self.path)?.host_pc.and_then(|h| h.password))
    }

    /// Persist `password`, keeping anything else already in the file.
    pub fn save_password(&self, password: &str) -> Result<()> {
        let mut file = load(&self.path)?;
        file.host_pc
            .get_or_insert_with(HostSecret::default)
            .password = Some(password.to_string());
        save(&self.path, &file)
    }
}

impl<P: PasswordPrompt> PasswordSource for CredentialStore<P> {
    fn host_password(&self) -> Result<String> {
        if let Some(password) = self.stored_password()? {
            return Ok(password);
        }
        let password = self.prompt.ask("Host PC password: ")?;
        self.save_password(&password)?;
        Ok(password)
    }
}

fn load(path: &Path) -> Result<UserFile> {
    match std::fs::read_to_string(path) {
        Ok(data) => Ok(toml::from_str(&data)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(UserFile::default()),
        Err(e) => Err(TransferError::Io(e)),
    }
}

fn save(path: &Path, file: &UserFile) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&dir)?;
    let data = toml::to_string(file)?;
    // atomic write
    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(data.as_bytes())?;
    tmp.flush()?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(tmp.path(), std::fs::Permissions::from_mode(0o600));
    }
    tmp.persist(path).map_err(|e| TransferError::Io(e.error))?;
    Ok(())
}
