//! Settings file
//!
//! Loaded from `--config` or `~/.config/stagesync/config.toml`; every field
//! has a default so a missing or partial file works.

use crate::command::CommandTemplate;
use crate::endpoint::RemoteEndpoint;
use crate::error::{Result, TransferError};
use crate::mount::{default_mount_command, default_unmount_command, ShareAddress};
use crate::paths::DEFAULT_MAX_SESSIONS;
use crate::transport::{default_local_command, default_remote_command};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root of the staged session data.
    pub data_root: PathBuf,
    /// Experiment offered for every subject, whose session directory is created on demand.
    pub calibration_experiment: String,
    pub max_sessions: u32,
    pub host_pc: HostPcSettings,
    pub archive: ArchiveSettings,
    pub remote: RemoteSettings,
    pub imaging: UploadTarget,
    pub clinical: UploadTarget,
    pub connectivity: ConnectivitySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data"),
            calibration_experiment: "AmplitudeDetermination".to_string(),
            max_sessions: DEFAULT_MAX_SESSIONS,
            host_pc: HostPcSettings::default(),
            archive: ArchiveSettings::default(),
            remote: RemoteSettings::default(),
            imaging: UploadTarget {
                remote_dir: "imaging".to_string(),
            },
            clinical: UploadTarget {
                remote_dir: "clinical".to_string(),
            },
            connectivity: ConnectivitySettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostPcSettings {
    pub user: String,
    pub addr: String,
    /// Share name on the host.
    pub datadir: String,
    pub mount_command: CommandTemplate,
    pub unmount_command: CommandTemplate,
}

impl Default for HostPcSettings {
    fn default() -> Self {
        Self {
            user: String::new(),
            addr: String::new(),
            datadir: "data".to_string(),
            mount_command: default_mount_command(),
            unmount_command: default_unmount_command(),
        }
    }
}

impl HostPcSettings {
    pub fn share(&self, password: String) -> ShareAddress {
        ShareAddress {
            user: self.user.clone(),
            password,
            addr: self.addr.clone(),
            share: self.datadir.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveSettings {
    pub dir: PathBuf,
    pub lifetime_days: i64,
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("~/transferred"),
            lifetime_days: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    /// Empty means the login name of the current user.
    pub user: String,
    pub hostname: String,
    pub remote_dir: String,
    /// May contain `{user}`.
    pub key: String,
    pub sync_local: CommandTemplate,
    pub sync_remote: CommandTemplate,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            user: String::new(),
            hostname: String::new(),
            remote_dir: "{experiment}/{subject}/session_{session}".to_string(),
            key: "~/.ssh/id_rsa".to_string(),
            sync_local: default_local_command(),
            sync_remote: default_remote_command(),
        }
    }
}

impl RemoteSettings {
    pub fn endpoint(&self) -> RemoteEndpoint {
        let user = if self.user.is_empty() {
            current_user()
        } else {
            self.user.clone()
        };
        let key = expand_tilde(Path::new(&self.key.replace("{user}", &user)))
            .to_string_lossy()
            .into_owned();
        RemoteEndpoint {
            user,
            hostname: self.hostname.clone(),
            remote_dir: self.remote_dir.clone(),
            key,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadTarget {
    pub remote_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivitySettings {
    /// `host:port` reached with a plain TCP connect.
    pub probe: String,
    pub timeout_secs: u64,
}

impl Default for ConnectivitySettings {
    fn default() -> Self {
        Self {
            probe: "httpbin.org:443".to_string(),
            timeout_secs: 5,
        }
    }
}

impl ConnectivitySettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".config").join("stagesync"))
        .unwrap_or_else(|| PathBuf::from(".stagesync"))
}

pub fn default_config_path() -> PathBuf {
    config_dir().join("config.toml")
}

impl Settings {
    /// Load `path`, or the default location when `None`. A missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Settings> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (default_config_path(), false),
        };
        let data = match std::fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
                return Ok(Settings::default())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TransferError::Config(format!(
                    "config file {} does not exist",
                    path.display()
                )))
            }
            Err(e) => return Err(TransferError::Io(e)),
        };
        Self::from_toml(&data)
    }

    pub fn from_toml(data: &str) -> Result<Settings> {
        let settings: Settings = toml::from_str(data)?;
        Ok(settings)
    }

    pub fn archive_dir(&self) -> PathBuf {
        expand_tilde(&self.archive.dir)
    }

    pub fn data_root(&self) -> PathBuf {
        expand_tilde(&self.data_root)
    }
}

/// Replace a leading `~` with the home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let s = Settings::from_toml("").unwrap();
        assert_eq!(s.calibration_experiment, "AmplitudeDetermination");
        assert_eq!(s.max_sessions, 20);
        assert_eq!(s.archive.lifetime_days, 30);
        assert_eq!(s.host_pc.mount_command, default_mount_command());
    }

    #[test]
    fn partial_file_overrides_fields() {
        let s = Settings::from_toml(
            r#"
            data_root = "/srv/data"

            [host_pc]
            user = "tech"
            addr = "10.0.0.5"

            [archive]
            dir = "/srv/transferred"
            lifetime_days = 7

            [remote]
            user = "uploader"
            hostname = "archive.example.org"
            sync_local = ["cp", "-R", "{src}.", "{local_dir}"]
            "#,
        )
        .unwrap();
        assert_eq!(s.data_root(), PathBuf::from("/srv/data"));
        assert_eq!(s.host_pc.datadir, "data");
        assert_eq!(s.archive_dir(), PathBuf::from("/srv/transferred"));
        assert_eq!(s.archive.lifetime_days, 7);
        assert_eq!(
            s.remote.sync_local,
            CommandTemplate::new(["cp", "-R", "{src}.", "{local_dir}"])
        );
        assert_eq!(s.remote.sync_remote, default_remote_command());
        let ep = s.remote.endpoint();
        assert_eq!(ep.user, "uploader");
        assert_eq!(ep.url(), "uploader@archive.example.org:{experiment}/{subject}/session_{session}");
    }

    #[test]
    fn key_template_takes_user() {
        let mut s = Settings::default();
        s.remote.user = "alice".into();
        s.remote.key = "/keys/{user}/id_rsa".into();
        assert_eq!(s.remote.endpoint().key, "/keys/alice/id_rsa");
    }

    #[test]
    fn bad_toml_is_a_config_error() {
        assert!(matches!(
            Settings::from_toml("max_sessions = \"many\""),
            Err(TransferError::Config(_))
        ));
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(Settings::load(Some(&tmp.path().join("nope.toml"))).is_err());
    }
}
