//! Remote archive endpoint (`user@host:dir`)

use crate::paths::SessionId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEndpoint {
    pub user: String,
    pub hostname: String,
    pub remote_dir: String,
    /// SSH private key handed to the remote sync template.
    pub key: String,
}

impl RemoteEndpoint {
    /// Fill `{subject}`, `{experiment}` and `{session}` in the remote directory.
    pub fn for_session(&self, id: &SessionId) -> RemoteEndpoint {
        let remote_dir = self
            .remote_dir
            .replace("{subject}", &id.subject)
            .replace("{experiment}", &id.experiment)
            .replace("{session}", &id.session.to_string());
        RemoteEndpoint {
            remote_dir,
            ..self.clone()
        }
    }

    pub fn with_remote_dir(&self, remote_dir: &str) -> RemoteEndpoint {
        RemoteEndpoint {
            remote_dir: remote_dir.to_string(),
            ..self.clone()
        }
    }

    /// `user@hostname:remote_dir`
    pub fn url(&self) -> String {
        format!("{}@{}:{}", self.user, self.hostname, self.remote_dir)
    }
}

/// Parse `user@host:dir`. Returns `None` for anything that looks like a local path.
pub fn parse_remote_url(s: &str, key: &str) -> Option<RemoteEndpoint> {
    let s = s.trim();
    let (user, rest) = s.split_once('@')?;
    let (hostname, remote_dir) = rest.split_once(':')?;
    if user.is_empty() || hostname.is_empty() || user.contains('/') || hostname.contains('/') {
        return None;
    }
    Some(RemoteEndpoint {
        user: user.to_string(),
        hostname: hostname.to_string(),
        remote_dir: if remote_dir.is_empty() {
            ".".to_string()
        } else {
            remote_dir.to_string()
        },
        key: key.to_string(),
    })
}
