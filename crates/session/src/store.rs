use std::{
    path::{Path, PathBuf},
    sync::RwLock,
};

use {
    serde::{Deserialize, Serialize},
    tracing::{debug, warn},
};

use banter_client::UserIdentity;

/// The credential/identity pair that constitutes an active session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: UserIdentity,
}

/// Owns the current session and persists it across restarts.
///
/// Durable storage is a single JSON document at `<state_dir>/session.json`
/// holding exactly the credential string and the serialized identity.
/// `set` and `clear` rewrite or remove the whole document under the write
/// lock, so the two fields are never observable half-updated.
#[derive(Debug)]
pub struct SessionStore {
    path: PathBuf,
    current: RwLock<Option<Session>>,
}

impl SessionStore {
    /// Store backed by `<state_dir>/session.json`.
    pub fn open(state_dir: &Path) -> Self {
        Self::with_path(state_dir.join("session.json"))
    }

    /// Store at a specific file path (useful for testing).
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path,
            current: RwLock::new(None),
        }
    }

    /// Restore a previously persisted session from disk. Runs once at
    /// startup. A missing or malformed file restores nothing — malformed
    /// persisted data is treated as absent, never as a failure.
    pub fn load(&self) {
        let restored = std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|data| serde_json::from_str::<Session>(&data).ok());

        if let Some(session) = &restored {
            debug!(username = %session.user.username, "restored persisted session");
        }
        if let Ok(mut guard) = self.current.write() {
            *guard = restored;
        }
    }

    /// Atomically install credential and identity, in memory and on disk.
    pub fn set(&self, token: String, user: UserIdentity) {
        let session = Session { token, user };
        if let Ok(mut guard) = self.current.write() {
            self.persist(&session);
            *guard = Some(session);
        }
    }

    /// Atomically remove credential and identity, in memory and on disk.
    pub fn clear(&self) {
        if let Ok(mut guard) = self.current.write() {
            *guard = None;
            match std::fs::remove_file(&self.path) {
                Ok(()) => {},
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
                Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove persisted session"),
            }
        }
    }

    /// Replace the stored identity without touching the credential.
    /// No-op when no session is active.
    pub fn update_identity(&self, user: UserIdentity) {
        if let Ok(mut guard) = self.current.write() {
            if let Some(session) = guard.as_mut() {
                session.user = user;
                let snapshot = session.clone();
                self.persist(&snapshot);
            }
        }
    }

    /// True iff a credential is currently set.
    pub fn is_authenticated(&self) -> bool {
        self.current.read().map(|g| g.is_some()).unwrap_or(false)
    }

    pub fn token(&self) -> Option<String> {
        self.current
            .read()
            .ok()
            .and_then(|g| g.as_ref().map(|s| s.token.clone()))
    }

    pub fn identity(&self) -> Option<UserIdentity> {
        self.current
            .read()
            .ok()
            .and_then(|g| g.as_ref().map(|s| s.user.clone()))
    }

    pub fn session(&self) -> Option<Session> {
        self.current.read().ok().and_then(|g| g.clone())
    }

    /// Write the session document. In-memory state stays authoritative —
    /// a persistence failure is logged, not surfaced.
    fn persist(&self, session: &Session) {
        let write = || -> std::io::Result<()> {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let data = serde_json::to_string_pretty(session)?;
            std::fs::write(&self.path, data)?;

            // Set file permissions to 0600 on Unix
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
            }
            Ok(())
        };
        if let Err(e) = write() {
            warn!(path = %self.path.display(), error = %e, "failed to persist session");
        }
    }
}
