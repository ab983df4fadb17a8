//! Explicit session context.
//!
//! The session holds the bearer token, the stable anonymous user id and the
//! selected project's name. It is loaded once at start-up from a
//! [`SessionStore`], injected into [`crate::PlatformClient`], and written back
//! whenever it changes.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use epsimo_core::AnonymousUserId;

use crate::claims::{ClaimsError, TokenClaims};

/// Errors raised while loading or persisting the session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Reading or writing the session file failed.
    #[error("session file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The session file exists but is not valid JSON.
    #[error("session file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// No home/config directory could be determined.
    #[error("no configuration directory available")]
    NoConfigDir,
}

/// Persisted session data.
#[derive(Clone, Serialize, Deserialize)]
pub struct SessionState {
    /// Bearer token, present while logged in.
    #[serde(default)]
    pub token: Option<String>,
    /// Stable anonymous id, generated on first use.
    #[serde(default = "AnonymousUserId::generate")]
    pub user_id: AnonymousUserId,
    /// Name of the selected project.
    #[serde(default)]
    pub project_name: Option<String>,
}

impl SessionState {
    /// A logged-out state with a fresh anonymous id.
    #[must_use]
    pub fn fresh() -> Self {
        Self {
            token: None,
            user_id: AnonymousUserId::generate(),
            project_name: None,
        }
    }
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionState")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("user_id", &self.user_id)
            .field("project_name", &self.project_name)
            .finish()
    }
}

/// File-backed persistence for [`SessionState`].
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// Store the session at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store the session in the platform configuration directory.
    ///
    /// # Errors
    ///
    /// Returns an error if no home directory can be determined.
    pub fn in_config_dir() -> Result<Self, SessionError> {
        let dirs = directories::ProjectDirs::from("ai", "Epsimo", "epsimo")
            .ok_or(SessionError::NoConfigDir)?;
        Ok(Self::new(dirs.config_dir().join("session.json")))
    }

    /// Location of the session file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the session, creating and saving a fresh one if none exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the fresh
    /// session cannot be written.
    pub fn load(&self) -> Result<SessionState, SessionError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let state = SessionState::fresh();
                tracing::debug!(path = %self.path.display(), "Creating new session file");
                self.save(&state)?;
                Ok(state)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write the session to disk, replacing any previous content.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save(&self, state: &SessionState) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(state)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Shared handle to the current session.
///
/// Cloning is cheap; all clones observe the same state.
#[derive(Debug, Clone)]
pub struct SessionContext {
    state: Arc<RwLock<SessionState>>,
    store: Option<SessionStore>,
}

impl SessionContext {
    /// Load the session from `store`; later changes are written back to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored session cannot be loaded.
    pub fn open(store: SessionStore) -> Result<Self, SessionError> {
        let state = store.load()?;
        Ok(Self {
            state: Arc::new(RwLock::new(state)),
            store: Some(store),
        })
    }

    /// A session that lives only in memory.
    #[must_use]
    pub fn in_memory(state: SessionState) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
            store: None,
        }
    }

    /// Current bearer token.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.state.read().token.clone()
    }

    /// Whether a token is present.
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.state.read().token.is_some()
    }

    /// Stable anonymous user id.
    #[must_use]
    pub fn user_id(&self) -> AnonymousUserId {
        self.state.read().user_id
    }

    /// Name of the selected project, if any.
    #[must_use]
    pub fn project_name(&self) -> Option<String> {
        self.state.read().project_name.clone()
    }

    /// Decode the claims of the current token.
    ///
    /// Returns `None` when logged out.
    #[must_use]
    pub fn claims(&self) -> Option<Result<TokenClaims, ClaimsError>> {
        self.token().map(|t| TokenClaims::decode(&t))
    }

    /// Replace the token (after login or OAuth callback).
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be persisted; the in-memory
    /// session is updated regardless.
    pub fn set_token(&self, token: impl Into<String>) -> Result<(), SessionError> {
        self.update(|state| state.token = Some(token.into()))
    }

    /// Switch to a project-scoped token and remember the project's name.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be persisted.
    pub fn set_project(
        &self,
        token: impl Into<String>,
        project_name: impl Into<String>,
    ) -> Result<(), SessionError> {
        self.update(|state| {
            state.token = Some(token.into());
            state.project_name = Some(project_name.into());
        })
    }

    /// Clear the token and project hint. The anonymous id is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be persisted.
    pub fn logout(&self) -> Result<(), SessionError> {
        self.update(|state| {
            state.token = None;
            state.project_name = None;
        })
    }

    fn update(&self, f: impl FnOnce(&mut SessionState)) -> Result<(), SessionError> {
        let snapshot = {
            let mut state = self.state.write();
            f(&mut state);
            state.clone()
        };
        match &self.store {
            Some(store) => store.save(&snapshot),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_creates_fresh_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("nested").join("session.json"));

        let state = store.load().unwrap();
        assert!(state.token.is_none());
        assert!(store.path().exists());

        // The anonymous id is stable across loads.
        let again = store.load().unwrap();
        assert_eq!(state.user_id, again.user_id);
    }

    #[test]
    fn token_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let session = SessionContext::open(SessionStore::new(&path)).unwrap();
        session.set_token("T").unwrap();

        let reopened = SessionContext::open(SessionStore::new(&path)).unwrap();
        assert_eq!(reopened.token().as_deref(), Some("T"));
        assert_eq!(reopened.user_id(), session.user_id());
    }

    #[test]
    fn logout_clears_token_and_project_but_keeps_user_id() {
        let session = SessionContext::in_memory(SessionState::fresh());
        let user_id = session.user_id();
        session.set_project("scoped", "Research").unwrap();
        assert_eq!(session.project_name().as_deref(), Some("Research"));

        session.logout().unwrap();
        assert!(!session.is_logged_in());
        assert!(session.project_name().is_none());
        assert_eq!(session.user_id(), user_id);
    }

    #[test]
    fn clones_share_state() {
        let session = SessionContext::in_memory(SessionState::fresh());
        let other = session.clone();
        session.set_token("shared").unwrap();
        assert_eq!(other.token().as_deref(), Some("shared"));
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();

        let result = SessionStore::new(&path).load();
        assert!(matches!(result, Err(SessionError::Corrupt(_))));
    }

    #[test]
    fn debug_output_redacts_token() {
        let mut state = SessionState::fresh();
        state.token = Some("secret-token".to_string());
        let debug = format!("{state:?}");
        assert!(!debug.contains("secret-token"));
    }
}
