//! Session context: bearer token, signed-in user, and the auth flows.
//!
//! A `Session` is created once and passed explicitly (usually behind an
//! `Arc`) to the HTTP client and whoever needs to know who is signed in.
//! The token is persisted to a local file so it survives restarts, and
//! kept in memory inside `Zeroizing` so it is wiped when replaced.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use zeroize::Zeroizing;

use crate::api::AuthApi;
use crate::error::ClientError;
use crate::models::{Credentials, Registration, User};
use crate::validation::validate_registration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// No usable token: show the sign-in view.
    Anonymous,
    /// A token is stored but has not been checked against the server yet.
    Unverified,
    Authenticated(User),
}

// ═══════════════════════════════════════════════════════════
// Token file
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored token. A missing or blank file means no token.
    pub fn load(&self) -> std::io::Result<Option<Zeroizing<String>>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let contents = Zeroizing::new(contents);
                let token = contents.trim();
                if token.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(Zeroizing::new(token.to_string())))
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn save(&self, token: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = open_private(&self.path)?;
        file.write_all(token.as_bytes())?;
        file.sync_all()
    }

    pub fn clear(&self) -> std::io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Open for writing, created owner-only. A file left by an older run keeps
/// its mode on open, so it is tightened before anything is written.
#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<std::fs::File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<std::fs::File> {
    OpenOptions::new().write(true).create(true).truncate(true).open(path)
}

// ═══════════════════════════════════════════════════════════
// Session
// ═══════════════════════════════════════════════════════════

pub struct Session {
    store: TokenStore,
    token: RwLock<Option<Zeroizing<String>>>,
    state: RwLock<AuthState>,
}

impl Session {
    /// Empty session backed by `store`. Nothing is read from disk.
    pub fn new(store: TokenStore) -> Self {
        Self {
            store,
            token: RwLock::new(None),
            state: RwLock::new(AuthState::Anonymous),
        }
    }

    /// Session primed with whatever token was persisted by a previous run.
    pub fn restore(store: TokenStore) -> Result<Self, ClientError> {
        let token = store.load()?;
        let state = if token.is_some() {
            AuthState::Unverified
        } else {
            AuthState::Anonymous
        };
        Ok(Self {
            store,
            token: RwLock::new(token),
            state: RwLock::new(state),
        })
    }

    /// Current bearer token, if any.
    pub fn token(&self) -> Option<Zeroizing<String>> {
        self.token.read().ok().and_then(|guard| guard.clone())
    }

    pub fn has_token(&self) -> bool {
        self.token
            .read()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    pub fn state(&self) -> AuthState {
        self.state
            .read()
            .map(|guard| guard.clone())
            .unwrap_or(AuthState::Anonymous)
    }

    pub fn user(&self) -> Option<User> {
        match self.state() {
            AuthState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    /// Adopt a freshly issued token and persist it.
    pub fn establish(&self, token: &str, user: User) -> Result<(), ClientError> {
        self.store.save(token)?;
        *self.token.write().map_err(|_| ClientError::LockPoisoned)? =
            Some(Zeroizing::new(token.to_string()));
        *self.state.write().map_err(|_| ClientError::LockPoisoned)? =
            AuthState::Authenticated(user);
        Ok(())
    }

    /// Record the user the stored token belongs to.
    pub fn confirm(&self, user: User) -> Result<(), ClientError> {
        *self.state.write().map_err(|_| ClientError::LockPoisoned)? =
            AuthState::Authenticated(user);
        Ok(())
    }

    /// Drop the token everywhere. Called on logout and whenever the server
    /// rejects the token.
    pub fn invalidate(&self) {
        if let Ok(mut token) = self.token.write() {
            *token = None;
        }
        if let Ok(mut state) = self.state.write() {
            *state = AuthState::Anonymous;
        }
        if let Err(e) = self.store.clear() {
            tracing::warn!(error = %e, path = %self.store.path().display(), "Failed to remove stored token");
        }
        tracing::info!("Session cleared");
    }
}

// ═══════════════════════════════════════════════════════════
// Auth flows
// ═══════════════════════════════════════════════════════════

pub async fn login<A>(api: &A, session: &Session, credentials: &Credentials) -> Result<User, ClientError>
where
    A: AuthApi + ?Sized,
{
    let auth = api.login(credentials).await?;
    session.establish(&auth.token, auth.user.clone())?;
    tracing::info!(user_id = %auth.user.id, "Signed in");
    Ok(auth.user)
}

pub async fn register<A>(
    api: &A,
    session: &Session,
    registration: &Registration,
) -> Result<User, ClientError>
where
    A: AuthApi + ?Sized,
{
    validate_registration(registration)?;
    let auth = api.register(registration).await?;
    session.establish(&auth.token, auth.user.clone())?;
    tracing::info!(user_id = %auth.user.id, "Registered");
    Ok(auth.user)
}

/// Check a stored token against the server.
///
/// A rejected token ends the session. Other failures are returned with the
/// token kept, so a flaky network does not sign the user out.
pub async fn resume<A>(api: &A, session: &Session) -> Result<AuthState, ClientError>
where
    A: AuthApi + ?Sized,
{
    if !session.has_token() {
        return Ok(AuthState::Anonymous);
    }
    match api.current_user().await {
        Ok(user) => {
            session.confirm(user)?;
            Ok(session.state())
        }
        Err(ClientError::Unauthorized) => {
            session.invalidate();
            Ok(AuthState::Anonymous)
        }
        Err(e) => Err(e),
    }
}

/// Sign out. The local token is dropped even if the server call fails.
pub async fn logout<A>(api: &A, session: &Session)
where
    A: AuthApi + ?Sized,
{
    if session.has_token() {
        if let Err(e) = api.logout().await {
            tracing::warn!(error = %e, "Server logout failed, clearing local session anyway");
        }
    }
    session.invalidate();
}
