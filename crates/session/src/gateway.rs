use std::sync::{Arc, RwLock};

use tracing::{info, warn};

use banter_client::{
    ApiClient, ApiError, RegisteredUser, UserIdentity,
    validate::{validate_password, validate_username},
};

use crate::store::SessionStore;

/// Where the client currently stands in the auth lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    Anonymous,
    Authenticating,
    Authenticated,
}

/// Orchestrates register/login/logout against the backend.
///
/// The only writer of [`SessionStore`]: login installs a session, logout
/// removes it, and nothing else mutates it through this path.
pub struct AuthGateway {
    client: Arc<ApiClient>,
    store: Arc<SessionStore>,
    status: RwLock<AuthStatus>,
}

impl AuthGateway {
    pub fn new(client: Arc<ApiClient>, store: Arc<SessionStore>) -> Self {
        let initial = if store.is_authenticated() {
            AuthStatus::Authenticated
        } else {
            AuthStatus::Anonymous
        };
        Self {
            client,
            store,
            status: RwLock::new(initial),
        }
    }

    pub fn status(&self) -> AuthStatus {
        self.status
            .read()
            .map(|g| *g)
            .unwrap_or(AuthStatus::Anonymous)
    }

    /// Register a new account. Pre-validates locally (a failed pre-check
    /// never reaches the backend) and never touches the session.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
    ) -> Result<RegisteredUser, ApiError> {
        validate_username(username)?;
        validate_password(password)?;
        self.client.register(username, password).await
    }

    /// Log in and install the returned session.
    ///
    /// On any failure the store is left exactly as it was — a failed login
    /// never clears an existing session and never partially applies a new
    /// one.
    pub async fn login(&self, username: &str, password: &str) -> Result<UserIdentity, ApiError> {
        self.set_status(AuthStatus::Authenticating);
        match self.client.login(username, password).await {
            Ok(resp) => {
                let identity = resp.identity();
                self.store.set(resp.token, identity.clone());
                self.set_status(AuthStatus::Authenticated);
                info!(username = %identity.username, "logged in");
                Ok(identity)
            },
            Err(e) => {
                self.set_status(self.derived_status());
                Err(e)
            },
        }
    }

    /// Log out: best-effort remote invalidation, unconditional local clear.
    /// A failed remote call is logged and never blocks session termination.
    pub async fn logout(&self) {
        if let Some(token) = self.store.token() {
            if let Err(e) = self.client.logout(&token).await {
                warn!(error = %e, "remote logout failed; clearing local session anyway");
            }
        }
        self.store.clear();
        self.set_status(AuthStatus::Anonymous);
        info!("logged out");
    }

    fn set_status(&self, status: AuthStatus) {
        if let Ok(mut guard) = self.status.write() {
            *guard = status;
        }
    }

    fn derived_status(&self) -> AuthStatus {
        if self.store.is_authenticated() {
            AuthStatus::Authenticated
        } else {
            AuthStatus::Anonymous
        }
    }
}
