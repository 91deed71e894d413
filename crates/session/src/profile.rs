use std::sync::Arc;

use banter_client::{
    ApiClient, ApiError, Profile, ProfileUpdate, UserIdentity,
    validate::{validate_password, validate_username},
};

use crate::store::SessionStore;

/// Profile reads/writes for the logged-in user.
///
/// A successful username change is reflected back into the session via
/// `SessionStore::update_identity` — the credential is never touched.
pub struct ProfileService {
    client: Arc<ApiClient>,
    store: Arc<SessionStore>,
}

impl ProfileService {
    pub fn new(client: Arc<ApiClient>, store: Arc<SessionStore>) -> Self {
        Self { client, store }
    }

    pub async fn fetch(&self) -> Result<Profile, ApiError> {
        let token = self.require_token()?;
        self.client.get_profile(&token).await
    }

    pub async fn update(&self, update: ProfileUpdate) -> Result<Profile, ApiError> {
        if update.is_empty() {
            return Err(ApiError::Validation("nothing to update".into()));
        }
        if let Some(username) = &update.username {
            validate_username(username)?;
        }
        if let Some(password) = &update.password {
            validate_password(password)?;
        }

        let token = self.require_token()?;
        let profile = self.client.update_profile(&token, &update).await?;
        self.store.update_identity(UserIdentity {
            id: profile.id,
            username: profile.username.clone(),
        });
        Ok(profile)
    }

    fn require_token(&self) -> Result<String, ApiError> {
        self.store
            .token()
            .ok_or_else(|| ApiError::Auth("no active session".into()))
    }
}
