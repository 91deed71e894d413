//! Typed HTTP client for the chat backend.
//!
//! One method per endpoint. Authenticated endpoints take the bearer
//! credential explicitly per call — the client itself holds no auth state,
//! so there is no shared default header to race on.

use {
    reqwest::{Client, Response, StatusCode},
    serde::{Deserialize, de::DeserializeOwned},
    tracing::debug,
    url::Url,
};

use crate::{
    error::ApiError,
    types::{LoginResponse, Message, MessagePage, Profile, ProfileUpdate, RegisteredUser},
};

/// Client for the chat backend's HTTP API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
}

impl ApiClient {
    /// Build a client for the backend at `base_url` (no `/api` suffix).
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let url = Url::parse(base_url)
            .map_err(|e| ApiError::Validation(format!("invalid base URL '{base_url}': {e}")))?;
        Ok(Self::with_http(Client::new(), url))
    }

    /// Build a client around a preconfigured `reqwest::Client` (timeouts,
    /// proxies) — the transport stays the caller's concern.
    pub fn with_http(http: Client, mut base_url: Url) -> Self {
        // Joining relative endpoint paths requires a trailing slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::Validation(format!("invalid endpoint '{path}': {e}")))
    }

    // ── Auth ─────────────────────────────────────────────────────────────

    /// `POST /api/auth/register`. Does not log the new user in.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
    ) -> Result<RegisteredUser, ApiError> {
        debug!(username = %username, "registering user");
        let resp = self
            .http
            .post(self.endpoint("api/auth/register")?)
            .json(&serde_json::json!({ "username": username, "password": password }))
            .send()
            .await?;
        Self::parse(resp).await
    }

    /// `POST /api/auth/login`. Returns the credential and identity.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        debug!(username = %username, "logging in");
        let resp = self
            .http
            .post(self.endpoint("api/auth/login")?)
            .json(&serde_json::json!({ "username": username, "password": password }))
            .send()
            .await?;
        Self::parse(resp).await
    }

    /// `POST /api/auth/logout`. The response body is ignored.
    pub async fn logout(&self, token: &str) -> Result<(), ApiError> {
        let resp = self
            .http
            .post(self.endpoint("api/auth/logout")?)
            .bearer_auth(token)
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    // ── Messages ─────────────────────────────────────────────────────────

    /// `GET /api/messages?limit=&offset=`.
    pub async fn list_messages(
        &self,
        token: &str,
        limit: u32,
        offset: u32,
    ) -> Result<MessagePage, ApiError> {
        let resp = self
            .http
            .get(self.endpoint("api/messages")?)
            .query(&[("limit", limit), ("offset", offset)])
            .bearer_auth(token)
            .send()
            .await?;
        Self::parse(resp).await
    }

    /// `POST /api/messages`. Returns the message with its server-assigned
    /// id and timestamp.
    pub async fn create_message(&self, token: &str, text: &str) -> Result<Message, ApiError> {
        let resp = self
            .http
            .post(self.endpoint("api/messages")?)
            .json(&serde_json::json!({ "text": text }))
            .bearer_auth(token)
            .send()
            .await?;
        Self::parse(resp).await
    }

    // ── Profile ──────────────────────────────────────────────────────────

    /// `GET /api/profile`.
    pub async fn get_profile(&self, token: &str) -> Result<Profile, ApiError> {
        let resp = self
            .http
            .get(self.endpoint("api/profile")?)
            .bearer_auth(token)
            .send()
            .await?;
        Self::parse(resp).await
    }

    /// `PUT /api/profile`. Absent fields are left untouched server-side.
    pub async fn update_profile(
        &self,
        token: &str,
        update: &ProfileUpdate,
    ) -> Result<Profile, ApiError> {
        let resp = self
            .http
            .put(self.endpoint("api/profile")?)
            .json(update)
            .bearer_auth(token)
            .send()
            .await?;
        Self::parse(resp).await
    }

    // ── Response handling ────────────────────────────────────────────────

    /// Decode a success body, or map an error status into the taxonomy.
    async fn parse<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
        let resp = Self::check(resp).await?;
        Ok(resp.json().await?)
    }

    /// Map non-success statuses into the error taxonomy, extracting the
    /// server's `{"error": …}` message when present.
    async fn check(resp: Response) -> Result<Response, ApiError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = Self::error_message(resp).await;
        Err(match status {
            StatusCode::BAD_REQUEST => ApiError::Validation(message),
            StatusCode::UNAUTHORIZED => ApiError::Auth(message),
            StatusCode::CONFLICT => ApiError::Conflict(message),
            _ => ApiError::Unexpected {
                status: status.as_u16(),
                message,
            },
        })
    }

    async fn error_message(resp: Response) -> String {
        #[derive(Deserialize)]
        struct ErrorBody {
            error: String,
        }

        let status = resp.status();
        match resp.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string(),
        }
    }
}
