//! `SchedulesDirectClient` - Schedules Direct JSON API client implementation.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::{Client, Method};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::instrument;
use url::Url;

use super::api::LocalSchedulesDirectApi;
use super::error::{AuthError, ProviderError, ProviderStatus};
use super::token::{AuthToken, TokenStore};
use super::types::{
    Headend, LineupDetails, LineupList, LineupStations, ScheduleRequest, TokenRequest,
    TokenResponse,
};

/// Default base URL for the Schedules Direct JSON API (version 20141201).
pub const DEFAULT_BASE_URL: &str = "https://json.schedulesdirect.org/20141201/";

/// Default per-request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Provider code returned by `GET /lineups` when the account has no lineups.
const NO_LINEUPS: i64 = 4102;

/// Schedules Direct API client.
///
/// Owns the session token; one instance is shared by every stage of a refresh.
#[allow(clippy::module_name_repetitions)]
pub struct SchedulesDirectClient {
    /// HTTP client.
    http_client: Client,
    /// Base URL for API requests (always ends with `/`).
    base_url: Url,
    /// Account user name.
    username: String,
    /// Account password.
    password: String,
    /// Token persistence.
    token_store: TokenStore,
    /// Current session token. The lock also serializes token exchanges.
    token: Mutex<Option<AuthToken>>,
}

impl fmt::Debug for SchedulesDirectClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulesDirectClient")
            .field("base_url", &self.base_url.as_str())
            .field("username", &self.username)
            .field("token_store", &self.token_store)
            .finish_non_exhaustive()
    }
}

/// Builder for `SchedulesDirectClient`.
#[derive(Default)]
#[allow(clippy::module_name_repetitions)]
pub struct SchedulesDirectClientBuilder {
    base_url: Option<Url>,
    user_agent: Option<String>,
    credentials: Option<(String, String)>,
    token_store: Option<TokenStore>,
    timeout: Option<Duration>,
}

impl fmt::Debug for SchedulesDirectClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulesDirectClientBuilder")
            .field("base_url", &self.base_url)
            .field("user_agent", &self.user_agent)
            .field("has_credentials", &self.credentials.is_some())
            .field("token_store", &self.token_store)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl SchedulesDirectClientBuilder {
    /// Creates a new builder.
    const fn new() -> Self {
        Self {
            base_url: None,
            user_agent: None,
            credentials: None,
            token_store: None,
            timeout: None,
        }
    }

    /// Overrides the base URL (for wiremock in tests).
    #[must_use]
    pub fn base_url(mut self, url: Url) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Sets the User-Agent (required).
    #[must_use]
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Sets the account credentials (required).
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// Sets where the session token is persisted (default: memory only).
    #[must_use]
    pub fn token_store(mut self, store: TokenStore) -> Self {
        self.token_store = Some(store);
        self
    }

    /// Sets the per-request timeout (default: 60s).
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// - `user_agent` is not set.
    /// - `credentials` are not set.
    /// - `reqwest::Client` build fails.
    pub fn build(self) -> Result<SchedulesDirectClient> {
        let user_agent = self.user_agent.context("user_agent is required")?;
        let (username, password) = self.credentials.context("credentials are required")?;

        let mut base_url = if let Some(url) = self.base_url {
            url
        } else {
            let result = Url::parse(DEFAULT_BASE_URL);
            result.context("invalid default base URL")?
        };
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http_client = Client::builder()
            .user_agent(&user_agent)
            .gzip(true)
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()
            .context("failed to build HTTP client")?;

        Ok(SchedulesDirectClient {
            http_client,
            base_url,
            username,
            password,
            token_store: self.token_store.unwrap_or_default(),
            token: Mutex::new(None),
        })
    }
}

impl SchedulesDirectClient {
    /// Creates a new builder.
    #[must_use]
    pub const fn builder() -> SchedulesDirectClientBuilder {
        SchedulesDirectClientBuilder::new()
    }

    /// Returns a valid session token, exchanging credentials only when needed.
    ///
    /// Order: in-memory token, persisted token, credential exchange.
    /// An unreadable token file is treated as absent.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] if the exchange fails or is rejected.
    #[instrument(skip_all)]
    pub async fn authenticate(&self) -> Result<AuthToken, AuthError> {
        let mut slot = self.token.lock().await;
        let now = Utc::now();

        if let Some(token) = slot.as_ref().filter(|t| t.is_valid_at(now)) {
            return Ok(token.clone());
        }

        match self.token_store.load() {
            Ok(Some(token)) if token.is_valid_at(now) => {
                tracing::debug!(expires_at = %token.expires_at(), "Reusing persisted token");
                *slot = Some(token.clone());
                return Ok(token);
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Ignoring unreadable token file"),
        }

        let token = self.exchange_token().await?;
        tracing::info!(expires_at = %token.expires_at(), "Authenticated with Schedules Direct");
        if let Err(e) = self.token_store.save(&token, Utc::now()) {
            tracing::warn!(error = %e, "Failed to persist token");
        }
        *slot = Some(token.clone());
        Ok(token)
    }

    /// Performs `POST /token`.
    async fn exchange_token(&self) -> Result<AuthToken, AuthError> {
        let url = self
            .base_url
            .join("token")
            .map_err(|e| AuthError::Malformed(format!("invalid token URL: {e}")))?;
        let body = TokenRequest {
            username: &self.username,
            password: &self.password,
        };

        let response = self
            .http_client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(AuthError::Transport)?;
        let status = response.status();
        let text = response.text().await.map_err(AuthError::Transport)?;

        if !status.is_success() {
            let (code, message) = ProviderStatus::parse(&text);
            return Err(match code {
                Some(code) if code != 0 => AuthError::Rejected { code, message },
                _ => AuthError::Status {
                    status: status.as_u16(),
                    message,
                },
            });
        }

        let parsed: TokenResponse =
            serde_json::from_str(&text).map_err(|e| AuthError::Malformed(e.to_string()))?;
        if parsed.code != 0 {
            return Err(AuthError::Rejected {
                code: parsed.code,
                message: parsed.message.unwrap_or_default(),
            });
        }
        let token = parsed
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::Malformed(String::from("response carries no token")))?;
        Ok(AuthToken::issued_at(token, Utc::now()))
    }

    /// Sends an authenticated request and decodes the JSON response.
    ///
    /// No retry: the first failure is returned.
    ///
    /// # Errors
    ///
    /// - [`ProviderError::Auth`] if no token can be obtained.
    /// - [`ProviderError::Status`] on a non-2xx response.
    /// - [`ProviderError::Transport`] on connect failure or timeout.
    /// - [`ProviderError::Decode`] if the body is not the expected JSON.
    #[instrument(skip_all, fields(%method, path = %path))]
    pub async fn request<T, B>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<T, ProviderError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let token = self.authenticate().await?;
        let url = self
            .base_url
            .join(path)
            .map_err(|source| ProviderError::InvalidPath {
                path: String::from(path),
                source,
            })?;

        let mut builder = self
            .http_client
            .request(method.clone(), url)
            .header("token", token.value())
            .query(query);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        tracing::debug!(%method, path, "Schedules Direct API request");

        let transport = |source: reqwest::Error| ProviderError::Transport {
            method: method.clone(),
            path: String::from(path),
            source,
        };
        let response = builder.send().await.map_err(transport)?;
        let status = response.status();
        let text = response.text().await.map_err(transport)?;

        if !status.is_success() {
            return Err(ProviderError::from_response(
                method,
                path,
                status.as_u16(),
                &text,
            ));
        }

        serde_json::from_str(&text).map_err(|source| ProviderError::Decode {
            method,
            path: String::from(path),
            source,
        })
    }

    /// Sends an authenticated GET request.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        self.request::<T, ()>(Method::GET, path, query, None).await
    }
}

impl LocalSchedulesDirectApi for SchedulesDirectClient {
    #[instrument(skip_all)]
    async fn account_lineups(&self) -> Result<LineupList, ProviderError> {
        match self.get_json("lineups", &[]).await {
            Err(e) if e.provider_code() == Some(NO_LINEUPS) => {
                tracing::info!("No lineups on the account yet");
                Ok(LineupList::default())
            }
            result => result,
        }
    }

    #[instrument(skip_all)]
    async fn available_lineups(
        &self,
        country: &str,
        postal_code: &str,
    ) -> Result<LineupList, ProviderError> {
        let query = [("country", country), ("postalcode", postal_code)];
        let headends: Vec<Headend> = self.get_json("headends", &query).await?;
        Ok(Headend::into_lineups(headends))
    }

    #[instrument(skip_all, fields(lineup_id = %lineup_id))]
    async fn add_lineup(&self, lineup_id: &str) -> Result<(), ProviderError> {
        let path = format!("lineups/{lineup_id}");
        let status: ProviderStatus = self
            .request::<_, ()>(Method::PUT, &path, &[], None)
            .await?;
        match status.code {
            Some(code) if code != 0 => Err(ProviderError::Rejected {
                method: Method::PUT,
                path,
                code,
                message: status.message.or(status.response).unwrap_or_default(),
            }),
            _ => {
                tracing::info!(lineup_id, "Added lineup to account");
                Ok(())
            }
        }
    }

    #[instrument(skip_all, fields(lineup_id = %lineup_id))]
    async fn lineup_details(&self, lineup_id: &str) -> Result<LineupDetails, ProviderError> {
        let path = format!("lineups/{lineup_id}");
        self.get_json(&path, &[]).await
    }

    #[instrument(skip_all, fields(lineup_id = %lineup_id))]
    async fn lineup_stations(&self, lineup_id: &str) -> Result<LineupStations, ProviderError> {
        let path = format!("lineups/{lineup_id}/stations");
        self.get_json(&path, &[]).await
    }

    #[instrument(skip_all, fields(stations = requests.len()))]
    async fn schedule_chunk(
        &self,
        requests: &[ScheduleRequest],
    ) -> Result<Vec<Value>, ProviderError> {
        self.request(Method::POST, "schedules", &[], Some(requests))
            .await
    }

    #[instrument(skip_all, fields(programs = program_ids.len()))]
    async fn program_chunk(&self, program_ids: &[String]) -> Result<Vec<Value>, ProviderError> {
        self.request(Method::POST, "programs", &[], Some(program_ids))
            .await
    }
}
