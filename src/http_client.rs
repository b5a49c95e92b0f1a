// HTTP request executor
// Builds transport requests from descriptors and transparently handles
// authentication expiry: a 401 triggers a single-flight token refresh and
// exactly one retry, a 403 ends the session immediately.

use anyhow::{Context, Result};
use reqwest::{Client, Method, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{AuthManager, RefreshOutcome};
use crate::error::ApiError;

/// Immutable description of one logical API call.
/// The body is kept as a JSON value rather than a byte stream so the
/// descriptor can be dispatched again after a token refresh.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub path: String,
    pub method: Method,
    pub body: Option<serde_json::Value>,
    pub requires_auth: bool,
}

impl RequestDescriptor {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: Method::GET,
            body: None,
            requires_auth: false,
        }
    }

    pub fn post(path: impl Into<String>, body: &impl Serialize) -> Result<Self, ApiError> {
        Ok(Self {
            path: path.into(),
            method: Method::POST,
            body: Some(serde_json::to_value(body).map_err(ApiError::Decode)?),
            requires_auth: false,
        })
    }

    /// POST without a body, used by the toggle endpoint
    pub fn post_empty(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: Method::POST,
            body: None,
            requires_auth: false,
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: Method::DELETE,
            body: None,
            requires_auth: false,
        }
    }

    /// Mark the call as requiring a bearer token
    pub fn authenticated(mut self) -> Self {
        self.requires_auth = true;
        self
    }
}

/// HTTP client for the JakBu API
pub struct JakbuClient {
    /// Shared HTTP client with connection pooling
    http: Client,

    /// Root of the remote service; descriptor paths are joined against it
    base_url: Url,

    /// Session manager handling token storage and refresh
    auth: Arc<AuthManager>,
}

impl JakbuClient {
    /// Create a new client
    pub fn new(
        base_url: Url,
        auth: Arc<AuthManager>,
        connect_timeout: u64,
        request_timeout: u64,
    ) -> Result<Self> {
        let http = Client::builder()
            .user_agent(user_agent())
            .connect_timeout(Duration::from_secs(connect_timeout))
            .timeout(Duration::from_secs(request_timeout))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url,
            auth,
        })
    }

    pub fn auth(&self) -> &AuthManager {
        &self.auth
    }

    /// Execute a descriptor and decode the response body
    pub async fn execute<T: DeserializeOwned>(
        &self,
        descriptor: &RequestDescriptor,
    ) -> Result<T, ApiError> {
        let response = self.execute_raw(descriptor).await?;
        let bytes = response.bytes().await.map_err(ApiError::Transport)?;
        serde_json::from_slice(&bytes).map_err(ApiError::Decode)
    }

    /// Execute a descriptor, discarding the response body
    pub async fn execute_empty(&self, descriptor: &RequestDescriptor) -> Result<(), ApiError> {
        self.execute_raw(descriptor).await?;
        Ok(())
    }

    /// Execute a descriptor, handling authentication expiry, and return the
    /// successful response
    async fn execute_raw(&self, descriptor: &RequestDescriptor) -> Result<Response, ApiError> {
        let token = if descriptor.requires_auth {
            self.auth.bearer_token()
        } else {
            None
        };

        let response = self.dispatch(descriptor, token.as_deref()).await?;
        if response.status().is_success() {
            return Ok(response);
        }

        match Self::failure_for(response).await {
            ApiError::Unauthorized => {
                tracing::debug!(path = %descriptor.path, "Received 401, requesting token refresh");
                match self.auth.refresh(token.as_deref()).await {
                    RefreshOutcome::Refreshed => self.retry_once(descriptor).await,
                    RefreshOutcome::SessionExpired => Err(ApiError::SessionExpired),
                }
            }
            ApiError::SessionExpired => {
                // 403 is not refreshable, unlike 401
                tracing::warn!(path = %descriptor.path, "Received 403, ending session");
                self.auth.clear_session();
                Err(ApiError::SessionExpired)
            }
            other => Err(other),
        }
    }

    /// Re-dispatch a descriptor once after a successful refresh.
    /// A second auth failure ends the session instead of looping.
    async fn retry_once(&self, descriptor: &RequestDescriptor) -> Result<Response, ApiError> {
        let token = if descriptor.requires_auth {
            self.auth.bearer_token()
        } else {
            None
        };

        let response = self.dispatch(descriptor, token.as_deref()).await?;
        if response.status().is_success() {
            return Ok(response);
        }

        match Self::failure_for(response).await {
            ApiError::Unauthorized | ApiError::SessionExpired => {
                tracing::warn!(path = %descriptor.path, "Refreshed token rejected, ending session");
                self.auth.clear_session();
                Err(ApiError::SessionExpired)
            }
            other => Err(other),
        }
    }

    /// Build and send one transport-level request
    async fn dispatch(
        &self,
        descriptor: &RequestDescriptor,
        bearer: Option<&str>,
    ) -> Result<Response, ApiError> {
        let url = self
            .base_url
            .join(&descriptor.path)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", descriptor.path, e)))?;

        let mut request = self.http.request(descriptor.method.clone(), url.clone());

        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        if let Some(body) = &descriptor.body {
            request = request
                .header("Content-Type", "application/json")
                .json(body);
        }

        tracing::debug!(
            method = %descriptor.method,
            url = %url,
            "Sending HTTP request"
        );

        let response = request.send().await.map_err(ApiError::Transport)?;

        tracing::debug!(
            status = %response.status(),
            url = %url,
            "Received HTTP response"
        );

        Ok(response)
    }

    /// Map a non-2xx response to its error.
    /// 401 becomes the internal `Unauthorized` signal consumed by the
    /// refresh path and never surfaced to callers.
    async fn failure_for(response: Response) -> ApiError {
        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
            StatusCode::FORBIDDEN => ApiError::SessionExpired,
            _ => {
                let message = response.text().await.unwrap_or_default();
                tracing::warn!(
                    status = status.as_u16(),
                    message = %message,
                    "HTTP request failed with error response"
                );
                ApiError::Server {
                    status: status.as_u16(),
                    message,
                }
            }
        }
    }
}

/// User-Agent carrying the crate version and a stable machine fingerprint
fn user_agent() -> String {
    format!("JakBu-CLI/{}-{}", env!("CARGO_PKG_VERSION"), machine_fingerprint())
}

fn machine_fingerprint() -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());

    let mut hasher = DefaultHasher::new();
    hostname.hash(&mut hasher);
    format!("{:x}", hasher.finish())
}
