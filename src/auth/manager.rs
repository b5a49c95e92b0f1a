// Session manager
// Owns the token store and coordinates token refresh so that at most one
// refresh call is in flight at any time; concurrent callers share its result.

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use reqwest::Client;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::store::{Credentials, TokenStore};
use super::types::{AuthResponse, RefreshTokenRequest};

/// Result of a refresh request, fanned out to every waiting caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A fresh token pair is in the store; the failed request may be retried
    Refreshed,

    /// The session cannot be recovered; the store has been cleared
    SessionExpired,
}

type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

/// Session manager
/// The in-flight slot is the Idle/Refreshing state machine: an empty slot
/// is Idle, an occupied slot is Refreshing and late callers join the
/// stored future instead of issuing a second refresh call.
pub struct AuthManager {
    /// Credential storage, shared with the refresh future
    store: Arc<dyn TokenStore>,

    /// HTTP client for refresh requests
    http: Client,

    /// Absolute URL of the refresh-token endpoint
    refresh_url: String,

    /// The currently running refresh, if any
    in_flight: Mutex<Option<SharedRefresh>>,
}

impl AuthManager {
    pub fn new(store: Arc<dyn TokenStore>, http: Client, refresh_url: String) -> Self {
        Self {
            store,
            http,
            refresh_url,
            in_flight: Mutex::new(None),
        }
    }

    /// Current access token, if a session is stored
    pub fn bearer_token(&self) -> Option<String> {
        self.store.load().access_token
    }

    /// Persist the token pair from a login/signup/refresh response
    pub fn store_session(&self, session: &AuthResponse) {
        let pair = Credentials::new(session.access_token.clone(), session.refresh_token.clone());
        if let Err(e) = self.store.save(&pair) {
            tracing::warn!(error = %e, "Failed to persist session credentials");
        }
    }

    /// Drop the stored session
    pub fn clear_session(&self) {
        if let Err(e) = self.store.clear() {
            tracing::warn!(error = %e, "Failed to clear session credentials");
        }
    }

    /// Obtain a usable access token after a request failed with 401.
    ///
    /// `stale_access_token` is the bearer the failed request carried. If the
    /// stored token already differs, a concurrent refresh has rotated the
    /// pair since that request was sent and its result stands in for ours;
    /// answering without a network call keeps rotation-sensitive backends
    /// from seeing a second refresh.
    pub async fn refresh(&self, stale_access_token: Option<&str>) -> RefreshOutcome {
        let (refresh, initiated) = {
            let mut slot = self.in_flight.lock().await;

            if let Some(in_flight) = slot.as_ref() {
                (in_flight.clone(), false)
            } else {
                let credentials = self.store.load();

                if credentials.access_token.is_some()
                    && credentials.access_token.as_deref() != stale_access_token
                {
                    tracing::debug!("Token already rotated, skipping refresh");
                    return RefreshOutcome::Refreshed;
                }

                let Some(refresh_token) = credentials.refresh_token else {
                    tracing::debug!("No refresh token stored, session cannot be recovered");
                    self.clear_session();
                    return RefreshOutcome::SessionExpired;
                };

                let refresh = Self::run_refresh(
                    self.http.clone(),
                    self.refresh_url.clone(),
                    refresh_token,
                    Arc::clone(&self.store),
                )
                .boxed()
                .shared();

                *slot = Some(refresh.clone());
                (refresh, true)
            }
        };

        let outcome = refresh.await;

        if initiated {
            // Back to idle; the next 401 starts a new refresh
            self.in_flight.lock().await.take();
        }

        outcome
    }

    /// The single refresh network call. On success both tokens are written
    /// in one store operation before any waiter observes the outcome; on
    /// failure both are cleared.
    async fn run_refresh(
        http: Client,
        url: String,
        refresh_token: String,
        store: Arc<dyn TokenStore>,
    ) -> RefreshOutcome {
        tracing::info!("Refreshing access token...");

        let request = RefreshTokenRequest { refresh_token };

        let response = http
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await;

        let session = match response {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    match response.json::<AuthResponse>().await {
                        Ok(session) if !session.access_token.is_empty() => Some(session),
                        Ok(_) => {
                            tracing::error!("Refresh response does not contain an access token");
                            None
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to parse refresh response");
                            None
                        }
                    }
                } else {
                    let body = response.text().await.unwrap_or_default();
                    tracing::error!(status = %status, body = %body, "Token refresh rejected");
                    None
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Token refresh request failed");
                None
            }
        };

        match session {
            Some(session) => {
                let pair = Credentials::new(session.access_token, session.refresh_token);
                if let Err(e) = store.save(&pair) {
                    // The pair survives in the store's memory snapshot, so
                    // the session stays usable for this process
                    tracing::warn!(error = %e, "Failed to persist refreshed credentials");
                }
                tracing::info!("Access token refreshed");
                RefreshOutcome::Refreshed
            }
            None => {
                if let Err(e) = store.clear() {
                    tracing::warn!(error = %e, "Failed to clear credentials");
                }
                RefreshOutcome::SessionExpired
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::MemoryTokenStore;
    use serde_json::json;

    fn manager_with(credentials: Credentials, refresh_url: String) -> Arc<AuthManager> {
        let store = Arc::new(MemoryTokenStore::new(credentials));
        Arc::new(AuthManager::new(store, Client::new(), refresh_url))
    }

    fn session_body(access: &str, refresh: &str) -> String {
        json!({
            "accessToken": access,
            "refreshToken": refresh,
            "userId": 1,
            "name": "tester"
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_refresh_without_refresh_token_is_terminal() {
        let mut server = mockito::Server::new_async().await;
        let refresh_mock = server
            .mock("POST", "/auth/refresh-token")
            .expect(0)
            .create_async()
            .await;

        let store = Arc::new(MemoryTokenStore::new(Credentials {
            access_token: Some("stale".to_string()),
            refresh_token: None,
        }));
        let manager = AuthManager::new(
            store.clone(),
            Client::new(),
            format!("{}/auth/refresh-token", server.url()),
        );

        let outcome = manager.refresh(Some("stale")).await;
        assert_eq!(outcome, RefreshOutcome::SessionExpired);

        // No network call was made, and the dangling access token is gone
        refresh_mock.assert_async().await;
        assert!(store.load().access_token.is_none());
    }

    #[tokio::test]
    async fn test_refresh_success_persists_both_tokens() {
        let mut server = mockito::Server::new_async().await;
        let refresh_mock = server
            .mock("POST", "/auth/refresh-token")
            .match_body(mockito::Matcher::Json(json!({"refreshToken": "refresh-1"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(session_body("access-2", "refresh-2"))
            .expect(1)
            .create_async()
            .await;

        let store = Arc::new(MemoryTokenStore::new(Credentials::new(
            "access-1", "refresh-1",
        )));
        let manager = AuthManager::new(
            store.clone(),
            Client::new(),
            format!("{}/auth/refresh-token", server.url()),
        );

        let outcome = manager.refresh(Some("access-1")).await;
        assert_eq!(outcome, RefreshOutcome::Refreshed);

        let credentials = store.load();
        assert_eq!(credentials.access_token.as_deref(), Some("access-2"));
        assert_eq!(credentials.refresh_token.as_deref(), Some("refresh-2"));

        refresh_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_refresh_rejection_clears_both_tokens() {
        let mut server = mockito::Server::new_async().await;
        let refresh_mock = server
            .mock("POST", "/auth/refresh-token")
            .with_status(401)
            .with_body(r#"{"message":"invalid refresh token"}"#)
            .expect(1)
            .create_async()
            .await;

        let store = Arc::new(MemoryTokenStore::new(Credentials::new(
            "access-1", "refresh-1",
        )));
        let manager = AuthManager::new(
            store.clone(),
            Client::new(),
            format!("{}/auth/refresh-token", server.url()),
        );

        let outcome = manager.refresh(Some("access-1")).await;
        assert_eq!(outcome, RefreshOutcome::SessionExpired);

        let credentials = store.load();
        assert!(credentials.access_token.is_none());
        assert!(credentials.refresh_token.is_none());

        refresh_mock.assert_async().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_refreshes_share_one_call() {
        let mut server = mockito::Server::new_async().await;
        let refresh_mock = server
            .mock("POST", "/auth/refresh-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(session_body("access-2", "refresh-2"))
            .expect(1)
            .create_async()
            .await;

        let manager = manager_with(
            Credentials::new("access-1", "refresh-1"),
            format!("{}/auth/refresh-token", server.url()),
        );

        let mut handles = Vec::new();
        for _ in 0..8 {
            let manager = Arc::clone(&manager);
            handles.push(tokio::spawn(async move {
                manager.refresh(Some("access-1")).await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), RefreshOutcome::Refreshed);
        }

        // Exactly one network call for all eight callers
        refresh_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_already_rotated_token_skips_network_call() {
        let mut server = mockito::Server::new_async().await;
        let refresh_mock = server
            .mock("POST", "/auth/refresh-token")
            .expect(0)
            .create_async()
            .await;

        let manager = manager_with(
            Credentials::new("access-2", "refresh-2"),
            format!("{}/auth/refresh-token", server.url()),
        );

        // This caller failed with a token that has since been replaced
        let outcome = manager.refresh(Some("access-1")).await;
        assert_eq!(outcome, RefreshOutcome::Refreshed);

        refresh_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_sequential_refreshes_return_to_idle() {
        let mut server = mockito::Server::new_async().await;
        let refresh_mock = server
            .mock("POST", "/auth/refresh-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(session_body("access-2", "refresh-2"))
            .expect(2)
            .create_async()
            .await;

        let manager = manager_with(
            Credentials::new("access-1", "refresh-1"),
            format!("{}/auth/refresh-token", server.url()),
        );

        assert_eq!(manager.refresh(Some("access-1")).await, RefreshOutcome::Refreshed);
        // The slot is idle again; a failure with the *new* token refreshes anew
        assert_eq!(manager.refresh(Some("access-2")).await, RefreshOutcome::Refreshed);

        refresh_mock.assert_async().await;
    }
}
