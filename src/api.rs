// Typed API surface
// One method per JakBu endpoint, built on the request executor

use chrono::NaiveDate;

use crate::auth::{AuthResponse, LoginRequest, SignupRequest};
use crate::error::Result;
use crate::http_client::{JakbuClient, RequestDescriptor};
use crate::models::{CreateTodoRequest, SetTodoStatusRequest, Todo};

impl JakbuClient {
    /// Create an account and start its session
    pub async fn signup(&self, request: &SignupRequest) -> Result<AuthResponse> {
        let descriptor = RequestDescriptor::post("/auth/signup", request)?;
        let session: AuthResponse = self.execute(&descriptor).await?;
        self.auth().store_session(&session);
        Ok(session)
    }

    /// Log in and store the session token pair
    pub async fn login(&self, request: &LoginRequest) -> Result<AuthResponse> {
        let descriptor = RequestDescriptor::post("/auth/login", request)?;
        let session: AuthResponse = self.execute(&descriptor).await?;
        self.auth().store_session(&session);
        Ok(session)
    }

    /// Drop the stored session
    pub fn logout(&self) {
        self.auth().clear_session();
    }

    /// Create a to-do item
    pub async fn create_todo(&self, request: &CreateTodoRequest) -> Result<Todo> {
        let descriptor = RequestDescriptor::post("/todo", request)?.authenticated();
        self.execute(&descriptor).await
    }

    /// Today's to-do list
    pub async fn today_todos(&self) -> Result<Vec<Todo>> {
        let descriptor = RequestDescriptor::get("/todo/today").authenticated();
        self.execute(&descriptor).await
    }

    /// To-do list for a specific date
    pub async fn todos_on(&self, date: NaiveDate) -> Result<Vec<Todo>> {
        let path = format!("/todo/date?date={}", date.format("%Y-%m-%d"));
        let descriptor = RequestDescriptor::get(path).authenticated();
        self.execute(&descriptor).await
    }

    /// Flip the completion state of a to-do item
    pub async fn toggle_todo_done(&self, id: i64) -> Result<Todo> {
        let descriptor = RequestDescriptor::post_empty(format!("/todo/{}/done", id)).authenticated();
        self.execute(&descriptor).await
    }

    /// Set the completion state of a to-do item explicitly
    pub async fn set_todo_status(&self, id: i64, done: bool) -> Result<Todo> {
        let descriptor = RequestDescriptor::post(
            format!("/todo/{}/status", id),
            &SetTodoStatusRequest { done },
        )?
        .authenticated();
        self.execute(&descriptor).await
    }

    /// Delete a to-do item
    pub async fn delete_todo(&self, id: i64) -> Result<()> {
        let descriptor = RequestDescriptor::delete(format!("/todo/{}", id)).authenticated();
        self.execute_empty(&descriptor).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthManager, Credentials, MemoryTokenStore, TokenStore};
    use mockito::Matcher;
    use reqwest::{Client, Url};
    use serde_json::json;
    use std::sync::Arc;

    fn client_against(
        server: &mockito::Server,
        credentials: Credentials,
    ) -> (JakbuClient, Arc<MemoryTokenStore>) {
        let store = Arc::new(MemoryTokenStore::new(credentials));
        let auth = Arc::new(AuthManager::new(
            store.clone(),
            Client::new(),
            format!("{}/auth/refresh-token", server.url()),
        ));
        let client = JakbuClient::new(Url::parse(&server.url()).unwrap(), auth, 5, 10).unwrap();
        (client, store)
    }

    #[tokio::test]
    async fn test_login_stores_session() {
        let mut server = mockito::Server::new_async().await;

        let login = server
            .mock("POST", "/auth/login")
            .match_body(Matcher::Json(
                json!({"accountId": "user1", "password": "pw"}),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "accessToken": "access-1",
                    "refreshToken": "refresh-1",
                    "userId": 3,
                    "name": "Jak"
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let (client, store) = client_against(&server, Credentials::default());

        let session = client
            .login(&LoginRequest {
                account_id: "user1".to_string(),
                password: "pw".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(session.name, "Jak");
        assert_eq!(store.load().access_token.as_deref(), Some("access-1"));
        assert_eq!(store.load().refresh_token.as_deref(), Some("refresh-1"));

        login.assert_async().await;
    }

    #[tokio::test]
    async fn test_logout_clears_session() {
        let server = mockito::Server::new_async().await;
        let (client, store) = client_against(&server, Credentials::new("a", "r"));

        client.logout();

        assert!(store.load().access_token.is_none());
        assert!(store.load().refresh_token.is_none());
    }

    #[tokio::test]
    async fn test_todos_on_encodes_date_query() {
        let mut server = mockito::Server::new_async().await;

        let by_date = server
            .mock("GET", "/todo/date")
            .match_query(Matcher::UrlEncoded("date".into(), "2025-02-07".into()))
            .match_header("authorization", "Bearer access-1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("[]")
            .expect(1)
            .create_async()
            .await;

        let (client, _store) = client_against(&server, Credentials::new("access-1", "refresh-1"));

        let todos = client
            .todos_on(chrono::NaiveDate::from_ymd_opt(2025, 2, 7).unwrap())
            .await
            .unwrap();
        assert!(todos.is_empty());

        by_date.assert_async().await;
    }

    #[tokio::test]
    async fn test_set_status_posts_done_flag() {
        let mut server = mockito::Server::new_async().await;

        let set_status = server
            .mock("POST", "/todo/4/status")
            .match_body(Matcher::Json(json!({"done": true})))
            .match_header("authorization", "Bearer access-1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":4,"title":"read","date":"2025-02-07","status":"DONE"}"#)
            .expect(1)
            .create_async()
            .await;

        let (client, _store) = client_against(&server, Credentials::new("access-1", "refresh-1"));

        let todo = client.set_todo_status(4, true).await.unwrap();
        assert!(todo.status.is_done());

        set_status.assert_async().await;
    }
}
