//! Common test utilities for E2E tests

use chrono::Utc;
use karmafeed::auth::password::hash_password;
use karmafeed::auth::{Session, create_session_token};
use karmafeed::data::{EntityId, User};
use karmafeed::{AppState, build_router, config};
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        // Create test configuration
        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
                domain: "localhost".to_string(),
                protocol: "http".to_string(),
            },
            database: config::DatabaseConfig {
                path: db_path.clone(),
            },
            auth: config::AuthConfig {
                session_secret: "test-secret-key-32-bytes-long!!!".to_string(),
                session_max_age: 604800,
                guest_username: "guest".to_string(),
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        // Initialize app state
        let state = AppState::new(config).await.unwrap();

        // Create HTTP client
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        // Build router and spawn server in background
        let app = build_router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait a bit for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        Self {
            addr: addr_str,
            state,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Create a user directly in the database
    pub async fn create_test_user(&self, username: &str) -> User {
        let user = User {
            id: EntityId::new().0,
            username: username.to_string(),
            password_hash: Some(hash_password("password123").unwrap()),
            created_at: Utc::now(),
        };
        self.state.db.insert_user(&user).await.unwrap();
        user
    }

    /// Create a session token for an existing user
    pub fn session_token_for(&self, user: &User) -> String {
        let session = Session::for_user(
            user.id.clone(),
            user.username.clone(),
            self.state.config.auth.session_max_age,
        );
        create_session_token(&session, &self.state.config.auth.session_secret)
            .expect("Failed to create test token")
    }

    /// Create a user and return (user, bearer token)
    pub async fn signed_in_user(&self, username: &str) -> (User, String) {
        let user = self.create_test_user(username).await;
        let token = self.session_token_for(&user);
        (user, token)
    }

    /// POST a new post as the given bearer token, returning its id
    pub async fn create_post(&self, token: &str, content: &str) -> String {
        let response = self
            .client
            .post(self.url("/api/posts"))
            .bearer_auth(token)
            .json(&serde_json::json!({ "content": content }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);
        let body: serde_json::Value = response.json().await.unwrap();
        body["id"].as_str().unwrap().to_string()
    }

    /// POST a new comment as the given bearer token, returning its id
    pub async fn create_comment(
        &self,
        token: &str,
        post_id: &str,
        parent_id: Option<&str>,
        content: &str,
    ) -> String {
        let mut payload = serde_json::json!({
            "post_id": post_id,
            "content": content,
        });
        if let Some(parent) = parent_id {
            payload["parent_id"] = serde_json::Value::String(parent.to_string());
        }
        let response = self
            .client
            .post(self.url("/api/comments"))
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);
        let body: serde_json::Value = response.json().await.unwrap();
        body["id"].as_str().unwrap().to_string()
    }
}
