#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tower::ServiceExt;
use uuid::Uuid;

use hiremebahamas::app::auth::PasetoVerifier;
use hiremebahamas::app::push_subscriptions::{
    SubscriptionStats, SubscriptionStore, UpsertOutcome,
};
use hiremebahamas::domain::push_subscription::{NewPushSubscription, PushSubscription};
use hiremebahamas::AppState;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

// Test-only key, "0123456789abcdef0123456789abcdef"
const TEST_ACCESS_KEY: [u8; 32] = *b"0123456789abcdef0123456789abcdef";
const TEST_ISSUER: &str = "hiremebahamas";
pub const TEST_ADMIN_TOKEN: &str = "test-admin-token-12345";
pub const SUBSCRIBE_PATH: &str = "/api/push/subscribe";
pub const TEST_BODY_LIMIT: usize = 16 * 1024;

// ---------------------------------------------------------------------------
// In-memory stores
// ---------------------------------------------------------------------------

/// `SubscriptionStore` over a map, counting every read and write so tests can
/// assert that rejected requests never reached storage.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<HashMap<(Uuid, String), PushSubscription>>,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl MemoryStore {
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn accesses(&self) -> u64 {
        self.reads() + self.writes()
    }

    pub async fn row(&self, user_id: Uuid, endpoint: &str) -> Option<PushSubscription> {
        self.rows
            .lock()
            .await
            .get(&(user_id, endpoint.to_string()))
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn upsert(
        &self,
        user_id: Uuid,
        subscription: &NewPushSubscription,
    ) -> Result<UpsertOutcome> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let now = OffsetDateTime::now_utc();
        let mut rows = self.rows.lock().await;
        let key = (user_id, subscription.endpoint().to_string());

        if let Some(existing) = rows.get_mut(&key) {
            existing.p256dh = subscription.p256dh().to_string();
            existing.auth = subscription.auth().to_string();
            existing.updated_at = now;
            return Ok(UpsertOutcome::Updated);
        }

        rows.insert(
            key,
            PushSubscription {
                id: Uuid::new_v4(),
                user_id,
                endpoint: subscription.endpoint().to_string(),
                p256dh: subscription.p256dh().to_string(),
                auth: subscription.auth().to_string(),
                created_at: now,
                updated_at: now,
            },
        );
        Ok(UpsertOutcome::Created)
    }

    async fn delete(&self, user_id: Uuid, endpoint: &str) -> Result<bool> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let removed = self
            .rows
            .lock()
            .await
            .remove(&(user_id, endpoint.to_string()));
        Ok(removed.is_some())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<PushSubscription>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let mut rows: Vec<_> = self
            .rows
            .lock()
            .await
            .values()
            .filter(|row| row.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn stats(&self) -> Result<SubscriptionStats> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let rows = self.rows.lock().await;
        let mut users: Vec<Uuid> = rows.keys().map(|(user_id, _)| *user_id).collect();
        users.sort();
        users.dedup();
        Ok(SubscriptionStats {
            total_subscriptions: rows.len() as i64,
            subscribed_users: users.len() as i64,
        })
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Store whose every call fails, standing in for a lost database connection.
pub struct FailingStore;

#[async_trait]
impl SubscriptionStore for FailingStore {
    async fn upsert(&self, _: Uuid, _: &NewPushSubscription) -> Result<UpsertOutcome> {
        Err(anyhow!("connection refused (os error 111)"))
    }

    async fn delete(&self, _: Uuid, _: &str) -> Result<bool> {
        Err(anyhow!("connection refused (os error 111)"))
    }

    async fn list_for_user(&self, _: Uuid) -> Result<Vec<PushSubscription>> {
        Err(anyhow!("connection refused (os error 111)"))
    }

    async fn stats(&self) -> Result<SubscriptionStats> {
        Err(anyhow!("connection refused (os error 111)"))
    }

    async fn ping(&self) -> Result<()> {
        Err(anyhow!("connection refused (os error 111)"))
    }
}

// ---------------------------------------------------------------------------
// TestApp
// ---------------------------------------------------------------------------

pub struct TestApp {
    router: Router,
    pub store: Arc<MemoryStore>,
    verifier: PasetoVerifier,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    body_bytes: bytes::Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body_bytes).unwrap_or(Value::Null)
    }

    pub fn message(&self) -> String {
        self.json()["message"].as_str().unwrap_or("").to_string()
    }

    pub fn success(&self) -> Option<bool> {
        self.json()["success"].as_bool()
    }
}

pub struct TestUser {
    pub id: Uuid,
    pub access_token: String,
}

/// Fresh app over an empty `MemoryStore`.
pub fn app() -> TestApp {
    let store = Arc::new(MemoryStore::default());
    TestApp::with_store(store.clone(), store, Some(TEST_ADMIN_TOKEN))
}

/// App whose store fails every call.
pub fn failing_app() -> TestApp {
    TestApp::with_store(
        Arc::new(FailingStore),
        Arc::new(MemoryStore::default()),
        Some(TEST_ADMIN_TOKEN),
    )
}

/// App deployed without `ADMIN_TOKEN`.
pub fn app_without_admin() -> TestApp {
    let store = Arc::new(MemoryStore::default());
    TestApp::with_store(store.clone(), store, None)
}

impl TestApp {
    fn with_store(
        store: Arc<dyn SubscriptionStore>,
        memory: Arc<MemoryStore>,
        admin_token: Option<&str>,
    ) -> Self {
        let verifier = PasetoVerifier::new(TEST_ACCESS_KEY, TEST_ISSUER);
        let state = AppState {
            store,
            verifier: Arc::new(verifier.clone()),
            admin_token: admin_token.map(str::to_string),
            request_body_limit_bytes: TEST_BODY_LIMIT,
        };

        TestApp {
            router: hiremebahamas::http::router(state),
            store: memory,
            verifier,
        }
    }

    // ------------------------------------------------------------------
    // Low-level request helper
    // ------------------------------------------------------------------
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("host", "localhost");

        for &(key, value) in headers {
            builder = builder.header(key, value);
        }

        // Sized bodies, as real clients send them.
        let request = if let Some(body) = body {
            let body = serde_json::to_string(&body).unwrap();
            builder
                .header("content-type", "application/json")
                .header("content-length", body.len())
                .body(Body::from(body))
                .unwrap()
        } else {
            builder.body(Body::empty()).unwrap()
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot failed");

        let status = response.status();
        let headers = response.headers().clone();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to collect body")
            .to_bytes();

        TestResponse {
            status,
            headers,
            body_bytes,
        }
    }

    // ------------------------------------------------------------------
    // Convenience HTTP helpers
    // ------------------------------------------------------------------
    pub async fn get(&self, path: &str, token: Option<&str>) -> TestResponse {
        let auth = token.map(|t| format!("Bearer {}", t));
        let headers: Vec<_> = auth.iter().map(|a| ("Authorization", a.as_str())).collect();
        self.request(Method::GET, path, None, &headers).await
    }

    pub async fn post_json(&self, path: &str, body: Value, token: Option<&str>) -> TestResponse {
        let auth = token.map(|t| format!("Bearer {}", t));
        let headers: Vec<_> = auth.iter().map(|a| ("Authorization", a.as_str())).collect();
        self.request(Method::POST, path, Some(body), &headers).await
    }

    pub async fn delete_json(&self, path: &str, body: Value, token: Option<&str>) -> TestResponse {
        let auth = token.map(|t| format!("Bearer {}", t));
        let headers: Vec<_> = auth.iter().map(|a| ("Authorization", a.as_str())).collect();
        self.request(Method::DELETE, path, Some(body), &headers)
            .await
    }

    /// GET with an admin token in the x-admin-token header.
    pub async fn get_admin(&self, path: &str, admin_token: Option<&str>) -> TestResponse {
        let mut headers = vec![];
        if let Some(t) = admin_token {
            headers.push(("x-admin-token", t));
        }
        self.request(Method::GET, path, None, &headers).await
    }

    // ------------------------------------------------------------------
    // Test data helpers
    // ------------------------------------------------------------------

    /// A new user id with a valid access token; accounts live outside this
    /// service, so nothing is written.
    pub fn create_user(&self) -> TestUser {
        let id = Uuid::new_v4();
        let access_token = self
            .verifier
            .issue_access_token(id, Duration::from_secs(15 * 60))
            .expect("issue_access_token failed");
        TestUser { id, access_token }
    }

    pub async fn subscribe(
        &self,
        user: &TestUser,
        endpoint: &str,
        p256dh: &str,
        auth: &str,
    ) -> TestResponse {
        self.post_json(
            SUBSCRIBE_PATH,
            serde_json::json!({
                "endpoint": endpoint,
                "keys": { "p256dh": p256dh, "auth": auth },
            }),
            Some(&user.access_token),
        )
        .await
    }

    pub async fn unsubscribe(&self, user: &TestUser, endpoint: &str) -> TestResponse {
        self.delete_json(
            SUBSCRIBE_PATH,
            serde_json::json!({ "endpoint": endpoint }),
            Some(&user.access_token),
        )
        .await
    }
}
