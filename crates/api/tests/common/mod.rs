#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use roster_core::duplicate_detection::IdentityKey;
use roster_core::employee::{Employee, EmployeeFields};
use roster_core::store::memory::{MemorySession, MemoryStore};
use roster_core::store::{EmployeeFilter, EmployeeStore, StoreError, StoreProvider, StoreResult};
use roster_core::types::EmployeeId;
use serde_json::Value;
use tower::ServiceExt;

use roster_api::background::import_jobs::ImportJobs;
use roster_api::config::ServerConfig;
use roster_api::router::build_app_router;
use roster_api::state::AppState;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        max_import_bytes: 1024 * 1024,
        import_history: 100,
    }
}

/// Build the full application router over a fresh in-memory store.
///
/// Returns the store too so tests can inspect committed rows directly.
pub fn build_test_app() -> (Router, MemoryStore) {
    let store = MemoryStore::new();
    let app = build_app_with(Arc::new(store.clone()), test_config());
    (app, store)
}

/// Build the application over any store provider and configuration.
pub fn build_app_with(store: Arc<dyn StoreProvider>, config: ServerConfig) -> Router {
    build_app_with_jobs(store, config, Arc::new(ImportJobs::new()))
}

/// Like [`build_app_with`], sharing the given import registry.
pub fn build_app_with_jobs(
    store: Arc<dyn StoreProvider>,
    config: ServerConfig,
    imports: Arc<ImportJobs>,
) -> Router {
    let state = AppState {
        store,
        config: Arc::new(config.clone()),
        imports,
    };
    build_app_router(state, &config)
}

/// A store provider whose database is unreachable.
pub struct UnreachableStore;

#[async_trait]
impl StoreProvider for UnreachableStore {
    async fn session(&self) -> StoreResult<Box<dyn EmployeeStore>> {
        Err(StoreError::General("connection refused".into()))
    }

    async fn import_session(&self) -> StoreResult<Box<dyn EmployeeStore>> {
        Err(StoreError::General("connection refused".into()))
    }

    async fn ping(&self) -> StoreResult<()> {
        Err(StoreError::General("connection refused".into()))
    }
}

/// A memory store whose inserts take `delay`, so imports stay running long
/// enough to observe.
#[derive(Clone)]
pub struct SlowStore {
    pub inner: MemoryStore,
    pub delay: Duration,
}

impl SlowStore {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryStore::new(),
            delay,
        }
    }
}

#[async_trait]
impl StoreProvider for SlowStore {
    async fn session(&self) -> StoreResult<Box<dyn EmployeeStore>> {
        Ok(Box::new(SlowSession {
            inner: self.inner.auto_commit(),
            delay: self.delay,
        }))
    }

    async fn import_session(&self) -> StoreResult<Box<dyn EmployeeStore>> {
        Ok(Box::new(SlowSession {
            inner: self.inner.transaction().await,
            delay: self.delay,
        }))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

struct SlowSession {
    inner: MemorySession,
    delay: Duration,
}

#[async_trait]
impl EmployeeStore for SlowSession {
    async fn query(&mut self, filter: &EmployeeFilter) -> StoreResult<Vec<Employee>> {
        self.inner.query(filter).await
    }
    async fn find_by_id(&mut self, id: EmployeeId) -> StoreResult<Option<Employee>> {
        self.inner.find_by_id(id).await
    }
    async fn exists_with_identity(&mut self, key: &IdentityKey) -> StoreResult<bool> {
        self.inner.exists_with_identity(key).await
    }
    async fn insert(&mut self, employee: &Employee) -> StoreResult<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.insert(employee).await
    }
    async fn update(&mut self, id: EmployeeId, fields: &EmployeeFields) -> StoreResult<bool> {
        self.inner.update(id, fields).await
    }
    async fn delete(&mut self, id: EmployeeId) -> StoreResult<bool> {
        self.inner.delete(id).await
    }
    async fn commit(&mut self) -> StoreResult<()> {
        self.inner.commit().await
    }
    async fn rollback(&mut self) -> StoreResult<()> {
        self.inner.rollback().await
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> Response<Body> {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None).await
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(body)).await
}

pub async fn put_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    send(app, Method::PUT, uri, Some(body)).await
}

pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, None).await
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

/// Poll an import until `ready` holds for its view, returning that view.
pub async fn wait_for_view(app: &Router, id: i64, ready: impl Fn(&Value) -> bool) -> Value {
    for _ in 0..500 {
        let view = body_json(get(app.clone(), &format!("/api/v1/imports/{id}")).await).await;
        if ready(&view["data"]) {
            return view["data"].clone();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("import {id} never reached the expected state");
}

/// Poll an import until it leaves `running`, returning its final view.
pub async fn wait_for_import(app: &Router, id: i64) -> Value {
    wait_for_view(app, id, |view| view["status"] != "running").await
}
