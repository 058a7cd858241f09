//! Shared router harness for API integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use chime_api::{create_router, ApiConfig, AppState};
use chime_events::{ListenerPool, WorkerPoolConfig};
use chime_storage::{InMemoryCacheStore, InMemoryNotificationSource};
use chime_test_utils::cache_service;
use http_body_util::BodyExt;
use tower::ServiceExt;

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<InMemoryCacheStore>,
    pub source: Arc<InMemoryNotificationSource>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("response body is not JSON")
    }

    pub fn etag(&self) -> Option<&str> {
        self.headers.get("etag").and_then(|v| v.to_str().ok())
    }
}

/// Build the full router over an in-memory store and source.
/// Must be called from inside a Tokio runtime.
pub fn test_app() -> TestApp {
    let store = Arc::new(InMemoryCacheStore::new());
    let source = Arc::new(InMemoryNotificationSource::new());
    let cache = cache_service(store.clone(), source.clone());
    let pool = Arc::new(
        ListenerPool::start(WorkerPoolConfig::default()).expect("failed to start listener pool"),
    );
    let state = AppState::new(cache, pool, None);
    let router =
        create_router(state.clone(), &ApiConfig::default()).expect("failed to build router");

    TestApp {
        router,
        state,
        store,
        source,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router failed");
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("failed to read body")
            .to_bytes()
            .to_vec();
        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Wait until every submitted listener task has finished.
    pub async fn settle(&self) {
        let pool = self.state.pool.clone();
        let idle = async move {
            loop {
                let stats = pool.stats();
                let submitted = stats.queued + stats.surge_started + stats.caller_runs;
                if stats.completed + stats.panicked >= submitted {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), idle)
            .await
            .expect("listeners did not settle");
    }
}

pub fn get(uri: &str, member_id: Option<i64>, if_none_match: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(member_id) = member_id {
        builder = builder.header("x-member-id", member_id.to_string());
    }
    if let Some(tag) = if_none_match {
        builder = builder.header("if-none-match", tag);
    }
    builder.body(Body::empty()).expect("invalid request")
}

pub fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("invalid request")
}

pub fn post_empty(uri: &str) -> Request<Body> {
    Request::post(uri).body(Body::empty()).expect("invalid request")
}
