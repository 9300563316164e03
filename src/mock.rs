//! Mock upstream backend.
//!
//! Stands in for the auth-check and action-check services the target endpoint
//! depends on. Each route answers every request with its currently stubbed
//! status code and an empty body until re-stubbed, regardless of caller or
//! request body - the controller exists to force upstream failure classes,
//! not to model the upstream's real behavior.
//!
//! The controller is an explicitly owned instance rather than a process-wide
//! singleton: each scenario setup starts (or receives) one and calls
//! [`MockBackend::reset`] before running. Dropping it stops the server.

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};
use thiserror::Error;
use tracing::{error, info};

use crate::config::HarnessConfig;

/// Both routes serve this until stubbed otherwise.
pub const DEFAULT_STUB_STATUS: u16 = 200;

#[derive(Debug, Error)]
pub enum MockError {
    #[error("failed to build mock backend runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("failed to bind mock backend on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Current canned status per route. Overwrite-only, no history.
#[derive(Debug)]
struct StubTable {
    auth_status: AtomicU16,
    action_status: AtomicU16,
}

impl StubTable {
    fn new() -> Self {
        Self {
            auth_status: AtomicU16::new(DEFAULT_STUB_STATUS),
            action_status: AtomicU16::new(DEFAULT_STUB_STATUS),
        }
    }
}

/// Fault-injection controller for the simulated upstream dependency.
#[derive(Debug)]
pub struct MockBackend {
    addr: SocketAddr,
    stubs: Arc<StubTable>,
    // Owns the server task; dropped last, which shuts the server down.
    _runtime: tokio::runtime::Runtime,
}

impl MockBackend {
    /// Start on the configured mock port and route paths.
    pub fn start(config: &HarnessConfig) -> Result<Self, MockError> {
        Self::start_on(
            config.mock_port,
            &config.mock_auth_path,
            &config.mock_action_path,
        )
    }

    /// Start on an explicit port (0 for an ephemeral one, so each scenario
    /// can own an isolated instance under parallel execution).
    pub fn start_on(port: u16, auth_path: &str, action_path: &str) -> Result<Self, MockError> {
        let stubs = Arc::new(StubTable::new());
        let app = router(auth_path, action_path, stubs.clone());

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .map_err(MockError::Runtime)?;

        let requested = SocketAddr::from(([127, 0, 0, 1], port));
        let listener = runtime
            .block_on(tokio::net::TcpListener::bind(requested))
            .map_err(|source| MockError::Bind {
                addr: requested,
                source,
            })?;
        let addr = listener.local_addr().map_err(|source| MockError::Bind {
            addr: requested,
            source,
        })?;

        runtime.spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!(error = %e, "mock backend server exited");
            }
        });

        info!(%addr, "mock backend listening");
        Ok(Self {
            addr,
            stubs,
            _runtime: runtime,
        })
    }

    /// The bound address (useful with port 0).
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Full URL for a route path on this instance.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, normalize_path(path))
    }

    /// Replace the auth-check route's canned status for all subsequent calls.
    pub fn stub_auth_route(&self, status: u16) {
        info!(status, "stubbing mock auth route");
        self.stubs.auth_status.store(status, Ordering::SeqCst);
    }

    /// Replace the action-check route's canned status for all subsequent calls.
    pub fn stub_action_route(&self, status: u16) {
        info!(status, "stubbing mock action route");
        self.stubs.action_status.store(status, Ordering::SeqCst);
    }

    /// Restore both routes to the default 200. Scenarios call this during
    /// setup so stubs from a previous scenario cannot leak in.
    pub fn reset(&self) {
        self.stubs
            .auth_status
            .store(DEFAULT_STUB_STATUS, Ordering::SeqCst);
        self.stubs
            .action_status
            .store(DEFAULT_STUB_STATUS, Ordering::SeqCst);
    }
}

fn router(auth_path: &str, action_path: &str, stubs: Arc<StubTable>) -> Router {
    Router::new()
        .route(&normalize_path(auth_path), post(auth_handler))
        .route(&normalize_path(action_path), post(action_handler))
        .with_state(stubs)
}

fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

async fn auth_handler(State(stubs): State<Arc<StubTable>>) -> StatusCode {
    canned_status(stubs.auth_status.load(Ordering::SeqCst))
}

async fn action_handler(State(stubs): State<Arc<StubTable>>) -> StatusCode {
    canned_status(stubs.action_status.load(Ordering::SeqCst))
}

// Stub codes are arbitrary u16s; anything outside the valid HTTP range is
// served as 500.
fn canned_status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn status_of(app: Router, path: &str) -> u16 {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(path)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        response.status().as_u16()
    }

    #[tokio::test]
    async fn routes_default_to_200() {
        let stubs = Arc::new(StubTable::new());
        let app = router("/auth", "/doAction", stubs);

        assert_eq!(status_of(app.clone(), "/auth").await, 200);
        assert_eq!(status_of(app, "/doAction").await, 200);
    }

    #[tokio::test]
    async fn stubbing_replaces_a_route_until_restubbed() {
        let stubs = Arc::new(StubTable::new());
        let app = router("/auth", "/doAction", stubs.clone());

        stubs.auth_status.store(503, Ordering::SeqCst);
        assert_eq!(status_of(app.clone(), "/auth").await, 503);
        assert_eq!(status_of(app.clone(), "/auth").await, 503);

        stubs.auth_status.store(404, Ordering::SeqCst);
        assert_eq!(status_of(app, "/auth").await, 404);
    }

    #[tokio::test]
    async fn routes_are_stubbed_independently() {
        let stubs = Arc::new(StubTable::new());
        let app = router("/auth", "/doAction", stubs.clone());

        stubs.auth_status.store(401, Ordering::SeqCst);
        assert_eq!(status_of(app.clone(), "/auth").await, 401);
        assert_eq!(status_of(app, "/doAction").await, 200);
    }

    #[tokio::test]
    async fn out_of_range_codes_are_served_as_500() {
        let stubs = Arc::new(StubTable::new());
        let app = router("/auth", "/doAction", stubs.clone());

        stubs.auth_status.store(7, Ordering::SeqCst);
        assert_eq!(status_of(app, "/auth").await, 500);
    }

    #[test]
    fn path_normalization_adds_leading_slash() {
        assert_eq!(normalize_path("auth"), "/auth");
        assert_eq!(normalize_path("/auth"), "/auth");
    }

    // Socket-level tests below use a plain agent that treats 4xx/5xx as data.
    fn test_agent() -> ureq::Agent {
        ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent()
    }

    fn post_status(agent: &ureq::Agent, url: &str) -> u16 {
        agent.post(url).send_empty().unwrap().status().as_u16()
    }

    #[test]
    fn started_instance_serves_and_resets_over_the_wire() {
        let mock = MockBackend::start_on(0, "/auth", "/doAction").unwrap();
        let agent = test_agent();

        assert_eq!(post_status(&agent, &mock.url("/auth")), 200);
        assert_eq!(post_status(&agent, &mock.url("/doAction")), 200);

        mock.stub_auth_route(500);
        mock.stub_action_route(403);
        assert_eq!(post_status(&agent, &mock.url("/auth")), 500);
        assert_eq!(post_status(&agent, &mock.url("/doAction")), 403);

        mock.reset();
        assert_eq!(post_status(&agent, &mock.url("/auth")), 200);
        assert_eq!(post_status(&agent, &mock.url("/doAction")), 200);
    }

    #[test]
    fn two_instances_do_not_share_stub_state() {
        let a = MockBackend::start_on(0, "/auth", "/doAction").unwrap();
        let b = MockBackend::start_on(0, "/auth", "/doAction").unwrap();
        let agent = test_agent();

        a.stub_auth_route(500);
        assert_eq!(post_status(&agent, &a.url("/auth")), 500);
        assert_eq!(post_status(&agent, &b.url("/auth")), 200);
    }

    #[test]
    fn mock_backend_debug_names_the_instance() {
        let mock = MockBackend::start_on(0, "/auth", "/doAction").unwrap();
        let debug_str = format!("{:?}", mock);
        assert!(debug_str.contains("MockBackend"));
        assert!(debug_str.contains("addr"));
    }

    #[test]
    fn binding_an_occupied_port_is_an_error() {
        let first = MockBackend::start_on(0, "/auth", "/doAction").unwrap();
        let err = MockBackend::start_on(first.addr().port(), "/auth", "/doAction").unwrap_err();
        assert!(matches!(err, MockError::Bind { .. }));
    }
}
