//! Scenario support: an in-process stand-in for the target endpoint plus a
//! per-scenario rig wiring it to its own mock backend.
//!
//! The stand-in implements the documented contract of the session protocol
//! endpoint - key check first, then token/action validation, then the
//! session-state check, then the upstream call through the mock backend -
//! so the scenario suite runs hermetically. It is a test fixture, not a
//! reference server.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::{Form, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::post;
use serde::Deserialize;
use serde_json::json;

use sch::config::HarnessConfig;
use sch::mock::MockBackend;
use sch::steps::ProtocolSteps;
use sch::testing::init_test_logging;
use sch::token::TokenGenerator;

/// Everything one scenario owns: mock backend, stand-in target, config,
/// steps, token generator. Each scenario starts its own rig on ephemeral
/// ports, so scenarios stay independent under parallel execution.
pub struct TestRig {
    pub mock: MockBackend,
    pub steps: ProtocolSteps,
    pub tokens: TokenGenerator,
    pub config: HarnessConfig,
    // Held for its lifetime; dropping it stops the stand-in target.
    _target: StubTarget,
}

impl TestRig {
    pub fn start() -> Self {
        init_test_logging();

        let mut config = HarnessConfig::default();
        let mock = MockBackend::start_on(0, &config.mock_auth_path, &config.mock_action_path)
            .expect("mock backend");
        // Stub state must be at its defaults before the scenario runs.
        mock.reset();

        let target = StubTarget::start(&config, mock.addr());
        config.base_url = target.base_url();

        let steps = ProtocolSteps::new(&config);
        let tokens = TokenGenerator::from_config(&config).expect("token generator");

        Self {
            mock,
            steps,
            tokens,
            config,
            _target: target,
        }
    }
}

/// In-process stand-in for the target endpoint.
pub struct StubTarget {
    addr: SocketAddr,
    _runtime: tokio::runtime::Runtime,
}

struct TargetState {
    api_key: String,
    token_length: usize,
    alphabet: Vec<char>,
    auth_url: String,
    action_url: String,
    sessions: Mutex<HashSet<String>>,
    upstream: ureq::Agent,
}

#[derive(Deserialize)]
struct ProtocolForm {
    token: Option<String>,
    action: Option<String>,
}

impl StubTarget {
    pub fn start(config: &HarnessConfig, mock_addr: SocketAddr) -> Self {
        let state = Arc::new(TargetState {
            api_key: config.api_key.clone(),
            token_length: config.token_length,
            alphabet: config.token_alphabet.chars().collect(),
            auth_url: format!("http://{}{}", mock_addr, config.mock_auth_path),
            action_url: format!("http://{}{}", mock_addr, config.mock_action_path),
            sessions: Mutex::new(HashSet::new()),
            upstream: ureq::Agent::config_builder()
                .http_status_as_error(false)
                .build()
                .new_agent(),
        });

        let app = Router::new()
            .route(&config.endpoint, post(endpoint_handler))
            .with_state(state);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .expect("stub target runtime");
        let listener = runtime
            .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
            .expect("stub target bind");
        let addr = listener.local_addr().expect("stub target addr");
        runtime.spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            _runtime: runtime,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

async fn endpoint_handler(
    State(state): State<Arc<TargetState>>,
    headers: HeaderMap,
    Form(form): Form<ProtocolForm>,
) -> Response {
    // Key check precedes everything, independent of token/action validity.
    match headers.get("x-api-key") {
        Some(value) if value.as_bytes() == state.api_key.as_bytes() => {}
        _ => return protocol_error(StatusCode::UNAUTHORIZED, "missing or invalid api key"),
    }

    let token = match &form.token {
        Some(token) if is_valid_token(&state, token) => token.clone(),
        _ => return protocol_error(StatusCode::BAD_REQUEST, "malformed or missing token"),
    };

    let action = match form.action.as_deref() {
        Some(action @ ("LOGIN" | "ACTION" | "LOGOUT")) => action.to_string(),
        _ => return protocol_error(StatusCode::BAD_REQUEST, "unknown or missing action"),
    };

    // Session-state check: LOGIN only from NoSession, ACTION/LOGOUT only
    // from Active.
    {
        let sessions = state.sessions.lock().expect("sessions lock");
        let active = sessions.contains(&token);
        match action.as_str() {
            "LOGIN" if active => {
                return protocol_error(StatusCode::FORBIDDEN, "session already active");
            }
            "ACTION" | "LOGOUT" if !active => {
                return protocol_error(StatusCode::FORBIDDEN, "no active session");
            }
            _ => {}
        }
    }

    // Upstream dependency check; any non-200 answer maps to 500.
    let upstream_url = match action.as_str() {
        "LOGIN" => Some(state.auth_url.clone()),
        "ACTION" => Some(state.action_url.clone()),
        _ => None,
    };
    if let Some(url) = upstream_url {
        let agent = state.upstream.clone();
        let upstream_status = tokio::task::spawn_blocking(move || {
            agent
                .post(&url)
                .send_empty()
                .map(|response| response.status().as_u16())
                .unwrap_or(0)
        })
        .await
        .unwrap_or(0);
        if upstream_status != 200 {
            return protocol_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "upstream dependency failed",
            );
        }
    }

    let mut sessions = state.sessions.lock().expect("sessions lock");
    match action.as_str() {
        "LOGIN" => {
            sessions.insert(token);
        }
        "LOGOUT" => {
            sessions.remove(&token);
        }
        _ => {}
    }

    (StatusCode::OK, Json(json!({ "result": "OK", "message": null }))).into_response()
}

fn is_valid_token(state: &TargetState, token: &str) -> bool {
    token.chars().count() == state.token_length
        && token.chars().all(|c| state.alphabet.contains(&c))
}

fn protocol_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "result": "ERROR", "message": message }))).into_response()
}
