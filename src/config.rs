//! Harness configuration.
//!
//! Settings resolve in three layers: hard-coded defaults, an optional
//! `sch.toml` file (or the path in `SCH_CONFIG`), then `SCH_*` environment
//! variables. A malformed value is logged and the previous layer's value is
//! kept; configuration loading never fails mid-scenario.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_API_KEY: &str = "qazWSXedc";
pub const DEFAULT_ENDPOINT: &str = "/endpoint";
pub const DEFAULT_MOCK_PORT: u16 = 8888;
pub const DEFAULT_MOCK_AUTH_PATH: &str = "/auth";
pub const DEFAULT_MOCK_ACTION_PATH: &str = "/doAction";
pub const DEFAULT_TOKEN_ALPHABET: &str = "ABCDEF0123456789";
pub const DEFAULT_TOKEN_INVALID_ALPHABET: &str =
    "abcdefghijklmnopqrstuvwxyz!@#$%^&*()_+-=[]{}|;:,.<>?";
pub const DEFAULT_TOKEN_LENGTH: usize = 32;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Resolved harness configuration, read-only for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Base URL of the target under test.
    pub base_url: String,
    /// Shared secret sent in the `X-Api-Key` header.
    pub api_key: String,
    /// Path of the protocol endpoint on the target.
    pub endpoint: String,
    /// Port the mock backend listens on when started from config.
    pub mock_port: u16,
    /// Route path of the mock auth-check service.
    pub mock_auth_path: String,
    /// Route path of the mock action-check service.
    pub mock_action_path: String,
    /// Characters a valid session token is drawn from.
    pub token_alphabet: String,
    /// Characters an invalid session token is drawn from. Must stay disjoint
    /// from `token_alphabet` for negative tests to mean anything.
    pub token_invalid_alphabet: String,
    /// Length of a valid session token.
    pub token_length: usize,
    /// Global connect/read timeout for protocol requests.
    pub request_timeout: Duration,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: DEFAULT_API_KEY.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            mock_port: DEFAULT_MOCK_PORT,
            mock_auth_path: DEFAULT_MOCK_AUTH_PATH.to_string(),
            mock_action_path: DEFAULT_MOCK_ACTION_PATH.to_string(),
            token_alphabet: DEFAULT_TOKEN_ALPHABET.to_string(),
            token_invalid_alphabet: DEFAULT_TOKEN_INVALID_ALPHABET.to_string(),
            token_length: DEFAULT_TOKEN_LENGTH,
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
        }
    }
}

/// Optional overrides as they appear in `sch.toml`. Unknown keys are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    base_url: Option<String>,
    api_key: Option<String>,
    endpoint: Option<String>,
    mock_port: Option<u16>,
    mock_auth_path: Option<String>,
    mock_action_path: Option<String>,
    token_alphabet: Option<String>,
    token_invalid_alphabet: Option<String>,
    token_length: Option<usize>,
    request_timeout_ms: Option<u64>,
}

impl HarnessConfig {
    /// Load configuration: defaults, then file, then environment.
    pub fn load() -> Self {
        let path = std::env::var("SCH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("sch.toml"));
        let mut config = Self::from_file(&path);
        config.apply_env();
        config
    }

    /// Load defaults overlaid with the given file, if it exists.
    pub fn from_file(path: &Path) -> Self {
        let mut config = Self::default();
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(text) => config.apply_file(&text),
                Err(e) => warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to read config file, using defaults"
                ),
            }
        } else {
            debug!(path = %path.display(), "config file not found, using defaults");
        }
        config
    }

    /// Full URL of the protocol endpoint.
    pub fn endpoint_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.endpoint.trim_start_matches('/')
        )
    }

    fn apply_file(&mut self, text: &str) {
        let file: FileConfig = match toml::from_str(text) {
            Ok(file) => file,
            Err(e) => {
                warn!(error = %e, "unparseable config file, using defaults");
                return;
            }
        };
        if let Some(v) = file.base_url {
            self.base_url = v;
        }
        if let Some(v) = file.api_key {
            self.api_key = v;
        }
        if let Some(v) = file.endpoint {
            self.endpoint = v;
        }
        if let Some(v) = file.mock_port {
            self.mock_port = v;
        }
        if let Some(v) = file.mock_auth_path {
            self.mock_auth_path = v;
        }
        if let Some(v) = file.mock_action_path {
            self.mock_action_path = v;
        }
        if let Some(v) = file.token_alphabet {
            self.token_alphabet = v;
        }
        if let Some(v) = file.token_invalid_alphabet {
            self.token_invalid_alphabet = v;
        }
        if let Some(v) = file.token_length {
            self.token_length = v;
        }
        if let Some(v) = file.request_timeout_ms {
            self.request_timeout = Duration::from_millis(v);
        }
    }

    /// Overlay `SCH_*` environment variables onto the current values.
    pub fn apply_env(&mut self) {
        if let Some(v) = env_var("BASE_URL") {
            self.base_url = v;
        }
        if let Some(v) = env_var("API_KEY") {
            self.api_key = v;
        }
        if let Some(v) = env_var("ENDPOINT") {
            self.endpoint = v;
        }
        if let Some(v) = env_var("MOCK_PORT") {
            match v.parse() {
                Ok(port) => self.mock_port = port,
                Err(_) => warn!(value = %v, "invalid SCH_MOCK_PORT, keeping previous value"),
            }
        }
        if let Some(v) = env_var("MOCK_AUTH_PATH") {
            self.mock_auth_path = v;
        }
        if let Some(v) = env_var("MOCK_ACTION_PATH") {
            self.mock_action_path = v;
        }
        if let Some(v) = env_var("TOKEN_ALPHABET") {
            self.token_alphabet = v;
        }
        if let Some(v) = env_var("TOKEN_INVALID_ALPHABET") {
            self.token_invalid_alphabet = v;
        }
        if let Some(v) = env_var("TOKEN_LENGTH") {
            match v.parse() {
                Ok(len) => self.token_length = len,
                Err(_) => warn!(value = %v, "invalid SCH_TOKEN_LENGTH, keeping previous value"),
            }
        }
        if let Some(v) = env_var("REQUEST_TIMEOUT_MS") {
            match v.parse() {
                Ok(ms) => self.request_timeout = Duration::from_millis(ms),
                Err(_) => {
                    warn!(value = %v, "invalid SCH_REQUEST_TIMEOUT_MS, keeping previous value")
                }
            }
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(format!("SCH_{name}")).ok()
}

#[cfg(test)]
pub(crate) fn env_test_lock() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::{Mutex, OnceLock};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    ENV_LOCK.get_or_init(|| Mutex::new(())).lock().unwrap()
}
