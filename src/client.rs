//! HTTP dispatch against the target endpoint.
//!
//! One synchronous POST per [`RequestSpec`], form-encoded. 4xx/5xx responses
//! are valid protocol data at this layer and are returned like any other;
//! only network-level failures become errors, and those are never retried -
//! masking a transient failure would hide real target unavailability.

use crate::config::HarnessConfig;
use crate::request::RequestSpec;
use serde::Deserialize;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// Network-level failure of a protocol request.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {url} failed: {source}")]
    Send {
        url: String,
        #[source]
        source: ureq::Error,
    },

    #[error("reading response body from {url} failed: {source}")]
    Body {
        url: String,
        #[source]
        source: ureq::Error,
    },
}

/// The documented JSON response shape of the target endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ResponseBody {
    pub result: Option<String>,
    pub message: Option<String>,
}

/// One observed response, read-only once returned.
#[derive(Debug, Clone)]
pub struct ProtocolResponse {
    /// The request this response answered, kept for diagnostics.
    pub request: RequestSpec,
    /// HTTP status code.
    pub status: u16,
    /// Parsed body, `None` when the body is not the contract's JSON shape.
    pub body: Option<ResponseBody>,
    /// Raw body text for failure reports.
    pub raw_body: String,
    /// Wall-clock time from dispatch to body read.
    pub elapsed: Duration,
}

impl ProtocolResponse {
    pub fn result(&self) -> Option<&str> {
        self.body.as_ref().and_then(|b| b.result.as_deref())
    }

    pub fn message(&self) -> Option<&str> {
        self.body.as_ref().and_then(|b| b.message.as_deref())
    }
}

/// Synchronous HTTP client for the protocol endpoint.
pub struct ProtocolClient {
    agent: ureq::Agent,
    endpoint_url: String,
    api_key: String,
}

impl ProtocolClient {
    pub fn new(config: &HarnessConfig) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(config.request_timeout))
            // 4xx/5xx are expected protocol outcomes, not transport errors.
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self {
            agent,
            endpoint_url: config.endpoint_url(),
            api_key: config.api_key.clone(),
        }
    }

    /// Execute the spec, choosing the with-key or without-key path.
    pub fn send(&self, spec: &RequestSpec) -> Result<ProtocolResponse, TransportError> {
        if spec.include_api_key() {
            self.send_with_key(spec)
        } else {
            self.send_without_key(spec)
        }
    }

    // The two paths are structurally separate: the protocol under test
    // distinguishes "header absent" from "header empty".
    fn send_with_key(&self, spec: &RequestSpec) -> Result<ProtocolResponse, TransportError> {
        let started = Instant::now();
        let response = self
            .agent
            .post(&self.endpoint_url)
            .header("X-Api-Key", self.api_key.as_str())
            .header("Accept", "application/json")
            .send_form(form_fields(spec))
            .map_err(|source| TransportError::Send {
                url: self.endpoint_url.clone(),
                source,
            })?;
        self.finish(spec, response, started)
    }

    fn send_without_key(&self, spec: &RequestSpec) -> Result<ProtocolResponse, TransportError> {
        let started = Instant::now();
        let response = self
            .agent
            .post(&self.endpoint_url)
            .header("Accept", "application/json")
            .send_form(form_fields(spec))
            .map_err(|source| TransportError::Send {
                url: self.endpoint_url.clone(),
                source,
            })?;
        self.finish(spec, response, started)
    }

    fn finish(
        &self,
        spec: &RequestSpec,
        mut response: ureq::http::Response<ureq::Body>,
        started: Instant,
    ) -> Result<ProtocolResponse, TransportError> {
        let status = response.status().as_u16();
        let raw_body =
            response
                .body_mut()
                .read_to_string()
                .map_err(|source| TransportError::Body {
                    url: self.endpoint_url.clone(),
                    source,
                })?;
        let elapsed = started.elapsed();
        let body = serde_json::from_str::<ResponseBody>(&raw_body).ok();

        debug!(
            status,
            elapsed_ms = elapsed.as_millis() as u64,
            parsed = body.is_some(),
            "protocol response received"
        );

        Ok(ProtocolResponse {
            request: spec.clone(),
            status,
            body,
            raw_body,
            elapsed,
        })
    }
}

// A `None` field is omitted entirely, which the target treats differently
// from an empty value.
fn form_fields(spec: &RequestSpec) -> Vec<(&'static str, &str)> {
    let mut fields = Vec::with_capacity(2);
    if let Some(token) = spec.token() {
        fields.push(("token", token));
    }
    if let Some(action) = spec.action() {
        fields.push(("action", action));
    }
    fields
}
