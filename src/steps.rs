//! Protocol orchestration and response verification.
//!
//! From the harness's black-box perspective the target walks
//! `NoSession -> Active -> NoSession`: LOGIN opens a session, LOGOUT closes
//! it, and ACTION is only valid while a session is active. The steps layer
//! gives those transitions names and dispatches them through the client;
//! verification is always an explicit, separate call - a returned response
//! asserts nothing by itself.
//!
//! [`Outcome`] encodes the full taxonomy of responses the protocol
//! recognizes. Anything outside the five shapes is a contract violation to be
//! flagged, never silently coerced into the nearest class.

use crate::client::{ProtocolClient, ProtocolResponse, TransportError};
use crate::config::HarnessConfig;
use crate::request::RequestSpec;
use anyhow::Context;
use std::fmt;
use thiserror::Error;
use tracing::{error, info};

/// The five recognized (status, result, message-presence) response shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Success,
    ValidationError,
    AuthError,
    ForbiddenError,
    ExternalServiceError,
}

impl Outcome {
    pub const ALL: [Outcome; 5] = [
        Self::Success,
        Self::ValidationError,
        Self::AuthError,
        Self::ForbiddenError,
        Self::ExternalServiceError,
    ];

    pub fn expected_status(self) -> u16 {
        match self {
            Self::Success => 200,
            Self::ValidationError => 400,
            Self::AuthError => 401,
            Self::ForbiddenError => 403,
            Self::ExternalServiceError => 500,
        }
    }

    pub fn expected_result(self) -> &'static str {
        match self {
            Self::Success => "OK",
            _ => "ERROR",
        }
    }

    /// Whether the outcome requires a non-empty `message`. Success requires
    /// the opposite: `message` must be absent or null.
    pub fn expects_message(self) -> bool {
        !matches!(self, Self::Success)
    }

    /// Check a response against this outcome. Pure: no I/O, no logging.
    pub fn check(self, response: &ProtocolResponse) -> Result<(), ContractViolation> {
        let request = response.request.to_string();

        if response.status != self.expected_status() {
            return Err(ContractViolation::Status {
                outcome: self,
                expected: self.expected_status(),
                actual: response.status,
                request,
                body: response.raw_body.clone(),
            });
        }

        let Some(body) = &response.body else {
            return Err(ContractViolation::MalformedBody {
                request,
                body: response.raw_body.clone(),
            });
        };

        if body.result.as_deref() != Some(self.expected_result()) {
            return Err(ContractViolation::ResultTag {
                expected: self.expected_result(),
                actual: body.result.clone(),
                request,
            });
        }

        if self.expects_message() {
            match body.message.as_deref() {
                Some(message) if !message.is_empty() => {}
                other => {
                    return Err(ContractViolation::MissingMessage {
                        actual: other.map(str::to_string),
                        request,
                    });
                }
            }
        } else if let Some(message) = &body.message {
            return Err(ContractViolation::UnexpectedMessage {
                actual: message.clone(),
                request,
            });
        }

        Ok(())
    }

    /// Which recognized shape a response matches, if any. `None` means the
    /// response violates the contract outright.
    pub fn classify(response: &ProtocolResponse) -> Option<Outcome> {
        Self::ALL
            .into_iter()
            .find(|outcome| outcome.check(response).is_ok())
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Success => "success",
            Self::ValidationError => "validation-error",
            Self::AuthError => "auth-error",
            Self::ForbiddenError => "forbidden-error",
            Self::ExternalServiceError => "external-service-error",
        };
        f.write_str(name)
    }
}

/// A response that does not match the expected outcome, naming the field
/// that mismatched and carrying the redacted request plus raw body so the
/// failure is diagnosable without re-running.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContractViolation {
    #[error(
        "expected status {expected} for {outcome}, got {actual} ({request}, body: {body:?})"
    )]
    Status {
        outcome: Outcome,
        expected: u16,
        actual: u16,
        request: String,
        body: String,
    },

    #[error("response body is not the contract's JSON shape ({request}, body: {body:?})")]
    MalformedBody { request: String, body: String },

    #[error("expected result {expected:?}, got {actual:?} ({request})")]
    ResultTag {
        expected: &'static str,
        actual: Option<String>,
        request: String,
    },

    #[error("expected a non-empty message, got {actual:?} ({request})")]
    MissingMessage {
        actual: Option<String>,
        request: String,
    },

    #[error("expected no message, got {actual:?} ({request})")]
    UnexpectedMessage { actual: String, request: String },
}

/// Orchestration layer composing the builder and client into named protocol
/// operations.
pub struct ProtocolSteps {
    client: ProtocolClient,
}

impl ProtocolSteps {
    pub fn new(config: &HarnessConfig) -> Self {
        Self {
            client: ProtocolClient::new(config),
        }
    }

    /// Dispatch a spec and log request/response diagnostics. The response is
    /// returned unverified.
    pub fn execute(&self, spec: &RequestSpec) -> Result<ProtocolResponse, TransportError> {
        info!(request = %spec, "dispatching protocol request");
        let response = self.client.send(spec)?;
        info!(
            status = response.status,
            elapsed_ms = response.elapsed.as_millis() as u64,
            body = %response.raw_body,
            "protocol response"
        );
        Ok(response)
    }

    pub fn login(&self, token: &str) -> Result<ProtocolResponse, TransportError> {
        self.execute(&RequestSpec::builder().token(token).login().build())
    }

    pub fn action(&self, token: &str) -> Result<ProtocolResponse, TransportError> {
        self.execute(&RequestSpec::builder().token(token).action().build())
    }

    pub fn logout(&self, token: &str) -> Result<ProtocolResponse, TransportError> {
        self.execute(&RequestSpec::builder().token(token).logout().build())
    }

    /// LOGIN, ACTION, LOGOUT in sequence, each verified as a success. The
    /// first failure aborts the flow; there is nothing to roll back against a
    /// black-box target.
    pub fn full_flow(&self, token: &str) -> anyhow::Result<()> {
        let login = self.login(token).context("LOGIN dispatch")?;
        self.verify(&login, Outcome::Success).context("LOGIN step")?;

        let action = self.action(token).context("ACTION dispatch")?;
        self.verify(&action, Outcome::Success)
            .context("ACTION step")?;

        let logout = self.logout(token).context("LOGOUT dispatch")?;
        self.verify(&logout, Outcome::Success)
            .context("LOGOUT step")?;

        Ok(())
    }

    /// [`Outcome::check`] plus a logged diagnostic on violation.
    pub fn verify(
        &self,
        response: &ProtocolResponse,
        outcome: Outcome,
    ) -> Result<(), ContractViolation> {
        let result = outcome.check(response);
        if let Err(violation) = &result {
            error!(%violation, "contract violation");
        }
        result
    }
}
