//! Session Conformance Harness
//!
//! Black-box conformance testing for the session protocol endpoint: a single
//! HTTP POST route taking a form-encoded `token` and `action` (one of `LOGIN`,
//! `ACTION`, `LOGOUT`) plus an `X-Api-Key` shared secret, answering with a
//! JSON body `{ "result": "OK"|"ERROR", "message": string|null }`.
//!
//! The harness synthesizes valid and protocol-violating requests, drives them
//! against the target, controls a mock stand-in for the target's upstream
//! dependency so failure paths are deterministic, and verifies responses
//! against the five recognized outcome classes.
//!
//! # Components
//!
//! - [`config`] - layered configuration (defaults, `sch.toml`, `SCH_*` env)
//! - [`token`] - session token generation from valid/invalid alphabets
//! - [`request`] - immutable request descriptions with token redaction
//! - [`client`] - synchronous HTTP dispatch against the target endpoint
//! - [`mock`] - fault-injection controller for the upstream dependency
//! - [`steps`] - named protocol operations and contract verification

pub mod client;
pub mod config;
pub mod mock;
pub mod request;
pub mod steps;
pub mod testing;
pub mod token;

pub use client::{ProtocolClient, ProtocolResponse, ResponseBody, TransportError};
pub use config::HarnessConfig;
pub use mock::{MockBackend, MockError};
pub use request::{ProtocolVerb, RequestSpec, RequestSpecBuilder};
pub use steps::{ContractViolation, Outcome, ProtocolSteps};
pub use token::{TokenError, TokenGenerator};
