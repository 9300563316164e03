//! Test logging setup.
//!
//! Scenario failures are diagnosed from the request/response diagnostics the
//! steps layer emits via `tracing`; this initializer makes those visible
//! under `cargo test`. Safe to call from every test - initialization happens
//! once.
//!
//! Set `SCH_TEST_LOG` (an `EnvFilter` directive, e.g. `debug` or
//! `sch=trace`) to change verbosity.

use std::sync::Once;

static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_env("SCH_TEST_LOG")
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .compact()
            .try_init();
    });
}
