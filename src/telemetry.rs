//! Tracing bootstrap for applications embedding this crate.
//!
//! Ported from the teacher's `flashq::telemetry::init()`: a `tracing_subscriber`
//! registry with an `EnvFilter` read from `RUST_LOG`, bridging `log` records
//! through `tracing_log::LogTracer` so dependencies that still emit via `log`
//! show up in the same stream. Safe to call more than once — later calls are
//! no-ops.

use std::sync::Once;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

static INIT: Once = Once::new();

/// Initialize `tracing` output for this process, honoring `RUST_LOG`
/// (defaulting to `info` when unset). Idempotent.
pub fn init() {
    INIT.call_once(|| {
        let _ = tracing_log::LogTracer::init();

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let fmt_layer = fmt::layer().with_target(true).compact();

        let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);

        if tracing::subscriber::set_global_default(subscriber).is_err() {
            tracing::debug!("tracing subscriber already set; skipping re-initialization");
        }
    });
}
