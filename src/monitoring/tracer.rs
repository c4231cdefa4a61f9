/*!
 * Structured Tracing
 * Subscriber setup and spans around relief passes
 *
 * Features:
 * - Env-filtered output via RUST_LOG
 * - JSON-formatted logs for structured parsing
 * - Relief spans carrying pass id, outcome and duration
 */

use crate::core::limits::{ENV_TRACE_JSON, SLOW_RELIEF};
use crate::core::types::{Critical, Synchronous};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info, span, warn, Level, Span};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

static NEXT_PASS_ID: AtomicU64 = AtomicU64::new(1);

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - MEMPRESSURE_TRACE_JSON: Enable JSON output (default: false)
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var(ENV_TRACE_JSON)
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .init();
        info!("Structured tracing initialized with JSON output");
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .init();
        info!("Structured tracing initialized");
    }
}

/// Span covering one relief pass, from uninstall to hold-off arming
pub struct ReliefSpan {
    span: Span,
    start: Instant,
    pass_id: u64,
}

impl ReliefSpan {
    pub fn new(critical: Critical, synchronous: Synchronous) -> Self {
        let pass_id = NEXT_PASS_ID.fetch_add(1, Ordering::Relaxed);

        let span = span!(
            Level::DEBUG,
            "relief",
            pass_id = pass_id,
            critical = %critical,
            synchronous = %synchronous,
            bytes_freed = tracing::field::Empty,
            hold_off_ms = tracing::field::Empty,
            duration_us = tracing::field::Empty,
        );

        Self {
            span,
            start: Instant::now(),
            pass_id,
        }
    }

    pub fn pass_id(&self) -> u64 {
        self.pass_id
    }

    pub fn record_bytes_freed(&self, bytes_freed: i64) {
        self.span.record("bytes_freed", bytes_freed);
    }

    pub fn record_hold_off(&self, hold_off_ms: u64) {
        self.span.record("hold_off_ms", hold_off_ms);
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for ReliefSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        self.span.record("duration_us", duration.as_micros() as u64);
        let _entered = self.span.enter();

        if duration > SLOW_RELIEF {
            warn!(
                pass_id = self.pass_id,
                duration_ms = duration.as_millis() as u64,
                slow = true,
                "slow relief pass"
            );
        } else {
            debug!(
                pass_id = self.pass_id,
                duration_us = duration.as_micros() as u64,
                "relief pass completed"
            );
        }
    }
}

/// Helper to open a relief span
#[inline]
pub fn span_relief(critical: Critical, synchronous: Synchronous) -> ReliefSpan {
    ReliefSpan::new(critical, synchronous)
}
