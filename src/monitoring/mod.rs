/*!
 * Monitoring
 * Structured logging setup and memory usage readouts
 */

mod diagnostics;
mod tracer;

pub use diagnostics::{DiagnosticsSnapshot, MemoryDiagnostics, ReadoutThrottle};
pub use tracer::{init_tracing, span_relief, ReliefSpan};
