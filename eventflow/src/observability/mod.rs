//! Observability utilities.

mod logging;
mod spans;

pub use logging::{init_json_logging, init_logging};
pub use spans::{run_span, RunSpanAttributes, SpanTimer};
