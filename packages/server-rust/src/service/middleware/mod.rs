//! Tower middleware layers for handler invocations.
//!
//! - [`metrics`]: Invocation timing and counting via `tracing` spans and `metrics` counters
//! - [`pipeline`]: Composes all layers into a single service stack

pub mod metrics;
pub mod pipeline;

pub use metrics::MetricsLayer;
pub use pipeline::{build_invoke_pipeline, InvokePipeline};
