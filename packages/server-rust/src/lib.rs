//! Tunnel Server -- queue batch engine, output capture, and HTTP entry point
//! for routing tunnel calls to an invoker.

pub mod capture;
pub mod network;
pub mod queue;
pub mod service;

pub use capture::{capture_during, Captured, SandboxError};
pub use queue::{QueueHandler, SqsBatchResponse, SqsEvent};
pub use service::{BatchEngine, BatchModes, BatchResult, Dispatcher, GatewayConfig};
