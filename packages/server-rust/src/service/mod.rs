//! Request handling shared by every entry point.
//!
//! 1. **Dispatch** (`dispatch`): route a processing context to its handler
//! 2. **Invoke pipeline** (`invoke`, `middleware`): Tower stack around the `Invoker`
//! 3. **Message processing** (`processor`): decode, dispatch, build the reply
//! 4. **Batch engine** (`batch`): ordered processing of a queue delivery
//! 5. **Local invoker** (`local`): in-process handlers for development and tests

pub mod batch;
pub mod config;
pub mod dispatch;
pub mod invoke;
pub mod local;
pub mod middleware;
pub mod processor;

#[cfg(test)]
pub(crate) mod test_support;

pub use batch::{BatchEngine, BatchModes, BatchResult, FatalBatchError};
pub use config::GatewayConfig;
pub use dispatch::{DispatchError, Dispatched, Dispatcher};
pub use invoke::{InvokeRequest, InvokeService};
pub use local::{HandlerFn, LocalInvoker};
pub use processor::{MessageError, MessageProcessor, Outcome};
