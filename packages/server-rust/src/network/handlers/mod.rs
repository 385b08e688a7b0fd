//! HTTP handler definitions for the gateway.
//!
//! This module defines `AppState` (the shared state carried through axum
//! extractors) and re-exports the handler functions used by the router.

pub mod gateway;

pub use gateway::gateway_handler;

use crate::service::Dispatcher;

/// Shared application state passed to all axum handlers via `State` extraction.
///
/// Cloning is cheap: the dispatcher shares its route table and invoker.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
}
