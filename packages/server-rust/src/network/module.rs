//! Network module with deferred startup lifecycle.
//!
//! `new()` assembles the router state, `start()` binds the TCP listener, and
//! `serve()` accepts connections until the shutdown future resolves. Callers
//! learn the bound port between `start()` and `serve()`.

use std::future::Future;

use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use super::config::NetworkConfig;
use super::handlers::{gateway_handler, AppState};
use super::middleware::build_http_layers;
use crate::service::Dispatcher;

/// Manages the HTTP server lifecycle.
///
/// 1. `new()` -- captures configuration and the dispatcher
/// 2. `start()` -- binds the TCP listener to the configured address
/// 3. `serve()` -- serves requests until shutdown is signalled
pub struct NetworkModule {
    config: NetworkConfig,
    dispatcher: Dispatcher,
    listener: Option<TcpListener>,
}

impl NetworkModule {
    /// Creates a new network module without binding any port.
    #[must_use]
    pub fn new(config: NetworkConfig, dispatcher: Dispatcher) -> Self {
        Self {
            config,
            dispatcher,
            listener: None,
        }
    }

    /// Assembles the axum router: every path falls through to the
    /// dispatcher, wrapped in the transport layers.
    pub fn build_router(&self) -> Router {
        let state = AppState {
            dispatcher: self.dispatcher.clone(),
        };

        Router::new()
            .fallback(gateway_handler)
            .layer(build_http_layers(&self.config))
            .with_state(state)
    }

    /// Binds the TCP listener to the configured host and port.
    ///
    /// Returns the actual bound port, which may differ from the configured
    /// port when port 0 is used (OS-assigned ephemeral port).
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound (e.g., port in use).
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let port = listener.local_addr()?.port();

        info!(host = %self.config.host, port, "TCP listener bound");

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves requests until `shutdown` resolves, then finishes in-flight
    /// requests and returns.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called first or the server hits
    /// a fatal I/O error.
    pub async fn serve(
        mut self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let router = self.build_router();
        let listener = self
            .listener
            .take()
            .ok_or_else(|| anyhow::anyhow!("start() must be called before serve()"))?;

        info!("Serving HTTP connections");
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;
        info!("HTTP server stopped");
        Ok(())
    }
}
