use async_trait::async_trait;

/// Errors returned by an [`Invoker`].
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    /// No handler is registered for the path.
    #[error("no handler for {path}")]
    NotFound { path: String },
    /// The handler ran and reported an application error.
    #[error("{0}")]
    Handler(String),
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Executes the business handler resolved for a path.
///
/// How a path maps to a handler (package registry, remote fetch, in-process
/// table) is up to the implementation; the gateway only sees this call.
#[async_trait]
pub trait Invoker: Send + Sync {
    /// Invoke the handler for `path` with a textual payload.
    async fn invoke(&self, path: &str, payload: &str) -> Result<String, InvokeError>;
}
