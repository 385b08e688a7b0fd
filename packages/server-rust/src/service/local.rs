//! In-process invoker backed by a table of named handler functions.
//!
//! The first segment of the invoked path selects the handler; the full path
//! and payload are passed through. Used by the `local-gateway` binary and by
//! tests that need a real `Invoker` without a remote runtime.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tunnel_core::{InvokeError, Invoker};

/// A registered handler: `(path, payload) -> result or error text`.
pub type HandlerFn = Arc<dyn Fn(&str, &str) -> Result<String, String> + Send + Sync>;

/// Invoker dispatching on the first path segment.
///
/// `/echo/a/b` runs the handler registered as `"echo"` with path `/echo/a/b`.
#[derive(Default)]
pub struct LocalInvoker {
    handlers: DashMap<String, HandlerFn>,
}

impl LocalInvoker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`, replacing any earlier one.
    pub fn register<F>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(&str, &str) -> Result<String, String> + Send + Sync + 'static,
    {
        let name = name.into();
        tracing::debug!(handler = %name, "registered local handler");
        self.handlers.insert(name, Arc::new(handler));
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with_handler<F>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&str, &str) -> Result<String, String> + Send + Sync + 'static,
    {
        self.register(name, handler);
        self
    }

    /// Names of all registered handlers, sorted.
    #[must_use]
    pub fn handler_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    fn lookup(&self, path: &str) -> Option<HandlerFn> {
        let name = path.trim_start_matches('/').split('/').next()?;
        // Clone the Arc out so the shard lock is not held across the call.
        self.handlers.get(name).map(|h| Arc::clone(h.value()))
    }
}

#[async_trait]
impl Invoker for LocalInvoker {
    async fn invoke(&self, path: &str, payload: &str) -> Result<String, InvokeError> {
        let handler = self.lookup(path).ok_or_else(|| InvokeError::NotFound {
            path: path.to_string(),
        })?;
        handler(path, payload).map_err(InvokeError::Handler)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn invoker() -> LocalInvoker {
        LocalInvoker::new()
            .with_handler("echo", |path, payload| Ok(format!("{path}|{payload}")))
            .with_handler("reject", |_, payload| Err(format!("rejected {payload}")))
    }

    #[tokio::test]
    async fn first_segment_selects_handler() {
        let result = invoker().invoke("/echo/v1/run", "x").await.unwrap();
        assert_eq!(result, "/echo/v1/run|x");
    }

    #[tokio::test]
    async fn bare_name_selects_handler() {
        let result = invoker().invoke("/echo", "").await.unwrap();
        assert_eq!(result, "/echo|");
    }

    #[tokio::test]
    async fn unknown_handler_is_not_found() {
        let err = invoker().invoke("/missing/x", "").await.unwrap_err();
        assert!(matches!(err, InvokeError::NotFound { ref path } if path == "/missing/x"));
    }

    #[tokio::test]
    async fn empty_path_is_not_found() {
        let err = invoker().invoke("", "").await.unwrap_err();
        assert!(matches!(err, InvokeError::NotFound { .. }));
    }

    #[tokio::test]
    async fn handler_error_text_is_preserved() {
        let err = invoker().invoke("/reject", "it").await.unwrap_err();
        assert_eq!(err.to_string(), "rejected it");
    }

    #[test]
    fn reregistering_replaces_handler() {
        let invoker = invoker();
        invoker.register("echo", |_, _| Ok("replaced".to_string()));
        assert_eq!(invoker.handler_names(), vec!["echo", "reject"]);
    }
}
