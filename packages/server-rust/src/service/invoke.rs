//! Tower adapter around the [`Invoker`] capability.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tower::Service;
use tunnel_core::{InvokeError, Invoker};

/// One call to a business handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeRequest {
    /// Remainder path produced by route matching.
    pub path: String,
    pub payload: String,
}

type BoxedFuture = Pin<Box<dyn Future<Output = Result<String, InvokeError>> + Send>>;

/// `tower::Service` that forwards every request to a shared [`Invoker`].
///
/// Always ready; cloning shares the invoker.
#[derive(Clone)]
pub struct InvokeService {
    invoker: Arc<dyn Invoker>,
}

impl InvokeService {
    #[must_use]
    pub fn new(invoker: Arc<dyn Invoker>) -> Self {
        Self { invoker }
    }
}

impl Service<InvokeRequest> for InvokeService {
    type Response = String;
    type Error = InvokeError;
    type Future = BoxedFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: InvokeRequest) -> Self::Future {
        let invoker = Arc::clone(&self.invoker);
        Box::pin(async move { invoker.invoke(&req.path, &req.payload).await })
    }
}
