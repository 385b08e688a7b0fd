//! Pipeline composition: wraps the invoker adapter with middleware layers.

use std::sync::Arc;

use tower::ServiceBuilder;
use tunnel_core::Invoker;

use super::metrics::{MetricsLayer, MetricsService};
use crate::service::invoke::InvokeService;

/// The composed invoke stack. Cheap to clone; every clone shares the invoker.
pub type InvokePipeline = MetricsService<InvokeService>;

/// Build the invoke pipeline around `invoker`.
///
/// Layer order (outermost to innermost):
/// 1. `MetricsLayer` -- record timing and outcome
#[must_use]
pub fn build_invoke_pipeline(invoker: Arc<dyn Invoker>) -> InvokePipeline {
    ServiceBuilder::new()
        .layer(MetricsLayer)
        .service(InvokeService::new(invoker))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tower::ServiceExt;
    use tunnel_core::InvokeError;

    use super::*;
    use crate::service::invoke::InvokeRequest;

    struct Echo;

    #[async_trait]
    impl Invoker for Echo {
        async fn invoke(&self, _path: &str, payload: &str) -> Result<String, InvokeError> {
            Ok(payload.to_string())
        }
    }

    #[tokio::test]
    async fn pipeline_routes_through_all_layers() {
        let svc = build_invoke_pipeline(Arc::new(Echo));
        let resp = svc
            .oneshot(InvokeRequest {
                path: "/x".to_string(),
                payload: "ping".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(resp, "ping");
    }
}
