//! Per-invocation instrumentation.
//!
//! Every call through the pipeline gets an `invoke` span carrying the
//! handler name, the payload size, the outcome, and the elapsed time. The
//! same labels feed a `metrics` counter and a latency histogram.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use tower::{Layer, Service};
use tracing::{info_span, Instrument};
use tunnel_core::InvokeError;

use crate::service::invoke::InvokeRequest;

/// Label used when the remainder path has no segment to name a handler by.
const ROOT_HANDLER: &str = "root";

/// Handler name of a remainder path: its first non-empty segment.
///
/// `/pkg/run/now` is served by `pkg`. Remainders such as `/` have no
/// segment and are labelled `root`.
fn handler_name(remainder: &str) -> &str {
    remainder
        .split('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or(ROOT_HANDLER)
}

/// Outcome label of a finished invocation.
fn outcome_label(result: &Result<String, InvokeError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(InvokeError::NotFound { .. }) => "not_found",
        Err(_) => "error",
    }
}

/// Tower layer that instruments invocations.
#[derive(Debug, Clone)]
pub struct MetricsLayer;

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService { inner }
    }
}

/// Service wrapper produced by [`MetricsLayer`].
#[derive(Debug, Clone)]
pub struct MetricsService<S> {
    inner: S,
}

impl<S> Service<InvokeRequest> for MetricsService<S>
where
    S: Service<InvokeRequest, Response = String, Error = InvokeError> + Send,
    S::Future: Send + 'static,
{
    type Response = String;
    type Error = InvokeError;
    type Future = Pin<Box<dyn Future<Output = Result<String, InvokeError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: InvokeRequest) -> Self::Future {
        let handler = handler_name(&req.path).to_string();
        let span = info_span!(
            "invoke",
            handler = %handler,
            path = %req.path,
            payload_bytes = req.payload.len(),
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        let fut = self.inner.call(req);

        Box::pin(
            async move {
                let start = Instant::now();
                let result = fut.await;
                let elapsed = start.elapsed();
                let outcome = outcome_label(&result);

                #[allow(clippy::cast_possible_truncation)]
                let duration_ms = elapsed.as_millis() as u64;
                let span = tracing::Span::current();
                span.record("duration_ms", duration_ms);
                span.record("outcome", outcome);

                metrics::counter!(
                    "tunnel_invocations_total",
                    "handler" => handler.clone(),
                    "outcome" => outcome
                )
                .increment(1);
                metrics::histogram!("tunnel_invocation_duration_seconds", "handler" => handler)
                    .record(elapsed.as_secs_f64());

                if outcome == "ok" {
                    tracing::debug!(duration_ms, "invocation complete");
                } else {
                    tracing::debug!(duration_ms, outcome, "invocation did not succeed");
                }

                result
            }
            .instrument(span),
        )
    }
}
