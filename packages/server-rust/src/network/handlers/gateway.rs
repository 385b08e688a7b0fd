//! Fallback handler: every HTTP request goes through the dispatcher.

use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use tunnel_core::ProcessingContext;

use super::AppState;
use crate::service::DispatchError;

/// Runs the request path and body through the shared dispatcher.
///
/// | outcome | status |
/// |---|---|
/// | success | 200, `text/plain` (`application/json` for debug routes) |
/// | no route | 404 |
/// | handler error | 502 with the error text |
/// | output capture failure | 500 |
pub async fn gateway_handler(State(state): State<AppState>, uri: Uri, body: Bytes) -> Response {
    let mut ctx = ProcessingContext::new(uri.path(), &body);

    match state.dispatcher.dispatch(&mut ctx).await {
        Ok(_) => {
            let content_type = if ctx.debug {
                "application/json"
            } else {
                "text/plain; charset=utf-8"
            };
            (
                [(header::CONTENT_TYPE, content_type)],
                ctx.result.unwrap_or_default(),
            )
                .into_response()
        }
        Err(e) => {
            let status = match &e {
                DispatchError::NoRoute(_) => StatusCode::NOT_FOUND,
                DispatchError::Handler { .. } => StatusCode::BAD_GATEWAY,
                DispatchError::Sandbox(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            tracing::warn!(
                path = %ctx.path,
                status = status.as_u16(),
                error = %e,
                "request failed"
            );
            let text = match e {
                DispatchError::Handler { source, .. } => source.to_string(),
                other => other.to_string(),
            };
            (status, text).into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use axum::Router;
    use serial_test::serial;
    use tower::ServiceExt;

    use super::*;
    use crate::service::test_support::{dispatcher, ScriptedInvoker};

    fn app(invoker: &Arc<ScriptedInvoker>) -> Router {
        Router::new()
            .fallback(gateway_handler)
            .with_state(AppState {
                dispatcher: dispatcher(invoker),
            })
    }

    async fn send(
        app: Router,
        method: &str,
        uri: &str,
        body: &str,
    ) -> (StatusCode, String, String) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, content_type, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn api_request_returns_handler_result() {
        let invoker = Arc::new(ScriptedInvoker::default());
        let (status, content_type, body) = send(app(&invoker), "POST", "/api/pkg/run", "hi").await;

        assert_eq!(status, StatusCode::OK);
        assert!(content_type.starts_with("text/plain"));
        assert_eq!(body, "/pkg/run:hi");
    }

    #[tokio::test]
    async fn health_check_answers_without_invoking() {
        let invoker = Arc::new(ScriptedInvoker::default());
        for path in ["/", "/health-check"] {
            let (status, _, body) = send(app(&invoker), "GET", path, "").await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, "OK");
        }
        assert!(invoker.calls().is_empty());
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let invoker = Arc::new(ScriptedInvoker::default());
        let (status, _, body) = send(app(&invoker), "GET", "/pkg/run", "").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("/pkg/run"));
    }

    #[tokio::test]
    async fn handler_error_is_bad_gateway() {
        let invoker = Arc::new(ScriptedInvoker::default());
        let (status, _, body) = send(app(&invoker), "POST", "/wapi/fail/now", "").await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body, "boom at /fail/now");
    }

    #[tokio::test]
    async fn query_string_is_not_part_of_the_path() {
        let invoker = Arc::new(ScriptedInvoker::default());
        let (status, _, body) = send(app(&invoker), "GET", "/api/pkg/run?x=1", "").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "/pkg/run:");
    }

    #[tokio::test]
    #[serial(stdio)]
    async fn debug_request_returns_json_diagnostics() {
        let invoker = Arc::new(ScriptedInvoker::default());
        let (status, content_type, body) =
            send(app(&invoker), "POST", "/_/api/print/me", "payload").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type, "application/json");
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["result"], "/print/me:payload");
        assert!(json["stdout"].as_str().unwrap().contains("handler says payload"));
        assert!(json["stderr"].as_str().unwrap().contains("handler warns payload"));
    }
}
