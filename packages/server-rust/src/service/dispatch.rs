//! Route dispatch shared by the queue and HTTP entry points.
//!
//! A [`Dispatcher`] matches a context's path against the route table, runs
//! the route's middlewares, and then its terminal handler. Health-check
//! targets answer locally; API targets go through the invoke pipeline,
//! inside the output-capture sandbox when the request is marked debug.

use std::sync::Arc;

use tower::ServiceExt;
use tunnel_core::{
    InvokeError, Invoker, Middleware, NoRoute, ProcessingContext, RouteError, RouteTable,
    RouteTarget,
};

use super::config::GatewayConfig;
use super::invoke::InvokeRequest;
use super::middleware::{build_invoke_pipeline, InvokePipeline};
use crate::capture::{capture_during, SandboxError};

// ---------------------------------------------------------------------------
// Errors and outcome
// ---------------------------------------------------------------------------

/// Why dispatching a request failed.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    NoRoute(#[from] NoRoute),
    #[error("handler for {path} failed: {source}")]
    Handler {
        path: String,
        #[source]
        source: InvokeError,
    },
    #[error(transparent)]
    Sandbox(#[from] SandboxError),
}

/// Which kind of terminal handler answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    /// `/` or `/health-check`; the invoker was not reached.
    HealthCheck,
    /// A business handler ran.
    Invoked,
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Routes processing contexts to their terminal handlers.
///
/// Cloning is cheap: the route table is shared and the invoke pipeline
/// shares its invoker.
#[derive(Clone)]
pub struct Dispatcher {
    routes: Arc<RouteTable<RouteTarget>>,
    pipeline: InvokePipeline,
    health_text: Arc<str>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        routes: RouteTable<RouteTarget>,
        invoker: Arc<dyn Invoker>,
        config: &GatewayConfig,
    ) -> Self {
        Self {
            routes: Arc::new(routes),
            pipeline: build_invoke_pipeline(invoker),
            health_text: Arc::from(config.health_text.as_str()),
        }
    }

    /// Dispatcher over the standard route surface.
    ///
    /// # Errors
    ///
    /// Propagates `RouteError` from building the standard table.
    pub fn standard(invoker: Arc<dyn Invoker>, config: &GatewayConfig) -> Result<Self, RouteError> {
        Ok(Self::new(RouteTable::standard()?, invoker, config))
    }

    /// Route `ctx` and run its handler, filling in the remainder, result,
    /// error, and (for debug requests) captured output.
    ///
    /// # Errors
    ///
    /// - `DispatchError::NoRoute` if no route matches `ctx.path`
    /// - `DispatchError::Handler` if a non-debug handler returns an error
    /// - `DispatchError::Sandbox` if output capture fails for a debug request
    pub async fn dispatch(&self, ctx: &mut ProcessingContext) -> Result<Dispatched, DispatchError> {
        let route = self.routes.match_path(&ctx.path)?;
        ctx.remainder = route.remainder;
        for middleware in route.middlewares {
            apply(*middleware, ctx);
        }

        let target = *route.handler;
        if target.is_health_check() {
            ctx.result = Some(self.health_text.to_string());
            return Ok(Dispatched::HealthCheck);
        }

        let request = InvokeRequest {
            path: ctx.remainder.clone(),
            payload: ctx.payload.clone(),
        };
        if ctx.debug {
            self.invoke_captured(ctx, request).await?;
        } else {
            self.invoke(ctx, request).await?;
        }
        Ok(Dispatched::Invoked)
    }

    async fn invoke(
        &self,
        ctx: &mut ProcessingContext,
        request: InvokeRequest,
    ) -> Result<(), DispatchError> {
        match self.pipeline.clone().oneshot(request).await {
            Ok(result) => {
                ctx.result = Some(result);
                Ok(())
            }
            Err(source) => {
                ctx.error = Some(source.to_string());
                Err(DispatchError::Handler {
                    path: ctx.remainder.clone(),
                    source,
                })
            }
        }
    }

    /// Debug requests: handler errors are reported in the diagnostic body
    /// instead of failing the request.
    async fn invoke_captured(
        &self,
        ctx: &mut ProcessingContext,
        request: InvokeRequest,
    ) -> Result<(), DispatchError> {
        let captured = capture_during(self.pipeline.clone().oneshot(request)).await;
        ctx.stdout = captured.stdout;
        ctx.stderr = captured.stderr;

        match captured.outcome? {
            Ok(result) => ctx.result = Some(result),
            Err(e) => ctx.error = Some(e.to_string()),
        }
        ctx.result = Some(diagnostic_body(ctx));
        Ok(())
    }
}

fn apply(middleware: Middleware, ctx: &mut ProcessingContext) {
    match middleware {
        Middleware::MarkDebug => ctx.debug = true,
    }
}

/// JSON body returned for debug requests.
fn diagnostic_body(ctx: &ProcessingContext) -> String {
    serde_json::json!({
        "result": ctx.result,
        "stdout": ctx.stdout,
        "stderr": ctx.stderr,
        "error": ctx.error,
    })
    .to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
