//! Shared fixtures for service-level tests.

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tunnel_core::{encode_call, CallEnvelope, InvokeError, Invoker, QueueRecord};

use super::config::GatewayConfig;
use super::dispatch::Dispatcher;

/// Invoker that records every call and answers by path:
///
/// - `/fail/...` returns a handler error
/// - `/panic/...` panics
/// - `/print/...` writes to stdout and stderr, then echoes
/// - anything else echoes `"{path}:{payload}"`
#[derive(Default)]
pub struct ScriptedInvoker {
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedInvoker {
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Invoker for ScriptedInvoker {
    async fn invoke(&self, path: &str, payload: &str) -> Result<String, InvokeError> {
        self.calls.lock().push((path.to_string(), payload.to_string()));
        if path.starts_with("/fail/") {
            return Err(InvokeError::Handler(format!("boom at {path}")));
        }
        if path.starts_with("/panic/") {
            panic!("handler panicked at {path}");
        }
        if path.starts_with("/print/") {
            let mut out = std::io::stdout();
            let _ = writeln!(out, "handler says {payload}");
            let _ = out.flush();
            let _ = writeln!(std::io::stderr(), "handler warns {payload}");
        }
        Ok(format!("{path}:{payload}"))
    }
}

pub fn dispatcher(invoker: &Arc<ScriptedInvoker>) -> Dispatcher {
    Dispatcher::standard(invoker.clone(), &GatewayConfig::default()).unwrap()
}

pub fn call(path: &str, payload: &str) -> CallEnvelope {
    CallEnvelope {
        path: path.to_string(),
        payload: payload.as_bytes().to_vec(),
        ..CallEnvelope::default()
    }
}

pub fn with_reply(mut envelope: CallEnvelope, client_token: &str) -> CallEnvelope {
    envelope.client_token = client_token.to_string();
    envelope.reply_queue_id = "reply-queue".to_string();
    envelope.correlation_id = format!("corr-{}", envelope.path);
    envelope
}

pub fn record(message_id: &str, envelope: &CallEnvelope) -> QueueRecord {
    QueueRecord::new(message_id, encode_call(envelope).unwrap())
}

/// Device and inode of whatever descriptor 1 currently points at.
#[cfg(unix)]
pub fn stdout_identity() -> (u64, u64) {
    use std::os::unix::fs::MetadataExt;

    let fd = nix::unistd::dup(std::io::stdout()).unwrap();
    let meta = std::fs::File::from(fd).metadata().unwrap();
    (meta.dev(), meta.ino())
}
