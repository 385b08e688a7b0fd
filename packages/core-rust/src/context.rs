/// Per-message scratch state threaded through dispatch.
///
/// Created for one message (or one HTTP request), owned by a single
/// processing call, and discarded once the outcome is classified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingContext {
    /// Path as received, before route matching.
    pub path: String,
    /// Path handed to the terminal handler. Empty until a route matches.
    pub remainder: String,
    /// Request payload as text.
    pub payload: String,
    /// Set by the `MarkDebug` middleware.
    pub debug: bool,
    /// Output captured while a debug request ran.
    pub stdout: String,
    pub stderr: String,
    /// Handler result. `None` until a handler succeeds.
    pub result: Option<String>,
    /// Handler error text. `None` on success.
    pub error: Option<String>,
}

impl ProcessingContext {
    /// Build a context from a path and raw payload bytes.
    ///
    /// Payload bytes are read as UTF-8; invalid sequences are replaced
    /// with U+FFFD.
    #[must_use]
    pub fn new(path: impl Into<String>, payload: &[u8]) -> Self {
        Self {
            path: path.into(),
            payload: String::from_utf8_lossy(payload).into_owned(),
            ..Self::default()
        }
    }
}
