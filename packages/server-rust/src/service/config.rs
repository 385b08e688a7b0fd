use super::batch::BatchModes;
use crate::queue::BodyEncoding;

/// Gateway-level configuration for message dispatch.
///
/// Controls the batch failure policy, the fixed health-check response, and
/// how queue bodies are unwrapped.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Partial-failure, suspend, and reply switches for the batch engine.
    pub modes: BatchModes,
    /// Text returned by `/` and `/health-check`.
    pub health_text: String,
    /// Transport wrapping of queue message bodies.
    pub body_encoding: BodyEncoding,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            modes: BatchModes::default(),
            health_text: "OK".to_string(),
            body_encoding: BodyEncoding::Base64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_config_defaults() {
        let config = GatewayConfig::default();
        assert!(config.modes.batch);
        assert!(!config.modes.suspend);
        assert!(config.modes.reply);
        assert_eq!(config.health_text, "OK");
        assert_eq!(config.body_encoding, BodyEncoding::Base64);
    }
}
