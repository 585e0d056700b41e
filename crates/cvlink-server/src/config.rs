use cvlink_frame::FrameConfig;
use cvlink_transport::TransportConfig;

/// Name announced in the default greeting.
pub const DEFAULT_NAME: &str = "cvlink";

/// Session facade configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub transport: TransportConfig,
    /// First message sent to every accepted client; `None` disables it.
    pub greeting: Option<String>,
}

impl ServerConfig {
    /// Default configuration greeting clients with `connected to <name>`.
    pub fn named(name: &str) -> Self {
        Self {
            transport: TransportConfig::default(),
            greeting: Some(format!("connected to {name}")),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::named(DEFAULT_NAME)
    }
}

/// Blocking client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Frame limits and socket timeouts. A read timeout bounds every request.
    pub frame: FrameConfig,
    /// Read and check the server greeting right after connecting.
    pub expect_greeting: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            expect_greeting: true,
        }
    }
}
