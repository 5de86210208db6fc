//! Crate-level error type.
//!
//! Only the tooling paths (config loading, script parsing, the CLI) propagate
//! these with `?`. Inside the bridge, transport and observer errors are logged
//! and discarded so the game never sees them.

use thiserror::Error;

/// Errors produced anywhere in the crate.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The outbound channel could not reach the host context.
    #[error("transport '{transport}' failed: {detail}")]
    Transport {
        transport: &'static str,
        detail: String,
    },

    /// An observer attached to a hook failed while handling an invocation.
    #[error("observer on hook '{hook}' failed: {detail}")]
    Observer { hook: String, detail: String },

    /// [`EventBridgeBuilder::build`](crate::bridge::EventBridgeBuilder::build)
    /// was called without a transport.
    #[error("event bridge needs a transport")]
    MissingTransport,

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// A replay script line could not be parsed or is out of order.
    #[error("script line {line}: {detail}")]
    Script { line: usize, detail: String },

    /// A message could not be encoded for the wire.
    #[error("encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Shorthand for a transport failure.
    pub fn transport(transport: &'static str, detail: impl Into<String>) -> Self {
        BridgeError::Transport {
            transport,
            detail: detail.into(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BridgeError>;
