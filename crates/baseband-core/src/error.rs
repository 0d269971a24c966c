//! Error types for the baseband core.
//!
//! Real-time paths (`execute`, the runtime loops, the dispatcher loop) never
//! return errors. These variants cover startup, configuration loading and the
//! mailbox encoding boundary.

use thiserror::Error;

use crate::message::MessageError;

/// Baseband error type
#[derive(Error, Debug)]
pub enum BasebandError {
    /// DMA engine failed to initialize (fatal: the core halts)
    #[error("DMA initialization failed: {0}")]
    DmaInit(String),

    /// RSSI sampler failed to initialize
    #[error("RSSI initialization failed: {0}")]
    RssiInit(String),

    /// A runtime thread could not be spawned
    #[error("failed to spawn thread '{name}': {reason}")]
    ThreadSpawn {
        /// Thread name
        name: String,
        /// Reason reported by the OS
        reason: String,
    },

    /// A mailbox ring was full and the record was dropped
    #[error("mailbox queue '{0}' is full")]
    MailboxFull(&'static str),

    /// Message encoding or decoding failed
    #[error("message error: {0}")]
    Message(#[from] MessageError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON configuration could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for baseband operations
pub type Result<T> = std::result::Result<T, BasebandError>;
