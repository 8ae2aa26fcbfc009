//! # Error Types
//!
//! This module defines error types used throughout the etiqueta library.
//!
//! Note that a user declining device selection during pairing is *not* an
//! error: discovery returns `Ok(None)` in that case. Only genuine transport
//! and protocol failures surface here.

use thiserror::Error;

/// Main error type for etiqueta operations
#[derive(Debug, Error)]
pub enum EtiquetaError {
    /// The platform lacks the requested transport capability
    #[error("Transport not supported: {0}")]
    UnsupportedTransport(String),

    /// Connection could not be established (no qualifying interface or
    /// characteristic, or a platform-level open failure)
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A chunk write failed mid-stream
    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    /// Malformed print options (e.g. zero label width)
    #[error("Invalid print options: {0}")]
    InvalidOptions(String),

    /// Printer registry load/save error
    #[error("Registry error: {0}")]
    Registry(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
