//! # Printer Transport Layer
//!
//! This module provides the connection backends for pushing command streams
//! into a physical label printer.
//!
//! ## Available Transports
//!
//! - [`usb`]: USB bulk-endpoint transfers via `rusb`
//! - [`bluetooth`]: Bluetooth Low Energy GATT writes via `btleplug`
//!
//! Both drivers implement [`TransportDriver`], so the orchestrator can pick
//! one at runtime from a printer's connection type. Each driver exclusively
//! owns its device handle while connected; a USB handle never crosses into
//! the Bluetooth driver or vice versa.
//!
//! ## Ordering
//!
//! Within one `send`, bytes go out strictly in encoder order. Chunking is
//! the only transformation applied; there is no reordering, coalescing, or
//! parallel chunk transmission — raster lines must arrive top-to-bottom or
//! the printed label is corrupted. Once a send begins it runs to completion
//! or failure; there is no mid-transfer cancellation.

pub mod bluetooth;
pub mod usb;

pub use bluetooth::BluetoothDriver;
pub use usb::UsbDriver;

use async_trait::async_trait;

use crate::error::EtiquetaError;
use crate::printer::{ConnectionType, LocalPrinter, PrintJobOptions, PrintResult, Protocol};
use crate::protocol::raster;

/// One physical/radio link to a printer.
///
/// Implementations manage the full connection lifecycle of their transport.
/// `send` accepts the rendered label bitmap, not a command stream: the
/// driver encodes it for the connected printer's protocol (see
/// [`encode_for_protocol`]) before transmitting.
#[async_trait]
pub trait TransportDriver: Send {
    /// Which connection type this driver serves.
    fn kind(&self) -> ConnectionType;

    /// Static capability probe: does this platform carry the transport at
    /// all? Callers must check this before any discovery attempt.
    fn is_supported(&self) -> bool;

    /// Interactive discovery. Returns `Ok(None)` when no device is selected
    /// (nothing suitable found, or the user declined) — that is a normal
    /// outcome, distinct from a transport error.
    async fn request_device(&mut self) -> Result<Option<LocalPrinter>, EtiquetaError>;

    /// Open a connection to a previously paired printer. The driver owns the
    /// device handle from here until [`disconnect`](Self::disconnect).
    async fn connect(&mut self, printer: &LocalPrinter) -> Result<(), EtiquetaError>;

    /// Tear the connection down. Best-effort: platform errors during
    /// teardown are swallowed, since the job's outcome is already decided.
    async fn disconnect(&mut self) -> Result<(), EtiquetaError>;

    /// Encode and transmit one label. Chunks are written sequentially, each
    /// completed before the next is issued.
    async fn send(
        &mut self,
        image_data: &[u8],
        options: &PrintJobOptions,
    ) -> Result<PrintResult, EtiquetaError>;

    /// Request the printer's status bytes. Only transports with a read
    /// channel support this; the default declines.
    async fn read_status(&mut self) -> Result<Vec<u8>, EtiquetaError> {
        Err(EtiquetaError::TransferFailed(
            "status readback is not supported on this transport".to_string(),
        ))
    }

    /// Whether a device handle is currently held.
    fn is_connected(&self) -> bool;
}

/// Encode a label bitmap for a printer protocol.
///
/// `BrotherRaster` runs the raster encoder; the other protocol identifiers
/// are pass-through extension points and receive the caller's bytes
/// unmodified.
pub fn encode_for_protocol(
    protocol: Protocol,
    image_data: &[u8],
    options: &PrintJobOptions,
) -> Result<Vec<u8>, EtiquetaError> {
    match protocol {
        Protocol::BrotherRaster => raster::create_print_job(image_data, options),
        Protocol::EscPos | Protocol::Zpl => Ok(image_data.to_vec()),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_brother_raster_wraps_job() {
        let image = vec![0x00; 87 * 2];
        let opts = PrintJobOptions::continuous(62);
        let encoded = encode_for_protocol(Protocol::BrotherRaster, &image, &opts).unwrap();
        assert!(encoded.starts_with(&[0x00; 200]));
        assert_eq!(encoded[encoded.len() - 1], 0x1A);
    }

    #[test]
    fn test_encode_passthrough_protocols() {
        let bytes = vec![0x1B, 0x40, 0x99, 0x12];
        let opts = PrintJobOptions::default();
        for protocol in [Protocol::EscPos, Protocol::Zpl] {
            let encoded = encode_for_protocol(protocol, &bytes, &opts).unwrap();
            assert_eq!(encoded, bytes);
        }
    }

    #[test]
    fn test_encode_propagates_invalid_options() {
        let opts = PrintJobOptions::continuous(0);
        assert!(encode_for_protocol(Protocol::BrotherRaster, &[], &opts).is_err());
        // Pass-through protocols never touch the options
        assert!(encode_for_protocol(Protocol::Zpl, &[], &opts).is_ok());
    }
}
