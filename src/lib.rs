//! # Etiqueta - Label Printer Driver Library
//!
//! Etiqueta drives Brother QL-series thermal label printers directly over
//! USB or Bluetooth Low Energy, with no print server in between. It
//! provides:
//!
//! - **Protocol implementation**: Brother raster command builders
//! - **Transports**: USB bulk endpoints and BLE GATT behind one trait
//! - **Discovery**: device identification by USB id catalog and name
//! - **Orchestration**: pairing, a paired-printer registry, and one-shot
//!   print jobs with guaranteed teardown
//!
//! ## Quick Start
//!
//! ```no_run
//! use etiqueta::{
//!     printer::{PrintJobOptions, PrinterManager, PrinterRegistry},
//!     printer::ConnectionType,
//!     protocol::packing,
//! };
//!
//! # async fn example() -> Result<(), etiqueta::EtiquetaError> {
//! let mut manager = PrinterManager::new(PrinterRegistry::open_default());
//!
//! // Pair a USB printer (None means nothing suitable was selected)
//! if let Some(printer) = manager.pair(ConnectionType::Usb).await? {
//!     // Pack a rendered 696-dot-wide bitmap into 1-bit rows
//!     let pixels = vec![0u8; 696 * 200];
//!     let packed = packing::pack_image(&pixels, 696, 696, Default::default());
//!
//!     // Print a 62mm continuous label
//!     let result = manager
//!         .print(&printer, &packed, &PrintJobOptions::continuous(62))
//!         .await;
//!     println!("{}", result.message);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`protocol`] | Brother raster command builders and pixel packing |
//! | [`transport`] | USB and Bluetooth connection backends |
//! | [`printer`] | Printer records, registry, and orchestration |
//! | [`catalog`] | USB vendor/product identity catalog |
//! | [`error`] | Error types |
//!
//! ## Scope
//!
//! Rendering a label image is the caller's job: this crate consumes a
//! finished bitmap and never re-renders. ESC/POS and ZPL devices are
//! recognized during pairing but driven pass-through only — the raster
//! encoder covers the Brother family exclusively.

pub mod catalog;
pub mod error;
pub mod printer;
pub mod protocol;
pub mod transport;

// Re-exports for convenience
pub use error::EtiquetaError;
pub use printer::{
    ConnectionType, LocalPrinter, PrintJobOptions, PrintResult, PrinterManager, PrinterRegistry,
    Protocol,
};
pub use transport::{BluetoothDriver, TransportDriver, UsbDriver};
