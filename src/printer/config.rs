//! # Printer Records and Job Options
//!
//! This module defines the identity record for a paired label printer and the
//! per-job configuration passed to a print call.
//!
//! ## Handle Ownership
//!
//! A [`LocalPrinter`] is deliberately handle-free. The live device handle
//! (a USB device handle or a BLE peripheral) is owned exclusively by the
//! transport driver that opened it, for the duration of one
//! connect→send→disconnect cycle. Reattachment after a registry load always
//! goes through discovery, never through deserializing a handle.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Transport used to reach a printer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionType {
    /// USB bulk endpoints
    Usb,
    /// Bluetooth Low Energy GATT
    Bluetooth,
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usb => write!(f, "usb"),
            Self::Bluetooth => write!(f, "bluetooth"),
        }
    }
}

impl FromStr for ConnectionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "usb" => Ok(Self::Usb),
            "bluetooth" | "ble" | "bt" => Ok(Self::Bluetooth),
            other => Err(format!(
                "Unknown transport '{}'. Use 'usb' or 'bluetooth'",
                other
            )),
        }
    }
}

/// Command protocol spoken by a printer.
///
/// Only `BrotherRaster` has an encoder in this crate. The other identifiers
/// are recognized during pairing and passed raw bytes at print time; they are
/// extension points, not implemented protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Protocol {
    /// Brother QL-series raster command stream
    #[serde(rename = "brother-raster")]
    BrotherRaster,
    /// ESC/POS (pass-through only)
    #[serde(rename = "escpos")]
    EscPos,
    /// Zebra ZPL (pass-through only)
    #[serde(rename = "zpl")]
    Zpl,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BrotherRaster => write!(f, "brother-raster"),
            Self::EscPos => write!(f, "escpos"),
            Self::Zpl => write!(f, "zpl"),
        }
    }
}

/// Identity record for a paired label printer.
///
/// Created at pairing time, persisted in the registry, and rehydrated without
/// a live handle on later loads. The `id` is constructed to stay stable
/// across re-pairing attempts with the same physical unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalPrinter {
    /// Stable identifier: `usb-<vid>-<pid>-<serial|unknown>` or `bt-<addr>`
    pub id: String,

    /// Human-readable printer name
    pub name: String,

    /// Which transport driver may hold this printer's device handle
    pub connection_type: ConnectionType,

    /// Command protocol selected at pairing time
    pub protocol: Protocol,

    /// USB vendor id (USB printers only)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub vendor_id: Option<u16>,

    /// USB product id (USB printers only)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub product_id: Option<u16>,

    /// Stable reattachment key: USB serial number or BLE address
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub address: Option<String>,
}

impl LocalPrinter {
    /// Build the stable id for a USB printer.
    ///
    /// ## Example
    ///
    /// ```
    /// use etiqueta::printer::LocalPrinter;
    ///
    /// assert_eq!(
    ///     LocalPrinter::usb_id(0x04f9, 0x209b, Some("C5Z123456")),
    ///     "usb-04f9-209b-C5Z123456"
    /// );
    /// assert_eq!(
    ///     LocalPrinter::usb_id(0x04f9, 0x209b, None),
    ///     "usb-04f9-209b-unknown"
    /// );
    /// ```
    pub fn usb_id(vendor_id: u16, product_id: u16, serial: Option<&str>) -> String {
        format!(
            "usb-{:04x}-{:04x}-{}",
            vendor_id,
            product_id,
            serial.unwrap_or("unknown")
        )
    }

    /// Build the stable id for a Bluetooth printer.
    pub fn bluetooth_id(device_id: &str) -> String {
        format!("bt-{}", device_id)
    }
}

/// Ephemeral configuration for one print job. Constructed per call, never
/// persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct PrintJobOptions {
    /// Label width in millimeters
    pub width_mm: u32,

    /// Label height in millimeters. `None` selects continuous tape;
    /// `Some` selects die-cut media of that length.
    pub height_mm: Option<u32>,

    /// Number of copies (values above 255 are clamped, never rejected)
    pub copies: u32,

    /// Print quality priority (defaults to high)
    pub high_quality: bool,

    /// Cut the label after the last page (defaults to true)
    pub cut_at_end: bool,
}

impl PrintJobOptions {
    /// Options for a continuous-tape label of the given width.
    pub fn continuous(width_mm: u32) -> Self {
        Self {
            width_mm,
            ..Self::default()
        }
    }

    /// Options for a die-cut label of the given width and height.
    pub fn die_cut(width_mm: u32, height_mm: u32) -> Self {
        Self {
            width_mm,
            height_mm: Some(height_mm),
            ..Self::default()
        }
    }

    /// Set the copy count.
    pub fn with_copies(mut self, copies: u32) -> Self {
        self.copies = copies;
        self
    }
}

impl Default for PrintJobOptions {
    fn default() -> Self {
        Self {
            width_mm: 62,
            height_mm: None,
            copies: 1,
            high_quality: true,
            cut_at_end: true,
        }
    }
}

/// Terminal outcome of a print job. Either success with a confirmation
/// message or failure with a diagnostic message, never partially filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintResult {
    pub success: bool,
    pub message: String,
}

impl PrintResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
