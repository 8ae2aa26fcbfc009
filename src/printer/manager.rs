//! # Print Orchestrator
//!
//! [`PrinterManager`] is the façade callers use: it owns one driver per
//! transport plus the registry, pairs new printers, and runs print jobs.
//! It is the only component that talks to both a transport driver and the
//! protocol encoder (indirectly, through the driver's send path).
//!
//! ## Failure Policy
//!
//! Printing is a best-effort, user-facing action. Connection and transfer
//! failures inside a job are folded into a failed [`PrintResult`] with a
//! human-readable message rather than propagated — partial failure is
//! reported, never a crash. The one exception in the other direction:
//! a user declining device selection during pairing is a silent `None`,
//! never an error.

use tracing::{info, warn};

use crate::error::EtiquetaError;
use crate::printer::{ConnectionType, LocalPrinter, PrintJobOptions, PrintResult};
use crate::printer::registry::PrinterRegistry;
use crate::transport::{BluetoothDriver, TransportDriver, UsbDriver};

/// Which transports the current platform can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportSupport {
    pub usb: bool,
    pub bluetooth: bool,
}

/// Orchestrates pairing, persistence, and print jobs across both transport
/// drivers.
///
/// The drivers are plain owned instances — constructed here or injected by
/// the caller — so lifecycle and testability stay explicit. Driver selection
/// is a single match on the printer's connection type; a USB handle never
/// reaches the Bluetooth driver or vice versa.
pub struct PrinterManager {
    usb: Box<dyn TransportDriver>,
    bluetooth: Box<dyn TransportDriver>,
    registry: PrinterRegistry,
}

impl PrinterManager {
    /// Build a manager with the stock USB and Bluetooth drivers.
    pub fn new(registry: PrinterRegistry) -> Self {
        Self::with_drivers(
            Box::new(UsbDriver::new()),
            Box::new(BluetoothDriver::new()),
            registry,
        )
    }

    /// Build a manager with caller-supplied drivers.
    pub fn with_drivers(
        usb: Box<dyn TransportDriver>,
        bluetooth: Box<dyn TransportDriver>,
        registry: PrinterRegistry,
    ) -> Self {
        Self {
            usb,
            bluetooth,
            registry,
        }
    }

    /// The single dispatch point from connection type to driver.
    fn driver_mut(&mut self, kind: ConnectionType) -> &mut dyn TransportDriver {
        match kind {
            ConnectionType::Usb => self.usb.as_mut(),
            ConnectionType::Bluetooth => self.bluetooth.as_mut(),
        }
    }

    /// Capability surface for the UI layer.
    pub fn supported(&self) -> TransportSupport {
        TransportSupport {
            usb: self.usb.is_supported(),
            bluetooth: self.bluetooth.is_supported(),
        }
    }

    /// Discover and persist a new printer on the given transport.
    ///
    /// Returns `Ok(None)` when no device was selected — a normal outcome
    /// that must not be reported as failure. The capability check runs
    /// first: an unsupported transport errors without any platform call.
    pub async fn pair(
        &mut self,
        kind: ConnectionType,
    ) -> Result<Option<LocalPrinter>, EtiquetaError> {
        let driver = self.driver_mut(kind);
        if !driver.is_supported() {
            return Err(EtiquetaError::UnsupportedTransport(format!(
                "{} printing is not available on this platform",
                kind
            )));
        }

        let Some(printer) = driver.request_device().await? else {
            return Ok(None);
        };

        self.registry.add(&printer)?;
        info!(id = %printer.id, name = %printer.name, "printer paired");
        Ok(Some(printer))
    }

    /// Run one print job: connect, send, disconnect.
    ///
    /// The disconnect runs on every exit path after a successful connect,
    /// including send failures, so the driver never leaks a held handle.
    /// All failures come back as a failed [`PrintResult`].
    pub async fn print(
        &mut self,
        printer: &LocalPrinter,
        image_data: &[u8],
        options: &PrintJobOptions,
    ) -> PrintResult {
        let driver = self.driver_mut(printer.connection_type);
        if !driver.is_supported() {
            return PrintResult::fail(format!(
                "{} printing is not available on this platform",
                printer.connection_type
            ));
        }

        if let Err(e) = driver.connect(printer).await {
            return PrintResult::fail(format!("Could not connect to {}: {}", printer.name, e));
        }

        let outcome = driver.send(image_data, options).await;

        if let Err(e) = driver.disconnect().await {
            // The job's outcome stands; teardown trouble is only worth a log
            warn!(printer = %printer.name, error = %e, "disconnect after print failed");
        }

        match outcome {
            Ok(result) => result,
            Err(e) => PrintResult::fail(format!("Printing to {} failed: {}", printer.name, e)),
        }
    }

    /// Read the printer's raw status bytes (transports with a read channel
    /// only). Connects and disconnects around the readback.
    pub async fn printer_status(
        &mut self,
        printer: &LocalPrinter,
    ) -> Result<Vec<u8>, EtiquetaError> {
        let driver = self.driver_mut(printer.connection_type);
        driver.connect(printer).await?;
        let status = driver.read_status().await;
        if let Err(e) = driver.disconnect().await {
            warn!(printer = %printer.name, error = %e, "disconnect after status failed");
        }
        status
    }

    /// All printers currently in the registry.
    pub fn saved_printers(&self) -> Result<Vec<LocalPrinter>, EtiquetaError> {
        self.registry.load()
    }

    /// Remove a paired printer. Returns whether anything was removed.
    pub fn remove_printer(&self, id: &str) -> Result<bool, EtiquetaError> {
        self.registry.remove(id)
    }
}

// ============================================================================
// TESTS
// ============================================================================
