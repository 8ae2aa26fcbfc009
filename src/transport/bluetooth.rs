//! # Bluetooth Low Energy Transport
//!
//! This module drives label printers over BLE GATT via `btleplug`.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! Disconnected → GattConnected → CharacteristicResolved → Ready
//!                                                           │
//! Disconnected ←──────────── close GATT ←───────────────────┘
//! ```
//!
//! On connect the driver resolves a writable characteristic first under the
//! vendor print service (the transparent-UART service BLE printer bridges
//! expose), falling back to the standard Serial Port Profile service. The
//! first characteristic supporting write or write-without-response in
//! whichever service was found becomes the command-intake channel. Absence
//! of any writable characteristic after both attempts is a connection error.
//!
//! ## Chunked Writes
//!
//! Data goes out in 512-byte chunks — conservative for typical link-layer
//! MTUs — with a fixed 20 ms pause between chunks. BLE characteristic
//! writes expose no flow control to the caller, so the pacing delay is the
//! backpressure substitute that keeps the printer's receive buffer from
//! overrunning. Write-without-response is preferred when the characteristic
//! supports it (lower latency); write-with-response is the fallback.

use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, CharPropFlags, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::catalog;
use crate::error::EtiquetaError;
use crate::printer::{ConnectionType, LocalPrinter, PrintJobOptions, PrintResult, Protocol};
use crate::transport::{encode_for_protocol, TransportDriver};

/// Vendor print service: the transparent-UART service exposed by BLE
/// printer bridges.
pub const PRINT_SERVICE_UUID: Uuid = Uuid::from_u128(0xe7810a71_73ae_499d_8c15_faa9aef0c3f2);

/// Standard Serial Port Profile service, the fallback lookup.
pub const SPP_SERVICE_UUID: Uuid = Uuid::from_u128(0x00001101_0000_1000_8000_00805f9b34fb);

/// Chunk size for characteristic writes (bytes).
const CHUNK_SIZE: usize = 512;

/// Fixed pause between chunks. BLE writes have no native flow control, so
/// this bounds the rate at which the printer's receive buffer fills.
const CHUNK_DELAY: Duration = Duration::from_millis(20);

/// How long a discovery scan listens for advertisements.
const SCAN_WINDOW: Duration = Duration::from_secs(5);

/// A resolved GATT printer link. Owned exclusively by the driver between
/// connect and disconnect.
struct BleConnection {
    peripheral: Peripheral,
    characteristic: Characteristic,
    write_type: WriteType,
    protocol: Protocol,
    printer_name: String,
}

/// # Bluetooth Printer Driver
///
/// Manages one BLE printer link at a time. Discovery scans for a bounded
/// window and matches advertised names against the label-printer heuristic;
/// BLE devices carry no vendor/product pair, so the name is the only
/// protocol signal.
///
/// ## Example
///
/// ```no_run
/// use etiqueta::printer::PrintJobOptions;
/// use etiqueta::transport::{BluetoothDriver, TransportDriver};
///
/// # async fn example() -> Result<(), etiqueta::EtiquetaError> {
/// let mut driver = BluetoothDriver::new();
///
/// if let Some(printer) = driver.request_device().await? {
///     driver.connect(&printer).await?;
///     let image = vec![0u8; 87 * 100];
///     let result = driver.send(&image, &PrintJobOptions::continuous(62)).await?;
///     driver.disconnect().await?;
///     println!("{}", result.message);
/// }
/// # Ok(())
/// # }
/// ```
pub struct BluetoothDriver {
    adapter: Option<Adapter>,
    state: Option<BleConnection>,
    scan_window: Duration,
}

impl Default for BluetoothDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl BluetoothDriver {
    pub fn new() -> Self {
        Self {
            adapter: None,
            state: None,
            scan_window: SCAN_WINDOW,
        }
    }

    /// Shorten or lengthen the discovery scan window. Longer windows find
    /// slow advertisers at the cost of a slower pairing flow.
    pub fn set_scan_window(&mut self, window: Duration) {
        self.scan_window = window;
    }

    /// Lazily acquire the first Bluetooth adapter. A platform without one
    /// is an unsupported-transport condition, not a connection failure.
    async fn adapter(&mut self) -> Result<&Adapter, EtiquetaError> {
        if self.adapter.is_none() {
            let manager = Manager::new().await.map_err(|e| {
                EtiquetaError::UnsupportedTransport(format!("Bluetooth unavailable: {}", e))
            })?;
            let adapter = manager
                .adapters()
                .await
                .map_err(|e| {
                    EtiquetaError::UnsupportedTransport(format!(
                        "Bluetooth adapter enumeration failed: {}",
                        e
                    ))
                })?
                .into_iter()
                .next()
                .ok_or_else(|| {
                    EtiquetaError::UnsupportedTransport(
                        "no Bluetooth adapter present".to_string(),
                    )
                })?;
            self.adapter = Some(adapter);
        }
        Ok(self.adapter.as_ref().unwrap())
    }
}

#[async_trait]
impl TransportDriver for BluetoothDriver {
    fn kind(&self) -> ConnectionType {
        ConnectionType::Bluetooth
    }

    fn is_supported(&self) -> bool {
        cfg!(any(
            target_os = "linux",
            target_os = "macos",
            target_os = "windows"
        ))
    }

    async fn request_device(&mut self) -> Result<Option<LocalPrinter>, EtiquetaError> {
        let window = self.scan_window;
        let adapter = self.adapter().await?;

        adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| EtiquetaError::ConnectionFailed(format!("BLE scan failed: {}", e)))?;
        tokio::time::sleep(window).await;

        let peripherals = adapter.peripherals().await.map_err(|e| {
            EtiquetaError::ConnectionFailed(format!("BLE peripheral listing failed: {}", e))
        })?;
        let _ = adapter.stop_scan().await;

        for peripheral in peripherals {
            let Ok(Some(props)) = peripheral.properties().await else {
                continue;
            };
            let Some(name) = props.local_name else {
                continue;
            };
            if !catalog::looks_like_label_printer(&name) {
                continue;
            }

            let address = props.address.to_string();
            info!(%name, %address, "BLE printer discovered");
            return Ok(Some(LocalPrinter {
                id: LocalPrinter::bluetooth_id(&address),
                protocol: catalog::protocol_from_name(&name),
                name,
                connection_type: ConnectionType::Bluetooth,
                vendor_id: None,
                product_id: None,
                address: Some(address),
            }));
        }

        debug!("no BLE label printer advertised within the scan window");
        Ok(None)
    }

    async fn connect(&mut self, printer: &LocalPrinter) -> Result<(), EtiquetaError> {
        if self.state.is_some() {
            return Err(EtiquetaError::ConnectionFailed(
                "Bluetooth driver already holds a connection".to_string(),
            ));
        }
        let address = printer.address.clone().ok_or_else(|| {
            EtiquetaError::ConnectionFailed(format!(
                "printer record {} carries no Bluetooth address",
                printer.id
            ))
        })?;

        let window = self.scan_window;
        let adapter = self.adapter().await?;
        let peripheral = find_peripheral(adapter, &address, window)
            .await?
            .ok_or_else(|| {
                EtiquetaError::ConnectionFailed(format!(
                    "{} ({}) is not in range",
                    printer.name, address
                ))
            })?;

        peripheral.connect().await.map_err(|e| {
            EtiquetaError::ConnectionFailed(format!(
                "GATT connect to {} failed: {}",
                printer.name, e
            ))
        })?;
        peripheral.discover_services().await.map_err(|e| {
            EtiquetaError::ConnectionFailed(format!(
                "service discovery on {} failed: {}",
                printer.name, e
            ))
        })?;

        // Vendor print service first, SPP as the fallback
        let characteristic = writable_characteristic(&peripheral, PRINT_SERVICE_UUID)
            .or_else(|| writable_characteristic(&peripheral, SPP_SERVICE_UUID));
        let Some(characteristic) = characteristic else {
            let _ = peripheral.disconnect().await;
            return Err(EtiquetaError::ConnectionFailed(format!(
                "{} exposes no writable characteristic under the print or SPP services",
                printer.name
            )));
        };

        let write_type = if characteristic
            .properties
            .contains(CharPropFlags::WRITE_WITHOUT_RESPONSE)
        {
            WriteType::WithoutResponse
        } else {
            WriteType::WithResponse
        };

        info!(
            name = %printer.name,
            characteristic = %characteristic.uuid,
            service = %characteristic.service_uuid,
            "BLE characteristic resolved"
        );
        self.state = Some(BleConnection {
            peripheral,
            characteristic,
            write_type,
            protocol: printer.protocol,
            printer_name: printer.name.clone(),
        });
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), EtiquetaError> {
        if let Some(conn) = self.state.take() {
            if conn.peripheral.is_connected().await.unwrap_or(false) {
                if let Err(e) = conn.peripheral.disconnect().await {
                    warn!(error = %e, "GATT disconnect failed during teardown");
                }
            }
            debug!("BLE connection closed");
        }
        Ok(())
    }

    async fn send(
        &mut self,
        image_data: &[u8],
        options: &PrintJobOptions,
    ) -> Result<PrintResult, EtiquetaError> {
        let conn = self.state.as_ref().ok_or_else(|| {
            EtiquetaError::ConnectionFailed("Bluetooth driver is not connected".to_string())
        })?;

        let payload = encode_for_protocol(conn.protocol, image_data, options)?;
        info!(
            name = %conn.printer_name,
            bytes = payload.len(),
            chunks = payload.len().div_ceil(CHUNK_SIZE),
            "sending print job over BLE"
        );

        for (i, chunk) in payload.chunks(CHUNK_SIZE).enumerate() {
            if i > 0 {
                tokio::time::sleep(CHUNK_DELAY).await;
            }
            conn.peripheral
                .write(&conn.characteristic, chunk, conn.write_type)
                .await
                .map_err(|e| {
                    EtiquetaError::TransferFailed(format!(
                        "BLE write to {} failed after {} bytes: {}",
                        conn.printer_name,
                        i * CHUNK_SIZE,
                        e
                    ))
                })?;
        }

        Ok(PrintResult::ok(format!(
            "Sent {} bytes to {} over Bluetooth",
            payload.len(),
            conn.printer_name
        )))
    }

    fn is_connected(&self) -> bool {
        self.state.is_some()
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Find a peripheral by address, scanning briefly if the adapter's cache
/// does not already hold it.
async fn find_peripheral(
    adapter: &Adapter,
    address: &str,
    scan_window: Duration,
) -> Result<Option<Peripheral>, EtiquetaError> {
    if let Some(found) = peripheral_by_address(adapter, address).await? {
        return Ok(Some(found));
    }

    adapter
        .start_scan(ScanFilter::default())
        .await
        .map_err(|e| EtiquetaError::ConnectionFailed(format!("BLE scan failed: {}", e)))?;
    tokio::time::sleep(scan_window).await;
    let _ = adapter.stop_scan().await;

    peripheral_by_address(adapter, address).await
}

async fn peripheral_by_address(
    adapter: &Adapter,
    address: &str,
) -> Result<Option<Peripheral>, EtiquetaError> {
    let peripherals = adapter.peripherals().await.map_err(|e| {
        EtiquetaError::ConnectionFailed(format!("BLE peripheral listing failed: {}", e))
    })?;

    for peripheral in peripherals {
        if let Ok(Some(props)) = peripheral.properties().await {
            if props.address.to_string().eq_ignore_ascii_case(address) {
                return Ok(Some(peripheral));
            }
        }
    }
    Ok(None)
}

/// First characteristic under the given service that supports write or
/// write-without-response.
fn writable_characteristic(peripheral: &Peripheral, service: Uuid) -> Option<Characteristic> {
    peripheral
        .characteristics()
        .into_iter()
        .find(|c| {
            c.service_uuid == service
                && c.properties
                    .intersects(CharPropFlags::WRITE | CharPropFlags::WRITE_WITHOUT_RESPONSE)
        })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_sizes_for_2000_bytes() {
        // 2000 bytes at 512: exactly 4 writes of 512, 512, 512, 464
        let payload = vec![0u8; 2000];
        let sizes: Vec<usize> = payload.chunks(CHUNK_SIZE).map(|c| c.len()).collect();
        assert_eq!(sizes, vec![512, 512, 512, 464]);
    }

    #[test]
    fn test_pacing_delay_is_20ms() {
        assert_eq!(CHUNK_DELAY, Duration::from_millis(20));
    }

    #[test]
    fn test_service_uuids() {
        assert_eq!(
            PRINT_SERVICE_UUID.to_string(),
            "e7810a71-73ae-499d-8c15-faa9aef0c3f2"
        );
        assert_eq!(
            SPP_SERVICE_UUID.to_string(),
            "00001101-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn test_driver_starts_disconnected() {
        let driver = BluetoothDriver::new();
        assert!(!driver.is_connected());
    }

    #[tokio::test]
    async fn test_send_without_connection_fails() {
        let mut driver = BluetoothDriver::new();
        let err = driver
            .send(&[0u8; 87], &PrintJobOptions::continuous(62))
            .await
            .unwrap_err();
        assert!(matches!(err, EtiquetaError::ConnectionFailed(_)));
    }

    // Scan/connect/write paths need a live adapter and peripheral; they are
    // exercised manually against hardware.
}
