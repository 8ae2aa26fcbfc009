//! # Brother Raster Protocol Implementation
//!
//! This module provides low-level command builders for the raster command
//! protocol spoken by Brother QL-series label printers.
//!
//! ## Module Structure
//!
//! - [`raster`]: Command builders and print-job assembly
//! - [`packing`]: 1-bit pixel packing for raster line data
//!
//! ## Usage Example
//!
//! ```
//! use etiqueta::printer::PrintJobOptions;
//! use etiqueta::protocol::{packing, raster};
//!
//! // Pack a 696-dot-wide bitmap (62mm tape) into raster rows
//! let pixels = vec![0u8; 696 * 100]; // blank 100-row label
//! let packed = packing::pack_image(&pixels, 696, 696, Default::default());
//!
//! // Assemble the full command stream
//! let job = raster::create_print_job(&packed, &PrintJobOptions::continuous(62)).unwrap();
//!
//! // Send `job` to the printer via a transport driver...
//! # assert!(job.len() > 200);
//! ```
//!
//! ## Scope
//!
//! Only the raster command family is implemented. ESC/POS and ZPL printers
//! are driven as pass-through targets: callers hand the transport
//! pre-encoded bytes and no builder exists here for them.

pub mod packing;
pub mod raster;
