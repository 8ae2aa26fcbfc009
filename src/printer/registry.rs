//! # Printer Registry
//!
//! JSON-file persistence for paired printers. Records are handle-free by
//! construction ([`LocalPrinter`] holds no live device handle), so the whole
//! list serializes directly.
//!
//! The registry is simple local state: multiple readers are fine, writes
//! happen only through pairing and removal, and callers should treat it as
//! eventually consistent with no locking beyond what the filesystem gives.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::EtiquetaError;
use crate::printer::LocalPrinter;

/// Default registry file name, relative to the working directory.
pub const DEFAULT_REGISTRY_FILE: &str = "printers.json";

/// Keyed store of paired printers.
pub struct PrinterRegistry {
    path: PathBuf,
}

impl PrinterRegistry {
    /// Open a registry at the given path. The file is created lazily on the
    /// first save; a missing file loads as an empty list.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Open the default registry (`printers.json` in the working directory).
    pub fn open_default() -> Self {
        Self::new(DEFAULT_REGISTRY_FILE)
    }

    /// The backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all paired printers. A registry that does not exist yet is an
    /// empty list, not an error.
    pub fn load(&self) -> Result<Vec<LocalPrinter>, EtiquetaError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&self.path)?;
        serde_json::from_str(&contents).map_err(|e| {
            EtiquetaError::Registry(format!(
                "failed to parse {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    /// Replace the stored list.
    pub fn save(&self, printers: &[LocalPrinter]) -> Result<(), EtiquetaError> {
        let json = serde_json::to_string_pretty(printers)
            .map_err(|e| EtiquetaError::Registry(format!("serialization failed: {}", e)))?;
        fs::write(&self.path, json)?;
        debug!(path = %self.path.display(), count = printers.len(), "registry saved");
        Ok(())
    }

    /// Add or update one printer, keyed by id.
    pub fn add(&self, printer: &LocalPrinter) -> Result<(), EtiquetaError> {
        let mut printers = self.load()?;
        match printers.iter_mut().find(|p| p.id == printer.id) {
            Some(existing) => *existing = printer.clone(),
            None => printers.push(printer.clone()),
        }
        self.save(&printers)
    }

    /// Remove a printer by id. Returns whether anything was removed.
    pub fn remove(&self, id: &str) -> Result<bool, EtiquetaError> {
        let mut printers = self.load()?;
        let before = printers.len();
        printers.retain(|p| p.id != id);
        if printers.len() == before {
            return Ok(false);
        }
        self.save(&printers)?;
        Ok(true)
    }
}

// ============================================================================
// TESTS
// ============================================================================
