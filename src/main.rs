//! # Etiqueta CLI
//!
//! Command-line interface for driving label printers.
//!
//! ## Usage
//!
//! ```bash
//! # Which transports does this machine support?
//! etiqueta supported
//!
//! # Pair a printer (scans the USB bus or BLE advertisements)
//! etiqueta pair --transport usb
//! etiqueta pair --transport bluetooth
//!
//! # List paired printers
//! etiqueta printers
//!
//! # Print a PNG as a 62mm continuous label
//! etiqueta print --printer usb-04f9-209b-unknown --image label.png --width 62
//!
//! # Die-cut media, three copies, standard quality
//! etiqueta print --printer usb-04f9-209b-unknown --image label.png \
//!     --width 29 --height 90 --copies 3 --standard
//!
//! # Raw status readback (USB only)
//! etiqueta status --printer usb-04f9-209b-unknown
//!
//! # Forget a printer
//! etiqueta remove usb-04f9-209b-unknown
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use etiqueta::{
    printer::{ConnectionType, PrintJobOptions, PrinterManager, PrinterRegistry},
    protocol::{packing, raster},
    EtiquetaError,
};

/// Etiqueta - label printer utility
#[derive(Parser, Debug)]
#[command(name = "etiqueta")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Registry file holding paired printers
    #[arg(long, default_value = "printers.json", global = true)]
    registry: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show which transports this platform supports
    Supported,

    /// Discover and pair a printer
    Pair {
        /// Transport to scan: usb or bluetooth
        #[arg(long)]
        transport: String,
    },

    /// List paired printers
    Printers,

    /// Forget a paired printer
    Remove {
        /// Printer id (see `printers`)
        id: String,
    },

    /// Print an image file as a label
    Print {
        /// Printer id (see `printers`)
        #[arg(long)]
        printer: String,

        /// Image file to print (any format the image crate reads)
        #[arg(long)]
        image: PathBuf,

        /// Label width in millimeters
        #[arg(long, default_value = "62")]
        width: u32,

        /// Label height in millimeters (die-cut media; omit for continuous)
        #[arg(long)]
        height: Option<u32>,

        /// Number of copies
        #[arg(long, default_value = "1")]
        copies: u32,

        /// Skip the cut after the last label
        #[arg(long)]
        no_cut: bool,

        /// Standard quality instead of high
        #[arg(long)]
        standard: bool,

        /// Invert black/white before packing
        #[arg(long)]
        invert: bool,
    },

    /// Read the printer's raw status bytes (USB only)
    Status {
        /// Printer id (see `printers`)
        #[arg(long)]
        printer: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), EtiquetaError> {
    let cli = Cli::parse();
    let mut manager = PrinterManager::new(PrinterRegistry::new(&cli.registry));

    match cli.command {
        Commands::Supported => {
            let support = manager.supported();
            println!("usb:       {}", if support.usb { "yes" } else { "no" });
            println!("bluetooth: {}", if support.bluetooth { "yes" } else { "no" });
        }

        Commands::Pair { transport } => {
            let kind: ConnectionType = transport
                .parse()
                .map_err(EtiquetaError::UnsupportedTransport)?;
            match manager.pair(kind).await? {
                Some(printer) => {
                    println!("Paired {} ({})", printer.name, printer.id);
                    println!("Protocol: {}", printer.protocol);
                }
                None => println!("No printer selected."),
            }
        }

        Commands::Printers => {
            let printers = manager.saved_printers()?;
            if printers.is_empty() {
                println!("No paired printers. Run `etiqueta pair` first.");
            }
            for p in printers {
                println!("{}  [{}] {} ({})", p.id, p.connection_type, p.name, p.protocol);
            }
        }

        Commands::Remove { id } => {
            if manager.remove_printer(&id)? {
                println!("Removed {}", id);
            } else {
                println!("No printer with id {}", id);
            }
        }

        Commands::Print {
            printer,
            image,
            width,
            height,
            copies,
            no_cut,
            standard,
            invert,
        } => {
            let record = find_printer(&manager, &printer)?;

            let options = PrintJobOptions {
                width_mm: width,
                height_mm: height,
                copies,
                high_quality: !standard,
                cut_at_end: !no_cut,
            };

            let packed = load_label_bitmap(&image, width, invert)?;
            let result = manager.print(&record, &packed, &options).await;

            if result.success {
                println!("{}", result.message);
            } else {
                return Err(EtiquetaError::TransferFailed(result.message));
            }
        }

        Commands::Status { printer } => {
            let record = find_printer(&manager, &printer)?;
            let status = manager.printer_status(&record).await?;
            let hex: Vec<String> = status.iter().map(|b| format!("{:02x}", b)).collect();
            println!("{}", hex.join(" "));
        }
    }

    Ok(())
}

fn find_printer(
    manager: &PrinterManager,
    id: &str,
) -> Result<etiqueta::LocalPrinter, EtiquetaError> {
    manager
        .saved_printers()?
        .into_iter()
        .find(|p| p.id == id)
        .ok_or_else(|| {
            EtiquetaError::Registry(format!(
                "no paired printer with id {} (run `etiqueta printers`)",
                id
            ))
        })
}

/// Decode an image file and pack it into 1-bit raster rows for the label
/// width. This is the rendering boundary: the library core consumes packed
/// bytes and never decodes images itself.
fn load_label_bitmap(path: &PathBuf, width_mm: u32, invert: bool) -> Result<Vec<u8>, EtiquetaError> {
    let img = image::open(path)
        .map_err(|e| EtiquetaError::InvalidOptions(format!("cannot read {}: {}", path.display(), e)))?
        .to_luma8();

    let dots = raster::dots_for_width(width_mm) as usize;
    let (img_width, _) = img.dimensions();

    // Threshold to 1 = print, 0 = blank; dark pixels print unless inverted
    let pixels: Vec<u8> = img
        .pixels()
        .map(|p| {
            let dark = p.0[0] < 128;
            (dark != invert) as u8
        })
        .collect();

    Ok(packing::pack_image(
        &pixels,
        img_width as usize,
        dots,
        packing::PixelPolarity::ZeroIsWhite,
    ))
}
