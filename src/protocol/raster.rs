//! # Brother Raster Protocol Commands
//!
//! This module implements the raster command protocol used by Brother
//! QL-series thermal label printers (QL-700, QL-800, QL-820NWB, etc.).
//!
//! ## Protocol Overview
//!
//! A print job is a single linear byte sequence. The printer consumes it
//! strictly in order, so command order is fixed:
//!
//! 1. Invalidate (resynchronize the device-side parser)
//! 2. Initialize (`ESC @`)
//! 3. Switch to raster mode (`ESC i a 1`)
//! 4. Set media info (`ESC i z ...`)
//! 5. Set print mode (`ESC i M q`)
//! 6. Set cut options (`ESC i K f`)
//! 7. Set copies (`ESC i A n`, only when copies > 1)
//! 8. Raster line data (one framed line per scan line, top to bottom)
//! 9. Print and eject (`SUB`)
//!
//! Byte order and command lengths must match the hardware exactly; the
//! printer has no tolerance for deviation and will silently fail or print
//! garbage on a malformed stream.
//!
//! ## Byte Order
//!
//! Multi-byte integers use **little-endian** encoding:
//! - `u16` value 0x1234 is sent as bytes `[0x34, 0x12]`
//!
//! ## Dots Per Line
//!
//! The printable dot count for a label width comes from a fixed table for
//! the standard Brother widths, or from the 300 DPI formula
//! `round(width_mm × 300 / 25.4)` for anything else:
//!
//! | Width (mm) | Dots | Bytes/line |
//! |------------|------|------------|
//! | 12         | 106  | 14         |
//! | 29         | 306  | 39         |
//! | 38         | 413  | 52         |
//! | 50         | 554  | 70         |
//! | 54         | 590  | 74         |
//! | 62         | 696  | 87         |
//! | 102        | 1164 | 146        |

use crate::error::EtiquetaError;
use crate::printer::PrintJobOptions;

// ============================================================================
// ESCAPE SEQUENCE CONSTANTS
// ============================================================================

/// ESC (Escape) - Command prefix byte
///
/// Every multi-byte Brother command begins with ESC (0x1B).
pub const ESC: u8 = 0x1B;

/// SUB (Substitute) - Print with feeding
///
/// A single 0x1A terminates the page: the printer prints any buffered
/// raster lines, feeds, and cuts according to the cut options.
pub const SUB: u8 = 0x1A;

/// Number of zero bytes in the invalidate preamble.
///
/// The device-side parser resynchronizes on long runs of zero, flushing any
/// partially-received command left over from a prior aborted job.
pub const INVALIDATE_LEN: usize = 200;

/// Media-info flag byte: quality priority (0x40) | recover after error (0x80).
pub const MEDIA_FLAGS: u8 = 0xC0;

/// Media type byte for continuous tape (no fixed label length).
pub const MEDIA_CONTINUOUS: u8 = 0x0A;

/// Media type byte for die-cut labels (pre-cut, fixed length).
pub const MEDIA_DIE_CUT: u8 = 0x0B;

/// Cut-options flag: cut after the last page (bit 3).
pub const CUT_AT_END: u8 = 0x08;

/// Print resolution used for the millimeter→dot fallback formula.
pub const DPI: u32 = 300;

/// Printable dot counts for the standard Brother label widths.
///
/// These are the hardware's printable areas, not a straight DPI conversion:
/// each tape has margins the head cannot reach.
const WIDTH_TABLE: &[(u32, u32)] = &[
    (12, 106),
    (29, 306),
    (38, 413),
    (50, 554),
    (54, 590),
    (62, 696),
    (102, 1164),
];

// ============================================================================
// COMMAND BUILDERS
// ============================================================================

/// # Invalidate (200 × NUL)
///
/// Emits 200 zero bytes. The device parser treats a long run of zeros as a
/// resynchronization point, discarding any partial command sequence left by
/// a previously aborted job.
///
/// ## Example
///
/// ```
/// use etiqueta::protocol::raster;
///
/// let cmd = raster::invalidate();
/// assert_eq!(cmd.len(), 200);
/// assert!(cmd.iter().all(|&b| b == 0x00));
/// ```
#[inline]
pub fn invalidate() -> Vec<u8> {
    vec![0x00; INVALIDATE_LEN]
}

/// # Initialize Printer (ESC @)
///
/// Returns the printer to its default command-interpretation state.
///
/// | Format  | Bytes |
/// |---------|-------|
/// | ASCII   | ESC @ |
/// | Hex     | 1B 40 |
///
/// ## Example
///
/// ```
/// use etiqueta::protocol::raster;
///
/// assert_eq!(raster::initialize(), vec![0x1B, 0x40]);
/// ```
#[inline]
pub fn initialize() -> Vec<u8> {
    vec![ESC, b'@']
}

/// # Switch to Raster Mode (ESC i a 1)
///
/// Selects raster mode (mode value 1) over the printer's other supported
/// command modes.
///
/// | Format  | Bytes       |
/// |---------|-------------|
/// | ASCII   | ESC i a 1   |
/// | Hex     | 1B 69 61 01 |
#[inline]
pub fn switch_to_raster() -> Vec<u8> {
    vec![ESC, b'i', b'a', 0x01]
}

/// # Set Media Info (ESC i z ...)
///
/// An 11-byte command describing the loaded media.
///
/// | Offset | Field | Value |
/// |--------|-------|-------|
/// | 0..3   | opcode | 1B 69 7A |
/// | 3      | flags | 0xC0 (quality priority + recover after error) |
/// | 4      | media type | 0x0A continuous / 0x0B die-cut |
/// | 5      | width | millimeters, 1 byte |
/// | 6..8   | height | millimeters, u16 LE, 0 for continuous |
/// | 8..10  | page count | unused, 0 |
/// | 10     | starting page | 0 |
///
/// Passing `height_mm = None` selects continuous tape with a zero height;
/// `Some(h)` selects die-cut media of that length.
///
/// ## Example
///
/// ```
/// use etiqueta::protocol::raster;
///
/// let cmd = raster::media_info(62, None);
/// assert_eq!(cmd.len(), 11);
/// assert_eq!(&cmd[..3], &[0x1B, 0x69, 0x7A]);
/// assert_eq!(cmd[4], 0x0A); // continuous
/// assert_eq!(cmd[5], 62);   // width in mm
/// ```
pub fn media_info(width_mm: u8, height_mm: Option<u16>) -> Vec<u8> {
    let media_type = if height_mm.is_some() {
        MEDIA_DIE_CUT
    } else {
        MEDIA_CONTINUOUS
    };
    let [h_lo, h_hi] = u16_le(height_mm.unwrap_or(0));

    vec![
        ESC, b'i', b'z', // opcode
        MEDIA_FLAGS,
        media_type,
        width_mm,
        h_lo,
        h_hi,
        0x00, 0x00, // page count, unused
        0x00,       // starting page
    ]
}

/// # Set Print Mode (ESC i M q)
///
/// | Format  | Bytes      |
/// |---------|------------|
/// | Hex     | 1B 69 4D q |
///
/// `q` is 1 for high quality, 0 for standard. High quality is the default
/// when unspecified by the caller.
#[inline]
pub fn print_mode(high_quality: bool) -> Vec<u8> {
    vec![ESC, b'i', b'M', high_quality as u8]
}

/// # Set Cut Options (ESC i K f)
///
/// | Format  | Bytes      |
/// |---------|------------|
/// | Hex     | 1B 69 4B f |
///
/// Bit 3 of the flag byte enables cutting after the last page.
#[inline]
pub fn cut_options(cut_at_end: bool) -> Vec<u8> {
    let flags = if cut_at_end { CUT_AT_END } else { 0x00 };
    vec![ESC, b'i', b'K', flags]
}

/// # Set Copies (ESC i A n)
///
/// | Format  | Bytes      |
/// |---------|------------|
/// | Hex     | 1B 69 41 n |
///
/// Copy counts above 255 are silently clamped, never rejected. Callers emit
/// this command only when `copies > 1`; a single copy is the device default.
///
/// ## Example
///
/// ```
/// use etiqueta::protocol::raster;
///
/// assert_eq!(raster::copies(3), vec![0x1B, 0x69, 0x41, 3]);
/// assert_eq!(raster::copies(1000), vec![0x1B, 0x69, 0x41, 255]);
/// ```
#[inline]
pub fn copies(count: u32) -> Vec<u8> {
    vec![ESC, b'i', b'A', count.min(255) as u8]
}

/// # Status Information Request (ESC i S)
///
/// Asks the printer to put a 32-byte status response on its IN channel.
/// Only meaningful on transports with a read path (USB bulk-IN).
#[inline]
pub fn status_request() -> Vec<u8> {
    vec![ESC, b'i', b'S']
}

/// # Raster Line Transfer (g 0 0 nL nH data)
///
/// Frames one scan line of packed 1-bit pixels.
///
/// | Offset | Field | Value |
/// |--------|-------|-------|
/// | 0..3   | header | 67 00 00 |
/// | 3..5   | line length | u16 LE, byte count of the line data |
/// | 5..    | data | exactly `line length` packed bytes |
///
/// The line length is always `bytes_per_line` for the job's width; callers
/// pad short final lines rather than emitting a short frame.
///
/// ## Example
///
/// ```
/// use etiqueta::protocol::raster;
///
/// let cmd = raster::raster_line(&[0xFF; 87]);
/// assert_eq!(&cmd[..5], &[0x67, 0x00, 0x00, 87, 0x00]);
/// assert_eq!(cmd.len(), 5 + 87);
/// ```
pub fn raster_line(data: &[u8]) -> Vec<u8> {
    let [n_lo, n_hi] = u16_le(data.len() as u16);
    let mut cmd = Vec::with_capacity(5 + data.len());
    cmd.push(b'g');
    cmd.push(0x00);
    cmd.push(0x00);
    cmd.push(n_lo);
    cmd.push(n_hi);
    cmd.extend_from_slice(data);
    cmd
}

/// # Print and Eject (SUB)
///
/// Single terminal byte: end of page, feed, and cut per the cut options.
#[inline]
pub fn print_eject() -> Vec<u8> {
    vec![SUB]
}

// ============================================================================
// WIDTH GEOMETRY
// ============================================================================

/// Printable dots per line for a label width in millimeters.
///
/// Known widths come from the fixed hardware table; anything else falls back
/// to `round(width_mm × 300 / 25.4)` at 300 DPI rather than failing.
///
/// ## Example
///
/// ```
/// use etiqueta::protocol::raster;
///
/// assert_eq!(raster::dots_for_width(62), 696);  // table
/// assert_eq!(raster::dots_for_width(25), 295);  // 25 * 300 / 25.4 rounded
/// ```
pub fn dots_for_width(width_mm: u32) -> u32 {
    WIDTH_TABLE
        .iter()
        .find(|(mm, _)| *mm == width_mm)
        .map(|(_, dots)| *dots)
        .unwrap_or_else(|| (width_mm as f64 * DPI as f64 / 25.4).round() as u32)
}

/// Packed byte count per raster line: `ceil(dots / 8)`.
#[inline]
pub fn bytes_per_line(width_mm: u32) -> usize {
    dots_for_width(width_mm).div_ceil(8) as usize
}

/// Encode a u16 value as little-endian bytes [low, high].
#[inline]
pub const fn u16_le(value: u16) -> [u8; 2] {
    [value as u8, (value >> 8) as u8]
}

// ============================================================================
// JOB ASSEMBLY
// ============================================================================

/// Build a complete raster print job from a packed 1-bit bitmap.
///
/// `image_data` is consumed as consecutive rows of `bytes_per_line` packed
/// bytes (top to bottom, bit 7 = leftmost dot — see
/// [`packing`](crate::protocol::packing) for producing it). A short final
/// row is zero-padded to full width; the encoder never inspects pixel
/// content beyond framing it. Producing a correctly-sized bitmap is the
/// renderer's contract.
///
/// The output is deterministic: identical inputs produce byte-identical
/// jobs.
///
/// ## Errors
///
/// [`EtiquetaError::InvalidOptions`] when `width_mm` is zero or exceeds the
/// 255 mm the media-info field can carry. Copy counts never error (clamped
/// at 255).
///
/// ## Example
///
/// ```
/// use etiqueta::printer::PrintJobOptions;
/// use etiqueta::protocol::raster;
///
/// let image = vec![0x00; 87 * 10]; // 10 blank lines at 62mm
/// let job = raster::create_print_job(&image, &PrintJobOptions::continuous(62)).unwrap();
///
/// assert!(job.starts_with(&[0x00; 200]));   // invalidate
/// assert_eq!(&job[200..202], &[0x1B, 0x40]); // initialize
/// assert_eq!(job[job.len() - 1], 0x1A);      // print/eject
/// ```
pub fn create_print_job(
    image_data: &[u8],
    options: &PrintJobOptions,
) -> Result<Vec<u8>, EtiquetaError> {
    if options.width_mm == 0 {
        return Err(EtiquetaError::InvalidOptions(
            "label width must be at least 1mm".to_string(),
        ));
    }
    if options.width_mm > 255 {
        return Err(EtiquetaError::InvalidOptions(format!(
            "label width {}mm exceeds the 255mm the protocol can express",
            options.width_mm
        )));
    }
    if let Some(h) = options.height_mm {
        if h > u16::MAX as u32 {
            return Err(EtiquetaError::InvalidOptions(format!(
                "label height {}mm exceeds the protocol limit",
                h
            )));
        }
    }

    let line_len = bytes_per_line(options.width_mm);
    let line_count = image_data.len().div_ceil(line_len);

    let mut job = Vec::with_capacity(INVALIDATE_LEN + 32 + line_count * (line_len + 5) + 1);
    job.extend(invalidate());
    job.extend(initialize());
    job.extend(switch_to_raster());
    job.extend(media_info(
        options.width_mm as u8,
        options.height_mm.map(|h| h as u16),
    ));
    job.extend(print_mode(options.high_quality));
    job.extend(cut_options(options.cut_at_end));
    if options.copies > 1 {
        job.extend(copies(options.copies));
    }

    for line in image_data.chunks(line_len) {
        if line.len() == line_len {
            job.extend(raster_line(line));
        } else {
            let mut padded = line.to_vec();
            padded.resize(line_len, 0x00);
            job.extend(raster_line(&padded));
        }
    }

    job.extend(print_eject());
    Ok(job)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalidate() {
        let cmd = invalidate();
        assert_eq!(cmd.len(), 200);
        assert!(cmd.iter().all(|&b| b == 0x00));
    }

    #[test]
    fn test_initialize() {
        assert_eq!(initialize(), vec![0x1B, 0x40]);
    }

    #[test]
    fn test_switch_to_raster() {
        assert_eq!(switch_to_raster(), vec![0x1B, 0x69, 0x61, 0x01]);
    }

    #[test]
    fn test_media_info_continuous() {
        let cmd = media_info(62, None);
        assert_eq!(cmd.len(), 11);
        assert_eq!(&cmd[..3], &[0x1B, 0x69, 0x7A]);
        assert_eq!(cmd[3], 0xC0); // quality priority + recover after error
        assert_eq!(cmd[4], MEDIA_CONTINUOUS);
        assert_eq!(cmd[5], 62);
        assert_eq!(&cmd[6..8], &[0x00, 0x00]); // height zeroed
        assert_eq!(&cmd[8..11], &[0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_media_info_die_cut() {
        let cmd = media_info(29, Some(90));
        assert_eq!(cmd[4], MEDIA_DIE_CUT);
        assert_eq!(cmd[5], 29);
        assert_eq!(&cmd[6..8], &[90, 0x00]);
    }

    #[test]
    fn test_media_info_height_little_endian() {
        // 300 = 0x012C -> [0x2C, 0x01]
        let cmd = media_info(102, Some(300));
        assert_eq!(&cmd[6..8], &[0x2C, 0x01]);
    }

    #[test]
    fn test_print_mode() {
        assert_eq!(print_mode(true), vec![0x1B, 0x69, 0x4D, 0x01]);
        assert_eq!(print_mode(false), vec![0x1B, 0x69, 0x4D, 0x00]);
    }

    #[test]
    fn test_cut_options_bit3() {
        assert_eq!(cut_options(true), vec![0x1B, 0x69, 0x4B, 0b0000_1000]);
        assert_eq!(cut_options(false), vec![0x1B, 0x69, 0x4B, 0x00]);
    }

    #[test]
    fn test_copies_clamps_at_255() {
        assert_eq!(copies(2)[3], 2);
        assert_eq!(copies(255)[3], 255);
        assert_eq!(copies(256)[3], 255);
        assert_eq!(copies(100_000)[3], 255);
    }

    #[test]
    fn test_status_request() {
        assert_eq!(status_request(), vec![0x1B, 0x69, 0x53]);
    }

    #[test]
    fn test_raster_line_framing() {
        let data = vec![0xAA; 87];
        let cmd = raster_line(&data);
        assert_eq!(&cmd[..5], &[0x67, 0x00, 0x00, 87, 0x00]);
        assert_eq!(&cmd[5..], &data[..]);
    }

    #[test]
    fn test_raster_line_length_little_endian() {
        // 300-byte line: 300 = 0x012C
        let cmd = raster_line(&vec![0x00; 300]);
        assert_eq!(&cmd[3..5], &[0x2C, 0x01]);
    }

    #[test]
    fn test_print_eject() {
        assert_eq!(print_eject(), vec![0x1A]);
    }

    #[test]
    fn test_dots_table_widths() {
        assert_eq!(dots_for_width(12), 106);
        assert_eq!(dots_for_width(29), 306);
        assert_eq!(dots_for_width(38), 413);
        assert_eq!(dots_for_width(50), 554);
        assert_eq!(dots_for_width(54), 590);
        assert_eq!(dots_for_width(62), 696);
        assert_eq!(dots_for_width(102), 1164);
    }

    #[test]
    fn test_dots_fallback_formula() {
        // round(mm * 300 / 25.4) for widths not in the table
        assert_eq!(dots_for_width(25), 295);
        assert_eq!(dots_for_width(100), 1181);
        assert_eq!(dots_for_width(1), 12);
    }

    #[test]
    fn test_bytes_per_line() {
        assert_eq!(bytes_per_line(62), 87); // ceil(696 / 8)
        assert_eq!(bytes_per_line(12), 14); // ceil(106 / 8)
        assert_eq!(bytes_per_line(102), 146); // 1164 / 8 = 145.5
    }

    #[test]
    fn test_u16_le() {
        assert_eq!(u16_le(0x0000), [0x00, 0x00]);
        assert_eq!(u16_le(0x00FF), [0xFF, 0x00]);
        assert_eq!(u16_le(0x1234), [0x34, 0x12]);
    }

    #[test]
    fn test_job_golden_prefix() {
        // 62mm continuous, single copy, cut at end: the first four fragments
        // are fully pinned by the protocol.
        let image = vec![0x00; 90 * 200];
        let opts = PrintJobOptions::continuous(62);
        let job = create_print_job(&image, &opts).unwrap();

        assert_eq!(&job[..200], &[0x00; 200][..]);
        assert_eq!(&job[200..202], &[0x1B, 0x40]);
        assert_eq!(&job[202..206], &[0x1B, 0x69, 0x61, 0x01]);

        let media = &job[206..217];
        assert_eq!(&media[..3], &[0x1B, 0x69, 0x7A]);
        assert_eq!(media[4], 0x0A); // continuous: no height given
        assert_eq!(media[5], 62);
    }

    #[test]
    fn test_job_no_copies_fragment_for_single_copy() {
        let image = vec![0x00; 87];
        for copies in [0, 1] {
            let opts = PrintJobOptions::continuous(62).with_copies(copies);
            let job = create_print_job(&image, &opts).unwrap();
            // ESC i A never appears
            assert!(
                !job.windows(3).any(|w| w == [0x1B, 0x69, 0x41]),
                "copies={} must not emit a copies command",
                copies
            );
        }
    }

    #[test]
    fn test_job_copies_fragment_present_and_clamped() {
        let image = vec![0x00; 87];
        let opts = PrintJobOptions::continuous(62).with_copies(999);
        let job = create_print_job(&image, &opts).unwrap();
        let pos = job
            .windows(3)
            .position(|w| w == [0x1B, 0x69, 0x41])
            .expect("copies command present");
        assert_eq!(job[pos + 3], 255);
    }

    #[test]
    fn test_job_pads_short_final_line() {
        // One full line plus a 10-byte tail: tail line is padded to 87
        let image = vec![0xFF; 87 + 10];
        let job = create_print_job(&image, &PrintJobOptions::continuous(62)).unwrap();

        // Two raster lines plus headers, then SUB
        let line_frames: Vec<_> = job
            .windows(5)
            .enumerate()
            .filter(|(_, w)| w[0] == b'g' && w[1] == 0x00 && w[2] == 0x00)
            .collect();
        assert_eq!(line_frames.len(), 2);

        let (second_start, _) = line_frames[1];
        let second_data = &job[second_start + 5..second_start + 5 + 87];
        assert_eq!(&second_data[..10], &[0xFF; 10][..]);
        assert!(second_data[10..].iter().all(|&b| b == 0x00));
    }

    #[test]
    fn test_job_is_deterministic() {
        let image: Vec<u8> = (0..87 * 4).map(|i| (i % 251) as u8).collect();
        let opts = PrintJobOptions::die_cut(62, 100).with_copies(2);
        let a = create_print_job(&image, &opts).unwrap();
        let b = create_print_job(&image, &opts).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_job_rejects_zero_width() {
        let opts = PrintJobOptions::continuous(0);
        let err = create_print_job(&[0x00; 8], &opts).unwrap_err();
        assert!(matches!(err, EtiquetaError::InvalidOptions(_)));
    }

    #[test]
    fn test_job_rejects_oversize_width() {
        let opts = PrintJobOptions::continuous(300);
        assert!(create_print_job(&[0x00; 8], &opts).is_err());
    }
}
