//! # Raster Protocol Tests
//!
//! These tests pin the encoder's wire format. The receiving hardware has no
//! tolerance for deviation, so the command stream is asserted byte-for-byte
//! where the protocol fixes it.

use pretty_assertions::assert_eq;

use etiqueta::catalog;
use etiqueta::printer::{PrintJobOptions, Protocol};
use etiqueta::protocol::packing::{pack_image, PixelPolarity};
use etiqueta::protocol::raster;

/// Fixed millimeter→dot entries plus the DPI-derived fallback.
#[test]
fn width_table_and_fallback() {
    let table = [
        (12, 106),
        (29, 306),
        (38, 413),
        (50, 554),
        (54, 590),
        (62, 696),
        (102, 1164),
    ];
    for (mm, dots) in table {
        assert_eq!(raster::dots_for_width(mm), dots, "table width {}mm", mm);
    }

    // Unlisted widths: round(mm * 300 / 25.4)
    for mm in [1u32, 10, 25, 40, 80, 100, 150] {
        let expected = (mm as f64 * 300.0 / 25.4).round() as u32;
        assert_eq!(raster::dots_for_width(mm), expected, "fallback width {}mm", mm);
    }
}

/// The fully pinned command prefix for a 62mm continuous job.
#[test]
fn golden_job_prefix() {
    let image = vec![0u8; 90 * 200];
    let opts = PrintJobOptions::continuous(62);
    let job = raster::create_print_job(&image, &opts).unwrap();

    // 1. Invalidate: 200 zero bytes
    assert_eq!(&job[..200], &[0u8; 200][..]);
    // 2. Initialize
    assert_eq!(&job[200..202], [0x1B, 0x40]);
    // 3. Switch to raster mode
    assert_eq!(&job[202..206], [0x1B, 0x69, 0x61, 0x01]);
    // 4. Media info: 11 bytes, width byte 62, continuous media
    let media = &job[206..217];
    assert_eq!(&media[..3], [0x1B, 0x69, 0x7A]);
    assert_eq!(media[4], 0x0A);
    assert_eq!(media[5], 62);
    // Terminal print/eject byte
    assert_eq!(*job.last().unwrap(), 0x1A);
}

/// Encoding then reading back the fixed-position media fields recovers the
/// original width, height, and media type.
#[test]
fn media_info_round_trip() {
    for (width, height) in [(62u8, None), (29, Some(90u16)), (102, Some(300))] {
        let cmd = raster::media_info(width, height);
        assert_eq!(cmd.len(), 11);

        let parsed_media = cmd[4];
        let parsed_width = cmd[5];
        let parsed_height = u16::from_le_bytes([cmd[6], cmd[7]]);

        assert_eq!(parsed_width, width);
        assert_eq!(parsed_height, height.unwrap_or(0));
        assert_eq!(
            parsed_media,
            if height.is_some() { 0x0B } else { 0x0A }
        );
    }
}

/// Copy counts above 255 clamp; 0 and 1 emit no copies fragment at all.
#[test]
fn copies_policy() {
    let image = vec![0u8; 87];

    for copies in [256u32, 300, 65_535, u32::MAX] {
        let opts = PrintJobOptions::continuous(62).with_copies(copies);
        let job = raster::create_print_job(&image, &opts).unwrap();
        let pos = job
            .windows(3)
            .position(|w| w == [0x1B, 0x69, 0x41])
            .expect("copies fragment present");
        assert_eq!(job[pos + 3], 255, "copies={} clamps to 255", copies);
    }

    for copies in [0u32, 1] {
        let opts = PrintJobOptions::continuous(62).with_copies(copies);
        let job = raster::create_print_job(&image, &opts).unwrap();
        assert!(
            !job.windows(3).any(|w| w == [0x1B, 0x69, 0x41]),
            "copies={} emits no fragment",
            copies
        );
    }
}

/// Identical inputs produce byte-identical jobs: no hidden state.
#[test]
fn encoding_is_idempotent() {
    let image: Vec<u8> = (0..87 * 64).map(|i| (i * 31 % 256) as u8).collect();
    let opts = PrintJobOptions::die_cut(62, 100).with_copies(4);

    let first = raster::create_print_job(&image, &opts).unwrap();
    let second = raster::create_print_job(&image, &opts).unwrap();
    assert_eq!(first, second);
}

/// Every raster line is framed with the constant header and the width's
/// full byte count, in input order.
#[test]
fn raster_lines_are_framed_in_order() {
    // Three recognizable lines at 12mm (14 bytes/line)
    let mut image = Vec::new();
    image.extend(vec![0x11; 14]);
    image.extend(vec![0x22; 14]);
    image.extend(vec![0x33; 14]);

    let job = raster::create_print_job(&image, &PrintJobOptions::continuous(12)).unwrap();

    let mut offsets = Vec::new();
    let mut i = 0;
    while i + 5 <= job.len() {
        if job[i] == b'g' && job[i + 1] == 0x00 && job[i + 2] == 0x00 {
            let len = u16::from_le_bytes([job[i + 3], job[i + 4]]) as usize;
            if len == 14 {
                offsets.push(i);
                i += 5 + len;
                continue;
            }
        }
        i += 1;
    }

    assert_eq!(offsets.len(), 3);
    assert_eq!(job[offsets[0] + 5], 0x11);
    assert_eq!(job[offsets[1] + 5], 0x22);
    assert_eq!(job[offsets[2] + 5], 0x33);
}

/// Malformed options fail fast instead of emitting malformed bytes.
#[test]
fn invalid_width_is_rejected() {
    for width in [0u32, 256, 1000] {
        let opts = PrintJobOptions::continuous(width);
        assert!(
            raster::create_print_job(&[0u8; 16], &opts).is_err(),
            "width {} must be rejected",
            width
        );
    }
}

/// The QL-800 identity is stable.
#[test]
fn catalog_identifies_ql800() {
    let identity = catalog::identify(0x04f9, 0x209b).unwrap();
    assert_eq!(identity.name, "Brother QL-800");
    assert_eq!(identity.protocol, Protocol::BrotherRaster);

    // And repeated lookups agree
    assert_eq!(catalog::identify(0x04f9, 0x209b), catalog::identify(0x04f9, 0x209b));
}

/// Packing an all-white bitmap produces blank raster rows of the right
/// shape for the encoder.
#[test]
fn packed_bitmap_feeds_the_encoder() {
    let dots = raster::dots_for_width(62) as usize; // 696
    let rows = 40;

    let pixels = vec![0u8; dots * rows];
    let packed = pack_image(&pixels, dots, dots, PixelPolarity::ZeroIsWhite);
    assert_eq!(packed.len(), raster::bytes_per_line(62) * rows);

    let job = raster::create_print_job(&packed, &PrintJobOptions::continuous(62)).unwrap();

    // 200 invalidate + 2 init + 4 raster mode + 11 media + 4 print mode
    // + 4 cut + rows * (5 + 87) + 1 eject
    let expected_len = 200 + 2 + 4 + 11 + 4 + 4 + rows * (5 + 87) + 1;
    assert_eq!(job.len(), expected_len);
}
