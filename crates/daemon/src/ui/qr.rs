//! QR code rendering for account pairing.
//!
//! The pairing challenge delivered by the messaging platform is an opaque
//! string that must be encoded verbatim; the companion app scans it to link
//! this daemon as a companion device. This module renders that string as a
//! terminal QR code using Unicode block characters, or as a PNG file.

use std::path::Path;

use image::{ImageBuffer, Luma};
use qrcode::QrCode;

/// QR code module size in pixels for PNG output.
const PNG_MODULE_SIZE: u32 = 8;

/// Quiet zone (border) size in modules.
const QUIET_ZONE: u32 = 4;

/// Renders a pairing challenge as a terminal QR code.
///
/// Two QR rows are packed into each output line using half-block
/// characters:
/// - Upper half block (U+2580): dark module on top, light below
/// - Lower half block (U+2584): light module on top, dark below
/// - Full block (U+2588): two dark modules
/// - Space: two light modules
///
/// With `inverted` set, dark and light swap and the quiet zone is drawn
/// with full blocks. Scanners need the quiet zone to lock on, so on dark
/// terminal themes the inverted form is usually the scannable one.
///
/// # Errors
///
/// Returns an error if the challenge does not fit in a QR code.
pub fn render_terminal_qr(challenge: &str, inverted: bool) -> anyhow::Result<String> {
    let code = QrCode::new(challenge.as_bytes())?;
    let modules = code.to_colors();
    let width = code.width();
    let height = modules.len() / width;

    let quiet = QUIET_ZONE as usize;
    let full_width = width + 2 * quiet;
    let border = if inverted { '\u{2588}' } else { ' ' };

    let dark_at = |row: usize, col: usize| -> bool {
        if row >= height {
            // Rows past the bottom edge belong to the quiet zone
            return inverted;
        }
        let dark = modules[row * width + col] == qrcode::Color::Dark;
        dark != inverted
    };

    let mut output = String::new();

    for _ in 0..quiet / 2 {
        output.push_str(&border.to_string().repeat(full_width));
        output.push('\n');
    }

    let mut row = 0;
    while row < height {
        for _ in 0..quiet {
            output.push(border);
        }

        for col in 0..width {
            let ch = match (dark_at(row, col), dark_at(row + 1, col)) {
                (true, true) => '\u{2588}',
                (true, false) => '\u{2580}',
                (false, true) => '\u{2584}',
                (false, false) => ' ',
            };
            output.push(ch);
        }

        for _ in 0..quiet {
            output.push(border);
        }
        output.push('\n');
        row += 2;
    }

    for _ in 0..quiet / 2 {
        output.push_str(&border.to_string().repeat(full_width));
        output.push('\n');
    }

    Ok(output)
}

/// Renders a pairing challenge as a PNG QR code at the given path.
///
/// The image is grayscale, black modules on a white background, with a
/// standard four module quiet zone.
///
/// # Errors
///
/// Returns an error if the QR code cannot be generated or the file cannot
/// be written.
pub fn render_png_qr(challenge: &str, path: &Path) -> anyhow::Result<()> {
    let code = QrCode::new(challenge.as_bytes())?;
    let modules = code.to_colors();
    let qr_width = code.width();

    let quiet_zone_pixels = QUIET_ZONE * PNG_MODULE_SIZE;
    let qr_pixels = qr_width as u32 * PNG_MODULE_SIZE;
    let image_size = qr_pixels + 2 * quiet_zone_pixels;

    let mut img: ImageBuffer<Luma<u8>, Vec<u8>> =
        ImageBuffer::from_pixel(image_size, image_size, Luma([255u8]));

    for (idx, color) in modules.iter().enumerate() {
        let row = (idx / qr_width) as u32;
        let col = (idx % qr_width) as u32;

        let pixel_color = if *color == qrcode::Color::Dark {
            Luma([0u8])
        } else {
            Luma([255u8])
        };

        let x_start = quiet_zone_pixels + col * PNG_MODULE_SIZE;
        let y_start = quiet_zone_pixels + row * PNG_MODULE_SIZE;

        for dy in 0..PNG_MODULE_SIZE {
            for dx in 0..PNG_MODULE_SIZE {
                img.put_pixel(x_start + dx, y_start + dy, pixel_color);
            }
        }
    }

    img.save(path)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHALLENGE: &str = "2@AbCdEfGhIjKlMnOpQrStUvWxYz0123456789+/=,extra,parts";

    #[test]
    fn test_terminal_qr_generation() {
        let qr = render_terminal_qr(CHALLENGE, false).expect("Failed to generate terminal QR");

        assert!(!qr.is_empty());

        let lines: Vec<&str> = qr.lines().collect();
        assert!(lines.len() > 10, "QR code should have multiple rows");

        assert!(
            qr.contains('\u{2588}') || qr.contains('\u{2580}') || qr.contains('\u{2584}'),
            "QR code should contain Unicode block characters"
        );
    }

    #[test]
    fn test_terminal_qr_quiet_zone() {
        let qr = render_terminal_qr(CHALLENGE, false).expect("Failed to generate terminal QR");

        let lines: Vec<&str> = qr.lines().collect();
        assert!(
            lines[0].chars().all(|c| c == ' '),
            "Top border should be blank"
        );
        assert!(
            lines.iter().all(|l| l.starts_with("    ")),
            "Every line should start with the left quiet zone"
        );
    }

    #[test]
    fn test_terminal_qr_inverted_quiet_zone() {
        let qr = render_terminal_qr(CHALLENGE, true).expect("Failed to generate inverted QR");

        let lines: Vec<&str> = qr.lines().collect();
        assert!(!lines.is_empty());
        assert!(
            lines[0].chars().all(|c| c == '\u{2588}'),
            "Top border should be full blocks in inverted mode"
        );
    }

    #[test]
    fn test_terminal_qr_lines_have_uniform_width() {
        let qr = render_terminal_qr(CHALLENGE, false).expect("Failed to generate terminal QR");

        let lines: Vec<&str> = qr.lines().collect();
        let width = lines[0].chars().count();
        assert!(
            lines.iter().all(|l| l.chars().count() == width),
            "All lines should have the same width"
        );
    }

    #[test]
    fn test_terminal_qr_inversion_flips_modules() {
        let normal = render_terminal_qr(CHALLENGE, false).unwrap();
        let inverted = render_terminal_qr(CHALLENGE, true).unwrap();

        assert_ne!(normal, inverted);
        assert_eq!(normal.lines().count(), inverted.lines().count());
    }

    #[test]
    fn test_png_qr_generation() {
        use tempfile::TempDir;

        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("pairing.png");

        render_png_qr(CHALLENGE, &path).expect("Failed to generate PNG QR");

        assert!(path.exists(), "PNG file should be created");

        let file_bytes = std::fs::read(&path).expect("Failed to read file");
        assert!(
            file_bytes.starts_with(&[137, 80, 78, 71, 13, 10, 26, 10]),
            "File should have PNG header"
        );
    }

    #[test]
    fn test_png_qr_dimensions_are_square() {
        use tempfile::TempDir;

        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("pairing.png");

        render_png_qr(CHALLENGE, &path).expect("Failed to generate PNG QR");

        let img = image::open(&path).expect("Failed to open PNG");
        assert_eq!(img.width(), img.height(), "QR image should be square");
        assert!(img.width() > 2 * QUIET_ZONE * PNG_MODULE_SIZE);
    }

    #[test]
    fn test_long_challenge_still_encodes() {
        let long = "2@".to_string() + &"A".repeat(400);
        let qr = render_terminal_qr(&long, false);
        assert!(qr.is_ok(), "Long challenges should still fit in a QR code");
    }
}
