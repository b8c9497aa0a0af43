// src/utils/qr_code.rs - QR rendering for short links
use std::fmt::Write as _;
use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine};
use image::{ImageFormat, Rgba, RgbaImage};
use qrcode::{Color, EcLevel, QrCode};
use thiserror::Error;

use crate::models::{QrFormat, QrOptions};

pub const DEFAULT_QR_SIZE: u32 = 150;
pub const MIN_QR_SIZE: u32 = 64;
pub const MAX_QR_SIZE: u32 = 1024;

/// Light modules required around the symbol for scanners to lock on
pub const QUIET_ZONE: u32 = 4;

#[derive(Debug, Error)]
pub enum QrError {
    #[error("QR encoding failed: {0}")]
    Encode(#[from] qrcode::types::QrError),

    #[error("Invalid QR color '{0}', expected #RRGGBB")]
    InvalidColor(String),

    #[error("QR size {0} is outside 64..=1024")]
    InvalidSize(u32),

    #[error("QR size {size} is too small for {modules} modules")]
    SizeTooSmall { size: u32, modules: u32 },

    #[error("QR image encoding failed: {0}")]
    Image(#[from] image::ImageError),
}

/// Parses `#RRGGBB` or `RRGGBB`; blank is black
pub fn parse_hex_color(color: &str) -> Result<[u8; 3], QrError> {
    let trimmed = color.trim();
    if trimmed.is_empty() {
        return Ok([0, 0, 0]);
    }

    let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);
    // from_str_radix alone would accept a leading '+'
    if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(QrError::InvalidColor(color.to_string()));
    }

    let mut rgb = [0u8; 3];
    for (i, channel) in rgb.iter_mut().enumerate() {
        *channel = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
            .map_err(|_| QrError::InvalidColor(color.to_string()))?;
    }
    Ok(rgb)
}

/// Module grid of an encoded symbol, quiet zone excluded
struct Matrix {
    width: u32,
    dark: Vec<bool>,
}

impl Matrix {
    fn encode(content: &str) -> Result<Self, QrError> {
        let code = QrCode::with_error_correction_level(content.as_bytes(), EcLevel::M)?;
        let width = code.width() as u32;
        let dark = code
            .to_colors()
            .into_iter()
            .map(|c| c == Color::Dark)
            .collect();
        Ok(Self { width, dark })
    }

    fn is_dark(&self, x: u32, y: u32) -> bool {
        self.dark[(y * self.width + x) as usize]
    }

    /// Width including the quiet zone on both sides
    fn total(&self) -> u32 {
        self.width + 2 * QUIET_ZONE
    }
}

/// Renders `content` as an image file in the requested format
pub fn render_bytes(content: &str, options: &QrOptions) -> Result<Vec<u8>, QrError> {
    if !(MIN_QR_SIZE..=MAX_QR_SIZE).contains(&options.size) {
        return Err(QrError::InvalidSize(options.size));
    }
    let color = parse_hex_color(&options.color)?;
    let matrix = Matrix::encode(content)?;

    if options.size < matrix.total() {
        return Err(QrError::SizeTooSmall {
            size: options.size,
            modules: matrix.total(),
        });
    }

    match options.format {
        QrFormat::Png => render_png(&matrix, color, options),
        QrFormat::Svg => Ok(render_svg(&matrix, color, options).into_bytes()),
    }
}

/// Renders `content` and returns the image as standard base64
pub fn render(content: &str, options: &QrOptions) -> Result<String, QrError> {
    render_bytes(content, options).map(|bytes| STANDARD.encode(bytes))
}

fn render_png(matrix: &Matrix, color: [u8; 3], options: &QrOptions) -> Result<Vec<u8>, QrError> {
    let size = options.size;
    let scale = size / matrix.total();
    // Leftover pixels are split around the symbol
    let margin = (size - scale * matrix.total()) / 2 + QUIET_ZONE * scale;

    let background = if options.transparent {
        Rgba([255, 255, 255, 0])
    } else {
        Rgba([255, 255, 255, 255])
    };
    let foreground = Rgba([color[0], color[1], color[2], 255]);

    let mut img = RgbaImage::from_pixel(size, size, background);
    for y in 0..matrix.width {
        for x in 0..matrix.width {
            if !matrix.is_dark(x, y) {
                continue;
            }
            let (px, py) = (margin + x * scale, margin + y * scale);
            for dy in 0..scale {
                for dx in 0..scale {
                    img.put_pixel(px + dx, py + dy, foreground);
                }
            }
        }
    }

    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}

fn render_svg(matrix: &Matrix, color: [u8; 3], options: &QrOptions) -> String {
    let total = matrix.total();
    let fill = format!("#{:02x}{:02x}{:02x}", color[0], color[1], color[2]);

    let mut path = String::new();
    for y in 0..matrix.width {
        for x in 0..matrix.width {
            if matrix.is_dark(x, y) {
                // Writing into a String cannot fail
                let _ = write!(path, "M{},{}h1v1h-1z", x + QUIET_ZONE, y + QUIET_ZONE);
            }
        }
    }

    let background = if options.transparent {
        String::new()
    } else {
        format!(r##"<rect width="{total}" height="{total}" fill="#ffffff"/>"##)
    };

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><svg xmlns="http://www.w3.org/2000/svg" width="{size}" height="{size}" viewBox="0 0 {total} {total}" shape-rendering="crispEdges">{background}<path fill="{fill}" d="{path}"/></svg>"#,
        size = options.size,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTENT: &str = "http://localhost:8080/r/AbCdEf12";

    fn options(format: QrFormat, color: &str, transparent: bool, size: u32) -> QrOptions {
        QrOptions {
            format,
            color: color.to_string(),
            transparent,
            size,
        }
    }

    fn decode_grey(width: u32, height: u32, grey: impl Fn(u32, u32) -> u8) -> String {
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            width as usize,
            height as usize,
            |x, y| grey(x as u32, y as u32),
        );
        let grids = prepared.detect_grids();
        assert_eq!(grids.len(), 1, "expected exactly one QR symbol");
        let (_, content) = grids[0].decode().unwrap();
        content
    }

    fn decode_png(bytes: &[u8]) -> (String, RgbaImage) {
        let img = image::load_from_memory(bytes).unwrap().to_rgba8();
        let content = decode_grey(img.width(), img.height(), |x, y| {
            let p = img.get_pixel(x, y);
            if p[3] == 0 {
                255
            } else {
                ((u32::from(p[0]) * 299 + u32::from(p[1]) * 587 + u32::from(p[2]) * 114) / 1000) as u8
            }
        });
        (content, img)
    }

    // Paints each "M{x},{y}h1v1h-1z" segment onto a module grid, `scale` pixels per module
    fn rasterize_svg(svg: &str, scale: u32) -> (u32, Vec<bool>) {
        let view_box = svg.split("viewBox=\"0 0 ").nth(1).unwrap();
        let total: u32 = view_box.split(' ').next().unwrap().parse().unwrap();
        let d = svg.split(" d=\"").nth(1).unwrap().split('"').next().unwrap();

        let side = total * scale;
        let mut dark = vec![false; (side * side) as usize];
        for segment in d.split('M').filter(|s| !s.is_empty()) {
            let coords = segment.trim_end_matches("h1v1h-1z");
            let (x, y) = coords.split_once(',').unwrap();
            let (x, y): (u32, u32) = (x.parse().unwrap(), y.parse().unwrap());
            for dy in 0..scale {
                for dx in 0..scale {
                    dark[((y * scale + dy) * side + x * scale + dx) as usize] = true;
                }
            }
        }
        (side, dark)
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#1A73E8").unwrap(), [0x1a, 0x73, 0xe8]);
        assert_eq!(parse_hex_color("ff0000").unwrap(), [255, 0, 0]);
        assert_eq!(parse_hex_color("").unwrap(), [0, 0, 0]);
        assert!(matches!(parse_hex_color("#12"), Err(QrError::InvalidColor(_))));
        assert!(matches!(parse_hex_color("#zzzzzz"), Err(QrError::InvalidColor(_))));
        assert!(matches!(parse_hex_color("+1+2+3"), Err(QrError::InvalidColor(_))));
        assert!(matches!(parse_hex_color("#+1+2+3"), Err(QrError::InvalidColor(_))));
    }

    #[test]
    fn test_png_decodes_to_content() {
        for size in [100, 150, 300] {
            let bytes = render_bytes(CONTENT, &options(QrFormat::Png, "#000000", false, size)).unwrap();
            let (content, img) = decode_png(&bytes);
            assert_eq!(content, CONTENT);
            assert_eq!((img.width(), img.height()), (size, size));
            // Corner sits in the quiet zone
            assert_eq!(img.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
        }
    }

    #[test]
    fn test_transparent_colored_png() {
        for size in [100, 150, 300] {
            let bytes = render_bytes(CONTENT, &options(QrFormat::Png, "#1a73e8", true, size)).unwrap();
            let (content, img) = decode_png(&bytes);
            assert_eq!(content, CONTENT);
            assert_eq!((img.width(), img.height()), (size, size));
            assert_eq!(img.get_pixel(0, 0)[3], 0);
            assert!(img.pixels().any(|p| *p == Rgba([0x1a, 0x73, 0xe8, 255])));
        }
    }

    #[test]
    fn test_svg_decodes_to_content() {
        let bytes = render_bytes(CONTENT, &options(QrFormat::Svg, "#000000", false, 150)).unwrap();
        let svg = String::from_utf8(bytes).unwrap();
        assert!(svg.contains(r#"width="150" height="150""#));
        assert!(svg.contains("<rect"));

        let (side, dark) = rasterize_svg(&svg, 4);
        let content = decode_grey(side, side, |x, y| {
            if dark[(y * side + x) as usize] {
                0
            } else {
                255
            }
        });
        assert_eq!(content, CONTENT);
    }

    #[test]
    fn test_transparent_svg_has_no_background() {
        let bytes = render_bytes(CONTENT, &options(QrFormat::Svg, "#FF0000", true, 150)).unwrap();
        let svg = String::from_utf8(bytes).unwrap();
        assert!(!svg.contains("<rect"));
        assert!(svg.contains(r##"fill="#ff0000""##));

        // Nothing painted outside the modules, so unpainted pixels read as light
        let (side, dark) = rasterize_svg(&svg, 4);
        let content = decode_grey(side, side, |x, y| {
            if dark[(y * side + x) as usize] {
                0
            } else {
                255
            }
        });
        assert_eq!(content, CONTENT);
    }

    #[test]
    fn test_content_over_capacity_fails_to_encode() {
        let huge = format!("https://example.com/{}", "a".repeat(3000));
        for format in [QrFormat::Png, QrFormat::Svg] {
            assert!(matches!(
                render(&huge, &options(format, "", false, MAX_QR_SIZE)),
                Err(QrError::Encode(_))
            ));
        }
    }

    #[test]
    fn test_size_bounds() {
        assert!(matches!(
            render(CONTENT, &options(QrFormat::Png, "", false, 32)),
            Err(QrError::InvalidSize(32))
        ));
        assert!(matches!(
            render(CONTENT, &options(QrFormat::Png, "", false, 2048)),
            Err(QrError::InvalidSize(2048))
        ));
        let long = format!("https://example.com/{}", "a".repeat(400));
        assert!(matches!(
            render(&long, &options(QrFormat::Png, "", false, 64)),
            Err(QrError::SizeTooSmall { size: 64, .. })
        ));
    }

    #[test]
    fn test_render_is_base64() {
        let encoded = render(CONTENT, &QrOptions::default()).unwrap();
        let bytes = STANDARD.decode(encoded).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
    }
}
