//! SAT verification payload and its QR image.

use image::{GrayImage, ImageFormat, Luma};
use qrcode::types::Color;
use qrcode::{EcLevel, QrCode};
use std::io::Cursor;

use super::common::data_url;
use super::InvoiceError;

/// Public CFDI verification endpoint. Scanners and the tax authority rely on
/// this exact URL and the `id`/`re`/`rr` parameter names.
pub const SAT_VERIFICATION_URL: &str =
    "https://verificacfdi.facturaelectronica.sat.gob.mx/default.aspx";

/// Raster settings for the QR image.
#[derive(Debug, Clone, Copy)]
pub struct QrOptions {
    /// Pixels per QR module.
    pub scale: u32,
    /// Light border, in modules.
    pub quiet_zone: u32,
}

impl Default for QrOptions {
    fn default() -> Self {
        Self {
            scale: 4,
            quiet_zone: 4,
        }
    }
}

/// Verification URL for an invoice.
pub fn verification_url(uuid: &str, issuer_rfc: &str, recipient_rfc: &str) -> String {
    format!(
        "{}?id={}&re={}&rr={}",
        SAT_VERIFICATION_URL, uuid, issuer_rfc, recipient_rfc
    )
}

/// Encode `payload` as a PNG QR code.
pub fn render_png(payload: &str, options: QrOptions) -> Result<Vec<u8>, InvoiceError> {
    let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::M)
        .map_err(|e| InvoiceError::QrEncoding(e.to_string()))?;

    let width = code.width() as u32;
    let colors = code.to_colors();
    let scale = options.scale.max(1);
    let side = (width + 2 * options.quiet_zone) * scale;

    let image = GrayImage::from_fn(side, side, |x, y| {
        let mx = (x / scale) as i64 - options.quiet_zone as i64;
        let my = (y / scale) as i64 - options.quiet_zone as i64;
        let inside = mx >= 0 && my >= 0 && mx < width as i64 && my < width as i64;
        if inside && colors[(my as u32 * width + mx as u32) as usize] == Color::Dark {
            Luma([0u8])
        } else {
            Luma([255u8])
        }
    });

    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| InvoiceError::QrEncoding(e.to_string()))?;
    Ok(png)
}

/// Build the QR verification image for an invoice as a PNG `data:` URL.
pub fn build(uuid: &str, issuer_rfc: &str, recipient_rfc: &str) -> Result<String, InvoiceError> {
    let payload = verification_url(uuid, issuer_rfc, recipient_rfc);
    let png = render_png(&payload, QrOptions::default())?;
    Ok(data_url("image/png", &png))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;

    fn decode_qr(png: &[u8]) -> String {
        let image = image::load_from_memory(png).unwrap().to_luma8();
        let (width, height) = image.dimensions();
        let mut prepared =
            rqrr::PreparedImage::prepare_from_greyscale(width as usize, height as usize, |x, y| {
                image.get_pixel(x as u32, y as u32)[0]
            });
        let grids = prepared.detect_grids();
        assert_eq!(grids.len(), 1);
        let (_, content) = grids[0].decode().unwrap();
        content
    }

    #[test]
    fn test_verification_url_is_exact() {
        assert_eq!(
            verification_url("ABC", "X1", "Y2"),
            "https://verificacfdi.facturaelectronica.sat.gob.mx/default.aspx?id=ABC&re=X1&rr=Y2"
        );
    }

    #[test]
    fn test_png_decodes_back_to_url() {
        let url = verification_url("ABC", "X1", "Y2");
        let png = render_png(&url, QrOptions::default()).unwrap();
        assert_eq!(decode_qr(&png), url);
    }

    #[test]
    fn test_build_returns_png_data_url() {
        let url = build("ABC", "X1", "Y2").unwrap();
        let encoded = url.strip_prefix("data:image/png;base64,").unwrap();
        let png = BASE64.decode(encoded).unwrap();
        assert!(png.starts_with(&[0x89, 0x50, 0x4E, 0x47]));
        assert_eq!(
            decode_qr(&png),
            "https://verificacfdi.facturaelectronica.sat.gob.mx/default.aspx?id=ABC&re=X1&rr=Y2"
        );
    }

    #[test]
    fn test_build_is_deterministic() {
        assert_eq!(build("U1", "E1", "R1").unwrap(), build("U1", "E1", "R1").unwrap());
    }

    #[test]
    fn test_image_includes_quiet_zone() {
        let png = render_png("hello", QrOptions { scale: 2, quiet_zone: 4 }).unwrap();
        let image = image::load_from_memory(&png).unwrap().to_luma8();
        assert_eq!(image.get_pixel(0, 0)[0], 255);
        assert_eq!(image.width() % 2, 0);
    }
}
