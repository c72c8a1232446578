//! Common utilities for invoice generation.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use super::InvoiceError;

/// Build an embeddable `data:` URL for binary content.
pub fn data_url(mime_type: &str, data: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, BASE64.encode(data))
}

/// Normalize an invoice total to two fractional digits.
///
/// Returns the normalized numeric value together with its printed form
/// (e.g. `1234.5` -> `(1234.5, "1234.50")`).
pub fn normalize_total(total: f64) -> Result<(f64, String), InvoiceError> {
    if !total.is_finite() {
        return Err(InvoiceError::InvalidInvoice(format!(
            "total must be a finite number, got {}",
            total
        )));
    }

    let text = format!("{:.2}", total);
    let value = text
        .parse::<f64>()
        .map_err(|e| InvoiceError::InvalidInvoice(format!("total '{}': {}", text, e)))?;

    Ok((value, text))
}
