use actix_web::HttpRequest;
use log::{debug, trace};
use qrcode::{render::svg, QrCode};

use crate::errors::ServerError;

pub const IDEMPOTENCY_HEADER: &str = "x-idempotency-key";

/// Renders the PIX copy-paste code as an SVG QR code and returns it base64-encoded.
pub fn qr_svg_base64(code: &str) -> Result<String, ServerError> {
    let qr = QrCode::new(code.as_bytes()).map_err(|e| {
        debug!("💻️ Could not encode '{code}' as a QR code. {e}");
        ServerError::BackendError(format!("Could not render QR code. {e}"))
    })?;
    let image = qr
        .render::<svg::Color>()
        .min_dimensions(256, 256)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .build();
    trace!("💻️ Rendered {} byte QR code", image.len());
    Ok(base64::encode(image))
}

/// The client-supplied idempotency key, if there is a usable one.
pub fn idempotency_key(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(IDEMPOTENCY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
