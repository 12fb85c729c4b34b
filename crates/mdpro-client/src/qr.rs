//! QR codes for share links.

use qrcode::render::{svg, unicode};
use qrcode::QrCode;

use mdpro_core::{Error, Result};

/// Edge length of the SVG rendering, in pixels.
pub const SVG_SIZE: u32 = 200;

fn encode(url: &str) -> Result<QrCode> {
    QrCode::new(url.as_bytes())
        .map_err(|e| Error::InvalidInput(format!("cannot encode share link as QR code: {}", e)))
}

/// Render `url` with half-block characters for a terminal.
///
/// Colours are inverted so the code scans on dark backgrounds.
pub fn qr_terminal(url: &str) -> Result<String> {
    let code = encode(url)?;
    Ok(code
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .build())
}

/// Render `url` as a standalone SVG document.
pub fn qr_svg(url: &str) -> Result<String> {
    let code = encode(url)?;
    Ok(code
        .render::<svg::Color<'_>>()
        .min_dimensions(SVG_SIZE, SVG_SIZE)
        .build())
}
