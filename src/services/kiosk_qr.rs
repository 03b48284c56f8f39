use qrcode::render::svg;
use qrcode::QrCode;
use url::Url;

use crate::services::navigation::KioskPreset;

#[derive(thiserror::Error, Debug)]
pub enum KioskQrError {
    #[error("QR code generation failed: {0}")]
    QrCode(#[from] qrcode::types::QrError),

    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    #[error("PNG encoding failed: {0}")]
    Png(#[from] image::ImageError),
}

/// Link that opens the kiosk form with the preset filled in
pub fn kiosk_url(base_url: &str, preset: &KioskPreset) -> Result<Url, KioskQrError> {
    let mut url = Url::parse(base_url)?;
    url.set_path("/");
    url.set_query(Some(&preset.query_string()));

    Ok(url)
}

/// Poster QR code as SVG
pub fn kiosk_qr_svg(base_url: &str, preset: &KioskPreset) -> Result<String, KioskQrError> {
    let url = kiosk_url(base_url, preset)?;
    let code = QrCode::new(url.as_str().as_bytes())?;

    let svg = code.render::<svg::Color>().min_dimensions(240, 240).build();

    Ok(svg)
}

/// Poster QR code as PNG, for printing
pub fn kiosk_qr_png(base_url: &str, preset: &KioskPreset) -> Result<Vec<u8>, KioskQrError> {
    use image::{ImageBuffer, Luma};

    let url = kiosk_url(base_url, preset)?;
    let code = QrCode::new(url.as_str().as_bytes())?;

    let module_size = 10u32;
    let quiet_zone = 4u32;
    let width = code.width() as u32;
    let img_size = (width + quiet_zone * 2) * module_size;

    let img = ImageBuffer::<Luma<u8>, Vec<u8>>::from_fn(img_size, img_size, |x, y| {
        let module_x = (x / module_size).checked_sub(quiet_zone);
        let module_y = (y / module_size).checked_sub(quiet_zone);

        match (module_x, module_y) {
            (Some(mx), Some(my)) if mx < width && my < width => {
                match code[(mx as usize, my as usize)] {
                    qrcode::types::Color::Dark => Luma([0u8]),
                    qrcode::types::Color::Light => Luma([255u8]),
                }
            }
            _ => Luma([255u8]),
        }
    });

    let mut png_data = Vec::new();
    image::DynamicImage::ImageLuma8(img).write_to(
        &mut std::io::Cursor::new(&mut png_data),
        image::ImageFormat::Png,
    )?;

    Ok(png_data)
}
