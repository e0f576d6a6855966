use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use qrcode::QrCode;
use qrcode::render::svg;
use qrcode::types::QrError;
use std::io::Cursor;
use thiserror::Error;

use super::options::{DownloadFormat, Ecc, Logo, RenderStyle};

/// Modules of blank border on each side, as required by the QR standard.
pub const QUIET_ZONE_MODULES: u32 = 4;

/// Largest logo side relative to the code width, before the error
/// correction bound is applied.
const LOGO_WIDTH_FRACTION: f64 = 0.25;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("nothing to render")]
    NothingToRender,
    #[error("QR encoding failed: {0}")]
    Encode(#[from] QrError),
    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("SVG output is malformed")]
    MalformedSvg,
}

/// A rendered code, ready to be offered as a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub format: DownloadFormat,
    pub width: u32,
    pub bytes: Vec<u8>,
}

/// The square a logo is drawn into, in output pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogoRegion {
    pub x: u32,
    pub y: u32,
    pub side: u32,
}

impl LogoRegion {
    /// Centered square of a quarter of the code width, shrunk when the
    /// error correction level could not absorb that many damaged modules.
    pub fn centered(width: u32, ecc: Ecc) -> Self {
        let fraction = LOGO_WIDTH_FRACTION.min(max_logo_fraction(ecc));
        let side = (width as f64 * fraction).floor() as u32;
        let offset = (width - side) / 2;
        Self {
            x: offset,
            y: offset,
            side,
        }
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.x + self.side && y >= self.y && y < self.y + self.side
    }
}

/// Keep the covered area at half the recoverable share so format and
/// alignment damage still leaves headroom.
fn max_logo_fraction(ecc: Ecc) -> f64 {
    (ecc.recovery_capacity() * 0.5).sqrt()
}

/// Render `content` verbatim as a QR code in the requested format.
pub fn render(
    content: &str,
    style: &RenderStyle,
    logo: Option<&Logo>,
    format: DownloadFormat,
) -> Result<Artifact, RenderError> {
    if content.is_empty() {
        return Err(RenderError::NothingToRender);
    }

    let code = QrCode::with_error_correction_level(content.as_bytes(), style.error_correction.level())?;
    let module_px = module_pixels(code.width() as u32, style.size);

    match format {
        DownloadFormat::Png => render_png(&code, style, logo, module_px),
        DownloadFormat::Svg => render_svg(&code, style, logo, module_px),
    }
}

fn module_pixels(modules: u32, target: u32) -> u32 {
    (target / (modules + 2 * QUIET_ZONE_MODULES)).max(1)
}

fn render_png(
    code: &QrCode,
    style: &RenderStyle,
    logo: Option<&Logo>,
    module_px: u32,
) -> Result<Artifact, RenderError> {
    let mut canvas: RgbaImage = code
        .render::<Rgba<u8>>()
        .quiet_zone(true)
        .module_dimensions(module_px, module_px)
        .dark_color(Rgba(style.foreground_color.rgba()))
        .light_color(Rgba(style.background_color.rgba()))
        .build();
    let width = canvas.width();

    if let Some(logo) = logo {
        let region = LogoRegion::centered(width, style.error_correction);
        if region.side > 0 {
            let background = Rgba(style.background_color.rgba());
            for y in region.y..region.y + region.side {
                for x in region.x..region.x + region.side {
                    canvas.put_pixel(x, y, background);
                }
            }
            let scaled = scale_logo(logo, region.side);
            imageops::overlay(&mut canvas, &scaled, region.x as i64, region.y as i64);
        }
    }

    Ok(Artifact {
        format: DownloadFormat::Png,
        width,
        bytes: encode_png(DynamicImage::ImageRgba8(canvas))?,
    })
}

fn render_svg(
    code: &QrCode,
    style: &RenderStyle,
    logo: Option<&Logo>,
    module_px: u32,
) -> Result<Artifact, RenderError> {
    let dark = style.foreground_color.to_string();
    let light = style.background_color.to_string();
    let mut document = code
        .render::<svg::Color>()
        .quiet_zone(true)
        .module_dimensions(module_px, module_px)
        .dark_color(svg::Color(&dark))
        .light_color(svg::Color(&light))
        .build();
    let width = (code.width() as u32 + 2 * QUIET_ZONE_MODULES) * module_px;

    if let Some(logo) = logo {
        let region = LogoRegion::centered(width, style.error_correction);
        if region.side > 0 {
            let encoded = STANDARD.encode(encode_png(DynamicImage::ImageRgba8(scale_logo(
                logo,
                region.side,
            )))?);
            let overlay = format!(
                r#"<rect x="{x}" y="{y}" width="{s}" height="{s}" fill="{light}"/><image x="{x}" y="{y}" width="{s}" height="{s}" preserveAspectRatio="none" href="data:image/png;base64,{encoded}"/>"#,
                x = region.x,
                y = region.y,
                s = region.side,
            );
            let close = document.rfind("</svg>").ok_or(RenderError::MalformedSvg)?;
            document.insert_str(close, &overlay);
        }
    }

    Ok(Artifact {
        format: DownloadFormat::Svg,
        width,
        bytes: document.into_bytes(),
    })
}

fn scale_logo(logo: &Logo, side: u32) -> RgbaImage {
    imageops::resize(&logo.image().to_rgba8(), side, side, FilterType::Triangle)
}

fn encode_png(image: DynamicImage) -> Result<Vec<u8>, RenderError> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}
