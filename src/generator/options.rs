use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::DynamicImage;
use qrcode::EcLevel;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::classifier::{ContentType, classify};
use super::color::HexColor;

pub const DEFAULT_SIZE: u32 = 240;
pub const MIN_SIZE: u32 = 64;
pub const MAX_SIZE: u32 = 2048;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DownloadFormat {
    #[default]
    Png,
    Svg,
}

impl DownloadFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            DownloadFormat::Png => "png",
            DownloadFormat::Svg => "svg",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            DownloadFormat::Png => "image/png",
            DownloadFormat::Svg => "image/svg+xml",
        }
    }
}

impl fmt::Display for DownloadFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Error correction level, from ~7% (L) to ~30% (H) recoverable codewords.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ecc {
    L,
    #[default]
    M,
    Q,
    H,
}

impl Ecc {
    pub fn level(&self) -> EcLevel {
        match self {
            Ecc::L => EcLevel::L,
            Ecc::M => EcLevel::M,
            Ecc::Q => EcLevel::Q,
            Ecc::H => EcLevel::H,
        }
    }

    /// Share of codewords the decoder can recover.
    pub fn recovery_capacity(&self) -> f64 {
        match self {
            Ecc::L => 0.07,
            Ecc::M => 0.15,
            Ecc::Q => 0.25,
            Ecc::H => 0.30,
        }
    }
}

#[derive(Debug, Error)]
pub enum LogoError {
    #[error("logo is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("logo is not a supported image: {0}")]
    Image(#[from] image::ImageError),
    #[error("logo data URL is malformed")]
    DataUrl,
}

/// A decoded logo image, ready to be composited into a code.
#[derive(Debug, Clone)]
pub struct Logo {
    image: DynamicImage,
}

impl Logo {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LogoError> {
        let image = image::load_from_memory(bytes)?;
        Ok(Self { image })
    }

    /// Accepts `data:image/...;base64,<payload>` or a bare base64 payload.
    pub fn from_data_url(data: &str) -> Result<Self, LogoError> {
        let payload = match data.strip_prefix("data:") {
            Some(rest) => {
                let (meta, payload) = rest.split_once(',').ok_or(LogoError::DataUrl)?;
                if !meta.ends_with(";base64") {
                    return Err(LogoError::DataUrl);
                }
                payload
            }
            None => data,
        };
        let bytes = STANDARD.decode(payload.trim())?;
        Self::from_bytes(&bytes)
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }
}

impl From<DynamicImage> for Logo {
    fn from(image: DynamicImage) -> Self {
        Self { image }
    }
}

/// Visual parameters shared by preview and final renders.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderStyle {
    pub foreground_color: HexColor,
    pub background_color: HexColor,
    pub size: u32,
    pub error_correction: Ecc,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            foreground_color: HexColor::BLACK,
            background_color: HexColor::WHITE,
            size: DEFAULT_SIZE,
            error_correction: Ecc::M,
        }
    }
}

impl RenderStyle {
    pub fn with_size(mut self, size: u32) -> Self {
        self.size = size.clamp(MIN_SIZE, MAX_SIZE);
        self
    }
}

/// Everything one editing session knows about the code being built.
#[derive(Debug, Clone, Default)]
pub struct GeneratorOptions {
    content: String,
    content_type: ContentType,
    pub style: RenderStyle,
    pub logo: Option<Logo>,
    pub download_format: DownloadFormat,
    pub tracking_enabled: bool,
    pub access_key: Option<String>,
}

impl GeneratorOptions {
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    /// Replaces the content and re-derives its type.
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.content_type = classify(&self.content);
    }
}
