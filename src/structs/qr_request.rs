use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::generator::classifier::ContentType;
use crate::generator::options::{DownloadFormat, Ecc};
use crate::models::qr_record::{QrRecord, StyleSnapshot};

#[derive(Deserialize)]
pub struct ClassifyRequest {
    pub content: String,
}

#[derive(Serialize)]
pub struct ClassifyResponse {
    pub content_type: ContentType,
    /// Whether a signed-in user could switch tracking on for this content.
    pub trackable: bool,
}

/// Everything the generator form submits.
#[derive(Deserialize, Validate, Default)]
pub struct GenerateRequest {
    #[serde(default)]
    pub content: String,
    pub foreground_color: Option<String>,
    pub background_color: Option<String>,
    #[validate(range(min = 64, max = 2048, message = "Size must be between 64 and 2048 pixels"))]
    pub size: Option<u32>,
    pub error_correction: Option<Ecc>,
    pub format: Option<DownloadFormat>,
    /// Logo as a `data:image/...;base64,` URL or bare base64.
    pub logo: Option<String>,
    #[serde(default)]
    pub tracking: bool,
    #[validate(length(min = 1, max = 128, message = "Access key must be 1 to 128 characters"))]
    pub access_key: Option<String>,
}

#[derive(Deserialize)]
pub struct RecordsQuery {
    pub key: Option<String>,
}

#[derive(Serialize)]
pub struct QrRecordResponse {
    pub id: String,
    pub content: String,
    pub original_content: String,
    pub content_type: ContentType,
    pub tracking_code: Option<String>,
    pub style: StyleSnapshot,
    pub created_at: i64,
    pub scan_count: usize,
    pub last_scanned: Option<i64>,
}

impl From<QrRecord> for QrRecordResponse {
    fn from(record: QrRecord) -> Self {
        Self {
            scan_count: record.scans.len(),
            last_scanned: record.scans.iter().map(|scan| scan.timestamp).max(),
            id: record.id,
            content: record.content,
            original_content: record.original_content,
            content_type: record.content_type,
            tracking_code: record.tracking_code,
            style: record.style,
            created_at: record.created_at,
        }
    }
}
