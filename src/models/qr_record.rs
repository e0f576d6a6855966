use nanoid::nanoid;
use serde::{Deserialize, Serialize};

use crate::generator::classifier::ContentType;
use crate::generator::color::HexColor;
use crate::generator::options::DownloadFormat;
use crate::models::scan::ScanEvent;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StyleSnapshot {
    pub foreground_color: HexColor,
    pub background_color: HexColor,
    pub has_logo: bool,
    pub format: DownloadFormat,
    pub size: u32,
}

/// One generated code, written once when the user hits generate.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct QrRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub content: String,          // What the code encodes, after tracking substitution
    pub original_content: String, // What the user typed
    pub content_type: ContentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_code: Option<String>,
    pub style: StyleSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    pub created_at: i64, // Timestamp in milliseconds
    #[serde(default)]
    pub scans: Vec<ScanEvent>,
}

impl QrRecord {
    pub fn new(
        content: String,
        original_content: String,
        content_type: ContentType,
        tracking_code: Option<String>,
        style: StyleSnapshot,
    ) -> Self {
        Self {
            id: nanoid!(10),
            content,
            original_content,
            content_type,
            tracking_code,
            style,
            owner_id: None,
            access_key: None,
            created_at: chrono::Utc::now().timestamp_millis(),
            scans: Vec::new(),
        }
    }

    pub fn owned_by(mut self, owner_id: Option<String>) -> Self {
        self.owner_id = owner_id;
        self
    }

    pub fn with_access_key(mut self, access_key: Option<String>) -> Self {
        self.access_key = access_key;
        self
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking_code.is_some()
    }
}
