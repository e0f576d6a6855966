use nanoid::nanoid;
use serde::{Deserialize, Serialize};

use crate::models::scan::ScanEvent;

/// A destination registered for scan tracking.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TrackedLink {
    #[serde(rename = "_id")]
    pub short_code: String,
    pub url: String,
    #[serde(default)]
    pub open_count: i64,
    #[serde(default)]
    pub scans: Vec<ScanEvent>,
    pub created_at: i64,
}

impl TrackedLink {
    pub fn new(url: String) -> Self {
        Self {
            short_code: nanoid!(6),
            url,
            open_count: 0,
            scans: Vec::new(),
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn tracking_path(&self) -> String {
        format!("/qr/track/{}", self.short_code)
    }

    pub fn last_scanned(&self) -> Option<i64> {
        self.scans.iter().map(|scan| scan.timestamp).max()
    }
}
