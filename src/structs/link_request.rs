use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::scan::ScanEvent;
use crate::models::tracked_link::TrackedLink;

#[derive(Deserialize, Serialize, Validate)]
pub struct TrackableRequest {
    #[validate(url(message = "Invalid URL"))]
    pub url: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct TrackableResponse {
    pub url: String,
    pub tracking_url: String,
    pub open_count: i64,
}

impl From<TrackedLink> for TrackableResponse {
    fn from(link: TrackedLink) -> Self {
        Self {
            tracking_url: link.tracking_path(),
            url: link.url,
            open_count: link.open_count,
        }
    }
}

#[derive(Serialize)]
pub struct LinkStatsResponse {
    pub url: String,
    pub short_code: String,
    pub open_count: i64,
    pub scans: Vec<ScanEvent>,
    pub created_at: i64,
    pub last_scanned: Option<i64>,
}

impl From<TrackedLink> for LinkStatsResponse {
    fn from(link: TrackedLink) -> Self {
        Self {
            last_scanned: link.last_scanned(),
            url: link.url,
            short_code: link.short_code,
            open_count: link.open_count,
            scans: link.scans,
            created_at: link.created_at,
        }
    }
}
