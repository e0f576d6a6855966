use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Mobile,
    Tablet,
    Desktop,
    Bot,
}

/// A single open of a tracked code.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScanEvent {
    pub timestamp: i64,             // When the scan occurred (milliseconds)
    pub visitor_hash: String,       // Hashed IP address
    pub user_agent: Option<String>, // Optional user agent info
    pub referrer: Option<String>,   // Optional referrer info
    pub device_type: DeviceType,
}

impl ScanEvent {
    pub fn new(
        visitor_hash: String,
        user_agent: Option<String>,
        referrer: Option<String>,
        device_type: DeviceType,
    ) -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp_millis(),
            visitor_hash,
            user_agent,
            referrer,
            device_type,
        }
    }
}
