//! Storage seams for generated codes and tracked links.
//!
//! Handlers and the generator only see these traits, so the in-memory
//! store used in tests and the MongoDB store are interchangeable.

pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::qr_record::QrRecord;
use crate::models::scan::ScanEvent;
use crate::models::tracked_link::TrackedLink;
use crate::models::user::User;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] mongodb::bson::ser::Error),
}

/// Which slice of the dashboard to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordQuery {
    ByOwner(String),
    ByAccessKey(String),
}

impl RecordQuery {
    pub fn matches(&self, record: &QrRecord) -> bool {
        match self {
            RecordQuery::ByOwner(owner) => record.owner_id.as_deref() == Some(owner.as_str()),
            RecordQuery::ByAccessKey(key) => record.access_key.as_deref() == Some(key.as_str()),
        }
    }
}

/// Append-only store of generated codes.
#[async_trait]
pub trait QrRepository: Send + Sync {
    async fn append(&self, record: QrRecord) -> Result<(), RepositoryError>;

    /// Matching records, newest first.
    async fn query(&self, query: &RecordQuery) -> Result<Vec<QrRecord>, RepositoryError>;

    /// Attach a scan to every record generated with `tracking_code`.
    /// Returns how many records were touched.
    async fn append_scan(&self, tracking_code: &str, scan: &ScanEvent) -> Result<u64, RepositoryError>;
}

/// Store of destinations registered for scan tracking.
#[async_trait]
pub trait LinkStore: Send + Sync {
    async fn find_by_url(&self, url: &str) -> Result<Option<TrackedLink>, RepositoryError>;

    async fn find_by_code(&self, short_code: &str) -> Result<Option<TrackedLink>, RepositoryError>;

    /// Stores `link` unless its URL is already registered, in which case
    /// the existing link is returned untouched.
    async fn insert_if_absent(&self, link: TrackedLink) -> Result<TrackedLink, RepositoryError>;

    /// Counts the open and appends the scan. `false` if the code is unknown.
    async fn record_scan(&self, short_code: &str, scan: &ScanEvent) -> Result<bool, RepositoryError>;
}

/// Accounts that can sign in and own generated codes.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Active user with this email, if any.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;

    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>, RepositoryError>;

    /// Stores a new user and returns it with its id assigned.
    async fn insert(&self, user: User) -> Result<User, RepositoryError>;

    async fn touch_login(&self, user_id: &str, at: i64) -> Result<(), RepositoryError>;
}
