use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use super::{LinkStore, QrRepository, RecordQuery, RepositoryError, UserStore};
use crate::models::qr_record::QrRecord;
use crate::models::scan::ScanEvent;
use crate::models::tracked_link::TrackedLink;
use crate::models::user::User;
use mongodb::bson::oid::ObjectId;

/// Process-local record store. Contents are lost on restart.
#[derive(Default)]
pub struct InMemoryQrRepository {
    records: RwLock<Vec<QrRecord>>,
}

impl InMemoryQrRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl QrRepository for InMemoryQrRepository {
    async fn append(&self, record: QrRecord) -> Result<(), RepositoryError> {
        self.records.write().push(record);
        Ok(())
    }

    async fn query(&self, query: &RecordQuery) -> Result<Vec<QrRecord>, RepositoryError> {
        let records = self.records.read();
        // Appends are chronological, so walking backwards yields newest first
        Ok(records
            .iter()
            .rev()
            .filter(|record| query.matches(record))
            .cloned()
            .collect())
    }

    async fn append_scan(&self, tracking_code: &str, scan: &ScanEvent) -> Result<u64, RepositoryError> {
        let mut records = self.records.write();
        let mut touched = 0;
        for record in records
            .iter_mut()
            .filter(|r| r.tracking_code.as_deref() == Some(tracking_code))
        {
            record.scans.push(scan.clone());
            touched += 1;
        }
        Ok(touched)
    }
}

#[derive(Default)]
pub struct InMemoryLinkStore {
    links: RwLock<HashMap<String, TrackedLink>>,
}

impl InMemoryLinkStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LinkStore for InMemoryLinkStore {
    async fn find_by_url(&self, url: &str) -> Result<Option<TrackedLink>, RepositoryError> {
        Ok(self.links.read().values().find(|link| link.url == url).cloned())
    }

    async fn find_by_code(&self, short_code: &str) -> Result<Option<TrackedLink>, RepositoryError> {
        Ok(self.links.read().get(short_code).cloned())
    }

    async fn insert_if_absent(&self, link: TrackedLink) -> Result<TrackedLink, RepositoryError> {
        let mut links = self.links.write();
        if let Some(existing) = links.values().find(|existing| existing.url == link.url) {
            return Ok(existing.clone());
        }
        links.insert(link.short_code.clone(), link.clone());
        Ok(link)
    }

    async fn record_scan(&self, short_code: &str, scan: &ScanEvent) -> Result<bool, RepositoryError> {
        match self.links.write().get_mut(short_code) {
            Some(link) => {
                link.open_count += 1;
                link.scans.push(scan.clone());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<Vec<User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .users
            .read()
            .iter()
            .find(|user| user.is_active && user.email == email)
            .cloned())
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .users
            .read()
            .iter()
            .find(|user| user.id.map(|id| id.to_hex()).as_deref() == Some(user_id))
            .cloned())
    }

    async fn insert(&self, mut user: User) -> Result<User, RepositoryError> {
        user.id = Some(ObjectId::new());
        self.users.write().push(user.clone());
        Ok(user)
    }

    async fn touch_login(&self, user_id: &str, at: i64) -> Result<(), RepositoryError> {
        if let Some(user) = self
            .users
            .write()
            .iter_mut()
            .find(|user| user.id.map(|id| id.to_hex()).as_deref() == Some(user_id))
        {
            user.last_login = Some(at);
        }
        Ok(())
    }
}
