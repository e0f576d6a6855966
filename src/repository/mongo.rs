use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{Document, doc, to_document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::ReturnDocument;
use mongodb::{Collection, Database};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{LinkStore, QrRepository, RecordQuery, RepositoryError, UserStore};
use crate::models::qr_record::QrRecord;
use crate::models::scan::ScanEvent;
use crate::models::tracked_link::TrackedLink;
use crate::models::user::User;

/// Scans live in their own collection, one document per scan, keyed by the
/// tracking code that both links and records share.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
struct StoredScan {
    tracking_code: String,
    scan: ScanEvent,
}

fn scans_collection(db: &Database) -> Collection<StoredScan> {
    db.collection::<StoredScan>("scans")
}

/// Oldest first, for every code in `codes`.
async fn load_scans(
    scans: &Collection<StoredScan>,
    codes: Vec<String>,
) -> Result<Vec<StoredScan>, RepositoryError> {
    if codes.is_empty() {
        return Ok(Vec::new());
    }
    let scans = scans
        .find(doc! { "tracking_code": { "$in": codes } })
        .sort(doc! { "scan.timestamp": 1 })
        .await?
        .try_collect::<Vec<StoredScan>>()
        .await?;
    Ok(scans)
}

fn group_by_code(scans: Vec<StoredScan>) -> HashMap<String, Vec<ScanEvent>> {
    let mut grouped: HashMap<String, Vec<ScanEvent>> = HashMap::new();
    for stored in scans {
        grouped.entry(stored.tracking_code).or_default().push(stored.scan);
    }
    grouped
}

/// Hand each record the scans of its tracking code.
fn attach_scans(records: &mut [QrRecord], scans: Vec<StoredScan>) {
    let grouped = group_by_code(scans);
    for record in records.iter_mut() {
        if let Some(scans) = record.tracking_code.as_ref().and_then(|code| grouped.get(code)) {
            record.scans.extend(scans.iter().cloned());
        }
    }
}

pub struct MongoQrRepository {
    records: Collection<QrRecord>,
    scans: Collection<StoredScan>,
}

impl MongoQrRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            records: db.collection::<QrRecord>("qr_records"),
            scans: scans_collection(db),
        }
    }
}

#[async_trait]
impl QrRepository for MongoQrRepository {
    async fn append(&self, record: QrRecord) -> Result<(), RepositoryError> {
        self.records.insert_one(&record).await?;
        Ok(())
    }

    async fn query(&self, query: &RecordQuery) -> Result<Vec<QrRecord>, RepositoryError> {
        let filter = match query {
            RecordQuery::ByOwner(owner) => doc! { "owner_id": owner },
            RecordQuery::ByAccessKey(key) => doc! { "access_key": key },
        };

        let mut records = self
            .records
            .find(filter)
            .sort(doc! { "created_at": -1 })
            .await?
            .try_collect::<Vec<QrRecord>>()
            .await?;

        let mut codes: Vec<String> = records
            .iter()
            .filter_map(|record| record.tracking_code.clone())
            .collect();
        codes.sort();
        codes.dedup();
        let scans = load_scans(&self.scans, codes).await?;
        attach_scans(&mut records, scans);
        Ok(records)
    }

    /// The scan itself is written once by [`MongoLinkStore::record_scan`]
    /// and shows up on every record sharing the code when it is read.
    async fn append_scan(&self, tracking_code: &str, _scan: &ScanEvent) -> Result<u64, RepositoryError> {
        Ok(self
            .records
            .count_documents(doc! { "tracking_code": tracking_code })
            .await?)
    }
}

/// Upsert body that creates `link` only when no document has its URL yet.
/// The URL itself comes from the equality filter.
fn insert_once_update(link: &TrackedLink) -> Result<Document, RepositoryError> {
    let mut fields = to_document(link)?;
    fields.remove("url");
    fields.remove("scans");
    Ok(doc! { "$setOnInsert": fields })
}

fn is_duplicate_key(error: &mongodb::error::Error) -> bool {
    match error.kind.as_ref() {
        ErrorKind::Command(e) => e.code == 11000,
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == 11000,
        _ => false,
    }
}

pub struct MongoLinkStore {
    links: Collection<TrackedLink>,
    scans: Collection<StoredScan>,
}

impl MongoLinkStore {
    pub fn new(db: &Database) -> Self {
        Self {
            links: db.collection::<TrackedLink>("links"),
            scans: scans_collection(db),
        }
    }

    async fn with_scans(&self, link: Option<TrackedLink>) -> Result<Option<TrackedLink>, RepositoryError> {
        let Some(mut link) = link else {
            return Ok(None);
        };
        let scans = load_scans(&self.scans, vec![link.short_code.clone()]).await?;
        link.scans.extend(scans.into_iter().map(|stored| stored.scan));
        Ok(Some(link))
    }
}

#[async_trait]
impl LinkStore for MongoLinkStore {
    async fn find_by_url(&self, url: &str) -> Result<Option<TrackedLink>, RepositoryError> {
        let link = self.links.find_one(doc! { "url": url }).await?;
        self.with_scans(link).await
    }

    async fn find_by_code(&self, short_code: &str) -> Result<Option<TrackedLink>, RepositoryError> {
        let link = self.links.find_one(doc! { "_id": short_code }).await?;
        self.with_scans(link).await
    }

    async fn insert_if_absent(&self, link: TrackedLink) -> Result<TrackedLink, RepositoryError> {
        let stored = self
            .links
            .find_one_and_update(doc! { "url": &link.url }, insert_once_update(&link)?)
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await;

        match stored {
            Ok(Some(stored)) => Ok(stored),
            Ok(None) => Ok(link),
            // Two upserts raced on the unique url index; the other one won
            Err(e) if is_duplicate_key(&e) => match self.find_by_url(&link.url).await? {
                Some(existing) => Ok(existing),
                None => Err(e.into()),
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn record_scan(&self, short_code: &str, scan: &ScanEvent) -> Result<bool, RepositoryError> {
        let result = self
            .links
            .update_one(doc! { "_id": short_code }, doc! { "$inc": { "open_count": 1 } })
            .await?;
        if result.matched_count == 0 {
            return Ok(false);
        }
        self.scans
            .insert_one(StoredScan {
                tracking_code: short_code.to_string(),
                scan: scan.clone(),
            })
            .await?;
        Ok(true)
    }
}

pub struct MongoUserStore {
    users: Collection<User>,
}

impl MongoUserStore {
    pub fn new(db: &Database) -> Self {
        Self {
            users: db.collection::<User>("users"),
        }
    }
}

#[async_trait]
impl UserStore for MongoUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .users
            .find_one(doc! { "email": email, "is_active": true })
            .await?)
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>, RepositoryError> {
        // Ids that are not valid ObjectIds simply match nothing
        let Ok(object_id) = ObjectId::parse_str(user_id) else {
            return Ok(None);
        };
        Ok(self.users.find_one(doc! { "_id": object_id }).await?)
    }

    async fn insert(&self, mut user: User) -> Result<User, RepositoryError> {
        let result = self.users.insert_one(&user).await?;
        user.id = result.inserted_id.as_object_id();
        Ok(user)
    }

    async fn touch_login(&self, user_id: &str, at: i64) -> Result<(), RepositoryError> {
        let Ok(object_id) = ObjectId::parse_str(user_id) else {
            return Ok(());
        };
        self.users
            .update_one(
                doc! { "_id": object_id },
                doc! { "$set": { "last_login": at } },
            )
            .await?;
        Ok(())
    }
}
