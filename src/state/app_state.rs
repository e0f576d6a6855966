use mongodb::Database;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::generator::session::{GeneratorSession, Identity};
use crate::generator::tracking::TrackingAugmenter;
use crate::links::LinkService;
use crate::repository::{QrRepository, UserStore};

/// Shared application state, handed to every handler through `web::Data`.
pub struct AppState {
    pub config: AppConfig,
    /// Present only with the MongoDB backend; used for health checks.
    pub db: Option<Database>,
    pub records: Arc<dyn QrRepository>,
    pub users: Arc<dyn UserStore>,
    pub links: Arc<LinkService>,
    pub augmenter: Arc<TrackingAugmenter>,
}

impl AppState {
    /// A fresh generator session for one request. In-flight suppression and
    /// stale-result discarding apply within this session only.
    pub fn session(&self, identity: Option<Identity>) -> GeneratorSession {
        GeneratorSession::new(self.augmenter.clone(), self.records.clone(), identity)
    }
}
