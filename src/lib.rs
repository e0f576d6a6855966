pub mod config;
pub mod db;
pub mod generator;
pub mod handlers;
pub mod links;
pub mod middlewares;
pub mod models;
pub mod repository;
pub mod routes;
pub mod state;
pub mod structs;
pub mod utils;

use anyhow::{Context, Result};
use log::info;
use std::sync::Arc;

use config::{AppConfig, StorageBackend};
use db::mongodb::get_database;
use generator::tracking::{HttpTrackingService, TrackingAugmenter, TrackingService};
use links::probe::{AcceptAllProbe, HttpLinkProbe, LinkProbe};
use links::{LinkService, LocalTrackingService};
use repository::memory::{InMemoryLinkStore, InMemoryQrRepository, InMemoryUserStore};
use repository::mongo::{MongoLinkStore, MongoQrRepository, MongoUserStore};
use repository::{LinkStore, QrRepository, UserStore};
use state::app_state::AppState;

/// Wire up storage, the tracking backend and the augmenter from `config`.
pub async fn build_state(config: AppConfig) -> Result<AppState> {
    let (db, records, links, users) = match config.storage_backend {
        StorageBackend::Mongo => {
            let db = get_database(&config.mongodb_uri, &config.database_name).await?;
            let records: Arc<dyn QrRepository> = Arc::new(MongoQrRepository::new(&db));
            let links: Arc<dyn LinkStore> = Arc::new(MongoLinkStore::new(&db));
            let users: Arc<dyn UserStore> = Arc::new(MongoUserStore::new(&db));
            (Some(db), records, links, users)
        }
        StorageBackend::Memory => {
            info!("Using in-memory storage, data will not survive a restart");
            let records: Arc<dyn QrRepository> = Arc::new(InMemoryQrRepository::new());
            let links: Arc<dyn LinkStore> = Arc::new(InMemoryLinkStore::new());
            let users: Arc<dyn UserStore> = Arc::new(InMemoryUserStore::new());
            (None, records, links, users)
        }
    };

    let probe: Arc<dyn LinkProbe> = if config.check_link_reachability {
        Arc::new(HttpLinkProbe::new(config.tracking_timeout).context("Failed to build HTTP client")?)
    } else {
        Arc::new(AcceptAllProbe)
    };
    let links = Arc::new(LinkService::new(links, records.clone(), probe));

    let tracking: Arc<dyn TrackingService> = match &config.tracking_api_url {
        Some(api_url) => {
            info!("Using remote tracking service at {}", api_url);
            Arc::new(
                HttpTrackingService::new(
                    api_url,
                    config.tracking_api_token.clone(),
                    config.tracking_timeout,
                )
                    .context("Failed to build HTTP client")?,
            )
        }
        None => Arc::new(LocalTrackingService::new(links.clone())),
    };
    let augmenter = Arc::new(TrackingAugmenter::new(tracking, config.app_url.clone()));

    Ok(AppState {
        config,
        db,
        records,
        users,
        links,
        augmenter,
    })
}
