//! Server side of tracking: registers destinations, records scans and
//! reports per-link statistics.

pub mod probe;

use async_trait::async_trait;
use log::{info, warn};
use std::sync::Arc;
use thiserror::Error;

use crate::generator::classifier::parse_web_url;
use crate::generator::tracking::{TrackingError, TrackingGrant, TrackingService};
use crate::models::scan::ScanEvent;
use crate::models::tracked_link::TrackedLink;
use crate::repository::{LinkStore, QrRepository, RepositoryError};
use probe::LinkProbe;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Invalid URL")]
    InvalidUrl,
    #[error("Link not found")]
    NotFound,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub struct LinkService {
    links: Arc<dyn LinkStore>,
    records: Arc<dyn QrRepository>,
    probe: Arc<dyn LinkProbe>,
}

impl LinkService {
    pub fn new(
        links: Arc<dyn LinkStore>,
        records: Arc<dyn QrRepository>,
        probe: Arc<dyn LinkProbe>,
    ) -> Self {
        Self {
            links,
            records,
            probe,
        }
    }

    /// Register `url` for tracking, reusing the existing link if the same
    /// destination was registered before.
    /// The stored destination is the parsed form of `url`, so it is always
    /// usable as a `Location` header.
    pub async fn register(&self, url: &str) -> Result<TrackedLink, LinkError> {
        let url = parse_web_url(url).ok_or(LinkError::InvalidUrl)?;
        let url = url.as_str();
        if let Some(existing) = self.links.find_by_url(url).await? {
            return Ok(existing);
        }
        if !self.probe.is_reachable(url).await {
            info!("Refusing to track unreachable URL {}", url);
            return Err(LinkError::InvalidUrl);
        }

        let link = self.links.insert_if_absent(TrackedLink::new(url.to_string())).await?;
        info!("Tracking {} as {}", link.url, link.short_code);
        Ok(link)
    }

    pub async fn resolve(&self, short_code: &str) -> Result<TrackedLink, LinkError> {
        self.links
            .find_by_code(short_code)
            .await?
            .ok_or(LinkError::NotFound)
    }

    /// Count a scan against the link and every record generated from it.
    pub async fn record_scan(&self, short_code: &str, scan: ScanEvent) -> Result<(), LinkError> {
        if !self.links.record_scan(short_code, &scan).await? {
            return Err(LinkError::NotFound);
        }
        let touched = self.records.append_scan(short_code, &scan).await?;
        if touched == 0 {
            warn!("Scan of {} matched no generated records", short_code);
        }
        Ok(())
    }
}

/// In-process tracking service for when this server issues its own
/// tracking URLs.
pub struct LocalTrackingService {
    links: Arc<LinkService>,
}

impl LocalTrackingService {
    pub fn new(links: Arc<LinkService>) -> Self {
        Self { links }
    }
}

#[async_trait]
impl TrackingService for LocalTrackingService {
    async fn register(&self, url: &str) -> Result<TrackingGrant, TrackingError> {
        match self.links.register(url).await {
            Ok(link) => Ok(TrackingGrant {
                tracking_url: link.tracking_path(),
                open_count: link.open_count,
            }),
            Err(LinkError::Repository(e)) => Err(TrackingError::Unavailable(e.to_string())),
            Err(e) => Err(TrackingError::Rejected(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::scan::DeviceType;
    use crate::repository::memory::{InMemoryLinkStore, InMemoryQrRepository};
    use probe::AcceptAllProbe;

    struct RejectAllProbe;

    #[async_trait]
    impl LinkProbe for RejectAllProbe {
        async fn is_reachable(&self, _url: &str) -> bool {
            false
        }
    }

    fn service(probe: Arc<dyn LinkProbe>) -> Arc<LinkService> {
        Arc::new(LinkService::new(
            Arc::new(InMemoryLinkStore::new()),
            Arc::new(InMemoryQrRepository::new()),
            probe,
        ))
    }

    #[tokio::test]
    async fn registering_twice_reuses_the_link() {
        let links = service(Arc::new(AcceptAllProbe));
        let first = links.register("https://a.com").await.unwrap();
        let second = links.register("https://a.com").await.unwrap();
        assert_eq!(first.short_code, second.short_code);
        assert_eq!(first.tracking_path(), format!("/qr/track/{}", first.short_code));
    }

    #[tokio::test]
    async fn non_urls_and_unreachable_urls_are_rejected() {
        let open = service(Arc::new(AcceptAllProbe));
        assert!(matches!(open.register("hello").await, Err(LinkError::InvalidUrl)));

        let closed = service(Arc::new(RejectAllProbe));
        assert!(matches!(
            closed.register("https://down.example").await,
            Err(LinkError::InvalidUrl)
        ));
    }

    #[tokio::test]
    async fn destinations_are_stored_normalized() {
        let links = service(Arc::new(AcceptAllProbe));
        let link = links.register("https://A.com").await.unwrap();
        assert_eq!(link.url, "https://a.com/");
        let again = links.register("https://a.com/").await.unwrap();
        assert_eq!(again.short_code, link.short_code);

        assert!(matches!(
            links.register("https://a.\ncom/x").await,
            Err(LinkError::InvalidUrl)
        ));
    }

    #[tokio::test]
    async fn scans_update_counts() {
        let links = service(Arc::new(AcceptAllProbe));
        let link = links.register("https://a.com").await.unwrap();
        let scan = ScanEvent::new("h".into(), None, None, DeviceType::Mobile);
        links.record_scan(&link.short_code, scan.clone()).await.unwrap();
        links.record_scan(&link.short_code, scan.clone()).await.unwrap();

        let stored = links.resolve(&link.short_code).await.unwrap();
        assert_eq!(stored.open_count, 2);
        assert_eq!(stored.last_scanned(), Some(scan.timestamp));
        assert!(matches!(links.record_scan("nope", scan).await, Err(LinkError::NotFound)));
    }

    #[tokio::test]
    async fn local_service_maps_rejections_verbatim() {
        let tracking = LocalTrackingService::new(service(Arc::new(RejectAllProbe)));
        assert_eq!(
            tracking.register("https://down.example").await,
            Err(TrackingError::Rejected("Invalid URL".into()))
        );

        let tracking = LocalTrackingService::new(service(Arc::new(AcceptAllProbe)));
        let grant = tracking.register("https://a.com").await.unwrap();
        assert!(grant.tracking_url.starts_with("/qr/track/"));
    }
}
