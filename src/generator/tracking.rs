//! Swaps a destination URL for a trackable redirect before rendering.

use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrackingError {
    /// The service refused the URL; the reason is shown to the user as-is.
    #[error("{0}")]
    Rejected(String),
    /// The service could not be reached or answered with a server error.
    #[error("tracking service unavailable: {0}")]
    Unavailable(String),
}

/// What the tracking service hands back for a registered URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingGrant {
    /// Redirect path (or absolute URL) that records a scan before forwarding.
    pub tracking_url: String,
    #[serde(default)]
    pub open_count: i64,
}

#[async_trait]
pub trait TrackingService: Send + Sync {
    async fn register(&self, url: &str) -> Result<TrackingGrant, TrackingError>;
}

/// Metadata kept alongside a tracked code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingMetadata {
    pub original_url: String,
    pub tracking_url: String,
    /// Last path segment of the redirect, used to attribute scans.
    pub tracking_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Augmented {
    pub content: String,
    pub tracking: Option<TrackingMetadata>,
}

pub struct TrackingAugmenter {
    service: Arc<dyn TrackingService>,
    public_base_url: String,
}

impl TrackingAugmenter {
    pub fn new(service: Arc<dyn TrackingService>, public_base_url: impl Into<String>) -> Self {
        Self {
            service,
            public_base_url: public_base_url.into(),
        }
    }

    /// Identity when tracking is off. Otherwise the content is replaced by
    /// the redirect URL or the whole action fails; there is no fallback.
    pub async fn augment(&self, content: &str, tracking_enabled: bool) -> Result<Augmented, TrackingError> {
        if !tracking_enabled {
            return Ok(Augmented {
                content: content.to_string(),
                tracking: None,
            });
        }

        let grant = self.service.register(content).await?;
        let tracking_url = self.absolute(&grant.tracking_url);
        debug!("Registered {} for tracking as {}", content, tracking_url);

        Ok(Augmented {
            content: tracking_url.clone(),
            tracking: Some(TrackingMetadata {
                original_url: content.to_string(),
                tracking_code: tracking_code(&grant.tracking_url),
                tracking_url,
            }),
        })
    }

    fn absolute(&self, tracking_url: &str) -> String {
        if tracking_url.starts_with("http://") || tracking_url.starts_with("https://") {
            return tracking_url.to_string();
        }
        let base = self.public_base_url.trim_end_matches('/');
        if tracking_url.starts_with('/') {
            format!("{}{}", base, tracking_url)
        } else {
            format!("{}/{}", base, tracking_url)
        }
    }
}

fn tracking_code(tracking_url: &str) -> Option<String> {
    let path = tracking_url.split(['?', '#']).next().unwrap_or_default();
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty() && !segment.contains(':'))
        .map(String::from)
}

#[derive(Serialize)]
struct TrackableRequest<'a> {
    url: &'a str,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    detail: Option<String>,
    error: Option<String>,
}

/// Talks to a remote tracking backend over HTTP.
pub struct HttpTrackingService {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpTrackingService {
    pub fn new(api_base_url: &str, token: Option<String>, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/qr/trackable", api_base_url.trim_end_matches('/')),
            token,
        })
    }
}

#[async_trait]
impl TrackingService for HttpTrackingService {
    async fn register(&self, url: &str) -> Result<TrackingGrant, TrackingError> {
        let mut request = self.client.post(&self.endpoint).json(&TrackableRequest { url });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| {
                warn!("Tracking request to {} failed: {}", self.endpoint, e);
                TrackingError::Unavailable(e.to_string())
            })?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<TrackingGrant>()
                .await
                .map_err(|e| TrackingError::Unavailable(format!("malformed response: {}", e)));
        }

        let body = response.json::<ErrorBody>().await.unwrap_or_default();
        let reason = body.detail.or(body.error);
        // Credential problems are ours, not the user's URL
        let unauthorized = matches!(
            status,
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN
        );
        if status.is_client_error() && !unauthorized {
            Err(TrackingError::Rejected(
                reason.unwrap_or_else(|| String::from("Invalid URL")),
            ))
        } else {
            Err(TrackingError::Unavailable(
                reason.unwrap_or_else(|| format!("status {}", status)),
            ))
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use actix_web::http::{StatusCode, header};
    use actix_web::{App, HttpRequest, HttpResponse, HttpServer, web};
    use parking_lot::Mutex;

    /// Scripted tracking service that remembers every URL it was asked about.
    pub(crate) struct ScriptedTracking {
        pub reply: Result<TrackingGrant, TrackingError>,
        pub calls: Mutex<Vec<String>>,
    }

    impl ScriptedTracking {
        pub(crate) fn granting(tracking_url: &str) -> Self {
            Self {
                reply: Ok(TrackingGrant {
                    tracking_url: tracking_url.to_string(),
                    open_count: 0,
                }),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn failing(error: TrackingError) -> Self {
            Self {
                reply: Err(error),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TrackingService for ScriptedTracking {
        async fn register(&self, url: &str) -> Result<TrackingGrant, TrackingError> {
            self.calls.lock().push(url.to_string());
            self.reply.clone()
        }
    }

    #[tokio::test]
    async fn disabled_tracking_is_identity() {
        let service = Arc::new(ScriptedTracking::granting("/qr/track/abc"));
        let augmenter = TrackingAugmenter::new(service.clone(), "https://qr.example");
        let out = augmenter.augment("https://a.com", false).await.unwrap();
        assert_eq!(out.content, "https://a.com");
        assert!(out.tracking.is_none());
        assert!(service.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn enabled_tracking_substitutes_redirect() {
        let service = Arc::new(ScriptedTracking::granting("/qr/track/abc123"));
        let augmenter = TrackingAugmenter::new(service.clone(), "https://qr.example/");
        let out = augmenter.augment("https://a.com", true).await.unwrap();
        assert_eq!(out.content, "https://qr.example/qr/track/abc123");
        let meta = out.tracking.unwrap();
        assert_eq!(meta.original_url, "https://a.com");
        assert_eq!(meta.tracking_code.as_deref(), Some("abc123"));
        assert_eq!(service.calls.lock().as_slice(), ["https://a.com"]);
    }

    #[tokio::test]
    async fn absolute_tracking_urls_are_kept() {
        let service = Arc::new(ScriptedTracking::granting("https://t.example/r/xyz"));
        let augmenter = TrackingAugmenter::new(service, "https://qr.example");
        let out = augmenter.augment("https://a.com", true).await.unwrap();
        assert_eq!(out.content, "https://t.example/r/xyz");
    }

    #[tokio::test]
    async fn failures_propagate_unchanged() {
        let rejected = TrackingError::Rejected("Invalid URL".into());
        let service = Arc::new(ScriptedTracking::failing(rejected.clone()));
        let augmenter = TrackingAugmenter::new(service, "https://qr.example");
        assert_eq!(augmenter.augment("https://a.com", true).await, Err(rejected));
    }

    async fn fake_backend(req: HttpRequest, body: web::Json<serde_json::Value>) -> HttpResponse {
        let authorized = req
            .headers()
            .get(header::AUTHORIZATION)
            .is_some_and(|value| value == "Bearer svc-token");
        if !authorized {
            return HttpResponse::Unauthorized().json(serde_json::json!({ "detail": "Not authenticated" }));
        }
        match body["url"].as_str() {
            Some("https://blocked.example/") => HttpResponse::BadRequest()
                .json(serde_json::json!({ "detail": "URL is on a blocklist" })),
            Some("https://teapot.example/") => HttpResponse::build(StatusCode::IM_A_TEAPOT).finish(),
            Some("https://down.example/") => HttpResponse::ServiceUnavailable().finish(),
            Some("https://garbled.example/") => HttpResponse::Ok().body("not json"),
            _ => HttpResponse::Ok().json(serde_json::json!({
                "tracking_url": "/qr/track/abc",
                "open_count": 3
            })),
        }
    }

    #[actix_rt::test]
    async fn http_service_maps_backend_answers() {
        let server = HttpServer::new(|| App::new().route("/qr/trackable", web::post().to(fake_backend)))
            .workers(1)
            .bind(("127.0.0.1", 0))
            .unwrap();
        let base = format!("http://127.0.0.1:{}/", server.addrs()[0].port());
        let server = server.run();
        let handle = server.handle();
        actix_rt::spawn(server);

        let timeout = Duration::from_secs(5);
        let service = HttpTrackingService::new(&base, Some("svc-token".into()), timeout).unwrap();
        assert_eq!(
            service.register("https://a.com/").await,
            Ok(TrackingGrant {
                tracking_url: "/qr/track/abc".into(),
                open_count: 3
            })
        );
        assert_eq!(
            service.register("https://blocked.example/").await,
            Err(TrackingError::Rejected("URL is on a blocklist".into()))
        );
        assert_eq!(
            service.register("https://teapot.example/").await,
            Err(TrackingError::Rejected("Invalid URL".into()))
        );
        assert_eq!(
            service.register("https://down.example/").await,
            Err(TrackingError::Unavailable("status 503 Service Unavailable".into()))
        );
        assert!(matches!(
            service.register("https://garbled.example/").await,
            Err(TrackingError::Unavailable(_))
        ));

        let anonymous = HttpTrackingService::new(&base, None, timeout).unwrap();
        assert_eq!(
            anonymous.register("https://a.com/").await,
            Err(TrackingError::Unavailable("Not authenticated".into()))
        );

        handle.stop(false).await;
    }

    #[tokio::test]
    async fn unreachable_backend_is_unavailable() {
        let service = HttpTrackingService::new("http://127.0.0.1:1", None, Duration::from_secs(2)).unwrap();
        assert!(matches!(
            service.register("https://a.com/").await,
            Err(TrackingError::Unavailable(_))
        ));
    }

    #[test]
    fn tracking_code_is_last_path_segment() {
        assert_eq!(tracking_code("/qr/track/abc").as_deref(), Some("abc"));
        assert_eq!(tracking_code("/qr/track/abc/?x=1").as_deref(), Some("abc"));
        assert_eq!(tracking_code(""), None);
    }
}
