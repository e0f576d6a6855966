use actix_web::{HttpRequest, HttpResponse, Result, error, http, web};
use log::{debug, warn};
use validator::Validate;

use crate::links::LinkError;
use crate::models::scan::ScanEvent;
use crate::state::app_state::AppState;
use crate::structs::link_request::{LinkStatsResponse, TrackableRequest, TrackableResponse};
use crate::utils::device::detect_device;
use crate::utils::hash_ip::hash_ip;

/// Register a destination for tracking and hand back its redirect path.
pub async fn create_trackable(
    app_state: web::Data<AppState>,
    web::Json(req): web::Json<TrackableRequest>,
) -> Result<HttpResponse> {
    if req.validate().is_err() {
        return Ok(invalid_url());
    }

    match app_state.links.register(&req.url).await {
        Ok(link) => Ok(HttpResponse::Ok().json(TrackableResponse::from(link))),
        Err(LinkError::InvalidUrl) | Err(LinkError::NotFound) => Ok(invalid_url()),
        Err(LinkError::Repository(e)) => Err(error::ErrorInternalServerError(format!(
            "Database error: {}",
            e
        ))),
    }
}

/// Redirect a scan to its destination; the scan is recorded in the background.
pub async fn track_redirect(
    app_state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let code = path.into_inner();
    let link = match app_state.links.resolve(&code).await {
        Ok(link) => link,
        Err(LinkError::Repository(e)) => {
            return Err(error::ErrorInternalServerError(format!("Database error: {}", e)));
        }
        Err(_) => {
            return Ok(HttpResponse::NotFound().json(serde_json::json!({
                "error": "Tracking link not found"
            })));
        }
    };

    let ip = req
        .connection_info()
        .realip_remote_addr()
        .unwrap_or("unknown")
        .to_string();
    let user_agent = req
        .headers()
        .get(http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let referrer = req
        .headers()
        .get(http::header::REFERER)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let scan = ScanEvent::new(
        hash_ip(&ip, &app_state.config.ip_hash_salt),
        user_agent.clone(),
        referrer,
        detect_device(user_agent.as_deref()),
    );

    // Don't hold up the redirect on the bookkeeping
    let links = app_state.links.clone();
    actix_web::rt::spawn(async move {
        match links.record_scan(&code, scan).await {
            Ok(()) => debug!("Recorded scan of {}", code),
            Err(e) => warn!("Failed to record scan of {}: {}", code, e),
        }
    });

    Ok(HttpResponse::Found()
        .append_header((http::header::LOCATION, link.url))
        .finish())
}

pub async fn get_link_stats(
    app_state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    match app_state.links.resolve(&path.into_inner()).await {
        Ok(link) => Ok(HttpResponse::Ok().json(LinkStatsResponse::from(link))),
        Err(LinkError::Repository(e)) => Err(error::ErrorInternalServerError(format!(
            "Database error: {}",
            e
        ))),
        Err(_) => Ok(HttpResponse::NotFound().json(serde_json::json!({
            "error": "Tracking link not found"
        }))),
    }
}

fn invalid_url() -> HttpResponse {
    HttpResponse::BadRequest().json(serde_json::json!({ "detail": "Invalid URL" }))
}
