use actix_web::{HttpRequest, HttpResponse, Result, error, http, web};
use log::error;
use validator::Validate;

use crate::generator::classifier::classify;
use crate::generator::color::HexColor;
use crate::generator::options::Logo;
use crate::generator::session::{ColorField, GenerateError, GenerateOutcome, GeneratorSession};
use crate::generator::tracking::TrackingError;
use crate::middlewares::authmw::identity_of;
use crate::repository::RecordQuery;
use crate::state::app_state::AppState;
use crate::structs::qr_request::{
    ClassifyRequest, ClassifyResponse, GenerateRequest, QrRecordResponse, RecordsQuery,
};

/// Classify content as the user types.
pub async fn classify_content(web::Json(req): web::Json<ClassifyRequest>) -> HttpResponse {
    let content_type = classify(&req.content);
    HttpResponse::Ok().json(ClassifyResponse {
        content_type,
        trackable: content_type.is_trackable(),
    })
}

/// Live preview. Never tracks and never records.
pub async fn preview_qr(
    app_state: web::Data<AppState>,
    web::Json(body): web::Json<GenerateRequest>,
) -> HttpResponse {
    if let Err(e) = body.validate() {
        return bad_request(&e.to_string(), None);
    }

    let session = app_state.session(None);
    if let Err(response) = apply_options(&session, &body, app_state.config.qr_default_size) {
        return response;
    }

    match session.preview() {
        Ok(Some(artifact)) => HttpResponse::Ok()
            .content_type(artifact.format.mime_type())
            .insert_header((http::header::CACHE_CONTROL, "no-store"))
            .body(artifact.bytes),
        Ok(None) => HttpResponse::NoContent().finish(),
        Err(e) => {
            error!("Preview failed: {}", e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to render QR code"
            }))
        }
    }
}

/// Generate, record and download a code.
///
/// Duplicate-submission suppression is a per-session guarantee. Every
/// request gets a fresh session, so concurrent requests each generate
/// and record their own code.
pub async fn generate_qr(
    app_state: web::Data<AppState>,
    req: HttpRequest,
    web::Json(body): web::Json<GenerateRequest>,
) -> HttpResponse {
    if let Err(e) = body.validate() {
        return bad_request(&e.to_string(), None);
    }

    let identity = identity_of(&req);
    let signed_in = identity.is_some();
    let session = app_state.session(identity);
    if let Err(response) = apply_options(&session, &body, app_state.config.qr_default_size) {
        return response;
    }

    if body.content.is_empty() {
        return HttpResponse::NoContent().finish();
    }
    if body.tracking {
        if !signed_in {
            return HttpResponse::Unauthorized().json(serde_json::json!({
                "error": "Sign in to enable scan tracking"
            }));
        }
        if !session.set_tracking(true) {
            return bad_request("Tracking is only available for URLs", Some("content"));
        }
    }

    match session.generate().await {
        Ok(GenerateOutcome::Ready(download)) => {
            let mut response = HttpResponse::Ok();
            response
                .content_type(download.content_type)
                .insert_header((
                    http::header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", download.file_name),
                ))
                .insert_header(("X-Qr-Record-Id", download.record_id));
            if let Some(tracking_url) = download.tracking_url {
                response.insert_header(("X-Tracking-Url", tracking_url));
            }
            response.body(download.bytes)
        }
        Ok(GenerateOutcome::Nothing) => HttpResponse::NoContent().finish(),
        // Each request owns its session, so these only surface if the
        // session were shared across requests.
        Ok(GenerateOutcome::Suppressed) | Ok(GenerateOutcome::Discarded) => {
            HttpResponse::Conflict().json(serde_json::json!({
                "error": "QR code was not generated, please try again"
            }))
        }
        Err(e) => generate_error_response(e),
    }
}

/// Private dashboard: every code generated with the given access key.
pub async fn get_records_by_key(
    app_state: web::Data<AppState>,
    query: web::Query<RecordsQuery>,
) -> Result<HttpResponse> {
    let key = match query.into_inner().key {
        Some(key) if !key.trim().is_empty() => key,
        _ => return Ok(bad_request("An access key is required", Some("key"))),
    };

    let records = app_state
        .records
        .query(&RecordQuery::ByAccessKey(key))
        .await
        .map_err(|e| error::ErrorInternalServerError(format!("Database error: {}", e)))?;

    let response: Vec<QrRecordResponse> = records.into_iter().map(QrRecordResponse::from).collect();
    Ok(HttpResponse::Ok().json(response))
}

/// Codes generated by one user, newest first.
pub async fn get_user_qr_codes(
    app_state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let user_id = path.into_inner();
    let records = app_state
        .records
        .query(&RecordQuery::ByOwner(user_id))
        .await
        .map_err(|e| error::ErrorInternalServerError(format!("Database error: {}", e)))?;

    let response: Vec<QrRecordResponse> = records.into_iter().map(QrRecordResponse::from).collect();
    Ok(HttpResponse::Ok().json(response))
}

/// Copies the submitted form onto a fresh session.
fn apply_options(
    session: &GeneratorSession,
    body: &GenerateRequest,
    default_size: u32,
) -> Result<(), HttpResponse> {
    session.set_content(body.content.as_str());

    for (field, name, raw) in [
        (ColorField::Foreground, "foreground_color", &body.foreground_color),
        (ColorField::Background, "background_color", &body.background_color),
    ] {
        if let Some(raw) = raw {
            let color = raw
                .parse::<HexColor>()
                .map_err(|e| bad_request(&e.to_string(), Some(name)))?;
            session.set_color(field, color);
        }
    }

    if let Some(logo) = &body.logo {
        let logo = Logo::from_data_url(logo).map_err(|e| bad_request(&e.to_string(), Some("logo")))?;
        session.set_logo(Some(logo));
    }

    session.set_size(body.size.unwrap_or(default_size));
    if let Some(ecc) = body.error_correction {
        session.set_error_correction(ecc);
    }
    if let Some(format) = body.format {
        session.set_format(format);
    }
    session.set_access_key(body.access_key.clone());
    Ok(())
}

fn generate_error_response(e: GenerateError) -> HttpResponse {
    match e {
        GenerateError::Tracking(TrackingError::Rejected(reason)) => {
            bad_request(&reason, Some("content"))
        }
        GenerateError::Tracking(TrackingError::Unavailable(detail)) => {
            error!("Tracking service unavailable: {}", detail);
            HttpResponse::BadGateway().json(serde_json::json!({
                "error": "Tracking service unavailable, please try again"
            }))
        }
        GenerateError::Render(e) => {
            error!("Render failed: {}", e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to generate QR code"
            }))
        }
        GenerateError::Persistence(e) => {
            error!("Failed to record QR code: {}", e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to save QR code"
            }))
        }
    }
}

fn bad_request(message: &str, field: Option<&str>) -> HttpResponse {
    match field {
        Some(field) => HttpResponse::BadRequest().json(serde_json::json!({
            "error": message,
            "field": field
        })),
        None => HttpResponse::BadRequest().json(serde_json::json!({ "error": message })),
    }
}
