use actix_web::web;

use crate::handlers::auth_handlers::{login, signup};
use crate::handlers::health_handlers::health_check;
use crate::handlers::qr_handlers::{
    classify_content, generate_qr, get_records_by_key, get_user_qr_codes, preview_qr,
};
use crate::handlers::tracking_handlers::{create_trackable, get_link_stats, track_redirect};
use crate::handlers::user_handlers::get_current_user;
use crate::middlewares::authmw::JwtAuth;
use crate::middlewares::res_owner::ResourceOwnership;

const LOGO_BODY_LIMIT: usize = 8 * 1024 * 1024;

/// Configure the routes
pub fn init_routes(cfg: &mut web::ServiceConfig) {
    // Tracking backend - scanned codes land here, only registration needs a token
    cfg.service(
        web::scope("/qr")
            .service(
                web::resource("/trackable")
                    .wrap(JwtAuth::required())
                    .route(web::post().to(create_trackable)),
            )
            .route("/track/{code}", web::get().to(track_redirect))
            .route("/stats/{code}", web::get().to(get_link_stats)),
    );
    // Authentication routes - no auth required
    cfg.service(
        web::scope("/api/auth")
            .route("/login", web::post().to(login))
            .route("/signup", web::post().to(signup)),
    );
    cfg.route("/api/health/check", web::get().to(health_check));
    // Generator routes - anonymous use allowed, a token unlocks tracking
    cfg.service(
        web::scope("/api/qr")
            .wrap(JwtAuth::optional())
            // Logos travel inline as data URLs
            .app_data(web::JsonConfig::default().limit(LOGO_BODY_LIMIT))
            .route("/classify", web::post().to(classify_content))
            .route("/preview", web::post().to(preview_qr))
            .route("/generate", web::post().to(generate_qr))
            .route("/records", web::get().to(get_records_by_key)),
    );
    // User routes - require authentication
    cfg.service(
        web::scope("/api/users")
            .wrap(JwtAuth::required())
            .route("/me", web::get().to(get_current_user))
            .service(
                web::resource("/{user_id}/qr")
                    .wrap(ResourceOwnership::new("user_id"))
                    .route(web::get().to(get_user_qr_codes)),
            ),
    );
}
