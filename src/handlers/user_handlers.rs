use actix_web::{HttpMessage, HttpRequest, HttpResponse, Result, error, web};

use crate::state::app_state::AppState;
use crate::structs::user::UserResponse;
use crate::utils::jwt::Claims;

/// The signed-in user's own profile.
pub async fn get_current_user(
    app_state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let user_id = req
        .extensions()
        .get::<Claims>()
        .map(|claims| claims.user_id.clone())
        .ok_or_else(|| error::ErrorUnauthorized("User claims not found in request"))?;

    let user = app_state
        .users
        .find_by_id(&user_id)
        .await
        .map_err(|e| error::ErrorInternalServerError(format!("Database error: {}", e)))?
        .ok_or_else(|| error::ErrorNotFound("User not found"))?;

    Ok(HttpResponse::Ok().json(UserResponse::from(user)))
}
