use actix_web::{HttpResponse, Result, error, web};
use bcrypt::{DEFAULT_COST, hash, verify};
use log::info;
use validator::Validate;

use crate::models::user::User;
use crate::state::app_state::AppState;
use crate::structs::user::{LoginRequest, LoginResponse, SignupRequest, UserResponse};
use crate::utils::jwt::create_token;

pub async fn signup(
    app_state: web::Data<AppState>,
    web::Json(req): web::Json<SignupRequest>,
) -> Result<HttpResponse> {
    if let Err(e) = req.validate() {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "error": e.to_string()
        })));
    }

    let email = req.email.trim().to_lowercase();
    let existing = app_state
        .users
        .find_by_email(&email)
        .await
        .map_err(|e| error::ErrorInternalServerError(format!("Database error: {}", e)))?;
    if existing.is_some() {
        return Ok(HttpResponse::Conflict().json(serde_json::json!({
            "error": "An account with this email already exists"
        })));
    }

    let password_hash = hash(&req.password, DEFAULT_COST)
        .map_err(|e| error::ErrorInternalServerError(format!("Failed to hash password: {}", e)))?;

    let user = app_state
        .users
        .insert(User::new(email, req.name.trim().to_string(), password_hash))
        .await
        .map_err(|e| error::ErrorInternalServerError(format!("Failed to create user: {}", e)))?;
    info!("New account {}", user.email);

    let response = issue_token(&app_state, user)?;
    Ok(HttpResponse::Created().json(response))
}

pub async fn login(
    app_state: web::Data<AppState>,
    web::Json(req): web::Json<LoginRequest>,
) -> Result<HttpResponse> {
    let email = req.email.trim().to_lowercase();
    let user = app_state
        .users
        .find_by_email(&email)
        .await
        .map_err(|e| error::ErrorInternalServerError(format!("Database error: {}", e)))?;

    let Some(mut user) = user else {
        return Ok(invalid_credentials());
    };

    let password_matches = verify(&req.password, &user.password_hash)
        .map_err(|_| error::ErrorInternalServerError("Password verification failed"))?;
    if !password_matches {
        return Ok(invalid_credentials());
    }

    user.update_last_login();
    if let (Some(id), Some(at)) = (user.id, user.last_login) {
        app_state
            .users
            .touch_login(&id.to_hex(), at)
            .await
            .map_err(|e| {
                error::ErrorInternalServerError(format!("Failed to update last login: {}", e))
            })?;
    }

    Ok(HttpResponse::Ok().json(issue_token(&app_state, user)?))
}

fn issue_token(app_state: &AppState, user: User) -> Result<LoginResponse> {
    let user_id = user
        .id
        .map(|id| id.to_hex())
        .ok_or_else(|| error::ErrorInternalServerError("User has no id"))?;
    let token = create_token(&app_state.config.jwt_secret, &user_id, &user.email)
        .map_err(|e| error::ErrorInternalServerError(format!("Token generation failed: {}", e)))?;

    Ok(LoginResponse {
        token,
        user: UserResponse::from(user),
    })
}

fn invalid_credentials() -> HttpResponse {
    HttpResponse::Unauthorized().json(serde_json::json!({
        "error": "Invalid credentials"
    }))
}
