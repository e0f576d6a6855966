use std::future::{Ready, ready};

use actix_web::{
    Error, HttpMessage, HttpRequest,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    error::{ErrorInternalServerError, ErrorUnauthorized},
    http::header,
    web,
};
use futures_util::future::LocalBoxFuture;

use crate::generator::session::Identity;
use crate::state::app_state::AppState;
use crate::utils::jwt::{Claims, validate_token};

/// Bearer token authentication. Valid claims are stored in the request
/// extensions for handlers and `ResourceOwnership`.
///
/// In optional mode requests without an `Authorization` header pass through
/// anonymously; a header that is present must still be valid.
pub struct JwtAuth {
    optional: bool,
}

impl JwtAuth {
    pub fn required() -> Self {
        Self { optional: false }
    }

    pub fn optional() -> Self {
        Self { optional: true }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = JwtAuthMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtAuthMiddleware {
            service,
            optional: self.optional,
        }))
    }
}

pub struct JwtAuthMiddleware<S> {
    service: S,
    optional: bool,
}

impl<S, B> Service<ServiceRequest> for JwtAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // Get token from Authorization header
        let auth_header = match req.headers().get(header::AUTHORIZATION) {
            Some(header) => header,
            None if self.optional => return Box::pin(self.service.call(req)),
            None => {
                return Box::pin(async move { Err(ErrorUnauthorized("No authorization header")) });
            }
        };

        let auth_header_str = match auth_header.to_str() {
            Ok(header_str) => header_str,
            Err(_) => {
                return Box::pin(
                    async move { Err(ErrorUnauthorized("Invalid authorization header")) },
                );
            }
        };

        let Some(token) = auth_header_str.strip_prefix("Bearer ") else {
            return Box::pin(async move { Err(ErrorUnauthorized("Invalid authorization format")) });
        };

        let Some(state) = req.app_data::<web::Data<AppState>>() else {
            return Box::pin(async move { Err(ErrorInternalServerError("Application state missing")) });
        };

        let claims = match validate_token(&state.config.jwt_secret, token) {
            Ok(claims) => claims,
            Err(_) => {
                return Box::pin(async move { Err(ErrorUnauthorized("Invalid token")) });
            }
        };

        // Store claims in request extensions for later use
        req.extensions_mut().insert(claims);

        Box::pin(self.service.call(req))
    }
}

/// The signed-in user of a request that went through `JwtAuth`, if any.
pub fn identity_of(req: &HttpRequest) -> Option<Identity> {
    req.extensions().get::<Claims>().map(Claims::identity)
}
