use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, ResponseError,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};

use crate::auth::auth::AuthUser;
use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::ApiError;

/// Rejects the request unless it carries a valid access token; on success the
/// caller's `AuthUser` is stored in the request extensions.
pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    match authenticate(&req) {
        Ok(user) => {
            req.extensions_mut().insert(user);
            next.call(req).await
        }
        Err(err) => {
            tracing::debug!(path = %req.path(), reason = %err, "Rejected unauthenticated request");
            Ok(req.into_response(err.error_response()))
        }
    }
}

fn authenticate(req: &ServiceRequest) -> Result<AuthUser, ApiError> {
    let config = req.app_data::<Data<Config>>().ok_or_else(|| {
        tracing::error!("App config missing");
        ApiError::Internal
    })?;

    let header_value = req
        .headers()
        .get("Authorization")
        .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?
        .to_str()
        .map_err(|_| ApiError::unauthorized("Invalid Authorization header encoding"))?;

    let token = header_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::unauthorized("Authorization header must start with Bearer"))?;

    let claims = verify_token(token, &config.jwt_secret)
        .map_err(|_| ApiError::unauthorized("Invalid or expired token"))?;

    AuthUser::try_from(claims)
}
