use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};

use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::ApiError;
use crate::model::role::Role;
use crate::models::{Claims, TokenType};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,

    /// Present only if this user is linked to a supplier record
    pub supplier_id: Option<u64>,
}

impl TryFrom<Claims> for AuthUser {
    type Error = ApiError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        if claims.token_type != TokenType::Access {
            return Err(ApiError::unauthorized("Access token required"));
        }
        let role =
            Role::from_id(claims.role).ok_or_else(|| ApiError::unauthorized("Invalid role"))?;
        Ok(AuthUser {
            user_id: claims.user_id,
            username: claims.sub,
            role,
            supplier_id: claims.supplier_id,
        })
    }
}

pub fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // The middleware has usually done the work already
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let Some(token) = bearer_token(req) else {
            return ready(Err(ApiError::unauthorized("Missing token")));
        };

        let Some(config) = req.app_data::<Data<Config>>() else {
            tracing::error!("Config missing from app data");
            return ready(Err(ApiError::Internal));
        };

        ready(
            verify_token(token, &config.jwt_secret)
                .map_err(|_| ApiError::unauthorized("Invalid token"))
                .and_then(AuthUser::try_from),
        )
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(ApiError::forbidden("Admin only"))
        }
    }

    /// Returns the caller's supplier id, or 403 for anyone else.
    pub fn require_supplier(&self) -> Result<u64, ApiError> {
        match (self.role, self.supplier_id) {
            (Role::Supplier, Some(id)) => Ok(id),
            _ => Err(ApiError::forbidden("Supplier only")),
        }
    }
}
