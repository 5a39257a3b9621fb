use actix_web::{HttpResponse, web};
use tracing::{info, warn};

use crate::api::suppliers::supplier_not_found;
use crate::auth::auth::AuthUser;
use crate::auth::handlers::validate_new_password;
use crate::auth::password::{hash_password, verify_password};
use crate::error::{ApiError, internal};
use crate::model::supplier::{ProfileChanges, SupplierChanges};
use crate::models::ChangePasswordRequest;
use crate::state::AppState;

/// Get own supplier profile
#[utoipa::path(
    get,
    path = "/api/supplier/profile",
    responses(
        (status = 200, description = "Supplier profile", body = Supplier),
        (status = 403, description = "Supplier only")
    ),
    tag = "Profile",
    security(("bearer_auth" = []))
)]
pub async fn get_profile(
    auth: AuthUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let supplier_id = auth.require_supplier()?;
    let supplier = state
        .store
        .get_supplier(supplier_id)
        .await?
        .ok_or_else(supplier_not_found)?;
    Ok(HttpResponse::Ok().json(supplier))
}

/// Update own supplier profile
#[utoipa::path(
    put,
    path = "/api/supplier/profile",
    request_body = ProfileChanges,
    responses(
        (status = 200, description = "Updated profile", body = Supplier),
        (status = 400, description = "Empty or invalid update")
    ),
    tag = "Profile",
    security(("bearer_auth" = []))
)]
pub async fn update_profile(
    auth: AuthUser,
    state: web::Data<AppState>,
    payload: web::Json<ProfileChanges>,
) -> Result<HttpResponse, ApiError> {
    let supplier_id = auth.require_supplier()?;
    let changes = SupplierChanges::from(payload.into_inner());
    changes.validate()?;

    let supplier = state
        .store
        .update_supplier(supplier_id, &changes)
        .await?
        .ok_or_else(supplier_not_found)?;
    info!(supplier_id, "Supplier profile updated");
    Ok(HttpResponse::Ok().json(supplier))
}

/// Change own password
///
/// Every refresh token of the account is revoked, so other sessions must sign in again.
#[utoipa::path(
    put,
    path = "/api/supplier/profile/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "Current password is wrong or new password too short")
    ),
    tag = "Profile",
    security(("bearer_auth" = []))
)]
pub async fn change_password(
    auth: AuthUser,
    state: web::Data<AppState>,
    payload: web::Json<ChangePasswordRequest>,
) -> Result<HttpResponse, ApiError> {
    auth.require_supplier()?;
    let user = state
        .store
        .find_user(auth.user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Account no longer exists"))?;

    if verify_password(&payload.current_password, &user.password_hash).is_err() {
        warn!(user_id = user.id, "Password change with wrong current password");
        return Err(ApiError::bad_request("Current password is incorrect"));
    }
    validate_new_password(&payload.new_password)?;

    let hashed = hash_password(&payload.new_password)
        .map_err(internal("Failed to hash password"))?;
    state.store.set_password_hash(user.id, &hashed).await?;
    let revoked = state.store.revoke_user_tokens(user.id).await?;

    info!(user_id = user.id, revoked, "Password changed");
    Ok(HttpResponse::NoContent().finish())
}
