use actix_web::{HttpResponse, web};
use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::auth::auth::AuthUser;
use crate::error::ApiError;
use crate::model::supplier::{
    NewSupplier, Supplier, SupplierChanges, SupplierFilter, SupplierStatus,
};
use crate::state::AppState;
use crate::store::Page;

#[derive(Serialize, ToSchema)]
pub struct SupplierListResponse {
    pub data: Vec<Supplier>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 42)]
    pub total: u64,
}

pub(crate) fn supplier_not_found() -> ApiError {
    ApiError::not_found("Supplier not found")
}

/// An inactive supplier's login sessions end with it.
async fn revoke_logins(state: &AppState, supplier: &Supplier) {
    if supplier.status != SupplierStatus::Inactive {
        return;
    }
    if let Some(user_id) = supplier.user_id {
        match state.store.revoke_user_tokens(user_id).await {
            Ok(revoked) => info!(supplier_id = supplier.id, revoked, "Supplier sessions revoked"),
            Err(e) => {
                warn!(error = %e, supplier_id = supplier.id, "Failed to revoke supplier sessions")
            }
        }
    }
}

/// Create supplier
#[utoipa::path(
    post,
    path = "/api/admin/suppliers",
    request_body = NewSupplier,
    responses(
        (status = 201, description = "Supplier created", body = Supplier),
        (status = 400, description = "Invalid fields"),
        (status = 403, description = "Admin only")
    ),
    tag = "Suppliers",
    security(("bearer_auth" = []))
)]
pub async fn create_supplier(
    auth: AuthUser,
    state: web::Data<AppState>,
    payload: web::Json<NewSupplier>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let payload = payload.into_inner();
    payload.validate()?;

    let supplier = state.store.create_supplier(payload).await?;
    info!(supplier_id = supplier.id, admin = auth.user_id, "Supplier created");
    Ok(HttpResponse::Created().json(supplier))
}

/// List suppliers
#[utoipa::path(
    get,
    path = "/api/admin/suppliers",
    params(SupplierFilter),
    responses(
        (status = 200, description = "Paginated supplier list, newest first", body = SupplierListResponse),
        (status = 403, description = "Admin only")
    ),
    tag = "Suppliers",
    security(("bearer_auth" = []))
)]
pub async fn list_suppliers(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<SupplierFilter>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let page = Page::new(query.page, query.per_page);

    let (data, total) = state.store.list_suppliers(&query, page).await?;
    Ok(HttpResponse::Ok().json(SupplierListResponse {
        data,
        page: page.page,
        per_page: page.per_page,
        total,
    }))
}

/// Get supplier by id
#[utoipa::path(
    get,
    path = "/api/admin/suppliers/{id}",
    params(("id" = u64, Path, description = "Supplier id")),
    responses(
        (status = 200, description = "Supplier", body = Supplier),
        (status = 404, description = "Supplier not found")
    ),
    tag = "Suppliers",
    security(("bearer_auth" = []))
)]
pub async fn get_supplier(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let supplier = state
        .store
        .get_supplier(path.into_inner())
        .await?
        .ok_or_else(supplier_not_found)?;
    Ok(HttpResponse::Ok().json(supplier))
}

/// Update supplier
#[utoipa::path(
    put,
    path = "/api/admin/suppliers/{id}",
    params(("id" = u64, Path, description = "Supplier id")),
    request_body = SupplierChanges,
    responses(
        (status = 200, description = "Updated supplier", body = Supplier),
        (status = 400, description = "Empty or invalid update"),
        (status = 404, description = "Supplier not found")
    ),
    tag = "Suppliers",
    security(("bearer_auth" = []))
)]
pub async fn update_supplier(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
    payload: web::Json<SupplierChanges>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    payload.validate()?;

    let supplier = state
        .store
        .update_supplier(path.into_inner(), &payload)
        .await?
        .ok_or_else(supplier_not_found)?;

    if payload.status.is_some() {
        revoke_logins(&state, &supplier).await;
    }
    Ok(HttpResponse::Ok().json(supplier))
}

/// Deactivate supplier
///
/// Suppliers are never hard-deleted; their history stays readable.
#[utoipa::path(
    delete,
    path = "/api/admin/suppliers/{id}",
    params(("id" = u64, Path, description = "Supplier id")),
    responses(
        (status = 200, description = "Supplier deactivated", body = Supplier),
        (status = 404, description = "Supplier not found")
    ),
    tag = "Suppliers",
    security(("bearer_auth" = []))
)]
pub async fn deactivate_supplier(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let changes = SupplierChanges {
        status: Some(SupplierStatus::Inactive),
        ..Default::default()
    };

    let supplier = state
        .store
        .update_supplier(path.into_inner(), &changes)
        .await?
        .ok_or_else(supplier_not_found)?;

    revoke_logins(&state, &supplier).await;
    info!(supplier_id = supplier.id, admin = auth.user_id, "Supplier deactivated");
    Ok(HttpResponse::Ok().json(supplier))
}
