use actix_web::{HttpResponse, web};
use chrono::Utc;
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

use crate::api::products::owned_product;
use crate::auth::auth::AuthUser;
use crate::error::ApiError;
use crate::model::delivery::{
    Delivery, DeliveryChanges, DeliveryFilter, DeliveryStatusUpdate, NewDelivery,
};
use crate::state::AppState;
use crate::store::Page;

#[derive(Serialize, ToSchema)]
pub struct DeliveryListResponse {
    pub data: Vec<Delivery>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 12)]
    pub total: u64,
}

fn delivery_not_found() -> ApiError {
    ApiError::not_found("Delivery not found")
}

async fn owned_delivery(state: &AppState, supplier_id: u64, id: u64) -> Result<Delivery, ApiError> {
    state
        .store
        .get_delivery(supplier_id, id)
        .await?
        .ok_or_else(delivery_not_found)
}

/// Schedule a delivery
#[utoipa::path(
    post,
    path = "/api/supplier/deliveries",
    request_body = NewDelivery,
    responses(
        (status = 201, description = "Delivery scheduled", body = Delivery),
        (status = 400, description = "Invalid fields"),
        (status = 404, description = "Product not found")
    ),
    tag = "Deliveries",
    security(("bearer_auth" = []))
)]
pub async fn create_delivery(
    auth: AuthUser,
    state: web::Data<AppState>,
    payload: web::Json<NewDelivery>,
) -> Result<HttpResponse, ApiError> {
    let supplier_id = auth.require_supplier()?;
    let payload = payload.into_inner();
    payload.validate()?;
    owned_product(&state, supplier_id, payload.product_id).await?;

    let delivery = state.store.create_delivery(supplier_id, payload).await?;
    info!(delivery_id = delivery.id, supplier_id, "Delivery scheduled");
    Ok(HttpResponse::Created().json(delivery))
}

/// List own deliveries
#[utoipa::path(
    get,
    path = "/api/supplier/deliveries",
    params(DeliveryFilter),
    responses(
        (status = 200, description = "Paginated delivery list, newest first", body = DeliveryListResponse)
    ),
    tag = "Deliveries",
    security(("bearer_auth" = []))
)]
pub async fn list_deliveries(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<DeliveryFilter>,
) -> Result<HttpResponse, ApiError> {
    let supplier_id = auth.require_supplier()?;
    let page = Page::new(query.page, query.per_page);

    let (data, total) = state
        .store
        .list_deliveries(supplier_id, &query, Some(page))
        .await?;
    Ok(HttpResponse::Ok().json(DeliveryListResponse {
        data,
        page: page.page,
        per_page: page.per_page,
        total,
    }))
}

/// Get own delivery
#[utoipa::path(
    get,
    path = "/api/supplier/deliveries/{id}",
    params(("id" = u64, Path, description = "Delivery id")),
    responses(
        (status = 200, description = "Delivery", body = Delivery),
        (status = 404, description = "Delivery not found")
    ),
    tag = "Deliveries",
    security(("bearer_auth" = []))
)]
pub async fn get_delivery(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let supplier_id = auth.require_supplier()?;
    let delivery = owned_delivery(&state, supplier_id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(delivery))
}

/// Edit a delivery that is still scheduled or in transit
#[utoipa::path(
    put,
    path = "/api/supplier/deliveries/{id}",
    params(("id" = u64, Path, description = "Delivery id")),
    request_body = DeliveryChanges,
    responses(
        (status = 200, description = "Updated delivery", body = Delivery),
        (status = 400, description = "Empty or invalid update"),
        (status = 404, description = "Delivery not found"),
        (status = 409, description = "Delivery is delivered or cancelled")
    ),
    tag = "Deliveries",
    security(("bearer_auth" = []))
)]
pub async fn update_delivery(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
    payload: web::Json<DeliveryChanges>,
) -> Result<HttpResponse, ApiError> {
    let supplier_id = auth.require_supplier()?;
    let id = path.into_inner();
    payload.validate()?;

    let current = owned_delivery(&state, supplier_id, id).await?;
    if current.status.is_terminal() {
        return Err(ApiError::conflict(format!(
            "Delivery is {} and can no longer be edited",
            current.status
        )));
    }

    let delivery = state
        .store
        .update_delivery(supplier_id, id, &payload)
        .await?
        .ok_or_else(|| ApiError::conflict("Delivery can no longer be edited"))?;
    Ok(HttpResponse::Ok().json(delivery))
}

/// Move a delivery along its lifecycle
///
/// `scheduled → in_transit | cancelled`, `in_transit → delivered | cancelled`.
/// Reaching `delivered` adds the quantity to the product's stock.
#[utoipa::path(
    put,
    path = "/api/supplier/deliveries/{id}/status",
    params(("id" = u64, Path, description = "Delivery id")),
    request_body = DeliveryStatusUpdate,
    responses(
        (status = 200, description = "Updated delivery", body = Delivery),
        (status = 404, description = "Delivery not found"),
        (status = 409, description = "Transition not allowed or stock would overflow")
    ),
    tag = "Deliveries",
    security(("bearer_auth" = []))
)]
pub async fn update_delivery_status(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
    payload: web::Json<DeliveryStatusUpdate>,
) -> Result<HttpResponse, ApiError> {
    let supplier_id = auth.require_supplier()?;
    let id = path.into_inner();
    let next = payload.status;

    let current = owned_delivery(&state, supplier_id, id).await?;
    if !current.status.can_transition_to(next) {
        return Err(ApiError::conflict(format!(
            "Cannot change delivery status from {} to {}",
            current.status, next
        )));
    }

    let delivery = state
        .store
        .transition_delivery(supplier_id, id, current.status, next, Utc::now())
        .await?
        .ok_or_else(|| ApiError::conflict("Delivery status changed concurrently"))?;

    info!(delivery_id = id, from = %current.status, to = %next, "Delivery status changed");
    Ok(HttpResponse::Ok().json(delivery))
}
