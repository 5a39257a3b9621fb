use actix_web::{HttpResponse, web};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::auth::AuthUser;
use crate::error::ApiError;
use crate::model::delivery::DeliveryStatus;
use crate::model::product::ProductFilter;
use crate::model::reorder::{ReorderCounts, ReorderFilter, ReorderRequest, ReorderStatus};
use crate::model::supplier::SupplierCounts;
use crate::state::AppState;
use crate::store::Page;

const RECENT_RESPONSES: u32 = 5;

#[derive(Serialize, ToSchema)]
pub struct AdminDashboard {
    pub suppliers: SupplierCounts,
    pub reorders: ReorderCounts,
    /// Pending requests the supplier has not answered yet
    pub awaiting_response: u64,
    pub recent_responses: Vec<ReorderRequest>,
}

#[derive(Debug, PartialEq, Serialize, ToSchema)]
pub struct SupplierDashboard {
    pub products: u64,
    pub low_stock: u64,
    #[schema(example = 1520.5)]
    pub inventory_value: f64,
    pub pending_reorders: u64,
    pub deliveries_in_transit: u64,
}

/// Admin overview
#[utoipa::path(
    get,
    path = "/api/admin/dashboard",
    responses(
        (status = 200, description = "Supplier and reorder counters", body = AdminDashboard),
        (status = 403, description = "Admin only")
    ),
    tag = "Dashboard",
    security(("bearer_auth" = []))
)]
pub async fn admin_dashboard(
    auth: AuthUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;

    let suppliers = state.store.supplier_counts().await?;
    let reorders = state.store.reorder_counts(None).await?;

    let unanswered = ReorderFilter {
        status: Some(ReorderStatus::Pending),
        responded: Some(false),
        ..Default::default()
    };
    let (_, awaiting_response) = state
        .store
        .list_reorders(&unanswered, Some(Page::new(Some(1), Some(1))))
        .await?;
    let (recent_responses, _) = state
        .store
        .list_responses(Page::new(Some(1), Some(RECENT_RESPONSES)))
        .await?;

    Ok(HttpResponse::Ok().json(AdminDashboard {
        suppliers,
        reorders,
        awaiting_response,
        recent_responses,
    }))
}

/// Supplier overview
#[utoipa::path(
    get,
    path = "/api/supplier/dashboard",
    responses(
        (status = 200, description = "Catalogue, reorder and delivery counters", body = SupplierDashboard),
        (status = 403, description = "Supplier only")
    ),
    tag = "Dashboard",
    security(("bearer_auth" = []))
)]
pub async fn supplier_dashboard(
    auth: AuthUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let supplier_id = auth.require_supplier()?;

    let (products, total) = state
        .store
        .list_products(supplier_id, &ProductFilter::default(), None)
        .await?;
    let low_stock = products.iter().filter(|p| p.is_low_stock()).count() as u64;
    let inventory_value = products.iter().map(|p| p.stock_value()).sum();

    let pending_reorders = state.store.reorder_counts(Some(supplier_id)).await?.pending;
    let deliveries_in_transit = state
        .store
        .count_deliveries(supplier_id, DeliveryStatus::InTransit)
        .await?;

    Ok(HttpResponse::Ok().json(SupplierDashboard {
        products: total,
        low_stock,
        inventory_value,
        pending_reorders,
        deliveries_in_transit,
    }))
}
