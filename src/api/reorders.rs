use actix_web::{HttpResponse, web};
use chrono::Utc;
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

use crate::api::PageQuery;
use crate::api::products::product_not_found;
use crate::api::suppliers::supplier_not_found;
use crate::auth::auth::AuthUser;
use crate::error::ApiError;
use crate::model::reorder::{
    NewReorder, ReorderDraft, ReorderFilter, ReorderRequest, ReorderStatus, RespondToReorder,
};
use crate::state::AppState;
use crate::store::Page;

#[derive(Serialize, ToSchema)]
pub struct ReorderListResponse {
    pub data: Vec<ReorderRequest>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 8)]
    pub total: u64,
}

fn reorder_not_found() -> ApiError {
    ApiError::not_found("Reorder request not found")
}

async fn reorder_page(
    state: &AppState,
    filter: &ReorderFilter,
) -> Result<ReorderListResponse, ApiError> {
    let page = Page::new(filter.page, filter.per_page);
    let (data, total) = state.store.list_reorders(filter, Some(page)).await?;
    Ok(ReorderListResponse {
        data,
        page: page.page,
        per_page: page.per_page,
        total,
    })
}

async fn load_reorder(state: &AppState, id: u64) -> Result<ReorderRequest, ApiError> {
    state
        .store
        .get_reorder(id)
        .await?
        .ok_or_else(reorder_not_found)
}

/// Compare-and-set status change shared by the admin actions.
async fn transition(
    state: &AppState,
    request: &ReorderRequest,
    to: ReorderStatus,
) -> Result<ReorderRequest, ApiError> {
    state
        .store
        .transition_reorder(request.id, request.status, to, Utc::now())
        .await?
        .ok_or_else(|| ApiError::conflict("Reorder request changed concurrently"))
}

// ---------------- admin ----------------

/// Raise a reorder request for a product
#[utoipa::path(
    post,
    path = "/api/admin/reorders",
    request_body = NewReorder,
    responses(
        (status = 201, description = "Reorder request created", body = ReorderRequest),
        (status = 400, description = "Quantity must be positive"),
        (status = 404, description = "Product not found"),
        (status = 409, description = "Supplier is inactive")
    ),
    tag = "Reorders",
    security(("bearer_auth" = []))
)]
pub async fn create_reorder(
    auth: AuthUser,
    state: web::Data<AppState>,
    payload: web::Json<NewReorder>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let payload = payload.into_inner();
    payload.validate()?;

    let product = state
        .store
        .get_product(payload.product_id)
        .await?
        .ok_or_else(product_not_found)?;
    let supplier = state
        .store
        .get_supplier(product.supplier_id)
        .await?
        .ok_or_else(supplier_not_found)?;
    if !supplier.is_active() {
        return Err(ApiError::conflict("Supplier is inactive"));
    }

    let request = state
        .store
        .create_reorder(ReorderDraft {
            supplier_id: supplier.id,
            product_id: product.id,
            quantity: payload.quantity,
            notes: payload.notes,
            requested_by: auth.user_id,
        })
        .await?;

    info!(reorder_id = request.id, supplier_id = supplier.id, "Reorder request created");
    Ok(HttpResponse::Created().json(request))
}

/// List reorder requests
#[utoipa::path(
    get,
    path = "/api/admin/reorders",
    params(ReorderFilter),
    responses(
        (status = 200, description = "Paginated reorder requests, newest first", body = ReorderListResponse)
    ),
    tag = "Reorders",
    security(("bearer_auth" = []))
)]
pub async fn list_reorders(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<ReorderFilter>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    Ok(HttpResponse::Ok().json(reorder_page(&state, &query).await?))
}

/// Reorder requests answered by suppliers, latest response first
#[utoipa::path(
    get,
    path = "/api/admin/reorders/responses",
    params(PageQuery),
    responses(
        (status = 200, description = "Paginated responded requests", body = ReorderListResponse)
    ),
    tag = "Reorders",
    security(("bearer_auth" = []))
)]
pub async fn list_responses(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let page = Page::from(query.into_inner());

    let (data, total) = state.store.list_responses(page).await?;
    Ok(HttpResponse::Ok().json(ReorderListResponse {
        data,
        page: page.page,
        per_page: page.per_page,
        total,
    }))
}

/// Get a reorder request
#[utoipa::path(
    get,
    path = "/api/admin/reorders/{id}",
    params(("id" = u64, Path, description = "Reorder request id")),
    responses(
        (status = 200, description = "Reorder request", body = ReorderRequest),
        (status = 404, description = "Reorder request not found")
    ),
    tag = "Reorders",
    security(("bearer_auth" = []))
)]
pub async fn get_reorder(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    Ok(HttpResponse::Ok().json(load_reorder(&state, path.into_inner()).await?))
}

/// Mark an acknowledged request as fulfilled
#[utoipa::path(
    put,
    path = "/api/admin/reorders/{id}/fulfill",
    params(("id" = u64, Path, description = "Reorder request id")),
    responses(
        (status = 200, description = "Request fulfilled", body = ReorderRequest),
        (status = 404, description = "Reorder request not found"),
        (status = 409, description = "Request is not acknowledged")
    ),
    tag = "Reorders",
    security(("bearer_auth" = []))
)]
pub async fn fulfill_reorder(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let request = load_reorder(&state, path.into_inner()).await?;
    if !request.status.can_fulfill() {
        return Err(ApiError::conflict(format!(
            "Only acknowledged requests can be fulfilled (status is {})",
            request.status
        )));
    }

    let updated = transition(&state, &request, ReorderStatus::Fulfilled).await?;
    info!(reorder_id = updated.id, "Reorder request fulfilled");
    Ok(HttpResponse::Ok().json(updated))
}

/// Cancel a pending or acknowledged request
#[utoipa::path(
    put,
    path = "/api/admin/reorders/{id}/cancel",
    params(("id" = u64, Path, description = "Reorder request id")),
    responses(
        (status = 200, description = "Request cancelled", body = ReorderRequest),
        (status = 404, description = "Reorder request not found"),
        (status = 409, description = "Request is already closed")
    ),
    tag = "Reorders",
    security(("bearer_auth" = []))
)]
pub async fn cancel_reorder(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let request = load_reorder(&state, path.into_inner()).await?;
    if !request.status.can_cancel() {
        return Err(ApiError::conflict(format!(
            "A {} request cannot be cancelled",
            request.status
        )));
    }

    let updated = transition(&state, &request, ReorderStatus::Cancelled).await?;
    info!(reorder_id = updated.id, "Reorder request cancelled");
    Ok(HttpResponse::Ok().json(updated))
}

// ---------------- supplier ----------------

/// List reorder requests addressed to the caller
#[utoipa::path(
    get,
    path = "/api/supplier/reorders",
    params(ReorderFilter),
    responses(
        (status = 200, description = "Paginated reorder requests, newest first", body = ReorderListResponse)
    ),
    tag = "Reorders",
    security(("bearer_auth" = []))
)]
pub async fn list_own_reorders(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<ReorderFilter>,
) -> Result<HttpResponse, ApiError> {
    let supplier_id = auth.require_supplier()?;
    let filter = ReorderFilter {
        supplier_id: Some(supplier_id),
        ..query.into_inner()
    };
    Ok(HttpResponse::Ok().json(reorder_page(&state, &filter).await?))
}

/// Get a reorder request addressed to the caller
#[utoipa::path(
    get,
    path = "/api/supplier/reorders/{id}",
    params(("id" = u64, Path, description = "Reorder request id")),
    responses(
        (status = 200, description = "Reorder request", body = ReorderRequest),
        (status = 404, description = "Reorder request not found")
    ),
    tag = "Reorders",
    security(("bearer_auth" = []))
)]
pub async fn get_own_reorder(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let supplier_id = auth.require_supplier()?;
    let request = load_reorder(&state, path.into_inner()).await?;
    if request.supplier_id != supplier_id {
        return Err(reorder_not_found());
    }
    Ok(HttpResponse::Ok().json(request))
}

/// Acknowledge or decline a pending reorder request
#[utoipa::path(
    put,
    path = "/api/supplier/reorders/{id}/respond",
    params(("id" = u64, Path, description = "Reorder request id")),
    request_body = RespondToReorder,
    responses(
        (status = 200, description = "Response recorded", body = ReorderRequest),
        (status = 400, description = "Missing message or invalid delivery estimate"),
        (status = 404, description = "Reorder request not found"),
        (status = 409, description = "Request was already answered or closed")
    ),
    tag = "Reorders",
    security(("bearer_auth" = []))
)]
pub async fn respond_to_reorder(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
    payload: web::Json<RespondToReorder>,
) -> Result<HttpResponse, ApiError> {
    let supplier_id = auth.require_supplier()?;
    let id = path.into_inner();
    let now = Utc::now();
    let payload = payload.into_inner();
    payload.validate(now.date_naive())?;

    let request = load_reorder(&state, id).await?;
    if request.supplier_id != supplier_id {
        return Err(reorder_not_found());
    }
    if !request.status.accepts_response() {
        return Err(ApiError::conflict(format!(
            "Only pending requests can be answered (status is {})",
            request.status
        )));
    }

    let (response, status) = payload.into_response(now);
    let updated = state
        .store
        .record_response(supplier_id, id, &response, status)
        .await?
        .ok_or_else(|| ApiError::conflict("Reorder request changed concurrently"))?;

    info!(reorder_id = id, supplier_id, status = %updated.status, "Supplier responded to reorder");
    Ok(HttpResponse::Ok().json(updated))
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::test;
    use chrono::{Days, Utc};
    use serde_json::{Value, json};

    use crate::test_support::{SupplierSession, TestContext};

    struct Fixture {
        ctx: TestContext,
        admin: String,
        acme: SupplierSession,
        product_id: u64,
    }

    async fn fixture() -> Fixture {
        let ctx = TestContext::new().await;
        let app = ctx.app().await;
        let admin = ctx.admin_token(&app).await;
        let acme = ctx.register_supplier(&app, "acme").await;
        let product_id = ctx
            .product_id(
                &app,
                &acme.access_token,
                json!({
                    "name": "Oat milk",
                    "sku": "OAT-1L",
                    "category": "dairy-alternatives",
                    "price": 2.4,
                    "stock_quantity": 3,
                    "reorder_level": 5
                }),
            )
            .await;
        drop(app);
        Fixture {
            ctx,
            admin,
            acme,
            product_id,
        }
    }

    fn tomorrow() -> String {
        (Utc::now().date_naive() + Days::new(1)).to_string()
    }

    #[actix_web::test]
    async fn full_request_response_cycle() {
        let f = fixture().await;
        let app = f.ctx.app().await;
        let id = f.ctx.reorder_id(&app, &f.admin, f.product_id, 100).await;

        // Supplier sees it and acknowledges
        let req = f
            .ctx
            .get("/api/supplier/reorders?status=pending")
            .insert_header(("Authorization", format!("Bearer {}", f.acme.access_token)))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["total"], 1);

        let req = f
            .ctx
            .put(&format!("/api/supplier/reorders/{id}/respond"))
            .insert_header(("Authorization", format!("Bearer {}", f.acme.access_token)))
            .set_json(json!({
                "acknowledged": true,
                "message": "Shipping next week",
                "estimated_delivery": tomorrow()
            }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "acknowledged");
        assert_eq!(body["supplier_response"]["message"], "Shipping next week");

        // Admin sees the response, then fulfils
        let req = f
            .ctx
            .get("/api/admin/reorders/responses")
            .insert_header(("Authorization", format!("Bearer {}", f.admin)))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["data"][0]["id"], id);

        let req = f
            .ctx
            .put(&format!("/api/admin/reorders/{id}/fulfill"))
            .insert_header(("Authorization", format!("Bearer {}", f.admin)))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "fulfilled");

        // Closed requests can no longer be cancelled
        let req = f
            .ctx
            .put(&format!("/api/admin/reorders/{id}/cancel"))
            .insert_header(("Authorization", format!("Bearer {}", f.admin)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[actix_web::test]
    async fn a_request_can_only_be_answered_once() {
        let f = fixture().await;
        let app = f.ctx.app().await;
        let id = f.ctx.reorder_id(&app, &f.admin, f.product_id, 10).await;

        let respond = || {
            f.ctx
                .put(&format!("/api/supplier/reorders/{id}/respond"))
                .insert_header(("Authorization", format!("Bearer {}", f.acme.access_token)))
                .set_json(json!({"acknowledged": false, "message": "No raw material"}))
                .to_request()
        };

        let body: Value = test::call_and_read_body_json(&app, respond()).await;
        assert_eq!(body["status"], "declined");

        let resp = test::call_service(&app, respond()).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[actix_web::test]
    async fn admin_list_splits_answered_from_unanswered() {
        let f = fixture().await;
        let app = f.ctx.app().await;
        let answered = f.ctx.reorder_id(&app, &f.admin, f.product_id, 10).await;
        let waiting = f.ctx.reorder_id(&app, &f.admin, f.product_id, 20).await;

        let req = f
            .ctx
            .put(&format!("/api/supplier/reorders/{answered}/respond"))
            .insert_header(("Authorization", format!("Bearer {}", f.acme.access_token)))
            .set_json(json!({
                "acknowledged": true,
                "message": "Shipping Monday",
                "estimated_delivery": tomorrow()
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        for (responded, expected) in [(true, answered), (false, waiting)] {
            let req = f
                .ctx
                .get(&format!("/api/admin/reorders?responded={responded}"))
                .insert_header(("Authorization", format!("Bearer {}", f.admin)))
                .to_request();
            let body: Value = test::call_and_read_body_json(&app, req).await;
            assert_eq!(body["total"], 1, "responded={responded}");
            assert_eq!(body["data"][0]["id"], expected);
        }

        let req = f
            .ctx
            .get("/api/admin/reorders")
            .insert_header(("Authorization", format!("Bearer {}", f.admin)))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["total"], 2);
    }

    #[actix_web::test]
    async fn acknowledgment_in_the_past_is_rejected() {
        let f = fixture().await;
        let app = f.ctx.app().await;
        let id = f.ctx.reorder_id(&app, &f.admin, f.product_id, 10).await;

        let req = f
            .ctx
            .put(&format!("/api/supplier/reorders/{id}/respond"))
            .insert_header(("Authorization", format!("Bearer {}", f.acme.access_token)))
            .set_json(json!({
                "acknowledged": true,
                "message": "Sure",
                "estimated_delivery": "2001-01-01"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn other_suppliers_cannot_see_or_answer() {
        let f = fixture().await;
        let app = f.ctx.app().await;
        let id = f.ctx.reorder_id(&app, &f.admin, f.product_id, 10).await;
        let globex = f.ctx.register_supplier(&app, "globex").await;

        let req = f
            .ctx
            .get(&format!("/api/supplier/reorders/{id}"))
            .insert_header(("Authorization", format!("Bearer {}", globex.access_token)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn creation_rules() {
        let f = fixture().await;
        let app = f.ctx.app().await;

        let create = |product_id: u64, quantity: u32| {
            f.ctx
                .post("/api/admin/reorders")
                .insert_header(("Authorization", format!("Bearer {}", f.admin)))
                .set_json(json!({"product_id": product_id, "quantity": quantity}))
                .to_request()
        };

        let resp = test::call_service(&app, create(f.product_id, 0)).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = test::call_service(&app, create(9_999, 5)).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let req = f
            .ctx
            .delete(&format!("/api/admin/suppliers/{}", f.acme.supplier_id))
            .insert_header(("Authorization", format!("Bearer {}", f.admin)))
            .to_request();
        test::call_service(&app, req).await;

        let resp = test::call_service(&app, create(f.product_id, 5)).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[actix_web::test]
    async fn suppliers_cannot_raise_requests() {
        let f = fixture().await;
        let app = f.ctx.app().await;

        let req = f
            .ctx
            .post("/api/admin/reorders")
            .insert_header(("Authorization", format!("Bearer {}", f.acme.access_token)))
            .set_json(json!({"product_id": f.product_id, "quantity": 5}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}
