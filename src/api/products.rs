use actix_web::{HttpResponse, web};
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

use crate::api::suppliers::supplier_not_found;
use crate::auth::auth::AuthUser;
use crate::error::ApiError;
use crate::model::product::{NewProduct, Product, ProductChanges, ProductFilter};
use crate::state::AppState;
use crate::store::Page;

#[derive(Serialize, ToSchema)]
pub struct ProductListResponse {
    pub data: Vec<Product>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 57)]
    pub total: u64,
}

pub(crate) fn product_not_found() -> ApiError {
    ApiError::not_found("Product not found")
}

/// Loads a product only if it belongs to `supplier_id`.
pub(crate) async fn owned_product(
    state: &AppState,
    supplier_id: u64,
    id: u64,
) -> Result<Product, ApiError> {
    state
        .store
        .get_product(id)
        .await?
        .filter(|p| p.supplier_id == supplier_id)
        .ok_or_else(product_not_found)
}

async fn product_page(
    state: &AppState,
    supplier_id: u64,
    filter: &ProductFilter,
) -> Result<ProductListResponse, ApiError> {
    let page = Page::new(filter.page, filter.per_page);
    let (data, total) = state
        .store
        .list_products(supplier_id, filter, Some(page))
        .await?;
    Ok(ProductListResponse {
        data,
        page: page.page,
        per_page: page.per_page,
        total,
    })
}

/// Create product
#[utoipa::path(
    post,
    path = "/api/supplier/products",
    request_body = NewProduct,
    responses(
        (status = 201, description = "Product created", body = Product),
        (status = 400, description = "Invalid fields"),
        (status = 409, description = "SKU already exists for this supplier")
    ),
    tag = "Products",
    security(("bearer_auth" = []))
)]
pub async fn create_product(
    auth: AuthUser,
    state: web::Data<AppState>,
    payload: web::Json<NewProduct>,
) -> Result<HttpResponse, ApiError> {
    let supplier_id = auth.require_supplier()?;
    let payload = payload.into_inner();
    payload.validate()?;

    let product = state.store.create_product(supplier_id, payload).await?;
    info!(product_id = product.id, supplier_id, "Product created");
    Ok(HttpResponse::Created().json(product))
}

/// List own products
#[utoipa::path(
    get,
    path = "/api/supplier/products",
    params(ProductFilter),
    responses(
        (status = 200, description = "Paginated product list, newest first", body = ProductListResponse)
    ),
    tag = "Products",
    security(("bearer_auth" = []))
)]
pub async fn list_products(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<ProductFilter>,
) -> Result<HttpResponse, ApiError> {
    let supplier_id = auth.require_supplier()?;
    Ok(HttpResponse::Ok().json(product_page(&state, supplier_id, &query).await?))
}

/// Products at or below their reorder level, lowest stock first
#[utoipa::path(
    get,
    path = "/api/supplier/products/low-stock",
    responses(
        (status = 200, description = "Low-stock products", body = [Product])
    ),
    tag = "Products",
    security(("bearer_auth" = []))
)]
pub async fn low_stock_products(
    auth: AuthUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let supplier_id = auth.require_supplier()?;
    let filter = ProductFilter {
        low_stock: Some(true),
        ..Default::default()
    };

    let (mut products, _) = state.store.list_products(supplier_id, &filter, None).await?;
    products.sort_by(|a, b| {
        a.stock_quantity
            .cmp(&b.stock_quantity)
            .then_with(|| a.name.cmp(&b.name))
    });
    Ok(HttpResponse::Ok().json(products))
}

/// Get own product
#[utoipa::path(
    get,
    path = "/api/supplier/products/{id}",
    params(("id" = u64, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product", body = Product),
        (status = 404, description = "Product not found")
    ),
    tag = "Products",
    security(("bearer_auth" = []))
)]
pub async fn get_product(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let supplier_id = auth.require_supplier()?;
    let product = owned_product(&state, supplier_id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(product))
}

/// Update own product
#[utoipa::path(
    put,
    path = "/api/supplier/products/{id}",
    params(("id" = u64, Path, description = "Product id")),
    request_body = ProductChanges,
    responses(
        (status = 200, description = "Updated product", body = Product),
        (status = 400, description = "Empty or invalid update"),
        (status = 404, description = "Product not found"),
        (status = 409, description = "SKU already exists for this supplier")
    ),
    tag = "Products",
    security(("bearer_auth" = []))
)]
pub async fn update_product(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
    payload: web::Json<ProductChanges>,
) -> Result<HttpResponse, ApiError> {
    let supplier_id = auth.require_supplier()?;
    payload.validate()?;

    let product = state
        .store
        .update_product(supplier_id, path.into_inner(), &payload)
        .await?
        .ok_or_else(product_not_found)?;
    Ok(HttpResponse::Ok().json(product))
}

/// Delete own product
#[utoipa::path(
    delete,
    path = "/api/supplier/products/{id}",
    params(("id" = u64, Path, description = "Product id")),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 404, description = "Product not found"),
        (status = 409, description = "Product is referenced by deliveries or reorder requests")
    ),
    tag = "Products",
    security(("bearer_auth" = []))
)]
pub async fn delete_product(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let supplier_id = auth.require_supplier()?;
    let id = path.into_inner();

    if !state.store.delete_product(supplier_id, id).await? {
        return Err(product_not_found());
    }
    info!(product_id = id, supplier_id, "Product deleted");
    Ok(HttpResponse::NoContent().finish())
}

/// Browse a supplier's catalogue (admin)
#[utoipa::path(
    get,
    path = "/api/admin/suppliers/{id}/products",
    params(("id" = u64, Path, description = "Supplier id"), ProductFilter),
    responses(
        (status = 200, description = "Paginated product list", body = ProductListResponse),
        (status = 404, description = "Supplier not found")
    ),
    tag = "Products",
    security(("bearer_auth" = []))
)]
pub async fn list_supplier_products(
    auth: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<u64>,
    query: web::Query<ProductFilter>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let supplier = state
        .store
        .get_supplier(path.into_inner())
        .await?
        .ok_or_else(supplier_not_found)?;
    Ok(HttpResponse::Ok().json(product_page(&state, supplier.id, &query).await?))
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::test;
    use serde_json::{Value, json};

    use crate::test_support::TestContext;

    fn widget(sku: &str, stock: u32, level: u32) -> Value {
        json!({
            "name": format!("Widget {sku}"),
            "sku": sku,
            "category": "parts",
            "price": 2.5,
            "stock_quantity": stock,
            "reorder_level": level
        })
    }

    #[actix_web::test]
    async fn sku_is_unique_per_supplier_only() {
        let ctx = TestContext::new().await;
        let app = ctx.app().await;
        let acme = ctx.register_supplier(&app, "acme").await;
        let globex = ctx.register_supplier(&app, "globex").await;

        let resp = ctx.create_product(&app, &acme.access_token, widget("W-1", 5, 1)).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let resp = ctx.create_product(&app, &acme.access_token, widget("w-1", 5, 1)).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = ctx.create_product(&app, &globex.access_token, widget("W-1", 5, 1)).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    #[actix_web::test]
    async fn other_suppliers_products_are_invisible() {
        let ctx = TestContext::new().await;
        let app = ctx.app().await;
        let acme = ctx.register_supplier(&app, "acme").await;
        let globex = ctx.register_supplier(&app, "globex").await;
        let product_id = ctx.product_id(&app, &acme.access_token, widget("W-1", 5, 1)).await;

        for req in [
            ctx.get(&format!("/api/supplier/products/{product_id}")),
            ctx.delete(&format!("/api/supplier/products/{product_id}")),
        ] {
            let req = req
                .insert_header(("Authorization", format!("Bearer {}", globex.access_token)))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        }
    }

    #[actix_web::test]
    async fn low_stock_lists_lowest_first() {
        let ctx = TestContext::new().await;
        let app = ctx.app().await;
        let acme = ctx.register_supplier(&app, "acme").await;

        ctx.product_id(&app, &acme.access_token, widget("A", 8, 10)).await;
        ctx.product_id(&app, &acme.access_token, widget("B", 50, 10)).await;
        ctx.product_id(&app, &acme.access_token, widget("C", 2, 10)).await;
        ctx.product_id(&app, &acme.access_token, widget("D", 10, 10)).await;

        let req = ctx
            .get("/api/supplier/products/low-stock")
            .insert_header(("Authorization", format!("Bearer {}", acme.access_token)))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let skus: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["sku"].as_str().unwrap())
            .collect();
        assert_eq!(skus, ["C", "A", "D"]);

        let req = ctx
            .get("/api/supplier/products?low_stock=true&search=widget")
            .insert_header(("Authorization", format!("Bearer {}", acme.access_token)))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["total"], 3);
    }

    #[actix_web::test]
    async fn update_and_delete() {
        let ctx = TestContext::new().await;
        let app = ctx.app().await;
        let acme = ctx.register_supplier(&app, "acme").await;
        let id = ctx.product_id(&app, &acme.access_token, widget("W-1", 5, 1)).await;

        let req = ctx
            .put(&format!("/api/supplier/products/{id}"))
            .insert_header(("Authorization", format!("Bearer {}", acme.access_token)))
            .set_json(json!({"price": 3.75, "description": "Zinc plated"}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["price"], 3.75);
        assert_eq!(body["description"], "Zinc plated");

        let req = ctx
            .put(&format!("/api/supplier/products/{id}"))
            .insert_header(("Authorization", format!("Bearer {}", acme.access_token)))
            .set_json(json!({}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = ctx
            .delete(&format!("/api/supplier/products/{id}"))
            .insert_header(("Authorization", format!("Bearer {}", acme.access_token)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    #[actix_web::test]
    async fn negative_price_is_rejected() {
        let ctx = TestContext::new().await;
        let app = ctx.app().await;
        let acme = ctx.register_supplier(&app, "acme").await;

        let mut body = widget("W-1", 5, 1);
        body["price"] = json!(-1.0);
        let resp = ctx.create_product(&app, &acme.access_token, body).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn admin_can_browse_a_catalogue() {
        let ctx = TestContext::new().await;
        let app = ctx.app().await;
        let admin = ctx.admin_token(&app).await;
        let acme = ctx.register_supplier(&app, "acme").await;
        ctx.product_id(&app, &acme.access_token, widget("W-1", 5, 1)).await;

        let req = ctx
            .get(&format!("/api/admin/suppliers/{}/products", acme.supplier_id))
            .insert_header(("Authorization", format!("Bearer {admin}")))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["data"][0]["sku"], "W-1");
    }
}
