use std::collections::BTreeMap;

use actix_web::http::header;
use actix_web::{HttpResponse, web};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

use crate::api::suppliers::supplier_not_found;
use crate::auth::auth::AuthUser;
use crate::error::ApiError;
use crate::model::delivery::DeliveryFilter;
use crate::model::product::{Product, ProductFilter};
use crate::model::reorder::ReorderFilter;
use crate::model::supplier::Supplier;
use crate::state::AppState;
use crate::utils::export::{CsvWriter, html_escape, money, opt};

const PRODUCT_COLUMNS: &[&str] = &[
    "id",
    "name",
    "sku",
    "category",
    "price",
    "stock_quantity",
    "reorder_level",
    "low_stock",
    "description",
];

const DELIVERY_COLUMNS: &[&str] = &[
    "id",
    "product_id",
    "quantity",
    "status",
    "scheduled_date",
    "delivered_at",
    "tracking_number",
    "notes",
];

const REORDER_COLUMNS: &[&str] = &[
    "id",
    "supplier_id",
    "product_id",
    "quantity",
    "status",
    "acknowledged",
    "message",
    "estimated_delivery",
    "created_at",
];

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CategorySummary {
    #[schema(example = "dairy-alternatives")]
    pub category: String,
    pub products: u64,
    pub units: u64,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProductReport {
    #[schema(value_type = String, format = "date-time")]
    pub generated_at: DateTime<Utc>,
    pub supplier: Supplier,
    pub total_products: u64,
    pub total_units: u64,
    pub inventory_value: f64,
    pub low_stock_count: u64,
    /// Sorted by category name
    pub categories: Vec<CategorySummary>,
    pub products: Vec<Product>,
}

impl ProductReport {
    pub fn build(supplier: Supplier, products: Vec<Product>, generated_at: DateTime<Utc>) -> Self {
        let mut categories: BTreeMap<&str, CategorySummary> = BTreeMap::new();
        for product in &products {
            let entry = categories
                .entry(product.category.as_str())
                .or_insert_with(|| CategorySummary {
                    category: product.category.clone(),
                    products: 0,
                    units: 0,
                    value: 0.0,
                });
            entry.products += 1;
            entry.units += u64::from(product.stock_quantity);
            entry.value += product.stock_value();
        }
        let categories: Vec<CategorySummary> = categories.into_values().collect();

        Self {
            generated_at,
            supplier,
            total_products: products.len() as u64,
            total_units: categories.iter().map(|c| c.units).sum(),
            inventory_value: categories.iter().map(|c| c.value).sum(),
            low_stock_count: products.iter().filter(|p| p.is_low_stock()).count() as u64,
            categories,
            products,
        }
    }

    /// Printable page; every piece of record text is escaped.
    pub fn to_html(&self) -> String {
        let company = html_escape(&self.supplier.company_name);
        let mut html = String::from("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
        html.push_str(&format!("<title>Product report: {company}</title>\n"));
        html.push_str(
            "<style>body{font-family:sans-serif}table{border-collapse:collapse}\
             td,th{border:1px solid #999;padding:4px 8px}.low{color:#b00}</style>\n",
        );
        html.push_str("</head>\n<body>\n");
        html.push_str(&format!("<h1>Product report</h1>\n<h2>{company}</h2>\n"));
        html.push_str(&format!(
            "<p>Generated {}</p>\n",
            self.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
        ));

        html.push_str("<ul>\n");
        html.push_str(&format!("<li>Products: {}</li>\n", self.total_products));
        html.push_str(&format!("<li>Units in stock: {}</li>\n", self.total_units));
        html.push_str(&format!(
            "<li>Inventory value: {}</li>\n",
            money(self.inventory_value)
        ));
        html.push_str(&format!("<li>Low stock: {}</li>\n", self.low_stock_count));
        html.push_str("</ul>\n");

        html.push_str(
            "<table>\n<tr><th>SKU</th><th>Name</th><th>Category</th><th>Price</th>\
             <th>Stock</th><th>Reorder level</th></tr>\n",
        );
        for product in &self.products {
            let class = if product.is_low_stock() { " class=\"low\"" } else { "" };
            html.push_str(&format!(
                "<tr{class}><td>{}</td><td>{}",
                html_escape(&product.sku),
                html_escape(&product.name)
            ));
            if let Some(description) = &product.description {
                html.push_str(&format!("<br><small>{}</small>", html_escape(description)));
            }
            html.push_str(&format!(
                "</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                html_escape(&product.category),
                money(product.price),
                product.stock_quantity,
                product.reorder_level
            ));
        }
        html.push_str("</table>\n</body>\n</html>\n");
        html
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn attachment(content_type: &str, filename: String, body: String) -> HttpResponse {
    HttpResponse::Ok()
        .content_type(content_type)
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        ))
        .body(body)
}

async fn product_report(state: &AppState, supplier_id: u64) -> Result<ProductReport, ApiError> {
    let supplier = state
        .store
        .get_supplier(supplier_id)
        .await?
        .ok_or_else(supplier_not_found)?;
    let (mut products, _) = state
        .store
        .list_products(supplier_id, &ProductFilter::default(), None)
        .await?;
    products.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
    Ok(ProductReport::build(supplier, products, Utc::now()))
}

/// Product report
#[utoipa::path(
    get,
    path = "/api/supplier/reports/products",
    responses(
        (status = 200, description = "Catalogue summary with per-category totals", body = ProductReport)
    ),
    tag = "Reports",
    security(("bearer_auth" = []))
)]
pub async fn products_report(
    auth: AuthUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let supplier_id = auth.require_supplier()?;
    Ok(HttpResponse::Ok().json(product_report(&state, supplier_id).await?))
}

/// Product report as CSV
#[utoipa::path(
    get,
    path = "/api/supplier/reports/products.csv",
    responses(
        (status = 200, description = "CSV attachment", content_type = "text/csv", body = String)
    ),
    tag = "Reports",
    security(("bearer_auth" = []))
)]
pub async fn products_csv(
    auth: AuthUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let supplier_id = auth.require_supplier()?;
    let report = product_report(&state, supplier_id).await?;

    let mut csv = CsvWriter::with_header(PRODUCT_COLUMNS);
    for p in &report.products {
        csv.row([
            p.id.to_string(),
            p.name.clone(),
            p.sku.clone(),
            p.category.clone(),
            money(p.price),
            p.stock_quantity.to_string(),
            p.reorder_level.to_string(),
            p.is_low_stock().to_string(),
            opt(p.description.as_deref()),
        ]);
    }

    info!(supplier_id, rows = report.products.len(), "Product CSV exported");
    let filename = format!("products-{}.csv", report.generated_at.format("%Y-%m-%d"));
    Ok(attachment("text/csv; charset=utf-8", filename, csv.finish()))
}

/// Printable product report
#[utoipa::path(
    get,
    path = "/api/supplier/reports/products.html",
    responses(
        (status = 200, description = "HTML document ready for print-to-PDF", content_type = "text/html", body = String)
    ),
    tag = "Reports",
    security(("bearer_auth" = []))
)]
pub async fn products_html(
    auth: AuthUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let supplier_id = auth.require_supplier()?;
    let report = product_report(&state, supplier_id).await?;
    Ok(HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(report.to_html()))
}

/// Delivery history as CSV
#[utoipa::path(
    get,
    path = "/api/supplier/reports/deliveries.csv",
    params(DeliveryFilter),
    responses(
        (status = 200, description = "CSV attachment", content_type = "text/csv", body = String)
    ),
    tag = "Reports",
    security(("bearer_auth" = []))
)]
pub async fn deliveries_csv(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<DeliveryFilter>,
) -> Result<HttpResponse, ApiError> {
    let supplier_id = auth.require_supplier()?;
    let (deliveries, _) = state
        .store
        .list_deliveries(supplier_id, &query, None)
        .await?;

    let mut csv = CsvWriter::with_header(DELIVERY_COLUMNS);
    for d in &deliveries {
        csv.row([
            d.id.to_string(),
            d.product_id.to_string(),
            d.quantity.to_string(),
            d.status.to_string(),
            d.scheduled_date.to_string(),
            opt(d.delivered_at.map(timestamp)),
            opt(d.tracking_number.as_deref()),
            opt(d.notes.as_deref()),
        ]);
    }

    info!(supplier_id, rows = deliveries.len(), "Delivery CSV exported");
    let filename = format!("deliveries-{}.csv", Utc::now().format("%Y-%m-%d"));
    Ok(attachment("text/csv; charset=utf-8", filename, csv.finish()))
}

/// Reorder requests and responses as CSV
#[utoipa::path(
    get,
    path = "/api/admin/reorders.csv",
    params(ReorderFilter),
    responses(
        (status = 200, description = "CSV attachment", content_type = "text/csv", body = String)
    ),
    tag = "Reports",
    security(("bearer_auth" = []))
)]
pub async fn reorders_csv(
    auth: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<ReorderFilter>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()?;
    let (requests, _) = state.store.list_reorders(&query, None).await?;

    let mut csv = CsvWriter::with_header(REORDER_COLUMNS);
    for r in &requests {
        let response = r.supplier_response.as_ref();
        csv.row([
            r.id.to_string(),
            r.supplier_id.to_string(),
            r.product_id.to_string(),
            r.quantity.to_string(),
            r.status.to_string(),
            opt(response.map(|s| s.acknowledged)),
            opt(response.map(|s| s.message.as_str())),
            opt(response.and_then(|s| s.estimated_delivery)),
            timestamp(r.created_at),
        ]);
    }

    info!(rows = requests.len(), "Reorder CSV exported");
    let filename = format!("reorders-{}.csv", Utc::now().format("%Y-%m-%d"));
    Ok(attachment("text/csv; charset=utf-8", filename, csv.finish()))
}

#[cfg(test)]
mod tests {
    use actix_web::http::{StatusCode, header};
    use actix_web::test as actix_test;
    use chrono::Utc;
    use serde_json::{Value, json};

    use super::*;
    use crate::model::supplier::SupplierStatus;
    use crate::test_support::TestContext;

    fn product(id: u64, name: &str, category: &str, price: f64, stock: u32) -> Product {
        let now = Utc::now();
        Product {
            id,
            supplier_id: 1,
            name: name.into(),
            sku: format!("SKU-{id}"),
            category: category.into(),
            description: None,
            price,
            stock_quantity: stock,
            reorder_level: 5,
            created_at: now,
            updated_at: now,
        }
    }

    fn supplier(name: &str) -> Supplier {
        let now = Utc::now();
        Supplier {
            id: 1,
            user_id: None,
            company_name: name.into(),
            contact_name: "Ada".into(),
            email: "ada@example.com".into(),
            phone: None,
            address: None,
            status: SupplierStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn report_groups_categories_by_name() {
        let report = ProductReport::build(
            supplier("Acme"),
            vec![
                product(1, "Washer", "parts", 0.5, 10),
                product(2, "Glue", "adhesives", 3.0, 2),
                product(3, "Bolt", "parts", 1.0, 20),
            ],
            Utc::now(),
        );

        assert_eq!(report.total_products, 3);
        assert_eq!(report.total_units, 32);
        assert_eq!(report.inventory_value, 31.0);
        assert_eq!(report.low_stock_count, 1);
        let names: Vec<_> = report.categories.iter().map(|c| c.category.as_str()).collect();
        assert_eq!(names, ["adhesives", "parts"]);
        assert_eq!(report.categories[1].products, 2);
        assert_eq!(report.categories[1].value, 25.0);
    }

    #[test]
    fn html_escapes_record_text_and_skips_missing_description() {
        let mut risky = product(1, "<script>alert(1)</script>", "parts", 1.0, 1);
        risky.description = Some("Tom & Jerry".into());
        let plain = product(2, "Nut", "parts", 1.0, 10);
        let html = ProductReport::build(supplier("A&B \"Ltd\""), vec![risky, plain], Utc::now())
            .to_html();

        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("A&amp;B &quot;Ltd&quot;"));
        assert!(html.contains("<small>Tom &amp; Jerry</small>"));
        assert_eq!(html.matches("<small>").count(), 1);
    }

    #[actix_web::test]
    async fn products_csv_is_an_attachment_with_quoted_fields() {
        let ctx = TestContext::new().await;
        let app = ctx.app().await;
        let acme = ctx.register_supplier(&app, "acme").await;
        ctx.product_id(
            &app,
            &acme.access_token,
            json!({"name": "Oat milk, 1L", "sku": "OAT-1L", "category": "dairy",
                   "description": "Say \"oat\"", "price": 2.4,
                   "stock_quantity": 3, "reorder_level": 5}),
        )
        .await;

        let req = ctx
            .get("/api/supplier/reports/products.csv")
            .insert_header(("Authorization", format!("Bearer {}", acme.access_token)))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(
            resp.headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.starts_with("text/csv"))
        );
        assert!(
            resp.headers()
                .get(header::CONTENT_DISPOSITION)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.starts_with("attachment"))
        );

        let body = actix_test::read_body(resp).await;
        let text = std::str::from_utf8(&body).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("id,name,sku,category,price,stock_quantity,reorder_level,low_stock,description")
        );
        let row = lines.next().unwrap();
        assert!(row.ends_with(",\"Oat milk, 1L\",OAT-1L,dairy,2.40,3,5,true,\"Say \"\"oat\"\"\""));
    }

    #[actix_web::test]
    async fn product_report_json_matches_catalogue() {
        let ctx = TestContext::new().await;
        let app = ctx.app().await;
        let acme = ctx.register_supplier(&app, "acme").await;
        for (sku, category, stock) in [("A", "b-cat", 1), ("B", "a-cat", 10)] {
            ctx.product_id(
                &app,
                &acme.access_token,
                json!({"name": sku, "sku": sku, "category": category,
                       "price": 1.0, "stock_quantity": stock, "reorder_level": 5}),
            )
            .await;
        }

        let req = ctx
            .get("/api/supplier/reports/products")
            .insert_header(("Authorization", format!("Bearer {}", acme.access_token)))
            .to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["total_products"], 2);
        assert_eq!(body["total_units"], 11);
        assert_eq!(body["low_stock_count"], 1);
        assert_eq!(body["categories"][0]["category"], "a-cat");
        assert_eq!(body["supplier"]["id"], acme.supplier_id);
    }

    #[actix_web::test]
    async fn delivery_export_quotes_notes_and_leaves_missing_fields_empty() {
        let ctx = TestContext::new().await;
        let app = ctx.app().await;
        let acme = ctx.register_supplier(&app, "acme").await;
        let product = ctx
            .product_id(
                &app,
                &acme.access_token,
                json!({"name": "Bolt", "sku": "B-1", "category": "parts",
                       "price": 0.5, "stock_quantity": 4, "reorder_level": 10}),
            )
            .await;

        let req = ctx
            .post("/api/supplier/deliveries")
            .insert_header(("Authorization", format!("Bearer {}", acme.access_token)))
            .set_json(json!({
                "product_id": product,
                "quantity": 12,
                "scheduled_date": "2030-02-01",
                "notes": "Dock 4, rear gate"
            }))
            .to_request();
        let created: Value = actix_test::call_and_read_body_json(&app, req).await;
        let noted = created["id"].as_u64().unwrap();

        let delivered = ctx.delivery_id(&app, &acme.access_token, product, 5).await;
        for status in ["in_transit", "delivered"] {
            let resp = ctx
                .set_delivery_status(&app, &acme.access_token, delivered, status)
                .await;
            assert_eq!(resp.status(), StatusCode::OK);
        }

        let req = ctx
            .get("/api/supplier/reports/deliveries.csv")
            .insert_header(("Authorization", format!("Bearer {}", acme.access_token)))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(
            resp.headers()
                .get(header::CONTENT_DISPOSITION)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.contains("deliveries-"))
        );

        let body = actix_test::read_body(resp).await;
        let text = std::str::from_utf8(&body).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "id,product_id,quantity,status,scheduled_date,delivered_at,tracking_number,notes"
        );

        let row = |id: u64| {
            lines
                .iter()
                .find(|l| l.starts_with(&format!("{id},")))
                .copied()
                .unwrap()
        };
        assert_eq!(
            row(noted),
            format!("{noted},{product},12,scheduled,2030-02-01,,,\"Dock 4, rear gate\"")
        );
        let fields: Vec<&str> = row(delivered).split(',').collect();
        assert_eq!(fields[3], "delivered");
        assert!(fields[5].ends_with('Z'));
        assert_eq!(&fields[6..], ["", ""]);
    }

    #[actix_web::test]
    async fn admin_reorder_export_includes_responses() {
        let ctx = TestContext::new().await;
        let app = ctx.app().await;
        let admin = ctx.admin_token(&app).await;
        let acme = ctx.register_supplier(&app, "acme").await;
        let product = ctx
            .product_id(
                &app,
                &acme.access_token,
                json!({"name": "Bolt", "sku": "B-1", "category": "parts",
                       "price": 0.5, "stock_quantity": 4, "reorder_level": 10}),
            )
            .await;
        let id = ctx.reorder_id(&app, &admin, product, 20).await;

        let req = ctx
            .put(&format!("/api/supplier/reorders/{id}/respond"))
            .insert_header(("Authorization", format!("Bearer {}", acme.access_token)))
            .set_json(json!({"acknowledged": false, "message": "No stock, sorry"}))
            .to_request();
        actix_test::call_service(&app, req).await;

        let req = ctx
            .get("/api/admin/reorders.csv")
            .insert_header(("Authorization", format!("Bearer {admin}")))
            .to_request();
        let body = actix_test::call_and_read_body(&app, req).await;
        let text = std::str::from_utf8(&body).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], REORDER_COLUMNS.join(","));
        assert!(lines[1].starts_with(&format!(
            "{id},{},{product},20,declined,false,\"No stock, sorry\",,",
            acme.supplier_id
        )));
    }

    #[actix_web::test]
    async fn supplier_cannot_export_reorders() {
        let ctx = TestContext::new().await;
        let app = ctx.app().await;
        let acme = ctx.register_supplier(&app, "acme").await;

        let req = ctx
            .get("/api/admin/reorders.csv")
            .insert_header(("Authorization", format!("Bearer {}", acme.access_token)))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}
