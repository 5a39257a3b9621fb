use crate::api::PageQuery;
use crate::api::dashboard::{AdminDashboard, SupplierDashboard};
use crate::api::deliveries::DeliveryListResponse;
use crate::api::products::ProductListResponse;
use crate::api::reorders::ReorderListResponse;
use crate::api::reports::{CategorySummary, ProductReport};
use crate::api::suppliers::SupplierListResponse;
use crate::model::delivery::{
    Delivery, DeliveryChanges, DeliveryFilter, DeliveryStatus, DeliveryStatusUpdate, NewDelivery,
};
use crate::model::product::{NewProduct, Product, ProductChanges, ProductFilter};
use crate::model::reorder::{
    NewReorder, ReorderCounts, ReorderFilter, ReorderRequest, ReorderStatus, RespondToReorder,
    SupplierResponse,
};
use crate::model::supplier::{
    NewSupplier, ProfileChanges, Supplier, SupplierChanges, SupplierCounts, SupplierFilter,
    SupplierStatus,
};
use crate::models::{
    ChangePasswordRequest, LoginRequest, MeResponse, RegisterRequest, RegisterResponse,
    TokenResponse,
};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Supplier Portal API",
        version = "1.0.0",
        description = r#"
## Supplier Portal

Back end for a two-sided procurement portal.

### Admin console
- **Suppliers**: onboard, edit, search and deactivate suppliers
- **Reorders**: raise reorder requests against a supplier's products and follow the responses
- **Dashboard** and CSV export of all reorder activity

### Supplier portal
- **Products**: catalogue with SKU, category, price, stock and reorder level
- **Deliveries**: schedule shipments and move them through their lifecycle
- **Reorders**: acknowledge or decline incoming requests with a delivery estimate
- **Reports**: product summary as JSON, CSV or printable HTML; delivery CSV

### Security
All `/api` endpoints require a **JWT Bearer** access token obtained from `/auth/login`.
Refresh tokens rotate on every use and are also delivered as an HttpOnly cookie.
"#,
    ),
    paths(
        crate::auth::handlers::register,
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,
        crate::auth::handlers::me,

        crate::api::suppliers::create_supplier,
        crate::api::suppliers::list_suppliers,
        crate::api::suppliers::get_supplier,
        crate::api::suppliers::update_supplier,
        crate::api::suppliers::deactivate_supplier,

        crate::api::profile::get_profile,
        crate::api::profile::update_profile,
        crate::api::profile::change_password,

        crate::api::products::create_product,
        crate::api::products::list_products,
        crate::api::products::low_stock_products,
        crate::api::products::get_product,
        crate::api::products::update_product,
        crate::api::products::delete_product,
        crate::api::products::list_supplier_products,

        crate::api::deliveries::create_delivery,
        crate::api::deliveries::list_deliveries,
        crate::api::deliveries::get_delivery,
        crate::api::deliveries::update_delivery,
        crate::api::deliveries::update_delivery_status,

        crate::api::reorders::create_reorder,
        crate::api::reorders::list_reorders,
        crate::api::reorders::list_responses,
        crate::api::reorders::get_reorder,
        crate::api::reorders::fulfill_reorder,
        crate::api::reorders::cancel_reorder,
        crate::api::reorders::list_own_reorders,
        crate::api::reorders::get_own_reorder,
        crate::api::reorders::respond_to_reorder,

        crate::api::dashboard::admin_dashboard,
        crate::api::dashboard::supplier_dashboard,

        crate::api::reports::products_report,
        crate::api::reports::products_csv,
        crate::api::reports::products_html,
        crate::api::reports::deliveries_csv,
        crate::api::reports::reorders_csv
    ),
    components(
        schemas(
            RegisterRequest,
            RegisterResponse,
            LoginRequest,
            TokenResponse,
            MeResponse,
            ChangePasswordRequest,
            Supplier,
            SupplierStatus,
            NewSupplier,
            SupplierChanges,
            ProfileChanges,
            SupplierFilter,
            SupplierCounts,
            SupplierListResponse,
            Product,
            NewProduct,
            ProductChanges,
            ProductFilter,
            ProductListResponse,
            Delivery,
            DeliveryStatus,
            NewDelivery,
            DeliveryChanges,
            DeliveryStatusUpdate,
            DeliveryFilter,
            DeliveryListResponse,
            ReorderRequest,
            ReorderStatus,
            SupplierResponse,
            NewReorder,
            RespondToReorder,
            ReorderFilter,
            ReorderCounts,
            ReorderListResponse,
            PageQuery,
            AdminDashboard,
            SupplierDashboard,
            ProductReport,
            CategorySummary
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Registration, login and token rotation"),
        (name = "Suppliers", description = "Supplier administration"),
        (name = "Profile", description = "Supplier self-service settings"),
        (name = "Products", description = "Supplier product catalogue"),
        (name = "Deliveries", description = "Delivery scheduling and tracking"),
        (name = "Reorders", description = "Reorder requests and supplier responses"),
        (name = "Dashboard", description = "Summary counters"),
        (name = "Reports", description = "JSON, CSV and printable exports"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_both_consoles_and_bearer_scheme() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/admin/reorders/{id}/fulfill"));
        assert!(doc.paths.paths.contains_key("/api/supplier/reorders/{id}/respond"));
        assert!(doc.paths.paths.contains_key("/auth/login"));

        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(components.schemas.contains_key("ReorderRequest"));
    }
}
