use crate::{
    api::{dashboard, deliveries, products, profile, reorders, reports, suppliers},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
    error::ApiError,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{HttpResponse, Responder, get, middleware::from_fn, web};
use anyhow::Context;
use serde_json::json;
use std::sync::Arc;

type Limiter = Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>;

/// Per-IP limiters. Built once so every worker shares the same buckets.
#[derive(Clone)]
pub struct Limiters {
    login: Limiter,
    register: Limiter,
    refresh: Limiter,
    protected: Limiter,
}

impl Limiters {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            login: build_limiter("login", config.rate_login_per_min)?,
            register: build_limiter("register", config.rate_register_per_min)?,
            refresh: build_limiter("refresh", config.rate_refresh_per_min)?,
            protected: build_limiter("protected", config.rate_protected_per_min)?,
        })
    }
}

fn build_limiter(name: &str, requests_per_min: u32) -> anyhow::Result<Limiter> {
    let per_ms = if requests_per_min == 0 {
        1
    } else {
        (60_000 / u64::from(requests_per_min)).max(1)
    };
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min.max(1))
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .with_context(|| format!("invalid {name} rate limit"))?;
    Ok(Arc::new(Governor::new(&cfg)))
}

#[get("/")]
async fn index() -> impl Responder {
    "Supplier portal API"
}

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

/// Malformed bodies, queries and paths answer with the same `{"message"}` shape as handlers.
fn extractor_errors() -> (web::JsonConfig, web::QueryConfig, web::PathConfig) {
    let json = web::JsonConfig::default()
        .error_handler(|err, _req| ApiError::bad_request(err.to_string()).into());
    let query = web::QueryConfig::default()
        .error_handler(|err, _req| ApiError::bad_request(err.to_string()).into());
    let path = web::PathConfig::default()
        .error_handler(|_err, _req| ApiError::not_found("Resource not found").into());
    (json, query, path)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limiters: &Limiters) {
    let (json, query, path) = extractor_errors();
    cfg.app_data(json).app_data(query).app_data(path);

    cfg.service(index).service(health);

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(limiters.login.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(limiters.register.clone())
                    .route(web::post().to(handlers::register)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(limiters.refresh.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(limiters.login.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(limiters.protected.clone())
            .service(web::resource("/me").route(web::get().to(handlers::me)))
            .service(admin_scope())
            .service(supplier_scope()),
    );
}

fn admin_scope() -> actix_web::Scope {
    web::scope("/admin")
        .service(web::resource("/dashboard").route(web::get().to(dashboard::admin_dashboard)))
        // /admin/suppliers
        .service(
            web::resource("/suppliers")
                .route(web::post().to(suppliers::create_supplier))
                .route(web::get().to(suppliers::list_suppliers)),
        )
        .service(
            web::resource("/suppliers/{id}")
                .route(web::get().to(suppliers::get_supplier))
                .route(web::put().to(suppliers::update_supplier))
                .route(web::delete().to(suppliers::deactivate_supplier)),
        )
        .service(
            web::resource("/suppliers/{id}/products")
                .route(web::get().to(products::list_supplier_products)),
        )
        // /admin/reorders
        .service(web::resource("/reorders.csv").route(web::get().to(reports::reorders_csv)))
        .service(
            web::resource("/reorders")
                .route(web::post().to(reorders::create_reorder))
                .route(web::get().to(reorders::list_reorders)),
        )
        .service(
            web::resource("/reorders/responses").route(web::get().to(reorders::list_responses)),
        )
        .service(web::resource("/reorders/{id}").route(web::get().to(reorders::get_reorder)))
        .service(
            web::resource("/reorders/{id}/fulfill")
                .route(web::put().to(reorders::fulfill_reorder)),
        )
        .service(
            web::resource("/reorders/{id}/cancel").route(web::put().to(reorders::cancel_reorder)),
        )
}

fn supplier_scope() -> actix_web::Scope {
    web::scope("/supplier")
        .service(web::resource("/dashboard").route(web::get().to(dashboard::supplier_dashboard)))
        // /supplier/profile
        .service(
            web::resource("/profile")
                .route(web::get().to(profile::get_profile))
                .route(web::put().to(profile::update_profile)),
        )
        .service(
            web::resource("/profile/password").route(web::put().to(profile::change_password)),
        )
        // /supplier/products; low-stock must come before {id}
        .service(
            web::resource("/products")
                .route(web::post().to(products::create_product))
                .route(web::get().to(products::list_products)),
        )
        .service(
            web::resource("/products/low-stock")
                .route(web::get().to(products::low_stock_products)),
        )
        .service(
            web::resource("/products/{id}")
                .route(web::get().to(products::get_product))
                .route(web::put().to(products::update_product))
                .route(web::delete().to(products::delete_product)),
        )
        // /supplier/deliveries
        .service(
            web::resource("/deliveries")
                .route(web::post().to(deliveries::create_delivery))
                .route(web::get().to(deliveries::list_deliveries)),
        )
        .service(
            web::resource("/deliveries/{id}")
                .route(web::get().to(deliveries::get_delivery))
                .route(web::put().to(deliveries::update_delivery)),
        )
        .service(
            web::resource("/deliveries/{id}/status")
                .route(web::put().to(deliveries::update_delivery_status)),
        )
        // /supplier/reorders
        .service(web::resource("/reorders").route(web::get().to(reorders::list_own_reorders)))
        .service(web::resource("/reorders/{id}").route(web::get().to(reorders::get_own_reorder)))
        .service(
            web::resource("/reorders/{id}/respond")
                .route(web::put().to(reorders::respond_to_reorder)),
        )
        // /supplier/reports
        .service(web::resource("/reports/products").route(web::get().to(reports::products_report)))
        .service(
            web::resource("/reports/products.csv").route(web::get().to(reports::products_csv)),
        )
        .service(
            web::resource("/reports/products.html").route(web::get().to(reports::products_html)),
        )
        .service(
            web::resource("/reports/deliveries.csv")
                .route(web::get().to(reports::deliveries_csv)),
        )
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days, also set as HttpOnly cookie)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ rotates: old jti revoked, new pair returned
