//! Shared fixtures for the HTTP tests: an in-memory app plus request helpers.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use actix_http::Request;
use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::test::{self, TestRequest};
use actix_web::web::Data;
use actix_web::{App, Error};
use serde_json::{Value, json};

use crate::auth::handlers::seed_admin;
use crate::config::Config;
use crate::models::{RegisterResponse, TokenResponse};
use crate::routes::{self, Limiters};
use crate::state::AppState;
use crate::store::memory::MemoryStore;

pub const PASSWORD: &str = "s3cret-pass";
pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin-pass-123";

const BASE_ENV: &[(&str, &str)] = &[
    ("SERVER_ADDR", "127.0.0.1:0"),
    ("JWT_SECRET", "test-secret"),
    ("STORAGE_BACKEND", "memory"),
    ("SEED_ADMIN_USERNAME", ADMIN_USERNAME),
    ("SEED_ADMIN_PASSWORD", ADMIN_PASSWORD),
];

fn peer() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 40_000))
}

/// Tokens of a freshly registered and logged-in supplier.
pub struct SupplierSession {
    pub access_token: String,
    pub refresh_token: String,
    pub supplier_id: u64,
}

pub struct TestContext {
    pub config: Config,
    pub state: AppState,
    limiters: Limiters,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_overrides(&[]).await
    }

    pub async fn with_overrides(overrides: &[(&str, &str)]) -> Self {
        let vars: HashMap<String, String> = BASE_ENV
            .iter()
            .chain(overrides)
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let config = Config::from_lookup(|key| vars.get(key).cloned()).expect("test config");
        let state = AppState::new(Arc::new(MemoryStore::new()));
        seed_admin(&state, &config).await.expect("seed admin");
        let limiters = Limiters::from_config(&config).expect("limiters");

        Self {
            config,
            state,
            limiters,
        }
    }

    pub async fn app(
        &self,
    ) -> impl Service<Request, Response = ServiceResponse<impl MessageBody>, Error = Error> {
        test::init_service(
            App::new()
                .app_data(Data::new(self.state.clone()))
                .app_data(Data::new(self.config.clone()))
                .configure(|cfg| routes::configure(cfg, &self.config, &self.limiters)),
        )
        .await
    }

    pub fn get(&self, uri: &str) -> TestRequest {
        TestRequest::get().uri(uri).peer_addr(peer())
    }

    pub fn post(&self, uri: &str) -> TestRequest {
        TestRequest::post().uri(uri).peer_addr(peer())
    }

    pub fn put(&self, uri: &str) -> TestRequest {
        TestRequest::put().uri(uri).peer_addr(peer())
    }

    pub fn delete(&self, uri: &str) -> TestRequest {
        TestRequest::delete().uri(uri).peer_addr(peer())
    }

    pub async fn try_login<S, B>(
        &self,
        app: &S,
        username: &str,
        password: &str,
    ) -> ServiceResponse<B>
    where
        S: Service<Request, Response = ServiceResponse<B>, Error = Error>,
        B: MessageBody,
    {
        let req = self
            .post("/auth/login")
            .set_json(json!({"username": username, "password": password}))
            .to_request();
        test::call_service(app, req).await
    }

    async fn login<S, B>(&self, app: &S, username: &str, password: &str) -> TokenResponse
    where
        S: Service<Request, Response = ServiceResponse<B>, Error = Error>,
        B: MessageBody,
    {
        let resp = self.try_login(app, username, password).await;
        assert_eq!(resp.status(), StatusCode::OK, "login as {username}");
        test::read_body_json(resp).await
    }

    pub async fn admin_token<S, B>(&self, app: &S) -> String
    where
        S: Service<Request, Response = ServiceResponse<B>, Error = Error>,
        B: MessageBody,
    {
        self.login(app, ADMIN_USERNAME, ADMIN_PASSWORD)
            .await
            .access_token
    }

    /// Registers `username` with [`PASSWORD`] and logs in.
    pub async fn register_supplier<S, B>(&self, app: &S, username: &str) -> SupplierSession
    where
        S: Service<Request, Response = ServiceResponse<B>, Error = Error>,
        B: MessageBody,
    {
        let req = self
            .post("/auth/register")
            .set_json(json!({
                "username": username,
                "password": PASSWORD,
                "company_name": format!("{username} Ltd"),
                "contact_name": "Sam",
                "email": format!("sales@{username}.example.com")
            }))
            .to_request();
        let resp = test::call_service(app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED, "register {username}");
        let registered: RegisterResponse = test::read_body_json(resp).await;

        let tokens = self.login(app, username, PASSWORD).await;
        SupplierSession {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            supplier_id: registered.supplier_id,
        }
    }

    pub async fn create_product<S, B>(
        &self,
        app: &S,
        token: &str,
        body: Value,
    ) -> ServiceResponse<B>
    where
        S: Service<Request, Response = ServiceResponse<B>, Error = Error>,
        B: MessageBody,
    {
        let req = self
            .post("/api/supplier/products")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .set_json(body)
            .to_request();
        test::call_service(app, req).await
    }

    pub async fn product_id<S, B>(&self, app: &S, token: &str, body: Value) -> u64
    where
        S: Service<Request, Response = ServiceResponse<B>, Error = Error>,
        B: MessageBody,
    {
        let resp = self.create_product(app, token, body).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        created_id(resp).await
    }

    pub async fn delivery_id<S, B>(
        &self,
        app: &S,
        token: &str,
        product_id: u64,
        quantity: u32,
    ) -> u64
    where
        S: Service<Request, Response = ServiceResponse<B>, Error = Error>,
        B: MessageBody,
    {
        let req = self
            .post("/api/supplier/deliveries")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .set_json(json!({
                "product_id": product_id,
                "quantity": quantity,
                "scheduled_date": "2030-01-15"
            }))
            .to_request();
        let resp = test::call_service(app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        created_id(resp).await
    }

    pub async fn set_delivery_status<S, B>(
        &self,
        app: &S,
        token: &str,
        id: u64,
        status: &str,
    ) -> ServiceResponse<B>
    where
        S: Service<Request, Response = ServiceResponse<B>, Error = Error>,
        B: MessageBody,
    {
        let req = self
            .put(&format!("/api/supplier/deliveries/{id}/status"))
            .insert_header(("Authorization", format!("Bearer {token}")))
            .set_json(json!({ "status": status }))
            .to_request();
        test::call_service(app, req).await
    }

    pub async fn reorder_id<S, B>(
        &self,
        app: &S,
        admin_token: &str,
        product_id: u64,
        quantity: u32,
    ) -> u64
    where
        S: Service<Request, Response = ServiceResponse<B>, Error = Error>,
        B: MessageBody,
    {
        let req = self
            .post("/api/admin/reorders")
            .insert_header(("Authorization", format!("Bearer {admin_token}")))
            .set_json(json!({ "product_id": product_id, "quantity": quantity }))
            .to_request();
        let resp = test::call_service(app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        created_id(resp).await
    }
}

async fn created_id<B: MessageBody>(resp: ServiceResponse<B>) -> u64 {
    let body: Value = test::read_body_json(resp).await;
    body["id"].as_u64().expect("created record has an id")
}
