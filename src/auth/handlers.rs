use actix_web::cookie::{Cookie, SameSite, time::Duration};
use actix_web::{HttpRequest, HttpResponse, web};
use anyhow::Context;
use chrono::{TimeZone, Utc};
use tracing::{debug, info, instrument, warn};

use crate::auth::auth::{AuthUser, bearer_token};
use crate::auth::jwt::{generate_access_token, generate_refresh_token, verify_token};
use crate::auth::password::{hash_password, verify_password};
use crate::config::Config;
use crate::error::{ApiError, internal};
use crate::model::role::Role;
use crate::model::supplier::NewSupplier;
use crate::model::user::{NewUser, RefreshToken, User, normalize_username};
use crate::models::{
    LoginRequest, MeResponse, RegisterRequest, RegisterResponse, TokenResponse, TokenType,
};
use crate::state::AppState;

pub const REFRESH_COOKIE: &str = "refresh_token";
pub const MIN_PASSWORD_LEN: usize = 8;

fn refresh_cookie(token: String, config: &Config) -> Cookie<'static> {
    Cookie::build(REFRESH_COOKIE, token)
        .path("/auth")
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(SameSite::Strict)
        .max_age(Duration::seconds(config.refresh_token_ttl as i64))
        .finish()
}

fn removal_cookie(config: &Config) -> Cookie<'static> {
    let mut cookie = refresh_cookie(String::new(), config);
    cookie.make_removal();
    cookie
}

/// Refresh token from `Authorization: Bearer` first, then the cookie.
fn presented_refresh_token(req: &HttpRequest) -> Option<String> {
    bearer_token(req)
        .map(str::to_string)
        .or_else(|| req.cookie(REFRESH_COOKIE).map(|c| c.value().to_string()))
        .filter(|t| !t.is_empty())
}

pub fn validate_new_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Signs an access/refresh pair and stores the refresh token's `jti`.
async fn issue_tokens(
    state: &AppState,
    config: &Config,
    user: &User,
) -> Result<(TokenResponse, Cookie<'static>), ApiError> {
    let access_token =
        generate_access_token(user, &config.jwt_secret, config.access_token_ttl)
            .map_err(internal("Failed to sign access token"))?;
    let (refresh_token, claims) =
        generate_refresh_token(user, &config.jwt_secret, config.refresh_token_ttl)
            .map_err(internal("Failed to sign refresh token"))?;

    debug!(user_id = user.id, jti = %claims.jti, "Storing refresh token");
    let expires_at = Utc
        .timestamp_opt(claims.exp as i64, 0)
        .single()
        .unwrap_or_else(Utc::now);
    state
        .store
        .save_refresh_token(RefreshToken {
            user_id: user.id,
            jti: claims.jti,
            expires_at,
            revoked: false,
        })
        .await?;

    let cookie = refresh_cookie(refresh_token.clone(), config);
    let body = TokenResponse {
        access_token,
        refresh_token,
        role: user.role.to_string(),
        supplier_id: user.supplier_id,
    };
    Ok((body, cookie))
}

/// Supplier users may only sign in while their supplier record is active.
async fn ensure_active(state: &AppState, user: &User) -> Result<(), ApiError> {
    let Some(supplier_id) = user.supplier_id else {
        return Ok(());
    };
    let active = state
        .store
        .get_supplier(supplier_id)
        .await?
        .is_some_and(|s| s.is_active());
    if !active {
        info!(user_id = user.id, supplier_id, "Rejected login for inactive supplier");
        return Err(ApiError::forbidden("Supplier account is inactive"));
    }
    Ok(())
}

/// Register a supplier account
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Supplier account created", body = RegisterResponse),
        (status = 400, description = "Missing or invalid fields"),
        (status = 409, description = "Username already taken"),
        (status = 429, description = "Too many requests")
    ),
    tag = "Auth"
)]
pub async fn register(
    state: web::Data<AppState>,
    payload: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    let username = normalize_username(&payload.username);

    if username.is_empty() || payload.password.is_empty() {
        return Err(ApiError::bad_request(
            "Username and password must not be empty",
        ));
    }
    validate_new_password(&payload.password)?;

    let supplier = NewSupplier {
        company_name: payload.company_name,
        contact_name: payload.contact_name,
        email: payload.email,
        phone: payload.phone,
        address: payload.address,
    };
    supplier.validate()?;

    if !state
        .usernames
        .is_available(state.store.as_ref(), &username)
        .await?
    {
        return Err(ApiError::conflict("Username already taken"));
    }

    let password_hash =
        hash_password(&payload.password).map_err(internal("Failed to hash password"))?;

    let (user, supplier) = state
        .store
        .create_supplier_account(
            NewUser {
                username,
                password_hash,
                role: Role::Supplier,
            },
            supplier,
        )
        .await?;

    state.usernames.record(&user.username).await;
    info!(user_id = user.id, supplier_id = supplier.id, "Supplier registered");

    Ok(HttpResponse::Created().json(RegisterResponse {
        message: "Supplier registered successfully".to_string(),
        supplier_id: supplier.id,
    }))
}

/// Log in and receive an access/refresh token pair
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Tokens issued; refresh token also set as cookie", body = TokenResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Supplier account is inactive")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(state, config, payload),
    fields(username = %payload.username)
)]
pub async fn login(
    state: web::Data<AppState>,
    config: web::Data<Config>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    info!("Login request received");

    if payload.username.trim().is_empty() || payload.password.is_empty() {
        info!("Validation failed: empty username or password");
        return Err(ApiError::bad_request("Username or password required"));
    }

    let Some(user) = state.store.find_user_by_username(&payload.username).await? else {
        info!("Invalid credentials: user not found");
        return Err(ApiError::unauthorized("Invalid credentials"));
    };

    if let Err(e) = verify_password(&payload.password, &user.password_hash) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    ensure_active(&state, &user).await?;

    let (body, cookie) = issue_tokens(&state, &config, &user).await?;

    // Not fatal: the user is already authenticated
    if let Err(e) = state.store.record_login(user.id, Utc::now()).await {
        warn!(error = %e, "Failed to update last_login_at");
    }

    info!(user_id = user.id, "Login successful");
    Ok(HttpResponse::Ok().cookie(cookie).json(body))
}

/// Rotate a refresh token
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "New token pair; the presented refresh token is revoked", body = TokenResponse),
        (status = 401, description = "Missing, invalid, expired or revoked refresh token")
    ),
    tag = "Auth",
    security(("bearer_auth" = []))
)]
pub async fn refresh_token(
    req: HttpRequest,
    state: web::Data<AppState>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let token =
        presented_refresh_token(&req).ok_or_else(|| ApiError::unauthorized("No token"))?;

    let claims = verify_token(&token, &config.jwt_secret)
        .map_err(|_| ApiError::unauthorized("Invalid or expired token"))?;
    if claims.token_type != TokenType::Refresh {
        return Err(ApiError::unauthorized("Refresh token required"));
    }

    // Single use: only the request that flips `revoked` may continue
    if !state.store.revoke_refresh_token(&claims.jti).await? {
        info!(user_id = claims.user_id, "Refresh token unknown or already revoked");
        return Err(ApiError::unauthorized("Refresh token revoked"));
    }

    let user = state
        .store
        .find_user(claims.user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Unknown user"))?;
    ensure_active(&state, &user).await?;

    let (body, cookie) = issue_tokens(&state, &config, &user).await?;
    debug!(user_id = user.id, "Refresh token rotated");
    Ok(HttpResponse::Ok().cookie(cookie).json(body))
}

/// Revoke the presented refresh token
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 204, description = "Logged out (idempotent)")
    ),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    state: web::Data<AppState>,
    config: web::Data<Config>,
) -> HttpResponse {
    let claims = presented_refresh_token(&req)
        .and_then(|token| verify_token(&token, &config.jwt_secret).ok())
        .filter(|claims| claims.token_type == TokenType::Refresh);

    if let Some(claims) = claims {
        if let Err(e) = state.store.revoke_refresh_token(&claims.jti).await {
            warn!(error = %e, "Failed to revoke refresh token on logout");
        }
    }

    // Success even if the token didn't exist
    HttpResponse::NoContent()
        .cookie(removal_cookie(&config))
        .finish()
}

/// The authenticated identity
#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Caller identity", body = MeResponse),
        (status = 401, description = "Missing or invalid access token")
    ),
    tag = "Auth",
    security(("bearer_auth" = []))
)]
pub async fn me(auth: AuthUser) -> HttpResponse {
    HttpResponse::Ok().json(MeResponse {
        user_id: auth.user_id,
        username: auth.username,
        role: auth.role.to_string(),
        supplier_id: auth.supplier_id,
    })
}

/// Creates the configured admin account unless the username already exists.
pub async fn seed_admin(state: &AppState, config: &Config) -> anyhow::Result<()> {
    let Some((username, password)) = &config.seed_admin else {
        return Ok(());
    };

    if state.store.username_exists(username).await? {
        debug!(%username, "Seed admin already present");
        return Ok(());
    }

    let password_hash =
        hash_password(password).map_err(|e| anyhow::anyhow!("hashing seed admin password: {e}"))?;
    let user = state
        .store
        .create_user(NewUser {
            username: username.clone(),
            password_hash,
            role: Role::Admin,
        })
        .await
        .context("creating seed admin")?;
    state.usernames.record(&user.username).await;

    info!(user_id = user.id, "Seed admin created");
    Ok(())
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::test;
    use serde_json::{Value, json};

    use crate::test_support::{PASSWORD, TestContext};

    fn registration(username: &str, password: &str) -> Value {
        json!({
            "username": username,
            "password": password,
            "company_name": "Acme Ltd",
            "contact_name": "Sam",
            "email": "sales@acme.example.com"
        })
    }

    #[actix_web::test]
    async fn usernames_are_unique_regardless_of_case() {
        let ctx = TestContext::new().await;
        let app = ctx.app().await;
        ctx.register_supplier(&app, "acme").await;

        let req = ctx
            .post("/auth/register")
            .set_json(registration("ACME", PASSWORD))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Username already taken");
    }

    #[actix_web::test]
    async fn registration_validates_fields() {
        let ctx = TestContext::new().await;
        let app = ctx.app().await;

        for body in [
            registration("", PASSWORD),
            registration("acme", "short"),
            json!({"username": "acme", "password": PASSWORD, "company_name": "",
                   "contact_name": "Sam", "email": "sales@acme.example.com"}),
        ] {
            let req = ctx.post("/auth/register").set_json(body).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[actix_web::test]
    async fn login_sets_http_only_refresh_cookie() {
        let ctx = TestContext::new().await;
        let app = ctx.app().await;
        ctx.register_supplier(&app, "acme").await;

        let resp = ctx.try_login(&app, "acme", PASSWORD).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let cookie = resp
            .response()
            .cookies()
            .find(|c| c.name() == super::REFRESH_COOKIE)
            .expect("refresh cookie");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/auth"));

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["role"], "supplier");
        assert!(body["supplier_id"].is_u64());
    }

    #[actix_web::test]
    async fn wrong_password_is_unauthorized() {
        let ctx = TestContext::new().await;
        let app = ctx.app().await;
        ctx.register_supplier(&app, "acme").await;

        let resp = ctx.try_login(&app, "acme", "not-the-password").await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Invalid credentials");
    }

    #[actix_web::test]
    async fn refresh_tokens_rotate_and_are_single_use() {
        let ctx = TestContext::new().await;
        let app = ctx.app().await;
        let acme = ctx.register_supplier(&app, "acme").await;

        let refresh = |token: &str| {
            ctx.post("/auth/refresh")
                .insert_header(("Authorization", format!("Bearer {token}")))
                .to_request()
        };

        let resp = test::call_service(&app, refresh(&acme.refresh_token)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let rotated: Value = test::read_body_json(resp).await;

        let resp = test::call_service(&app, refresh(&acme.refresh_token)).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        // Access tokens are not accepted for refresh
        let resp = test::call_service(&app, refresh(&acme.access_token)).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let next = rotated["refresh_token"].as_str().unwrap();
        let resp = test::call_service(&app, refresh(next)).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn refresh_accepts_the_cookie() {
        let ctx = TestContext::new().await;
        let app = ctx.app().await;
        let acme = ctx.register_supplier(&app, "acme").await;

        let req = ctx
            .post("/auth/refresh")
            .cookie(actix_web::cookie::Cookie::new(
                super::REFRESH_COOKIE,
                acme.refresh_token.clone(),
            ))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn logout_revokes_and_is_idempotent() {
        let ctx = TestContext::new().await;
        let app = ctx.app().await;
        let acme = ctx.register_supplier(&app, "acme").await;

        for _ in 0..2 {
            let req = ctx
                .post("/auth/logout")
                .insert_header(("Authorization", format!("Bearer {}", acme.refresh_token)))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        }

        let req = ctx
            .post("/auth/refresh")
            .insert_header(("Authorization", format!("Bearer {}", acme.refresh_token)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn me_reports_identity() {
        let ctx = TestContext::new().await;
        let app = ctx.app().await;
        let acme = ctx.register_supplier(&app, "acme").await;

        let req = ctx
            .get("/api/me")
            .insert_header(("Authorization", format!("Bearer {}", acme.access_token)))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["username"], "acme");
        assert_eq!(body["role"], "supplier");
        assert_eq!(body["supplier_id"], acme.supplier_id);
    }

    #[actix_web::test]
    async fn seed_admin_runs_once() {
        let ctx = TestContext::new().await;
        super::seed_admin(&ctx.state, &ctx.config).await.unwrap();

        let app = ctx.app().await;
        let token = ctx.admin_token(&app).await;
        assert!(!token.is_empty());
    }
}
