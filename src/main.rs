use actix_web::middleware::{Logger, NormalizePath};
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use anyhow::Context;
use chrono::{Duration, Utc};
use dotenvy::dotenv;

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod error;
mod model;
mod models;
mod routes;
mod state;
mod store;
mod utils;

#[cfg(test)]
mod test_support;

use config::Config;
use db::init_store;
use routes::Limiters;
use state::AppState;

use crate::docs::ApiDoc;
use tracing::{error, info};
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Users who logged in within this window are preloaded into the username cache.
const RECENT_LOGIN_DAYS: i64 = 30;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();

    info!(addr = %config.server_addr, storage = ?config.storage, "Server starting...");

    let store = init_store(&config).await?;
    let state = AppState::new(store);
    auth::handlers::seed_admin(&state, &config)
        .await
        .context("Failed to seed admin account")?;

    let filter_state = state.clone();
    actix_web::rt::spawn(async move {
        let usernames = filter_state.store.usernames();
        match filter_state.usernames.filter.warmup(usernames, 100).await {
            Ok(n) => info!(usernames = n, "Username filter warmed up"),
            Err(e) => error!(error = %e, "Failed to warmup username filter"),
        }
    });

    let cache_state = state.clone();
    actix_web::rt::spawn(async move {
        let since = Utc::now() - Duration::days(RECENT_LOGIN_DAYS);
        let usernames = cache_state.store.usernames_active_since(since);
        match cache_state.usernames.cache.warmup(usernames, 250).await {
            Ok(n) => info!(usernames = n, "Username cache warmed up"),
            Err(e) => error!(error = %e, "Failed to warmup username cache"),
        }
    });

    let limiters = Limiters::from_config(&config)?;
    let server_addr = config.server_addr.clone();
    let state = Data::new(state);
    let config_data = Data::new(config);

    HttpServer::new(move || {
        let config = config_data.clone();
        let limiters = limiters.clone();
        App::new()
            .wrap(Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                // wildcard {_:.*} so the UI's JS/CSS assets resolve
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(state.clone())
            .app_data(config.clone())
            .configure(move |cfg| routes::configure(cfg, &config, &limiters))
    })
    .bind(&server_addr)
    .with_context(|| format!("Failed to bind {server_addr}"))?
    .run()
    .await?;

    Ok(())
}
