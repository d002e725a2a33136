/*
 * Responsibility
 * - Config → dependencies → Router assembly
 * - Middleware wiring (HTTP cross-cutting, auth gate)
 * - Credential warm-up, then axum::serve()
 */
use std::{panic, process, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::{self, v1::handlers::health};
use crate::config::Config;
use crate::middleware;
use crate::middleware::auth::gate::PublicPaths;
use crate::services::auth::credentials::{
    ClientCredentialsExchange, CredentialCache, TokenExchange, UnconfiguredExchange,
};
use crate::services::auth::outbound::OutboundAuth;
use crate::services::auth::validator::HttpTokenValidator;
use crate::services::users::{HttpUserDirectory, NoopUserDirectory, UserDirectory};
use crate::state::AppState;

fn init_tracing() {
    // RUST_LOG wins when set, e.g.
    // RUST_LOG=info,service_guard=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        // stderr can be hidden depending on how the process is launched
        tracing::error!(?info, "panic");

        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;

    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting service in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let state = build_state(&config)?;
    warm_up(&state, &config).await?;

    let app = build_router(state, config.request_timeout);
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn build_state(config: &Config) -> Result<AppState> {
    let validator = HttpTokenValidator::new(
        config.authority_validate_url.clone(),
        config.authority_timeout,
    )
    .context("failed to build token validator client")?;

    let exchange: Arc<dyn TokenExchange> = match &config.client_credentials {
        Some(credentials) => Arc::new(
            ClientCredentialsExchange::new(credentials.clone(), config.authority_timeout)
                .context("failed to build token exchange client")?,
        ),
        None => {
            tracing::warn!("OAUTH2_TOKEN_URI not set; outbound service calls will be refused");
            Arc::new(UnconfiguredExchange)
        }
    };
    let credentials = Arc::new(CredentialCache::new(
        exchange,
        config.credential_expiry_margin,
    ));

    let users: Arc<dyn UserDirectory> = match &config.user_service_url {
        Some(url) => Arc::new(
            HttpUserDirectory::new(
                url.clone(),
                OutboundAuth::new(credentials.clone()),
                config.user_service_timeout,
            )
            .context("failed to build user service client")?,
        ),
        None => Arc::new(NoopUserDirectory),
    };
    tracing::info!(backend = users.backend_name(), "user directory selected");

    Ok(AppState::new(
        Arc::new(validator),
        PublicPaths::new(&config.public_paths),
        users,
        credentials,
    ))
}

/// Fetch the first service token up front so a misconfigured client fails at startup.
async fn warm_up(state: &AppState, config: &Config) -> Result<()> {
    if config.client_credentials.is_none() {
        return Ok(());
    }

    match state.credentials.get_token().await {
        Ok(_) => {
            tracing::info!("service credentials acquired");
            Ok(())
        }
        Err(err) if config.app_env.is_production() => {
            Err(err).context("failed to acquire service credentials")
        }
        Err(err) => {
            tracing::warn!(error = %err, "failed to acquire service credentials; continuing");
            Ok(())
        }
    }
}

pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    let router = Router::new()
        .route("/health", get(health::health))
        .route("/ping", get(health::ping))
        .nest("/api/v1", api::v1::routes(&state));

    let router = middleware::auth::gate::apply(router, state.clone()).with_state(state);

    middleware::http::apply(router, request_timeout)
}
