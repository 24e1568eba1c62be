// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Notify-Vital API Server
//!
//! Records health metrics for locally registered users and manages
//! Firebase-backed user profiles.

use anyhow::Context;
use notify_vital::{
    config::Config,
    db::{Database, FirestoreDb},
    services::{
        firebase::ServiceAccount, FirebaseAuth, IdTokenVerifier, LocalAuthService,
        ProfileService, TokenService,
    },
    AppState,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(
        port = config.port,
        environment = %config.environment,
        "Starting Notify-Vital API"
    );

    // Relational store (users, sessions, metrics)
    let db = Database::connect(&config)
        .await
        .context("Failed to connect to database")?;

    let tokens = Arc::new(
        TokenService::new(&config.jwt_secret, config.jwt_expiry)
            .context("Invalid session token configuration")?,
    );
    let local_auth = LocalAuthService::new(db.clone(), tokens);

    // Federated surface
    let project_id = resolve_project_id(&config)?;
    let firestore = FirestoreDb::new(&project_id, &config.firebase_credentials_file)
        .await
        .context("Failed to connect to Firestore")?;
    let firebase_auth = Arc::new(FirebaseAuth::new(&config, &project_id).await?);

    let id_tokens = Arc::new(if config.firebase_auth_emulator_host.is_some() {
        IdTokenVerifier::new_emulator(&project_id)?
    } else {
        IdTokenVerifier::new(&project_id)?
    });

    let profiles = ProfileService::new(firebase_auth, firestore);

    spawn_session_purge(&config, db.clone())?;

    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        local_auth,
        id_tokens,
        profiles,
    });

    let app = notify_vital::routes::create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Project id from configuration, else from the service-account file.
fn resolve_project_id(config: &Config) -> anyhow::Result<String> {
    if let Some(project_id) = &config.firebase_project_id {
        return Ok(project_id.clone());
    }

    let account = ServiceAccount::from_file(&config.firebase_credentials_file).context(
        "FIREBASE_PROJECT_ID not set and no readable service-account file to take it from",
    )?;
    Ok(account.project_id)
}

/// Periodically delete session rows past their retention window.
fn spawn_session_purge(config: &Config, db: Database) -> anyhow::Result<()> {
    let period = config
        .session_cleanup_interval
        .to_std()
        .context("SESSION_CLEANUP_INTERVAL out of range")?;
    let retention = config.session_retention;

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let cutoff = chrono::Utc::now() - retention;
            if let Err(e) = db.purge_sessions(cutoff).await {
                tracing::warn!(error = %e, "Session purge failed");
            }
        }
    });

    tracing::info!(
        interval_secs = period.as_secs(),
        retention_hours = retention.num_hours(),
        "Session purge scheduled"
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}

/// Initialize structured logging: JSON by default, `LOG_FORMAT=pretty` for
/// local development.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("notify_vital=debug,info"));

    let pretty = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("pretty"));

    if pretty {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .with_current_span(true)
                    .flatten_event(true),
            )
            .init();
    }
}
