// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::error::Error;

use founders_admin_session::{
    api::router,
    auth::{AuthProvider, Identity, MemoryAuthClient, RestAuthClient},
    config::{AppConfig, LogFormat, ProviderConfig, DEFAULT_LOG_FILTER},
    state::AppState,
};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Stable id of the seeded development operator.
const DEV_ADMIN_ID: &str = "dev-admin";

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

fn build_provider(config: &ProviderConfig) -> Result<AuthProvider, Box<dyn Error>> {
    match config {
        ProviderConfig::Hosted { url, anon_key } => {
            let client = RestAuthClient::new(url, anon_key.clone())?;
            info!(url = %client.base_url(), "Using hosted identity provider");
            Ok(client.into())
        }
        ProviderConfig::Development {
            admin_email,
            admin_password,
        } => {
            warn!(email = %admin_email, "AUTH_URL not set, using in-memory identity provider");
            let client = MemoryAuthClient::new();
            client.add_account(
                admin_email,
                admin_password,
                Identity::new(DEV_ADMIN_ID, Some(admin_email.as_str())),
            );
            client.set_role(DEV_ADMIN_ID, "superadmin");
            Ok(client.into())
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = AppConfig::from_env()?;
    init_tracing(config.log_format);

    let state = AppState::new(build_provider(&config.provider)?);
    let mut synchronizer = state.synchronizer().spawn();
    let app = router(state);

    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "Founders admin portal listening (docs at /docs)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    synchronizer.shutdown().await?;
    info!("Session synchronizer stopped");
    Ok(())
}
