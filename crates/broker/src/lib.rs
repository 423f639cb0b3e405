// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sheetbroker: OAuth authorization broker that persists provider
//! credentials into caller-designated Google Sheets.

pub mod config;
pub mod error;
pub mod provider;
pub mod session;
pub mod sheets;
pub mod state;
pub mod transport;

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::BrokerConfig;
use crate::provider::etsy::EtsyProvider;
use crate::provider::facebook::FacebookProvider;
use crate::provider::google::GoogleProvider;
use crate::sheets::auth::SaTokenSource;
use crate::sheets::{SheetsApi, SheetsBackend};
use crate::state::AppState;
use crate::transport::build_router;

/// Run the broker until shutdown.
pub async fn run(config: BrokerConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let shutdown = CancellationToken::new();

    let http = reqwest::Client::builder().timeout(Duration::from_secs(30)).build()?;

    // Service identity for spreadsheet writes. A bad key fails here, at
    // startup, rather than on the first completed flow.
    let tokens = SaTokenSource::new(
        http.clone(),
        config.service_account_email.clone(),
        &config.service_account_private_key,
    )?;
    let sheets: Arc<dyn SheetsBackend> = Arc::new(SheetsApi::new(http.clone(), tokens));

    let google = GoogleProvider::new(
        http.clone(),
        config.google_client_id.clone(),
        config.google_client_secret.clone(),
        config.google_redirect_uri.clone(),
    );
    let etsy = EtsyProvider::new(
        http.clone(),
        config.etsy_keystring.clone(),
        config.etsy_redirect_uri.clone(),
    );
    let facebook = FacebookProvider::new(
        http,
        config.fb_app_id.clone(),
        config.fb_app_secret.clone(),
        config.fb_redirect_uri.clone(),
        config.fb_api_version.clone(),
    );

    let state = Arc::new(AppState::new(config, sheets, google, etsy, facebook, shutdown.clone()));
    session::spawn_purge_task(Arc::clone(&state));

    tracing::info!("sheetbroker listening on {addr}");
    let router = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await?;

    Ok(())
}
