// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP transport for the broker.

pub mod http;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::state::AppState;

/// Build the axum `Router` with all broker routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health
        .route("/api/v1/health", get(http::health))
        // Google: begin / complete
        .route("/auth", get(http::google_begin))
        .route("/callback", get(http::google_complete))
        // Etsy: begin / complete
        .route("/etsy/auth", get(http::etsy_begin))
        .route("/etsy/callback", get(http::etsy_complete))
        // Facebook: begin / complete
        .route("/facebook/auth", get(http::facebook_begin))
        .route("/facebook/callback", get(http::facebook_complete))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
