// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::BrokerConfig;
use crate::provider::etsy::EtsyProvider;
use crate::provider::facebook::FacebookProvider;
use crate::provider::google::GoogleProvider;
use crate::session::SessionStore;
use crate::sheets::SheetsBackend;

/// Shared broker state: session store, provider adapters, sheets backend.
pub struct AppState {
    pub config: BrokerConfig,
    pub sessions: SessionStore,
    pub sheets: Arc<dyn SheetsBackend>,
    pub google: GoogleProvider,
    pub etsy: EtsyProvider,
    pub facebook: FacebookProvider,
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        config: BrokerConfig,
        sheets: Arc<dyn SheetsBackend>,
        google: GoogleProvider,
        etsy: EtsyProvider,
        facebook: FacebookProvider,
        shutdown: CancellationToken,
    ) -> Self {
        let sessions = SessionStore::new(config.session_ttl());
        Self { config, sessions, sheets, google, etsy, facebook, shutdown }
    }
}
