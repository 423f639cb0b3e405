// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory store for in-flight authorization sessions.
//!
//! A session correlates a begin-flow request with the provider's redirect
//! back to the callback endpoint. Each entry is keyed by the opaque `state`
//! token embedded in the authorization URL and is consumed exactly once:
//! the lookup-and-remove runs under a single write lock, so two racing
//! callbacks for the same token can never both succeed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::sync::RwLock;

use crate::state::AppState;

/// How often abandoned sessions are reaped.
const PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Tenant context carried from begin to complete.
///
/// Supplied entirely by the calling client; opaque to the provider adapters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowSession {
    /// Destination spreadsheet id. Never inferred or defaulted.
    pub sheet_id: String,
    /// Business entity identity, present for the Etsy flow only.
    pub shop_id: Option<String>,
    pub shop_name: Option<String>,
    /// PKCE verifier, bound at begin time and replayed at token exchange.
    pub code_verifier: Option<String>,
    pub created_at: Instant,
}

impl FlowSession {
    pub fn new(sheet_id: impl Into<String>) -> Self {
        Self {
            sheet_id: sheet_id.into(),
            shop_id: None,
            shop_name: None,
            code_verifier: None,
            created_at: Instant::now(),
        }
    }

    pub fn with_shop(mut self, shop_id: impl Into<String>, shop_name: impl Into<String>) -> Self {
        self.shop_id = Some(shop_id.into());
        self.shop_name = Some(shop_name.into());
        self
    }

    pub fn with_code_verifier(mut self, verifier: impl Into<String>) -> Self {
        self.code_verifier = Some(verifier.into());
        self
    }
}

/// TTL-aware registry of pending authorization sessions.
pub struct SessionStore {
    entries: RwLock<HashMap<String, FlowSession>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self { entries: RwLock::new(HashMap::new()), ttl }
    }

    /// Register a session under a fresh random token and return the token.
    ///
    /// The token is guaranteed unique within the live set; at 128 bits of
    /// entropy the retry loop is never expected to run.
    pub async fn register(&self, session: FlowSession) -> String {
        let mut entries = self.entries.write().await;
        let mut token = generate_token();
        while entries.contains_key(&token) {
            token = generate_token();
        }
        entries.insert(token.clone(), session);
        token
    }

    /// Atomically look up and remove a session.
    ///
    /// Returns `None` for unknown tokens and for entries older than the TTL.
    /// Expired-but-present entries are removed and rejected, so a stale
    /// callback can neither complete nor be replayed later.
    pub async fn consume(&self, token: &str) -> Option<FlowSession> {
        let session = self.entries.write().await.remove(token)?;
        if session.created_at.elapsed() >= self.ttl {
            tracing::debug!("rejected expired authorization session");
            return None;
        }
        Some(session)
    }

    /// Number of sessions currently pending.
    pub async fn pending(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Drop entries older than the TTL. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, s| s.created_at.elapsed() < self.ttl);
        before - entries.len()
    }
}

/// Generate an opaque session token: 16 random bytes, hex-encoded.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Spawn the background task that reaps abandoned sessions.
///
/// Correctness does not depend on it (consume checks age itself); it only
/// bounds memory growth from flows the user never completed.
pub fn spawn_purge_task(state: Arc<AppState>) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = state.shutdown.cancelled() => return,
                _ = tokio::time::sleep(PURGE_INTERVAL) => {}
            }
            let removed = state.sessions.purge_expired().await;
            if removed > 0 {
                tracing::debug!(removed, "purged abandoned authorization sessions");
            }
        }
    });
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
