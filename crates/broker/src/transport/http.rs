// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers: the begin/complete protocol for each provider.
//!
//! Begin handlers validate tenant parameters, register a session, and return
//! the authorization URL as JSON. Complete handlers consume the session
//! exactly once, drive the provider exchange, and persist the credential;
//! any failure after the session is consumed is terminal for that attempt
//! and the user must restart from begin.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::error::BrokerError;
use crate::provider::pkce;
use crate::session::FlowSession;
use crate::sheets::upsert::{upsert, UpsertPlan};
use crate::state::AppState;

// -- Request types ------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct GoogleBeginQuery {
    #[serde(default, rename = "sheetId")]
    pub sheet_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EtsyBeginQuery {
    #[serde(default, rename = "shopId")]
    pub shop_id: Option<String>,
    #[serde(default, rename = "shopName")]
    pub shop_name: Option<String>,
    #[serde(default, rename = "sheetId")]
    pub sheet_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    /// Error passed through by the provider when the user denied access.
    #[serde(default)]
    pub error: Option<String>,
}

// -- Handlers -----------------------------------------------------------------

/// `GET /api/v1/health`
pub async fn health(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    let pending = s.sessions.pending().await;
    Json(serde_json::json!({ "status": "running", "pending_sessions": pending }))
}

/// `GET /auth` — begin the Google flow.
pub async fn google_begin(
    State(s): State<Arc<AppState>>,
    Query(q): Query<GoogleBeginQuery>,
) -> Response {
    let Some(sheet_id) = q.sheet_id.filter(|v| !v.is_empty()) else {
        return BrokerError::BadRequest
            .to_http_response("missing required parameter: sheetId")
            .into_response();
    };

    let token = s.sessions.register(FlowSession::new(sheet_id.clone())).await;
    let auth_url = s.google.auth_url(&token);
    tracing::info!(provider = "google", sheet = %sheet_id, "authorization flow started");
    Json(serde_json::json!({ "auth_url": auth_url })).into_response()
}

/// `GET /callback` — complete the Google flow.
pub async fn google_complete(
    State(s): State<Arc<AppState>>,
    Query(q): Query<CallbackQuery>,
) -> Response {
    let (code, session) = match consume_callback(&s, q, "google").await {
        Ok(pair) => pair,
        Err(resp) => return resp,
    };

    let cred = match s.google.exchange(&code).await {
        Ok(cred) => cred,
        Err(e) => {
            tracing::warn!(provider = "google", sheet = %session.sheet_id, err = %e, stage = "exchange", "token exchange failed");
            return BrokerError::ProviderError
                .to_text_response(format!("Error during authentication: {e}"))
                .into_response();
        }
    };

    if let Err(e) = upsert(s.sheets.as_ref(), &session.sheet_id, UpsertPlan::google(&cred)).await {
        tracing::error!(provider = "google", sheet = %session.sheet_id, err = %e, stage = "persist", "failed to persist credential");
        return persist_error_response();
    }

    tracing::info!(provider = "google", sheet = %session.sheet_id, user = %cred.email, "authorization completed");
    success_page(
        "Google account connected",
        format!(
            "<p>Authorized as <b>{}</b>. The refresh token has been written to the target Google Sheet.</p>",
            html_escape(&cred.email),
        ),
    )
    .into_response()
}

/// `GET /etsy/auth` — begin the Etsy flow.
pub async fn etsy_begin(
    State(s): State<Arc<AppState>>,
    Query(q): Query<EtsyBeginQuery>,
) -> Response {
    // Tenant parameters are all-or-nothing.
    let (Some(shop_id), Some(shop_name), Some(sheet_id)) = (
        q.shop_id.filter(|v| !v.is_empty()),
        q.shop_name.filter(|v| !v.is_empty()),
        q.sheet_id.filter(|v| !v.is_empty()),
    ) else {
        return BrokerError::BadRequest
            .to_http_response("missing required parameters: shopId, shopName, sheetId")
            .into_response();
    };

    let verifier = pkce::generate_code_verifier();
    let challenge = pkce::compute_code_challenge(&verifier);
    let session = FlowSession::new(sheet_id.clone())
        .with_shop(shop_id.clone(), shop_name)
        .with_code_verifier(verifier);
    let token = s.sessions.register(session).await;
    let auth_url = s.etsy.auth_url(&token, &challenge);
    tracing::info!(provider = "etsy", sheet = %sheet_id, shop = %shop_id, "authorization flow started");
    Json(serde_json::json!({ "auth_url": auth_url })).into_response()
}

/// `GET /etsy/callback` — complete the Etsy flow.
pub async fn etsy_complete(
    State(s): State<Arc<AppState>>,
    Query(q): Query<CallbackQuery>,
) -> Response {
    let (code, session) = match consume_callback(&s, q, "etsy").await {
        Ok(pair) => pair,
        Err(resp) => return resp,
    };

    // Begin always binds a verifier for this flow.
    let Some(verifier) = session.code_verifier.as_deref() else {
        tracing::error!(provider = "etsy", sheet = %session.sheet_id, "session is missing its PKCE verifier");
        return BrokerError::Internal.to_text_response("Authorization session is corrupt.").into_response();
    };
    let (shop_id, shop_name) = (
        session.shop_id.clone().unwrap_or_default(),
        session.shop_name.clone().unwrap_or_default(),
    );

    let token = match s.etsy.exchange(&code, verifier).await {
        Ok(token) => token,
        Err(e) => {
            tracing::warn!(provider = "etsy", sheet = %session.sheet_id, shop = %shop_id, err = %e, stage = "exchange", "token exchange failed");
            return BrokerError::ProviderError
                .to_text_response(format!("Error exchanging the code with Etsy: {e}"))
                .into_response();
        }
    };

    let plan = UpsertPlan::etsy(&shop_id, &shop_name, &token);
    if let Err(e) = upsert(s.sheets.as_ref(), &session.sheet_id, plan).await {
        tracing::error!(provider = "etsy", sheet = %session.sheet_id, shop = %shop_id, err = %e, stage = "persist", "failed to persist credential");
        return persist_error_response();
    }

    tracing::info!(provider = "etsy", sheet = %session.sheet_id, shop = %shop_id, "authorization completed");
    success_page(
        "Etsy shop connected",
        format!(
            "<p>Tokens saved for shop <b>{}</b> (ID: {}).</p>",
            html_escape(&shop_name),
            html_escape(&shop_id),
        ),
    )
    .into_response()
}

/// `GET /facebook/auth` — begin the Facebook flow.
pub async fn facebook_begin(
    State(s): State<Arc<AppState>>,
    Query(q): Query<GoogleBeginQuery>,
) -> Response {
    let Some(sheet_id) = q.sheet_id.filter(|v| !v.is_empty()) else {
        return BrokerError::BadRequest
            .to_http_response("missing required parameter: sheetId")
            .into_response();
    };

    let token = s.sessions.register(FlowSession::new(sheet_id.clone())).await;
    let auth_url = s.facebook.auth_url(&token);
    tracing::info!(provider = "facebook", sheet = %sheet_id, "authorization flow started");
    Json(serde_json::json!({ "auth_url": auth_url })).into_response()
}

/// `GET /facebook/callback` — complete the Facebook flow.
pub async fn facebook_complete(
    State(s): State<Arc<AppState>>,
    Query(q): Query<CallbackQuery>,
) -> Response {
    let (code, session) = match consume_callback(&s, q, "facebook").await {
        Ok(pair) => pair,
        Err(resp) => return resp,
    };

    let cred = match s.facebook.exchange(&code).await {
        Ok(cred) => cred,
        Err(e) => {
            tracing::warn!(provider = "facebook", sheet = %session.sheet_id, err = %e, stage = "exchange", "token chain exchange failed");
            return BrokerError::ProviderError
                .to_text_response(format!("Facebook authentication error: {e}"))
                .into_response();
        }
    };

    if let Err(e) = upsert(s.sheets.as_ref(), &session.sheet_id, UpsertPlan::facebook(&cred)).await
    {
        tracing::error!(provider = "facebook", sheet = %session.sheet_id, user = %cred.user_id, err = %e, stage = "persist", "failed to persist credential");
        return persist_error_response();
    }

    tracing::info!(provider = "facebook", sheet = %session.sheet_id, user = %cred.user_id, "authorization completed");
    success_page(
        "Facebook account connected",
        format!(
            "<p>Account: <b>{}</b> (ID: {})</p>\n<p>The long-lived token (60 days) has been saved.</p>",
            html_escape(&cred.name),
            html_escape(&cred.user_id),
        ),
    )
    .into_response()
}

// -- Shared pieces ------------------------------------------------------------

/// Validate the callback query and consume the session.
///
/// On any error here the flow has had no side effects: a provider-reported
/// error or missing parameters leave the session untouched, and an unknown
/// `state` matched nothing to consume.
async fn consume_callback(
    s: &AppState,
    q: CallbackQuery,
    provider: &'static str,
) -> Result<(String, FlowSession), Response> {
    if let Some(err) = q.error {
        tracing::warn!(provider, error = %err, stage = "callback", "provider returned an error");
        return Err(BrokerError::BadRequest
            .to_text_response(format!("Provider returned an error: {err}"))
            .into_response());
    }

    let (Some(code), Some(token)) = (
        q.code.filter(|v| !v.is_empty()),
        q.state.filter(|v| !v.is_empty()),
    ) else {
        return Err(BrokerError::BadRequest
            .to_text_response("Missing 'code' or 'state' parameter.")
            .into_response());
    };

    let Some(session) = s.sessions.consume(&token).await else {
        tracing::warn!(provider, stage = "session", "unknown or expired state token");
        return Err(BrokerError::SessionNotFound
            .to_text_response("Invalid or expired state token. Please restart the authorization flow.")
            .into_response());
    };

    Ok((code, session))
}

fn persist_error_response() -> Response {
    BrokerError::PersistError
        .to_text_response(
            "Could not persist the credential to the target Google Sheet. \
             Please ensure the service account has Editor access.",
        )
        .into_response()
}

/// Terminal acknowledgment page: names the identity, closes itself after 5s.
fn success_page(heading: &str, detail_html: String) -> Html<String> {
    Html(format!(
        "<style>body {{ font-family: sans-serif; text-align: center; padding-top: 50px; }}</style>\n\
         <h2>{heading}</h2>\n\
         {detail_html}\n\
         <p>You can close this window.</p>\n\
         <script>setTimeout(() => window.close(), 5000);</script>",
    ))
}

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
