// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Facebook adapter: authorization code flow with a token-chain exchange.
//!
//! Completion is three sequential Graph API calls: code to short-lived
//! token, short-lived to long-lived token (`fb_exchange_token` grant), and
//! long-lived token to identity. The short-lived token is never the stored
//! credential; if any step fails the whole exchange is discarded.

use serde::Deserialize;

use crate::provider::{percent_encode, TokenResponse};

const DIALOG_BASE: &str = "https://www.facebook.com";
const GRAPH_BASE: &str = "https://graph.facebook.com";

const SCOPES: &str = "public_profile,business_management,ads_management,ads_read,\
                      pages_read_engagement,pages_show_list,read_insights";

/// Credential produced by a completed Facebook flow.
#[derive(Debug, Clone)]
pub struct FacebookCredential {
    pub user_id: String,
    pub name: String,
    /// Long-lived access token (~60 days).
    pub access_token: String,
    pub expires_in: u64,
}

pub struct FacebookProvider {
    app_id: String,
    app_secret: String,
    redirect_uri: String,
    api_version: String,
    dialog_base: String,
    graph_base: String,
    http: reqwest::Client,
}

impl FacebookProvider {
    pub fn new(
        http: reqwest::Client,
        app_id: impl Into<String>,
        app_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            app_secret: app_secret.into(),
            redirect_uri: redirect_uri.into(),
            api_version: api_version.into(),
            dialog_base: DIALOG_BASE.to_owned(),
            graph_base: GRAPH_BASE.to_owned(),
            http,
        }
    }

    /// Override the upstream base URLs (test servers).
    pub fn with_endpoints(
        mut self,
        dialog_base: impl Into<String>,
        graph_base: impl Into<String>,
    ) -> Self {
        self.dialog_base = dialog_base.into();
        self.graph_base = graph_base.into();
        self
    }

    /// Build the login dialog URL with the session token as `state`.
    pub fn auth_url(&self, state: &str) -> String {
        format!(
            "{base}/{version}/dialog/oauth?client_id={client_id}\
             &redirect_uri={redirect_uri}\
             &scope={scope}\
             &state={state}\
             &response_type=code",
            base = self.dialog_base,
            version = self.api_version,
            client_id = percent_encode(&self.app_id),
            redirect_uri = percent_encode(&self.redirect_uri),
            scope = SCOPES,
            state = percent_encode(state),
        )
    }

    /// Run the full three-step exchange chain.
    pub async fn exchange(&self, code: &str) -> anyhow::Result<FacebookCredential> {
        let token_url = format!("{}/{}/oauth/access_token", self.graph_base, self.api_version);

        // 1. Code to short-lived access token (1-2 hours).
        let short = self
            .get_token(
                &token_url,
                &[
                    ("client_id", self.app_id.as_str()),
                    ("client_secret", self.app_secret.as_str()),
                    ("redirect_uri", self.redirect_uri.as_str()),
                    ("code", code),
                ],
            )
            .await
            .map_err(|e| anyhow::anyhow!("short-lived token request failed: {e}"))?;

        // 2. Short-lived to long-lived token (~60 days).
        let long = self
            .get_token(
                &token_url,
                &[
                    ("grant_type", "fb_exchange_token"),
                    ("client_id", self.app_id.as_str()),
                    ("client_secret", self.app_secret.as_str()),
                    ("fb_exchange_token", short.access_token.as_str()),
                ],
            )
            .await
            .map_err(|e| anyhow::anyhow!("long-lived token exchange failed: {e}"))?;

        // 3. Long-lived token to identity.
        let me_url = format!("{}/{}/me", self.graph_base, self.api_version);
        let resp = self
            .http
            .get(&me_url)
            .query(&[("fields", "id,name"), ("access_token", long.access_token.as_str())])
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("identity lookup failed ({status}): {text}");
        }
        let user: GraphUser = resp.json().await?;

        Ok(FacebookCredential {
            user_id: user.id,
            name: user.name,
            access_token: long.access_token,
            expires_in: long.expires_in,
        })
    }

    async fn get_token(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> anyhow::Result<TokenResponse> {
        let resp = self.http.get(url).query(params).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("({status}): {text}");
        }
        let token: TokenResponse = resp.json().await?;
        Ok(token)
    }
}

#[derive(Debug, Deserialize)]
struct GraphUser {
    id: String,
    name: String,
}
