// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Etsy adapter: authorization code flow with PKCE (S256).
//!
//! Etsy validates the verifier server-side at token exchange, so the
//! verifier generated at begin time is bound into the session and replayed
//! in [`EtsyProvider::exchange`]. Identity (shop id + name) is supplied by
//! the caller, not looked up from the provider.

use crate::provider::{percent_encode, TokenResponse};

const AUTH_URL: &str = "https://www.etsy.com/oauth/connect";
const TOKEN_URL: &str = "https://api.etsy.com/v3/public/oauth/token";

const SCOPES: &str = "shops_r transactions_r billing_r email_r";

pub struct EtsyProvider {
    keystring: String,
    redirect_uri: String,
    auth_url: String,
    token_url: String,
    http: reqwest::Client,
}

impl EtsyProvider {
    pub fn new(
        http: reqwest::Client,
        keystring: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            keystring: keystring.into(),
            redirect_uri: redirect_uri.into(),
            auth_url: AUTH_URL.to_owned(),
            token_url: TOKEN_URL.to_owned(),
            http,
        }
    }

    /// Override the upstream endpoints (test servers).
    pub fn with_endpoints(
        mut self,
        auth_url: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        self.auth_url = auth_url.into();
        self.token_url = token_url.into();
        self
    }

    /// Build the authorization redirect URL carrying the S256 challenge.
    pub fn auth_url(&self, state: &str, code_challenge: &str) -> String {
        format!(
            "{base}?response_type=code\
             &redirect_uri={redirect_uri}\
             &scope={scope}\
             &client_id={client_id}\
             &state={state}\
             &code_challenge={code_challenge}\
             &code_challenge_method=S256",
            base = self.auth_url,
            redirect_uri = percent_encode(&self.redirect_uri),
            scope = percent_encode(SCOPES),
            client_id = percent_encode(&self.keystring),
            state = percent_encode(state),
            code_challenge = percent_encode(code_challenge),
        )
    }

    /// Exchange an authorization code plus the session's verifier for tokens.
    pub async fn exchange(&self, code: &str, code_verifier: &str) -> anyhow::Result<TokenResponse> {
        let body = serde_json::json!({
            "grant_type": "authorization_code",
            "client_id": self.keystring,
            "redirect_uri": self.redirect_uri,
            "code": code,
            "code_verifier": code_verifier,
        });

        let resp = self
            .http
            .post(&self.token_url)
            .header("Content-Type", "application/json")
            .body(body.to_string())
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("token exchange failed ({status}): {text}");
        }

        let token: TokenResponse = resp.json().await?;
        Ok(token)
    }
}
