// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Google adapter: plain authorization code flow with offline access.
//!
//! The stored credential is the refresh token; an exchange that does not
//! return one is a terminal error, since the downstream consumer cannot
//! operate on a short-lived access token alone.

use serde::Deserialize;

use crate::provider::{percent_encode, TokenResponse};

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Offline access to Ads plus enough identity scope to label the row.
const SCOPES: &str = "https://www.googleapis.com/auth/adwords \
                      https://www.googleapis.com/auth/userinfo.email \
                      https://www.googleapis.com/auth/userinfo.profile";

/// Credential produced by a completed Google flow.
#[derive(Debug, Clone)]
pub struct GoogleCredential {
    pub email: String,
    pub refresh_token: String,
}

pub struct GoogleProvider {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    auth_url: String,
    token_url: String,
    userinfo_url: String,
    http: reqwest::Client,
}

impl GoogleProvider {
    pub fn new(
        http: reqwest::Client,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            auth_url: AUTH_URL.to_owned(),
            token_url: TOKEN_URL.to_owned(),
            userinfo_url: USERINFO_URL.to_owned(),
            http,
        }
    }

    /// Override the upstream endpoints (test servers).
    pub fn with_endpoints(
        mut self,
        auth_url: impl Into<String>,
        token_url: impl Into<String>,
        userinfo_url: impl Into<String>,
    ) -> Self {
        self.auth_url = auth_url.into();
        self.token_url = token_url.into();
        self.userinfo_url = userinfo_url.into();
        self
    }

    /// Build the authorization redirect URL with the session token as `state`.
    ///
    /// `access_type=offline` + `prompt=consent` force Google to re-issue a
    /// refresh token even for previously authorized accounts.
    pub fn auth_url(&self, state: &str) -> String {
        format!(
            "{base}?access_type=offline\
             &prompt=consent\
             &response_type=code\
             &client_id={client_id}\
             &redirect_uri={redirect_uri}\
             &scope={scope}\
             &state={state}",
            base = self.auth_url,
            client_id = percent_encode(&self.client_id),
            redirect_uri = percent_encode(&self.redirect_uri),
            scope = percent_encode(SCOPES),
            state = percent_encode(state),
        )
    }

    /// Exchange an authorization code, then look up the account email.
    pub async fn exchange(&self, code: &str) -> anyhow::Result<GoogleCredential> {
        let resp = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("token exchange failed ({status}): {text}");
        }

        let token: TokenResponse = resp.json().await?;
        let Some(refresh_token) = token.refresh_token else {
            anyhow::bail!(
                "no refresh token returned; the consent screen must grant offline access"
            );
        };

        let resp = self
            .http
            .get(&self.userinfo_url)
            .bearer_auth(&token.access_token)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("userinfo lookup failed ({status}): {text}");
        }

        let user: UserInfo = resp.json().await?;
        Ok(GoogleCredential { email: user.email, refresh_token })
    }
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    email: String,
}
