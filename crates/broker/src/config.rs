// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

/// Configuration for the sheetbroker service.
///
/// Provider credentials and the service-account identity are required at
/// startup; clap refuses to start the process when any of them is absent.
#[derive(Debug, Clone, clap::Parser)]
pub struct BrokerConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "SHEETBROKER_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 3000, env = "PORT")]
    pub port: u16,

    /// Authorization session time-to-live in seconds.
    #[arg(long, default_value_t = 600, env = "SHEETBROKER_SESSION_TTL_SECS")]
    pub session_ttl_secs: u64,

    /// Google OAuth client ID.
    #[arg(long, env = "GOOGLE_CLIENT_ID")]
    pub google_client_id: String,

    /// Google OAuth client secret.
    #[arg(long, env = "GOOGLE_CLIENT_SECRET")]
    pub google_client_secret: String,

    /// Redirect URI registered for the Google OAuth client.
    #[arg(long, env = "REDIRECT_URI")]
    pub google_redirect_uri: String,

    /// Etsy application keystring (OAuth client ID).
    #[arg(long, env = "ETSY_KEYSTRING")]
    pub etsy_keystring: String,

    /// Redirect URI registered for the Etsy application.
    #[arg(long, env = "ETSY_REDIRECT_URI")]
    pub etsy_redirect_uri: String,

    /// Facebook application ID.
    #[arg(long, env = "FB_APP_ID")]
    pub fb_app_id: String,

    /// Facebook application secret.
    #[arg(long, env = "FB_APP_SECRET")]
    pub fb_app_secret: String,

    /// Redirect URI registered for the Facebook application.
    #[arg(long, env = "FB_REDIRECT_URI")]
    pub fb_redirect_uri: String,

    /// Graph API version segment, e.g. "v19.0".
    #[arg(long, default_value = "v19.0", env = "FB_API_VERSION")]
    pub fb_api_version: String,

    /// Service-account email used to write the target spreadsheets.
    #[arg(long, env = "GOOGLE_SERVICE_ACCOUNT_EMAIL")]
    pub service_account_email: String,

    /// PKCS#8 PEM private key for the service account. Literal "\n" escapes
    /// (as produced by single-line env files) are unescaped before parsing.
    #[arg(long, env = "GOOGLE_PRIVATE_KEY")]
    pub service_account_private_key: String,
}

impl BrokerConfig {
    pub fn session_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.session_ttl_secs)
    }
}
