// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for the broker API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrokerError {
    /// Missing or malformed client input (begin parameters, callback query).
    BadRequest,
    /// Unknown, expired, or already-consumed session token.
    SessionNotFound,
    /// Provider token exchange or identity lookup failed.
    ProviderError,
    /// Credential could not be written to the target spreadsheet.
    PersistError,
    Internal,
}

impl BrokerError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::SessionNotFound => 400,
            Self::ProviderError => 502,
            Self::PersistError => 502,
            Self::Internal => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadRequest => "BAD_REQUEST",
            Self::SessionNotFound => "SESSION_NOT_FOUND",
            Self::ProviderError => "PROVIDER_ERROR",
            Self::PersistError => "PERSIST_ERROR",
            Self::Internal => "INTERNAL",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn to_error_body(&self, message: impl Into<String>) -> ErrorBody {
        ErrorBody { code: self.as_str().to_owned(), message: message.into() }
    }

    /// JSON error envelope, used by the begin endpoints.
    pub fn to_http_response(
        &self,
        message: impl Into<String>,
    ) -> (StatusCode, Json<ErrorResponse>) {
        let body = ErrorResponse { error: self.to_error_body(message) };
        (self.status_code(), Json(body))
    }

    /// Plain-text response, used by the browser-facing callback endpoints.
    pub fn to_text_response(&self, message: impl Into<String>) -> (StatusCode, String) {
        (self.status_code(), message.into())
    }
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error body with machine-readable code and human-readable message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}
