// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential upsert engine.
//!
//! Given a target spreadsheet and a per-provider plan, ensures the sheet
//! exists with its header row, then updates the row matching the business
//! key or appends a new one. The read-then-write is not isolated against a
//! concurrent upsert of the same key; callers accept that two simultaneous
//! authorizations for one key can race (expected write frequency per key is
//! very low).

use chrono::{SecondsFormat, Utc};

use crate::provider::facebook::FacebookCredential;
use crate::provider::google::GoogleCredential;
use crate::provider::TokenResponse;
use crate::sheets::SheetsBackend;

/// One reconciliation of a credential into a sheet row.
#[derive(Debug, Clone)]
pub struct UpsertPlan {
    pub sheet_name: &'static str,
    /// Ordered column names, written once when the sheet is created.
    pub header: &'static [&'static str],
    /// Column holding the business key; `None` means a single-record schema
    /// that always targets the row right after the header.
    pub key_column: Option<usize>,
    pub key: Option<String>,
    /// Columns whose previously stored value survives an empty new value
    /// (e.g. a refresh token the provider omitted on re-authorization).
    pub preserve_if_empty: &'static [usize],
    pub row: Vec<String>,
    /// Hide the sheet from normal view after writing. Best-effort.
    pub hide_after_write: bool,
}

impl UpsertPlan {
    /// Google: one row per account email in `gg_refresh_token`, hidden.
    pub fn google(cred: &GoogleCredential) -> Self {
        Self {
            sheet_name: "gg_refresh_token",
            header: &["Timestamp", "User Email", "Refresh Token"],
            key_column: Some(1),
            key: Some(cred.email.clone()),
            preserve_if_empty: &[],
            row: vec![rfc3339_now(), cred.email.clone(), cred.refresh_token.clone()],
            hide_after_write: true,
        }
    }

    /// Etsy: one row per shop id in `Etsy_Tokens`; a missing refresh token
    /// on re-authorization keeps the stored one.
    pub fn etsy(shop_id: &str, shop_name: &str, token: &TokenResponse) -> Self {
        Self {
            sheet_name: "Etsy_Tokens",
            header: &[
                "Shop ID",
                "Name",
                "Access Token",
                "Refresh Token",
                "Expires In",
                "Created At Timestamp",
            ],
            key_column: Some(0),
            key: Some(shop_id.to_owned()),
            preserve_if_empty: &[3],
            row: vec![
                shop_id.to_owned(),
                shop_name.to_owned(),
                token.access_token.clone(),
                token.refresh_token.clone().unwrap_or_default(),
                token.expires_in.to_string(),
                Utc::now().timestamp_millis().to_string(),
            ],
            hide_after_write: false,
        }
    }

    /// Facebook: one row per user id in `Facebook_Tokens`.
    pub fn facebook(cred: &FacebookCredential) -> Self {
        Self {
            sheet_name: "Facebook_Tokens",
            header: &[
                "User ID",
                "Name",
                "Access Token (Long-Lived)",
                "Expires In (Seconds)",
                "Updated At",
            ],
            key_column: Some(0),
            key: Some(cred.user_id.clone()),
            preserve_if_empty: &[],
            row: vec![
                cred.user_id.clone(),
                cred.name.clone(),
                cred.access_token.clone(),
                cred.expires_in.to_string(),
                rfc3339_now(),
            ],
            hide_after_write: false,
        }
    }
}

/// Reconcile a credential row into the target spreadsheet.
pub async fn upsert(
    backend: &dyn SheetsBackend,
    spreadsheet_id: &str,
    plan: UpsertPlan,
) -> anyhow::Result<()> {
    let sheets = backend.list_sheets(spreadsheet_id).await?;
    let existing = sheets.iter().find(|s| s.title == plan.sheet_name);

    // Header is written exactly once, when the sheet is first created.
    let (sheet_id, already_hidden) = match existing {
        Some(s) => (s.sheet_id, s.hidden),
        None => {
            tracing::info!(sheet = plan.sheet_name, "creating sheet");
            let sheet_id = backend.add_sheet(spreadsheet_id, plan.sheet_name).await?;
            let header: Vec<String> = plan.header.iter().map(|h| (*h).to_owned()).collect();
            backend
                .append_row(spreadsheet_id, &format!("{}!A1", plan.sheet_name), &header)
                .await?;
            (sheet_id, false)
        }
    };

    let last_col = column_letter(plan.header.len().saturating_sub(1));
    let read_range = format!("{}!A:{}", plan.sheet_name, last_col);

    // Locate the target row: first key match below the header, scanned
    // top-to-bottom; or row 2 for single-record schemas.
    let target: Option<(usize, Vec<String>)> = match (&plan.key_column, &plan.key) {
        (Some(key_column), Some(key)) => {
            let rows = backend.read_range(spreadsheet_id, &read_range).await?;
            rows.iter()
                .enumerate()
                .skip(1)
                .find(|(_, row)| {
                    row.get(*key_column).is_some_and(|cell| cell.trim() == key.trim())
                })
                .map(|(index, row)| (index + 1, row.clone()))
        }
        _ => {
            let rows = backend.read_range(spreadsheet_id, &read_range).await?;
            Some((2, rows.get(1).cloned().unwrap_or_default()))
        }
    };

    match target {
        Some((sheet_row, old_row)) => {
            let mut row = plan.row.clone();
            for &column in plan.preserve_if_empty {
                let is_empty = row.get(column).is_none_or(|v| v.is_empty());
                if is_empty {
                    if let Some(old) = old_row.get(column) {
                        if let Some(cell) = row.get_mut(column) {
                            cell.clone_from(old);
                        }
                    }
                }
            }
            let range = format!("{}!A{sheet_row}:{last_col}{sheet_row}", plan.sheet_name);
            backend.update_range(spreadsheet_id, &range, &row).await?;
            tracing::info!(sheet = plan.sheet_name, row = sheet_row, "updated credential row");
        }
        None => {
            backend
                .append_row(spreadsheet_id, &format!("{}!A1", plan.sheet_name), &plan.row)
                .await?;
            tracing::info!(sheet = plan.sheet_name, "appended credential row");
        }
    }

    // Cosmetic post-step: never fails the overall write.
    if plan.hide_after_write && !already_hidden {
        if let Err(e) = backend.set_hidden(spreadsheet_id, sheet_id, true).await {
            tracing::warn!(sheet = plan.sheet_name, err = %e, "failed to hide sheet");
        }
    }

    Ok(())
}

fn rfc3339_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Column letter for a zero-based index. Schemas here never exceed 26 columns.
fn column_letter(index: usize) -> char {
    char::from(b'A' + (index % 26) as u8)
}

#[cfg(test)]
#[path = "upsert_tests.rs"]
mod tests;
