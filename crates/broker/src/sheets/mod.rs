// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spreadsheet persistence: backend trait, Sheets v4 REST client, and the
//! credential upsert engine.

pub mod api;
pub mod auth;
pub mod upsert;

pub use api::SheetsApi;

use async_trait::async_trait;

/// Properties of one sheet (tab) within a spreadsheet.
#[derive(Debug, Clone)]
pub struct SheetInfo {
    pub sheet_id: i64,
    pub title: String,
    pub hidden: bool,
}

/// Row/range operations on a spreadsheet backend.
///
/// Cell values cross this boundary as strings: spreadsheet cells are typed
/// inconsistently and all key matching is string-normalized anyway.
#[async_trait]
pub trait SheetsBackend: Send + Sync {
    async fn list_sheets(&self, spreadsheet_id: &str) -> anyhow::Result<Vec<SheetInfo>>;

    /// Create a sheet with the given title, returning its numeric id.
    async fn add_sheet(&self, spreadsheet_id: &str, title: &str) -> anyhow::Result<i64>;

    /// Read all populated rows in an A1-notation range.
    async fn read_range(&self, spreadsheet_id: &str, range: &str) -> anyhow::Result<Vec<Vec<String>>>;

    /// Append a row after the last occupied row of the range's table.
    async fn append_row(&self, spreadsheet_id: &str, range: &str, row: &[String])
        -> anyhow::Result<()>;

    /// Overwrite exactly the given range with a single row.
    async fn update_range(&self, spreadsheet_id: &str, range: &str, row: &[String])
        -> anyhow::Result<()>;

    /// Toggle a sheet's visibility.
    async fn set_hidden(&self, spreadsheet_id: &str, sheet_id: i64, hidden: bool)
        -> anyhow::Result<()>;
}
