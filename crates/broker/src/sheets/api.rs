// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sheets v4 REST implementation of [`SheetsBackend`].

use async_trait::async_trait;
use serde_json::Value;

use crate::provider::percent_encode;
use crate::sheets::auth::SaTokenSource;
use crate::sheets::{SheetInfo, SheetsBackend};

const API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

pub struct SheetsApi {
    http: reqwest::Client,
    base: String,
    tokens: SaTokenSource,
}

impl SheetsApi {
    pub fn new(http: reqwest::Client, tokens: SaTokenSource) -> Self {
        Self { http, base: API_BASE.to_owned(), tokens }
    }

    /// Override the API base URL (test servers).
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = base.into();
        self
    }

    async fn batch_update(&self, spreadsheet_id: &str, requests: Value) -> anyhow::Result<Value> {
        let token = self.tokens.access_token().await?;
        let url = format!("{}/{}:batchUpdate", self.base, spreadsheet_id);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&serde_json::json!({ "requests": requests }))
            .send()
            .await?;
        check(resp, "batchUpdate").await
    }
}

#[async_trait]
impl SheetsBackend for SheetsApi {
    async fn list_sheets(&self, spreadsheet_id: &str) -> anyhow::Result<Vec<SheetInfo>> {
        let token = self.tokens.access_token().await?;
        let url = format!("{}/{}?fields=sheets.properties", self.base, spreadsheet_id);
        let resp = self.http.get(&url).bearer_auth(token).send().await?;
        let body = check(resp, "get spreadsheet").await?;

        let mut out = Vec::new();
        if let Some(sheets) = body.get("sheets").and_then(Value::as_array) {
            for sheet in sheets {
                let Some(props) = sheet.get("properties") else { continue };
                out.push(SheetInfo {
                    sheet_id: props.get("sheetId").and_then(Value::as_i64).unwrap_or_default(),
                    title: props
                        .get("title")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_owned(),
                    hidden: props.get("hidden").and_then(Value::as_bool).unwrap_or(false),
                });
            }
        }
        Ok(out)
    }

    async fn add_sheet(&self, spreadsheet_id: &str, title: &str) -> anyhow::Result<i64> {
        let body = self
            .batch_update(
                spreadsheet_id,
                serde_json::json!([{ "addSheet": { "properties": { "title": title } } }]),
            )
            .await?;
        body.pointer("/replies/0/addSheet/properties/sheetId")
            .and_then(Value::as_i64)
            .ok_or_else(|| anyhow::anyhow!("addSheet reply missing sheetId"))
    }

    async fn read_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> anyhow::Result<Vec<Vec<String>>> {
        let token = self.tokens.access_token().await?;
        let url = format!("{}/{}/values/{}", self.base, spreadsheet_id, percent_encode(range));
        let resp = self.http.get(&url).bearer_auth(token).send().await?;
        let body = check(resp, "read range").await?;

        let rows = body
            .get("values")
            .and_then(Value::as_array)
            .map(|rows| rows.iter().map(row_to_strings).collect())
            .unwrap_or_default();
        Ok(rows)
    }

    async fn append_row(
        &self,
        spreadsheet_id: &str,
        range: &str,
        row: &[String],
    ) -> anyhow::Result<()> {
        let token = self.tokens.access_token().await?;
        let url = format!(
            "{}/{}/values/{}:append?valueInputOption=USER_ENTERED",
            self.base,
            spreadsheet_id,
            percent_encode(range),
        );
        let resp = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&serde_json::json!({ "values": [row] }))
            .send()
            .await?;
        check(resp, "append row").await?;
        Ok(())
    }

    async fn update_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
        row: &[String],
    ) -> anyhow::Result<()> {
        let token = self.tokens.access_token().await?;
        let url = format!(
            "{}/{}/values/{}?valueInputOption=USER_ENTERED",
            self.base,
            spreadsheet_id,
            percent_encode(range),
        );
        let resp = self
            .http
            .put(&url)
            .bearer_auth(token)
            .json(&serde_json::json!({ "values": [row] }))
            .send()
            .await?;
        check(resp, "update range").await?;
        Ok(())
    }

    async fn set_hidden(
        &self,
        spreadsheet_id: &str,
        sheet_id: i64,
        hidden: bool,
    ) -> anyhow::Result<()> {
        self.batch_update(
            spreadsheet_id,
            serde_json::json!([{
                "updateSheetProperties": {
                    "properties": { "sheetId": sheet_id, "hidden": hidden },
                    "fields": "hidden",
                }
            }]),
        )
        .await?;
        Ok(())
    }
}

/// Convert one row of the API's typed cell values to strings.
fn row_to_strings(row: &Value) -> Vec<String> {
    row.as_array()
        .map(|cells| {
            cells
                .iter()
                .map(|cell| match cell {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Fail on non-2xx with the response text, else parse the JSON body.
async fn check(resp: reqwest::Response, what: &str) -> anyhow::Result<Value> {
    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        anyhow::bail!("{what} failed ({status}): {text}");
    }
    if resp.content_length() == Some(0) {
        return Ok(Value::Null);
    }
    let body = resp.json().await?;
    Ok(body)
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
