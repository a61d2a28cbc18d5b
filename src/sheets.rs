use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::auth::ServiceAccount;
use crate::error::SheetsError;

pub const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4";

pub const PARTICIPANTS_RANGE: &str = "Participants!A:A";
pub const PARTICIPANTS_START: &str = "Participants!A1";
pub const EXPENSES_HEADER_RANGE: &str = "Expenses!A1:E1";
pub const EXPENSES_DATA_RANGE: &str = "Expenses!A2:E";
pub const EXPENSES_APPEND_RANGE: &str = "Expenses!A:E";

const RAW_INPUT: &str = "RAW";
const USER_ENTERED_INPUT: &str = "USER_ENTERED";

// Refresh the cached token this long before it actually expires.
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

/// A range of cell values, as the values endpoints exchange them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValueRange {
    pub range: String,
    pub values: Vec<Vec<Value>>,
}

/// The spreadsheet operations the handlers need. The live implementation
/// talks to the Sheets v4 REST API; tests substitute an in-memory one.
#[async_trait]
pub trait SheetsApi: Send + Sync {
    /// Creates a spreadsheet with one tab per title and returns its id.
    async fn create_spreadsheet(
        &self,
        title: &str,
        sheet_titles: &[&str],
    ) -> Result<String, SheetsError>;

    /// Writes several ranges at once with RAW input.
    async fn batch_update_values(
        &self,
        spreadsheet_id: &str,
        data: Vec<ValueRange>,
    ) -> Result<(), SheetsError>;

    /// Reads a range; an empty range yields an empty vec, not an error.
    async fn get_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<Vec<Vec<Value>>, SheetsError>;

    /// Appends one row after the last data row of the range, with
    /// USER_ENTERED input so numeric strings become numbers.
    async fn append_row(
        &self,
        spreadsheet_id: &str,
        range: &str,
        row: Vec<Value>,
    ) -> Result<(), SheetsError>;
}

struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

pub struct SheetsClient {
    http: Client,
    base_url: String,
    account: ServiceAccount,
    token: Mutex<Option<CachedToken>>,
}

impl SheetsClient {
    pub fn new(account: ServiceAccount) -> Self {
        Self::with_base_url(account, SHEETS_BASE_URL)
    }

    pub fn with_base_url(account: ServiceAccount, base_url: impl Into<String>) -> Self {
        SheetsClient {
            http: Client::new(),
            base_url: base_url.into(),
            account,
            token: Mutex::new(None),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Returns the cached bearer token, fetching a fresh one when absent or
    /// close to expiry. Two concurrent refreshes may both hit the token
    /// endpoint; the last one wins, which is harmless.
    async fn bearer_token(&self) -> Result<String, SheetsError> {
        {
            let cached = self.token.lock().unwrap();
            if let Some(token) = cached.as_ref() {
                if token.expires_at > Utc::now() {
                    return Ok(token.value.clone());
                }
            }
        }
        let fresh = self.account.fetch_access_token(&self.http).await?;
        let lifetime = fresh.expires_in as i64 - TOKEN_EXPIRY_MARGIN_SECS;
        let expires_at = Utc::now() + Duration::seconds(lifetime.max(0));
        debug!("fetched new sheets access token");
        let mut cached = self.token.lock().unwrap();
        *cached = Some(CachedToken {
            value: fresh.access_token.clone(),
            expires_at,
        });
        Ok(fresh.access_token)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, SheetsError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(SheetsError::Api { status, body })
    }
}

#[derive(Serialize)]
struct TabProperties<'a> {
    title: &'a str,
}

#[derive(Serialize)]
struct Tab<'a> {
    properties: TabProperties<'a>,
}

#[derive(Serialize)]
struct CreateSpreadsheetBody<'a> {
    properties: TabProperties<'a>,
    sheets: Vec<Tab<'a>>,
}

impl<'a> CreateSpreadsheetBody<'a> {
    fn new(title: &'a str, sheet_titles: &'a [&'a str]) -> Self {
        CreateSpreadsheetBody {
            properties: TabProperties { title },
            sheets: sheet_titles
                .iter()
                .map(|title| Tab {
                    properties: TabProperties { title },
                })
                .collect(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSpreadsheetResponse {
    spreadsheet_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchUpdateBody {
    value_input_option: &'static str,
    data: Vec<ValueRange>,
}

#[derive(Deserialize)]
struct ValuesResponse {
    values: Option<Vec<Vec<Value>>>,
}

#[async_trait]
impl SheetsApi for SheetsClient {
    async fn create_spreadsheet(
        &self,
        title: &str,
        sheet_titles: &[&str],
    ) -> Result<String, SheetsError> {
        let token = self.bearer_token().await?;
        let body = CreateSpreadsheetBody::new(title, sheet_titles);
        let response = self
            .http
            .post(self.url("spreadsheets"))
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;
        let created: CreateSpreadsheetResponse = Self::check(response).await?.json().await?;
        debug!(spreadsheet_id = %created.spreadsheet_id, "created spreadsheet");
        Ok(created.spreadsheet_id)
    }

    async fn batch_update_values(
        &self,
        spreadsheet_id: &str,
        data: Vec<ValueRange>,
    ) -> Result<(), SheetsError> {
        let token = self.bearer_token().await?;
        let body = BatchUpdateBody {
            value_input_option: RAW_INPUT,
            data,
        };
        let response = self
            .http
            .post(self.url(&format!("spreadsheets/{spreadsheet_id}/values:batchUpdate")))
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn get_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<Vec<Vec<Value>>, SheetsError> {
        let token = self.bearer_token().await?;
        let response = self
            .http
            .get(self.url(&format!("spreadsheets/{spreadsheet_id}/values/{range}")))
            .bearer_auth(&token)
            .send()
            .await?;
        let values: ValuesResponse = Self::check(response).await?.json().await?;
        Ok(values.values.unwrap_or_default())
    }

    async fn append_row(
        &self,
        spreadsheet_id: &str,
        range: &str,
        row: Vec<Value>,
    ) -> Result<(), SheetsError> {
        let token = self.bearer_token().await?;
        let body = ValueRange {
            range: range.to_owned(),
            values: vec![row],
        };
        let response = self
            .http
            .post(self.url(&format!("spreadsheets/{spreadsheet_id}/values/{range}:append")))
            .query(&[("valueInputOption", USER_ENTERED_INPUT)])
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
