//! REST client for the remote table store.
//!
//! Requests go to `<base>/rest/v1/<table>` with the project key in the
//! `apikey` header and either the user's access token or the project key as
//! the bearer token.

use std::time::Duration;

use reqwest::{header, Client, Response};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use super::{ApiError, RemoteService};
use crate::config::Endpoint;
use crate::models::{Category, Expense, NewCategory, NewExpense};

// ============================================================================
// Constants
// ============================================================================

/// Path prefix of the table API.
const REST_PATH: &str = "rest/v1";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

const EXPENSES_TABLE: &str = "expenses";
const CATEGORIES_TABLE: &str = "categories";

/// Select clause joining each expense with its category row.
const EXPENSE_SELECT: &str = "*,category:categories(*)";

/// API client for the remote table store.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct RestClient {
    client: Client,
    base_url: String,
    anon_key: String,
    token: Option<String>,
}

impl RestClient {
    pub fn new(endpoint: &Endpoint) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: endpoint.url.trim_end_matches('/').to_string(),
            anon_key: endpoint.anon_key.clone(),
            token: None,
        })
    }

    /// Set the bearer token for authenticated requests
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    fn table_url(&self, table: &str) -> Result<String, ApiError> {
        if self.base_url.is_empty() {
            return Err(ApiError::NotConfigured);
        }
        Ok(format!("{}/{}/{}", self.base_url, REST_PATH, table))
    }

    fn eq(value: &str) -> String {
        format!("eq.{}", value)
    }

    fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let bearer = self.token.as_deref().unwrap_or(&self.anon_key);
        let mut headers = header::HeaderMap::new();
        headers.insert(
            "apikey",
            header::HeaderValue::from_str(&self.anon_key).map_err(|_| ApiError::NotConfigured)?,
        );
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", bearer))
                .map_err(|_| ApiError::NotConfigured)?,
        );
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, ApiError> {
        let url = self.table_url(table)?;
        let response = self
            .client
            .get(&url)
            .headers(self.auth_headers()?)
            .query(query)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let rows: Vec<T> = response.json().await?;
        debug!(table = table, rows = rows.len(), "Select completed");
        Ok(rows)
    }

    async fn insert<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        table: &str,
        query: &[(&str, String)],
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.table_url(table)?;
        let response = self
            .client
            .post(&url)
            .headers(self.auth_headers()?)
            .header("Prefer", "return=representation")
            .query(query)
            .json(body)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let mut rows: Vec<T> = response.json().await?;
        if rows.is_empty() {
            return Err(ApiError::InvalidResponse(format!(
                "Insert into {} returned no rows",
                table
            )));
        }
        Ok(rows.swap_remove(0))
    }

    async fn delete(&self, table: &str, query: &[(&str, String)]) -> Result<(), ApiError> {
        let url = self.table_url(table)?;
        let response = self
            .client
            .delete(&url)
            .headers(self.auth_headers()?)
            .query(query)
            .send()
            .await?;

        Self::check_response(response).await?;
        Ok(())
    }
}

/// Insert body: the form without an empty `created_at`, so the column
/// default applies.
#[derive(Serialize)]
struct ExpenseRow<'a> {
    title: &'a str,
    amount: f64,
    category_id: Option<&'a str>,
    date: &'a str,
    user_id: &'a str,
}

#[derive(Serialize)]
struct CategoryRow<'a> {
    name: &'a str,
    icon: &'a str,
    color: &'a str,
    user_id: &'a str,
}

impl RemoteService for RestClient {
    async fn fetch_expenses(&self, user_id: &str) -> Result<Vec<Expense>, ApiError> {
        self.select(
            EXPENSES_TABLE,
            &[
                ("select", EXPENSE_SELECT.to_string()),
                ("user_id", Self::eq(user_id)),
                ("order", "created_at.desc".to_string()),
            ],
        )
        .await
    }

    async fn fetch_categories(&self, user_id: &str) -> Result<Vec<Category>, ApiError> {
        self.select(
            CATEGORIES_TABLE,
            &[
                ("select", "*".to_string()),
                ("user_id", Self::eq(user_id)),
                ("order", "name".to_string()),
            ],
        )
        .await
    }

    async fn insert_expense(&self, expense: &NewExpense) -> Result<Expense, ApiError> {
        let row = ExpenseRow {
            title: expense.title.trim(),
            amount: expense.amount,
            category_id: expense.category_id.as_deref(),
            date: &expense.date,
            user_id: &expense.user_id,
        };
        self.insert(EXPENSES_TABLE, &[("select", EXPENSE_SELECT.to_string())], &row)
            .await
    }

    async fn insert_category(&self, category: &NewCategory) -> Result<Category, ApiError> {
        let row = CategoryRow {
            name: category.name.trim(),
            icon: &category.icon,
            color: &category.color,
            user_id: &category.user_id,
        };
        self.insert(CATEGORIES_TABLE, &[], &row).await
    }

    async fn delete_category(&self, user_id: &str, category_id: &str) -> Result<(), ApiError> {
        self.delete(
            CATEGORIES_TABLE,
            &[("id", Self::eq(category_id)), ("user_id", Self::eq(user_id))],
        )
        .await
    }
}
