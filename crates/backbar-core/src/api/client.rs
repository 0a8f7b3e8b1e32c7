//! API client for the pantry REST endpoints.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::auth::Session;
use crate::models::{NewPantryItem, PantryItem, PantryQuantityUpdate};

use super::{ApiError, PantryApi};

// ============================================================================
// Constants
// ============================================================================

/// Pantry collection path, relative to the API base URL
const PANTRY_PATH: &str = "/users/me/pantry";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// API client for the pantry service.
/// Clone is cheap - reqwest::Client and Session are both shared handles.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: Session,
}

impl ApiClient {
    pub fn new(base_url: &str, session: Session) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn pantry_url(&self) -> String {
        format!("{}{}", self.base_url, PANTRY_PATH)
    }

    fn pantry_item_url(&self, id: i64) -> String {
        format!("{}{}/{}", self.base_url, PANTRY_PATH, id)
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(response: Response) -> Result<Option<Response>, ApiError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Send an authenticated request, backing off on 429.
    /// `build` is called once per attempt since a RequestBuilder is consumed by send.
    async fn execute<F>(&self, build: F) -> Result<Response, ApiError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let token = self.session.token().ok_or(ApiError::Unauthenticated)?;
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = build(&self.client)
                .bearer_auth(&token)
                .header(header::ACCEPT, "application/json")
                .send()
                .await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2; // Exponential backoff
                }
            }
        }
    }

    async fn parse_json<T: DeserializeOwned>(response: Response, what: &str) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse {}: {}", what, e)))
    }
}

#[async_trait]
impl PantryApi for ApiClient {
    async fn list_pantry(&self) -> Result<Vec<PantryItem>, ApiError> {
        let url = self.pantry_url();
        let response = self.execute(|c| c.get(&url)).await?;
        let items: Vec<PantryItem> = Self::parse_json(response, "pantry list").await?;
        debug!(count = items.len(), "Fetched pantry");
        Ok(items)
    }

    async fn create_pantry_item(&self, name: &str, quantity: f64) -> Result<PantryItem, ApiError> {
        let url = self.pantry_url();
        let body = NewPantryItem {
            ingredient_name: name.to_string(),
            quantity,
        };
        let response = self.execute(|c| c.post(&url).json(&body)).await?;
        let item: PantryItem = Self::parse_json(response, "created pantry item").await?;
        debug!(id = item.id, name = %item.ingredient_name, "Created pantry item");
        Ok(item)
    }

    async fn update_pantry_item(&self, id: i64, quantity: f64) -> Result<(), ApiError> {
        let url = self.pantry_item_url(id);
        let body = PantryQuantityUpdate { quantity };
        self.execute(|c| c.put(&url).json(&body)).await?;
        debug!(id, quantity, "Updated pantry item");
        Ok(())
    }

    async fn delete_pantry_item(&self, id: i64) -> Result<(), ApiError> {
        let url = self.pantry_item_url(id);
        self.execute(|c| c.delete(&url)).await?;
        debug!(id, "Deleted pantry item");
        Ok(())
    }
}
