//! HTTP implementation of the remote cart client.

use std::time::Duration;

use async_trait::async_trait;
use common::{CartId, Currency, TripId};
use reqwest::{Client, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::error::SelectionError;
use crate::manifest::PassengerRecord;
use crate::services::cart::{AddTripResponse, CartClient, RemoteCart};

/// Upstream error codes that mean the cart reference is stale.
pub const CART_INVALID_CODES: [&str; 3] = ["CART_NOT_FOUND", "CART_EXPIRED", "INVALID_CART"];

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct CreateCartBody<'a> {
    currency: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AddTripBody<'a> {
    trip_id: &'a TripId,
    passengers: &'a [PassengerRecord],
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Cart client talking JSON over HTTP to the booking backend.
///
/// Performs no retries; the orchestrator decides what is worth retrying.
#[derive(Debug, Clone)]
pub struct HttpCartClient {
    client: Client,
    base_url: Url,
}

impl HttpCartClient {
    /// Creates a client for `base_url` with the default timeout.
    pub fn new(base_url: impl Into<String>) -> Result<Self, SelectionError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Creates a client for `base_url` with a per-request timeout.
    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SelectionError> {
        let base_url = base_url.into();
        let parsed = Url::parse(base_url.trim_end_matches('/'))
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| {
                SelectionError::UpstreamUnavailable(format!("invalid cart API URL {base_url}"))
            })?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: parsed,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Appends `segments` to the base path, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> Result<Url, SelectionError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                SelectionError::UpstreamUnavailable(format!(
                    "cart API URL {} cannot take a path",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// Turns a non-success response into the matching selection error.
async fn classify_failure(response: Response, cart_id: Option<&CartId>) -> SelectionError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorEnvelope>(&body)
        .ok()
        .map(|e| e.error);

    let codes: Vec<&str> = detail
        .as_ref()
        .map(|d| [d.code.as_deref(), d.kind.as_deref()])
        .into_iter()
        .flatten()
        .flatten()
        .collect();
    // A coded body decides on its own; bare 404/410 only count without one.
    let invalid = if codes.is_empty() {
        status == StatusCode::NOT_FOUND || status == StatusCode::GONE
    } else {
        codes.iter().any(|c| CART_INVALID_CODES.contains(c))
    };
    let message = detail
        .and_then(|d| d.message.or(d.code))
        .unwrap_or_else(|| body.chars().take(200).collect());

    match cart_id {
        Some(cart_id) if invalid => {
            SelectionError::UpstreamCartInvalid {
                cart_id: cart_id.clone(),
                reason: format!("{status}: {message}"),
            }
        }
        _ => SelectionError::UpstreamUnavailable(format!("{status}: {message}")),
    }
}

#[async_trait]
impl CartClient for HttpCartClient {
    #[tracing::instrument(skip(self))]
    async fn create_cart(&self, currency: &Currency) -> Result<RemoteCart, SelectionError> {
        let response = self
            .client
            .post(self.url(&["carts"])?)
            .json(&CreateCartBody {
                currency: currency.code(),
            })
            .send()
            .await?;

        tracing::debug!(status = %response.status(), "create cart response");
        if !response.status().is_success() {
            return Err(classify_failure(response, None).await);
        }
        Ok(response.json().await?)
    }

    #[tracing::instrument(skip(self))]
    async fn get_cart(
        &self,
        cart_id: &CartId,
        locale: &str,
        currency: &Currency,
    ) -> Result<RemoteCart, SelectionError> {
        let response = self
            .client
            .get(self.url(&["carts", cart_id.as_str()])?)
            .query(&[("locale", locale), ("currency", currency.code())])
            .send()
            .await?;

        tracing::debug!(status = %response.status(), "get cart response");
        if !response.status().is_success() {
            // A failed consistency read is never a reason to recover.
            return Err(match classify_failure(response, None).await {
                err @ SelectionError::UpstreamUnavailable(_) => err,
                other => SelectionError::UpstreamUnavailable(other.to_string()),
            });
        }
        Ok(response.json().await?)
    }

    #[tracing::instrument(skip(self, passengers), fields(passengers = passengers.len()))]
    async fn add_trip(
        &self,
        cart_id: &CartId,
        trip_id: &TripId,
        passengers: &[PassengerRecord],
    ) -> Result<AddTripResponse, SelectionError> {
        let response = self
            .client
            .post(self.url(&["carts", cart_id.as_str(), "trips"])?)
            .json(&AddTripBody {
                trip_id,
                passengers,
            })
            .send()
            .await?;

        tracing::debug!(status = %response.status(), "add trip response");
        if !response.status().is_success() {
            return Err(classify_failure(response, Some(cart_id)).await);
        }
        Ok(response.json().await?)
    }
}
