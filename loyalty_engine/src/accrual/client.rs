use std::time::Duration;

use log::*;
use reqwest::{header::RETRY_AFTER, Client, StatusCode};

use crate::{
    accrual::{AccrualClientError, AccrualOracle, AccrualResponse},
    db_types::OrderNumber,
};

/// HTTP client for the accrual system's `GET /api/orders/{number}` endpoint.
#[derive(Debug, Clone)]
pub struct AccrualClient {
    base_url: String,
    client: Client,
}

impl AccrualClient {
    /// Creates a new client. Every request made by the client is bounded by `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AccrualClientError> {
        let client =
            Client::builder().timeout(timeout).build().map_err(|e| AccrualClientError::Initialization(e.to_string()))?;
        let base_url = normalise_base_url(base_url);
        info!("🧮️ Accrual client configured for {base_url} with a {}ms timeout", timeout.as_millis());
        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    pub fn url(&self, number: &OrderNumber) -> String {
        format!("{}/api/orders/{}", self.base_url, number.as_str())
    }
}

impl AccrualOracle for AccrualClient {
    async fn fetch_accrual(&self, number: &OrderNumber) -> Result<Option<AccrualResponse>, AccrualClientError> {
        let url = self.url(number);
        trace!("🧮️ GET {url}");
        let response = self.client.get(url).send().await?;
        match response.status() {
            StatusCode::OK => {
                let body = response.bytes().await?;
                let accrual = serde_json::from_slice::<AccrualResponse>(&body)
                    .map_err(|e| AccrualClientError::MalformedResponse(e.to_string()))?;
                trace!("🧮️ Accrual system reports {} for order {number}", accrual.status);
                Ok(Some(accrual))
            },
            StatusCode::NO_CONTENT => {
                trace!("🧮️ Order {number} is not registered with the accrual system");
                Ok(None)
            },
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .map(Duration::from_secs);
                warn!("🧮️ The accrual system is throttling requests. Retry after: {retry_after:?}");
                Err(AccrualClientError::TooManyRequests { retry_after })
            },
            StatusCode::INTERNAL_SERVER_ERROR => Err(AccrualClientError::OracleInternalError),
            status => Err(AccrualClientError::UnexpectedStatus(status.as_u16())),
        }
    }
}

/// Prefixes `http://` when the address carries no scheme, and drops trailing slashes.
pub fn normalise_base_url(base_url: &str) -> String {
    let base_url = base_url.trim();
    let url = if base_url.contains("://") { base_url.to_string() } else { format!("http://{base_url}") };
    url.trim_end_matches('/').to_string()
}
