//! HTTP client for the UK Parliament petitions data feed.
//!
//! One GET with a bounded timeout; shape validation and field coercion are
//! delegated to the core loader. A failed fetch never disturbs a previously
//! loaded table, because the caller keeps its own snapshot.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use petiq_core::{LoadError, LoadOutcome, load_table};

/// Google Apps Script export of the petition dataset.
pub const DEFAULT_ENDPOINT: &str = "https://script.googleusercontent.com/macros/echo?user_content_key=AehSKLjpBMhTA3z5r9d4tIE8bXH8_yoJx1JXDdPFBLY1Y1ZMzFpcE_5QrMptlGIyxwTvKepnxf_q9zS6XES-Micm_xN263CdIXLeyqV6k1uh0yjVkRfCzw7AU3r_KVgHtIvhNuMSxc71QP1omNFoAgUN1g11mlSbRbdzsGScYJ-tItwbMz4XvhggUheeqiDsLKUSgAsa8KjorD83Guv978RzoGghWJ1xr67KrySu4vgLfsNCF7jvhFOA_fR62WlQVUqCO3V0uh0xRYGoZFpqS1liFzuqsi2K9w&lib=Mnv4iSODQPAVnoyklcKaVOSTmmKHkEHEC";

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("data endpoint returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("response body is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Table(#[from] LoadError),
}

/// HTTP client for the petition data endpoint.
pub struct FetchClient {
    client: reqwest::Client,
    endpoint: String,
}

impl FetchClient {
    /// Create a client for the given endpoint URL. Redirects are followed
    /// (the Apps Script export bounces through one).
    pub fn new(endpoint: impl Into<String>) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fetch and coerce the petition table.
    ///
    /// Every record in the payload survives the load; field-level problems
    /// surface as coercion warnings on the outcome (and one `warn` event
    /// each), not as errors.
    pub async fn fetch_petitions(&self) -> Result<LoadOutcome, FetchError> {
        info!(url = %self.endpoint, "fetching petition data");
        let resp = self.client.get(&self.endpoint).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.text().await?;
        let payload: Value = serde_json::from_str(&body)?;
        let outcome = load_table(&payload)?;

        for warning in &outcome.warnings {
            warn!(row = warning.row, raw = %warning.raw, "coerced invalid signature count to 0");
        }
        info!(
            count = outcome.table.len(),
            warnings = outcome.warnings.len(),
            "loaded petition table"
        );
        Ok(outcome)
    }
}
