use std::{fmt, time::Duration};

use bridge_relay_types::RelayPayload;
use reqwest::{Client, IntoUrl, RequestBuilder, Response, Url};

use crate::Error;

/// Header carrying the relay endpoint API key.
pub const API_KEY_HEADER: &str = "X-API-KEY";

/// Default timeout for a single relay request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the destination relay endpoint.
///
/// Posts [`RelayPayload`]s as JSON, authenticated with an API key header.
#[derive(Clone)]
pub struct RelayClient {
    endpoint: Url,
    api_key: String,
    timeout: Duration,
    client: Client,
}

impl fmt::Debug for RelayClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl RelayClient {
    /// Creates a new client posting to `endpoint`.
    pub fn new(endpoint: impl IntoUrl, api_key: impl Into<String>) -> Result<Self, Error> {
        Self::with_client(endpoint, api_key, Client::new())
    }

    /// Creates a new client with a custom [`reqwest::Client`].
    pub fn with_client(
        endpoint: impl IntoUrl,
        api_key: impl Into<String>,
        client: Client,
    ) -> Result<Self, Error> {
        Ok(Self {
            endpoint: endpoint.into_url()?,
            api_key: api_key.into(),
            timeout: DEFAULT_TIMEOUT,
            client,
        })
    }

    /// Sets the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the relay endpoint URL.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Posts `payload` to the relay endpoint.
    ///
    /// Returns the response body on a `2xx` status. The deposit counts as accepted once the
    /// status is received, so a body that fails to read yields an empty string.
    pub async fn relay(&self, payload: &RelayPayload) -> Result<String, Error> {
        let res = send(
            self.client
                .post(self.endpoint.clone())
                .header(API_KEY_HEADER, &self.api_key)
                .timeout(self.timeout)
                .json(payload),
        )
        .await?;
        Ok(res.text().await.unwrap_or_default())
    }
}

/// Sends an HTTP request and handles error status codes.
pub(crate) async fn send(request: RequestBuilder) -> Result<Response, Error> {
    let res = request.send().await?;

    let status = res.status();
    if !status.is_success() {
        let msg = res.text().await.ok().filter(|msg| !msg.is_empty());
        return Err(Error::ErrorStatus { status, msg });
    }

    Ok(res)
}
