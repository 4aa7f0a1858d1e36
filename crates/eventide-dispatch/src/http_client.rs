//! `reqwest`-backed `HttpPort`: the transport behind the WEBHOOK and HTTP action types.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method};
use tracing::instrument;

use eventide_core::error::{EventideError, Result};
use eventide_core::ports::HttpPort;

/// A pooled `reqwest::Client` with a fixed per-request timeout; `reqwest` already keeps
/// connections alive across calls, so one client is shared for the whole dispatcher rather
/// than rebuilt per request.
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EventideError::HttpError(format!("failed to build http client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpPort for ReqwestHttpClient {
    #[instrument(skip(self, headers, body_json), fields(method, url))]
    async fn request(
        &self,
        method: &str,
        url: &str,
        headers: &HashMap<String, String>,
        body_json: &[u8],
    ) -> Result<u16> {
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|e| EventideError::HttpError(format!("invalid method {method}: {e}")))?;

        let mut header_map = HeaderMap::new();
        header_map.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (key, value) in headers {
            let name = HeaderName::try_from(key.as_str())
                .map_err(|e| EventideError::HttpError(format!("invalid header name {key}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| EventideError::HttpError(format!("invalid header value for {key}: {e}")))?;
            header_map.insert(name, value);
        }

        let response = self
            .client
            .request(method, url)
            .headers(header_map)
            .body(body_json.to_vec())
            .send()
            .await
            .map_err(|e| EventideError::HttpError(e.to_string()))?;

        Ok(response.status().as_u16())
    }
}
