//! HTTP transport for the share endpoint.

use crate::error::{SyncError, SyncResult};
use crate::protocol::{
    ShareCreateRequest, ShareCreateResponse, ShareDeleteRequest, ShareSyncRequest,
};
use crate::queue::REQUEST_TIMEOUT;
use crate::transport::ShareTransport;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// JSON-over-HTTP client for the share endpoint.
///
/// POSTs to `<base_url>/share_create`, `/share_sync`, and `/share_delete`.
/// Every request carries a 30-second timeout; slower responses fail with
/// [`SyncError::Timeout`].
#[derive(Debug, Clone)]
pub struct HttpShareClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpShareClient {
    /// Creates a client for the given base URL.
    pub fn new(base_url: impl Into<String>) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SyncError::transport(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_json<Req, Res>(&self, endpoint: &str, request: &Req) -> SyncResult<Res>
    where
        Req: Serialize + Sync,
        Res: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, endpoint);
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::RemoteStatus {
                status: status.as_u16(),
            });
        }

        response
            .json::<Res>()
            .await
            .map_err(|e| SyncError::protocol(e.to_string()))
    }

    async fn post_ack<Req>(&self, endpoint: &str, request: &Req) -> SyncResult<()>
    where
        Req: Serialize + Sync,
    {
        let url = format!("{}{}", self.base_url, endpoint);
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::RemoteStatus {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ShareTransport for HttpShareClient {
    async fn share_create(&self, request: &ShareCreateRequest) -> SyncResult<ShareCreateResponse> {
        self.post_json("/share_create", request).await
    }

    async fn share_sync(&self, request: &ShareSyncRequest) -> SyncResult<()> {
        self.post_ack("/share_sync", request).await
    }

    async fn share_delete(&self, request: &ShareDeleteRequest) -> SyncResult<()> {
        self.post_ack("/share_delete", request).await
    }
}

fn map_reqwest_error(e: reqwest::Error) -> SyncError {
    if e.is_timeout() {
        SyncError::Timeout {
            seconds: REQUEST_TIMEOUT.as_secs(),
        }
    } else {
        SyncError::transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let client = HttpShareClient::new("https://api.tandem.dev/").unwrap();
        assert_eq!(client.base_url(), "https://api.tandem.dev");
    }
}
