use crate::app::ports::{PageRequest, RegistryClient, RegistryPage};
use crate::error::{OutreachError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::error;

/// reqwest-backed client for the registry `studies` endpoint.
pub struct HttpRegistryClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRegistryClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("trial_outreach/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    async fn fetch_page(&self, request: &PageRequest) -> Result<RegistryPage> {
        let params = request.query_params();
        let resp = self
            .client
            .get(&self.base_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| OutreachError::Registry {
                status: e.status().map(|s| s.as_u16()),
                params: request.describe(),
                body: e.to_string(),
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| OutreachError::Registry {
            status: Some(status.as_u16()),
            params: request.describe(),
            body: format!("failed to read response body: {e}"),
        })?;

        if !status.is_success() {
            error!("Registry API error {} for [{}]: {}", status, request.describe(), body);
            return Err(OutreachError::Registry {
                status: Some(status.as_u16()),
                params: request.describe(),
                body,
            });
        }

        let page: RegistryPage = serde_json::from_str(&body).map_err(|e| OutreachError::Registry {
            status: Some(status.as_u16()),
            params: request.describe(),
            body: format!("unparseable page ({e}): {body}"),
        })?;
        Ok(page)
    }
}
