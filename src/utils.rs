use crate::config::SiteConfig;
use crate::error::{JapscanError, Result};
use crate::traits::{HttpResponse, PageSource};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

const DEFAULT_USER_AGENT: &str = "japscan-downloader/0.1";

#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(config: &SiteConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(extra) = &config.headers {
            for (key, value) in extra {
                let name = HeaderName::from_bytes(key.as_bytes())
                    .map_err(|e| JapscanError::invalid_config(format!("header `{}`: {}", key, e)))?;
                let value = HeaderValue::from_str(value)
                    .map_err(|e| JapscanError::invalid_config(format!("header `{}`: {}", key, e)))?;
                headers.insert(name, value);
            }
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .cookie_store(true)
            .user_agent(config.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT))
            .default_headers(headers)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl PageSource for HttpClient {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();

        debug!("GET {} -> {} ({} bytes)", url, status, body.len());

        Ok(HttpResponse { status, body })
    }
}
