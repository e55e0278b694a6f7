use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::app::Result;
use crate::fetch::{FeedSource, RawFeed};

pub struct HttpFeedSource {
    client: Client,
}

impl HttpFeedSource {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .gzip(true)
            .brotli(true)
            .user_agent("freshet/0.1.0")
            .build()
            .expect("Failed to build HTTP client");

        Self { client }
    }
}

impl Default for HttpFeedSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn load(&self, url: &str) -> Result<RawFeed> {
        let response = self.client.get(url).send().await?;
        let response = response.error_for_status()?;

        // Redirects have been followed at this point; the response URL
        // is the one the document actually lives at.
        let final_url = response.url().to_string();
        let body = response.bytes().await?.to_vec();

        Ok(RawFeed { final_url, body })
    }
}
