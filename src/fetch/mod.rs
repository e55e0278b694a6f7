pub mod http_source;

use async_trait::async_trait;

use crate::app::Result;

pub use http_source::HttpFeedSource;

/// A fetched feed document, together with the URL the server finally
/// answered on after redirects. That final URL is the canonical feed key.
#[derive(Debug, Clone)]
pub struct RawFeed {
    pub final_url: String,
    pub body: Vec<u8>,
}

#[async_trait]
pub trait FeedSource {
    async fn load(&self, url: &str) -> Result<RawFeed>;
}
