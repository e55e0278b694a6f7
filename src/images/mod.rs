//! Image downloading and inlining.
//!
//! Item and feed images are fetched once and stored as `data:` URIs so
//! the API can serve results without holding onto remote URLs. Failures
//! always degrade to "no image".

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::debug;

use crate::app::Result;

pub const CACHE_CAPACITY: usize = 1000;

const EXTENSION_TYPES: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("svg", "image/svg+xml"),
    ("bmp", "image/bmp"),
    ("ico", "image/x-icon"),
];

/// Infer a content type from the URL's file extension.
pub fn extension_content_type(url: &str) -> Option<&'static str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let (_, ext) = path.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    EXTENSION_TYPES
        .iter()
        .find(|(candidate, _)| *candidate == ext)
        .map(|(_, content_type)| *content_type)
}

#[async_trait]
pub trait ImageFetcher {
    /// Download an image and return it as a `data:` URI, or None when
    /// the image cannot be fetched or typed.
    async fn fetch_data_uri(&self, url: &str) -> Option<String>;
}

struct CacheEntry {
    data_uri: String,
    created_at: Instant,
}

/// Bounded keyed cache. When full, the entry that has lived longest is
/// evicted to make room.
pub struct ImageCache {
    max_entries: usize,
    entries: HashMap<String, CacheEntry>,
}

impl ImageCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries,
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|e| e.data_uri.clone())
    }

    pub fn insert(&mut self, key: String, data_uri: String) {
        if self.entries.len() >= self.max_entries && !self.entries.contains_key(&key) {
            if let Some(victim) = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.created_at)
                .map(|(k, _)| k.clone())
            {
                self.entries.remove(&victim);
            }
        }
        self.entries.insert(
            key,
            CacheEntry {
                data_uri,
                created_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct HttpImageFetcher {
    client: Client,
    cache: Mutex<ImageCache>,
}

impl HttpImageFetcher {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("freshet/0.1.0")
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            cache: Mutex::new(ImageCache::new(CACHE_CAPACITY)),
        }
    }

    async fn download(&self, url: &str) -> Result<Option<String>> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Ok(None);
        }

        // The response header wins when it actually names an image type;
        // otherwise fall back to the URL extension.
        let header_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .filter(|v| v.starts_with("image/"));

        let content_type = match header_type {
            Some(t) => t,
            None => match extension_content_type(url) {
                Some(t) => t.to_string(),
                None => return Ok(None),
            },
        };

        let body = response.bytes().await?;
        if body.is_empty() {
            return Ok(None);
        }

        Ok(Some(format!(
            "data:{};base64,{}",
            content_type,
            STANDARD.encode(&body)
        )))
    }
}

impl Default for HttpImageFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch_data_uri(&self, url: &str) -> Option<String> {
        if let Ok(cache) = self.cache.lock() {
            if let Some(hit) = cache.get(url) {
                return Some(hit);
            }
        }

        match self.download(url).await {
            Ok(Some(data_uri)) => {
                if let Ok(mut cache) = self.cache.lock() {
                    cache.insert(url.to_string(), data_uri.clone());
                }
                Some(data_uri)
            }
            Ok(None) => None,
            Err(e) => {
                debug!(image = %url, error = %e, "image fetch failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_table() {
        assert_eq!(
            extension_content_type("https://a.example/pic.JPG"),
            Some("image/jpeg")
        );
        assert_eq!(
            extension_content_type("https://a.example/pic.png?w=100"),
            Some("image/png")
        );
        assert_eq!(
            extension_content_type("https://a.example/fav.ico#frag"),
            Some("image/x-icon")
        );
        assert_eq!(extension_content_type("https://a.example/pic.tiff"), None);
        assert_eq!(extension_content_type("https://a.example/noext"), None);
    }

    #[test]
    fn test_cache_returns_inserted_value() {
        let mut cache = ImageCache::new(10);
        cache.insert("k".into(), "data:image/png;base64,AAAA".into());
        assert_eq!(cache.get("k"), Some("data:image/png;base64,AAAA".into()));
        assert_eq!(cache.get("other"), None);
    }

    #[test]
    fn test_cache_evicts_oldest_when_full() {
        let mut cache = ImageCache::new(2);
        cache.insert("a".into(), "1".into());
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("b".into(), "2".into());
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("c".into(), "3".into());

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some("2".into()));
        assert_eq!(cache.get("c"), Some("3".into()));
    }

    #[test]
    fn test_cache_overwrite_does_not_evict() {
        let mut cache = ImageCache::new(2);
        cache.insert("a".into(), "1".into());
        cache.insert("b".into(), "2".into());
        cache.insert("a".into(), "updated".into());

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), Some("updated".into()));
        assert_eq!(cache.get("b"), Some("2".into()));
    }
}
