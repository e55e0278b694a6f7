use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A subscribed feed, keyed by its URL after redirects.
///
/// Two submitted URLs that redirect to the same final URL collapse into
/// one row; `discovered_by_url` keeps the originally submitted URL when
/// it differs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feed {
    pub feed_url: String,
    pub home_url: Option<String>,
    pub name: Option<String>,
    pub link: Option<String>,
    pub image: Option<String>,
    pub discovered_by_url: Option<String>,
    pub last_published: Option<DateTime<Utc>>,
    pub last_fetched: Option<DateTime<Utc>>,
    /// When the scheduler should poll this feed next. Null until the
    /// feed has been processed at least once.
    pub next_fetch_at: Option<DateTime<Utc>>,
    /// Smoothed publish rate in items per hour. Null until enough
    /// history has accumulated.
    pub publish_rate_per_hour: Option<f64>,
}

impl Feed {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.feed_url)
    }
}

/// Insert-or-update payload for a feed row. Null fields leave the
/// existing column value untouched.
#[derive(Debug, Clone, Default)]
pub struct FeedUpsert {
    pub feed_url: String,
    pub home_url: Option<String>,
    pub name: Option<String>,
    pub link: Option<String>,
    pub image: Option<String>,
    pub discovered_by_url: Option<String>,
    pub last_published: Option<DateTime<Utc>>,
    pub last_fetched: Option<DateTime<Utc>>,
    pub next_fetch_at: Option<DateTime<Utc>>,
    pub publish_rate_per_hour: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_prefers_name() {
        let feed = Feed {
            feed_url: "https://example.com/feed.xml".into(),
            home_url: None,
            name: Some("Example Blog".into()),
            link: None,
            image: None,
            discovered_by_url: None,
            last_published: None,
            last_fetched: None,
            next_fetch_at: None,
            publish_rate_per_hour: None,
        };
        assert_eq!(feed.display_name(), "Example Blog");
    }

    #[test]
    fn test_display_name_falls_back_to_url() {
        let feed = Feed {
            feed_url: "https://example.com/feed.xml".into(),
            home_url: None,
            name: None,
            link: None,
            image: None,
            discovered_by_url: None,
            last_published: None,
            last_fetched: None,
            next_fetch_at: None,
            publish_rate_per_hour: None,
        };
        assert_eq!(feed.display_name(), "https://example.com/feed.xml");
    }
}
