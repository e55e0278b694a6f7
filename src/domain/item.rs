use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single article, keyed by its URL. Items are immutable once stored;
/// re-fetching a feed never rewrites an existing row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub url: String,
    pub feed_url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    /// Inlined `data:` URI for the representative image, if one was
    /// found and could be downloaded.
    pub image: Option<String>,
    pub author: Option<String>,
    pub published: Option<DateTime<Utc>>,
}

impl Item {
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("(untitled)")
    }
}

/// A search result row: the item joined with its feed's metadata.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub item: Item,
    pub feed_name: Option<String>,
    pub feed_link: Option<String>,
    pub feed_image: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: Option<&str>) -> Item {
        Item {
            url: "https://example.com/a".into(),
            feed_url: "https://example.com/feed.xml".into(),
            title: title.map(String::from),
            description: None,
            content: None,
            image: None,
            author: None,
            published: None,
        }
    }

    #[test]
    fn test_display_title_with_title() {
        assert_eq!(item(Some("My Article")).display_title(), "My Article");
    }

    #[test]
    fn test_display_title_without_title() {
        assert_eq!(item(None).display_title(), "(untitled)");
    }
}
