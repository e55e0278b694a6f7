pub mod sqlite;

use chrono::{DateTime, Utc};

use crate::app::Result;
use crate::domain::{Feed, FeedUpsert, Item, SearchHit};

pub use sqlite::SqliteStore;

pub trait Store: Send + Sync {
    // Feed operations
    fn get_feed(&self, feed_url: &str) -> Result<Option<Feed>>;
    fn list_feeds(&self) -> Result<Vec<Feed>>;
    fn upsert_feed(&self, upsert: &FeedUpsert) -> Result<()>;
    fn delete_feed(&self, feed_url: &str) -> Result<bool>;
    fn feed_rate(&self, feed_url: &str) -> Result<Option<f64>>;

    // Scheduler queries
    fn due_feeds(&self, now: DateTime<Utc>) -> Result<Vec<String>>;
    fn earliest_future_fetch(&self, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>>;

    // Item operations
    fn insert_item_if_absent(&self, item: &Item) -> Result<bool>;
    fn recent_items(&self, limit: i64, offset: i64) -> Result<Vec<SearchHit>>;
    fn search_items(&self, query: &str, limit: i64, offset: i64) -> Result<Vec<SearchHit>>;
}
