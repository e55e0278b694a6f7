use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rusqlite_migration::{Migrations, M};

use crate::app::{FreshetError, Result};
use crate::domain::{Feed, FeedUpsert, Item, SearchHit};
use crate::store::Store;

const FEED_COLUMNS: &str = "feed_url, home_url, name, link, image, discovered_by_url, \
     last_published, last_fetched, next_fetch_at, publish_rate_per_hour";

const HIT_COLUMNS: &str = "i.url, i.feed_url, i.title, i.description, i.content, i.image, \
     i.author, i.published, f.name, f.link, f.image";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(mut conn: Connection) -> Result<Self> {
        conn.execute("PRAGMA foreign_keys = ON", [])?;

        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);
        migrations.to_latest(&mut conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| FreshetError::Other("connection mutex poisoned".into()))
    }

    fn feed_from_row(row: &Row) -> rusqlite::Result<Feed> {
        Ok(Feed {
            feed_url: row.get(0)?,
            home_url: row.get(1)?,
            name: row.get(2)?,
            link: row.get(3)?,
            image: row.get(4)?,
            discovered_by_url: row.get(5)?,
            last_published: opt_datetime(row.get(6)?),
            last_fetched: opt_datetime(row.get(7)?),
            next_fetch_at: opt_datetime(row.get(8)?),
            publish_rate_per_hour: row.get(9)?,
        })
    }

    fn hit_from_row(row: &Row) -> rusqlite::Result<SearchHit> {
        Ok(SearchHit {
            item: Item {
                url: row.get(0)?,
                feed_url: row.get(1)?,
                title: row.get(2)?,
                description: row.get(3)?,
                content: row.get(4)?,
                image: row.get(5)?,
                author: row.get(6)?,
                published: opt_datetime(row.get(7)?),
            },
            feed_name: row.get(8)?,
            feed_link: row.get(9)?,
            feed_image: row.get(10)?,
        })
    }
}

/// Timestamps are stored as fixed-precision RFC 3339 text so that string
/// comparison in SQL matches chronological order.
fn to_sql(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn opt_to_sql(ts: Option<DateTime<Utc>>) -> Option<String> {
    ts.map(to_sql)
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| s.parse::<DateTime<Utc>>().ok())
}

fn opt_datetime(s: Option<String>) -> Option<DateTime<Utc>> {
    s.as_deref().and_then(parse_datetime)
}

/// Build an FTS5 match expression: each whitespace-separated token
/// becomes a quoted prefix term, all terms required.
pub(crate) fn fts_query(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split_whitespace()
        .map(|t| t.replace('"', ""))
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{t}\"*"))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" AND "))
    }
}

impl Store for SqliteStore {
    fn get_feed(&self, feed_url: &str) -> Result<Option<Feed>> {
        let conn = self.conn()?;
        let result = conn
            .query_row(
                &format!("SELECT {FEED_COLUMNS} FROM feeds WHERE feed_url = ?1"),
                params![feed_url],
                Self::feed_from_row,
            )
            .optional()?;
        Ok(result)
    }

    fn list_feeds(&self) -> Result<Vec<Feed>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare(&format!("SELECT {FEED_COLUMNS} FROM feeds ORDER BY name, feed_url"))?;
        let feeds = stmt
            .query_map([], Self::feed_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(feeds)
    }

    fn upsert_feed(&self, upsert: &FeedUpsert) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO feeds (feed_url, home_url, name, link, image, discovered_by_url,
                                last_published, last_fetched, next_fetch_at, publish_rate_per_hour)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(feed_url) DO UPDATE SET
                home_url = COALESCE(excluded.home_url, home_url),
                name = COALESCE(excluded.name, name),
                link = COALESCE(excluded.link, link),
                image = COALESCE(excluded.image, image),
                discovered_by_url = COALESCE(excluded.discovered_by_url, discovered_by_url),
                last_published = COALESCE(excluded.last_published, last_published),
                last_fetched = COALESCE(excluded.last_fetched, last_fetched),
                next_fetch_at = COALESCE(excluded.next_fetch_at, next_fetch_at),
                publish_rate_per_hour = COALESCE(excluded.publish_rate_per_hour, publish_rate_per_hour)",
            params![
                upsert.feed_url,
                upsert.home_url,
                upsert.name,
                upsert.link,
                upsert.image,
                upsert.discovered_by_url,
                opt_to_sql(upsert.last_published),
                opt_to_sql(upsert.last_fetched),
                opt_to_sql(upsert.next_fetch_at),
                upsert.publish_rate_per_hour,
            ],
        )?;
        Ok(())
    }

    fn delete_feed(&self, feed_url: &str) -> Result<bool> {
        let mut conn = self.conn()?;
        // Items are removed explicitly so the FTS delete trigger fires
        // for every cascaded row.
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM items WHERE feed_url = ?1", params![feed_url])?;
        let removed = tx.execute("DELETE FROM feeds WHERE feed_url = ?1", params![feed_url])?;
        tx.commit()?;
        Ok(removed > 0)
    }

    fn feed_rate(&self, feed_url: &str) -> Result<Option<f64>> {
        let conn = self.conn()?;
        let rate: Option<Option<f64>> = conn
            .query_row(
                "SELECT publish_rate_per_hour FROM feeds WHERE feed_url = ?1",
                params![feed_url],
                |row| row.get(0),
            )
            .optional()?;
        Ok(rate.flatten())
    }

    fn due_feeds(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let conn = self.conn()?;
        // ASC puts NULLs first, so never-polled feeds lead the queue.
        let mut stmt = conn.prepare(
            "SELECT feed_url FROM feeds
             WHERE next_fetch_at IS NULL OR next_fetch_at <= ?1
             ORDER BY next_fetch_at ASC",
        )?;
        let urls = stmt
            .query_map(params![to_sql(now)], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(urls)
    }

    fn earliest_future_fetch(&self, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
        let conn = self.conn()?;
        let next: Option<String> = conn
            .query_row(
                "SELECT next_fetch_at FROM feeds
                 WHERE next_fetch_at > ?1
                 ORDER BY next_fetch_at ASC LIMIT 1",
                params![to_sql(now)],
                |row| row.get(0),
            )
            .optional()?;
        Ok(next.as_deref().and_then(parse_datetime))
    }

    fn insert_item_if_absent(&self, item: &Item) -> Result<bool> {
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO items
                (url, feed_url, title, description, content, image, author, published)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                item.url,
                item.feed_url,
                item.title,
                item.description,
                item.content,
                item.image,
                item.author,
                opt_to_sql(item.published),
            ],
        )?;
        Ok(inserted > 0)
    }

    fn recent_items(&self, limit: i64, offset: i64) -> Result<Vec<SearchHit>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {HIT_COLUMNS}
             FROM items i
             LEFT JOIN feeds f ON f.feed_url = i.feed_url
             ORDER BY i.published IS NULL, i.published DESC
             LIMIT ?1 OFFSET ?2"
        ))?;
        let hits = stmt
            .query_map(params![limit, offset], Self::hit_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(hits)
    }

    fn search_items(&self, query: &str, limit: i64, offset: i64) -> Result<Vec<SearchHit>> {
        let Some(match_expr) = fts_query(query) else {
            return Ok(Vec::new());
        };

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {HIT_COLUMNS}
             FROM items_fts
             JOIN items i ON i.rowid = items_fts.rowid
             LEFT JOIN feeds f ON f.feed_url = i.feed_url
             WHERE items_fts MATCH ?1
             ORDER BY i.published IS NULL, i.published DESC
             LIMIT ?2 OFFSET ?3"
        ))?;
        let hits = stmt
            .query_map(params![match_expr, limit, offset], Self::hit_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(hits)
    }
}
