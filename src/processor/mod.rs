//! Per-feed processing pipeline.
//!
//! One call fetches a feed, re-estimates its publish rate, writes the
//! feed row, and inserts whatever items are new. Fetch and parse
//! failures leave the stored schedule untouched so the feed is retried
//! on the next tick.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use url::{Origin, Url};

use crate::app::{AppContext, Result};
use crate::domain::{FeedUpsert, Item};
use crate::parser;
use crate::rate;
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Canonical feed key after redirects.
    pub feed_url: String,
    pub inserted: usize,
}

/// Fetch and ingest one feed.
///
/// `origin` is the URL as submitted by the caller; when it differs from
/// the redirect-collapsed final URL it is recorded as provenance.
/// Returns `Ok(None)` when the feed could not be fetched or parsed.
pub async fn process_feed(
    ctx: &AppContext,
    url: &str,
    origin: Option<&str>,
) -> Result<Option<ProcessOutcome>> {
    let raw = match ctx.source.load(url).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(feed = %url, error = %e, "feed fetch failed");
            return Ok(None);
        }
    };

    let parsed = match parser::parse_feed(&raw) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(feed = %url, error = %e, "feed parse failed");
            return Ok(None);
        }
    };

    let now = Utc::now();
    let prior = ctx.store.feed_rate(&parsed.final_url)?;
    let published: Vec<DateTime<Utc>> = parsed.items.iter().filter_map(|i| i.published).collect();
    let plan = rate::plan_next_poll(&published, prior, now, &ctx.config.poll);

    let image = match &parsed.meta.image_url {
        Some(image_url) => ctx.images.fetch_data_uri(image_url).await,
        None => None,
    };

    // The feed row must exist before any item references it.
    ctx.store.upsert_feed(&FeedUpsert {
        feed_url: parsed.final_url.clone(),
        home_url: parsed
            .meta
            .link
            .as_deref()
            .and_then(origin_of)
            .or_else(|| origin_of(&parsed.final_url)),
        name: parsed.meta.name.clone(),
        link: parsed.meta.link.clone(),
        image,
        discovered_by_url: origin
            .filter(|submitted| *submitted != parsed.final_url)
            .map(String::from),
        last_published: parsed.meta.last_published,
        last_fetched: Some(now),
        next_fetch_at: Some(plan.next_fetch_at),
        publish_rate_per_hour: plan.rate_per_hour,
    })?;

    let mut inserted = 0;
    for item in &parsed.items {
        let image = match &item.image_url {
            Some(image_url) => ctx.images.fetch_data_uri(image_url).await,
            None => None,
        };

        let row = Item {
            url: item.url.clone(),
            feed_url: parsed.final_url.clone(),
            title: item.title.clone(),
            description: item.description.clone(),
            content: item.content.clone(),
            image,
            author: item.author.clone(),
            published: item.published,
        };

        match ctx.store.insert_item_if_absent(&row) {
            Ok(true) => inserted += 1,
            Ok(false) => {}
            Err(e) => warn!(item = %row.url, error = %e, "item insert failed"),
        }
    }

    debug!(
        feed = %parsed.final_url,
        kind = ?parsed.kind,
        inserted,
        rate = ?plan.rate_per_hour,
        "feed processed"
    );

    Ok(Some(ProcessOutcome {
        feed_url: parsed.final_url,
        inserted,
    }))
}

/// Scheme-and-host prefix of a URL, used as the feed's homepage when the
/// document does not declare one.
fn origin_of(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    match url.origin() {
        origin @ Origin::Tuple(..) => Some(origin.ascii_serialization()),
        Origin::Opaque(_) => None,
    }
}
