use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use url::Url;

use crate::api;
use crate::app::{AppContext, FreshetError, Result};
use crate::processor;
use crate::scheduler;
use crate::store::Store;

/// Run the scheduler loop and the HTTP API side by side.
pub async fn serve(ctx: Arc<AppContext>) -> Result<()> {
    tokio::spawn(scheduler::run(ctx.clone()));
    api::serve(ctx).await
}

pub async fn add_feed(ctx: &AppContext, url: &str) -> Result<()> {
    Url::parse(url)?;

    match processor::process_feed(ctx, url, Some(url)).await? {
        Some(outcome) => {
            if let Some(feed) = ctx.store.get_feed(&outcome.feed_url)? {
                println!("Subscribed: {}", feed.display_name());
            }
            println!("Fetched {} items", outcome.inserted);
            Ok(())
        }
        None => Err(FreshetError::FeedParse(format!(
            "could not fetch or parse {url}"
        ))),
    }
}

pub fn remove_feed(ctx: &AppContext, url: &str) -> Result<()> {
    if ctx.store.delete_feed(url)? {
        println!("Removed feed: {url}");
        Ok(())
    } else {
        Err(FreshetError::FeedNotFound(url.to_string()))
    }
}

pub fn list_feeds(ctx: &AppContext) -> Result<()> {
    let feeds = ctx.store.list_feeds()?;

    if feeds.is_empty() {
        println!("No feeds");
        return Ok(());
    }

    for feed in feeds {
        let rate = feed
            .publish_rate_per_hour
            .map(|r| format!("{r:.2}/h"))
            .unwrap_or_else(|| "unknown rate".into());
        let next = feed
            .next_fetch_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "pending".into());
        println!(
            "{} ({rate}, next fetch {next})\n  {}",
            feed.display_name(),
            feed.feed_url
        );
    }

    Ok(())
}

pub fn list_items(ctx: &AppContext) -> Result<()> {
    let hits = ctx.store.recent_items(50, 0)?;

    if hits.is_empty() {
        println!("No items");
        return Ok(());
    }

    for hit in hits {
        let published = hit
            .item
            .published
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "undated".into());
        println!(
            "{} [{published}]\n  {}",
            hit.item.display_title(),
            hit.item.url
        );
    }

    Ok(())
}

pub async fn update_feeds(ctx: &Arc<AppContext>) -> Result<()> {
    let due = ctx.store.due_feeds(Utc::now())?;

    if due.is_empty() {
        println!("No feeds due");
        return Ok(());
    }

    println!("Polling {} due feeds...", due.len());
    scheduler::tick(ctx).await?;
    println!("Done");
    Ok(())
}

pub fn search_items(ctx: &AppContext, query: &str) -> Result<()> {
    let hits = ctx.store.search_items(query, 20, 0)?;

    if hits.is_empty() {
        println!("No matches");
        return Ok(());
    }

    for hit in hits {
        let source = hit.feed_name.as_deref().unwrap_or(&hit.item.feed_url);
        println!("{} ({source})\n  {}", hit.item.display_title(), hit.item.url);
    }

    Ok(())
}

/// Subscribe to every URL in a newline-delimited file. Blank lines and
/// `#` comments are skipped; failures are reported but do not stop the
/// import.
pub async fn import_feeds(ctx: &AppContext, path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(path)?;

    let mut added = 0;
    let mut failed = 0;

    for line in text.lines() {
        let url = line.trim();
        if url.is_empty() || url.starts_with('#') {
            continue;
        }

        match processor::process_feed(ctx, url, Some(url)).await {
            Ok(Some(outcome)) => {
                added += 1;
                println!("  {} ({} items)", outcome.feed_url, outcome.inserted);
            }
            Ok(None) | Err(_) => {
                failed += 1;
                eprintln!("  failed: {url}");
            }
        }
    }

    println!("Imported {added} feeds, {failed} failures");
    Ok(())
}
