//! Feed document parsing and normalization.
//!
//! Converts a fetched RSS/Atom document into unified metadata and item
//! records, using a namespace-aware parser rather than string selectors.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use feed_rs::model::{Entry, Feed, Link};
use html_escape::decode_html_entities;
use regex::Regex;

use crate::app::{FreshetError, Result};
use crate::fetch::RawFeed;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag regex"));
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex"));

const ATOM_NS: &str = "http://www.w3.org/2005/Atom";

/// Rough document classification. Drives which elements carry the feed
/// image and is recorded in logs; item extraction is format-agnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    Rss,
    Atom,
}

impl FeedKind {
    pub fn detect(body: &str) -> FeedKind {
        if body.contains("<feed") && body.contains(ATOM_NS) {
            FeedKind::Atom
        } else {
            FeedKind::Rss
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeedMeta {
    pub name: Option<String>,
    pub link: Option<String>,
    pub image_url: Option<String>,
    pub last_published: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ParsedItem {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ParsedFeed {
    pub final_url: String,
    pub kind: FeedKind,
    pub meta: FeedMeta,
    pub items: Vec<ParsedItem>,
}

/// Parse a fetched feed document.
pub fn parse_feed(raw: &RawFeed) -> Result<ParsedFeed> {
    let kind = FeedKind::detect(&String::from_utf8_lossy(&raw.body));

    let feed = feed_rs::parser::parse(&raw.body[..])
        .map_err(|e| FreshetError::FeedParse(e.to_string()))?;

    let meta = feed_meta(&feed, kind);
    let items: Vec<ParsedItem> = feed.entries.into_iter().filter_map(parse_item).collect();

    // The feed-level date often lags the newest item; take whichever is
    // most recent.
    let newest_item = items.iter().filter_map(|i| i.published).max();
    let last_published = match (meta.last_published, newest_item) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    };

    Ok(ParsedFeed {
        final_url: raw.final_url.clone(),
        kind,
        meta: FeedMeta {
            last_published,
            ..meta
        },
        items,
    })
}

fn feed_meta(feed: &Feed, kind: FeedKind) -> FeedMeta {
    let name = feed.title.as_ref().and_then(|t| normalize_text(&t.content));
    let link = pick_link(&feed.links);

    let image_url = match kind {
        // RSS carries the channel image; Atom prefers icon over logo.
        FeedKind::Rss => feed.logo.as_ref().map(|i| i.uri.clone()),
        FeedKind::Atom => feed
            .icon
            .as_ref()
            .or(feed.logo.as_ref())
            .map(|i| i.uri.clone()),
    }
    .and_then(non_empty);

    FeedMeta {
        name,
        link,
        image_url,
        last_published: feed.published.or(feed.updated),
    }
}

fn parse_item(entry: Entry) -> Option<ParsedItem> {
    let url = pick_link(&entry.links)?;

    let candidates: Vec<ImageCandidate> = entry
        .media
        .iter()
        .flat_map(|media| {
            let thumbs = media.thumbnails.iter().map(|t| ImageCandidate {
                url: t.image.uri.clone(),
                width: t.image.width.unwrap_or(0),
                height: t.image.height.unwrap_or(0),
            });
            let contents = media
                .content
                .iter()
                .filter(|c| {
                    c.content_type
                        .as_ref()
                        .map_or(true, |m| m.essence().to_string().starts_with("image/"))
                })
                .filter_map(|c| {
                    c.url.as_ref().map(|u| ImageCandidate {
                        url: u.to_string(),
                        width: c.width.unwrap_or(0),
                        height: c.height.unwrap_or(0),
                    })
                });
            thumbs.chain(contents).collect::<Vec<_>>()
        })
        .collect();

    Some(ParsedItem {
        url,
        title: entry.title.as_ref().and_then(|t| normalize_text(&t.content)),
        description: entry
            .summary
            .as_ref()
            .and_then(|s| normalize_text(&s.content)),
        content: entry.content.and_then(|c| c.body).and_then(non_empty),
        author: entry
            .authors
            .first()
            .map(|p| p.name.clone())
            .and_then(non_empty),
        published: entry.published.or(entry.updated),
        image_url: best_image(candidates),
    })
}

/// Prefer the alternate link, fall back to the first one.
fn pick_link(links: &[Link]) -> Option<String> {
    links
        .iter()
        .find(|l| l.rel.as_deref() == Some("alternate"))
        .or_else(|| links.first())
        .map(|l| l.href.clone())
        .and_then(non_empty)
}

#[derive(Debug, Clone)]
pub struct ImageCandidate {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

/// Pick the largest candidate: full area when both dimensions are known,
/// otherwise the longest known edge. Earlier candidates win ties.
pub fn best_image(candidates: Vec<ImageCandidate>) -> Option<String> {
    let mut best: Option<(u64, String)> = None;
    for candidate in candidates {
        if candidate.url.trim().is_empty() {
            continue;
        }
        let score = image_score(&candidate);
        if best.as_ref().map_or(true, |(top, _)| score > *top) {
            best = Some((score, candidate.url));
        }
    }
    best.map(|(_, url)| url)
}

fn image_score(candidate: &ImageCandidate) -> u64 {
    if candidate.width > 0 && candidate.height > 0 {
        u64::from(candidate.width) * u64::from(candidate.height)
    } else {
        u64::from(candidate.width.max(candidate.height))
    }
}

/// Flatten feed-provided markup into plain text: decode entities, strip
/// tags, decode again, collapse whitespace. Empty results become None.
pub fn normalize_text(raw: &str) -> Option<String> {
    let decoded = decode_html_entities(raw);
    let stripped = TAG_RE.replace_all(&decoded, " ");
    let decoded = decode_html_entities(&stripped);
    let collapsed = WS_RE.replace_all(&decoded, " ");
    non_empty(collapsed.trim().to_string())
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const RSS_SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel>
    <title>Example &amp; Friends</title>
    <link>https://example.com/</link>
    <image>
      <url>https://example.com/banner.png</url>
      <title>Example</title>
      <link>https://example.com/</link>
    </image>
    <item>
      <title>First &lt;b&gt;post&lt;/b&gt;</title>
      <link>https://example.com/posts/1</link>
      <guid>https://example.com/posts/1</guid>
      <pubDate>Sat, 01 Jun 2024 12:00:00 GMT</pubDate>
      <description>&lt;p&gt;Hello &amp;amp; world&lt;/p&gt;</description>
      <dc:creator>Alice</dc:creator>
      <media:thumbnail url="https://example.com/1-small.jpg" width="40" height="40"/>
      <media:content url="https://example.com/1-large.jpg" width="100" height="100" type="image/jpeg"/>
    </item>
    <item>
      <title>Second post</title>
      <link>https://example.com/posts/2</link>
      <pubDate>Sat, 01 Jun 2024 13:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Third post</title>
      <link>https://example.com/posts/3</link>
      <pubDate>Sat, 01 Jun 2024 14:00:00 GMT</pubDate>
    </item>
  </channel>
</rss>"#;

    const ATOM_SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Example</title>
  <link rel="self" href="https://example.com/atom.xml"/>
  <link rel="alternate" href="https://example.com/"/>
  <icon>https://example.com/icon.png</icon>
  <updated>2024-06-01T12:00:00Z</updated>
  <entry>
    <title>Entry one</title>
    <link rel="alternate" href="https://example.com/entries/1"/>
    <id>urn:entry-1</id>
    <updated>2024-06-01T11:00:00Z</updated>
    <summary>A summary</summary>
    <author><name>Bob</name></author>
  </entry>
</feed>"#;

    fn raw(body: &str) -> RawFeed {
        RawFeed {
            final_url: "https://example.com/feed.xml".into(),
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_detect_atom_requires_namespace() {
        assert_eq!(FeedKind::detect(ATOM_SAMPLE), FeedKind::Atom);
        assert_eq!(FeedKind::detect(RSS_SAMPLE), FeedKind::Rss);
        assert_eq!(FeedKind::detect("<feed><title>x</title></feed>"), FeedKind::Rss);
    }

    #[test]
    fn test_parse_rss_metadata() {
        let parsed = parse_feed(&raw(RSS_SAMPLE)).unwrap();
        assert_eq!(parsed.kind, FeedKind::Rss);
        assert_eq!(parsed.meta.name, Some("Example & Friends".into()));
        assert_eq!(parsed.meta.link, Some("https://example.com/".into()));
        assert_eq!(
            parsed.meta.image_url,
            Some("https://example.com/banner.png".into())
        );
    }

    #[test]
    fn test_parse_rss_items() {
        let parsed = parse_feed(&raw(RSS_SAMPLE)).unwrap();
        assert_eq!(parsed.items.len(), 3);

        let first = &parsed.items[0];
        assert_eq!(first.url, "https://example.com/posts/1");
        assert_eq!(first.title, Some("First post".into()));
        assert_eq!(first.description, Some("Hello & world".into()));
        assert_eq!(first.author, Some("Alice".into()));
        assert_eq!(
            first.published,
            Some(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_item_image_prefers_largest_area() {
        let parsed = parse_feed(&raw(RSS_SAMPLE)).unwrap();
        // The 100x100 content beats the 40x40 thumbnail on area.
        assert_eq!(
            parsed.items[0].image_url,
            Some("https://example.com/1-large.jpg".into())
        );
    }

    #[test]
    fn test_last_published_is_newest_item_date() {
        let parsed = parse_feed(&raw(RSS_SAMPLE)).unwrap();
        assert_eq!(
            parsed.meta.last_published,
            Some(Utc.with_ymd_and_hms(2024, 6, 1, 14, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_atom() {
        let parsed = parse_feed(&raw(ATOM_SAMPLE)).unwrap();
        assert_eq!(parsed.kind, FeedKind::Atom);
        assert_eq!(parsed.meta.name, Some("Atom Example".into()));
        assert_eq!(parsed.meta.link, Some("https://example.com/".into()));
        assert_eq!(
            parsed.meta.image_url,
            Some("https://example.com/icon.png".into())
        );

        assert_eq!(parsed.items.len(), 1);
        let entry = &parsed.items[0];
        assert_eq!(entry.url, "https://example.com/entries/1");
        assert_eq!(entry.description, Some("A summary".into()));
        assert_eq!(entry.author, Some("Bob".into()));
        // No published element: updated stands in.
        assert_eq!(
            entry.published,
            Some(Utc.with_ymd_and_hms(2024, 6, 1, 11, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_failure_is_an_error() {
        assert!(parse_feed(&raw("not xml at all")).is_err());
    }

    #[test]
    fn test_normalize_strips_tags_and_entities() {
        assert_eq!(
            normalize_text("<p>Hello &amp; world</p>"),
            Some("Hello & world".into())
        );
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize_text("  foo\n\tbar  "), Some("foo bar".into()));
    }

    #[test]
    fn test_normalize_empty_becomes_none() {
        assert_eq!(normalize_text(""), None);
        assert_eq!(normalize_text("   \n "), None);
        assert_eq!(normalize_text("<p></p>"), None);
    }

    #[test]
    fn test_normalize_double_encoded_entities() {
        assert_eq!(normalize_text("a &amp;lt;tag&amp;gt; b"), Some("a <tag> b".into()));
    }

    #[test]
    fn test_best_image_mixed_scoring() {
        let candidates = vec![
            ImageCandidate { url: "a".into(), width: 100, height: 100 },
            ImageCandidate { url: "b".into(), width: 200, height: 0 },
            ImageCandidate { url: "c".into(), width: 0, height: 300 },
        ];
        // a scores 10000 by area; b and c only score their longest edge.
        assert_eq!(best_image(candidates), Some("a".into()));
    }

    #[test]
    fn test_best_image_tie_keeps_first() {
        let candidates = vec![
            ImageCandidate { url: "first".into(), width: 10, height: 10 },
            ImageCandidate { url: "second".into(), width: 10, height: 10 },
        ];
        assert_eq!(best_image(candidates), Some("first".into()));
    }

    #[test]
    fn test_best_image_empty() {
        assert_eq!(best_image(Vec::new()), None);
    }
}
