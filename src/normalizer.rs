//! Normalization of raw feed documents.
//!
//! A pure step between fetching and writing:
//! - HTML entities in channel and item titles/descriptions are decoded
//!   (`Caf&eacute;` → `Café`)
//! - `<pubDate>` strings are resolved with [`crate::dates::resolve`]
//! - empty (or whitespace-only) titles and descriptions become `None`
//!
//! The same input always yields the same output.

use crate::dates;
use crate::models::{NormalizedFeed, NormalizedItem, RawFeedDocument, RawItem};
use html_escape::decode_html_entities;
use tracing::{debug, instrument};

#[instrument(level = "debug", skip_all, fields(items = document.items.len()))]
pub fn normalize(document: &RawFeedDocument) -> NormalizedFeed {
    let items: Vec<NormalizedItem> = document.items.iter().map(normalize_item).collect();

    let undated = items.iter().filter(|item| item.published_at.is_none()).count();
    debug!(undated, "Normalized feed items");

    NormalizedFeed {
        title: decode_text(&document.title),
        description: decode_text(&document.description),
        items,
    }
}

pub fn normalize_item(item: &RawItem) -> NormalizedItem {
    NormalizedItem {
        title: decode_text(&item.title),
        link: item.link.trim().to_string(),
        description: decode_text(&item.description),
        published_at: dates::resolve(&item.pub_date),
    }
}

fn decode_text(raw: &str) -> Option<String> {
    let decoded = decode_html_entities(raw.trim());
    let decoded = decoded.trim();
    (!decoded.is_empty()).then(|| decoded.to_string())
}
