use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Upper bound on tags carried per catalog entry.
pub const MAX_TAGS_PER_ITEM: usize = 10;

/// One catalog entry. Immutable once loaded.
#[derive(Clone, Debug)]
pub struct ItemRecord {
    pub year: i32,
    pub rating_count: u32,
    /// Deduplicated tag names in input order, separators normalized to spaces.
    pub tags: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
struct RawItemRecord {
    #[serde(default)]
    year: Option<i32>,
    #[serde(default, rename = "ratingCount")]
    rating_count: Option<u32>,
    #[serde(default)]
    tags: Vec<String>,
}

pub fn load_records(path: &Path) -> Result<Vec<ItemRecord>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read records from {}", path.display()))?;
    parse_records(&raw)
}

/// Parses a JSON array of raw item records.
///
/// Malformed entries (missing year or rating count, or a non-object row) are
/// skipped without aborting the batch.
pub fn parse_records(raw: &str) -> Result<Vec<ItemRecord>> {
    let rows: Vec<Value> =
        serde_json::from_str(raw).context("records input is not a JSON array")?;

    let mut records = Vec::with_capacity(rows.len());
    let mut skipped = 0usize;
    for (index, row) in rows.iter().enumerate() {
        match parse_record(row) {
            Ok(record) => records.push(record),
            Err(error) => {
                skipped += 1;
                debug!(index, %error, "skipping malformed item record");
            }
        }
    }

    if skipped > 0 {
        warn!(skipped, kept = records.len(), "some item records were malformed");
    }
    Ok(records)
}

fn parse_record(row: &Value) -> Result<ItemRecord> {
    let raw = RawItemRecord::deserialize(row).context("record is not an object")?;
    let year = raw.year.ok_or_else(|| anyhow!("missing year"))?;
    let rating_count = raw.rating_count.ok_or_else(|| anyhow!("missing ratingCount"))?;

    let mut tags: Vec<String> = Vec::with_capacity(raw.tags.len().min(MAX_TAGS_PER_ITEM));
    for tag in &raw.tags {
        let normalized = normalize_tag(tag);
        if normalized.is_empty() || tags.iter().any(|existing| existing == &normalized) {
            continue;
        }
        tags.push(normalized);
    }
    if tags.len() > MAX_TAGS_PER_ITEM {
        debug!(count = tags.len(), "truncating oversized tag list");
        tags.truncate(MAX_TAGS_PER_ITEM);
    }

    Ok(ItemRecord {
        year,
        rating_count,
        tags,
    })
}

/// Tag names are case-sensitive identifiers with separators normalized to spaces.
fn normalize_tag(raw: &str) -> String {
    raw.trim().replace('_', " ")
}
