use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use crate::catalog::records::ItemRecord;

/// Interns tag names to dense slots in first-encounter order over the raw
/// scan. Slot order doubles as the encounter order used for every
/// deterministic tie-break downstream.
#[derive(Clone, Debug, Default)]
pub struct TagRegistry {
    names: Vec<String>,
    index: HashMap<String, u32>,
}

impl TagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, name: &str) -> u32 {
        if let Some(&slot) = self.index.get(name) {
            return slot;
        }
        let slot = self.names.len() as u32;
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), slot);
        slot
    }

    pub fn get(&self, name: &str) -> Option<u32> {
        self.index.get(name).copied()
    }

    pub fn name(&self, tag: u32) -> &str {
        &self.names[tag as usize]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Per-tag statistics within one aggregation window.
#[derive(Clone, Debug)]
pub struct TagStat {
    pub tag: u32,
    /// One entry per item bearing the tag; order is irrelevant.
    pub rating_counts: Vec<u32>,
    pub item_count: u32,
    /// Co-occurrence counters keyed by the other tag's registry slot.
    /// Never contains `tag` itself.
    pub relationships: HashMap<u32, u32>,
    /// `None` until the window is finalized, and kept `None` for an empty
    /// rating multiset rather than coerced to zero.
    pub median_rating_count: Option<f64>,
}

impl TagStat {
    fn new(tag: u32) -> Self {
        Self {
            tag,
            rating_counts: Vec::new(),
            item_count: 0,
            relationships: HashMap::new(),
            median_rating_count: None,
        }
    }
}

/// Aggregated statistics for one window (a single year or a merged range).
///
/// Tags are kept in first-seen order so that iteration is deterministic; the
/// backing map gives O(1) lookup by slot.
#[derive(Clone, Debug, Default)]
pub struct WindowStats {
    order: Vec<u32>,
    by_tag: HashMap<u32, TagStat>,
}

impl WindowStats {
    fn stat_mut(&mut self, tag: u32) -> &mut TagStat {
        let order = &mut self.order;
        self.by_tag.entry(tag).or_insert_with(|| {
            order.push(tag);
            TagStat::new(tag)
        })
    }

    pub fn get(&self, tag: u32) -> Option<&TagStat> {
        self.by_tag.get(&tag)
    }

    /// Tags in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = &TagStat> {
        self.order.iter().map(|tag| &self.by_tag[tag])
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn finalize_medians(&mut self) {
        for stat in self.by_tag.values_mut() {
            stat.median_rating_count = median(&stat.rating_counts);
        }
    }
}

/// Median of an unordered multiset: middle element for odd counts, mean of
/// the two middle elements for even counts, `None` when empty.
pub fn median(values: &[u32]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(f64::from(sorted[mid]))
    } else {
        Some((f64::from(sorted[mid - 1]) + f64::from(sorted[mid])) / 2.0)
    }
}

/// Partitions items by year and aggregates per-tag statistics over the
/// included tag set.
///
/// Both directions of every co-occurring pair are incremented independently,
/// once per shared item, so `a.relationships[b] == b.relationships[a]` holds
/// by construction.
pub fn aggregate_years(
    items: &[ItemRecord],
    included: &HashSet<u32>,
    registry: &TagRegistry,
) -> BTreeMap<i32, WindowStats> {
    let mut by_year: BTreeMap<i32, WindowStats> = BTreeMap::new();
    let mut item_tags: Vec<u32> = Vec::new();

    for item in items {
        item_tags.clear();
        item_tags.extend(
            item.tags
                .iter()
                .filter_map(|name| registry.get(name))
                .filter(|slot| included.contains(slot)),
        );
        if item_tags.is_empty() {
            continue;
        }

        let window = by_year.entry(item.year).or_default();
        for &tag in &item_tags {
            let stat = window.stat_mut(tag);
            stat.item_count += 1;
            stat.rating_counts.push(item.rating_count);
            for &other in &item_tags {
                if other != tag {
                    *stat.relationships.entry(other).or_insert(0) += 1;
                }
            }
        }
    }

    for window in by_year.values_mut() {
        window.finalize_medians();
    }
    by_year
}

/// Merges per-year aggregates into one multi-year window.
///
/// Item counts and relationship counters are summed key-wise and rating
/// multisets concatenated, so the merge is associative and commutative over
/// year order. Years absent from `per_year` contribute nothing.
pub fn merge_window(
    per_year: &BTreeMap<i32, WindowStats>,
    years: impl IntoIterator<Item = i32>,
) -> WindowStats {
    let mut window = WindowStats::default();
    for year in years {
        let Some(yearly) = per_year.get(&year) else {
            continue;
        };
        for stat in yearly.iter() {
            let merged = window.stat_mut(stat.tag);
            merged.item_count += stat.item_count;
            merged.rating_counts.extend_from_slice(&stat.rating_counts);
            for (&other, &count) in &stat.relationships {
                *merged.relationships.entry(other).or_insert(0) += count;
            }
        }
    }
    window.finalize_medians();
    window
}

/// One tag's statistics in one year, for the time-series view.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesPoint {
    pub year: i32,
    pub name: String,
    pub item_count: u32,
    pub median_rating_count: Option<f64>,
}

/// Flattens per-year aggregates into the series consumed by the line-chart
/// collaborator. Points are ordered by year, then window encounter order.
pub fn yearly_series(
    per_year: &BTreeMap<i32, WindowStats>,
    registry: &TagRegistry,
) -> Vec<SeriesPoint> {
    let mut series = Vec::new();
    for (&year, window) in per_year {
        for stat in window.iter() {
            series.push(SeriesPoint {
                year,
                name: registry.name(stat.tag).to_string(),
                item_count: stat.item_count,
                median_rating_count: stat.median_rating_count,
            });
        }
    }
    series
}
