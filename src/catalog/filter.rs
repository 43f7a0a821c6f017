use std::collections::{BTreeMap, HashMap, HashSet};

use crate::catalog::aggregate::TagRegistry;
use crate::catalog::records::ItemRecord;

/// A tag must exceed this many items in every reference year to stay included.
pub const SUPPORT_THRESHOLD: u32 = 5;

/// Raw per-year item counts per tag, interning every observed tag along the
/// way. Runs before the inclusion filter, so nothing is excluded yet.
pub fn tag_counts_by_year(
    items: &[ItemRecord],
    registry: &mut TagRegistry,
) -> BTreeMap<i32, HashMap<u32, u32>> {
    let mut by_year: BTreeMap<i32, HashMap<u32, u32>> = BTreeMap::new();
    for item in items {
        let counts = by_year.entry(item.year).or_default();
        for name in &item.tags {
            let tag = registry.intern(name);
            *counts.entry(tag).or_insert(0) += 1;
        }
    }
    by_year
}

/// Computes the global inclusion set: one pass per reference year, removing
/// every tag whose item count that year does not exceed the threshold.
///
/// The check is AND across years — a tag absent from a reference year counts
/// as zero and is excluded, and once removed it never comes back.
pub fn included_tags(
    counts_by_year: &BTreeMap<i32, HashMap<u32, u32>>,
    reference_years: &[i32],
    threshold: u32,
    registry: &TagRegistry,
) -> HashSet<u32> {
    let mut included: HashSet<u32> = (0..registry.len() as u32).collect();
    for year in reference_years {
        let counts = counts_by_year.get(year);
        included.retain(|tag| {
            let count = counts.and_then(|by_tag| by_tag.get(tag)).copied().unwrap_or(0);
            count > threshold
        });
    }
    included
}

#[cfg(test)]
mod tests {
    use super::{included_tags, tag_counts_by_year};
    use crate::catalog::aggregate::TagRegistry;
    use crate::catalog::records::ItemRecord;

    fn items_with_counts(per_year: &[(i32, &str, u32)]) -> Vec<ItemRecord> {
        let mut items = Vec::new();
        for &(year, tag, count) in per_year {
            for _ in 0..count {
                items.push(ItemRecord {
                    year,
                    rating_count: 1,
                    tags: vec![tag.to_string()],
                });
            }
        }
        items
    }

    #[test]
    fn tag_must_exceed_threshold_every_reference_year() {
        let items = items_with_counts(&[
            (2013, "rpg", 6),
            (2014, "rpg", 7),
            (2013, "strategy", 6),
            (2014, "strategy", 5),
        ]);
        let mut registry = TagRegistry::new();
        let counts = tag_counts_by_year(&items, &mut registry);
        let included = included_tags(&counts, &[2013, 2014], 5, &registry);

        assert!(included.contains(&registry.get("rpg").unwrap()));
        // 5 items in 2014 does not exceed the threshold.
        assert!(!included.contains(&registry.get("strategy").unwrap()));
    }

    #[test]
    fn absence_in_a_reference_year_excludes() {
        let items = items_with_counts(&[(2013, "vr", 20)]);
        let mut registry = TagRegistry::new();
        let counts = tag_counts_by_year(&items, &mut registry);
        let included = included_tags(&counts, &[2013, 2014], 5, &registry);
        assert!(included.is_empty());
    }

    #[test]
    fn exclusion_is_monotonic() {
        // Failing an early year is not undone by a strong later year.
        let items = items_with_counts(&[(2013, "horror", 2), (2014, "horror", 100)]);
        let mut registry = TagRegistry::new();
        let counts = tag_counts_by_year(&items, &mut registry);
        let included = included_tags(&counts, &[2013, 2014], 5, &registry);
        assert!(included.is_empty());

        let reversed = included_tags(&counts, &[2014, 2013], 5, &registry);
        assert!(reversed.is_empty());
    }

    #[test]
    fn threshold_is_strict() {
        let items = items_with_counts(&[(2013, "deckbuilder", 6)]);
        let mut registry = TagRegistry::new();
        let counts = tag_counts_by_year(&items, &mut registry);

        assert_eq!(included_tags(&counts, &[2013], 5, &registry).len(), 1);
        assert_eq!(included_tags(&counts, &[2013], 6, &registry).len(), 0);
    }
}
