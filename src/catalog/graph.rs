use std::collections::HashMap;
use std::collections::hash_map::Entry;

use serde::Serialize;
use tracing::warn;

use crate::catalog::aggregate::{TagRegistry, TagStat, WindowStats};

/// Category assigned to tags with no relationship to any top tag; one past
/// the last top-tag rank.
pub const UNCATEGORIZED_CATEGORY: u32 = 10;

#[derive(Clone, Debug)]
pub struct GraphConfig {
    /// Number of category-anchor tags chosen by item count.
    pub top_tag_count: usize,
    /// Strongest relationships contributed to the edge set per tag.
    pub links_per_tag: usize,
    /// Tags never eligible as top tags. "indie" co-occurs with nearly
    /// everything and would swallow the category space.
    pub excluded_top_tags: Vec<String>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            top_tag_count: 10,
            links_per_tag: 2,
            excluded_top_tags: vec!["indie".to_string()],
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagNode {
    /// Dense 0-based id in window encounter order.
    pub id: usize,
    pub name: String,
    pub median_rating_count: Option<f64>,
    pub item_count: u32,
    pub category: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct TagLink {
    pub source: usize,
    pub target: usize,
    pub weight: u32,
}

/// Node-link graph of tag affinity for one aggregation window.
#[derive(Clone, Debug, Default, Serialize)]
pub struct TagGraph {
    pub nodes: Vec<TagNode>,
    pub links: Vec<TagLink>,
}

impl TagGraph {
    /// Name → category side table for cross-referencing with the
    /// time-series view.
    pub fn category_table(&self) -> HashMap<String, u32> {
        self.nodes
            .iter()
            .map(|node| (node.name.clone(), node.category))
            .collect()
    }
}

/// Relationship entries sorted by weight descending; equal weights fall back
/// to encounter order (ascending registry slot) so the ordering is total and
/// deterministic.
fn sorted_relationships(stat: &TagStat) -> Vec<(u32, u32)> {
    let mut entries: Vec<(u32, u32)> = stat
        .relationships
        .iter()
        .map(|(&tag, &weight)| (tag, weight))
        .collect();
    entries.sort_unstable_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    entries
}

/// The K tags with the highest item counts, in rank order.
///
/// The sort is stable, so tags with equal item counts keep their window
/// encounter order — an explicit tie-break, not an accident.
pub fn top_tags(window: &WindowStats, registry: &TagRegistry, config: &GraphConfig) -> Vec<u32> {
    let mut ranked: Vec<(u32, u32)> = window
        .iter()
        .filter(|stat| {
            let name = registry.name(stat.tag);
            !config.excluded_top_tags.iter().any(|excluded| excluded == name)
        })
        .map(|stat| (stat.tag, stat.item_count))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(config.top_tag_count);
    ranked.into_iter().map(|(tag, _)| tag).collect()
}

/// A top tag owns its rank as category; any other tag inherits the category
/// of the top tag it co-occurs with most strongly, or the uncategorized
/// bucket when it touches no top tag at all.
fn tag_category(stat: &TagStat, rank_by_tag: &HashMap<u32, u32>) -> u32 {
    if let Some(&rank) = rank_by_tag.get(&stat.tag) {
        return rank;
    }
    for (other, _weight) in sorted_relationships(stat) {
        if let Some(&rank) = rank_by_tag.get(&other) {
            return rank;
        }
    }
    UNCATEGORIZED_CATEGORY
}

/// Builds the tag affinity graph from one filtered, windowed aggregate.
pub fn build_tag_graph(
    window: &WindowStats,
    registry: &TagRegistry,
    config: &GraphConfig,
) -> TagGraph {
    let top = top_tags(window, registry, config);
    let rank_by_tag: HashMap<u32, u32> = top
        .iter()
        .enumerate()
        .map(|(rank, &tag)| (tag, rank as u32))
        .collect();

    let mut index_by_tag: HashMap<u32, usize> = HashMap::with_capacity(window.len());
    let mut nodes = Vec::with_capacity(window.len());
    for (id, stat) in window.iter().enumerate() {
        index_by_tag.insert(stat.tag, id);
        nodes.push(TagNode {
            id,
            name: registry.name(stat.tag).to_string(),
            median_rating_count: stat.median_rating_count,
            item_count: stat.item_count,
            category: tag_category(stat, &rank_by_tag),
        });
    }

    // Canonical pair -> first-written weight. Relationship symmetry means a
    // rediscovered pair should always carry the same weight; assert that
    // instead of relying on it silently.
    let mut seen: HashMap<(usize, usize), u32> = HashMap::new();
    let mut links = Vec::new();
    for stat in window.iter() {
        for (other, weight) in sorted_relationships(stat)
            .into_iter()
            .take(config.links_per_tag)
        {
            let (source_tag, target_tag) = if registry.name(stat.tag) < registry.name(other) {
                (stat.tag, other)
            } else {
                (other, stat.tag)
            };

            let (Some(&source), Some(&target)) =
                (index_by_tag.get(&source_tag), index_by_tag.get(&target_tag))
            else {
                warn!(
                    source = registry.name(source_tag),
                    target = registry.name(target_tag),
                    "dropping link with an endpoint missing from the node set"
                );
                continue;
            };

            match seen.entry((source, target)) {
                Entry::Vacant(entry) => {
                    entry.insert(weight);
                    links.push(TagLink {
                        source,
                        target,
                        weight,
                    });
                }
                Entry::Occupied(entry) => {
                    if *entry.get() != weight {
                        warn!(
                            source = registry.name(source_tag),
                            target = registry.name(target_tag),
                            kept = *entry.get(),
                            ignored = weight,
                            "duplicate link rediscovered with a different weight"
                        );
                    }
                }
            }
        }
    }

    TagGraph { nodes, links }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use super::{GraphConfig, TagGraph, UNCATEGORIZED_CATEGORY, build_tag_graph, top_tags};
    use crate::catalog::aggregate::{TagRegistry, aggregate_years, merge_window};
    use crate::catalog::records::ItemRecord;

    fn item(year: i32, rating_count: u32, tags: &[&str]) -> ItemRecord {
        ItemRecord {
            year,
            rating_count,
            tags: tags.iter().map(|tag| tag.to_string()).collect(),
        }
    }

    fn build(items: &[ItemRecord], config: &GraphConfig) -> (TagGraph, TagRegistry) {
        let mut registry = TagRegistry::new();
        for record in items {
            for tag in &record.tags {
                registry.intern(tag);
            }
        }
        let included: HashSet<u32> = (0..registry.len() as u32).collect();
        let by_year = aggregate_years(items, &included, &registry);
        let years: Vec<i32> = by_year.keys().copied().collect();
        let window = merge_window(&by_year, years);
        let graph = build_tag_graph(&window, &registry, config);
        (graph, registry)
    }

    fn node<'a>(graph: &'a TagGraph, name: &str) -> &'a super::TagNode {
        graph
            .nodes
            .iter()
            .find(|node| node.name == name)
            .unwrap_or_else(|| panic!("no node named {name}"))
    }

    fn config(top: usize) -> GraphConfig {
        GraphConfig {
            top_tag_count: top,
            ..GraphConfig::default()
        }
    }

    #[test]
    fn node_ids_are_dense_and_in_encounter_order() {
        let items = vec![
            item(2015, 1, &["rpg", "strategy"]),
            item(2015, 2, &["puzzle"]),
        ];
        let (graph, _) = build(&items, &GraphConfig::default());
        let names: Vec<&str> = graph.nodes.iter().map(|node| node.name.as_str()).collect();
        assert_eq!(names, ["rpg", "strategy", "puzzle"]);
        for (index, node) in graph.nodes.iter().enumerate() {
            assert_eq!(node.id, index);
        }
    }

    #[test]
    fn top_tag_selection_is_deterministic_and_stable() {
        let mut items = Vec::new();
        // "action" and "arcade" tie on item count; "action" is encountered first.
        for _ in 0..3 {
            items.push(item(2015, 1, &["action"]));
            items.push(item(2015, 1, &["arcade"]));
        }
        for _ in 0..5 {
            items.push(item(2015, 1, &["shooter"]));
        }

        let mut registry = TagRegistry::new();
        for record in &items {
            for tag in &record.tags {
                registry.intern(tag);
            }
        }
        let included: HashSet<u32> = (0..registry.len() as u32).collect();
        let by_year = aggregate_years(&items, &included, &registry);
        let window = merge_window(&by_year, [2015]);

        let first = top_tags(&window, &registry, &config(2));
        let second = top_tags(&window, &registry, &config(2));
        assert_eq!(first, second);
        assert_eq!(registry.name(first[0]), "shooter");
        assert_eq!(registry.name(first[1]), "action");
    }

    #[test]
    fn hard_excluded_tag_never_ranks() {
        let mut items = Vec::new();
        for _ in 0..10 {
            items.push(item(2015, 1, &["indie", "platformer"]));
        }
        let (graph, _) = build(&items, &config(1));
        assert_eq!(node(&graph, "platformer").category, 0);
        // "indie" still gets a node, categorized through its top relationship.
        assert_eq!(node(&graph, "indie").category, 0);
    }

    #[test]
    fn category_inherited_from_strongest_top_relationship() {
        let mut items = Vec::new();
        // Two anchors: "action" (most items) and "strategy".
        for _ in 0..20 {
            items.push(item(2015, 1, &["action"]));
        }
        for _ in 0..15 {
            items.push(item(2015, 1, &["strategy"]));
        }
        // "tactics" co-occurs 3x with action, 7x with strategy.
        for _ in 0..3 {
            items.push(item(2015, 1, &["tactics", "action"]));
        }
        for _ in 0..7 {
            items.push(item(2015, 1, &["tactics", "strategy"]));
        }

        let (graph, _) = build(&items, &config(2));
        assert_eq!(node(&graph, "action").category, 0);
        assert_eq!(node(&graph, "strategy").category, 1);
        assert_eq!(node(&graph, "tactics").category, 1);
    }

    #[test]
    fn tag_without_top_relationships_is_uncategorized() {
        let mut items = Vec::new();
        for _ in 0..10 {
            items.push(item(2015, 1, &["action"]));
        }
        items.push(item(2015, 1, &["niche", "obscure"]));
        let (graph, _) = build(&items, &config(1));
        assert_eq!(node(&graph, "niche").category, UNCATEGORIZED_CATEGORY);
        assert_eq!(node(&graph, "obscure").category, UNCATEGORIZED_CATEGORY);
    }

    #[test]
    fn no_duplicate_links_and_canonical_orientation() {
        let mut items = Vec::new();
        for _ in 0..4 {
            items.push(item(2015, 1, &["rpg", "strategy"]));
        }
        for _ in 0..2 {
            items.push(item(2015, 1, &["rpg", "puzzle"]));
        }
        let (graph, _) = build(&items, &GraphConfig::default());

        let mut pairs = HashSet::new();
        let names: HashMap<usize, &str> = graph
            .nodes
            .iter()
            .map(|node| (node.id, node.name.as_str()))
            .collect();
        for link in &graph.links {
            assert!(
                names[&link.source] < names[&link.target],
                "links are canonically oriented by name"
            );
            assert!(
                pairs.insert((link.source, link.target)),
                "unordered pair appears at most once"
            );
        }

        // rpg<->strategy discovered from both endpoints, stored once.
        let rpg = node(&graph, "rpg").id;
        let strategy = node(&graph, "strategy").id;
        let weights: Vec<u32> = graph
            .links
            .iter()
            .filter(|link| (link.source, link.target) == (rpg, strategy))
            .map(|link| link.weight)
            .collect();
        assert_eq!(weights, [4]);
    }

    #[test]
    fn category_table_matches_nodes() {
        let items = vec![item(2015, 1, &["rpg", "strategy"])];
        let (graph, _) = build(&items, &GraphConfig::default());
        let table = graph.category_table();
        assert_eq!(table.len(), graph.nodes.len());
        for node in &graph.nodes {
            assert_eq!(table[&node.name], node.category);
        }
    }
}
