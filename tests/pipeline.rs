//! End-to-end: raw records through aggregation, filtering, graph building,
//! and a settled force layout.

use std::collections::HashSet;

use tagnet::catalog::{
    self, GraphConfig, TagRegistry, UNCATEGORIZED_CATEGORY,
};
use tagnet::sim::{SimConfig, SimState, Simulation};

fn record(year: i32, rating_count: u32, tags: &[&str]) -> catalog::ItemRecord {
    catalog::ItemRecord {
        year,
        rating_count,
        tags: tags.iter().map(|tag| tag.to_string()).collect(),
    }
}

/// Two well-supported anchor tags across 2013-2014, one satellite tag that
/// leans on "rpg", and one tag too rare to survive the filter.
fn fixture() -> Vec<catalog::ItemRecord> {
    let mut records = Vec::new();
    for year in [2013, 2014] {
        for index in 0..8 {
            records.push(record(year, 10 + index, &["rpg", "fantasy"]));
        }
        for index in 0..7 {
            records.push(record(year, 30 + index, &["strategy"]));
        }
        for index in 0..6 {
            records.push(record(year, 5 + index, &["fantasy", "rpg", "dungeon crawler"]));
        }
    }
    records.push(record(2013, 1, &["obscure", "rpg"]));
    records
}

#[test]
fn pipeline_produces_a_settled_layout() {
    let records = fixture();

    let mut registry = TagRegistry::new();
    let counts = catalog::tag_counts_by_year(&records, &mut registry);
    let reference_years: Vec<i32> = counts.keys().copied().collect();
    let included = catalog::included_tags(&counts, &reference_years, 5, &registry);

    // 14 rpg/fantasy items and 6 dungeon-crawler items per year beat the
    // threshold; one "obscure" item does not.
    assert!(included.contains(&registry.get("rpg").unwrap()));
    assert!(included.contains(&registry.get("dungeon crawler").unwrap()));
    assert!(!included.contains(&registry.get("obscure").unwrap()));

    let per_year = catalog::aggregate_years(&records, &included, &registry);
    let window = catalog::merge_window(&per_year, 2013..=2014);

    // The filtered tag leaves no trace in anyone's relationships.
    for stat in window.iter() {
        assert!(!stat
            .relationships
            .keys()
            .any(|&tag| registry.name(tag) == "obscure"));
    }

    let config = GraphConfig {
        top_tag_count: 2,
        ..GraphConfig::default()
    };
    let graph = catalog::build_tag_graph(&window, &registry, &config);

    // rpg (28 items) and fantasy (28) out-rank strategy (14); dungeon
    // crawler inherits its strongest anchor's category; strategy, with no
    // co-occurrences at all, lands in the uncategorized bucket.
    let by_name: std::collections::HashMap<&str, &catalog::TagNode> = graph
        .nodes
        .iter()
        .map(|node| (node.name.as_str(), node))
        .collect();
    assert_eq!(by_name["rpg"].category, 0);
    assert_eq!(by_name["fantasy"].category, 1);
    assert_eq!(by_name["dungeon crawler"].category, 0);
    assert_eq!(by_name["strategy"].category, UNCATEGORIZED_CATEGORY);

    let mut seen = HashSet::new();
    for link in &graph.links {
        assert!(seen.insert((link.source, link.target)), "duplicate link");
        assert!(link.weight >= 1);
    }

    let categories = graph.category_table();
    assert_eq!(categories["dungeon crawler"], 0);

    let mut sim = Simulation::new(graph, SimConfig::default());
    let steps = sim.run();
    assert!(steps > 0);
    assert_eq!(sim.state(), SimState::Settled);

    let frame = sim.frame();
    assert_eq!(frame.positions.len(), 4);
    for &(x, y) in &frame.positions {
        assert!(x.is_finite() && y.is_finite());
    }
    for node in sim.nodes() {
        assert!(node.vel.length() < 1.0, "layout still moving after settle");
    }
}

#[test]
fn parsed_records_feed_the_same_pipeline() {
    let raw = r#"[
        {"year": 2013, "ratingCount": 12, "tags": ["rpg", "open_world"]},
        {"year": 2013, "tags": ["dropped"]},
        {"year": 2014, "ratingCount": 3, "tags": ["rpg", "open_world"]}
    ]"#;
    let records = catalog::parse_records(raw).unwrap();
    assert_eq!(records.len(), 2);

    let mut registry = TagRegistry::new();
    let counts = catalog::tag_counts_by_year(&records, &mut registry);
    let included = catalog::included_tags(&counts, &[2013, 2014], 0, &registry);
    assert_eq!(included.len(), 2);
    assert!(registry.get("open world").is_some(), "separators normalized");
    assert!(registry.get("dropped").is_none(), "malformed record ignored");

    let per_year = catalog::aggregate_years(&records, &included, &registry);
    let window = catalog::merge_window(&per_year, 2013..=2014);
    let rpg = window.get(registry.get("rpg").unwrap()).unwrap();
    assert_eq!(rpg.item_count, 2);
    assert_eq!(rpg.median_rating_count, Some(7.5));
}
