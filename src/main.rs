use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use tagnet::catalog::{
    self, GraphConfig, SUPPORT_THRESHOLD, SeriesPoint, TagRegistry,
};
use tagnet::color::category_color;
use tagnet::sim::{SimConfig, Simulation, node_radius};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// JSON array of item records: {"year", "ratingCount", "tags"}.
    #[arg(long)]
    input: PathBuf,
    /// First year of the aggregation window.
    #[arg(long, default_value_t = 2013)]
    from: i32,
    /// Last year of the aggregation window, inclusive.
    #[arg(long, default_value_t = 2018)]
    to: i32,
    /// Per-year item count a tag must exceed to stay included.
    #[arg(long, default_value_t = SUPPORT_THRESHOLD)]
    support: u32,
    /// Canvas width for the layout.
    #[arg(long, default_value_t = 950.0)]
    width: f32,
    /// Canvas height for the layout.
    #[arg(long, default_value_t = 925.0)]
    height: f32,
    /// Simulation step cap.
    #[arg(long, default_value_t = 1000)]
    max_steps: usize,
    /// Write the layout document here instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlacedNode {
    id: usize,
    name: String,
    median_rating_count: Option<f64>,
    item_count: u32,
    category: u32,
    color: String,
    x: f32,
    y: f32,
    radius: f32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlacedLink {
    source: usize,
    target: usize,
    weight: u32,
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
}

/// Everything the rendering collaborators consume: the positioned graph,
/// the name -> category side table, and the per-year series for the
/// time-series view.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LayoutDocument {
    nodes: Vec<PlacedNode>,
    links: Vec<PlacedLink>,
    categories: HashMap<String, u32>,
    series: Vec<SeriesPoint>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let args = Args::parse();
    let records = catalog::load_records(&args.input)?;
    info!(records = records.len(), "loaded item records");

    let mut registry = TagRegistry::new();
    let counts_by_year = catalog::tag_counts_by_year(&records, &mut registry);
    let reference_years: Vec<i32> = counts_by_year.keys().copied().collect();
    let included =
        catalog::included_tags(&counts_by_year, &reference_years, args.support, &registry);
    info!(
        observed = registry.len(),
        included = included.len(),
        "applied inclusion filter"
    );

    let per_year = catalog::aggregate_years(&records, &included, &registry);
    let window = catalog::merge_window(&per_year, args.from..=args.to);
    let graph = catalog::build_tag_graph(&window, &registry, &GraphConfig::default());
    info!(
        nodes = graph.nodes.len(),
        links = graph.links.len(),
        from = args.from,
        to = args.to,
        "built tag graph"
    );

    let categories = graph.category_table();
    let series = catalog::yearly_series(&per_year, &registry);

    let sim_config = SimConfig {
        width: args.width,
        height: args.height,
        max_steps: args.max_steps,
        ..SimConfig::default()
    };
    let mut sim = Simulation::new(graph, sim_config);
    let steps = sim.run();
    info!(steps, "layout settled");

    let frame = sim.frame();
    let nodes = sim
        .graph()
        .nodes
        .iter()
        .zip(frame.positions.iter())
        .map(|(node, &(x, y))| PlacedNode {
            id: node.id,
            name: node.name.clone(),
            median_rating_count: node.median_rating_count,
            item_count: node.item_count,
            category: node.category,
            color: category_color(node.category).hex(),
            x,
            y,
            radius: node_radius(node.item_count),
        })
        .collect();
    let links = sim
        .graph()
        .links
        .iter()
        .zip(frame.edges.iter())
        .map(|(link, &((x1, y1), (x2, y2)))| PlacedLink {
            source: link.source,
            target: link.target,
            weight: link.weight,
            x1,
            y1,
            x2,
            y2,
        })
        .collect();

    let document = LayoutDocument {
        nodes,
        links,
        categories,
        series,
    };
    let json = serde_json::to_string_pretty(&document).context("failed to encode layout")?;

    match &args.output {
        Some(path) => fs::write(path, json)
            .with_context(|| format!("failed to write layout to {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}
