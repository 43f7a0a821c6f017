mod aggregate;
mod filter;
mod graph;
mod records;

pub use aggregate::{
    SeriesPoint, TagRegistry, TagStat, WindowStats, aggregate_years, merge_window, yearly_series,
};
pub use filter::{SUPPORT_THRESHOLD, included_tags, tag_counts_by_year};
pub use graph::{
    GraphConfig, TagGraph, TagLink, TagNode, UNCATEGORIZED_CATEGORY, build_tag_graph,
};
pub use records::{ItemRecord, load_records, parse_records};
