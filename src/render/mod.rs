pub mod filters;
pub mod merge;

pub use filters::{build_filter_graph, FilterGraph};
pub use merge::{run_merge, MergePlan, MergeReport, RecordSource};
