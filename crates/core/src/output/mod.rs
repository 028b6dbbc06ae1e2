pub mod output_map;

pub use output_map::{OutputMap, OutputSink};
