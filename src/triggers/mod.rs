mod change_trigger;
mod loader;
mod pattern;
mod pipeline;
mod selector;

pub use change_trigger::ChangeTrigger;
pub use loader::{
    load_pipelines, load_pipelines_dir, load_pipelines_file, parse_pipeline,
    parse_pipelines_file,
};
pub use pattern::{matches, PatternMatcher};
pub use pipeline::Pipeline;
pub use selector::{get_triggered, PipelineSelector};
