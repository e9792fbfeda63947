pub mod env;
pub mod pipeline_config;
pub mod progress_bars;
pub mod rate_limit;
