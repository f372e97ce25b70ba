//! Run options and the configuration that produces them.

mod config;
mod run_options;

pub use config::{
    build_run_options, load_run_config, parse_run_config, RunDescriptor, ScopeDescriptor,
};
pub use run_options::{OptionKey, RunOptions, ScopeSource};
