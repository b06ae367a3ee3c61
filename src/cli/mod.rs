//! Command-line interface components
//!
//! Argument parsing, command handlers and the terminal progress display.

pub mod args;
pub mod commands;
pub mod progress;

pub use args::{
    Cli, Commands, ConfigAction, ConfigArgs, FetchArgs, GlobalArgs, PlanArgs, ResolveArgs,
};
pub use commands::{handle_config, handle_fetch, handle_plan, handle_resolve};
pub use progress::{ProgressConfig, ProgressDisplay};
