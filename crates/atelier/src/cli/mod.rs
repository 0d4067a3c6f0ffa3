//! Command-line interface module.

mod commands;
mod progress;
mod render;
mod run;

pub use commands::{Cli, Commands};
pub use render::render_file;
pub use run::{list_providers, run_generation};
