//! CLI command definitions.

use atelier_core::{Format, HistoryPolicy};
use atelier_render::AsciiStyle;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Atelier - generate drawings with a language model and refine them step by step
#[derive(Parser, Debug)]
#[command(name = "atelier")]
#[command(
    about = "Generate SVG and ASCII drawings with a language model and refine them step by step",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Configuration file layered over the bundled defaults
    #[arg(long, global = true, env = "ATELIER_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a generation
    Run(RunArgs),

    /// Render one artifact body to PNG without calling a model
    Render(RenderArgs),

    /// List providers and whether a credential is available
    Providers,
}

/// Arguments of `atelier run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// What to draw
    #[arg(long, short)]
    pub prompt: String,

    /// Target format
    #[arg(long)]
    pub format: Option<FormatArg>,

    /// Width in pixels, or columns for ASCII
    #[arg(long)]
    pub width: Option<u32>,

    /// Height in pixels, or lines for ASCII
    #[arg(long)]
    pub height: Option<u32>,

    /// Provider id
    #[arg(long)]
    pub provider: Option<String>,

    /// Model id
    #[arg(long)]
    pub model: Option<String>,

    /// Base URL overriding the provider default
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Number of steps
    #[arg(long)]
    pub max_steps: Option<u32>,

    /// Which earlier steps are sent back to the model
    #[arg(long)]
    pub history: Option<HistoryArg>,

    /// End the run when a step produces nothing that renders
    #[arg(long)]
    pub stop_when_nothing_renders: bool,

    /// Reference image sent with every step (repeatable)
    #[arg(long = "image")]
    pub images: Vec<PathBuf>,

    /// Directory for blobs and snapshots
    #[arg(long)]
    pub storage_dir: Option<PathBuf>,

    /// Completion token cap
    #[arg(long)]
    pub max_output_tokens: Option<u32>,

    /// Sampling temperature
    #[arg(long)]
    pub temperature: Option<f32>,
}

/// Arguments of `atelier render`.
#[derive(Args, Debug)]
pub struct RenderArgs {
    /// File holding the body, or a model reply with a fenced block
    pub file: PathBuf,

    /// Body format
    #[arg(long)]
    pub format: Option<FormatArg>,

    /// Width for ASCII grids
    #[arg(long)]
    pub width: Option<u32>,

    /// Height for ASCII grids
    #[arg(long)]
    pub height: Option<u32>,

    /// ASCII grid style
    #[arg(long)]
    pub style: Option<StyleArg>,

    /// Output path; defaults to the input path with a `.png` extension
    #[arg(long)]
    pub out: Option<PathBuf>,
}

/// Format options
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum FormatArg {
    /// SVG markup
    Svg,
    /// ASCII art
    Ascii,
}

impl From<FormatArg> for Format {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Svg => Format::Svg,
            FormatArg::Ascii => Format::Ascii,
        }
    }
}

/// History options
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum HistoryArg {
    /// Every earlier step
    Full,
    /// Only the previous step
    Last,
}

impl From<HistoryArg> for HistoryPolicy {
    fn from(arg: HistoryArg) -> Self {
        match arg {
            HistoryArg::Full => HistoryPolicy::Full,
            HistoryArg::Last => HistoryPolicy::LastOnly,
        }
    }
}

/// ASCII style options
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum StyleArg {
    /// Green on black
    Crt,
    /// Ink on paper
    Teletype,
}

impl From<StyleArg> for AsciiStyle {
    fn from(arg: StyleArg) -> Self {
        match arg {
            StyleArg::Crt => AsciiStyle::Crt,
            StyleArg::Teletype => AsciiStyle::Teletype,
        }
    }
}
