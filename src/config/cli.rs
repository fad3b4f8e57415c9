use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the Agencia operator binary.
#[derive(Debug, Parser)]
#[command(
    name = "agencia",
    version,
    about = "Agency site content and briefing tool"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "AGENCIA_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: GlobalOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// List published articles, newest first.
    Articles,
    /// Show one published article by slug.
    Article(SlugArgs),
    /// List authors.
    Authors,
    /// Print aggregate analytics over published articles.
    Stats,
    /// Record a view for a published article.
    View(SlugArgs),
    /// Run a briefing through the wizard and dispatch it.
    Briefing(BriefingArgs),
}

#[derive(Debug, Args, Clone)]
pub struct SlugArgs {
    /// Article slug.
    #[arg(value_name = "SLUG")]
    pub slug: String,
}

#[derive(Debug, Args, Clone)]
pub struct BriefingArgs {
    /// JSON file holding the briefing answers.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub file: PathBuf,

    /// Override the wizard locale (pt|en|es).
    #[arg(long, value_name = "LOCALE")]
    pub locale: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Override the backend base URL.
    #[arg(long = "backend-url", value_name = "URL", global = true)]
    pub backend_url: Option<String>,

    /// Override the backend public API key.
    #[arg(long = "backend-anon-key", value_name = "KEY", global = true)]
    pub backend_anon_key: Option<String>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,
}
