use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

use crate::domain::types::{Collection, DerivedCounter};

/// Command-line arguments for the socio binary.
#[derive(Debug, Parser)]
#[command(name = "socio", version, about = "Socio derived-state cache administration")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "SOCIO_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: GlobalOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Recompute derived counters from their detail records.
    Resync(ResyncArgs),
    /// Delete every cached list view of a collection.
    Purge(PurgeArgs),
    /// Apply database migrations.
    Migrate,
}

#[derive(Debug, Args, Clone)]
pub struct ResyncArgs {
    /// Counter to recompute; every counter when omitted.
    #[arg(long, value_name = "COUNTER", value_parser = parse_counter)]
    pub counter: Option<DerivedCounter>,

    /// Recompute a single subject instead of every row.
    #[arg(long, value_name = "ID", requires = "counter")]
    pub subject: Option<i64>,
}

#[derive(Debug, Args, Clone)]
pub struct PurgeArgs {
    /// Collection namespace (`eventos`, `noticias`, `productos`).
    #[arg(long, value_name = "NAMESPACE", value_parser = parse_collection)]
    pub collection: Collection,
}

#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Override the database URL.
    #[arg(long = "database-url", env = "SOCIO_DATABASE_URL", global = true)]
    pub database_url: Option<String>,

    /// Cache backend (`memory` or `redis`).
    #[arg(long = "cache-backend", global = true)]
    pub cache_backend: Option<String>,

    /// Override the Redis URL.
    #[arg(long = "redis-url", env = "SOCIO_REDIS_URL", global = true)]
    pub redis_url: Option<String>,

    /// Participant count source (`primary` or `legacy_list`).
    #[arg(long = "participants-source", global = true)]
    pub participants_source: Option<String>,

    /// Override the log level.
    #[arg(long = "log-level", global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,
}

fn parse_counter(value: &str) -> Result<DerivedCounter, String> {
    value.parse()
}

fn parse_collection(value: &str) -> Result<Collection, String> {
    value.parse()
}
