use clap::Parser;
use std::path::PathBuf;

/// Convert a database changelog to another format for one target database.
///
/// SOURCE and --database are both required; they are declared optional so
/// a missing value prints usage instead of a clap error.
#[derive(Parser, Debug, Default)]
#[command(name = "liquify", version, about, long_about = None)]
pub struct Cli {
    /// Source changelog (.xml, .yaml, .yml, .json or formatted .sql).
    pub source: Option<PathBuf>,

    /// Target database identifier, e.g. mysql or postgresql.
    #[arg(short, long)]
    pub database: Option<String>,

    /// Output format: xml, yaml, yml, json or sql. Defaults to yaml.
    #[arg(short = 't', long = "type", value_name = "FORMAT")]
    pub target_format: Option<String>,

    /// Output structured JSON events to stdout.
    #[arg(long)]
    pub json: bool,

    /// Log every pipeline stage to stderr.
    #[arg(short, long)]
    pub verbose: bool,

    /// Print the JSON Schema of the --json event stream and exit.
    #[arg(long)]
    pub print_event_schema: bool,
}
