use clap::Parser;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::cli::Cli;

pub const DEFAULT_FORMAT: &str = "yaml";

/// Validated view of the command line for one conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionArguments {
    source: Option<PathBuf>,
    database: Option<String>,
    target_format: Option<String>,
}

impl ConversionArguments {
    pub fn new(
        source: Option<PathBuf>,
        database: Option<String>,
        target_format: Option<String>,
    ) -> Self {
        Self {
            source,
            database,
            target_format: target_format.map(|f| f.trim().trim_start_matches('.').to_lowercase()),
        }
    }

    pub fn from_cli(cli: &Cli) -> Self {
        Self::new(
            cli.source.clone(),
            cli.database.clone(),
            cli.target_format.clone(),
        )
    }

    /// Parse raw tokens (program name first). Anything clap rejects yields
    /// arguments that are not valid.
    pub fn parse_from<I, T>(tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        match Cli::try_parse_from(tokens) {
            Ok(cli) => Self::from_cli(&cli),
            Err(err) => {
                tracing::debug!(error = %err, "rejected command line");
                Self::default()
            }
        }
    }

    pub fn source(&self) -> &Path {
        self.source.as_deref().unwrap_or_else(|| Path::new(""))
    }

    pub fn database(&self) -> &str {
        self.database.as_deref().unwrap_or_default()
    }

    /// Requested output format, lowercase, defaulting to yaml.
    pub fn target_format(&self) -> &str {
        match self.target_format.as_deref() {
            Some(f) if !f.is_empty() => f,
            _ => DEFAULT_FORMAT,
        }
    }

    /// Source and database present, source an existing readable file.
    /// The database and format become part of the output filename, so
    /// neither may name another directory.
    pub fn are_valid(&self) -> bool {
        let Some(source) = self.source.as_deref() else {
            return false;
        };
        if source.as_os_str().is_empty() || self.database().trim().is_empty() {
            return false;
        }
        if !is_name_segment(self.database()) || !is_name_segment(self.target_format()) {
            tracing::debug!(database = self.database(), format = self.target_format(), "rejected filename segment");
            return false;
        }
        source.is_file() && std::fs::File::open(source).is_ok()
    }
}

fn is_name_segment(value: &str) -> bool {
    !value.contains(['/', '\\', '\0'])
}

pub fn usage() -> String {
    [
        "Usage: liquify [OPTIONS] <SOURCE> --database <DATABASE>",
        "",
        "Converts a changelog to another format, keeping only the changesets",
        "that apply to the given database.",
        "",
        "Options:",
        "  -d, --database <DATABASE>  target database, e.g. mysql, postgresql (required)",
        "  -t, --type <FORMAT>        xml, yaml, yml, json or sql [default: yaml]",
        "      --json                 print structured events instead of plain messages",
        "  -v, --verbose              log each stage to stderr",
        "      --print-event-schema   print the JSON Schema of the --json events",
        "",
        "Example: liquify -t sql -d postgresql db/changelog.xml",
    ]
    .join("\n")
}

pub fn print_usage() {
    println!("{}", usage());
}
