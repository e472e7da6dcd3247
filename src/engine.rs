use anyhow::Result;
use std::path::PathBuf;
use std::time::Instant;

use crate::arguments::{ConversionArguments, print_usage};
use crate::cli::Cli;
use crate::error::ConvertError;
use crate::events::Event;
use crate::exit_codes::exit;
use crate::filter;
use crate::loader;
use crate::parser::ParserRegistry;
use crate::reporter::Reporter;
use crate::resource::{FileSystemResourceAccessor, ResourceAccessor};
use crate::serializer::SerializerRegistry;
use crate::target;
use crate::transaction::OutputTransaction;

/// Outcome of a successful conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionSummary {
    pub target: PathBuf,
    pub parsed: usize,
    pub written: usize,
    pub bytes: u64,
}

/// Runs conversions against one resource root with a fixed set of
/// parsers and serializers.
pub struct Converter<'a> {
    accessor: &'a dyn ResourceAccessor,
    parsers: ParserRegistry,
    serializers: SerializerRegistry,
}

impl<'a> Converter<'a> {
    pub fn new(accessor: &'a dyn ResourceAccessor) -> Self {
        Self::with_registries(accessor, ParserRegistry::default(), SerializerRegistry::default())
    }

    pub fn with_registries(
        accessor: &'a dyn ResourceAccessor,
        parsers: ParserRegistry,
        serializers: SerializerRegistry,
    ) -> Self {
        Self {
            accessor,
            parsers,
            serializers,
        }
    }

    /// Convert `args.source()` into the derived target file. On any failure
    /// the target is removed before the error is returned.
    pub fn convert(
        &self,
        args: &ConversionArguments,
        reporter: &mut Reporter,
    ) -> Result<ConversionSummary, ConvertError> {
        let run_id = uuid::Uuid::new_v4();
        let target = target::build_filename(args);
        reporter.record(Event::ConversionStarted {
            run_id,
            ts: chrono::Utc::now(),
            source: args.source().to_path_buf(),
            target: PathBuf::from(&target),
            database: args.database().to_string(),
        });

        let mut txn = OutputTransaction::begin(&target);
        match self.run_pipeline(run_id, args, &target, &mut txn, reporter) {
            Ok(summary) => {
                txn.commit();
                Ok(summary)
            }
            Err(err) => {
                tracing::debug!(error = %err, "conversion failed");
                if txn.rollback() {
                    reporter.record(Event::TargetRemoved {
                        run_id,
                        target: txn.target().to_path_buf(),
                    });
                }
                Err(err)
            }
        }
    }

    fn run_pipeline(
        &self,
        run_id: uuid::Uuid,
        args: &ConversionArguments,
        target: &str,
        txn: &mut OutputTransaction,
        reporter: &mut Reporter,
    ) -> Result<ConversionSummary, ConvertError> {
        let source = args.source().to_string_lossy();
        let changelog = loader::load_changelog(&source, self.accessor, &self.parsers)?;
        let parsed = changelog.change_sets.len();
        tracing::debug!(source = %source, change_sets = parsed, "parsed changelog");
        reporter.record(Event::ChangelogParsed {
            run_id,
            change_sets: parsed,
        });

        let retained = filter::filter_for_database(&changelog, args.database());
        tracing::debug!(database = args.database(), kept = retained.len(), "filtered changesets");
        reporter.record(Event::ChangeSetsFiltered {
            run_id,
            kept: retained.len(),
            dropped: parsed - retained.len(),
        });

        let rewritten = filter::rewrite_paths(&retained, target);
        let serializer = self.serializers.lookup(target)?;
        let bytes = txn.write_with(|out| serializer.write(&rewritten, out))?;
        reporter.record(Event::OutputWritten {
            run_id,
            target: PathBuf::from(target),
            change_sets: rewritten.len(),
            bytes,
        });

        Ok(ConversionSummary {
            target: PathBuf::from(target),
            parsed,
            written: rewritten.len(),
            bytes,
        })
    }
}

/// Entry point for the binary: usage on invalid arguments, otherwise one
/// conversion rooted at the working directory.
pub fn run(cli: &Cli) -> Result<i32> {
    let args = ConversionArguments::from_cli(cli);
    if !args.are_valid() {
        print_usage();
        return Ok(exit::SUCCESS);
    }

    let accessor = FileSystemResourceAccessor::current_dir()?;
    let mut reporter = Reporter::new(cli.json);
    Ok(convert_and_report(&Converter::new(&accessor), &args, &mut reporter))
}

/// Run one conversion and turn its outcome into user output and an exit code.
pub fn convert_and_report(
    converter: &Converter<'_>,
    args: &ConversionArguments,
    reporter: &mut Reporter,
) -> i32 {
    let started = Instant::now();
    match converter.convert(args, reporter) {
        Ok(summary) => {
            tracing::info!(
                target_file = %summary.target.display(),
                size = %bytesize::ByteSize(summary.bytes),
                elapsed = %humantime::format_duration(started.elapsed()),
                "{}",
                reporter.summary()
            );
            exit::SUCCESS
        }
        Err(err) => {
            let message = err.user_message(args.database());
            let run_id = run_id_of(reporter);
            reporter.record(Event::ConversionFailed {
                run_id,
                message: message.clone(),
                error: err.to_string(),
            });
            reporter.message(&message);
            exit::CONVERSION_FAILURE
        }
    }
}

fn run_id_of(reporter: &Reporter) -> uuid::Uuid {
    reporter
        .events()
        .iter()
        .find_map(|e| match e {
            Event::ConversionStarted { run_id, .. } => Some(*run_id),
            _ => None,
        })
        .unwrap_or_default()
}
