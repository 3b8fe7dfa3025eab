use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{Parser, ValueEnum};
use tracing::{debug, trace};
use tracing_subscriber::EnvFilter;

use rust_map_reduce::execution::{Job, JobOptions, TracingObserver};
use rust_map_reduce::jobs::item_pairs;
use rust_map_reduce::{JobError, JobResult};

/// Report item pairs that occur together in more than THRESHOLD baskets
#[derive(Parser, Debug)]
#[command(name = "item-pairs", version, long_about = None)]
struct Cli {
    /// Input file, directory, or glob pattern of basket records
    input: String,

    /// Report pairs seen in at least this many baskets
    #[arg(short, long, default_value_t = item_pairs::DEFAULT_THRESHOLD)]
    threshold: usize,

    /// Worker threads per stage (overrides the config file)
    #[arg(short, long)]
    workers: Option<usize>,

    /// JSON file with job options
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Lines)]
    format: Format,

    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Lines,
    Csv,
    JsonLines,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => return usage_error(e),
    };

    init_tracing(cli.verbose);
    debug!(verbosity = cli.verbose, "item-pairs started");
    trace!(?cli, "parsed arguments");

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e @ JobError::NotFound { .. }) => {
            debug!(error = %e, "input missing");
            eprintln!("Input file not found. Please enter correct file name.");
            exit_code(&e)
        }
        Err(e) => {
            eprintln!("error: {e}");
            exit_code(&e)
        }
    }
}

fn run(cli: &Cli) -> JobResult<()> {
    let mut options = match &cli.config {
        Some(path) => JobOptions::from_json_path(path)?,
        None => JobOptions::default(),
    };
    if let Some(workers) = cli.workers {
        options.map_workers = Some(workers);
        options.reduce_workers = Some(workers);
    }

    let mut job = Job::new(item_pairs::mapper, item_pairs::reducer(cli.threshold))
        .with_combiner(item_pairs::combiner)
        .with_options(options)
        .with_observer(std::sync::Arc::new(TracingObserver));
    let pairs = job.run(&cli.input)?;

    let out = io::stdout().lock();
    match cli.format {
        Format::Lines => pairs.write_lines(out),
        Format::Csv => pairs.write_csv(out),
        Format::JsonLines => pairs.write_json_lines(out),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "error",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(verbose >= 2)
        .with_thread_ids(verbose >= 2)
        .init();
}

fn usage_error(e: clap::Error) -> ExitCode {
    match e.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = e.print();
            ExitCode::SUCCESS
        }
        ErrorKind::MissingRequiredArgument | ErrorKind::UnknownArgument => {
            eprintln!("Expecting one argument.\nUsage: item-pairs [OPTIONS] <INPUT>");
            ExitCode::from(1)
        }
        _ => {
            let _ = e.print();
            ExitCode::from(1)
        }
    }
}

fn exit_code(e: &JobError) -> ExitCode {
    ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
}
