//! hdfs-sink binary.
//!
//! Entry point for the `hdfs-sink` command-line tool.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use hdfs_sink::exit::{codes, exit_code};
use hdfs_sink::{execute_send, Cli, CommandError, SendResult};
use hdfs_sink_fs::{LocalFilesystem, WebHdfsFilesystem};
use hdfs_sink_log::{LogLevel, TracingLogger};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(result) => {
            print_summary(&result);
            if result.records_failed > 0 {
                ExitCode::from(codes::SEND_FAILURES as u8)
            } else {
                ExitCode::from(codes::SUCCESS as u8)
            }
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(exit_code(&e) as u8)
        }
    }
}

/// Log to stderr; `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let default = LogLevel::from_verbosity(verbose).as_directive();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<SendResult, CommandError> {
    cli.validate()?;
    let config = cli.load_config()?;
    let input = open_input(cli.input.as_deref())?;
    let logger = TracingLogger::new();

    match &cli.local_root {
        Some(root) => execute_send(config, input, LocalFilesystem::new(root), logger),
        None => {
            let mut fs = WebHdfsFilesystem::with_timeout(Duration::from_secs(cli.timeout))?;
            if cli.https {
                fs = fs.https();
            }
            execute_send(config, input, fs, logger)
        }
    }
}

fn open_input(path: Option<&Path>) -> Result<Box<dyn BufRead>, CommandError> {
    match path {
        Some(path) => {
            let file = File::open(path).map_err(|source| CommandError::OpenInput {
                path: path.display().to_string(),
                source,
            })?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(io::stdin().lock())),
    }
}

fn print_summary(result: &SendResult) {
    println!("Records sent: {}", result.records_sent);
    if result.records_failed > 0 {
        println!("Records failed: {}", result.records_failed);
    }
    if result.blank_lines > 0 {
        println!("Blank lines skipped: {}", result.blank_lines);
    }
    match (&result.last_file, result.last_sequence) {
        (Some(file), Some(sequence)) => println!("Last file: {} (sequence {})", file, sequence),
        _ => println!("No files written"),
    }
}
