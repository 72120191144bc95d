//! Command-line interface for archive password recovery.
//!
//! Searches a numeric password space for a RAR or ZIP archive and extracts
//! it once the password is confirmed.

use clap::error::ErrorKind;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use recovery::{recover, OverwriteMode, SearchConfig, SearchEvent, SearchOutcome, SearchReport};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "rar-recover")]
#[command(version, about = "Recover numeric archive passwords", long_about = None)]
struct Cli {
    /// Archive file to recover
    archive: PathBuf,

    /// Number of digits per candidate
    #[arg(long, default_value = "8")]
    digits: u32,

    /// First candidate to test
    #[arg(long, default_value = "0")]
    start: u64,

    /// Last candidate to test (defaults to all nines)
    #[arg(long)]
    end: Option<u64>,

    /// Number of worker threads (defaults to available cores)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Output directory (defaults to `extracted` next to the archive)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Overwrite mode: replace, skip, rename
    #[arg(long, default_value = "rename", value_parser = parse_overwrite)]
    overwrite: OverwriteMode,

    /// Size limit in bytes for the extracted contents
    #[arg(long)]
    size_limit: Option<u64>,

    /// Give up after this many seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Output events and the final report as JSON lines
    #[arg(long)]
    json: bool,
}

fn parse_overwrite(value: &str) -> Result<OverwriteMode, String> {
    match value.to_lowercase().as_str() {
        "replace" => Ok(OverwriteMode::Replace),
        "skip" => Ok(OverwriteMode::Skip),
        "rename" => Ok(OverwriteMode::Rename),
        other => Err(format!(
            "unknown overwrite mode '{}' (expected replace, skip or rename)",
            other
        )),
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            process::exit(0);
        }
        Err(e) => {
            let _ = e.print();
            process::exit(1);
        }
    };

    match run(cli).await {
        Ok(()) => {}
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = SearchConfig {
        width: cli.digits,
        lower: cli.start,
        upper: cli.end,
        workers: cli.workers,
        output_dir: cli.out,
        overwrite: cli.overwrite,
        ..SearchConfig::default()
    };
    if cli.size_limit.is_some() {
        config.size_limit_bytes = cli.size_limit;
    }

    let cancel_flag = Arc::new(AtomicBool::new(false));
    {
        let cancel_flag = cancel_flag.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            cancel_flag.store(true, Ordering::Relaxed);
        }) {
            warn!(error = %e, "cannot install interrupt handler");
        }
    }

    let json = cli.json;
    let bar = if json {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(0)
    };
    let bar_for_events = bar.clone();
    let on_event = move |event: &SearchEvent| {
        if json {
            print_json(event);
        } else {
            show_event(&bar_for_events, event);
        }
    };

    let archive = cli.archive;
    let cancel_for_search = cancel_flag.clone();
    let mut search =
        tokio::task::spawn_blocking(move || recover(&archive, &config, &on_event, cancel_for_search));

    let joined = match cli.timeout {
        Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), &mut search).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!(timeout_secs = secs, "deadline reached, stopping search");
                cancel_flag.store(true, Ordering::Relaxed);
                search.await
            }
        },
        None => search.await,
    };
    bar.finish_and_clear();

    let report = joined??;
    if json {
        print_json(&report);
    } else {
        print_report(&report);
    }

    Ok(())
}

fn show_event(bar: &ProgressBar, event: &SearchEvent) {
    match event {
        SearchEvent::Started {
            lower,
            upper,
            workers,
            ..
        } => {
            let style = ProgressStyle::with_template(
                "{spinner} [{elapsed_precise}] {wide_bar} {pos}/{len} ({per_sec}, eta {eta})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar());
            bar.set_style(style);
            bar.set_length(upper - lower + 1);
            bar.set_message(format!("{} workers", workers));
        }
        SearchEvent::Progress { tested, .. } => bar.set_position(*tested),
        SearchEvent::CandidateAccepted { candidate, .. } => {
            bar.println(format!("Potential password found: {}, verifying...", candidate));
        }
        SearchEvent::FalsePositive { candidate, .. } => {
            bar.println(format!("False positive: {}, continuing search", candidate));
        }
        SearchEvent::Finished { tested, .. } => bar.set_position(*tested),
        _ => {}
    }
}

fn print_report(report: &SearchReport) {
    match &report.outcome {
        SearchOutcome::Found(password) => {
            println!("Password found: {}", password);
            if let Some(dir) = &report.output_dir {
                println!("Extracted to: {}", dir.display());
            }
        }
        SearchOutcome::Exhausted => println!("Password not found"),
        SearchOutcome::Cancelled => println!("Search cancelled"),
    }

    info!(
        tested = report.tested,
        attempts = report.attempts,
        false_positives = report.false_positives.len(),
        elapsed = ?report.elapsed,
        "search summary"
    );
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(line) => println!("{}", line),
        Err(e) => warn!(error = %e, "cannot serialize output"),
    }
}
