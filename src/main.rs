use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};

use table_merge::cli::{
    self, CancelTrigger, Cli, Command, EXIT_CONFIG, InspectArgs, RunArgs, format_elapsed,
};
use table_merge::config::ImportConfig;
use table_merge::engine::channel::JobReport;
use table_merge::engine::{JobPoll, start_job};
use table_merge::source::inspect;
use table_merge::util::envfile::{load_dotenv_if_present, write_env_template};

fn main() {
    // .env first so it can configure logging too
    let dotenv = load_dotenv_if_present();
    table_merge::logging::init_from_env();
    match dotenv {
        Ok(n) if n > 0 => info!("loaded {} variables from .env", n),
        Ok(_) => {}
        Err(e) => warn!("ignoring unreadable .env: {:#}", e),
    }

    let cli = Cli::parse();
    let code = match cli.command {
        Command::Run(args) => run_merge(&args),
        Command::Inspect(args) => run_inspect(&args).map(|_| 0),
        Command::EnvTemplate { path } => write_env_template(&path)
            .with_context(|| format!("failed to write {}", path))
            .map(|_| {
                println!("Wrote {}. Copy to .env and edit values as needed.", path);
                0
            }),
    };
    match code {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(cli::EXIT_FAILED);
        }
    }
}

fn run_merge(args: &RunArgs) -> Result<i32> {
    let cfg = match args.to_merge_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return Ok(EXIT_CONFIG);
        }
    };
    info!(
        "merging {} with {} -> {} ({} conditions, {} columns)",
        cfg.file1,
        cfg.file2,
        cfg.output,
        cfg.match_pairs.len(),
        cfg.columns.len()
    );
    let poll = Duration::from_millis(cfg.engine.poll_interval_ms.max(1));
    let mut trigger = CancelTrigger::new(
        cli::install_interrupt_handler().context("failed to install Ctrl-C handler")?,
        args.cancel_after_batches,
    );
    let started = Instant::now();
    let mut handle = start_job(cfg).context("failed to start merge worker")?;
    let mut batches = 0usize;

    let report = loop {
        let update = handle.poll();
        batches += print_update(started, &update);
        if let Some(report) = update.finished {
            break report;
        }
        if trigger.should_cancel(batches) {
            warn!(
                "cancel requested after {} batches, stopping at the next batch boundary",
                batches
            );
            if !handle.cancel() {
                warn!("worker already gone, cancel not delivered");
            }
        }
        if handle.is_finished() {
            // worker exited; pick up anything sent just before it did
            let last = handle.poll();
            print_update(started, &last);
            break match last.finished {
                Some(report) => report,
                None => handle.join(),
            };
        }
        std::thread::sleep(poll);
    };

    let elapsed = format_elapsed(started.elapsed());
    match &report {
        JobReport::Completed { output, summary } => {
            for (label, value) in summary.lines() {
                println!("  {:<36} {}", label, value);
            }
            println!("[{}] Completed: saved {}", elapsed, output);
        }
        JobReport::Cancelled { processed } => {
            println!(
                "[{}] Cancelled after {} rows; no output written",
                elapsed, processed
            );
        }
        JobReport::Failed { kind, reason } => {
            eprintln!("[{}] Failed ({} error): {}", elapsed, kind, reason);
        }
    }
    Ok(cli::exit_code(&report))
}

/// Prints log and progress lines; returns the number of matching batches seen.
fn print_update(started: Instant, update: &JobPoll) -> usize {
    for line in cli::status_lines(started.elapsed(), update) {
        if line.to_stderr {
            eprintln!("{}", line.text);
        } else {
            println!("{}", line.text);
        }
    }
    cli::matching_batches(update)
}

fn run_inspect(args: &InspectArgs) -> Result<()> {
    let mut import = ImportConfig::default();
    if let Some(c) = args.delimiter {
        import.delimiter = cli::delimiter_byte(c)?;
    }
    let info = inspect(&args.file, &import, args.rows)
        .with_context(|| format!("failed to read {}", args.file))?;
    println!("File: {}", info.path);
    println!("Rows: {}", info.row_count);
    println!("Columns ({}): {}", info.columns.len(), info.columns.join(", "));
    if !info.preview.is_empty() {
        println!();
        println!("{}", info.columns.join("\t"));
        for row in info.preview.rows() {
            let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            println!("{}", cells.join("\t"));
        }
    }
    Ok(())
}
