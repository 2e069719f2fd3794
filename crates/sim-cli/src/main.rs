//! Saga scheduling simulator driver.
//!
//! Two commands:
//! - `generate` writes a random saga set to JSON
//! - `run` sweeps simulation configurations (saga-set sizes × processor
//!   counts × strategies) over a saga set, fanning the runs out across
//!   worker OS threads and printing one report line per run
//!
//! stdout carries report lines; progress and diagnostics go to stderr.

use chrono::Local;
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use sim_core::{
    LogConfig, LogContext, Orchestrator, ProcessingMode, Report, RunConfig, SimError, SimpleSaga,
};
use sim_gen::{export_sagas, generate_sagas, import_sagas, GenError, GeneratorConfig};
use sim_time::Duration;
use std::collections::VecDeque;
use std::fs;
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Gen(#[from] GenError),

    #[error(transparent)]
    Sim(#[from] SimError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("worker failure: {0}")]
    Worker(String),

    #[error("processor counts must be at least 1")]
    InvalidProcessors,
}

/// Saga scheduling simulator: compares overloaded, fixed-pool, and
/// cooperative strategies on simulated processors.
#[derive(Parser)]
#[command(name = "saga-sim", version, about)]
struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a random saga set and write it to a JSON file
    Generate {
        /// Number of sagas to generate
        #[arg(long, default_value_t = 2000)]
        count: usize,

        /// Destination JSON file
        #[arg(long)]
        output: PathBuf,

        /// Seed for reproducible generation
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Run simulation campaigns over a saga set
    Run {
        /// Saga-set JSON file; a fresh set is generated when omitted
        #[arg(long)]
        sagas: Option<PathBuf>,

        /// Number of sagas to generate when no file is given
        #[arg(long, default_value_t = 100)]
        count: usize,

        /// Seed for reproducible generation
        #[arg(long)]
        seed: Option<u64>,

        /// Processor counts to sweep, comma separated
        #[arg(long, value_delimiter = ',', default_value = "2,4")]
        processors: Vec<usize>,

        /// Saga-set sizes to sweep (prefixes of the set); defaults to the
        /// whole set
        #[arg(long, value_delimiter = ',')]
        saga_sets: Option<Vec<usize>>,

        /// Threaded strategies to run, comma separated
        #[arg(long, value_enum, value_delimiter = ',', default_values_t = vec![ProcessingMode::Overloaded, ProcessingMode::FixedPool])]
        modes: Vec<ProcessingMode>,

        /// Also run the coroutines orchestrator
        #[arg(long)]
        coroutines: bool,

        /// Virtual tick length in microseconds
        #[arg(long, default_value_t = 1)]
        tick_micros: i64,

        /// Publish interim reports every this many milliseconds of virtual
        /// time
        #[arg(long)]
        publish_every_millis: Option<i64>,

        /// Worker threads; defaults to the machine's parallelism
        #[arg(long)]
        workers: Option<usize>,

        /// Report log file; defaults to out/<timestamp>.log
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy)]
enum Strategy {
    Threaded(ProcessingMode),
    Coroutines,
}

/// One simulation to run: a strategy, a processor count, and its own deep
/// copy of the saga set.
struct Job {
    name: String,
    strategy: Strategy,
    processors: usize,
    sagas: Vec<SimpleSaga>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level);
    if let Err(err) = dispatch(cli.command) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal());
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

fn dispatch(command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Generate {
            count,
            output,
            seed,
        } => generate(count, &output, seed),
        Commands::Run {
            sagas,
            count,
            seed,
            processors,
            saga_sets,
            modes,
            coroutines,
            tick_micros,
            publish_every_millis,
            workers,
            output,
        } => {
            if processors.iter().any(|&p| p == 0) {
                return Err(CliError::InvalidProcessors);
            }
            let saga_set = load_sagas(sagas.as_deref(), count, seed)?;
            let run_config = RunConfig {
                tick_length: Duration::from_micros(tick_micros),
                ..RunConfig::default()
            };
            let publish_every = publish_every_millis.map(Duration::from_millis);
            let jobs = build_jobs(&saga_set, &processors, saga_sets, &modes, coroutines);
            run_jobs(jobs, run_config, publish_every, workers, output)
        }
    }
}

fn generate(count: usize, output: &std::path::Path, seed: Option<u64>) -> Result<(), CliError> {
    let config = GeneratorConfig::default();
    let sagas = match seed {
        Some(seed) => generate_sagas(&mut StdRng::seed_from_u64(seed), count, &config)?,
        None => generate_sagas(&mut rand::rng(), count, &config)?,
    };
    export_sagas(output, &sagas)?;
    println!("Generated {count} sagas into {}", output.display());
    Ok(())
}

fn load_sagas(
    path: Option<&std::path::Path>,
    count: usize,
    seed: Option<u64>,
) -> Result<Vec<SimpleSaga>, CliError> {
    match path {
        Some(path) => Ok(import_sagas(path)?),
        None => {
            let config = GeneratorConfig::default();
            let sagas = match seed {
                Some(seed) => generate_sagas(&mut StdRng::seed_from_u64(seed), count, &config)?,
                None => generate_sagas(&mut rand::rng(), count, &config)?,
            };
            Ok(sagas)
        }
    }
}

fn build_jobs(
    saga_set: &[SimpleSaga],
    processors: &[usize],
    saga_sets: Option<Vec<usize>>,
    modes: &[ProcessingMode],
    coroutines: bool,
) -> Vec<Job> {
    let sizes = saga_sets.unwrap_or_else(|| vec![saga_set.len()]);
    let mut jobs = Vec::new();
    for &size in &sizes {
        let size = if size > saga_set.len() {
            tracing::warn!(requested = size, available = saga_set.len(), "saga set clamped");
            saga_set.len()
        } else {
            size
        };
        for &proc_count in processors {
            for &mode in modes {
                jobs.push(Job {
                    name: format!("{mode}[p={proc_count}, s={size}]"),
                    strategy: Strategy::Threaded(mode),
                    processors: proc_count,
                    sagas: saga_set[..size].to_vec(),
                });
            }
            if coroutines {
                jobs.push(Job {
                    name: format!("coroutines[p={proc_count}, s={size}]"),
                    strategy: Strategy::Coroutines,
                    processors: proc_count,
                    sagas: saga_set[..size].to_vec(),
                });
            }
        }
    }
    jobs
}

fn run_job(
    job: Job,
    run_config: RunConfig,
    publish_every: Option<Duration>,
) -> Result<(Report, Vec<Report>), SimError> {
    let mut log_config = LogConfig::new(job.name.as_str(), run_config.tick_length);
    if let Some(every) = publish_every {
        log_config = log_config.publish_every(every);
    }
    let mut orchestrator = match job.strategy {
        Strategy::Threaded(mode) => Orchestrator::threaded(job.processors, mode, run_config),
        Strategy::Coroutines => Orchestrator::coroutines(job.processors, run_config),
    };
    let sagas = job.sagas;
    let (elapsed, report, interim) =
        LogContext::run_logging(log_config, || orchestrator.process(sagas))?;
    tracing::debug!(run = %report.log_name, %elapsed, "run finished");
    Ok((report, interim))
}

fn run_jobs(
    jobs: Vec<Job>,
    run_config: RunConfig,
    publish_every: Option<Duration>,
    workers: Option<usize>,
    output: Option<PathBuf>,
) -> Result<(), CliError> {
    let total = jobs.len();
    if total == 0 {
        println!("Nothing to run");
        return Ok(());
    }

    let output_path = output.unwrap_or_else(|| {
        PathBuf::from(format!("out/{}.log", Local::now().format("%Y.%m.%d_%H-%M-%S")))
    });
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut log_file = fs::File::create(&output_path)?;
    write_intro(&mut log_file, &jobs)?;

    let worker_count = workers
        .unwrap_or_else(|| {
            thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(1)
        })
        .clamp(1, total);
    tracing::info!(jobs = total, workers = worker_count, "starting simulations");

    let queue: Arc<Mutex<VecDeque<Job>>> = Arc::new(Mutex::new(jobs.into()));
    let (sender, receiver) = mpsc::channel();

    let mut handles = Vec::new();
    for _ in 0..worker_count {
        let queue = Arc::clone(&queue);
        let sender = sender.clone();
        handles.push(thread::spawn(move || loop {
            let job = match queue.lock() {
                Ok(mut queue) => queue.pop_front(),
                Err(_) => None,
            };
            let Some(job) = job else { break };
            let name = job.name.clone();
            let outcome = run_job(job, run_config, publish_every);
            if sender.send((name, outcome)).is_err() {
                break;
            }
        }));
    }
    drop(sender);

    let use_color = std::io::stdout().is_terminal();
    let mut finished = 0;
    let mut failures = Vec::new();
    display_progress(finished, total);
    for (name, outcome) in receiver {
        finished += 1;
        display_progress(finished, total);
        match outcome {
            Ok((report, interim)) => {
                for entry in &interim {
                    writeln!(log_file, "  interim: {entry}")?;
                }
                writeln!(log_file, "{report}")?;
                println!("{}", format_report(&report, use_color));
            }
            Err(err) => {
                writeln!(log_file, "{name} failed: {err}")?;
                failures.push((name, err));
            }
        }
    }
    eprintln!();

    for handle in handles {
        handle
            .join()
            .map_err(|_| CliError::Worker("worker thread panicked".to_string()))?;
    }

    if failures.is_empty() {
        writeln!(log_file, "Simulation successfully finished!")?;
        println!("Simulation successfully finished! Reports stored in {}", output_path.display());
        Ok(())
    } else {
        for (name, err) in &failures {
            eprintln!("{name} failed: {err}");
        }
        Err(CliError::Worker(format!("{} of {} runs failed", failures.len(), total)))
    }
}

fn write_intro(log_file: &mut fs::File, jobs: &[Job]) -> Result<(), CliError> {
    writeln!(log_file, "Running {} simulations:", jobs.len())?;
    for job in jobs {
        writeln!(log_file, "* {}", job.name)?;
    }
    Ok(())
}

fn format_report(report: &Report, use_color: bool) -> String {
    let (green, reset) = if use_color { ("\x1b[32m", "\x1b[0m") } else { ("", "") };
    format!("{green}✓{reset} {report}")
}

fn display_progress(current: usize, total: usize) {
    const BAR_LENGTH: usize = 20;
    let percent = current * 100 / total.max(1);
    let filled = (percent * BAR_LENGTH / 100).min(BAR_LENGTH);
    let arrow = format!("{}>", "-".repeat(filled.saturating_sub(1)));
    let spaces = " ".repeat(BAR_LENGTH.saturating_sub(arrow.len()));
    eprint!("\rProgress: [{arrow}{spaces}] {percent} %");
}
