// ADAPTIVE SAMPLER -- WINDOWED, FEEDBACK-CONTROLLED EVENT SAMPLING
//
// simulate: DETERMINISTIC WINDOW-BY-WINDOW REPLAY OF A SYNTHETIC WORKLOAD
// run:      LIVE PRODUCER THREADS AGAINST A REAL PERIODIC ROLL THREAD

mod cli;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use adaptive_sampler::config::{DEFAULT_LOOKBACK, DEFAULT_SAMPLES_PER_WINDOW};
use adaptive_sampler::SamplerConfig;

use cli::simulate::Pattern;

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

#[derive(Parser)]
#[command(name = "adaptive-sampler")]
#[command(about = "ADAPTIVE SAMPLER -- WINDOWED, FEEDBACK-CONTROLLED EVENT SAMPLING")]
struct Cli {
    // SAMPLING WINDOW IN MILLISECONDS
    #[arg(long, global = true, default_value_t = 1000)]
    window_ms: u64,

    // TARGET ACCEPTED EVENTS PER WINDOW
    #[arg(long, global = true, default_value_t = DEFAULT_SAMPLES_PER_WINDOW)]
    samples_per_window: u64,

    // WINDOWS APPROXIMATED BY THE EVENT-VOLUME EMA
    #[arg(long, global = true, default_value_t = DEFAULT_LOOKBACK)]
    lookback: u32,

    // DEBUG-LEVEL LOGGING (ONE LINE PER WINDOW ROLL)
    #[arg(long, global = true)]
    verbose: bool,

    // DUMP FULL WINDOW LOG ON EXIT
    #[arg(long, global = true)]
    dump_log: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a synthetic workload window by window (no wall clock)
    Simulate {
        #[arg(long, value_enum, default_value_t = Pattern::Constant)]
        pattern: Pattern,

        // NUMBER OF WINDOWS TO ROLL
        #[arg(long, default_value_t = 120)]
        windows: usize,

        // EVENTS PER WINDOW (CONSTANT), MEAN (POISSON), BURST SIZE (BURST)
        #[arg(long, default_value_t = 1000)]
        events: u64,

        // COMMA-SEPARATED EVENTS PER WINDOW FOR --pattern repeating
        #[arg(long, value_delimiter = ',')]
        sequence: Vec<u64>,

        #[arg(long, default_value_t = 12345671)]
        seed: u64,
    },
    /// Drive a live sampler from producer threads (CTRL+C TO STOP)
    Run {
        #[arg(long, default_value_t = 4)]
        threads: usize,

        // sample() CALLS PER SECOND, PER THREAD
        #[arg(long, default_value_t = 10_000)]
        rate: u64,

        // STOP AFTER THIS MANY SECONDS (DEFAULT: UNTIL CTRL+C)
        #[arg(long)]
        seconds: Option<u64>,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = SamplerConfig::new(
        Duration::from_millis(cli.window_ms),
        cli.samples_per_window,
        cli.lookback,
    );
    config.validate()?;

    println!("ADAPTIVE SAMPLER");
    println!("WINDOW:          {} ms", cli.window_ms);
    println!("SAMPLES/WINDOW:  {}", config.samples_per_window);
    println!("LOOKBACK:        {}", config.lookback);
    println!("VERBOSE:         {}", cli.verbose);
    println!();

    match cli.command {
        Command::Simulate { pattern, windows, events, sequence, seed } => {
            cli::simulate::run_simulate(config, pattern, windows, events, sequence, seed, cli.dump_log)
        }
        Command::Run { threads, rate, seconds } => {
            ctrlc::set_handler(move || {
                SHUTDOWN.store(true, Ordering::Relaxed);
            })?;
            cli::run::run_live(config, threads, rate, seconds, cli.dump_log, &SHUTDOWN)
        }
    }
}
