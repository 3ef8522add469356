// DETERMINISTIC SIMULATION
// ONE ManualScheduler TICK PER WINDOW, SEEDED RNG FOR EVERY DRAW.
// SAME ARGUMENTS, SAME OUTPUT.

use std::sync::Arc;

use anyhow::{bail, Result};
use clap::ValueEnum;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;

use adaptive_sampler::event::WindowLog;
use adaptive_sampler::workload::{Burst, Constant, Poisson, Repeating, WindowEvents};
use adaptive_sampler::{log_info, AdaptiveSampler, ManualScheduler, SamplerConfig, WindowRoll};

// BURST WINDOWS: QUIET SIZE AND FLOOD PROBABILITY
const BURST_LOW_EVENTS: u64 = 5;
const BURST_PROBABILITY: f64 = 0.1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Pattern {
    Constant,
    Burst,
    Poisson,
    Repeating,
}

fn build_workload(pattern: Pattern, events: u64, sequence: Vec<u64>, seed: u64) -> Result<Box<dyn WindowEvents>> {
    Ok(match pattern {
        Pattern::Constant => Box::new(Constant(events)),
        Pattern::Burst => Box::new(Burst::new(BURST_PROBABILITY, BURST_LOW_EVENTS, events, seed)),
        Pattern::Poisson => Box::new(Poisson::new(events as f64, seed)),
        Pattern::Repeating => {
            if sequence.is_empty() {
                bail!("--pattern repeating NEEDS --sequence (E.G. --sequence 1000,0,1000,0)");
            }
            Box::new(Repeating::new(sequence))
        }
    })
}

pub fn run_simulate(
    config: SamplerConfig,
    pattern: Pattern,
    windows: usize,
    events: u64,
    sequence: Vec<u64>,
    seed: u64,
    dump_log: bool,
) -> Result<()> {
    let mut workload = build_workload(pattern, events, sequence, seed)?;

    let log = Arc::new(Mutex::new(WindowLog::new()));
    let sink = Arc::clone(&log);
    let sampler = AdaptiveSampler::with_listener(config, move |roll: &WindowRoll| {
        sink.lock().record(roll);
    })?;
    // DROP THE CONSTRUCTION-TIME REPORT: IT IS NOT A WINDOW
    log.lock().clear();

    let scheduler = ManualScheduler::new();
    sampler.start(&scheduler)?;

    log_info!("SIMULATING {} WINDOWS OF {}", windows, workload.label());

    let mut rng = StdRng::seed_from_u64(seed ^ 0x5a5a_5a5a);
    for _ in 0..windows {
        let n = workload.next_window();
        for _ in 0..n {
            sampler.sample_with(&mut rng);
        }
        scheduler.tick();
    }
    sampler.stop();

    let log = log.lock();
    if dump_log {
        log.dump();
    }
    log.summary(config.samples_per_window);
    Ok(())
}
