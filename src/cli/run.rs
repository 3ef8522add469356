// LIVE RUN
// PRODUCER THREADS PACE sample() CALLS AGAINST THE WALL CLOCK.
// A ThreadScheduler ROLLS THE WINDOW. CTRL+C (OR --seconds) STOPS EVERYTHING.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use parking_lot::Mutex;

use adaptive_sampler::event::WindowLog;
use adaptive_sampler::{log_info, log_warn, AdaptiveSampler, SamplerConfig, ThreadScheduler, WindowRoll};

const PACE_TICK: Duration = Duration::from_millis(1);

pub fn run_live(
    config: SamplerConfig,
    threads: usize,
    rate: u64,
    seconds: Option<u64>,
    dump_log: bool,
    shutdown: &'static AtomicBool,
) -> Result<()> {
    if threads == 0 {
        bail!("--threads MUST BE AT LEAST 1");
    }

    let log = Arc::new(Mutex::new(WindowLog::new()));
    let sink = Arc::clone(&log);
    let sampler = AdaptiveSampler::with_listener(config, move |roll: &WindowRoll| {
        log_info!(
            "events: {:<8} sampled: {:<6} budget: {:<6} avg: {:<10.1} prob: {:.4}",
            roll.total_count, roll.sampled_count, roll.budget, roll.total_average, roll.probability
        );
        sink.lock().record(roll);
    })?;
    log.lock().clear();

    let scheduler = ThreadScheduler::new("sampler-roll");
    sampler.start(&scheduler)?;

    println!("ADAPTIVE SAMPLER IS ACTIVE ({} THREADS x {} EVENTS/S, CTRL+C TO EXIT)", threads, rate);

    let kept = Arc::new(AtomicU64::new(0));
    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let sampler = Arc::clone(&sampler);
            let kept = Arc::clone(&kept);
            thread::Builder::new()
                .name(format!("producer-{}", i))
                .spawn(move || produce(&sampler, rate, &kept, shutdown))
        })
        .collect::<std::io::Result<_>>()?;

    let started = Instant::now();
    while !shutdown.load(Ordering::Relaxed) {
        if let Some(limit) = seconds {
            if started.elapsed() >= Duration::from_secs(limit) {
                shutdown.store(true, Ordering::Relaxed);
                break;
            }
        }
        thread::sleep(Duration::from_millis(100));
    }

    println!("ADAPTIVE SAMPLER IS SHUTTING DOWN");
    sampler.stop();
    join_producers(handles);

    let log = log.lock();
    if dump_log {
        log.dump();
    }
    log.summary(config.samples_per_window);
    println!("  KEPT (ALL THREADS): {}", kept.load(Ordering::Relaxed));
    Ok(())
}

// JOIN EVERY PRODUCER, LOGGING THE ONES THAT PANICKED. RETURNS HOW MANY DID.
fn join_producers(handles: Vec<JoinHandle<()>>) -> usize {
    let mut panicked = 0;
    for h in handles {
        let name = h.thread().name().unwrap_or("producer").to_string();
        if h.join().is_err() {
            log_warn!("{} PANICKED, ITS EVENTS ARE MISSING FROM THE SUMMARY", name);
            panicked += 1;
        }
    }
    panicked
}

// CATCH UP TO rate * elapsed, THEN NAP. KEEPS LONG-RUN RATE EXACT
// WITHOUT ONE SLEEP PER EVENT.
fn produce(sampler: &AdaptiveSampler, rate: u64, kept: &AtomicU64, shutdown: &AtomicBool) {
    let start = Instant::now();
    let mut done = 0u64;
    while !shutdown.load(Ordering::Relaxed) {
        let due = (start.elapsed().as_secs_f64() * rate as f64) as u64;
        while done < due {
            if sampler.sample() {
                kept.fetch_add(1, Ordering::Relaxed);
            }
            done += 1;
        }
        thread::sleep(PACE_TICK);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_counts_panicked_producers() {
        let handles = vec![
            thread::Builder::new().name("producer-0".into()).spawn(|| {}).unwrap(),
            thread::Builder::new()
                .name("producer-1".into())
                .spawn(|| {
                    panic!("producer failure");
                })
                .unwrap(),
            thread::Builder::new().name("producer-2".into()).spawn(|| {}).unwrap(),
        ];
        assert_eq!(join_producers(handles), 1);
    }

    #[test]
    fn join_clean_producers() {
        let handles: Vec<_> = (0..4).map(|_| thread::spawn(|| {})).collect();
        assert_eq!(join_producers(handles), 0);
    }
}
