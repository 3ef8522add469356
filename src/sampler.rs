// ADAPTIVE SAMPLER CORE
// DOUBLE-BUFFERED WINDOWS, LOCK-FREE HOT PATH, ONE ROLL PER WINDOW PERIOD
//
// TWO CALLER CLASSES, ZERO LOCKS ON THE HOT PATH:
//   PRODUCERS: sample()/keep()/drop_event() FROM ANY THREAD. READ THE ACTIVE
//              SLOT, BUMP ITS ATOMICS, READ THE PUBLISHED PROBABILITY/BUDGET.
//   ROLL:      roll_window() ONCE PER PERIOD. SWAPS THE ACTIVE SLOT, RUNS THE
//              CONTROLLER ON THE RETIRED COUNTS, PUBLISHES, RESETS.
//
// PUBLISHED PARAMETERS ARE RELAXED SINGLE-WORD STORES. A PRODUCER SEEING LAST
// WINDOW'S VALUE FOR A MOMENT IS ACCEPTED; THE NEXT ROLL ABSORBS THE DRIFT.

use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rand::Rng;

use crate::config::SamplerConfig;
use crate::control::Controller;
use crate::error::{ConfigError, SamplerError};
use crate::scheduler::{PeriodicScheduler, TaskHandle, TaskStatus};
use crate::window::Window;

pub use crate::control::WindowRoll;

// --- LISTENER ---

/// Receives the controller output once at construction and after every roll.
pub trait WindowListener: Send + Sync {
    fn on_window_roll(&self, roll: &WindowRoll);
}

impl<F> WindowListener for F
where
    F: Fn(&WindowRoll) + Send + Sync,
{
    fn on_window_roll(&self, roll: &WindowRoll) {
        self(roll)
    }
}

// --- DIAGNOSTICS ---

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SamplerSnapshot {
    pub active_slot: usize,
    pub probability: f64,
    pub samples_budget: i64,
    pub tested: u64,
    pub sampled: u64,
}

// --- SAMPLER ---

pub struct AdaptiveSampler {
    config: SamplerConfig,
    windows: [Window; 2],
    active: AtomicUsize,
    probability: AtomicU64,
    samples_budget: AtomicI64,
    controller: Mutex<Controller>,
    listener: Option<Box<dyn WindowListener>>,
    task: Mutex<Option<TaskHandle>>,
}

impl AdaptiveSampler {
    /// Build an unscheduled sampler. Nothing rolls the window until
    /// [`AdaptiveSampler::start`] is called (or `roll_window` is driven by hand).
    pub fn new(config: SamplerConfig) -> Result<Arc<Self>, ConfigError> {
        Self::build(config, None)
    }

    pub fn with_listener<L>(config: SamplerConfig, listener: L) -> Result<Arc<Self>, ConfigError>
    where
        L: WindowListener + 'static,
    {
        Self::build(config, Some(Box::new(listener)))
    }

    /// Build and immediately register the window roll with `scheduler`.
    pub fn scheduled(
        config: SamplerConfig,
        scheduler: &dyn PeriodicScheduler,
    ) -> Result<Arc<Self>, SamplerError> {
        let sampler = Self::new(config)?;
        sampler.start(scheduler)?;
        Ok(sampler)
    }

    fn build(
        config: SamplerConfig,
        listener: Option<Box<dyn WindowListener>>,
    ) -> Result<Arc<Self>, ConfigError> {
        config.validate()?;

        let controller = Controller::new(config.samples_per_window, config.lookback);
        let initial = controller.initial();

        let sampler = Self {
            config,
            windows: [Window::new(), Window::new()],
            active: AtomicUsize::new(0),
            probability: AtomicU64::new(initial.probability.to_bits()),
            samples_budget: AtomicI64::new(initial.budget),
            controller: Mutex::new(controller),
            listener,
            task: Mutex::new(None),
        };

        if let Some(listener) = &sampler.listener {
            listener.on_window_roll(&initial);
        }

        Ok(Arc::new(sampler))
    }

    // --- LIFECYCLE ---

    // THE REGISTERED CLOSURE HOLDS ONLY A Weak. ONCE EVERY OWNER DROPS THE
    // SAMPLER THE NEXT TICK REPORTS Done AND THE SCHEDULER FORGETS IT.
    pub fn start(self: &Arc<Self>, scheduler: &dyn PeriodicScheduler) -> Result<(), SamplerError> {
        let mut task = self.task.lock();
        if task.is_some() {
            return Err(SamplerError::AlreadyStarted);
        }

        let weak = Arc::downgrade(self);
        let handle = scheduler.schedule_at_fixed_rate(
            self.config.window,
            Box::new(move || match weak.upgrade() {
                Some(sampler) => {
                    sampler.roll_window();
                    TaskStatus::Continue
                }
                None => TaskStatus::Done,
            }),
        );
        *task = Some(handle);

        log_debug!(
            window_ms = self.config.window.as_millis() as u64,
            samples_per_window = self.config.samples_per_window,
            lookback = self.config.lookback,
            "sampler window roll scheduled"
        );
        Ok(())
    }

    // CANCEL THE PERIODIC ROLL. PRODUCERS KEEP RUNNING ON THE LAST PUBLISHED
    // PROBABILITY AND BUDGET (FIXED, NON-ADAPTIVE).
    pub fn stop(&self) -> bool {
        match self.task.lock().take() {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_started(&self) -> bool {
        self.task.lock().as_ref().is_some_and(|h| !h.is_cancelled())
    }

    // --- HOT PATH ---

    // thread_rng() SETS UP ITS THREAD-LOCAL STATE ON A THREAD'S FIRST CALL.
    // LATENCY-CRITICAL CALLERS PASS THEIR OWN RNG TO sample_with.
    pub fn sample(&self) -> bool {
        self.sample_with(&mut rand::thread_rng())
    }

    pub fn sample_with<R: Rng>(&self, rng: &mut R) -> bool {
        let window = self.active_window();
        window.add_test();
        if rng.gen::<f64>() < self.probability() {
            window.add_sample(self.samples_budget.load(Ordering::Relaxed))
        } else {
            false
        }
    }

    // FORCED DECISIONS STILL FEED THE CONTROLLER
    pub fn keep(&self) -> bool {
        let window = self.active_window();
        window.add_test();
        window.add_sample_unbounded();
        true
    }

    pub fn drop_event(&self) -> bool {
        self.active_window().add_test();
        false
    }

    fn active_window(&self) -> &Window {
        &self.windows[self.active.load(Ordering::Acquire)]
    }

    // --- WINDOW ROLL ---

    // SERIALIZED BY try_lock: AN OVERLAPPING CALL IS SKIPPED, NEVER RUN CONCURRENTLY.
    // RETURNS None ONLY WHEN SKIPPED.
    pub fn roll_window(&self) -> Option<WindowRoll> {
        let Some(mut controller) = self.controller.try_lock() else {
            log_warn!("window roll already in progress, skipping overlapping invocation");
            return None;
        };

        // SWAP FIRST SO NEW PRODUCERS LAND IN THE FRESH WINDOW WHILE WE MEASURE
        let retiring = self.active.load(Ordering::Acquire);
        self.active.store((retiring + 1) % 2, Ordering::Release);

        let window = &self.windows[retiring];
        let roll = controller.update(window.tested(), window.sampled());

        self.samples_budget.store(roll.budget, Ordering::Relaxed);
        self.probability.store(roll.probability.to_bits(), Ordering::Relaxed);

        window.reset();

        log_debug!(
            total = roll.total_count,
            sampled = roll.sampled_count,
            budget = roll.budget,
            average = roll.total_average,
            probability = roll.probability,
            "window rolled"
        );

        if let Some(listener) = &self.listener {
            listener.on_window_roll(&roll);
        }
        Some(roll)
    }

    // --- ACCESSORS ---

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    pub fn probability(&self) -> f64 {
        f64::from_bits(self.probability.load(Ordering::Relaxed))
    }

    pub fn samples_budget(&self) -> i64 {
        self.samples_budget.load(Ordering::Relaxed)
    }

    pub fn active_slot(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Read-only view of one of the two window slots (0 or 1).
    pub fn window(&self, slot: usize) -> &Window {
        &self.windows[slot % 2]
    }

    pub fn snapshot(&self) -> SamplerSnapshot {
        let active_slot = self.active_slot();
        let window = &self.windows[active_slot];
        SamplerSnapshot {
            active_slot,
            probability: self.probability(),
            samples_budget: self.samples_budget(),
            tested: window.tested(),
            sampled: window.sampled(),
        }
    }
}

impl std::fmt::Debug for AdaptiveSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdaptiveSampler")
            .field("config", &self.config)
            .field("snapshot", &self.snapshot())
            .finish()
    }
}
