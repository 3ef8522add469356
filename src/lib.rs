// ADAPTIVE SAMPLER
// WINDOWED, FEEDBACK-CONTROLLED EVENT SAMPLING
//
// PRODUCERS ASK "KEEP THIS EVENT?" FROM ANY THREAD, LOCK-FREE.
// ONCE PER WINDOW THE CONTROLLER RETIRES THE ACTIVE COUNTERS, RUNS A PID
// STEP ON THE SAMPLE BUDGET, BLENDS THE EVENT VOLUME INTO AN EMA AND
// PUBLISHES THE NEXT ACCEPTANCE PROBABILITY.
//
// PURE MATH LIVES IN control.rs (NO ATOMICS, TESTABLE OFFLINE).

// --- LOGGING ---

// THIN WRAPPERS SO CALL SITES READ THE SAME EVERYWHERE.
// THE BINARY DECIDES WHERE THE EVENTS GO (tracing-subscriber).
// DEFINED BEFORE THE MODULES SO THEY ARE IN TEXTUAL SCOPE FOR ALL OF THEM.

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => { ::tracing::info!($($arg)*) };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => { ::tracing::warn!($($arg)*) };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => { ::tracing::debug!($($arg)*) };
}

pub mod config;
pub mod control;
pub mod error;
pub mod event;
pub mod sampler;
pub mod scheduler;
pub mod window;
pub mod workload;

pub use config::SamplerConfig;
pub use error::{ConfigError, SamplerError};
pub use sampler::{AdaptiveSampler, SamplerSnapshot, WindowListener, WindowRoll};
pub use scheduler::{ManualScheduler, PeriodicScheduler, TaskHandle, TaskStatus, ThreadScheduler};
