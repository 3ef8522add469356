// SAMPLER CONFIGURATION
// FIXED AT CONSTRUCTION, IMMUTABLE THEREAFTER.

use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(1);
pub const DEFAULT_SAMPLES_PER_WINDOW: u64 = 100;
pub const DEFAULT_LOOKBACK: u32 = 16;

// THE BUDGET IS SIGNED: THE TARGET MUST FIT IN IT
pub const MAX_SAMPLES_PER_WINDOW: u64 = i64::MAX as u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SamplerConfig {
    /// Length of one sampling window.
    pub window: Duration,
    /// Target number of accepted events per window.
    pub samples_per_window: u64,
    /// Number of windows the event-volume EMA approximates.
    pub lookback: u32,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            samples_per_window: DEFAULT_SAMPLES_PER_WINDOW,
            lookback: DEFAULT_LOOKBACK,
        }
    }
}

impl SamplerConfig {
    pub fn new(window: Duration, samples_per_window: u64, lookback: u32) -> Self {
        Self { window, samples_per_window, lookback }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.is_zero() {
            return Err(ConfigError::ZeroWindow(self.window));
        }
        if self.samples_per_window == 0 {
            return Err(ConfigError::ZeroSamplesPerWindow);
        }
        if self.samples_per_window > MAX_SAMPLES_PER_WINDOW {
            return Err(ConfigError::SamplesPerWindowTooLarge(self.samples_per_window));
        }
        if self.lookback == 0 {
            return Err(ConfigError::ZeroLookback);
        }
        Ok(())
    }
}
