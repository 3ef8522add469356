// SAMPLER ERRORS
// CONSTRUCTION AND LIFECYCLE ONLY. THE HOT PATH AND THE WINDOW ROLL
// HAVE NO ERROR CONDITIONS.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("window duration must be positive (got {0:?})")]
    ZeroWindow(Duration),

    #[error("samples per window must be at least 1")]
    ZeroSamplesPerWindow,

    #[error("samples per window must fit in a signed 64-bit budget (got {0})")]
    SamplesPerWindowTooLarge(u64),

    #[error("lookback must be at least 1 window")]
    ZeroLookback,
}

#[derive(Debug, Error)]
pub enum SamplerError {
    #[error("invalid sampler configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("sampler window roll is already scheduled")]
    AlreadyStarted,
}
