// ADAPTIVE SAMPLER CONTROL MATH
// PURE-RUST MODULE: NO ATOMICS, NO THREADS
// SHARED BETWEEN sampler.rs (WINDOW ROLL) AND THE INTEGRATION TESTS

// PID GAINS
// SIMPLIFIED FORM: INTEGRAL OF RAW ERROR, RAW ERROR AS THE "DERIVATIVE" TERM,
// ERROR NORMALIZED BY TARGET AS THE PROPORTIONAL TERM.

pub const KI: f64 = 0.02;
pub const KD: f64 = 0.8;
pub const KP: f64 = 0.8;

// EMA WEIGHT FOR A LOOKBACK OF N WINDOWS.
// FOR K > N, (1 - ALPHA)^K <= 1/N: OLDER WINDOWS WEIGH NO MORE THAN A PLAIN N-AVERAGE WOULD.
pub fn ema_alpha(lookback: u32) -> f64 {
    let n = lookback.max(1) as f64;
    1.0 - n.powf(-1.0 / n)
}

// RAW PID ADJUSTMENT FOR ONE WINDOW. error_sum MUST ALREADY INCLUDE diff.
pub fn pid_adjustment(diff: i64, error_sum: i64, samples_per_window: u64) -> f64 {
    let proportional = diff as f64 / samples_per_window as f64;
    KI * error_sum as f64 + KD * diff as f64 + KP * proportional
}

// ROUND HALF AWAY FROM ZERO (f64::round)
pub fn round_adjustment(adjustment: f64) -> i64 {
    adjustment.round() as i64
}

// FIRST NON-ZERO OBSERVATION SEEDS THE AVERAGE. IDLE WINDOWS DECAY IT TOWARD 0
// BUT NEVER BELOW.
pub fn next_running_average(average: f64, total_count: u64, alpha: f64) -> f64 {
    let total = total_count as f64;
    if average == 0.0 || alpha <= 0.0 {
        total
    } else {
        (average + alpha * (total - average)).max(0.0)
    }
}

// COUNTS ABOVE i64::MAX PIN TO i64::MAX
fn signed_count(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

// BUDGET IS NOT CLAMPED, PROBABILITY IS: A NEGATIVE BUDGET MEANS "ACCEPT NOTHING".
pub fn derive_probability(samples_budget: i64, running_average: f64) -> f64 {
    if running_average <= 0.0 {
        1.0
    } else {
        (samples_budget as f64 / running_average).clamp(0.0, 1.0)
    }
}

// ONE CONTROL STEP'S INPUTS AND OUTPUTS, AS REPORTED TO LISTENERS
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WindowRoll {
    pub total_count: u64,
    pub sampled_count: u64,
    pub budget: i64,
    pub total_average: f64,
    pub probability: f64,
}

// CONTROLLER STATE
// OWNED BY THE WINDOW-ROLL PATH ONLY. PRODUCERS NEVER SEE IT.

#[derive(Clone, Debug)]
pub struct Controller {
    samples_per_window: u64,
    alpha: f64,
    samples_budget: i64,
    error_sum: i64,
    total_average: f64,
    probability: f64,
}

impl Controller {
    pub fn new(samples_per_window: u64, lookback: u32) -> Self {
        Self {
            samples_per_window,
            alpha: ema_alpha(lookback),
            samples_budget: signed_count(samples_per_window),
            error_sum: 0,
            total_average: 0.0,
            probability: 1.0,
        }
    }

    // FEED ONE RETIRED WINDOW'S COUNTS, GET THE NEXT PUBLISHED PARAMETERS.
    // ALL INTEGER STEPS SATURATE: LONG IDLE STRETCHES WIND THE INTEGRAL UP
    // WITHOUT BOUND.
    pub fn update(&mut self, total_count: u64, sampled_count: u64) -> WindowRoll {
        let diff = signed_count(self.samples_per_window).saturating_sub(signed_count(sampled_count));
        self.error_sum = self.error_sum.saturating_add(diff);
        let adjustment = pid_adjustment(diff, self.error_sum, self.samples_per_window);
        self.samples_budget = self.samples_budget.saturating_add(round_adjustment(adjustment));

        self.total_average = next_running_average(self.total_average, total_count, self.alpha);
        self.probability = derive_probability(self.samples_budget, self.total_average);

        WindowRoll {
            total_count,
            sampled_count,
            budget: self.samples_budget,
            total_average: self.total_average,
            probability: self.probability,
        }
    }

    // STATE BEFORE ANY WINDOW HAS BEEN ROLLED
    pub fn initial(&self) -> WindowRoll {
        WindowRoll {
            total_count: 0,
            sampled_count: 0,
            budget: self.samples_budget,
            total_average: self.total_average,
            probability: self.probability,
        }
    }

    pub fn samples_budget(&self) -> i64 {
        self.samples_budget
    }

    pub fn error_sum(&self) -> i64 {
        self.error_sum
    }

    pub fn total_average(&self) -> f64 {
        self.total_average
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}
