// SYNTHETIC WORKLOADS
// EVENTS-PER-WINDOW GENERATORS FOR THE SIMULATOR AND THE TESTS.
// ALL RANDOM GENERATORS ARE SEEDED: SAME SEED, SAME SEQUENCE.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// POISSON: KNUTH BELOW THIS MEAN, NORMAL APPROXIMATION ABOVE
const KNUTH_MAX_MEAN: f64 = 30.0;

pub trait WindowEvents {
    fn next_window(&mut self) -> u64;
    fn label(&self) -> String;
}

// --- CONSTANT ---

pub struct Constant(pub u64);

impl WindowEvents for Constant {
    fn next_window(&mut self) -> u64 {
        self.0
    }

    fn label(&self) -> String {
        format!("CONSTANT(events={})", self.0)
    }
}

// --- BURST ---

// MOSTLY QUIET WINDOWS, OCCASIONALLY A FLOOD
pub struct Burst {
    probability: f64,
    low: u64,
    high: u64,
    rng: StdRng,
}

impl Burst {
    pub fn new(probability: f64, low: u64, high: u64, seed: u64) -> Self {
        Self {
            probability: probability.clamp(0.0, 1.0),
            low,
            high,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl WindowEvents for Burst {
    fn next_window(&mut self) -> u64 {
        if self.rng.gen::<f64>() <= self.probability {
            self.high
        } else {
            self.low
        }
    }

    fn label(&self) -> String {
        format!("BURST(p={}, low={}, high={})", self.probability, self.low, self.high)
    }
}

// --- POISSON ---

pub struct Poisson {
    mean: f64,
    rng: StdRng,
}

impl Poisson {
    pub fn new(mean: f64, seed: u64) -> Self {
        Self {
            mean: mean.max(0.0),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn knuth(&mut self) -> u64 {
        let limit = (-self.mean).exp();
        let mut k = 0u64;
        let mut p = 1.0;
        loop {
            p *= self.rng.gen::<f64>();
            if p <= limit {
                return k;
            }
            k += 1;
        }
    }

    // BOX-MULLER, ROUNDED AND FLOORED AT 0
    fn normal(&mut self) -> u64 {
        let u1: f64 = self.rng.gen::<f64>().max(f64::MIN_POSITIVE);
        let u2: f64 = self.rng.gen();
        let z = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
        (self.mean + z * self.mean.sqrt()).round().max(0.0) as u64
    }
}

impl WindowEvents for Poisson {
    fn next_window(&mut self) -> u64 {
        if self.mean == 0.0 {
            0
        } else if self.mean < KNUTH_MAX_MEAN {
            self.knuth()
        } else {
            self.normal()
        }
    }

    fn label(&self) -> String {
        format!("POISSON(mean={})", self.mean)
    }
}

// --- REPEATING ---

pub struct Repeating {
    counts: Vec<u64>,
    pos: usize,
}

impl Repeating {
    pub fn new(counts: Vec<u64>) -> Self {
        let counts = if counts.is_empty() { vec![0] } else { counts };
        Self { counts, pos: 0 }
    }
}

impl WindowEvents for Repeating {
    fn next_window(&mut self) -> u64 {
        let n = self.counts[self.pos];
        self.pos = (self.pos + 1) % self.counts.len();
        n
    }

    fn label(&self) -> String {
        format!("REPEATING({:?})", self.counts)
    }
}
