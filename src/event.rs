// ADAPTIVE SAMPLER WINDOW LOG
// RECORDS ONE ENTRY PER WINDOW ROLL
// PRE-ALLOCATED RING BUFFER. NO HEAP ALLOCATION WHILE RECORDING.
// WRAPS AROUND AT CAPACITY -- OLDEST ENTRIES OVERWRITTEN.

use std::time::Instant;

use crate::control::WindowRoll;

pub const MAX_ROLLS: usize = 8192;

#[derive(Clone, Copy, Debug)]
pub struct RollRecord {
    pub at: Instant,
    pub total: u64,
    pub sampled: u64,
    pub budget: i64,
    pub average: f64,
    pub probability: f64,
}

pub struct WindowLog {
    records: Vec<RollRecord>,
    head: usize,
    len: usize,
    capacity: usize,
}

impl Default for WindowLog {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowLog {
    pub fn new() -> Self {
        Self::with_capacity(MAX_ROLLS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let blank = RollRecord {
            at: Instant::now(),
            total: 0,
            sampled: 0,
            budget: 0,
            average: 0.0,
            probability: 0.0,
        };
        Self {
            records: vec![blank; capacity],
            head: 0,
            len: 0,
            capacity,
        }
    }

    // RECORD ONE ROLL. OVERWRITES OLDEST ENTRY WHEN FULL.
    pub fn record(&mut self, roll: &WindowRoll) {
        self.records[self.head] = RollRecord {
            at: Instant::now(),
            total: roll.total_count,
            sampled: roll.sampled_count,
            budget: roll.budget,
            average: roll.total_average,
            probability: roll.probability,
        };
        self.head = (self.head + 1) % self.capacity;
        if self.len < self.capacity {
            self.len += 1;
        }
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    // ITERATE RECORDS IN CHRONOLOGICAL ORDER
    pub fn iter(&self) -> impl Iterator<Item = &RollRecord> {
        let start = if self.len < self.capacity { 0 } else { self.head };
        (0..self.len).map(move |i| &self.records[(start + i) % self.capacity])
    }

    pub fn total_events(&self) -> u64 {
        self.iter().map(|r| r.total).sum()
    }

    pub fn total_samples(&self) -> u64 {
        self.iter().map(|r| r.sampled).sum()
    }

    // SIGNED PERCENT: (TARGET - SAMPLED) / TARGET.
    // TARGET = min(ALL EVENTS, WINDOWS * SAMPLES_PER_WINDOW) -- NEVER ASK FOR MORE THAN ARRIVED.
    pub fn percent_error(&self, samples_per_window: u64) -> f64 {
        let expected = self.len as u64 * samples_per_window;
        let target = self.total_events().min(expected);
        if target == 0 {
            return 0.0;
        }
        (target as f64 - self.total_samples() as f64) / target as f64 * 100.0
    }

    // DUMP THE TIME SERIES
    pub fn dump(&self) {
        let mut iter = self.iter();
        let Some(first) = iter.next() else {
            return;
        };
        let base = first.at;

        println!(
            "\n{:<10} {:<10} {:<10} {:<10} {:<12} {:<10}",
            "TIME_S", "EVENTS", "SAMPLED", "BUDGET", "AVG_EVENTS", "PROB"
        );
        println!("{}", "-".repeat(66));

        for r in std::iter::once(first).chain(iter) {
            let elapsed_s = r.at.duration_since(base).as_secs_f64();
            println!(
                "{:<10.1} {:<10} {:<10} {:<10} {:<12.1} {:<10.4}",
                elapsed_s, r.total, r.sampled, r.budget, r.average, r.probability
            );
        }

        if self.len == self.capacity {
            println!("\n(RING BUFFER WRAPPED -- SHOWING MOST RECENT {} WINDOWS)", self.capacity);
        }
        println!("TOTAL WINDOWS: {}", self.len);
    }

    // SUMMARY STATISTICS
    pub fn summary(&self, samples_per_window: u64) {
        if self.len < 2 {
            return;
        }

        let total_events = self.total_events();
        let total_samples = self.total_samples();
        let peak_events = self.iter().map(|r| r.total).max().unwrap_or(0);
        let peak_samples = self.iter().map(|r| r.sampled).max().unwrap_or(0);
        let min_budget = self.iter().map(|r| r.budget).min().unwrap_or(0);
        let max_budget = self.iter().map(|r| r.budget).max().unwrap_or(0);
        let windows = self.len as f64;

        println!("\n{}", "=".repeat(50));
        println!("ADAPTIVE SAMPLER SUMMARY");
        println!("{}", "=".repeat(50));
        println!("  WINDOWS:           {}", self.len);
        println!("  TOTAL EVENTS:      {}", total_events);
        println!("  TOTAL SAMPLES:     {}", total_samples);
        println!("  PEAK EVENTS/WIN:   {}", peak_events);
        println!("  PEAK SAMPLES/WIN:  {}", peak_samples);
        println!("  AVG EVENTS/WIN:    {:.1}", total_events as f64 / windows);
        println!("  AVG SAMPLES/WIN:   {:.1} (TARGET {})", total_samples as f64 / windows, samples_per_window);
        println!("  BUDGET RANGE:      {}..{}", min_budget, max_budget);
        println!("  ERROR:             {:.1}%", self.percent_error(samples_per_window));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roll(total: u64, sampled: u64) -> WindowRoll {
        WindowRoll {
            total_count: total,
            sampled_count: sampled,
            budget: 10,
            total_average: total as f64,
            probability: 0.5,
        }
    }

    #[test]
    fn record_stores_fields() {
        let mut log = WindowLog::new();
        assert!(log.is_empty());

        log.record(&roll(100, 9));
        assert_eq!(log.len(), 1);
        let r = log.iter().next().unwrap();
        assert_eq!(r.total, 100);
        assert_eq!(r.sampled, 9);
        assert_eq!(r.budget, 10);
        assert_eq!(r.probability, 0.5);
    }

    #[test]
    fn ring_buffer_wraps() {
        let mut log = WindowLog::with_capacity(4);

        // FILL TO CAPACITY
        for i in 0..4 {
            log.record(&roll(i, 0));
        }
        assert_eq!(log.len(), 4);
        assert_eq!(log.head, 0); // WRAPPED BACK TO START

        // WRITE ONE MORE -- OVERWRITES OLDEST
        log.record(&roll(9999, 0));
        assert_eq!(log.len(), 4);
        assert_eq!(log.head, 1);

        // CHRONOLOGICAL ITERATION STARTS FROM OLDEST SURVIVOR
        let ordered: Vec<u64> = log.iter().map(|r| r.total).collect();
        assert_eq!(ordered, vec![1, 2, 3, 9999]);
    }

    #[test]
    fn clear_forgets_records() {
        let mut log = WindowLog::new();
        log.record(&roll(3, 1));
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.iter().count(), 0);
    }

    #[test]
    fn percent_error_caps_target_at_events() {
        let mut log = WindowLog::new();
        // 2 WINDOWS, 5 EVENTS EACH, TARGET 10/WIN -> TARGET = 10 EVENTS TOTAL
        log.record(&roll(5, 5));
        log.record(&roll(5, 4));
        assert!((log.percent_error(10) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn percent_error_zero_when_idle() {
        let mut log = WindowLog::new();
        log.record(&roll(0, 0));
        log.record(&roll(0, 0));
        assert_eq!(log.percent_error(10), 0.0);
    }

    #[test]
    fn summary_no_panic_empty() {
        let log = WindowLog::new();
        log.summary(10); // SHOULD NOT PANIC WITH 0 RECORDS
        log.dump();
    }

    #[test]
    fn summary_no_panic_one() {
        let mut log = WindowLog::new();
        log.record(&roll(100, 10));
        log.summary(10); // SHOULD NOT PANIC WITH 1 RECORD
    }

    #[test]
    fn dump_no_panic() {
        let mut log = WindowLog::new();
        log.record(&roll(100, 10));
        log.record(&roll(200, 11));
        log.dump(); // SHOULD NOT PANIC
    }
}
