// PERIODIC TASK FACILITY
// RUNS A CALLBACK AT A FIXED PERIOD UNTIL CANCELLED OR UNTIL THE CALLBACK
// REPORTS Done. THE SAMPLER REGISTERS A CLOSURE OVER A Weak, SO A
// REGISTRATION NEVER KEEPS A SAMPLER ALIVE ON ITS OWN.
//
// ThreadScheduler: ONE NAMED OS THREAD PER TASK, CHANNEL-WAKE CANCELLATION.
// ManualScheduler: TASKS RUN ONLY WHEN tick() IS CALLED. DETERMINISTIC.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{RecvTimeoutError, Sender};
use parking_lot::Mutex;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskStatus {
    Continue,
    Done,
}

pub type Task = Box<dyn FnMut() -> TaskStatus + Send>;

pub trait PeriodicScheduler {
    fn schedule_at_fixed_rate(&self, period: Duration, task: Task) -> TaskHandle;
}

// --- TASK HANDLE ---

// CANCELS ON DROP. NEVER JOINS: THE LAST OWNER OF A SAMPLER MAY BE THE TASK
// THREAD ITSELF.
#[derive(Debug)]
pub struct TaskHandle {
    cancelled: Arc<AtomicBool>,
    wake: Option<Sender<()>>,
}

impl TaskHandle {
    pub fn new(cancelled: Arc<AtomicBool>) -> Self {
        Self { cancelled, wake: None }
    }

    pub fn with_wake(cancelled: Arc<AtomicBool>, wake: Sender<()>) -> Self {
        Self { cancelled, wake: Some(wake) }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        if let Some(wake) = &self.wake {
            let _ = wake.try_send(());
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

// --- THREAD SCHEDULER ---

// MARKS THE TASK CANCELLED HOWEVER THE THREAD EXITS, PANIC INCLUDED
struct ExitGuard(Arc<AtomicBool>);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            log_warn!("PERIODIC TASK PANICKED, NO FURTHER RUNS");
        }
        self.0.store(true, Ordering::Release);
    }
}

pub struct ThreadScheduler {
    thread_name: String,
}

impl Default for ThreadScheduler {
    fn default() -> Self {
        Self::new("sampler-roll")
    }
}

impl ThreadScheduler {
    pub fn new(thread_name: impl Into<String>) -> Self {
        Self { thread_name: thread_name.into() }
    }
}

impl PeriodicScheduler for ThreadScheduler {
    fn schedule_at_fixed_rate(&self, period: Duration, mut task: Task) -> TaskHandle {
        let (tx, rx) = crossbeam_channel::bounded::<()>(1);
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);

        let spawned = thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || {
                let _exit = ExitGuard(Arc::clone(&flag));
                // FIXED RATE: NEXT DEADLINE FROM THE PREVIOUS DEADLINE, NOT FROM
                // THE END OF THE RUN. MISSED TICKS ARE SKIPPED, NOT REPLAYED.
                let mut deadline = Instant::now() + period;
                loop {
                    let wait = deadline.saturating_duration_since(Instant::now());
                    match rx.recv_timeout(wait) {
                        Err(RecvTimeoutError::Timeout) => {}
                        // WAKE SIGNAL OR HANDLE DROPPED
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                    if flag.load(Ordering::Acquire) {
                        break;
                    }
                    if task() == TaskStatus::Done {
                        flag.store(true, Ordering::Release);
                        break;
                    }

                    deadline += period;
                    let now = Instant::now();
                    if deadline <= now {
                        let behind = now - deadline;
                        log_debug!(behind_us = behind.as_micros() as u64, "periodic task fell behind");
                        deadline = now + period;
                    }
                }
                log_debug!("periodic task exited");
            });

        if let Err(e) = spawned {
            log_warn!("PERIODIC TASK THREAD SPAWN FAILED: {}", e);
            cancelled.store(true, Ordering::Release);
        }

        TaskHandle::with_wake(cancelled, tx)
    }
}

// --- MANUAL SCHEDULER ---

struct ManualTask {
    period: Duration,
    cancelled: Arc<AtomicBool>,
    task: Task,
}

#[derive(Clone, Default)]
pub struct ManualScheduler {
    tasks: Arc<Mutex<Vec<ManualTask>>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    // RUN EVERY LIVE TASK ONCE. DROPS CANCELLED AND FINISHED TASKS.
    // RETURNS HOW MANY TASKS RAN.
    pub fn tick(&self) -> usize {
        // RUN OUTSIDE THE LOCK: A TASK MAY SCHEDULE OR CANCEL
        let mut batch = std::mem::take(&mut *self.tasks.lock());
        let mut ran = 0;
        batch.retain_mut(|t| {
            if t.cancelled.load(Ordering::Acquire) {
                return false;
            }
            ran += 1;
            match (t.task)() {
                TaskStatus::Continue => !t.cancelled.load(Ordering::Acquire),
                TaskStatus::Done => {
                    t.cancelled.store(true, Ordering::Release);
                    false
                }
            }
        });

        let mut tasks = self.tasks.lock();
        batch.append(&mut *tasks);
        *tasks = batch;
        ran
    }

    pub fn tick_n(&self, n: usize) {
        for _ in 0..n {
            self.tick();
        }
    }

    // LIVE (NOT CANCELLED) REGISTRATIONS
    pub fn pending(&self) -> usize {
        self.tasks
            .lock()
            .iter()
            .filter(|t| !t.cancelled.load(Ordering::Acquire))
            .count()
    }

    pub fn periods(&self) -> Vec<Duration> {
        self.tasks.lock().iter().map(|t| t.period).collect()
    }
}

impl PeriodicScheduler for ManualScheduler {
    fn schedule_at_fixed_rate(&self, period: Duration, task: Task) -> TaskHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.tasks.lock().push(ManualTask {
            period,
            cancelled: Arc::clone(&cancelled),
            task,
        });
        TaskHandle::new(cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    fn counting_task(counter: &Arc<AtomicU64>, stop_at: u64) -> Task {
        let counter = Arc::clone(counter);
        Box::new(move || {
            let n = counter.fetch_add(1, Ordering::Relaxed) + 1;
            if n >= stop_at { TaskStatus::Done } else { TaskStatus::Continue }
        })
    }

    #[test]
    fn manual_tick_runs_each_task() {
        let sched = ManualScheduler::new();
        let counter = Arc::new(AtomicU64::new(0));
        let _h = sched.schedule_at_fixed_rate(Duration::from_secs(1), counting_task(&counter, u64::MAX));
        assert_eq!(sched.periods(), vec![Duration::from_secs(1)]);
        sched.tick_n(3);
        assert_eq!(counter.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn manual_done_unregisters() {
        let sched = ManualScheduler::new();
        let counter = Arc::new(AtomicU64::new(0));
        let h = sched.schedule_at_fixed_rate(Duration::from_secs(1), counting_task(&counter, 2));
        sched.tick_n(5);
        assert_eq!(counter.load(Ordering::Relaxed), 2);
        assert_eq!(sched.pending(), 0);
        assert!(h.is_cancelled());
    }

    #[test]
    fn manual_cancel_stops_task() {
        let sched = ManualScheduler::new();
        let counter = Arc::new(AtomicU64::new(0));
        let h = sched.schedule_at_fixed_rate(Duration::from_secs(1), counting_task(&counter, u64::MAX));
        sched.tick();
        h.cancel();
        assert_eq!(sched.tick(), 0);
        assert_eq!(counter.load(Ordering::Relaxed), 1);
        assert_eq!(sched.pending(), 0);
    }

    #[test]
    fn manual_drop_handle_cancels() {
        let sched = ManualScheduler::new();
        let counter = Arc::new(AtomicU64::new(0));
        drop(sched.schedule_at_fixed_rate(Duration::from_secs(1), counting_task(&counter, u64::MAX)));
        assert_eq!(sched.tick(), 0);
        assert_eq!(counter.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn thread_scheduler_runs_and_cancels() {
        let sched = ThreadScheduler::new("test-roll");
        let counter = Arc::new(AtomicU64::new(0));
        let h = sched.schedule_at_fixed_rate(Duration::from_millis(5), counting_task(&counter, u64::MAX));

        let start = Instant::now();
        while counter.load(Ordering::Relaxed) < 3 && start.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(2));
        }
        assert!(counter.load(Ordering::Relaxed) >= 3);

        h.cancel();
        thread::sleep(Duration::from_millis(50));
        let after_cancel = counter.load(Ordering::Relaxed);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(counter.load(Ordering::Relaxed), after_cancel);
    }

    #[test]
    fn thread_scheduler_panic_cancels_handle() {
        let sched = ThreadScheduler::new("test-panic");
        let h = sched.schedule_at_fixed_rate(
            Duration::from_millis(2),
            Box::new(|| -> TaskStatus { panic!("task failure") }),
        );

        let start = Instant::now();
        while !h.is_cancelled() && start.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(2));
        }
        assert!(h.is_cancelled());
    }

    #[test]
    fn thread_scheduler_stops_on_done() {
        let sched = ThreadScheduler::default();
        let counter = Arc::new(AtomicU64::new(0));
        let h = sched.schedule_at_fixed_rate(Duration::from_millis(2), counting_task(&counter, 2));

        let start = Instant::now();
        while !h.is_cancelled() && start.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(2));
        }
        assert!(h.is_cancelled());
        thread::sleep(Duration::from_millis(20));
        assert_eq!(counter.load(Ordering::Relaxed), 2);
    }
}
