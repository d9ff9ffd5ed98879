use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

/// Shared handle used by worker threads to report how far along a long
/// running operation is. Cloning the handle shares the same counters.
#[derive(Clone)]
pub struct Progress(Arc<ProgressInner>);

struct ProgressInner {
    complete: AtomicU64,
    total: AtomicU64,
    finished: AtomicBool,
}

impl Progress {
    pub fn new() -> Self {
        Self(Arc::new(ProgressInner {
            complete: AtomicU64::new(0),
            total: AtomicU64::new(0),
            finished: AtomicBool::new(false),
        }))
    }

    /// Fraction of the work done, in `0.0..=1.0`. Unknown totals report 0
    /// until the operation is marked finished.
    pub fn progress(&self) -> f32 {
        if self.finished() {
            return 1.0;
        }

        let total = self.0.total.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }

        let complete = self.0.complete.load(Ordering::Relaxed).min(total);
        complete as f32 / total as f32
    }

    pub fn finished(&self) -> bool {
        self.0.finished.load(Ordering::Acquire)
    }

    pub fn total(&self) -> u64 {
        self.0.total.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> u64 {
        self.0.complete.load(Ordering::Relaxed)
    }

    pub fn set_total(&self, total: u64) {
        self.0.total.store(total, Ordering::Relaxed);
    }

    pub fn add_complete(&self, amount: u64) {
        self.0.complete.fetch_add(amount, Ordering::Relaxed);
    }

    pub fn set_finished(&self) {
        let total = self.0.total.load(Ordering::Relaxed);
        self.0.complete.fetch_max(total, Ordering::Relaxed);
        self.0.finished.store(true, Ordering::Release);
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::Progress;

    #[test]
    fn reports_fraction_of_total() {
        let progress = Progress::new();
        assert_eq!(progress.progress(), 0.0);

        progress.set_total(200);
        progress.add_complete(50);
        assert_eq!(progress.progress(), 0.25);
        assert!(!progress.finished());

        let shared = progress.clone();
        shared.add_complete(500);
        assert_eq!(progress.progress(), 1.0);
    }

    #[test]
    fn finished_without_total() {
        let progress = Progress::new();
        progress.set_finished();
        assert!(progress.finished());
        assert_eq!(progress.progress(), 1.0);
    }
}
