use std::time::{Duration, Instant};

/// Running totals for a stream of work items, e.g. tile builds.
#[derive(Clone, Debug, Default)]
pub struct WorkTimer {
    total: Duration,
    slowest: Duration,
    items_completed: u32,
}

impl WorkTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Times `f` and records it as one completed item.
    pub fn time<T>(&mut self, f: impl FnOnce() -> T) -> (T, Duration) {
        let start = Instant::now();
        let out = f();
        let elapsed = start.elapsed();
        self.complete_item(elapsed);
        (out, elapsed)
    }

    pub fn complete_item(&mut self, d: Duration) {
        self.total += d;
        self.slowest = self.slowest.max(d);
        self.items_completed += 1;
    }

    pub fn items_completed(&self) -> u32 {
        self.items_completed
    }

    pub fn total(&self) -> Duration {
        self.total
    }

    pub fn slowest(&self) -> Duration {
        self.slowest
    }

    pub fn average(&self) -> Duration {
        self.total / self.items_completed.max(1)
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod test {
    use super::*;

    use approx::assert_relative_eq;

    #[test]
    fn average_of_recorded_items() {
        let mut timer = WorkTimer::new();
        assert_eq!(timer.average(), Duration::ZERO);
        timer.complete_item(Duration::from_millis(10));
        timer.complete_item(Duration::from_millis(30));
        assert_eq!(timer.items_completed(), 2);
        assert_eq!(timer.slowest(), Duration::from_millis(30));
        assert_relative_eq!(timer.average().as_secs_f64(), 0.020, epsilon = 1e-9);
    }
}
