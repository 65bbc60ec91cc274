use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn start(budget: Duration) -> Self {
        Self {
            start: Instant::now(),
            budget,
        }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::start(Duration::from_secs(secs))
    }

    pub fn instant(&self) -> Instant {
        self.start + self.budget
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    // strictly greater
    pub fn is_past(&self) -> bool {
        self.elapsed() > self.budget
    }

    pub fn percent(&self) -> f64 {
        percent_of(self.elapsed(), self.budget)
    }
}

pub fn percent_of(elapsed: Duration, budget: Duration) -> f64 {
    if budget.is_zero() {
        return 100.0;
    }
    (elapsed.as_secs_f64() / budget.as_secs_f64() * 100.0).min(100.0)
}
