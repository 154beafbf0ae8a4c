use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// A rolling window of admission timestamps.
///
/// Holds at most `capacity` instants, all of them younger than `period`
/// relative to the last call of [`Window::expire`].
#[derive(Debug, Clone)]
struct Window {
    admissions: VecDeque<Instant>,
    capacity: usize,
    period: Duration,
}

impl Window {
    fn new(capacity: usize, period: Duration) -> Self {
        Self {
            admissions: VecDeque::with_capacity(capacity),
            capacity,
            period,
        }
    }

    /// Drop all admissions which left the trailing window at `now`
    fn expire(&mut self, now: Instant) {
        while let Some(oldest) = self.admissions.front() {
            if now.saturating_duration_since(*oldest) >= self.period {
                self.admissions.pop_front();
            } else {
                break;
            }
        }
    }

    fn try_admit(&mut self, now: Instant) -> Result<(), Duration> {
        self.expire(now);
        if self.admissions.len() < self.capacity {
            self.admissions.push_back(now);
            return Ok(());
        }
        // The window is full, so it can't be empty.
        let oldest = self.admissions.front().copied().unwrap_or(now);
        Err(oldest
            .checked_add(self.period)
            .map_or(self.period, |expiry| expiry.saturating_duration_since(now)))
    }
}

/// Admits at most `capacity` operations within any trailing window of
/// length `period`.
///
/// The gate keeps the exact timestamps of the admissions inside the window,
/// so bursts can never exceed the quota, no matter how the calls are spread
/// across window boundaries. Checking and recording an admission happens
/// under a single lock; the gate can be shared between tasks.
///
/// Time is taken from [`tokio::time::Instant`], which makes the gate
/// testable with a paused runtime clock.
#[derive(Debug)]
pub struct RateGate {
    window: Mutex<Window>,
}

impl RateGate {
    /// Create a gate admitting `capacity` operations per `period`
    #[must_use]
    pub fn new(capacity: usize, period: Duration) -> Self {
        Self {
            window: Mutex::new(Window::new(capacity, period)),
        }
    }

    /// Try to admit an operation now.
    ///
    /// On success the admission is recorded. Otherwise the minimum duration
    /// to wait before the next admission can succeed is returned.
    ///
    /// # Errors
    ///
    /// Returns the wait duration if the window is full.
    pub fn try_admit(&self) -> Result<(), Duration> {
        self.try_admit_at(Instant::now())
    }

    /// Same as [`RateGate::try_admit`], at an explicit point in time.
    ///
    /// # Errors
    ///
    /// Returns the wait duration if the window is full at `now`.
    pub fn try_admit_at(&self, now: Instant) -> Result<(), Duration> {
        self.window.lock().try_admit(now)
    }

    /// Wait until an operation is admitted.
    ///
    /// Dropping the returned future before it resolves never records an
    /// admission.
    pub async fn until_ready(&self) {
        loop {
            match self.try_admit() {
                Ok(()) => return,
                Err(wait) => {
                    log::trace!("Rate limit reached, waiting {}ms", wait.as_millis());
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Number of admissions inside the trailing window
    #[must_use]
    pub fn admitted(&self) -> usize {
        let mut window = self.window.lock();
        window.expire(Instant::now());
        window.admissions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    const SECOND: Duration = Duration::from_secs(1);

    #[test]
    fn test_admits_up_to_capacity() {
        let gate = RateGate::new(3, SECOND);
        let now = Instant::now();

        assert_eq!(gate.try_admit_at(now), Ok(()));
        assert_eq!(gate.try_admit_at(now), Ok(()));
        assert_eq!(gate.try_admit_at(now), Ok(()));
        assert_eq!(gate.try_admit_at(now), Err(SECOND));
    }

    #[test]
    fn test_wait_until_oldest_ages_out() {
        let gate = RateGate::new(2, SECOND);
        let start = Instant::now();

        gate.try_admit_at(start).unwrap();
        gate.try_admit_at(start + Duration::from_millis(300)).unwrap();

        let now = start + Duration::from_millis(500);
        assert_eq!(gate.try_admit_at(now), Err(Duration::from_millis(500)));

        // The first admission leaves the window after exactly one period
        assert_eq!(gate.try_admit_at(start + SECOND), Ok(()));
        assert_eq!(
            gate.try_admit_at(start + SECOND),
            Err(Duration::from_millis(300))
        );
    }

    #[test]
    fn test_huge_period_does_not_overflow() {
        let period = Duration::from_secs(u64::MAX);
        let gate = RateGate::new(1, period);
        let now = Instant::now();

        assert_eq!(gate.try_admit_at(now), Ok(()));
        assert_eq!(gate.try_admit_at(now), Err(period));
    }

    #[test]
    fn test_no_burst_across_window_boundary() {
        // A fixed window would allow 2 admissions at 0.9s and 2 more at 1.0s
        let gate = RateGate::new(2, SECOND);
        let start = Instant::now();
        let late = start + Duration::from_millis(900);

        gate.try_admit_at(late).unwrap();
        gate.try_admit_at(late).unwrap();
        assert!(gate.try_admit_at(start + SECOND).is_err());
        assert!(gate.try_admit_at(late + SECOND).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_until_ready_sleeps_for_the_window() {
        let gate = RateGate::new(2, SECOND);
        let start = Instant::now();

        gate.until_ready().await;
        gate.until_ready().await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        gate.until_ready().await;
        assert_eq!(start.elapsed(), SECOND);
        assert_eq!(gate.admitted(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_respect_quota() {
        let gate = Arc::new(RateGate::new(5, SECOND));
        let start = Instant::now();

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let gate = Arc::clone(&gate);
                tokio::spawn(async move {
                    gate.until_ready().await;
                    Instant::now()
                })
            })
            .collect();

        let mut admitted = Vec::new();
        for handle in handles {
            admitted.push(handle.await.unwrap());
        }
        admitted.sort();

        // No more than 5 admissions within any window of one second
        for (i, first) in admitted.iter().enumerate() {
            let in_window = admitted[i..]
                .iter()
                .take_while(|t| t.duration_since(*first) < SECOND)
                .count();
            assert!(in_window <= 5, "{in_window} admissions within one period");
        }
        assert_eq!(admitted.last().unwrap().duration_since(start), 3 * SECOND);
    }
}
