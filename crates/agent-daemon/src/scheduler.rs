//! Periodic job scheduling

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Errors returned when registering a periodic job
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("interval for job {name} must be greater than zero")]
    ZeroInterval { name: String },

    #[error("interval for job {name} is too long to schedule")]
    IntervalTooLong { name: String },

    #[error("job {name} requires a tokio runtime")]
    NoRuntime { name: String },
}

/// Builder returned by [`every`]
#[derive(Debug, Clone, Copy)]
pub struct Every {
    period: Duration,
}

/// Start describing a job that fires every `period`.
pub fn every(period: Duration) -> Every {
    Every { period }
}

impl Every {
    /// Spawn the periodic loop.
    ///
    /// The first run comes one period from now. Runs of `job` never overlap;
    /// a run that outlasts the period delays the next tick.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::ZeroInterval` for a zero period,
    /// `SchedulerError::IntervalTooLong` when the first run cannot be
    /// represented, and `SchedulerError::NoRuntime` outside a tokio runtime.
    pub fn run<F>(self, name: &str, job: F) -> Result<ScheduledJob, SchedulerError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        if self.period.is_zero() {
            return Err(SchedulerError::ZeroInterval {
                name: name.to_string(),
            });
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            SchedulerError::NoRuntime {
                name: name.to_string(),
            }
        })?;

        let quit = CancellationToken::new();
        let loop_quit = quit.clone();
        let period = self.period;
        let start = Instant::now()
            .checked_add(period)
            .ok_or_else(|| SchedulerError::IntervalTooLong {
                name: name.to_string(),
            })?;
        let job_name = name.to_string();

        let handle = runtime.spawn(async move {
            info!("Scheduled job {job_name} every {period:?}");
            let mut ticker = interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        debug!("Running scheduled job {job_name}");
                        job();
                    }
                    _ = loop_quit.cancelled() => {
                        info!("Scheduled job {job_name} stopped");
                        break;
                    }
                }
            }
        });

        Ok(ScheduledJob {
            quit,
            handle,
        })
    }
}

/// Handle to a running periodic job
pub struct ScheduledJob {
    quit: CancellationToken,
    handle: JoinHandle<()>,
}

impl ScheduledJob {
    /// Stop future runs. A run already in progress completes.
    pub fn quit(&self) {
        self.quit.cancel();
    }

    pub fn is_quit(&self) -> bool {
        self.quit.is_cancelled()
    }

    /// Whether the scheduling loop has exited
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ScheduledJob {
    fn drop(&mut self) {
        self.quit.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_fires_every_period_after_first_delay() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);

        let job = every(Duration::from_secs(60))
            .run("counter", move || {
                count_clone.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        job.quit();
    }

    #[tokio::test(start_paused = true)]
    async fn test_quit_stops_future_runs() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);

        let job = every(Duration::from_secs(10))
            .run("counter", move || {
                count_clone.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        job.quit();
        assert!(job.is_quit());
        tokio::time::sleep(Duration::from_secs(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(job.is_finished());
    }

    #[tokio::test]
    async fn test_zero_interval_rejected() {
        let err = every(Duration::ZERO).run("bad", || {}).err().unwrap();
        assert!(matches!(err, SchedulerError::ZeroInterval { .. }));
    }

    #[tokio::test]
    async fn test_unrepresentable_interval_rejected() {
        let err = every(Duration::MAX).run("bad", || {}).err().unwrap();
        assert!(matches!(err, SchedulerError::IntervalTooLong { .. }));
    }

    #[test]
    fn test_outside_runtime_rejected() {
        let err = every(Duration::from_secs(1)).run("bad", || {}).err().unwrap();
        assert!(matches!(err, SchedulerError::NoRuntime { .. }));
    }
}
