//! Bounded worker pool with job-id deduplication and deadline-bounded shutdown

use super::cancel_flag::{CancelFlag, CancelState};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::AbortHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Errors returned by [`Pool::submit`]
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("job {job_id} is already pending or running in pool {pool}")]
    DuplicateJob { pool: String, job_id: String },

    #[error("pool {pool} is shut down")]
    ShutDown { pool: String },

    #[error("pool {pool} requires a tokio runtime")]
    NoRuntime { pool: String },
}

/// Result of [`Pool::shutdown_and_wait`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownOutcome {
    /// Every job finished before the deadline
    pub drained: bool,
    /// Jobs that were force-cancelled at the deadline
    pub abandoned: Vec<String>,
}

struct JobSlot {
    seq: u64,
    flag: CancelFlag,
    done: CancellationToken,
    abort: Option<AbortHandle>,
}

struct PoolInner {
    name: String,
    cancel_wait: Duration,
    permits: Arc<Semaphore>,
    jobs: Mutex<HashMap<String, JobSlot>>,
    tracker: TaskTracker,
    accepting: AtomicBool,
    next_seq: AtomicU64,
}

impl PoolInner {
    fn lock_jobs(&self) -> MutexGuard<'_, HashMap<String, JobSlot>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Removes the job's slot when its task ends, including when it is aborted.
struct JobGuard {
    inner: Arc<PoolInner>,
    job_id: String,
    seq: u64,
    flag: CancelFlag,
    done: CancellationToken,
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        {
            let mut jobs = self.inner.lock_jobs();
            if jobs.get(&self.job_id).is_some_and(|slot| slot.seq == self.seq) {
                jobs.remove(&self.job_id);
            }
        }
        self.flag.set(CancelState::Completed);
        self.done.cancel();
    }
}

/// Executes jobs concurrently up to `workers`, at most one per job id.
///
/// Cloning yields another handle to the same pool.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl Pool {
    /// Create a pool.
    ///
    /// `cancel_wait` bounds how long [`Pool::cancel`] waits for a cancelled
    /// job to exit.
    pub fn new(name: impl Into<String>, workers: usize, cancel_wait: Duration) -> Self {
        let workers = workers.max(1);
        Self {
            inner: Arc::new(PoolInner {
                name: name.into(),
                cancel_wait,
                permits: Arc::new(Semaphore::new(workers)),
                jobs: Mutex::new(HashMap::new()),
                tracker: TaskTracker::new(),
                accepting: AtomicBool::new(true),
                next_seq: AtomicU64::new(0),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Queue `work` under `job_id`.
    ///
    /// The job runs once a worker is free and receives its [`CancelFlag`].
    ///
    /// # Errors
    ///
    /// - `PoolError::DuplicateJob` if a job with this id is pending or running
    /// - `PoolError::ShutDown` after [`Pool::shutdown_and_wait`]
    /// - `PoolError::NoRuntime` when called outside a tokio runtime
    pub fn submit<F, Fut>(&self, job_id: &str, work: F) -> Result<(), PoolError>
    where
        F: FnOnce(CancelFlag) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| PoolError::NoRuntime {
            pool: self.inner.name.clone(),
        })?;

        let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);
        let flag = CancelFlag::new();
        let done = CancellationToken::new();

        {
            let mut jobs = self.inner.lock_jobs();
            if !self.inner.accepting.load(Ordering::SeqCst) {
                return Err(PoolError::ShutDown {
                    pool: self.inner.name.clone(),
                });
            }
            if jobs.contains_key(job_id) {
                return Err(PoolError::DuplicateJob {
                    pool: self.inner.name.clone(),
                    job_id: job_id.to_string(),
                });
            }
            jobs.insert(
                job_id.to_string(),
                JobSlot {
                    seq,
                    flag: flag.clone(),
                    done: done.clone(),
                    abort: None,
                },
            );
        }

        let guard = JobGuard {
            inner: Arc::clone(&self.inner),
            job_id: job_id.to_string(),
            seq,
            flag: flag.clone(),
            done,
        };
        let permits = Arc::clone(&self.inner.permits);
        let pool_name = self.inner.name.clone();
        let id = job_id.to_string();

        let task = async move {
            let _guard = guard;
            let Ok(_permit) = permits.acquire_owned().await else {
                debug!("Pool {pool_name}: job {id} dropped before start (pool closed)");
                return;
            };
            if flag.stopping() {
                debug!("Pool {pool_name}: job {id} cancelled before start");
                return;
            }
            debug!("Pool {pool_name}: job {id} running");
            work(flag).await;
            debug!("Pool {pool_name}: job {id} finished");
        };

        // Spawn outside the jobs lock: a task dropped during spawn runs the
        // guard, which takes that lock.
        let join = self.inner.tracker.spawn_on(task, &handle);

        let mut jobs = self.inner.lock_jobs();
        if let Some(slot) = jobs.get_mut(job_id) {
            if slot.seq == seq {
                slot.abort = Some(join.abort_handle());
            }
        }
        Ok(())
    }

    /// Whether a job with this id is pending or running
    pub fn has_job(&self, job_id: &str) -> bool {
        self.inner.lock_jobs().contains_key(job_id)
    }

    /// Ids of all pending or running jobs, sorted
    pub fn job_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.lock_jobs().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn is_shut_down(&self) -> bool {
        !self.inner.accepting.load(Ordering::SeqCst)
    }

    /// Cancel one job and wait up to the pool's cancel-wait for it to exit.
    ///
    /// Returns true if the job existed and finished within the wait.
    pub async fn cancel(&self, job_id: &str) -> bool {
        let Some((flag, done)) = self
            .inner
            .lock_jobs()
            .get(job_id)
            .map(|slot| (slot.flag.clone(), slot.done.clone()))
        else {
            debug!("Pool {}: no job {job_id} to cancel", self.inner.name);
            return false;
        };

        flag.set(CancelState::Canceled);
        match timeout(self.inner.cancel_wait, done.cancelled()).await {
            Ok(()) => true,
            Err(_) => {
                warn!(
                    "Pool {}: job {job_id} did not exit within {:?} of cancellation",
                    self.inner.name, self.inner.cancel_wait
                );
                false
            }
        }
    }

    /// Stop accepting jobs, signal shutdown to every job, and wait up to
    /// `deadline` for them to finish. Jobs still running at the deadline are
    /// aborted and reported in [`ShutdownOutcome::abandoned`].
    pub async fn shutdown_and_wait(&self, deadline: Duration) -> ShutdownOutcome {
        let flags: Vec<CancelFlag> = {
            let jobs = self.inner.lock_jobs();
            self.inner.accepting.store(false, Ordering::SeqCst);
            jobs.values().map(|slot| slot.flag.clone()).collect()
        };

        info!(
            "Shutting down pool {} ({} job(s), deadline {:?})",
            self.inner.name,
            flags.len(),
            deadline
        );

        self.inner.permits.close();
        self.inner.tracker.close();
        for flag in &flags {
            flag.set(CancelState::ShutDown);
        }

        if timeout(deadline, self.inner.tracker.wait()).await.is_ok() {
            info!("Pool {} drained", self.inner.name);
            return ShutdownOutcome {
                drained: true,
                abandoned: Vec::new(),
            };
        }

        let stragglers: Vec<(String, Option<AbortHandle>)> = self
            .inner
            .lock_jobs()
            .iter()
            .map(|(id, slot)| (id.clone(), slot.abort.clone()))
            .collect();

        let mut abandoned = Vec::with_capacity(stragglers.len());
        for (id, abort) in stragglers {
            if let Some(abort) = abort {
                abort.abort();
            }
            abandoned.push(id);
        }
        abandoned.sort();

        warn!(
            "Pool {} did not drain within {:?}; abandoned job(s): {:?}",
            self.inner.name, deadline, abandoned
        );

        ShutdownOutcome {
            drained: false,
            abandoned,
        }
    }
}
