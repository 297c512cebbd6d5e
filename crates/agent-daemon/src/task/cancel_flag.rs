//! Cooperative cancellation flag handed to every pool job

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

/// State of a job's cancellation flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelState {
    /// Job may keep running
    Normal,
    /// Job was cancelled individually
    Canceled,
    /// Job finished on its own
    Completed,
    /// The owning pool is shutting down
    ShutDown,
}

impl fmt::Display for CancelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Canceled => write!(f, "canceled"),
            Self::Completed => write!(f, "completed"),
            Self::ShutDown => write!(f, "shutdown"),
        }
    }
}

struct FlagInner {
    state: Mutex<CancelState>,
    token: CancellationToken,
}

/// Shared flag a job polls or awaits to learn it should stop.
///
/// The first transition away from `Normal` wins; later `set` calls are
/// ignored. `Canceled` and `ShutDown` wake every `wait()` caller.
#[derive(Clone)]
pub struct CancelFlag {
    inner: Arc<FlagInner>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(FlagInner {
                state: Mutex::new(CancelState::Normal),
                token: CancellationToken::new(),
            }),
        }
    }

    pub fn state(&self) -> CancelState {
        *self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Move out of `Normal`. Returns true if this call changed the state.
    pub fn set(&self, state: CancelState) -> bool {
        let mut current = self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *current != CancelState::Normal || state == CancelState::Normal {
            return false;
        }
        *current = state;
        if matches!(state, CancelState::Canceled | CancelState::ShutDown) {
            self.inner.token.cancel();
        }
        true
    }

    pub fn canceled(&self) -> bool {
        self.state() == CancelState::Canceled
    }

    pub fn shut_down(&self) -> bool {
        self.state() == CancelState::ShutDown
    }

    /// True once the job has been asked to stop, for either reason.
    pub fn stopping(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Resolve once the flag is cancelled or shut down.
    pub async fn wait(&self) -> CancelState {
        self.inner.token.cancelled().await;
        self.state()
    }

    /// Token that fires together with this flag, for use in `tokio::select!`.
    pub fn token(&self) -> CancellationToken {
        self.inner.token.clone()
    }
}

impl Default for CancelFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelFlag")
            .field("state", &self.state())
            .finish()
    }
}
