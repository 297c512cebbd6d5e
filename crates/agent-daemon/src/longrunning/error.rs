use crate::task::PoolError;
use host_agent_core::io::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("long running plugin manager isn't initialized yet")]
    NotInitialized,

    #[error("running plugin store failed: {0}")]
    Store(#[from] StoreError),

    #[error("long running plugin {name} is not registered")]
    UnknownPlugin { name: String },

    #[error("long running plugin manager is stopping")]
    Stopped,

    #[error(transparent)]
    Pool(#[from] PoolError),
}
