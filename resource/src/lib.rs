mod backend;
mod handle;
mod kind;
pub mod memory;
mod plan;

pub use backend::{BackendError, ResourceBackend};
pub use handle::{LifecycleStatus, ResourceHandle};
pub use kind::{DeletionPolicy, DiffOptions, Observed, ResourceKind};
pub use plan::{Change, ChangePlan};
