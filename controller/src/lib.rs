mod config;
mod controller;
mod error;
mod guard;
#[cfg(test)]
mod testing;

pub use config::{ConfigError, EngineConfig, KindConfig};
pub use controller::{ConvergeOutcome, ReconcileOutcome, ResourceController, RetireOutcome};
pub use error::{BackendOperation, ControllerError};
pub use guard::{DeletionCheck, ExternalDeletionGuard};
