use std::fmt::Display;

use concord_diff::ValidationError;
use concord_mutation::PartialConvergenceError;
use concord_resource::{BackendError, ResourceHandle};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendOperation {
    Create,
    Fetch,
    Delete,
}

impl Display for BackendOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BackendOperation::Create => "create",
            BackendOperation::Fetch => "fetch",
            BackendOperation::Delete => "delete",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("invalid desired configuration for {kind}: {source}")]
    Validation {
        kind: &'static str,
        #[source]
        source: ValidationError,
    },

    #[error("{kind} {operation} failed: {source}")]
    Backend {
        kind: &'static str,
        operation: BackendOperation,
        #[source]
        source: BackendError,
    },

    #[error("{kind} {handle} partially converged: {source}")]
    Partial {
        kind: &'static str,
        handle: ResourceHandle,
        #[source]
        source: PartialConvergenceError<BackendError>,
    },

    #[error("{kind} {handle} cannot be destroyed: {reason}")]
    NonDestroyable {
        kind: &'static str,
        handle: ResourceHandle,
        reason: String,
    },
}

impl ControllerError {
    /// Validation and deletion-policy errors need a changed desired
    /// configuration or policy before anything is retried.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ControllerError::Validation { .. } | ControllerError::NonDestroyable { .. }
        )
    }
}
