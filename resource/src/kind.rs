use std::fmt::{Debug, Display};

use concord_diff::{GrantDiffMode, SizeUnits, ValidationError};
use concord_mutation::MutationField;

use crate::handle::LifecycleStatus;

/// Knobs that change how desired and observed values are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffOptions {
    pub grant_diff: GrantDiffMode,
    pub min_resize_increment: SizeUnits,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            grant_diff: GrantDiffMode::Symmetric,
            min_resize_increment: SizeUnits(1),
        }
    }
}

/// Whether the backend lets the resource be destroyed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionPolicy {
    Allowed,
    Protected { reason: String },
}

/// What every observed configuration must expose to the engine.
pub trait Observed {
    fn lifecycle_status(&self) -> LifecycleStatus;

    fn deletion_policy(&self) -> DeletionPolicy {
        DeletionPolicy::Allowed
    }
}

/// ResourceKind:
/// - Desired (validated user intent)
/// - Observed (strongly typed fetch result)
/// - Mutation (one field's desired value, as sent to the backend)
/// - Plan from (Desired, Observed) -> changed fields
pub trait ResourceKind: Send + Sync + 'static {
    const ID: &'static str;

    type Desired: Clone + Debug + Send + Sync;
    type Observed: Observed + Clone + Debug + Send + Sync;
    type Mutation: Clone + Debug + Display + Send + Sync;

    /// Every changed field, or the first structural violation found.
    ///
    /// Must return no fields when `observed` already matches `desired`.
    fn plan(
        desired: &Self::Desired,
        observed: &Self::Observed,
        options: &DiffOptions,
    ) -> Result<Vec<MutationField<Self::Mutation>>, ValidationError>;
}
