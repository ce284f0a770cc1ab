use async_trait::async_trait;
use concord_ctx::Context;
use concord_mutation::MutationField;
use thiserror::Error;

use crate::handle::ResourceHandle;
use crate::kind::ResourceKind;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("resource not found: {handle}")]
    NotFound { handle: ResourceHandle },

    #[error("request rejected: {message}")]
    Rejected { message: String },

    #[error("conflict: {message}")]
    Conflict { message: String },

    #[error("backend unavailable: {message}")]
    Unavailable { message: String },
}

/// Remote API for one resource kind.
///
/// `mutate` is called once per changed field and must be idempotent:
/// re-sending an already applied value is a no-op.
#[async_trait]
pub trait ResourceBackend<K: ResourceKind>: Send + Sync {
    async fn create(&self, ctx: &Context, desired: &K::Desired)
    -> Result<ResourceHandle, BackendError>;

    async fn fetch(&self, ctx: &Context, handle: &ResourceHandle)
    -> Result<K::Observed, BackendError>;

    async fn mutate(
        &self,
        ctx: &Context,
        handle: &ResourceHandle,
        field: &MutationField<K::Mutation>,
    ) -> Result<(), BackendError>;

    async fn delete(&self, ctx: &Context, handle: &ResourceHandle) -> Result<(), BackendError>;
}
