use std::marker::PhantomData;

use async_trait::async_trait;
use concord_ctx::Context;
use concord_mutation::{FieldApplier, MutationField, MutationSequencer, RunReport};
use concord_resource::{
    BackendError, DeletionPolicy, DiffOptions, LifecycleStatus, Observed, ResourceBackend,
    ResourceHandle, ResourceKind,
};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{BackendOperation, ControllerError};
use crate::guard::ExternalDeletionGuard;

#[derive(Debug)]
pub enum ConvergeOutcome {
    /// Every changed field was applied (possibly none).
    Converged(RunReport<BackendError>),
    /// The resource was deleted outside the engine. Nothing was mutated;
    /// drop the handle and materialize again.
    RecreationRequired {
        stale: ResourceHandle,
        status: Option<LifecycleStatus>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetireOutcome {
    Deleted,
    AlreadyGone,
}

#[derive(Debug)]
pub enum ReconcileOutcome {
    Created(ResourceHandle),
    Converged(RunReport<BackendError>),
    Recreated {
        stale: ResourceHandle,
        handle: ResourceHandle,
    },
}

/// Sends one field's mutation to the backend for a fixed handle.
struct BackendApplier<'a, K, B> {
    ctx: &'a Context,
    backend: &'a B,
    handle: &'a ResourceHandle,
    kind: PhantomData<fn() -> K>,
}

#[async_trait]
impl<'a, K, B> FieldApplier<K::Mutation> for BackendApplier<'a, K, B>
where
    K: ResourceKind,
    B: ResourceBackend<K>,
{
    type Error = BackendError;

    async fn apply(&self, field: &MutationField<K::Mutation>) -> Result<(), Self::Error> {
        debug!(
            kind = K::ID,
            handle = %self.handle,
            field = %field.name,
            mutation = %field.mutation,
            "mutate"
        );
        self.backend.mutate(self.ctx, self.handle, field).await
    }
}

/// Drives one resource kind through materialize, refresh, converge and
/// retire against a backend.
///
/// Every operation awaits its backend calls one after another. Running two
/// converges for the same handle at once is not supported.
#[derive(Debug)]
pub struct ResourceController<K, B> {
    ctx: Context,
    backend: B,
    options: DiffOptions,
    kind: PhantomData<fn() -> K>,
}

impl<K, B> ResourceController<K, B>
where
    K: ResourceKind,
    B: ResourceBackend<K>,
{
    pub fn new(ctx: Context, backend: B, options: DiffOptions) -> Self {
        Self {
            ctx,
            backend,
            options,
            kind: PhantomData,
        }
    }

    pub fn from_config(ctx: Context, backend: B, config: &EngineConfig) -> Self {
        Self::new(ctx, backend, config.diff_options(K::ID))
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn options(&self) -> &DiffOptions {
        &self.options
    }

    fn backend_error(operation: BackendOperation) -> impl FnOnce(BackendError) -> ControllerError {
        move |source| ControllerError::Backend {
            kind: K::ID,
            operation,
            source,
        }
    }

    fn validation_error(source: concord_diff::ValidationError) -> ControllerError {
        ControllerError::Validation {
            kind: K::ID,
            source,
        }
    }

    /// Create the remote resource. On failure no handle exists.
    pub async fn materialize(
        &self,
        desired: &K::Desired,
    ) -> Result<ResourceHandle, ControllerError> {
        info!(kind = K::ID, "materializing");
        let handle = self
            .backend
            .create(&self.ctx, desired)
            .await
            .map_err(Self::backend_error(BackendOperation::Create))?;
        info!(kind = K::ID, %handle, "materialized");
        Ok(handle)
    }

    /// Fetch the current observation. Never cached.
    pub async fn refresh(&self, handle: &ResourceHandle) -> Result<K::Observed, ControllerError> {
        debug!(kind = K::ID, %handle, "refreshing");
        self.backend
            .fetch(&self.ctx, handle)
            .await
            .map_err(Self::backend_error(BackendOperation::Fetch))
    }

    pub async fn converge(
        &self,
        handle: &ResourceHandle,
        desired: &K::Desired,
    ) -> Result<ConvergeOutcome, ControllerError> {
        info!(kind = K::ID, %handle, "converging");

        let check = ExternalDeletionGuard::<K>::check(&self.ctx, &self.backend, Some(handle))
            .await
            .map_err(Self::backend_error(BackendOperation::Fetch))?;
        if check.is_deleted {
            warn!(kind = K::ID, %handle, "skipping converge, recreation required");
            return Ok(ConvergeOutcome::RecreationRequired {
                stale: handle.clone(),
                status: check.status,
            });
        }

        let observed = self.refresh(handle).await?;
        let fields =
            K::plan(desired, &observed, &self.options).map_err(Self::validation_error)?;
        let sequencer = MutationSequencer::new(fields).map_err(Self::validation_error)?;
        if sequencer.is_empty() {
            info!(kind = K::ID, %handle, "already converged");
        }

        let applier = BackendApplier {
            ctx: &self.ctx,
            backend: &self.backend,
            handle,
            kind: PhantomData::<fn() -> K>,
        };
        let report = sequencer.run(&applier).await;

        match report.into_result() {
            Ok(report) => {
                info!(kind = K::ID, %handle, applied = report.applied().count(), "converged");
                Ok(ConvergeOutcome::Converged(report))
            }
            Err(source) => Err(ControllerError::Partial {
                kind: K::ID,
                handle: handle.clone(),
                source,
            }),
        }
    }

    pub async fn retire(&self, handle: &ResourceHandle) -> Result<RetireOutcome, ControllerError> {
        info!(kind = K::ID, %handle, "retiring");

        let observed = match self.backend.fetch(&self.ctx, handle).await {
            Ok(observed) => observed,
            Err(BackendError::NotFound { .. }) => {
                warn!(kind = K::ID, %handle, "resource already gone");
                return Ok(RetireOutcome::AlreadyGone);
            }
            Err(err) => return Err(Self::backend_error(BackendOperation::Fetch)(err)),
        };

        let status = observed.lifecycle_status();
        if status.is_gone() {
            warn!(kind = K::ID, %handle, %status, "resource already gone");
            return Ok(RetireOutcome::AlreadyGone);
        }

        if let DeletionPolicy::Protected { reason } = observed.deletion_policy() {
            return Err(ControllerError::NonDestroyable {
                kind: K::ID,
                handle: handle.clone(),
                reason,
            });
        }

        match self.backend.delete(&self.ctx, handle).await {
            Ok(()) => {
                info!(kind = K::ID, %handle, "retired");
                Ok(RetireOutcome::Deleted)
            }
            Err(BackendError::NotFound { .. }) => {
                warn!(kind = K::ID, %handle, "resource vanished during delete");
                Ok(RetireOutcome::AlreadyGone)
            }
            Err(err) => Err(Self::backend_error(BackendOperation::Delete)(err)),
        }
    }

    /// Bring the resource held in `slot` to `desired`: materialize when the
    /// slot is empty, converge otherwise, and re-materialize when the
    /// resource was deleted outside the engine.
    pub async fn reconcile(
        &self,
        slot: &mut Option<ResourceHandle>,
        desired: &K::Desired,
    ) -> Result<ReconcileOutcome, ControllerError> {
        let Some(handle) = slot.as_ref() else {
            let handle = self.materialize(desired).await?;
            *slot = Some(handle.clone());
            return Ok(ReconcileOutcome::Created(handle));
        };

        match self.converge(handle, desired).await? {
            ConvergeOutcome::Converged(report) => Ok(ReconcileOutcome::Converged(report)),
            ConvergeOutcome::RecreationRequired { stale, .. } => {
                *slot = None;
                self.retire(&stale).await?;
                let handle = self.materialize(desired).await?;
                *slot = Some(handle.clone());
                Ok(ReconcileOutcome::Recreated { stale, handle })
            }
        }
    }
}
