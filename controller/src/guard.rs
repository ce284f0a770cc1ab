use std::marker::PhantomData;

use concord_ctx::Context;
use concord_resource::{
    BackendError, LifecycleStatus, Observed, ResourceBackend, ResourceHandle, ResourceKind,
};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletionCheck {
    pub is_deleted: bool,
    /// `None` when no handle was set or the backend no longer knows it.
    pub status: Option<LifecycleStatus>,
}

impl DeletionCheck {
    fn present(status: Option<LifecycleStatus>) -> Self {
        Self {
            is_deleted: false,
            status,
        }
    }
}

/// Detects resources deleted outside the engine.
///
/// A deleted resource is a recovery signal, not an error: the caller drops
/// the stale handle and re-materializes instead of converging.
#[derive(Debug)]
pub struct ExternalDeletionGuard<K> {
    kind: PhantomData<fn() -> K>,
}

impl<K: ResourceKind> ExternalDeletionGuard<K> {
    pub async fn check<B>(
        ctx: &Context,
        backend: &B,
        handle: Option<&ResourceHandle>,
    ) -> Result<DeletionCheck, BackendError>
    where
        B: ResourceBackend<K>,
    {
        let Some(handle) = handle else {
            debug!(kind = K::ID, "no handle, nothing to check");
            return Ok(DeletionCheck::present(None));
        };

        match backend.fetch(ctx, handle).await {
            Ok(observed) => {
                let status = observed.lifecycle_status();
                if status.is_gone() {
                    warn!(kind = K::ID, %handle, %status, "resource deleted outside the engine");
                    Ok(DeletionCheck {
                        is_deleted: true,
                        status: Some(status),
                    })
                } else {
                    Ok(DeletionCheck::present(Some(status)))
                }
            }
            Err(BackendError::NotFound { .. }) => {
                warn!(kind = K::ID, %handle, "resource no longer known to the backend");
                Ok(DeletionCheck {
                    is_deleted: true,
                    status: None,
                })
            }
            Err(err) => Err(err),
        }
    }
}
