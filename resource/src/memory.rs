//! In-memory [`ResourceBackend`] for tests and dry runs.

use std::collections::BTreeMap;

use async_trait::async_trait;
use concord_ctx::Context;
use concord_mutation::{FieldName, MutationField};
use tokio::sync::Mutex;
use tracing::trace;

use crate::backend::{BackendError, ResourceBackend};
use crate::handle::{LifecycleStatus, ResourceHandle};
use crate::kind::{Observed, ResourceKind};

/// How a kind's observation is created and changed by the in-memory backend.
pub trait MemoryKind: ResourceKind {
    /// The observation right after `create`.
    fn observe(desired: &Self::Desired) -> Self::Observed;

    /// Apply one mutation. Re-applying the same mutation must leave the
    /// observation unchanged.
    fn apply(observed: &mut Self::Observed, mutation: &Self::Mutation);

    fn set_status(observed: &mut Self::Observed, status: LifecycleStatus);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Create,
    Fetch(ResourceHandle),
    Mutate {
        handle: ResourceHandle,
        field: FieldName,
    },
    Delete(ResourceHandle),
}

impl BackendCall {
    pub fn is_mutating(&self) -> bool {
        !matches!(self, BackendCall::Fetch(_))
    }
}

#[derive(Debug)]
struct MemoryState<K: ResourceKind> {
    resources: BTreeMap<ResourceHandle, K::Observed>,
    calls: Vec<BackendCall>,
    field_failures: BTreeMap<FieldName, BackendError>,
    create_failure: Option<BackendError>,
    fetch_failure: Option<BackendError>,
    delete_failure: Option<BackendError>,
}

#[derive(Debug)]
pub struct MemoryBackend<K: ResourceKind> {
    state: Mutex<MemoryState<K>>,
}

impl<K: MemoryKind> Default for MemoryBackend<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: MemoryKind> MemoryBackend<K> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                resources: BTreeMap::new(),
                calls: Vec::new(),
                field_failures: BTreeMap::new(),
                create_failure: None,
                fetch_failure: None,
                delete_failure: None,
            }),
        }
    }

    /// Seed a resource without recording a call.
    pub async fn insert(&self, observed: K::Observed) -> ResourceHandle {
        let handle = ResourceHandle::new(cuid2::create_id());
        self.state
            .lock()
            .await
            .resources
            .insert(handle.clone(), observed);
        handle
    }

    pub async fn observed(&self, handle: &ResourceHandle) -> Option<K::Observed> {
        self.state.lock().await.resources.get(handle).cloned()
    }

    /// Change the lifecycle status behind the engine's back.
    pub async fn set_status(&self, handle: &ResourceHandle, status: LifecycleStatus) {
        if let Some(observed) = self.state.lock().await.resources.get_mut(handle) {
            K::set_status(observed, status);
        }
    }

    /// Forget a resource entirely, so fetches return `NotFound`.
    pub async fn forget(&self, handle: &ResourceHandle) {
        self.state.lock().await.resources.remove(handle);
    }

    /// Make every mutate of `field` fail with `error` until cleared.
    pub async fn fail_field(&self, field: impl Into<FieldName>, error: BackendError) {
        self.state
            .lock()
            .await
            .field_failures
            .insert(field.into(), error);
    }

    pub async fn clear_failures(&self) {
        self.state.lock().await.field_failures.clear();
    }

    /// Make the next create fail with `error`.
    pub async fn fail_create(&self, error: BackendError) {
        self.state.lock().await.create_failure = Some(error);
    }

    /// Make the next fetch fail with `error`.
    pub async fn fail_fetch(&self, error: BackendError) {
        self.state.lock().await.fetch_failure = Some(error);
    }

    /// Make the next delete fail with `error`.
    pub async fn fail_delete(&self, error: BackendError) {
        self.state.lock().await.delete_failure = Some(error);
    }

    pub async fn calls(&self) -> Vec<BackendCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn mutate_calls(&self) -> Vec<FieldName> {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::Mutate { field, .. } => Some(field.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn reset_calls(&self) {
        self.state.lock().await.calls.clear();
    }
}

fn live<'a, K: ResourceKind>(
    resources: &'a mut BTreeMap<ResourceHandle, K::Observed>,
    handle: &ResourceHandle,
) -> Result<&'a mut K::Observed, BackendError> {
    match resources.get_mut(handle) {
        Some(observed) if !observed.lifecycle_status().is_gone() => Ok(observed),
        _ => Err(BackendError::NotFound {
            handle: handle.clone(),
        }),
    }
}

#[async_trait]
impl<K: MemoryKind> ResourceBackend<K> for MemoryBackend<K> {
    async fn create(
        &self,
        ctx: &Context,
        desired: &K::Desired,
    ) -> Result<ResourceHandle, BackendError> {
        let mut state = self.state.lock().await;
        state.calls.push(BackendCall::Create);
        if let Some(error) = state.create_failure.take() {
            return Err(error);
        }
        let handle = ResourceHandle::new(cuid2::create_id());
        trace!(kind = K::ID, %handle, organization = %ctx.organization(), "memory create");
        state.resources.insert(handle.clone(), K::observe(desired));
        Ok(handle)
    }

    async fn fetch(
        &self,
        ctx: &Context,
        handle: &ResourceHandle,
    ) -> Result<K::Observed, BackendError> {
        let mut state = self.state.lock().await;
        state.calls.push(BackendCall::Fetch(handle.clone()));
        trace!(kind = K::ID, %handle, organization = %ctx.organization(), "memory fetch");
        if let Some(error) = state.fetch_failure.take() {
            return Err(error);
        }
        state
            .resources
            .get(handle)
            .cloned()
            .ok_or_else(|| BackendError::NotFound {
                handle: handle.clone(),
            })
    }

    async fn mutate(
        &self,
        ctx: &Context,
        handle: &ResourceHandle,
        field: &MutationField<K::Mutation>,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock().await;
        state.calls.push(BackendCall::Mutate {
            handle: handle.clone(),
            field: field.name.clone(),
        });
        trace!(
            kind = K::ID,
            %handle,
            field = %field.name,
            organization = %ctx.organization(),
            "memory mutate"
        );
        if let Some(error) = state.field_failures.get(&field.name) {
            return Err(error.clone());
        }
        let observed = live::<K>(&mut state.resources, handle)?;
        K::apply(observed, &field.mutation);
        Ok(())
    }

    async fn delete(&self, ctx: &Context, handle: &ResourceHandle) -> Result<(), BackendError> {
        let mut state = self.state.lock().await;
        state.calls.push(BackendCall::Delete(handle.clone()));
        trace!(kind = K::ID, %handle, organization = %ctx.organization(), "memory delete");
        if let Some(error) = state.delete_failure.take() {
            return Err(error);
        }
        let observed = live::<K>(&mut state.resources, handle)?;
        K::set_status(observed, LifecycleStatus::Deleted);
        Ok(())
    }
}
