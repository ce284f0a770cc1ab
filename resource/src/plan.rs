use std::collections::BTreeMap;
use std::fmt::Display;

use concord_diff::{
    CollectionDiff, GrantAssignment, GrantSet, PartitionedMember, ResizeAction, Side, SizeUnits,
    SizedMount, ValidationError, diff_collection, diff_collection_by_value, diff_grants,
    diff_partition, validate_resize,
};
use concord_mutation::{FieldDiff, FieldName, MutationField, PriorityGroup};
use tracing::trace;

use crate::kind::DiffOptions;

/// A membership change for one item of a keyed collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change<T> {
    Add(T),
    Update(T),
    Remove(T),
}

impl<T> Change<T> {
    pub fn item(&self) -> &T {
        match self {
            Change::Add(item) | Change::Update(item) | Change::Remove(item) => item,
        }
    }
}

impl<T: Display> Display for Change<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Change::Add(item) => write!(f, "add {item}"),
            Change::Update(item) => write!(f, "update {item}"),
            Change::Remove(item) => write!(f, "remove {item}"),
        }
    }
}

/// Collects the changed fields of one resource, routing each field to the
/// diff that fits its shape.
///
/// Every structural check runs while the plan is built, so a violation
/// surfaces before the first mutation is sent.
#[derive(Debug)]
pub struct ChangePlan<'a, M> {
    options: &'a DiffOptions,
    fields: Vec<MutationField<M>>,
}

impl<'a, M> ChangePlan<'a, M> {
    pub fn new(options: &'a DiffOptions) -> Self {
        Self {
            options,
            fields: Vec::new(),
        }
    }

    /// A single value compared by equality.
    pub fn scalar<T, F>(
        &mut self,
        name: &str,
        priority: PriorityGroup,
        desired: T,
        observed: T,
        mutation: F,
    ) -> &mut Self
    where
        T: PartialEq,
        F: FnOnce(T) -> M,
    {
        let diff = FieldDiff::new(name, priority, desired, observed);
        if let Some(field) = diff.into_field(mutation) {
            self.fields.push(field);
        }
        self
    }

    /// Role grants, one field per role.
    pub fn grants<F>(
        &mut self,
        base: &str,
        priority: PriorityGroup,
        desired: &GrantSet,
        observed: &GrantSet,
        mutation: F,
    ) -> &mut Self
    where
        F: Fn(Change<GrantAssignment>) -> M,
    {
        let diff = diff_grants(desired, observed, self.options.grant_diff);
        let changes = diff
            .to_add
            .into_iter()
            .map(Change::Add)
            .chain(diff.to_change.into_iter().map(Change::Update))
            .chain(diff.to_remove.into_iter().map(Change::Remove));
        for change in changes {
            let name = FieldName::keyed(base, &change.item().role);
            self.fields
                .push(MutationField::new(name, priority, mutation(change)));
        }
        self
    }

    /// A keyed collection compared by identity only.
    pub fn collection<T, K, I, F>(
        &mut self,
        base: &str,
        priority: PriorityGroup,
        desired: &[T],
        observed: &[T],
        identity: I,
        mutation: F,
    ) -> Result<&mut Self, ValidationError>
    where
        T: Clone,
        K: Ord + Display,
        I: Fn(&T) -> K,
        F: Fn(Change<T>) -> M,
    {
        let diff = diff_collection(desired, observed, &identity)?;
        self.push_collection(base, priority, diff, identity, mutation);
        Ok(self)
    }

    /// A keyed collection where items sharing an identity may still differ.
    pub fn collection_by_value<T, K, I, F>(
        &mut self,
        base: &str,
        priority: PriorityGroup,
        desired: &[T],
        observed: &[T],
        identity: I,
        mutation: F,
    ) -> Result<&mut Self, ValidationError>
    where
        T: Clone + PartialEq,
        K: Ord + Display,
        I: Fn(&T) -> K,
        F: Fn(Change<T>) -> M,
    {
        let diff = diff_collection_by_value(desired, observed, &identity)?;
        self.push_collection(base, priority, diff, identity, mutation);
        Ok(self)
    }

    fn push_collection<T, K, I, F>(
        &mut self,
        base: &str,
        priority: PriorityGroup,
        diff: CollectionDiff<T>,
        identity: I,
        mutation: F,
    ) where
        K: Display,
        I: Fn(&T) -> K,
        F: Fn(Change<T>) -> M,
    {
        let CollectionDiff {
            added,
            removed,
            changed,
        } = diff;
        let changes = added
            .into_iter()
            .map(Change::Add)
            .chain(changed.into_iter().map(Change::Update))
            .chain(removed.into_iter().map(Change::Remove));
        for change in changes {
            let name = FieldName::keyed(base, identity(change.item()));
            self.fields
                .push(MutationField::new(name, priority, mutation(change)));
        }
    }

    /// Status flips of a fixed-membership collection, one field per target
    /// status.
    pub fn partition<S, F>(
        &mut self,
        base: &str,
        priority: PriorityGroup,
        desired: &[PartitionedMember<S>],
        observed: &[PartitionedMember<S>],
        mutation: F,
    ) -> Result<&mut Self, ValidationError>
    where
        S: Ord + Clone + Display + std::fmt::Debug,
        F: Fn(S, Vec<String>) -> M,
    {
        let diff = diff_partition(desired, observed)?;
        for (status, identities) in diff.iter() {
            let name = FieldName::keyed(base, status);
            self.fields.push(MutationField::new(
                name,
                priority,
                mutation(status.clone(), identities.clone()),
            ));
        }
        Ok(self)
    }

    /// Sized mounts keyed by path. The set of paths is fixed after creation;
    /// each mount may only grow. `mutation` receives the desired mount and
    /// the growth.
    pub fn mounts<F>(
        &mut self,
        base: &str,
        priority: PriorityGroup,
        desired: &[SizedMount],
        observed: &[SizedMount],
        mutation: F,
    ) -> Result<&mut Self, ValidationError>
    where
        F: Fn(&SizedMount, SizeUnits) -> M,
    {
        let seen = index_mounts(desired, Side::Desired)?;
        let observed = index_mounts(observed, Side::Observed)?;
        if let Some(path) = seen.keys().find(|path| !observed.contains_key(*path)) {
            return Err(ValidationError::MountAdded {
                path: path.to_string(),
            });
        }
        if let Some(path) = observed.keys().find(|path| !seen.contains_key(*path)) {
            return Err(ValidationError::MountRemoved {
                path: path.to_string(),
            });
        }

        for (path, want) in seen {
            let have = observed[path];
            match validate_resize(want, have, self.options.min_resize_increment)? {
                ResizeAction::NoOp => {}
                ResizeAction::ApplyResize { path, delta } => {
                    let name = FieldName::keyed(base, path);
                    self.fields
                        .push(MutationField::new(name, priority, mutation(want, delta)));
                }
            }
        }
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn finish(self) -> Vec<MutationField<M>> {
        trace!(fields = self.fields.len(), "plan finished");
        self.fields
    }
}

fn index_mounts(
    mounts: &[SizedMount],
    side: Side,
) -> Result<BTreeMap<&str, &SizedMount>, ValidationError> {
    let mut map = BTreeMap::new();
    for mount in mounts {
        if map.insert(mount.path.as_str(), mount).is_some() {
            return Err(ValidationError::DuplicateIdentity {
                identity: mount.path.clone(),
                side,
            });
        }
    }
    Ok(map)
}
