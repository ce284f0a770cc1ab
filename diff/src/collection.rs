use std::collections::BTreeMap;
use std::fmt::Display;

use crate::error::{Side, ValidationError};

/// Result of diffing two unordered collections by identity.
///
/// Every list is ordered by identity, so the result does not depend on the
/// order either input was supplied in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionDiff<T> {
    pub added: Vec<T>,
    pub removed: Vec<T>,
    /// Items whose identity matched but whose other fields differ, carrying
    /// the desired value. Always empty for [`diff_collection`].
    pub changed: Vec<T>,
}

impl<T> Default for CollectionDiff<T> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            removed: Vec::new(),
            changed: Vec::new(),
        }
    }
}

impl<T> CollectionDiff<T> {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

fn index<'a, T, K, F>(
    items: &'a [T],
    identity: &F,
    side: Side,
) -> Result<BTreeMap<K, &'a T>, ValidationError>
where
    K: Ord + Display,
    F: Fn(&T) -> K,
{
    let mut map = BTreeMap::new();
    for item in items {
        let key = identity(item);
        if map.contains_key(&key) {
            return Err(ValidationError::DuplicateIdentity {
                identity: key.to_string(),
                side,
            });
        }
        map.insert(key, item);
    }
    Ok(map)
}

/// Diff by identity alone: items only in `desired` are added, items only in
/// `observed` are removed.
pub fn diff_collection<T, K, F>(
    desired: &[T],
    observed: &[T],
    identity: F,
) -> Result<CollectionDiff<T>, ValidationError>
where
    T: Clone,
    K: Ord + Display,
    F: Fn(&T) -> K,
{
    diff_indexed(desired, observed, &identity, |_, _| false)
}

/// Like [`diff_collection`], but items present on both sides whose values
/// differ are reported in `changed`.
pub fn diff_collection_by_value<T, K, F>(
    desired: &[T],
    observed: &[T],
    identity: F,
) -> Result<CollectionDiff<T>, ValidationError>
where
    T: Clone + PartialEq,
    K: Ord + Display,
    F: Fn(&T) -> K,
{
    diff_indexed(desired, observed, &identity, |want, have| want != have)
}

fn diff_indexed<T, K, F, C>(
    desired: &[T],
    observed: &[T],
    identity: &F,
    differs: C,
) -> Result<CollectionDiff<T>, ValidationError>
where
    T: Clone,
    K: Ord + Display,
    F: Fn(&T) -> K,
    C: Fn(&T, &T) -> bool,
{
    let desired = index(desired, identity, Side::Desired)?;
    let observed = index(observed, identity, Side::Observed)?;

    let mut diff = CollectionDiff::default();
    for (key, want) in desired.iter() {
        match observed.get(key) {
            None => diff.added.push((*want).clone()),
            Some(have) if differs(want, have) => diff.changed.push((*want).clone()),
            Some(_) => {}
        }
    }
    for (key, have) in observed.iter() {
        if !desired.contains_key(key) {
            diff.removed.push((*have).clone());
        }
    }
    Ok(diff)
}
