use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::error::{Side, ValidationError};

/// A member of a fixed-membership collection. Only `status` may change once
/// the collection exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionedMember<S> {
    pub identity: String,
    pub status: S,
}

impl<S> PartitionedMember<S> {
    pub fn new(identity: impl Into<String>, status: S) -> Self {
        Self {
            identity: identity.into(),
            status,
        }
    }
}

/// Identities that have to move into each status, ordered by identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionDiff<S: Ord> {
    moves: BTreeMap<S, Vec<String>>,
}

impl<S: Ord> PartitionDiff<S> {
    /// Identities that have to move into `status`.
    pub fn moving_to(&self, status: &S) -> &[String] {
        self.moves.get(status).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&S, &Vec<String>)> {
        self.moves.iter()
    }

    pub fn len(&self) -> usize {
        self.moves.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }
}

fn index<S>(
    members: &[PartitionedMember<S>],
    side: Side,
) -> Result<BTreeMap<&str, &S>, ValidationError> {
    let mut map = BTreeMap::new();
    for member in members {
        if map.insert(member.identity.as_str(), &member.status).is_some() {
            return Err(ValidationError::DuplicateIdentity {
                identity: member.identity.clone(),
                side,
            });
        }
    }
    Ok(map)
}

/// Diff the status of a fixed-membership collection.
///
/// Fails before anything is planned if the desired membership differs from
/// the observed one in any way: a member may change status, never identity.
/// Neither side may repeat an identity, so equal identity sets also mean
/// equal member counts.
pub fn diff_partition<S>(
    desired: &[PartitionedMember<S>],
    observed: &[PartitionedMember<S>],
) -> Result<PartitionDiff<S>, ValidationError>
where
    S: Ord + Clone + Debug,
{
    let want = index(desired, Side::Desired)?;
    let have = index(observed, Side::Observed)?;

    let want_ids: BTreeSet<&str> = want.keys().copied().collect();
    let have_ids: BTreeSet<&str> = have.keys().copied().collect();
    if let Some(identity) = want_ids.difference(&have_ids).next() {
        return Err(ValidationError::UnknownMember {
            identity: identity.to_string(),
        });
    }
    if let Some(identity) = have_ids.difference(&want_ids).next() {
        return Err(ValidationError::MissingMember {
            identity: identity.to_string(),
        });
    }
    let mut moves: BTreeMap<S, Vec<String>> = BTreeMap::new();
    for (identity, status) in want {
        if have.get(identity) != Some(&status) {
            moves
                .entry(status.clone())
                .or_default()
                .push(identity.to_string());
        }
    }
    Ok(PartitionDiff { moves })
}
