use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

use serde::{Deserialize, Serialize};
use tracing::trace;

/// One role and the groups holding it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GrantAssignment {
    pub role: String,
    pub groups: BTreeSet<String>,
}

impl Display for GrantAssignment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let groups: Vec<&str> = self.groups.iter().map(String::as_str).collect();
        write!(f, "{} = [{}]", self.role, groups.join(", "))
    }
}

/// Mapping of role to the groups holding it.
///
/// A role with no groups is absent, never present-with-empty: inserting an
/// empty group set removes the role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, BTreeSet<String>>", into = "BTreeMap<String, BTreeSet<String>>")]
pub struct GrantSet(BTreeMap<String, BTreeSet<String>>);

impl GrantSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<R, G, S>(&mut self, role: R, groups: G)
    where
        R: Into<String>,
        G: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let role = role.into();
        let groups: BTreeSet<String> = groups.into_iter().map(Into::into).collect();
        if groups.is_empty() {
            self.0.remove(&role);
        } else {
            self.0.insert(role, groups);
        }
    }

    pub fn get(&self, role: &str) -> Option<&BTreeSet<String>> {
        self.0.get(role)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
        self.0.iter()
    }

    /// Apply one assignment, replacing whatever groups the role held.
    pub fn assign(&mut self, assignment: GrantAssignment) {
        let GrantAssignment { role, groups } = assignment;
        self.insert(role, groups);
    }

    pub fn revoke(&mut self, role: &str) {
        self.0.remove(role);
    }
}

impl From<BTreeMap<String, BTreeSet<String>>> for GrantSet {
    fn from(map: BTreeMap<String, BTreeSet<String>>) -> Self {
        map.into_iter().collect()
    }
}

impl From<GrantSet> for BTreeMap<String, BTreeSet<String>> {
    fn from(set: GrantSet) -> Self {
        set.0
    }
}

impl<R, G, S> FromIterator<(R, G)> for GrantSet
where
    R: Into<String>,
    G: IntoIterator<Item = S>,
    S: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (R, G)>>(iter: I) -> Self {
        let mut set = GrantSet::new();
        for (role, groups) in iter {
            set.insert(role, groups);
        }
        set
    }
}

/// How two group sets for the same role are compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GrantDiffMode {
    /// Changed whenever the symmetric difference is non-empty.
    #[default]
    Symmetric,
    /// Changed only when the group counts differ. Misses same-size
    /// replacements; kept for compatibility with state written by older
    /// controllers.
    LegacyCardinality,
}

impl GrantDiffMode {
    fn changed(&self, desired: &BTreeSet<String>, observed: &BTreeSet<String>) -> bool {
        match self {
            GrantDiffMode::Symmetric => desired.symmetric_difference(observed).next().is_some(),
            GrantDiffMode::LegacyCardinality => desired.len() != observed.len(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantDiff {
    pub to_add: Vec<GrantAssignment>,
    /// Carries the desired groups for each changed role.
    pub to_change: Vec<GrantAssignment>,
    /// Carries the observed groups for each removed role.
    pub to_remove: Vec<GrantAssignment>,
}

impl GrantDiff {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_change.is_empty() && self.to_remove.is_empty()
    }
}

/// Diff role grants. Output lists are ordered by role.
pub fn diff_grants(desired: &GrantSet, observed: &GrantSet, mode: GrantDiffMode) -> GrantDiff {
    let mut diff = GrantDiff::default();

    for (role, groups) in desired.iter() {
        match observed.get(role) {
            None => diff.to_add.push(GrantAssignment {
                role: role.clone(),
                groups: groups.clone(),
            }),
            Some(current) if mode.changed(groups, current) => {
                diff.to_change.push(GrantAssignment {
                    role: role.clone(),
                    groups: groups.clone(),
                })
            }
            Some(_) => {}
        }
    }

    for (role, groups) in observed.iter() {
        if desired.get(role).is_none() {
            diff.to_remove.push(GrantAssignment {
                role: role.clone(),
                groups: groups.clone(),
            });
        }
    }

    trace!(
        add = diff.to_add.len(),
        change = diff.to_change.len(),
        remove = diff.to_remove.len(),
        "diffed grants"
    );
    diff
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grants(entries: &[(&str, &[&str])]) -> GrantSet {
        entries
            .iter()
            .map(|(role, groups)| (*role, groups.iter().copied()))
            .collect()
    }

    #[test]
    fn reordered_groups_are_unchanged() {
        let desired = grants(&[("admin", &["g1", "g2"])]);
        let observed = grants(&[("admin", &["g2", "g1"])]);
        let diff = diff_grants(&desired, &observed, GrantDiffMode::Symmetric);
        assert!(diff.is_empty());
    }

    #[test]
    fn same_size_replacement_is_a_change() {
        let desired = grants(&[("admin", &["g1", "g3"])]);
        let observed = grants(&[("admin", &["g1", "g2"])]);
        let diff = diff_grants(&desired, &observed, GrantDiffMode::Symmetric);
        assert_eq!(
            diff.to_change,
            vec![GrantAssignment {
                role: "admin".into(),
                groups: ["g1", "g3"].into_iter().map(String::from).collect(),
            }]
        );
        assert!(diff.to_add.is_empty());
        assert!(diff.to_remove.is_empty());
    }

    #[test]
    fn legacy_mode_misses_same_size_replacement() {
        let desired = grants(&[("admin", &["g1", "g3"])]);
        let observed = grants(&[("admin", &["g1", "g2"])]);
        let diff = diff_grants(&desired, &observed, GrantDiffMode::LegacyCardinality);
        assert!(diff.is_empty());

        let desired = grants(&[("admin", &["g1"])]);
        let diff = diff_grants(&desired, &observed, GrantDiffMode::LegacyCardinality);
        assert_eq!(diff.to_change.len(), 1);
    }

    #[test]
    fn added_and_removed_roles() {
        let desired = grants(&[("reader", &["g1"]), ("writer", &["g2"])]);
        let observed = grants(&[("owner", &["g9"]), ("writer", &["g2"])]);
        let diff = diff_grants(&desired, &observed, GrantDiffMode::Symmetric);

        assert_eq!(diff.to_add.len(), 1);
        assert_eq!(diff.to_add[0].role, "reader");
        assert_eq!(diff.to_remove.len(), 1);
        assert_eq!(diff.to_remove[0].role, "owner");
        assert!(diff.to_change.is_empty());
    }

    #[test]
    fn empty_group_set_means_absent() {
        let desired = grants(&[("admin", &[])]);
        assert!(desired.is_empty());

        let observed = grants(&[("admin", &["g1"])]);
        let diff = diff_grants(&desired, &observed, GrantDiffMode::Symmetric);
        assert_eq!(diff.to_remove.len(), 1);
        assert!(diff.to_change.is_empty());
    }

    #[test]
    fn assign_empty_revokes() {
        let mut set = grants(&[("admin", &["g1"])]);
        set.assign(GrantAssignment {
            role: "admin".into(),
            groups: BTreeSet::new(),
        });
        assert!(set.get("admin").is_none());
    }
}
