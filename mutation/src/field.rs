use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldName(String);

impl FieldName {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Name for one member of a keyed collection, e.g. `database[orders]`.
    pub fn keyed(base: &str, key: impl Display) -> Self {
        Self(format!("{base}[{key}]"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for FieldName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for FieldName {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for FieldName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Order in which groups of fields are applied, lowest first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PriorityGroup {
    Identity,
    Billing,
    Capacity,
    Storage,
    Access,
    Version,
}

impl Display for PriorityGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use PriorityGroup::*;
        let name = match self {
            Identity => "identity",
            Billing => "billing",
            Capacity => "capacity",
            Storage => "storage",
            Access => "access",
            Version => "version",
        };
        f.write_str(name)
    }
}

/// One changed field: its name, when it is applied, and the mutation that
/// carries its desired value to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationField<M> {
    pub name: FieldName,
    pub priority: PriorityGroup,
    pub mutation: M,
}

impl<M> MutationField<M> {
    pub fn new(name: impl Into<FieldName>, priority: PriorityGroup, mutation: M) -> Self {
        Self {
            name: name.into(),
            priority,
            mutation,
        }
    }
}

/// Desired and observed values of a single scalar field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDiff<T> {
    pub name: FieldName,
    pub priority: PriorityGroup,
    pub desired: T,
    pub observed: T,
}

impl<T: PartialEq> FieldDiff<T> {
    pub fn new(
        name: impl Into<FieldName>,
        priority: PriorityGroup,
        desired: T,
        observed: T,
    ) -> Self {
        Self {
            name: name.into(),
            priority,
            desired,
            observed,
        }
    }

    pub fn changed(&self) -> bool {
        self.desired != self.observed
    }

    /// The mutation for this field, or `None` if it is unchanged.
    pub fn into_field<M, F>(self, mutation: F) -> Option<MutationField<M>>
    where
        F: FnOnce(T) -> M,
    {
        if !self.changed() {
            return None;
        }
        let FieldDiff {
            name,
            priority,
            desired,
            observed: _,
        } = self;
        Some(MutationField::new(name, priority, mutation(desired)))
    }
}
