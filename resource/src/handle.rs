use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Backend-assigned identifier of one remote resource.
///
/// Created once by materialize and kept until retire.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceHandle(String);

impl ResourceHandle {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ResourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LifecycleStatus {
    Active,
    Deleted,
    Deprovisioned,
    Unknown,
}

impl LifecycleStatus {
    /// The resource no longer exists remotely.
    pub fn is_gone(&self) -> bool {
        matches!(self, LifecycleStatus::Deleted | LifecycleStatus::Deprovisioned)
    }
}

impl Display for LifecycleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use LifecycleStatus::*;
        let name = match self {
            Active => "ACTIVE",
            Deleted => "DELETED",
            Deprovisioned => "DEPROVISIONED",
            Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}
