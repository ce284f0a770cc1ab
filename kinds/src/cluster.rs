use std::fmt::Display;

use concord_diff::{GrantAssignment, GrantSet, PartitionedMember, ValidationError};
use concord_mutation::{MutationField, PriorityGroup};
use concord_resource::memory::MemoryKind;
use concord_resource::{
    Change, ChangePlan, DeletionPolicy, DiffOptions, LifecycleStatus, Observed, ResourceKind,
};
use serde::{Deserialize, Serialize};

/// A managed database cluster: members, hosts, databases, users and role
/// grants.
#[derive(Debug, Clone)]
pub struct ManagedCluster;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    Running,
    Stopped,
}

impl Display for PowerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PowerState::Running => write!(f, "running"),
            PowerState::Stopped => write!(f, "stopped"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaintenanceMode {
    Serving,
    Maintenance,
}

impl Display for MaintenanceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaintenanceMode::Serving => write!(f, "serving"),
            MaintenanceMode::Maintenance => write!(f, "maintenance"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessLevel {
    Read,
    ReadWrite,
    Admin,
}

impl Display for AccessLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessLevel::Read => write!(f, "read"),
            AccessLevel::ReadWrite => write!(f, "read-write"),
            AccessLevel::Admin => write!(f, "admin"),
        }
    }
}

/// Identity of a [`UserPermission`]. Renders as `user:database`; a part
/// containing `:` or `"` is quoted so distinct keys never render alike.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PermissionKey {
    pub user: String,
    pub database: String,
}

fn write_key_part(f: &mut std::fmt::Formatter<'_>, part: &str) -> std::fmt::Result {
    if part.contains([':', '"']) {
        write!(f, "{part:?}")
    } else {
        f.write_str(part)
    }
}

impl Display for PermissionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write_key_part(f, &self.user)?;
        f.write_str(":")?;
        write_key_part(f, &self.database)
    }
}

/// A user's access to one database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPermission {
    pub user: String,
    pub database: String,
    pub level: AccessLevel,
}

impl UserPermission {
    pub fn new(
        user: impl Into<String>,
        database: impl Into<String>,
        level: AccessLevel,
    ) -> Self {
        Self {
            user: user.into(),
            database: database.into(),
            level,
        }
    }

    pub fn key(&self) -> PermissionKey {
        PermissionKey {
            user: self.user.clone(),
            database: self.database.clone(),
        }
    }
}

impl Display for UserPermission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.key(), self.level)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterDesired {
    pub label: String,
    pub flavor: String,
    pub members: Vec<PartitionedMember<PowerState>>,
    #[serde(default)]
    pub hosts: Vec<PartitionedMember<MaintenanceMode>>,
    #[serde(default)]
    pub databases: Vec<String>,
    #[serde(default)]
    pub users: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<UserPermission>,
    #[serde(default)]
    pub grants: GrantSet,
    pub version: String,
    #[serde(default)]
    pub deletion_protection: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterObserved {
    pub status: LifecycleStatus,
    pub label: String,
    pub flavor: String,
    pub members: Vec<PartitionedMember<PowerState>>,
    pub hosts: Vec<PartitionedMember<MaintenanceMode>>,
    pub databases: Vec<String>,
    pub users: Vec<String>,
    pub permissions: Vec<UserPermission>,
    pub grants: GrantSet,
    pub version: String,
    pub deletion_protection: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterMutation {
    Label(String),
    DeletionProtection(bool),
    Flavor(String),
    Power {
        state: PowerState,
        members: Vec<String>,
    },
    Maintenance {
        mode: MaintenanceMode,
        hosts: Vec<String>,
    },
    Database(Change<String>),
    User(Change<String>),
    Permission(Change<UserPermission>),
    Grant(Change<GrantAssignment>),
    Version(String),
}

impl Display for ClusterMutation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use ClusterMutation::*;
        match self {
            Label(label) => write!(f, "Cluster::Label({label})"),
            DeletionProtection(enabled) => write!(f, "Cluster::DeletionProtection({enabled})"),
            Flavor(flavor) => write!(f, "Cluster::Flavor({flavor})"),
            Power { state, members } => {
                write!(f, "Cluster::Power({state}: {})", members.join(", "))
            }
            Maintenance { mode, hosts } => {
                write!(f, "Cluster::Maintenance({mode}: {})", hosts.join(", "))
            }
            Database(change) => write!(f, "Cluster::Database({change})"),
            User(change) => write!(f, "Cluster::User({change})"),
            Permission(change) => write!(f, "Cluster::Permission({change})"),
            Grant(change) => write!(f, "Cluster::Grant({change})"),
            Version(version) => write!(f, "Cluster::Version({version})"),
        }
    }
}

impl Observed for ClusterObserved {
    fn lifecycle_status(&self) -> LifecycleStatus {
        self.status
    }

    fn deletion_policy(&self) -> DeletionPolicy {
        if self.deletion_protection {
            DeletionPolicy::Protected {
                reason: "cluster has deletion protection enabled".into(),
            }
        } else {
            DeletionPolicy::Allowed
        }
    }
}

impl ResourceKind for ManagedCluster {
    const ID: &'static str = "managed-cluster";

    type Desired = ClusterDesired;
    type Observed = ClusterObserved;
    type Mutation = ClusterMutation;

    fn plan(
        desired: &Self::Desired,
        observed: &Self::Observed,
        options: &DiffOptions,
    ) -> Result<Vec<MutationField<Self::Mutation>>, ValidationError> {
        use ClusterMutation::*;
        use PriorityGroup::{Access, Capacity, Identity, Storage};

        let mut plan = ChangePlan::new(options);
        plan.scalar("label", Identity, &desired.label, &observed.label, |v| {
            Label(v.clone())
        })
        .scalar(
            "deletion_protection",
            Identity,
            desired.deletion_protection,
            observed.deletion_protection,
            DeletionProtection,
        )
        .scalar("flavor", Capacity, &desired.flavor, &observed.flavor, |v| {
            Flavor(v.clone())
        })
        .partition(
            "members",
            Capacity,
            &desired.members,
            &observed.members,
            |state, members| Power { state, members },
        )?
        .partition("hosts", Capacity, &desired.hosts, &observed.hosts, |mode, hosts| {
            Maintenance { mode, hosts }
        })?
        .collection(
            "database",
            Storage,
            &desired.databases,
            &observed.databases,
            |name| name.clone(),
            Database,
        )?
        .collection(
            "user",
            Access,
            &desired.users,
            &observed.users,
            |name| name.clone(),
            User,
        )?
        .collection_by_value(
            "permission",
            Access,
            &desired.permissions,
            &observed.permissions,
            UserPermission::key,
            Permission,
        )?
        .grants("grant", Access, &desired.grants, &observed.grants, Grant)
        .scalar(
            "version",
            PriorityGroup::Version,
            &desired.version,
            &observed.version,
            |v| Version(v.clone()),
        );
        Ok(plan.finish())
    }
}

fn apply_change<T, K, I>(items: &mut Vec<T>, change: &Change<T>, identity: I)
where
    T: Clone,
    K: PartialEq,
    I: Fn(&T) -> K,
{
    let key = identity(change.item());
    match change {
        Change::Add(item) | Change::Update(item) => {
            match items.iter().position(|existing| identity(existing) == key) {
                Some(index) => items[index] = item.clone(),
                None => items.push(item.clone()),
            }
        }
        Change::Remove(_) => items.retain(|existing| identity(existing) != key),
    }
}

fn move_members<S: Copy>(members: &mut [PartitionedMember<S>], identities: &[String], status: S) {
    for member in members
        .iter_mut()
        .filter(|member| identities.contains(&member.identity))
    {
        member.status = status;
    }
}

impl MemoryKind for ManagedCluster {
    fn observe(desired: &Self::Desired) -> Self::Observed {
        ClusterObserved {
            status: LifecycleStatus::Active,
            label: desired.label.clone(),
            flavor: desired.flavor.clone(),
            members: desired.members.clone(),
            hosts: desired.hosts.clone(),
            databases: desired.databases.clone(),
            users: desired.users.clone(),
            permissions: desired.permissions.clone(),
            grants: desired.grants.clone(),
            version: desired.version.clone(),
            deletion_protection: desired.deletion_protection,
        }
    }

    fn apply(observed: &mut Self::Observed, mutation: &Self::Mutation) {
        use ClusterMutation::*;
        match mutation {
            Label(label) => observed.label = label.clone(),
            DeletionProtection(enabled) => observed.deletion_protection = *enabled,
            Flavor(flavor) => observed.flavor = flavor.clone(),
            Power { state, members } => move_members(&mut observed.members, members, *state),
            Maintenance { mode, hosts } => move_members(&mut observed.hosts, hosts, *mode),
            Database(change) => apply_change(&mut observed.databases, change, String::clone),
            User(change) => apply_change(&mut observed.users, change, String::clone),
            Permission(change) => {
                apply_change(&mut observed.permissions, change, UserPermission::key)
            }
            Grant(Change::Add(assignment) | Change::Update(assignment)) => {
                observed.grants.assign(assignment.clone())
            }
            Grant(Change::Remove(assignment)) => observed.grants.revoke(&assignment.role),
            Version(version) => observed.version = version.clone(),
        }
    }

    fn set_status(observed: &mut Self::Observed, status: LifecycleStatus) {
        observed.status = status;
    }
}
