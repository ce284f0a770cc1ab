//! Reference resource kinds.
//!
//! Each kind only says which fields it has and which diff each field goes
//! through; materialize, converge and retire are shared.

pub mod cluster;
pub mod instance;

pub use cluster::{
    AccessLevel, ClusterDesired, ClusterMutation, ClusterObserved, MaintenanceMode, ManagedCluster,
    PermissionKey, PowerState, UserPermission,
};
pub use instance::{Instance, InstanceDesired, InstanceMutation, InstanceObserved};
