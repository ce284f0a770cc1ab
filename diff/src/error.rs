use displaydoc::Display;
use thiserror::Error;

/// A desired configuration that breaks a structural invariant.
///
/// Never retried: the desired configuration has to be corrected first.
#[derive(Debug, Clone, PartialEq, Eq, Error, Display)]
pub enum ValidationError {
    /// identity `{identity}` appears more than once in the {side} collection
    DuplicateIdentity { identity: String, side: Side },

    /// member `{identity}` is desired but does not exist on the resource
    UnknownMember { identity: String },

    /// member `{identity}` exists on the resource but is missing from the desired members
    MissingMember { identity: String },

    /// mount `{path}` cannot shrink from {observed} to {desired}
    Shrink {
        path: String,
        desired: u64,
        observed: u64,
    },

    /// mount `{path}` grows by {delta}, below the minimum increment of {min_increment}
    BelowMinimumIncrement {
        path: String,
        delta: u64,
        min_increment: u64,
    },

    /// desired mount `{desired}` compared against observed mount `{observed}`
    MountPathMismatch { desired: String, observed: String },

    /// mount `{path}` cannot change filesystem from `{observed}` to `{desired}`
    FilesystemChanged {
        path: String,
        desired: String,
        observed: String,
    },

    /// mount `{path}` cannot be added after creation
    MountAdded { path: String },

    /// mount `{path}` cannot be removed after creation
    MountRemoved { path: String },

    /// field `{field}` is planned more than once
    DuplicateField { field: String },
}

/// Which side of a comparison a value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Side {
    /// desired
    Desired,
    /// observed
    Observed,
}
