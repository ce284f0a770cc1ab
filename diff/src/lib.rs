//! Pure diffing primitives shared by every resource kind.
//!
//! Nothing in here talks to a backend: each function compares a desired
//! value against an observed one and returns what has to move, or a
//! [`ValidationError`] when the desired value breaks a structural rule.

mod collection;
mod error;
mod grant;
mod partition;
mod resize;

pub use collection::{CollectionDiff, diff_collection, diff_collection_by_value};
pub use error::{Side, ValidationError};
pub use grant::{GrantAssignment, GrantDiff, GrantDiffMode, GrantSet, diff_grants};
pub use partition::{PartitionDiff, PartitionedMember, diff_partition};
pub use resize::{ResizeAction, SizeUnits, SizedMount, validate_resize};
