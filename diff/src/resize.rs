use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Size in the resource kind's allocation unit (e.g. GiB).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SizeUnits(pub u64);

impl Display for SizeUnits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A mounted volume. The path is fixed at creation and the size never
/// decreases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizedMount {
    pub path: String,
    pub size: SizeUnits,
    pub filesystem: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResizeAction {
    NoOp,
    ApplyResize { path: String, delta: SizeUnits },
}

/// Validate a size change: grow-only, by at least `min_increment`.
pub fn validate_resize(
    desired: &SizedMount,
    observed: &SizedMount,
    min_increment: SizeUnits,
) -> Result<ResizeAction, ValidationError> {
    if desired.path != observed.path {
        return Err(ValidationError::MountPathMismatch {
            desired: desired.path.clone(),
            observed: observed.path.clone(),
        });
    }
    if desired.filesystem != observed.filesystem {
        return Err(ValidationError::FilesystemChanged {
            path: desired.path.clone(),
            desired: desired.filesystem.clone(),
            observed: observed.filesystem.clone(),
        });
    }

    let Some(delta) = desired.size.0.checked_sub(observed.size.0) else {
        return Err(ValidationError::Shrink {
            path: desired.path.clone(),
            desired: desired.size.0,
            observed: observed.size.0,
        });
    };

    if delta == 0 {
        Ok(ResizeAction::NoOp)
    } else if delta < min_increment.0 {
        Err(ValidationError::BelowMinimumIncrement {
            path: desired.path.clone(),
            delta,
            min_increment: min_increment.0,
        })
    } else {
        Ok(ResizeAction::ApplyResize {
            path: desired.path.clone(),
            delta: SizeUnits(delta),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mount(size: u64) -> SizedMount {
        SizedMount {
            path: "/data".into(),
            size: SizeUnits(size),
            filesystem: "ext4".into(),
        }
    }

    const MIN: SizeUnits = SizeUnits(10);

    #[test]
    fn shrink_is_rejected() {
        let err = validate_resize(&mount(75), &mount(80), MIN).unwrap_err();
        assert!(matches!(err, ValidationError::Shrink { .. }));
    }

    #[test]
    fn same_size_is_noop() {
        assert_eq!(
            validate_resize(&mount(80), &mount(80), MIN).unwrap(),
            ResizeAction::NoOp
        );
    }

    #[test]
    fn growth_below_increment_is_rejected() {
        let err = validate_resize(&mount(85), &mount(80), MIN).unwrap_err();
        assert_eq!(
            err,
            ValidationError::BelowMinimumIncrement {
                path: "/data".into(),
                delta: 5,
                min_increment: 10,
            }
        );
    }

    #[test]
    fn growth_at_or_above_increment_resizes() {
        assert_eq!(
            validate_resize(&mount(100), &mount(80), MIN).unwrap(),
            ResizeAction::ApplyResize {
                path: "/data".into(),
                delta: SizeUnits(20),
            }
        );
        assert_eq!(
            validate_resize(&mount(90), &mount(80), MIN).unwrap(),
            ResizeAction::ApplyResize {
                path: "/data".into(),
                delta: SizeUnits(10),
            }
        );
    }

    #[test]
    fn filesystem_is_immutable() {
        let mut desired = mount(100);
        desired.filesystem = "xfs".into();
        let err = validate_resize(&desired, &mount(80), MIN).unwrap_err();
        assert!(matches!(err, ValidationError::FilesystemChanged { .. }));
    }
}
