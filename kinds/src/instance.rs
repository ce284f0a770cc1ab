use std::fmt::Display;

use concord_diff::{SizeUnits, SizedMount, ValidationError};
use concord_mutation::{MutationField, PriorityGroup};
use concord_resource::memory::MemoryKind;
use concord_resource::{
    ChangePlan, DeletionPolicy, DiffOptions, LifecycleStatus, Observed, ResourceKind,
};
use serde::{Deserialize, Serialize};

/// A virtual machine with sized data mounts.
#[derive(Debug, Clone)]
pub struct Instance;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceDesired {
    pub label: String,
    pub billing_plan: String,
    pub flavor: String,
    #[serde(default)]
    pub mounts: Vec<SizedMount>,
    pub version: String,
    #[serde(default)]
    pub deletion_protection: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceObserved {
    pub status: LifecycleStatus,
    pub label: String,
    pub billing_plan: String,
    pub flavor: String,
    pub mounts: Vec<SizedMount>,
    pub version: String,
    pub deletion_protection: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceMutation {
    Label(String),
    DeletionProtection(bool),
    BillingPlan(String),
    Flavor(String),
    /// Grow `path` to `size`, `by` units larger than observed.
    ResizeMount {
        path: String,
        size: SizeUnits,
        by: SizeUnits,
    },
    Version(String),
}

impl Display for InstanceMutation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use InstanceMutation::*;
        match self {
            Label(label) => write!(f, "Instance::Label({label})"),
            DeletionProtection(enabled) => write!(f, "Instance::DeletionProtection({enabled})"),
            BillingPlan(plan) => write!(f, "Instance::BillingPlan({plan})"),
            Flavor(flavor) => write!(f, "Instance::Flavor({flavor})"),
            ResizeMount { path, size, by } => {
                write!(f, "Instance::ResizeMount(path = {path}, size = {size}, by = {by})")
            }
            Version(version) => write!(f, "Instance::Version({version})"),
        }
    }
}

impl Observed for InstanceObserved {
    fn lifecycle_status(&self) -> LifecycleStatus {
        self.status
    }

    fn deletion_policy(&self) -> DeletionPolicy {
        if self.deletion_protection {
            DeletionPolicy::Protected {
                reason: "instance has deletion protection enabled".into(),
            }
        } else {
            DeletionPolicy::Allowed
        }
    }
}

impl ResourceKind for Instance {
    const ID: &'static str = "instance";

    type Desired = InstanceDesired;
    type Observed = InstanceObserved;
    type Mutation = InstanceMutation;

    fn plan(
        desired: &Self::Desired,
        observed: &Self::Observed,
        options: &DiffOptions,
    ) -> Result<Vec<MutationField<Self::Mutation>>, ValidationError> {
        use InstanceMutation::*;
        use PriorityGroup::{Billing, Capacity, Identity, Storage};

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
        .scalar(
            "billing_plan",
            Billing,
            &desired.billing_plan,
            &observed.billing_plan,
            |v| BillingPlan(v.clone()),
        )
        .scalar("flavor", Capacity, &desired.flavor, &observed.flavor, |v| {
            Flavor(v.clone())
        })
        .mounts("mount", Storage, &desired.mounts, &observed.mounts, |mount, by| {
            ResizeMount {
                path: mount.path.clone(),
                size: mount.size,
                by,
            }
        })?
        .scalar("version", PriorityGroup::Version, &desired.version, &observed.version, |v| {
            Version(v.clone())
        });
        Ok(plan.finish())
    }
}

impl MemoryKind for Instance {
    fn observe(desired: &Self::Desired) -> Self::Observed {
        InstanceObserved {
            status: LifecycleStatus::Active,
            label: desired.label.clone(),
            billing_plan: desired.billing_plan.clone(),
            flavor: desired.flavor.clone(),
            mounts: desired.mounts.clone(),
            version: desired.version.clone(),
            deletion_protection: desired.deletion_protection,
        }
    }

    fn apply(observed: &mut Self::Observed, mutation: &Self::Mutation) {
        use InstanceMutation::*;
        match mutation {
            Label(label) => observed.label = label.clone(),
            DeletionProtection(enabled) => observed.deletion_protection = *enabled,
            BillingPlan(plan) => observed.billing_plan = plan.clone(),
            Flavor(flavor) => observed.flavor = flavor.clone(),
            ResizeMount { path, size, .. } => {
                if let Some(mount) = observed.mounts.iter_mut().find(|m| &m.path == path) {
                    mount.size = (*size).max(mount.size);
                }
            }
            Version(version) => observed.version = version.clone(),
        }
    }

    fn set_status(observed: &mut Self::Observed, status: LifecycleStatus) {
        observed.status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desired() -> InstanceDesired {
        InstanceDesired {
            label: "web".into(),
            billing_plan: "hourly".into(),
            flavor: "m.small".into(),
            mounts: vec![SizedMount {
                path: "/data".into(),
                size: SizeUnits(80),
                filesystem: "ext4".into(),
            }],
            version: "1.0".into(),
            deletion_protection: false,
        }
    }

    #[test]
    fn plan_orders_fields_by_priority_group() {
        let observed = Instance::observe(&desired());
        let mut want = desired();
        want.version = "1.1".into();
        want.flavor = "m.large".into();
        want.billing_plan = "monthly".into();
        want.label = "web-1".into();
        want.mounts[0].size = SizeUnits(100);

        let fields = Instance::plan(&want, &observed, &DiffOptions::default()).unwrap();
        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["label", "billing_plan", "flavor", "mount[/data]", "version"]
        );
        assert_eq!(
            fields[3].mutation,
            InstanceMutation::ResizeMount {
                path: "/data".into(),
                size: SizeUnits(100),
                by: SizeUnits(20),
            }
        );
    }

    #[test]
    fn applying_every_planned_field_converges() {
        let mut observed = Instance::observe(&desired());
        let mut want = desired();
        want.flavor = "m.large".into();
        want.deletion_protection = true;

        for field in Instance::plan(&want, &observed, &DiffOptions::default()).unwrap() {
            Instance::apply(&mut observed, &field.mutation);
        }
        assert!(
            Instance::plan(&want, &observed, &DiffOptions::default())
                .unwrap()
                .is_empty()
        );
        assert_eq!(
            observed.deletion_policy(),
            DeletionPolicy::Protected {
                reason: "instance has deletion protection enabled".into()
            }
        );
    }

    #[test]
    fn resize_is_idempotent() {
        let mut observed = Instance::observe(&desired());
        let resize = InstanceMutation::ResizeMount {
            path: "/data".into(),
            size: SizeUnits(100),
            by: SizeUnits(20),
        };
        Instance::apply(&mut observed, &resize);
        Instance::apply(&mut observed, &resize);
        assert_eq!(observed.mounts[0].size, SizeUnits(100));
    }
}
