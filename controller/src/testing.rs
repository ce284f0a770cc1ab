use std::fmt::Display;

use concord_ctx::{Context, Credentials, EnvironmentName, OrganizationId};
use concord_diff::{SizeUnits, SizedMount, ValidationError};
use concord_mutation::{MutationField, PriorityGroup};
use concord_resource::memory::MemoryKind;
use concord_resource::{
    ChangePlan, DeletionPolicy, DiffOptions, LifecycleStatus, Observed, ResourceKind,
};

#[derive(Debug)]
pub struct Widget;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetDesired {
    pub label: String,
    pub flavor: String,
    pub mounts: Vec<SizedMount>,
    pub protected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetObserved {
    pub status: LifecycleStatus,
    pub label: String,
    pub flavor: String,
    pub mounts: Vec<SizedMount>,
    pub protected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetMutation {
    Label(String),
    Flavor(String),
    Resize { path: String, size: SizeUnits },
}

impl Display for WidgetMutation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WidgetMutation::Label(label) => write!(f, "label = {label}"),
            WidgetMutation::Flavor(flavor) => write!(f, "flavor = {flavor}"),
            WidgetMutation::Resize { path, size } => write!(f, "{path} = {size}"),
        }
    }
}

impl Observed for WidgetObserved {
    fn lifecycle_status(&self) -> LifecycleStatus {
        self.status
    }

    fn deletion_policy(&self) -> DeletionPolicy {
        if self.protected {
            DeletionPolicy::Protected {
                reason: "deletion protection is enabled".into(),
            }
        } else {
            DeletionPolicy::Allowed
        }
    }
}

impl ResourceKind for Widget {
    const ID: &'static str = "widget";

    type Desired = WidgetDesired;
    type Observed = WidgetObserved;
    type Mutation = WidgetMutation;

    fn plan(
        desired: &Self::Desired,
        observed: &Self::Observed,
        options: &DiffOptions,
    ) -> Result<Vec<MutationField<Self::Mutation>>, ValidationError> {
        let mut plan = ChangePlan::new(options);
        plan.scalar(
            "label",
            PriorityGroup::Identity,
            &desired.label,
            &observed.label,
            |label| WidgetMutation::Label(label.clone()),
        )
        .scalar(
            "flavor",
            PriorityGroup::Capacity,
            &desired.flavor,
            &observed.flavor,
            |flavor| WidgetMutation::Flavor(flavor.clone()),
        )
        .mounts(
            "mount",
            PriorityGroup::Storage,
            &desired.mounts,
            &observed.mounts,
            |mount, _| WidgetMutation::Resize {
                path: mount.path.clone(),
                size: mount.size,
            },
        )?;
        Ok(plan.finish())
    }
}

impl MemoryKind for Widget {
    fn observe(desired: &Self::Desired) -> Self::Observed {
        WidgetObserved {
            status: LifecycleStatus::Active,
            label: desired.label.clone(),
            flavor: desired.flavor.clone(),
            mounts: desired.mounts.clone(),
            protected: desired.protected,
        }
    }

    fn apply(observed: &mut Self::Observed, mutation: &Self::Mutation) {
        match mutation {
            WidgetMutation::Label(label) => observed.label = label.clone(),
            WidgetMutation::Flavor(flavor) => observed.flavor = flavor.clone(),
            WidgetMutation::Resize { path, size } => {
                if let Some(mount) = observed.mounts.iter_mut().find(|m| &m.path == path) {
                    mount.size = *size;
                }
            }
        }
    }

    fn set_status(observed: &mut Self::Observed, status: LifecycleStatus) {
        observed.status = status;
    }
}

pub fn ctx() -> Context {
    Context::new(
        OrganizationId::new("acme"),
        EnvironmentName::new("test"),
        Credentials::new("token"),
    )
}

pub fn mount(path: &str, size: u64) -> SizedMount {
    SizedMount {
        path: path.into(),
        size: SizeUnits(size),
        filesystem: "ext4".into(),
    }
}

pub fn widget(label: &str, flavor: &str, data_size: u64) -> WidgetDesired {
    WidgetDesired {
        label: label.into(),
        flavor: flavor.into(),
        mounts: vec![mount("/data", data_size)],
        protected: false,
    }
}
