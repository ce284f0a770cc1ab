use concord_controller::{
    ControllerError, ConvergeOutcome, EngineConfig, ReconcileOutcome, ResourceController,
    RetireOutcome,
};
use concord_ctx::{Context, Credentials, EnvironmentName, OrganizationId};
use concord_diff::{SizeUnits, SizedMount, ValidationError};
use concord_kinds::{Instance, InstanceDesired};
use concord_mutation::FieldName;
use concord_resource::memory::MemoryBackend;
use concord_resource::{BackendError, LifecycleStatus};

type Controller = ResourceController<Instance, MemoryBackend<Instance>>;

fn ctx() -> Context {
    Context::new(
        OrganizationId::new("acme"),
        EnvironmentName::new("staging"),
        Credentials::new("token"),
    )
}

fn controller() -> Controller {
    let config = EngineConfig::from_toml_str(
        r#"
        [kinds.instance]
        min_resize_increment = 10
        "#,
    )
    .unwrap();
    ResourceController::from_config(ctx(), MemoryBackend::new(), &config)
}

fn desired(data_size: u64) -> InstanceDesired {
    InstanceDesired {
        label: "web".into(),
        billing_plan: "hourly".into(),
        flavor: "m.small".into(),
        mounts: vec![
            SizedMount {
                path: "/".into(),
                size: SizeUnits(20),
                filesystem: "ext4".into(),
            },
            SizedMount {
                path: "/data".into(),
                size: SizeUnits(data_size),
                filesystem: "xfs".into(),
            },
        ],
        version: "1.0".into(),
        deletion_protection: false,
    }
}

async fn mutated(controller: &Controller) -> Vec<String> {
    controller
        .backend()
        .mutate_calls()
        .await
        .iter()
        .map(FieldName::to_string)
        .collect()
}

#[tokio::test]
async fn converging_to_the_materialized_state_changes_nothing() {
    let controller = controller();
    let handle = controller.materialize(&desired(80)).await.unwrap();

    for _ in 0..2 {
        let ConvergeOutcome::Converged(report) =
            controller.converge(&handle, &desired(80)).await.unwrap()
        else {
            panic!("expected converged");
        };
        assert!(report.fields.is_empty());
    }
    assert!(mutated(&controller).await.is_empty());
}

#[tokio::test]
async fn mount_grows_by_one_resize() {
    let controller = controller();
    let handle = controller.materialize(&desired(80)).await.unwrap();

    controller.converge(&handle, &desired(100)).await.unwrap();

    assert_eq!(mutated(&controller).await, vec!["mount[/data]"]);
    let observed = controller.backend().observed(&handle).await.unwrap();
    assert_eq!(observed.mounts[1].size, SizeUnits(100));
}

#[tokio::test]
async fn resize_below_minimum_increment_is_rejected() {
    let controller = controller();
    let handle = controller.materialize(&desired(80)).await.unwrap();

    let err = controller.converge(&handle, &desired(85)).await.unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(
        err,
        ControllerError::Validation {
            source: ValidationError::BelowMinimumIncrement {
                delta: 5,
                min_increment: 10,
                ..
            },
            ..
        }
    ));
    assert!(mutated(&controller).await.is_empty());
}

#[tokio::test]
async fn shrinking_and_filesystem_changes_are_rejected() {
    let controller = controller();
    let handle = controller.materialize(&desired(80)).await.unwrap();

    let err = controller.converge(&handle, &desired(60)).await.unwrap_err();
    assert!(matches!(
        err,
        ControllerError::Validation {
            source: ValidationError::Shrink { .. },
            ..
        }
    ));

    let mut reformat = desired(80);
    reformat.mounts[1].filesystem = "ext4".into();
    let err = controller.converge(&handle, &reformat).await.unwrap_err();
    assert!(matches!(
        err,
        ControllerError::Validation {
            source: ValidationError::FilesystemChanged { .. },
            ..
        }
    ));
    assert!(mutated(&controller).await.is_empty());
}

#[tokio::test]
async fn fields_apply_in_priority_order_and_failures_do_not_stop_the_run() {
    let controller = controller();
    let handle = controller.materialize(&desired(80)).await.unwrap();
    controller
        .backend()
        .fail_field(
            "billing_plan",
            BackendError::Rejected {
                message: "plan not offered".into(),
            },
        )
        .await;

    let mut want = desired(100);
    want.version = "1.1".into();
    want.flavor = "m.large".into();
    want.billing_plan = "monthly".into();
    want.label = "web-1".into();

    let err = controller.converge(&handle, &want).await.unwrap_err();
    assert!(!err.is_fatal());
    assert_eq!(
        mutated(&controller).await,
        vec!["label", "billing_plan", "flavor", "mount[/data]", "version"]
    );
    let ControllerError::Partial { source, .. } = err else {
        panic!("expected partial convergence");
    };
    assert_eq!(source.failures.len(), 1);
    assert_eq!(source.failures[0].field.as_str(), "billing_plan");

    controller.backend().clear_failures().await;
    controller.backend().reset_calls().await;
    controller.converge(&handle, &want).await.unwrap();
    assert_eq!(mutated(&controller).await, vec!["billing_plan"]);
}

#[tokio::test]
async fn deprovisioned_instance_is_recreated_without_mutation() {
    let controller = controller();
    let mut slot = None;
    let ReconcileOutcome::Created(first) =
        controller.reconcile(&mut slot, &desired(80)).await.unwrap()
    else {
        panic!("expected created");
    };
    controller
        .backend()
        .set_status(&first, LifecycleStatus::Deprovisioned)
        .await;

    let ReconcileOutcome::Recreated { stale, handle } =
        controller.reconcile(&mut slot, &desired(100)).await.unwrap()
    else {
        panic!("expected recreated");
    };
    assert_eq!(stale, first);
    assert_ne!(handle, first);
    assert_eq!(slot, Some(handle));
    assert!(mutated(&controller).await.is_empty());
}

#[tokio::test]
async fn protection_must_be_lifted_before_retire() {
    let controller = controller();
    let mut protected = desired(80);
    protected.deletion_protection = true;
    let handle = controller.materialize(&protected).await.unwrap();

    let err = controller.retire(&handle).await.unwrap_err();
    assert!(matches!(err, ControllerError::NonDestroyable { .. }));

    controller.converge(&handle, &desired(80)).await.unwrap();
    assert_eq!(
        controller.retire(&handle).await.unwrap(),
        RetireOutcome::Deleted
    );
    assert_eq!(
        controller.retire(&handle).await.unwrap(),
        RetireOutcome::AlreadyGone
    );
}
