use super::*;
use crate::events::{reasons, RecordingEventPublisher};
use crate::operands::ssp::CommonDicts;
use cluster_store::{MockObjectStore, Verb};
use hco_crds::{KubeVirt, MigController, NetworkAddonsConfig, CDI, SSP};
use kube::api::ApiResource;
use serde_json::json;

const NAMESPACE: &str = "kubevirt-hyperconverged";
const HC_NAME: &str = "kubevirt-hyperconverged";
const COMPONENT_VERSION: &str = "v1.0.0";

struct Fixture {
    mock: MockObjectStore,
    events: Arc<RecordingEventPublisher>,
    reconciler: Reconciler,
}

fn config(operator_version: &str, component_version: &str) -> OperatorConfig {
    let mut cfg = OperatorConfig::for_namespace(NAMESPACE, operator_version);
    cfg.versions.kubevirt = component_version.to_string();
    cfg.versions.cdi = component_version.to_string();
    cfg.versions.network_addons = component_version.to_string();
    cfg.versions.ssp = component_version.to_string();
    cfg.versions.migration = component_version.to_string();
    cfg
}

fn reconciler_for(mock: &MockObjectStore, cfg: OperatorConfig) -> (Arc<RecordingEventPublisher>, Reconciler) {
    let store: Arc<dyn ObjectStore> = Arc::new(mock.clone());
    let cfg = Arc::new(cfg);
    let events = Arc::new(RecordingEventPublisher::new());
    let handler = OperandHandler::with_default_operands(
        Arc::clone(&store),
        Arc::clone(&cfg),
        events.clone(),
        Arc::new(CommonDicts::new()),
    )
    .unwrap();
    (events, Reconciler::new(store, cfg, handler))
}

fn fixture() -> Fixture {
    let mock = MockObjectStore::new();
    let (events, reconciler) = reconciler_for(&mock, config("1.2.3", COMPONENT_VERSION));
    mock.insert(&typed::api_resource::<HyperConverged>(), typed::to_dynamic(&new_hc(NAMESPACE)).unwrap());
    Fixture {
        mock,
        events,
        reconciler,
    }
}

fn new_hc(namespace: &str) -> HyperConverged {
    let mut hc = HyperConverged::new(HC_NAME, Default::default());
    hc.metadata.namespace = Some(namespace.to_string());
    hc
}

async fn stored_hc(mock: &MockObjectStore) -> Option<HyperConverged> {
    typed::get_opt::<HyperConverged>(mock, Some(NAMESPACE), HC_NAME).await.unwrap()
}

fn hc_status(hc: &HyperConverged) -> &hco_crds::HyperConvergedStatus {
    hc.status.as_ref().unwrap()
}

fn condition<'a>(hc: &'a HyperConverged, type_: &str) -> &'a Condition {
    find_status_condition(&hc_status(hc).conditions, type_).unwrap()
}

/// Makes every component report itself ready at `version`.
async fn components_ready(mock: &MockObjectStore, version: &str) {
    let resources: [ApiResource; 5] = [
        typed::api_resource::<KubeVirt>(),
        typed::api_resource::<CDI>(),
        typed::api_resource::<NetworkAddonsConfig>(),
        typed::api_resource::<SSP>(),
        typed::api_resource::<MigController>(),
    ];
    let ok = |type_: &str, status: &str| json!({"type": type_, "status": status, "reason": "AsExpected", "message": ""});
    for resource in &resources {
        for mut obj in mock.list(resource, None, None).await.unwrap() {
            obj.data["status"] = json!({
                "conditions": [
                    ok(AVAILABLE, "True"),
                    ok(PROGRESSING, "False"),
                    ok(DEGRADED, "False"),
                ],
                "observedVersion": version,
                "observedKubeVirtVersion": version,
            });
            mock.update_status(resource, &obj).await.unwrap();
        }
    }
}

async fn reconcile(f: &Fixture) -> Result<Action, ControllerError> {
    f.reconciler.reconcile(&new_hc(NAMESPACE)).await
}

#[tokio::test]
async fn test_first_reconcile() {
    let f = fixture();
    let action = reconcile(&f).await.unwrap();
    assert_eq!(action, Action::requeue(NOT_READY_REQUEUE));

    let hc = stored_hc(&f.mock).await.unwrap();
    assert!(has_finalizer(&hc.metadata));
    assert_eq!(f.events.with_reason(reasons::CREATED).len(), 5);

    let status = hc_status(&hc);
    assert_eq!(status.related_objects.len(), 5);
    assert_eq!(status.observed_generation, hc.metadata.generation);
    // nothing was recorded yet for the brand new components
    assert!(status.version(OPERATOR_VERSION_KEY).is_none());
    assert!(find_status_condition(&status.conditions, TAINTED_CONFIGURATION).is_none());
}

#[tokio::test]
async fn test_first_reconcile_reports_initializing() {
    let f = fixture();
    reconcile(&f).await.unwrap();

    let hc = stored_hc(&f.mock).await.unwrap();
    let expected = [
        (RECONCILE_COMPLETE, ConditionStatus::Unknown),
        (AVAILABLE, ConditionStatus::False),
        (PROGRESSING, ConditionStatus::True),
        (DEGRADED, ConditionStatus::False),
        (UPGRADEABLE, ConditionStatus::Unknown),
    ];
    for (type_, status) in expected {
        let c = condition(&hc, type_);
        assert_eq!(c.status, status, "{type_}");
        assert_eq!(c.reason, RECONCILE_INIT, "{type_}");
        assert_eq!(c.message, "Initializing HyperConverged cluster");
    }
    assert_eq!(hc_status(&hc).system_health_status.as_deref(), Some(SYSTEM_HEALTH_WARNING));

    // the second pass reads the components, which still report nothing
    reconcile(&f).await.unwrap();
    let hc = stored_hc(&f.mock).await.unwrap();
    assert_eq!(condition(&hc, AVAILABLE).status, ConditionStatus::False);
    assert_ne!(condition(&hc, AVAILABLE).reason, RECONCILE_INIT);
    assert_eq!(condition(&hc, RECONCILE_COMPLETE).status, ConditionStatus::True);
    assert_eq!(condition(&hc, RECONCILE_COMPLETE).reason, RECONCILE_COMPLETED);
}

#[tokio::test]
async fn test_components_without_conditions() {
    let f = fixture();
    reconcile(&f).await.unwrap();
    reconcile(&f).await.unwrap();

    let hc = stored_hc(&f.mock).await.unwrap();
    let available = condition(&hc, AVAILABLE);
    assert_eq!(available.status, ConditionStatus::False);
    assert!(available.reason.ends_with("Conditions"));
    assert_eq!(condition(&hc, PROGRESSING).status, ConditionStatus::True);
    assert_eq!(condition(&hc, UPGRADEABLE).status, ConditionStatus::False);
    assert_eq!(hc_status(&hc).system_health_status.as_deref(), Some(SYSTEM_HEALTH_WARNING));
}

#[tokio::test]
async fn test_idempotent_reconcile() {
    let f = fixture();
    reconcile(&f).await.unwrap();
    reconcile(&f).await.unwrap();
    let before = stored_hc(&f.mock).await.unwrap();
    f.events.clear();
    f.mock.clear_calls();

    reconcile(&f).await.unwrap();
    assert!(f.events.events().is_empty());
    assert!(f.mock.calls_of(Verb::Create).is_empty());
    assert!(f.mock.calls_of(Verb::Update).is_empty());
    assert!(f.mock.calls_of(Verb::UpdateStatus).is_empty());

    let after = stored_hc(&f.mock).await.unwrap();
    assert_eq!(hc_status(&before), hc_status(&after));
}

#[tokio::test]
async fn test_install_completes_when_components_are_ready() {
    let f = fixture();
    reconcile(&f).await.unwrap();
    components_ready(&f.mock, COMPONENT_VERSION).await;

    let action = reconcile(&f).await.unwrap();
    let hc = stored_hc(&f.mock).await.unwrap();
    assert_eq!(hc_status(&hc).version(OPERATOR_VERSION_KEY), Some("1.2.3"));
    assert_eq!(condition(&hc, AVAILABLE).status, ConditionStatus::True);
    assert_eq!(condition(&hc, AVAILABLE).reason, RECONCILE_COMPLETED);
    assert_eq!(condition(&hc, DEGRADED).status, ConditionStatus::False);
    assert_eq!(hc_status(&hc).system_health_status.as_deref(), Some(SYSTEM_HEALTH_HEALTHY));
    // the pass that finished the install still ran in upgrade mode
    assert_eq!(action, Action::requeue(NOT_READY_REQUEUE));

    assert_eq!(reconcile(&f).await.unwrap(), Action::requeue(RESYNC_INTERVAL));
}

#[tokio::test]
async fn test_upgrade_waits_for_component_versions() {
    let f = fixture();
    reconcile(&f).await.unwrap();
    components_ready(&f.mock, COMPONENT_VERSION).await;
    reconcile(&f).await.unwrap();

    // a newer operator takes over the same cluster
    let (_, upgraded) = reconciler_for(&f.mock, config("1.3.0", "v1.1.0"));
    upgraded.reconcile(&new_hc(NAMESPACE)).await.unwrap();

    let hc = stored_hc(&f.mock).await.unwrap();
    assert_eq!(hc_status(&hc).version(OPERATOR_VERSION_KEY), Some("1.2.3"));
    let progressing = condition(&hc, PROGRESSING);
    assert_eq!(progressing.status, ConditionStatus::True);
    assert_eq!(progressing.reason, UPGRADING_REASON);
    assert_eq!(progressing.message, "HCO is now upgrading to version 1.3.0");
    assert_eq!(condition(&hc, UPGRADEABLE).status, ConditionStatus::False);

    components_ready(&f.mock, "v1.1.0").await;
    upgraded.reconcile(&new_hc(NAMESPACE)).await.unwrap();
    let hc = stored_hc(&f.mock).await.unwrap();
    assert_eq!(hc_status(&hc).version(OPERATOR_VERSION_KEY), Some("1.3.0"));
    assert_eq!(condition(&hc, PROGRESSING).status, ConditionStatus::False);
}

#[tokio::test]
async fn test_failed_reconcile_is_reported() {
    let f = fixture();
    f.mock.reject(Verb::Create, "SSP", None, 500, "quota exceeded");

    assert!(reconcile(&f).await.is_err());
    let hc = stored_hc(&f.mock).await.unwrap();
    let complete = condition(&hc, RECONCILE_COMPLETE);
    assert_eq!(complete.status, ConditionStatus::False);
    assert_eq!(complete.reason, crate::operand_handler::RECONCILE_FAILED);
    assert!(complete.message.contains("quota exceeded"));
    // the finalizer is written even though the pass failed
    assert!(has_finalizer(&hc.metadata));
    assert_eq!(condition(&hc, AVAILABLE).reason, RECONCILE_INIT);
    assert!(hc_status(&hc).observed_generation.is_none());
}

#[tokio::test]
async fn test_retry_after_failure_is_not_drift() {
    let f = fixture();
    reconcile(&f).await.unwrap();
    reconcile(&f).await.unwrap();

    let mut hc = stored_hc(&f.mock).await.unwrap();
    hc.spec.scratch_space_storage_class = Some("scratch".to_string());
    typed::update(&f.mock, &hc, false).await.unwrap();
    f.mock.reject(Verb::Update, "CDI", None, 500, "conflict storm");
    assert!(reconcile(&f).await.is_err());

    let failed = stored_hc(&f.mock).await.unwrap();
    assert_ne!(hc_status(&failed).observed_generation, failed.metadata.generation);

    f.mock.clear_rejections();
    f.events.clear();
    reconcile(&f).await.unwrap();
    assert!(f.events.with_reason(reasons::OVERWRITTEN).is_empty());
    assert_eq!(f.events.with_reason(reasons::UPDATED).len(), 1);
    let hc = stored_hc(&f.mock).await.unwrap();
    assert_eq!(hc_status(&hc).observed_generation, hc.metadata.generation);
}

#[tokio::test]
async fn test_tainted_configuration() {
    let f = fixture();
    let mut hc = stored_hc(&f.mock).await.unwrap();
    hc.annotations_mut().insert(
        JSON_PATCH_KUBEVIRT_ANNOTATION.to_string(),
        r#"[{"op":"add","path":"/spec/configuration/developerConfiguration/featureGates/-","value":"fg1"}]"#.to_string(),
    );
    typed::update(&f.mock, &hc, false).await.unwrap();

    reconcile(&f).await.unwrap();
    let hc = stored_hc(&f.mock).await.unwrap();
    let tainted = condition(&hc, TAINTED_CONFIGURATION);
    assert_eq!(tainted.status, ConditionStatus::True);
    assert_eq!(tainted.reason, TAINTED_REASON);

    let mut hc = hc;
    hc.annotations_mut().remove(JSON_PATCH_KUBEVIRT_ANNOTATION);
    typed::update(&f.mock, &hc, false).await.unwrap();
    reconcile(&f).await.unwrap();
    let hc = stored_hc(&f.mock).await.unwrap();
    assert!(find_status_condition(&hc_status(&hc).conditions, TAINTED_CONFIGURATION).is_none());
}

#[tokio::test]
async fn test_foreign_namespace_is_ignored() {
    let f = fixture();
    f.mock
        .insert(&typed::api_resource::<HyperConverged>(), typed::to_dynamic(&new_hc("elsewhere")).unwrap());

    let action = f.reconciler.reconcile(&new_hc("elsewhere")).await.unwrap();
    assert_eq!(action, Action::await_change());
    assert!(f.mock.calls_of(Verb::Create).is_empty());
}

#[tokio::test]
async fn test_missing_hc() {
    let mock = MockObjectStore::new();
    let (_, reconciler) = reconciler_for(&mock, config("1.2.3", COMPONENT_VERSION));
    let action = reconciler.reconcile(&new_hc(NAMESPACE)).await.unwrap();
    assert_eq!(action, Action::await_change());
}

#[tokio::test]
async fn test_deletion_flow() {
    let f = fixture();
    reconcile(&f).await.unwrap();
    let resource = typed::api_resource::<HyperConverged>();
    assert!(f.mock.delete(&resource, Some(NAMESPACE), HC_NAME, false).await.unwrap());
    f.events.clear();

    // the template cleanup switches the boot image import off first
    let action = reconcile(&f).await.unwrap();
    assert_eq!(action, Action::requeue(DELETION_REQUEUE));
    let hc = stored_hc(&f.mock).await.unwrap();
    assert_eq!(hc.spec.enable_common_boot_image_import, Some(false));
    assert!(hc.metadata.deletion_timestamp.is_some());

    let action = reconcile(&f).await.unwrap();
    assert_eq!(action, Action::await_change());
    assert_eq!(f.events.with_reason(reasons::KILLING).len(), 5);
    assert!(stored_hc(&f.mock).await.is_none());
    assert_eq!(f.mock.count(&typed::api_resource::<KubeVirt>()), 0);
    assert_eq!(f.mock.count(&typed::api_resource::<CDI>()), 0);
}

#[tokio::test]
async fn test_failed_teardown_keeps_finalizer() {
    let f = fixture();
    let mut hc = stored_hc(&f.mock).await.unwrap();
    hc.spec.enable_common_boot_image_import = Some(false);
    typed::update(&f.mock, &hc, false).await.unwrap();
    reconcile(&f).await.unwrap();

    let resource = typed::api_resource::<HyperConverged>();
    f.mock.delete(&resource, Some(NAMESPACE), HC_NAME, false).await.unwrap();
    f.mock.reject(Verb::Delete, "CDI", None, 500, "cdi is stuck");

    assert!(reconcile(&f).await.is_err());
    let hc = stored_hc(&f.mock).await.unwrap();
    assert!(has_finalizer(&hc.metadata));
    assert_eq!(f.events.with_reason(reasons::ERR_CDI_UNINSTALL).len(), 1);

    f.mock.clear_rejections();
    assert_eq!(reconcile(&f).await.unwrap(), Action::await_change());
    assert!(stored_hc(&f.mock).await.is_none());
}

#[test]
fn test_system_health() {
    let c = |type_: &str, status| Condition::new(type_, status, "r", "m");
    assert_eq!(system_health(&[]), SYSTEM_HEALTH_HEALTHY);
    assert_eq!(
        system_health(&[c(AVAILABLE, ConditionStatus::True), c(PROGRESSING, ConditionStatus::False)]),
        SYSTEM_HEALTH_HEALTHY
    );
    assert_eq!(system_health(&[c(PROGRESSING, ConditionStatus::True)]), SYSTEM_HEALTH_WARNING);
    assert_eq!(system_health(&[c(AVAILABLE, ConditionStatus::False)]), SYSTEM_HEALTH_WARNING);
    assert_eq!(
        system_health(&[c(AVAILABLE, ConditionStatus::False), c(DEGRADED, ConditionStatus::True)]),
        SYSTEM_HEALTH_ERROR
    );
}

#[test]
fn test_finalizer_helpers() {
    let mut meta = ObjectMeta::default();
    assert!(add_finalizer(&mut meta));
    assert!(!add_finalizer(&mut meta));
    assert!(has_finalizer(&meta));
    remove_finalizer(&mut meta);
    assert!(!has_finalizer(&meta));
}

#[test]
fn test_defaults_keep_component_contributions() {
    let mut set = ConditionSet::new();
    set.set_status_condition(Condition::new(
        AVAILABLE,
        ConditionStatus::False,
        "KubeVirtNotAvailable",
        "KubeVirt is not available: Bar",
    ));
    let set = with_defaults(set, Some(3));
    assert_eq!(set.get(AVAILABLE).unwrap().reason, "KubeVirtNotAvailable");
    assert_eq!(set.get(PROGRESSING).unwrap().status, ConditionStatus::False);
    assert_eq!(set.get(UPGRADEABLE).unwrap().status, ConditionStatus::True);
    let complete = set.get(RECONCILE_COMPLETE).unwrap();
    assert_eq!(complete.status, ConditionStatus::True);
    assert_eq!(complete.observed_generation, Some(3));
}
