//! KubeVirt console plugin.
//!
//! The UI consists of two deployments: the plugin itself (static assets
//! served by nginx) and a proxy to the KubeVirt API server. Around them the
//! operator renders service accounts, serving-cert services, an nginx config,
//! the UI configuration maps with their reader RBAC and the cluster scoped
//! `ConsolePlugin`. Finally the plugin is enabled in the console operator
//! configuration.

use super::rbac::RBAC_API_GROUP;
use super::{aux_operand, hc_namespace, AuxObject, EnsureResult, ObjectIdentity, Operand};
use crate::config::OperatorConfig;
use crate::error::ControllerError;
use crate::labels::{managed_labels, merge_managed_labels, AppComponent, APP_LABEL, APP_LABEL_COMPONENT};
use crate::request::HcoRequest;
use crate::tls;
use async_trait::async_trait;
use cluster_store::{typed, ObjectStore};
use hco_crds::{
    Console, ConsolePlugin, ConsolePluginBackend, ConsolePluginProxy, ConsolePluginService, ConsolePluginSpec,
    HyperConverged, CONSOLE_CONFIG_NAME,
};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, DeploymentStrategy};
use k8s_openapi::api::core::v1::{
    Affinity, Capabilities, ConfigMap, ConfigMapVolumeSource, Container, ContainerPort, PodAffinityTerm,
    PodAntiAffinity, PodSecurityContext, PodSpec, PodTemplateSpec, ResourceRequirements, SeccompProfile,
    SecretVolumeSource, SecurityContext, Service, ServiceAccount, ServicePort, ServiceSpec, Volume, VolumeMount,
    WeightedPodAffinityTerm,
};
use k8s_openapi::api::networking::v1::{NetworkPolicy, NetworkPolicySpec};
use k8s_openapi::api::rbac::v1::{PolicyRule, Role, RoleBinding, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::ObjectMeta;
use kube::ResourceExt;
use minijinja::{context, Environment};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};

pub const PLUGIN_NAME: &str = "kubevirt-plugin";
pub const PLUGIN_SERVER_PORT: i32 = 9443;
pub const PROXY_SERVER_PORT: i32 = 8080;
pub const PLUGIN_SERVING_CERT_NAME: &str = "plugin-serving-cert";
pub const PROXY_SERVING_CERT_NAME: &str = "console-proxy-serving-cert";
const PLUGIN_SERVING_CERT_PATH: &str = "/var/serving-cert";
const PROXY_SERVING_CERT_PATH: &str = "/app/cert";
pub const NGINX_CONFIG_MAP_NAME: &str = "nginx-conf";
pub const USER_SETTINGS_CONFIG_MAP_NAME: &str = "kubevirt-user-settings";
pub const FEATURES_CONFIG_MAP_NAME: &str = "kubevirt-ui-features";
pub const CONFIG_READER_ROLE_NAME: &str = "kubevirt-ui-config-reader";
pub const CONFIG_READER_ROLE_BINDING_NAME: &str = "kubevirt-ui-config-reader-rolebinding";
pub const PLUGIN_NETWORK_POLICY_NAME: &str = "kubevirt-console-plugin-np";
pub const PROXY_NETWORK_POLICY_NAME: &str = "kubevirt-apiserver-proxy-np";

const SERVING_CERT_ANNOTATION: &str = "service.beta.openshift.io/serving-cert-secret-name";
const REQUIRED_SCC_ANNOTATION: &str = "openshift.io/required-scc";
const PRIORITY_CLASS: &str = "kubevirt-cluster-critical";
const NAMESPACE_NAME_LABEL: &str = "kubernetes.io/metadata.name";
const CONSOLE_NAMESPACE: &str = "openshift-console";
const DNS_NAMESPACE: &str = "openshift-dns";
const DNS_POD_LABEL: &str = "dns.operator.openshift.io/daemonset-dns";
const DNS_PORT: i32 = 5353;
const API_SERVER_PORT: i32 = 6443;

/// Default contents of the UI feature flags map.
pub const UI_FEATURES: [(&str, &str); 7] = [
    ("automaticSubscriptionActivationKey", ""),
    ("automaticSubscriptionOrganizationId", ""),
    ("disabledGuestSystemLogsAccess", "false"),
    ("kubevirtApiserverProxy", "true"),
    ("loadBalancerEnabled", "true"),
    ("nodePortAddress", ""),
    ("nodePortEnabled", "false"),
];

fn plugin_deployment_name() -> &'static str {
    AppComponent::UiPlugin.as_str()
}

fn proxy_deployment_name() -> &'static str {
    AppComponent::UiProxy.as_str()
}

fn plugin_service_name() -> String {
    format!("{}-service", plugin_deployment_name())
}

fn proxy_service_name() -> String {
    format!("{}-service", proxy_deployment_name())
}

fn labels(hc: &HyperConverged, cfg: &OperatorConfig, component: AppComponent) -> BTreeMap<String, String> {
    managed_labels(&hc.name_any(), &cfg.operator_version, component)
}

fn meta(hc: &HyperConverged, cfg: &OperatorConfig, name: &str, component: AppComponent) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(hc_namespace(hc, cfg).to_string()),
        labels: Some(labels(hc, cfg, component)),
        ..Default::default()
    }
}

/// Spreads replicas over nodes when the infrastructure is highly available.
fn pod_anti_affinity(component: &str, highly_available: bool) -> Option<Affinity> {
    highly_available.then(|| Affinity {
        pod_anti_affinity: Some(PodAntiAffinity {
            preferred_during_scheduling_ignored_during_execution: Some(vec![WeightedPodAffinityTerm {
                weight: 90,
                pod_affinity_term: PodAffinityTerm {
                    label_selector: Some(LabelSelector {
                        match_expressions: Some(vec![LabelSelectorRequirement {
                            key: APP_LABEL_COMPONENT.to_string(),
                            operator: "In".to_string(),
                            values: Some(vec![component.to_string()]),
                        }]),
                        ..Default::default()
                    }),
                    topology_key: "kubernetes.io/hostname".to_string(),
                    ..Default::default()
                },
            }]),
            ..Default::default()
        }),
        ..Default::default()
    })
}

fn ui_deployment(
    hc: &HyperConverged,
    cfg: &OperatorConfig,
    component: AppComponent,
    image: &str,
    serving_cert: (&str, &str),
    port: i32,
) -> Deployment {
    let name = component.as_str();
    let labels = labels(hc, cfg, component);
    let ha = cfg.infrastructure_highly_available;
    let anti_affinity = pod_anti_affinity(name, ha);
    let (cert_name, cert_path) = serving_cert;

    let mut pod = PodSpec {
        service_account_name: Some(name.to_string()),
        security_context: Some(PodSecurityContext {
            run_as_non_root: Some(true),
            seccomp_profile: Some(SeccompProfile {
                type_: "RuntimeDefault".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        containers: vec![Container {
            name: name.to_string(),
            image: Some(image.to_string()),
            image_pull_policy: Some("IfNotPresent".to_string()),
            resources: Some(ResourceRequirements {
                requests: Some(BTreeMap::from([
                    ("cpu".to_string(), Quantity("10m".to_string())),
                    ("memory".to_string(), Quantity("100Mi".to_string())),
                ])),
                ..Default::default()
            }),
            ports: Some(vec![ContainerPort {
                container_port: port,
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            security_context: Some(SecurityContext {
                allow_privilege_escalation: Some(false),
                capabilities: Some(Capabilities {
                    drop: Some(vec!["ALL".to_string()]),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            termination_message_path: Some("/dev/termination-log".to_string()),
            termination_message_policy: Some("FallbackToLogsOnError".to_string()),
            volume_mounts: Some(vec![VolumeMount {
                name: cert_name.to_string(),
                mount_path: cert_path.to_string(),
                read_only: Some(true),
                ..Default::default()
            }]),
            ..Default::default()
        }],
        priority_class_name: Some(PRIORITY_CLASS.to_string()),
        volumes: Some(vec![Volume {
            name: cert_name.to_string(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(cert_name.to_string()),
                default_mode: Some(0o644),
                ..Default::default()
            }),
            ..Default::default()
        }]),
        affinity: anti_affinity.clone(),
        ..Default::default()
    };

    // a user placement replaces the node selector and tolerations; the
    // anti-affinity stays unless the user set an affinity of their own
    if let Some(placement) = hc.spec.infra.node_placement.as_ref() {
        pod.node_selector.clone_from(&placement.node_selector);
        pod.affinity = placement.affinity.clone().or(anti_affinity);
        pod.tolerations = (!placement.tolerations.is_empty()).then(|| placement.tolerations.clone());
    }

    Deployment {
        metadata: meta(hc, cfg, name, component),
        spec: Some(DeploymentSpec {
            replicas: Some(if ha { 2 } else { 1 }),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            strategy: Some(DeploymentStrategy {
                type_: Some("RollingUpdate".to_string()),
                ..Default::default()
            }),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    annotations: Some(BTreeMap::from([(
                        REQUIRED_SCC_ANNOTATION.to_string(),
                        "restricted-v2".to_string(),
                    )])),
                    ..Default::default()
                }),
                spec: Some(pod),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn new_plugin_deployment(hc: &HyperConverged, cfg: &OperatorConfig) -> Deployment {
    let image = cfg.console_plugin_image.as_deref().unwrap_or_default();
    let mut deployment = ui_deployment(
        hc,
        cfg,
        AppComponent::UiPlugin,
        image,
        (PLUGIN_SERVING_CERT_NAME, PLUGIN_SERVING_CERT_PATH),
        PLUGIN_SERVER_PORT,
    );

    if let Some(pod) = deployment.spec.as_mut().and_then(|s| s.template.spec.as_mut()) {
        if let Some(container) = pod.containers.first_mut() {
            container.volume_mounts.get_or_insert_with(Vec::new).push(VolumeMount {
                name: NGINX_CONFIG_MAP_NAME.to_string(),
                mount_path: "/etc/nginx/nginx.conf".to_string(),
                sub_path: Some("nginx.conf".to_string()),
                read_only: Some(true),
                ..Default::default()
            });
        }
        pod.volumes.get_or_insert_with(Vec::new).push(Volume {
            name: NGINX_CONFIG_MAP_NAME.to_string(),
            config_map: Some(ConfigMapVolumeSource {
                name: NGINX_CONFIG_MAP_NAME.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        });
    }
    deployment
}

/// Command line TLS flags of the API server proxy.
pub fn proxy_tls_args(hc: &HyperConverged) -> Vec<String> {
    let profile = tls::effective_profile(hc);
    let min = tls::min_version(&profile);
    let suites = tls::cipher_suite_ids(&tls::ciphers(&profile));

    let mut args = Vec::new();
    if !suites.is_empty() {
        let suites: Vec<String> = suites.iter().map(u16::to_string).collect();
        args.push(format!("--tls-cipher-suites={}", suites.join(",")));
    }
    args.push(format!("--tls-min-version={}", tls::version_ordinal(min)));
    args
}

pub fn new_proxy_deployment(hc: &HyperConverged, cfg: &OperatorConfig) -> Deployment {
    let image = cfg.console_proxy_image.as_deref().unwrap_or_default();
    let mut deployment = ui_deployment(
        hc,
        cfg,
        AppComponent::UiProxy,
        image,
        (PROXY_SERVING_CERT_NAME, PROXY_SERVING_CERT_PATH),
        PROXY_SERVER_PORT,
    );
    if let Some(container) = deployment
        .spec
        .as_mut()
        .and_then(|s| s.template.spec.as_mut())
        .and_then(|p| p.containers.first_mut())
    {
        container.args.get_or_insert_with(Vec::new).extend(proxy_tls_args(hc));
    }
    deployment
}

fn ui_service(
    hc: &HyperConverged,
    cfg: &OperatorConfig,
    name: &str,
    component: AppComponent,
    port: i32,
    serving_cert: &str,
) -> Service {
    let mut metadata = meta(hc, cfg, name, component);
    metadata.annotations = Some(BTreeMap::from([(
        SERVING_CERT_ANNOTATION.to_string(),
        serving_cert.to_string(),
    )]));
    Service {
        metadata,
        spec: Some(ServiceSpec {
            ports: Some(vec![ServicePort {
                name: Some(format!("{}-port", component.as_str())),
                port,
                protocol: Some("TCP".to_string()),
                target_port: Some(IntOrString::Int(port)),
                ..Default::default()
            }]),
            selector: Some(BTreeMap::from([(
                APP_LABEL_COMPONENT.to_string(),
                component.as_str().to_string(),
            )])),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn new_plugin_service(hc: &HyperConverged, cfg: &OperatorConfig) -> Service {
    ui_service(
        hc,
        cfg,
        &plugin_service_name(),
        AppComponent::UiPlugin,
        PLUGIN_SERVER_PORT,
        PLUGIN_SERVING_CERT_NAME,
    )
}

pub fn new_proxy_service(hc: &HyperConverged, cfg: &OperatorConfig) -> Service {
    ui_service(
        hc,
        cfg,
        &proxy_service_name(),
        AppComponent::UiProxy,
        PROXY_SERVER_PORT,
        PROXY_SERVING_CERT_NAME,
    )
}

pub fn new_plugin_service_account(hc: &HyperConverged, cfg: &OperatorConfig) -> ServiceAccount {
    ServiceAccount {
        metadata: meta(hc, cfg, plugin_deployment_name(), AppComponent::UiPlugin),
        ..Default::default()
    }
}

pub fn new_proxy_service_account(hc: &HyperConverged, cfg: &OperatorConfig) -> ServiceAccount {
    ServiceAccount {
        metadata: meta(hc, cfg, proxy_deployment_name(), AppComponent::UiProxy),
        ..Default::default()
    }
}

const NGINX_CONF_TEMPLATE: &str = include_str!("../../templates/nginx.conf.j2");

/// Renders nginx.conf for the plugin server.
pub fn nginx_config(hc: &HyperConverged) -> Result<String, ControllerError> {
    let profile = tls::effective_profile(hc);

    let mut env = Environment::new();
    env.set_keep_trailing_newline(true);
    env.add_template("nginx.conf", NGINX_CONF_TEMPLATE)?;
    let rendered = env.get_template("nginx.conf")?.render(context! {
        port => PLUGIN_SERVER_PORT,
        cert_path => PLUGIN_SERVING_CERT_PATH,
        ssl_protocols => tls::nginx_ssl_protocols(tls::min_version(&profile)),
        ciphers => tls::ciphers(&profile).join(":"),
    })?;
    Ok(rendered)
}

pub fn new_nginx_config_map(hc: &HyperConverged, cfg: &OperatorConfig) -> Result<ConfigMap, ControllerError> {
    Ok(ConfigMap {
        metadata: meta(hc, cfg, NGINX_CONFIG_MAP_NAME, AppComponent::UiPlugin),
        data: Some(BTreeMap::from([("nginx.conf".to_string(), nginx_config(hc)?)])),
        ..Default::default()
    })
}

/// Per-user settings; created empty, then owned by the UI.
pub fn new_user_settings_config_map(hc: &HyperConverged, cfg: &OperatorConfig) -> ConfigMap {
    ConfigMap {
        metadata: meta(hc, cfg, USER_SETTINGS_CONFIG_MAP_NAME, AppComponent::UiConfig),
        data: Some(BTreeMap::new()),
        ..Default::default()
    }
}

pub fn new_features_config_map(hc: &HyperConverged, cfg: &OperatorConfig) -> ConfigMap {
    ConfigMap {
        metadata: meta(hc, cfg, FEATURES_CONFIG_MAP_NAME, AppComponent::UiConfig),
        data: Some(
            UI_FEATURES
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        ),
        ..Default::default()
    }
}

pub fn new_config_reader_role(hc: &HyperConverged, cfg: &OperatorConfig) -> Role {
    let rule = |name: &str, verbs: &[&str]| PolicyRule {
        api_groups: Some(vec![String::new()]),
        resources: Some(vec!["configmaps".to_string()]),
        resource_names: Some(vec![name.to_string()]),
        verbs: verbs.iter().map(|v| (*v).to_string()).collect(),
        ..Default::default()
    };
    Role {
        metadata: meta(hc, cfg, CONFIG_READER_ROLE_NAME, AppComponent::UiPlugin),
        rules: Some(vec![
            rule(USER_SETTINGS_CONFIG_MAP_NAME, &["get", "update", "patch"]),
            rule(FEATURES_CONFIG_MAP_NAME, &["get"]),
        ]),
    }
}

pub fn new_config_reader_role_binding(hc: &HyperConverged, cfg: &OperatorConfig) -> RoleBinding {
    RoleBinding {
        metadata: meta(hc, cfg, CONFIG_READER_ROLE_BINDING_NAME, AppComponent::UiPlugin),
        role_ref: RoleRef {
            api_group: RBAC_API_GROUP.to_string(),
            kind: "Role".to_string(),
            name: CONFIG_READER_ROLE_NAME.to_string(),
        },
        subjects: Some(vec![Subject {
            api_group: Some(RBAC_API_GROUP.to_string()),
            kind: "Group".to_string(),
            name: super::rbac::AUTHENTICATED_GROUP.to_string(),
            namespace: None,
        }]),
    }
}

/// The cluster scoped plugin registration.
pub fn new_console_plugin(hc: &HyperConverged, cfg: &OperatorConfig) -> ConsolePlugin {
    let namespace = hc_namespace(hc, cfg).to_string();
    let spec = ConsolePluginSpec {
        display_name: "Kubevirt Console Plugin".to_string(),
        backend: ConsolePluginBackend {
            type_: "Service".to_string(),
            service: Some(ConsolePluginService {
                name: plugin_service_name(),
                namespace: namespace.clone(),
                port: PLUGIN_SERVER_PORT,
                base_path: Some("/".to_string()),
            }),
        },
        proxy: vec![ConsolePluginProxy {
            alias: proxy_deployment_name().to_string(),
            authorization: Some("UserToken".to_string()),
            endpoint: ConsolePluginBackend {
                type_: "Service".to_string(),
                service: Some(ConsolePluginService {
                    name: proxy_service_name(),
                    namespace,
                    port: PROXY_SERVER_PORT,
                    base_path: None,
                }),
            },
        }],
    };
    let mut plugin = ConsolePlugin::new(PLUGIN_NAME, spec);
    plugin.metadata.labels = Some(labels(hc, cfg, AppComponent::UiPlugin));
    plugin
}

impl AuxObject for ConsolePlugin {
    fn reconcile_fields(found: &mut Self, required: &Self) -> bool {
        let mut changed = merge_managed_labels(&mut found.metadata, &required.metadata);
        if found.spec != required.spec {
            found.spec = required.spec.clone();
            changed = true;
        }
        changed
    }
}

fn component_pod_selector(hc: &HyperConverged, component: AppComponent) -> Value {
    json!({
        "matchLabels": {
            APP_LABEL: hc.name_any(),
            APP_LABEL_COMPONENT: component.as_str(),
        }
    })
}

fn tcp_port(port: i32) -> Value {
    json!({"port": port, "protocol": "TCP"})
}

/// Lets only the console pods reach the plugin.
pub fn new_plugin_network_policy(hc: &HyperConverged, cfg: &OperatorConfig) -> Result<NetworkPolicy, ControllerError> {
    let spec: NetworkPolicySpec = serde_json::from_value(json!({
        "podSelector": component_pod_selector(hc, AppComponent::UiPlugin),
        "ingress": [{
            "ports": [tcp_port(PLUGIN_SERVER_PORT)],
            "from": [{
                "namespaceSelector": {"matchLabels": {NAMESPACE_NAME_LABEL: CONSOLE_NAMESPACE}},
                "podSelector": {"matchLabels": {"app": "console", "component": "ui"}},
            }],
        }],
        "policyTypes": ["Ingress"],
    }))?;

    Ok(NetworkPolicy {
        metadata: meta(hc, cfg, PLUGIN_NETWORK_POLICY_NAME, AppComponent::UiPlugin),
        spec: Some(spec),
    })
}

/// Lets the proxy reach cluster DNS and the API server, and accept traffic on its port.
pub fn new_proxy_network_policy(hc: &HyperConverged, cfg: &OperatorConfig) -> Result<NetworkPolicy, ControllerError> {
    let spec: NetworkPolicySpec = serde_json::from_value(json!({
        "podSelector": component_pod_selector(hc, AppComponent::UiProxy),
        "ingress": [{"ports": [tcp_port(PROXY_SERVER_PORT)]}],
        "egress": [
            {
                "ports": [tcp_port(DNS_PORT), {"port": DNS_PORT, "protocol": "UDP"}],
                "to": [{
                    "namespaceSelector": {"matchLabels": {NAMESPACE_NAME_LABEL: DNS_NAMESPACE}},
                    "podSelector": {"matchLabels": {DNS_POD_LABEL: "default"}},
                }],
            },
            {"ports": [tcp_port(API_SERVER_PORT)]},
        ],
        "policyTypes": ["Egress", "Ingress"],
    }))?;

    Ok(NetworkPolicy {
        metadata: meta(hc, cfg, PROXY_NETWORK_POLICY_NAME, AppComponent::UiProxy),
        spec: Some(spec),
    })
}

/// Enables the plugin in the console operator configuration.
pub struct ConsoleHandler {
    store: Arc<dyn ObjectStore>,
}

impl ConsoleHandler {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Operand for ConsoleHandler {
    async fn ensure(&self, _req: &mut HcoRequest) -> EnsureResult {
        let store = self.store.as_ref();
        let res = EnsureResult::new("Console").set_name(CONSOLE_CONFIG_NAME);

        let mut console = match typed::get::<Console>(store, None, CONSOLE_CONFIG_NAME).await {
            Ok(console) => console,
            // without a console there is nothing to enable
            Err(e) => {
                error!(error = %e, name = CONSOLE_CONFIG_NAME, "Could not find the Console resource");
                return res;
            }
        };

        if console.spec.plugins.iter().any(|p| p == PLUGIN_NAME) {
            return res.set_upgrade_done(true);
        }

        info!("Enabling kubevirt plugin in Console");
        console.spec.plugins.push(PLUGIN_NAME.to_string());
        match typed::update(store, &console, false).await {
            Ok(_) => res.set_updated().set_upgrade_done(true),
            Err(e) => {
                error!(error = %e, name = CONSOLE_CONFIG_NAME, "Could not update the Console resource");
                res.error(e.into())
            }
        }
    }

    fn objects(&self, _hc: &HyperConverged) -> Vec<ObjectIdentity> {
        Vec::new()
    }
}

/// Every UI operand, in creation order.
pub fn operands(store: &Arc<dyn ObjectStore>, cfg: &Arc<OperatorConfig>) -> Vec<Box<dyn Operand>> {
    macro_rules! build {
        ($owned:expr, $f:expr) => {{
            let cfg = Arc::clone(cfg);
            aux_operand(store, $owned, move |hc| Ok($f(hc, &cfg)))
        }};
    }

    vec![
        build!(false, new_plugin_service_account),
        build!(false, new_proxy_service_account),
        {
            let cfg = Arc::clone(cfg);
            aux_operand(store, false, move |hc| new_nginx_config_map(hc, &cfg))
        },
        build!(false, new_user_settings_config_map),
        build!(false, new_features_config_map),
        build!(true, new_config_reader_role),
        build!(true, new_config_reader_role_binding),
        build!(false, new_plugin_deployment),
        build!(false, new_proxy_deployment),
        build!(false, new_plugin_service),
        build!(false, new_proxy_service),
        build!(false, new_console_plugin),
        Box::new(ConsoleHandler::new(Arc::clone(store))),
    ]
}

/// Network policies of the UI pods.
pub fn network_policy_operands(store: &Arc<dyn ObjectStore>, cfg: &Arc<OperatorConfig>) -> Vec<Box<dyn Operand>> {
    let plugin_cfg = Arc::clone(cfg);
    let proxy_cfg = Arc::clone(cfg);
    vec![
        aux_operand(store, false, move |hc| new_plugin_network_policy(hc, &plugin_cfg)),
        aux_operand(store, false, move |hc| new_proxy_network_policy(hc, &proxy_cfg)),
    ]
}
