//! Operator configuration.
//!
//! Everything the operator learns from its environment is read once at
//! start-up into [`OperatorConfig`]; nothing below this module touches the
//! process environment.

use crate::error::ControllerError;
use std::path::PathBuf;

/// Default SELinux type for virt-launcher pods.
pub const DEFAULT_SELINUX_LAUNCHER_TYPE: &str = "virt_launcher.process";
/// Default location of the shipped golden-image templates.
pub const DEFAULT_DATA_IMPORT_CRON_TEMPLATES_LOCATION: &str = "./dataImportCronTemplates";
/// Default webhook certificate directory.
pub const DEFAULT_WEBHOOK_CERT_DIR: &str = "/apiserver.local.config/certificates";
/// Default webhook port.
pub const DEFAULT_WEBHOOK_PORT: u16 = 4343;

/// Expected `observedVersion` of every component.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentVersions {
    pub kubevirt: String,
    pub cdi: String,
    pub network_addons: String,
    pub ssp: String,
    pub migration: String,
}

/// Platform defaults for the KubeVirt CR.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformDefaults {
    /// Raw SMBIOS document (YAML or JSON)
    pub smbios: Option<String>,
    pub machine_type: Option<String>,
    pub amd64_machine_type: Option<String>,
    pub arm64_machine_type: Option<String>,
    pub s390x_machine_type: Option<String>,
    pub kvm_emulation: bool,
    pub selinux_launcher_type: String,
}

/// Asset directories feeding the dynamic handlers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetLocations {
    pub dashboards: Option<PathBuf>,
    pub quick_starts: Option<PathBuf>,
    pub image_streams: Option<PathBuf>,
    pub data_import_cron_templates: PathBuf,
}

/// Complete operator configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Namespace the operator (and the HyperConverged resource) lives in
    pub namespace: String,
    /// Operator version, `HCO_KV_IO_VERSION`
    pub operator_version: String,
    pub versions: ComponentVersions,
    pub platform: PlatformDefaults,
    pub assets: AssetLocations,
    pub virtiowin_image: Option<String>,
    pub console_plugin_image: Option<String>,
    pub console_proxy_image: Option<String>,
    pub infrastructure_highly_available: bool,
    pub deploy_network_policies: bool,
    pub webhook_cert_dir: PathBuf,
    pub webhook_port: u16,
}

impl OperatorConfig {
    /// Name under which the operator reports itself (managed-by label, event reporter).
    pub const OPERATOR_NAME: &'static str = "hyperconverged-cluster-operator";

    /// Loads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads the configuration through `lookup`; used directly by tests.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let flag = |key: &str| -> Result<bool, ControllerError> {
            match get(key) {
                None => Ok(false),
                Some(v) => v.to_lowercase().parse::<bool>().map_err(|_| {
                    ControllerError::InvalidConfig(format!("{key} must be \"true\" or \"false\", got {v:?}"))
                }),
            }
        };

        let namespace = get("OPERATOR_NAMESPACE").ok_or_else(|| {
            ControllerError::InvalidConfig("OPERATOR_NAMESPACE environment variable is required".to_string())
        })?;
        let operator_version = get("HCO_KV_IO_VERSION").ok_or_else(|| {
            ControllerError::InvalidConfig("HCO_KV_IO_VERSION environment variable is required".to_string())
        })?;

        let webhook_port = match get("WEBHOOK_PORT") {
            None => DEFAULT_WEBHOOK_PORT,
            Some(v) => v
                .parse()
                .map_err(|_| ControllerError::InvalidConfig(format!("WEBHOOK_PORT is not a valid port: {v:?}")))?,
        };

        // KVM_EMULATION is lenient: anything but "true" means hardware virtualization
        let kvm_emulation = get("KVM_EMULATION").is_some_and(|v| v.eq_ignore_ascii_case("true"));

        Ok(Self {
            namespace,
            operator_version,
            versions: ComponentVersions {
                kubevirt: get("KUBEVIRT_VERSION").unwrap_or_default(),
                cdi: get("CDI_VERSION").unwrap_or_default(),
                network_addons: get("NETWORK_ADDONS_VERSION").unwrap_or_default(),
                ssp: get("SSP_VERSION").unwrap_or_default(),
                migration: get("MIGRATION_OPERATOR_VERSION").unwrap_or_default(),
            },
            platform: PlatformDefaults {
                smbios: get("SMBIOS"),
                machine_type: get("MACHINETYPE"),
                amd64_machine_type: get("AMD64_MACHINETYPE"),
                arm64_machine_type: get("ARM64_MACHINETYPE"),
                s390x_machine_type: get("S390X_MACHINETYPE"),
                kvm_emulation,
                selinux_launcher_type: get("SELINUX_LAUNCHER_TYPE")
                    .unwrap_or_else(|| DEFAULT_SELINUX_LAUNCHER_TYPE.to_string()),
            },
            assets: AssetLocations {
                dashboards: get("DASHBOARD_FILES_LOCATION").map(PathBuf::from),
                quick_starts: get("QUICK_START_FILES_LOCATION").map(PathBuf::from),
                image_streams: get("IMAGE_STREAM_FILES_LOCATION").map(PathBuf::from),
                data_import_cron_templates: get("DATA_IMPORT_CRON_TEMPLATES_FILES_LOCATION")
                    .map_or_else(|| PathBuf::from(DEFAULT_DATA_IMPORT_CRON_TEMPLATES_LOCATION), PathBuf::from),
            },
            virtiowin_image: get("VIRTIOWIN_CONTAINER"),
            console_plugin_image: get("KV_CONSOLE_PLUGIN_IMAGE"),
            console_proxy_image: get("KV_CONSOLE_PROXY_IMAGE"),
            infrastructure_highly_available: flag("INFRASTRUCTURE_HIGHLY_AVAILABLE")?,
            deploy_network_policies: flag("DEPLOY_NETWORK_POLICIES")?,
            webhook_cert_dir: get("WEBHOOK_CERT_DIR")
                .map_or_else(|| PathBuf::from(DEFAULT_WEBHOOK_CERT_DIR), PathBuf::from),
            webhook_port,
        })
    }

    /// A configuration with every optional value unset, for tests.
    pub fn for_namespace(namespace: &str, operator_version: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            operator_version: operator_version.to_string(),
            versions: ComponentVersions::default(),
            platform: PlatformDefaults {
                selinux_launcher_type: DEFAULT_SELINUX_LAUNCHER_TYPE.to_string(),
                ..PlatformDefaults::default()
            },
            assets: AssetLocations {
                data_import_cron_templates: PathBuf::from(DEFAULT_DATA_IMPORT_CRON_TEMPLATES_LOCATION),
                ..AssetLocations::default()
            },
            virtiowin_image: None,
            console_plugin_image: None,
            console_proxy_image: None,
            infrastructure_highly_available: false,
            deploy_network_policies: false,
            webhook_cert_dir: PathBuf::from(DEFAULT_WEBHOOK_CERT_DIR),
            webhook_port: DEFAULT_WEBHOOK_PORT,
        }
    }

    /// True when both UI images are configured.
    pub fn console_plugin_enabled(&self) -> bool {
        self.console_plugin_image.is_some() && self.console_proxy_image.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_required_variables() {
        let err = OperatorConfig::from_lookup(lookup(&[("HCO_KV_IO_VERSION", "1.0.0")])).unwrap_err();
        assert!(err.to_string().contains("OPERATOR_NAMESPACE"));

        let err = OperatorConfig::from_lookup(lookup(&[("OPERATOR_NAMESPACE", "kubevirt-hyperconverged")])).unwrap_err();
        assert!(err.to_string().contains("HCO_KV_IO_VERSION"));
    }

    #[test]
    fn test_defaults() {
        let cfg = OperatorConfig::from_lookup(lookup(&[
            ("OPERATOR_NAMESPACE", "kubevirt-hyperconverged"),
            ("HCO_KV_IO_VERSION", "1.0.0"),
        ]))
        .unwrap();

        assert_eq!(cfg.platform.selinux_launcher_type, DEFAULT_SELINUX_LAUNCHER_TYPE);
        assert_eq!(cfg.webhook_port, 4343);
        assert_eq!(cfg.webhook_cert_dir, PathBuf::from(DEFAULT_WEBHOOK_CERT_DIR));
        assert!(!cfg.infrastructure_highly_available);
        assert!(!cfg.console_plugin_enabled());
        assert!(cfg.assets.dashboards.is_none());
    }

    #[test]
    fn test_overrides() {
        let cfg = OperatorConfig::from_lookup(lookup(&[
            ("OPERATOR_NAMESPACE", "ns"),
            ("HCO_KV_IO_VERSION", "1.2.3"),
            ("KVM_EMULATION", "TRUE"),
            ("MACHINETYPE", " q35 "),
            ("INFRASTRUCTURE_HIGHLY_AVAILABLE", "true"),
            ("KV_CONSOLE_PLUGIN_IMAGE", "plugin:1"),
            ("KV_CONSOLE_PROXY_IMAGE", "proxy:1"),
            ("WEBHOOK_PORT", "9443"),
        ]))
        .unwrap();

        assert!(cfg.platform.kvm_emulation);
        assert_eq!(cfg.platform.machine_type.as_deref(), Some("q35"));
        assert!(cfg.infrastructure_highly_available);
        assert!(cfg.console_plugin_enabled());
        assert_eq!(cfg.webhook_port, 9443);
    }

    #[test]
    fn test_invalid_flag_is_rejected() {
        let err = OperatorConfig::from_lookup(lookup(&[
            ("OPERATOR_NAMESPACE", "ns"),
            ("HCO_KV_IO_VERSION", "1"),
            ("DEPLOY_NETWORK_POLICIES", "maybe"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ControllerError::InvalidConfig(_)));
    }
}
