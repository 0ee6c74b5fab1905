//! OpenShift console kinds: the dynamic plugin, quick starts and the
//! console operator configuration the plugin is registered with.

use kube::CustomResource;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The console operator only reads the configuration with this name.
pub const CONSOLE_CONFIG_NAME: &str = "cluster";

#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[kube(
    group = "console.openshift.io",
    version = "v1",
    kind = "ConsolePlugin",
    schema = "disabled",
    derive = "PartialEq",
    derive = "Default"
)]
#[serde(rename_all = "camelCase")]
pub struct ConsolePluginSpec {
    pub display_name: String,

    pub backend: ConsolePluginBackend,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub proxy: Vec<ConsolePluginProxy>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolePluginBackend {
    #[serde(rename = "type")]
    pub type_: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ConsolePluginService>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolePluginService {
    pub name: String,
    pub namespace: String,
    pub port: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolePluginProxy {
    pub alias: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization: Option<String>,

    pub endpoint: ConsolePluginBackend,
}

#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[kube(
    group = "console.openshift.io",
    version = "v1",
    kind = "ConsoleQuickStart",
    schema = "disabled",
    derive = "PartialEq",
    derive = "Default"
)]
pub struct ConsoleQuickStartSpec {
    /// Opaque quick-start content
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[kube(
    group = "operator.openshift.io",
    version = "v1",
    kind = "Console",
    schema = "disabled",
    derive = "PartialEq",
    derive = "Default"
)]
pub struct ConsoleSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<String>,

    /// Everything the operator does not manage
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
