//! SSP CR (ssp.kubevirt.io/v1beta3)
//!
//! Scheduling, scale and performance operator: common templates, the
//! template validator and golden-image import schedules.

use crate::common::{NodePlacement, TlsSecurityProfile};
use crate::conditions::Condition;
use crate::hyperconverged::DataImportCronTemplate;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[kube(
    group = "ssp.kubevirt.io",
    version = "v1beta3",
    kind = "SSP",
    plural = "ssps",
    namespaced,
    status = "SspStatus",
    schema = "disabled",
    derive = "PartialEq",
    derive = "Default"
)]
#[serde(rename_all = "camelCase")]
pub struct SspSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_validator: Option<TemplateValidator>,

    #[serde(default)]
    pub common_templates: CommonTemplates,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_multiple_architectures: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_security_profile: Option<TlsSecurityProfile>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_generation_service: Option<TokenGenerationService>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateValidator {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<NodePlacement>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonTemplates {
    #[serde(default)]
    pub namespace: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_import_cron_templates: Vec<DataImportCronTemplate>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGenerationService {
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SspStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_version: Option<String>,
}
