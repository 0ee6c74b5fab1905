//! Types shared between the HyperConverged resource and downstream kinds.

use k8s_openapi::api::core::v1::{Affinity, Toleration};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Scheduling constraints propagated to component pods.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodePlacement {
    /// Node label selector
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<BTreeMap<String, String>>,

    /// Pod affinity rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "crate::schema::preserve_unknown_fields")]
    pub affinity: Option<Affinity>,

    /// Taint tolerations
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schemars(schema_with = "crate::schema::preserve_unknown_fields_list")]
    pub tolerations: Vec<Toleration>,
}

impl NodePlacement {
    /// True when no constraint is set.
    pub fn is_empty(&self) -> bool {
        self.node_selector.as_ref().is_none_or(BTreeMap::is_empty)
            && self.affinity.is_none()
            && self.tolerations.is_empty()
    }
}

/// Certificate lifetime settings. Durations use Go duration syntax (`48h0m0s`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CertRotateConfig {
    /// Certificate lifetime
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,

    /// How long before expiry the certificate is rotated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renew_before: Option<String>,
}

/// Named TLS profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum TlsProfileType {
    /// Legacy clients
    Old,
    /// Default profile
    Intermediate,
    /// TLS 1.3 only
    Modern,
    /// Explicit cipher list and minimum version
    Custom,
}

/// Minimum TLS protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub enum TlsProtocolVersion {
    /// TLS 1.0
    VersionTLS10,
    /// TLS 1.1
    VersionTLS11,
    /// TLS 1.2
    VersionTLS12,
    /// TLS 1.3
    VersionTLS13,
}

/// Empty marker for the predefined profiles; serialises as `{}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct TlsProfileMarker {}

/// Custom TLS settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CustomTlsProfile {
    /// OpenSSL-style cipher names
    #[serde(default)]
    pub ciphers: Vec<String>,

    /// Minimum accepted protocol version
    #[serde(rename = "minTLSVersion")]
    pub min_tls_version: TlsProtocolVersion,
}

/// Cluster-style TLS security profile, passed through to components that accept it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct TlsSecurityProfile {
    /// Selected profile
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<TlsProfileType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old: Option<TlsProfileMarker>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intermediate: Option<TlsProfileMarker>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modern: Option<TlsProfileMarker>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<CustomTlsProfile>,
}

impl TlsSecurityProfile {
    /// Profile of the given predefined type.
    pub fn of_type(type_: TlsProfileType) -> Self {
        let mut profile = Self {
            type_: Some(type_),
            ..Self::default()
        };
        match type_ {
            TlsProfileType::Old => profile.old = Some(TlsProfileMarker {}),
            TlsProfileType::Intermediate => profile.intermediate = Some(TlsProfileMarker {}),
            TlsProfileType::Modern => profile.modern = Some(TlsProfileMarker {}),
            TlsProfileType::Custom => {}
        }
        profile
    }
}
