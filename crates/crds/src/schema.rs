//! Schema overrides for fields embedding core Kubernetes types.
//!
//! k8s-openapi types do not implement `JsonSchema`; the CRD keeps them as
//! opaque objects and lets the API server preserve their content.

use schemars::{json_schema, Schema, SchemaGenerator};

/// Object schema that keeps every unknown field.
pub fn preserve_unknown_fields(_: &mut SchemaGenerator) -> Schema {
    json_schema!({
        "type": "object",
        "x-kubernetes-preserve-unknown-fields": true
    })
}

/// Array of opaque objects.
pub fn preserve_unknown_fields_list(_: &mut SchemaGenerator) -> Schema {
    json_schema!({
        "type": "array",
        "items": {
            "type": "object",
            "x-kubernetes-preserve-unknown-fields": true
        }
    })
}
