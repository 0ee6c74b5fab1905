//! JSON-Patch overrides.
//!
//! A user may layer an RFC 6902 patch over the rendered spec of a primary
//! downstream object through a well-known annotation on the HyperConverged
//! resource. Operations may only target paths below `/spec/`.

use crate::error::ControllerError;
use hco_crds::HyperConverged;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

const SPEC_PREFIX: &str = "/spec/";

/// Applies the patch stored under `annotation` on `hc`, if any, to `obj`.
pub fn apply_annotation_patch<T>(obj: T, hc: &HyperConverged, annotation: &str) -> Result<T, ControllerError>
where
    T: Serialize + DeserializeOwned,
{
    match hc.metadata.annotations.as_ref().and_then(|a| a.get(annotation)) {
        Some(raw) => apply_patch(obj, raw).map_err(|message| ControllerError::JsonPatch {
            annotation: annotation.to_string(),
            message,
        }),
        None => Ok(obj),
    }
}

/// Parses `raw` and checks that every operation stays within `/spec/`.
pub fn parse_spec_patch(raw: &str) -> Result<json_patch::Patch, String> {
    let doc: Value = serde_json::from_str(raw).map_err(|e| e.to_string())?;
    let patch: json_patch::Patch = serde_json::from_value(doc.clone()).map_err(|e| e.to_string())?;

    for op in doc.as_array().into_iter().flatten() {
        let path = op.get("path").and_then(Value::as_str).unwrap_or_default();
        if !path.starts_with(SPEC_PREFIX) {
            return Err("can only modify spec fields".to_string());
        }
    }
    Ok(patch)
}

fn apply_patch<T>(obj: T, raw: &str) -> Result<T, String>
where
    T: Serialize + DeserializeOwned,
{
    let patch = parse_spec_patch(raw)?;
    let mut doc = serde_json::to_value(&obj).map_err(|e| e.to_string())?;
    json_patch::patch(&mut doc, &patch).map_err(|e| e.to_string())?;
    serde_json::from_value(doc).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hco_crds::{CdiConfigSpec, CdiSpec, CDI};
    use std::collections::BTreeMap;

    fn hc_with(annotation: &str, value: &str) -> HyperConverged {
        let mut hc = HyperConverged::new("kubevirt-hyperconverged", Default::default());
        hc.metadata.annotations = Some(BTreeMap::from([(annotation.to_string(), value.to_string())]));
        hc
    }

    fn cdi() -> CDI {
        CDI::new(
            "cdi-kubevirt-hyperconverged",
            CdiSpec {
                config: Some(CdiConfigSpec {
                    feature_gates: vec!["a".to_string()],
                    ..Default::default()
                }),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_no_annotation_is_identity() {
        let hc = HyperConverged::new("hc", Default::default());
        let patched = apply_annotation_patch(cdi(), &hc, "x/jsonpatch").unwrap();
        assert_eq!(patched, cdi());
    }

    #[test]
    fn test_patch_is_applied() {
        let hc = hc_with(
            "x/jsonpatch",
            r#"[{"op":"add","path":"/spec/config/featureGates/-","value":"fg1"},
                {"op":"replace","path":"/spec/uninstallStrategy","value":"RemoveWorkloads"}]"#,
        );
        let patched = apply_annotation_patch(cdi(), &hc, "x/jsonpatch");
        // replace on a missing member fails
        assert!(patched.is_err());

        let hc = hc_with(
            "x/jsonpatch",
            r#"[{"op":"add","path":"/spec/config/featureGates/-","value":"fg1"},
                {"op":"add","path":"/spec/uninstallStrategy","value":"RemoveWorkloads"}]"#,
        );
        let patched = apply_annotation_patch(cdi(), &hc, "x/jsonpatch").unwrap();
        assert_eq!(patched.spec.config.unwrap().feature_gates, vec!["a", "fg1"]);
        assert_eq!(patched.spec.uninstall_strategy.as_deref(), Some("RemoveWorkloads"));
    }

    #[test]
    fn test_non_spec_path_is_rejected() {
        let hc = hc_with(
            "x/jsonpatch",
            r#"[{"op":"add","path":"/metadata/labels/foo","value":"bar"}]"#,
        );
        let err = apply_annotation_patch(cdi(), &hc, "x/jsonpatch").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid jsonPatch in the x/jsonpatch annotation: can only modify spec fields"
        );
    }

    #[test]
    fn test_bare_spec_path_is_rejected() {
        assert!(parse_spec_patch(r#"[{"op":"replace","path":"/spec","value":{}}]"#).is_err());
    }

    #[test]
    fn test_malformed_patch() {
        let hc = hc_with("x/jsonpatch", "not json");
        let err = apply_annotation_patch(cdi(), &hc, "x/jsonpatch").unwrap_err();
        assert!(matches!(err, ControllerError::JsonPatch { .. }));
        assert!(err.to_string().starts_with("invalid jsonPatch in the x/jsonpatch annotation: "));

        assert!(parse_spec_patch(r#"[{"op":"explode","path":"/spec/x"}]"#).is_err());
    }
}
