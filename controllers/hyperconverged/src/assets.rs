//! Asset directories.
//!
//! Dashboards, quick starts, image streams and the common golden-image
//! templates ship as YAML files next to the operator binary. Every loader
//! walks its directory non-recursively and only considers `*.yaml` files.
//! A missing directory means "nothing to deploy"; a path that exists but is
//! not a directory is a start-up error.

use crate::error::ControllerError;
use hco_crds::DataImportCronTemplate;
use kube::Resource;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// `*.yaml` files directly under `dir`, sorted by name.
/// `Ok(None)` when the directory does not exist.
pub fn manifest_files(dir: &Path) -> Result<Option<Vec<PathBuf>>, ControllerError> {
    let meta = match fs::metadata(dir) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(dir = %dir.display(), "Asset directory does not exist, skipping");
            return Ok(None);
        }
        Err(e) => return Err(ControllerError::Assets(format!("{}: {e}", dir.display()))),
    };
    if !meta.is_dir() {
        return Err(ControllerError::Assets(format!("{} is not a directory", dir.display())));
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| ControllerError::Assets(format!("{}: {e}", dir.display())))? {
        let path = entry
            .map_err(|e| ControllerError::Assets(format!("{}: {e}", dir.display())))?
            .path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "yaml") {
            files.push(path);
        }
    }
    files.sort();
    Ok(Some(files))
}

/// Loads every object of kind `K` from `dir`.
///
/// Files that cannot be read, do not parse, or hold another kind are logged
/// and skipped.
pub fn load_objects<K>(dir: Option<&Path>) -> Result<Vec<K>, ControllerError>
where
    K: Resource<DynamicType = ()> + DeserializeOwned,
{
    let Some(dir) = dir else {
        return Ok(Vec::new());
    };
    let Some(files) = manifest_files(dir)? else {
        return Ok(Vec::new());
    };

    let kind = K::kind(&());
    let mut objects = Vec::with_capacity(files.len());
    for file in files {
        match read_object::<K>(&file, &kind) {
            Ok(obj) => {
                debug!(file = %file.display(), %kind, "Loaded asset");
                objects.push(obj);
            }
            Err(e) => error!(file = %file.display(), %kind, error = %e, "Skipping asset file"),
        }
    }
    Ok(objects)
}

fn read_object<K: DeserializeOwned>(file: &Path, kind: &str) -> Result<K, String> {
    let raw = fs::read_to_string(file).map_err(|e| e.to_string())?;
    let value: serde_yaml::Value = serde_yaml::from_str(&raw).map_err(|e| e.to_string())?;
    let found = value.get("kind").and_then(serde_yaml::Value::as_str).unwrap_or_default();
    if found != kind {
        return Err(format!("expected kind {kind}, found {found:?}"));
    }
    serde_yaml::from_value(value).map_err(|e| e.to_string())
}

/// Loads the common golden-image templates, keyed by name.
///
/// Each file holds a YAML list of templates. Unlike the other assets, a file
/// that does not parse fails the load.
pub fn load_data_import_cron_templates(dir: &Path) -> Result<BTreeMap<String, DataImportCronTemplate>, ControllerError> {
    let Some(files) = manifest_files(dir)? else {
        return Ok(BTreeMap::new());
    };

    let mut templates = BTreeMap::new();
    for file in files {
        let raw = fs::read_to_string(&file)
            .map_err(|e| ControllerError::Assets(format!("{}: {e}", file.display())))?;
        let list: Vec<DataImportCronTemplate> = serde_yaml::from_str(&raw)
            .map_err(|e| ControllerError::Assets(format!("{}: {e}", file.display())))?;
        for dict in list {
            templates.insert(dict.metadata.name.clone(), dict);
        }
    }
    Ok(templates)
}
