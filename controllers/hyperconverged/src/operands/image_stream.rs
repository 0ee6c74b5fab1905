//! Golden-image ImageStreams.
//!
//! One operand per shipped manifest. The streams exist only while the common
//! boot image import is on, and follow `commonBootImageNamespace`: a change of
//! namespace deletes the stream from the old one before it is created in the
//! new one. Streams not labelled as managed by this operator are left alone.

use super::{hc_namespace, EnsureResult, GenericOperand, ObjectIdentity, Operand, OperandHooks, SpecCache};
use crate::assets;
use crate::config::OperatorConfig;
use crate::error::ControllerError;
use crate::labels::{managed_labels, merge_managed_labels, AppComponent, APP_LABEL_MANAGED_BY, MANAGED_BY};
use crate::related::{object_reference, remove_related_object};
use crate::request::HcoRequest;
use async_trait::async_trait;
use cluster_store::{typed, ObjectStore};
use hco_crds::{HyperConverged, ImageStream, TagReference};
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;

fn import_enabled(hc: &HyperConverged) -> bool {
    hc.spec.enable_common_boot_image_import != Some(false)
}

/// Restores `from` and `importPolicy` of one tag. Returns true on change.
fn reconcile_tag(found: &mut TagReference, required: &TagReference) -> bool {
    let mut modified = false;
    let source = |t: &TagReference| t.from.as_ref().map(|f| (f.kind.clone(), f.name.clone()));
    if source(found) != source(required) {
        found.from.clone_from(&required.from);
        modified = true;
    }
    if found.import_policy != required.import_policy {
        found.import_policy.clone_from(&required.import_policy);
        modified = true;
    }
    modified
}

/// Brings the tags of `found` in line with `required`: unknown tags are
/// dropped, known ones restored, missing ones appended.
fn reconcile_tags(found: &mut Vec<TagReference>, required: &BTreeMap<String, TagReference>) -> bool {
    let mut modified = false;
    let mut tags = Vec::with_capacity(required.len());
    for mut tag in found.drain(..) {
        let Some(req_tag) = required.get(&tag.name) else {
            modified = true;
            continue;
        };
        modified |= reconcile_tag(&mut tag, req_tag);
        tags.push(tag);
    }
    for (name, req_tag) in required {
        if !tags.iter().any(|t| &t.name == name) {
            tags.push(req_tag.clone());
            modified = true;
        }
    }
    *found = tags;
    modified
}

/// Hooks for one shipped ImageStream.
pub struct ImageStreamHooks {
    cfg: Arc<OperatorConfig>,
    template: ImageStream,
    original_namespace: Option<String>,
    tags: BTreeMap<String, TagReference>,
    cache: SpecCache<ImageStream>,
}

impl ImageStreamHooks {
    pub fn new(cfg: Arc<OperatorConfig>, template: ImageStream) -> Self {
        let tags = template
            .spec
            .tags
            .iter()
            .map(|t| (t.name.clone(), t.clone()))
            .collect();
        Self {
            cfg,
            original_namespace: template.metadata.namespace.clone(),
            template,
            tags,
            cache: SpecCache::new(),
        }
    }

    pub fn name(&self) -> String {
        self.template.name_any()
    }

    /// Namespace the stream belongs in for `hc`.
    pub fn target_namespace(&self, hc: &HyperConverged) -> String {
        hc.spec
            .common_boot_image_namespace
            .clone()
            .filter(|ns| !ns.is_empty())
            .or_else(|| self.original_namespace.clone())
            .unwrap_or_else(|| hc_namespace(hc, &self.cfg).to_string())
    }

    fn render(&self, hc: &HyperConverged) -> ImageStream {
        let mut stream = self.template.clone();
        stream.metadata.namespace = Some(self.target_namespace(hc));
        stream.metadata.labels = Some(managed_labels(&hc.name_any(), &self.cfg.operator_version, AppComponent::Compute));
        stream.metadata.resource_version = None;
        stream
    }
}

#[async_trait]
impl OperandHooks for ImageStreamHooks {
    type Cr = ImageStream;

    fn full_cr(&self, hc: &HyperConverged) -> Result<Arc<ImageStream>, ControllerError> {
        self.cache.get_or_try_build(|| Ok(self.render(hc)))
    }

    async fn update_cr(
        &self,
        req: &mut HcoRequest,
        store: &dyn ObjectStore,
        found: &mut ImageStream,
        required: &ImageStream,
    ) -> Result<(bool, bool), ControllerError> {
        let managed = found.labels().get(APP_LABEL_MANAGED_BY).is_some_and(|v| v == MANAGED_BY);
        if !managed {
            return Ok((false, false));
        }

        let labels_changed = merge_managed_labels(&mut found.metadata, &required.metadata);
        let tags_changed = reconcile_tags(&mut found.spec.tags, &self.tags);
        if !labels_changed && !tags_changed {
            return Ok((false, false));
        }

        let overwritten = super::log_drift(req, "ImageStream");
        typed::update(store, found, false).await?;
        Ok((true, overwritten))
    }

    fn reset(&self) {
        self.cache.reset();
    }

    fn identity(&self, hc: &HyperConverged) -> Option<ObjectIdentity> {
        Some(ObjectIdentity::named::<ImageStream>(
            Some(&self.target_namespace(hc)),
            &self.name(),
        ))
    }
}

/// An ImageStream operand with namespace migration and removal.
pub struct ImageStreamOperand {
    store: Arc<dyn ObjectStore>,
    inner: GenericOperand<ImageStreamHooks>,
    applied_namespace: Mutex<Option<String>>,
}

impl ImageStreamOperand {
    pub fn new(store: Arc<dyn ObjectStore>, cfg: Arc<OperatorConfig>, template: ImageStream) -> Self {
        let hooks = ImageStreamHooks::new(cfg, template);
        let applied_namespace = Mutex::new(hooks.original_namespace.clone());
        Self {
            inner: GenericOperand::new(Arc::clone(&store), hooks),
            store,
            applied_namespace,
        }
    }

    /// Deletes the stream from `namespace` and drops it from the related objects.
    async fn delete_from(&self, req: &mut HcoRequest, namespace: &str) -> Result<bool, ControllerError> {
        let name = self.inner.hooks().name();
        let deleted = typed::delete::<ImageStream>(self.store.as_ref(), Some(namespace), &name, false)
            .await
            .map_err(|e| ControllerError::Build(format!("failed to delete imagestream {namespace}/{name}; {e}")))?;

        let mut gone = self.inner.hooks().template.clone();
        gone.metadata.namespace = Some(namespace.to_string());
        let status = req.instance.status.get_or_insert_with(Default::default);
        if remove_related_object(&mut status.related_objects, &object_reference(&gone)) {
            req.status_dirty = true;
        }
        Ok(deleted)
    }

    async fn migrate_namespace(&self, req: &mut HcoRequest) -> Result<(), ControllerError> {
        let target = self.inner.hooks().target_namespace(&req.instance);
        let previous = self
            .applied_namespace
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(previous) = previous.filter(|p| *p != target) {
            info!(name = %self.inner.hooks().name(), from = %previous, to = %target, "Moving ImageStream");
            self.delete_from(req, &previous).await?;
        }
        *self.applied_namespace.lock().unwrap_or_else(PoisonError::into_inner) = Some(target);
        Ok(())
    }
}

#[async_trait]
impl Operand for ImageStreamOperand {
    async fn ensure(&self, req: &mut HcoRequest) -> EnsureResult {
        let name = self.inner.hooks().name();
        let res = EnsureResult::new("ImageStream").set_name(&name);

        if import_enabled(&req.instance) {
            if let Err(e) = self.migrate_namespace(req).await {
                return res.error(e);
            }
            return self.inner.ensure(req).await;
        }

        let namespace = self.inner.hooks().target_namespace(&req.instance);
        match self.delete_from(req, &namespace).await {
            Ok(true) => res.set_deleted().set_upgrade_done(req.component_upgrade_in_progress),
            Ok(false) => res.set_upgrade_done(req.component_upgrade_in_progress),
            Err(e) => res.error(e),
        }
    }

    fn reset(&self) {
        self.inner.reset();
    }

    fn objects(&self, hc: &HyperConverged) -> Vec<ObjectIdentity> {
        self.inner.objects(hc)
    }
}

/// One operand per ImageStream manifest in the configured directory.
pub fn operands(
    store: &Arc<dyn ObjectStore>,
    cfg: &Arc<OperatorConfig>,
) -> Result<Vec<Box<dyn Operand>>, ControllerError> {
    let streams = assets::load_objects::<ImageStream>(cfg.assets.image_streams.as_deref())?;
    Ok(streams
        .into_iter()
        .map(|stream| {
            Box::new(ImageStreamOperand::new(Arc::clone(store), Arc::clone(cfg), stream)) as Box<dyn Operand>
        })
        .collect())
}
