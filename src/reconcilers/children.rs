// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Create-or-update of the children owned by an EKS resource.
//!
//! Store rejections (422) and repeated update conflicts are absorbed into the
//! returned `ChildStatus` so one broken child does not stop the others. Any
//! other API failure is returned and fails the whole cycle.

use crate::error::{api_message, is_already_exists, is_conflict, is_invalid, is_not_found, Result};
use crate::reconcilers::translate::child_selector;
use crate::types::{ChildStatus, ControlPlane, ControlPlaneSpec, NodeGroup, NodeGroupSpec};
use k8s_openapi::NamespaceResourceScope;
use kube::{
    api::{DeleteParams, ListParams, PostParams},
    Api, Resource, ResourceExt,
};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;
use tracing::{debug, info, instrument, warn};

/// A kind the EKS reconciler creates and keeps in sync with a translated spec.
pub trait OwnedChild:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    type Spec: Clone + PartialEq;

    fn spec(&self) -> &Self::Spec;
    fn spec_mut(&mut self) -> &mut Self::Spec;
    /// Lifecycle value the provisioner wrote into `status.status`
    fn reported_status(&self) -> Option<&str>;
}

impl OwnedChild for ControlPlane {
    type Spec = ControlPlaneSpec;

    fn spec(&self) -> &ControlPlaneSpec {
        &self.spec
    }

    fn spec_mut(&mut self) -> &mut ControlPlaneSpec {
        &mut self.spec
    }

    fn reported_status(&self) -> Option<&str> {
        self.status.as_ref().map(|s| s.status.as_str())
    }
}

impl OwnedChild for NodeGroup {
    type Spec = NodeGroupSpec;

    fn spec(&self) -> &NodeGroupSpec {
        &self.spec
    }

    fn spec_mut(&mut self) -> &mut NodeGroupSpec {
        &mut self.spec
    }

    fn reported_status(&self) -> Option<&str> {
        self.status.as_ref().map(|s| s.status.as_str())
    }
}

/// UID of the controlling owner of an object, if any.
pub fn controller_uid<K: Resource>(obj: &K) -> Option<&str> {
    obj.meta()
        .owner_references
        .as_deref()
        .unwrap_or_default()
        .iter()
        .find(|o| o.controller == Some(true))
        .map(|o| o.uid.as_str())
}

/// Whether `current` has drifted from `desired` in anything the reconciler owns.
pub fn needs_update<K: OwnedChild>(current: &K, desired: &K) -> bool {
    let labels_drifted = desired
        .labels()
        .iter()
        .any(|(k, v)| current.labels().get(k) != Some(v));
    let owner_drifted = desired
        .owner_references()
        .iter()
        .any(|d| !current.owner_references().contains(d));

    current.spec() != desired.spec() || labels_drifted || owner_drifted
}

/// Overlay the desired spec, labels and owner reference on the stored object,
/// keeping its resourceVersion so the replace is checked for conflicts.
fn with_desired<K: OwnedChild>(mut current: K, desired: &K) -> K {
    *current.spec_mut() = desired.spec().clone();

    let desired_labels = desired.labels().clone();
    current.labels_mut().extend(desired_labels);

    let desired_refs = desired.owner_references().to_vec();
    let refs = current.owner_references_mut();
    for oref in desired_refs {
        match refs.iter_mut().find(|o| o.uid == oref.uid) {
            Some(existing) => *existing = oref,
            None => refs.push(oref),
        }
    }
    current
}

fn observed<K: OwnedChild>(obj: &K) -> ChildStatus {
    ChildStatus::observed(obj.name_any(), obj.reported_status())
}

/// A child with our name but controlled by another owner is never touched.
fn foreign_owner<K: OwnedChild>(current: &K, owner_uid: &str) -> Option<ChildStatus> {
    let uid = controller_uid(current)?;
    if uid == owner_uid {
        return None;
    }
    warn!(
        "{} {} is controlled by another resource (uid {}), leaving it alone",
        K::kind(&()),
        current.name_any(),
        uid
    );
    Some(ChildStatus::failed(
        current.name_any(),
        format!("already controlled by another resource with uid {}", uid),
    ))
}

fn write_failure(kind: &str, name: &str, err: kube::Error) -> Result<ChildStatus> {
    if is_invalid(&err) {
        warn!("{} {} rejected by the API server: {}", kind, name, api_message(&err));
        Ok(ChildStatus::failed(name, format!("rejected: {}", api_message(&err))))
    } else if is_not_found(&err) {
        debug!("{} {} disappeared while being written", kind, name);
        Ok(ChildStatus::missing(name).degraded("deleted while being updated"))
    } else {
        Err(err.into())
    }
}

/// Make sure a child matching `desired` exists and report what was observed.
#[instrument(skip(api, desired, owner_uid), fields(kind = %K::kind(&()), name = %desired.name_any()))]
pub async fn ensure_child<K: OwnedChild>(api: &Api<K>, desired: &K, owner_uid: &str) -> Result<ChildStatus> {
    let name = desired.name_any();
    let kind = K::kind(&());

    let current = match api.get_opt(&name).await? {
        Some(current) => current,
        None => match api.create(&PostParams::default(), desired).await {
            Ok(created) => {
                info!("Created {} {}", kind, name);
                return Ok(observed(&created));
            }
            Err(e) if is_already_exists(&e) => {
                debug!("{} {} was created concurrently, re-reading", kind, name);
                match api.get_opt(&name).await? {
                    Some(current) => current,
                    None => {
                        return Ok(ChildStatus::missing(&name).degraded("created and deleted concurrently"))
                    }
                }
            }
            Err(e) => return write_failure(&kind, &name, e),
        },
    };

    if let Some(status) = foreign_owner(&current, owner_uid) {
        return Ok(status);
    }
    if !needs_update(&current, desired) {
        debug!("{} {} is up to date", kind, name);
        return Ok(observed(&current));
    }

    update_child(api, current, desired, owner_uid).await
}

async fn update_child<K: OwnedChild>(api: &Api<K>, current: K, desired: &K, owner_uid: &str) -> Result<ChildStatus> {
    let name = desired.name_any();
    let kind = K::kind(&());

    match api
        .replace(&name, &PostParams::default(), &with_desired(current, desired))
        .await
    {
        Ok(updated) => {
            info!("Updated {} {} to the desired spec", kind, name);
            return Ok(observed(&updated));
        }
        Err(e) if is_conflict(&e) => debug!("Conflict updating {} {}, retrying once", kind, name),
        Err(e) => return write_failure(&kind, &name, e),
    }

    let Some(fresh) = api.get_opt(&name).await? else {
        return Ok(ChildStatus::missing(&name).degraded("deleted while being updated"));
    };
    if let Some(status) = foreign_owner(&fresh, owner_uid) {
        return Ok(status);
    }
    if !needs_update(&fresh, desired) {
        return Ok(observed(&fresh));
    }

    match api
        .replace(&name, &PostParams::default(), &with_desired(fresh.clone(), desired))
        .await
    {
        Ok(updated) => {
            info!("Updated {} {} to the desired spec", kind, name);
            Ok(observed(&updated))
        }
        Err(e) if is_conflict(&e) => {
            warn!("{} {} keeps conflicting, deferring to the next cycle", kind, name);
            Ok(observed(&fresh).degraded("update deferred after repeated conflicts"))
        }
        Err(e) => write_failure(&kind, &name, e),
    }
}

/// Delete node groups controlled by `owner_uid` whose names are not in `keep`.
/// Returns how many were deleted.
#[instrument(skip(api, owner_uid, keep))]
pub async fn prune_node_groups(
    api: &Api<NodeGroup>,
    owner: &str,
    owner_uid: &str,
    keep: &[String],
) -> Result<usize> {
    let listed = api
        .list(&ListParams::default().labels(&child_selector(owner)))
        .await?;

    let mut deleted = 0;
    for node_group in listed.items {
        let name = node_group.name_any();
        if keep.contains(&name) || controller_uid(&node_group) != Some(owner_uid) {
            continue;
        }
        match api.delete(&name, &DeleteParams::background()).await {
            Ok(_) => {
                info!("Deleted orphaned NodeGroup {}", name);
                deleted += 1;
            }
            Err(e) if is_not_found(&e) => debug!("NodeGroup {} already gone", name),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(deleted)
}
