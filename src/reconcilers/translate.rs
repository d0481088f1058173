// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Pure mapping from an EKS resource to the children it should own.

use crate::constants::{labels, naming};
use crate::error::{EksError, Result};
use crate::types::{ControlPlane, ControlPlaneSpec, EKSSpec, NodeGroup, NodeGroupSpec, NodeGroupTemplate, EKS};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::ObjectMeta;
use kube::Resource;
use std::collections::BTreeMap;

/// Children an EKS resource should own, fully built and ready to create.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredChildren {
    pub control_plane: ControlPlane,
    pub node_groups: Vec<NodeGroup>,
}

impl DesiredChildren {
    pub fn node_group_names(&self) -> Vec<String> {
        self.node_groups
            .iter()
            .filter_map(|ng| ng.metadata.name.clone())
            .collect()
    }
}

pub fn control_plane_name(owner: &str) -> String {
    format!("{}-{}", owner, naming::CONTROL_PLANE_SUFFIX)
}

/// Name of the node group in `slot`, which is 1-based.
pub fn node_group_name(owner: &str, slot: usize) -> String {
    format!("{}-{}-{}", owner, naming::NODE_GROUP_SUFFIX, slot)
}

pub fn control_plane_spec(spec: &EKSSpec) -> ControlPlaneSpec {
    ControlPlaneSpec {
        account_id: spec.account_id.clone(),
        region: spec.region.clone(),
        cross_account_role_name: spec.cross_account_role_name.clone(),
        cluster_name: spec.control_plane.cluster_name.clone(),
        stack_name: spec.control_plane.stack_name.clone(),
        version: spec.control_plane.version.clone(),
    }
}

/// Node group spec for `template`, defaulting its cloud name to `object_name`.
pub fn node_group_spec(spec: &EKSSpec, object_name: &str, template: &NodeGroupTemplate) -> NodeGroupSpec {
    NodeGroupSpec {
        account_id: spec.account_id.clone(),
        region: spec.region.clone(),
        cross_account_role_name: spec.cross_account_role_name.clone(),
        cluster_name: spec.control_plane.cluster_name.clone(),
        node_group_name: template
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| object_name.to_string()),
        instance_type: template.instance_type.clone(),
        desired_capacity: template.desired_capacity,
        min_size: template.min_size,
        max_size: template.max_size,
        version: template
            .version
            .clone()
            .or_else(|| spec.control_plane.version.clone()),
    }
}

/// Labels every child carries so they can be listed by owner name.
pub fn child_labels(owner: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(labels::EKS_NAME.to_string(), owner.to_string())])
}

/// Label selector matching the children of `owner`.
pub fn child_selector(owner: &str) -> String {
    format!("{}={}", labels::EKS_NAME, owner)
}

fn child_meta(name: String, namespace: &str, owner: &str, oref: &OwnerReference) -> ObjectMeta {
    ObjectMeta {
        name: Some(name),
        namespace: Some(namespace.to_string()),
        labels: Some(child_labels(owner)),
        owner_references: Some(vec![oref.clone()]),
        ..Default::default()
    }
}

/// Build the desired children of `eks`. Only fails when the resource lacks the
/// identity needed for an owner reference.
pub fn desired_children(eks: &EKS) -> Result<DesiredChildren> {
    let owner = eks
        .metadata
        .name
        .as_deref()
        .ok_or(EksError::MissingObjectKey(".metadata.name"))?;
    let namespace = eks
        .metadata
        .namespace
        .as_deref()
        .ok_or(EksError::MissingObjectKey(".metadata.namespace"))?;
    let oref = eks
        .controller_owner_ref(&())
        .ok_or(EksError::MissingObjectKey(".metadata.uid"))?;

    let control_plane = ControlPlane {
        metadata: child_meta(control_plane_name(owner), namespace, owner, &oref),
        spec: control_plane_spec(&eks.spec),
        status: None,
    };

    let node_groups = eks
        .spec
        .node_groups
        .iter()
        .enumerate()
        .map(|(i, template)| {
            let name = node_group_name(owner, i + 1);
            NodeGroup {
                spec: node_group_spec(&eks.spec, &name, template),
                metadata: child_meta(name, namespace, owner, &oref),
                status: None,
            }
        })
        .collect();

    Ok(DesiredChildren {
        control_plane,
        node_groups,
    })
}
