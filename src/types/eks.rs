// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::child_status;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// Desired state of an EKS cluster: the account it lives in, its control plane
/// stack and an ordered list of node groups.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, PartialEq, schemars::JsonSchema)]
#[kube(
    group = "cluster.eks.amazonaws.com",
    version = "v1alpha1",
    kind = "EKS",
    plural = "eks",
    namespaced,
    status = "EKSStatus",
    printcolumn = r#"{"name":"CLUSTER","type":"string","jsonPath":".spec.controlPlane.clusterName"}"#,
    printcolumn = r#"{"name":"ACCOUNT","type":"string","jsonPath":".spec.accountId"}"#,
    printcolumn = r#"{"name":"PHASE","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"AGE","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct EKSSpec {
    pub account_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// IAM role assumed in the target account by the provisioner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_account_role_name: Option<String>,
    pub control_plane: ControlPlaneTemplate,
    #[serde(default)]
    pub node_groups: Vec<NodeGroupTemplate>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ControlPlaneTemplate {
    pub cluster_name: String,
    pub stack_name: String,
    /// Kubernetes version of the control plane, provisioner default when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeGroupTemplate {
    /// Name of the node group in the cloud provider. Defaults to the child object name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired_capacity: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_size: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Aggregated phase of an EKS resource.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, schemars::JsonSchema)]
pub enum EKSPhase {
    /// No child exists yet
    #[default]
    Pending,
    Provisioning,
    Complete,
    Failed,
}

/// Observed state of an EKS resource.
///
/// Optional fields serialize as `null` rather than being skipped, so a JSON
/// merge patch of the whole status clears values that are no longer set.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EKSStatus {
    pub phase: EKSPhase,
    #[serde(default)]
    pub observed_generation: Option<i64>,
    #[serde(default)]
    pub control_plane: Option<ChildStatus>,
    #[serde(default)]
    pub node_groups: Vec<ChildStatus>,
}

/// Per-child breakdown kept in the EKS status, also acting as the reference to the child.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChildStatus {
    pub name: String,
    pub phase: ChildPhase,
    /// Raw `status.status` value reported on the child
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, schemars::JsonSchema)]
pub enum ChildPhase {
    /// Child does not exist and no attempt to create it has failed
    Missing,
    /// Child exists, the provisioner has not reported anything yet
    Pending,
    Provisioning,
    /// Create or update was deferred after a conflict, retried next cycle
    Degraded,
    Complete,
    Failed,
}

impl ChildPhase {
    /// Map the lifecycle string a provisioner writes into `status.status`.
    pub fn from_reported(status: Option<&str>) -> Self {
        match status {
            None | Some("") => ChildPhase::Pending,
            Some(child_status::COMPLETE) => ChildPhase::Complete,
            Some(child_status::FAILED) => ChildPhase::Failed,
            Some(_) => ChildPhase::Provisioning,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ChildPhase::Complete | ChildPhase::Failed)
    }
}

impl EKS {
    /// Phase recorded in the status, `Pending` before the first status write
    pub fn phase(&self) -> EKSPhase {
        self.status.as_ref().map(|s| s.phase).unwrap_or_default()
    }
}

impl ChildStatus {
    /// Status of a child that exists, as reported by its provisioner.
    pub fn observed(name: impl Into<String>, reported: Option<&str>) -> Self {
        Self {
            name: name.into(),
            phase: ChildPhase::from_reported(reported),
            status: reported.filter(|s| !s.is_empty()).map(str::to_string),
            message: None,
        }
    }

    pub fn missing(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phase: ChildPhase::Missing,
            status: None,
            message: None,
        }
    }

    /// The store refused the child, or it belongs to someone else.
    pub fn failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phase: ChildPhase::Failed,
            status: None,
            message: Some(message.into()),
        }
    }

    /// Keep what was observed but flag the pending write as deferred.
    pub fn degraded(mut self, message: impl Into<String>) -> Self {
        self.phase = ChildPhase::Degraded;
        self.message = Some(message.into());
        self
    }
}
