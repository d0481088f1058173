// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// API group shared by the EKS, ControlPlane and NodeGroup kinds
pub const API_GROUP: &str = "cluster.eks.amazonaws.com";

/// Kubernetes label keys set on owned children
pub mod labels {
    /// Name of the owning EKS resource, used to list node groups for pruning
    pub const EKS_NAME: &str = "cluster.eks.amazonaws.com/eks";
}

/// Lifecycle values written by the provisioner into `status.status` of children
pub mod child_status {
    pub const COMPLETE: &str = "Complete";
    pub const FAILED: &str = "Failed";
}

/// Suffixes used to derive child object names from the owner name
pub mod naming {
    pub const CONTROL_PLANE_SUFFIX: &str = "controlplane";
    pub const NODE_GROUP_SUFFIX: &str = "nodegroup";
}

/// CRD polling configuration
pub mod crd {
    /// Initial polling interval in seconds when waiting for CRD
    pub const POLL_INTERVAL_SECS: u64 = 10;
    /// Maximum polling interval in seconds (exponential backoff cap)
    pub const POLL_MAX_INTERVAL_SECS: u64 = 60;
}

/// Defaults for the values read by `Config::from_env`
pub mod defaults {
    pub const WORKER_COUNT: usize = 4;
    pub const REQUEUE_INTERVAL_SECS: u64 = 30;
    pub const BACKOFF_BASE_MS: u64 = 1000;
    pub const BACKOFF_MAX_SECS: u64 = 300;
}
