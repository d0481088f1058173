// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Custom resources managed by the controller.

pub mod control_plane;
pub mod eks;
pub mod node_group;

pub use control_plane::{ControlPlane, ControlPlaneSpec, ControlPlaneStatus};
pub use eks::{
    ChildPhase, ChildStatus, ControlPlaneTemplate, EKSPhase, EKSSpec, EKSStatus, NodeGroupTemplate,
    EKS,
};
pub use node_group::{NodeGroup, NodeGroupSpec, NodeGroupStatus};
