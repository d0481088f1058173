// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Derives the EKS status from the observed state of its children.

use crate::types::{ChildPhase, ChildStatus, EKSPhase, EKSStatus};

/// Fold the child breakdown into the phase of the owning EKS resource.
pub fn aggregate_phase(control_plane: &ChildStatus, node_groups: &[ChildStatus]) -> EKSPhase {
    let children = || std::iter::once(control_plane).chain(node_groups);

    if children().all(|c| c.phase == ChildPhase::Missing) {
        EKSPhase::Pending
    } else if children().any(|c| matches!(c.phase, ChildPhase::Failed | ChildPhase::Missing)) {
        EKSPhase::Failed
    } else if children().all(|c| c.phase == ChildPhase::Complete) {
        EKSPhase::Complete
    } else {
        EKSPhase::Provisioning
    }
}

pub fn aggregate(
    control_plane: ChildStatus,
    node_groups: Vec<ChildStatus>,
    observed_generation: Option<i64>,
) -> EKSStatus {
    EKSStatus {
        phase: aggregate_phase(&control_plane, &node_groups),
        observed_generation,
        control_plane: Some(control_plane),
        node_groups,
    }
}

/// Whether every child reached a state that needs no further polling.
pub fn all_terminal(status: &EKSStatus) -> bool {
    status
        .control_plane
        .iter()
        .chain(&status.node_groups)
        .all(|c| c.phase.is_terminal())
}
