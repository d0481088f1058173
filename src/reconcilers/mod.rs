// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Reconciliation of EKS resources into their ControlPlane and NodeGroup children.

pub mod backoff;
pub mod children;
pub mod eks;
pub mod status;
pub mod translate;

pub use eks::{error_policy, reconcile, EksReconciler};
