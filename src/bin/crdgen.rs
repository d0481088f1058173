// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Prints the EKS, ControlPlane and NodeGroup CRDs as a multi-document YAML stream.

use anyhow::Result;
use eks_controller::types::{ControlPlane, NodeGroup, EKS};
use kube::CustomResourceExt;

fn main() -> Result<()> {
    let crds = [EKS::crd(), ControlPlane::crd(), NodeGroup::crd()];
    for crd in &crds {
        println!("---");
        print!("{}", serde_yaml::to_string(crd)?);
    }
    Ok(())
}
