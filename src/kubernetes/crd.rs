// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! CRD availability checking utilities

use crate::constants::crd::{POLL_INTERVAL_SECS, POLL_MAX_INTERVAL_SECS};
use crate::constants::API_GROUP;
use crate::error::Result;
use crate::types::{ControlPlane, NodeGroup, EKS};
use kube::{discovery::Discovery, Client, Resource};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Kinds served by the controller's API group, with the version it talks to.
fn required_kinds() -> Vec<(String, String)> {
    vec![
        (EKS::kind(&()).into_owned(), EKS::version(&()).into_owned()),
        (ControlPlane::kind(&()).into_owned(), ControlPlane::version(&()).into_owned()),
        (NodeGroup::kind(&()).into_owned(), NodeGroup::version(&()).into_owned()),
    ]
}

/// Required kinds that are not in `served`, given as (kind, version) pairs.
fn missing_kinds(served: &[(String, String)]) -> Vec<String> {
    required_kinds()
        .into_iter()
        .filter(|required| !served.contains(required))
        .map(|(kind, version)| format!("{}/{}", kind, version))
        .collect()
}

/// Wait for the EKS, ControlPlane and NodeGroup CRDs to become available.
/// This uses exponential backoff starting at POLL_INTERVAL_SECS seconds.
pub async fn wait_for_crds(client: &Client) -> Result<()> {
    let mut interval = POLL_INTERVAL_SECS;

    loop {
        match served_kinds(client).await {
            Ok(served) => {
                let missing = missing_kinds(&served);
                if missing.is_empty() {
                    info!("CRDs for {} are available", API_GROUP);
                    return Ok(());
                }
                info!(
                    "Waiting for {} ({}), retrying in {} seconds...",
                    missing.join(", "),
                    API_GROUP,
                    interval
                );
            }
            Err(e) => {
                warn!(
                    "Error discovering {}: {}, retrying in {} seconds...",
                    API_GROUP, e, interval
                );
            }
        }

        sleep(Duration::from_secs(interval)).await;

        // Exponential backoff with max cap
        interval = (interval * 2).min(POLL_MAX_INTERVAL_SECS);
    }
}

/// (kind, version) pairs currently served for the API group.
async fn served_kinds(client: &Client) -> Result<Vec<(String, String)>> {
    let discovery = Discovery::new(client.clone())
        .filter(&[API_GROUP])
        .run()
        .await?;

    Ok(discovery
        .groups()
        .filter(|group| group.name() == API_GROUP)
        .flat_map(|group| group.recommended_resources())
        .map(|(ar, _)| (ar.kind, ar.version))
        .collect())
}
