// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! EKS reconciler - drives ControlPlane and NodeGroup children toward the EKS spec.

use crate::config::Config;
use crate::error::{EksError, Result};
use crate::reconcilers::backoff::ExponentialBackoff;
use crate::reconcilers::children::{ensure_child, prune_node_groups};
use crate::reconcilers::status::{aggregate, all_terminal};
use crate::reconcilers::translate::desired_children;
use crate::types::{ControlPlane, EKSStatus, NodeGroup, EKS};
use futures::StreamExt;
use k8s_openapi::NamespaceResourceScope;
use kube::{
    api::{Patch, PatchParams},
    runtime::{
        controller::{self, Action},
        reflector::ObjectRef,
        Controller,
    },
    Api, Client, Resource, ResourceExt,
};
use kube_runtime::watcher::Config as WatcherConfig;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

pub struct EksReconciler {
    client: Client,
    watch_namespace: Option<String>,
    concurrency: u16,
    requeue_interval: Duration,
    backoff: ExponentialBackoff,
    /// Consecutive failed cycles per EKS resource
    failures: Mutex<HashMap<ObjectRef<EKS>, u32>>,
}

impl EksReconciler {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            watch_namespace: config.watch_namespace.clone(),
            concurrency: u16::try_from(config.worker_count).unwrap_or(u16::MAX),
            requeue_interval: config.requeue_interval,
            backoff: ExponentialBackoff::new(config.backoff_base, config.backoff_max),
            failures: Mutex::new(HashMap::new()),
        }
    }

    fn api<K>(&self) -> Api<K>
    where
        K: Resource<DynamicType = (), Scope = NamespaceResourceScope>,
    {
        match &self.watch_namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }

    /// Watch EKS resources and their children until SIGINT or SIGTERM.
    ///
    /// Child events are routed to the EKS named in their controller owner
    /// reference. A key is never reconciled twice at the same time, and
    /// events arriving meanwhile collapse into one follow-up cycle.
    pub async fn run(self) -> anyhow::Result<()> {
        let eks: Api<EKS> = self.api();
        let control_planes: Api<ControlPlane> = self.api();
        let node_groups: Api<NodeGroup> = self.api();
        let config = controller::Config::default().concurrency(self.concurrency);

        info!(
            "Watching EKS resources in {} with {} workers",
            self.watch_namespace.as_deref().unwrap_or("all namespaces"),
            self.concurrency
        );
        let context = Arc::new(self);

        Controller::new(eks, WatcherConfig::default())
            .owns(control_planes, WatcherConfig::default())
            .owns(node_groups, WatcherConfig::default())
            .with_config(config)
            .shutdown_on_signal()
            .run(reconcile, error_policy, context)
            .for_each(|res| async move {
                match res {
                    Ok((obj, action)) => debug!("Reconciled {}: {:?}", obj, action),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        info!("Controller stopped");
        Ok(())
    }

    /// Count a failed cycle, returning the attempt number and the retry delay.
    fn record_failure(&self, key: ObjectRef<EKS>) -> (u32, Duration) {
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        let count = failures.entry(key).or_insert(0);
        *count += 1;
        (*count, self.backoff.delay(*count))
    }

    fn forget(&self, key: &ObjectRef<EKS>) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    async fn write_status(&self, api: &Api<EKS>, name: &str, status: &EKSStatus) -> Result<()> {
        let patch = serde_json::json!({ "status": serde_json::to_value(status)? });
        api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }
}

/// Run one reconcile cycle for an EKS resource.
///
/// Depends only on what is currently stored, so it is safe to run any
/// number of times, in any order relative to watch events.
#[instrument(skip_all, fields(eks = %eks.name_any(), namespace = ?eks.namespace()))]
pub async fn reconcile(eks: Arc<EKS>, ctx: Arc<EksReconciler>) -> Result<Action> {
    if eks.metadata.deletion_timestamp.is_some() {
        debug!("EKS resource is being deleted, children are garbage collected");
        return Ok(Action::await_change());
    }

    let namespace = eks
        .namespace()
        .ok_or(EksError::MissingObjectKey(".metadata.namespace"))?;
    let name = eks.name_any();
    let owner_uid = eks.uid().ok_or(EksError::MissingObjectKey(".metadata.uid"))?;
    let desired = desired_children(&eks)?;

    let eks_api: Api<EKS> = Api::namespaced(ctx.client.clone(), &namespace);
    if eks.status.is_none() {
        info!("New EKS resource for cluster {}", eks.spec.control_plane.cluster_name);
        ctx.write_status(&eks_api, &name, &EKSStatus::default()).await?;
    }

    let control_planes: Api<ControlPlane> = Api::namespaced(ctx.client.clone(), &namespace);
    let node_groups: Api<NodeGroup> = Api::namespaced(ctx.client.clone(), &namespace);

    let control_plane = ensure_child(&control_planes, &desired.control_plane, &owner_uid).await?;

    let mut node_group_statuses = Vec::with_capacity(desired.node_groups.len());
    for node_group in &desired.node_groups {
        node_group_statuses.push(ensure_child(&node_groups, node_group, &owner_uid).await?);
    }

    let pruned = prune_node_groups(&node_groups, &name, &owner_uid, &desired.node_group_names()).await?;
    if pruned > 0 {
        info!("Removed {} node groups no longer in the spec", pruned);
    }

    let status = aggregate(control_plane, node_group_statuses, eks.metadata.generation);
    let previous = eks.status.clone().unwrap_or_default();
    if previous != status {
        if previous.phase != status.phase {
            info!("Phase {:?} -> {:?}", previous.phase, status.phase);
        }
        ctx.write_status(&eks_api, &name, &status).await?;
    }

    ctx.forget(&ObjectRef::from_obj(eks.as_ref()));
    if all_terminal(&status) {
        debug!("All children settled in phase {:?}", status.phase);
        Ok(Action::await_change())
    } else {
        Ok(Action::requeue(ctx.requeue_interval))
    }
}

/// Retry a failed cycle with per-resource exponential backoff.
pub fn error_policy(eks: Arc<EKS>, error: &EksError, ctx: Arc<EksReconciler>) -> Action {
    let (attempts, delay) = ctx.record_failure(ObjectRef::from_obj(eks.as_ref()));
    if attempts > 1 {
        warn!("Reconciling EKS {} failed (attempt {}): {}", eks.name_any(), attempts, error);
    } else {
        error!("Reconciling EKS {} failed: {}", eks.name_any(), error);
    }
    Action::requeue(delay)
}
