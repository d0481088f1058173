// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::Result;
use kube::Client;
use tracing::info;
use tracing_subscriber::EnvFilter;

use eks_controller::config::Config;
use eks_controller::kubernetes::wait_for_crds;
use eks_controller::reconcilers::EksReconciler;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing, RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting EKS controller");

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Configuration loaded: namespace={}, workers={}, requeue_interval={:?}",
        config.watch_namespace.as_deref().unwrap_or("<all>"),
        config.worker_count,
        config.requeue_interval
    );

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    info!("Waiting for EKS CRDs to become available...");
    wait_for_crds(&client).await?;

    EksReconciler::new(client, &config).run().await?;

    info!("Shutdown complete");
    Ok(())
}
