// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EksError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Resource is missing {0}")]
    MissingObjectKey(&'static str),

    #[error("Failed to serialize status: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EksError>;

fn api_error(err: &kube::Error) -> Option<&kube::error::ErrorResponse> {
    match err {
        kube::Error::Api(resp) => Some(resp),
        _ => None,
    }
}

/// The object vanished, or never existed.
pub fn is_not_found(err: &kube::Error) -> bool {
    api_error(err).is_some_and(|e| e.code == 404)
}

/// A create lost the race against another writer of the same name.
pub fn is_already_exists(err: &kube::Error) -> bool {
    api_error(err).is_some_and(|e| e.code == 409 && e.reason == "AlreadyExists")
}

/// Optimistic concurrency clash on update (stale resourceVersion).
pub fn is_conflict(err: &kube::Error) -> bool {
    api_error(err).is_some_and(|e| e.code == 409 && e.reason != "AlreadyExists")
}

/// Schema or validation rejection by the API server.
pub fn is_invalid(err: &kube::Error) -> bool {
    api_error(err).is_some_and(|e| e.code == 422)
}

/// Human readable message of an API error, falling back to the error's display form.
pub fn api_message(err: &kube::Error) -> String {
    match api_error(err) {
        Some(e) if !e.message.is_empty() => e.message.clone(),
        _ => err.to_string(),
    }
}
