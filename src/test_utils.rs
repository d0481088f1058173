// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities: an in-memory API server for the EKS group and fixtures.

use crate::types::{ControlPlane, ControlPlaneTemplate, EKSSpec, NodeGroup, NodeGroupTemplate, EKS};
use bytes::Bytes;
use http::{Method, Request, Response};
use http_body_util::BodyExt;
use kube::api::{Patch, PatchParams};
use kube::client::Body;
use kube::{Api, Client};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::Service;

pub const EKS_PLURAL: &str = "eks";
pub const CONTROL_PLANES: &str = "controlplanes";
pub const NODE_GROUPS: &str = "nodegroups";

const API_VERSION: &str = "cluster.eks.amazonaws.com/v1alpha1";
const PATH_PREFIX: &str = "/apis/cluster.eks.amazonaws.com/v1alpha1/namespaces/";

#[derive(Default)]
struct Store {
    /// (plural, namespace, name) -> stored object
    objects: BTreeMap<(String, String, String), Value>,
    next_uid: u64,
    resource_version: u64,
    writes: usize,
    lists: usize,
    racing: HashSet<String>,
    rejected: HashMap<String, String>,
    conflicts: HashMap<String, u32>,
    unavailable: HashSet<String>,
}

impl Store {
    fn bump(&mut self) -> String {
        self.resource_version += 1;
        self.resource_version.to_string()
    }
}

struct Target {
    namespace: String,
    plural: String,
    name: Option<String>,
    subresource: Option<String>,
}

impl Target {
    fn parse(path: &str) -> Option<Self> {
        let mut parts = path.strip_prefix(PATH_PREFIX)?.split('/');
        Some(Self {
            namespace: parts.next()?.to_string(),
            plural: parts.next()?.to_string(),
            name: parts.next().map(str::to_string),
            subresource: parts.next().map(str::to_string),
        })
    }

    fn key(&self, name: &str) -> (String, String, String) {
        (self.plural.clone(), self.namespace.clone(), name.to_string())
    }
}

fn kind_of(plural: &str) -> &'static str {
    match plural {
        EKS_PLURAL => "EKS",
        CONTROL_PLANES => "ControlPlane",
        NODE_GROUPS => "NodeGroup",
        _ => "Unknown",
    }
}

fn json_response(code: u16, body: &Value) -> Response<Body> {
    Response::builder()
        .status(code)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string().into_bytes()))
        .unwrap()
}

fn status_response(code: u16, reason: &str, message: impl Into<String>) -> Response<Body> {
    json_response(
        code,
        &json!({
            "kind": "Status",
            "apiVersion": "v1",
            "status": "Failure",
            "message": message.into(),
            "reason": reason,
            "code": code
        }),
    )
}

/// RFC 7386 JSON merge patch.
fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = json!({});
    }
    if let Value::Object(map) = target {
        for (k, v) in patch {
            if v.is_null() {
                map.remove(k);
            } else {
                merge_patch(map.entry(k.clone()).or_insert(Value::Null), v);
            }
        }
    }
}

fn matches_selector(obj: &Value, selector: Option<&str>) -> bool {
    let Some(selector) = selector else {
        return true;
    };
    selector.split(',').filter(|s| !s.is_empty()).all(|term| {
        let (key, value) = term.split_once('=').unwrap_or((term, ""));
        obj["metadata"]["labels"][key].as_str() == Some(value)
    })
}

/// In-memory API server for the `cluster.eks.amazonaws.com` group, with
/// failure injection. Implements create, get, list, replace, merge patch
/// (including the status subresource) and delete.
#[derive(Clone, Default)]
pub struct FakeApiServer {
    store: Arc<Mutex<Store>>,
}

impl FakeApiServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a kube Client talking to this server
    pub fn into_client(self) -> Client {
        Client::new(self, "default")
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Store> {
        self.store.lock().unwrap()
    }

    /// Mutating requests received so far
    pub fn writes(&self) -> usize {
        self.lock().writes
    }

    pub fn reset_writes(&self) {
        self.lock().writes = 0;
    }

    /// List requests received so far, one per reconcile cycle that prunes
    pub fn lists(&self) -> usize {
        self.lock().lists
    }

    /// Sorted names of the stored objects of one kind in a namespace
    pub fn names(&self, plural: &str, namespace: &str) -> Vec<String> {
        self.lock()
            .objects
            .keys()
            .filter(|(p, ns, _)| p == plural && ns == namespace)
            .map(|(_, _, name)| name.clone())
            .collect()
    }

    /// Reject every create of `name` with a 422
    pub fn reject_create(&self, name: &str, message: &str) {
        self.lock()
            .rejected
            .insert(name.to_string(), message.to_string());
    }

    /// On the next create of `name`, store the object as if another writer
    /// got there first (with a provisioner status already set) and answer 409
    pub fn race_create(&self, name: &str) {
        self.lock().racing.insert(name.to_string());
    }

    /// Set `metadata.deletionTimestamp`, as the API server does for an object
    /// held back by finalizers
    pub fn mark_deleting(&self, plural: &str, namespace: &str, name: &str) {
        let key = (plural.to_string(), namespace.to_string(), name.to_string());
        if let Some(obj) = self.lock().objects.get_mut(&key) {
            obj["metadata"]["deletionTimestamp"] = json!("2026-01-01T00:00:00Z");
        }
    }

    /// Answer the next `times` replaces of `name` with a 409 Conflict
    pub fn conflict_on_update(&self, name: &str, times: u32) {
        self.lock().conflicts.insert(name.to_string(), times);
    }

    /// Answer every request for `plural` with a 503
    pub fn set_unavailable(&self, plural: &str, unavailable: bool) {
        let mut store = self.lock();
        if unavailable {
            store.unavailable.insert(plural.to_string());
        } else {
            store.unavailable.remove(plural);
        }
    }

    /// Drop every object of one kind without going through the API
    pub fn remove_all(&self, plural: &str) {
        self.lock().objects.retain(|(p, _, _), _| p != plural);
    }

    fn handle(&self, method: &Method, path: &str, query: Option<&str>, body: &Bytes) -> Response<Body> {
        let Some(target) = Target::parse(path) else {
            return status_response(404, "NotFound", format!("no route for {}", path));
        };

        let mut store = self.lock();
        if method.as_str() != "GET" {
            store.writes += 1;
        }
        if store.unavailable.contains(&target.plural) {
            return status_response(503, "ServiceUnavailable", "the server is currently unable to handle the request");
        }

        let parsed: Value = if body.is_empty() {
            Value::Null
        } else {
            match serde_json::from_slice(body) {
                Ok(v) => v,
                Err(e) => return status_response(400, "BadRequest", e.to_string()),
            }
        };

        match (method.as_str(), target.name.clone()) {
            ("GET", None) => {
                store.lists += 1;
                list(&store, &target, query)
            }
            ("GET", Some(name)) => match store.objects.get(&target.key(&name)) {
                Some(obj) => json_response(200, obj),
                None => not_found(&target, &name),
            },
            ("POST", None) => create(&mut store, &target, parsed),
            ("PUT", Some(name)) => replace(&mut store, &target, &name, parsed),
            ("PATCH", Some(name)) => patch(&mut store, &target, &name, &parsed),
            ("DELETE", Some(name)) => match store.objects.remove(&target.key(&name)) {
                Some(obj) => json_response(200, &obj),
                None => not_found(&target, &name),
            },
            _ => status_response(405, "MethodNotAllowed", format!("{} {}", method, path)),
        }
    }
}

fn not_found(target: &Target, name: &str) -> Response<Body> {
    status_response(
        404,
        "NotFound",
        format!("{}.cluster.eks.amazonaws.com \"{}\" not found", target.plural, name),
    )
}

fn list(store: &Store, target: &Target, query: Option<&str>) -> Response<Body> {
    let selector = query.and_then(|q| {
        url::form_urlencoded::parse(q.as_bytes())
            .find(|(k, _)| k == "labelSelector")
            .map(|(_, v)| v.into_owned())
    });
    let items: Vec<Value> = store
        .objects
        .iter()
        .filter(|((p, ns, _), _)| *p == target.plural && *ns == target.namespace)
        .filter(|(_, obj)| matches_selector(obj, selector.as_deref()))
        .map(|(_, obj)| obj.clone())
        .collect();

    json_response(
        200,
        &json!({
            "apiVersion": API_VERSION,
            "kind": format!("{}List", kind_of(&target.plural)),
            "metadata": { "resourceVersion": store.resource_version.to_string() },
            "items": items
        }),
    )
}

fn create(store: &mut Store, target: &Target, mut obj: Value) -> Response<Body> {
    let Some(name) = obj["metadata"]["name"].as_str().map(str::to_string) else {
        return status_response(422, "Invalid", "metadata.name: Required value");
    };
    if store.racing.remove(&name) {
        let mut theirs = obj.clone();
        stamp(store, target, &mut theirs);
        theirs["status"] = json!({ "status": "Creating" });
        store.objects.insert(target.key(&name), theirs);
    }
    if store.objects.contains_key(&target.key(&name)) {
        return status_response(
            409,
            "AlreadyExists",
            format!("{}.cluster.eks.amazonaws.com \"{}\" already exists", target.plural, name),
        );
    }
    if let Some(message) = store.rejected.get(&name) {
        return status_response(422, "Invalid", message.clone());
    }

    stamp(store, target, &mut obj);
    if let Value::Object(map) = &mut obj {
        map.remove("status");
    }

    store.objects.insert(target.key(&name), obj.clone());
    json_response(201, &obj)
}

/// Fill in the server-owned fields of a newly created object.
fn stamp(store: &mut Store, target: &Target, obj: &mut Value) {
    store.next_uid += 1;
    let uid = format!("uid-{}", store.next_uid);
    let rv = store.bump();
    obj["apiVersion"] = json!(API_VERSION);
    obj["kind"] = json!(kind_of(&target.plural));
    obj["metadata"]["namespace"] = json!(target.namespace);
    obj["metadata"]["uid"] = json!(uid);
    obj["metadata"]["resourceVersion"] = json!(rv);
    obj["metadata"]["generation"] = json!(1);
}

fn replace(store: &mut Store, target: &Target, name: &str, mut obj: Value) -> Response<Body> {
    let Some(stored) = store.objects.get(&target.key(name)).cloned() else {
        return not_found(target, name);
    };
    if let Some(remaining) = store.conflicts.get_mut(name).filter(|n| **n > 0) {
        *remaining -= 1;
        return conflict(target, name);
    }
    if obj["metadata"]["resourceVersion"] != stored["metadata"]["resourceVersion"] {
        return conflict(target, name);
    }

    let generation = stored["metadata"]["generation"].as_i64().unwrap_or(1);
    let generation = if obj["spec"] != stored["spec"] {
        generation + 1
    } else {
        generation
    };
    obj["metadata"]["uid"] = stored["metadata"]["uid"].clone();
    obj["metadata"]["resourceVersion"] = json!(store.bump());
    obj["metadata"]["generation"] = json!(generation);
    obj["status"] = stored["status"].clone();
    if obj["status"].is_null() {
        if let Value::Object(map) = &mut obj {
            map.remove("status");
        }
    }

    store.objects.insert(target.key(name), obj.clone());
    json_response(200, &obj)
}

fn patch(store: &mut Store, target: &Target, name: &str, patch: &Value) -> Response<Body> {
    let Some(mut obj) = store.objects.get(&target.key(name)).cloned() else {
        return not_found(target, name);
    };

    let mut patch = patch.clone();
    match target.subresource.as_deref() {
        Some("status") => patch = json!({ "status": patch["status"].clone() }),
        _ => {
            if let Value::Object(map) = &mut patch {
                map.remove("status");
            }
        }
    }

    let spec_before = obj["spec"].clone();
    merge_patch(&mut obj, &patch);
    if obj["spec"] != spec_before {
        let generation = obj["metadata"]["generation"].as_i64().unwrap_or(1) + 1;
        obj["metadata"]["generation"] = json!(generation);
    }
    obj["metadata"]["resourceVersion"] = json!(store.bump());

    store.objects.insert(target.key(name), obj.clone());
    json_response(200, &obj)
}

fn conflict(target: &Target, name: &str) -> Response<Body> {
    status_response(
        409,
        "Conflict",
        format!(
            "Operation cannot be fulfilled on {}.cluster.eks.amazonaws.com \"{}\": the object has been modified",
            target.plural, name
        ),
    )
}

impl Service<Request<Body>> for FakeApiServer {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let server = self.clone();
        Box::pin(async move {
            let (parts, body) = req.into_parts();
            let body = body.collect().await?.to_bytes();
            Ok(server.handle(&parts.method, parts.uri.path(), parts.uri.query(), &body))
        })
    }
}

/// EKS resource `name` in `default` with `node_groups` default node groups.
pub fn make_eks(name: &str, node_groups: usize) -> EKS {
    let mut eks = EKS::new(
        name,
        EKSSpec {
            account_id: "1234foo".to_string(),
            region: Some("eu-west-1".to_string()),
            cross_account_role_name: None,
            control_plane: ControlPlaneTemplate {
                cluster_name: "cluster-stuff".to_string(),
                stack_name: "stack-stuff".to_string(),
                version: None,
            },
            node_groups: vec![NodeGroupTemplate::default(); node_groups],
        },
    );
    eks.metadata.namespace = Some("default".to_string());
    eks
}

/// Act as the provisioner and report `value` in `status.status` of a child.
pub async fn set_child_status(client: &Client, plural: &str, name: &str, value: &str) {
    let patch = Patch::Merge(json!({ "status": { "status": value } }));
    let params = PatchParams::default();
    match plural {
        CONTROL_PLANES => {
            let api: Api<ControlPlane> = Api::namespaced(client.clone(), "default");
            api.patch_status(name, &params, &patch).await.unwrap();
        }
        NODE_GROUPS => {
            let api: Api<NodeGroup> = Api::namespaced(client.clone(), "default");
            api.patch_status(name, &params, &patch).await.unwrap();
        }
        other => panic!("no child kind {}", other),
    }
}
