//! In-memory emulation of a slice of the ONTAP REST API.
//!
//! Serves the cluster singleton, the volume collection and the job endpoint
//! under `/api`, behind basic authentication. Mutations complete through
//! asynchronous jobs the way a real cluster answers them: `202 Accepted`
//! with a job reference that is later polled at `/api/cluster/jobs/{uuid}`.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use base64::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;
use uuid::Uuid;

pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "netapp1!";
pub const CLUSTER_NAME: &str = "cluster1";

/// ONTAP error codes returned by the emulated endpoints.
pub mod codes {
    pub const ENTRY_NOT_FOUND: &str = "4";
    pub const MISSING_FIELD: &str = "262179";
    pub const DUPLICATE_VOLUME: &str = "917835";
    pub const SIZE_TOO_SMALL: i64 = 917536;
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SvmRef {
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Volume {
    pub uuid: Uuid,
    pub name: String,
    pub svm: SvmRef,
    pub size: u64,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Deserialize)]
struct CreateVolume {
    name: String,
    svm: SvmRef,
    #[serde(default = "default_size")]
    size: u64,
    comment: Option<String>,
}

fn default_size() -> u64 {
    20 * 1024 * 1024
}

#[derive(Deserialize)]
struct UpdateVolume {
    size: Option<u64>,
    state: Option<String>,
    comment: Option<String>,
}

#[derive(Default)]
pub struct Cluster {
    volumes: BTreeMap<Uuid, Volume>,
    jobs: HashMap<Uuid, Value>,
}

pub type Db = Arc<RwLock<Cluster>>;

pub fn app() -> Router {
    let db: Db = Arc::default();
    Router::new()
        .route("/api/cluster", get(get_cluster))
        .route("/api/cluster/jobs/{uuid}", get(get_job))
        .route("/api/storage/volumes", get(list_volumes).post(create_volume))
        .route(
            "/api/storage/volumes/{uuid}",
            get(get_volume).patch(update_volume).delete(delete_volume),
        )
        .layer(middleware::from_fn(require_basic_auth))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// The `Authorization` header value the server accepts.
pub fn expected_authorization() -> String {
    format!("Basic {}", BASE64_STANDARD.encode(format!("{USERNAME}:{PASSWORD}")))
}

/// Bad credentials get a bare 401 with no body, as ONTAP does.
async fn require_basic_auth(request: Request, next: Next) -> Response {
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .is_some_and(|value| value.as_bytes() == expected_authorization().as_bytes());
    if authorized {
        next.run(request).await
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

fn rest_error(status: StatusCode, code: &str, message: impl Into<String>, target: &str) -> Response {
    let body = json!({"error": {"code": code, "message": message.into(), "target": target}});
    (status, Json(body)).into_response()
}

fn not_found(uuid: &str) -> Response {
    rest_error(
        StatusCode::NOT_FOUND,
        codes::ENTRY_NOT_FOUND,
        "entry doesn't exist",
        uuid,
    )
}

fn links(href: String) -> Value {
    json!({"self": {"href": href}})
}

fn volume_record(volume: &Volume) -> Value {
    let mut record = serde_json::to_value(volume).unwrap_or_default();
    record["_links"] = links(format!("/api/storage/volumes/{}", volume.uuid));
    record
}

/// Keep only the requested top-level fields; key fields are always present.
fn project(record: Value, fields: Option<&String>) -> Value {
    match (record, fields) {
        (Value::Object(map), Some(fields)) => {
            let wanted: Vec<&str> = fields.split(',').collect();
            Value::Object(
                map.into_iter()
                    .filter(|(key, _)| {
                        matches!(key.as_str(), "uuid" | "name" | "_links")
                            || wanted.contains(&key.as_str())
                    })
                    .collect(),
            )
        }
        (record, _) => record,
    }
}

/// Record a job and return the reference ONTAP hands back for it.
fn start_job(
    cluster: &mut Cluster,
    description: String,
    failure: Option<(i64, String, &str)>,
) -> Value {
    let uuid = Uuid::new_v4();
    debug!(%uuid, failed = failure.is_some(), %description, "job recorded");
    let job = match failure {
        None => json!({
            "uuid": uuid,
            "state": "success",
            "code": 0,
            "message": "success",
            "description": description,
        }),
        Some((code, message, target)) => json!({
            "uuid": uuid,
            "state": "failure",
            "code": code,
            "message": message,
            "error": {"code": code.to_string(), "message": message, "target": target},
            "description": description,
        }),
    };
    cluster.jobs.insert(uuid, job);
    json!({"uuid": uuid, "_links": links(format!("/api/cluster/jobs/{uuid}"))})
}

async fn get_cluster() -> Json<Value> {
    Json(json!({
        "name": CLUSTER_NAME,
        "uuid": "2115008a-92cd-11ed-8f2b-005056b3357c",
        "version": {
            "full": "NetApp Release 9.14.1",
            "generation": 9,
            "major": 14,
            "minor": 1
        },
        "_links": links("/api/cluster".to_string()),
    }))
}

async fn get_job(State(db): State<Db>, Path(uuid): Path<String>) -> Response {
    let cluster = db.read().await;
    let job = Uuid::parse_str(&uuid)
        .ok()
        .and_then(|id| cluster.jobs.get(&id).cloned());
    match job {
        Some(mut job) => {
            job["_links"] = links(format!("/api/cluster/jobs/{uuid}"));
            Json(job).into_response()
        }
        None => not_found(&uuid),
    }
}

async fn list_volumes(
    State(db): State<Db>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let cluster = db.read().await;
    let records: Vec<Value> = cluster
        .volumes
        .values()
        .filter(|volume| params.get("name").map_or(true, |name| &volume.name == name))
        .filter(|volume| params.get("svm.name").map_or(true, |svm| &volume.svm.name == svm))
        .map(|volume| project(volume_record(volume), params.get("fields")))
        .collect();
    Json(json!({
        "records": records,
        "num_records": records.len(),
        "_links": links("/api/storage/volumes".to_string()),
    }))
}

async fn create_volume(
    State(db): State<Db>,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    let input: CreateVolume = match serde_json::from_value(body) {
        Ok(input) => input,
        Err(e) => {
            return rest_error(
                StatusCode::BAD_REQUEST,
                codes::MISSING_FIELD,
                e.to_string(),
                "",
            )
        }
    };

    let mut cluster = db.write().await;
    if cluster
        .volumes
        .values()
        .any(|volume| volume.name == input.name && volume.svm == input.svm)
    {
        return rest_error(
            StatusCode::CONFLICT,
            codes::DUPLICATE_VOLUME,
            format!("Duplicate volume name {}", input.name),
            "name",
        );
    }

    let volume = Volume {
        uuid: Uuid::new_v4(),
        name: input.name,
        svm: input.svm,
        size: input.size,
        state: "online".to_string(),
        comment: input.comment,
    };
    let job = start_job(&mut cluster, format!("POST /api/storage/volumes/{}", volume.uuid), None);
    let mut body = json!({"job": job});
    if params.get("return_records").map(String::as_str) == Some("true") {
        body["num_records"] = json!(1);
        body["records"] = json!([volume_record(&volume)]);
    }
    cluster.volumes.insert(volume.uuid, volume);
    (StatusCode::ACCEPTED, Json(body)).into_response()
}

async fn get_volume(State(db): State<Db>, Path(uuid): Path<String>) -> Response {
    let cluster = db.read().await;
    match Uuid::parse_str(&uuid)
        .ok()
        .and_then(|id| cluster.volumes.get(&id))
    {
        Some(volume) => Json(volume_record(volume)).into_response(),
        None => not_found(&uuid),
    }
}

/// A size of zero is accepted but fails in the resulting job.
async fn update_volume(
    State(db): State<Db>,
    Path(uuid): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let input: UpdateVolume = match serde_json::from_value(body) {
        Ok(input) => input,
        Err(e) => {
            return rest_error(
                StatusCode::BAD_REQUEST,
                codes::MISSING_FIELD,
                e.to_string(),
                "",
            )
        }
    };

    let Ok(id) = Uuid::parse_str(&uuid) else {
        return not_found(&uuid);
    };
    let mut cluster = db.write().await;
    let Some(volume) = cluster.volumes.get_mut(&id) else {
        return not_found(&uuid);
    };

    let mut failure = None;
    match input.size {
        Some(0) => {
            failure = Some((
                codes::SIZE_TOO_SMALL,
                "Requested size is too small".to_string(),
                "size",
            ))
        }
        Some(size) => volume.size = size,
        None => {}
    }
    if failure.is_none() {
        if let Some(state) = input.state {
            volume.state = state;
        }
        if let Some(comment) = input.comment {
            volume.comment = Some(comment);
        }
    }

    let job = start_job(&mut cluster, format!("PATCH /api/storage/volumes/{uuid}"), failure);
    (StatusCode::ACCEPTED, Json(json!({"job": job}))).into_response()
}

async fn delete_volume(State(db): State<Db>, Path(uuid): Path<String>) -> Response {
    let mut cluster = db.write().await;
    let removed = Uuid::parse_str(&uuid)
        .ok()
        .and_then(|id| cluster.volumes.remove(&id));
    if removed.is_none() {
        return not_found(&uuid);
    }
    let job = start_job(&mut cluster, format!("DELETE /api/storage/volumes/{uuid}"), None);
    (StatusCode::ACCEPTED, Json(json!({"job": job}))).into_response()
}
