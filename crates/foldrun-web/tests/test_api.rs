//! HTTP surface driven through the router without a socket.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tokio_stream::StreamExt;
use tower::ServiceExt;

use foldrun_core::convert::StructureConverter;
use foldrun_core::events::{self, EventSender, PipelineEvent};
use foldrun_core::fetch::{DependencyProvisioner, FetchReport};
use foldrun_core::inference::{InferenceBackend, InferenceRequest, RawCandidate};
use foldrun_core::pipeline::FoldingPipeline;
use foldrun_core::scores::ScoreBundle;
use foldrun_core::store::LocalStore;
use foldrun_web::router::build_router;
use foldrun_web::state::AppState;
use foldrun_web::tools::build_default_registry;

struct ReadyDependencies;

#[async_trait]
impl DependencyProvisioner for ReadyDependencies {
    async fn ensure(&self, _force: bool) -> foldrun_core::Result<FetchReport> {
        Ok(FetchReport {
            downloaded: Vec::new(),
            skipped: vec!["conformers_v1.apkl".to_string()],
        })
    }
}

struct FixedBackend {
    batch: Vec<(f64, bool)>,
}

#[async_trait]
impl InferenceBackend for FixedBackend {
    async fn fold(&self, _request: &InferenceRequest) -> foldrun_core::Result<Vec<RawCandidate>> {
        self.batch
            .iter()
            .enumerate()
            .map(|(i, &(score, clash))| -> foldrun_core::Result<RawCandidate> {
                Ok(RawCandidate {
                    scores: ScoreBundle::new(score, 0.7, 0.6, clash).to_npz()?,
                    structure: format!("data_model_{i}\n"),
                })
            })
            .collect()
    }
}

struct CopyConverter;

impl StructureConverter for CopyConverter {
    fn convert(&self, source: &Path, target: &Path) -> foldrun_core::Result<()> {
        std::fs::copy(source, target)?;
        Ok(())
    }
}

struct TestApp {
    _inputs: tempfile::TempDir,
    _results: tempfile::TempDir,
    router: Router,
    events: EventSender,
}

fn app(batch: Vec<(f64, bool)>) -> TestApp {
    let inputs_dir = tempfile::tempdir().unwrap();
    let results_dir = tempfile::tempdir().unwrap();
    let results = Arc::new(LocalStore::new(results_dir.path()));
    let (event_tx, _) = events::channel();

    let pipeline = FoldingPipeline::new(
        Arc::new(LocalStore::new(inputs_dir.path())),
        results.clone(),
        Arc::new(ReadyDependencies),
        Arc::new(FixedBackend { batch }),
    )
    .with_converter(Arc::new(CopyConverter))
    .with_events(event_tx.clone());

    let registry = build_default_registry(Arc::new(pipeline), 5);
    let router = build_router(AppState::new(registry, results, event_tx.clone()));
    TestApp {
        _inputs: inputs_dir,
        _results: results_dir,
        router,
        events: event_tx,
    }
}

fn default_batch() -> Vec<(f64, bool)> {
    vec![(0.8, false), (0.6, false), (0.95, false), (0.99, true), (0.4, false)]
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn call_tool(router: &Router, name: &str, params: Value) -> (StatusCode, Value) {
    let request = Request::post(format!("/api/tools/{name}"))
        .header("content-type", "application/json")
        .body(Body::from(params.to_string()))
        .unwrap();
    let (status, body) = send(router, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_health() {
    let app = app(default_batch());
    let (status, body) = send(&app.router, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["tools"], 5);
}

#[tokio::test]
async fn test_manifest_lists_every_tool() {
    let app = app(default_batch());
    let (status, body) = send(&app.router, Request::get("/api/tools").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);

    let body: Value = serde_json::from_slice(&body).unwrap();
    let names: Vec<&str> = body["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        vec![
            "compute_fold",
            "create_fasta_file",
            "create_json_config",
            "fetch_dependencies",
            "select_best_model"
        ]
    );
}

#[tokio::test]
async fn test_fold_round_trip_over_http() {
    let app = app(default_batch());

    let (status, fasta) = call_tool(&app.router, "create_fasta_file", json!({ "sequence": "MKTAYIAKQR" })).await;
    assert_eq!(status, StatusCode::OK);
    let fasta_file = fasta["fasta_file"].as_str().unwrap().to_string();
    assert!(fasta_file.starts_with("chai1_") && fasta_file.ends_with("_input.fasta"));

    let (status, config) = call_tool(
        &app.router,
        "create_json_config",
        json!({ "num_diffn_timesteps": 50, "num_trunk_recycles": 2, "seed": 1, "options": [] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(config["config"]["use_esm_embeddings"], false);
    let config_file = config["config_file"].as_str().unwrap().to_string();

    let (status, fold) = call_tool(
        &app.router,
        "compute_fold",
        json!({ "fasta_file": fasta_file, "config_file": config_file }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fold["best"]["model_idx"], 2);
    assert_eq!(fold["clashing"], json!([3]));
    let ranked: Vec<u64> = fold["ranked"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["model_idx"].as_u64().unwrap())
        .collect();
    assert_eq!(ranked, vec![2, 0, 1, 4]);

    let run_id = fold["run_id"].as_str().unwrap().to_string();
    let structure_file = fold["structure_file"].as_str().unwrap().to_string();
    assert_eq!(structure_file, format!("{run_id}-preds.model_idx_2.pdb"));

    let (status, text) = send(
        &app.router,
        Request::get(format!("/api/structures/{structure_file}")).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(text).unwrap(), "data_model_2\n");

    let (status, best) = call_tool(&app.router, "select_best_model", json!({ "run_id": run_id })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(best["best"]["model_idx"], 2);
}

#[tokio::test]
async fn test_all_clashing_reports_no_structure() {
    let app = app(vec![(0.5, true); 5]);
    let (status, fold) = call_tool(&app.router, "compute_fold", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert!(fold["best"].is_null());
    assert!(fold["structure_file"].is_null());
    assert!(fold["message"].as_str().unwrap().contains("no usable model"));
}

#[tokio::test]
async fn test_errors_map_to_statuses() {
    let app = app(default_batch());

    let (status, body) = call_tool(&app.router, "compute_fold", json!({ "fasta_file": "missing.fasta" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "error");

    let (status, _) = call_tool(&app.router, "create_json_config", json!({ "num_trunk_recycles": 9 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call_tool(&app.router, "select_best_model", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call_tool(&app.router, "launch_rockets", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("Unknown tool"));

    let (status, _) = send(
        &app.router,
        Request::get("/api/structures/notes.txt").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app.router,
        Request::get("/api/structures/00000000-preds.model_idx_0.pdb").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_events_stream_named_by_type() {
    let app = app(default_batch());
    let response = app
        .router
        .clone()
        .oneshot(Request::get("/api/events").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    app.events
        .send(PipelineEvent::RunStarted {
            run_id: "0a1b2c3d".to_string(),
            fasta_file: "<example>".to_string(),
        })
        .unwrap();

    let mut body = response.into_body().into_data_stream();
    let frame = tokio::time::timeout(std::time::Duration::from_secs(5), body.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let text = String::from_utf8(frame.to_vec()).unwrap();
    assert!(text.contains("event: run_started"));
    assert!(text.contains("\"run_id\":\"0a1b2c3d\""));
}
