//! End-to-end folding runs with in-process stand-ins for the remote side.

mod common;

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use foldrun_core::config::InferenceConfig;
use foldrun_core::convert::StructureConverter;
use foldrun_core::events::{self, PipelineEvent};
use foldrun_core::fetch::{DependencyProvisioner, FetchReport};
use foldrun_core::inference::{InferenceBackend, InferenceRequest, RawCandidate};
use foldrun_core::pipeline::FoldingPipeline;
use foldrun_core::scores::ScoreBundle;
use foldrun_core::sequence::EXAMPLE_FASTA;
use foldrun_core::store::{ArtifactStore, LocalStore};
use foldrun_core::{FoldError, Result};

#[derive(Default)]
struct StubProvisioner {
    calls: Mutex<Vec<bool>>,
}

#[async_trait]
impl DependencyProvisioner for StubProvisioner {
    async fn ensure(&self, force: bool) -> Result<FetchReport> {
        self.calls.lock().await.push(force);
        Ok(FetchReport::default())
    }
}

/// Returns one candidate per `(aggregate_score, clash)` pair.
struct StubBackend {
    batch: Vec<(f64, bool)>,
    requests: Mutex<Vec<InferenceRequest>>,
}

impl StubBackend {
    fn new(batch: Vec<(f64, bool)>) -> Self {
        Self { batch, requests: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl InferenceBackend for StubBackend {
    async fn fold(&self, request: &InferenceRequest) -> Result<Vec<RawCandidate>> {
        self.requests.lock().await.push(request.clone());
        self.batch
            .iter()
            .enumerate()
            .map(|(i, &(score, clash))| -> Result<RawCandidate> {
                Ok(RawCandidate {
                    scores: ScoreBundle::new(score, 0.5, 0.5, clash).to_npz()?,
                    structure: format!("data_model_{i}\n"),
                })
            })
            .collect()
    }
}

#[derive(Default)]
struct StubConverter {
    calls: AtomicUsize,
}

impl StructureConverter for StubConverter {
    fn convert(&self, source: &Path, target: &Path) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let cif = std::fs::read_to_string(source)?;
        std::fs::write(target, format!("REMARK converted from {}END\n", cif))?;
        Ok(())
    }
}

struct Harness {
    _inputs_dir: tempfile::TempDir,
    _results_dir: tempfile::TempDir,
    inputs: Arc<LocalStore>,
    provisioner: Arc<StubProvisioner>,
    backend: Arc<StubBackend>,
    converter: Arc<StubConverter>,
    pipeline: FoldingPipeline,
}

fn harness(batch: Vec<(f64, bool)>) -> Harness {
    let inputs_dir = tempfile::tempdir().unwrap();
    let results_dir = tempfile::tempdir().unwrap();
    let inputs = Arc::new(LocalStore::new(inputs_dir.path()));
    let results = Arc::new(LocalStore::new(results_dir.path()));
    let provisioner = Arc::new(StubProvisioner::default());
    let backend = Arc::new(StubBackend::new(batch));
    let converter = Arc::new(StubConverter::default());

    let pipeline = FoldingPipeline::new(inputs.clone(), results, provisioner.clone(), backend.clone())
        .with_converter(converter.clone());

    Harness {
        _inputs_dir: inputs_dir,
        _results_dir: results_dir,
        inputs,
        provisioner,
        backend,
        converter,
        pipeline,
    }
}

fn typical_batch() -> Vec<(f64, bool)> {
    vec![(0.8, false), (0.6, false), (0.95, false), (0.99, true), (0.4, false)]
}

#[tokio::test]
async fn test_defaults_fold_example_and_pick_best() {
    let h = harness(typical_batch());

    let outcome = h.pipeline.compute(None, None).await.unwrap();

    let order: Vec<usize> = outcome.ranked.iter().map(|r| r.model_idx).collect();
    assert_eq!(order, vec![2, 0, 1, 4]);
    assert_eq!(outcome.clashing, vec![3]);
    let best = outcome.best.unwrap();
    assert_eq!(best.model_idx, 2);
    assert_eq!(best.aggregate_score, 0.95);

    let pdb = outcome.structure_path.unwrap();
    let expected = format!("{}-preds.model_idx_2.pdb", outcome.run_id);
    assert_eq!(pdb.file_name().unwrap().to_str().unwrap(), expected);
    assert!(std::fs::read_to_string(&pdb).unwrap().contains("data_model_2"));
    assert_eq!(h.converter.calls.load(Ordering::SeqCst), 1);

    let requests = h.backend.requests.lock().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].fasta_content, EXAMPLE_FASTA);
    assert_eq!(requests[0].inference_config, InferenceConfig::default());
    assert_eq!(requests[0].run_id, outcome.run_id);
    assert_eq!(*h.provisioner.calls.lock().await, vec![false]);
}

#[tokio::test]
async fn test_default_files_on_disk_are_preferred() {
    let h = harness(typical_batch());
    h.inputs
        .write("fasta/default_input.fasta", b">protein|name=ubq\nMQIFVKTLTG")
        .await
        .unwrap();
    let config = InferenceConfig::new(2, 50, 7, false, false).unwrap();
    h.inputs
        .write("config/quick_inference.json", &serde_json::to_vec(&config).unwrap())
        .await
        .unwrap();

    h.pipeline.compute(Some(""), Some("  ")).await.unwrap();

    let requests = h.backend.requests.lock().await;
    assert_eq!(requests[0].fasta_content, ">protein|name=ubq\nMQIFVKTLTG");
    assert_eq!(requests[0].inference_config, config);
}

#[tokio::test]
async fn test_created_inputs_are_used() {
    let h = harness(typical_batch());
    let fasta = h.pipeline.create_fasta_file("MKTAYIAKQR", Some("lysozyme")).await.unwrap();
    let config = InferenceConfig::from_options(100, 1, 3, &["MSA_server"]).unwrap();
    let config_file = h.pipeline.create_json_config(&config).await.unwrap();

    h.pipeline.compute(Some(&fasta), Some(&config_file)).await.unwrap();

    let requests = h.backend.requests.lock().await;
    assert_eq!(requests[0].fasta_content, ">lysozyme\nMKTAYIAKQR");
    assert!(requests[0].inference_config.use_msa_server);
    assert_eq!(requests[0].inference_config.num_diffn_timesteps, 100);
}

#[tokio::test]
async fn test_missing_named_fasta_fails_before_inference() {
    let h = harness(typical_batch());
    let (tx, mut rx) = events::channel();
    let pipeline = h.pipeline.with_events(tx);

    let err = pipeline.compute(Some("nope.fasta"), None).await.unwrap_err();
    assert!(matches!(err, FoldError::InputNotFound(ref key) if key == "fasta/nope.fasta"));
    assert!(h.backend.requests.lock().await.is_empty());

    let mut failed = false;
    while let Ok(event) = rx.try_recv() {
        if let PipelineEvent::RunFailed { run_id, error } = event {
            assert!(run_id.is_none());
            assert!(error.contains("nope.fasta"));
            failed = true;
        }
    }
    assert!(failed);
}

#[tokio::test]
async fn test_missing_named_config_fails_before_inference() {
    let h = harness(typical_batch());

    let err = h.pipeline.compute(None, Some("missing.json")).await.unwrap_err();
    assert!(matches!(err, FoldError::InputNotFound(_)));
    assert!(h.backend.requests.lock().await.is_empty());
}

#[tokio::test]
async fn test_all_clashing_yields_no_structure() {
    let h = harness(vec![(0.9, true); 5]);

    let outcome = h.pipeline.compute(None, None).await.unwrap();
    assert!(outcome.ranked.is_empty());
    assert_eq!(outcome.clashing, vec![0, 1, 2, 3, 4]);
    assert!(outcome.best.is_none());
    assert!(outcome.structure_path.is_none());
    assert_eq!(h.converter.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_force_flag_reaches_provisioner() {
    let h = harness(typical_batch());
    let pipeline = h.pipeline.with_force_redownload(true);

    pipeline.compute(None, None).await.unwrap();
    assert_eq!(*h.provisioner.calls.lock().await, vec![true]);
}

#[tokio::test]
async fn test_events_follow_run() {
    let h = harness(typical_batch());
    let (tx, mut rx) = events::channel();
    let pipeline = h.pipeline.with_events(tx);

    let outcome = pipeline.compute(None, None).await.unwrap();

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        kinds.push(serde_json::to_value(&event).unwrap()["type"].as_str().unwrap().to_string());
    }
    assert_eq!(kinds.first().map(String::as_str), Some("dependencies_ready"));
    assert_eq!(kinds.iter().filter(|k| *k == "candidate_scored").count(), 4);
    assert_eq!(kinds.iter().filter(|k| *k == "candidate_excluded").count(), 1);
    assert!(kinds.contains(&"best_model_selected".to_string()));
    assert_eq!(kinds.last().map(String::as_str), Some("run_completed"));
    assert!(outcome.best.is_some());
}

#[tokio::test]
async fn test_best_model_reselected_from_disk() {
    let h = harness(typical_batch());
    let outcome = h.pipeline.compute(None, None).await.unwrap();

    let selection = h
        .pipeline
        .select_best_model(outcome.run_id.as_str(), 5)
        .await
        .unwrap();
    assert_eq!(selection.best, outcome.best);
    assert_eq!(selection.clashing, vec![3]);

    let err = h.pipeline.select_best_model("not-an-id", 5).await.unwrap_err();
    assert!(matches!(err, FoldError::InvalidInput(_)));
}

struct FailingConverter;

impl StructureConverter for FailingConverter {
    fn convert(&self, _source: &Path, _target: &Path) -> Result<()> {
        Err(FoldError::Conversion("unreadable mmCIF".to_string()))
    }
}

#[tokio::test]
async fn test_failure_after_start_names_the_run() {
    let h = harness(typical_batch());
    let (tx, mut rx) = events::channel();
    let pipeline = h.pipeline.with_converter(Arc::new(FailingConverter)).with_events(tx);

    let err = pipeline.compute(None, None).await.unwrap_err();
    assert!(matches!(err, FoldError::Conversion(_)));

    let mut started = None;
    let mut failed = None;
    while let Ok(event) = rx.try_recv() {
        match event {
            PipelineEvent::RunStarted { run_id, .. } => started = Some(run_id),
            PipelineEvent::RunFailed { run_id, error } => {
                assert!(error.contains("unreadable mmCIF"));
                failed = run_id;
            }
            _ => {}
        }
    }
    assert!(started.is_some());
    assert_eq!(failed, started);
}
