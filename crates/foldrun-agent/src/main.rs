//! foldrun: remote Chai-1 folding with local scoring and model selection.
//! Entry point for the foldrun binary.

mod cli;
mod config;

use std::sync::Arc;

use clap::Parser;
use foldrun_core::collector::CandidateRow;
use foldrun_core::config::InferenceConfig;
use foldrun_core::events::{self, EventSender};
use foldrun_core::fetch::DependencyFetcher;
use foldrun_core::inference::RemoteInference;
use foldrun_core::pipeline::FoldingPipeline;
use foldrun_core::store::{ArtifactStore, LocalStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, ConfigArgs};
use config::Config;

fn build_pipeline(config: &Config, events: Option<EventSender>) -> anyhow::Result<FoldingPipeline> {
    let models: Arc<dyn ArtifactStore> = Arc::new(LocalStore::new(&config.storage.models_dir));
    let inputs: Arc<dyn ArtifactStore> = Arc::new(LocalStore::new(&config.storage.inputs_dir));
    let results: Arc<dyn ArtifactStore> = Arc::new(LocalStore::new(&config.storage.results_dir));

    let fetcher = DependencyFetcher::new(models)?.with_base_url(config.dependencies.base_url.clone());

    let api_key = config.inference.resolve_api_key();
    if api_key.is_none() {
        tracing::warn!(
            "No inference API key configured (set inference.api_key or FOLDRUN_INFERENCE_API_KEY)"
        );
    }
    let backend = RemoteInference::new(config.inference.endpoint.clone())
        .with_api_key(api_key)
        .with_timeout(config.inference.timeout())
        .with_expected_samples(config.inference.expected_samples);

    let mut pipeline = FoldingPipeline::new(inputs, results, Arc::new(fetcher), Arc::new(backend))
        .with_force_redownload(config.dependencies.force_redownload)
        .with_scores_to_print(config.display.scores_to_print.clone());
    if let Some(tx) = events {
        pipeline = pipeline.with_events(tx);
    }
    Ok(pipeline)
}

fn print_table(rows: &[CandidateRow], clashing: &[usize]) {
    println!("{:>4}  {:>5}  {:>15}  {:>7}  {:>7}  {}", "rank", "model", "aggregate_score", "ptm", "iptm", "structure");
    for (rank, row) in rows.iter().enumerate() {
        println!(
            "{:>4}  {:>5}  {:>15.4}  {:>7.4}  {:>7.4}  {}",
            rank + 1,
            row.model_idx,
            row.aggregate_score,
            row.ptm,
            row.iptm,
            row.structure_file
        );
    }
    if !clashing.is_empty() {
        println!("excluded for inter-chain clashes: {clashing:?}");
    }
}

async fn serve(config: &Config, bind: Option<String>) -> anyhow::Result<()> {
    let (event_tx, _) = events::channel();
    let pipeline = Arc::new(build_pipeline(config, Some(event_tx.clone()))?);
    let results = pipeline.results().clone();

    let registry = foldrun_web::tools::build_default_registry(pipeline, config.display.number_of_scores);
    info!("✅ Tool registry ready");

    let state = foldrun_web::state::AppState::new(registry, results, event_tx);
    let router = foldrun_web::router::build_router(state);

    let bind_addr = bind
        .or_else(|| std::env::var("FOLDRUN_BIND").ok())
        .unwrap_or_else(|| config.server.bind.clone());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("🌐 foldrun listening on http://{}", bind_addr);
    info!("   Health:  /health");
    info!("   Tools:   /api/tools");
    info!("   Events:  /api/events");
    info!("🧬 foldrun ready. Press Ctrl+C to stop.");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;
    Ok(())
}

fn inference_config(args: &ConfigArgs) -> foldrun_core::Result<InferenceConfig> {
    InferenceConfig::new(
        args.num_trunk_recycles,
        args.num_diffn_timesteps,
        args.seed,
        !args.no_esm,
        args.msa_server,
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialise structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("foldrun=debug,foldrun_core=debug,foldrun_web=debug,info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    match cli.command.unwrap_or(Commands::Serve { bind: None }) {
        Commands::Serve { bind } => serve(&config, bind).await?,

        Commands::Fold(args) => {
            let pipeline = build_pipeline(&config, None)?
                .with_force_redownload(config.dependencies.force_redownload || args.force_redownload);
            let outcome = pipeline
                .compute(args.fasta.as_deref(), args.inference_config.as_deref())
                .await?;

            println!("run {}", outcome.run_id);
            print_table(&outcome.ranked, &outcome.clashing);
            match (outcome.best, outcome.structure_path) {
                (Some(best), Some(path)) => println!(
                    "best model {} (aggregate_score {:.4}): {}",
                    best.model_idx,
                    best.aggregate_score,
                    path.display()
                ),
                _ => println!("no usable model: every candidate has inter-chain clashes"),
            }
        }

        Commands::Fetch { force } => {
            let pipeline = build_pipeline(&config, None)?;
            let report = pipeline
                .ensure_dependencies(force || config.dependencies.force_redownload)
                .await?;
            println!(
                "downloaded {} asset(s), {} already present",
                report.downloaded.len(),
                report.skipped.len()
            );
        }

        Commands::Best { run_id, number_of_scores } => {
            let pipeline = build_pipeline(&config, None)?;
            let selection = pipeline
                .select_best_model(&run_id, number_of_scores.unwrap_or(config.display.number_of_scores))
                .await?;
            print_table(&selection.ranked, &selection.clashing);
            match selection.best {
                Some(best) => println!("best model {} (aggregate_score {:.4})", best.model_idx, best.aggregate_score),
                None => println!("no usable model: every candidate has inter-chain clashes"),
            }
        }

        Commands::Fasta { sequence, name } => {
            let pipeline = build_pipeline(&config, None)?;
            let file_name = pipeline.create_fasta_file(&sequence, name.as_deref()).await?;
            println!("{file_name}");
        }

        Commands::Config(args) => {
            let pipeline = build_pipeline(&config, None)?;
            let file_name = pipeline.create_json_config(&inference_config(&args)?).await?;
            println!("{file_name}");
        }
    }

    Ok(())
}
