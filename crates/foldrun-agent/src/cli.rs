use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "foldrun - fold protein sequences with Chai-1 on a remote GPU and pick the best model"
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to foldrun.toml
    #[arg(short, long, global = true, value_name = "PATH", env = "FOLDRUN_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server (default).
    Serve {
        /// Listen address, overriding FOLDRUN_BIND and the config file.
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,
    },
    /// Fold a FASTA input and report the ranked candidates.
    Fold(FoldArgs),
    /// Download the model weights.
    Fetch {
        /// Re-download assets that are already present.
        #[arg(long)]
        force: bool,
    },
    /// Re-rank an earlier run from its score files.
    Best {
        /// Eight-character run id.
        run_id: String,
        /// Number of candidates to read.
        #[arg(short, long, value_name = "INT")]
        number_of_scores: Option<usize>,
    },
    /// Store a sequence as a FASTA input file.
    Fasta {
        /// Raw sequence or FASTA text; empty stores the example protein.
        #[arg(default_value = "")]
        sequence: String,
        /// Record name used when a header has to be added.
        #[arg(long)]
        name: Option<String>,
    },
    /// Store inference settings as a JSON config file.
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
pub struct FoldArgs {
    /// File name under inputs/fasta; the default input when omitted.
    #[arg(long, value_name = "FILE")]
    pub fasta: Option<String>,

    /// File name under inputs/config; the default config when omitted.
    #[arg(long = "inference-config", value_name = "FILE")]
    pub inference_config: Option<String>,

    /// Re-download the model weights before folding.
    #[arg(long)]
    pub force_redownload: bool,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[arg(long, default_value_t = 200, value_name = "INT")]
    pub num_diffn_timesteps: u32,

    #[arg(long, default_value_t = 3, value_name = "INT")]
    pub num_trunk_recycles: u32,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Disable ESM embeddings.
    #[arg(long)]
    pub no_esm: bool,

    /// Query the MSA server.
    #[arg(long)]
    pub msa_server: bool,
}
