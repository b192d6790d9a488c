use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use shuttle_core::partition::PartitionMode;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "shuttle")]
#[command(about = "Resumable, checkpointed batch file sync between storage backends")]
#[command(after_help = "Run '<command> --help' for detailed options on each command.")]
pub struct Cli {
    /// Override the configuration directory for this invocation
    #[arg(long, global = true, value_name = "PATH")]
    pub config_dir: Option<PathBuf>,
    /// Connections file (defaults to connections.toml in the config directory)
    #[arg(long, global = true, value_name = "FILE")]
    pub connections: Option<PathBuf>,
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the job's source and write its batch plan
    Plan(PlanArgs),
    /// Transfer one batch (or every batch) of a job
    Run(RunArgs),
    /// Inspect or reset stored checkpoints
    Checkpoint {
        #[command(subcommand)]
        command: CheckpointCommand,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Listing index modulo batch count
    Positional,
    /// Name digest modulo batch count
    Hash,
}

impl From<ModeArg> for PartitionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Positional => PartitionMode::Positional,
            ModeArg::Hash => PartitionMode::ContentHash,
        }
    }
}

#[derive(Args, Clone, Debug)]
pub struct PlanArgs {
    /// Job description (TOML, or JSON with a .json extension)
    #[arg(long, value_name = "FILE")]
    pub job: PathBuf,
    /// Partitioning mode used to assign files to batches
    #[arg(long, value_enum, default_value_t = ModeArg::Positional)]
    pub mode: ModeArg,
    /// Write the planned job here instead of stdout
    #[arg(long, short, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Clone, Debug)]
#[command(group(ArgGroup::new("selection").args(["batch_id", "modulo_id", "all"])))]
pub struct RunArgs {
    /// Job description produced by `shuttle plan` (or written by hand)
    #[arg(long, value_name = "FILE")]
    pub job: PathBuf,
    /// Run identity supplied by the scheduler; retries must reuse it
    #[arg(long)]
    pub run_id: String,
    /// Task identity prefix for checkpoint keys
    #[arg(long, default_value = "sync")]
    pub task_id: String,
    /// Run the precomputed batch with this id
    #[arg(long)]
    pub batch_id: Option<usize>,
    /// Re-list the source and run the files whose name hash maps to this id
    #[arg(long)]
    pub modulo_id: Option<usize>,
    /// Run every batch of the job concurrently
    #[arg(long)]
    pub all: bool,
    /// Comma-separated transforms applied to each chunk (overrides the job)
    #[arg(long, value_name = "NAMES")]
    pub transform: Option<String>,
    /// Directory for checkpoint files (defaults to <config-dir>/checkpoints)
    #[arg(long, value_name = "DIR")]
    pub checkpoint_dir: Option<PathBuf>,
    /// Show a progress spinner while transferring
    #[arg(long)]
    pub progress: bool,
}

#[derive(Subcommand)]
pub enum CheckpointCommand {
    /// Print the files committed so far for a checkpoint key
    Show(CheckpointArgs),
    /// Remove a checkpoint so the next run starts from scratch
    Clear(CheckpointArgs),
}

#[derive(Args, Clone, Debug)]
pub struct CheckpointArgs {
    /// Task identity prefix used by `shuttle run`
    #[arg(long, default_value = "sync")]
    pub task_id: String,
    /// Batch id the checkpoint belongs to. Without it the key is the task id
    /// as given, which `shuttle run` never writes (it always appends
    /// `-batch-<n>`)
    #[arg(long)]
    pub batch_id: Option<usize>,
    /// Run identity the checkpoint was recorded under
    #[arg(long)]
    pub run_id: String,
    /// Directory for checkpoint files (defaults to <config-dir>/checkpoints)
    #[arg(long, value_name = "DIR")]
    pub checkpoint_dir: Option<PathBuf>,
    /// Emit JSON instead of a table
    #[arg(long)]
    pub json: bool,
}
