use {
    clap::{Args, Parser, Subcommand},
    retarget::{dataset::Subset, paths::resolve_path, shard::clamp_workers},
    std::{fs, io, path::PathBuf},
};

#[derive(Debug, Parser)]
#[command(
    name = "retarget",
    about = "Retargets animation datasets onto differently proportioned skeletons"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Retarget every subset of a dataset.
    All(AllArgs),

    /// Retarget one shard of a subset.
    Worker(WorkerArgs),

    /// Retarget a single animation onto a single skeleton.
    Pair(PairArgs),
}

#[derive(Debug, Args)]
pub struct AllArgs {
    /// Dataset directory with `train`, `val` and `test` subsets.
    #[arg(long)]
    pub input: Option<String>,

    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub seed: i32,

    /// Number of workers per subset. Defaults to the config value.
    #[arg(long, allow_negative_numbers = true)]
    pub workers: Option<i64>,

    /// Run workers on a thread pool instead of child processes.
    #[arg(long)]
    pub in_process: bool,
}

#[derive(Debug, Args)]
pub struct WorkerArgs {
    #[arg(long)]
    pub input: Option<String>,

    #[arg(long)]
    pub subset: Option<String>,

    #[arg(long, allow_negative_numbers = true)]
    pub worker_index: Option<i64>,

    #[arg(long, allow_negative_numbers = true)]
    pub num_workers: Option<i64>,

    /// Seed of this worker, as derived by the coordinator.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub seed: i32,
}

#[derive(Debug, Args)]
pub struct PairArgs {
    /// Source animation file.
    #[arg(long)]
    pub input: Option<String>,

    /// Target skeleton file.
    #[arg(long)]
    pub target: Option<String>,

    /// Output file.
    #[arg(long)]
    pub output: Option<String>,

    /// Save intermediate assets: `true`, `1` or `yes`.
    #[arg(long)]
    pub persist: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum UsageError {
    #[error("Missing required argument: --input")]
    MissingInput,

    #[error("Missing required argument: --target")]
    MissingTarget,

    #[error("Missing required argument: --output")]
    MissingOutput,

    #[error("Input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("Target file not found: {}", .0.display())]
    TargetNotFound(PathBuf),

    #[error("Failed to create output directory: {}", .path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Base directory not found: {}", .0.display())]
    BaseDirNotFound(PathBuf),

    #[error("Invalid worker parameters: {0}")]
    WorkerParams(String),
}

impl UsageError {
    /// Process exit code.
    pub fn code(&self) -> i32 {
        match self {
            UsageError::MissingInput => 1,
            UsageError::MissingTarget => 2,
            UsageError::BaseDirNotFound(_) => 2,
            UsageError::MissingOutput => 3,
            UsageError::InputNotFound(_) => 4,
            UsageError::TargetNotFound(_) => 5,
            UsageError::OutputDir { .. } => 6,
            UsageError::WorkerParams(_) => 7,
        }
    }
}

#[derive(Debug)]
pub struct AllParams {
    pub base_dir: PathBuf,
    pub seed: i32,
    pub workers: usize,
    pub in_process: bool,
}

impl AllArgs {
    pub fn validate(self, default_workers: usize) -> Result<AllParams, UsageError> {
        let input = self.input.ok_or(UsageError::MissingInput)?;
        let base_dir = resolve_path(&input);
        if !base_dir.is_dir() {
            return Err(UsageError::BaseDirNotFound(base_dir));
        }

        let workers = self.workers.unwrap_or(default_workers as i64);
        Ok(AllParams {
            base_dir,
            seed: self.seed,
            workers: clamp_workers(workers),
            in_process: self.in_process,
        })
    }
}

#[derive(Debug)]
pub struct WorkerParams {
    pub base_dir: PathBuf,
    pub subset: Subset,
    pub index: usize,
    pub count: usize,
    pub seed: i32,
}

impl WorkerArgs {
    pub fn validate(self) -> Result<WorkerParams, UsageError> {
        let input = self.input.ok_or(UsageError::MissingInput)?;

        let subset = self
            .subset
            .ok_or_else(|| UsageError::WorkerParams("missing --subset".into()))?
            .parse::<Subset>()
            .map_err(|err| UsageError::WorkerParams(err.to_string()))?;

        let count = match self.num_workers {
            Some(count) if count >= 1 => count as usize,
            Some(count) => {
                return Err(UsageError::WorkerParams(format!(
                    "--num-workers must be >= 1, got {}",
                    count
                )))
            }
            None => {
                return Err(UsageError::WorkerParams(
                    "missing --num-workers".into(),
                ))
            }
        };

        let index = match self.worker_index {
            Some(index) if index >= 0 && (index as usize) < count => {
                index as usize
            }
            Some(index) => {
                return Err(UsageError::WorkerParams(format!(
                    "--worker-index must be in 0..{}, got {}",
                    count, index
                )))
            }
            None => {
                return Err(UsageError::WorkerParams(
                    "missing --worker-index".into(),
                ))
            }
        };

        let base_dir = resolve_path(&input);
        if !base_dir.is_dir() {
            return Err(UsageError::BaseDirNotFound(base_dir));
        }

        Ok(WorkerParams {
            base_dir,
            subset,
            index,
            count,
            seed: self.seed,
        })
    }
}

#[derive(Debug)]
pub struct PairParams {
    pub input: PathBuf,
    pub target: PathBuf,
    pub output: PathBuf,
    pub persist: bool,
}

impl PairArgs {
    /// Checks arguments and creates the output directory.
    pub fn validate(self) -> Result<PairParams, UsageError> {
        let input = self.input.ok_or(UsageError::MissingInput)?;
        let target = self.target.ok_or(UsageError::MissingTarget)?;
        let output = self.output.ok_or(UsageError::MissingOutput)?;

        let input = resolve_path(&input);
        let target = resolve_path(&target);
        let output = resolve_path(&output);

        tracing::info!("Input: {}", input.display());
        tracing::info!("Target: {}", target.display());
        tracing::info!("Output: {}", output.display());

        if !input.is_file() {
            return Err(UsageError::InputNotFound(input));
        }
        if !target.is_file() {
            return Err(UsageError::TargetNotFound(target));
        }
        if let Some(dir) = output.parent() {
            fs::create_dir_all(dir).map_err(|source| UsageError::OutputDir {
                path: dir.to_owned(),
                source,
            })?;
        }

        let persist = self.persist.as_deref().map_or(false, parse_flag);
        Ok(PairParams {
            input,
            target,
            output,
            persist,
        })
    }
}

/// `1`, `true` and `yes` in any case enable the flag.
pub fn parse_flag(value: &str) -> bool {
    let value = value.trim();
    ["1", "true", "yes"]
        .iter()
        .any(|on| value.eq_ignore_ascii_case(on))
}
