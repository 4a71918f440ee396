//! Runs all subsets of a dataset over a number of workers.

use {
    crate::{
        config::Config,
        dataset::{reset_output_dir, Subset},
        shard::WorkerShard,
        worker::{run_shard, WorkerReport},
    },
    rayon::prelude::*,
    std::{
        fs, io,
        path::{Path, PathBuf},
        process::{Child, Command, Stdio},
    },
};

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("Base directory `{0}` not found")]
    MissingBaseDir(PathBuf),

    #[error("Failed to open worker log `{path}`")]
    WorkerLog {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to launch worker {index} for `{subset}`")]
    Launch {
        subset: Subset,
        index: usize,
        #[source]
        source: io::Error,
    },
}

/// How shards are executed.
#[derive(Clone, Debug)]
pub enum LaunchMode {
    /// Shards run on a thread pool of this process.
    InProcess,

    /// One `worker` process of the program per shard.
    Processes { program: PathBuf },
}

#[derive(Clone, Debug)]
pub struct CoordinatorOptions {
    pub base_dir: PathBuf,
    pub seed: i32,
    pub workers: usize,
    pub mode: LaunchMode,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShardStatus {
    /// In-process shard finished.
    Completed(WorkerReport),

    /// Worker process exited. `None` if killed by a signal.
    Exited(Option<i32>),

    /// Worker process could not be started or awaited.
    LaunchFailed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShardOutcome {
    pub subset: Subset,
    pub shard: WorkerShard,
    pub status: ShardStatus,
}

impl ShardOutcome {
    pub fn is_success(&self) -> bool {
        match &self.status {
            ShardStatus::Completed(_) => true,
            ShardStatus::Exited(code) => *code == Some(0),
            ShardStatus::LaunchFailed(_) => false,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct CoordinatorReport {
    pub shards: Vec<ShardOutcome>,
    pub skipped_subsets: Vec<Subset>,
}

impl CoordinatorReport {
    pub fn failed_shards(&self) -> impl Iterator<Item = &ShardOutcome> + '_ {
        self.shards.iter().filter(|outcome| !outcome.is_success())
    }

    /// Sum of reports of in-process shards.
    pub fn totals(&self) -> WorkerReport {
        let mut total = WorkerReport::default();
        for outcome in &self.shards {
            if let ShardStatus::Completed(report) = outcome.status {
                total += report;
            }
        }
        total
    }
}

/// Retargets every configured subset under the base directory.
///
/// Each subset's `Retarget` directory is recreated first. Missing subsets
/// are skipped. Failing workers are reported, never abort the others.
#[tracing::instrument(skip(config, options), fields(base = %options.base_dir.display()))]
pub fn run_all(
    config: &Config,
    options: &CoordinatorOptions,
) -> Result<CoordinatorReport, CoordinatorError> {
    if !options.base_dir.is_dir() {
        return Err(CoordinatorError::MissingBaseDir(options.base_dir.clone()));
    }

    let workers = options.workers.max(1);
    let mut report = CoordinatorReport::default();

    for &subset in &config.subsets {
        let subset_dir = options.base_dir.join(subset.as_str());
        if !subset_dir.is_dir() {
            tracing::warn!(
                "Subset directory {} not found, skipping",
                subset_dir.display()
            );
            report.skipped_subsets.push(subset);
            continue;
        }

        if let Err(err) = reset_output_dir(&subset_dir) {
            tracing::warn!(
                "Failed to reset output of {}: {}, skipping",
                subset_dir.display(),
                err
            );
            report.skipped_subsets.push(subset);
            continue;
        }

        let shards: Vec<WorkerShard> = (0..workers)
            .map(|index| {
                WorkerShard::new(subset, index, workers, options.seed)
            })
            .collect();

        tracing::info!("Processing `{}` with {} workers", subset, workers);

        let outcomes = match &options.mode {
            LaunchMode::InProcess => {
                run_in_process(config, &options.base_dir, subset, &shards)
            }
            LaunchMode::Processes { program } => run_processes(
                config,
                program,
                &options.base_dir,
                subset,
                &shards,
            ),
        };

        for outcome in &outcomes {
            if !outcome.is_success() {
                tracing::error!(
                    "Worker {} for `{}` failed: {:?}",
                    outcome.shard.index,
                    subset,
                    outcome.status
                );
            }
        }
        report.shards.extend(outcomes);
    }

    let failed = report.failed_shards().count();
    tracing::info!(
        "All subsets processed, {} of {} workers failed",
        failed,
        report.shards.len()
    );
    Ok(report)
}

fn run_in_process(
    config: &Config,
    base_dir: &Path,
    subset: Subset,
    shards: &[WorkerShard],
) -> Vec<ShardOutcome> {
    shards
        .par_iter()
        .map(|&shard| ShardOutcome {
            subset,
            shard,
            status: ShardStatus::Completed(run_shard(
                config, base_dir, subset, shard,
            )),
        })
        .collect()
}

fn run_processes(
    config: &Config,
    program: &Path,
    base_dir: &Path,
    subset: Subset,
    shards: &[WorkerShard],
) -> Vec<ShardOutcome> {
    let children: Vec<(WorkerShard, Result<Child, CoordinatorError>)> =
        shards
            .iter()
            .map(|&shard| {
                let child =
                    spawn_worker(config, program, base_dir, subset, shard);
                (shard, child)
            })
            .collect();

    children
        .into_iter()
        .map(|(shard, child)| {
            let status = match child {
                Ok(mut child) => match child.wait() {
                    Ok(status) => ShardStatus::Exited(status.code()),
                    Err(err) => ShardStatus::LaunchFailed(err.to_string()),
                },
                Err(err) => {
                    tracing::error!("{}", err);
                    ShardStatus::LaunchFailed(err.to_string())
                }
            };
            ShardOutcome {
                subset,
                shard,
                status,
            }
        })
        .collect()
}

/// Starts `<program> worker ...` with output redirected to the worker log.
fn spawn_worker(
    config: &Config,
    program: &Path,
    base_dir: &Path,
    subset: Subset,
    shard: WorkerShard,
) -> Result<Child, CoordinatorError> {
    let log_path = config
        .log_dir
        .join(format!("worker_{}_{}.log", subset, shard.index));

    let log_error = |source| CoordinatorError::WorkerLog {
        path: log_path.clone(),
        source,
    };
    fs::create_dir_all(&config.log_dir).map_err(log_error)?;
    let stdout = fs::File::create(&log_path).map_err(log_error)?;
    let stderr = stdout.try_clone().map_err(log_error)?;

    let child = Command::new(program)
        .arg("worker")
        .arg("--input")
        .arg(base_dir)
        .arg("--subset")
        .arg(subset.as_str())
        .arg("--worker-index")
        .arg(shard.index.to_string())
        .arg("--num-workers")
        .arg(shard.count.to_string())
        .arg("--seed")
        .arg(shard.seed.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .spawn()
        .map_err(|source| CoordinatorError::Launch {
            subset,
            index: shard.index,
            source,
        })?;

    tracing::info!(
        "Launched worker {} for `{}` (pid {}), log {}",
        shard.index,
        subset,
        child.id(),
        log_path.display()
    );
    Ok(child)
}
