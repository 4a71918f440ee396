use {
    crate::{
        assets::{AssetStore, RonAssetStore},
        config::Config,
        dataset::{output_file_name, scan_subset, Subset, RETARGET_DIR},
        pipeline::{RetargetJob, Retargeter},
        random::random_subset,
        shard::WorkerShard,
        solver::{ChainFkSolver, PoseSolver},
    },
    std::{fmt, ops::AddAssign, path::Path},
};

/// Outcome counts of one worker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub succeeded: usize,
    pub failed: usize,

    /// Pairs not attempted because their skeleton was unsupported.
    pub skipped: usize,
    pub skipped_skeletons: usize,
}

impl AddAssign for WorkerReport {
    fn add_assign(&mut self, rhs: WorkerReport) {
        self.succeeded += rhs.succeeded;
        self.failed += rhs.failed;
        self.skipped += rhs.skipped;
        self.skipped_skeletons += rhs.skipped_skeletons;
    }
}

impl fmt::Display for WorkerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} failed, {} skipped ({} skeletons)",
            self.succeeded, self.failed, self.skipped, self.skipped_skeletons
        )
    }
}

/// Retargets every pair of the shard found in the subset directory.
///
/// Training skeletons get at most `max_animations` animations sampled with
/// the per-skeleton seed, other subsets pair each skeleton with every
/// animation. Pair failures are logged and counted, a target skeleton of
/// unsupported topology skips the rest of its pairs.
#[tracing::instrument(
    skip(retargeter, subset_dir),
    fields(dir = %subset_dir.display())
)]
pub fn run_worker<S, P>(
    retargeter: &mut Retargeter<S, P>,
    subset_dir: &Path,
    subset: Subset,
    shard: WorkerShard,
    max_animations: usize,
) -> WorkerReport
where
    S: AssetStore,
    P: PoseSolver,
{
    let mut report = WorkerReport::default();

    let files = scan_subset(subset_dir, retargeter.store().extension());
    if files.is_empty() {
        tracing::warn!(
            "No skeletons or animations in {}, nothing to do",
            subset_dir.display()
        );
        return report;
    }

    let output_dir = subset_dir.join(RETARGET_DIR);
    let extension = retargeter.store().extension().to_owned();

    for index in shard.indices(files.skeletons.len()) {
        let skeleton = &files.skeletons[index];

        let mut animations = if subset.samples_animations() {
            random_subset(
                &files.animations,
                max_animations,
                shard.skeleton_seed(index),
            )
        } else {
            files.animations.clone()
        };
        animations.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        tracing::info!(
            "Skeleton {} ({}): {} animations",
            index,
            skeleton.display(),
            animations.len()
        );

        for (done, animation) in animations.iter().enumerate() {
            let output = output_dir
                .join(output_file_name(skeleton, animation, &extension));
            let job = RetargetJob::new(animation, skeleton, output);

            match retargeter.run(&job) {
                Ok(()) => report.succeeded += 1,
                Err(err) if err.is_target_topology() => {
                    report.failed += 1;
                    report.skipped += animations.len() - done - 1;
                    report.skipped_skeletons += 1;
                    tracing::warn!(
                        "Skipping skeleton {}: {}",
                        skeleton.display(),
                        err
                    );
                    break;
                }
                Err(_) => report.failed += 1,
            }
        }
    }

    tracing::info!("Worker {} of {} done: {}", shard.index, shard.count, report);
    report
}

/// Runs the shard with the file asset store and chain solver, in a
/// namespace of its own.
pub fn run_shard(
    config: &Config,
    base_dir: &Path,
    subset: Subset,
    shard: WorkerShard,
) -> WorkerReport {
    let pipeline = config
        .pipeline(false, true)
        .with_namespace_suffix(&format!("{}_{}", subset, shard.index));

    let mut retargeter = Retargeter::new(
        RonAssetStore::new(&config.content_dir),
        ChainFkSolver,
        pipeline,
    );

    run_worker(
        &mut retargeter,
        &base_dir.join(subset.as_str()),
        subset,
        shard,
        config.max_animations,
    )
}
