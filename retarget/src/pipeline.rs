//! Retargeting of one source animation onto one target skeleton.

use {
    crate::{
        assets::{AssetError, AssetFile, AssetStore, ExportOptions, StoredAsset},
        chains::{build_definition, ChainError},
        config::PipelineConfig,
        dataset::base_name,
        rig::{RetargetDefinition, RetargetProfile},
        solver::{PoseSolver, SolverError, SolverSession},
    },
    animate::{AnimationClip, BoneTrack, ClipError, Skeleton},
    nalgebra as na,
    std::path::{Path, PathBuf},
};

/// Source animation file, target skeleton file and output file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetargetJob {
    input: PathBuf,
    target: PathBuf,
    output: PathBuf,
}

impl RetargetJob {
    pub fn new(
        input: impl Into<PathBuf>,
        target: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
    ) -> Self {
        RetargetJob {
            input: input.into(),
            target: target.into(),
            output: output.into(),
        }
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn output(&self) -> &Path {
        &self.output
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PairError {
    #[error("Failed to import source `{path}`")]
    ImportSource {
        path: PathBuf,
        #[source]
        source: AssetError,
    },

    #[error("Failed to import target `{path}`")]
    ImportTarget {
        path: PathBuf,
        #[source]
        source: AssetError,
    },

    #[error("Source `{path}` contains no animation")]
    MissingAnimation { path: PathBuf },

    #[error("Source skeleton cannot be retargeted")]
    SourceTopology(#[source] ChainError),

    #[error("Target skeleton cannot be retargeted")]
    TargetTopology(#[source] ChainError),

    #[error("Pose transfer failed")]
    Solver(#[from] SolverError),

    #[error("Failed to commit keys")]
    Commit(#[from] ClipError),

    #[error("Failed to persist `{name}`")]
    Persist {
        name: String,
        #[source]
        source: AssetError,
    },

    #[error("Failed to export `{path}`")]
    Export {
        path: PathBuf,
        #[source]
        source: AssetError,
    },
}

impl PairError {
    /// Target skeleton is unusable, so is every other pair with it.
    pub fn is_target_topology(&self) -> bool {
        matches!(self, PairError::TargetTopology(_))
    }
}

/// Runs pair jobs with one asset store and one solver.
pub struct Retargeter<S, P> {
    store: S,
    solver: P,
    config: PipelineConfig,
}

impl<S, P> Retargeter<S, P>
where
    S: AssetStore,
    P: PoseSolver,
{
    pub fn new(store: S, solver: P, config: PipelineConfig) -> Self {
        Retargeter {
            store,
            solver,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Retargets the job's animation and writes the result.
    /// Working namespaces are released whatever the outcome.
    #[tracing::instrument(
        skip(self, job),
        fields(input = %job.input.display(), target = %job.target.display())
    )]
    pub fn run(&mut self, job: &RetargetJob) -> Result<(), PairError> {
        let result = self.run_stages(job);
        self.cleanup();

        match &result {
            Ok(()) => tracing::info!("Exported {}", job.output.display()),
            Err(err) => tracing::warn!("Pair failed: {}", err),
        }
        result
    }

    fn run_stages(&mut self, job: &RetargetJob) -> Result<(), PairError> {
        let input_ns = self.config.input_namespace();
        let target_ns = self.config.target_namespace();

        // Import
        self.store.release(&input_ns);
        self.store.release(&target_ns);

        let source = self
            .store
            .import(&job.input, &input_ns)
            .map_err(|source| PairError::ImportSource {
                path: job.input.clone(),
                source,
            })?;
        let animation = source.animation.ok_or_else(|| PairError::MissingAnimation {
            path: job.input.clone(),
        })?;
        let target = self
            .store
            .import(&job.target, &target_ns)
            .map_err(|source| PairError::ImportTarget {
                path: job.target.clone(),
                source,
            })?;

        // Rig
        let source_def = build_definition(&source.skeleton)
            .map_err(PairError::SourceTopology)?;
        let target_def = build_definition(&target.skeleton)
            .map_err(PairError::TargetTopology)?;

        // Profile
        let profile = RetargetProfile::new(source_def, target_def);

        if self.config.persist {
            let assets = vec![
                (&input_ns, StoredAsset::Skeleton(source.skeleton.clone())),
                (&input_ns, StoredAsset::Animation(animation.clone())),
                (&input_ns, StoredAsset::Definition(profile.source.clone())),
                (&target_ns, StoredAsset::Skeleton(target.skeleton.clone())),
                (&target_ns, StoredAsset::Definition(profile.target.clone())),
                (&target_ns, StoredAsset::Profile(profile.clone())),
            ];
            for (namespace, asset) in assets {
                self.persist(namespace, asset)?;
            }
        }

        // Frames
        let tracks = self.transfer(
            &profile,
            &source.skeleton,
            &animation,
            &target.skeleton,
        )?;

        // Commit
        let clip = commit(
            &animation,
            base_name(&job.output),
            &target.skeleton,
            tracks,
        )?;

        if self.config.persist {
            self.persist(&target_ns, StoredAsset::Animation(clip.clone()))?;
        }

        // Export
        let asset = AssetFile {
            skeleton: target.skeleton,
            animation: Some(clip),
            mesh: target.mesh,
        };
        let options = ExportOptions {
            preview_mesh: !self.config.unattended,
        };
        self.store
            .export(&asset, &job.output, options)
            .map_err(|source| PairError::Export {
                path: job.output.clone(),
                source,
            })
    }

    /// Runs the solver for every frame of the clip, returns local space
    /// keys for every target bone.
    fn transfer(
        &self,
        profile: &RetargetProfile,
        source: &Skeleton,
        clip: &AnimationClip,
        target: &Skeleton,
    ) -> Result<Vec<BoneTrack>, SolverError> {
        let mut session = self.solver.begin(profile, source, target)?;
        let frames = clip.num_frames;
        let scale = self.config.uniform_scale;
        let rescale = (scale - 1.0).abs() > f32::EPSILON;

        let mut tracks: Vec<BoneTrack> = target
            .bones()
            .iter()
            .map(|bone| BoneTrack::with_frames(&bone.name, frames))
            .collect();

        for frame in 0..frames {
            let mut pose = clip.sample_component(source, frame);
            for transform in pose.transforms_mut() {
                transform.scale = na::Vector3::repeat(1.0);
                if rescale {
                    transform.translation *= scale;
                }
            }

            let delta_time = match frame {
                0 => clip.time_at_frame(0),
                _ => clip.time_at_frame(frame) - clip.time_at_frame(frame - 1),
            };

            let output = session.run(&pose, delta_time)?;
            if output.len() != target.len() {
                return Err(SolverError::PoseSize {
                    skeleton: target.name().to_owned(),
                    found: output.len(),
                    expected: target.len(),
                });
            }

            let local = target.to_local(&output);
            for (track, transform) in tracks.iter_mut().zip(local.transforms()) {
                let mut key = *transform;
                if rescale {
                    key.translation *= scale;
                }
                key.rotation =
                    na::UnitQuaternion::new_normalize(key.rotation.into_inner());
                track.set_key(frame, &key);
            }
        }

        Ok(tracks)
    }

    fn persist(
        &mut self,
        namespace: &str,
        asset: StoredAsset,
    ) -> Result<(), PairError> {
        let name = stored_name(&asset);
        self.store
            .persist(namespace, &name, &asset)
            .map_err(|source| PairError::Persist { name, source })
    }

    fn cleanup(&mut self) {
        let released = self.store.release(&self.config.input_namespace())
            + self.store.release(&self.config.target_namespace());

        if self.config.unattended {
            let collected = self.store.collect_garbage();
            tracing::debug!(
                "Released {} assets, collected {}",
                released,
                collected
            );
        } else {
            tracing::debug!("Released {} assets", released);
        }
    }
}

/// Copy of the source clip bound to the target skeleton with the keys
/// of every target bone.
fn commit(
    source: &AnimationClip,
    name: String,
    target: &Skeleton,
    tracks: Vec<BoneTrack>,
) -> Result<AnimationClip, ClipError> {
    let mut clip = source.clone();
    clip.name = name;
    clip.rebind(target);

    for track in tracks {
        if !clip.has_track(&track.bone) {
            clip.add_track(&track.bone)?;
        }
        clip.set_track_keys(track)?;
    }
    Ok(clip)
}

fn stored_name(asset: &StoredAsset) -> String {
    match asset {
        StoredAsset::Skeleton(skeleton) => skeleton.name().to_owned(),
        StoredAsset::Animation(clip) => clip.name.clone(),
        StoredAsset::Definition(RetargetDefinition { skeleton, .. }) => {
            format!("IK_{}", skeleton)
        }
        StoredAsset::Profile(profile) => profile.name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            assets::MemoryAssetStore,
            fixtures::{humanoid, humanoid_with, wave_clip},
            solver::{rest_pose, ChainFkSolver},
        },
        animate::{Bone, Pose, Transform},
    };

    /// Always answers with the reference pose of the target.
    struct RestPoseSolver;

    struct RestPoseSession(Pose);

    impl PoseSolver for RestPoseSolver {
        type Session = RestPoseSession;

        fn begin(
            &self,
            _profile: &RetargetProfile,
            _source: &Skeleton,
            target: &Skeleton,
        ) -> Result<RestPoseSession, SolverError> {
            Ok(RestPoseSession(rest_pose(target)))
        }
    }

    impl SolverSession for RestPoseSession {
        fn run(
            &mut self,
            _source: &Pose,
            _delta_time: f32,
        ) -> Result<Pose, SolverError> {
            Ok(self.0.clone())
        }
    }

    const INPUT: &str = "train/Animation/Walk.ron";
    const TARGET: &str = "train/Character/Big.ron";
    const OUTPUT: &str = "train/Retarget/Big__Walk.ron";

    fn store_with(target: Skeleton) -> MemoryAssetStore {
        let source = humanoid("Mixamo", 1.0);
        let clip = wave_clip(&source, "Walk", 5);

        let mut store = MemoryAssetStore::new();
        store.insert(
            INPUT,
            AssetFile {
                skeleton: source,
                animation: Some(clip),
                mesh: None,
            },
        );
        store.insert(
            TARGET,
            AssetFile {
                skeleton: target,
                animation: None,
                mesh: None,
            },
        );
        store
    }

    fn job() -> RetargetJob {
        RetargetJob::new(INPUT, TARGET, OUTPUT)
    }

    fn output_clip<P: PoseSolver>(
        retargeter: &Retargeter<MemoryAssetStore, P>,
    ) -> AnimationClip {
        retargeter
            .store()
            .get(Path::new(OUTPUT))
            .and_then(|asset| asset.animation.clone())
            .unwrap()
    }

    #[test]
    fn retargets_onto_larger_skeleton() {
        let target = humanoid_with("Big", 1.5, |n| n.to_owned(), true);
        let mut retargeter = Retargeter::new(
            store_with(target.clone()),
            ChainFkSolver,
            PipelineConfig::default(),
        );
        retargeter.run(&job()).unwrap();

        let clip = output_clip(&retargeter);
        assert_eq!(clip.name, "Big__Walk");
        assert_eq!(clip.skeleton, "Big");
        assert_eq!(clip.num_frames, 5);
        assert_eq!(clip.tracks.len(), target.len());
        clip.validate().unwrap();

        let hips = clip.track("Hips").unwrap();
        for frame in 0..5 {
            let expected = frame as f32 / 5.0 * 1.5;
            assert!((hips.key(frame).translation.z - expected).abs() < 1e-4);
            assert!((hips.key(frame).translation.y - 1.5).abs() < 1e-4);
        }
    }

    #[test]
    fn same_pair_twice_is_identical() {
        let target = humanoid("Big", 1.2);
        let mut retargeter = Retargeter::new(
            store_with(target),
            ChainFkSolver,
            PipelineConfig::default(),
        );
        let config = retargeter.config().clone();

        retargeter.run(&job()).unwrap();
        let first = output_clip(&retargeter);
        assert_eq!(retargeter.store().occupants(&config.input_namespace()), 0);
        assert_eq!(retargeter.store().occupants(&config.target_namespace()), 0);

        retargeter.run(&job()).unwrap();
        assert_eq!(output_clip(&retargeter), first);
    }

    #[test]
    fn rest_pose_solver_commits_reference_keys() {
        let target = humanoid("Big", 2.0);
        let mut config = PipelineConfig::default();
        config.uniform_scale = 0.5;

        let mut retargeter =
            Retargeter::new(store_with(target.clone()), RestPoseSolver, config);
        retargeter.run(&job()).unwrap();

        let clip = output_clip(&retargeter);
        for bone in target.bones() {
            let reference = clip.track(&bone.name).unwrap().key(3);
            let expected = Transform {
                translation: bone.reference.translation * 0.5,
                ..bone.reference
            };
            assert!(reference.abs_diff_eq(&expected, 1e-5), "{}", bone.name);
        }
    }

    #[test]
    fn unsupported_target_is_reported() {
        let mut bones: Vec<Bone> = humanoid("Tailed", 1.0).bones().to_vec();
        bones.push(Bone::new("Tail", Some(0), Transform::identity()));
        let target = Skeleton::new("Tailed", bones).unwrap();

        let mut retargeter = Retargeter::new(
            store_with(target),
            ChainFkSolver,
            PipelineConfig::default(),
        );
        let config = retargeter.config().clone();

        let err = retargeter.run(&job()).unwrap_err();
        assert!(err.is_target_topology());
        assert!(retargeter.store().get(Path::new(OUTPUT)).is_none());
        assert_eq!(retargeter.store().occupants(&config.input_namespace()), 0);
        assert_eq!(retargeter.store().occupants(&config.target_namespace()), 0);
    }

    #[test]
    fn missing_files_fail_the_pair() {
        let mut retargeter = Retargeter::new(
            MemoryAssetStore::new(),
            ChainFkSolver,
            PipelineConfig::default(),
        );
        let err = retargeter.run(&job()).unwrap_err();
        assert!(matches!(err, PairError::ImportSource { .. }));

        let mut store = store_with(humanoid("Big", 1.0));
        store.insert(
            INPUT,
            AssetFile {
                skeleton: humanoid("Mixamo", 1.0),
                animation: None,
                mesh: None,
            },
        );
        let mut retargeter =
            Retargeter::new(store, ChainFkSolver, PipelineConfig::default());
        let err = retargeter.run(&job()).unwrap_err();
        assert!(matches!(err, PairError::MissingAnimation { .. }));
        assert!(!err.is_target_topology());
    }

    #[test]
    fn failed_export_still_cleans_up() {
        let mut store = store_with(humanoid("Big", 1.0));
        store.fail_exports_to(OUTPUT);

        let mut retargeter =
            Retargeter::new(store, ChainFkSolver, PipelineConfig::default());
        let config = retargeter.config().clone();

        let err = retargeter.run(&job()).unwrap_err();
        assert!(matches!(err, PairError::Export { .. }));
        assert_eq!(retargeter.store().occupants(&config.input_namespace()), 0);
    }

    #[test]
    fn persist_saves_intermediate_assets() {
        let mut config = PipelineConfig::default();
        config.persist = true;
        let mut retargeter = Retargeter::new(
            store_with(humanoid("Big", 1.0)),
            ChainFkSolver,
            config.clone(),
        );
        retargeter.run(&job()).unwrap();

        let store = retargeter.into_store();
        assert_eq!(store.persisted_count(), 7);
        assert!(matches!(
            store.persisted(&config.target_namespace(), "RTG_Mixamo"),
            Some(StoredAsset::Profile(_))
        ));
        assert!(matches!(
            store.persisted(&config.input_namespace(), "IK_Mixamo"),
            Some(StoredAsset::Definition(_))
        ));
        assert!(matches!(
            store.persisted(&config.target_namespace(), "Big__Walk"),
            Some(StoredAsset::Animation(_))
        ));
    }
}
