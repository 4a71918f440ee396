use {
    crate::rig::RetargetProfile,
    animate::{Pose, Skeleton},
    nalgebra as na,
};

#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    #[error(
        "Pose has {found} bones but skeleton `{skeleton}` has {expected}"
    )]
    PoseSize {
        skeleton: String,
        found: usize,
        expected: usize,
    },

    #[error("Chain `{chain}` does not resolve in skeleton `{skeleton}`")]
    UnresolvedChain { skeleton: String, chain: String },

    #[error("Retarget root `{bone}` is missing in skeleton `{skeleton}`")]
    MissingRoot { skeleton: String, bone: String },
}

/// Maps source poses onto the target skeleton of a retarget profile.
pub trait PoseSolver {
    type Session: SolverSession;

    /// Starts a fresh session for one source/target pair.
    fn begin(
        &self,
        profile: &RetargetProfile,
        source: &Skeleton,
        target: &Skeleton,
    ) -> Result<Self::Session, SolverError>;
}

pub trait SolverSession {
    /// Returns component space pose of the target skeleton for the component
    /// space pose of the source skeleton.
    fn run(
        &mut self,
        source: &Pose,
        delta_time: f32,
    ) -> Result<Pose, SolverError>;
}

/// Direct chain-to-chain rotation transfer.
///
/// Every bone of a target chain takes the component rotation of the source
/// chain bone at the same relative position along the chain, corrected by
/// the difference between the reference poses. Root translation is scaled
/// by the ratio of the reference root heights. Bones outside of chains keep
/// their reference local transform.
#[derive(Clone, Copy, Debug, Default)]
pub struct ChainFkSolver;

#[derive(Clone, Copy, Debug)]
struct BoneMapping {
    source: usize,
    offset: na::UnitQuaternion<f32>,
}

pub struct ChainFkSession {
    target: Skeleton,
    source_len: usize,
    source_root: usize,
    target_root: usize,
    root_offset: na::UnitQuaternion<f32>,
    root_scale: f32,
    mapping: Vec<Option<BoneMapping>>,
}

impl PoseSolver for ChainFkSolver {
    type Session = ChainFkSession;

    fn begin(
        &self,
        profile: &RetargetProfile,
        source: &Skeleton,
        target: &Skeleton,
    ) -> Result<ChainFkSession, SolverError> {
        if profile.ops.run_ik_rig || profile.ops.ik_goals {
            tracing::warn!(
                "IK ops requested by `{}` are not supported and ignored",
                profile.name
            );
        }

        let source_root = find_root(source, &profile.source.root)?;
        let target_root = find_root(target, &profile.target.root)?;

        let source_ref = source.to_component(&source.reference_pose());
        let target_ref = target.to_component(&target.reference_pose());

        let offset = |s: usize, t: usize| {
            source_ref[s].rotation.inverse() * target_ref[t].rotation
        };

        let mut mapping = vec![None; target.len()];
        if profile.ops.chain_fk {
            for (source_chain, target_chain) in profile.matched_chains() {
                let unresolved = |skeleton: &Skeleton, chain: &str| {
                    SolverError::UnresolvedChain {
                        skeleton: skeleton.name().to_owned(),
                        chain: chain.to_owned(),
                    }
                };
                let s = source_chain
                    .resolve(source)
                    .ok_or_else(|| unresolved(source, &source_chain.name))?;
                let t = target_chain
                    .resolve(target)
                    .ok_or_else(|| unresolved(target, &target_chain.name))?;

                for (k, &bone) in t.iter().enumerate() {
                    let from = proportional_index(k, t.len(), s.len());
                    mapping[bone] = Some(BoneMapping {
                        source: s[from],
                        offset: offset(s[from], bone),
                    });
                }
            }
        }

        let source_height = source_ref[source_root].translation.norm();
        let target_height = target_ref[target_root].translation.norm();
        let root_scale = if source_height > f32::EPSILON {
            target_height / source_height
        } else {
            1.0
        };

        Ok(ChainFkSession {
            target: target.clone(),
            source_len: source.len(),
            source_root,
            target_root,
            root_offset: offset(source_root, target_root),
            root_scale,
            mapping,
        })
    }
}

impl SolverSession for ChainFkSession {
    fn run(
        &mut self,
        source: &Pose,
        _delta_time: f32,
    ) -> Result<Pose, SolverError> {
        if source.len() != self.source_len {
            return Err(SolverError::PoseSize {
                skeleton: "source".to_owned(),
                found: source.len(),
                expected: self.source_len,
            });
        }

        let mut output = Pose::identity(self.target.len());
        for &bone in self.target.evaluation_order() {
            let reference = &self.target.bones()[bone].reference;
            let mut transform = match self.target.parent(bone) {
                Some(parent) => output[parent].mul_transform(reference),
                None => *reference,
            };

            if bone == self.target_root {
                let root = &source[self.source_root];
                transform.translation = root.translation * self.root_scale;
                transform.rotation = root.rotation * self.root_offset;
            } else if let Some(mapping) = &self.mapping[bone] {
                transform.rotation =
                    source[mapping.source].rotation * mapping.offset;
            }

            output[bone] = transform;
        }
        Ok(output)
    }
}

fn find_root(skeleton: &Skeleton, bone: &str) -> Result<usize, SolverError> {
    skeleton.find(bone).ok_or_else(|| SolverError::MissingRoot {
        skeleton: skeleton.name().to_owned(),
        bone: bone.to_owned(),
    })
}

/// Index in a chain of `from_len` bones at the same relative position as
/// `k` in a chain of `to_len` bones.
fn proportional_index(k: usize, to_len: usize, from_len: usize) -> usize {
    if to_len <= 1 || from_len <= 1 {
        return 0;
    }
    (k * (from_len - 1) + (to_len - 1) / 2) / (to_len - 1)
}

/// Reference pose of the skeleton in component space.
pub fn rest_pose(skeleton: &Skeleton) -> Pose {
    skeleton.to_component(&skeleton.reference_pose())
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{chains::build_definition, fixtures::{humanoid, humanoid_with}},
    };

    fn profile(source: &Skeleton, target: &Skeleton) -> RetargetProfile {
        RetargetProfile::new(
            build_definition(source).unwrap(),
            build_definition(target).unwrap(),
        )
    }

    #[test]
    fn reference_pose_maps_to_reference_pose() {
        let source = humanoid("Source", 1.0);
        let target = humanoid("Target", 1.7);

        let mut session = ChainFkSolver
            .begin(&profile(&source, &target), &source, &target)
            .unwrap();
        let output = session.run(&rest_pose(&source), 0.0).unwrap();

        let expected = rest_pose(&target);
        for (a, b) in output.transforms().iter().zip(expected.transforms()) {
            assert!(a.abs_diff_eq(b, 1e-4), "{:?} != {:?}", a, b);
        }
    }

    #[test]
    fn rotations_follow_source_chains() {
        let source = humanoid("Source", 1.0);
        let target = humanoid_with("Target", 2.0, |n| n.to_owned(), true);

        let mut session = ChainFkSolver
            .begin(&profile(&source, &target), &source, &target)
            .unwrap();

        let mut local = source.reference_pose();
        let arm = source.find("LeftArm").unwrap();
        local[arm].rotation =
            na::UnitQuaternion::from_euler_angles(0.0, 0.0, 0.8);
        let hips = source.find("Hips").unwrap();
        local[hips].translation.z = 0.5;

        let source_component = source.to_component(&local);
        let output = session.run(&source_component, 1.0 / 30.0).unwrap();

        let target_arm = target.find("LeftArm").unwrap();
        let dot = output[target_arm]
            .rotation
            .coords
            .dot(&source_component[arm].rotation.coords);
        assert!(dot.abs() > 1.0 - 1e-5, "{}", dot);

        let target_hips = target.find("Hips").unwrap();
        assert!((output[target_hips].translation.z - 1.0).abs() < 1e-4);
    }

    #[test]
    fn pose_size_is_checked() {
        let source = humanoid("Source", 1.0);
        let target = humanoid("Target", 1.0);
        let mut session = ChainFkSolver
            .begin(&profile(&source, &target), &source, &target)
            .unwrap();

        let err = session.run(&Pose::identity(3), 0.0).unwrap_err();
        assert!(matches!(err, SolverError::PoseSize { found: 3, .. }));
    }

    #[test]
    fn proportional_mapping_hits_both_ends() {
        assert_eq!(proportional_index(0, 3, 5), 0);
        assert_eq!(proportional_index(2, 3, 5), 4);
        assert_eq!(proportional_index(1, 2, 1), 0);
        assert_eq!(proportional_index(0, 1, 4), 0);
    }
}
