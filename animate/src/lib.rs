//! Skeletal animation data: bone hierarchies, poses and sampled clips.

pub mod clip;
pub mod pose;
pub mod skeleton;
pub mod transform;

pub use self::{
    clip::{AnimationClip, BoneTrack, ClipError},
    pose::Pose,
    skeleton::{Bone, Skeleton, SkeletonError},
    transform::Transform,
};
