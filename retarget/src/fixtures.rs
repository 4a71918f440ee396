//! Skeletons, clips and dataset files shared by tests.
//!
//! Also compiled into the integration tests of both crates, so items are
//! reached through `retarget::` paths only.
#![allow(dead_code)]

use {
    animate::{AnimationClip, Bone, BoneTrack, Skeleton, Transform},
    nalgebra as na,
    retarget::AssetFile,
    std::{
        fs,
        path::{Path, PathBuf},
    },
};

/// Name, parent and reference offset of a conventional humanoid.
pub const HUMANOID: [(&str, Option<usize>, [f32; 3]); 21] = [
    ("Hips", None, [0.0, 1.0, 0.0]),
    ("Spine", Some(0), [0.0, 0.1, 0.0]),
    ("Spine1", Some(1), [0.0, 0.1, 0.0]),
    ("Spine2", Some(2), [0.0, 0.1, 0.0]),
    ("Neck", Some(3), [0.0, 0.15, 0.0]),
    ("Head", Some(4), [0.0, 0.1, 0.0]),
    ("HeadTop_End", Some(5), [0.0, 0.2, 0.0]),
    ("LeftShoulder", Some(3), [0.05, 0.1, 0.0]),
    ("LeftArm", Some(7), [0.1, 0.0, 0.0]),
    ("LeftForeArm", Some(8), [0.25, 0.0, 0.0]),
    ("LeftHand", Some(9), [0.25, 0.0, 0.0]),
    ("RightShoulder", Some(3), [-0.05, 0.1, 0.0]),
    ("RightArm", Some(11), [-0.1, 0.0, 0.0]),
    ("RightForeArm", Some(12), [-0.25, 0.0, 0.0]),
    ("RightHand", Some(13), [-0.25, 0.0, 0.0]),
    ("LeftUpLeg", Some(0), [0.1, -0.05, 0.0]),
    ("LeftLeg", Some(15), [0.0, -0.45, 0.0]),
    ("LeftFoot", Some(16), [0.0, -0.45, 0.0]),
    ("RightUpLeg", Some(0), [-0.1, -0.05, 0.0]),
    ("RightLeg", Some(18), [0.0, -0.45, 0.0]),
    ("RightFoot", Some(19), [0.0, -0.45, 0.0]),
];

pub fn humanoid(name: &str, scale: f32) -> Skeleton {
    humanoid_with(name, scale, |bone| bone.to_owned(), false)
}

/// Humanoid with renamed bones, optionally with a `LeftForeArm_added`
/// joint appended after all others and spliced between the arm and forearm.
pub fn humanoid_with(
    name: &str,
    scale: f32,
    rename: impl Fn(&str) -> String,
    added: bool,
) -> Skeleton {
    let offset = |v: [f32; 3]| {
        Transform::from_translation(na::Vector3::from(v) * scale)
    };

    let mut bones: Vec<Bone> = HUMANOID
        .iter()
        .map(|&(bone, parent, v)| Bone::new(rename(bone), parent, offset(v)))
        .collect();

    if added {
        let forearm = 9;
        let added = bones.len();
        bones.push(Bone::new(
            rename("LeftForeArm_added"),
            Some(8),
            offset([0.125, 0.0, 0.0]),
        ));
        bones[forearm].parent = Some(added);
        bones[forearm].reference = offset([0.125, 0.0, 0.0]);
    }

    Skeleton::new(name, bones).unwrap()
}

/// Humanoid with an extra leaf, which no chain layout accepts.
pub fn tailed(name: &str) -> Skeleton {
    let mut bones = humanoid(name, 1.0).bones().to_vec();
    bones.push(Bone::new("Tail", Some(0), Transform::identity()));
    Skeleton::new(name, bones).unwrap()
}

/// Clip moving the hips forward and swinging the left arm.
pub fn wave_clip(skeleton: &Skeleton, name: &str, frames: usize) -> AnimationClip {
    let mut clip = AnimationClip::new(name, skeleton.name(), 30.0, frames);
    let hips = skeleton.bones()[0].reference;
    let arm = skeleton.bones()[8].reference;

    let mut hips_track = BoneTrack::with_frames(&skeleton.bones()[0].name, frames);
    let mut arm_track = BoneTrack::with_frames(&skeleton.bones()[8].name, frames);

    for frame in 0..frames {
        let t = frame as f32 / frames.max(1) as f32;

        let mut key = hips;
        key.translation.z += t;
        hips_track.set_key(frame, &key);

        let mut key = arm;
        key.rotation = na::UnitQuaternion::from_euler_angles(0.0, 0.0, t);
        arm_track.set_key(frame, &key);
    }

    clip.tracks.push(hips_track);
    clip.tracks.push(arm_track);
    clip
}

pub fn write_asset(path: &Path, asset: &AssetFile) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let pretty = ron::ser::PrettyConfig::new();
    let text = ron::ser::to_string_pretty(asset, pretty).unwrap();
    fs::write(path, text).unwrap();
}

/// Writes a subset with the skeletons and `animations` clips of a
/// source humanoid.
pub fn write_subset(
    base: &Path,
    subset: &str,
    skeletons: &[Skeleton],
    animations: &[&str],
) -> PathBuf {
    let dir = base.join(subset);
    for skeleton in skeletons {
        let file = format!("{}.ron", skeleton.name());
        write_asset(
            &dir.join("Character").join(file),
            &AssetFile {
                skeleton: skeleton.clone(),
                animation: None,
                mesh: None,
            },
        );
    }

    let source = humanoid("Source", 1.0);
    for (i, name) in animations.iter().enumerate() {
        write_asset(
            &dir.join("Animation").join(format!("{}.ron", name)),
            &AssetFile {
                skeleton: source.clone(),
                animation: Some(wave_clip(&source, name, 3 + i)),
                mesh: None,
            },
        );
    }
    dir
}

/// File names in the `Retarget` directory of the subset, sorted.
pub fn outputs(subset_dir: &Path) -> Vec<String> {
    let entries = match fs::read_dir(subset_dir.join("Retarget")) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };
    let mut names: Vec<String> = entries
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
