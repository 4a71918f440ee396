use crate::{pose::Pose, skeleton::Skeleton, transform::Transform};

#[derive(Debug, thiserror::Error)]
pub enum ClipError {
    #[error("Clip `{clip}` has invalid frame rate {frame_rate}")]
    InvalidFrameRate { clip: String, frame_rate: f32 },

    #[error(
        "Track `{bone}` of clip `{clip}` has {keys} keys, expected {frames}"
    )]
    KeyCountMismatch {
        clip: String,
        bone: String,
        keys: usize,
        frames: usize,
    },

    #[error("Track `{bone}` already exists in clip `{clip}`")]
    TrackExists { clip: String, bone: String },

    #[error("Track `{bone}` does not exist in clip `{clip}`")]
    MissingTrack { clip: String, bone: String },
}

/// Raw keys of a single bone. All arrays have one key per frame.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BoneTrack {
    pub bone: String,
    pub positions: Vec<[f32; 3]>,
    pub rotations: Vec<[f32; 4]>,
    pub scales: Vec<[f32; 3]>,
}

impl BoneTrack {
    /// Creates track with `frames` identity keys.
    pub fn with_frames(bone: impl Into<String>, frames: usize) -> Self {
        BoneTrack {
            bone: bone.into(),
            positions: vec![[0.0; 3]; frames],
            rotations: vec![[0.0, 0.0, 0.0, 1.0]; frames],
            scales: vec![[1.0; 3]; frames],
        }
    }

    pub fn key(&self, frame: usize) -> Transform {
        Transform::from_parts(
            self.positions[frame],
            self.rotations[frame],
            self.scales[frame],
        )
    }

    pub fn set_key(&mut self, frame: usize, transform: &Transform) {
        self.positions[frame] = transform.translation.into();
        self.rotations[frame] = transform.rotation_xyzw();
        self.scales[frame] = transform.scale.into();
    }

    fn key_count(&self) -> Option<usize> {
        let n = self.positions.len();
        if self.rotations.len() == n && self.scales.len() == n {
            Some(n)
        } else {
            None
        }
    }
}

/// Sampled animation bound to a skeleton by name.
/// Bones without a track hold their reference pose.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AnimationClip {
    pub name: String,
    pub skeleton: String,
    pub frame_rate: f32,
    pub num_frames: usize,

    #[serde(default)]
    pub tracks: Vec<BoneTrack>,
}

impl AnimationClip {
    pub fn new(
        name: impl Into<String>,
        skeleton: impl Into<String>,
        frame_rate: f32,
        num_frames: usize,
    ) -> Self {
        AnimationClip {
            name: name.into(),
            skeleton: skeleton.into(),
            frame_rate,
            num_frames,
            tracks: Vec::new(),
        }
    }

    /// Checks the frame rate and that every track has a key per frame.
    pub fn validate(&self) -> Result<(), ClipError> {
        if !(self.frame_rate.is_finite() && self.frame_rate > 0.0) {
            return Err(ClipError::InvalidFrameRate {
                clip: self.name.clone(),
                frame_rate: self.frame_rate,
            });
        }

        for track in &self.tracks {
            let keys = track.key_count();
            if keys != Some(self.num_frames) {
                return Err(ClipError::KeyCountMismatch {
                    clip: self.name.clone(),
                    bone: track.bone.clone(),
                    keys: keys.unwrap_or(track.positions.len()),
                    frames: self.num_frames,
                });
            }
        }
        Ok(())
    }

    /// Time of the frame in seconds. Frame 0 is at time 0.
    pub fn time_at_frame(&self, frame: usize) -> f32 {
        frame as f32 / self.frame_rate
    }

    pub fn track(&self, bone: &str) -> Option<&BoneTrack> {
        self.tracks.iter().find(|track| track.bone == bone)
    }

    pub fn has_track(&self, bone: &str) -> bool {
        self.track(bone).is_some()
    }

    pub fn track_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.tracks.iter().map(|track| track.bone.as_str())
    }

    /// Adds empty track for the bone.
    pub fn add_track(&mut self, bone: &str) -> Result<(), ClipError> {
        if self.has_track(bone) {
            return Err(ClipError::TrackExists {
                clip: self.name.clone(),
                bone: bone.to_owned(),
            });
        }
        self.tracks.push(BoneTrack::with_frames(bone, self.num_frames));
        Ok(())
    }

    /// Replaces keys of an existing track.
    pub fn set_track_keys(&mut self, keys: BoneTrack) -> Result<(), ClipError> {
        if keys.key_count() != Some(self.num_frames) {
            return Err(ClipError::KeyCountMismatch {
                clip: self.name.clone(),
                keys: keys.positions.len(),
                bone: keys.bone,
                frames: self.num_frames,
            });
        }

        match self.tracks.iter_mut().find(|track| track.bone == keys.bone) {
            Some(track) => {
                *track = keys;
                Ok(())
            }
            None => Err(ClipError::MissingTrack {
                clip: self.name.clone(),
                bone: keys.bone,
            }),
        }
    }

    /// Binds the clip to another skeleton, dropping tracks of bones
    /// the skeleton does not have.
    pub fn rebind(&mut self, skeleton: &Skeleton) {
        self.skeleton = skeleton.name().to_owned();
        let dropped = self.tracks.len();
        self.tracks
            .retain(|track| skeleton.find(&track.bone).is_some());
        let dropped = dropped - self.tracks.len();
        if dropped > 0 {
            tracing::debug!(
                "Dropped {} tracks of `{}` not present in skeleton `{}`",
                dropped,
                self.name,
                skeleton.name()
            );
        }
    }

    /// Local pose of the skeleton at the frame.
    pub fn sample_local(&self, skeleton: &Skeleton, frame: usize) -> Pose {
        let mut pose = skeleton.reference_pose();
        for track in &self.tracks {
            if let Some(index) = skeleton.find(&track.bone) {
                pose[index] = track.key(frame);
            }
        }
        pose
    }

    /// Component space pose of the skeleton at the frame.
    pub fn sample_component(&self, skeleton: &Skeleton, frame: usize) -> Pose {
        skeleton.to_component(&self.sample_local(skeleton, frame))
    }
}
