//! Retarget chains inferred from bone names.
//!
//! Works with skeletons that use the conventional humanoid joint names in
//! any letter case. Extra joints inserted between the conventional ones must
//! carry `_added` in their name: they are never chain anchors but chains run
//! through them.

use {
    crate::rig::{BoneChain, RetargetDefinition},
    animate::Skeleton,
    std::collections::HashMap,
};

/// Marker of joints inserted between conventional ones.
pub const ADDED_MARKER: &str = "_added";

/// Retarget root; walks from the legs stop here.
pub const HIPS: &str = "hips";

/// Top of the spine chain; walks from the arms and head stop here.
pub const SPINE_TOP: &str = "spine2";

/// Bones that start a chain named after them.
pub const CHAIN_TOKENS: [&str; 13] = [
    "spine",
    "neck",
    "head",
    "leftshoulder",
    "rightshoulder",
    "leftarm",
    "leftforearm",
    "rightarm",
    "rightforearm",
    "leftupleg",
    "leftleg",
    "rightupleg",
    "rightleg",
];

/// Spine top plus head, two hands and two feet.
pub const EXPECTED_END_BONES: usize = 6;

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error(
        "Unsupported skeleton topology in `{skeleton}`: no `{bone}` bone"
    )]
    MissingAnchor {
        skeleton: String,
        bone: &'static str,
    },

    #[error(
        "Unsupported skeleton topology in `{skeleton}`: {found} end bones, expected {expected}"
    )]
    EndBoneCount {
        skeleton: String,
        found: usize,
        expected: usize,
    },
}

/// Infers limb chains of the skeleton.
pub fn infer_chains(skeleton: &Skeleton) -> Result<Vec<BoneChain>, ChainError> {
    let mut by_name = HashMap::with_capacity(skeleton.len());
    for (index, bone) in skeleton.bones().iter().enumerate() {
        let lower = bone.name.to_lowercase();
        if lower.contains(ADDED_MARKER) {
            continue;
        }
        by_name.insert(lower, index);
    }

    let anchor = |bone: &'static str| {
        by_name.get(bone).copied().ok_or_else(|| ChainError::MissingAnchor {
            skeleton: skeleton.name().to_owned(),
            bone,
        })
    };
    let hips = anchor(HIPS)?;
    let spine_top = anchor(SPINE_TOP)?;

    let mut chain_names = HashMap::with_capacity(CHAIN_TOKENS.len());
    for &token in CHAIN_TOKENS.iter() {
        match by_name.get(token) {
            Some(&index) => {
                chain_names.insert(index, token);
            }
            None => tracing::debug!(
                "Bone `{}` not found in `{}`",
                token,
                skeleton.name()
            ),
        }
    }

    let mut ends = Vec::with_capacity(EXPECTED_END_BONES);
    ends.push(spine_top);
    ends.extend(skeleton.leaves());
    if ends.len() != EXPECTED_END_BONES {
        return Err(ChainError::EndBoneCount {
            skeleton: skeleton.name().to_owned(),
            found: ends.len(),
            expected: EXPECTED_END_BONES,
        });
    }

    let mut chains: Vec<BoneChain> = Vec::new();
    for &end in &ends {
        let mut chain_end = end;
        let mut current = Some(end);

        while let Some(index) = current {
            if index == hips {
                break;
            }

            let parent = skeleton.parent(index);
            if let Some(&name) = chain_names.get(&index) {
                let chain = BoneChain {
                    name: name.to_owned(),
                    start: skeleton.bone_name(index).to_owned(),
                    end: skeleton.bone_name(chain_end).to_owned(),
                };
                tracing::debug!(
                    "Chain `{}`: {} -> {}",
                    chain.name,
                    chain.start,
                    chain.end
                );
                match chains.iter_mut().find(|c| c.name == chain.name) {
                    Some(existing) => *existing = chain,
                    None => chains.push(chain),
                }

                match parent {
                    Some(parent) => chain_end = parent,
                    None => break,
                }
            }

            current = parent;
            if current == Some(spine_top) {
                break;
            }
        }
    }

    Ok(chains)
}

/// Retarget definition rooted at the hips.
pub fn build_definition(
    skeleton: &Skeleton,
) -> Result<RetargetDefinition, ChainError> {
    let chains = infer_chains(skeleton)?;

    // `infer_chains` already proved the hips exist.
    let root = skeleton
        .bones()
        .iter()
        .find(|bone| {
            let lower = bone.name.to_lowercase();
            lower == HIPS
        })
        .map(|bone| bone.name.clone())
        .unwrap_or_else(|| HIPS.to_owned());

    Ok(RetargetDefinition {
        skeleton: skeleton.name().to_owned(),
        root,
        chains,
    })
}
