//! Asset import, export and working namespaces.

mod memory;
mod ron_file;

pub use self::{memory::MemoryAssetStore, ron_file::RonAssetStore};

use {
    crate::rig::{RetargetDefinition, RetargetProfile},
    animate::{AnimationClip, ClipError, Skeleton},
    std::{collections::HashMap, io, path::{Path, PathBuf}},
};

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("Failed to access `{path}`")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse `{path}`")]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::Error,
    },

    #[error("Failed to serialize `{name}`")]
    Serialize {
        name: String,
        #[source]
        source: ron::Error,
    },

    #[error("Asset `{path}` not found")]
    NotFound { path: PathBuf },

    #[error("Asset `{path}` has invalid animation")]
    Clip {
        path: PathBuf,
        #[source]
        source: ClipError,
    },
}

/// Mesh skinned to a skeleton. Only carried along as export preview.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SkinnedMesh {
    pub name: String,
    pub skeleton: String,

    #[serde(default)]
    pub positions: Vec<[f32; 3]>,

    #[serde(default)]
    pub indices: Vec<u32>,
}

/// Content of one asset file: a skeleton, optionally with an animation
/// and a preview mesh.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct AssetFile {
    pub skeleton: Skeleton,

    #[serde(default)]
    pub animation: Option<AnimationClip>,

    #[serde(default)]
    pub mesh: Option<SkinnedMesh>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExportOptions {
    /// Include the preview mesh into the exported file.
    pub preview_mesh: bool,
}

/// Assets saved with persist mode on.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub enum StoredAsset {
    Skeleton(Skeleton),
    Animation(AnimationClip),
    Definition(RetargetDefinition),
    Profile(RetargetProfile),
}

/// Loads and saves assets. Imported assets occupy a working namespace
/// until released.
pub trait AssetStore {
    /// Extension of asset files, without the dot.
    fn extension(&self) -> &str;

    /// Imports asset file into the namespace.
    fn import(
        &mut self,
        path: &Path,
        namespace: &str,
    ) -> Result<AssetFile, AssetError>;

    /// Number of assets living in the namespace.
    fn occupants(&self, namespace: &str) -> usize;

    /// Releases every asset of the namespace, returns how many.
    fn release(&mut self, namespace: &str) -> usize;

    /// Writes asset to the path, creating parent directories.
    /// Nothing is left at `path` if writing fails.
    fn export(
        &mut self,
        asset: &AssetFile,
        path: &Path,
        options: ExportOptions,
    ) -> Result<(), AssetError>;

    /// Saves asset into the namespace of the content directory.
    fn persist(
        &mut self,
        namespace: &str,
        name: &str,
        asset: &StoredAsset,
    ) -> Result<(), AssetError>;

    /// Drops released assets, returns how many.
    fn collect_garbage(&mut self) -> usize;
}

/// Names of assets per namespace, with released ones pending collection.
#[derive(Debug, Default)]
pub struct Namespaces {
    loaded: HashMap<String, Vec<String>>,
    released: Vec<String>,
}

impl Namespaces {
    pub fn insert(&mut self, namespace: &str, name: impl Into<String>) {
        self.loaded
            .entry(namespace.to_owned())
            .or_default()
            .push(name.into());
    }

    pub fn occupants(&self, namespace: &str) -> usize {
        self.loaded.get(namespace).map_or(0, Vec::len)
    }

    pub fn release(&mut self, namespace: &str) -> usize {
        match self.loaded.remove(namespace) {
            Some(names) => {
                let count = names.len();
                self.released.extend(names);
                count
            }
            None => 0,
        }
    }

    pub fn collect(&mut self) -> usize {
        let count = self.released.len();
        self.released.clear();
        count
    }
}

/// Strips the preview mesh unless requested.
fn export_payload(asset: &AssetFile, options: ExportOptions) -> AssetFile {
    AssetFile {
        skeleton: asset.skeleton.clone(),
        animation: asset.animation.clone(),
        mesh: if options.preview_mesh {
            asset.mesh.clone()
        } else {
            None
        },
    }
}

fn validate(asset: &AssetFile, path: &Path) -> Result<(), AssetError> {
    if let Some(animation) = &asset.animation {
        animation.validate().map_err(|source| AssetError::Clip {
            path: path.to_owned(),
            source,
        })?;
    }
    Ok(())
}

/// Names given to assets of the file in a namespace.
fn asset_names(asset: &AssetFile) -> Vec<String> {
    let mut names = vec![asset.skeleton.name().to_owned()];
    names.extend(asset.animation.as_ref().map(|clip| clip.name.clone()));
    names.extend(asset.mesh.as_ref().map(|mesh| mesh.name.clone()));
    names
}
