use {
    super::{
        asset_names, export_payload, validate, AssetError, AssetFile,
        AssetStore, ExportOptions, Namespaces, StoredAsset,
    },
    crate::config::namespace_path,
    ron::ser::PrettyConfig,
    serde::Serialize,
    std::{
        fs,
        path::{Path, PathBuf},
    },
};

/// Store of `.ron` asset files.
#[derive(Debug)]
pub struct RonAssetStore {
    content_dir: PathBuf,
    namespaces: Namespaces,
}

impl RonAssetStore {
    pub const EXTENSION: &'static str = "ron";

    /// Store persisting assets under `content_dir`.
    pub fn new(content_dir: impl Into<PathBuf>) -> Self {
        RonAssetStore {
            content_dir: content_dir.into(),
            namespaces: Namespaces::default(),
        }
    }
}

impl AssetStore for RonAssetStore {
    fn extension(&self) -> &str {
        Self::EXTENSION
    }

    #[tracing::instrument(skip(self))]
    fn import(
        &mut self,
        path: &Path,
        namespace: &str,
    ) -> Result<AssetFile, AssetError> {
        if !path.is_file() {
            return Err(AssetError::NotFound {
                path: path.to_owned(),
            });
        }

        let file = fs::File::open(path).map_err(|source| AssetError::Io {
            path: path.to_owned(),
            source,
        })?;

        let asset: AssetFile =
            ron::de::from_reader(file).map_err(|source| AssetError::Parse {
                path: path.to_owned(),
                source,
            })?;
        validate(&asset, path)?;

        for name in asset_names(&asset) {
            self.namespaces.insert(namespace, name);
        }
        Ok(asset)
    }

    fn occupants(&self, namespace: &str) -> usize {
        self.namespaces.occupants(namespace)
    }

    fn release(&mut self, namespace: &str) -> usize {
        self.namespaces.release(namespace)
    }

    fn export(
        &mut self,
        asset: &AssetFile,
        path: &Path,
        options: ExportOptions,
    ) -> Result<(), AssetError> {
        let name = path.display().to_string();
        let text = to_ron(&export_payload(asset, options), &name)?;
        write_atomic(path, &text)
    }

    fn persist(
        &mut self,
        namespace: &str,
        name: &str,
        asset: &StoredAsset,
    ) -> Result<(), AssetError> {
        let path = self
            .content_dir
            .join(namespace_path(namespace))
            .join(name)
            .with_extension(Self::EXTENSION);

        let text = to_ron(asset, name)?;
        write_atomic(&path, &text)?;
        tracing::debug!("Persisted `{}` at {}", name, path.display());
        Ok(())
    }

    fn collect_garbage(&mut self) -> usize {
        self.namespaces.collect()
    }
}

fn to_ron<T: Serialize>(value: &T, name: &str) -> Result<String, AssetError> {
    ron::ser::to_string_pretty(value, PrettyConfig::new()).map_err(|source| {
        AssetError::Serialize {
            name: name.to_owned(),
            source,
        }
    })
}

/// Writes into a temporary sibling and renames it over `path`.
fn write_atomic(path: &Path, text: &str) -> Result<(), AssetError> {
    let io_error = |path: &Path| {
        let path = path.to_owned();
        move |source| AssetError::Io { path, source }
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }

    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);

    let result = fs::write(&temp, text)
        .and_then(|()| fs::rename(&temp, path))
        .map_err(io_error(path));

    if result.is_err() {
        let _ = fs::remove_file(&temp);
    }
    result
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::fixtures::{humanoid, wave_clip},
    };

    fn asset(with_mesh: bool) -> AssetFile {
        let skeleton = humanoid("Bot", 1.0);
        let animation = wave_clip(&skeleton, "Walk", 4);
        let mesh = super::super::SkinnedMesh {
            name: "BotMesh".to_owned(),
            skeleton: "Bot".to_owned(),
            positions: vec![[0.0; 3]; 3],
            indices: vec![0, 1, 2],
        };
        AssetFile {
            skeleton,
            animation: Some(animation),
            mesh: if with_mesh { Some(mesh) } else { None },
        }
    }

    #[test]
    fn export_then_import() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("Bot__Walk.ron");
        let mut store = RonAssetStore::new(dir.path().join("content"));

        store
            .export(&asset(true), &path, ExportOptions { preview_mesh: false })
            .unwrap();
        assert!(path.is_file());
        assert!(!dir.path().join("out").join("Bot__Walk.ron.tmp").exists());

        let imported = store.import(&path, "/ns/input").unwrap();
        assert_eq!(imported.skeleton.len(), 21);
        assert!(imported.mesh.is_none());
        assert_eq!(imported.animation.unwrap().num_frames, 4);
        assert_eq!(store.occupants("/ns/input"), 2);

        assert_eq!(store.release("/ns/input"), 2);
        assert_eq!(store.collect_garbage(), 2);
    }

    #[test]
    fn preview_mesh_is_kept_on_request() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preview.ron");
        let mut store = RonAssetStore::new(dir.path());

        store
            .export(&asset(true), &path, ExportOptions { preview_mesh: true })
            .unwrap();
        let imported = store.import(&path, "/ns").unwrap();
        assert_eq!(imported.mesh.unwrap().indices, vec![0, 1, 2]);
        assert_eq!(store.occupants("/ns"), 3);
    }

    #[test]
    fn matrix_references_are_decomposed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Matrix.ron");
        fs::write(
            &path,
            r#"(
                skeleton: (
                    name: "Matrix",
                    bones: [
                        (name: "Root"),
                        (
                            name: "Child",
                            parent: Some(0),
                            reference: (matrix: [
                                [2.0, 0.0, 0.0, 0.0],
                                [0.0, 2.0, 0.0, 0.0],
                                [0.0, 0.0, 2.0, 0.0],
                                [1.0, 2.0, 3.0, 1.0],
                            ]),
                        ),
                    ],
                ),
            )"#,
        )
        .unwrap();

        let mut store = RonAssetStore::new(dir.path());
        let imported = store.import(&path, "/ns").unwrap();
        let child = imported.skeleton.bones()[1].reference;
        assert!((child.translation.x - 1.0).abs() < 1e-6);
        assert!((child.translation.z - 3.0).abs() < 1e-6);
        assert!((child.scale.y - 2.0).abs() < 1e-6);
    }

    #[test]
    fn missing_and_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = RonAssetStore::new(dir.path());

        let missing = store.import(&dir.path().join("none.ron"), "/ns");
        assert!(matches!(missing, Err(AssetError::NotFound { .. })));

        let broken = dir.path().join("broken.ron");
        fs::write(&broken, "(skeleton: (name: \"X\", bones: []))").unwrap();
        let broken = store.import(&broken, "/ns");
        assert!(matches!(broken, Err(AssetError::Parse { .. })));
        assert_eq!(store.occupants("/ns"), 0);
    }

    #[test]
    fn persist_under_namespace() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = RonAssetStore::new(dir.path());
        let skeleton = humanoid("Bot", 1.0);

        store
            .persist("/Game/tmp/input", "Bot", &StoredAsset::Skeleton(skeleton))
            .unwrap();
        assert!(dir.path().join("Game/tmp/input/Bot.ron").is_file());
    }
}
