use {
    super::{
        asset_names, export_payload, validate, AssetError, AssetFile,
        AssetStore, ExportOptions, Namespaces, StoredAsset,
    },
    std::{
        collections::HashMap,
        path::{Path, PathBuf},
    },
};

/// Store keeping files in memory. Used where touching the file system is
/// not wanted.
#[derive(Debug, Default)]
pub struct MemoryAssetStore {
    files: HashMap<PathBuf, AssetFile>,
    persisted: HashMap<String, StoredAsset>,
    namespaces: Namespaces,
    failing_exports: Vec<PathBuf>,
}

impl MemoryAssetStore {
    pub const EXTENSION: &'static str = "ron";

    pub fn new() -> Self {
        MemoryAssetStore::default()
    }

    /// Places asset file at the path.
    pub fn insert(&mut self, path: impl Into<PathBuf>, asset: AssetFile) {
        self.files.insert(path.into(), asset);
    }

    pub fn get(&self, path: &Path) -> Option<&AssetFile> {
        self.files.get(path)
    }

    /// Makes exports to the path fail.
    pub fn fail_exports_to(&mut self, path: impl Into<PathBuf>) {
        self.failing_exports.push(path.into());
    }

    /// Asset persisted under `<namespace>/<name>`.
    pub fn persisted(&self, namespace: &str, name: &str) -> Option<&StoredAsset> {
        self.persisted.get(&format!("{}/{}", namespace, name))
    }

    pub fn persisted_count(&self) -> usize {
        self.persisted.len()
    }
}

impl AssetStore for MemoryAssetStore {
    fn extension(&self) -> &str {
        Self::EXTENSION
    }

    fn import(
        &mut self,
        path: &Path,
        namespace: &str,
    ) -> Result<AssetFile, AssetError> {
        let asset = self
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| AssetError::NotFound {
                path: path.to_owned(),
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
        if self.failing_exports.iter().any(|p| p == path) {
            return Err(AssetError::Io {
                path: path.to_owned(),
                source: std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "export disabled",
                ),
            });
        }
        self.files
            .insert(path.to_owned(), export_payload(asset, options));
        Ok(())
    }

    fn persist(
        &mut self,
        namespace: &str,
        name: &str,
        asset: &StoredAsset,
    ) -> Result<(), AssetError> {
        self.persisted
            .insert(format!("{}/{}", namespace, name), asset.clone());
        Ok(())
    }

    fn collect_garbage(&mut self) -> usize {
        self.namespaces.collect()
    }
}
