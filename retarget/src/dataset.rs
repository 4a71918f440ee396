use std::{
    fmt,
    fs,
    io,
    path::{Path, PathBuf},
    str::FromStr,
};

pub const CHARACTER_DIR: &str = "Character";
pub const ANIMATION_DIR: &str = "Animation";
pub const RETARGET_DIR: &str = "Retarget";

/// Dataset split.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Subset {
    Train,
    Val,
    Test,
}

impl Subset {
    pub const ALL: [Subset; 3] = [Subset::Train, Subset::Val, Subset::Test];

    pub fn as_str(&self) -> &'static str {
        match self {
            Subset::Train => "train",
            Subset::Val => "val",
            Subset::Test => "test",
        }
    }

    /// Only the training split samples a bounded set of animations per
    /// skeleton. Validation and test pair every skeleton with every clip.
    pub fn samples_animations(&self) -> bool {
        matches!(self, Subset::Train)
    }
}

impl fmt::Display for Subset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown subset `{0}`, expected one of `train`, `val`, `test`")]
pub struct UnknownSubset(pub String);

impl FromStr for Subset {
    type Err = UnknownSubset;

    fn from_str(s: &str) -> Result<Self, UnknownSubset> {
        match s {
            "train" => Ok(Subset::Train),
            "val" => Ok(Subset::Val),
            "test" => Ok(Subset::Test),
            _ => Err(UnknownSubset(s.to_owned())),
        }
    }
}

/// Skeleton and animation files of one subset, sorted by file name.
#[derive(Clone, Debug, Default)]
pub struct SubsetFiles {
    pub skeletons: Vec<PathBuf>,
    pub animations: Vec<PathBuf>,
}

impl SubsetFiles {
    /// Nothing to pair when either side is empty.
    pub fn is_empty(&self) -> bool {
        self.skeletons.is_empty() || self.animations.is_empty()
    }
}

/// Lists assets of a subset directory.
pub fn scan_subset(subset_dir: &Path, extension: &str) -> SubsetFiles {
    SubsetFiles {
        skeletons: list_assets(&subset_dir.join(CHARACTER_DIR), extension),
        animations: list_assets(&subset_dir.join(ANIMATION_DIR), extension),
    }
}

/// Files with the extension directly inside `dir`, sorted by file name.
/// Missing or unreadable directory yields an empty list.
pub fn list_assets(dir: &Path, extension: &str) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::debug!("Cannot list {}: {}", dir.display(), err);
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && has_extension(path, extension))
        .collect();

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    files
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case(extension))
}

/// File stem used in output names.
pub fn base_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `<skeleton>__<animation>.<ext>`
pub fn output_file_name(
    skeleton: &Path,
    animation: &Path,
    extension: &str,
) -> String {
    format!(
        "{}__{}.{}",
        base_name(skeleton),
        base_name(animation),
        extension
    )
}

/// Deletes and recreates `Retarget` directory of the subset.
pub fn reset_output_dir(subset_dir: &Path) -> io::Result<PathBuf> {
    let dir = subset_dir.join(RETARGET_DIR);
    if dir.exists() {
        tracing::info!("Clearing existing Retarget directory: {}", dir.display());
        fs::remove_dir_all(&dir)?;
    }
    fs::create_dir_all(&dir)?;
    Ok(dir)
}
