use {
    crate::dataset::Subset,
    eyre::{Report, WrapErr},
    std::path::{Path, PathBuf},
};

/// Environment variable with the path to the config file.
pub const CONFIG_PATH_VAR: &str = "RETARGET_CONFIG_PATH";

/// Config file used when the variable is not set.
pub const DEFAULT_CONFIG_PATH: &str = "./retarget.ron";

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Config {
    /// Animations sampled per skeleton in the training subset.
    #[serde(default = "default_max_animations")]
    pub max_animations: usize,

    #[serde(default = "default_uniform_scale")]
    pub uniform_scale: f32,

    /// Working namespace of imported assets.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default = "default_subsets")]
    pub subsets: Vec<Subset>,

    /// Directory of worker log files.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Directory of persisted assets.
    #[serde(default = "default_content_dir")]
    pub content_dir: PathBuf,

    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_animations: default_max_animations(),
            uniform_scale: default_uniform_scale(),
            namespace: default_namespace(),
            subsets: default_subsets(),
            log_dir: default_log_dir(),
            content_dir: default_content_dir(),
            workers: default_workers(),
        }
    }
}

impl Config {
    /// Loads config from `RETARGET_CONFIG_PATH`, or from `./retarget.ron`
    /// if the variable is not set. Missing default file yields defaults.
    pub fn load_default() -> Result<Self, Report> {
        match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) => Self::load(PathBuf::from(path)),
            Err(_) => {
                let path = PathBuf::from(DEFAULT_CONFIG_PATH);
                if path.exists() {
                    Self::load(path)
                } else {
                    tracing::debug!("No config file, using defaults");
                    Ok(Config::default())
                }
            }
        }
    }

    #[tracing::instrument]
    pub fn load(path: PathBuf) -> Result<Self, Report> {
        let file = std::fs::File::open(&path).wrap_err_with(|| {
            format!("Failed to open config `{}`", path.display())
        })?;
        let config = ron::de::from_reader(file).wrap_err_with(|| {
            format!("Failed to parse config `{}`", path.display())
        })?;
        Ok(config)
    }

    /// Pipeline settings for one pair run.
    pub fn pipeline(&self, persist: bool, unattended: bool) -> PipelineConfig {
        PipelineConfig {
            persist,
            uniform_scale: self.uniform_scale,
            unattended,
            namespace: self.namespace.clone(),
        }
    }
}

/// Settings threaded through every stage of the pair pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    /// Save imported and generated assets under `content_dir`.
    pub persist: bool,

    /// Multiplier of translations fed to and read from the solver.
    pub uniform_scale: f32,

    /// No interactive session. Exports skip the preview mesh and cleanup
    /// runs a collection pass.
    pub unattended: bool,

    pub namespace: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Config::default().pipeline(false, true)
    }
}

impl PipelineConfig {
    /// Same settings with the namespace suffixed, e.g. `.../tmp/train_1`.
    pub fn with_namespace_suffix(&self, suffix: &str) -> Self {
        PipelineConfig {
            namespace: format!("{}/{}", self.namespace, suffix),
            ..self.clone()
        }
    }

    pub fn input_namespace(&self) -> String {
        format!("{}/input", self.namespace)
    }

    pub fn target_namespace(&self) -> String {
        format!("{}/target", self.namespace)
    }
}

/// Relative directory of a namespace, `/Game/A` becomes `Game/A`.
pub fn namespace_path(namespace: &str) -> &Path {
    Path::new(namespace.trim_start_matches('/'))
}

fn default_max_animations() -> usize {
    100
}

fn default_uniform_scale() -> f32 {
    1.0
}

fn default_namespace() -> String {
    "/Game/Animations/tmp".to_owned()
}

fn default_subsets() -> Vec<Subset> {
    Subset::ALL.to_vec()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("Saved/Logs")
}

fn default_content_dir() -> PathBuf {
    PathBuf::from("Saved/Content")
}

fn default_workers() -> usize {
    2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = ron::de::from_str("()").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.max_animations, 100);
        assert_eq!(config.workers, 2);
        assert_eq!(config.subsets, Subset::ALL.to_vec());
    }

    #[test]
    fn partial_config() {
        let config: Config =
            ron::de::from_str("(max_animations: 3, subsets: [val])").unwrap();
        assert_eq!(config.max_animations, 3);
        assert_eq!(config.subsets, vec![Subset::Val]);
        assert_eq!(config.uniform_scale, 1.0);
    }

    #[test]
    fn namespaces() {
        let pipeline = Config::default()
            .pipeline(true, true)
            .with_namespace_suffix("train_1");

        assert_eq!(pipeline.namespace, "/Game/Animations/tmp/train_1");
        assert_eq!(
            pipeline.input_namespace(),
            "/Game/Animations/tmp/train_1/input"
        );
        assert_eq!(
            namespace_path(&pipeline.target_namespace()),
            Path::new("Game/Animations/tmp/train_1/target")
        );
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(dir.path().join("missing.ron")).is_err());
    }
}
