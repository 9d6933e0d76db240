//! Benchmark program configuration format.

use crate::common::*;

pub use cache_config::*;
pub use dataset::*;
pub use model::*;

pub static CONFIG_VERSION: Lazy<VersionReq> = Lazy::new(|| VersionReq::parse("0.1.0").unwrap());

/// The main benchmark configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(deserialize_with = "deserialize_version")]
    pub version: Version,
    pub cache: CacheConfig,
    /// Datasets by name, referred to by the `dname` of experiments.
    pub datasets: IndexMap<String, DatasetKind>,
    pub model: ModelConfig,
    /// The flow estimator, required by experiments with `flow` enabled.
    pub flow: Option<FlowConfig>,
    /// The option lists meshed into experiments.
    pub experiments: MeshGroups,
    /// Values filled into experiments that do not set them.
    #[serde(default)]
    pub defaults: ConfigMap,
    #[serde(default)]
    pub report: ReportConfig,
}

impl Config {
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let text = fs::read_to_string(path)?;
        let config = json5::from_str(&text)?;
        Ok(config)
    }

    pub fn dataset(&self, dname: &str) -> Result<&DatasetKind> {
        self.datasets
            .get(dname)
            .ok_or_else(|| format_err!("dataset '{}' is not configured", dname))
    }
}

mod cache_config {
    use super::*;

    /// Experiment cache options.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct CacheConfig {
        /// The root directory of caches.
        pub dir: PathBuf,
        /// The cache name. Each name has its own directory under `dir`.
        pub name: String,
        /// Drop every cached result before running.
        #[serde(default)]
        pub clear_all: bool,
        /// Always recompute experiments that load fine-tuned checkpoints.
        #[serde(default)]
        pub refresh_trained: bool,
    }
}

mod dataset {
    use super::*;

    /// Variants of dataset and options.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(tag = "type")]
    pub enum DatasetKind {
        /// Blur/sharp frame pairs laid out as
        /// `<dataset_dir>/<split>/<video>/{blur,sharp}/*.png`.
        GoPro { dataset_dir: PathBuf },
    }
}

mod model {
    use super::*;

    /// Model configuration.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ModelConfig {
        /// Holds the pretrained TorchScript module `<model_type>.pt` per variant.
        pub weights_dir: PathBuf,
        /// Holds fine-tuned TorchScript modules.
        pub checkpoint_dir: PathBuf,
        /// Fine-tuned checkpoint loading method.
        pub load_checkpoint: LoadCheckpoint,
        /// Frames are padded to squares with sides of multiples of this factor.
        #[serde(default = "default_square_factor")]
        pub square_factor: i64,
        /// The number of frames fed to the model at once.
        #[serde(default = "default_temporal_chunk")]
        pub temporal_chunk: i64,
    }

    /// Checkpoint file loading method.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(tag = "type")]
    pub enum LoadCheckpoint {
        /// Disable checkpoint file loading.
        Disabled,
        /// Load the most recent checkpoint file.
        FromRecent,
        /// Load the checkpoint file at specified path.
        FromFile { file: PathBuf },
    }

    /// Optical flow estimator configuration.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct FlowConfig {
        /// TorchScript module computing `(forward, backward)` flows from `(frames, sigma)`.
        pub script_file: PathBuf,
    }

    fn default_square_factor() -> i64 {
        16
    }

    fn default_temporal_chunk() -> i64 {
        2
    }
}

/// Report options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// The CSV file receiving the per-group summary.
    pub csv_file: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            csv_file: PathBuf::from("report.csv"),
        }
    }
}

pub fn deserialize_version<'de, D>(deserializer: D) -> Result<Version, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    let version = Version::parse(&text).map_err(|err| {
        D::Error::custom(format!(
            "failed to parse version number '{}': {:?}",
            text, err
        ))
    })?;

    if !CONFIG_VERSION.matches(&version) {
        return Err(D::Error::custom(format!(
            "incompatible version: get '{}', but it is incompatible with requirement '{}'",
            version, &*CONFIG_VERSION,
        )));
    }

    Ok(version)
}
