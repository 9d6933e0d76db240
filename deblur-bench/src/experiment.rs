//! Experiment configurations and results.

use crate::common::*;

pub use image_size::ImageSize;

/// The network variants under evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ModelType {
    /// The published Restormer.
    Original,
    AugRefactored,
    AugDnls,
    ProductDnls,
}

impl ModelType {
    pub fn name(&self) -> &str {
        self.as_ref()
    }

    /// Augmented variants take search windows and optical flows as extra inputs.
    pub fn is_augmented(&self) -> bool {
        !matches!(self, Self::Original)
    }
}

/// Dataset splits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Split {
    #[serde(rename = "tr")]
    Train,
    #[serde(rename = "val")]
    Val,
    #[serde(rename = "te")]
    Test,
}

impl Split {
    /// The directory name of the split in a dataset.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Val => "val",
            Self::Test => "test",
        }
    }
}

/// A single concrete experiment.
///
/// Two experiments with equal fields share a cache slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpConfig {
    /// Dataset name, a key of the configured datasets.
    pub dname: String,
    pub dset: Split,
    pub vid_name: String,
    /// Estimate optical flow before inference.
    #[serde(default, with = "flag")]
    pub flow: bool,
    /// Spatial search window.
    #[serde(default = "default_window")]
    pub ws: i64,
    /// Temporal search window.
    #[serde(default = "default_window")]
    pub wt: i64,
    /// Center crop size.
    #[serde(default, with = "image_size")]
    pub isize: Option<ImageSize>,
    #[serde(default = "default_stride")]
    pub stride: usize,
    pub model_type: ModelType,
    /// Use the fine-tuned checkpoint instead of the pretrained weights.
    #[serde(default, with = "flag")]
    pub use_train: bool,
    /// Frames per sample. Zero takes each video as a single sample.
    #[serde(default)]
    pub nframes: usize,
    #[serde(default = "default_frame_bound")]
    pub frame_start: i64,
    #[serde(default = "default_frame_bound")]
    pub frame_end: i64,
    #[serde(default = "default_saved_dir")]
    pub saved_dir: PathBuf,
    /// `cpu`, `cuda` or `cuda:N`.
    #[serde(default = "default_device")]
    pub device: String,
    /// Noise level handed to the flow estimator.
    #[serde(default = "default_sigma")]
    pub sigma: R64,
}

impl ExpConfig {
    /// Builds an experiment from a meshed configuration.
    pub fn from_map(map: ConfigMap) -> Result<Self> {
        let text = Value::Object(map.clone()).to_string();
        let config: Self = serde_json::from_value(Value::Object(map))
            .with_context(|| format!("invalid experiment configuration {}", text))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        ensure!(self.stride > 0, "stride must be positive");
        ensure!(!self.vid_name.is_empty(), "vid_name must not be empty");
        if let Some((start, end)) = self.frame_bounds() {
            ensure!(
                start <= end,
                "frame_start {} is greater than frame_end {}",
                start,
                end
            );
        }
        self.tch_device()?;
        Ok(())
    }

    /// The inclusive frame bounds, if both are set.
    pub fn frame_bounds(&self) -> Option<(i64, i64)> {
        (self.frame_start >= 0 && self.frame_end >= 0)
            .then(|| (self.frame_start, self.frame_end))
    }

    pub fn tch_device(&self) -> Result<Device> {
        parse_device(&self.device)
    }

    /// The directory where deblurred frames are saved.
    pub fn output_dir(&self) -> PathBuf {
        self.saved_dir
            .join(&self.dname)
            .join(self.model_type.name())
            .join(&self.vid_name)
    }
}

/// Meshes the experiment groups, fills the defaults and parses the results.
pub fn mesh_experiments(groups: &MeshGroups, defaults: &ConfigMap) -> Result<Vec<ExpConfig>> {
    let mut maps = groups.mesh();
    cache::append_defaults(&mut maps, defaults);
    ensure!(!maps.is_empty(), "the experiment mesh is empty");

    let exps: Vec<_> = maps.into_iter().map(ExpConfig::from_map).try_collect()?;
    Ok(exps)
}

/// Parses `cpu`, `cuda` and `cuda:N`.
pub fn parse_device(text: &str) -> Result<Device> {
    let device = match text {
        "cpu" => Device::Cpu,
        "cuda" => Device::Cuda(0),
        _ => {
            let index = text
                .strip_prefix("cuda:")
                .and_then(|index| index.parse::<usize>().ok())
                .ok_or_else(|| format_err!("invalid device name '{}'", text))?;
            Device::Cuda(index)
        }
    };
    Ok(device)
}

/// The outcome of one experiment, one entry per evaluated sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpResults {
    /// Per-frame PSNR of the deblurred frames.
    pub psnrs: Vec<Vec<f64>>,
    pub ssims: Vec<Vec<f64>>,
    /// Per-frame PSNR of the blurred input.
    pub noisy_psnrs: Vec<Vec<f64>>,
    pub noisy_ssims: Vec<Vec<f64>>,
    /// Saved deblurred frames.
    pub deno_fns: Vec<Vec<PathBuf>>,
    pub vid_frames: Vec<Vec<i64>>,
    pub vid_name: Vec<String>,
    /// Seconds spent on optical flow.
    pub timer_flow: Vec<f64>,
    /// Seconds spent on deblurring.
    pub timer_deno: Vec<f64>,
}

impl ExpResults {
    pub fn num_samples(&self) -> usize {
        self.psnrs.len()
    }
}

fn default_window() -> i64 {
    -1
}

fn default_stride() -> usize {
    1
}

fn default_frame_bound() -> i64 {
    -1
}

fn default_saved_dir() -> PathBuf {
    PathBuf::from("./output/saved_results/")
}

fn default_device() -> String {
    "cuda:0".into()
}

fn default_sigma() -> R64 {
    r64(50.0)
}

mod flag {
    //! Booleans that also accept `"true"` and `"false"` strings.

    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FlagRepr {
        Bool(bool),
        Text(String),
    }

    pub fn serialize<S>(value: &bool, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bool(*value)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        match FlagRepr::deserialize(deserializer)? {
            FlagRepr::Bool(value) => Ok(value),
            FlagRepr::Text(text) => match text.as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(D::Error::custom(format!(
                    "expect \"true\" or \"false\", but get \"{}\"",
                    text
                ))),
            },
        }
    }
}

mod image_size {
    //! Crop sizes written as `"H_W"`.

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageSize {
        pub height: usize,
        pub width: usize,
    }

    impl FromStr for ImageSize {
        type Err = Error;

        fn from_str(text: &str) -> Result<Self, Self::Err> {
            let (height, width) = text.split_once('_').ok_or_else(|| {
                format_err!("expect image size in \"H_W\" format, but get \"{}\"", text)
            })?;
            let height: usize = height.parse()?;
            let width: usize = width.parse()?;
            ensure!(height > 0 && width > 0, "image size must be positive");
            Ok(Self { height, width })
        }
    }

    impl Display for ImageSize {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}_{}", self.height, self.width)
        }
    }

    pub fn serialize<S>(value: &Option<ImageSize>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(size) => serializer.serialize_str(&size.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<ImageSize>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = Option::<String>::deserialize(deserializer)?;
        match text.as_deref() {
            None | Some("none") => Ok(None),
            Some(text) => {
                let size = text
                    .parse()
                    .map_err(|err| D::Error::custom(format!("{:?}", err)))?;
                Ok(Some(size))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base_map() -> ConfigMap {
        json!({
            "dname": "gopro",
            "dset": "te",
            "vid_name": "01",
            "flow": "false",
            "ws": 8,
            "wt": 0,
            "isize": "512_512",
            "stride": 1,
            "model_type": "aug_dnls",
            "use_train": "true",
        })
        .as_object()
        .unwrap()
        .clone()
    }

    #[test]
    fn parse_meshed_config() -> Result<()> {
        let exp = ExpConfig::from_map(base_map())?;

        assert_eq!(exp.dset, Split::Test);
        assert_eq!(exp.model_type, ModelType::AugDnls);
        assert!(exp.model_type.is_augmented());
        assert!(!exp.flow);
        assert!(exp.use_train);
        assert_eq!(
            exp.isize,
            Some(ImageSize {
                height: 512,
                width: 512
            })
        );
        assert_eq!(exp.nframes, 0);
        assert_eq!(exp.frame_bounds(), None);
        assert_eq!(exp.device, "cuda:0");
        assert_eq!(exp.sigma, r64(50.0));
        assert_eq!(
            exp.output_dir(),
            Path::new("./output/saved_results/gopro/aug_dnls/01")
        );
        Ok(())
    }

    #[test]
    fn string_and_bool_flags_share_key() -> Result<()> {
        let lhs = ExpConfig::from_map(base_map())?;
        let mut map = base_map();
        map.insert("use_train".into(), json!(true));
        map.insert("flow".into(), json!(false));
        let rhs = ExpConfig::from_map(map)?;

        assert_eq!(lhs, rhs);
        assert_eq!(cache::config_uuid(&lhs)?, cache::config_uuid(&rhs)?);

        let text = serde_json::to_value(&lhs)?;
        assert_eq!(text["use_train"], json!(true));
        assert_eq!(text["isize"], json!("512_512"));
        Ok(())
    }

    #[test]
    fn reject_invalid_values() {
        let mut map = base_map();
        map.insert("use_train".into(), json!("yes"));
        assert!(ExpConfig::from_map(map).is_err());

        let mut map = base_map();
        map.insert("isize".into(), json!("512x512"));
        assert!(ExpConfig::from_map(map).is_err());

        let mut map = base_map();
        map.insert("stride".into(), json!(0));
        assert!(ExpConfig::from_map(map).is_err());

        let mut map = base_map();
        map.insert("model_type".into(), json!("unknown"));
        assert!(ExpConfig::from_map(map).is_err());

        let mut map = base_map();
        map.insert("frame_start".into(), json!(5));
        map.insert("frame_end".into(), json!(2));
        assert!(ExpConfig::from_map(map).is_err());
    }

    #[test]
    fn parse_devices() -> Result<()> {
        assert_eq!(parse_device("cpu")?, Device::Cpu);
        assert_eq!(parse_device("cuda")?, Device::Cuda(0));
        assert_eq!(parse_device("cuda:3")?, Device::Cuda(3));
        assert!(parse_device("gpu").is_err());
        assert!(parse_device("cuda:x").is_err());
        Ok(())
    }

    #[test]
    fn mesh_with_defaults() -> Result<()> {
        let groups: MeshGroups = serde_json::from_value(json!({
            "base": {
                "dname": ["gopro"],
                "dset": ["te"],
                "vid_name": ["01", "02"],
                "model_type": ["aug_refactored", "aug_dnls"],
            },
            "variants": [
                { "model_type": ["original"], "ws": [-1] },
                {},
            ],
        }))?;
        let defaults = json!({ "nframes": 1, "frame_start": 0, "frame_end": 0, "device": "cpu" });

        let exps = mesh_experiments(&groups, defaults.as_object().unwrap())?;
        assert_eq!(exps.len(), 2 + 4);
        assert!(exps.iter().all(|exp| exp.nframes == 1 && exp.device == "cpu"));
        assert_eq!(exps[0].model_type, ModelType::Original);
        assert_eq!(exps[0].frame_bounds(), Some((0, 0)));

        let empty: MeshGroups = serde_json::from_value(json!({
            "base": { "dname": ["gopro"], "vid_name": [] },
        }))?;
        assert!(mesh_experiments(&empty, &ConfigMap::new()).is_err());
        Ok(())
    }
}
