//! Deblurring network loading and inference.

use crate::{
    common::*,
    config::{LoadCheckpoint, ModelConfig},
    experiment::{ExpConfig, ModelType},
    flow::Flows,
};

/// The timestamp format in checkpoint file names.
pub const FILE_STRFTIME: &str = "%Y-%m-%d-%H-%M-%S.%3f%z";

static CHECKPOINT_FILENAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-z_]+)_(\d{4}-\d{2}-\d{2}-\d{2}-\d{2}-\d{2}\.\d{3}[+-]\d{4})\.pt$").unwrap()
});

/// A network mapping blurred frames to sharp frames.
pub trait Deblurrer
where
    Self: Debug,
{
    fn model_type(&self) -> ModelType;

    /// Takes `T×3×X×X` frames in `[0, 1]` and optional flows padded alike,
    /// and returns the deblurred frames of the same shape.
    fn forward(&self, frames: &Tensor, flows: Option<&Flows>) -> Result<Tensor>;
}

/// A TorchScript export of the deblurring network.
#[derive(Debug)]
pub struct DeblurModel {
    module: CModule,
    model_type: ModelType,
    ws: i64,
    wt: i64,
    stride: i64,
}

impl DeblurModel {
    /// Loads the network of an experiment on its device.
    pub fn load(config: &ModelConfig, exp: &ExpConfig) -> Result<Self> {
        let device = exp.tch_device()?;
        let path = resolve_weights(config, exp)?;

        info!("load {} weights from {}", exp.model_type.name(), path.display());
        let mut module = CModule::load_on_device(&path, device)
            .with_context(|| format!("failed to load module {}", path.display()))?;
        module.set_eval();

        Ok(Self {
            module,
            model_type: exp.model_type,
            ws: exp.ws,
            wt: exp.wt,
            stride: exp.stride as i64,
        })
    }
}

impl Deblurrer for DeblurModel {
    fn model_type(&self) -> ModelType {
        self.model_type
    }

    fn forward(&self, frames: &Tensor, flows: Option<&Flows>) -> Result<Tensor> {
        let output = tch::no_grad(|| -> Result<_> {
            let output = if self.model_type.is_augmented() {
                let flows = flows.map(Flows::to_ivalue).unwrap_or(IValue::None);
                self.module.forward_is(&[
                    IValue::Tensor(frames.shallow_clone()),
                    flows,
                    IValue::Int(self.ws),
                    IValue::Int(self.wt),
                    IValue::Int(self.stride),
                ])?
            } else {
                self.module
                    .forward_is(&[IValue::Tensor(frames.shallow_clone())])?
            };
            Ok(output)
        })?;

        match output {
            IValue::Tensor(output) => Ok(output),
            _ => bail!(
                "the {} module must return a tensor",
                self.model_type.name()
            ),
        }
    }
}

/// Picks the weights file of an experiment.
///
/// Pretrained weights live at `<weights_dir>/<model_type>.pt`. Experiments
/// using fine-tuned weights resolve the checkpoint by the configured method.
pub fn resolve_weights(config: &ModelConfig, exp: &ExpConfig) -> Result<PathBuf> {
    let pretrained = config
        .weights_dir
        .join(format!("{}.pt", exp.model_type.name()));

    if !exp.use_train {
        return Ok(pretrained);
    }

    let checkpoint = match &config.load_checkpoint {
        LoadCheckpoint::Disabled => {
            warn!("checkpoint loading is disabled, use pretrained weights instead");
            None
        }
        LoadCheckpoint::FromRecent => {
            let checkpoint = find_recent_checkpoint(&config.checkpoint_dir, exp.model_type)?;
            if checkpoint.is_none() {
                warn!(
                    "no {} checkpoint file found in {}",
                    exp.model_type.name(),
                    config.checkpoint_dir.display()
                );
            }
            checkpoint
        }
        LoadCheckpoint::FromFile { file } => {
            ensure!(file.is_file(), "{} is not a file", file.display());
            Some(file.to_owned())
        }
    };

    Ok(checkpoint.unwrap_or(pretrained))
}

/// The file name of a checkpoint saved at `datetime`.
pub fn checkpoint_file_name<Tz>(model_type: ModelType, datetime: &DateTime<Tz>) -> String
where
    Tz: chrono::TimeZone,
    Tz::Offset: Display,
{
    format!(
        "{}_{}.pt",
        model_type.name(),
        datetime.format(FILE_STRFTIME)
    )
}

/// Finds the newest checkpoint of a model type by the time in its file name.
pub fn find_recent_checkpoint(
    checkpoint_dir: &Path,
    model_type: ModelType,
) -> Result<Option<PathBuf>> {
    let dir = checkpoint_dir
        .to_str()
        .ok_or_else(|| format_err!("non-unicode path {}", checkpoint_dir.display()))?;
    let pattern = format!("{}/*.pt", glob::Pattern::escape(dir));
    let paths: Vec<_> = glob::glob(&pattern)?.try_collect()?;

    let checkpoint = paths
        .into_iter()
        .filter_map(|path| {
            let file_name = path.file_name()?.to_str()?;
            let captures = CHECKPOINT_FILENAME_REGEX.captures(file_name)?;
            if captures.get(1)?.as_str() != model_type.name() {
                return None;
            }
            let datetime_str = captures.get(2)?.as_str();
            let datetime = DateTime::parse_from_str(datetime_str, FILE_STRFTIME).ok()?;
            Some((path, datetime))
        })
        .max_by_key(|(_path, datetime)| *datetime)
        .map(|(path, _datetime)| path);

    Ok(checkpoint)
}
