//! Frame loading and saving.

use crate::common::*;
use tch::vision;

/// The file format of saved frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum FrameFormat {
    /// Float frames, kept for later analysis.
    Npy,
    /// 8-bit images.
    Png,
}

impl FrameFormat {
    pub fn extension(&self) -> &str {
        self.as_ref()
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());
        let format = match ext.as_deref() {
            Some("npy") => Self::Npy,
            Some("png") => Self::Png,
            _ => bail!("unsupported frame file {}", path.display()),
        };
        Ok(format)
    }
}

/// Loads a frame as a `3×H×W` float tensor.
///
/// PNG values are in `[0, 255]`. NPY frames are loaded as stored.
pub fn load_frame(path: &Path) -> Result<Tensor> {
    let frame = match FrameFormat::from_path(path)? {
        FrameFormat::Png => vision::image::load(path)
            .with_context(|| format!("failed to load image {}", path.display()))?
            .to_kind(Kind::Float),
        FrameFormat::Npy => Tensor::read_npy(path)
            .with_context(|| format!("failed to load array {}", path.display()))?
            .to_kind(Kind::Float),
    };

    let (channels, _h, _w) = frame.size3()?;
    ensure!(
        channels == 3,
        "expect 3 channels, but get {} in {}",
        channels,
        path.display()
    );
    Ok(frame)
}

/// Loads frames into a `T×3×H×W` float tensor.
pub fn load_frames(paths: &[PathBuf]) -> Result<Tensor> {
    ensure!(!paths.is_empty(), "no frames to load");
    let frames: Vec<_> = paths.iter().map(|path| load_frame(path)).try_collect()?;
    let shapes: Vec<_> = frames.iter().map(|frame| frame.size()).dedup().collect();
    ensure!(
        shapes.len() == 1,
        "frames have inconsistent shapes {:?}",
        shapes
    );
    Ok(Tensor::f_stack(&frames, 0)?)
}

/// Saves a `T×3×H×W` batch, one file per frame, named
/// `<name>_<frame number:05>.<ext>` with frame numbers counted from `fstart`.
///
/// Frames are divided by `div` first. PNG frames are then expected in
/// `[0, 255]` and are clamped and rounded to 8 bits.
pub fn save_burst(
    frames: &Tensor,
    dir: &Path,
    name: &str,
    fstart: i64,
    div: f64,
    format: FrameFormat,
) -> Result<Vec<PathBuf>> {
    let (t, _c, _h, _w) = frames.size4()?;
    ensure!(div > 0.0, "the divisor must be positive, but get {}", div);
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create directory {}", dir.display()))?;

    let frames = tch::no_grad(|| (frames / div).to_device(Device::Cpu));

    (0..t)
        .map(|index| -> Result<_> {
            let path = dir.join(format!(
                "{}_{:05}.{}",
                name,
                fstart + index,
                format.extension()
            ));
            let frame = frames.f_select(0, index)?;

            match format {
                FrameFormat::Npy => frame.write_npy(&path)?,
                FrameFormat::Png => {
                    let image = frame
                        .f_clamp(0.0, 255.0)?
                        .f_round()?
                        .to_kind(Kind::Uint8);
                    vision::image::save(&image, &path)?;
                }
            }

            Ok(path)
        })
        .try_collect()
}
