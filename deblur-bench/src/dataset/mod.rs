//! Video datasets of blurred and sharp frame pairs.

mod gopro;

pub use gopro::*;
#[cfg(test)]
pub(crate) use gopro::testing;

use crate::{common::*, config::DatasetKind, experiment::ExpConfig};

/// A sequence of consecutive frames of one video.
#[derive(Debug)]
pub struct Sample {
    /// `T×3×H×W` blurred frames in `[0, 255]`.
    pub blur: Tensor,
    /// `T×3×H×W` sharp frames in `[0, 255]`.
    pub sharp: Tensor,
    /// The positions of the frames in the video.
    pub frame_nums: Vec<i64>,
    /// The crop to evaluate on, if any.
    pub region: Option<Region>,
}

/// The video a sample is cut from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleGroup {
    /// The video directory name.
    pub video: String,
    /// The position of the video among the sorted videos of the split.
    pub position: usize,
}

impl SampleGroup {
    /// Checks whether the video is selected by name or by two-digit position.
    pub fn matches(&self, vid_name: &str) -> bool {
        self.video == vid_name || format!("{:02}", self.position) == vid_name
    }
}

/// The dataset that can be random accessed.
pub trait VideoDataset
where
    Self: Debug + Send + Sync,
{
    /// Get number of samples in the dataset.
    fn num_samples(&self) -> usize;

    /// The video of the nth sample.
    fn group(&self, index: usize) -> Result<&SampleGroup>;

    /// The frame positions of the nth sample.
    fn frame_nums(&self, index: usize) -> Result<&[i64]>;

    /// Loads the nth sample.
    fn sample(&self, index: usize) -> Result<Sample>;
}

/// Opens the dataset an experiment refers to.
pub fn open_dataset(kind: &DatasetKind, exp: &ExpConfig) -> Result<Box<dyn VideoDataset>> {
    let dataset: Box<dyn VideoDataset> = match kind {
        DatasetKind::GoPro { dataset_dir } => {
            let dataset = GoProDataset::load(dataset_dir, exp.dset, exp.nframes, exp.isize)?;
            Box::new(dataset)
        }
    };
    Ok(dataset)
}

/// Lists the samples of the selected video whose frames lie within the
/// inclusive frame bounds.
pub fn select_samples(
    dataset: &dyn VideoDataset,
    vid_name: &str,
    frame_bounds: Option<(i64, i64)>,
) -> Result<Vec<usize>> {
    let mut indices = vec![];

    for index in 0..dataset.num_samples() {
        if !dataset.group(index)?.matches(vid_name) {
            continue;
        }

        if let Some((lower, upper)) = frame_bounds {
            let frame_nums = dataset.frame_nums(index)?;
            let (min, max) = match frame_nums.iter().minmax().into_option() {
                Some((&min, &max)) => (min, max),
                None => continue,
            };
            if min < lower || max > upper {
                continue;
            }
        }

        indices.push(index);
    }

    Ok(indices)
}
