use super::*;
use crate::{
    experiment::{ImageSize, Split},
    io,
};

const BLUR_DIR: &str = "blur";
const SHARP_DIR: &str = "sharp";

#[derive(Debug, Clone)]
struct VideoRecord {
    group: SampleGroup,
    blur_files: Vec<PathBuf>,
    sharp_files: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
struct SampleRecord {
    video_index: usize,
    frame_nums: Vec<i64>,
}

/// The GoPro deblurring benchmark.
///
/// Each video of a split is a directory holding equally named frames in
/// `blur` and `sharp` subdirectories. Videos are cut into consecutive
/// windows of `nframes` frames.
#[derive(Debug, Clone)]
pub struct GoProDataset {
    videos: Vec<VideoRecord>,
    samples: Vec<SampleRecord>,
    crop: Option<ImageSize>,
}

impl GoProDataset {
    pub fn load(
        dataset_dir: impl AsRef<Path>,
        split: Split,
        nframes: usize,
        crop: Option<ImageSize>,
    ) -> Result<Self> {
        let split_dir = dataset_dir.as_ref().join(split.dir_name());

        let video_dirs: Vec<PathBuf> = {
            let entries: Vec<_> = fs::read_dir(&split_dir)
                .with_context(|| format!("failed to list videos in {}", split_dir.display()))?
                .try_collect()?;
            entries
                .into_iter()
                .map(|entry| entry.path())
                .filter(|path| path.is_dir())
                .sorted()
                .collect()
        };
        ensure!(
            !video_dirs.is_empty(),
            "no videos found in {}",
            split_dir.display()
        );

        let videos: Vec<_> = video_dirs
            .into_iter()
            .enumerate()
            .map(|(position, video_dir)| -> Result<_> {
                let video = video_dir
                    .file_name()
                    .and_then(|name| name.to_str())
                    .ok_or_else(|| format_err!("invalid video dir {}", video_dir.display()))?
                    .to_string();
                let blur_files = list_frames(&video_dir.join(BLUR_DIR))?;
                let sharp_files = list_frames(&video_dir.join(SHARP_DIR))?;

                let same_names = blur_files.len() == sharp_files.len()
                    && izip!(&blur_files, &sharp_files)
                        .all(|(blur, sharp)| blur.file_name() == sharp.file_name());
                ensure!(
                    same_names,
                    "blurred and sharp frames do not pair up in {}",
                    video_dir.display()
                );

                Ok(VideoRecord {
                    group: SampleGroup { video, position },
                    blur_files,
                    sharp_files,
                })
            })
            .try_collect()?;

        let samples: Vec<_> = videos
            .iter()
            .enumerate()
            .flat_map(|(video_index, video)| {
                let num_frames = video.blur_files.len();
                let window = if nframes == 0 { num_frames.max(1) } else { nframes };

                (0..num_frames as i64)
                    .chunks(window)
                    .into_iter()
                    .map(|chunk| SampleRecord {
                        video_index,
                        frame_nums: chunk.collect(),
                    })
                    .collect_vec()
            })
            .collect();

        debug!(
            "loaded {} videos and {} samples from {}",
            videos.len(),
            samples.len(),
            split_dir.display()
        );

        Ok(Self {
            videos,
            samples,
            crop,
        })
    }

    fn record(&self, index: usize) -> Result<&SampleRecord> {
        self.samples
            .get(index)
            .ok_or_else(|| format_err!("invalid index {}", index))
    }
}

impl VideoDataset for GoProDataset {
    fn num_samples(&self) -> usize {
        self.samples.len()
    }

    fn group(&self, index: usize) -> Result<&SampleGroup> {
        let record = self.record(index)?;
        Ok(&self.videos[record.video_index].group)
    }

    fn frame_nums(&self, index: usize) -> Result<&[i64]> {
        Ok(&self.record(index)?.frame_nums)
    }

    fn sample(&self, index: usize) -> Result<Sample> {
        let SampleRecord {
            video_index,
            ref frame_nums,
        } = *self.record(index)?;
        let video = &self.videos[video_index];

        let select = |files: &[PathBuf]| -> Vec<PathBuf> {
            frame_nums
                .iter()
                .map(|&num| files[num as usize].clone())
                .collect()
        };
        let blur = io::load_frames(&select(&video.blur_files))?;
        let sharp = io::load_frames(&select(&video.sharp_files))?;
        ensure!(
            blur.size() == sharp.size(),
            "blurred frames of size {:?} and sharp frames of size {:?} differ in video {}",
            blur.size(),
            sharp.size(),
            video.group.video
        );

        let region = match self.crop {
            Some(ImageSize { height, width }) => {
                let (t, _c, h, w) = blur.size4()?;
                Some(Region::center_crop(t, h, w, height as i64, width as i64)?)
            }
            None => None,
        };

        Ok(Sample {
            blur,
            sharp,
            frame_nums: frame_nums.clone(),
            region,
        })
    }
}

fn list_frames(dir: &Path) -> Result<Vec<PathBuf>> {
    let dir_str = dir
        .to_str()
        .ok_or_else(|| format_err!("non-unicode path {}", dir.display()))?;
    let pattern = format!("{}/*.png", glob::Pattern::escape(dir_str));
    let files: Vec<_> = glob::glob(&pattern)?.try_collect()?;
    ensure!(!files.is_empty(), "no frames found in {}", dir.display());
    Ok(files.into_iter().sorted().collect())
}
