//! Aggregation of cached experiment results.

use crate::{
    common::*,
    experiment::{ExpConfig, ExpResults, ModelType},
};

/// One evaluated sample with the options of its experiment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlatRecord {
    pub uuid: String,
    pub model_type: ModelType,
    pub use_train: bool,
    pub stride: usize,
    pub vid_name: String,
    pub flow: bool,
    pub ws: i64,
    pub wt: i64,
    pub frame_start: i64,
    pub frame_end: i64,
    pub num_frames: usize,
    pub psnr: f64,
    pub ssim: f64,
    pub noisy_psnr: f64,
    pub noisy_ssim: f64,
    pub timer_flow: f64,
    pub timer_deno: f64,
}

/// Mean statistics of the samples sharing model type, checkpoint, stride
/// and video.
///
/// Metrics are averaged over frames and timings over samples.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub model_type: ModelType,
    pub use_train: bool,
    pub stride: usize,
    pub vid_name: String,
    pub num_samples: usize,
    pub psnr: f64,
    pub ssim: f64,
    pub noisy_psnr: f64,
    pub noisy_ssim: f64,
    pub timer_deno: f64,
}

/// Expands each experiment record into one row per sample.
///
/// Per-frame metrics are averaged within the sample.
pub fn flatten_records(records: &[Record<ExpConfig, ExpResults>]) -> Vec<FlatRecord> {
    records
        .iter()
        .flat_map(|record| {
            let Record {
                uuid,
                config,
                results,
            } = record;

            izip!(
                &results.psnrs,
                &results.ssims,
                &results.noisy_psnrs,
                &results.noisy_ssims,
                &results.vid_frames,
                &results.timer_flow,
                &results.timer_deno
            )
            .map(
                move |(psnrs, ssims, noisy_psnrs, noisy_ssims, frames, &timer_flow, &timer_deno)| {
                    let (frame_start, frame_end) = match frames.iter().minmax().into_option() {
                        Some((&min, &max)) => (min, max),
                        None => (-1, -1),
                    };

                    FlatRecord {
                        uuid: uuid.to_string(),
                        model_type: config.model_type,
                        use_train: config.use_train,
                        stride: config.stride,
                        vid_name: config.vid_name.clone(),
                        flow: config.flow,
                        ws: config.ws,
                        wt: config.wt,
                        frame_start,
                        frame_end,
                        num_frames: frames.len(),
                        psnr: mean(psnrs),
                        ssim: mean(ssims),
                        noisy_psnr: mean(noisy_psnrs),
                        noisy_ssim: mean(noisy_ssims),
                        timer_flow,
                        timer_deno,
                    }
                },
            )
        })
        .collect()
}

/// Groups rows in first-seen order and averages each group.
pub fn summarize(rows: &[FlatRecord]) -> Vec<GroupSummary> {
    let mut groups: IndexMap<(ModelType, bool, usize, &str), Vec<&FlatRecord>> =
        IndexMap::new();
    for row in rows {
        let key = (row.model_type, row.use_train, row.stride, row.vid_name.as_str());
        groups.entry(key).or_default().push(row);
    }

    groups
        .into_iter()
        .map(|((model_type, use_train, stride, vid_name), rows)| {
            let frame_average = |f: fn(&FlatRecord) -> f64| {
                weighted_mean(rows.iter().map(|row| (f(row), row.num_frames)))
            };
            let timer_deno = rows.iter().map(|row| row.timer_deno).collect_vec();

            GroupSummary {
                model_type,
                use_train,
                stride,
                vid_name: vid_name.to_string(),
                num_samples: rows.len(),
                psnr: frame_average(|row| row.psnr),
                ssim: frame_average(|row| row.ssim),
                noisy_psnr: frame_average(|row| row.noisy_psnr),
                noisy_ssim: frame_average(|row| row.noisy_ssim),
                timer_deno: mean(&timer_deno),
            }
        })
        .collect()
}

pub fn log_summaries(summaries: &[GroupSummary]) {
    for summary in summaries {
        let GroupSummary {
            model_type,
            use_train,
            stride,
            vid_name,
            num_samples,
            psnr,
            ssim,
            noisy_psnr,
            timer_deno,
            ..
        } = summary;

        info!(
            "{} (use_train={}, stride={}) on video {}: psnr {:.2} (blurred {:.2}), ssim {:.4}, {:.3}s per sample over {} samples",
            model_type.name(),
            use_train,
            stride,
            vid_name,
            psnr,
            noisy_psnr,
            ssim,
            timer_deno,
            num_samples
        );
    }
}

/// Writes the summaries as a CSV table with a header row.
pub fn write_csv(path: &Path, summaries: &[GroupSummary]) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)?;
        }
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create report {}", path.display()))?;
    for summary in summaries {
        writer.serialize(summary)?;
    }
    writer.flush()?;
    Ok(())
}

/// The arithmetic mean, NaN for no values.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// The mean of `(value, weight)` pairs, NaN when every weight is zero.
fn weighted_mean(pairs: impl IntoIterator<Item = (f64, usize)>) -> f64 {
    let (sum, count) = pairs
        .into_iter()
        .filter(|&(_, weight)| weight > 0)
        .fold((0.0, 0), |(sum, count), (value, weight)| {
            (sum + value * weight as f64, count + weight)
        });
    if count == 0 {
        return f64::NAN;
    }
    sum / count as f64
}
