//! The evaluation loop of a single experiment.

use crate::{
    common::*,
    config::{Config, ModelConfig},
    dataset::{self, Sample, VideoDataset},
    experiment::{ExpConfig, ExpResults},
    flow::{FlowEstimator, Flows, ScriptedFlow},
    io::{self, FrameFormat},
    metrics,
    model::{DeblurModel, Deblurrer},
    report::mean,
    timer::{self, ExpTimer},
};

/// The maximum pixel value of frames.
pub const IMAX: f64 = 255.0;

/// Loads the resources of an experiment and evaluates it.
pub fn run_exp(config: &Config, exp: &ExpConfig) -> Result<ExpResults> {
    let device = exp.tch_device()?;

    let flow = if exp.flow {
        let flow_config = config.flow.as_ref().ok_or_else(|| {
            format_err!("the experiment asks for flow but no flow module is configured")
        })?;
        Some(ScriptedFlow::load(flow_config, device)?)
    } else {
        None
    };
    let dataset = dataset::open_dataset(config.dataset(&exp.dname)?, exp)?;
    let model = DeblurModel::load(&config.model, exp)?;

    evaluate(
        exp,
        &*dataset,
        &model,
        flow.as_ref().map(|flow| flow as &dyn FlowEstimator),
        &config.model,
    )
}

/// Evaluates a model on the samples an experiment selects.
pub fn evaluate(
    exp: &ExpConfig,
    dataset: &dyn VideoDataset,
    model: &dyn Deblurrer,
    flow: Option<&dyn FlowEstimator>,
    model_config: &ModelConfig,
) -> Result<ExpResults> {
    let device = exp.tch_device()?;
    let out_dir = exp.output_dir();
    let indices = dataset::select_samples(dataset, &exp.vid_name, exp.frame_bounds())?;

    if indices.is_empty() {
        warn!(
            "no samples of video '{}' are selected from {}",
            exp.vid_name, exp.dname
        );
    }

    let mut results = ExpResults::default();

    for index in indices {
        let _span = info_span!("sample", index).entered();

        let Sample {
            blur,
            sharp,
            frame_nums,
            region,
        } = dataset.sample(index)?;
        let fstart = frame_nums
            .iter()
            .copied()
            .min()
            .ok_or_else(|| format_err!("sample {} has no frames", index))?;
        let (blur, sharp) = slice_pair(
            &blur.to_device(device),
            &sharp.to_device(device),
            region.as_ref(),
        )?;
        debug!("blurred frames of shape {:?}", blur.size());

        let mut timer = ExpTimer::new();

        let flows = timer.time("flow", || {
            let flows = flow
                .map(|flow| flow.compute_flow(&blur, exp.sigma.raw()))
                .transpose()?;
            if let Some(flows) = &flows {
                timer::sync_tensor(&flows.backward)?;
            }
            Ok(flows)
        })?;

        let deno = timer.time("deno", || {
            let deno = deblur(
                model,
                &blur,
                flows.as_ref(),
                model_config.square_factor,
                model_config.temporal_chunk,
            )?;
            timer::sync_tensor(&deno)?;
            Ok(deno)
        })?;
        timer.report();

        io::save_burst(&deno, &out_dir, "deno", fstart, 1.0, FrameFormat::Npy)?;
        let deno_fns =
            io::save_burst(&deno, &out_dir, "deno", fstart, 1.0, FrameFormat::Png)?;

        let noisy_psnrs = metrics::compute_psnrs(&sharp, &blur, IMAX)?;
        let psnrs = metrics::compute_psnrs(&sharp, &deno, IMAX)?;
        let noisy_ssims = metrics::compute_ssims(&sharp, &blur, IMAX)?;
        let ssims = metrics::compute_ssims(&sharp, &deno, IMAX)?;
        info!(
            "{} on frames {:?}: psnr {:.3} (blurred {:.3}), ssim {:.4}",
            model.model_type().name(),
            frame_nums,
            mean(&psnrs),
            mean(&noisy_psnrs),
            mean(&ssims)
        );

        results.noisy_psnrs.push(noisy_psnrs);
        results.psnrs.push(psnrs);
        results.noisy_ssims.push(noisy_ssims);
        results.ssims.push(ssims);
        results.deno_fns.push(deno_fns);
        results.vid_frames.push(frame_nums);
        results.vid_name.push(exp.vid_name.clone());
        results
            .timer_flow
            .push(timer.seconds("flow").unwrap_or_default());
        results
            .timer_deno
            .push(timer.seconds("deno").unwrap_or_default());
    }

    Ok(results)
}

/// Deblurs `T×3×H×W` frames in `[0, 255]`.
///
/// Frames are padded to squares with sides of multiples of `square_factor`
/// and fed to the model `tsize` frames at a time.
pub fn deblur(
    model: &dyn Deblurrer,
    frames: &Tensor,
    flows: Option<&Flows>,
    square_factor: i64,
    tsize: i64,
) -> Result<Tensor> {
    if let Some(flows) = flows {
        let (t, _c, _h, _w) = frames.size4()?;
        ensure!(
            flows.nframes()? == t,
            "expect flows of {} frames, but get {}",
            t,
            flows.nframes()?
        );
    }

    tch::no_grad(|| -> Result<_> {
        let (frames_sq, mask) = expand_to_square(frames, square_factor)?;
        let flows_sq = flows
            .map(|flows| flows.try_map(|flow| Ok(expand_to_square(flow, square_factor)?.0)))
            .transpose()?;

        let deno_sq = temporal_chop(&(frames_sq / IMAX), tsize, |chunk, range| {
            let chunk_flows = flows_sq
                .as_ref()
                .map(|flows| flows.narrow(range))
                .transpose()?;
            model.forward(chunk, chunk_flows.as_ref())
        })?;

        let deno = mask.restore(&deno_sq)?;
        Ok(deno.f_clamp(0.0, 1.0)? * IMAX)
    })
}
