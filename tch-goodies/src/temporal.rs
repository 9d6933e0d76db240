//! Bounded-memory inference over long frame batches.

use crate::common::*;

/// The frame ranges of consecutive chunks of at most `tsize` frames.
pub fn temporal_chunks(nframes: i64, tsize: i64) -> Result<Vec<Range<i64>>> {
    ensure!(tsize > 0, "chunk size must be positive, but get {}", tsize);
    ensure!(nframes >= 0, "invalid number of frames {}", nframes);

    let ranges = (0..nframes)
        .step_by(tsize as usize)
        .map(|start| start..(start + tsize).min(nframes))
        .collect();
    Ok(ranges)
}

/// Runs `forward` over chunks of at most `tsize` frames along dimension 0
/// and concatenates the outputs in frame order.
///
/// The chunk range is passed along so that per-frame side inputs, such as
/// optical flows, can be sliced to match.
pub fn temporal_chop<F>(frames: &Tensor, tsize: i64, mut forward: F) -> Result<Tensor>
where
    F: FnMut(&Tensor, Range<i64>) -> Result<Tensor>,
{
    let nframes = *frames
        .size()
        .first()
        .ok_or_else(|| format_err!("expect at least one dimension"))?;
    ensure!(nframes > 0, "cannot chop an empty frame batch");

    let outputs: Vec<_> = temporal_chunks(nframes, tsize)?
        .into_iter()
        .map(|range| -> Result<_> {
            let chunk = frames.f_narrow(0, range.start, range.end - range.start)?;
            let output = forward(&chunk, range.clone())?;
            ensure!(
                output.size().first() == Some(&(range.end - range.start)),
                "the output of chunk {:?} has shape {:?}",
                range,
                output.size()
            );
            Ok(output)
        })
        .try_collect()?;

    Ok(Tensor::f_cat(&outputs, 0)?)
}
