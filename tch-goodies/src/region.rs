//! Spatio-temporal crops of frame batches.

use crate::common::*;

/// A crop of a `T×C×H×W` batch: frames `fs..fe`, rows `top..bottom` and
/// columns `left..right`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    pub fs: i64,
    pub fe: i64,
    pub top: i64,
    pub left: i64,
    pub bottom: i64,
    pub right: i64,
}

impl Region {
    /// Builds a region from `[fs, fe, top, left, bottom, right]`.
    pub fn from_coords(coords: [i64; 6]) -> Result<Self> {
        let [fs, fe, top, left, bottom, right] = coords;
        ensure!(
            0 <= fs && fs < fe && 0 <= top && top < bottom && 0 <= left && left < right,
            "invalid region coordinates {:?}",
            coords
        );
        Ok(Self {
            fs,
            fe,
            top,
            left,
            bottom,
            right,
        })
    }

    /// A centered `height×width` crop covering all `nframes` frames.
    ///
    /// The crop size is clamped to the frame size.
    pub fn center_crop(
        nframes: i64,
        frame_h: i64,
        frame_w: i64,
        height: i64,
        width: i64,
    ) -> Result<Self> {
        let height = height.min(frame_h);
        let width = width.min(frame_w);
        let top = (frame_h - height) / 2;
        let left = (frame_w - width) / 2;
        Self::from_coords([0, nframes, top, left, top + height, left + width])
    }

    pub fn coords(&self) -> [i64; 6] {
        [self.fs, self.fe, self.top, self.left, self.bottom, self.right]
    }

    pub fn nframes(&self) -> i64 {
        self.fe - self.fs
    }

    pub fn height(&self) -> i64 {
        self.bottom - self.top
    }

    pub fn width(&self) -> i64 {
        self.right - self.left
    }
}

/// Crops a `T×C×H×W` batch to the region. `None` returns the batch as is.
pub fn slice_region(frames: &Tensor, region: Option<&Region>) -> Result<Tensor> {
    let region = match region {
        Some(region) => region,
        None => return Ok(frames.shallow_clone()),
    };
    let (t, _c, h, w) = frames.size4()?;
    ensure!(
        region.fe <= t && region.bottom <= h && region.right <= w,
        "region {:?} is out of the frame batch of size {:?}",
        region.coords(),
        frames.size()
    );

    let sliced = frames
        .f_narrow(0, region.fs, region.nframes())?
        .f_narrow(2, region.top, region.height())?
        .f_narrow(3, region.left, region.width())?;
    Ok(sliced)
}

/// Crops two batches with the same region.
pub fn slice_pair(
    lhs: &Tensor,
    rhs: &Tensor,
    region: Option<&Region>,
) -> Result<(Tensor, Tensor)> {
    Ok((slice_region(lhs, region)?, slice_region(rhs, region)?))
}
