//! Zero padding of frame batches into square canvases and back.

use crate::common::*;

/// Remembers where the original frames sit inside a square canvas.
#[derive(Debug)]
pub struct SquareMask {
    /// `T×1×X×X` tensor of ones over the original content.
    mask: Tensor,
    /// The original `T×C×H×W` shape.
    shape: [i64; 4],
}

impl SquareMask {
    pub fn mask(&self) -> &Tensor {
        &self.mask
    }

    pub fn shape(&self) -> [i64; 4] {
        self.shape
    }

    /// Selects the original content out of a padded batch.
    ///
    /// The padded batch must have the canvas size produced by
    /// [expand_to_square] and the original number of frames and channels.
    pub fn restore(&self, padded: &Tensor) -> Result<Tensor> {
        let [t, c, h, w] = self.shape;
        let (pt, pc, ph, pw) = padded.size4()?;
        let (_, _, side, _) = self.mask.size4()?;
        ensure!(
            pt == t && pc == c && ph == side && pw == side,
            "expect padded shape [{}, {}, {}, {}], but get [{}, {}, {}, {}]",
            t,
            c,
            side,
            side,
            pt,
            pc,
            ph,
            pw
        );

        let mask = self.mask.to_device(padded.device());
        let content = padded.f_masked_select(&mask)?.f_reshape(&[t, c, h, w])?;
        Ok(content)
    }
}

/// The side length of the square canvas fitting an `h×w` frame.
///
/// It is the larger side rounded up to a multiple of `factor`.
pub fn square_side(h: i64, w: i64, factor: i64) -> i64 {
    let max = h.max(w);
    (max + factor - 1) / factor * factor
}

/// Centers a `T×C×H×W` batch on a zero `T×C×X×X` canvas.
///
/// `X` is the larger frame side rounded up to a multiple of `factor`. The
/// content starts at row `(X - H) / 2` and column `(X - W) / 2`.
pub fn expand_to_square(frames: &Tensor, factor: i64) -> Result<(Tensor, SquareMask)> {
    ensure!(factor > 0, "factor must be positive, but get {}", factor);
    let (t, c, h, w) = frames.size4()?;
    ensure!(h > 0 && w > 0, "frames must not be empty");

    let side = square_side(h, w, factor);
    let top = (side - h) / 2;
    let left = (side - w) / 2;
    let device = frames.device();

    let (padded, mask) = tch::no_grad(|| -> Result<_> {
        let padded = Tensor::zeros(&[t, c, side, side], (frames.kind(), device));
        padded
            .f_narrow(2, top, h)?
            .f_narrow(3, left, w)?
            .f_copy_(frames)?;

        let mask = Tensor::zeros(&[t, 1, side, side], (Kind::Bool, device));
        mask.f_narrow(2, top, h)?.f_narrow(3, left, w)?.f_fill_(1i64)?;

        Ok((padded, mask))
    })?;

    debug!("expanded [{}, {}, {}, {}] to square side {}", t, c, h, w, side);

    Ok((
        padded,
        SquareMask {
            mask,
            shape: [t, c, h, w],
        },
    ))
}
