//! Per-frame image quality metrics.

use crate::common::*;

/// The PSNR reported for identical frames.
pub const MAX_PSNR: f64 = 100.0;

const SSIM_WINDOW: i64 = 7;
const SSIM_K1: f64 = 0.01;
const SSIM_K2: f64 = 0.03;

/// Computes the PSNR of each frame of `other` against `clean`.
///
/// Both are `T×C×H×W` batches divided by `div` before comparison, assuming
/// a data range of 1.
pub fn compute_psnrs(clean: &Tensor, other: &Tensor, div: f64) -> Result<Vec<f64>> {
    let (clean, other) = scaled_pair(clean, other, div)?;

    let mse = tch::no_grad(|| -> Result<_> {
        let diff = clean.f_sub(&other)?;
        let mse = (&diff * &diff).f_mean_dim(&[1, 2, 3], false, Kind::Double)?;
        Ok(mse)
    })?;

    let nframes = mse.size1()?;
    (0..nframes)
        .map(|index| -> Result<_> {
            let mse = mse.f_double_value(&[index])?;
            Ok(psnr_from_mse(mse))
        })
        .try_collect()
}

/// Computes the SSIM of each frame of `other` against `clean`.
///
/// Statistics are taken over 7×7 uniform windows with the sample covariance,
/// averaged over the windows fully inside the frame and then over channels.
pub fn compute_ssims(clean: &Tensor, other: &Tensor, div: f64) -> Result<Vec<f64>> {
    let (clean, other) = scaled_pair(clean, other, div)?;
    let (_t, c, h, w) = clean.size4()?;
    ensure!(
        h >= SSIM_WINDOW && w >= SSIM_WINDOW,
        "frames of size {}x{} are smaller than the {}x{} SSIM window",
        h,
        w,
        SSIM_WINDOW,
        SSIM_WINDOW
    );

    let ssims = tch::no_grad(|| -> Result<_> {
        let npix = (SSIM_WINDOW * SSIM_WINDOW) as f64;
        let cov_norm = npix / (npix - 1.0);
        let c1 = SSIM_K1.powi(2);
        let c2 = SSIM_K2.powi(2);

        let weight = Tensor::f_ones(
            &[c, 1, SSIM_WINDOW, SSIM_WINDOW],
            (Kind::Double, clean.device()),
        )? / npix;
        let filter = |input: &Tensor| -> Result<Tensor> {
            let output =
                input.f_conv2d(&weight, None::<Tensor>, &[1, 1], &[0, 0], &[1, 1], c)?;
            Ok(output)
        };

        let ux = filter(&clean)?;
        let uy = filter(&other)?;
        let uxx = filter(&(&clean * &clean))?;
        let uyy = filter(&(&other * &other))?;
        let uxy = filter(&(&clean * &other))?;

        let vx = (&uxx - &ux * &ux) * cov_norm;
        let vy = (&uyy - &uy * &uy) * cov_norm;
        let vxy = (&uxy - &ux * &uy) * cov_norm;

        let numer = (&ux * &uy * 2.0 + c1) * (vxy * 2.0 + c2);
        let denom = (&ux * &ux + &uy * &uy + c1) * (vx + vy + c2);
        let ssim_map = numer / denom;

        Ok(ssim_map.f_mean_dim(&[1, 2, 3], false, Kind::Double)?)
    })?;

    let nframes = ssims.size1()?;
    (0..nframes)
        .map(|index| -> Result<_> { Ok(ssims.f_double_value(&[index])?) })
        .try_collect()
}

fn psnr_from_mse(mse: f64) -> f64 {
    if mse <= 0.0 {
        MAX_PSNR
    } else {
        (-10.0 * mse.log10()).min(MAX_PSNR)
    }
}

fn scaled_pair(clean: &Tensor, other: &Tensor, div: f64) -> Result<(Tensor, Tensor)> {
    ensure!(div > 0.0, "the divisor must be positive, but get {}", div);
    ensure!(
        clean.size() == other.size(),
        "cannot compare frames of size {:?} and {:?}",
        clean.size(),
        other.size()
    );
    clean.size4()?;

    let scale = |frames: &Tensor| frames.to_kind(Kind::Double) / div;
    let other = other.to_device(clean.device());
    Ok((scale(clean), scale(&other)))
}
