//! Voxel-wise GLM denoising with physio regressors.
//!
//! For each slice `z` with voxel time series `Y` ([T, V]):
//!
//! ```text
//! X      = [1 | zscore(t, t², R_z)]          R_z: regressors of slice z [T, 13]
//! B      = pinv(X) · Y
//! Y_corr = Y − X[:, 3..15] · B[3..15, :]     (physio columns, raw HR excluded)
//! pct    = (var(Y) − var(Y_corr)) / var(Y)   ddof = 1
//! ```
//!
//! Only the physiological columns are subtracted; intercept and drift terms
//! stay in the data.  Slices are independent and run on the rayon pool.
use std::time::Instant;

use nalgebra::DMatrix;
use ndarray::{s, Array2, Array3, Array4, ArrayView2, ArrayView3};
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::error::{PhysioError, PhysioResult};
use crate::normalize::{sample_var, zscore_columns_inplace};
use crate::regressors::RegressorSet;

/// Leading design columns that are not subtracted: intercept, t, t².
const N_DRIFT: usize = 3;

/// Options for [`denoise_image`].
#[derive(Debug, Clone, Default)]
pub struct DenoiseOptions {
    /// Slices not started by this instant are reported as failed.
    pub deadline: Option<Instant>,
}

/// Output of [`denoise_image`].
#[derive(Debug)]
pub struct DenoisedVolume {
    /// Corrected data, shape `[x, y, slice, time]`.
    pub data: Array4<f64>,
    /// Fractional variance reduction per voxel, shape `[x, y, slice]`.
    pub pct_var_reduced: Array3<f64>,
    /// Slices left uncorrected, each a [`PhysioError::FitFailure`].
    pub failed_slices: Vec<PhysioError>,
}

/// Remove physio nuisance variance from a 4-D volume `[x, y, slice, time]`.
///
/// A slice whose fit fails keeps its original data and a zero variance
/// reduction; the failure is logged and returned in
/// [`DenoisedVolume::failed_slices`].
pub fn denoise_image(
    volume: &Array4<f64>,
    regressors: &RegressorSet,
    opts: &DenoiseOptions,
) -> PhysioResult<DenoisedVolume> {
    let (nx, ny, nslices, nframes) = volume.dim();
    if regressors.nframes() != nframes {
        return Err(PhysioError::Configuration(format!(
            "volume has {nframes} frames but regressors have {}",
            regressors.nframes()
        )));
    }
    if regressors.nslices() != nslices {
        return Err(PhysioError::Configuration(format!(
            "volume has {nslices} slices but regressors have {}",
            regressors.nslices()
        )));
    }

    let results: Vec<PhysioResult<(Array3<f64>, Array2<f64>)>> = (0..nslices)
        .into_par_iter()
        .map(|z| {
            if opts.deadline.is_some_and(|d| Instant::now() > d) {
                return Err(PhysioError::FitFailure {
                    slice: z,
                    reason: "deadline passed before the slice was fitted".into(),
                });
            }
            denoise_slice(
                volume.slice(s![.., .., z, ..]),
                regressors.data.slice(s![.., .., z]),
                z,
            )
        })
        .collect();

    let mut data = volume.clone();
    let mut pct_var_reduced = Array3::<f64>::zeros((nx, ny, nslices));
    let mut failed_slices = Vec::new();
    for (z, res) in results.into_iter().enumerate() {
        match res {
            Ok((corrected, pct)) => {
                data.slice_mut(s![.., .., z, ..]).assign(&corrected);
                pct_var_reduced.slice_mut(s![.., .., z]).assign(&pct);
            }
            Err(e) => {
                warn!(slice = z, "{e}; slice left uncorrected");
                failed_slices.push(e);
            }
        }
    }
    debug!(nslices, failed = failed_slices.len(), "denoising finished");

    Ok(DenoisedVolume { data, pct_var_reduced, failed_slices })
}

/// Denoise one slice `[x, y, time]` with its regressors `[time, k]`.
///
/// Returns the corrected slice and its variance-reduction map `[x, y]`.
pub fn denoise_slice(
    slice: ArrayView3<f64>,
    regressors: ArrayView2<f64>,
    slice_idx: usize,
) -> PhysioResult<(Array3<f64>, Array2<f64>)> {
    let (nx, ny, nt) = slice.dim();
    let nvox = nx * ny;
    let fail = |reason: String| PhysioError::FitFailure { slice: slice_idx, reason };

    let y = Array2::from_shape_fn((nt, nvox), |(t, v)| slice[[v / ny, v % ny, t]]);
    if y.iter().any(|v| !v.is_finite()) {
        return Err(fail("non-finite voxel values".into()));
    }

    let x = design_matrix(regressors);
    if x.iter().any(|v| !v.is_finite()) {
        return Err(fail("non-finite design matrix".into()));
    }
    let ncol = x.ncols();

    let pinv = pseudo_inverse(&x).map_err(|e| fail(e.to_string()))?;
    let betas = pinv.dot(&y);
    let nuisance = x
        .slice(s![.., N_DRIFT..ncol - 1])
        .dot(&betas.slice(s![N_DRIFT..ncol - 1, ..]));
    let y_corr = &y - &nuisance;

    let pct = Array2::from_shape_fn((nx, ny), |(i, j)| {
        let v = i * ny + j;
        let before = sample_var(y.column(v).iter().copied());
        let after = sample_var(y_corr.column(v).iter().copied());
        if before > 0.0 {
            (before - after) / before
        } else {
            0.0
        }
    });

    let corrected = Array3::from_shape_fn((nx, ny, nt), |(i, j, t)| y_corr[[t, i * ny + j]]);
    Ok((corrected, pct))
}

/// `[1 | zscore([t, t², regressors])]`, shape `[T, 3 + k]`.
pub fn design_matrix(regressors: ArrayView2<f64>) -> Array2<f64> {
    let (nt, k) = regressors.dim();
    let mut z = Array2::<f64>::zeros((nt, N_DRIFT - 1 + k));
    for t in 0..nt {
        z[[t, 0]] = t as f64;
        z[[t, 1]] = (t * t) as f64;
    }
    z.slice_mut(s![.., N_DRIFT - 1..]).assign(&regressors);
    zscore_columns_inplace(&mut z);

    let mut x = Array2::<f64>::ones((nt, N_DRIFT + k));
    x.slice_mut(s![.., 1..]).assign(&z);
    x
}

/// Moore–Penrose pseudo-inverse via SVD.
///
/// Singular values below `max(T, K) · ε · σ_max` are treated as zero.
fn pseudo_inverse(x: &Array2<f64>) -> Result<Array2<f64>, &'static str> {
    let (nr, nc) = x.dim();
    let m = DMatrix::from_fn(nr, nc, |i, j| x[[i, j]]);
    let svd = m.svd(true, true);
    let sigma_max = svd.singular_values.iter().copied().fold(0.0_f64, f64::max);
    let eps = nr.max(nc) as f64 * f64::EPSILON * sigma_max;
    let pinv = svd.pseudo_inverse(eps)?;
    Ok(Array2::from_shape_fn((nc, nr), |(i, j)| pinv[(i, j)]))
}
