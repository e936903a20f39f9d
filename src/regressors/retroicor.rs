//! RETROICOR Fourier regressors (Glover et al. 2000).
//!
//! Columns per slice: `cos φc, sin φc, cos 2φc, sin 2φc` followed by the same
//! four for the respiratory phase.
use ndarray::{s, Array3};

use crate::phase::PhaseTable;

/// Number of RETROICOR columns per slice.
pub const N_RETROICOR: usize = 8;

/// Fourier expansion of every slice's phases, shape `[nframes, 8, nslices]`.
pub fn retroicor(phases: &PhaseTable) -> Array3<f64> {
    let (nslices, nframes) = (phases.nslices(), phases.nframes());
    let mut out = Array3::<f64>::zeros((nframes, N_RETROICOR, nslices));
    for sl in 0..nslices {
        for fr in 0..nframes {
            let row = fourier_row(phases.cardiac(sl, fr), phases.respiratory(sl, fr));
            out.slice_mut(s![fr, .., sl])
                .iter_mut()
                .zip(row)
                .for_each(|(o, v)| *o = v);
        }
    }
    out
}

fn fourier_row(phi_c: f64, phi_r: f64) -> [f64; N_RETROICOR] {
    [
        phi_c.cos(),
        phi_c.sin(),
        (2.0 * phi_c).cos(),
        (2.0 * phi_c).sin(),
        phi_r.cos(),
        phi_r.sin(),
        (2.0 * phi_r).cos(),
        (2.0 * phi_r).sin(),
    ]
}
