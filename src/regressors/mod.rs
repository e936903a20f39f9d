//! Physiological nuisance regressors.
//!
//! - [`retroicor`]: Fourier expansion of cardiac and respiratory phase.
//! - [`rvhr`]: respiration-volume and heart-rate convolution regressors.
//!
//! The final set per slice has 13 columns, in [`REGRESSOR_NAMES`] order.
//! Every column except the raw heart rate is quadratically detrended over
//! frame index.

pub mod retroicor;
pub mod rvhr;

use ndarray::{s, Array3};
use tracing::{debug, warn};

use crate::config::PhysioConfig;
use crate::error::{PhysioError, PhysioResult};
use crate::normalize::detrend_quadratic_inplace;
use crate::phase::{check_frames, estimate_phases_with, PhaseTable, RespirationTrace};
use crate::recording::PhysioSession;

pub use retroicor::{retroicor, N_RETROICOR};

/// Column names of one slice's regressors.
pub const REGRESSOR_NAMES: [&str; 13] = [
    "c1_c", "s1_c", "c2_c", "s2_c", "c1_r", "s1_r", "c2_r", "s2_r",
    "rv_rrf", "rv_rrf_d", "hr_crf", "hr_crf_d", "hr",
];

/// Regressors per slice.
pub const N_REGRESSORS: usize = REGRESSOR_NAMES.len();

/// Index of the raw heart-rate column, left undetrended.
pub const HR_COLUMN: usize = N_REGRESSORS - 1;

/// RETROICOR + RVHRcor regressors, shape `[nframes, 13, nslices]`.
///
/// The regressors for slice `i` are the columns of `data[.., .., i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RegressorSet {
    pub data: Array3<f64>,
    /// Onsets of the slices the regressors were computed for.
    pub slice_onsets: Vec<f64>,
}

impl RegressorSet {
    pub fn nframes(&self) -> usize {
        self.data.dim().0
    }

    pub fn nslices(&self) -> usize {
        self.data.dim().2
    }

    /// Column `reg` of slice `sl`.
    pub fn column(&self, reg: usize, sl: usize) -> Vec<f64> {
        self.data.slice(s![.., reg, sl]).to_vec()
    }
}

/// Compute phases and regressors for `session`.
///
/// Returns `Ok(None)`, after a warning, when the session cannot produce
/// regressors: fewer than three frames or no respiration recorded.  Errors
/// are reserved for data that is present but unusable.
pub fn compute_regressors(
    session: &PhysioSession,
    cfg: &PhysioConfig,
) -> PhysioResult<Option<(RegressorSet, PhaseTable)>> {
    cfg.validate()?;
    session.check_geometry()?;
    if let Err(e @ PhysioError::InsufficientData { .. }) = check_frames(session.nframes()) {
        warn!("{e}; regressors not computed");
        return Ok(None);
    }
    if !session.recording.has_respiration() {
        warn!("no respiration waveform; regressors not computed");
        return Ok(None);
    }
    if !session.recording.has_cardiac_triggers() {
        warn!("no cardiac triggers; cardiac phase spans the whole scan and heart rate is zero");
    }

    let resp = RespirationTrace::from_session(session, cfg)?;
    let phases = estimate_phases_with(session, &resp, cfg);
    let regressors = synthesize(session, &phases, &resp, cfg)?;
    debug!(
        nframes = regressors.nframes(),
        nslices = regressors.nslices(),
        "physio regressors computed"
    );
    Ok(Some((regressors, phases)))
}

/// Build the 13 regressors per slice from precomputed phases.
pub fn synthesize(
    session: &PhysioSession,
    phases: &PhaseTable,
    resp: &RespirationTrace,
    cfg: &PhysioConfig,
) -> PhysioResult<RegressorSet> {
    let nframes = session.nframes();
    let nslices = session.nslices();
    let card_trig = session.recording.card_trig_chopped();

    let t = rvhr::kernel_times(session.tr(), cfg.response_horizon);
    let rrf = rvhr::respiration_response(&t);
    let crf = rvhr::cardiac_response(&t);

    let mut data = Array3::<f64>::zeros((nframes, N_REGRESSORS, nslices));
    data.slice_mut(s![.., ..N_RETROICOR, ..]).assign(&retroicor(phases));

    for sl in 0..nslices {
        let times = session.slice_times(sl);

        let mut rv = rvhr::respiration_volume(&resp.filtered, &times, cfg.t_win, cfg.resp_dt)?;
        rvhr::demean(&mut rv);
        let rv_rrf = rvhr::convolve_truncated(&rv, &rrf);
        let rv_rrf_d = rvhr::time_derivative(&rv_rrf);

        let hr_raw = rvhr::heart_rate(card_trig, &times, cfg.t_win, cfg.heart_rate);
        let mut hr = hr_raw.clone();
        rvhr::demean(&mut hr);
        let hr_crf = rvhr::convolve_truncated(&hr, &crf);
        let hr_crf_d = rvhr::time_derivative(&hr_crf);

        for (k, col) in [rv_rrf, rv_rrf_d, hr_crf, hr_crf_d, hr_raw].into_iter().enumerate() {
            data.slice_mut(s![.., N_RETROICOR + k, sl])
                .assign(&ndarray::ArrayView1::from(&col));
        }

        for reg in 0..HR_COLUMN {
            detrend_quadratic_inplace(data.slice_mut(s![.., reg, sl]));
        }
    }

    Ok(RegressorSet { data, slice_onsets: session.slices.slice_onsets.clone() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{PhysioRecording, SliceTiming};

    fn session(nframes: usize) -> PhysioSession {
        let cfg = PhysioConfig::default();
        let resp: Vec<f64> = (0..1000).map(|i| (i as f64 * 0.04 * 0.3 * 2.0 * std::f64::consts::PI).sin()).collect();
        let trig: Vec<f64> = (1..=40).map(|k| k as f64 * 0.9).collect();
        let rec = PhysioRecording::from_aligned_triggers(resp, trig, 2.0, nframes, &cfg).unwrap();
        PhysioSession::new(rec, SliceTiming::new(vec![0.0, 0.5, 1.0, 1.5], None).unwrap())
    }

    #[test]
    fn shape_and_names() {
        let (reg, phases) = compute_regressors(&session(10), &PhysioConfig::default()).unwrap().unwrap();
        assert_eq!(reg.data.dim(), (10, 13, 4));
        assert_eq!(phases.data.dim(), (4, 10, 2));
        assert_eq!(REGRESSOR_NAMES[HR_COLUMN], "hr");
    }

    #[test]
    fn detrended_columns_have_zero_sum() {
        let (reg, _) = compute_regressors(&session(12), &PhysioConfig::default()).unwrap().unwrap();
        for sl in 0..reg.nslices() {
            for k in 0..HR_COLUMN {
                let sum: f64 = reg.column(k, sl).iter().sum();
                approx::assert_abs_diff_eq!(sum, 0.0, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn raw_heart_rate_is_kept() {
        let (reg, _) = compute_regressors(&session(10), &PhysioConfig::default()).unwrap().unwrap();
        // 0.9 s beats → 66.7 bpm everywhere.
        for v in reg.column(HR_COLUMN, 0) {
            approx::assert_abs_diff_eq!(v, 60.0 / 0.9, epsilon = 1e-6);
        }
    }

    #[test]
    fn too_few_frames_is_not_an_error() {
        assert!(compute_regressors(&session(2), &PhysioConfig::default()).unwrap().is_none());
    }
}
