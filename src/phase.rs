//! Cardiac and respiratory phase estimation.
//!
//! For slice `sl` in frame `fr` the acquisition time is the readout midpoint
//! `onset[sl] + window/2 + fr·tr`.
//!
//! - Cardiac phase: position between the surrounding heartbeats,
//!   `2π · (t − t1) / (t2 − t1)`, with `t1 = 0` before the first beat and
//!   `t2 = nframes·tr` after the last.
//! - Respiratory phase: histogram-equalised amplitude (Glover et al. 2000),
//!   `π · sign(dR/dt) · H(R(t)) / N`, where `H` is the cumulative amplitude
//!   histogram of the smoothed belt signal.
use std::f64::consts::PI;

use ndarray::Array3;

use crate::config::PhysioConfig;
use crate::error::{PhysioError, PhysioResult};
use crate::filter::{design_lowpass, filtfilt};
use crate::recording::PhysioSession;

/// Fewest frames for which phases and regressors are defined.
pub const MIN_FRAMES: usize = 3;

/// Per-slice, per-frame phases, shape `[nslices, nframes, 2]`.
///
/// Channel 0 is cardiac phase in `[0, 2π)`, channel 1 respiratory phase in
/// `[−π, π]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseTable {
    pub data: Array3<f64>,
}

impl PhaseTable {
    pub fn nslices(&self) -> usize {
        self.data.dim().0
    }

    pub fn nframes(&self) -> usize {
        self.data.dim().1
    }

    pub fn cardiac(&self, sl: usize, fr: usize) -> f64 {
        self.data[[sl, fr, 0]]
    }

    pub fn respiratory(&self, sl: usize, fr: usize) -> f64 {
        self.data[[sl, fr, 1]]
    }
}

/// Smoothed respiration and its amplitude histogram.
///
/// Built once per session and shared by phase estimation and the
/// respiration-volume regressor.
#[derive(Debug, Clone)]
pub struct RespirationTrace {
    /// Zero-baselined, low-pass filtered belt signal from scan start.
    pub filtered: Vec<f64>,
    /// `diff(filtered)`.
    pub drdt: Vec<f64>,
    /// Sample counts per amplitude bin.
    pub hist: Vec<usize>,
    /// `hist.len() + 1` bin edges.
    pub edges: Vec<f64>,
}

impl RespirationTrace {
    /// Baseline, filter and histogram the post-scan-start respiration.
    pub fn from_session(session: &PhysioSession, cfg: &PhysioConfig) -> PhysioResult<Self> {
        let chopped = session.recording.resp_wave_chopped();
        if chopped.len() < 2 {
            return Err(PhysioError::DataLength { frame: 0, start: 0, end: chopped.len() });
        }
        let min = chopped.iter().copied().fold(f64::INFINITY, f64::min);
        let baselined: Vec<f64> = chopped.iter().map(|&v| v - min).collect();

        let b = design_lowpass(cfg.resp_filter_taps, cfg.resp_cutoff_hz, cfg.resp_sfreq());
        let filtered = filtfilt(&b, &baselined);
        let drdt = filtered.windows(2).map(|w| w[1] - w[0]).collect();
        let (hist, edges) = histogram(&filtered, cfg.hist_bins);

        Ok(Self { filtered, drdt, hist, edges })
    }

    /// Respiratory phase at time `t` (s from scan start).
    pub fn phase_at(&self, t: f64, resp_dt: f64) -> f64 {
        let iphys = (t / resp_dt).round_ties_even().max(0.0);
        let iphys = (iphys as usize).min(self.drdt.len() - 1);
        let amp = self.filtered[iphys];

        let bin = closest_edge(&self.edges, amp);
        let below: usize = self.hist[..bin].iter().sum();
        PI * sign(self.drdt[iphys]) * below as f64 / self.filtered.len() as f64
    }
}

/// Cardiac phase at time `t` given heartbeat times `card_trig` (ascending).
pub fn cardiac_phase(card_trig: &[f64], t: f64, scan_end: f64) -> f64 {
    let n_before = card_trig.partition_point(|&c| c <= t);
    let t1 = if n_before == 0 { 0.0 } else { card_trig[n_before - 1] };
    let t2 = card_trig.get(n_before).copied().unwrap_or(scan_end);
    if t2 <= t1 {
        return 0.0;
    }
    (t - t1) * 2.0 * PI / (t2 - t1)
}

/// Compute the phase table for every slice and frame of `session`.
pub fn estimate_phases(session: &PhysioSession, cfg: &PhysioConfig) -> PhysioResult<PhaseTable> {
    cfg.validate()?;
    session.check_geometry()?;
    check_frames(session.nframes())?;
    let resp = RespirationTrace::from_session(session, cfg)?;
    Ok(estimate_phases_with(session, &resp, cfg))
}

pub(crate) fn check_frames(nframes: usize) -> PhysioResult<()> {
    if nframes < MIN_FRAMES {
        return Err(PhysioError::InsufficientData { got: nframes, need: MIN_FRAMES });
    }
    Ok(())
}

pub(crate) fn estimate_phases_with(
    session: &PhysioSession,
    resp: &RespirationTrace,
    cfg: &PhysioConfig,
) -> PhaseTable {
    let nframes = session.nframes();
    let card_trig = session.recording.card_trig_chopped();
    let scan_end = nframes as f64 * session.tr();

    let mut data = Array3::<f64>::zeros((session.nslices(), nframes, 2));
    for sl in 0..session.nslices() {
        for (fr, &t) in session.slice_times(sl).iter().enumerate() {
            data[[sl, fr, 0]] = cardiac_phase(card_trig, t, scan_end);
            data[[sl, fr, 1]] = resp.phase_at(t, cfg.resp_dt);
        }
    }
    PhaseTable { data }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Equal-width histogram with numpy's edge rules (last bin closed).
fn histogram(x: &[f64], bins: usize) -> (Vec<usize>, Vec<f64>) {
    let mut lo = x.iter().copied().fold(f64::INFINITY, f64::min);
    let mut hi = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }
    let width = (hi - lo) / bins as f64;
    let edges: Vec<f64> = (0..=bins).map(|k| lo + k as f64 * width).collect();

    let mut hist = vec![0_usize; bins];
    for &v in x.iter().filter(|v| v.is_finite()) {
        let k = (((v - lo) / (hi - lo)) * bins as f64).floor();
        let k = (k.max(0.0) as usize).min(bins - 1);
        hist[k] += 1;
    }
    (hist, edges)
}

fn closest_edge(edges: &[f64], amp: f64) -> usize {
    let mut best = 0;
    let mut best_d = f64::INFINITY;
    for (k, &e) in edges.iter().enumerate() {
        let d = (amp - e).abs();
        if d < best_d {
            best = k;
            best_d = d;
        }
    }
    best
}

/// `np.sign`: zero maps to zero.
fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cardiac_phase_between_equal_beats() {
        let trig: Vec<f64> = (0..20).map(|k| k as f64).collect();
        for frac in [0.1, 0.25, 0.5, 0.9] {
            let t = 5.0 + frac;
            approx::assert_abs_diff_eq!(cardiac_phase(&trig, t, 20.0), 2.0 * PI * frac, epsilon = 1e-12);
        }
    }

    #[test]
    fn cardiac_phase_on_beat_is_zero() {
        let trig = [1.0, 2.0, 3.0];
        approx::assert_abs_diff_eq!(cardiac_phase(&trig, 2.0, 10.0), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn cardiac_phase_boundaries() {
        let trig = [4.0, 6.0];
        // Before the first beat t1 = 0.
        approx::assert_abs_diff_eq!(cardiac_phase(&trig, 1.0, 10.0), 2.0 * PI / 4.0, epsilon = 1e-12);
        // After the last beat t2 = end of scan.
        approx::assert_abs_diff_eq!(cardiac_phase(&trig, 8.0, 10.0), PI, epsilon = 1e-12);
        // No beats at all.
        approx::assert_abs_diff_eq!(cardiac_phase(&[], 5.0, 10.0), PI, epsilon = 1e-12);
    }

    #[test]
    fn histogram_matches_numpy_edges() {
        let (hist, edges) = histogram(&[0.0, 1.0, 2.0, 3.0, 4.0], 4);
        assert_eq!(edges, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(hist, vec![1, 1, 1, 2]);
    }

    #[test]
    fn histogram_of_constant_is_centred() {
        let (hist, edges) = histogram(&[2.0; 7], 2);
        assert_eq!(edges, vec![1.5, 2.0, 2.5]);
        assert_eq!(hist, vec![0, 7]);
    }

    #[test]
    fn sign_of_zero_is_zero() {
        assert_eq!(sign(0.0), 0.0);
        assert_eq!(sign(-0.0), 0.0);
        assert_eq!(sign(-3.0), -1.0);
    }
}
