//! Crude heuristics for telling recorded physiology from sensor noise.
//!
//! - Cardiac: a connected PPG has a sizeable amplitude spread and produces
//!   mostly plausible beat-to-beat heart rates.
//! - Respiration: the belt signal is heavily low-pass filtered by the
//!   scanner, so valid data carries far more low-frequency than
//!   high-frequency spectral amplitude.
//!
//! A recording is usable when either channel passes.
use rustfft::{num_complex::Complex, FftPlanner};

use crate::config::ValidityConfig;
use crate::normalize::mean_std;
use crate::recording::PhysioRecording;

/// Per-channel outcome of [`assess`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Validity {
    pub cardiac: bool,
    pub respiratory: bool,
}

impl Validity {
    pub fn is_valid(&self) -> bool {
        self.cardiac || self.respiratory
    }
}

/// Judge whether `rec` holds usable physiology.
pub fn is_valid(rec: &PhysioRecording, cfg: &ValidityConfig) -> bool {
    assess(rec, cfg).is_valid()
}

/// Evaluate the cardiac and respiratory checks separately.
pub fn assess(rec: &PhysioRecording, cfg: &ValidityConfig) -> Validity {
    if rec.nframes < cfg.min_number_of_frames || rec.resp_wave.is_empty() || rec.card_wave.is_empty() {
        return Validity { cardiac: false, respiratory: false };
    }
    Validity {
        cardiac: cardiac_valid(rec, cfg),
        respiratory: respiratory_valid(&rec.resp_wave, rec.resp_dt, cfg),
    }
}

fn cardiac_valid(rec: &PhysioRecording, cfg: &ValidityConfig) -> bool {
    if rec.hr_instant.is_empty() {
        return false;
    }
    let (lo, hi) = cfg.hr_range;
    let good = rec.hr_instant.iter().filter(|&&hr| hr >= lo && hr <= hi).count();
    let proportion_good = good as f64 / rec.hr_instant.len() as f64;
    mean_std(&rec.card_wave).1 > cfg.min_card_std && proportion_good > cfg.min_good_hr_fraction
}

/// Low- to high-frequency amplitude ratio test on the respiration spectrum.
pub fn respiratory_valid(resp_wave: &[f64], resp_dt: f64, cfg: &ValidityConfig) -> bool {
    let amp = rfft_amplitude(resp_wave);
    let df = 1.0 / (resp_dt * resp_wave.len() as f64);
    let f_bin = (cfg.resp_freq_cutoff / df).round() as usize;
    if f_bin >= amp.len() || f_bin <= 2 {
        return false;
    }
    let low = mean(&amp[2..f_bin]);
    let high = mean(&amp[amp.len() - f_bin..]);
    low / high > cfg.min_resp_lfp
}

/// `|rfft(x)|`: amplitudes of bins `0..=n/2`.
fn rfft_amplitude(x: &[f64]) -> Vec<f64> {
    let n = x.len();
    if n == 0 {
        return vec![];
    }
    let mut buf: Vec<Complex<f64>> = x.iter().map(|&v| Complex { re: v, im: 0.0 }).collect();
    let mut planner: FftPlanner<f64> = FftPlanner::new();
    planner.plan_fft_forward(n).process(&mut buf);
    buf.iter().take(n / 2 + 1).map(|c| c.norm()).collect()
}

fn mean(x: &[f64]) -> f64 {
    x.iter().sum::<f64>() / x.len() as f64
}
