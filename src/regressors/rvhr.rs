//! RVHRcor regressors (Birn et al. 2006; Chang et al. 2009).
//!
//! Respiration volume (RV) and heart rate (HR) are sampled once per frame at
//! each slice's acquisition time, demeaned, and convolved with the
//! respiration response function (RRF) and cardiac response function (CRF):
//!
//! ```text
//! R(t) = 0.6·t^2.1·e^(−t/1.6) − 0.0023·t^3.54·e^(−t/4.25)
//! H(t) = 0.6·t^2.7·e^(−t/1.6) − 16·N(t; 12, 3)
//! ```
//!
//! Both kernels are sampled every TR over the response horizon and scaled to
//! unit peak.
use std::f64::consts::PI;

use crate::config::HeartRateEstimator;
use crate::error::{PhysioError, PhysioResult};

/// Kernel sample times `0, tr, 2tr, …` below `horizon − tr`.
pub fn kernel_times(tr: f64, horizon: f64) -> Vec<f64> {
    let n = ((horizon - tr) / tr).ceil().max(0.0) as usize;
    (0..n).map(|k| k as f64 * tr).collect()
}

/// Respiration response function, unit peak.
pub fn respiration_response(t: &[f64]) -> Vec<f64> {
    unit_peak(
        t.iter()
            .map(|&t| 0.6 * t.powf(2.1) * (-t / 1.6).exp() - 0.0023 * t.powf(3.54) * (-t / 4.25).exp())
            .collect(),
    )
}

/// Cardiac response function, unit peak.
pub fn cardiac_response(t: &[f64]) -> Vec<f64> {
    unit_peak(
        t.iter()
            .map(|&t| 0.6 * t.powf(2.7) * (-t / 1.6).exp() - 16.0 * normal_pdf(t, 12.0, 3.0))
            .collect(),
    )
}

/// Standard deviation of `resp` in a `±t_win` window around each time.
///
/// Window bounds are `floor((t ∓ t_win) / dt)` clamped to the recording; an
/// empty window means the recording does not cover the scan.
pub fn respiration_volume(resp: &[f64], times: &[f64], t_win: f64, dt: f64) -> PhysioResult<Vec<f64>> {
    times
        .iter()
        .enumerate()
        .map(|(frame, &t)| {
            let i1 = ((t - t_win) / dt).floor().max(0.0) as usize;
            let i2 = (((t + t_win) / dt).floor().max(0.0) as usize).min(resp.len());
            if i2 <= i1 {
                return Err(PhysioError::DataLength { frame, start: i1, end: i2 });
            }
            Ok(crate::normalize::mean_std(&resp[i1..i2]).1)
        })
        .collect()
}

/// Heart rate (bpm) at each time, by the configured estimator.
pub fn heart_rate(card_trig: &[f64], times: &[f64], t_win: f64, estimator: HeartRateEstimator) -> Vec<f64> {
    match estimator {
        HeartRateEstimator::Legacy => heart_rate_windowed(card_trig, times, t_win),
        HeartRateEstimator::Interpolated { hr_min, hr_max } => {
            heart_rate_interpolated(card_trig, times, hr_min, hr_max)
        }
    }
}

fn heart_rate_windowed(card_trig: &[f64], times: &[f64], t_win: f64) -> Vec<f64> {
    let mut hr = Vec::with_capacity(times.len());
    for &t in times {
        let first = card_trig.partition_point(|&c| c < t - t_win);
        let end = card_trig.partition_point(|&c| c <= t + t_win);
        let value = if end < first + 2 {
            hr.last().copied().unwrap_or(60.0)
        } else {
            let last = end - 1;
            (last - first) as f64 * 60.0 / (card_trig[last] - card_trig[first])
        };
        hr.push(value);
    }
    hr
}

fn heart_rate_interpolated(card_trig: &[f64], times: &[f64], hr_min: f64, hr_max: f64) -> Vec<f64> {
    let (hr_time, hr_inst): (Vec<f64>, Vec<f64>) = card_trig
        .windows(2)
        .map(|w| {
            let delta = w[1] - w[0];
            (w[0] + delta / 2.0, 60.0 / delta)
        })
        .filter(|&(_, hr)| hr >= hr_min && hr <= hr_max)
        .unzip();

    if hr_inst.len() <= 2 {
        return vec![0.0; times.len()];
    }
    times.iter().map(|&t| interp(t, &hr_time, &hr_inst)).collect()
}

/// `np.convolve(x, h)[..x.len()]`.
pub fn convolve_truncated(x: &[f64], h: &[f64]) -> Vec<f64> {
    (0..x.len())
        .map(|i| {
            h.iter()
                .take(i + 1)
                .enumerate()
                .map(|(k, &hk)| hk * x[i - k])
                .sum()
        })
        .collect()
}

/// First difference, left-padded with its first value to keep the length.
pub fn time_derivative(x: &[f64]) -> Vec<f64> {
    let d: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
    match d.first() {
        Some(&first) => std::iter::once(first).chain(d).collect(),
        None => vec![0.0; x.len()],
    }
}

/// Subtract the mean in place.
pub fn demean(x: &mut [f64]) {
    if x.is_empty() {
        return;
    }
    let m = x.iter().sum::<f64>() / x.len() as f64;
    x.iter_mut().for_each(|v| *v -= m);
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn unit_peak(mut k: Vec<f64>) -> Vec<f64> {
    let peak = k.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if peak.is_finite() && peak != 0.0 {
        k.iter_mut().for_each(|v| *v /= peak);
    }
    k
}

fn normal_pdf(x: f64, mu: f64, sigma: f64) -> f64 {
    let z = (x - mu) / sigma;
    (-0.5 * z * z).exp() / (sigma * (2.0 * PI).sqrt())
}

/// `np.interp`: linear, clamped to the end values outside `xp`.
fn interp(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    let n = xp.len();
    if x <= xp[0] {
        return fp[0];
    }
    if x >= xp[n - 1] {
        return fp[n - 1];
    }
    let j = xp.partition_point(|&v| v <= x);
    let (x0, x1) = (xp[j - 1], xp[j]);
    let (y0, y1) = (fp[j - 1], fp[j]);
    if x1 == x0 {
        return y0;
    }
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}
