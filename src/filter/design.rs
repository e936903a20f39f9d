//! FIR filter design matching `scipy.signal.firwin`.
//!
//! The respiration smoother is a 20-tap Hamming-windowed sinc low-pass at
//! 1 Hz.  Any tap count works; even counts give a type II linear-phase filter.
use std::f64::consts::PI;

/// Design a low-pass FIR of `ntaps` taps with a `cutoff_hz` −6 dB point,
/// normalised to unit DC gain.
///
/// Matches `scipy.signal.firwin(ntaps, cutoff_hz / (sfreq / 2))`.
pub fn design_lowpass(ntaps: usize, cutoff_hz: f64, sfreq: f64) -> Vec<f64> {
    assert!(ntaps > 0, "low-pass design requires at least one tap");
    let alpha = (ntaps - 1) as f64 / 2.0;
    let fc = (cutoff_hz / (sfreq / 2.0)).min(1.0);
    let win = hamming(ntaps);

    let mut h: Vec<f64> = (0..ntaps)
        .map(|i| {
            let x = i as f64 - alpha;
            // f(x) = sin(π·fc·x) / (π·x);  lim_{x→0} f(x) = fc
            let sinc = if x == 0.0 { fc } else { (PI * fc * x).sin() / (PI * x) };
            sinc * win[i]
        })
        .collect();

    let s: f64 = h.iter().sum();
    h.iter_mut().for_each(|v| *v /= s);
    h
}

/// Symmetric Hamming window of length `n`.
pub fn hamming(n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![1.0];
    }
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (n - 1) as f64).cos())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowpass_dc_gain_unity() {
        let h = design_lowpass(20, 1.0, 25.0);
        let dc: f64 = h.iter().sum();
        approx::assert_abs_diff_eq!(dc, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn even_length_lowpass_is_symmetric() {
        let h = design_lowpass(20, 1.0, 25.0);
        assert_eq!(h.len(), 20);
        for i in 0..10 {
            approx::assert_abs_diff_eq!(h[i], h[19 - i], epsilon = 1e-15);
        }
    }

    #[test]
    fn hamming_endpoints() {
        let w = hamming(21);
        approx::assert_abs_diff_eq!(w[0], 0.08, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(w[10], 1.0, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(w[20], 0.08, epsilon = 1e-12);
    }

    #[test]
    fn odd_length_lowpass_peaks_at_centre() {
        let h = design_lowpass(21, 1.0, 25.0);
        let dc: f64 = h.iter().sum();
        approx::assert_abs_diff_eq!(dc, 1.0, epsilon = 1e-12);
        let peak = h.iter().copied().fold(f64::MIN, f64::max);
        assert_eq!(h[10], peak);
    }
}
