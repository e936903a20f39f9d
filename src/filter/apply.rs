//! Zero-phase forward–backward FIR filtering.
//!
//! Matches `scipy.signal.filtfilt(b, [1], x)` with its defaults:
//! odd extension of `3 · len(b)` samples on each side and steady-state
//! initial conditions (`lfilter_zi`) scaled by the first sample of each pass.
//!
//! Shorter signals get the extension clamped to `len(x) - 1` samples.

/// Apply the FIR `b` forward and backward over `x`.
///
/// Returns a vector of the same length as `x`.
pub fn filtfilt(b: &[f64], x: &[f64]) -> Vec<f64> {
    let n_x = x.len();
    if n_x == 0 || b.is_empty() {
        return x.to_vec();
    }
    let padlen = (3 * b.len()).min(n_x - 1);

    let ext = odd_ext(x, padlen);
    let zi = lfilter_zi(b);

    // Forward pass.
    let z0: Vec<f64> = zi.iter().map(|&z| z * ext[0]).collect();
    let mut y = lfilter(b, &ext, &z0);

    // Backward pass.
    y.reverse();
    let z0: Vec<f64> = zi.iter().map(|&z| z * y[0]).collect();
    let mut y = lfilter(b, &y, &z0);
    y.reverse();

    y[padlen..padlen + n_x].to_vec()
}

/// Direct-form II transposed FIR filter with initial state `zi`.
///
/// `zi` must have `len(b) - 1` entries.
pub fn lfilter(b: &[f64], x: &[f64], zi: &[f64]) -> Vec<f64> {
    let order = b.len() - 1;
    let mut z = zi.to_vec();
    let mut y = Vec::with_capacity(x.len());
    for &xn in x {
        let yn = b[0] * xn + if order > 0 { z[0] } else { 0.0 };
        for k in 0..order {
            let next = if k + 1 < order { z[k + 1] } else { 0.0 };
            z[k] = b[k + 1] * xn + next;
        }
        y.push(yn);
    }
    y
}

/// Steady-state initial conditions of an FIR filter for a unit step.
///
/// For `a = [1]` this reduces to `zi[k] = Σ b[k+1..]`.
pub fn lfilter_zi(b: &[f64]) -> Vec<f64> {
    (1..b.len()).map(|k| b[k..].iter().sum()).collect()
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Odd extension (matches `scipy.signal._arraytools.odd_ext`).
///
/// Left:  `2*x[0] - x[n]` … `2*x[0] - x[1]`
/// Right: `2*x[-1] - x[-2]` … `2*x[-1] - x[-(n+1)]`
fn odd_ext(x: &[f64], n: usize) -> Vec<f64> {
    let len = x.len();
    let mut out = Vec::with_capacity(len + 2 * n);
    for i in (1..=n).rev() {
        out.push(2.0 * x[0] - x[i]);
    }
    out.extend_from_slice(x);
    let last = x[len - 1];
    for i in 1..=n {
        out.push(2.0 * last - x[len - 1 - i]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::design::design_lowpass;

    #[test]
    fn filter_preserves_length() {
        let x: Vec<f64> = (0..1000).map(|i| (i as f64 * 0.05).sin()).collect();
        let b = design_lowpass(20, 1.0, 25.0);
        assert_eq!(filtfilt(&b, &x).len(), x.len());
    }

    #[test]
    fn constant_passes_unchanged() {
        let x = vec![3.5_f64; 200];
        let b = design_lowpass(20, 1.0, 25.0);
        for v in filtfilt(&b, &x) {
            approx::assert_abs_diff_eq!(v, 3.5, epsilon = 1e-10);
        }
    }

    #[test]
    fn zi_gives_step_steady_state() {
        let b = [0.25, 0.5, 0.25];
        let zi = lfilter_zi(&b);
        assert_eq!(zi, vec![0.75, 0.25]);
        let y = lfilter(&b, &[1.0; 5], &zi);
        for v in y {
            approx::assert_abs_diff_eq!(v, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn odd_ext_reflects_about_endpoints() {
        let x = [1.0, 2.0, 4.0, 7.0];
        let e = odd_ext(&x, 2);
        assert_eq!(e, vec![-2.0, 0.0, 1.0, 2.0, 4.0, 7.0, 10.0, 12.0]);
    }

    #[test]
    fn short_signal_does_not_panic() {
        let b = design_lowpass(20, 1.0, 25.0);
        let y = filtfilt(&b, &[1.0, 2.0, 3.0]);
        assert_eq!(y.len(), 3);
    }
}
