//! Column z-scoring and polynomial detrending.
//!
//! `zscore_columns_inplace` matches `scipy.stats.zscore(X, axis=0)`:
//!   μ = column mean,  σ = column std (ddof=0)
//!   X[:, j] = (X[:, j] - μ) / σ
//!   A zero-variance column is set to 0 instead of NaN.
//!
//! `detrend_quadratic_inplace` matches
//!   `y -= np.polyval(np.polyfit(x, y, 2), x)` with `x = 0..n`.
use ndarray::{Array2, ArrayViewMut1, Axis};

/// Column-wise z-score over the rows of `data` ([T, K]).
pub fn zscore_columns_inplace(data: &mut Array2<f64>) {
    let n = data.nrows() as f64;
    for mut col in data.axis_iter_mut(Axis(1)) {
        let mean = col.sum() / n;
        let var = col.iter().map(|&v| (v - mean) * (v - mean)).sum::<f64>() / n;
        let std = var.sqrt();
        if std > 0.0 {
            col.mapv_inplace(|v| (v - mean) / std);
        } else {
            col.fill(0.0);
        }
    }
}

/// Subtract the least-squares quadratic in the sample index from `y`.
///
/// The fit projects onto an orthonormal basis of `{1, x, x²}` built by
/// Gram–Schmidt on centred indices, so it is well conditioned for long
/// series.  Series shorter than three samples are fully absorbed by the
/// polynomial and become zero.
pub fn detrend_quadratic_inplace(mut y: ArrayViewMut1<f64>) {
    let n = y.len();
    if n < 3 {
        y.fill(0.0);
        return;
    }
    let centre = (n - 1) as f64 / 2.0;
    let raw: [Vec<f64>; 3] = [
        vec![1.0; n],
        (0..n).map(|i| i as f64 - centre).collect(),
        (0..n).map(|i| (i as f64 - centre).powi(2)).collect(),
    ];

    let mut basis: Vec<Vec<f64>> = Vec::with_capacity(3);
    for v in raw {
        let mut q = v;
        for b in &basis {
            let proj = dot(&q, b);
            q.iter_mut().zip(b).for_each(|(qi, bi)| *qi -= proj * bi);
        }
        let norm = dot(&q, &q).sqrt();
        q.iter_mut().for_each(|qi| *qi /= norm);
        basis.push(q);
    }

    for b in &basis {
        let coef: f64 = y.iter().zip(b).map(|(yi, bi)| yi * bi).sum();
        y.iter_mut().zip(b).for_each(|(yi, bi)| *yi -= coef * bi);
    }
}

/// Population mean and standard deviation (`ddof = 0`).
pub fn mean_std(x: &[f64]) -> (f64, f64) {
    if x.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = x.len() as f64;
    let mean = x.iter().sum::<f64>() / n;
    let var = x.iter().map(|&v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Sample variance (`ddof = 1`) of an iterator of values.
pub fn sample_var<I: IntoIterator<Item = f64> + Clone>(x: I) -> f64 {
    let n = x.clone().into_iter().count();
    if n < 2 {
        return f64::NAN;
    }
    let mean = x.clone().into_iter().sum::<f64>() / n as f64;
    x.into_iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1) as f64
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2};

    #[test]
    fn zscore_columns_mean_zero_std_one() {
        let mut data = Array2::from_shape_fn((64, 3), |(t, k)| {
            (t as f64 * 0.3 + k as f64).sin() * (k + 1) as f64 * 10.0 + k as f64
        });
        zscore_columns_inplace(&mut data);
        for col in data.axis_iter(Axis(1)) {
            let v: Vec<f64> = col.to_vec();
            let (m, s) = mean_std(&v);
            approx::assert_abs_diff_eq!(m, 0.0, epsilon = 1e-12);
            approx::assert_abs_diff_eq!(s, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn zscore_constant_column_becomes_zero() {
        let mut data = Array2::from_elem((10, 2), 4.0);
        data[[3, 1]] = 5.0;
        zscore_columns_inplace(&mut data);
        assert!(data.column(0).iter().all(|&v| v == 0.0));
        assert!(data.column(1).iter().all(|v| v.is_finite()));
    }

    #[test]
    fn quadratic_is_removed_exactly() {
        let mut y = Array1::from_shape_fn(50, |i| {
            let x = i as f64;
            3.0 - 0.2 * x + 0.01 * x * x
        });
        detrend_quadratic_inplace(y.view_mut());
        for &v in y.iter() {
            approx::assert_abs_diff_eq!(v, 0.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn detrend_is_idempotent() {
        let mut y = Array1::from_shape_fn(40, |i| (i as f64 * 0.7).cos() + i as f64 * 0.05);
        detrend_quadratic_inplace(y.view_mut());
        let once = y.clone();
        detrend_quadratic_inplace(y.view_mut());
        for (a, b) in once.iter().zip(y.iter()) {
            approx::assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn sample_variance_uses_ddof_one() {
        approx::assert_abs_diff_eq!(sample_var(vec![1.0, 2.0, 3.0, 4.0]), 5.0 / 3.0, epsilon = 1e-12);
        assert!(sample_var(vec![1.0]).is_nan());
    }
}
