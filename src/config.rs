//! Processing configuration.
//!
//! [`PhysioConfig`] holds every tunable parameter for phase estimation and
//! regressor synthesis.  [`ValidityConfig`] holds the thresholds of the
//! usable-signal heuristic.  All fields have defaults that match the values
//! used for the CNI GE physio recordings (25 Hz respiration belt, 100 Hz PPG).

use crate::error::{PhysioError, PhysioResult};

/// How the heart-rate time series feeding the HR·CRF regressor is estimated.
///
/// The two variants are alternative algorithms, not a default plus an
/// override; pick one when building the [`PhysioConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeartRateEstimator {
    /// Count triggers within `±t_win` of each slice acquisition and divide by
    /// their span.  Windows with fewer than two triggers hold the previous
    /// value (60 bpm for the first frame).
    Legacy,

    /// Instantaneous heart rate at trigger midpoints, values outside
    /// `[hr_min, hr_max]` bpm discarded, linearly interpolated onto the slice
    /// acquisition times.  Fewer than three surviving samples give an all-zero
    /// heart-rate trace.
    Interpolated {
        /// Lowest plausible heart rate (bpm).
        hr_min: f64,
        /// Highest plausible heart rate (bpm).
        hr_max: f64,
    },
}

impl Default for HeartRateEstimator {
    fn default() -> Self {
        HeartRateEstimator::Interpolated { hr_min: 30.0, hr_max: 180.0 }
    }
}

/// Configuration for phase estimation and regressor synthesis.
///
/// Construct with struct-update syntax:
///
/// ```
/// use physio_regress::{HeartRateEstimator, PhysioConfig};
///
/// let cfg = PhysioConfig {
///     heart_rate: HeartRateEstimator::Legacy,
///     ..PhysioConfig::default()
/// };
/// assert_eq!(cfg.hist_bins, 100);
/// ```
#[derive(Debug, Clone)]
pub struct PhysioConfig {
    /// Sampling interval of the cardiac (PPG) waveform and trigger indices, in
    /// seconds.
    ///
    /// Default: `0.01` s (100 Hz).
    pub card_dt: f64,

    /// Sampling interval of the respiration waveform, in seconds.
    ///
    /// Default: `0.04` s (25 Hz).
    pub resp_dt: f64,

    /// Half-width of the window used for respiration volume and legacy heart
    /// rate, in seconds.
    ///
    /// Default: `3.0` s (a 6 s window).
    pub t_win: f64,

    /// Cutoff of the low-pass FIR applied to respiration before
    /// differentiation, in Hz.
    ///
    /// Default: `1.0` Hz.
    pub resp_cutoff_hz: f64,

    /// Number of taps of the respiration low-pass FIR.
    ///
    /// Default: `20`.
    pub resp_filter_taps: usize,

    /// Number of amplitude bins used for the respiratory phase histogram.
    ///
    /// Default: `100`.
    pub hist_bins: usize,

    /// Length of the RRF / CRF impulse responses, in seconds.
    ///
    /// Default: `40.0` s.
    pub response_horizon: f64,

    /// Heart-rate estimation strategy.
    ///
    /// Default: [`HeartRateEstimator::Interpolated`] with 30–180 bpm.
    pub heart_rate: HeartRateEstimator,
}

impl Default for PhysioConfig {
    fn default() -> Self {
        Self {
            card_dt: 0.01,
            resp_dt: 0.04,
            t_win: 3.0,
            resp_cutoff_hz: 1.0,
            resp_filter_taps: 20,
            hist_bins: 100,
            response_horizon: 40.0,
            heart_rate: HeartRateEstimator::default(),
        }
    }
}

impl PhysioConfig {
    /// Respiration sampling rate in Hz.
    pub fn resp_sfreq(&self) -> f64 {
        1.0 / self.resp_dt
    }

    /// Reject parameter combinations the estimators cannot work with.
    pub fn validate(&self) -> PhysioResult<()> {
        let positive = [
            ("card_dt", self.card_dt),
            ("resp_dt", self.resp_dt),
            ("t_win", self.t_win),
            ("resp_cutoff_hz", self.resp_cutoff_hz),
            ("response_horizon", self.response_horizon),
        ];
        if let Some((name, v)) = positive.iter().find(|(_, v)| !(v.is_finite() && *v > 0.0)) {
            return Err(PhysioError::Configuration(format!("{name} must be positive, got {v}")));
        }
        if self.resp_filter_taps == 0 || self.hist_bins == 0 {
            return Err(PhysioError::Configuration(
                "resp_filter_taps and hist_bins must be at least 1".into(),
            ));
        }
        if let HeartRateEstimator::Interpolated { hr_min, hr_max } = self.heart_rate {
            if hr_min >= hr_max {
                return Err(PhysioError::Configuration(format!(
                    "hr_min ({hr_min}) must be below hr_max ({hr_max})"
                )));
            }
        }
        Ok(())
    }
}

/// Thresholds of the valid-recording heuristic.
///
/// A disconnected PPG produces very low amplitude noise; a disconnected belt
/// produces a spectrum without the dominant low-frequency breathing energy.
#[derive(Debug, Clone)]
pub struct ValidityConfig {
    /// Minimum number of scan frames.  Default: `8`.
    pub min_number_of_frames: usize,
    /// Minimum standard deviation of the PPG waveform.  Default: `4.0`.
    pub min_card_std: f64,
    /// Minimum ratio of low- to high-frequency respiration amplitude.
    /// Default: `40.0`.
    pub min_resp_lfp: f64,
    /// Upper edge of the respiration low-frequency band in Hz.  Default: `1.0`.
    pub resp_freq_cutoff: f64,
    /// Plausible instantaneous heart-rate range in bpm.  Default: `30..=200`.
    pub hr_range: (f64, f64),
    /// Fraction of instantaneous heart-rate values that must be plausible.
    /// Default: `0.2`.
    pub min_good_hr_fraction: f64,
}

impl Default for ValidityConfig {
    fn default() -> Self {
        Self {
            min_number_of_frames: 8,
            min_card_std: 4.0,
            min_resp_lfp: 40.0,
            resp_freq_cutoff: 1.0,
            hr_range: (30.0, 200.0),
            min_good_hr_fraction: 0.2,
        }
    }
}
