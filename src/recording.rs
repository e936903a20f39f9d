//! Waveform ingestion and alignment.
//!
//! Physio logging on the scanner runs longer than the scan and stops when the
//! scan stops, so the recordings are aligned on their tail:
//!
//! ```text
//! scan_duration = nframes · tr
//! offset        = dt · n_samples − scan_duration
//! time[i]       = dt · i − offset
//! card_trig     = raw_trig · card_dt − card_offset
//! ```
//!
//! Time zero is then the start of the first acquired volume.
use serde::{de, Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::config::PhysioConfig;
use crate::error::{PhysioError, PhysioResult};

/// Acquisition identifiers read from the companion `_physio.json` document.
///
/// Identifier fields accept JSON numbers as well as strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionMetadata {
    #[serde(deserialize_with = "string_or_number")]
    pub group: String,
    #[serde(deserialize_with = "string_or_number")]
    pub experiment: String,
    #[serde(deserialize_with = "string_or_number")]
    pub session: String,
    #[serde(deserialize_with = "string_or_number")]
    pub epoch: String,
    #[serde(deserialize_with = "string_or_number")]
    pub timestamp: String,
    #[serde(default)]
    pub exam_uid: Option<String>,
    #[serde(default)]
    pub series_uid: Option<String>,
    #[serde(default)]
    pub series_no: Option<u32>,
    #[serde(default)]
    pub acq_no: Option<u32>,
}

impl AcquisitionMetadata {
    /// `"<series>.<acq>"`, or just `"<series>"` when there is no acquisition
    /// number.  Empty when the series is unknown.
    pub fn acquisition_label(&self) -> String {
        match (self.series_no, self.acq_no) {
            (Some(s), Some(a)) => format!("{s}.{a}"),
            (Some(s), None) => s.to_string(),
            _ => String::new(),
        }
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    match serde_json::Value::deserialize(d)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!("expected a string or number, got {other}"))),
    }
}

/// Physio fields as found in the source files, before alignment.
///
/// `card_trig` holds PPG sample indices, as written by the GE logger.
#[derive(Debug, Clone, Default)]
pub struct RawPhysio {
    pub resp_wave: Option<Vec<f64>>,
    pub resp_trig: Option<Vec<f64>>,
    pub card_wave: Option<Vec<f64>>,
    pub card_trig: Option<Vec<f64>>,
    pub metadata: Option<AcquisitionMetadata>,
}

/// A physio recording aligned to the start of the scan.
///
/// Empty vectors mean the channel was not recorded.
#[derive(Debug, Clone)]
pub struct PhysioRecording {
    /// Respiration belt samples, spaced `resp_dt`.
    pub resp_wave: Vec<f64>,
    /// Respiration sample times (s), scan start at 0.
    pub resp_time: Vec<f64>,
    /// Respiration trigger indices, as recorded.
    pub resp_trig: Vec<f64>,
    /// PPG samples, spaced `card_dt`.
    pub card_wave: Vec<f64>,
    /// PPG sample times (s), scan start at 0.
    pub card_time: Vec<f64>,
    /// Heartbeat (R-wave) times (s), scan start at 0.
    pub card_trig: Vec<f64>,
    /// `60 / diff(card_trig)` in bpm.
    pub hr_instant: Vec<f64>,
    pub resp_dt: f64,
    pub card_dt: f64,
    pub tr: f64,
    pub nframes: usize,
    pub metadata: Option<AcquisitionMetadata>,
}

impl PhysioRecording {
    /// Align raw source fields to a scan of `nframes` volumes every `tr` s.
    pub fn align(raw: RawPhysio, tr: f64, nframes: usize, cfg: &PhysioConfig) -> PhysioResult<Self> {
        check_tr(tr)?;
        let scan_duration = scan_duration(tr, nframes);

        let resp_wave = raw.resp_wave.unwrap_or_default();
        let resp_time = aligned_times(resp_wave.len(), cfg.resp_dt, scan_duration);

        let card_wave = raw.card_wave.unwrap_or_default();
        let card_time = aligned_times(card_wave.len(), cfg.card_dt, scan_duration);

        let raw_trig = raw.card_trig.unwrap_or_default();
        let card_offset = if card_wave.is_empty() {
            if !raw_trig.is_empty() {
                warn!("cardiac triggers without a PPG waveform; trigger times are not aligned to the scan");
            }
            0.0
        } else {
            cfg.card_dt * card_wave.len() as f64 - scan_duration
        };
        let card_trig: Vec<f64> = raw_trig.iter().map(|&t| t * cfg.card_dt - card_offset).collect();

        Ok(Self::assemble(
            resp_wave,
            resp_time,
            raw.resp_trig.unwrap_or_default(),
            card_wave,
            card_time,
            card_trig,
            tr,
            nframes,
            cfg,
            raw.metadata,
        ))
    }

    /// Build a recording from a respiration waveform and heartbeat times that
    /// are already expressed in seconds from the start of the scan.
    ///
    /// The respiration waveform is tail-aligned as in [`PhysioRecording::align`].
    pub fn from_aligned_triggers(
        resp_wave: Vec<f64>,
        card_trig: Vec<f64>,
        tr: f64,
        nframes: usize,
        cfg: &PhysioConfig,
    ) -> PhysioResult<Self> {
        check_tr(tr)?;
        let resp_time = aligned_times(resp_wave.len(), cfg.resp_dt, scan_duration(tr, nframes));
        Ok(Self::assemble(
            resp_wave,
            resp_time,
            vec![],
            vec![],
            vec![],
            card_trig,
            tr,
            nframes,
            cfg,
            None,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        resp_wave: Vec<f64>,
        resp_time: Vec<f64>,
        resp_trig: Vec<f64>,
        card_wave: Vec<f64>,
        card_time: Vec<f64>,
        card_trig: Vec<f64>,
        tr: f64,
        nframes: usize,
        cfg: &PhysioConfig,
        metadata: Option<AcquisitionMetadata>,
    ) -> Self {
        let hr_instant = card_trig.windows(2).map(|w| 60.0 / (w[1] - w[0])).collect();
        Self {
            resp_wave,
            resp_time,
            resp_trig,
            card_wave,
            card_time,
            card_trig,
            hr_instant,
            resp_dt: cfg.resp_dt,
            card_dt: cfg.card_dt,
            tr,
            nframes,
            metadata,
        }
    }

    /// Total scan time in seconds (one TR when `nframes == 0`).
    pub fn scan_duration(&self) -> f64 {
        scan_duration(self.tr, self.nframes)
    }

    pub fn has_respiration(&self) -> bool {
        !self.resp_wave.is_empty()
    }

    pub fn has_cardiac_triggers(&self) -> bool {
        !self.card_trig.is_empty()
    }

    /// Respiration from the first sample acquired after the scan started.
    pub fn resp_wave_chopped(&self) -> &[f64] {
        let start = self.resp_time.iter().position(|&t| t > 0.0).unwrap_or(0);
        &self.resp_wave[start.min(self.resp_wave.len())..]
    }

    /// Heartbeat times from the first beat after the scan started.
    ///
    /// With no beat after scan start every trigger is kept.
    pub fn card_trig_chopped(&self) -> &[f64] {
        let start = self.card_trig.iter().position(|&t| t > 0.0).unwrap_or(0);
        &self.card_trig[start..]
    }
}

/// When each axial slice is read out within a TR.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceTiming {
    /// Per-slice onset within the TR (s).
    pub slice_onsets: Vec<f64>,
    /// Readout duration of one slice (s).
    pub slice_window: f64,
}

impl SliceTiming {
    /// Build slice timing, deriving the readout window from the onsets when
    /// `slice_window` is `None`.
    ///
    /// The derived window is the gap between consecutive distinct sorted
    /// onsets; all gaps must agree.  A single distinct onset (slice-timing
    /// corrected data) gives a zero window.
    pub fn new(slice_onsets: Vec<f64>, slice_window: Option<f64>) -> PhysioResult<Self> {
        if slice_onsets.is_empty() {
            return Err(PhysioError::Configuration("at least one slice onset is required".into()));
        }
        if slice_onsets.iter().any(|v| !(v.is_finite() && *v >= 0.0)) {
            return Err(PhysioError::Configuration(
                "slice onsets must be finite and non-negative".into(),
            ));
        }
        let slice_window = match slice_window {
            Some(w) if w.is_finite() && w >= 0.0 => w,
            Some(w) => {
                return Err(PhysioError::Configuration(format!(
                    "slice window must be finite and non-negative, got {w}"
                )))
            }
            None => derive_window(&slice_onsets)?,
        };
        Ok(Self { slice_onsets, slice_window })
    }

    /// One slice at onset 0 with no readout window.
    pub fn single_slice() -> Self {
        Self { slice_onsets: vec![0.0], slice_window: 0.0 }
    }

    pub fn nslices(&self) -> usize {
        self.slice_onsets.len()
    }
}

fn derive_window(onsets: &[f64]) -> PhysioResult<f64> {
    let mut sorted = onsets.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted.dedup();
    let gaps: Vec<f64> = sorted.windows(2).map(|w| w[1] - w[0]).collect();
    let Some(&first) = gaps.first() else {
        return Ok(0.0);
    };
    // np.allclose defaults
    let uniform = gaps.iter().all(|&g| (g - first).abs() <= 1e-8 + 1e-5 * first.abs());
    if !uniform {
        return Err(PhysioError::Configuration(
            "gap between slice onsets varies; provide an explicit slice window".into(),
        ));
    }
    Ok(first)
}

/// An aligned recording paired with the slice geometry it will be applied to.
#[derive(Debug, Clone)]
pub struct PhysioSession {
    pub recording: PhysioRecording,
    pub slices: SliceTiming,
}

impl PhysioSession {
    pub fn new(recording: PhysioRecording, slices: SliceTiming) -> Self {
        Self { recording, slices }
    }

    pub fn tr(&self) -> f64 {
        self.recording.tr
    }

    pub fn nframes(&self) -> usize {
        self.recording.nframes
    }

    pub fn nslices(&self) -> usize {
        self.slices.nslices()
    }

    /// Every slice must be read out within the first TR of its frame.
    pub fn check_geometry(&self) -> PhysioResult<()> {
        let last_onset = self.slices.slice_onsets.iter().copied().fold(0.0_f64, f64::max);
        let mid = last_onset + self.slices.slice_window / 2.0;
        if mid >= self.tr() {
            return Err(PhysioError::Configuration(format!(
                "slice readout at {mid} s (last onset {last_onset} s, window {} s) does not fit in tr {} s",
                self.slices.slice_window,
                self.tr()
            )));
        }
        Ok(())
    }

    /// Mid-readout acquisition time of slice `sl` in every frame.
    pub fn slice_times(&self, sl: usize) -> Vec<f64> {
        let start = self.slices.slice_onsets[sl] + self.slices.slice_window / 2.0;
        (0..self.nframes()).map(|fr| start + fr as f64 * self.tr()).collect()
    }
}

fn check_tr(tr: f64) -> PhysioResult<()> {
    if tr > 0.0 && tr.is_finite() {
        Ok(())
    } else {
        Err(PhysioError::Configuration(format!("tr must be positive, got {tr}")))
    }
}

fn scan_duration(tr: f64, nframes: usize) -> f64 {
    nframes.max(1) as f64 * tr
}

fn aligned_times(n: usize, dt: f64, scan_duration: f64) -> Vec<f64> {
    let offset = dt * n as f64 - scan_duration;
    (0..n).map(|i| dt * i as f64 - offset).collect()
}
