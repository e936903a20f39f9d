//! # physio-regress: physiological noise regressors for fMRI
//!
//! `physio-regress` turns the cardiac (PPG) and respiration-belt recordings
//! logged during an fMRI scan into per-slice nuisance regressors
//! (RETROICOR + RVHRcor) and optionally removes the physiological variance
//! they explain from the BOLD volume.
//!
//! ## Pipeline overview
//!
//! ```text
//! GE physio archive (.zip / .tgz) or channel files
//!   │
//!   ├─ source::load_raw_physio()     archive detection, member → field routing
//!   ├─ PhysioRecording::align()      tail-align waveforms to the scan
//!   ├─ phase::estimate_phases()      cardiac phase [0, 2π), respiratory [−π, π]
//!   ├─ regressors::compute_regressors()
//!   │     ├─ RETROICOR               cos/sin of φ and 2φ, cardiac + respiratory
//!   │     ├─ RV ∗ RRF, HR ∗ CRF      plus first differences
//!   │     └─ quadratic detrend       every column except raw HR
//!   │        │
//!   │        └─→ RegressorSet [nframes, 13, nslices]
//!   └─ denoise::denoise_image()      per-slice GLM, physio columns subtracted
//!        │
//!        └─→ DenoisedVolume { data, pct_var_reduced, failed_slices }
//! ```
//!
//! [`validity::is_valid`] screens a recording for usable physiology and can be
//! called at any point after ingestion.
//!
//! ## Quick start
//!
//! ```no_run
//! use physio_regress::{
//!     compute_regressors, load_raw_physio, PhysioConfig, PhysioRecording,
//!     PhysioSession, PhysioSource, SliceTiming,
//! };
//!
//! let cfg = PhysioConfig::default();
//! let raw = load_raw_physio(&PhysioSource::Archive("physio.zip".into())).unwrap();
//! let rec = PhysioRecording::align(raw, 2.0, 240, &cfg).unwrap();
//! let slices = SliceTiming::new(vec![0.0, 0.5, 1.0, 1.5], None).unwrap();
//! let session = PhysioSession::new(rec, slices);
//!
//! if let Some((regs, _phases)) = compute_regressors(&session, &cfg).unwrap() {
//!     println!("regressors: {:?}", regs.data.dim());
//! }
//! ```

pub mod config;
pub mod denoise;
pub mod error;
pub mod filter;
pub mod io;
pub mod normalize;
pub mod phase;
pub mod recording;
pub mod regressors;
pub mod source;
pub mod validity;
pub mod volume;

use ndarray::Array4;

// ── Crate-root re-exports ─────────────────────────────────────────────────

// config
pub use config::{HeartRateEstimator, PhysioConfig, ValidityConfig};

// error
pub use error::{PhysioError, PhysioResult};

// recording / source
pub use recording::{AcquisitionMetadata, PhysioRecording, PhysioSession, RawPhysio, SliceTiming};
pub use source::{load_raw_physio, ArchiveFormat, PhysioSource};

// phase + regressors
pub use phase::{estimate_phases, PhaseTable};
pub use regressors::{compute_regressors, RegressorSet, N_REGRESSORS, REGRESSOR_NAMES};

// denoise
pub use denoise::{denoise_image, DenoiseOptions, DenoisedVolume};

// validity
pub use validity::is_valid;

// io
pub use io::{read_regressors, write_column, write_raw_data, write_regressors};

/// Everything produced for one scan by [`process`].
#[derive(Debug)]
pub struct PhysioOutputs {
    pub regressors: RegressorSet,
    pub phases: PhaseTable,
    /// Present when a volume was passed in.
    pub denoised: Option<DenoisedVolume>,
}

/// Compute regressors for `session` and, given a `[x, y, slice, time]`
/// volume, denoise it.
///
/// Returns `Ok(None)` when the session cannot yield regressors (too few
/// frames or no respiration); the reason is logged.
///
/// # Errors
///
/// * [`PhysioError::DataLength`] if the respiration recording does not cover
///   the scan.
/// * [`PhysioError::Configuration`] if the volume's frame or slice count
///   disagrees with the session.
///
/// ```
/// use physio_regress::{process, DenoiseOptions, PhysioConfig, PhysioRecording,
///                      PhysioSession, SliceTiming};
///
/// let cfg = PhysioConfig::default();
/// let resp: Vec<f64> = (0..1000).map(|i| (i as f64 * 0.04 * 1.5).sin()).collect();
/// let beats: Vec<f64> = (0..25).map(|k| k as f64).collect();
/// let rec = PhysioRecording::from_aligned_triggers(resp, beats, 2.0, 10, &cfg).unwrap();
/// let session = PhysioSession::new(rec, SliceTiming::single_slice());
///
/// let out = process(&session, None, &cfg, &DenoiseOptions::default()).unwrap().unwrap();
/// assert_eq!(out.regressors.data.dim(), (10, 13, 1));
/// assert!(out.denoised.is_none());
/// ```
pub fn process(
    session: &PhysioSession,
    volume: Option<&Array4<f64>>,
    cfg: &PhysioConfig,
    opts: &DenoiseOptions,
) -> PhysioResult<Option<PhysioOutputs>> {
    let Some((regressors, phases)) = compute_regressors(session, cfg)? else {
        return Ok(None);
    };
    let denoised = volume
        .map(|v| denoise_image(v, &regressors, opts))
        .transpose()?;
    Ok(Some(PhysioOutputs { regressors, phases, denoised }))
}
