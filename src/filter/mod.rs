//! FIR filter design and application.
//!
//! - [`design`]: Hamming-windowed sinc FIR design, matching
//!   `scipy.signal.firwin`.
//! - [`apply`]: Forward–backward zero-phase filtering, matching
//!   `scipy.signal.filtfilt` for FIR coefficients.

pub mod apply;
pub mod design;

pub use design::{design_lowpass, hamming};
pub use apply::{filtfilt, lfilter, lfilter_zi};
