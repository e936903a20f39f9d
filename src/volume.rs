//! Reference BOLD volume (NIfTI-1): acquisition timing, load and save.
//!
//! Slice timing follows the header fields:
//!
//! ```text
//! slice_dim      = (dim_info >> 4) & 3          1-based axis, 0 = unknown
//! n_timed        = slice_end − slice_start + 1
//! onset[slice_start + order[i]] = i · slice_duration
//! ```
//!
//! where `order` is the acquisition order named by `slice_code` (sequential
//! or alternating, increasing or decreasing).  Slices outside
//! `[slice_start, slice_end]` get onset 0.
use std::path::Path;

use ndarray::{Array3, Array4, Ix4};
use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};
use tracing::{debug, warn};

use crate::error::{PhysioError, PhysioResult};

/// Scan geometry derived from a reference header.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeTiming {
    /// Repetition time (s).
    pub tr: f64,
    pub nframes: usize,
    /// Per-slice onset within the TR (s).  All zero when the header has no
    /// slice timing.
    pub slice_onsets: Vec<f64>,
}

/// Read only the header of a `.nii` / `.nii.gz` file.
pub fn read_header(path: &Path) -> PhysioResult<NiftiHeader> {
    NiftiHeader::from_file(path).map_err(|e| volume_err(path, e))
}

/// Repetition time, frame count and slice onsets of `header`.
pub fn timing_from_header(header: &NiftiHeader) -> PhysioResult<VolumeTiming> {
    let ndim = header.dim[0] as usize;
    if ndim < 3 {
        return Err(PhysioError::Volume(format!("expected a 3-D or 4-D image, header has {ndim} dimensions")));
    }
    let nframes = if ndim >= 4 { header.dim[4] as usize } else { 1 };
    let tr = header.pixdim[4] as f64 * time_scale(header.xyzt_units);

    let slice_onsets = match slice_times(header) {
        Some(onsets) => onsets,
        None => {
            warn!("no slice timing in header; assuming slice-timing corrected data");
            vec![0.0; header.dim[3] as usize]
        }
    };
    debug!(tr, nframes, nslices = slice_onsets.len(), "reference timing");
    Ok(VolumeTiming { tr, nframes, slice_onsets })
}

/// Slice onsets along the header's slice dimension, or `None` if the
/// header does not describe slice timing.
pub fn slice_times(header: &NiftiHeader) -> Option<Vec<f64>> {
    let slice_dim = ((header.dim_info >> 4) & 0x03) as usize;
    if slice_dim == 0 || header.slice_code == 0 || header.slice_duration <= 0.0 {
        return None;
    }
    let slice_len = header.dim[slice_dim] as usize;
    let start = header.slice_start as usize;
    let end = match header.slice_end as usize {
        0 => slice_len.checked_sub(1)?,
        e => e,
    };
    if end < start || end >= slice_len {
        return None;
    }
    let n_timed = end - start + 1;
    let order = acquisition_order(header.slice_code, n_timed)?;
    let duration = header.slice_duration as f64 * time_scale(header.xyzt_units);

    let mut onsets = vec![0.0; slice_len];
    for (i, &pos) in order.iter().enumerate() {
        onsets[start + pos] = i as f64 * duration;
    }
    Some(onsets)
}

/// Spatial positions in the order they were acquired.
fn acquisition_order(slice_code: u8, n: usize) -> Option<Vec<usize>> {
    let up = |from: usize| (from..n).step_by(2);
    let down = |from: usize| (0..n).rev().skip(from).step_by(2);
    let order: Vec<usize> = match slice_code {
        1 => (0..n).collect(),
        2 => (0..n).rev().collect(),
        3 => up(0).chain(up(1)).collect(),
        4 => down(0).chain(down(1)).collect(),
        5 => up(1).chain(up(0)).collect(),
        6 => down(1).chain(down(0)).collect(),
        _ => return None,
    };
    Some(order)
}

/// Seconds per header time unit.
fn time_scale(xyzt_units: u8) -> f64 {
    match xyzt_units & 0x38 {
        16 => 1e-3,
        24 => 1e-6,
        _ => 1.0,
    }
}

/// Load a 4-D volume `[x, y, slice, time]` as `f64`, scaling applied.
pub fn load_volume(path: &Path) -> PhysioResult<(NiftiHeader, Array4<f64>)> {
    let obj = ReaderOptions::new().read_file(path).map_err(|e| volume_err(path, e))?;
    let header = obj.header().clone();
    let data = obj
        .into_volume()
        .into_ndarray::<f64>()
        .map_err(|e| volume_err(path, e))?
        .into_dimensionality::<Ix4>()
        .map_err(|e| PhysioError::Volume(format!("{}: expected a 4-D image: {e}", path.display())))?;
    debug!(shape = ?data.dim(), path = %path.display(), "volume loaded");
    Ok((header, data))
}

/// Write `data` with `reference`'s geometry.  Values are stored unscaled.
pub fn save_volume(path: &Path, reference: &NiftiHeader, data: &Array4<f64>) -> PhysioResult<()> {
    WriterOptions::new(path)
        .reference_header(&unscaled(reference))
        .write_nifti(data)
        .map_err(|e| volume_err(path, e))
}

/// Write a 3-D map (e.g. variance reduction) with `reference`'s geometry.
pub fn save_map(path: &Path, reference: &NiftiHeader, data: &Array3<f64>) -> PhysioResult<()> {
    WriterOptions::new(path)
        .reference_header(&unscaled(reference))
        .write_nifti(data)
        .map_err(|e| volume_err(path, e))
}

fn unscaled(reference: &NiftiHeader) -> NiftiHeader {
    let mut h = reference.clone();
    h.scl_slope = 1.0;
    h.scl_inter = 0.0;
    h
}

fn volume_err(path: &Path, e: nifti::NiftiError) -> PhysioError {
    PhysioError::Volume(format!("{}: {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(slice_code: u8) -> NiftiHeader {
        let mut h = NiftiHeader::default();
        h.dim = [4, 4, 4, 6, 10, 1, 1, 1];
        h.pixdim = [1.0, 3.0, 3.0, 3.0, 2.0, 1.0, 1.0, 1.0];
        h.xyzt_units = 2 | 8;
        h.dim_info = 3 << 4;
        h.slice_code = slice_code;
        h.slice_duration = 0.25;
        h
    }

    #[test]
    fn sequential_increasing() {
        let t = slice_times(&header(1)).unwrap();
        assert_eq!(t, vec![0.0, 0.25, 0.5, 0.75, 1.0, 1.25]);
    }

    #[test]
    fn alternating_orders() {
        // positions 0,2,4 then 1,3,5
        assert_eq!(slice_times(&header(3)).unwrap(), vec![0.0, 0.75, 0.25, 1.0, 0.5, 1.25]);
        // positions 5,3,1 then 4,2,0
        assert_eq!(slice_times(&header(4)).unwrap(), vec![1.25, 0.5, 1.0, 0.25, 0.75, 0.0]);
        // positions 1,3,5 then 0,2,4
        assert_eq!(slice_times(&header(5)).unwrap(), vec![0.75, 0.0, 1.0, 0.25, 1.25, 0.5]);
    }

    #[test]
    fn milliseconds_converted() {
        let mut h = header(2);
        h.xyzt_units = 2 | 16;
        h.pixdim[4] = 2000.0;
        h.slice_duration = 250.0;
        let timing = timing_from_header(&h).unwrap();
        approx::assert_abs_diff_eq!(timing.tr, 2.0, epsilon = 1e-9);
        assert_eq!(timing.nframes, 10);
        approx::assert_abs_diff_eq!(timing.slice_onsets[0], 1.25, epsilon = 1e-9);
        approx::assert_abs_diff_eq!(timing.slice_onsets[5], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn missing_timing_gives_zero_onsets() {
        let mut h = header(0);
        h.dim_info = 0;
        assert!(slice_times(&h).is_none());
        let timing = timing_from_header(&h).unwrap();
        assert_eq!(timing.slice_onsets, vec![0.0; 6]);
    }

    #[test]
    fn partial_timed_range() {
        let mut h = header(1);
        h.slice_start = 1;
        h.slice_end = 3;
        assert_eq!(slice_times(&h).unwrap(), vec![0.0, 0.0, 0.25, 0.5, 0.0, 0.0]);
    }
}
