//! Text and JSON export of regressors and raw physio data.
//!
//! Regressor file layout (comma-delimited, one row per frame):
//!
//! ```text
//! #slice_onsets = [ 0.0,0.5,1.0 ]
//! #<optional notes>
//! #slice0c1_c,slice0s1_c,…,slice0hr,slice1c1_c,…
//! 0.12345,-0.54321,…
//! ```
//!
//! Column `k + 13·s` holds regressor `k` of slice `s`.  Any path ending in
//! `.gz` is gzip-compressed on write and decompressed on read.
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use ndarray::Array3;
use serde::Serialize;

use crate::error::{PhysioError, PhysioResult};
use crate::recording::PhysioRecording;
use crate::regressors::{RegressorSet, N_REGRESSORS, REGRESSOR_NAMES};

const ONSETS_PREFIX: &str = "#slice_onsets = [";

// ── Compression by suffix ─────────────────────────────────────────────────────

fn is_gz(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "gz")
}

/// Buffered writer, gzip-wrapped for `.gz` paths.
pub fn create_writer(path: &Path) -> PhysioResult<Box<dyn Write>> {
    let file = BufWriter::new(File::create(path)?);
    Ok(if is_gz(path) {
        Box::new(GzEncoder::new(file, Compression::default()))
    } else {
        Box::new(file)
    })
}

/// Buffered reader, gunzipping `.gz` paths.
pub fn open_reader(path: &Path) -> PhysioResult<Box<dyn BufRead>> {
    let file = File::open(path)?;
    Ok(if is_gz(path) {
        Box::new(BufReader::new(GzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    })
}

// ── Regressors ────────────────────────────────────────────────────────────────

/// Write `regs` in the comma-delimited text layout above.
pub fn write_regressors(path: &Path, regs: &RegressorSet, notes: Option<&str>) -> PhysioResult<()> {
    let mut w = create_writer(path)?;
    write_regressors_to(&mut w, regs, notes)?;
    w.flush()?;
    Ok(())
}

/// Same as [`write_regressors`] into any writer.
pub fn write_regressors_to<W: Write + ?Sized>(w: &mut W, regs: &RegressorSet, notes: Option<&str>) -> PhysioResult<()> {
    let onsets: Vec<String> = regs.slice_onsets.iter().map(|v| format!("{v:?}")).collect();
    writeln!(w, "{ONSETS_PREFIX} {} ]", onsets.join(","))?;
    if let Some(notes) = notes.filter(|n| !n.is_empty()) {
        writeln!(w, "#{notes}")?;
    }
    let heading: Vec<String> = (0..regs.nslices())
        .flat_map(|s| REGRESSOR_NAMES.iter().map(move |name| format!("slice{s}{name}")))
        .collect();
    writeln!(w, "#{}", heading.join(","))?;

    for fr in 0..regs.nframes() {
        let row: Vec<String> = (0..regs.nslices())
            .flat_map(|s| (0..N_REGRESSORS).map(move |k| (k, s)))
            .map(|(k, s)| format!("{:.5}", regs.data[[fr, k, s]]))
            .collect();
        writeln!(w, "{}", row.join(","))?;
    }
    Ok(())
}

/// Read a file written by [`write_regressors`].
///
/// The slice count comes from the `#slice_onsets` header; other comment
/// lines are skipped.
pub fn read_regressors(path: &Path) -> PhysioResult<RegressorSet> {
    parse_regressors(open_reader(path)?)
}

fn parse_regressors(reader: impl BufRead) -> PhysioResult<RegressorSet> {
    let mut slice_onsets: Option<Vec<f64>> = None;
    let mut rows: Vec<Vec<f64>> = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let bad = |what: &str| PhysioError::InputFormat(format!("regressor file line {}: {what}", lineno + 1));
        if let Some(rest) = line.strip_prefix(ONSETS_PREFIX) {
            let body = rest.trim().trim_end_matches(']').trim();
            let onsets = body
                .split(',')
                .filter(|t| !t.trim().is_empty())
                .map(|t| t.trim().parse::<f64>().map_err(|_| bad("bad slice onset")))
                .collect::<PhysioResult<Vec<f64>>>()?;
            slice_onsets = Some(onsets);
            continue;
        }
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        let row = line
            .split(',')
            .map(|t| t.trim().parse::<f64>().map_err(|_| bad("bad value")))
            .collect::<PhysioResult<Vec<f64>>>()?;
        rows.push(row);
    }

    let slice_onsets =
        slice_onsets.ok_or_else(|| PhysioError::InputFormat("regressor file has no slice_onsets header".into()))?;
    let nslices = slice_onsets.len();
    let ncols = N_REGRESSORS * nslices;
    if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != ncols) {
        return Err(PhysioError::InputFormat(format!(
            "regressor row {i} has {} columns, expected {ncols}",
            row.len()
        )));
    }
    let data = Array3::from_shape_fn((rows.len(), N_REGRESSORS, nslices), |(fr, k, s)| {
        rows[fr][k + N_REGRESSORS * s]
    });
    Ok(RegressorSet { data, slice_onsets })
}

// ── Raw data ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct RawDataExport {
    resp_time: Vec<f64>,
    resp_wave: Vec<i64>,
    resp_trig: Vec<f64>,
    card_time: Vec<f64>,
    card_wave: Vec<i64>,
    card_trig: Vec<f64>,
}

/// Dump the aligned recording as JSON: times rounded to milliseconds,
/// waveforms truncated to integers.
pub fn write_raw_data(path: &Path, rec: &PhysioRecording) -> PhysioResult<()> {
    let round3 = |v: &[f64]| v.iter().map(|x| (x * 1000.0).round() / 1000.0).collect::<Vec<_>>();
    let trunc = |v: &[f64]| v.iter().map(|&x| x as i64).collect::<Vec<_>>();
    let export = RawDataExport {
        resp_time: round3(&rec.resp_time),
        resp_wave: trunc(&rec.resp_wave),
        resp_trig: round3(&rec.resp_trig),
        card_time: round3(&rec.card_time),
        card_wave: trunc(&rec.card_wave),
        card_trig: round3(&rec.card_trig),
    };
    let mut w = create_writer(path)?;
    serde_json::to_writer(&mut w, &export)?;
    w.flush()?;
    Ok(())
}

/// One value per line.
pub fn write_column(path: &Path, values: &[f64]) -> PhysioResult<()> {
    let mut w = create_writer(path)?;
    for v in values {
        writeln!(w, "{v}")?;
    }
    w.flush()?;
    Ok(())
}

/// Read a whole (possibly gzipped) file to a string.
pub fn read_to_string(path: &Path) -> PhysioResult<String> {
    let mut s = String::new();
    open_reader(path)?.read_to_string(&mut s)?;
    Ok(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_set() -> RegressorSet {
        let data = Array3::from_shape_fn((4, N_REGRESSORS, 2), |(fr, k, s)| {
            fr as f64 * 0.1 + k as f64 * 0.01 + s as f64 * 10.0 + 0.123456789
        });
        RegressorSet { data, slice_onsets: vec![0.0, 1.0] }
    }

    #[test]
    fn header_and_column_order() {
        let mut buf = Vec::new();
        write_regressors_to(&mut buf, &sample_set(), Some("tr = 2")).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "#slice_onsets = [ 0.0,1.0 ]");
        assert_eq!(lines[1], "#tr = 2");
        assert!(lines[2].starts_with("#slice0c1_c,slice0s1_c,"));
        assert!(lines[2].ends_with(",slice1hr_crf_d,slice1hr"));
        assert_eq!(lines.len(), 3 + 4);
        let row0: Vec<&str> = lines[3].split(',').collect();
        assert_eq!(row0.len(), 26);
        assert_eq!(row0[0], "0.12346");
        assert_eq!(row0[13], "10.12346");
    }

    #[test]
    fn reimport_matches_to_five_decimals() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["reg.txt", "reg.txt.gz"] {
            let path = dir.path().join(name);
            let regs = sample_set();
            write_regressors(&path, &regs, None).unwrap();
            let back = read_regressors(&path).unwrap();
            assert_eq!(back.slice_onsets, regs.slice_onsets);
            assert_eq!(back.data.dim(), regs.data.dim());
            for (a, b) in back.data.iter().zip(regs.data.iter()) {
                approx::assert_abs_diff_eq!(a, b, epsilon = 5e-6);
            }
        }
    }

    #[test]
    fn ragged_rows_rejected() {
        let text = "#slice_onsets = [ 0.0 ]\n1,2,3\n";
        let err = parse_regressors(text.as_bytes()).unwrap_err();
        assert!(matches!(err, PhysioError::InputFormat(_)));
    }

    #[test]
    fn raw_data_json_rounds_and_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.json.gz");
        let cfg = crate::config::PhysioConfig::default();
        let rec = PhysioRecording::from_aligned_triggers(vec![1.9, -2.7], vec![0.12345], 1.0, 1, &cfg).unwrap();
        write_raw_data(&path, &rec).unwrap();
        let v: serde_json::Value = serde_json::from_str(&read_to_string(&path).unwrap()).unwrap();
        assert_eq!(v["resp_wave"], serde_json::json!([1, -2]));
        assert_eq!(v["card_trig"], serde_json::json!([0.123]));
        assert_eq!(v["resp_time"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn column_dump() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x_resp.txt");
        write_column(&path, &[1.5, -2.0]).unwrap();
        assert_eq!(read_to_string(&path).unwrap(), "1.5\n-2\n");
    }
}
