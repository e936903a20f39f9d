use flate2::write::GzEncoder;
use flate2::Compression;
use physio_regress::source::open_archive;
use physio_regress::{load_raw_physio, PhysioError, PhysioSource};
use std::io::Write;
use std::path::Path;

const METADATA: &str = r#"{"group":"cni","experiment":"rest","session":"s01","epoch":"e1",
  "timestamp":"2013-04-02T10:11:12","series_no":4,"acq_no":1}"#;

fn members() -> Vec<(&'static str, String)> {
    vec![
        ("4_1_physio/RESPData_epiRT_0402201310_11_12_123", "# belt\n2000\n2010\n2020\n".into()),
        ("4_1_physio/RESPTrig_epiRT_0402201310_11_12_123", "5\n".into()),
        ("4_1_physio/PPGData_epiRT_0402201310_11_12_123", "100 120\n140\n".into()),
        ("4_1_physio/PPGTrig_epiRT_0402201310_11_12_123", "12\n112\n".into()),
        ("4_1_physio/4_1_physio.json", METADATA.into()),
        ("4_1_physio/empty_physio.json", "{}".into()),
    ]
}

fn write_zip(path: &Path, entries: &[(&str, String)]) {
    let mut zw = zip::ZipWriter::new(std::fs::File::create(path).unwrap());
    for (name, body) in entries {
        zw.start_file(*name, zip::write::FileOptions::default()).unwrap();
        zw.write_all(body.as_bytes()).unwrap();
    }
    zw.finish().unwrap();
}

fn write_tgz(path: &Path, entries: &[(&str, String)]) {
    let enc = GzEncoder::new(std::fs::File::create(path).unwrap(), Compression::default());
    let mut tb = tar::Builder::new(enc);
    for (name, body) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o644);
        tb.append_data(&mut header, name, body.as_bytes()).unwrap();
    }
    tb.into_inner().unwrap().finish().unwrap();
}

fn check_fields(source: &PhysioSource) {
    let raw = load_raw_physio(source).unwrap();
    assert_eq!(raw.resp_wave, Some(vec![2000.0, 2010.0, 2020.0]));
    assert_eq!(raw.resp_trig, Some(vec![5.0]));
    assert_eq!(raw.card_wave, Some(vec![100.0, 120.0, 140.0]));
    assert_eq!(raw.card_trig, Some(vec![12.0, 112.0]));
    let md = raw.metadata.expect("metadata");
    assert_eq!(md.session, "s01");
    assert_eq!(md.acquisition_label(), "4.1");
}

fn entries_without_empty_metadata() -> Vec<(&'static str, String)> {
    members().into_iter().filter(|(n, _)| !n.ends_with("empty_physio.json")).collect()
}

#[test]
fn zip_archive_detected_and_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("physio.zip");
    write_zip(&path, &entries_without_empty_metadata());
    check_fields(&PhysioSource::Archive(path));
}

#[test]
fn tgz_archive_detected_and_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("physio.tgz");
    write_tgz(&path, &entries_without_empty_metadata());
    check_fields(&PhysioSource::Archive(path));
}

#[test]
fn loose_files_read() {
    let dir = tempfile::tempdir().unwrap();
    let paths = entries_without_empty_metadata()
        .into_iter()
        .map(|(name, body)| {
            let file = dir.path().join(name.rsplit('/').next().unwrap());
            std::fs::write(&file, body).unwrap();
            file
        })
        .collect();
    check_fields(&PhysioSource::Files(paths));
}

#[test]
fn single_channel_file_read_as_loose_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("RESPData_epiRT_0402201310_11_12_123");
    std::fs::write(&path, "2000\n2010\n").unwrap();

    let source = PhysioSource::from_paths(vec![path]).unwrap();
    assert!(matches!(source, PhysioSource::Files(_)));
    let raw = load_raw_physio(&source).unwrap();
    assert_eq!(raw.resp_wave, Some(vec![2000.0, 2010.0]));
    assert!(raw.card_trig.is_none());
}

#[test]
fn single_archive_path_detected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("physio.bin");
    write_tgz(&path, &entries_without_empty_metadata());
    let source = PhysioSource::from_paths(vec![path]).unwrap();
    assert!(matches!(source, PhysioSource::Archive(_)));
    check_fields(&source);
}

#[test]
fn unknown_format_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("physio.rar");
    std::fs::write(&path, b"Rar!\x1a\x07\x00").unwrap();
    let err = open_archive(&path).unwrap_err();
    assert!(matches!(err, PhysioError::InputFormat(_)));
}

#[test]
fn incomplete_metadata_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("physio.zip");
    // Includes the `{}` metadata document.
    write_zip(&path, &members());
    let err = load_raw_physio(&PhysioSource::Archive(path)).unwrap_err();
    assert!(matches!(err, PhysioError::InputFormat(ref m) if m.contains("missing")));
}
