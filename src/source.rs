//! GE physio source reading.
//!
//! The scanner's physio logger writes one text file per channel, usually
//! bundled into a zip or gzipped tar together with a `_physio.json`
//! metadata document:
//!
//! | member name contains | field        |
//! |----------------------|--------------|
//! | `RESPData`           | `resp_wave`  |
//! | `RESPTrig`           | `resp_trig`  |
//! | `PPGData`            | `card_wave`  |
//! | `PPGTrig`            | `card_trig`  |
//!
//! Archives are recognised by their leading magic bytes.  The first
//! [`ArchiveFormat`] in [`ARCHIVE_FORMATS`] that accepts the file wins.
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tracing::debug;

use crate::error::{PhysioError, PhysioResult};
use crate::recording::{AcquisitionMetadata, RawPhysio};

/// Fields every `_physio.json` document must carry.
pub const REQUIRED_METADATA_FIELDS: [&str; 5] = ["group", "experiment", "session", "epoch", "timestamp"];

const METADATA_SUFFIX: &str = "_physio.json";

/// Where physio data comes from.
#[derive(Debug, Clone)]
pub enum PhysioSource {
    /// Individual channel files; each path is matched like an archive member.
    Files(Vec<PathBuf>),
    /// A zip or gzipped tar holding the channel files.
    Archive(PathBuf),
}

impl PhysioSource {
    /// Several paths are loose files.  A single path is an archive when its
    /// leading bytes match a known container, otherwise a lone channel file.
    pub fn from_paths(mut paths: Vec<PathBuf>) -> PhysioResult<Self> {
        if paths.len() == 1 && detect_format(&paths[0])?.is_some() {
            Ok(Self::Archive(paths.remove(0)))
        } else {
            Ok(Self::Files(paths))
        }
    }
}

/// One named blob read from a source.
#[derive(Debug, Clone)]
pub struct Member {
    pub name: String,
    pub contents: Vec<u8>,
}

/// Supported archive containers, tried in [`ARCHIVE_FORMATS`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    GzipTar,
}

/// Detection order.
pub const ARCHIVE_FORMATS: [ArchiveFormat; 2] = [ArchiveFormat::Zip, ArchiveFormat::GzipTar];

impl ArchiveFormat {
    /// Whether `magic` (the first bytes of the file) belongs to this format.
    pub fn matches(self, magic: &[u8]) -> bool {
        match self {
            Self::Zip => magic.starts_with(b"PK\x03\x04"),
            Self::GzipTar => magic.starts_with(&[0x1f, 0x8b]),
        }
    }

    /// Read every regular member, or `Ok(None)` if `magic` is not this format.
    pub fn read_members(self, path: &Path, magic: &[u8]) -> PhysioResult<Option<Vec<Member>>> {
        if !self.matches(magic) {
            return Ok(None);
        }
        let members = match self {
            Self::Zip => read_zip(path)?,
            Self::GzipTar => read_tgz(path)?,
        };
        debug!(format = ?self, members = members.len(), path = %path.display(), "archive opened");
        Ok(Some(members))
    }
}

/// Load the raw physio fields from `source`.
pub fn load_raw_physio(source: &PhysioSource) -> PhysioResult<RawPhysio> {
    let members = match source {
        PhysioSource::Files(paths) => paths
            .iter()
            .map(|p| {
                Ok(Member { name: p.to_string_lossy().into_owned(), contents: std::fs::read(p)? })
            })
            .collect::<PhysioResult<Vec<_>>>()?,
        PhysioSource::Archive(path) => open_archive(path)?,
    };
    assign_members(members)
}

/// The first format in [`ARCHIVE_FORMATS`] whose signature starts `path`.
pub fn detect_format(path: &Path) -> PhysioResult<Option<ArchiveFormat>> {
    let mut magic = [0u8; 4];
    let n = read_up_to(&mut File::open(path)?, &mut magic)?;
    Ok(ARCHIVE_FORMATS.into_iter().find(|f| f.matches(&magic[..n])))
}

/// Detect the archive format of `path` and read its members.
pub fn open_archive(path: &Path) -> PhysioResult<Vec<Member>> {
    let mut magic = [0u8; 4];
    let n = read_up_to(&mut File::open(path)?, &mut magic)?;
    for format in ARCHIVE_FORMATS {
        if let Some(members) = format.read_members(path, &magic[..n])? {
            return Ok(members);
        }
    }
    Err(PhysioError::InputFormat(format!(
        "{}: only tgz and zip archives are supported",
        path.display()
    )))
}

/// Route members to their fields by name.
pub fn assign_members(members: Vec<Member>) -> PhysioResult<RawPhysio> {
    let mut raw = RawPhysio::default();
    for Member { name, contents } in members {
        let slot = if name.contains("RESPData") {
            &mut raw.resp_wave
        } else if name.contains("RESPTrig") {
            &mut raw.resp_trig
        } else if name.contains("PPGData") {
            &mut raw.card_wave
        } else if name.contains("PPGTrig") {
            &mut raw.card_trig
        } else {
            if name.ends_with(METADATA_SUFFIX) {
                raw.metadata = Some(parse_metadata(&name, &contents)?);
            }
            continue;
        };
        *slot = Some(parse_waveform(&name, &contents)?);
    }
    Ok(raw)
}

/// Parse a whitespace-separated numeric text file.  Everything after a `#`
/// on a line is ignored.
pub fn parse_waveform(name: &str, contents: &[u8]) -> PhysioResult<Vec<f64>> {
    let text = String::from_utf8_lossy(contents);
    let mut values = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let data = line.split('#').next().unwrap_or("");
        for tok in data.split_whitespace() {
            let v = tok.parse::<f64>().map_err(|_| {
                PhysioError::InputFormat(format!("{name}:{}: cannot parse {tok:?} as a number", lineno + 1))
            })?;
            values.push(v);
        }
    }
    Ok(values)
}

/// Parse a `_physio.json` document, checking the required fields first.
pub fn parse_metadata(name: &str, contents: &[u8]) -> PhysioResult<AcquisitionMetadata> {
    let doc: serde_json::Value = serde_json::from_slice(contents)?;
    let obj = doc
        .as_object()
        .ok_or_else(|| PhysioError::InputFormat(format!("{name}: metadata is not a JSON object")))?;
    if let Some(missing) = REQUIRED_METADATA_FIELDS.iter().find(|f| !obj.contains_key(**f)) {
        return Err(PhysioError::InputFormat(format!("{name}: incomplete metadata, missing {missing:?}")));
    }
    serde_json::from_value(doc)
        .map_err(|e| PhysioError::InputFormat(format!("{name}: invalid metadata: {e}")))
}

// ── Archive readers ──────────────────────────────────────────────────────────

fn read_zip(path: &Path) -> PhysioResult<Vec<Member>> {
    let bad = |e: zip::result::ZipError| PhysioError::InputFormat(format!("{}: {e}", path.display()));
    let mut archive = zip::ZipArchive::new(File::open(path)?).map_err(bad)?;
    let mut members = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).map_err(bad)?;
        if file.is_dir() {
            continue;
        }
        let mut contents = Vec::new();
        file.read_to_end(&mut contents)?;
        members.push(Member { name: file.name().to_string(), contents });
    }
    Ok(members)
}

fn read_tgz(path: &Path) -> PhysioResult<Vec<Member>> {
    let mut archive = tar::Archive::new(GzDecoder::new(File::open(path)?));
    let mut members = Vec::new();
    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let name = entry.path()?.to_string_lossy().into_owned();
        let mut contents = Vec::new();
        entry.read_to_end(&mut contents)?;
        members.push(Member { name, contents });
    }
    Ok(members)
}

fn read_up_to(r: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}
