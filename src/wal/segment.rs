// Copyright (c) 2025 Sangita Contributors
// Licensed under the Sangita License. See LICENSE file for details.

//! Segment files.
//!
//! A segment is a file named `{id:010}.waldrky` that starts with a 16-byte
//! header and is followed by records. Only the highest-numbered segment is
//! ever appended to.
//!
//! ```text
//! SegmentHeader (16 bytes)
//!   0..7   magic "SANGITA"
//!   7      version
//!   8..16  segment id (u64 LE)
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::reader::{check_segment, SegmentCheck};
use super::record::{has_magic, RecordHeader};
use super::{MAGIC, MIN_RECORD_SIZE, RECORD_HEADER_SIZE, SEGMENT_HEADER_SIZE, WAL_VERSION};
use crate::error::{Result, SangitaError};

/// File extension of segment files.
pub const SEGMENT_EXTENSION: &str = "waldrky";

/// File name for segment `id`, zero-padded to ten digits.
pub fn segment_file_name(id: u64) -> String {
    format!("{id:010}.{SEGMENT_EXTENSION}")
}

/// Parses a segment id out of a file name; `None` for anything else.
pub fn parse_segment_file_name(name: &str) -> Option<u64> {
    let stem = name.strip_suffix(SEGMENT_EXTENSION)?.strip_suffix('.')?;
    if stem.len() < 10 || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}

/// Full path of segment `id` inside `dir`.
pub fn segment_path(dir: &Path, id: u64) -> PathBuf {
    dir.join(segment_file_name(id))
}

/// Ids of every segment file in `dir`, ascending. Other files are ignored.
pub fn list_segment_ids(dir: &Path) -> Result<Vec<u64>> {
    let entries = fs::read_dir(dir).map_err(SangitaError::path_io("read WAL directory", dir))?;
    let mut ids = Vec::new();
    for entry in entries {
        let entry = entry.map_err(SangitaError::path_io("read WAL directory", dir))?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(id) = entry.file_name().to_str().and_then(parse_segment_file_name) {
            ids.push(id);
        }
    }
    ids.sort_unstable();
    Ok(ids)
}

/// Highest segment id in `dir`, if any.
pub fn latest_segment_id(dir: &Path) -> Result<Option<u64>> {
    Ok(list_segment_ids(dir)?.last().copied())
}

/// Fixed-size prefix of every segment file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    /// Format version.
    pub version: u8,
    /// Id encoded in the file name.
    pub segment_id: u64,
}

impl SegmentHeader {
    /// Header for a new segment at the current format version.
    pub fn new(segment_id: u64) -> Self {
        Self {
            version: WAL_VERSION,
            segment_id,
        }
    }

    /// Serializes the header.
    pub fn to_bytes(&self) -> [u8; SEGMENT_HEADER_SIZE] {
        let mut buf = [0u8; SEGMENT_HEADER_SIZE];
        buf[0..7].copy_from_slice(MAGIC);
        buf[7] = self.version;
        buf[8..16].copy_from_slice(&self.segment_id.to_le_bytes());
        buf
    }

    /// Parses a header. Returns `None` if the magic is wrong.
    pub fn from_bytes(buf: &[u8; SEGMENT_HEADER_SIZE]) -> Option<Self> {
        if !has_magic(buf) {
            return None;
        }
        let mut id = [0u8; 8];
        id.copy_from_slice(&buf[8..16]);
        Some(Self {
            version: buf[7],
            segment_id: u64::from_le_bytes(id),
        })
    }
}

/// Reads and validates the header of the segment at `path`.
pub(crate) fn read_segment_header(path: &Path, expected_id: u64) -> Result<SegmentHeader> {
    let mut file = File::open(path).map_err(SangitaError::path_io("open segment", path))?;
    let mut buf = [0u8; SEGMENT_HEADER_SIZE];
    file.read_exact(&mut buf)
        .map_err(SangitaError::path_io("read segment header", path))?;
    let invalid = |reason: String| SangitaError::InvalidSegmentHeader {
        path: path.to_path_buf(),
        reason,
    };
    let header = SegmentHeader::from_bytes(&buf).ok_or_else(|| invalid("bad magic".into()))?;
    if header.version != WAL_VERSION {
        return Err(invalid(format!("unsupported version {}", header.version)));
    }
    if header.segment_id != expected_id {
        return Err(invalid(format!(
            "header id {} does not match file name id {expected_id}",
            header.segment_id
        )));
    }
    Ok(header)
}

/// Result of a header-only scan over a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentScan {
    /// LSN of the last record whose header could be read.
    pub last_lsn: Option<u64>,
    /// Number of record headers seen.
    pub records: usize,
    /// Offset just past the last record that lies entirely inside the file.
    pub valid_len: u64,
    /// File size at scan time.
    pub file_len: u64,
}

/// Walks record headers from offset 16 to find the last LSN.
///
/// Stops at end of file, at a short header read, or at a declared length
/// below the minimum record size. Checksums are not verified here.
pub fn scan_latest_lsn(path: &Path) -> Result<SegmentScan> {
    let mut file = File::open(path).map_err(SangitaError::path_io("open segment", path))?;
    let file_len = file
        .metadata()
        .map_err(SangitaError::path_io("stat segment", path))?
        .len();

    let mut scan = SegmentScan {
        last_lsn: None,
        records: 0,
        valid_len: SEGMENT_HEADER_SIZE as u64,
        file_len,
    };
    if file_len < SEGMENT_HEADER_SIZE as u64 {
        scan.valid_len = file_len;
        return Ok(scan);
    }

    let mut offset = SEGMENT_HEADER_SIZE as u64;
    file.seek(SeekFrom::Start(offset))
        .map_err(SangitaError::path_io("seek segment", path))?;
    let mut buf = [0u8; RECORD_HEADER_SIZE];
    loop {
        match file.read_exact(&mut buf) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(SangitaError::path_io("scan segment", path)(e)),
        }
        let header = RecordHeader::from_bytes(&buf);
        if (header.record_length as usize) < MIN_RECORD_SIZE {
            warn!(
                path = %path.display(),
                offset,
                length = header.record_length,
                "record length below minimum, stopping scan"
            );
            break;
        }
        scan.last_lsn = Some(header.lsn);
        scan.records += 1;

        let end = offset + u64::from(header.record_length);
        if end <= file_len {
            scan.valid_len = end;
        }
        offset = end;
        file.seek(SeekFrom::Start(offset))
            .map_err(SangitaError::path_io("seek segment", path))?;
    }
    Ok(scan)
}

/// The append handle of one segment.
#[derive(Debug)]
pub(crate) struct Segment {
    id: u64,
    path: PathBuf,
    file: File,
    size: u64,
}

impl Segment {
    /// Creates segment `id` in `dir` and writes its header.
    pub(crate) fn create(dir: &Path, id: u64) -> Result<Self> {
        let path = segment_path(dir, id);
        let mut file = OpenOptions::new()
            .create_new(true)
            .append(true)
            .open(&path)
            .map_err(SangitaError::path_io("create segment", &path))?;
        file.write_all(&SegmentHeader::new(id).to_bytes())
            .map_err(SangitaError::path_io("write segment header", &path))?;
        file.sync_all()
            .map_err(SangitaError::path_io("sync segment", &path))?;
        sync_dir(dir).map_err(SangitaError::path_io("sync WAL directory", dir))?;
        debug!(segment = id, path = %path.display(), "created WAL segment");
        Ok(Self {
            id,
            path,
            file,
            size: SEGMENT_HEADER_SIZE as u64,
        })
    }

    /// Opens existing segment `id` for appending.
    ///
    /// A file too short to hold a header is treated as a segment whose
    /// creation was interrupted and gets a fresh header. Every record is
    /// verified; a torn record at the tail is cut off, while damage with
    /// intact records after it fails the open. Returns the segment and the
    /// verification result.
    ///
    /// # Errors
    ///
    /// * `SangitaError::InvalidSegmentHeader` - If the segment header is bad
    /// * `SangitaError::CorruptedRecord` - For a framing defect before the tail
    /// * `SangitaError::ChecksumMismatch` - For a damaged record before the tail
    pub(crate) fn open(dir: &Path, id: u64) -> Result<(Self, SegmentCheck)> {
        let path = segment_path(dir, id);
        let mut file = OpenOptions::new()
            .append(true)
            .open(&path)
            .map_err(SangitaError::path_io("open segment", &path))?;
        let len = file
            .metadata()
            .map_err(SangitaError::path_io("stat segment", &path))?
            .len();

        if len < SEGMENT_HEADER_SIZE as u64 {
            warn!(segment = id, len, "segment header incomplete, rewriting");
            file.set_len(0)
                .map_err(SangitaError::path_io("truncate segment", &path))?;
            file.write_all(&SegmentHeader::new(id).to_bytes())
                .map_err(SangitaError::path_io("write segment header", &path))?;
            file.sync_all()
                .map_err(SangitaError::path_io("sync segment", &path))?;
        }

        let check = check_segment(&path, id)?;
        if check.is_torn() {
            warn!(
                segment = id,
                valid_len = check.valid_len,
                file_len = check.file_len,
                "truncating torn tail"
            );
            file.set_len(check.valid_len)
                .map_err(SangitaError::path_io("truncate segment", &path))?;
            file.sync_all()
                .map_err(SangitaError::path_io("sync segment", &path))?;
        }

        let segment = Self {
            id,
            path,
            file,
            size: check.valid_len,
        };
        Ok((segment, check))
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn size(&self) -> u64 {
        self.size
    }

    /// Returns `true` if at least one record follows the header.
    pub(crate) fn has_records(&self) -> bool {
        self.size > SEGMENT_HEADER_SIZE as u64
    }

    /// Appends one framed record.
    ///
    /// A failed write is rolled back to the previous length so that a torn
    /// record never precedes later ones.
    pub(crate) fn append(&mut self, bytes: &[u8]) -> Result<()> {
        if let Err(e) = self.file.write_all(bytes) {
            if let Err(trunc) = self.truncate(self.size) {
                warn!(segment = self.id, error = %trunc, "failed to roll back partial write");
            }
            return Err(SangitaError::path_io("append record", &self.path)(e));
        }
        self.size += bytes.len() as u64;
        Ok(())
    }

    /// Cuts the segment back to `len` bytes.
    pub(crate) fn truncate(&mut self, len: u64) -> Result<()> {
        self.file
            .set_len(len)
            .map_err(SangitaError::path_io("truncate segment", &self.path))?;
        self.size = len;
        Ok(())
    }

    /// Flushes record data to stable storage.
    pub(crate) fn sync_data(&self) -> Result<()> {
        self.file
            .sync_data()
            .map_err(SangitaError::path_io("sync segment", &self.path))
    }

    /// Flushes data and metadata to stable storage.
    pub(crate) fn sync_all(&self) -> Result<()> {
        self.file
            .sync_all()
            .map_err(SangitaError::path_io("sync segment", &self.path))
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_names() {
        assert_eq!(segment_file_name(1), "0000000001.waldrky");
        assert_eq!(parse_segment_file_name("0000000042.waldrky"), Some(42));
        assert_eq!(parse_segment_file_name("42.waldrky"), None);
        assert_eq!(parse_segment_file_name("0000000042.log"), None);
        assert_eq!(parse_segment_file_name("ignored.txt"), None);
        assert_eq!(parse_segment_file_name("000000004x.waldrky"), None);
    }

    #[test]
    fn test_header_layout() {
        let bytes = SegmentHeader::new(7).to_bytes();
        assert_eq!(&bytes[0..7], b"SANGITA");
        assert_eq!(bytes[7], WAL_VERSION);
        assert_eq!(&bytes[8..16], &7u64.to_le_bytes());
        assert_eq!(SegmentHeader::from_bytes(&bytes), Some(SegmentHeader::new(7)));

        let mut bad = bytes;
        bad[0] = 0;
        assert_eq!(SegmentHeader::from_bytes(&bad), None);
    }

    #[test]
    fn test_list_ignores_foreign_files() {
        let dir = tempdir().unwrap();
        for id in [1, 5, 3] {
            File::create(segment_path(dir.path(), id)).unwrap();
        }
        File::create(dir.path().join("ignored.txt")).unwrap();
        fs::create_dir(dir.path().join("0000000009.waldrky")).unwrap();

        assert_eq!(list_segment_ids(dir.path()).unwrap(), vec![1, 3, 5]);
        assert_eq!(latest_segment_id(dir.path()).unwrap(), Some(5));
    }

    #[test]
    fn test_create_writes_header() {
        let dir = tempdir().unwrap();
        let segment = Segment::create(dir.path(), 1).unwrap();
        assert_eq!(segment.size(), SEGMENT_HEADER_SIZE as u64);
        assert!(!segment.has_records());
        let len = fs::metadata(segment_path(dir.path(), 1)).unwrap().len();
        assert_eq!(len, SEGMENT_HEADER_SIZE as u64);
        assert!(Segment::create(dir.path(), 1).is_err());
    }

    #[test]
    fn test_open_rejects_mismatched_header() {
        let dir = tempdir().unwrap();
        let bytes = SegmentHeader::new(3).to_bytes();
        fs::write(segment_path(dir.path(), 4), bytes).unwrap();
        assert!(matches!(
            Segment::open(dir.path(), 4),
            Err(SangitaError::InvalidSegmentHeader { .. })
        ));
    }

    #[test]
    fn test_open_repairs_short_header() {
        let dir = tempdir().unwrap();
        fs::write(segment_path(dir.path(), 2), b"SANG").unwrap();
        let (segment, check) = Segment::open(dir.path(), 2).unwrap();
        assert_eq!(check.last_lsn, None);
        assert!(!check.is_torn());
        assert_eq!(segment.size(), SEGMENT_HEADER_SIZE as u64);
        read_segment_header(&segment_path(dir.path(), 2), 2).unwrap();
    }

    #[test]
    fn test_scan_stops_at_short_length() {
        let dir = tempdir().unwrap();
        let path = segment_path(dir.path(), 1);
        let mut bytes = SegmentHeader::new(1).to_bytes().to_vec();
        let header = RecordHeader {
            version: WAL_VERSION,
            record_length: 8,
            lsn: 1,
            op_type: 1,
        };
        bytes.extend_from_slice(&header.to_bytes());
        fs::write(&path, bytes).unwrap();

        let scan = scan_latest_lsn(&path).unwrap();
        assert_eq!(scan.last_lsn, None);
        assert_eq!(scan.valid_len, SEGMENT_HEADER_SIZE as u64);
    }

    #[test]
    fn test_truncate_restores_size() {
        let dir = tempdir().unwrap();
        let mut segment = Segment::create(dir.path(), 1).unwrap();
        segment.append(&[7u8; 40]).unwrap();
        assert!(segment.has_records());

        segment.truncate(SEGMENT_HEADER_SIZE as u64).unwrap();
        assert_eq!(segment.size(), SEGMENT_HEADER_SIZE as u64);
        let len = fs::metadata(segment_path(dir.path(), 1)).unwrap().len();
        assert_eq!(len, SEGMENT_HEADER_SIZE as u64);

        // Appends continue from the cut point.
        segment.append(&[1u8; 8]).unwrap();
        let len = fs::metadata(segment_path(dir.path(), 1)).unwrap().len();
        assert_eq!(len, SEGMENT_HEADER_SIZE as u64 + 8);
    }

    #[test]
    fn test_open_truncates_zero_filled_tail() {
        let dir = tempdir().unwrap();
        let mut bytes = SegmentHeader::new(1).to_bytes().to_vec();
        bytes.extend_from_slice(&[0u8; 100]);
        fs::write(segment_path(dir.path(), 1), bytes).unwrap();

        let (segment, check) = Segment::open(dir.path(), 1).unwrap();
        assert!(check.is_torn());
        assert_eq!(segment.size(), SEGMENT_HEADER_SIZE as u64);
        let len = fs::metadata(segment_path(dir.path(), 1)).unwrap().len();
        assert_eq!(len, SEGMENT_HEADER_SIZE as u64);
    }
}
