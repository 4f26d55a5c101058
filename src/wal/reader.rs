// Copyright (c) 2025 Sangita Contributors
// Licensed under the Sangita License. See LICENSE file for details.

//! Sequential record reader and log replay.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use tracing::{debug, info, warn};

use super::record::{has_magic, LogRecord, RecordHeader};
use super::segment::{list_segment_ids, read_segment_header, segment_path};
use super::{Wal, MIN_RECORD_SIZE, RECORD_HEADER_SIZE, SEGMENT_HEADER_SIZE};
use crate::error::{Result, SangitaError};

/// Counters from a completed replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Segments visited.
    pub segments: usize,
    /// Records delivered to the callback.
    pub records: usize,
    /// Whether a torn record was found at the end of the log, either cut off
    /// when the log was opened or met during this replay.
    pub torn_tail: bool,
}

enum Next {
    Record(LogRecord),
    End,
    /// A defect that reaches the end of the segment.
    Torn {
        error: SangitaError,
        /// LSN of a record whose header was written whole but whose body
        /// is missing.
        header_lsn: Option<u64>,
    },
}

/// Result of verifying every record of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SegmentCheck {
    /// Highest LSN seen, including that of a torn record with a whole header.
    pub(crate) last_lsn: Option<u64>,
    /// Intact records.
    pub(crate) records: usize,
    /// Offset just past the last intact record.
    pub(crate) valid_len: u64,
    /// File size at check time.
    pub(crate) file_len: u64,
}

impl SegmentCheck {
    /// Returns `true` if bytes after the last intact record must be cut off.
    pub(crate) fn is_torn(&self) -> bool {
        self.valid_len < self.file_len
    }
}

struct SegmentReader {
    segment_id: u64,
    reader: BufReader<File>,
    offset: u64,
    record_start: u64,
    file_len: u64,
}

impl SegmentReader {
    fn open(path: &Path, segment_id: u64) -> Result<Self> {
        read_segment_header(path, segment_id)?;
        let mut file = File::open(path).map_err(SangitaError::path_io("open segment", path))?;
        let file_len = file
            .metadata()
            .map_err(SangitaError::path_io("stat segment", path))?
            .len();
        file.seek(SeekFrom::Start(SEGMENT_HEADER_SIZE as u64))
            .map_err(SangitaError::path_io("seek segment", path))?;
        Ok(Self {
            segment_id,
            reader: BufReader::new(file),
            offset: SEGMENT_HEADER_SIZE as u64,
            record_start: SEGMENT_HEADER_SIZE as u64,
            file_len,
        })
    }

    fn corrupt(&self, reason: impl Into<String>) -> SangitaError {
        SangitaError::CorruptedRecord {
            segment_id: self.segment_id,
            offset: self.offset,
            reason: reason.into(),
        }
    }

    fn torn(&self, reason: impl Into<String>, header_lsn: Option<u64>) -> Next {
        Next::Torn {
            error: self.corrupt(reason),
            header_lsn,
        }
    }

    fn locate(&self, err: SangitaError) -> SangitaError {
        match err {
            SangitaError::CorruptedRecord { reason, .. } => self.corrupt(reason),
            other => other,
        }
    }

    /// Returns `true` if every byte from the reader position to EOF is zero.
    fn rest_is_blank(&mut self) -> Result<bool> {
        let mut chunk = [0u8; 8192];
        loop {
            let got = read_full(&mut self.reader, &mut chunk)?;
            if chunk[..got].iter().any(|&b| b != 0) {
                return Ok(false);
            }
            if got < chunk.len() {
                return Ok(true);
            }
        }
    }

    fn next(&mut self) -> Result<Next> {
        let mut header_buf = [0u8; RECORD_HEADER_SIZE];
        let got = read_full(&mut self.reader, &mut header_buf)?;
        if got == 0 {
            return Ok(Next::End);
        }
        if got < RECORD_HEADER_SIZE {
            return Ok(self.torn(
                format!("truncated record header ({got} of {RECORD_HEADER_SIZE} bytes)"),
                None,
            ));
        }

        let header = RecordHeader::from_bytes(&header_buf);
        let len = header.record_length as usize;
        let framing = if !has_magic(&header_buf) {
            Some("bad record magic".to_string())
        } else if len < MIN_RECORD_SIZE {
            Some(format!("record length {len} below minimum"))
        } else {
            None
        };
        if let Some(reason) = framing {
            // No usable length: torn only if nothing after it can be a record.
            if self.rest_is_blank()? {
                return Ok(self.torn(reason, None));
            }
            return Err(self.corrupt(reason));
        }

        let end = self.offset + len as u64;
        if end > self.file_len {
            return Ok(self.torn(
                format!(
                    "record of {len} bytes runs past end of segment ({} bytes)",
                    self.file_len
                ),
                Some(header.lsn),
            ));
        }

        let mut bytes = vec![0u8; len];
        bytes[..RECORD_HEADER_SIZE].copy_from_slice(&header_buf);
        self.reader.read_exact(&mut bytes[RECORD_HEADER_SIZE..])?;

        match LogRecord::decode(&bytes).map_err(|e| self.locate(e)) {
            Ok(record) => {
                self.record_start = self.offset;
                self.offset = end;
                Ok(Next::Record(record))
            }
            // The header is covered by the checksum, so its LSN is not trusted.
            Err(error) if end == self.file_len => Ok(Next::Torn {
                error,
                header_lsn: None,
            }),
            Err(e) => Err(e),
        }
    }
}

/// Decodes every record of segment `segment_id` at `path`.
///
/// A defect that reaches the end of the file ends the check; the returned
/// `valid_len` is where it starts.
///
/// # Errors
///
/// * `SangitaError::InvalidSegmentHeader` - If the segment header is bad
/// * `SangitaError::CorruptedRecord` - For a framing defect with records after it
/// * `SangitaError::ChecksumMismatch` - For a damaged record before the tail
pub(crate) fn check_segment(path: &Path, segment_id: u64) -> Result<SegmentCheck> {
    let mut reader = SegmentReader::open(path, segment_id)?;
    let mut check = SegmentCheck {
        last_lsn: None,
        records: 0,
        valid_len: reader.offset,
        file_len: reader.file_len,
    };
    loop {
        match reader.next()? {
            Next::Record(record) => {
                check.last_lsn = check.last_lsn.max(Some(record.lsn));
                check.records += 1;
                check.valid_len = reader.offset;
            }
            Next::End => break,
            Next::Torn { error, header_lsn } => {
                debug!(segment = segment_id, error = %error, "torn record at segment tail");
                check.last_lsn = check.last_lsn.max(header_lsn);
                break;
            }
        }
    }
    Ok(check)
}

/// Like `read_exact` but reports how many bytes arrived before EOF.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

impl Wal {
    /// Feeds every intact record to `apply`, oldest first.
    ///
    /// Segment headers, checksums and LSN ordering are verified. A defect
    /// confined to the end of the newest segment is a torn write: replay
    /// logs it and stops. The same defect anywhere else is an error.
    /// Appends are blocked while replay runs.
    ///
    /// # Errors
    ///
    /// * `SangitaError::InvalidSegmentHeader` - If a segment header is bad
    /// * `SangitaError::CorruptedRecord` - For framing defects before the tail or out-of-order LSNs
    /// * `SangitaError::ChecksumMismatch` - For a damaged record before the tail
    /// * Any error returned by `apply`
    pub fn replay<F>(&self, mut apply: F) -> Result<ReplayStats>
    where
        F: FnMut(LogRecord) -> Result<()>,
    {
        let _guard = self.state.lock();
        let ids = list_segment_ids(&self.dir)?;
        let mut stats = ReplayStats {
            torn_tail: self.repaired_tail,
            ..ReplayStats::default()
        };
        let mut last_lsn: Option<u64> = None;

        for (pos, &segment_id) in ids.iter().enumerate() {
            let is_last = pos + 1 == ids.len();
            let mut reader = SegmentReader::open(&segment_path(&self.dir, segment_id), segment_id)?;
            stats.segments += 1;

            loop {
                match reader.next()? {
                    Next::Record(record) => {
                        if let Some(prev) = last_lsn {
                            if record.lsn <= prev {
                                return Err(SangitaError::CorruptedRecord {
                                    segment_id,
                                    offset: reader.record_start,
                                    reason: format!(
                                        "lsn {} does not follow {prev}",
                                        record.lsn
                                    ),
                                });
                            }
                        }
                        last_lsn = Some(record.lsn);
                        apply(record)?;
                        stats.records += 1;
                    }
                    Next::End => break,
                    Next::Torn { error, .. } if is_last => {
                        warn!(segment = segment_id, error = %error, "torn record at log tail, stopping replay");
                        stats.torn_tail = true;
                        break;
                    }
                    Next::Torn { error, .. } => return Err(error),
                }
            }
        }

        info!(
            segments = stats.segments,
            records = stats.records,
            torn_tail = stats.torn_tail,
            "WAL replay complete"
        );
        Ok(stats)
    }
}
