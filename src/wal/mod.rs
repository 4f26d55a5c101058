// Copyright (c) 2025 Sangita Contributors
// Licensed under the Sangita License. See LICENSE file for details.

//! Segmented write-ahead log.
//!
//! The log is a directory of segment files (`0000000001.waldrky`,
//! `0000000002.waldrky`, ...). Records are appended to the highest-numbered
//! segment; when it grows past [`WalConfig::max_segment_size`] a new segment
//! is started. Every record carries a monotonically increasing LSN and a
//! CRC-32 checksum.
//!
//! # Recovery
//!
//! [`Wal::open`] picks the latest segment, validates its header, and
//! verifies its records to find the last LSN. A record cut short or damaged
//! by a crash at the tail is truncated away so new appends start on a clean
//! boundary. Damage followed by intact records is never truncated: the open
//! fails instead. If the active segment holds no records the LSN is taken
//! from the newest earlier segment that has some. [`Wal::replay`] then streams every verified record.
//!
//! # Example
//!
//! ```rust
//! use sangita::wal::{InsertPayload, Operation, Wal, WalConfig};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let wal = Wal::open(dir.path(), WalConfig::default()).unwrap();
//!
//! let lsn = wal
//!     .append(&Operation::Insert(InsertPayload {
//!         external_id: "doc-1".into(),
//!         internal_id: 1,
//!         vector: vec![1.0, 0.0],
//!         metadata: Vec::new(),
//!     }))
//!     .unwrap();
//! assert_eq!(lsn, 1);
//!
//! let mut seen = Vec::new();
//! wal.replay(|record| {
//!     seen.push(record.lsn);
//!     Ok(())
//! })
//! .unwrap();
//! assert_eq!(seen, vec![1]);
//! ```

mod payload;
mod reader;
mod record;
mod segment;

pub use payload::{DeletePayload, InsertPayload};
pub use reader::ReplayStats;
pub use record::{has_magic, LogRecord, OpType, Operation, RecordHeader};
pub use segment::{
    latest_segment_id, list_segment_ids, parse_segment_file_name, scan_latest_lsn,
    segment_file_name, segment_path, SegmentHeader, SegmentScan, SEGMENT_EXTENSION,
};

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, SangitaError};
use record::encode_record;
use segment::Segment;

/// Magic bytes at the start of every segment and record header.
pub const MAGIC: &[u8; 7] = b"SANGITA";

/// Current on-disk format version.
pub const WAL_VERSION: u8 = 1;

/// Size of a segment header in bytes.
pub const SEGMENT_HEADER_SIZE: usize = 16;

/// Size of a record header in bytes.
pub const RECORD_HEADER_SIZE: usize = 32;

/// Size of the trailing record checksum in bytes.
pub const CHECKSUM_SIZE: usize = 4;

/// Smallest possible record: header plus checksum.
pub const MIN_RECORD_SIZE: usize = RECORD_HEADER_SIZE + CHECKSUM_SIZE;

/// Default segment rotation threshold (64 MiB).
pub const DEFAULT_MAX_SEGMENT_SIZE: u64 = 64 * 1024 * 1024;

const SYNC_INTERVAL: Duration = Duration::from_secs(1);

/// When appended records are forced to stable storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncPolicy {
    /// Sync on the first append after at least one second since the last sync.
    EverySecond,
    /// Sync after every append.
    Always,
    /// Leave flushing to the operating system.
    Os,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        SyncPolicy::Always
    }
}

impl TryFrom<u8> for SyncPolicy {
    type Error = SangitaError;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0 => Ok(SyncPolicy::EverySecond),
            1 => Ok(SyncPolicy::Always),
            2 => Ok(SyncPolicy::Os),
            other => Err(SangitaError::InvalidSyncPolicy(other)),
        }
    }
}

impl fmt::Display for SyncPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncPolicy::EverySecond => "every-second",
            SyncPolicy::Always => "always",
            SyncPolicy::Os => "os",
        };
        f.write_str(name)
    }
}

/// Configuration for a [`Wal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalConfig {
    /// Durability policy for appends.
    pub sync_policy: SyncPolicy,
    /// Rotate to a new segment once the active one would exceed this many bytes.
    pub max_segment_size: u64,
}

impl Default for WalConfig {
    fn default() -> Self {
        Self {
            sync_policy: SyncPolicy::default(),
            max_segment_size: DEFAULT_MAX_SEGMENT_SIZE,
        }
    }
}

struct WalState {
    active: Segment,
    lsn: u64,
    last_sync: Instant,
}

/// Append-only, segmented, checksummed log.
///
/// All methods take `&self`; appends are serialized by an internal mutex.
pub struct Wal {
    dir: PathBuf,
    config: WalConfig,
    repaired_tail: bool,
    state: Mutex<WalState>,
}

impl Wal {
    /// Opens the log in `dir`, creating segment 1 if the directory holds none.
    ///
    /// # Errors
    ///
    /// * `SangitaError::DirectoryNotFound` - If `dir` does not exist
    /// * `SangitaError::NotADirectory` - If `dir` is not a directory
    /// * `SangitaError::InvalidSegmentHeader` - If the latest segment's header is damaged
    /// * `SangitaError::CorruptedRecord` - If the latest segment is damaged before its tail
    /// * `SangitaError::ChecksumMismatch` - If a record before the tail of the latest segment is damaged
    pub fn open(dir: impl AsRef<Path>, config: WalConfig) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        match std::fs::metadata(&dir) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(SangitaError::NotADirectory(dir)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SangitaError::DirectoryNotFound(dir))
            }
            Err(e) => return Err(SangitaError::path_io("stat WAL directory", &dir)(e)),
        }

        let ids = list_segment_ids(&dir)?;
        let (active, lsn, repaired_tail) = match ids.split_last() {
            None => (Segment::create(&dir, 1)?, 0, false),
            Some((&latest, earlier)) => {
                let (segment, check) = Segment::open(&dir, latest)?;
                let mut lsn = check.last_lsn;
                for &id in earlier.iter().rev() {
                    if lsn.is_some() {
                        break;
                    }
                    lsn = scan_latest_lsn(&segment_path(&dir, id))?.last_lsn;
                }
                (segment, lsn.unwrap_or(0), check.is_torn())
            }
        };

        info!(
            dir = %dir.display(),
            segment = active.id(),
            lsn,
            repaired_tail,
            sync_policy = %config.sync_policy,
            "opened WAL"
        );
        Ok(Self {
            dir,
            config,
            repaired_tail,
            state: Mutex::new(WalState {
                active,
                lsn,
                last_sync: Instant::now(),
            }),
        })
    }

    /// Appends `operation` and returns its LSN.
    ///
    /// The record is durable on return under [`SyncPolicy::Always`]. On error
    /// the LSN is not consumed and the segment is left at its prior length.
    /// The one exception is a failed sync whose rollback also fails: the
    /// record may still reach disk, so its LSN is consumed.
    pub fn append(&self, operation: &Operation) -> Result<u64> {
        let mut state = self.state.lock();
        let lsn = state.lsn + 1;
        let bytes = encode_record(lsn, operation)?;

        if state.active.has_records()
            && state.active.size() + bytes.len() as u64 > self.config.max_segment_size
        {
            self.rotate(&mut state)?;
        }

        let prior_len = state.active.size();
        state.active.append(&bytes)?;
        if let Err(e) = self.sync_appended(&mut state) {
            Self::undo_append(&mut state, prior_len, lsn);
            return Err(e);
        }

        state.lsn = lsn;
        debug!(lsn, op = ?operation.op_type(), bytes = bytes.len(), "appended WAL record");
        Ok(lsn)
    }

    fn sync_appended(&self, state: &mut WalState) -> Result<()> {
        match self.config.sync_policy {
            SyncPolicy::Always => {
                state.active.sync_data()?;
                state.last_sync = Instant::now();
            }
            SyncPolicy::EverySecond => {
                if state.last_sync.elapsed() >= SYNC_INTERVAL {
                    state.active.sync_data()?;
                    state.last_sync = Instant::now();
                }
            }
            SyncPolicy::Os => {}
        }
        Ok(())
    }

    /// Removes a record whose append is being reported as failed.
    fn undo_append(state: &mut WalState, prior_len: u64, lsn: u64) {
        if let Err(e) = state.active.truncate(prior_len) {
            warn!(
                segment = state.active.id(),
                lsn,
                error = %e,
                "failed to roll back unsynced record, consuming its LSN"
            );
            state.lsn = lsn;
        }
    }

    fn rotate(&self, state: &mut WalState) -> Result<()> {
        state.active.sync_all()?;
        let next = state.active.id() + 1;
        state.active = Segment::create(&self.dir, next)?;
        info!(segment = next, lsn = state.lsn, "rotated WAL segment");
        Ok(())
    }

    /// Forces buffered records to stable storage.
    pub fn sync(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.active.sync_data()?;
        state.last_sync = Instant::now();
        Ok(())
    }

    /// Syncs and releases the active segment.
    pub fn close(self) -> Result<()> {
        let state = self.state.into_inner();
        state.active.sync_all()?;
        info!(dir = %self.dir.display(), lsn = state.lsn, "closed WAL");
        Ok(())
    }

    /// LSN of the last appended (or recovered) record; 0 for an empty log.
    pub fn last_lsn(&self) -> u64 {
        self.state.lock().lsn
    }

    /// Id of the segment receiving appends.
    pub fn active_segment_id(&self) -> u64 {
        self.state.lock().active.id()
    }

    /// Size in bytes of the active segment.
    pub fn active_segment_size(&self) -> u64 {
        self.state.lock().active.size()
    }

    /// Whether opening the log cut a torn record off the active segment.
    pub fn repaired_tail(&self) -> bool {
        self.repaired_tail
    }

    /// Directory holding the segments.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Configuration the log was opened with.
    pub fn config(&self) -> &WalConfig {
        &self.config
    }
}

impl fmt::Debug for Wal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wal")
            .field("dir", &self.dir)
            .field("config", &self.config)
            .field("repaired_tail", &self.repaired_tail)
            .finish_non_exhaustive()
    }
}
