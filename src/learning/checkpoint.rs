//! Weight persistence.
//!
//! # Weight File
//!
//! The file written by `save=` and read by `load=`. All integers are
//! host byte order.
//!
//! | Field | Type | Description |
//! |-------|------|-------------|
//! | table_count | u32 | always 4 |
//! | per table: count | u64 | number of entries |
//! | per table: entries | count x (i32, f64) | key, weight |
//!
//! # Snapshots
//!
//! Periodic copies of the weight file taken during long runs. A 32-byte
//! little-endian header precedes the payload (the weight file bytes,
//! optionally gzip-compressed):
//!
//! | Offset | Size | Field | Description |
//! |--------|------|-------|-------------|
//! | 0 | 4 | magic | "TRTL" |
//! | 4 | 4 | version | u32 (current: 1) |
//! | 8 | 4 | flags | bit 0: compressed |
//! | 12 | 4 | checksum | CRC32 of payload |
//! | 16 | 8 | episodes | u64 episodes completed |
//! | 24 | 8 | timestamp | i64 Unix timestamp |

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use chrono::Local;
use crc32fast::Hasher as Crc32Hasher;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::evaluator::WeightTable;
use crate::learning::LearningError;
use crate::pattern::NUM_TABLES;

/// Snapshot magic bytes.
pub const SNAPSHOT_MAGIC: &[u8; 4] = b"TRTL";

/// Snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Snapshot flag: payload is gzip-compressed.
pub const FLAG_COMPRESSED: u32 = 1;

/// Snapshots kept by default.
pub const DEFAULT_RETENTION_COUNT: usize = 5;

/// Write `tables` in weight file format.
pub fn write_weights<W: Write>(writer: &mut W, tables: &[WeightTable]) -> io::Result<()> {
    writer.write_all(&(tables.len() as u32).to_ne_bytes())?;
    for table in tables {
        table.write_to(writer)?;
    }
    Ok(())
}

/// Read a weight file holding exactly four tables.
///
/// # Errors
///
/// - `LearningError::InvalidWeights` if the table count is not 4 or the
///   data ends early
/// - `LearningError::Io` for other read failures
pub fn read_weights<R: Read>(reader: &mut R) -> Result<[WeightTable; NUM_TABLES], LearningError> {
    let mut count_buf = [0u8; 4];
    reader
        .read_exact(&mut count_buf)
        .map_err(|e| truncated_or_io(e, "table count"))?;
    let count = u32::from_ne_bytes(count_buf) as usize;
    if count != NUM_TABLES {
        return Err(LearningError::InvalidWeights(format!(
            "expected {} tables, found {}",
            NUM_TABLES, count
        )));
    }

    let mut tables: [WeightTable; NUM_TABLES] = Default::default();
    for (i, table) in tables.iter_mut().enumerate() {
        *table = WeightTable::read_from(reader)
            .map_err(|e| truncated_or_io(e, &format!("table {}", i)))?;
    }
    Ok(tables)
}

fn truncated_or_io(err: io::Error, what: &str) -> LearningError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        LearningError::InvalidWeights(format!("truncated while reading {}", what))
    } else {
        LearningError::Io(err)
    }
}

/// Save `tables` to `path` via a temporary file and rename.
pub fn save_weights<P: AsRef<Path>>(path: P, tables: &[WeightTable]) -> Result<(), LearningError> {
    let path = path.as_ref();
    let temp_path = path.with_extension("tmp");

    let file = File::create(&temp_path)?;
    let mut writer = BufWriter::new(file);
    write_weights(&mut writer, tables)?;
    writer.flush()?;
    drop(writer);

    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Load four tables from `path`.
pub fn load_weights<P: AsRef<Path>>(path: P) -> Result<[WeightTable; NUM_TABLES], LearningError> {
    let file = File::open(path.as_ref())?;
    let mut reader = BufReader::new(file);
    read_weights(&mut reader)
}

/// Snapshot file header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotHeader {
    /// Magic bytes ("TRTL").
    pub magic: [u8; 4],
    /// Format version.
    pub version: u32,
    /// Flags (bit 0: compressed).
    pub flags: u32,
    /// CRC32 of the payload as stored.
    pub checksum: u32,
    /// Episodes completed when the snapshot was taken.
    pub episodes: u64,
    /// Unix timestamp of creation.
    pub timestamp: i64,
}

impl SnapshotHeader {
    /// Header size in bytes.
    pub const SIZE: usize = 32;

    /// Create a header stamped with the current time and a zero checksum.
    pub fn new(episodes: u64, compressed: bool) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        Self {
            magic: *SNAPSHOT_MAGIC,
            version: SNAPSHOT_VERSION,
            flags: if compressed { FLAG_COMPRESSED } else { 0 },
            checksum: 0,
            episodes,
            timestamp,
        }
    }

    pub fn is_compressed(&self) -> bool {
        self.flags & FLAG_COMPRESSED != 0
    }

    /// Serialize to little-endian bytes.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4..8].copy_from_slice(&self.version.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.flags.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.checksum.to_le_bytes());
        bytes[16..24].copy_from_slice(&self.episodes.to_le_bytes());
        bytes[24..32].copy_from_slice(&self.timestamp.to_le_bytes());
        bytes
    }

    /// Parse and validate a header.
    ///
    /// # Errors
    ///
    /// `LearningError::InvalidSnapshot` on a short buffer, bad magic, or
    /// unknown version.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LearningError> {
        let Some(bytes) = bytes.get(..Self::SIZE) else {
            return Err(LearningError::InvalidSnapshot(format!(
                "Header too small: expected {} bytes, got {}",
                Self::SIZE,
                bytes.len()
            )));
        };

        let magic = [bytes[0], bytes[1], bytes[2], bytes[3]];
        if &magic != SNAPSHOT_MAGIC {
            return Err(LearningError::InvalidSnapshot(format!(
                "Invalid magic header: expected {:?}, got {:?}",
                SNAPSHOT_MAGIC, magic
            )));
        }

        let u32_at = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);

        let version = u32_at(4);
        if version != SNAPSHOT_VERSION {
            return Err(LearningError::InvalidSnapshot(format!(
                "Incompatible snapshot version: expected {}, got {}",
                SNAPSHOT_VERSION, version
            )));
        }

        let mut word = [0u8; 8];
        word.copy_from_slice(&bytes[16..24]);
        let episodes = u64::from_le_bytes(word);
        word.copy_from_slice(&bytes[24..32]);
        let timestamp = i64::from_le_bytes(word);

        Ok(Self {
            magic,
            version,
            flags: u32_at(8),
            checksum: u32_at(12),
            episodes,
            timestamp,
        })
    }
}

/// Writes, rotates and restores weight snapshots in one directory.
///
/// # Example
///
/// ```no_run
/// use tritile::evaluator::WeightTable;
/// use tritile::learning::SnapshotManager;
///
/// let manager = SnapshotManager::new("snapshots/", 5, true)?;
/// let tables: [WeightTable; 4] = Default::default();
/// let path = manager.save(100_000, &tables)?;
/// let (header, restored) = manager.load(&path)?;
/// assert_eq!(header.episodes, 100_000);
/// # Ok::<(), tritile::learning::LearningError>(())
/// ```
#[derive(Clone, Debug)]
pub struct SnapshotManager {
    snapshot_dir: PathBuf,
    retention_count: usize,
    compression_enabled: bool,
}

impl SnapshotManager {
    /// Create a manager, creating `snapshot_dir` if needed.
    ///
    /// A `retention_count` of 0 keeps every snapshot.
    pub fn new<P: AsRef<Path>>(
        snapshot_dir: P,
        retention_count: usize,
        compression_enabled: bool,
    ) -> Result<Self, LearningError> {
        let snapshot_dir = snapshot_dir.as_ref().to_path_buf();
        if !snapshot_dir.exists() {
            fs::create_dir_all(&snapshot_dir)?;
        }

        Ok(Self {
            snapshot_dir,
            retention_count,
            compression_enabled,
        })
    }

    pub fn snapshot_dir(&self) -> &Path {
        &self.snapshot_dir
    }

    pub fn retention_count(&self) -> usize {
        self.retention_count
    }

    pub fn compression_enabled(&self) -> bool {
        self.compression_enabled
    }

    /// Format: `snapshot_YYYYMMDD_HHMMSS_NNNNNNNN.bin`
    pub fn snapshot_filename(episodes: u64) -> String {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        format!("snapshot_{}_{:08}.bin", timestamp, episodes)
    }

    /// Write a snapshot and apply the retention policy.
    ///
    /// # Returns
    ///
    /// Path of the new snapshot.
    pub fn save(&self, episodes: u64, tables: &[WeightTable]) -> Result<PathBuf, LearningError> {
        let start_time = Instant::now();
        let path = self.snapshot_dir.join(Self::snapshot_filename(episodes));
        let temp_path = path.with_extension("tmp");

        let mut payload = Vec::new();
        write_weights(&mut payload, tables)?;

        if self.compression_enabled {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
            encoder.write_all(&payload)?;
            payload = encoder.finish()?;
        }

        let mut hasher = Crc32Hasher::new();
        hasher.update(&payload);

        let mut header = SnapshotHeader::new(episodes, self.compression_enabled);
        header.checksum = hasher.finalize();

        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&header.to_bytes())?;
        writer.write_all(&payload)?;
        writer.flush()?;
        drop(writer);

        fs::rename(&temp_path, &path)?;
        self.apply_retention()?;

        log::info!(
            "Snapshot saved: {} ({} bytes, {:.2}s, compression: {})",
            path.display(),
            SnapshotHeader::SIZE + payload.len(),
            start_time.elapsed().as_secs_f64(),
            self.compression_enabled
        );

        Ok(path)
    }

    /// Read a snapshot, verifying its header and checksum.
    pub fn load(&self, path: &Path) -> Result<(SnapshotHeader, [WeightTable; NUM_TABLES]), LearningError> {
        let (header, payload) = Self::read_verified(path)?;

        let tables = if header.is_compressed() {
            let mut decoder = GzDecoder::new(Cursor::new(payload));
            let mut decompressed = Vec::new();
            decoder.read_to_end(&mut decompressed)?;
            read_weights(&mut decompressed.as_slice())?
        } else {
            read_weights(&mut payload.as_slice())?
        };

        Ok((header, tables))
    }

    /// Check header and checksum without decoding the tables.
    pub fn verify(&self, path: &Path) -> Result<SnapshotHeader, LearningError> {
        Self::read_verified(path).map(|(header, _)| header)
    }

    /// Load the snapshot with the highest episode count, if any.
    pub fn load_latest(
        &self,
    ) -> Result<Option<(SnapshotHeader, [WeightTable; NUM_TABLES])>, LearningError> {
        match self.find_latest()? {
            Some(path) => self.load(&path).map(Some),
            None => Ok(None),
        }
    }

    /// Path of the snapshot with the highest episode count.
    pub fn find_latest(&self) -> Result<Option<PathBuf>, LearningError> {
        Ok(self
            .list()?
            .into_iter()
            .max_by_key(|(episodes, _)| *episodes)
            .map(|(_, path)| path))
    }

    /// All snapshots in the directory as `(episodes, path)`, unsorted.
    pub fn list(&self) -> Result<Vec<(u64, PathBuf)>, LearningError> {
        let mut snapshots = Vec::new();
        for entry in fs::read_dir(&self.snapshot_dir)? {
            let path = entry?.path();
            if let Some(filename) = path.file_name().and_then(|n| n.to_str())
                && let Some(episodes) = Self::parse_snapshot_filename(filename)
            {
                snapshots.push((episodes, path));
            }
        }
        Ok(snapshots)
    }

    fn read_verified(path: &Path) -> Result<(SnapshotHeader, Vec<u8>), LearningError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        let mut header_bytes = [0u8; SnapshotHeader::SIZE];
        reader.read_exact(&mut header_bytes).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                LearningError::InvalidSnapshot("Header truncated".to_string())
            } else {
                LearningError::Io(e)
            }
        })?;
        let header = SnapshotHeader::from_bytes(&header_bytes)?;

        let mut payload = Vec::new();
        reader.read_to_end(&mut payload)?;

        let mut hasher = Crc32Hasher::new();
        hasher.update(&payload);
        let computed = hasher.finalize();
        if computed != header.checksum {
            return Err(LearningError::InvalidSnapshot(format!(
                "Checksum mismatch: expected {:#010x}, computed {:#010x}",
                header.checksum, computed
            )));
        }

        Ok((header, payload))
    }

    fn apply_retention(&self) -> Result<Vec<PathBuf>, LearningError> {
        if self.retention_count == 0 {
            return Ok(Vec::new());
        }

        let mut snapshots = self.list()?;
        snapshots.sort_by(|a, b| b.0.cmp(&a.0));

        let mut deleted = Vec::new();
        for (_, path) in snapshots.into_iter().skip(self.retention_count) {
            if fs::remove_file(&path).is_ok() {
                log::info!("Deleted old snapshot: {}", path.display());
                deleted.push(path);
            }
        }
        Ok(deleted)
    }

    /// Episode count from `snapshot_YYYYMMDD_HHMMSS_NNNNNNNN.bin`.
    fn parse_snapshot_filename(filename: &str) -> Option<u64> {
        let inner = filename.strip_prefix("snapshot_")?.strip_suffix(".bin")?;
        let (_, episodes) = inner.rsplit_once('_')?;
        episodes.parse().ok()
    }
}
