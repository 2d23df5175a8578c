//! Snapshot persistence for the cache and blocklist stores
//!
//! Two independent files in the data directory, one per store, written once
//! at shutdown and read once at startup. The encoding is an explicit,
//! versioned, length-prefixed record list:
//!
//! ```text
//! magic "PXST" (4) | version u8 | count u32 BE |
//!   count x ( key_len u32 BE | key utf8 | val_len u32 BE | val utf8 )
//! ```
//!
//! The two stores are saved independently and non-atomically; a crash
//! between the two saves can leave files from different points in time.
//! Persistence only provides warm-restart continuity, so that is acceptable.

use bytes::{Buf, BufMut, BytesMut};
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{ProxyError, Result};
use crate::logger::log;
use crate::store::SharedStore;

const MAGIC: &[u8; 4] = b"PXST";
const VERSION: u8 = 1;

/// A record key or value longer than this is treated as corruption
/// rather than an allocation request.
const MAX_FIELD_LEN: usize = 16 * 1024 * 1024;

const CACHE_FILE: &str = "cached_sites.bin";
const BLOCKLIST_FILE: &str = "blocked_sites.bin";

/// Encode records into the snapshot wire format
pub fn encode_records(records: &[(String, String)]) -> BytesMut {
    let payload: usize = records
        .iter()
        .map(|(k, v)| 8 + k.len() + v.len())
        .sum::<usize>();
    let mut buf = BytesMut::with_capacity(9 + payload);
    buf.put_slice(MAGIC);
    buf.put_u8(VERSION);
    buf.put_u32(records.len() as u32);
    for (key, value) in records {
        buf.put_u32(key.len() as u32);
        buf.put_slice(key.as_bytes());
        buf.put_u32(value.len() as u32);
        buf.put_slice(value.as_bytes());
    }
    buf
}

/// Decode a snapshot buffer into records
///
/// A zero-length buffer decodes as an empty record list (a freshly created
/// file). Bad magic, unknown version, truncation or trailing bytes are all
/// decode errors.
pub fn decode_records(mut buf: &[u8]) -> io::Result<Vec<(String, String)>> {
    if buf.is_empty() {
        return Ok(Vec::new());
    }
    if buf.len() < 9 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "snapshot header truncated",
        ));
    }
    if &buf[..4] != MAGIC {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "bad snapshot magic",
        ));
    }
    buf.advance(4);
    let version = buf.get_u8();
    if version != VERSION {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unsupported snapshot version: {}", version),
        ));
    }
    let count = buf.get_u32() as usize;

    let mut records = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        let key = read_field(&mut buf)?;
        let value = read_field(&mut buf)?;
        records.push((key, value));
    }

    if buf.has_remaining() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{} trailing bytes after last record", buf.remaining()),
        ));
    }
    Ok(records)
}

fn read_field(buf: &mut &[u8]) -> io::Result<String> {
    if buf.remaining() < 4 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "record length truncated",
        ));
    }
    let len = buf.get_u32() as usize;
    if len > MAX_FIELD_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("record field length {} exceeds limit", len),
        ));
    }
    if buf.remaining() < len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "record body truncated",
        ));
    }
    let bytes = buf[..len].to_vec();
    buf.advance(len);
    String::from_utf8(bytes)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("invalid utf8: {}", e)))
}

/// Persistence manager for the two state files
///
/// Never retains the stores; it only reads or writes a snapshot of their
/// current contents at load/save time.
#[derive(Debug, Clone)]
pub struct StateFiles {
    data_dir: PathBuf,
}

impl StateFiles {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    /// Create the data directory if missing. Fatal at startup on failure.
    pub fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            log::info!(path = %self.data_dir.display(), "Creating data directory");
            std::fs::create_dir_all(&self.data_dir).map_err(|e| {
                ProxyError::Config(format!(
                    "Failed to create data directory {:?}: {}",
                    self.data_dir, e
                ))
            })?;
        }
        Ok(())
    }

    pub fn cache_path(&self) -> PathBuf {
        self.data_dir.join(CACHE_FILE)
    }

    pub fn blocklist_path(&self) -> PathBuf {
        self.data_dir.join(BLOCKLIST_FILE)
    }

    /// Populate the cache store from its file.
    ///
    /// Missing file: a valid empty snapshot is created and the store stays
    /// empty. Unreadable or corrupt file: logged, store stays empty.
    /// Startup never aborts on persisted-state problems.
    pub fn load_cache(&self, store: &SharedStore) {
        let records = load_file(&self.cache_path(), "cache");
        let count = records.len();
        store.load_cache_records(records);
        log::store_event("cache", "loaded", count);
    }

    /// Populate the blocklist store from its file, same fail-soft policy
    /// as [`load_cache`](Self::load_cache).
    pub fn load_blocklist(&self, store: &SharedStore) {
        let records = load_file(&self.blocklist_path(), "blocklist");
        let count = records.len();
        store.load_blocklist_records(records);
        log::store_event("blocklist", "loaded", count);
    }

    /// Write the current cache snapshot, overwriting the prior file
    pub fn save_cache(&self, store: &SharedStore) -> Result<()> {
        let records = store.cache_records();
        save_file(&self.cache_path(), &records)?;
        log::store_event("cache", "saved", records.len());
        Ok(())
    }

    /// Write the current blocklist snapshot, overwriting the prior file
    pub fn save_blocklist(&self, store: &SharedStore) -> Result<()> {
        let records = store.blocklist_records();
        save_file(&self.blocklist_path(), &records)?;
        log::store_event("blocklist", "saved", records.len());
        Ok(())
    }
}

fn save_file(path: &Path, records: &[(String, String)]) -> Result<()> {
    let buf = encode_records(records);
    std::fs::write(path, &buf[..])
        .map_err(|e| ProxyError::Persistence(format!("failed to write {:?}: {}", path, e)))
}

fn load_file(path: &Path, store_name: &str) -> Vec<(String, String)> {
    if !path.exists() {
        log::info!(store = store_name, path = %path.display(), "No persisted state found, creating new file");
        if let Err(e) = save_file(path, &[]) {
            log::warn!(store = store_name, error = %e, "Failed to create state file");
        }
        return Vec::new();
    }

    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!(store = store_name, path = %path.display(), error = %e, "Failed to read state file, starting empty");
            return Vec::new();
        }
    };

    match decode_records(&bytes) {
        Ok(records) => records,
        Err(e) => {
            log::warn!(store = store_name, path = %path.display(), error = %e, "Failed to decode state file, starting empty");
            Vec::new()
        }
    }
}
