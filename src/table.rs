//! Persistent string-keyed table.
//!
//! Entries live in memory and are written back as a whole file on `flush`,
//! `reopen` and `close`. Updates are visible to readers immediately but are
//! only durable after the next write-back.
//!
//! File layout:
//!
//! ```text
//! [magic: 4][version: 1][body_len: u64 LE][body: MessagePack map][crc32: u32 LE]
//! ```

use crate::error::{RegistryError, Result};
use crate::types::TableValue;
use fs2::FileExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Magic bytes for table files.
const TABLE_MAGIC: &[u8; 4] = b"NRT\0";

/// Current table format version.
const TABLE_VERSION: u8 = 1;

struct TableState {
    entries: HashMap<String, TableValue>,
    /// Set by every mutation, cleared by a successful write-back.
    dirty: bool,
}

/// A durable key-value table backed by a single file.
///
/// All operations take the table lock, so each one is atomic with respect
/// to the others and to `reopen`.
pub struct Table {
    /// Path to the table file.
    path: PathBuf,

    /// Lock file for exclusive access.
    _lock_file: File,

    state: RwLock<TableState>,
}

impl Table {
    /// Open a table, creating an empty file if none exists.
    ///
    /// Fails if the file cannot be created or read, or if another process
    /// holds the table.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let lock_file = Self::acquire_lock(&path)?;

        let entries = if path.exists() {
            read_table_file(&path)?
        } else {
            let entries = HashMap::new();
            write_table_file(&path, &entries)?;
            entries
        };

        debug!(path = %path.display(), entries = entries.len(), "opened table");

        Ok(Self {
            path,
            _lock_file: lock_file,
            state: RwLock::new(TableState {
                entries,
                dirty: false,
            }),
        })
    }

    /// Get the table path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    // --- Single-key operations ---

    /// Get a copy of the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<TableValue> {
        self.state.read().entries.get(key).cloned()
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn set(&self, key: impl Into<String>, value: TableValue) {
        let mut state = self.state.write();
        state.entries.insert(key.into(), value);
        state.dirty = true;
    }

    /// Delete `key`, returning the removed value.
    pub fn delete(&self, key: &str) -> Option<TableValue> {
        let mut state = self.state.write();
        let removed = state.entries.remove(key);
        if removed.is_some() {
            state.dirty = true;
        }
        removed
    }

    /// Check if `key` is present (an empty value still counts).
    pub fn contains(&self, key: &str) -> bool {
        self.state.read().entries.contains_key(key)
    }

    /// Atomic read-modify-write of one key.
    ///
    /// `f` sees the current value (`None` if absent) and may replace or
    /// remove it. No other operation can interleave with `f`.
    pub fn update<R>(&self, key: &str, f: impl FnOnce(&mut Option<TableValue>) -> R) -> R {
        let mut state = self.state.write();
        let mut slot = state.entries.remove(key);
        let before = slot.clone();

        let result = f(&mut slot);

        if slot != before {
            state.dirty = true;
        }
        if let Some(value) = slot {
            state.entries.insert(key.to_string(), value);
        }
        result
    }

    /// Move the value under `from` to `to`. Returns false, and moves
    /// nothing, if `from` is absent or holds an empty value.
    ///
    /// If `to` already holds a value, `merge(moved, existing)` decides what
    /// ends up under `to`.
    pub fn rename(
        &self,
        from: &str,
        to: &str,
        merge: impl FnOnce(TableValue, TableValue) -> TableValue,
    ) -> bool {
        let mut state = self.state.write();
        if !state.entries.get(from).is_some_and(|value| !value.is_empty()) {
            return false;
        }
        let Some(moved) = state.entries.remove(from) else {
            return false;
        };

        let value = match state.entries.remove(to) {
            Some(existing) => merge(moved, existing),
            None => moved,
        };
        state.entries.insert(to.to_string(), value);
        state.dirty = true;
        true
    }

    // --- Whole-table operations ---

    /// Snapshot of all keys, in no particular order.
    ///
    /// This is O(entries); callers should prefer `collect` when they only
    /// need a filtered view.
    pub fn keys(&self) -> Vec<String> {
        self.state.read().entries.keys().cloned().collect()
    }

    /// Map every entry through `f` under the read lock, keeping the `Some`s.
    pub fn collect<T>(&self, mut f: impl FnMut(&str, &TableValue) -> Option<T>) -> Vec<T> {
        self.state
            .read()
            .entries
            .iter()
            .filter_map(|(key, value)| f(key, value))
            .collect()
    }

    /// Visit every entry under the write lock; entries for which `f`
    /// returns false are deleted. Returns the number deleted.
    ///
    /// The whole scan is atomic: no key can be added or changed mid-scan.
    pub fn retain(&self, mut f: impl FnMut(&str, &mut TableValue) -> bool) -> usize {
        let mut state = self.state.write();
        let before = state.entries.len();
        let mut touched = false;

        state.entries.retain(|key, value| {
            let snapshot = value.clone();
            let keep = f(key, value);
            if keep && *value != snapshot {
                touched = true;
            }
            keep
        });

        let removed = before - state.entries.len();
        if removed > 0 || touched {
            state.dirty = true;
        }
        removed
    }

    /// Remove every entry.
    pub fn clear(&self) {
        let mut state = self.state.write();
        if !state.entries.is_empty() {
            state.entries.clear();
            state.dirty = true;
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether there are changes not yet written back.
    pub fn is_dirty(&self) -> bool {
        self.state.read().dirty
    }

    // --- Lifecycle ---

    /// Write pending changes to disk.
    pub fn flush(&self) -> Result<()> {
        let mut state = self.state.write();
        if !state.dirty {
            return Ok(());
        }
        write_table_file(&self.path, &state.entries)?;
        state.dirty = false;
        Ok(())
    }

    /// Write back, then reload the table from disk.
    ///
    /// Reloading drops the in-memory map and its spare capacity. If either
    /// step fails the current in-memory state is kept, so the table stays
    /// usable and the caller can retry later.
    pub fn reopen(&self) -> Result<()> {
        let mut state = self.state.write();

        if state.dirty {
            write_table_file(&self.path, &state.entries)?;
            state.dirty = false;
        }

        match read_table_file(&self.path) {
            Ok(entries) => {
                state.entries = entries;
                Ok(())
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "reload failed, keeping in-memory table");
                Err(e)
            }
        }
    }

    /// Flush and release the table.
    pub fn close(self) -> Result<()> {
        self.flush()
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_file = File::create(sibling_path(path, ".lock"))?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| RegistryError::Locked)?;

        Ok(lock_file)
    }
}

impl Drop for Table {
    fn drop(&mut self) {
        // Best-effort write-back on drop
        let state = self.state.get_mut();
        if state.dirty {
            if let Err(e) = write_table_file(&self.path, &state.entries) {
                warn!(path = %self.path.display(), error = %e, "failed to flush table on drop");
            } else {
                state.dirty = false;
            }
        }
    }
}

/// `path` with `suffix` appended to its full file name.
fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Write the table file via a temporary sibling and an atomic rename.
fn write_table_file(path: &Path, entries: &HashMap<String, TableValue>) -> Result<()> {
    let encoded = rmp_serde::to_vec(entries)?;
    let checksum = crc32fast::hash(&encoded);

    let tmp = sibling_path(path, ".tmp");
    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp)?;

        file.write_all(TABLE_MAGIC)?;
        file.write_all(&[TABLE_VERSION])?;
        file.write_all(&(encoded.len() as u64).to_le_bytes())?;
        file.write_all(&encoded)?;
        file.write_all(&checksum.to_le_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;

    Ok(())
}

fn read_table_file(path: &Path) -> Result<HashMap<String, TableValue>> {
    let mut file = File::open(path)?;

    // Read magic
    let mut magic = [0u8; 4];
    file.read_exact(&mut magic)?;
    if &magic != TABLE_MAGIC {
        return Err(RegistryError::InvalidFormat("Invalid table magic".into()));
    }

    // Read version
    let mut version = [0u8; 1];
    file.read_exact(&mut version)?;
    if version[0] != TABLE_VERSION {
        return Err(RegistryError::InvalidFormat(format!(
            "Unsupported table version: {}",
            version[0]
        )));
    }

    // Read body
    let mut len_bytes = [0u8; 8];
    file.read_exact(&mut len_bytes)?;
    let len = u64::from_le_bytes(len_bytes);

    let file_len = file.metadata()?.len();
    let framing = (TABLE_MAGIC.len() + 1 + 8 + 4) as u64;
    if file_len < framing || len != file_len - framing {
        return Err(RegistryError::InvalidFormat(format!(
            "Body length {} does not match file size {}",
            len, file_len
        )));
    }
    let len = len as usize;

    let mut encoded = vec![0u8; len];
    file.read_exact(&mut encoded)?;

    let mut checksum_bytes = [0u8; 4];
    file.read_exact(&mut checksum_bytes)?;
    let expected = u32::from_le_bytes(checksum_bytes);
    let got = crc32fast::hash(&encoded);
    if expected != got {
        return Err(RegistryError::ChecksumMismatch { expected, got });
    }

    Ok(rmp_serde::from_slice(&encoded)?)
}
