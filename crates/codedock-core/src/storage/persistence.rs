//! Code persistence
//!
//! The persisted document is a single slot holding the last-known code text.
//! Writes overwrite the slot; there is no versioning.
//!
//! Storage location: `~/.local/share/codedock/editorCode` (configurable via `Config`)
//!
//! `FileCodeStore` uses atomic writes (write to a unique temp file, then rename) so a
//! crash mid-write never leaves a truncated slot behind.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local};
use tempfile::NamedTempFile;

use super::error::{StorageError, StorageResult};
use crate::config::Config;

/// A durable single-slot store for the editor's code
pub trait CodeStore {
    /// Read the stored code, `None` if nothing has been stored
    fn load(&self) -> StorageResult<Option<String>>;

    /// Overwrite the slot
    fn save(&mut self, code: &str) -> StorageResult<()>;

    /// Remove the stored entry
    fn clear(&mut self) -> StorageResult<()>;
}

/// Information about the persisted slot
#[derive(Debug, Clone, Default)]
pub struct StoredCodeInfo {
    pub exists: bool,
    /// Size in bytes
    pub size: u64,
    pub modified: Option<DateTime<Local>>,
}

/// File-backed code store
#[derive(Debug, Clone)]
pub struct FileCodeStore {
    path: PathBuf,
}

impl FileCodeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create a store at the configured location
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.code_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size and modification time of the slot
    pub fn info(&self) -> StoredCodeInfo {
        match fs::metadata(&self.path) {
            Ok(meta) => StoredCodeInfo {
                exists: true,
                size: meta.len(),
                modified: meta.modified().ok().map(DateTime::<Local>::from),
            },
            Err(_) => StoredCodeInfo::default(),
        }
    }
}

impl CodeStore for FileCodeStore {
    fn load(&self) -> StorageResult<Option<String>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StorageError::ReadError {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };

        String::from_utf8(bytes)
            .map(Some)
            .map_err(|_| StorageError::InvalidEncoding {
                path: self.path.clone(),
            })
    }

    fn save(&mut self, code: &str) -> StorageResult<()> {
        atomic_write(&self.path, code.as_bytes())
    }

    fn clear(&mut self) -> StorageResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::from_io(e, self.path.clone())),
        }
    }
}

/// In-memory code store
///
/// Clones share the same slot, so a caller can keep a handle to inspect
/// what another owner wrote. `set_available(false)` makes every operation
/// fail with `StorageError::Unavailable`.
#[derive(Debug, Clone, Default)]
pub struct MemoryCodeStore {
    inner: Arc<Mutex<MemorySlot>>,
}

#[derive(Debug, Default)]
struct MemorySlot {
    code: Option<String>,
    unavailable: bool,
}

impl MemoryCodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `code`
    pub fn with_code(code: impl Into<String>) -> Self {
        let store = Self::new();
        store.lock().code = Some(code.into());
        store
    }

    /// Current slot contents
    pub fn contents(&self) -> Option<String> {
        self.lock().code.clone()
    }

    pub fn set_available(&self, available: bool) {
        self.lock().unavailable = !available;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemorySlot> {
        // A poisoned slot still holds valid data
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check(slot: &MemorySlot) -> StorageResult<()> {
        if slot.unavailable {
            Err(StorageError::Unavailable("in-memory store disabled".to_string()))
        } else {
            Ok(())
        }
    }
}

impl CodeStore for MemoryCodeStore {
    fn load(&self) -> StorageResult<Option<String>> {
        let slot = self.lock();
        Self::check(&slot)?;
        Ok(slot.code.clone())
    }

    fn save(&mut self, code: &str) -> StorageResult<()> {
        let mut slot = self.lock();
        Self::check(&slot)?;
        slot.code = Some(code.to_string());
        Ok(())
    }

    fn clear(&mut self) -> StorageResult<()> {
        let mut slot = self.lock();
        Self::check(&slot)?;
        slot.code = None;
        Ok(())
    }
}

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
pub(crate) fn atomic_write(path: &Path, data: &[u8]) -> StorageResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| StorageError::CreateDirectory {
        path: dir.to_path_buf(),
        source: e,
    })?;

    // Uniquely named sibling, so nothing already in `dir` is touched
    let mut file =
        NamedTempFile::new_in(dir).map_err(|e| StorageError::from_io(e, dir.to_path_buf()))?;
    let temp_path = file.path().to_path_buf();
    file.write_all(data)
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;
    file.as_file()
        .sync_all()
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;

    file.persist(path)
        .map(|_| ())
        .map_err(|e| StorageError::AtomicWriteFailed {
            from: temp_path,
            to: path.to_path_buf(),
            source: e.error,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_store_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("editorCode");

        let code = "public class Main {\n\tpublic static void main() {}\n}\r\n// ünïcode ✓\n";
        {
            let mut store = FileCodeStore::new(&path);
            assert!(store.load().unwrap().is_none());
            store.save(code).unwrap();
        }

        // A fresh store on the same path reads back the exact bytes
        let store = FileCodeStore::new(&path);
        assert_eq!(store.load().unwrap().as_deref(), Some(code));
        assert_eq!(fs::read(&path).unwrap(), code.as_bytes());
    }

    #[test]
    fn test_file_store_overwrites_single_slot() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = FileCodeStore::new(temp_dir.path().join("editorCode"));

        store.save("first").unwrap();
        store.save("second").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("second"));
        let entries: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("editorCode")]);
    }

    #[test]
    fn test_file_store_clear() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = FileCodeStore::new(temp_dir.path().join("editorCode"));

        // Clearing an empty slot is fine
        store.clear().unwrap();

        store.save("print('hi')").unwrap();
        assert!(store.info().exists);
        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        assert!(!store.info().exists);
    }

    #[test]
    fn test_file_store_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = FileCodeStore::new(temp_dir.path().join("a").join("b").join("editorCode"));

        store.save("int main(void) { return 0; }").unwrap();
        let info = store.info();
        assert_eq!(info.size, 28);
        assert!(info.modified.is_some());
    }

    #[test]
    fn test_file_store_rejects_invalid_utf8() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("editorCode");
        fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();

        let err = FileCodeStore::new(&path).load().unwrap_err();
        assert!(matches!(err, StorageError::InvalidEncoding { .. }));
    }

    #[test]
    fn test_memory_store_shares_slot() {
        let handle = MemoryCodeStore::new();
        let mut store = handle.clone();

        store.save("x = 1").unwrap();
        assert_eq!(handle.contents().as_deref(), Some("x = 1"));

        store.clear().unwrap();
        assert!(handle.contents().is_none());
    }

    #[test]
    fn test_memory_store_unavailable() {
        let mut store = MemoryCodeStore::with_code("kept");
        store.set_available(false);

        assert!(matches!(store.save("lost"), Err(StorageError::Unavailable(_))));
        assert!(store.load().is_err());

        store.set_available(true);
        assert_eq!(store.load().unwrap().as_deref(), Some("kept"));
    }
}
