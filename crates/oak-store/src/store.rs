//! Extent-level file I/O.

use log::debug;
use oak_common::{ExtentId, OakError, Result, StorageConfig};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Extent-addressed storage over a single file.
///
/// The file is a dense sequence of equally sized extents. Extent 0 holds
/// the storage configuration and is written once at create time; extents
/// 1.. are handed out by `reserve` and addressed by random `read`/`write`.
///
/// All methods take `&self`; the file handle and extent count live behind
/// a mutex so a single store can back concurrent callers.
pub struct ExtentStore {
    /// Mutable state: file handle (None after close) and extent count.
    inner: Mutex<StoreInner>,
    /// Persisted configuration read from or written to extent 0.
    config: StorageConfig,
    /// Extent size in bytes, derived from the configuration.
    extent_size: usize,
}

struct StoreInner {
    file: Option<File>,
    num_extents: u64,
}

impl std::fmt::Debug for ExtentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtentStore")
            .field("config", &self.config)
            .field("extent_size", &self.extent_size)
            .finish()
    }
}

impl ExtentStore {
    /// Creates a new storage file at `path` and writes the header extent.
    ///
    /// Fails with `PathAlreadyExists` when the path exists and `overwrite`
    /// is false, and with `InvalidPath` when the file cannot be created.
    /// The new store holds exactly one extent (the header).
    pub fn create<P: AsRef<Path>>(
        path: P,
        config: StorageConfig,
        overwrite: bool,
    ) -> Result<Self> {
        config.validate()?;

        let path = path.as_ref();
        if !overwrite && path.exists() {
            return Err(OakError::PathAlreadyExists(path.display().to_string()));
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| OakError::InvalidPath(format!("{}: {}", path.display(), e)))?;

        let extent_size = config.extent_size();
        let mut header = vec![0u8; extent_size];
        header[..StorageConfig::ENCODED_SIZE].copy_from_slice(&config.to_bytes());
        file.write_all(&header)?;
        file.sync_all()?;

        debug!(
            "created extent store at {} ({} KiB extents)",
            path.display(),
            config.extent_size_kb
        );

        Ok(Self {
            inner: Mutex::new(StoreInner {
                file: Some(file),
                num_extents: 1,
            }),
            config,
            extent_size,
        })
    }

    /// Opens an existing storage file and validates its header extent.
    ///
    /// The extent count is derived from the file length.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| OakError::InvalidPath(format!("{}: {}", path.display(), e)))?;

        let mut header = [0u8; StorageConfig::ENCODED_SIZE];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut header).map_err(|_| OakError::CorruptedPage {
            extent_id: 0,
            reason: "header extent too short".to_string(),
        })?;
        let config = StorageConfig::from_bytes(&header)?;

        let extent_size = config.extent_size();
        let num_extents = file.metadata()?.len() / extent_size as u64;

        Ok(Self {
            inner: Mutex::new(StoreInner {
                file: Some(file),
                num_extents,
            }),
            config,
            extent_size,
        })
    }

    /// Flushes and releases the OS file handle.
    ///
    /// Every later operation fails with `NotOpen`.
    pub fn close(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        match inner.file.take() {
            Some(file) => {
                file.sync_all()?;
                Ok(())
            }
            None => Err(OakError::NotOpen),
        }
    }

    /// Returns true while the backing file is open.
    pub fn is_open(&self) -> bool {
        self.inner.lock().file.is_some()
    }

    /// Extends the file by `n` zeroed extents.
    ///
    /// Returns the id of the first new extent, which is always the extent
    /// count before the call. `reserve(0)` is a no-op returning the
    /// current count.
    pub fn reserve(&self, n: u64) -> Result<ExtentId> {
        let mut inner = self.inner.lock();
        let file = inner.file.as_ref().ok_or(OakError::NotOpen)?;

        let first = inner.num_extents;
        if n > 0 {
            let new_len = (first + n)
                .checked_mul(self.extent_size as u64)
                .ok_or_else(|| {
                    OakError::CriticalStorage("extent reservation overflows file size".to_string())
                })?;
            file.set_len(new_len)?;
            inner.num_extents = first + n;
        }
        Ok(ExtentId(first))
    }

    /// Reads one extent into `buf`.
    ///
    /// `buf` must be exactly one extent long, and `extent_id` must lie in
    /// `[1, size())`.
    pub fn read(&self, buf: &mut [u8], extent_id: ExtentId) -> Result<()> {
        let mut inner = self.inner.lock();
        let num_extents = inner.num_extents;
        let file = inner.file.as_mut().ok_or(OakError::NotOpen)?;

        Self::check_bounds(extent_id, num_extents)?;
        if buf.len() != self.extent_size {
            return Err(OakError::OutOfBoundsRead {
                extent_id: extent_id.0,
                reason: format!(
                    "buffer is {} bytes, extent is {}",
                    buf.len(),
                    self.extent_size
                ),
            });
        }

        file.seek(SeekFrom::Start(extent_id.0 * self.extent_size as u64))?;
        file.read_exact(buf).map_err(|e| OakError::OutOfBoundsRead {
            extent_id: extent_id.0,
            reason: e.to_string(),
        })
    }

    /// Writes one extent from `buf`.
    ///
    /// Same bounds rules as `read`.
    pub fn write(&self, buf: &[u8], extent_id: ExtentId) -> Result<()> {
        let mut inner = self.inner.lock();
        let num_extents = inner.num_extents;
        let file = inner.file.as_mut().ok_or(OakError::NotOpen)?;

        Self::check_bounds(extent_id, num_extents)?;
        if buf.len() != self.extent_size {
            return Err(OakError::OutOfBoundsWrite {
                extent_id: extent_id.0,
                reason: format!(
                    "buffer is {} bytes, extent is {}",
                    buf.len(),
                    self.extent_size
                ),
            });
        }

        file.seek(SeekFrom::Start(extent_id.0 * self.extent_size as u64))?;
        file.write_all(buf).map_err(|e| OakError::OutOfBoundsWrite {
            extent_id: extent_id.0,
            reason: e.to_string(),
        })
    }

    /// Returns the number of extents in the file, header included.
    pub fn size(&self) -> u64 {
        self.inner.lock().num_extents
    }

    /// Returns the persisted configuration.
    pub fn config(&self) -> StorageConfig {
        self.config
    }

    /// Returns the extent size in bytes.
    pub fn extent_size(&self) -> usize {
        self.extent_size
    }

    /// Flushes pending writes to disk.
    pub fn sync(&self) -> Result<()> {
        let inner = self.inner.lock();
        let file = inner.file.as_ref().ok_or(OakError::NotOpen)?;
        file.sync_all()?;
        Ok(())
    }

    fn check_bounds(extent_id: ExtentId, num_extents: u64) -> Result<()> {
        if extent_id.0 == 0 || extent_id.0 >= num_extents {
            return Err(OakError::OutOfBoundsExtent {
                extent_id: extent_id.0,
                size: num_extents,
            });
        }
        Ok(())
    }
}

impl Drop for ExtentStore {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
