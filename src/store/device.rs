//! Random-access byte devices backing the fixed-record store.
//!
//! The store itself is written against the [`RecordDevice`] capability
//! (read-at, write-at, length, sync) so that the same buffer-window logic
//! serves both a plain seek-based file and a memory-mapped file. The two
//! adapters here are [`FileDevice`] and [`MappedDevice`].

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use memmap2::MmapMut;

use crate::error::StoreResult;

/// A random-access byte device.
///
/// Reads past the end of the written data zero-fill the remainder of the
/// destination buffer, matching the behavior of a short channel read at end
/// of file. Writes past the end extend the device.
pub trait RecordDevice: Send {
    /// Fills `buf` with the bytes at `offset`, zero-filling past the end of
    /// the device's data.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> StoreResult<()>;

    /// Writes all of `buf` at `offset`, growing the device if needed.
    fn write_at(&mut self, offset: u64, buf: &[u8]) -> StoreResult<()>;

    /// Current length of the device's data in bytes.
    fn len(&self) -> StoreResult<u64>;

    /// True when the device holds no data.
    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Forces buffered bytes to durable storage.
    fn sync(&mut self) -> StoreResult<()>;
}

/// Seek-based file device.
pub struct FileDevice {
    file: File,
}

impl FileDevice {
    /// Creates a new empty device, truncating any existing file at `path`.
    pub fn create(path: impl AsRef<Path>) -> StoreResult<FileDevice> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(FileDevice { file })
    }

    /// Opens an existing device, creating an empty file when `path` does not
    /// exist. An empty or short file is recognized by the store as a new
    /// store rather than rejected.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<FileDevice> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        Ok(FileDevice { file })
    }
}

impl RecordDevice for FileDevice {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> StoreResult<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.file.read(&mut buf[filled..])?;
            if n == 0 {
                // End of file: the rest of the window is zeros.
                buf[filled..].fill(0);
                break;
            }
            filled += n;
        }
        Ok(())
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> StoreResult<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buf)?;
        Ok(())
    }

    fn len(&self) -> StoreResult<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn sync(&mut self) -> StoreResult<()> {
        self.file.sync_all()?;
        Ok(())
    }
}

/// Growth granularity of the memory-mapped device. The backing file is
/// extended in whole chunks so the mapping is rebuilt rarely.
const MAP_CHUNK: u64 = 64 * 1024;

/// Memory-mapped file device.
///
/// The mapping always covers at least one chunk; writes beyond the current
/// capacity grow the backing file to the next chunk boundary and remap.
/// `data_len` tracks the logical end of written data, which may be shorter
/// than the chunk-rounded file length.
pub struct MappedDevice {
    file: File,
    map: MmapMut,
    data_len: u64,
}

impl MappedDevice {
    /// Creates a new empty device, truncating any existing file at `path`.
    pub fn create(path: impl AsRef<Path>) -> StoreResult<MappedDevice> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Self::with_file(file, 0)
    }

    /// Opens an existing device, creating an empty file when `path` does not
    /// exist.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<MappedDevice> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        let data_len = file.metadata()?.len();
        Self::with_file(file, data_len)
    }

    fn with_file(file: File, data_len: u64) -> StoreResult<MappedDevice> {
        if file.metadata()?.len() < MAP_CHUNK {
            file.set_len(MAP_CHUNK)?;
        }
        let map = unsafe { MmapMut::map_mut(&file)? };
        Ok(MappedDevice {
            file,
            map,
            data_len,
        })
    }

    fn ensure_capacity(&mut self, end: u64) -> StoreResult<()> {
        if end as usize <= self.map.len() {
            return Ok(());
        }
        let new_len = end.div_ceil(MAP_CHUNK) * MAP_CHUNK;
        self.map.flush()?;
        self.file.set_len(new_len)?;
        self.map = unsafe { MmapMut::map_mut(&self.file)? };
        Ok(())
    }
}

impl RecordDevice for MappedDevice {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> StoreResult<()> {
        let start = offset.min(self.data_len) as usize;
        let end = (offset + buf.len() as u64).min(self.data_len) as usize;
        let available = end - start;
        buf[..available].copy_from_slice(&self.map[start..end]);
        buf[available..].fill(0);
        Ok(())
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> StoreResult<()> {
        let end = offset + buf.len() as u64;
        self.ensure_capacity(end)?;
        self.map[offset as usize..end as usize].copy_from_slice(buf);
        if end > self.data_len {
            self.data_len = end;
        }
        Ok(())
    }

    fn len(&self) -> StoreResult<u64> {
        Ok(self.data_len)
    }

    fn sync(&mut self) -> StoreResult<()> {
        self.map.flush()?;
        self.file.sync_all()?;
        Ok(())
    }
}
