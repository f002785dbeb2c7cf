//! Fixed-width record store over a random-access byte device.
//!
//! Records are opaque blobs of exactly `object_size` bytes addressed by a
//! 1-based tree identifier; the record for identifier `i` lives at
//! `BEGIN_POSITION + (i - 1) * object_size`. All I/O goes through a sliding
//! in-memory buffer window whose base offset is always aligned to a multiple
//! of the window length measured from `BEGIN_POSITION`, so no record ever
//! straddles a window boundary.

use log::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::store::device::RecordDevice;
use crate::store::header::{StoreByteOrder, StoreHeader, BEGIN_POSITION, HEADER_LEN};

/// Default buffer window length in bytes, before normalization to a multiple
/// of the record width.
pub const DEFAULT_BUFFER_LEN: usize = 4096;

/// A store of fixed-width binary records with a sliding buffer window.
///
/// Single-writer, single-reader-at-a-time: the store assumes exclusive
/// ownership of its device for its entire lifetime. Partial writes are
/// crash-unsafe; durability is only guaranteed after [`flush`](Self::flush).
pub struct FixedRecordStore<D: RecordDevice> {
    device: D,
    byte_order: StoreByteOrder,
    object_size: u32,
    /// The window: a contiguous mirror of the device starting at `buffer_base`.
    buffer: Vec<u8>,
    /// Absolute device offset of the first window byte. Always
    /// `BEGIN_POSITION + k * buffer.len()`.
    buffer_base: u64,
    /// Offset of the current record within the window.
    cursor: usize,
    /// Dirty high-water mark within the window. The window is flushed as
    /// `buffer[..write_limit]`; it only ever grows between flushes so
    /// interleaved writes at different offsets inside one window survive.
    write_limit: usize,
    dirty: bool,
    /// Absolute offset one past the last committed record.
    max_position: u64,
}

impl<D: RecordDevice> FixedRecordStore<D> {
    /// Creates a new store on `device`, writing a fresh header.
    ///
    /// `buffer_len` is normalized down to the nearest multiple of
    /// `object_size`; a value shorter than one record degenerates to a
    /// single-record window.
    pub fn create(mut device: D, object_size: u32, buffer_len: usize) -> StoreResult<Self> {
        if object_size == 0 {
            return Err(StoreError::InvalidArgument(
                "record width must be positive".into(),
            ));
        }
        let header = StoreHeader::new(object_size);
        device.write_at(0, &header.encode())?;
        debug!("created record store ({} byte records)", object_size);

        Ok(FixedRecordStore {
            device,
            byte_order: header.byte_order,
            object_size,
            buffer: vec![0; Self::normalize_buffer_len(buffer_len, object_size)],
            buffer_base: BEGIN_POSITION,
            cursor: 0,
            write_limit: 0,
            dirty: false,
            max_position: BEGIN_POSITION,
        })
    }

    /// Opens an existing store on `device`.
    ///
    /// A device shorter than the header is treated as a new store. A
    /// full-length header with the wrong magic fails with
    /// [`StoreError::UnrecognizedFormat`]; a persisted record width that
    /// disagrees with `object_size` fails with
    /// [`StoreError::RecordSizeMismatch`].
    pub fn open(mut device: D, object_size: u32, buffer_len: usize) -> StoreResult<Self> {
        if device.len()? < HEADER_LEN as u64 {
            debug!("device shorter than header, initializing new record store");
            return Self::create(device, object_size, buffer_len);
        }

        let mut header_bytes = [0u8; HEADER_LEN];
        device.read_at(0, &mut header_bytes)?;
        let header = StoreHeader::decode(&header_bytes)?;
        if header.object_size != object_size {
            return Err(StoreError::RecordSizeMismatch {
                stored: header.object_size,
                requested: object_size,
            });
        }

        let mut store = FixedRecordStore {
            device,
            byte_order: header.byte_order,
            object_size,
            buffer: vec![0; Self::normalize_buffer_len(buffer_len, object_size)],
            buffer_base: BEGIN_POSITION,
            cursor: 0,
            write_limit: 0,
            dirty: false,
            max_position: header.max_position as u64,
        };
        store.pull_buffer()?;
        debug!(
            "opened record store ({} byte records, {} committed)",
            object_size,
            store.record_count()
        );
        Ok(store)
    }

    fn normalize_buffer_len(buffer_len: usize, object_size: u32) -> usize {
        let records = buffer_len / object_size as usize;
        if records == 0 {
            warn!(
                "buffer of {} bytes shorter than one {} byte record, using a single-record window",
                buffer_len, object_size
            );
            return object_size as usize;
        }
        records * object_size as usize
    }

    /// Fixed record width in bytes.
    pub fn object_size(&self) -> u32 {
        self.object_size
    }

    /// Byte order baked into the header at creation.
    pub fn byte_order(&self) -> StoreByteOrder {
        self.byte_order
    }

    /// Absolute offset one past the last committed record.
    pub fn max_position(&self) -> u64 {
        self.max_position
    }

    /// Number of committed records.
    pub fn record_count(&self) -> u64 {
        (self.max_position - BEGIN_POSITION) / self.object_size as u64
    }

    fn record_offset(&self, id: u32) -> u64 {
        BEGIN_POSITION + (id as u64 - 1) * self.object_size as u64
    }

    /// Writes the dirty region of the window back to the device. The window
    /// content and base stay valid.
    fn push_buffer(&mut self) -> StoreResult<()> {
        if self.dirty && self.write_limit > 0 {
            self.device
                .write_at(self.buffer_base, &self.buffer[..self.write_limit])?;
        }
        self.dirty = false;
        self.write_limit = 0;
        Ok(())
    }

    /// Refills the window from the device at `buffer_base`, zero-filling
    /// past the end of data.
    fn pull_buffer(&mut self) -> StoreResult<()> {
        self.device.read_at(self.buffer_base, &mut self.buffer)?;
        self.dirty = false;
        self.write_limit = 0;
        Ok(())
    }

    /// Positions the window and cursor over the record for `id`, flushing
    /// and reloading the window when the record lies outside it.
    fn adjust(&mut self, id: u32) -> StoreResult<()> {
        if id == 0 {
            return Err(StoreError::InvalidArgument(
                "tree identifiers are 1-based".into(),
            ));
        }
        let offset = self.record_offset(id);
        let record_end = offset + self.object_size as u64;
        let window_end = self.buffer_base + self.buffer.len() as u64;

        if offset < self.buffer_base || record_end > window_end {
            self.push_buffer()?;
            let span = self.buffer.len() as u64;
            self.buffer_base = (offset - BEGIN_POSITION) / span * span + BEGIN_POSITION;
            self.pull_buffer()?;
        }
        self.cursor = (offset - self.buffer_base) as usize;
        Ok(())
    }

    /// Returns the record bytes for `id`.
    ///
    /// There is no bounds check against the high-water mark: reading an
    /// identifier beyond the logical end returns whatever bytes are
    /// physically present (zeros past the end of data), not an error.
    pub fn record(&mut self, id: u32) -> StoreResult<&[u8]> {
        self.adjust(id)?;
        let start = self.cursor;
        Ok(&self.buffer[start..start + self.object_size as usize])
    }

    /// Returns a writable slice for the record of `id`, marking the window
    /// dirty and advancing the high-water mark when `id` appends a record.
    ///
    /// Identifiers must be assigned in append order: `id` may overwrite an
    /// existing record or be the next unused identifier, but a gap fails
    /// fast with [`StoreError::InvalidArgument`] rather than silently
    /// corrupting the high-water mark.
    pub fn record_mut(&mut self, id: u32) -> StoreResult<&mut [u8]> {
        let next = self.record_count() + 1;
        if id as u64 > next {
            return Err(StoreError::InvalidArgument(format!(
                "non-monotonic tree identifier {} (next expected {})",
                id, next
            )));
        }
        self.adjust(id)?;

        let start = self.cursor;
        let end = start + self.object_size as usize;
        self.dirty = true;
        if end > self.write_limit {
            self.write_limit = end;
        }
        let record_end = self.record_offset(id) + self.object_size as u64;
        if record_end > self.max_position {
            self.max_position = record_end;
        }
        Ok(&mut self.buffer[start..end])
    }

    /// Persists the dirty window and the header, then syncs the device.
    pub fn flush(&mut self) -> StoreResult<()> {
        self.push_buffer()?;
        let max_position = u32::try_from(self.max_position).map_err(|_| {
            StoreError::InvalidArgument("store exceeds the 4 GiB addressable range".into())
        })?;
        let header = StoreHeader {
            byte_order: self.byte_order,
            object_size: self.object_size,
            max_position,
        };
        self.device.write_at(0, &header.encode())?;
        self.device.sync()?;
        Ok(())
    }

    /// Logically erases all records: the high-water mark returns to
    /// `BEGIN_POSITION` and the window realigns to the first record, but the
    /// device is not truncated.
    pub fn clear(&mut self) -> StoreResult<()> {
        self.push_buffer()?;
        self.buffer_base = BEGIN_POSITION;
        self.pull_buffer()?;
        self.cursor = 0;
        self.max_position = BEGIN_POSITION;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::device::FileDevice;
    use crate::store::header::STORE_MAGIC;
    use tempfile::tempdir;

    const REC: u32 = 8;

    fn fill(value: u8) -> [u8; REC as usize] {
        [value; REC as usize]
    }

    #[test]
    fn test_create_then_read_back() {
        let dir = tempdir().unwrap();
        let device = FileDevice::create(dir.path().join("store.bin")).unwrap();
        let mut store = FixedRecordStore::create(device, REC, 64).unwrap();

        store.record_mut(1).unwrap().copy_from_slice(&fill(0xAA));
        store.record_mut(2).unwrap().copy_from_slice(&fill(0xBB));

        assert_eq!(store.record(1).unwrap(), &fill(0xAA));
        assert_eq!(store.record(2).unwrap(), &fill(0xBB));
        assert_eq!(store.record_count(), 2);
        assert_eq!(store.max_position(), BEGIN_POSITION + 2 * REC as u64);
    }

    #[test]
    fn test_reopen_stability() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.bin");
        {
            let device = FileDevice::create(&path).unwrap();
            let mut store = FixedRecordStore::create(device, REC, 64).unwrap();
            for id in 1..=5u32 {
                store.record_mut(id).unwrap().copy_from_slice(&fill(id as u8));
            }
            store.flush().unwrap();
        }

        let device = FileDevice::open(&path).unwrap();
        let mut store = FixedRecordStore::open(device, REC, 64).unwrap();
        assert_eq!(store.record_count(), 5);
        assert_eq!(store.max_position(), BEGIN_POSITION + 5 * REC as u64);
        for id in 1..=5u32 {
            assert_eq!(store.record(id).unwrap(), &fill(id as u8));
        }
    }

    #[test]
    fn test_size_mismatch_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.bin");
        {
            let device = FileDevice::create(&path).unwrap();
            let mut store = FixedRecordStore::create(device, REC, 64).unwrap();
            store.flush().unwrap();
        }

        let device = FileDevice::open(&path).unwrap();
        match FixedRecordStore::open(device, REC * 2, 64) {
            Err(StoreError::RecordSizeMismatch { stored, requested }) => {
                assert_eq!(stored, REC);
                assert_eq!(requested, REC * 2);
            }
            other => panic!("expected RecordSizeMismatch, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_bad_magic_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.bin");
        std::fs::write(&path, [0u8; 32]).unwrap();

        let device = FileDevice::open(&path).unwrap();
        match FixedRecordStore::open(device, REC, 64) {
            Err(StoreError::UnrecognizedFormat { found }) => assert_ne!(found, STORE_MAGIC),
            other => panic!("expected UnrecognizedFormat, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_short_file_treated_as_new_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.bin");
        std::fs::write(&path, b"stub").unwrap();

        let device = FileDevice::open(&path).unwrap();
        let store = FixedRecordStore::open(device, REC, 64).unwrap();
        assert_eq!(store.record_count(), 0);
        assert_eq!(store.max_position(), BEGIN_POSITION);
    }

    #[test]
    fn test_buffer_window_transparency() {
        // A 3-record window; ids 1, 4 and 7 land in three different windows.
        let dir = tempdir().unwrap();
        let device = FileDevice::create(dir.path().join("store.bin")).unwrap();
        let mut store = FixedRecordStore::create(device, REC, 3 * REC as usize).unwrap();

        for id in 1..=7u32 {
            store.record_mut(id).unwrap().copy_from_slice(&fill(id as u8));
        }
        for &id in &[1u32, 4, 7, 2, 6, 3, 5] {
            assert_eq!(store.record(id).unwrap(), &fill(id as u8), "record {}", id);
        }
    }

    #[test]
    fn test_interleaved_writes_in_one_window_survive_flush() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.bin");
        let device = FileDevice::create(&path).unwrap();
        let mut store = FixedRecordStore::create(device, REC, 4 * REC as usize).unwrap();

        // Write 1 and 2, jump back to 1, then force a window change via 5.
        store.record_mut(1).unwrap().copy_from_slice(&fill(0x11));
        store.record_mut(2).unwrap().copy_from_slice(&fill(0x22));
        store.record_mut(1).unwrap().copy_from_slice(&fill(0x33));
        store.record_mut(3).unwrap().copy_from_slice(&fill(0x44));
        store.record_mut(4).unwrap().copy_from_slice(&fill(0x55));
        store.record_mut(5).unwrap().copy_from_slice(&fill(0x66));
        store.flush().unwrap();

        let device = FileDevice::open(&path).unwrap();
        let mut store = FixedRecordStore::open(device, REC, 4 * REC as usize).unwrap();
        assert_eq!(store.record(1).unwrap(), &fill(0x33));
        assert_eq!(store.record(2).unwrap(), &fill(0x22));
        assert_eq!(store.record(5).unwrap(), &fill(0x66));
    }

    #[test]
    fn test_degenerate_buffer_normalized_to_one_record() {
        let dir = tempdir().unwrap();
        let device = FileDevice::create(dir.path().join("store.bin")).unwrap();
        let mut store = FixedRecordStore::create(device, REC, 3).unwrap();

        store.record_mut(1).unwrap().copy_from_slice(&fill(0x01));
        store.record_mut(2).unwrap().copy_from_slice(&fill(0x02));
        assert_eq!(store.record(1).unwrap(), &fill(0x01));
        assert_eq!(store.record(2).unwrap(), &fill(0x02));
    }

    #[test]
    fn test_non_monotonic_identifier_fails_fast() {
        let dir = tempdir().unwrap();
        let device = FileDevice::create(dir.path().join("store.bin")).unwrap();
        let mut store = FixedRecordStore::create(device, REC, 64).unwrap();

        store.record_mut(1).unwrap().copy_from_slice(&fill(0x01));
        match store.record_mut(3) {
            Err(StoreError::InvalidArgument(msg)) => assert!(msg.contains("non-monotonic")),
            other => panic!("expected InvalidArgument, got {:?}", other.map(|_| ())),
        }
        // Overwriting a committed record is allowed and keeps the mark.
        store.record_mut(1).unwrap().copy_from_slice(&fill(0x09));
        assert_eq!(store.record_count(), 1);
    }

    #[test]
    fn test_identifier_zero_rejected() {
        let dir = tempdir().unwrap();
        let device = FileDevice::create(dir.path().join("store.bin")).unwrap();
        let mut store = FixedRecordStore::create(device, REC, 64).unwrap();
        assert!(matches!(
            store.record(0),
            Err(StoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_clear_is_idempotent_and_logical() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.bin");
        let device = FileDevice::create(&path).unwrap();
        let mut store = FixedRecordStore::create(device, REC, 64).unwrap();

        store.record_mut(1).unwrap().copy_from_slice(&fill(0x07));
        store.flush().unwrap();
        store.clear().unwrap();
        store.clear().unwrap();
        assert_eq!(store.max_position(), BEGIN_POSITION);
        assert_eq!(store.record_count(), 0);

        // Identifier 1 is reusable after clear.
        store.record_mut(1).unwrap().copy_from_slice(&fill(0x08));
        assert_eq!(store.record(1).unwrap(), &fill(0x08));
        assert_eq!(store.record_count(), 1);

        // The device keeps its length: erasure is logical, not physical.
        store.flush().unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() >= BEGIN_POSITION + REC as u64);
    }

    #[test]
    fn test_read_past_logical_end_is_not_an_error() {
        let dir = tempdir().unwrap();
        let device = FileDevice::create(dir.path().join("store.bin")).unwrap();
        let mut store = FixedRecordStore::create(device, REC, 64).unwrap();

        store.record_mut(1).unwrap().copy_from_slice(&fill(0x01));
        assert_eq!(store.record(2).unwrap(), &fill(0x00));
    }

    #[test]
    fn test_random_overwrites_match_unbuffered_model() {
        use rand::{rngs::StdRng, Rng, SeedableRng};

        let dir = tempdir().unwrap();
        let device = FileDevice::create(dir.path().join("store.bin")).unwrap();
        // A 2-record window forces frequent flush/reload cycles.
        let mut store = FixedRecordStore::create(device, REC, 2 * REC as usize).unwrap();
        let mut rng = StdRng::seed_from_u64(0x5EED);
        let mut model: Vec<[u8; REC as usize]> = Vec::new();

        for _ in 0..500 {
            let id = rng.gen_range(1..=model.len() as u32 + 1);
            let value = fill(rng.gen());
            store.record_mut(id).unwrap().copy_from_slice(&value);
            if id as usize > model.len() {
                model.push(value);
            } else {
                model[id as usize - 1] = value;
            }
        }

        assert_eq!(store.record_count(), model.len() as u64);
        for (i, expected) in model.iter().enumerate() {
            assert_eq!(store.record(i as u32 + 1).unwrap(), expected);
        }
    }

    #[test]
    fn test_create_zero_record_width_rejected() {
        let dir = tempdir().unwrap();
        let device = FileDevice::create(dir.path().join("store.bin")).unwrap();
        assert!(matches!(
            FixedRecordStore::create(device, 0, 64),
            Err(StoreError::InvalidArgument(_))
        ));
    }
}
