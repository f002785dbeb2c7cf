//! Element mapper: domain objects to and from tree identifiers.
//!
//! The mapper persists each element as one fixed-width record and hands the
//! owning tree a small integer handle in exchange. Lookup by identifier is a
//! single window access; lookup by object is an explicit O(n) scan over the
//! committed records, which is acceptable because reverse lookup only
//! happens on removal paths while the tree itself is the fast path for
//! spatial queries.

use std::marker::PhantomData;
use std::path::Path;

use log::debug;
use parking_lot::Mutex;

use crate::envelope::Envelope;
use crate::error::{StoreError, StoreResult};
use crate::store::{
    FileDevice, FixedRecordStore, MappedDevice, RecordDevice, DEFAULT_BUFFER_LEN,
};

/// Fixed-width serialization capability for one element type.
///
/// The store treats records as opaque byte blobs; a codec supplies the
/// record width, the encoding in and out of a record slice, the equality
/// used by the reverse scan, and the envelope accessor used by the
/// relational search filter.
pub trait ElementCodec<E>: Send + Sync {
    /// The fixed record width in bytes. Must be constant for the lifetime
    /// of the store.
    fn encoded_size(&self) -> u32;

    /// Encodes `value` into `record`, which is exactly
    /// [`encoded_size`](Self::encoded_size) bytes.
    fn encode(&self, value: &E, record: &mut [u8]) -> StoreResult<()>;

    /// Decodes an element from `record`.
    fn decode(&self, record: &[u8]) -> StoreResult<E>;

    /// Equality used by the reverse identifier scan.
    fn equals(&self, left: &E, right: &E) -> bool;

    /// The envelope of `value`, used for exact predicate refinement.
    fn envelope(&self, value: &E) -> Envelope;
}

/// Maps domain objects to and from 1-based tree identifiers.
pub trait ElementMapper<E>: Send + Sync {
    /// Stores `value` under `id`.
    ///
    /// Identifiers must be assigned in append order (each `id` either
    /// overwrites a committed record or is the next unused identifier); a
    /// gap fails fast with [`StoreError::InvalidArgument`].
    fn set_tree_identifier(&self, value: &E, id: u32) -> StoreResult<()>;

    /// Finds the identifier of `value` by a **linear O(n) scan** over all
    /// committed records, returning the first match.
    ///
    /// Fails with [`StoreError::EmptyStore`] when nothing has been stored
    /// and [`StoreError::ElementNotFound`] when no record matches.
    fn tree_identifier(&self, value: &E) -> StoreResult<u32>;

    /// Reads the element stored under `id`.
    ///
    /// There is no bounds check against the logical end: an identifier past
    /// the high-water mark decodes whatever bytes are physically present.
    fn object_from_tree_identifier(&self, id: u32) -> StoreResult<E>;

    /// The envelope of `value`, as the codec computes it.
    fn envelope_of(&self, value: &E) -> StoreResult<Envelope>;

    /// Logically erases all records without truncating the device.
    fn clear(&self) -> StoreResult<()>;

    /// Persists the buffer window and the header.
    fn flush(&self) -> StoreResult<()>;

    /// Flushes and closes the mapper; subsequent operations fail with
    /// [`StoreError::Closed`].
    fn close(&self) -> StoreResult<()>;

    /// True once [`close`](Self::close) has completed.
    fn is_closed(&self) -> bool;
}

struct MapperState<D: RecordDevice> {
    store: FixedRecordStore<D>,
    closed: bool,
}

/// File-backed element mapper over a [`FixedRecordStore`].
///
/// Every public operation is serialized through a single per-instance
/// mutex: the buffer window and device position are shared mutable state
/// that must never be observed by two threads at once, so even reads take
/// the lock. The mapper exclusively owns its device for its lifetime.
pub struct StoredElementMapper<E, C, D>
where
    C: ElementCodec<E>,
    D: RecordDevice,
{
    codec: C,
    state: Mutex<MapperState<D>>,
    _element: PhantomData<fn() -> E>,
}

impl<E, C> StoredElementMapper<E, C, FileDevice>
where
    C: ElementCodec<E>,
{
    /// Creates a new mapper on a fresh file, truncating any existing file.
    pub fn create(path: impl AsRef<Path>, codec: C) -> StoreResult<Self> {
        let device = FileDevice::create(path)?;
        Self::create_on(device, codec, DEFAULT_BUFFER_LEN)
    }

    /// Opens a mapper on an existing file; a missing or short file becomes
    /// a new store.
    pub fn open(path: impl AsRef<Path>, codec: C) -> StoreResult<Self> {
        let device = FileDevice::open(path)?;
        Self::open_on(device, codec, DEFAULT_BUFFER_LEN)
    }
}

impl<E, C> StoredElementMapper<E, C, MappedDevice>
where
    C: ElementCodec<E>,
{
    /// Creates a new mapper on a fresh memory-mapped file.
    pub fn create_mapped(path: impl AsRef<Path>, codec: C) -> StoreResult<Self> {
        let device = MappedDevice::create(path)?;
        Self::create_on(device, codec, DEFAULT_BUFFER_LEN)
    }

    /// Opens a mapper on an existing memory-mapped file.
    pub fn open_mapped(path: impl AsRef<Path>, codec: C) -> StoreResult<Self> {
        let device = MappedDevice::open(path)?;
        Self::open_on(device, codec, DEFAULT_BUFFER_LEN)
    }
}

impl<E, C, D> StoredElementMapper<E, C, D>
where
    C: ElementCodec<E>,
    D: RecordDevice,
{
    /// Creates a new mapper on `device` with an explicit buffer length.
    pub fn create_on(device: D, codec: C, buffer_len: usize) -> StoreResult<Self> {
        let store = FixedRecordStore::create(device, codec.encoded_size(), buffer_len)?;
        Ok(Self::from_store(store, codec))
    }

    /// Opens a mapper on `device` with an explicit buffer length.
    pub fn open_on(device: D, codec: C, buffer_len: usize) -> StoreResult<Self> {
        let store = FixedRecordStore::open(device, codec.encoded_size(), buffer_len)?;
        Ok(Self::from_store(store, codec))
    }

    fn from_store(store: FixedRecordStore<D>, codec: C) -> Self {
        StoredElementMapper {
            codec,
            state: Mutex::new(MapperState {
                store,
                closed: false,
            }),
            _element: PhantomData,
        }
    }

    /// Number of committed records.
    pub fn count(&self) -> StoreResult<u64> {
        let state = self.state.lock();
        if state.closed {
            return Err(StoreError::Closed);
        }
        Ok(state.store.record_count())
    }
}

impl<E, C, D> ElementMapper<E> for StoredElementMapper<E, C, D>
where
    C: ElementCodec<E>,
    D: RecordDevice,
{
    fn set_tree_identifier(&self, value: &E, id: u32) -> StoreResult<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(StoreError::Closed);
        }
        let record = state.store.record_mut(id)?;
        self.codec.encode(value, record)
    }

    fn tree_identifier(&self, value: &E) -> StoreResult<u32> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(StoreError::Closed);
        }
        let count = state.store.record_count();
        if count == 0 {
            return Err(StoreError::EmptyStore);
        }
        for id in 1..=count as u32 {
            let candidate = {
                let record = state.store.record(id)?;
                self.codec.decode(record)?
            };
            if self.codec.equals(value, &candidate) {
                return Ok(id);
            }
        }
        Err(StoreError::ElementNotFound)
    }

    fn object_from_tree_identifier(&self, id: u32) -> StoreResult<E> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(StoreError::Closed);
        }
        let record = state.store.record(id)?;
        self.codec.decode(record)
    }

    fn envelope_of(&self, value: &E) -> StoreResult<Envelope> {
        Ok(self.codec.envelope(value))
    }

    fn clear(&self) -> StoreResult<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(StoreError::Closed);
        }
        state.store.clear()
    }

    fn flush(&self) -> StoreResult<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(StoreError::Closed);
        }
        state.store.flush()
    }

    fn close(&self) -> StoreResult<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Ok(());
        }
        state.store.flush()?;
        state.closed = true;
        debug!("element mapper closed");
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::envelope::Envelope;
    use tempfile::tempdir;

    /// A surveyed plot: a tag plus its envelope, stored as a 36-byte record
    /// (one little-endian u32 and four little-endian f64 coordinates).
    #[derive(Debug, Clone, PartialEq)]
    pub(crate) struct Plot {
        pub tag: u32,
        pub envelope: Envelope,
    }

    impl Plot {
        pub fn new(tag: u32, envelope: Envelope) -> Plot {
            Plot { tag, envelope }
        }
    }

    pub(crate) struct PlotCodec;

    impl ElementCodec<Plot> for PlotCodec {
        fn encoded_size(&self) -> u32 {
            4 + 4 * 8
        }

        fn encode(&self, value: &Plot, record: &mut [u8]) -> StoreResult<()> {
            record[0..4].copy_from_slice(&value.tag.to_le_bytes());
            for (i, coord) in value.envelope.to_coords().iter().enumerate() {
                let start = 4 + i * 8;
                record[start..start + 8].copy_from_slice(&coord.to_le_bytes());
            }
            Ok(())
        }

        fn decode(&self, record: &[u8]) -> StoreResult<Plot> {
            let tag = u32::from_le_bytes(record[0..4].try_into().unwrap());
            let mut coords = [0f64; 4];
            for (i, coord) in coords.iter_mut().enumerate() {
                let start = 4 + i * 8;
                *coord = f64::from_le_bytes(record[start..start + 8].try_into().unwrap());
            }
            Ok(Plot::new(tag, Envelope::from_coords(coords)))
        }

        fn equals(&self, left: &Plot, right: &Plot) -> bool {
            left == right
        }

        fn envelope(&self, value: &Plot) -> Envelope {
            value.envelope.clone()
        }
    }

    fn plot(tag: u32) -> Plot {
        let base = tag as f64;
        Plot::new(tag, Envelope::new(base, base, base + 1.0, base + 1.0))
    }

    #[test]
    fn test_round_trip() {
        let dir = tempdir().unwrap();
        let mapper =
            StoredElementMapper::create(dir.path().join("plots.bin"), PlotCodec).unwrap();

        for id in 1..=10u32 {
            mapper.set_tree_identifier(&plot(id * 100), id).unwrap();
        }
        for id in 1..=10u32 {
            let read = mapper.object_from_tree_identifier(id).unwrap();
            assert_eq!(read, plot(id * 100));
        }
    }

    #[test]
    fn test_reverse_lookup() {
        let dir = tempdir().unwrap();
        let mapper =
            StoredElementMapper::create(dir.path().join("plots.bin"), PlotCodec).unwrap();

        for id in 1..=20u32 {
            mapper.set_tree_identifier(&plot(id), id).unwrap();
        }
        for id in 1..=20u32 {
            let value = mapper.object_from_tree_identifier(id).unwrap();
            assert_eq!(mapper.tree_identifier(&value).unwrap(), id);
        }
    }

    #[test]
    fn test_reverse_lookup_failures() {
        let dir = tempdir().unwrap();
        let mapper =
            StoredElementMapper::create(dir.path().join("plots.bin"), PlotCodec).unwrap();

        assert!(matches!(
            mapper.tree_identifier(&plot(1)),
            Err(StoreError::EmptyStore)
        ));

        mapper.set_tree_identifier(&plot(1), 1).unwrap();
        assert!(matches!(
            mapper.tree_identifier(&plot(99)),
            Err(StoreError::ElementNotFound)
        ));
    }

    #[test]
    fn test_reopen_preserves_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plots.bin");
        {
            let mapper = StoredElementMapper::create(&path, PlotCodec).unwrap();
            for id in 1..=7u32 {
                mapper.set_tree_identifier(&plot(id), id).unwrap();
            }
            mapper.close().unwrap();
            assert!(mapper.is_closed());
        }

        let mapper = StoredElementMapper::open(&path, PlotCodec).unwrap();
        assert_eq!(mapper.count().unwrap(), 7);
        assert_eq!(mapper.object_from_tree_identifier(3).unwrap(), plot(3));
    }

    #[test]
    fn test_mapped_device_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plots.bin");
        {
            let mapper = StoredElementMapper::create_mapped(&path, PlotCodec).unwrap();
            for id in 1..=5u32 {
                mapper.set_tree_identifier(&plot(id), id).unwrap();
            }
            mapper.close().unwrap();
        }

        let mapper = StoredElementMapper::open_mapped(&path, PlotCodec).unwrap();
        assert_eq!(mapper.count().unwrap(), 5);
        assert_eq!(mapper.tree_identifier(&plot(4)).unwrap(), 4);
    }

    #[test]
    fn test_clear_then_reuse_identifier_one() {
        let dir = tempdir().unwrap();
        let mapper =
            StoredElementMapper::create(dir.path().join("plots.bin"), PlotCodec).unwrap();

        mapper.set_tree_identifier(&plot(1), 1).unwrap();
        mapper.set_tree_identifier(&plot(2), 2).unwrap();
        mapper.clear().unwrap();
        mapper.clear().unwrap();
        assert_eq!(mapper.count().unwrap(), 0);

        mapper.set_tree_identifier(&plot(9), 1).unwrap();
        assert_eq!(mapper.object_from_tree_identifier(1).unwrap(), plot(9));
        assert_eq!(mapper.count().unwrap(), 1);
    }

    #[test]
    fn test_closed_mapper_rejects_operations() {
        let dir = tempdir().unwrap();
        let mapper =
            StoredElementMapper::create(dir.path().join("plots.bin"), PlotCodec).unwrap();

        mapper.close().unwrap();
        // Closing twice is a no-op.
        mapper.close().unwrap();

        assert!(matches!(
            mapper.set_tree_identifier(&plot(1), 1),
            Err(StoreError::Closed)
        ));
        assert!(matches!(
            mapper.object_from_tree_identifier(1),
            Err(StoreError::Closed)
        ));
        assert!(matches!(mapper.flush(), Err(StoreError::Closed)));
        assert!(matches!(mapper.clear(), Err(StoreError::Closed)));
    }

    #[test]
    fn test_identifier_gap_rejected() {
        let dir = tempdir().unwrap();
        let mapper =
            StoredElementMapper::create(dir.path().join("plots.bin"), PlotCodec).unwrap();

        mapper.set_tree_identifier(&plot(1), 1).unwrap();
        assert!(matches!(
            mapper.set_tree_identifier(&plot(3), 3),
            Err(StoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_shared_across_threads() {
        let dir = tempdir().unwrap();
        let mapper = std::sync::Arc::new(
            StoredElementMapper::create(dir.path().join("plots.bin"), PlotCodec).unwrap(),
        );
        for id in 1..=50u32 {
            mapper.set_tree_identifier(&plot(id), id).unwrap();
        }

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let mapper = mapper.clone();
                std::thread::spawn(move || {
                    for id in 1..=50u32 {
                        assert_eq!(mapper.object_from_tree_identifier(id).unwrap(), plot(id));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
