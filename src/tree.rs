//! The consumed `Tree` interface and an rstar-backed reference tree.
//!
//! The node-splitting, insertion and balancing algorithms of the spatial
//! index are deliberately outside this crate; the relational search filter
//! consumes a tree only through the [`Tree`] trait. [`RStarTree`] adapts
//! the `rstar` crate's R*-tree into that interface, pairing it with a
//! [`StoredElementMapper`] that persists the elements behind the
//! identifiers.

use parking_lot::Mutex;
use rstar::{RTree, RTreeObject, AABB};

use crate::envelope::{Crs, Envelope};
use crate::error::{StoreError, StoreResult};
use crate::mapper::{ElementCodec, ElementMapper, StoredElementMapper};
use crate::store::RecordDevice;

/// A spatial index consumed through its coarse bounding-box search.
pub trait Tree<E>: Send + Sync {
    /// Exact identifier set for a bounding-box intersection query. For the
    /// `Intersects`/`Bbox` predicates this already is the final answer.
    fn search_id(&self, region: &Envelope) -> StoreResult<Vec<u32>>;

    /// Coarse candidate identifiers whose envelopes intersect `region`.
    /// Candidates may be false positives for stricter predicates.
    fn search(&self, region: &Envelope) -> StoreResult<Vec<u32>>;

    /// The envelope enclosing everything in the tree.
    ///
    /// Fails with [`StoreError::EmptyStore`] when the tree holds nothing.
    fn extent(&self) -> StoreResult<Envelope>;

    /// The coordinate reference system the tree's envelopes are expressed in.
    fn crs(&self) -> &Crs;

    /// The mapper resolving identifiers back to stored elements.
    fn element_mapper(&self) -> &dyn ElementMapper<E>;
}

/// One indexed entry: an identifier and the envelope it was inserted with.
#[derive(Debug, Clone, PartialEq)]
struct IndexedEnvelope {
    id: u32,
    envelope: Envelope,
}

impl RTreeObject for IndexedEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> AABB<[f64; 2]> {
        AABB::from_corners(
            [self.envelope.min_x, self.envelope.min_y],
            [self.envelope.max_x, self.envelope.max_y],
        )
    }
}

fn query_aabb(region: &Envelope) -> AABB<[f64; 2]> {
    AABB::from_corners([region.min_x, region.min_y], [region.max_x, region.max_y])
}

/// An R*-tree over stored elements.
///
/// Inserted elements are assigned tree identifiers in insertion order and
/// persisted through the owned [`StoredElementMapper`]; the in-memory
/// index keeps only identifiers and envelopes.
pub struct RStarTree<E, C, D>
where
    C: ElementCodec<E>,
    D: RecordDevice,
{
    mapper: StoredElementMapper<E, C, D>,
    index: Mutex<RTree<IndexedEnvelope>>,
    crs: Crs,
}

impl<E, C, D> RStarTree<E, C, D>
where
    C: ElementCodec<E>,
    D: RecordDevice,
{
    /// Creates an empty tree over `mapper` with envelopes expressed in `crs`.
    pub fn new(mapper: StoredElementMapper<E, C, D>, crs: Crs) -> Self {
        RStarTree {
            mapper,
            index: Mutex::new(RTree::new()),
            crs,
        }
    }

    /// Inserts `value`, persisting it under the next tree identifier.
    pub fn insert(&self, value: &E) -> StoreResult<u32> {
        let envelope = self.mapper.envelope_of(value)?;
        if !envelope.is_valid() {
            return Err(StoreError::InvalidArgument(
                "element envelope has min > max".into(),
            ));
        }
        let id = self.mapper.count()? as u32 + 1;
        self.mapper.set_tree_identifier(value, id)?;
        self.index.lock().insert(IndexedEnvelope { id, envelope });
        Ok(id)
    }

    /// Number of indexed elements.
    pub fn len(&self) -> usize {
        self.index.lock().size()
    }

    /// True when nothing has been inserted.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The owned element mapper.
    pub fn mapper(&self) -> &StoredElementMapper<E, C, D> {
        &self.mapper
    }
}

impl<E, C, D> Tree<E> for RStarTree<E, C, D>
where
    C: ElementCodec<E>,
    D: RecordDevice,
{
    fn search_id(&self, region: &Envelope) -> StoreResult<Vec<u32>> {
        let index = self.index.lock();
        Ok(index
            .locate_in_envelope_intersecting(&query_aabb(region))
            .map(|entry| entry.id)
            .collect())
    }

    fn search(&self, region: &Envelope) -> StoreResult<Vec<u32>> {
        self.search_id(region)
    }

    fn extent(&self) -> StoreResult<Envelope> {
        let index = self.index.lock();
        let mut entries = index.iter();
        let mut extent = match entries.next() {
            Some(entry) => entry.envelope.clone(),
            None => return Err(StoreError::EmptyStore),
        };
        for entry in entries {
            extent = extent.union(&entry.envelope);
        }
        Ok(extent)
    }

    fn crs(&self) -> &Crs {
        &self.crs
    }

    fn element_mapper(&self) -> &dyn ElementMapper<E> {
        &self.mapper
    }
}
