//! Relational search: exact topological refinement of bounding-box results.
//!
//! Queries run in two phases, the same way the spatial indexes in this
//! family of stores do:
//! 1. **Tree scan**: the coarse bounding-box search of the [`Tree`]
//!    produces candidate identifiers, with false positives for every
//!    predicate stricter than plain intersection.
//! 2. **Envelope refinement**: each candidate's stored envelope is fetched
//!    through the element mapper and the exact predicate is evaluated with
//!    interval algebra.
//!
//! The filter holds no state across calls and is safe to invoke from
//! multiple threads as long as the tree and its mapper are.

use crate::envelope::{Envelope, Region};
use crate::error::{StoreError, StoreResult};
use crate::tree::Tree;

/// Epsilon tolerance for the `Equals` predicate, per axis.
pub const EQUALITY_EPSILON: f64 = 1e-9;

/// Topological relation between a stored envelope and the query envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpatialPredicate {
    /// Envelopes share any point. The tree's bounding-box answer is exact.
    Intersects,
    /// Alias of [`Intersects`](Self::Intersects) for bounding-box queries.
    Bbox,
    /// The stored envelope contains the query envelope, boundary inclusive.
    Contains,
    /// The stored envelope lies within the query envelope, boundary inclusive.
    Within,
    /// Envelopes share a boundary but their interiors do not overlap.
    Touches,
    /// Envelopes are equal within [`EQUALITY_EPSILON`] on every axis.
    Equals,
    /// Envelopes intersect but neither contains the other.
    Overlaps,
    /// Envelopes share no point at all.
    Disjoint,
}

impl std::fmt::Display for SpatialPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SpatialPredicate::Intersects => "intersects",
            SpatialPredicate::Bbox => "bbox",
            SpatialPredicate::Contains => "contains",
            SpatialPredicate::Within => "within",
            SpatialPredicate::Touches => "touches",
            SpatialPredicate::Equals => "equals",
            SpatialPredicate::Overlaps => "overlaps",
            SpatialPredicate::Disjoint => "disjoint",
        };
        write!(f, "{}", name)
    }
}

/// Searches `tree` for the identifiers whose stored envelopes satisfy
/// `predicate` against `region`.
///
/// The region's CRS must be metadata-equal to the tree's CRS. For
/// `Intersects`/`Bbox` the tree's own answer is returned unrefined. For
/// `Disjoint` the candidates are the **entire tree** (a bounding-box query
/// would exclude exactly the identifiers that satisfy the predicate); an
/// empty tree yields an empty result. Every other predicate refines the
/// bounding-box candidate set.
pub fn search<E>(
    tree: &dyn Tree<E>,
    region: &Region,
    predicate: SpatialPredicate,
) -> StoreResult<Vec<u32>> {
    if region.crs() != tree.crs() {
        return Err(StoreError::CrsMismatch);
    }
    let query = region.envelope();
    if !query.is_valid() {
        return Err(StoreError::InvalidArgument(
            "search envelope has min > max".into(),
        ));
    }

    if matches!(
        predicate,
        SpatialPredicate::Intersects | SpatialPredicate::Bbox
    ) {
        return tree.search_id(query);
    }

    let candidates = if predicate == SpatialPredicate::Disjoint {
        match tree.extent() {
            Ok(extent) => tree.search(&extent)?,
            Err(StoreError::EmptyStore) => return Ok(Vec::new()),
            Err(err) => return Err(err),
        }
    } else {
        tree.search(query)?
    };

    let mapper = tree.element_mapper();
    let mut matches = Vec::with_capacity(100);
    for id in candidates {
        let value = mapper.object_from_tree_identifier(id)?;
        let stored = mapper.envelope_of(&value)?;
        if evaluate(predicate, &stored, query) {
            matches.push(id);
        }
    }
    Ok(matches)
}

fn evaluate(predicate: SpatialPredicate, stored: &Envelope, query: &Envelope) -> bool {
    match predicate {
        SpatialPredicate::Intersects | SpatialPredicate::Bbox => stored.intersects(query),
        SpatialPredicate::Contains => stored.contains(query),
        SpatialPredicate::Within => query.contains(stored),
        SpatialPredicate::Touches => stored.touches(query),
        SpatialPredicate::Equals => stored.equals_eps(query, EQUALITY_EPSILON),
        SpatialPredicate::Overlaps => {
            stored.intersects(query) && !stored.contains(query) && !query.contains(stored)
        }
        SpatialPredicate::Disjoint => !stored.intersects(query),
    }
}
