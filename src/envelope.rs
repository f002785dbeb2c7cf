//! Envelope and coordinate reference system primitives.

use std::hash::Hash;

/// A 2D envelope represented by minimum and maximum coordinates.
///
/// `Envelope` defines a rectangular area in 2D space using the minimum
/// (min_x, min_y) and maximum (max_x, max_y) corners. It is the unit of
/// spatial bookkeeping throughout the crate: the element mapper persists one
/// envelope per stored element and the relational search filter evaluates
/// topological predicates between envelopes.
///
/// # Examples
///
/// ```rust,ignore
/// use geostore::Envelope;
///
/// let envelope = Envelope::new(0.0, 0.0, 100.0, 100.0);
/// assert!(envelope.contains_point(50.0, 50.0));
/// ```
#[derive(Clone, PartialEq, Default, Debug, serde::Deserialize, serde::Serialize)]
pub struct Envelope {
    /// Minimum X coordinate
    pub min_x: f64,
    /// Minimum Y coordinate
    pub min_y: f64,
    /// Maximum X coordinate
    pub max_x: f64,
    /// Maximum Y coordinate
    pub max_y: f64,
}

impl Eq for Envelope {}

impl PartialOrd for Envelope {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Envelope {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.min_x
            .partial_cmp(&other.min_x)
            .unwrap()
            .then(self.min_y.partial_cmp(&other.min_y).unwrap())
            .then(self.max_x.partial_cmp(&other.max_x).unwrap())
            .then(self.max_y.partial_cmp(&other.max_y).unwrap())
    }
}

impl Hash for Envelope {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.min_x.to_bits().hash(state);
        self.min_y.to_bits().hash(state);
        self.max_x.to_bits().hash(state);
        self.max_y.to_bits().hash(state);
    }
}

impl std::fmt::Display for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Envelope({}, {}, {}, {})", self.min_x, self.min_y, self.max_x, self.max_y)
    }
}

impl Envelope {
    /// Creates a new envelope with the specified corners.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Envelope {
        Envelope {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Builds an envelope from a `[min_x, min_y, max_x, max_y]` coordinate array.
    pub fn from_coords(coords: [f64; 4]) -> Envelope {
        Envelope::new(coords[0], coords[1], coords[2], coords[3])
    }

    /// Returns the envelope as a `[min_x, min_y, max_x, max_y]` coordinate array.
    pub fn to_coords(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }

    /// Returns the width of the envelope.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Returns the height of the envelope.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Returns the area of the envelope.
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Returns the center point of the envelope.
    pub fn center(&self) -> (f64, f64) {
        ((self.min_x + self.max_x) / 2.0, (self.min_y + self.max_y) / 2.0)
    }

    /// Checks if this envelope contains a point. Boundary points count.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Checks if this envelope contains another envelope, boundary inclusive.
    pub fn contains(&self, other: &Envelope) -> bool {
        other.min_x >= self.min_x && other.max_x <= self.max_x
            && other.min_y >= self.min_y && other.max_y <= self.max_y
    }

    /// Checks if this envelope intersects another, boundary inclusive:
    /// touching edges or corners count as intersection.
    pub fn intersects(&self, other: &Envelope) -> bool {
        self.min_x <= other.max_x && self.max_x >= other.min_x
            && self.min_y <= other.max_y && self.max_y >= other.min_y
    }

    /// Checks if the open interiors of the two envelopes overlap.
    ///
    /// Unlike [`intersects`](Self::intersects), shared boundaries do not
    /// count: two envelopes meeting along an edge have disjoint interiors.
    pub fn interiors_overlap(&self, other: &Envelope) -> bool {
        self.min_x < other.max_x && self.max_x > other.min_x
            && self.min_y < other.max_y && self.max_y > other.min_y
    }

    /// Checks if the two envelopes touch: they share a boundary point but
    /// their interiors do not overlap.
    pub fn touches(&self, other: &Envelope) -> bool {
        self.intersects(other) && !self.interiors_overlap(other)
    }

    /// Checks if the two envelopes are equal within `epsilon` on every axis.
    pub fn equals_eps(&self, other: &Envelope, epsilon: f64) -> bool {
        (self.min_x - other.min_x).abs() <= epsilon
            && (self.min_y - other.min_y).abs() <= epsilon
            && (self.max_x - other.max_x).abs() <= epsilon
            && (self.max_y - other.max_y).abs() <= epsilon
    }

    /// Returns the union of this envelope with another.
    pub fn union(&self, other: &Envelope) -> Envelope {
        Envelope::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }

    /// Returns the intersection of this envelope with another, if they intersect.
    pub fn intersection(&self, other: &Envelope) -> Option<Envelope> {
        if !self.intersects(other) {
            return None;
        }
        Some(Envelope::new(
            self.min_x.max(other.min_x),
            self.min_y.max(other.min_y),
            self.max_x.min(other.max_x),
            self.max_y.min(other.max_y),
        ))
    }

    /// Checks if this envelope is a point (zero area).
    pub fn is_point(&self) -> bool {
        self.min_x == self.max_x && self.min_y == self.max_y
    }

    /// Checks if this envelope is valid (min <= max).
    pub fn is_valid(&self) -> bool {
        self.min_x <= self.max_x && self.min_y <= self.max_y
    }
}

/// Identity of a coordinate reference system.
///
/// CRS comparison in this crate is metadata equality only: two systems are
/// the same if and only if their identifiers are equal. No axis-order or
/// datum analysis is performed.
#[derive(Clone, PartialEq, Eq, Hash, Debug, serde::Deserialize, serde::Serialize)]
pub struct Crs {
    code: String,
}

impl Crs {
    /// Creates a CRS identity from an identifier such as `"EPSG:4326"`.
    pub fn new(code: impl Into<String>) -> Crs {
        Crs { code: code.into() }
    }

    /// Returns the CRS identifier.
    pub fn code(&self) -> &str {
        &self.code
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code)
    }
}

/// A search region: a query envelope together with the CRS it is expressed in.
///
/// The relational search filter rejects regions whose CRS differs from the
/// tree's CRS before touching the index.
#[derive(Clone, PartialEq, Debug)]
pub struct Region {
    envelope: Envelope,
    crs: Crs,
}

impl Region {
    /// Creates a search region.
    pub fn new(envelope: Envelope, crs: Crs) -> Region {
        Region { envelope, crs }
    }

    /// Returns the query envelope.
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// Returns the CRS the envelope is expressed in.
    pub fn crs(&self) -> &Crs {
        &self.crs
    }
}
