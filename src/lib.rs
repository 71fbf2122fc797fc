//! # Trackline
//!
//! Live geometric and statistical model of GPS tracks.
//!
//! This library ingests a time-ordered sequence of geolocated, timestamped
//! points and maintains a mutable polyline whose vertices and connecting
//! segments carry derived motion properties, plus running aggregate
//! statistics computed incrementally as the polyline is edited.
//!
//! It provides:
//! - An arena-backed vertex/segment chain with splice-style mutation
//!   primitives (insert, remove, replace-range, range-copy)
//! - Per-node derived properties (distance, bearing, duration, speed,
//!   elevation rate) recomputed from point pairs
//! - Incremental statistics (sum, max/min with location, median, standard
//!   deviation) that can be fed segments one at a time or in bulk
//! - Timestamp-indexed segmentation queries (before/after/between, split,
//!   clip)
//!
//! ## Quick Start
//!
//! ```rust
//! use trackline::{Polyline, TrackPoint, TrackStats};
//!
//! let mut track = Polyline::new();
//! track.append(TrackPoint::new(51.5074, -0.1278).with_time("2024-01-01T10:00:00Z"));
//! track.append(TrackPoint::new(51.5080, -0.1290).with_time("2024-01-01T10:00:30Z"));
//! track.append(TrackPoint::new(51.5090, -0.1300).with_time("2024-01-01T10:01:00Z"));
//!
//! let stats = TrackStats::of(&track);
//! assert!(stats.length() > 0.0);
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, Result, TracklineError};

// Geographic utilities (distance, bearing, compass, interval duration)
pub mod geo_utils;
pub use geo_utils::{CompassDirection, Rfc3339Time, TimeProvider};

// Arena-backed polyline structure and derived-property propagation
pub mod polyline;
pub use polyline::{
    ElevationKey, ElevationRequest, EnrichmentEvent, EnrichmentReport, Polyline, SegmentId,
    VertexId,
};

// Incremental statistics primitives and composites
pub mod stats;
pub use stats::{
    HeightRateStats, MaxMin, Median, ScalarStats, SpeedStats, StdDev, Sum, TimeStats, TrackStats,
};

// Timestamp-indexed segmentation and split queries
pub mod segmentation;
pub use segmentation::{
    segment_after_time, segment_before_time, segment_between_times, segments_split_by_times,
    split_by_segments, split_by_times, split_to_segment, SegmentPartition, TrackSlice,
};

// ============================================================================
// Core Types
// ============================================================================

/// A geolocated, optionally timestamped track point.
///
/// `altitude` is the GPS-reported value; `elevation` is a separately sourced
/// terrain sample applied by the enrichment pass. Height computations prefer
/// `elevation` and fall back to `altitude`.
///
/// # Example
/// ```
/// use trackline::TrackPoint;
/// let point = TrackPoint::new(51.5074, -0.1278); // London
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    /// GPS-reported altitude in meters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    /// Terrain elevation in meters, sourced by the enrichment pass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation: Option<f64>,
    /// Opaque timestamp; lexical order is temporal order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    /// Derived path properties, absent until the propagation pass runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathProperties>,
}

impl TrackPoint {
    /// Create a new track point with no altitude or timestamp.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: None,
            elevation: None,
            time: None,
            path: None,
        }
    }

    /// Attach a GPS altitude in meters.
    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    /// Attach an opaque timestamp.
    pub fn with_time(mut self, time: impl Into<String>) -> Self {
        self.time = Some(time.into());
        self
    }

    /// Build a point from the interchange coordinate order `(lng, lat, alt)`.
    pub fn from_coordinate(coord: (f64, f64, Option<f64>)) -> Self {
        let (longitude, latitude, altitude) = coord;
        Self {
            latitude,
            longitude,
            altitude,
            elevation: None,
            time: None,
            path: None,
        }
    }

    /// Convert to the interchange coordinate order `(lng, lat, alt)`.
    pub fn to_coordinate(&self) -> (f64, f64, Option<f64>) {
        (self.longitude, self.latitude, self.altitude)
    }

    /// The elevation used for height computations: the enriched terrain
    /// sample when present, otherwise the GPS altitude.
    pub fn effective_elevation(&self) -> Option<f64> {
        self.elevation.or(self.altitude)
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// Derived per-vertex path properties, computed from the adjacent segments.
///
/// Absence is first-class: an endpoint has no turn angle, and a vertex with
/// no adjacent segments at all has no `PathProperties`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PathProperties {
    /// Turn angle about the vertex in radians, `(-PI, PI]`; absent at endpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn: Option<f64>,
    /// Angular turn rate in radians per second
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_rate: Option<f64>,
    /// Average of the adjacent segment speeds, meters per second
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_speed: Option<f64>,
    /// Ascent rate in meters per second; non-negative magnitude
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ascent_rate: Option<f64>,
    /// Descent rate in meters per second; non-negative magnitude
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descent_rate: Option<f64>,
}

/// Derived properties of the edge between two consecutive vertices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentProperties {
    /// Length in meters, >= 0
    pub length: f64,
    /// Bearing in signed radians, `(-PI, PI]`
    pub angle: f64,
    /// Compass quadrant of the displacement
    pub direction: CompassDirection,
    /// Duration in seconds, >= 0; absent when either endpoint timestamp is
    /// missing or not interpretable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Speed in meters per second; infinite for zero duration over non-zero
    /// length
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    /// Elevation delta in meters, end minus start
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    /// Signed elevation rate in meters per second; infinite (signed) for
    /// zero duration over non-zero height
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height_rate: Option<f64>,
}

/// Bounding box for a track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from track points.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a TrackPoint>) -> Option<Self> {
        let mut bounds: Option<Bounds> = None;
        for p in points {
            let b = bounds.get_or_insert(Self {
                min_lat: p.latitude,
                max_lat: p.latitude,
                min_lng: p.longitude,
                max_lng: p.longitude,
            });
            b.min_lat = b.min_lat.min(p.latitude);
            b.max_lat = b.max_lat.max(p.latitude);
            b.min_lng = b.min_lng.min(p.longitude);
            b.max_lng = b.max_lng.max(p.longitude);
        }
        bounds
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> TrackPoint {
        TrackPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}
