//! Geographic utilities for point-pair computations.
//!
//! This module provides the pure calculators the polyline's derived-property
//! passes are built from:
//! - Haversine distance between two points (meters)
//! - Bearing between two points (signed radians)
//! - Compass quadrant of a displacement
//! - Interval duration between two opaque timestamps (seconds)
//!
//! Timestamps stay opaque strings everywhere in the crate; the only place
//! they are interpreted is the [`TimeProvider`] collaborator defined here.

use geo::{HaversineBearing, HaversineDistance, Point};
use serde::{Deserialize, Serialize};

use crate::TrackPoint;

/// Calculate the haversine distance between two points in meters.
pub fn haversine_distance(p1: &TrackPoint, p2: &TrackPoint) -> f64 {
    let a = Point::new(p1.longitude, p1.latitude);
    let b = Point::new(p2.longitude, p2.latitude);
    a.haversine_distance(&b)
}

/// Calculate the initial bearing from `p1` to `p2` in signed radians.
///
/// North is 0, east is positive, west is negative; the result lies in
/// `(-PI, PI]`. Identical points yield a bearing of 0.
pub fn bearing(p1: &TrackPoint, p2: &TrackPoint) -> f64 {
    let a = Point::new(p1.longitude, p1.latitude);
    let b = Point::new(p2.longitude, p2.latitude);
    a.haversine_bearing(b).to_radians()
}

/// Compute the geographic center of a set of points.
///
/// Returns `None` for an empty slice.
pub fn compute_center(points: &[TrackPoint]) -> Option<TrackPoint> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let lat = points.iter().map(|p| p.latitude).sum::<f64>() / n;
    let lng = points.iter().map(|p| p.longitude).sum::<f64>() / n;
    Some(TrackPoint::new(lat, lng))
}

/// Compass quadrant of a displacement, tagged by latitude and longitude
/// direction. A zero delta counts as north / east respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompassDirection {
    NorthEast,
    NorthWest,
    SouthEast,
    SouthWest,
}

impl CompassDirection {
    /// Determine the quadrant of the displacement from `p1` to `p2`.
    pub fn between(p1: &TrackPoint, p2: &TrackPoint) -> Self {
        let north = p2.latitude >= p1.latitude;
        let east = p2.longitude >= p1.longitude;
        match (north, east) {
            (true, true) => CompassDirection::NorthEast,
            (true, false) => CompassDirection::NorthWest,
            (false, true) => CompassDirection::SouthEast,
            (false, false) => CompassDirection::SouthWest,
        }
    }

    /// Latitude tag: `'N'` or `'S'`.
    pub fn lat_tag(&self) -> char {
        match self {
            CompassDirection::NorthEast | CompassDirection::NorthWest => 'N',
            _ => 'S',
        }
    }

    /// Longitude tag: `'E'` or `'W'`.
    pub fn lng_tag(&self) -> char {
        match self {
            CompassDirection::NorthEast | CompassDirection::SouthEast => 'E',
            _ => 'W',
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompassDirection::NorthEast => "NE",
            CompassDirection::NorthWest => "NW",
            CompassDirection::SouthEast => "SE",
            CompassDirection::SouthWest => "SW",
        }
    }
}

impl std::fmt::Display for CompassDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time-interval collaborator.
///
/// The core treats timestamps as opaque, lexically ordered strings; computing
/// an interval in seconds between two of them is delegated here so the
/// representation stays a caller concern.
pub trait TimeProvider {
    /// Seconds elapsed from `start` to `end`, or `None` if either timestamp
    /// cannot be interpreted. Implementations must return a non-negative
    /// value for in-order timestamps.
    fn seconds_between(&self, start: &str, end: &str) -> Option<f64>;
}

/// Default [`TimeProvider`] interpreting timestamps as RFC 3339 strings.
///
/// Out-of-order timestamps clamp to a zero interval rather than going
/// negative, matching the segment invariant that durations are >= 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rfc3339Time;

impl TimeProvider for Rfc3339Time {
    fn seconds_between(&self, start: &str, end: &str) -> Option<f64> {
        let a = chrono::DateTime::parse_from_rfc3339(start).ok()?;
        let b = chrono::DateTime::parse_from_rfc3339(end).ok()?;
        let millis = (b - a).num_milliseconds();
        Some((millis.max(0) as f64) / 1000.0)
    }
}

/// Normalize an angle difference into `(-PI, PI]`.
pub(crate) fn normalize_angle(mut angle: f64) -> f64 {
    while angle > std::f64::consts::PI {
        angle -= 2.0 * std::f64::consts::PI;
    }
    while angle <= -std::f64::consts::PI {
        angle += 2.0 * std::f64::consts::PI;
    }
    angle
}
