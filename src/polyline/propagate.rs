//! Derived-property propagation and elevation enrichment.
//!
//! Two passes over the chain:
//! - Segment pass: recompute every segment's properties from its endpoint
//!   points
//! - Vertex pass: derive each vertex's path properties (turn angle/rate,
//!   average speed, ascent/descent rate) from its adjacent segments
//!
//! The passes are idempotent; running them twice without mutation yields
//! identical values. Elevation enrichment is a separate, optional pass that
//! sets terrain elevations from an exact-key lookup and then re-runs only the
//! elevation-dependent parts.

use std::collections::{HashMap, HashSet};

use log::debug;
use serde::{Deserialize, Serialize};

use super::{Polyline, SegmentId, VertexId};
use crate::geo_utils::{
    bearing, haversine_distance, normalize_angle, CompassDirection, TimeProvider,
};
use crate::{Bounds, PathProperties, SegmentProperties, TrackPoint};

/// A scalar over a time interval. Zero duration over a non-zero scalar is an
/// unbounded rate (signed infinity), never NaN and never an error.
fn rate(value: f64, duration: f64) -> f64 {
    if duration > 0.0 {
        value / duration
    } else if value == 0.0 {
        0.0
    } else if value > 0.0 {
        f64::INFINITY
    } else {
        f64::NEG_INFINITY
    }
}

/// Compute the derived properties of the edge from `a` to `b`.
pub(crate) fn segment_properties(
    a: &TrackPoint,
    b: &TrackPoint,
    time: &dyn TimeProvider,
) -> SegmentProperties {
    let length = haversine_distance(a, b);
    let angle = bearing(a, b);
    let direction = CompassDirection::between(a, b);
    let duration = match (&a.time, &b.time) {
        (Some(start), Some(end)) => time.seconds_between(start, end),
        _ => None,
    };
    let speed = duration.map(|d| rate(length, d));
    let height = match (a.effective_elevation(), b.effective_elevation()) {
        (Some(from), Some(to)) => Some(to - from),
        _ => None,
    };
    let height_rate = match (height, duration) {
        (Some(h), Some(d)) => Some(rate(h, d)),
        _ => None,
    };
    SegmentProperties {
        length,
        angle,
        direction,
        duration,
        speed,
        height,
        height_rate,
    }
}

/// Ascent/descent rates for a vertex given its adjacent segments' signed
/// height rates.
///
/// At a local elevation extremum (opposite signs, both non-zero) each side's
/// magnitude lands on its own field; otherwise the signed average populates
/// exactly one of the two.
fn ascent_descent(before: Option<f64>, after: Option<f64>) -> (Option<f64>, Option<f64>) {
    match (before, after) {
        (Some(b), Some(a)) if b != 0.0 && a != 0.0 && (b > 0.0) != (a > 0.0) => {
            let up = if b > 0.0 { b } else { a };
            let down = if b < 0.0 { b } else { a };
            (Some(up.abs()), Some(down.abs()))
        }
        _ => {
            let rates: Vec<f64> = [before, after].into_iter().flatten().collect();
            if rates.is_empty() {
                return (None, None);
            }
            let avg = rates.iter().sum::<f64>() / rates.len() as f64;
            if avg > 0.0 {
                (Some(avg), None)
            } else if avg < 0.0 {
                (None, Some(avg.abs()))
            } else {
                (None, None)
            }
        }
    }
}

impl Polyline {
    pub(crate) fn compute_segment_props(&self, a: VertexId, b: VertexId) -> SegmentProperties {
        match (self.point(a), self.point(b)) {
            (Some(pa), Some(pb)) => segment_properties(pa, pb, self.time.as_ref()),
            // Unreachable for live endpoints; a degenerate zero segment
            // keeps the invariants intact if it ever happens.
            _ => SegmentProperties {
                length: 0.0,
                angle: 0.0,
                direction: CompassDirection::NorthEast,
                duration: None,
                speed: None,
                height: None,
                height_rate: None,
            },
        }
    }

    /// Full derived-property recompute: segment pass, then vertex pass, then
    /// a timestamp-index rebuild.
    ///
    /// Runs after every count-changing mutation instead of attempting
    /// incremental patching.
    pub fn recompute(&mut self) {
        self.rebuild_time_index();

        let seg_ids: Vec<SegmentId> = self.segments().collect();
        for id in seg_ids {
            let Some((a, b)) = self.segment_endpoints(id) else {
                continue;
            };
            let props = self.compute_segment_props(a, b);
            if let Some(node) = self.segment_node_mut(id) {
                node.props = props;
            }
        }

        let vertex_ids: Vec<VertexId> = self.vertices().collect();
        for id in vertex_ids {
            let path = self.compute_path_props(id);
            if let Some(node) = self.vertex_mut(id) {
                node.point.path = path;
            }
        }
    }

    /// Derive a vertex's path properties from its adjacent segments.
    ///
    /// A missing side contributes nothing; with no adjacent segment on either
    /// side there are no path properties at all.
    fn compute_path_props(&self, id: VertexId) -> Option<PathProperties> {
        let before = self
            .segment_before(id)
            .and_then(|s| self.segment(s))
            .copied();
        let after = self
            .segment_after(id)
            .and_then(|s| self.segment(s))
            .copied();
        if before.is_none() && after.is_none() {
            return None;
        }

        let (turn, turn_rate) = match (&before, &after) {
            (Some(b), Some(a)) => {
                let turn = normalize_angle(a.angle - b.angle);
                let turn_rate = match (b.duration, a.duration) {
                    (Some(db), Some(da)) => Some(rate(turn, (db + da) / 2.0)),
                    _ => None,
                };
                (Some(turn), turn_rate)
            }
            _ => (None, None),
        };

        let speeds: Vec<f64> = [&before, &after]
            .into_iter()
            .filter_map(|s| s.as_ref().and_then(|s| s.speed))
            .collect();
        let avg_speed = if speeds.is_empty() {
            None
        } else {
            Some(speeds.iter().sum::<f64>() / speeds.len() as f64)
        };

        let (ascent_rate, descent_rate) = ascent_descent(
            before.and_then(|s| s.height_rate),
            after.and_then(|s| s.height_rate),
        );

        Some(PathProperties {
            turn,
            turn_rate,
            avg_speed,
            ascent_rate,
            descent_rate,
        })
    }

    /// Re-run only the elevation-dependent parts of the two passes: segment
    /// height/height-rate and vertex ascent/descent.
    pub fn recompute_elevation_derived(&mut self) {
        let seg_ids: Vec<SegmentId> = self.segments().collect();
        for id in seg_ids {
            let Some((a, b)) = self.segment_endpoints(id) else {
                continue;
            };
            let height = match (
                self.point(a).and_then(|p| p.effective_elevation()),
                self.point(b).and_then(|p| p.effective_elevation()),
            ) {
                (Some(from), Some(to)) => Some(to - from),
                _ => None,
            };
            if let Some(node) = self.segment_node_mut(id) {
                node.props.height = height;
                node.props.height_rate = match (height, node.props.duration) {
                    (Some(h), Some(d)) => Some(rate(h, d)),
                    _ => None,
                };
            }
        }

        let vertex_ids: Vec<VertexId> = self.vertices().collect();
        for id in vertex_ids {
            let before = self
                .segment_before(id)
                .and_then(|s| self.segment(s))
                .and_then(|s| s.height_rate);
            let after = self
                .segment_after(id)
                .and_then(|s| self.segment(s))
                .and_then(|s| s.height_rate);
            let (ascent, descent) = ascent_descent(before, after);
            if let Some(node) = self.vertex_mut(id) {
                if let Some(path) = node.point.path.as_mut() {
                    path.ascent_rate = ascent;
                    path.descent_rate = descent;
                } else if ascent.is_some() || descent.is_some() {
                    node.point.path = Some(PathProperties {
                        ascent_rate: ascent,
                        descent_rate: descent,
                        ..PathProperties::default()
                    });
                }
            }
        }
    }
}

// ============================================================================
// Elevation enrichment
// ============================================================================

/// Exact-match key for an elevation lookup: the bit patterns of the
/// coordinate pair. No interpolation, no nearest-neighbor fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElevationKey {
    lat_bits: u64,
    lng_bits: u64,
}

impl ElevationKey {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            lat_bits: latitude.to_bits(),
            lng_bits: longitude.to_bits(),
        }
    }

    pub fn of(point: &TrackPoint) -> Self {
        Self::new(point.latitude, point.longitude)
    }
}

/// What an elevation provider needs: the distinct coordinate pairs of the
/// track plus its bounding box. Chunking against provider request limits is
/// the caller's concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElevationRequest {
    /// Distinct (lat, lng) pairs in chain order of first occurrence
    pub coordinates: Vec<(f64, f64)>,
    pub bounds: Bounds,
}

/// One vertex's outcome during the enrichment pass, delivered to the
/// caller-supplied sink.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EnrichmentEvent {
    /// An exact key match set this vertex's elevation.
    Applied { vertex: VertexId, elevation: f64 },
    /// The lookup had no data for this vertex's coordinates.
    Missing { vertex: VertexId },
}

/// Summary of an enrichment pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentReport {
    pub applied: usize,
    pub missing: usize,
}

impl Polyline {
    /// The lookup request for the elevation collaborator, or `None` for an
    /// empty polyline.
    pub fn elevation_request(&self) -> Option<ElevationRequest> {
        let bounds = self.bounds()?;
        let mut seen: HashSet<ElevationKey> = HashSet::new();
        let mut coordinates = Vec::new();
        for p in self.points() {
            if seen.insert(ElevationKey::of(p)) {
                coordinates.push((p.latitude, p.longitude));
            }
        }
        Some(ElevationRequest {
            coordinates,
            bounds,
        })
    }

    /// Apply elevations from a completed lookup, then re-run the
    /// elevation-dependent derived properties.
    ///
    /// Only exact coordinate matches are applied. Returns the pass summary.
    pub fn apply_elevations(&mut self, elevations: &HashMap<ElevationKey, f64>) -> EnrichmentReport {
        self.apply_elevations_with(elevations, &mut |_| {})
    }

    /// [`Polyline::apply_elevations`] with a caller-supplied event sink
    /// observing each vertex's outcome.
    pub fn apply_elevations_with(
        &mut self,
        elevations: &HashMap<ElevationKey, f64>,
        sink: &mut dyn FnMut(EnrichmentEvent),
    ) -> EnrichmentReport {
        let mut report = EnrichmentReport::default();
        let vertex_ids: Vec<VertexId> = self.vertices().collect();
        for id in vertex_ids {
            let Some(key) = self.point(id).map(ElevationKey::of) else {
                continue;
            };
            match elevations.get(&key) {
                Some(&elevation) => {
                    if let Some(node) = self.vertex_mut(id) {
                        node.point.elevation = Some(elevation);
                    }
                    report.applied += 1;
                    sink(EnrichmentEvent::Applied {
                        vertex: id,
                        elevation,
                    });
                }
                None => {
                    report.missing += 1;
                    sink(EnrichmentEvent::Missing { vertex: id });
                }
            }
        }
        debug!(
            "elevation enrichment: {} applied, {} missing",
            report.applied, report.missing
        );
        if report.applied > 0 {
            self.recompute_elevation_derived();
        }
        report
    }
}
