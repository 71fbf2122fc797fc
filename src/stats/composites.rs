//! Range statistics composites.
//!
//! Per-property bundles built from the incremental primitives, plus the
//! track-level aggregator composing them with inherited route-level stats
//! (length, cumulative ascent/descent) into one report. Composites can be
//! populated by a single traversal ([`TrackStats::of`] /
//! [`TrackStats::from_to`]) or kept alive across an edit session and fed
//! add/remove events tied to segment mutations.
//!
//! `snapshot()` on any composite returns a plain value-typed report with no
//! live references, suitable for external consumption.

use serde::{Deserialize, Serialize};

use super::{InclusionPredicate, MaxMin, Median, Sample, StdDev, Sum};
use crate::polyline::{Polyline, SegmentId, VertexId};
use crate::SegmentProperties;

fn positive(value: f64) -> bool {
    value > 0.0
}

fn negative(value: f64) -> bool {
    value < 0.0
}

/// Max/min-with-location + median + standard deviation + mean over one
/// scalar segment property.
#[derive(Debug, Clone, Default)]
pub struct ScalarStats {
    max_min: MaxMin,
    median: Median,
    std_dev: StdDev,
    sum: Sum,
}

impl ScalarStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_predicate(predicate: InclusionPredicate) -> Self {
        Self {
            max_min: MaxMin::with_predicate(predicate),
            median: Median::with_predicate(predicate),
            std_dev: StdDev::with_predicate(predicate),
            sum: Sum::with_predicate(predicate),
        }
    }

    pub fn add(&mut self, sample: Sample) {
        self.max_min.add(sample);
        self.median.add(sample);
        self.std_dev.add(sample.value);
        self.sum.add(sample.value);
    }

    pub fn remove(&mut self, sample: Sample) {
        self.max_min.remove(sample);
        self.median.remove(sample);
        self.std_dev.remove(sample.value);
        self.sum.remove(sample.value);
    }

    pub fn max(&self) -> Option<Sample> {
        self.max_min.max()
    }

    pub fn min(&self) -> Option<Sample> {
        self.max_min.min()
    }

    pub fn median(&self) -> Option<Sample> {
        self.median.median()
    }

    pub fn mean(&self) -> Option<f64> {
        self.sum.mean()
    }

    pub fn sigma(&self) -> Option<f64> {
        self.std_dev.sigma()
    }

    pub fn count(&self) -> usize {
        self.sum.count()
    }

    pub fn snapshot(&self) -> ScalarStatsSnapshot {
        ScalarStatsSnapshot {
            max: self.max().map_or(0.0, |s| s.value),
            min: self.min().map_or(0.0, |s| s.value),
            mean: self.mean().unwrap_or(0.0),
            median: self.median().map_or(0.0, |s| s.value),
            std_dev: self.sigma().unwrap_or(0.0),
            count: self.count(),
        }
    }
}

/// Plain snapshot of a [`ScalarStats`] bundle. All-zero when no sample was
/// included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScalarStatsSnapshot {
    pub max: f64,
    pub min: f64,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub count: usize,
}

/// Speed bundle over segment speeds (meters per second).
#[derive(Debug, Clone, Default)]
pub struct SpeedStats {
    inner: ScalarStats,
}

impl SpeedStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_segment(&mut self, id: SegmentId, props: &SegmentProperties) {
        if let Some(speed) = props.speed {
            self.inner.add(Sample::new(id, speed));
        }
    }

    pub fn remove_segment(&mut self, id: SegmentId, props: &SegmentProperties) {
        if let Some(speed) = props.speed {
            self.inner.remove(Sample::new(id, speed));
        }
    }

    pub fn stats(&self) -> &ScalarStats {
        &self.inner
    }

    pub fn snapshot(&self) -> ScalarStatsSnapshot {
        self.inner.snapshot()
    }
}

/// Height-rate bundle split into signed ascent and descent sub-aggregators.
///
/// Every segment's signed height rate is offered to both sides; the
/// inclusion predicates (`> 0` for ascent, `< 0` for descent) sort them out.
/// Descent values therefore stay negative in the reports.
#[derive(Debug, Clone)]
pub struct HeightRateStats {
    ascent: ScalarStats,
    descent: ScalarStats,
}

impl Default for HeightRateStats {
    fn default() -> Self {
        Self::new()
    }
}

impl HeightRateStats {
    pub fn new() -> Self {
        Self {
            ascent: ScalarStats::with_predicate(positive),
            descent: ScalarStats::with_predicate(negative),
        }
    }

    pub fn add_segment(&mut self, id: SegmentId, props: &SegmentProperties) {
        if let Some(hr) = props.height_rate {
            let sample = Sample::new(id, hr);
            self.ascent.add(sample);
            self.descent.add(sample);
        }
    }

    pub fn remove_segment(&mut self, id: SegmentId, props: &SegmentProperties) {
        if let Some(hr) = props.height_rate {
            let sample = Sample::new(id, hr);
            self.ascent.remove(sample);
            self.descent.remove(sample);
        }
    }

    pub fn ascent(&self) -> &ScalarStats {
        &self.ascent
    }

    pub fn descent(&self) -> &ScalarStats {
        &self.descent
    }

    pub fn snapshot(&self) -> HeightRateSnapshot {
        HeightRateSnapshot {
            ascent: self.ascent.snapshot(),
            descent: self.descent.snapshot(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HeightRateSnapshot {
    pub ascent: ScalarStatsSnapshot,
    pub descent: ScalarStatsSnapshot,
}

/// Duration bundle, with the total duration between the span's endpoint
/// timestamps on top of the generic shape.
#[derive(Debug, Clone, Default)]
pub struct TimeStats {
    inner: ScalarStats,
    total_duration: Option<f64>,
}

impl TimeStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_segment(&mut self, id: SegmentId, props: &SegmentProperties) {
        if let Some(duration) = props.duration {
            self.inner.add(Sample::new(id, duration));
        }
    }

    pub fn remove_segment(&mut self, id: SegmentId, props: &SegmentProperties) {
        if let Some(duration) = props.duration {
            self.inner.remove(Sample::new(id, duration));
        }
    }

    /// Record the total duration between the endpoints of the aggregated
    /// span, as computed by the time collaborator.
    pub fn set_total_duration(&mut self, total: Option<f64>) {
        self.total_duration = total;
    }

    pub fn total_duration(&self) -> Option<f64> {
        self.total_duration
    }

    pub fn stats(&self) -> &ScalarStats {
        &self.inner
    }

    pub fn snapshot(&self) -> TimeStatsSnapshot {
        TimeStatsSnapshot {
            duration: self.inner.snapshot(),
            total_duration: self.total_duration.unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeStatsSnapshot {
    pub duration: ScalarStatsSnapshot,
    pub total_duration: f64,
}

/// Track-level aggregator: the per-property bundles plus inherited
/// route-level stats (path length, cumulative ascent/descent).
///
/// Construct over a whole polyline with [`TrackStats::of`], over a bounded
/// span with [`TrackStats::from_to`], or keep one alive across an edit
/// session and feed it `add_segment`/`remove_segment` events.
#[derive(Debug, Clone)]
pub struct TrackStats {
    length: Sum,
    ascent_total: Sum,
    descent_total: Sum,
    pub speed: SpeedStats,
    pub height_rate: HeightRateStats,
    pub time: TimeStats,
}

impl Default for TrackStats {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackStats {
    /// An all-zero aggregator.
    pub fn new() -> Self {
        Self {
            length: Sum::new(),
            ascent_total: Sum::with_predicate(positive),
            descent_total: Sum::with_predicate(negative),
            speed: SpeedStats::new(),
            height_rate: HeightRateStats::new(),
            time: TimeStats::new(),
        }
    }

    /// Aggregate every segment of the polyline.
    ///
    /// An empty polyline, or one with fewer than two vertices, yields an
    /// all-zero report rather than an error.
    pub fn of(line: &Polyline) -> Self {
        let mut stats = Self::new();
        for id in line.segments() {
            if let Some(props) = line.segment(id) {
                let props = *props;
                stats.add_segment(id, &props);
            }
        }
        stats.set_span_times(line, line.head_vertex(), line.tail_vertex());
        stats
    }

    /// Aggregate only the span from `start` to `end`, walking forward.
    ///
    /// An absent start yields an all-zero report; an end that is never
    /// reached lets the traversal run to the end of the chain.
    pub fn from_to(line: &Polyline, start: VertexId, end: VertexId) -> Self {
        let mut stats = Self::new();
        if !line.contains_vertex(start) {
            return stats;
        }
        let mut cursor = start;
        while cursor != end {
            let Some(seg) = line.segment_after(cursor) else {
                break;
            };
            let Some((_, next)) = line.segment_endpoints(seg) else {
                break;
            };
            if let Some(props) = line.segment(seg) {
                let props = *props;
                stats.add_segment(seg, &props);
            }
            cursor = next;
        }
        stats.set_span_times(line, Some(start), Some(cursor));
        stats
    }

    fn set_span_times(&mut self, line: &Polyline, start: Option<VertexId>, end: Option<VertexId>) {
        let start_time = start
            .and_then(|v| line.point(v))
            .and_then(|p| p.time.clone());
        let end_time = end.and_then(|v| line.point(v)).and_then(|p| p.time.clone());
        let total = match (start_time, end_time) {
            (Some(s), Some(e)) => line.time.seconds_between(&s, &e),
            _ => None,
        };
        self.time.set_total_duration(total);
    }

    /// Feed one segment into every composite.
    pub fn add_segment(&mut self, id: SegmentId, props: &SegmentProperties) {
        self.length.add(props.length);
        if let Some(height) = props.height {
            self.ascent_total.add(height);
            self.descent_total.add(height);
        }
        self.speed.add_segment(id, props);
        self.height_rate.add_segment(id, props);
        self.time.add_segment(id, props);
    }

    /// Withdraw one segment from every composite.
    pub fn remove_segment(&mut self, id: SegmentId, props: &SegmentProperties) {
        self.length.remove(props.length);
        if let Some(height) = props.height {
            self.ascent_total.remove(height);
            self.descent_total.remove(height);
        }
        self.speed.remove_segment(id, props);
        self.height_rate.remove_segment(id, props);
        self.time.remove_segment(id, props);
    }

    /// Total path length in meters.
    pub fn length(&self) -> f64 {
        self.length.total()
    }

    /// Cumulative ascent in meters (sum of positive height deltas).
    pub fn total_ascent(&self) -> f64 {
        self.ascent_total.total()
    }

    /// Cumulative descent in meters, as a non-negative magnitude.
    pub fn total_descent(&self) -> f64 {
        self.descent_total.total().abs()
    }

    pub fn snapshot(&self) -> TrackStatsSnapshot {
        TrackStatsSnapshot {
            length: self.length(),
            total_ascent: self.total_ascent(),
            total_descent: self.total_descent(),
            speed: self.speed.snapshot(),
            height_rate: self.height_rate.snapshot(),
            time: self.time.snapshot(),
        }
    }
}

/// Plain snapshot of a [`TrackStats`] aggregation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackStatsSnapshot {
    pub length: f64,
    pub total_ascent: f64,
    pub total_descent: f64,
    pub speed: ScalarStatsSnapshot,
    pub height_rate: HeightRateSnapshot,
    pub time: TimeStatsSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg_props(height_rate: f64) -> SegmentProperties {
        SegmentProperties {
            length: 100.0,
            angle: 0.0,
            direction: crate::CompassDirection::NorthEast,
            duration: Some(30.0),
            speed: Some(100.0 / 30.0),
            height: Some(height_rate * 30.0),
            height_rate: Some(height_rate),
        }
    }

    #[test]
    fn test_height_rate_split_by_sign() {
        let mut hr = HeightRateStats::new();
        hr.add_segment(SegmentId(0), &seg_props(0.2));
        hr.add_segment(SegmentId(1), &seg_props(-0.4));
        hr.add_segment(SegmentId(2), &seg_props(0.6));
        assert_eq!(hr.ascent().count(), 2);
        assert_eq!(hr.descent().count(), 1);
        assert!((hr.ascent().mean().unwrap() - 0.4).abs() < 1e-12);
        assert!((hr.descent().mean().unwrap() + 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_remove_reverses_add() {
        let mut stats = TrackStats::new();
        let props = seg_props(0.5);
        stats.add_segment(SegmentId(0), &props);
        stats.add_segment(SegmentId(1), &seg_props(-0.25));
        stats.remove_segment(SegmentId(1), &seg_props(-0.25));
        assert!((stats.length() - 100.0).abs() < 1e-9);
        assert!((stats.total_ascent() - 15.0).abs() < 1e-9);
        assert_eq!(stats.total_descent(), 0.0);
        assert_eq!(stats.height_rate.descent().count(), 0);
    }

    #[test]
    fn test_snapshot_is_all_zero_when_empty() {
        let stats = TrackStats::new();
        let snap = stats.snapshot();
        assert_eq!(snap, TrackStatsSnapshot::default());
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut stats = TrackStats::new();
        stats.add_segment(SegmentId(0), &seg_props(0.1));
        let json = serde_json::to_string(&stats.snapshot()).unwrap();
        assert!(json.contains("totalAscent"));
    }
}
