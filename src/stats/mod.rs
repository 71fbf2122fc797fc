//! Incremental statistics primitives.
//!
//! Each primitive supports `add(sample)` / `remove(sample)` plus a read of
//! its current aggregate, holding only the running state needed to stay
//! cheap relative to full recomputation. All primitives accept an optional
//! inclusion predicate at construction; samples failing it are silently
//! ignored by both `add` and `remove`, so callers can feed every segment
//! without pre-filtering.
//!
//! Samples carry the originating [`SegmentId`] so extrema and medians report
//! the node achieving them, not just the scalar.

pub mod composites;

pub use composites::{
    HeightRateSnapshot, HeightRateStats, ScalarStats, ScalarStatsSnapshot, SpeedStats, TimeStats,
    TimeStatsSnapshot, TrackStats, TrackStatsSnapshot,
};

use crate::polyline::SegmentId;

/// Inclusion predicate over a sample value.
pub type InclusionPredicate = fn(f64) -> bool;

/// One scalar observation tied to the segment it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub node: SegmentId,
    pub value: f64,
}

impl Sample {
    pub fn new(node: SegmentId, value: f64) -> Self {
        Self { node, value }
    }
}

fn included(predicate: Option<InclusionPredicate>, value: f64) -> bool {
    predicate.map_or(true, |p| p(value))
}

// ============================================================================
// Sum
// ============================================================================

/// Running total with included-sample count.
#[derive(Debug, Clone, Default)]
pub struct Sum {
    total: f64,
    count: usize,
    predicate: Option<InclusionPredicate>,
}

impl Sum {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_predicate(predicate: InclusionPredicate) -> Self {
        Self {
            predicate: Some(predicate),
            ..Self::default()
        }
    }

    pub fn add(&mut self, value: f64) {
        if included(self.predicate, value) {
            self.total += value;
            self.count += 1;
        }
    }

    pub fn remove(&mut self, value: f64) {
        if included(self.predicate, value) && self.count > 0 {
            self.count -= 1;
            if self.count == 0 {
                // Reset instead of accumulating float residue
                self.total = 0.0;
            } else {
                self.total -= value;
            }
        }
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.total / self.count as f64)
    }
}

// ============================================================================
// MaxMin
// ============================================================================

/// Running max and min, each retaining the originating segment.
///
/// On add, a new sample replaces the stored extremum only if strictly
/// greater (max) or strictly less (min); ties keep the earlier-seen node.
///
/// Removal policy: removing the sample currently holding an extremum rescans
/// the retained active set (O(n) worst case) rather than leaving a stale
/// cached value. The primitive keeps its included samples for this purpose.
#[derive(Debug, Clone, Default)]
pub struct MaxMin {
    samples: Vec<Sample>,
    max: Option<Sample>,
    min: Option<Sample>,
    predicate: Option<InclusionPredicate>,
}

impl MaxMin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_predicate(predicate: InclusionPredicate) -> Self {
        Self {
            predicate: Some(predicate),
            ..Self::default()
        }
    }

    pub fn add(&mut self, sample: Sample) {
        if !included(self.predicate, sample.value) {
            return;
        }
        self.samples.push(sample);
        match &self.max {
            Some(current) if sample.value <= current.value => {}
            _ => self.max = Some(sample),
        }
        match &self.min {
            Some(current) if sample.value >= current.value => {}
            _ => self.min = Some(sample),
        }
    }

    pub fn remove(&mut self, sample: Sample) {
        if !included(self.predicate, sample.value) {
            return;
        }
        let Some(pos) = self.samples.iter().position(|s| s.node == sample.node) else {
            return;
        };
        self.samples.remove(pos);
        if self.max.is_some_and(|m| m.node == sample.node) {
            self.max = Self::rescan_max(&self.samples);
        }
        if self.min.is_some_and(|m| m.node == sample.node) {
            self.min = Self::rescan_min(&self.samples);
        }
    }

    fn rescan_max(samples: &[Sample]) -> Option<Sample> {
        let mut best: Option<Sample> = None;
        for &s in samples {
            match &best {
                Some(b) if s.value <= b.value => {}
                _ => best = Some(s),
            }
        }
        best
    }

    fn rescan_min(samples: &[Sample]) -> Option<Sample> {
        let mut best: Option<Sample> = None;
        for &s in samples {
            match &best {
                Some(b) if s.value >= b.value => {}
                _ => best = Some(s),
            }
        }
        best
    }

    pub fn max(&self) -> Option<Sample> {
        self.max
    }

    pub fn min(&self) -> Option<Sample> {
        self.min
    }

    pub fn count(&self) -> usize {
        self.samples.len()
    }
}

// ============================================================================
// Median
// ============================================================================

/// Current median over an ordered multiset of samples.
///
/// For an even count the upper median (index `len / 2`) is reported, so a
/// real node is always named rather than a synthetic midpoint.
#[derive(Debug, Clone, Default)]
pub struct Median {
    sorted: Vec<Sample>,
    predicate: Option<InclusionPredicate>,
}

impl Median {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_predicate(predicate: InclusionPredicate) -> Self {
        Self {
            predicate: Some(predicate),
            ..Self::default()
        }
    }

    pub fn add(&mut self, sample: Sample) {
        if !included(self.predicate, sample.value) {
            return;
        }
        // Upper bound keeps insertion stable for equal values
        let pos = self.sorted.partition_point(|s| s.value <= sample.value);
        self.sorted.insert(pos, sample);
    }

    pub fn remove(&mut self, sample: Sample) {
        if !included(self.predicate, sample.value) {
            return;
        }
        if let Some(pos) = self.sorted.iter().position(|s| s.node == sample.node) {
            self.sorted.remove(pos);
        }
    }

    pub fn median(&self) -> Option<Sample> {
        self.sorted.get(self.sorted.len() / 2).copied()
    }

    pub fn value(&self) -> Option<f64> {
        self.median().map(|s| s.value)
    }

    pub fn count(&self) -> usize {
        self.sorted.len()
    }
}

// ============================================================================
// StdDev
// ============================================================================

/// Running population standard deviation via incrementally maintained sum
/// and sum of squares. Variance is clamped at zero so float residue can
/// never produce NaN.
#[derive(Debug, Clone, Default)]
pub struct StdDev {
    sum: f64,
    sum_sq: f64,
    count: usize,
    predicate: Option<InclusionPredicate>,
}

impl StdDev {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_predicate(predicate: InclusionPredicate) -> Self {
        Self {
            predicate: Some(predicate),
            ..Self::default()
        }
    }

    pub fn add(&mut self, value: f64) {
        if included(self.predicate, value) {
            self.sum += value;
            self.sum_sq += value * value;
            self.count += 1;
        }
    }

    pub fn remove(&mut self, value: f64) {
        if included(self.predicate, value) && self.count > 0 {
            self.count -= 1;
            if self.count == 0 {
                self.sum = 0.0;
                self.sum_sq = 0.0;
            } else {
                self.sum -= value;
                self.sum_sq -= value * value;
            }
        }
    }

    pub fn sigma(&self) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        let mean = self.sum / n;
        let variance = (self.sum_sq / n - mean * mean).max(0.0);
        Some(variance.sqrt())
    }

    pub fn count(&self) -> usize {
        self.count
    }
}
