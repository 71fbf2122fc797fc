//! Timestamp-indexed segmentation and split queries.
//!
//! Stateless queries over a [`Polyline`] and its timestamp index, returning
//! plain [`TrackSlice`] values. The whole surface is exploratory and
//! non-throwing: a timestamp or segment-limit pair that doesn't exist yields
//! an empty/absent result (or, for the clip-style extraction, the original
//! unmodified track), so queries chain without error handling at each step.

use serde::{Deserialize, Serialize};

use crate::polyline::Polyline;
use crate::TrackPoint;

/// An owned, inclusive slice of a track: points plus their (possibly absent)
/// timestamps, in parallel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackSlice {
    pub points: Vec<TrackPoint>,
    pub times: Vec<Option<String>>,
}

impl TrackSlice {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_time(&self) -> Option<&str> {
        self.times.first().and_then(|t| t.as_deref())
    }

    pub fn last_time(&self) -> Option<&str> {
        self.times.last().and_then(|t| t.as_deref())
    }
}

/// Split output partitioned into the pieces matching requested segment
/// limits and the remainder to keep.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentPartition {
    pub extracted: Vec<TrackSlice>,
    pub kept: Vec<TrackSlice>,
}

fn collect(line: &Polyline) -> (Vec<TrackPoint>, Vec<Option<String>>) {
    let points: Vec<TrackPoint> = line.points().cloned().collect();
    let times: Vec<Option<String>> = line.times().map(|t| t.map(String::from)).collect();
    (points, times)
}

fn slice_of(points: &[TrackPoint], times: &[Option<String>], from: usize, to: usize) -> TrackSlice {
    TrackSlice {
        points: points[from..=to].to_vec(),
        times: times[from..=to].to_vec(),
    }
}

fn locate(line: &Polyline, timestamp: &str) -> Option<usize> {
    let vertex = line.find_vertex_by_time(timestamp)?;
    line.vertex_index(vertex)
}

/// The inclusive slice from the head through the vertex at `timestamp`.
///
/// A match at the very first position is a real one-point slice; an
/// unmatched timestamp yields an empty slice.
pub fn segment_before_time(line: &Polyline, timestamp: &str) -> TrackSlice {
    let (points, times) = collect(line);
    match locate(line, timestamp) {
        Some(idx) => slice_of(&points, &times, 0, idx),
        None => TrackSlice::default(),
    }
}

/// The inclusive slice from the vertex at `timestamp` through the tail.
///
/// An unmatched timestamp yields an empty slice.
pub fn segment_after_time(line: &Polyline, timestamp: &str) -> TrackSlice {
    let (points, times) = collect(line);
    match locate(line, timestamp) {
        Some(idx) if !points.is_empty() => slice_of(&points, &times, idx, points.len() - 1),
        _ => TrackSlice::default(),
    }
}

/// The inclusive slice between two timestamps.
///
/// Absent when either bound is unmatched, or when the bounds are reversed.
pub fn segment_between_times(line: &Polyline, start: &str, end: &str) -> Option<TrackSlice> {
    let (points, times) = collect(line);
    let from = locate(line, start)?;
    let to = locate(line, end)?;
    if from > to {
        return None;
    }
    Some(slice_of(&points, &times, from, to))
}

/// Cut the track into leading segments at each matched split point, in
/// order, duplicating the split point as the last element of one piece and
/// the first of the next.
///
/// A split point that is unmatched, or that falls before the remaining
/// tail, is skipped. Always returns at least one piece: the remainder, or
/// the whole track when nothing matched.
pub fn segments_split_by_times(line: &Polyline, timestamps: &[&str]) -> Vec<TrackSlice> {
    let (points, times) = collect(line);
    let mut pieces = Vec::new();
    if points.is_empty() {
        pieces.push(TrackSlice::default());
        return pieces;
    }
    let mut start = 0;
    for &ts in timestamps {
        let hit = times[start..]
            .iter()
            .position(|t| t.as_deref() == Some(ts))
            .map(|rel| start + rel);
        if let Some(pos) = hit {
            pieces.push(slice_of(&points, &times, start, pos));
            start = pos;
        }
    }
    pieces.push(slice_of(&points, &times, start, points.len() - 1));
    pieces
}

/// [`segments_split_by_times`], dropping any piece too short to stand as a
/// track of its own (fewer than 2 points).
pub fn split_by_times(line: &Polyline, timestamps: &[&str]) -> Vec<TrackSlice> {
    segments_split_by_times(line, timestamps)
        .into_iter()
        .filter(|piece| piece.len() >= 2)
        .collect()
}

/// Extract the sub-track whose first/last timestamps equal the requested
/// pair.
///
/// When no split piece matches the pair (either bound unmatched, or the
/// span collapses), the whole track comes back unsliced: clip operations
/// return the original structure rather than failing.
pub fn split_to_segment(line: &Polyline, start: &str, end: &str) -> TrackSlice {
    let pieces = segments_split_by_times(line, &[start, end]);
    for piece in &pieces {
        if piece.first_time() == Some(start) && piece.last_time() == Some(end) {
            return piece.clone();
        }
    }
    let (points, times) = collect(line);
    TrackSlice { points, times }
}

/// Split the track at every limit timestamp and reconcile the output
/// against the requested segment limits: a piece whose first/last
/// timestamps equal one of the pairs is extracted, the rest is the
/// remainder to keep. Pieces of 2 points or fewer are dropped entirely.
pub fn split_by_segments(line: &Polyline, limits: &[(String, String)]) -> SegmentPartition {
    let mut cut_points: Vec<&str> = Vec::new();
    for (start, end) in limits {
        cut_points.push(start);
        cut_points.push(end);
    }
    let pieces = segments_split_by_times(line, &cut_points);

    let mut partition = SegmentPartition::default();
    for piece in pieces {
        if piece.len() <= 2 {
            continue;
        }
        let is_requested = limits.iter().any(|(start, end)| {
            piece.first_time() == Some(start.as_str()) && piece.last_time() == Some(end.as_str())
        });
        if is_requested {
            partition.extracted.push(piece);
        } else {
            partition.kept.push(piece);
        }
    }
    partition
}
