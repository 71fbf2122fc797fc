//! Arena-backed polyline: the mutable vertex/segment chain.
//!
//! The structure is an ordered, doubly linked chain alternating vertex nodes
//! (a point plus derived path properties) and segment nodes (the derived
//! properties of the edge between two consecutive vertices). Nodes live in
//! slot arenas and are addressed by stable [`VertexId`]/[`SegmentId`]
//! handles; links are id fields, removal tombstones the slot, and all
//! traversal goes through the arena.
//!
//! Mutation primitives:
//! - [`Polyline::append`] / [`Polyline::insert_before`] / [`Polyline::insert_after`]
//! - [`Polyline::remove`]
//! - [`Polyline::replace_between`] (the funnel every higher-level edit uses)
//! - [`Polyline::copy_range`] / [`Polyline::crop_between_times`]
//!
//! Every count-changing primitive except bare `remove` ends with a full
//! derived-property recompute; partial patching of derived properties is
//! deliberately avoided.

mod propagate;

pub use propagate::{ElevationKey, ElevationRequest, EnrichmentEvent, EnrichmentReport};

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{OptionExt, Result};
use crate::geo_utils::{Rfc3339Time, TimeProvider};
use crate::{Bounds, SegmentProperties, TrackPoint};

/// Stable handle to a vertex slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VertexId(pub(crate) usize);

/// Stable handle to a segment slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentId(pub(crate) usize);

#[derive(Debug, Clone)]
pub(crate) struct VertexNode {
    pub(crate) point: TrackPoint,
    pub(crate) prev_vertex: Option<VertexId>,
    pub(crate) next_vertex: Option<VertexId>,
    pub(crate) seg_before: Option<SegmentId>,
    pub(crate) seg_after: Option<SegmentId>,
}

#[derive(Debug, Clone)]
pub(crate) struct SegmentNode {
    pub(crate) props: SegmentProperties,
    pub(crate) start: VertexId,
    pub(crate) end: VertexId,
    pub(crate) prev_seg: Option<SegmentId>,
    pub(crate) next_seg: Option<SegmentId>,
}

/// The mutable polyline structure.
///
/// Owns the full alternating vertex/segment chain. Invariant:
/// `segment_count == max(vertex_count - 1, 0)`, and every segment's endpoint
/// links point at adjacent vertices in chain order.
#[derive(Clone)]
pub struct Polyline {
    pub(crate) vertices: Vec<Option<VertexNode>>,
    pub(crate) segments: Vec<Option<SegmentNode>>,
    free_vertices: Vec<usize>,
    free_segments: Vec<usize>,
    head: Option<VertexId>,
    tail: Option<VertexId>,
    vertex_count: usize,
    segment_count: usize,
    /// Timestamp -> vertex lookup. A pure optimization: hits are verified
    /// against the chain and queries fall back to a linear scan, so a stale
    /// entry can never produce a wrong answer.
    time_index: HashMap<String, VertexId>,
    pub(crate) time: Arc<dyn TimeProvider>,
}

impl std::fmt::Debug for Polyline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Polyline")
            .field("vertex_count", &self.vertex_count)
            .field("segment_count", &self.segment_count)
            .finish()
    }
}

impl Default for Polyline {
    fn default() -> Self {
        Self::new()
    }
}

impl Polyline {
    /// Create an empty polyline with the RFC 3339 time collaborator.
    pub fn new() -> Self {
        Self::with_time_provider(Arc::new(Rfc3339Time))
    }

    /// Create an empty polyline with a custom time-interval collaborator.
    pub fn with_time_provider(time: Arc<dyn TimeProvider>) -> Self {
        Self {
            vertices: Vec::new(),
            segments: Vec::new(),
            free_vertices: Vec::new(),
            free_segments: Vec::new(),
            head: None,
            tail: None,
            vertex_count: 0,
            segment_count: 0,
            time_index: HashMap::new(),
            time,
        }
    }

    /// Build a polyline from points in order, running the derived-property
    /// pass once at the end.
    pub fn from_points(points: impl IntoIterator<Item = TrackPoint>) -> Self {
        let mut line = Self::new();
        for p in points {
            line.append_raw(p);
        }
        line.recompute();
        line
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    pub fn segment_count(&self) -> usize {
        self.segment_count
    }

    pub fn is_empty(&self) -> bool {
        self.vertex_count == 0
    }

    /// First vertex of the chain.
    pub fn head_vertex(&self) -> Option<VertexId> {
        self.head
    }

    /// Last vertex of the chain.
    pub fn tail_vertex(&self) -> Option<VertexId> {
        self.tail
    }

    /// First segment of the chain.
    pub fn head_segment(&self) -> Option<SegmentId> {
        self.head.and_then(|v| self.segment_after(v))
    }

    /// Last segment of the chain.
    pub fn tail_segment(&self) -> Option<SegmentId> {
        self.tail.and_then(|v| self.segment_before(v))
    }

    pub(crate) fn vertex(&self, id: VertexId) -> Option<&VertexNode> {
        self.vertices.get(id.0).and_then(|slot| slot.as_ref())
    }

    pub(crate) fn vertex_mut(&mut self, id: VertexId) -> Option<&mut VertexNode> {
        self.vertices.get_mut(id.0).and_then(|slot| slot.as_mut())
    }

    pub(crate) fn segment_node(&self, id: SegmentId) -> Option<&SegmentNode> {
        self.segments.get(id.0).and_then(|slot| slot.as_ref())
    }

    pub(crate) fn segment_node_mut(&mut self, id: SegmentId) -> Option<&mut SegmentNode> {
        self.segments.get_mut(id.0).and_then(|slot| slot.as_mut())
    }

    /// Whether the handle addresses a live vertex of this polyline.
    pub fn contains_vertex(&self, id: VertexId) -> bool {
        self.vertex(id).is_some()
    }

    /// The point owned by a vertex.
    pub fn point(&self, id: VertexId) -> Option<&TrackPoint> {
        self.vertex(id).map(|v| &v.point)
    }

    /// The derived properties of a segment.
    pub fn segment(&self, id: SegmentId) -> Option<&SegmentProperties> {
        self.segment_node(id).map(|s| &s.props)
    }

    /// The two endpoint vertices of a segment, in chain order.
    pub fn segment_endpoints(&self, id: SegmentId) -> Option<(VertexId, VertexId)> {
        self.segment_node(id).map(|s| (s.start, s.end))
    }

    pub fn next_vertex(&self, id: VertexId) -> Option<VertexId> {
        self.vertex(id).and_then(|v| v.next_vertex)
    }

    pub fn prev_vertex(&self, id: VertexId) -> Option<VertexId> {
        self.vertex(id).and_then(|v| v.prev_vertex)
    }

    /// The segment leading into a vertex; `None` at the head.
    pub fn segment_before(&self, id: VertexId) -> Option<SegmentId> {
        self.vertex(id).and_then(|v| v.seg_before)
    }

    /// The segment leading out of a vertex; `None` at the tail.
    pub fn segment_after(&self, id: VertexId) -> Option<SegmentId> {
        self.vertex(id).and_then(|v| v.seg_after)
    }

    pub fn next_segment(&self, id: SegmentId) -> Option<SegmentId> {
        self.segment_node(id).and_then(|s| s.next_seg)
    }

    pub fn prev_segment(&self, id: SegmentId) -> Option<SegmentId> {
        self.segment_node(id).and_then(|s| s.prev_seg)
    }

    /// Iterate vertex handles in chain order.
    pub fn vertices(&self) -> impl Iterator<Item = VertexId> + '_ {
        std::iter::successors(self.head, move |&id| self.next_vertex(id))
    }

    /// Iterate segment handles in chain order.
    pub fn segments(&self) -> impl Iterator<Item = SegmentId> + '_ {
        std::iter::successors(self.head_segment(), move |&id| self.next_segment(id))
    }

    /// Iterate points in chain order.
    pub fn points(&self) -> impl Iterator<Item = &TrackPoint> {
        self.vertices().filter_map(move |id| self.point(id))
    }

    /// Iterate the (possibly absent) timestamps in chain order.
    pub fn times(&self) -> impl Iterator<Item = Option<&str>> {
        self.points().map(|p| p.time.as_deref())
    }

    /// The vertex at chain position `index`.
    ///
    /// Unlike the timestamp queries this is positional access and reports
    /// out-of-range requests as an error.
    pub fn vertex_at(&self, index: usize) -> Result<VertexId> {
        self.vertices()
            .nth(index)
            .ok_or_out_of_range(index, self.vertex_count)
    }

    /// Chain position of a vertex, by linear walk.
    pub fn vertex_index(&self, id: VertexId) -> Option<usize> {
        self.vertices().position(|v| v == id)
    }

    /// Bounding box of all points.
    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points(self.points())
    }

    /// Locate the vertex carrying `timestamp`.
    ///
    /// Uses the timestamp index when it has a verified hit, otherwise falls
    /// back to a linear scan of the chain.
    pub fn find_vertex_by_time(&self, timestamp: &str) -> Option<VertexId> {
        if let Some(&id) = self.time_index.get(timestamp) {
            if self
                .point(id)
                .is_some_and(|p| p.time.as_deref() == Some(timestamp))
            {
                return Some(id);
            }
        }
        self.vertices()
            .find(|&id| self.point(id).is_some_and(|p| p.time.as_deref() == Some(timestamp)))
    }

    // ------------------------------------------------------------------
    // Mutation primitives
    // ------------------------------------------------------------------

    /// Append a point at the tail, creating the connecting segment if a
    /// previous tail existed, then recompute derived properties.
    ///
    /// For bulk construction prefer [`Polyline::from_points`], which defers
    /// the recompute to the end.
    pub fn append(&mut self, point: TrackPoint) -> VertexId {
        let id = self.append_raw(point);
        self.recompute();
        id
    }

    /// Splice new points immediately before `anchor`.
    ///
    /// Returns the number of vertices inserted: 0 when the anchor is not a
    /// live vertex of this polyline.
    pub fn insert_before(&mut self, anchor: VertexId, points: &[TrackPoint]) -> usize {
        if !self.contains_vertex(anchor) || points.is_empty() {
            return 0;
        }
        let left = self.prev_vertex(anchor);
        let inserted = self.splice(left, Some(anchor), points);
        self.recompute();
        inserted
    }

    /// Splice new points immediately after `anchor`.
    ///
    /// Returns the number of vertices inserted: 0 when the anchor is not a
    /// live vertex of this polyline.
    pub fn insert_after(&mut self, anchor: VertexId, points: &[TrackPoint]) -> usize {
        if !self.contains_vertex(anchor) || points.is_empty() {
            return 0;
        }
        let right = self.next_vertex(anchor);
        let inserted = self.splice(Some(anchor), right, points);
        self.recompute();
        inserted
    }

    /// Remove each listed vertex that is present, re-linking its former
    /// neighbors directly. Absent handles are ignored.
    ///
    /// Returns the count actually removed. This primitive does not recompute
    /// derived properties; callers that need fresh path properties run
    /// [`Polyline::recompute`] afterwards.
    pub fn remove(&mut self, ids: &[VertexId]) -> usize {
        let mut removed = 0;
        for &id in ids {
            if self.remove_one(id) {
                removed += 1;
            }
        }
        removed
    }

    /// Remove every vertex strictly between `start` and `end` and splice
    /// `points` between them. The single primitive all higher-level edits
    /// funnel through.
    ///
    /// An anchor that is `None` or not a live vertex falls back to the head
    /// (for `start`) or the tail (for `end`), as does an `end` that does not
    /// lie forward of `start` in chain order; when both anchors are
    /// unresolved the call is a no-op. Returns inserted + removed count.
    pub fn replace_between(
        &mut self,
        start: Option<VertexId>,
        end: Option<VertexId>,
        points: &[TrackPoint],
    ) -> usize {
        let start_resolved = start.filter(|&id| self.contains_vertex(id));
        let end_resolved = end.filter(|&id| self.contains_vertex(id));
        if start_resolved.is_none() && end_resolved.is_none() {
            return 0;
        }
        let Some(start) = start_resolved.or(self.head) else {
            return 0;
        };
        let mut end = end_resolved.or(self.tail).unwrap_or(start);
        // An end that does not lie forward of the start (reversed anchors)
        // cannot bound the walk; run to the tail instead.
        if end != start
            && !std::iter::successors(self.next_vertex(start), |&id| self.next_vertex(id))
                .any(|id| id == end)
        {
            end = self.tail.unwrap_or(start);
        }

        // Collect and drop the strict interior.
        let interior: Vec<VertexId> = if start == end {
            Vec::new()
        } else {
            std::iter::successors(self.next_vertex(start), |&id| self.next_vertex(id))
                .take_while(|&id| id != end)
                .collect()
        };
        let removed = self.remove(&interior);

        let inserted = if start == end {
            // Degenerate span: splice after the single anchor.
            let right = self.next_vertex(start);
            self.splice(Some(start), right, points)
        } else {
            self.splice(Some(start), Some(end), points)
        };
        self.recompute();
        removed + inserted
    }

    /// Produce a deep, independently owned copy of the sub-chain from the
    /// vertex matching `start_ts` through the vertex matching `end_ts`.
    ///
    /// An unmatched start copies from the head; an unmatched end copies to
    /// the tail. Returns `None` only when the source polyline is empty.
    pub fn copy_range(&self, start_ts: &str, end_ts: &str) -> Option<Polyline> {
        let start = self.find_vertex_by_time(start_ts).or(self.head)?;
        let end = self.find_vertex_by_time(end_ts).or(self.tail)?;

        let mut copy = Polyline::with_time_provider(Arc::clone(&self.time));
        let mut cursor = Some(start);
        while let Some(id) = cursor {
            copy.append_raw(self.point(id)?.clone());
            if id == end {
                break;
            }
            cursor = self.next_vertex(id);
        }
        copy.recompute();
        Some(copy)
    }

    /// Clip the polyline to the sub-range between two timestamps, dropping
    /// vertices outside it.
    ///
    /// An unmatched bound falls back to the head/tail on its side, so a call
    /// with two unmatched timestamps leaves the structure untouched. Returns
    /// the number of vertices removed.
    pub fn crop_between_times(&mut self, start_ts: &str, end_ts: &str) -> usize {
        let Some(head) = self.head else { return 0 };
        let start = self.find_vertex_by_time(start_ts).unwrap_or(head);
        let end = self
            .find_vertex_by_time(end_ts)
            .or(self.tail)
            .unwrap_or(start);

        let mut doomed: Vec<VertexId> = Vec::new();
        // Everything before the start...
        let mut cursor = Some(head);
        while let Some(id) = cursor {
            if id == start {
                break;
            }
            doomed.push(id);
            cursor = self.next_vertex(id);
        }
        // ...and everything after the end, unless the end was never reached
        // walking forward from the start.
        let mut cursor = Some(start);
        let mut reached_end = false;
        while let Some(id) = cursor {
            if id == end {
                reached_end = true;
            }
            cursor = self.next_vertex(id);
            if reached_end {
                while let Some(id) = cursor {
                    doomed.push(id);
                    cursor = self.next_vertex(id);
                }
                break;
            }
        }
        let removed = self.remove(&doomed);
        if removed > 0 {
            self.recompute();
        }
        removed
    }

    // ------------------------------------------------------------------
    // Internal link surgery
    // ------------------------------------------------------------------

    fn alloc_vertex(&mut self, node: VertexNode) -> VertexId {
        let id = match self.free_vertices.pop() {
            Some(slot) => {
                self.vertices[slot] = Some(node);
                VertexId(slot)
            }
            None => {
                self.vertices.push(Some(node));
                VertexId(self.vertices.len() - 1)
            }
        };
        self.vertex_count += 1;
        id
    }

    fn alloc_segment(&mut self, node: SegmentNode) -> SegmentId {
        let id = match self.free_segments.pop() {
            Some(slot) => {
                self.segments[slot] = Some(node);
                SegmentId(slot)
            }
            None => {
                self.segments.push(Some(node));
                SegmentId(self.segments.len() - 1)
            }
        };
        self.segment_count += 1;
        id
    }

    fn free_vertex(&mut self, id: VertexId) {
        if self.vertices[id.0].take().is_some() {
            self.free_vertices.push(id.0);
            self.vertex_count -= 1;
        }
    }

    fn free_segment(&mut self, id: SegmentId) {
        if self.segments[id.0].take().is_some() {
            self.free_segments.push(id.0);
            self.segment_count -= 1;
        }
    }

    /// Create and fully link the segment between two adjacent vertices.
    fn link_segment(&mut self, a: VertexId, b: VertexId) -> SegmentId {
        let props = self.compute_segment_props(a, b);
        let prev_seg = self.segment_before(a);
        let next_seg = self.segment_after(b);
        let seg = self.alloc_segment(SegmentNode {
            props,
            start: a,
            end: b,
            prev_seg,
            next_seg,
        });
        if let Some(p) = prev_seg {
            if let Some(node) = self.segment_node_mut(p) {
                node.next_seg = Some(seg);
            }
        }
        if let Some(n) = next_seg {
            if let Some(node) = self.segment_node_mut(n) {
                node.prev_seg = Some(seg);
            }
        }
        if let Some(v) = self.vertex_mut(a) {
            v.seg_after = Some(seg);
        }
        if let Some(v) = self.vertex_mut(b) {
            v.seg_before = Some(seg);
        }
        seg
    }

    /// Append without recomputing; the caller runs the pass when done.
    pub(crate) fn append_raw(&mut self, point: TrackPoint) -> VertexId {
        let time_key = point.time.clone();
        let id = self.alloc_vertex(VertexNode {
            point,
            prev_vertex: self.tail,
            next_vertex: None,
            seg_before: None,
            seg_after: None,
        });
        if let Some(old_tail) = self.tail {
            if let Some(v) = self.vertex_mut(old_tail) {
                v.next_vertex = Some(id);
            }
            self.link_segment(old_tail, id);
        } else {
            self.head = Some(id);
        }
        self.tail = Some(id);
        if let Some(ts) = time_key {
            self.time_index.insert(ts, id);
        }
        id
    }

    /// Splice a run of new vertices between `left` and `right`, which must be
    /// adjacent (or the chain ends on that side). O(k) for k points.
    fn splice(
        &mut self,
        left: Option<VertexId>,
        right: Option<VertexId>,
        points: &[TrackPoint],
    ) -> usize {
        if points.is_empty() {
            return 0;
        }
        // Sever the existing connection across the gap.
        if let (Some(l), Some(r)) = (left, right) {
            if let Some(seg) = self.segment_after(l) {
                if self.segment_endpoints(seg) == Some((l, r)) {
                    self.unlink_segment(seg);
                }
            }
        }

        let mut prev = left;
        let mut first_new: Option<VertexId> = None;
        for point in points {
            let time_key = point.time.clone();
            let id = self.alloc_vertex(VertexNode {
                point: point.clone(),
                prev_vertex: prev,
                next_vertex: None,
                seg_before: None,
                seg_after: None,
            });
            if let Some(ts) = time_key {
                self.time_index.insert(ts, id);
            }
            if let Some(p) = prev {
                if let Some(v) = self.vertex_mut(p) {
                    v.next_vertex = Some(id);
                }
                self.link_segment(p, id);
            }
            first_new.get_or_insert(id);
            prev = Some(id);
        }
        let Some(last_new) = prev else {
            return 0;
        };

        match right {
            Some(r) => {
                if let Some(v) = self.vertex_mut(last_new) {
                    v.next_vertex = Some(r);
                }
                if let Some(v) = self.vertex_mut(r) {
                    v.prev_vertex = Some(last_new);
                }
                self.link_segment(last_new, r);
            }
            None => self.tail = Some(last_new),
        }
        if left.is_none() {
            self.head = first_new;
        }
        points.len()
    }

    /// Detach a segment from the chain and free its slot.
    fn unlink_segment(&mut self, id: SegmentId) {
        let Some(node) = self.segment_node(id) else {
            return;
        };
        let (start, end, prev_seg, next_seg) = (node.start, node.end, node.prev_seg, node.next_seg);
        if let Some(v) = self.vertex_mut(start) {
            if v.seg_after == Some(id) {
                v.seg_after = None;
            }
        }
        if let Some(v) = self.vertex_mut(end) {
            if v.seg_before == Some(id) {
                v.seg_before = None;
            }
        }
        if let Some(p) = prev_seg {
            if let Some(n) = self.segment_node_mut(p) {
                n.next_seg = next_seg;
            }
        }
        if let Some(nx) = next_seg {
            if let Some(n) = self.segment_node_mut(nx) {
                n.prev_seg = prev_seg;
            }
        }
        self.free_segment(id);
    }

    fn remove_one(&mut self, id: VertexId) -> bool {
        let Some(node) = self.vertex(id) else {
            return false;
        };
        let (prev, next, before, after) = (
            node.prev_vertex,
            node.next_vertex,
            node.seg_before,
            node.seg_after,
        );
        if let Some(seg) = before {
            self.unlink_segment(seg);
        }
        if let Some(seg) = after {
            self.unlink_segment(seg);
        }
        if let Some(p) = prev {
            if let Some(v) = self.vertex_mut(p) {
                v.next_vertex = next;
            }
        }
        if let Some(n) = next {
            if let Some(v) = self.vertex_mut(n) {
                v.prev_vertex = prev;
            }
        }
        if self.head == Some(id) {
            self.head = next;
        }
        if self.tail == Some(id) {
            self.tail = prev;
        }
        if let Some(ts) = self.vertex(id).and_then(|v| v.point.time.clone()) {
            if self.time_index.get(&ts) == Some(&id) {
                self.time_index.remove(&ts);
            }
        }
        self.free_vertex(id);
        // Bridge the former neighbors with a fresh segment.
        if let (Some(p), Some(n)) = (prev, next) {
            self.link_segment(p, n);
        }
        true
    }

    /// Rebuild the timestamp index from the chain.
    pub(crate) fn rebuild_time_index(&mut self) {
        self.time_index.clear();
        let entries: Vec<(String, VertexId)> = self
            .vertices()
            .filter_map(|id| {
                self.point(id)
                    .and_then(|p| p.time.clone())
                    .map(|ts| (ts, id))
            })
            .collect();
        for (ts, id) in entries {
            // First occurrence wins when timestamps repeat.
            self.time_index.entry(ts).or_insert(id);
        }
    }
}
