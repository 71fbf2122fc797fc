//! Tests for the polyline structure and its mutation primitives.

use trackline::{Polyline, TrackPoint, VertexId};

fn make_point(lat: f64, lng: f64) -> TrackPoint {
    TrackPoint::new(lat, lng)
}

fn timed_point(lat: f64, lng: f64, ts: &str) -> TrackPoint {
    TrackPoint::new(lat, lng).with_time(ts)
}

fn straight_line(n: usize) -> Polyline {
    Polyline::from_points((0..n).map(|i| {
        timed_point(
            50.0 + i as f64 * 0.001,
            7.0,
            &format!("2024-01-01T10:{:02}:00Z", i),
        )
    }))
}

/// Walk the chain and assert the structural invariants: segment count is
/// max(n - 1, 0) and every segment's endpoint links point at adjacent
/// vertices in chain order.
fn assert_chain_invariants(line: &Polyline) {
    let vertices: Vec<VertexId> = line.vertices().collect();
    assert_eq!(vertices.len(), line.vertex_count());
    assert_eq!(
        line.segment_count(),
        line.vertex_count().saturating_sub(1),
        "segment count must be max(n - 1, 0)"
    );
    let segments: Vec<_> = line.segments().collect();
    assert_eq!(segments.len(), line.segment_count());
    for (i, seg) in segments.iter().enumerate() {
        let (a, b) = line.segment_endpoints(*seg).unwrap();
        assert_eq!(a, vertices[i]);
        assert_eq!(b, vertices[i + 1]);
        assert_eq!(line.segment_after(a), Some(*seg));
        assert_eq!(line.segment_before(b), Some(*seg));
    }
}

#[test]
fn test_append_links_chain() {
    let mut line = Polyline::new();
    assert_chain_invariants(&line);
    line.append(make_point(50.0, 7.0));
    assert_chain_invariants(&line);
    assert_eq!(line.segment_count(), 0);
    line.append(make_point(50.001, 7.0));
    line.append(make_point(50.002, 7.0));
    assert_chain_invariants(&line);
    assert_eq!(line.vertex_count(), 3);
    assert_eq!(line.segment_count(), 2);
    assert_eq!(line.head_vertex(), line.vertices().next());
}

#[test]
fn test_insert_accounting() {
    // Inserting 3 vertices between two adjacent vertices grows both counts by 3
    let mut line = straight_line(2);
    let head = line.head_vertex().unwrap();
    let inserted = line.insert_after(
        head,
        &[
            make_point(50.0002, 7.0),
            make_point(50.0004, 7.0),
            make_point(50.0006, 7.0),
        ],
    );
    assert_eq!(inserted, 3);
    assert_eq!(line.vertex_count(), 5);
    assert_eq!(line.segment_count(), 4);
    assert_chain_invariants(&line);
}

#[test]
fn test_insert_before_head_moves_head() {
    let mut line = straight_line(3);
    let head = line.head_vertex().unwrap();
    let inserted = line.insert_before(head, &[make_point(49.999, 7.0)]);
    assert_eq!(inserted, 1);
    let new_head = line.head_vertex().unwrap();
    assert_ne!(new_head, head);
    assert_eq!(line.point(new_head).unwrap().latitude, 49.999);
    assert_chain_invariants(&line);
}

#[test]
fn test_insert_with_dead_anchor_is_noop() {
    let mut line = straight_line(3);
    let doomed = line.tail_vertex().unwrap();
    line.remove(&[doomed]);
    assert_eq!(line.insert_after(doomed, &[make_point(50.1, 7.0)]), 0);
    assert_eq!(line.vertex_count(), 2);
}

#[test]
fn test_remove_accounting() {
    // Removing 2 of n vertices decreases both counts by 2
    let mut line = straight_line(6);
    let ids: Vec<VertexId> = line.vertices().collect();
    let removed = line.remove(&[ids[1], ids[3]]);
    assert_eq!(removed, 2);
    assert_eq!(line.vertex_count(), 4);
    assert_eq!(line.segment_count(), 3);
    line.recompute();
    assert_chain_invariants(&line);
}

#[test]
fn test_remove_ignores_absent_vertices() {
    let mut line = straight_line(4);
    let doomed = line.tail_vertex().unwrap();
    assert_eq!(line.remove(&[doomed]), 1);
    // Second removal of the same handle finds nothing
    assert_eq!(line.remove(&[doomed]), 0);
    assert_eq!(line.vertex_count(), 3);
}

#[test]
fn test_remove_endpoints_moves_head_and_tail() {
    let mut line = straight_line(4);
    let head = line.head_vertex().unwrap();
    let tail = line.tail_vertex().unwrap();
    line.remove(&[head, tail]);
    line.recompute();
    assert_eq!(line.vertex_count(), 2);
    assert_chain_invariants(&line);
    let new_head = line.head_vertex().unwrap();
    assert_eq!(line.point(new_head).unwrap().time.as_deref(), Some("2024-01-01T10:01:00Z"));
}

#[test]
fn test_replace_between_splices_interior() {
    let mut line = straight_line(5);
    let ids: Vec<VertexId> = line.vertices().collect();
    // Replace the 3 interior vertices with 2 new ones
    let changed = line.replace_between(
        Some(ids[0]),
        Some(ids[4]),
        &[make_point(51.0, 7.0), make_point(51.1, 7.0)],
    );
    assert_eq!(changed, 5); // 3 removed + 2 inserted
    assert_eq!(line.vertex_count(), 4);
    assert_chain_invariants(&line);
    let points: Vec<f64> = line.points().map(|p| p.latitude).collect();
    assert_eq!(points[1], 51.0);
    assert_eq!(points[2], 51.1);
}

#[test]
fn test_replace_between_falls_back_to_head_and_tail() {
    let mut line = straight_line(4);
    let ids: Vec<VertexId> = line.vertices().collect();
    // Unresolved start anchors at the head
    let changed = line.replace_between(None, Some(ids[2]), &[make_point(51.0, 7.0)]);
    assert_eq!(changed, 2); // 1 removed + 1 inserted
    assert_chain_invariants(&line);

    // Both anchors unresolved: no-op
    let before = line.vertex_count();
    assert_eq!(line.replace_between(None, None, &[make_point(52.0, 7.0)]), 0);
    assert_eq!(line.vertex_count(), before);
}

#[test]
fn test_replace_between_reversed_anchors_run_to_tail() {
    // An end lying before the start in chain order cannot bound the walk;
    // it falls back to the tail, same as an unresolved end
    let mut line = straight_line(5);
    let ids: Vec<VertexId> = line.vertices().collect();
    let changed = line.replace_between(Some(ids[3]), Some(ids[1]), &[make_point(51.0, 7.0)]);
    // Nothing lies strictly between ids[3] and the tail; one point inserted
    assert_eq!(changed, 1);
    assert_eq!(line.vertex_count(), 6);
    assert_chain_invariants(&line);
    let points: Vec<f64> = line.points().map(|p| p.latitude).collect();
    assert_eq!(points[4], 51.0);

    // With interior to drop: the reversed end falls back to the tail, so
    // the strict interior between index 1 and the tail goes
    let mut line = straight_line(5);
    let ids: Vec<VertexId> = line.vertices().collect();
    let changed = line.replace_between(Some(ids[1]), Some(ids[0]), &[]);
    assert_eq!(changed, 2);
    assert_eq!(line.vertex_count(), 3);
    assert_chain_invariants(&line);
}

#[test]
fn test_replace_between_empty_insert_is_pure_removal() {
    let mut line = straight_line(5);
    let ids: Vec<VertexId> = line.vertices().collect();
    let changed = line.replace_between(Some(ids[0]), Some(ids[4]), &[]);
    assert_eq!(changed, 3);
    assert_eq!(line.vertex_count(), 2);
    assert_eq!(line.segment_count(), 1);
    assert_chain_invariants(&line);
}

#[test]
fn test_copy_range_full_span_round_trip() {
    let source = straight_line(5);
    let first = source.points().next().unwrap().time.clone().unwrap();
    let last = source.points().last().unwrap().time.clone().unwrap();
    let copy = source.copy_range(&first, &last).unwrap();

    assert_eq!(copy.vertex_count(), source.vertex_count());
    assert_eq!(copy.segment_count(), source.segment_count());
    let src_points: Vec<TrackPoint> = source.points().cloned().collect();
    let copy_points: Vec<TrackPoint> = copy.points().cloned().collect();
    assert_eq!(src_points, copy_points);
}

#[test]
fn test_copy_range_is_independently_owned() {
    let source = straight_line(4);
    let first = source.points().next().unwrap().time.clone().unwrap();
    let last = source.points().last().unwrap().time.clone().unwrap();
    let mut copy = source.copy_range(&first, &last).unwrap();

    // Mutate a copied vertex's point; the source must be unchanged
    copy.replace_between(
        Some(copy.vertex_at(0).unwrap()),
        Some(copy.vertex_at(2).unwrap()),
        &[make_point(0.0, 0.0)],
    );
    assert_eq!(copy.points().nth(1).unwrap().latitude, 0.0);
    assert!((source.points().nth(1).unwrap().latitude - 50.001).abs() < 1e-12);
    assert_eq!(source.vertex_count(), 4);
}

#[test]
fn test_copy_range_unmatched_bounds_cover_whole_track() {
    let source = straight_line(3);
    let copy = source.copy_range("nope", "also-nope").unwrap();
    assert_eq!(copy.vertex_count(), 3);
    assert!(Polyline::new().copy_range("a", "b").is_none());
}

#[test]
fn test_crop_between_times() {
    let mut line = straight_line(6);
    let removed = line.crop_between_times("2024-01-01T10:01:00Z", "2024-01-01T10:04:00Z");
    assert_eq!(removed, 2);
    assert_eq!(line.vertex_count(), 4);
    assert_chain_invariants(&line);
    assert_eq!(
        line.points().next().unwrap().time.as_deref(),
        Some("2024-01-01T10:01:00Z")
    );

    // Unmatched bounds leave the structure untouched
    let mut line = straight_line(4);
    assert_eq!(line.crop_between_times("x", "y"), 0);
    assert_eq!(line.vertex_count(), 4);
}

#[test]
fn test_find_vertex_by_time_survives_index_staleness() {
    let mut line = straight_line(4);
    let ids: Vec<VertexId> = line.vertices().collect();
    // Bare remove leaves the index stale; lookups must still be correct
    line.remove(&[ids[1]]);
    assert_eq!(line.find_vertex_by_time("2024-01-01T10:01:00Z"), None);
    assert_eq!(
        line.find_vertex_by_time("2024-01-01T10:02:00Z"),
        Some(ids[2])
    );
}

#[test]
fn test_segment_properties_populated() {
    let line = straight_line(3);
    for seg in line.segments() {
        let props = line.segment(seg).unwrap();
        assert!(props.length > 0.0);
        assert_eq!(props.duration, Some(60.0));
        assert!(props.speed.unwrap() > 0.0);
    }
}
