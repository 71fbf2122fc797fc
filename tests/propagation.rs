//! Tests for derived-property propagation and elevation enrichment.

use std::collections::HashMap;

use trackline::{ElevationKey, EnrichmentEvent, Polyline, TrackPoint};

fn timed(lat: f64, lng: f64, minute: usize, alt: f64) -> TrackPoint {
    TrackPoint::new(lat, lng)
        .with_altitude(alt)
        .with_time(format!("2024-06-01T08:{minute:02}:00Z"))
}

#[test]
fn test_recompute_is_idempotent() {
    let mut line = Polyline::from_points([
        timed(50.0, 7.0, 0, 100.0),
        timed(50.001, 7.001, 1, 110.0),
        timed(50.002, 7.0, 2, 105.0),
        timed(50.003, 7.001, 3, 120.0),
    ]);
    let segments_before: Vec<_> = line
        .segments()
        .map(|s| *line.segment(s).unwrap())
        .collect();
    let paths_before: Vec<_> = line.points().map(|p| p.path).collect();

    line.recompute();

    let segments_after: Vec<_> = line
        .segments()
        .map(|s| *line.segment(s).unwrap())
        .collect();
    let paths_after: Vec<_> = line.points().map(|p| p.path).collect();
    assert_eq!(segments_before, segments_after);
    assert_eq!(paths_before, paths_after);
}

#[test]
fn test_endpoint_vertices_have_no_turn() {
    let line = Polyline::from_points([
        timed(50.0, 7.0, 0, 100.0),
        timed(50.001, 7.001, 1, 100.0),
        timed(50.002, 7.0, 2, 100.0),
    ]);
    let paths: Vec<_> = line.points().map(|p| p.path.unwrap()).collect();
    assert_eq!(paths[0].turn, None);
    assert!(paths[1].turn.is_some());
    assert_eq!(paths[2].turn, None);
    // But every vertex with an adjacent timed segment has an average speed
    assert!(paths.iter().all(|p| p.avg_speed.is_some()));
}

#[test]
fn test_single_point_has_no_path_properties() {
    let mut line = Polyline::new();
    line.append(TrackPoint::new(50.0, 7.0));
    assert_eq!(line.points().next().unwrap().path, None);
}

#[test]
fn test_local_maximum_populates_both_rates() {
    // Climb then descend: the middle vertex is a local elevation maximum
    let line = Polyline::from_points([
        timed(50.0, 7.0, 0, 100.0),
        timed(50.001, 7.0, 1, 160.0), // +60 m over 60 s -> +1.0 m/s
        timed(50.002, 7.0, 2, 130.0), // -30 m over 60 s -> -0.5 m/s
    ]);
    let middle = line.points().nth(1).unwrap().path.unwrap();
    assert!((middle.ascent_rate.unwrap() - 1.0).abs() < 1e-9);
    assert!((middle.descent_rate.unwrap() - 0.5).abs() < 1e-9);
}

#[test]
fn test_monotonic_slope_averages_one_side() {
    let line = Polyline::from_points([
        timed(50.0, 7.0, 0, 100.0),
        timed(50.001, 7.0, 1, 130.0), // +0.5 m/s
        timed(50.002, 7.0, 2, 190.0), // +1.0 m/s
    ]);
    let middle = line.points().nth(1).unwrap().path.unwrap();
    assert!((middle.ascent_rate.unwrap() - 0.75).abs() < 1e-9);
    assert_eq!(middle.descent_rate, None);
}

#[test]
fn test_zero_duration_segment_has_infinite_speed() {
    let line = Polyline::from_points([
        TrackPoint::new(50.0, 7.0).with_time("2024-06-01T08:00:00Z"),
        TrackPoint::new(50.01, 7.0).with_time("2024-06-01T08:00:00Z"),
    ]);
    let seg = line.segments().next().unwrap();
    let props = line.segment(seg).unwrap();
    assert_eq!(props.duration, Some(0.0));
    assert_eq!(props.speed, Some(f64::INFINITY));
}

#[test]
fn test_untimed_segment_has_no_speed() {
    let line = Polyline::from_points([TrackPoint::new(50.0, 7.0), TrackPoint::new(50.01, 7.0)]);
    let seg = line.segments().next().unwrap();
    let props = line.segment(seg).unwrap();
    assert_eq!(props.duration, None);
    assert_eq!(props.speed, None);
    assert!(props.length > 0.0);
}

#[test]
fn test_elevation_request_deduplicates_coordinates() {
    let line = Polyline::from_points([
        TrackPoint::new(50.0, 7.0),
        TrackPoint::new(50.001, 7.0),
        TrackPoint::new(50.0, 7.0), // revisit
    ]);
    let request = line.elevation_request().unwrap();
    assert_eq!(request.coordinates.len(), 2);
    assert_eq!(request.coordinates[0], (50.0, 7.0));
    assert!(Polyline::new().elevation_request().is_none());
}

#[test]
fn test_apply_elevations_exact_match_only() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut line = Polyline::from_points([
        timed(50.0, 7.0, 0, 100.0),
        timed(50.001, 7.0, 1, 100.0),
        timed(50.002, 7.0, 2, 100.0),
    ]);
    let mut lookup = HashMap::new();
    lookup.insert(ElevationKey::new(50.0, 7.0), 95.0);
    lookup.insert(ElevationKey::new(50.001, 7.0), 155.0);
    // Not quite the third point's coordinates: must not apply
    lookup.insert(ElevationKey::new(50.0020001, 7.0), 130.0);

    let mut events = Vec::new();
    let report = line.apply_elevations_with(&lookup, &mut |e| events.push(e));
    assert_eq!(report.applied, 2);
    assert_eq!(report.missing, 1);
    assert_eq!(events.len(), 3);
    assert!(matches!(events[2], EnrichmentEvent::Missing { .. }));

    let points: Vec<_> = line.points().cloned().collect();
    assert_eq!(points[0].elevation, Some(95.0));
    assert_eq!(points[1].elevation, Some(155.0));
    assert_eq!(points[2].elevation, None);
    // Altitude is untouched; it is a distinct field
    assert_eq!(points[0].altitude, Some(100.0));
}

#[test]
fn test_apply_elevations_reruns_height_derivation() {
    let mut line = Polyline::from_points([
        timed(50.0, 7.0, 0, 100.0),
        timed(50.001, 7.0, 1, 100.0),
    ]);
    let seg = line.segments().next().unwrap();
    assert_eq!(line.segment(seg).unwrap().height, Some(0.0));

    let mut lookup = HashMap::new();
    lookup.insert(ElevationKey::new(50.0, 7.0), 100.0);
    lookup.insert(ElevationKey::new(50.001, 7.0), 160.0);
    line.apply_elevations(&lookup);

    let props = line.segment(seg).unwrap();
    assert_eq!(props.height, Some(60.0));
    assert!((props.height_rate.unwrap() - 1.0).abs() < 1e-9);
    // Geometry is untouched by the elevation-only pass
    assert_eq!(props.duration, Some(60.0));
}
