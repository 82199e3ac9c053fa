use std::time::Duration;

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use navigation::{
    camera::CameraController,
    config::{CameraConfig, TrackerConfig},
    geo::destination_point,
    map_view::TracingMapView,
    models::{Coordinate, PositionFix},
    tracker::RouteTracker,
};

fn route_of(points: usize) -> Vec<Coordinate> {
    let start = Coordinate { lat: 45.9306, lon: 4.5779 };
    (0..points)
        .map(|i| destination_point(start, i as f64 * 15.0, 60.0))
        .collect()
}

fn benchmark_tracker_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("tracker_update");
    let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();

    // Window search cost must not grow with route length.
    for points in [100usize, 1_000, 20_000] {
        let route = route_of(points);
        let fixes: Vec<Coordinate> = route
            .iter()
            .map(|p| destination_point(*p, 4.0, 150.0))
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(points), &route, |b, route| {
            b.iter(|| {
                let mut tracker = RouteTracker::new(TrackerConfig::default());
                for fix in fixes.iter().take(200) {
                    black_box(tracker.update(route, *fix, t0));
                }
            });
        });
    }

    group.finish();
}

fn benchmark_camera_updates(c: &mut Criterion) {
    let route = route_of(500);
    let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();

    c.bench_function("camera_on_position_200", |b| {
        b.iter(|| {
            let mut camera = CameraController::new(CameraConfig::default(), TracingMapView);
            camera.set_navigating(true);
            for (i, point) in route.iter().take(200).enumerate() {
                let now = t0 + chrono::Duration::from_std(Duration::from_millis(i as u64 * 50)).unwrap();
                let fix = PositionFix::new(*point, now).with_speed(13.0);
                black_box(camera.on_position(&fix, Some(&route[i..]), now));
            }
        });
    });
}

criterion_group!(benches, benchmark_tracker_update, benchmark_camera_updates);
criterion_main!(benches);
