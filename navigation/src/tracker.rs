use chrono::{DateTime, Utc};

use crate::{
    clock::elapsed_since,
    config::TrackerConfig,
    geo::haversine_m,
    models::{Coordinate, TrackedSegments},
};

/// Mutable tracking state for the active route. Reset whenever the route
/// changes, never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteTrackerState {
    /// Last known nearest polyline index. Never decreases for a given route.
    pub closest_point_index: usize,
    /// Consecutive samples further than the threshold from the route.
    pub off_route_counter: u32,
    pub last_recalculation_at: Option<DateTime<Utc>>,
    pub is_recalculating: bool,
    /// Token of the re-route request whose response may still be applied.
    pub pending_request: Option<u64>,
    pub last_position: Option<Coordinate>,
    pub last_distance_m: Option<f64>,
}

/// Outcome of feeding one position to the tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackingUpdate {
    pub closest_point_index: usize,
    /// Minimum distance to the route inside the search window.
    pub distance_m: f64,
    pub off_route: bool,
    pub off_route_counter: u32,
    /// Set when this sample started a re-route; carries the request token.
    pub reroute_request: Option<u64>,
}

pub struct RouteTracker {
    config: TrackerConfig,
    state: RouteTrackerState,
    next_request_id: u64,
}

impl RouteTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            state: RouteTrackerState::default(),
            next_request_id: 1,
        }
    }

    pub fn state(&self) -> &RouteTrackerState {
        &self.state
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Forget everything tied to the previous route. Any in-flight re-route
    /// becomes stale. The recalculation timestamp survives so the cooldown
    /// keeps applying across route swaps.
    pub fn reset(&mut self) {
        let last_recalculation_at = self.state.last_recalculation_at;
        self.state = RouteTrackerState {
            last_recalculation_at,
            ..RouteTrackerState::default()
        };
    }

    /// Map `position` onto `route` and decide whether a re-route is due.
    ///
    /// Returns `None` for an empty route, which is an idle state rather than
    /// an error.
    pub fn update(
        &mut self,
        route: &[Coordinate],
        position: Coordinate,
        now: DateTime<Utc>,
    ) -> Option<TrackingUpdate> {
        let (found_index, distance_m) = self.nearest_in_window(route, position)?;

        // The backward part of the window absorbs GPS noise for the distance
        // check but never rewinds progress.
        let previous = self.state.closest_point_index;
        self.state.closest_point_index = found_index.max(previous).min(route.len() - 1);
        self.state.last_position = Some(position);
        self.state.last_distance_m = Some(distance_m);

        let off_route = distance_m > self.config.off_route_threshold_m;
        if off_route {
            self.state.off_route_counter = self.state.off_route_counter.saturating_add(1);
        } else {
            self.state.off_route_counter = 0;
        }

        let reroute_request = if self.reroute_due(now) {
            Some(self.begin_recalculation(now))
        } else {
            None
        };

        tracing::debug!(
            "tracker: index {} -> {}, distance {:.1}m, off-route count {}",
            previous,
            self.state.closest_point_index,
            distance_m,
            self.state.off_route_counter
        );

        Some(TrackingUpdate {
            closest_point_index: self.state.closest_point_index,
            distance_m,
            off_route,
            off_route_counter: self.state.off_route_counter,
            reroute_request,
        })
    }

    /// Traveled prefix (closing on the last position) and remaining suffix.
    /// Both contain the closest route point.
    pub fn segments(&self, route: &[Coordinate]) -> TrackedSegments {
        let Some(position) = self.state.last_position else {
            return TrackedSegments {
                traveled: Vec::new(),
                remaining: route.to_vec(),
            };
        };
        if route.is_empty() {
            return TrackedSegments::default();
        }

        let split = self.state.closest_point_index.min(route.len() - 1);
        let mut traveled = Vec::with_capacity(split + 2);
        traveled.extend_from_slice(&route[..=split]);
        traveled.push(position);

        TrackedSegments {
            traveled,
            remaining: route[split..].to_vec(),
        }
    }

    /// Clear the in-flight flag if `request_id` is the pending request.
    /// Returns `false` for stale or unknown tokens, which must be ignored.
    pub fn finish_recalculation(&mut self, request_id: u64) -> bool {
        if self.state.pending_request != Some(request_id) {
            return false;
        }
        self.state.pending_request = None;
        self.state.is_recalculating = false;
        true
    }

    fn reroute_due(&self, now: DateTime<Utc>) -> bool {
        if self.state.off_route_counter <= self.config.off_route_samples {
            return false;
        }
        if self.state.is_recalculating {
            tracing::debug!("tracker: off route but a recalculation is already in flight");
            return false;
        }
        match self.state.last_recalculation_at {
            Some(last) if elapsed_since(last, now) < self.config.reroute_cooldown() => {
                tracing::debug!("tracker: off route but still inside re-route cooldown");
                false
            }
            _ => true,
        }
    }

    fn begin_recalculation(&mut self, now: DateTime<Utc>) -> u64 {
        let request_id = self.next_request_id;
        self.next_request_id += 1;
        self.state.is_recalculating = true;
        self.state.last_recalculation_at = Some(now);
        self.state.pending_request = Some(request_id);
        tracing::info!(
            "tracker: off route for {} samples, requesting re-route #{request_id}",
            self.state.off_route_counter
        );
        request_id
    }

    /// Nearest point in `[index - behind, index + ahead]`; first one wins ties.
    fn nearest_in_window(&self, route: &[Coordinate], position: Coordinate) -> Option<(usize, f64)> {
        if route.is_empty() {
            return None;
        }
        let last = route.len() - 1;
        let center = self.state.closest_point_index.min(last);
        let start = center.saturating_sub(self.config.search_behind);
        let end = center.saturating_add(self.config.search_ahead).min(last);

        route[start..=end]
            .iter()
            .enumerate()
            .map(|(offset, point)| (start + offset, haversine_m(*point, position)))
            .fold(None, |best: Option<(usize, f64)>, candidate| match best {
                Some(current) if current.1 <= candidate.1 => Some(current),
                _ => Some(candidate),
            })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::TimeZone;

    use super::*;
    use crate::geo::destination_point;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    fn at(seconds: i64) -> DateTime<Utc> {
        t0() + chrono::Duration::seconds(seconds)
    }

    /// Straight east-bound line along the equator, `count` points from (0,0) to (0,0.01).
    fn straight_route(count: usize) -> Vec<Coordinate> {
        let start = Coordinate { lat: 0.0, lon: 0.0 };
        let end = Coordinate { lat: 0.0, lon: 0.01 };
        (0..count)
            .map(|i| start.interpolate(end, i as f64 / (count - 1) as f64))
            .collect()
    }

    fn north_of(point: Coordinate, meters: f64) -> Coordinate {
        destination_point(point, meters, 0.0)
    }

    fn tracker() -> RouteTracker {
        RouteTracker::new(TrackerConfig::default())
    }

    #[test]
    fn segments_before_first_fix_are_empty_and_full() {
        let route = straight_route(10);
        let segments = tracker().segments(&route);
        assert!(segments.traveled.is_empty());
        assert_eq!(segments.remaining, route);
    }

    #[test]
    fn empty_route_is_ignored() {
        let mut tracker = tracker();
        assert!(tracker.update(&[], Coordinate { lat: 0.0, lon: 0.0 }, t0()).is_none());
        assert_eq!(tracker.state(), &RouteTrackerState::default());
    }

    #[test]
    fn splits_route_at_closest_point() {
        let route = straight_route(10);
        let mut tracker = tracker();
        let position = north_of(route[4], 5.0);

        let update = tracker.update(&route, position, t0()).unwrap();
        assert_eq!(update.closest_point_index, 4);

        let segments = tracker.segments(&route);
        assert_eq!(segments.traveled.len(), 6);
        assert_eq!(&segments.traveled[..5], &route[..=4]);
        assert_eq!(segments.traveled[5], position);
        assert_eq!(segments.remaining, route[4..].to_vec());

        let shared: Vec<_> = segments
            .traveled
            .iter()
            .filter(|p| segments.remaining.contains(*p))
            .collect();
        assert_eq!(shared, vec![&route[4]]);
    }

    #[test]
    fn deviation_threshold_is_strict() {
        let route = straight_route(10);
        let mut tracker = tracker();

        for step in 0..5 {
            let update = tracker
                .update(&route, north_of(route[3], 49.0), at(step))
                .unwrap();
            assert!(!update.off_route);
            assert_eq!(update.off_route_counter, 0);
        }

        for step in 1..=3 {
            let update = tracker
                .update(&route, north_of(route[3], 51.0), at(10 + step))
                .unwrap();
            assert!(update.off_route);
            assert_eq!(update.off_route_counter, step as u32);
            assert!(update.reroute_request.is_none());
        }
    }

    #[test]
    fn counter_resets_when_back_on_route() {
        let route = straight_route(10);
        let mut tracker = tracker();
        tracker.update(&route, north_of(route[2], 80.0), at(0));
        tracker.update(&route, north_of(route[2], 80.0), at(1));
        assert_eq!(tracker.state().off_route_counter, 2);

        tracker.update(&route, north_of(route[2], 10.0), at(2));
        assert_eq!(tracker.state().off_route_counter, 0);
    }

    #[test]
    fn fourth_off_route_sample_triggers_single_reroute() {
        let route = straight_route(10);
        let mut tracker = tracker();
        let off = north_of(route[4], 51.0);

        let requests: Vec<_> = (0..8)
            .filter_map(|step| tracker.update(&route, off, at(step)).unwrap().reroute_request)
            .collect();

        assert_eq!(requests.len(), 1);
        assert!(tracker.state().is_recalculating);
        assert_eq!(tracker.state().last_recalculation_at, Some(at(3)));
    }

    #[test]
    fn cooldown_blocks_second_episode() {
        let route = straight_route(10);
        let mut tracker = tracker();
        let off = north_of(route[4], 80.0);
        let on = route[4];

        let mut requests = Vec::new();
        for step in 0..4 {
            requests.extend(tracker.update(&route, off, at(step)).unwrap().reroute_request);
        }
        assert_eq!(requests.len(), 1);
        // failed request: flag cleared, cooldown still running
        assert!(tracker.finish_recalculation(requests[0]));

        tracker.update(&route, on, at(4));
        for step in 5..9 {
            requests.extend(tracker.update(&route, off, at(step)).unwrap().reroute_request);
        }
        assert_eq!(requests.len(), 1, "second episode inside cooldown must not re-route");

        let later = tracker.update(&route, off, at(14)).unwrap();
        assert!(later.reroute_request.is_some(), "cooldown elapsed, retry allowed");
    }

    #[test]
    fn in_flight_recalculation_blocks_new_requests() {
        let route = straight_route(10);
        let mut tracker = tracker();
        let off = north_of(route[4], 80.0);

        let mut requests = Vec::new();
        for step in 0..40 {
            requests.extend(tracker.update(&route, off, at(step)).unwrap().reroute_request);
        }
        assert_eq!(requests.len(), 1);
    }

    #[test]
    fn stale_tokens_are_rejected() {
        let route = straight_route(10);
        let mut tracker = tracker();
        let off = north_of(route[4], 80.0);
        let request = (0..4)
            .find_map(|step| tracker.update(&route, off, at(step)).unwrap().reroute_request)
            .unwrap();

        tracker.reset();
        assert!(!tracker.finish_recalculation(request));
        assert!(!tracker.state().is_recalculating);
        assert_eq!(tracker.state().last_recalculation_at, Some(at(3)));
    }

    #[test]
    fn index_never_moves_backwards() {
        let route = straight_route(10);
        let mut tracker = tracker();
        tracker.update(&route, route[6], at(0));
        let update = tracker.update(&route, route[4], at(1)).unwrap();
        assert_eq!(update.closest_point_index, 6);
        assert!(update.distance_m < 1.0, "backward window still measures deviation");
    }

    #[test]
    fn search_window_is_bounded_ahead() {
        let route = straight_route(100);
        let mut tracker = tracker();
        // jump far beyond the 30-point look-ahead window
        let update = tracker.update(&route, route[80], t0()).unwrap();
        assert_eq!(update.closest_point_index, 30);
        assert!(update.off_route);
    }

    #[test]
    fn reset_restarts_from_route_start() {
        let route = straight_route(10);
        let mut tracker = tracker();
        tracker.update(&route, route[7], t0());
        tracker.reset();
        assert_eq!(tracker.state().closest_point_index, 0);
        assert_eq!(tracker.state().off_route_counter, 0);
        assert!(tracker.segments(&route).traveled.is_empty());
    }

    #[test]
    fn cooldown_uses_configured_window() {
        let config = TrackerConfig {
            reroute_cooldown_ms: 2_000,
            ..TrackerConfig::default()
        };
        let route = straight_route(10);
        let mut tracker = RouteTracker::new(config);
        let off = north_of(route[4], 80.0);
        let first = (0..4)
            .find_map(|step| tracker.update(&route, off, at(step)).unwrap().reroute_request)
            .unwrap();
        tracker.finish_recalculation(first);

        let later = t0() + chrono::Duration::from_std(Duration::from_millis(5_500)).unwrap();
        assert!(tracker.update(&route, off, later).unwrap().reroute_request.is_some());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_forward_motion_keeps_index_monotonic(
                steps in prop::collection::vec((0.0f64..0.6, -20.0f64..20.0), 1..60)
            ) {
                let route = straight_route(50);
                let mut tracker = tracker();
                let mut progress = 0.0;
                let mut previous = 0;
                for (i, (advance, lateral)) in steps.into_iter().enumerate() {
                    progress = (progress + advance).min(49.0);
                    let base = route[0].interpolate(route[49], progress / 49.0);
                    let position = destination_point(base, lateral.abs(), if lateral >= 0.0 { 0.0 } else { 180.0 });
                    let update = tracker.update(&route, position, at(i as i64)).unwrap();
                    prop_assert!(update.closest_point_index >= previous);
                    previous = update.closest_point_index;
                }
            }

            #[test]
            fn prop_segments_overlap_at_one_point(index in 0usize..20) {
                let route = straight_route(20);
                let mut tracker = tracker();
                tracker.update(&route, route[index], t0());
                let segments = tracker.segments(&route);
                prop_assert_eq!(segments.traveled.len() + segments.remaining.len(), route.len() + 2);
                prop_assert_eq!(segments.traveled[index], segments.remaining[0]);
            }
        }
    }
}
