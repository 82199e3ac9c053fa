use std::{sync::Arc, time::Duration};

use crate::{
    camera::{CameraController, FitOptions, FocusOptions},
    clock::{Clock, SystemClock},
    config::NavigationConfig,
    error::NavigationError,
    geo::path_length_m,
    map_view::MapView,
    models::{Coordinate, NavigationProgress, PositionFix, Route, TrackedSegments},
    routing_client::{DirectionsRequest, RoutingError},
    tracker::RouteTracker,
};

/// A re-route the caller must perform. Hand the result back through
/// [`NavigationSession::complete_reroute`] with the same ticket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RerouteTicket {
    pub request_id: u64,
    pub request: DirectionsRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RerouteOutcome {
    /// The new route replaced the active one.
    Applied,
    /// A newer route or request superseded this ticket; the response was dropped.
    Stale,
}

/// Per-navigation state container owned by the navigation screen.
pub struct NavigationSession<V: MapView> {
    config: NavigationConfig,
    clock: Arc<dyn Clock>,
    tracker: RouteTracker,
    camera: CameraController<V>,
    route: Option<Route>,
    destination: Option<Coordinate>,
    navigating: bool,
}

impl<V: MapView> NavigationSession<V> {
    pub fn new(config: NavigationConfig, view: V) -> Self {
        Self::with_clock(config, view, Arc::new(SystemClock))
    }

    pub fn with_clock(config: NavigationConfig, view: V, clock: Arc<dyn Clock>) -> Self {
        let tracker = RouteTracker::new(config.tracker.clone());
        let camera = CameraController::new(config.camera.clone(), view);
        Self {
            config,
            clock,
            tracker,
            camera,
            route: None,
            destination: None,
            navigating: false,
        }
    }

    pub fn config(&self) -> &NavigationConfig {
        &self.config
    }

    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    pub fn tracker(&self) -> &RouteTracker {
        &self.tracker
    }

    pub fn camera(&self) -> &CameraController<V> {
        &self.camera
    }

    pub fn view(&self) -> &V {
        self.camera.view()
    }

    pub fn view_mut(&mut self) -> &mut V {
        self.camera.view_mut()
    }

    pub fn is_navigating(&self) -> bool {
        self.navigating
    }

    /// Replace the active route and restart tracking from its first point.
    /// An in-flight re-route becomes stale.
    pub fn set_active_route(&mut self, route: Route) {
        tracing::info!(
            "active route set: {} points, {:.0}m, avoid_tolls={}",
            route.coordinates.len(),
            route.distance.value,
            route.avoid_tolls
        );
        self.tracker.reset();
        self.route = Some(route);
    }

    pub fn clear_route(&mut self) {
        self.tracker.reset();
        self.route = None;
    }

    pub fn set_destination(&mut self, destination: Coordinate) {
        self.destination = Some(destination);
    }

    /// Explicit destination, else the active route's last point.
    pub fn destination(&self) -> Option<Coordinate> {
        self.destination
            .or_else(|| self.route.as_ref().and_then(Route::end))
    }

    pub fn start_navigation(&mut self) {
        self.navigating = true;
        self.camera.set_navigating(true);
    }

    pub fn stop_navigation(&mut self) {
        self.navigating = false;
        self.camera.set_navigating(false);
    }

    /// Process one fix in arrival order: tracker first, then camera.
    ///
    /// Returns a ticket when the device has been off route long enough to
    /// request a new route. Processing never waits on that request.
    pub fn on_position(&mut self, fix: PositionFix) -> Option<RerouteTicket> {
        let position = fix.coordinate();
        if !position.is_valid() {
            tracing::debug!("ignoring invalid fix {:?}", fix);
            return None;
        }
        let now = self.clock.now();
        let destination = self.destination();
        let mut ticket = None;

        if self.navigating {
            if let Some(route) = &self.route {
                let update = self.tracker.update(&route.coordinates, position, now);
                if let Some(request_id) = update.and_then(|u| u.reroute_request) {
                    match destination {
                        Some(destination) => {
                            ticket = Some(RerouteTicket {
                                request_id,
                                request: DirectionsRequest {
                                    origin: position,
                                    destination,
                                    avoid_tolls: route.avoid_tolls,
                                },
                            });
                        }
                        None => {
                            tracing::warn!("off route but no destination is known, skipping re-route");
                            self.tracker.finish_recalculation(request_id);
                        }
                    }
                }
            }
        }

        let route_ahead = match (&self.route, self.navigating) {
            (Some(route), true) => {
                let index = self.tracker.state().closest_point_index;
                route.coordinates.get(index..)
            }
            _ => None,
        };
        self.camera.on_position(&fix, route_ahead, now);

        ticket
    }

    /// Feed back the answer to a re-route ticket.
    ///
    /// Stale answers are dropped whatever their content. A failure leaves the
    /// current route and tracking state untouched; the cooldown still applies.
    pub fn complete_reroute(
        &mut self,
        ticket: RerouteTicket,
        result: Result<Route, RoutingError>,
    ) -> Result<RerouteOutcome, NavigationError> {
        if !self.tracker.finish_recalculation(ticket.request_id) {
            tracing::info!("discarding stale re-route response #{}", ticket.request_id);
            return Ok(RerouteOutcome::Stale);
        }

        let route = match result {
            Ok(route) => route,
            Err(err) => {
                tracing::warn!("re-route #{} failed, keeping current route: {err}", ticket.request_id);
                return Err(err.into());
            }
        };
        if route.coordinates.len() < 2 {
            tracing::warn!("re-route #{} returned a degenerate route", ticket.request_id);
            return Err(NavigationError::InvalidRoute(format!(
                "{} coordinate(s)",
                route.coordinates.len()
            )));
        }

        let preview: Vec<Coordinate> = route
            .coordinates
            .iter()
            .take(self.config.tracker.reroute_fit_points)
            .copied()
            .collect();
        self.set_active_route(route);

        let options = FitOptions {
            suppress_for: self.config.tracker.reroute_fit_duration(),
            ..self.camera.default_fit_options()
        };
        let now = self.clock.now();
        self.camera.fit_to_coordinates(&preview, options, now);

        Ok(RerouteOutcome::Applied)
    }

    /// Release the in-flight flag when the pending request will never answer.
    pub fn abandon_pending_reroute(&mut self) {
        if let Some(request_id) = self.tracker.state().pending_request {
            tracing::warn!("abandoning re-route #{request_id}");
            self.tracker.finish_recalculation(request_id);
        }
    }

    pub fn tracked_segments(&self) -> TrackedSegments {
        match &self.route {
            Some(route) => self.tracker.segments(&route.coordinates),
            None => TrackedSegments::default(),
        }
    }

    pub fn progress(&self) -> Option<NavigationProgress> {
        let route = self.route.as_ref()?;
        let state = self.tracker.state();
        let index = state.closest_point_index;

        let total_m = path_length_m(&route.coordinates);
        let remaining_m = route
            .coordinates
            .get(index..)
            .map(path_length_m)
            .unwrap_or(0.0);
        let remaining_duration_s = if total_m > 0.0 {
            route.duration.value * remaining_m / total_m
        } else {
            0.0
        };

        Some(NavigationProgress {
            closest_point_index: index,
            distance_to_route_m: state.last_distance_m,
            remaining_distance_m: remaining_m,
            remaining_duration_s,
            off_route_counter: state.off_route_counter,
        })
    }

    pub fn lock_camera(&mut self) {
        self.camera.lock();
    }

    pub fn unlock_camera(&mut self) {
        self.camera.unlock();
    }

    pub fn default_fit_options(&self) -> FitOptions {
        self.camera.default_fit_options()
    }

    pub fn default_focus_options(&self) -> FocusOptions {
        self.camera.default_focus_options()
    }

    pub fn fit_to_coordinates(&mut self, points: &[Coordinate], options: FitOptions) {
        let now = self.clock.now();
        self.camera.fit_to_coordinates(points, options, now);
    }

    pub fn focus_on_location(&mut self, point: Coordinate, options: FocusOptions) {
        let now = self.clock.now();
        self.camera.focus_on_location(point, options, now);
    }

    pub fn temporarily_disable_tracking(&mut self, duration: Duration) {
        let now = self.clock.now();
        self.camera.temporarily_disable_tracking(duration, now);
    }
}
