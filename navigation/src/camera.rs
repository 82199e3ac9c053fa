use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::{
    clock::{add_duration, elapsed_since},
    config::CameraConfig,
    geo::{bearing_deg, destination_point, haversine_m},
    map_view::{CameraError, MapView},
    models::{CameraPose, Coordinate, EdgePadding, PositionFix},
};

/// Explicit user-facing camera mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraMode {
    #[default]
    Locked,
    Unlocked,
}

/// Effective tracking state at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraTracking {
    Locked,
    Unlocked,
    /// Inside a suppression window; reverts to the underlying mode afterwards.
    Suppressed { until: DateTime<Utc>, mode: CameraMode },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CameraControllerState {
    pub mode: CameraMode,
    pub suppressed_until: Option<DateTime<Utc>>,
    pub navigating: bool,
    /// Smoothed heading in degrees, [0, 360).
    pub heading: f64,
    pub previous_fix: Option<PositionFix>,
    pub last_command_at: Option<DateTime<Utc>>,
    /// Next automatic pose is applied instantly instead of animated.
    pub first_pose_pending: bool,
}

impl Default for CameraControllerState {
    fn default() -> Self {
        Self {
            mode: CameraMode::Locked,
            suppressed_until: None,
            navigating: false,
            heading: 0.0,
            previous_fix: None,
            last_command_at: None,
            first_pose_pending: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    pub edge_padding: EdgePadding,
    pub animated: bool,
    /// How long automatic tracking stays off while the fit animation runs.
    pub suppress_for: Duration,
}

/// One-off camera move. Unset pose fields fall back to the current mode's
/// defaults and the tracked heading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FocusOptions {
    pub heading: Option<f64>,
    pub pitch: Option<f64>,
    pub zoom: Option<f64>,
    pub altitude: Option<f64>,
    pub animation: Duration,
    pub suppress_for: Duration,
}

pub struct CameraController<V: MapView> {
    config: CameraConfig,
    state: CameraControllerState,
    view: V,
}

impl<V: MapView> CameraController<V> {
    pub fn new(config: CameraConfig, view: V) -> Self {
        Self {
            config,
            state: CameraControllerState::default(),
            view,
        }
    }

    pub fn state(&self) -> &CameraControllerState {
        &self.state
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    pub fn heading(&self) -> f64 {
        self.state.heading
    }

    pub fn default_fit_options(&self) -> FitOptions {
        FitOptions {
            edge_padding: EdgePadding::uniform(self.config.fit_edge_padding_px),
            animated: true,
            suppress_for: Duration::from_millis(self.config.default_suppress_ms),
        }
    }

    pub fn default_focus_options(&self) -> FocusOptions {
        FocusOptions {
            heading: None,
            pitch: None,
            zoom: None,
            altitude: None,
            animation: Duration::from_millis(self.config.focus_animation_ms),
            suppress_for: Duration::from_millis(self.config.focus_suppress_ms),
        }
    }

    /// Follow the device again. The next pose still waits out the update
    /// interval of the previous command.
    pub fn lock(&mut self) {
        self.state.mode = CameraMode::Locked;
    }

    pub fn unlock(&mut self) {
        self.state.mode = CameraMode::Unlocked;
    }

    pub fn set_navigating(&mut self, navigating: bool) {
        if self.state.navigating == navigating {
            return;
        }
        self.state.navigating = navigating;
        if navigating {
            self.state.first_pose_pending = true;
        }
    }

    /// Enter (or extend) the suppression window. Never shortens an existing one.
    pub fn temporarily_disable_tracking(&mut self, duration: Duration, now: DateTime<Utc>) {
        let until = add_duration(now, duration);
        self.state.suppressed_until = Some(match self.state.suppressed_until {
            Some(existing) if existing > until => existing,
            _ => until,
        });
    }

    pub fn tracking(&self, now: DateTime<Utc>) -> CameraTracking {
        match self.state.suppressed_until {
            Some(until) if now < until => CameraTracking::Suppressed {
                until,
                mode: self.state.mode,
            },
            _ => match self.state.mode {
                CameraMode::Locked => CameraTracking::Locked,
                CameraMode::Unlocked => CameraTracking::Unlocked,
            },
        }
    }

    /// Feed a fix: refresh the smoothed heading, then push a pose if the
    /// camera is locked and the throttle interval has elapsed.
    ///
    /// `route_ahead` is the remaining route starting at the tracker's closest
    /// point. Returns the pose that reached the view, if any.
    pub fn on_position(
        &mut self,
        fix: &PositionFix,
        route_ahead: Option<&[Coordinate]>,
        now: DateTime<Utc>,
    ) -> Option<CameraPose> {
        let position = fix.coordinate();
        if !position.is_valid() {
            tracing::debug!("camera: ignoring invalid fix {:?}", fix);
            return None;
        }
        self.update_heading(fix, route_ahead);

        if self.tracking(now) != CameraTracking::Locked {
            return None;
        }
        let interval = self.config.update_interval(self.state.navigating);
        if let Some(last) = self.state.last_command_at {
            if elapsed_since(last, now) < interval {
                return None;
            }
        }

        let pose = self.pose_for(position);
        if !pose.is_finite() {
            tracing::warn!("camera: {}", CameraError::InvalidPose(format!("{pose:?}")));
            return None;
        }
        let result = if self.state.first_pose_pending {
            self.send(|view| view.set_camera(&pose))
        } else {
            self.send(|view| view.animate_camera(&pose, interval))
        };
        result.ok()?;

        self.state.last_command_at = Some(now);
        self.state.first_pose_pending = false;
        Some(pose)
    }

    /// Chase pose while navigating, north-up overview otherwise.
    pub fn pose_for(&self, position: Coordinate) -> CameraPose {
        let config = &self.config;
        if self.state.navigating {
            CameraPose {
                center: destination_point(position, config.chase_offset_m(), self.state.heading),
                heading: self.state.heading,
                pitch: config.navigation_pitch_deg,
                altitude: config.navigation_altitude_m,
                zoom: config.navigation_zoom,
            }
        } else {
            CameraPose {
                center: position,
                heading: 0.0,
                pitch: config.overview_pitch_deg,
                altitude: config.overview_altitude_m,
                zoom: config.overview_zoom,
            }
        }
    }

    /// Suppress automatic tracking, then frame `points`. No-op without points.
    pub fn fit_to_coordinates(&mut self, points: &[Coordinate], options: FitOptions, now: DateTime<Utc>) {
        if points.is_empty() {
            return;
        }
        self.temporarily_disable_tracking(options.suppress_for, now);
        let _ = self.send(|view| view.fit_to_coordinates(points, options.edge_padding, options.animated));
    }

    /// Suppress automatic tracking briefly and animate to `point`.
    pub fn focus_on_location(&mut self, point: Coordinate, options: FocusOptions, now: DateTime<Utc>) {
        if !point.is_valid() {
            tracing::warn!("camera: refusing to focus on invalid point {:?}", point);
            return;
        }
        self.temporarily_disable_tracking(options.suppress_for, now);

        let defaults = self.pose_for(point);
        let pose = CameraPose {
            center: point,
            heading: options.heading.unwrap_or(self.state.heading),
            pitch: options.pitch.unwrap_or(defaults.pitch),
            altitude: options.altitude.unwrap_or(defaults.altitude),
            zoom: options.zoom.unwrap_or(defaults.zoom),
        };
        let _ = self.send(|view| view.animate_camera(&pose, options.animation));
    }

    fn update_heading(&mut self, fix: &PositionFix, route_ahead: Option<&[Coordinate]>) {
        let current = fix.coordinate();
        if let Some(previous) = self.state.previous_fix {
            let moved_m = haversine_m(previous.coordinate(), current);
            let elapsed_s = (fix.timestamp - previous.timestamp).num_milliseconds() as f64 / 1000.0;
            let speed = if elapsed_s > 0.0 {
                moved_m / elapsed_s
            } else {
                fix.speed.unwrap_or(0.0)
            };

            if speed > self.config.min_heading_speed_mps && moved_m > 0.0 {
                let travel = bearing_deg(previous.coordinate(), current);
                self.state.heading = route_ahead
                    .and_then(|ahead| {
                        look_ahead_bearing(current, ahead, self.config.heading_look_ahead_m, travel)
                    })
                    .unwrap_or(travel);
            }
        }
        self.state.previous_fix = Some(*fix);
    }

    /// Run a view command, logging and swallowing any failure.
    fn send(&mut self, command: impl FnOnce(&mut V) -> Result<(), CameraError>) -> Result<(), CameraError> {
        command(&mut self.view).inspect_err(|err| {
            tracing::warn!("camera command failed: {err}");
        })
    }
}

/// Bearing from `position` to the first route point at least `min_distance_m`
/// away that lies ahead of the device, i.e. within 90° of `travel_deg`.
fn look_ahead_bearing(
    position: Coordinate,
    ahead: &[Coordinate],
    min_distance_m: f64,
    travel_deg: f64,
) -> Option<f64> {
    ahead
        .iter()
        .filter(|point| haversine_m(position, **point) >= min_distance_m)
        .map(|point| bearing_deg(position, *point))
        .find(|bearing| angle_between(*bearing, travel_deg) <= 90.0)
}

fn angle_between(a: f64, b: f64) -> f64 {
    let diff = (a - b).rem_euclid(360.0);
    diff.min(360.0 - diff)
}
