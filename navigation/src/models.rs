use serde::{Deserialize, Serialize};

pub use shared::{
    Coordinate, DirectionsResponse, DirectionsRoute, Measure, PositionFix, Route, TrackedSegments,
};

/// Camera state pushed to the map view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub center: Coordinate,
    /// Degrees clockwise from north, [0, 360).
    pub heading: f64,
    pub pitch: f64,
    /// Used by views that position the camera by altitude (iOS).
    pub altitude: f64,
    /// Used by views that position the camera by zoom level (Android).
    pub zoom: f64,
}

impl CameraPose {
    pub fn is_finite(&self) -> bool {
        self.center.lat.is_finite()
            && self.center.lon.is_finite()
            && self.heading.is_finite()
            && self.pitch.is_finite()
            && self.altitude.is_finite()
            && self.zoom.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgePadding {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl EdgePadding {
    pub fn uniform(px: f64) -> Self {
        Self {
            top: px,
            right: px,
            bottom: px,
            left: px,
        }
    }
}

/// Where the session stands along the active route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NavigationProgress {
    pub closest_point_index: usize,
    /// Distance from the last fix to the closest route point, once a fix arrived.
    pub distance_to_route_m: Option<f64>,
    pub remaining_distance_m: f64,
    /// Route duration scaled by the share of distance still ahead.
    pub remaining_duration_s: f64,
    pub off_route_counter: u32,
}
