use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    #[serde(rename = "latitude")]
    pub lat: f64,
    #[serde(rename = "longitude")]
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn interpolate(self, other: Self, t: f64) -> Self {
        Self {
            lat: self.lat + (other.lat - self.lat) * t,
            lon: self.lon + (other.lon - self.lon) * t,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// `lat,lng` as expected by the directions query string.
    pub fn to_query_value(&self) -> String {
        format!("{:.6},{:.6}", self.lat, self.lon)
    }
}

/// A single fix delivered by the location provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Reported ground speed in m/s, when the provider has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl PositionFix {
    pub fn new(coord: Coordinate, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude: coord.lat,
            longitude: coord.lon,
            speed: None,
            timestamp,
        }
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate {
            lat: self.latitude,
            lon: self.longitude,
        }
    }
}

/// Numeric value plus the server-formatted label (`"12 km"`, `"15 min"`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    pub value: f64,
    #[serde(default)]
    pub text: String,
}

/// Body of `GET /routes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectionsResponse {
    #[serde(default)]
    pub routes: Vec<DirectionsRoute>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectionsRoute {
    pub coordinates: Vec<Coordinate>,
    pub distance: Measure,
    pub duration: Measure,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub has_tolls: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic: Option<serde_json::Value>,
}

/// Route owned by a navigation session. Replaced wholesale on re-route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub coordinates: Vec<Coordinate>,
    pub distance: Measure,
    pub duration: Measure,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub avoid_tolls: bool,
    #[serde(default)]
    pub has_tolls: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic: Option<serde_json::Value>,
}

impl Route {
    pub fn from_directions(route: DirectionsRoute, avoid_tolls: bool) -> Self {
        Self {
            coordinates: route.coordinates,
            distance: route.distance,
            duration: route.duration,
            summary: route.summary,
            avoid_tolls,
            has_tolls: route.has_tolls,
            traffic: route.traffic,
        }
    }

    /// Bare route over a polyline, metadata left empty.
    pub fn from_coordinates(coordinates: Vec<Coordinate>) -> Self {
        Self {
            coordinates,
            distance: Measure::default(),
            duration: Measure::default(),
            summary: String::new(),
            avoid_tolls: false,
            has_tolls: false,
            traffic: None,
        }
    }

    pub fn start(&self) -> Option<Coordinate> {
        self.coordinates.first().copied()
    }

    pub fn end(&self) -> Option<Coordinate> {
        self.coordinates.last().copied()
    }
}

/// Split of the active route around the device, for differentiated rendering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackedSegments {
    pub traveled: Vec<Coordinate>,
    pub remaining: Vec<Coordinate>,
}
