use std::{fs::File, io::Read, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

pub const DEFAULT_ROUTING_API_URL: &str = "http://localhost:8080/api";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Tunables for one navigation session. Every section falls back to its
/// default when omitted from the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    pub tracker: TrackerConfig,
    pub camera: CameraConfig,
    pub routing: RoutingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Points searched behind the last closest index.
    pub search_behind: usize,
    /// Points searched ahead of the last closest index.
    pub search_ahead: usize,
    pub off_route_threshold_m: f64,
    /// Consecutive off-route samples that must be exceeded before re-routing.
    pub off_route_samples: u32,
    pub reroute_cooldown_ms: u64,
    /// Points of the new route framed after a re-route.
    pub reroute_fit_points: usize,
    pub reroute_fit_duration_ms: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            search_behind: 5,
            search_ahead: 30,
            off_route_threshold_m: 50.0,
            off_route_samples: 3,
            reroute_cooldown_ms: 10_000,
            reroute_fit_points: 10,
            reroute_fit_duration_ms: 3_000,
        }
    }
}

impl TrackerConfig {
    pub fn reroute_cooldown(&self) -> Duration {
        Duration::from_millis(self.reroute_cooldown_ms)
    }

    pub fn reroute_fit_duration(&self) -> Duration {
        Duration::from_millis(self.reroute_fit_duration_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub platform: Platform,
    pub min_heading_speed_mps: f64,
    /// Route point used for heading must be at least this far ahead.
    pub heading_look_ahead_m: f64,
    pub navigation_interval_ms: u64,
    pub overview_interval_ms: u64,
    pub navigation_pitch_deg: f64,
    pub navigation_zoom: f64,
    pub navigation_altitude_m: f64,
    pub overview_pitch_deg: f64,
    pub overview_zoom: f64,
    pub overview_altitude_m: f64,
    pub ios_chase_offset_m: f64,
    pub android_chase_offset_m: f64,
    pub default_suppress_ms: u64,
    pub focus_suppress_ms: u64,
    pub focus_animation_ms: u64,
    pub fit_edge_padding_px: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            platform: Platform::Android,
            min_heading_speed_mps: 0.3,
            heading_look_ahead_m: 30.0,
            navigation_interval_ms: 200,
            overview_interval_ms: 1_000,
            navigation_pitch_deg: 60.0,
            navigation_zoom: 18.0,
            navigation_altitude_m: 250.0,
            overview_pitch_deg: 30.0,
            overview_zoom: 16.0,
            overview_altitude_m: 1_200.0,
            ios_chase_offset_m: 50.0,
            android_chase_offset_m: 35.0,
            default_suppress_ms: 3_000,
            focus_suppress_ms: 2_000,
            focus_animation_ms: 1_000,
            fit_edge_padding_px: 50.0,
        }
    }
}

impl CameraConfig {
    pub fn chase_offset_m(&self) -> f64 {
        match self.platform {
            Platform::Ios => self.ios_chase_offset_m,
            Platform::Android => self.android_chase_offset_m,
        }
    }

    pub fn update_interval(&self, navigating: bool) -> Duration {
        if navigating {
            Duration::from_millis(self.navigation_interval_ms)
        } else {
            Duration::from_millis(self.overview_interval_ms)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ROUTING_API_URL.to_string(),
            timeout_ms: 15_000,
        }
    }
}

impl RoutingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl NavigationConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `NAV_CONFIG` when set, defaults otherwise, then applies
    /// `ROUTING_API_URL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("NAV_CONFIG") {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        if let Ok(url) = std::env::var("ROUTING_API_URL") {
            config.routing.base_url = url;
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let tracker = &self.tracker;
        if !(tracker.off_route_threshold_m.is_finite() && tracker.off_route_threshold_m > 0.0) {
            return Err(ConfigError::Invalid {
                field: "tracker.off_route_threshold_m",
                reason: format!("must be a positive distance, got {}", tracker.off_route_threshold_m),
            });
        }
        if tracker.search_ahead == 0 {
            return Err(ConfigError::Invalid {
                field: "tracker.search_ahead",
                reason: "must search at least one point ahead".into(),
            });
        }
        let camera = &self.camera;
        if camera.navigation_interval_ms == 0 || camera.overview_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "camera.*_interval_ms",
                reason: "update intervals must be non-zero".into(),
            });
        }
        if !camera.chase_offset_m().is_finite() {
            return Err(ConfigError::Invalid {
                field: "camera.*_chase_offset_m",
                reason: "chase offset must be finite".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_navigation_constants() {
        let config = NavigationConfig::default();
        assert_eq!(config.tracker.search_behind, 5);
        assert_eq!(config.tracker.search_ahead, 30);
        assert_eq!(config.tracker.off_route_threshold_m, 50.0);
        assert_eq!(config.tracker.off_route_samples, 3);
        assert_eq!(config.tracker.reroute_cooldown(), Duration::from_secs(10));
        assert_eq!(config.camera.update_interval(true), Duration::from_millis(200));
        assert_eq!(config.camera.update_interval(false), Duration::from_secs(1));
        assert_eq!(config.camera.min_heading_speed_mps, 0.3);
        assert_eq!(config.camera.heading_look_ahead_m, 30.0);
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let json = r#"{"camera": {"platform": "ios"}, "routing": {"base_url": "http://example.test"}}"#;
        let config = NavigationConfig::from_reader(json.as_bytes()).unwrap();
        assert_eq!(config.camera.platform, Platform::Ios);
        assert_eq!(config.camera.chase_offset_m(), 50.0);
        assert_eq!(config.camera.navigation_interval_ms, 200);
        assert_eq!(config.routing.base_url, "http://example.test");
        assert_eq!(config.tracker.search_ahead, 30);
    }

    #[test]
    fn rejects_non_positive_threshold() {
        let json = r#"{"tracker": {"off_route_threshold_m": 0.0}}"#;
        let err = NavigationConfig::from_reader(json.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "tracker.off_route_threshold_m",
                ..
            }
        ));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = NavigationConfig::from_reader("{not json".as_bytes()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn reads_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, br#"{"tracker": {"reroute_cooldown_ms": 5000}}"#)
            .unwrap();
        let config = NavigationConfig::from_file(file.path()).unwrap();
        assert_eq!(config.tracker.reroute_cooldown(), Duration::from_secs(5));
    }
}
