pub mod camera;
pub mod clock;
pub mod config;
pub mod driver;
pub mod error;
pub mod geo;
pub mod gpx_export;
pub mod map_view;
pub mod models;
pub mod routing_client;
pub mod session;
pub mod tracker;

pub use camera::{CameraController, CameraMode, CameraTracking, FitOptions, FocusOptions};
pub use config::NavigationConfig;
pub use driver::{DriverCommand, NavigationDriver, NavigationEvent};
pub use map_view::{CameraError, MapView};
pub use routing_client::{DirectionsRequest, HttpRouteProvider, RouteProvider, RoutingError};
pub use session::{NavigationSession, RerouteOutcome, RerouteTicket};
pub use tracker::{RouteTracker, RouteTrackerState};
