use thiserror::Error;

use crate::routing_client::RoutingError;

#[derive(Debug, Error)]
pub enum NavigationError {
    #[error("re-route failed: {0}")]
    Reroute(#[from] RoutingError),
    #[error("re-route returned an unusable route: {0}")]
    InvalidRoute(String),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to build GPX document: {0}")]
    Gpx(#[from] gpx::errors::GpxError),
}
