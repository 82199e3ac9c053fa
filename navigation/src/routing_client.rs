use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::{
    config::RoutingConfig,
    models::{Coordinate, DirectionsResponse, Route},
};

#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("routing request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("routing API answered with status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("routing API returned no route")]
    NoRoute,
    #[error("routing API returned a route with {0} coordinate(s)")]
    EmptyPolyline(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectionsRequest {
    pub origin: Coordinate,
    pub destination: Coordinate,
    pub avoid_tolls: bool,
}

/// Source of routes between two points.
///
/// Implementations must:
/// - return the first (preferred) route of the answer
/// - fail with [`RoutingError::NoRoute`] when nothing connects the points
/// - carry the request's toll preference on the returned [`Route`]
pub trait RouteProvider: Send + Sync + 'static {
    fn directions(
        &self,
        request: DirectionsRequest,
    ) -> impl Future<Output = Result<Route, RoutingError>> + Send;
}

/// `GET {base_url}/routes` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRouteProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRouteProvider {
    pub fn new(config: &RoutingConfig) -> Result<Self, RoutingError> {
        let client = reqwest::Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl RouteProvider for HttpRouteProvider {
    async fn directions(&self, request: DirectionsRequest) -> Result<Route, RoutingError> {
        tracing::debug!(
            "requesting route origin=({:.5},{:.5}) destination=({:.5},{:.5}) avoid_tolls={}",
            request.origin.lat,
            request.origin.lon,
            request.destination.lat,
            request.destination.lon,
            request.avoid_tolls
        );

        let response = self
            .client
            .get(format!("{}/routes", self.base_url))
            .query(&[
                ("origin", request.origin.to_query_value()),
                ("destination", request.destination.to_query_value()),
                ("avoidTolls", request.avoid_tolls.to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RoutingError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body: DirectionsResponse = response.json().await?;
        first_route(body, request.avoid_tolls)
    }
}

/// Pick `routes[0]` and reject polylines too short to follow.
pub fn first_route(body: DirectionsResponse, avoid_tolls: bool) -> Result<Route, RoutingError> {
    let route = body.routes.into_iter().next().ok_or(RoutingError::NoRoute)?;
    if route.coordinates.len() < 2 {
        return Err(RoutingError::EmptyPolyline(route.coordinates.len()));
    }
    Ok(Route::from_directions(route, avoid_tolls))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(json: &str) -> DirectionsResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn takes_first_route() {
        let response = body(
            r#"{"routes": [
                {"coordinates": [{"latitude": 0, "longitude": 0}, {"latitude": 0, "longitude": 0.01}],
                 "distance": {"value": 1112, "text": "1.1 km"},
                 "duration": {"value": 80, "text": "1 min"},
                 "summary": "first", "hasTolls": false},
                {"coordinates": [{"latitude": 0, "longitude": 0}, {"latitude": 0.01, "longitude": 0}],
                 "distance": {"value": 1112, "text": "1.1 km"},
                 "duration": {"value": 80, "text": "1 min"},
                 "summary": "second", "hasTolls": true}
            ]}"#,
        );
        let route = first_route(response, true).unwrap();
        assert_eq!(route.summary, "first");
        assert!(route.avoid_tolls);
    }

    #[test]
    fn empty_routes_is_no_route() {
        let err = first_route(body(r#"{"routes": []}"#), false).unwrap_err();
        assert!(matches!(err, RoutingError::NoRoute));

        let err = first_route(body("{}"), false).unwrap_err();
        assert!(matches!(err, RoutingError::NoRoute));
    }

    #[test]
    fn single_point_polyline_is_rejected() {
        let response = body(
            r#"{"routes": [{"coordinates": [{"latitude": 0, "longitude": 0}],
                 "distance": {"value": 0}, "duration": {"value": 0}}]}"#,
        );
        let err = first_route(response, false).unwrap_err();
        assert!(matches!(err, RoutingError::EmptyPolyline(1)));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let config = RoutingConfig {
            base_url: "http://localhost:9999/api/".into(),
            ..RoutingConfig::default()
        };
        let provider = HttpRouteProvider::new(&config).unwrap();
        assert_eq!(provider.base_url(), "http://localhost:9999/api");
    }
}
