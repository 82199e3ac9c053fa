use std::{sync::Arc, time::Duration};

use tokio::{sync::mpsc, task::JoinSet};

use crate::{
    camera::{FitOptions, FocusOptions},
    map_view::MapView,
    models::{Coordinate, PositionFix, Route},
    routing_client::{RouteProvider, RoutingError},
    session::{NavigationSession, RerouteOutcome, RerouteTicket},
};

/// UI-side operations forwarded to a session owned by a running driver.
#[derive(Debug, Clone)]
pub enum DriverCommand {
    SetActiveRoute(Route),
    SetDestination(Coordinate),
    StartNavigation,
    StopNavigation,
    LockCamera,
    UnlockCamera,
    FitToCoordinates(Vec<Coordinate>, Option<FitOptions>),
    FocusOnLocation(Coordinate, Option<FocusOptions>),
    TemporarilyDisableTracking(Duration),
}

#[derive(Debug, Clone, PartialEq)]
pub enum NavigationEvent {
    RerouteRequested(RerouteTicket),
    Rerouted { request_id: u64, points: usize },
    RerouteFailed { request_id: u64, reason: String },
    StaleRouteDiscarded { request_id: u64 },
}

type RerouteResult = (RerouteTicket, Result<Route, RoutingError>);

/// Cooperative event loop around one [`NavigationSession`].
///
/// Fixes are handled in arrival order on the driver task. Re-route requests
/// run as separate tasks and never hold up position processing; their
/// answers come back through the same loop.
pub struct NavigationDriver<V: MapView, P: RouteProvider> {
    session: NavigationSession<V>,
    provider: Arc<P>,
    events: Option<mpsc::UnboundedSender<NavigationEvent>>,
}

impl<V: MapView, P: RouteProvider> NavigationDriver<V, P> {
    pub fn new(session: NavigationSession<V>, provider: Arc<P>) -> Self {
        Self {
            session,
            provider,
            events: None,
        }
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<NavigationEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn session(&self) -> &NavigationSession<V> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut NavigationSession<V> {
        &mut self.session
    }

    /// Run until the position stream closes, then wait for outstanding
    /// re-route answers and hand the session back.
    pub async fn run(
        mut self,
        mut positions: mpsc::Receiver<PositionFix>,
        mut commands: mpsc::Receiver<DriverCommand>,
    ) -> NavigationSession<V> {
        let mut in_flight: JoinSet<RerouteResult> = JoinSet::new();
        let mut commands_open = true;

        loop {
            tokio::select! {
                biased;

                command = commands.recv(), if commands_open => match command {
                    Some(command) => self.apply(command),
                    None => commands_open = false,
                },
                joined = in_flight.join_next(), if !in_flight.is_empty() => match joined {
                    Some(Ok((ticket, result))) => self.finish(ticket, result),
                    Some(Err(err)) => self.abandon(err),
                    None => {}
                },
                fix = positions.recv() => match fix {
                    Some(fix) => {
                        if let Some(ticket) = self.session.on_position(fix) {
                            self.spawn_reroute(&mut in_flight, ticket);
                        }
                    }
                    None => break,
                },
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            match joined {
                Ok((ticket, result)) => self.finish(ticket, result),
                Err(err) => self.abandon(err),
            }
        }
        self.session
    }

    fn apply(&mut self, command: DriverCommand) {
        let session = &mut self.session;
        match command {
            DriverCommand::SetActiveRoute(route) => session.set_active_route(route),
            DriverCommand::SetDestination(destination) => session.set_destination(destination),
            DriverCommand::StartNavigation => session.start_navigation(),
            DriverCommand::StopNavigation => session.stop_navigation(),
            DriverCommand::LockCamera => session.lock_camera(),
            DriverCommand::UnlockCamera => session.unlock_camera(),
            DriverCommand::FitToCoordinates(points, options) => {
                let options = options.unwrap_or_else(|| session.default_fit_options());
                session.fit_to_coordinates(&points, options);
            }
            DriverCommand::FocusOnLocation(point, options) => {
                let options = options.unwrap_or_else(|| session.default_focus_options());
                session.focus_on_location(point, options);
            }
            DriverCommand::TemporarilyDisableTracking(duration) => {
                session.temporarily_disable_tracking(duration)
            }
        }
    }

    fn spawn_reroute(&mut self, in_flight: &mut JoinSet<RerouteResult>, ticket: RerouteTicket) {
        self.emit(NavigationEvent::RerouteRequested(ticket));
        let provider = Arc::clone(&self.provider);
        in_flight.spawn(async move {
            let result = provider.directions(ticket.request).await;
            (ticket, result)
        });
    }

    fn finish(&mut self, ticket: RerouteTicket, result: Result<Route, RoutingError>) {
        let points = result.as_ref().map(|route| route.coordinates.len()).unwrap_or(0);
        let event = match self.session.complete_reroute(ticket, result) {
            Ok(RerouteOutcome::Applied) => NavigationEvent::Rerouted {
                request_id: ticket.request_id,
                points,
            },
            Ok(RerouteOutcome::Stale) => NavigationEvent::StaleRouteDiscarded {
                request_id: ticket.request_id,
            },
            Err(err) => NavigationEvent::RerouteFailed {
                request_id: ticket.request_id,
                reason: err.to_string(),
            },
        };
        self.emit(event);
    }

    fn abandon(&mut self, err: tokio::task::JoinError) {
        tracing::error!("re-route task did not complete: {err}");
        self.session.abandon_pending_reroute();
    }

    fn emit(&self, event: NavigationEvent) {
        if let Some(events) = &self.events {
            // a dropped receiver only means nobody is listening
            let _ = events.send(event);
        }
    }
}
