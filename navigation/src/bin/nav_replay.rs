use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::PathBuf,
    sync::Arc,
};

use chrono::{DateTime, Utc};
use clap::Parser;
use navigation::{
    clock::{Clock, ManualClock},
    gpx_export::write_trail_gpx,
    map_view::TracingMapView,
    models::{Coordinate, PositionFix, Route},
    DirectionsRequest, HttpRouteProvider, NavigationConfig, NavigationSession, RerouteOutcome,
    RouteProvider,
};
use serde::Deserialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Replay a recorded position log through a navigation session"
)]
struct Args {
    /// JSON-lines file, one fix per line: `latitude` and `longitude`, optional
    /// `speed` (m/s) and RFC 3339 `timestamp` (missing ones are spaced 1 s apart)
    #[arg(long)]
    positions: PathBuf,

    /// Route JSON file; fetched from the routing API when omitted
    #[arg(long)]
    route: Option<PathBuf>,

    /// Origin as `lat,lon`, used when fetching the route
    #[arg(long, value_parser = parse_coordinate)]
    origin: Option<Coordinate>,

    /// Destination as `lat,lon`
    #[arg(long, value_parser = parse_coordinate)]
    destination: Option<Coordinate>,

    #[arg(long)]
    avoid_tolls: bool,

    /// Config JSON file (defaults to $NAV_CONFIG, then built-in values)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides the routing API base URL
    #[arg(long)]
    routing_url: Option<String>,

    /// Write the traveled trail as GPX
    #[arg(long)]
    gpx_out: Option<PathBuf>,

    /// Log progress every N fixes
    #[arg(long, default_value_t = 10)]
    progress_every: usize,
}

fn parse_coordinate(value: &str) -> Result<Coordinate, String> {
    let (lat, lon) = value
        .split_once(',')
        .ok_or_else(|| format!("expected `lat,lon`, got `{value}`"))?;
    let parse = |field: &str, label: &str| {
        field
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("invalid {label} `{field}`"))
    };
    let coord = Coordinate::new(parse(lat, "latitude")?, parse(lon, "longitude")?);
    if !coord.is_valid() {
        return Err(format!("coordinate out of range: {value}"));
    }
    Ok(coord)
}

/// One line of the position log. Only the coordinates are mandatory.
#[derive(Debug, Deserialize)]
struct LoggedFix {
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    speed: Option<f64>,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

/// Lines without a timestamp are placed one second after the previous fix
/// (or at `start` for the first line), matching a 1 Hz provider.
fn parse_positions(
    reader: impl BufRead,
    source: &str,
    start: DateTime<Utc>,
) -> Result<Vec<PositionFix>, Box<dyn std::error::Error>> {
    let mut fixes: Vec<PositionFix> = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let logged: LoggedFix = serde_json::from_str(&line)
            .map_err(|err| format!("{source}:{}: {err}", line_no + 1))?;
        let timestamp = logged.timestamp.unwrap_or_else(|| match fixes.last() {
            Some(previous) => previous.timestamp + chrono::Duration::seconds(1),
            None => start,
        });
        fixes.push(PositionFix {
            latitude: logged.latitude,
            longitude: logged.longitude,
            speed: logged.speed,
            timestamp,
        });
    }
    Ok(fixes)
}

fn read_positions(path: &PathBuf) -> Result<Vec<PositionFix>, Box<dyn std::error::Error>> {
    let reader = BufReader::new(File::open(path)?);
    parse_positions(reader, &path.display().to_string(), Utc::now())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "navigation=debug,nav_replay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => NavigationConfig::from_file(path)?,
        None => NavigationConfig::from_env()?,
    };
    if let Some(url) = &args.routing_url {
        config.routing.base_url = url.clone();
    }
    let provider = HttpRouteProvider::new(&config.routing)?;

    let fixes = read_positions(&args.positions)?;
    let Some(first_fix) = fixes.first() else {
        return Err("position log is empty".into());
    };
    tracing::info!("loaded {} fixes from {}", fixes.len(), args.positions.display());

    let route: Route = match (&args.route, args.destination) {
        (Some(path), _) => serde_json::from_reader(File::open(path)?)?,
        (None, Some(destination)) => {
            let request = DirectionsRequest {
                origin: args.origin.unwrap_or_else(|| first_fix.coordinate()),
                destination,
                avoid_tolls: args.avoid_tolls,
            };
            tracing::info!("fetching route from {}", provider.base_url());
            provider.directions(request).await?
        }
        (None, None) => return Err("either --route or --destination is required".into()),
    };

    // Replays run faster than real time: the session clock follows fix timestamps.
    let clock = ManualClock::new(first_fix.timestamp);
    let mut session =
        NavigationSession::with_clock(config, TracingMapView, Arc::new(clock.clone()));
    session.set_active_route(route);
    if let Some(destination) = args.destination {
        session.set_destination(destination);
    }
    session.start_navigation();

    let mut reroutes = 0usize;
    for (i, fix) in fixes.iter().enumerate() {
        clock.set(fix.timestamp);
        if let Some(ticket) = session.on_position(*fix) {
            let result = provider.directions(ticket.request).await;
            match session.complete_reroute(ticket, result) {
                Ok(RerouteOutcome::Applied) => {
                    reroutes += 1;
                    tracing::info!("re-route #{} applied at fix {}", ticket.request_id, i);
                }
                Ok(RerouteOutcome::Stale) => {}
                Err(err) => tracing::warn!("re-route at fix {i} failed: {err}"),
            }
        }

        if args.progress_every > 0 && (i + 1) % args.progress_every == 0 {
            if let Some(progress) = session.progress() {
                tracing::info!(
                    "[{}] {} index={} off_route={} remaining={:.0}m eta={:.0}s",
                    i + 1,
                    clock.now().format("%H:%M:%S"),
                    progress.closest_point_index,
                    progress.off_route_counter,
                    progress.remaining_distance_m,
                    progress.remaining_duration_s
                );
            }
        }
    }

    let segments = session.tracked_segments();
    tracing::info!(
        "replay finished: {} re-route(s), traveled {} points, {} remaining",
        reroutes,
        segments.traveled.len(),
        segments.remaining.len()
    );

    if let Some(path) = &args.gpx_out {
        write_trail_gpx(&segments.traveled, File::create(path)?)?;
        tracing::info!("traveled trail written to {}", path.display());
    }

    Ok(())
}
