use std::io::Write;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use geo_types::Point;
use gpx::{Gpx, GpxVersion, Track, TrackSegment, Waypoint};

use crate::error::ExportError;
use crate::models::Coordinate;

const CREATOR: &str = "navigation";

/// GPX 1.1 document with the trail as a single track segment, base64 encoded.
pub fn encode_trail_as_gpx(trail: &[Coordinate]) -> Result<String, ExportError> {
    let mut buffer = Vec::new();
    write_trail_gpx(trail, &mut buffer)?;
    Ok(BASE64.encode(buffer))
}

pub fn write_trail_gpx(trail: &[Coordinate], writer: impl Write) -> Result<(), ExportError> {
    let mut gpx = Gpx {
        version: GpxVersion::Gpx11,
        creator: Some(CREATOR.into()),
        ..Default::default()
    };
    let mut track = Track {
        name: Some("traveled".into()),
        ..Default::default()
    };

    let mut segment = TrackSegment::new();
    segment.points.extend(trail.iter().map(to_waypoint));
    track.segments.push(segment);
    gpx.tracks.push(track);

    gpx::write(&gpx, writer)?;
    Ok(())
}

fn to_waypoint(coord: &Coordinate) -> Waypoint {
    Waypoint::new(Point::new(coord.lon, coord.lat))
}
