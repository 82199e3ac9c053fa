use std::time::Duration;

use crate::models::{CameraPose, Coordinate, EdgePadding};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CameraError {
    #[error("map view is not mounted yet")]
    NotReady,
    #[error("invalid camera pose: {0}")]
    InvalidPose(String),
    #[error("map view rejected command: {0}")]
    Rejected(String),
}

/// Imperative camera handle of the rendered map. Write-only: the core never
/// reads camera state back.
pub trait MapView {
    /// Jump to `pose` without animation.
    fn set_camera(&mut self, pose: &CameraPose) -> Result<(), CameraError>;

    fn animate_camera(&mut self, pose: &CameraPose, duration: Duration) -> Result<(), CameraError>;

    fn fit_to_coordinates(
        &mut self,
        points: &[Coordinate],
        padding: EdgePadding,
        animated: bool,
    ) -> Result<(), CameraError>;
}

impl<V: MapView + ?Sized> MapView for Box<V> {
    fn set_camera(&mut self, pose: &CameraPose) -> Result<(), CameraError> {
        (**self).set_camera(pose)
    }

    fn animate_camera(&mut self, pose: &CameraPose, duration: Duration) -> Result<(), CameraError> {
        (**self).animate_camera(pose, duration)
    }

    fn fit_to_coordinates(
        &mut self,
        points: &[Coordinate],
        padding: EdgePadding,
        animated: bool,
    ) -> Result<(), CameraError> {
        (**self).fit_to_coordinates(points, padding, animated)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MapCommand {
    SetCamera(CameraPose),
    AnimateCamera {
        pose: CameraPose,
        duration: Duration,
    },
    FitToCoordinates {
        points: Vec<Coordinate>,
        padding: EdgePadding,
        animated: bool,
    },
}

/// Test double that records every accepted command.
#[derive(Debug, Default)]
pub struct RecordingMapView {
    pub commands: Vec<MapCommand>,
    /// Number of upcoming commands to fail with [`CameraError::NotReady`].
    pub fail_next: usize,
}

impl RecordingMapView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn camera_commands(&self) -> impl Iterator<Item = &MapCommand> {
        self.commands
            .iter()
            .filter(|cmd| !matches!(cmd, MapCommand::FitToCoordinates { .. }))
    }

    pub fn last_pose(&self) -> Option<CameraPose> {
        self.commands.iter().rev().find_map(|cmd| match cmd {
            MapCommand::SetCamera(pose) | MapCommand::AnimateCamera { pose, .. } => Some(*pose),
            MapCommand::FitToCoordinates { .. } => None,
        })
    }

    fn record(&mut self, command: MapCommand) -> Result<(), CameraError> {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(CameraError::NotReady);
        }
        self.commands.push(command);
        Ok(())
    }
}

impl MapView for RecordingMapView {
    fn set_camera(&mut self, pose: &CameraPose) -> Result<(), CameraError> {
        self.record(MapCommand::SetCamera(*pose))
    }

    fn animate_camera(&mut self, pose: &CameraPose, duration: Duration) -> Result<(), CameraError> {
        self.record(MapCommand::AnimateCamera {
            pose: *pose,
            duration,
        })
    }

    fn fit_to_coordinates(
        &mut self,
        points: &[Coordinate],
        padding: EdgePadding,
        animated: bool,
    ) -> Result<(), CameraError> {
        self.record(MapCommand::FitToCoordinates {
            points: points.to_vec(),
            padding,
            animated,
        })
    }
}

/// Map view that only traces commands, for headless replays.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMapView;

impl MapView for TracingMapView {
    fn set_camera(&mut self, pose: &CameraPose) -> Result<(), CameraError> {
        tracing::debug!(
            "set_camera center=({:.6},{:.6}) heading={:.0} pitch={:.0}",
            pose.center.lat,
            pose.center.lon,
            pose.heading,
            pose.pitch
        );
        Ok(())
    }

    fn animate_camera(&mut self, pose: &CameraPose, duration: Duration) -> Result<(), CameraError> {
        tracing::debug!(
            "animate_camera center=({:.6},{:.6}) heading={:.0} over {}ms",
            pose.center.lat,
            pose.center.lon,
            pose.heading,
            duration.as_millis()
        );
        Ok(())
    }

    fn fit_to_coordinates(
        &mut self,
        points: &[Coordinate],
        _padding: EdgePadding,
        animated: bool,
    ) -> Result<(), CameraError> {
        tracing::debug!("fit_to_coordinates {} points animated={animated}", points.len());
        Ok(())
    }
}
