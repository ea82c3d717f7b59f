//! Lifecycle events raised by sensors.
//!
//! Subscribers read the [`EventLog`] after each update; serialization is
//! their business. Every pushed event is also emitted through `tracing`.

use serde::Serialize;
use tracing::{debug, info, warn};
use tracker_core::{TargetIndex, TrackId};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SensorEvent {
    SensorTurnedOn {
        time: f64,
        sensor: String,
    },
    SensorTurnedOff {
        time: f64,
        sensor: String,
    },
    ModeActivated {
        time: f64,
        sensor: String,
        mode: String,
    },
    ModeDeactivated {
        time: f64,
        sensor: String,
        mode: String,
    },
    TrackInitiated {
        time: f64,
        sensor: String,
        track: TrackId,
        target: TargetIndex,
    },
    TrackUpdated {
        time: f64,
        sensor: String,
        track: TrackId,
        target: TargetIndex,
    },
    TrackDropped {
        time: f64,
        sensor: String,
        track: TrackId,
        target: TargetIndex,
    },
    SarImageFormed {
        time: f64,
        sensor: String,
        mode: String,
        stream: u32,
        frame: u32,
        objects: usize,
    },
    SarCollectionAborted {
        time: f64,
        sensor: String,
        mode: String,
        reason: String,
    },
}

impl SensorEvent {
    pub fn time(&self) -> f64 {
        match self {
            SensorEvent::SensorTurnedOn { time, .. }
            | SensorEvent::SensorTurnedOff { time, .. }
            | SensorEvent::ModeActivated { time, .. }
            | SensorEvent::ModeDeactivated { time, .. }
            | SensorEvent::TrackInitiated { time, .. }
            | SensorEvent::TrackUpdated { time, .. }
            | SensorEvent::TrackDropped { time, .. }
            | SensorEvent::SarImageFormed { time, .. }
            | SensorEvent::SarCollectionAborted { time, .. } => *time,
        }
    }

    /// Short snake_case name, e.g. `"track_dropped"`.
    pub fn name(&self) -> &'static str {
        match self {
            SensorEvent::SensorTurnedOn { .. } => "sensor_turned_on",
            SensorEvent::SensorTurnedOff { .. } => "sensor_turned_off",
            SensorEvent::ModeActivated { .. } => "mode_activated",
            SensorEvent::ModeDeactivated { .. } => "mode_deactivated",
            SensorEvent::TrackInitiated { .. } => "track_initiated",
            SensorEvent::TrackUpdated { .. } => "track_updated",
            SensorEvent::TrackDropped { .. } => "track_dropped",
            SensorEvent::SarImageFormed { .. } => "sar_image_formed",
            SensorEvent::SarCollectionAborted { .. } => "sar_collection_aborted",
        }
    }
}

/// Append-only event sink.
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    events: Vec<SensorEvent>,
}

impl EventLog {
    pub fn push(&mut self, event: SensorEvent) {
        match &event {
            SensorEvent::TrackUpdated { time, sensor, track, .. } => {
                debug!(t = time, sensor = %sensor, track = %track, "track updated");
            }
            SensorEvent::SarCollectionAborted { time, sensor, mode, reason } => {
                warn!(t = time, sensor = %sensor, mode = %mode, reason = %reason, "SAR collection aborted");
            }
            other => {
                info!(t = other.time(), event = other.name(), "{other:?}");
            }
        }
        self.events.push(event);
    }

    pub fn events(&self) -> &[SensorEvent] {
        &self.events
    }

    /// Remove and return everything logged so far.
    pub fn drain(&mut self) -> Vec<SensorEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn count(&self, name: &str) -> usize {
        self.events.iter().filter(|e| e.name() == name).count()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
