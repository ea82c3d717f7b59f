//! `tracker_core` — Track formation from sensor detection opportunities.
//!
//! # Module layout
//! - [`types`]          — Identifier newtypes (tracks, requests, targets)
//! - [`track`]          — Reported track fields and validity
//! - [`hit_history`]    — M-of-N settings and the hit bitmask
//! - [`sensor_tracker`] — Per-(request, target) establish / maintain / drop

pub mod hit_history;
pub mod sensor_tracker;
pub mod track;
pub mod types;

pub use hit_history::{window_mask, HitHistory, TrackerSettings};
pub use sensor_tracker::{SensorTracker, TrackEvent, TrackState, TrackerHooks};
pub use track::{IffStatus, Track};
pub use types::{RequestId, TargetIndex, TrackId, TrackKey};
