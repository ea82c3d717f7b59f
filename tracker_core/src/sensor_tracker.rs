//! Per-sensor track formation: one M-of-N state machine per (request, target).
//!
//! # Track Formation Policy
//! - **Pending**: the first hit against a pair opens a hit history.
//! - **Establish**: when M-of-N (establish window) is met and a Bernoulli
//!   draw against `establish_track_probability` succeeds, a track is created.
//! - **Maintain**: each later opportunity re-tests M-of-N over the maintain
//!   window with `maintain_track_probability`; failure drops the track.
//! - **Dropped** is terminal. The history is destroyed and only a marker
//!   remains; the next hit replaces it with a fresh pending state.
//! - A pending history with no hits left in its establish window is
//!   abandoned without ever producing a track.
//!
//! Opportunities for a pair must be reported exactly once each; the tracker
//! has no way to detect replays.

use crate::{
    hit_history::{HitHistory, TrackerSettings},
    track::Track,
    types::{RequestId, TargetIndex, TrackId, TrackKey},
};
use rand::Rng;
use sensor_models::DetectionResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Lifecycle of one (request, target) pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackState {
    NoTrack,
    Pending,
    Established,
    Maintained,
    Dropped,
}

/// Output of one opportunity.
#[derive(Clone, Debug, PartialEq)]
pub enum TrackEvent {
    Initiated(Track),
    Updated(Track),
    Dropped(Track),
}

impl TrackEvent {
    pub fn track(&self) -> &Track {
        match self {
            TrackEvent::Initiated(t) | TrackEvent::Updated(t) | TrackEvent::Dropped(t) => t,
        }
    }
}

/// Extension points the tracker calls while forming tracks.
///
/// `update_track` projects the detection into the track's reported fields;
/// the remaining hooks default to no-ops.
pub trait TrackerHooks {
    /// Return false to count this detection as a miss.
    fn allow_tracking(&mut self, _sim_time: f64, _key: TrackKey, _result: &DetectionResult) -> bool {
        true
    }

    fn update_track(&mut self, sim_time: f64, track: &mut Track, result: &DetectionResult);

    fn initialize_track(&mut self, _sim_time: f64, _track: &mut Track) {}

    fn track_updated(&mut self, _sim_time: f64, _track: &mut Track) {}

    fn drop_track(&mut self, _sim_time: f64, _track: &Track) {}
}

#[derive(Clone, Debug)]
struct Entry {
    state: TrackState,
    settings: TrackerSettings,
    history: HitHistory,
    track: Option<Track>,
}

/// Hit histories and tracks of one sensor.
#[derive(Clone, Debug, Default)]
pub struct SensorTracker {
    entries: BTreeMap<TrackKey, Entry>,
    next_id: u64,
}

impl SensorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_track_id(&mut self) -> TrackId {
        self.next_id += 1;
        TrackId(self.next_id)
    }

    /// State of a pair; `NoTrack` when no history exists.
    pub fn state(&self, key: TrackKey) -> TrackState {
        self.entries
            .get(&key)
            .map_or(TrackState::NoTrack, |e| e.state)
    }

    pub fn hit_history(&self, key: TrackKey) -> Option<HitHistory> {
        self.entries
            .get(&key)
            .filter(|e| e.state != TrackState::Dropped)
            .map(|e| e.history)
    }

    pub fn track(&self, key: TrackKey) -> Option<&Track> {
        self.entries.get(&key).and_then(|e| e.track.as_ref())
    }

    /// All active tracks in key order.
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.entries.values().filter_map(|e| e.track.as_ref())
    }

    pub fn active_track_count(&self) -> usize {
        self.tracks().count()
    }

    /// Number of pairs with a hit history (pending or tracked).
    pub fn history_count(&self) -> usize {
        self.entries
            .values()
            .filter(|e| e.state != TrackState::Dropped)
            .count()
    }

    /// Report a detection. A veto from `hooks` turns it into a miss.
    pub fn target_detected<R: Rng + ?Sized>(
        &mut self,
        sim_time: f64,
        settings: &TrackerSettings,
        key: TrackKey,
        result: &DetectionResult,
        hooks: &mut dyn TrackerHooks,
        rng: &mut R,
    ) -> Option<TrackEvent> {
        let hit = hooks.allow_tracking(sim_time, key, result);
        if !hit {
            debug!(%key, "tracking vetoed, counted as a miss");
        }
        self.opportunity(sim_time, settings, key, hit, result, hooks, rng)
    }

    /// Report a failed detection attempt.
    pub fn target_undetected<R: Rng + ?Sized>(
        &mut self,
        sim_time: f64,
        settings: &TrackerSettings,
        key: TrackKey,
        result: &DetectionResult,
        hooks: &mut dyn TrackerHooks,
        rng: &mut R,
    ) -> Option<TrackEvent> {
        self.opportunity(sim_time, settings, key, false, result, hooks, rng)
    }

    #[allow(clippy::too_many_arguments)]
    fn opportunity<R: Rng + ?Sized>(
        &mut self,
        sim_time: f64,
        settings: &TrackerSettings,
        key: TrackKey,
        hit: bool,
        result: &DetectionResult,
        hooks: &mut dyn TrackerHooks,
        rng: &mut R,
    ) -> Option<TrackEvent> {
        let fresh = self
            .entries
            .get(&key)
            .map_or(true, |e| e.state == TrackState::Dropped);
        if fresh {
            if !hit {
                return None;
            }
            self.entries.insert(
                key,
                Entry {
                    state: TrackState::Pending,
                    settings: *settings,
                    history: HitHistory::new(),
                    track: None,
                },
            );
        }
        let next_id = TrackId(self.next_id + 1);
        let entry = self.entries.get_mut(&key)?;
        entry.settings = *settings;
        entry.history.record(hit);

        match entry.state {
            TrackState::Pending => {
                let s = &entry.settings;
                if entry.history.satisfies(s.hits_to_establish, s.establish_window)
                    && bernoulli(rng, s.establish_track_probability)
                {
                    let mut track = Track::new(next_id, key.request, key.target, sim_time);
                    track.update_count = 1;
                    hooks.update_track(sim_time, &mut track, result);
                    hooks.initialize_track(sim_time, &mut track);
                    info!(track = %track.id, %key, t = sim_time, "track established");
                    entry.state = TrackState::Established;
                    entry.track = Some(track.clone());
                    self.next_track_id();
                    Some(TrackEvent::Initiated(track))
                } else {
                    if s.establish_window > 0 && entry.history.hits_within(s.establish_window) == 0 {
                        debug!(%key, "pending history expired");
                        self.entries.remove(&key);
                    }
                    None
                }
            }
            TrackState::Established | TrackState::Maintained => {
                let s = &entry.settings;
                if entry.history.satisfies(s.hits_to_maintain, s.maintain_window)
                    && bernoulli(rng, s.maintain_track_probability)
                {
                    entry.state = TrackState::Maintained;
                    if !hit {
                        return None;
                    }
                    let track = entry.track.as_mut()?;
                    track.update_time = sim_time;
                    track.update_count += 1;
                    hooks.update_track(sim_time, track, result);
                    hooks.track_updated(sim_time, track);
                    Some(TrackEvent::Updated(track.clone()))
                } else {
                    let event = self.drop_entry(sim_time, key, hooks);
                    self.entries.insert(
                        key,
                        Entry {
                            state: TrackState::Dropped,
                            settings: *settings,
                            history: HitHistory::new(),
                            track: None,
                        },
                    );
                    event
                }
            }
            TrackState::NoTrack | TrackState::Dropped => None,
        }
    }

    fn drop_entry(
        &mut self,
        sim_time: f64,
        key: TrackKey,
        hooks: &mut dyn TrackerHooks,
    ) -> Option<TrackEvent> {
        let entry = self.entries.remove(&key)?;
        let mut track = entry.track?;
        track.update_time = sim_time;
        hooks.drop_track(sim_time, &track);
        info!(track = %track.id, %key, t = sim_time, "track dropped");
        Some(TrackEvent::Dropped(track))
    }

    /// Drop everything held against a target that left the simulation.
    pub fn target_deleted(
        &mut self,
        sim_time: f64,
        target: TargetIndex,
        hooks: &mut dyn TrackerHooks,
    ) -> Vec<TrackEvent> {
        let keys: Vec<TrackKey> = self
            .entries
            .keys()
            .filter(|k| k.target == target)
            .copied()
            .collect();
        keys.into_iter()
            .filter_map(|k| self.drop_entry(sim_time, k, hooks))
            .collect()
    }

    /// Drop everything held for a tracking request.
    pub fn stop_tracking(
        &mut self,
        sim_time: f64,
        request: RequestId,
        hooks: &mut dyn TrackerHooks,
    ) -> Vec<TrackEvent> {
        let keys: Vec<TrackKey> = self
            .entries
            .keys()
            .filter(|k| k.request == request)
            .copied()
            .collect();
        keys.into_iter()
            .filter_map(|k| self.drop_entry(sim_time, k, hooks))
            .collect()
    }

    /// Drop every history and track, e.g. when the sensor turns off.
    pub fn clear(&mut self, sim_time: f64, hooks: &mut dyn TrackerHooks) -> Vec<TrackEvent> {
        let keys: Vec<TrackKey> = self.entries.keys().copied().collect();
        keys.into_iter()
            .filter_map(|k| self.drop_entry(sim_time, k, hooks))
            .collect()
    }
}

fn bernoulli<R: Rng + ?Sized>(rng: &mut R, p: f64) -> bool {
    if p >= 1.0 {
        true
    } else if p <= 0.0 {
        false
    } else {
        rng.gen::<f64>() < p
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[derive(Default)]
    struct Recorder {
        veto: bool,
        updates: u32,
        initialized: u32,
        dropped: u32,
    }

    impl TrackerHooks for Recorder {
        fn allow_tracking(&mut self, _: f64, _: TrackKey, _: &DetectionResult) -> bool {
            !self.veto
        }
        fn update_track(&mut self, _: f64, track: &mut Track, result: &DetectionResult) {
            self.updates += 1;
            track.signal_to_noise = Some(result.signal_to_noise);
        }
        fn initialize_track(&mut self, _: f64, _: &mut Track) {
            self.initialized += 1;
        }
        fn drop_track(&mut self, _: f64, _: &Track) {
            self.dropped += 1;
        }
    }

    fn settings(m: u32, n: u32) -> TrackerSettings {
        TrackerSettings {
            hits_to_establish: m,
            establish_window: n,
            hits_to_maintain: 1,
            maintain_window: 3,
            ..Default::default()
        }
    }

    fn feed(
        tracker: &mut SensorTracker,
        settings: &TrackerSettings,
        hooks: &mut Recorder,
        rng: &mut ChaCha8Rng,
        key: TrackKey,
        pattern: &[bool],
    ) -> Vec<Option<TrackEvent>> {
        let result = DetectionResult::new(0.5);
        pattern
            .iter()
            .enumerate()
            .map(|(i, &hit)| {
                let t = i as f64;
                if hit {
                    tracker.target_detected(t, settings, key, &result, hooks, rng)
                } else {
                    tracker.target_undetected(t, settings, key, &result, hooks, rng)
                }
            })
            .collect()
    }

    #[test]
    fn establishes_on_fourth_opportunity() {
        let mut tracker = SensorTracker::new();
        let mut hooks = Recorder::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let key = TrackKey::search(TargetIndex(3));
        let events = feed(
            &mut tracker,
            &settings(3, 4),
            &mut hooks,
            &mut rng,
            key,
            &[true, true, false, true],
        );
        assert!(events[..3].iter().all(Option::is_none));
        assert!(matches!(events[3], Some(TrackEvent::Initiated(_))));
        assert_eq!(tracker.state(key), TrackState::Established);
        assert_eq!(hooks.initialized, 1);
        assert_eq!(tracker.track(key).map(|t| t.start_time), Some(3.0));
    }

    #[test]
    fn every_m_of_n_establishes_with_certainty() {
        for n in 1..=8u32 {
            for m in 1..=n {
                let mut tracker = SensorTracker::new();
                let mut hooks = Recorder::default();
                let mut rng = ChaCha8Rng::seed_from_u64(u64::from(n * 10 + m));
                let key = TrackKey::search(TargetIndex(0));
                // First hit, then misses, then the remaining hits: an n-long run
                let mut pattern = vec![true];
                pattern.extend(std::iter::repeat(false).take((n - m) as usize));
                pattern.extend(std::iter::repeat(true).take((m - 1) as usize));
                let events = feed(&mut tracker, &settings(m, n), &mut hooks, &mut rng, key, &pattern);
                let at = if m == 1 { 0 } else { pattern.len() - 1 };
                assert!(events[..at].iter().all(Option::is_none), "{m} of {n} too early");
                assert!(
                    matches!(events[at], Some(TrackEvent::Initiated(_))),
                    "{m} of {n} did not establish"
                );
            }
        }
    }

    #[test]
    fn zero_probability_never_establishes() {
        let mut tracker = SensorTracker::new();
        let mut hooks = Recorder::default();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let s = TrackerSettings {
            establish_track_probability: 0.0,
            ..settings(1, 1)
        };
        let key = TrackKey::search(TargetIndex(1));
        let events = feed(&mut tracker, &s, &mut hooks, &mut rng, key, &[true; 50]);
        assert!(events.iter().all(Option::is_none));
        assert_eq!(tracker.state(key), TrackState::Pending);
    }

    #[test]
    fn zero_window_establishes_on_first_hit() {
        let mut tracker = SensorTracker::new();
        let mut hooks = Recorder::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let key = TrackKey::search(TargetIndex(1));
        let events = feed(&mut tracker, &settings(3, 0), &mut hooks, &mut rng, key, &[true]);
        assert!(matches!(events[0], Some(TrackEvent::Initiated(_))));
    }

    #[test]
    fn maintain_failure_drops_and_restarts_fresh() {
        let mut tracker = SensorTracker::new();
        let mut hooks = Recorder::default();
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let key = TrackKey::search(TargetIndex(9));
        // 1 of 1 establish, 1 of 3 maintain: three misses drop
        let events = feed(
            &mut tracker,
            &settings(1, 1),
            &mut hooks,
            &mut rng,
            key,
            &[true, true, false, false, false],
        );
        assert!(matches!(events[1], Some(TrackEvent::Updated(_))));
        assert!(events[2].is_none());
        assert!(events[3].is_none());
        assert!(matches!(events[4], Some(TrackEvent::Dropped(_))));
        assert_eq!(tracker.state(key), TrackState::Dropped);
        assert!(tracker.hit_history(key).is_none());
        assert_eq!(hooks.dropped, 1);
        // Misses do not revive a dropped pair
        let result = DetectionResult::new(0.5);
        tracker.target_undetected(9.0, &settings(1, 1), key, &result, &mut hooks, &mut rng);
        assert_eq!(tracker.state(key), TrackState::Dropped);

        let again = tracker.target_detected(10.0, &settings(1, 1), key, &result, &mut hooks, &mut rng);
        match again {
            Some(TrackEvent::Initiated(track)) => assert_eq!(track.id, TrackId(2)),
            other => panic!("expected a new track, got {other:?}"),
        }
    }

    #[test]
    fn veto_counts_as_miss() {
        let mut tracker = SensorTracker::new();
        let mut hooks = Recorder {
            veto: true,
            ..Default::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let key = TrackKey::search(TargetIndex(2));
        let events = feed(&mut tracker, &settings(1, 1), &mut hooks, &mut rng, key, &[true; 5]);
        assert!(events.iter().all(Option::is_none));
        assert_eq!(tracker.state(key), TrackState::NoTrack);
    }

    #[test]
    fn pending_without_hits_in_window_expires() {
        let mut tracker = SensorTracker::new();
        let mut hooks = Recorder::default();
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let key = TrackKey::search(TargetIndex(2));
        feed(
            &mut tracker,
            &settings(3, 4),
            &mut hooks,
            &mut rng,
            key,
            &[true, false, false, false],
        );
        assert_eq!(tracker.state(key), TrackState::Pending);
        let result = DetectionResult::new(0.5);
        tracker.target_undetected(4.0, &settings(3, 4), key, &result, &mut hooks, &mut rng);
        assert_eq!(tracker.state(key), TrackState::NoTrack);
    }

    #[test]
    fn target_deleted_drops_all_requests() {
        let mut tracker = SensorTracker::new();
        let mut hooks = Recorder::default();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let s = settings(1, 1);
        let result = DetectionResult::new(0.5);
        let target = TargetIndex(4);
        for request in [RequestId(0), RequestId(2)] {
            tracker.target_detected(0.0, &s, TrackKey::new(request, target), &result, &mut hooks, &mut rng);
        }
        tracker.target_detected(0.0, &s, TrackKey::search(TargetIndex(5)), &result, &mut hooks, &mut rng);
        let dropped = tracker.target_deleted(1.0, target, &mut hooks);
        assert_eq!(dropped.len(), 2);
        assert_eq!(tracker.active_track_count(), 1);
    }
}
