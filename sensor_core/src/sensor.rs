//! The sensor: modes, components, tracker and scheduled detection chances.
//!
//! # Update Policy
//! - An update runs when the sensor is on and its frame timer has expired.
//!   The frame is the shortest `frame_time` among the selected modes.
//! - Search: every eligible platform gets one opportunity per frame, in
//!   catalog order. Searching modes are tried in index order; the first
//!   detection is reported, otherwise the last miss is.
//! - A platform outside a mode's range limits is reported as a range miss
//!   without running the physics.
//! - Tracking requests get one opportunity per frame in their own mode,
//!   then move to the mode's `on_success` or `on_failure` mode.
//! - SAR modes form images and never feed the tracker.
//! - Turning off, or deselecting a SAR mode, ends any open collection and
//!   drops every track.

use crate::component::{AttemptContext, ComponentFactory, ComponentList, SensorComponent};
use crate::context::{draw_required_pd, Platform, SimContext, SimEpoch, SpatialDomain};
use crate::error::{Result, SensorError};
use crate::events::{EventLog, SensorEvent};
use crate::mode::{DetectEnv, ModeCommon, ModeList, SensorMode};
use crate::sar::{ImageSource, OperatingMode, SarCollector, SarImage};
use rand::Rng;
use sensor_models::geometry::range_rate;
use sensor_models::{
    apply_measurement_errors, DetectionResult, FailureStatus, InputReader, LocalFrame, ValueType,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::{FRAC_PI_2, PI};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracker_core::{RequestId, SensorTracker, TargetIndex, Track, TrackEvent, TrackKey, TrackerHooks};

// ---------------------------------------------------------------------------
// Sensor type
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorType {
    Radar,
    Optical,
    Sar,
}

impl SensorType {
    pub fn name(&self) -> &'static str {
        match self {
            SensorType::Radar => "radar",
            SensorType::Optical => "optical",
            SensorType::Sar => "sar",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "radar" => Some(SensorType::Radar),
            "optical" | "eo" => Some(SensorType::Optical),
            "sar" => Some(SensorType::Sar),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Ignore lists
// ---------------------------------------------------------------------------

/// Which platforms never get a detection chance.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectionFilter {
    pub categories: Vec<String>,
    pub sides: Vec<String>,
    pub domains: Vec<SpatialDomain>,
    pub same_side: bool,
}

impl DetectionFilter {
    pub fn allows(&self, host: &Platform, target: &Platform) -> bool {
        if target.index == host.index {
            return false;
        }
        if self.same_side && !host.side.is_empty() && target.side == host.side {
            return false;
        }
        if self.sides.iter().any(|s| *s == target.side) {
            return false;
        }
        if self.domains.contains(&target.domain) {
            return false;
        }
        !self.categories.iter().any(|c| target.is_category_member(c))
    }

    fn process_input(&mut self, input: &mut InputReader) -> sensor_models::InputResult<bool> {
        match input.command() {
            "ignore" => self.categories.push(input.read_string()?),
            "ignore_side" => self.sides.push(input.read_string()?),
            "ignore_domain" => {
                let name = input.read_string()?;
                let domain = SpatialDomain::from_name(&name).ok_or_else(|| input.bad_value(&name))?;
                self.domains.push(domain);
            }
            "ignore_same_side" => self.same_side = true,
            "ignore_nothing" => *self = Self::default(),
            _ => return Ok(false),
        }
        Ok(true)
    }
}

/// A tracking request and the mode currently serving it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TrackingRequest {
    pub target: TargetIndex,
    pub mode: usize,
}

// ---------------------------------------------------------------------------
// Detection attempt and tracker plumbing
// ---------------------------------------------------------------------------

/// Fixed inputs of every attempt made during one update.
struct Attempt<'a> {
    sensor: &'a str,
    host: &'a Platform,
    mount: LocalFrame,
    sim_time: f64,
    epoch: SimEpoch,
}

impl Attempt<'_> {
    /// Fill the geometry, run the family physics, then the components.
    fn run(
        &self,
        mode: &SensorMode,
        target: &Platform,
        required_pd: f64,
        components: &mut ComponentList,
    ) -> DetectionResult {
        let capability = mode.capability();
        let frame = capability.antenna_frame(&self.mount);
        let mut result = DetectionResult::new(required_pd);
        result.antenna_frame = Some(frame);
        result.rcvr_to_tgt = frame.aspect(&target.location_wcs);
        result.receiver_location = self.host.location_wcs;
        result.receiver_velocity = self.host.velocity_wcs;
        result.target_location = target.location_wcs;
        result.target_velocity = target.velocity_wcs;
        result.range_rate = range_rate(
            &self.host.location_wcs,
            &self.host.velocity_wcs,
            &target.location_wcs,
            &target.velocity_wcs,
        );

        let env = DetectEnv {
            sim_time: self.sim_time,
            host: self.host,
        };
        capability.attempt_to_detect(&env, target, &mut result);

        let ctx = self.context(mode, target);
        if !components.post_attempt_to_detect(&ctx, &mut result) {
            result.pd = 0.0;
        }
        debug!(
            sensor = self.sensor,
            mode = mode.name(),
            target = %target.name,
            snr = result.signal_to_noise,
            pd = result.pd,
            failed = ?result.failed,
            "detection attempt"
        );
        result
    }

    fn context<'b>(&'b self, mode: &'b SensorMode, target: &'b Platform) -> AttemptContext<'b> {
        AttemptContext {
            sim_time: self.sim_time,
            epoch: self.epoch,
            sensor: self.sensor,
            mode: mode.name(),
            host: self.host,
            target,
        }
    }

    /// A miss for a target outside the mode's range limits.
    fn range_miss(&self, target: &Platform, required_pd: f64) -> DetectionResult {
        let mut result = DetectionResult::new(required_pd);
        result.rcvr_to_tgt.range = (target.location_wcs - self.host.location_wcs).norm();
        result.receiver_location = self.host.location_wcs;
        result.target_location = target.location_wcs;
        result.fail(FailureStatus::RCVR_RANGE_LIMITS);
        result
    }

    /// Apply measurement errors to a detection and hand the opportunity to
    /// the tracker.
    #[allow(clippy::too_many_arguments)]
    fn report<R: Rng + ?Sized>(
        &self,
        mode: &SensorMode,
        target: &Platform,
        key: TrackKey,
        mut result: DetectionResult,
        tracker: &mut SensorTracker,
        components: &mut ComponentList,
        rng: &mut R,
    ) -> Option<TrackEvent> {
        if result.detected() {
            let common = &mode.common;
            let radar = mode.capability().radar_error_inputs();
            let mut sigmas =
                common
                    .error_model
                    .spherical_error_std_dev(&mut result, common.reporting, radar.as_ref());
            let ctx = self.context(mode, target);
            components.compute_spherical_measurement_errors(&ctx, &result, &mut sigmas);
            result.measurement.sigmas = sigmas;
            apply_measurement_errors(&mut result, &sigmas, rng);
        }

        let mut hooks = TrackHooks {
            sensor: self.sensor,
            mode: Some(&mode.common),
            host: Some(self.host),
            target: Some(target),
            components,
        };
        let settings = mode.common.tracker_settings;
        if result.detected() {
            tracker.target_detected(self.sim_time, &settings, key, &result, &mut hooks, rng)
        } else {
            tracker.target_undetected(self.sim_time, &settings, key, &result, &mut hooks, rng)
        }
    }
}

/// Routes tracker callbacks to the mode and the components.
struct TrackHooks<'a> {
    sensor: &'a str,
    mode: Option<&'a ModeCommon>,
    host: Option<&'a Platform>,
    target: Option<&'a Platform>,
    components: &'a mut ComponentList,
}

impl<'a> TrackHooks<'a> {
    /// Hooks for drops outside any detection attempt.
    fn drops_only(sensor: &'a str, components: &'a mut ComponentList) -> Self {
        Self {
            sensor,
            mode: None,
            host: None,
            target: None,
            components,
        }
    }
}

impl TrackerHooks for TrackHooks<'_> {
    fn allow_tracking(&mut self, sim_time: f64, key: TrackKey, result: &DetectionResult) -> bool {
        self.components.tracker_allow_tracking(sim_time, key, result)
    }

    fn update_track(&mut self, sim_time: f64, track: &mut Track, result: &DetectionResult) {
        if let (Some(mode), Some(host)) = (self.mode, self.host) {
            mode.update_track(sim_time, track, self.sensor, host, self.target, result);
        }
        self.components.update_track(sim_time, track, result);
    }

    fn initialize_track(&mut self, sim_time: f64, track: &mut Track) {
        self.components.tracker_initialize_track(sim_time, track);
    }

    fn track_updated(&mut self, sim_time: f64, track: &mut Track) {
        self.components.tracker_update_track(sim_time, track);
    }

    fn drop_track(&mut self, sim_time: f64, track: &Track) {
        self.components.tracker_drop_track(sim_time, track);
    }
}

/// Log a tracker output and keep it for the caller.
fn publish(
    events: &mut EventLog,
    outbox: &mut Vec<TrackEvent>,
    sensor: &str,
    sim_time: f64,
    event: TrackEvent,
) {
    let track = event.track();
    let (id, target) = (track.id, track.target);
    let sensor = sensor.to_string();
    events.push(match &event {
        TrackEvent::Initiated(_) => SensorEvent::TrackInitiated {
            time: sim_time,
            sensor,
            track: id,
            target,
        },
        TrackEvent::Updated(_) => SensorEvent::TrackUpdated {
            time: sim_time,
            sensor,
            track: id,
            target,
        },
        TrackEvent::Dropped(_) => SensorEvent::TrackDropped {
            time: sim_time,
            sensor,
            track: id,
            target,
        },
    });
    outbox.push(event);
}

// ---------------------------------------------------------------------------
// Sensor
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Sensor {
    name: String,
    sensor_type: SensorType,
    platform_name: String,
    host: Option<TargetIndex>,
    /// Mount orientation relative to the host body (rad)
    yaw: f64,
    pitch: f64,
    initially_on: bool,
    on: bool,
    modes: ModeList,
    components: ComponentList,
    tracker: SensorTracker,
    filter: DetectionFilter,
    requests: BTreeMap<RequestId, TrackingRequest>,
    next_update_time: f64,
    sar: SarCollector,
    /// Mode index of the open SAR collection
    sar_mode: Option<usize>,
    track_events: Vec<TrackEvent>,
    images: Vec<SarImage>,
}

impl Sensor {
    pub fn new(name: impl Into<String>, sensor_type: SensorType) -> Self {
        Self::with_factories(name, sensor_type, Vec::new())
    }

    /// A sensor whose factories may attach components before input is read.
    pub fn with_factories(
        name: impl Into<String>,
        sensor_type: SensorType,
        factories: Vec<Arc<dyn ComponentFactory>>,
    ) -> Self {
        let mut components = ComponentList::with_factories(factories);
        components.pre_input(sensor_type);
        Self {
            name: name.into(),
            sensor_type,
            platform_name: String::new(),
            host: None,
            yaw: 0.0,
            pitch: 0.0,
            initially_on: false,
            on: false,
            modes: ModeList::new(sensor_type),
            components,
            tracker: SensorTracker::new(),
            filter: DetectionFilter::default(),
            requests: BTreeMap::new(),
            next_update_time: 0.0,
            sar: SarCollector::new(),
            sar_mode: None,
            track_events: Vec::new(),
            images: Vec::new(),
        }
    }

    /// Read `<name> <type> ... end_sensor` after the `sensor` command.
    pub fn from_input(input: &mut InputReader, factories: &[Arc<dyn ComponentFactory>]) -> Result<Self> {
        let name = input.read_string().map_err(|source| SensorError::Input {
            sensor: String::new(),
            source,
        })?;
        let input_error = |source| SensorError::Input {
            sensor: name.clone(),
            source,
        };
        let type_name = input.read_string().map_err(input_error)?;
        let sensor_type =
            SensorType::from_name(&type_name).ok_or_else(|| SensorError::UnknownSensorType {
                sensor: name.clone(),
                sensor_type: type_name.clone(),
            })?;

        let mut sensor = Self::with_factories(name.clone(), sensor_type, factories.to_vec());
        while input
            .read_block_command("sensor", "end_sensor")
            .map_err(input_error)?
            .is_some()
        {
            if !sensor.process_input(input)? {
                return Err(input_error(input.unknown_command()));
            }
        }
        Ok(sensor)
    }

    /// Sensor keywords, then mode keywords, then component keywords.
    pub fn process_input(&mut self, input: &mut InputReader) -> Result<bool> {
        let input_error = |source| SensorError::Input {
            sensor: self.name.clone(),
            source,
        };
        match input.command() {
            "platform" => {
                self.platform_name = input.read_string().map_err(input_error)?;
            }
            "on" => self.initially_on = true,
            "off" => self.initially_on = false,
            "yaw" => {
                self.yaw = input.read_value_of_type(ValueType::Angle).map_err(input_error)?;
                input.value_in_closed_range(self.yaw, -PI, PI).map_err(input_error)?;
            }
            "pitch" => {
                self.pitch = input.read_value_of_type(ValueType::Angle).map_err(input_error)?;
                input
                    .value_in_closed_range(self.pitch, -FRAC_PI_2, FRAC_PI_2)
                    .map_err(input_error)?;
            }
            _ => {
                if self.filter.process_input(input).map_err(input_error)? {
                    return Ok(true);
                }
                if self.modes.process_input(&self.name, input, &mut self.components)? {
                    return Ok(true);
                }
                return self.components.process_input(input).map_err(input_error);
            }
        }
        Ok(true)
    }

    /// Resolve the host platform, initialize modes and components, and turn
    /// on if the definition asked for it.
    pub fn initialize(&mut self, ctx: &mut SimContext) -> Result<()> {
        let host = ctx
            .platforms
            .by_name(&self.platform_name)
            .ok_or_else(|| SensorError::UnknownPlatform {
                sensor: self.name.clone(),
                platform: self.platform_name.clone(),
            })?;
        self.host = Some(host.index);
        self.modes.initialize(&self.name, self.sensor_type)?;
        let names = self.modes.names();
        self.components.initialize(ctx.sim_time, &self.name, &names)?;
        info!(sensor = %self.name, kind = self.sensor_type.name(), modes = names.len(), "sensor initialized");
        if self.initially_on {
            self.turn_on(ctx);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sensor_type(&self) -> SensorType {
        self.sensor_type
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    pub fn host(&self) -> Option<TargetIndex> {
        self.host
    }

    pub fn set_platform(&mut self, name: impl Into<String>) {
        self.platform_name = name.into();
    }

    pub fn modes(&self) -> &ModeList {
        &self.modes
    }

    pub fn modes_mut(&mut self) -> &mut ModeList {
        &mut self.modes
    }

    pub fn mode_count(&self) -> usize {
        self.modes.len()
    }

    pub fn components(&self) -> &ComponentList {
        &self.components
    }

    pub fn components_mut(&mut self) -> &mut ComponentList {
        &mut self.components
    }

    pub fn attach_component(&mut self, component: Box<dyn SensorComponent>) -> Result<()> {
        self.components.attach(&self.name, component)
    }

    pub fn tracker(&self) -> &SensorTracker {
        &self.tracker
    }

    pub fn track_count(&self) -> usize {
        self.tracker.active_track_count()
    }

    pub fn filter(&self) -> &DetectionFilter {
        &self.filter
    }

    pub fn requests(&self) -> &BTreeMap<RequestId, TrackingRequest> {
        &self.requests
    }

    pub fn sar(&self) -> &SarCollector {
        &self.sar
    }

    /// Azimuth and elevation field of view of a mode's antenna.
    pub fn field_of_view(&self, mode: usize) -> Option<((f64, f64), (f64, f64))> {
        let antenna = self.modes.get(mode)?.capability().antenna();
        Some((antenna.azimuth_field_of_view, antenna.elevation_field_of_view))
    }

    /// Tracker outputs since the last drain.
    pub fn drain_track_events(&mut self) -> Vec<TrackEvent> {
        std::mem::take(&mut self.track_events)
    }

    /// SAR images since the last drain.
    pub fn drain_images(&mut self) -> Vec<SarImage> {
        std::mem::take(&mut self.images)
    }

    pub fn allow_detection_chances_for(&self, host: &Platform, target: &Platform) -> bool {
        self.filter.allows(host, target)
    }

    fn mount(&self, host: &Platform) -> LocalFrame {
        host.body_frame().rotated(self.yaw, self.pitch)
    }

    // -----------------------------------------------------------------------
    // On/off and mode selection
    // -----------------------------------------------------------------------

    pub fn turn_on(&mut self, ctx: &mut SimContext) {
        if self.on {
            return;
        }
        self.on = true;
        self.next_update_time = ctx.sim_time;
        self.components.turn_on(ctx.sim_time);
        ctx.events.push(SensorEvent::SensorTurnedOn {
            time: ctx.sim_time,
            sensor: self.name.clone(),
        });
        let initial = self.modes.initial_index();
        self.select_mode_index(ctx, initial);
    }

    pub fn turn_off(&mut self, ctx: &mut SimContext) {
        if !self.on {
            return;
        }
        for index in self.modes.selected_indices() {
            self.deselect_mode_index(ctx, index);
        }
        let mut hooks = TrackHooks::drops_only(&self.name, &mut self.components);
        for event in self.tracker.clear(ctx.sim_time, &mut hooks) {
            publish(&mut ctx.events, &mut self.track_events, &self.name, ctx.sim_time, event);
        }
        self.components.turn_off(ctx.sim_time);
        self.on = false;
        ctx.events.push(SensorEvent::SensorTurnedOff {
            time: ctx.sim_time,
            sensor: self.name.clone(),
        });
    }

    pub fn select_mode(&mut self, ctx: &mut SimContext, name: &str) -> Result<()> {
        let index = self.mode_index(name)?;
        self.select_mode_index(ctx, index);
        Ok(())
    }

    pub fn deselect_mode(&mut self, ctx: &mut SimContext, name: &str) -> Result<()> {
        let index = self.mode_index(name)?;
        self.deselect_mode_index(ctx, index);
        Ok(())
    }

    fn mode_index(&self, name: &str) -> Result<usize> {
        self.modes.index_of(name).ok_or_else(|| SensorError::UnknownMode {
            sensor: self.name.clone(),
            mode: name.to_string(),
        })
    }

    fn select_mode_index(&mut self, ctx: &mut SimContext, index: usize) {
        if !self.on {
            debug!(sensor = %self.name, "mode selection ignored while off");
            return;
        }
        match self.modes.get(index) {
            Some(mode) if !mode.common.selected => {}
            _ => return,
        }
        if !self.modes.multi_select() {
            for other in self.modes.selected_indices() {
                self.deselect_mode_index(ctx, other);
            }
        }
        let Some(mode) = self.modes.get_mut(index) else {
            return;
        };
        mode.common.selected = true;
        mode.kind.capability_mut().select(ctx.sim_time);
        let name = mode.common.name.clone();
        let is_sar = mode.kind.as_sar().is_some();
        self.components.select_mode(ctx.sim_time, &name);
        ctx.events.push(SensorEvent::ModeActivated {
            time: ctx.sim_time,
            sensor: self.name.clone(),
            mode: name,
        });
        if is_sar {
            self.begin_sar(ctx, index);
        }
    }

    fn deselect_mode_index(&mut self, ctx: &mut SimContext, index: usize) {
        match self.modes.get(index) {
            Some(mode) if mode.common.selected => {}
            _ => return,
        }
        if self.sar_mode == Some(index) {
            self.finish_sar(ctx, index);
        }
        let Some(mode) = self.modes.get_mut(index) else {
            return;
        };
        mode.common.selected = false;
        mode.kind.capability_mut().deselect(ctx.sim_time);
        let name = mode.common.name.clone();
        self.components.deselect_mode(ctx.sim_time, &name);
        ctx.events.push(SensorEvent::ModeDeactivated {
            time: ctx.sim_time,
            sensor: self.name.clone(),
            mode: name,
        });
    }

    // -----------------------------------------------------------------------
    // Tracking requests
    // -----------------------------------------------------------------------

    /// Start a tracking request in the named mode, or the first mode with
    /// room. Returns false when no mode can take it.
    pub fn start_tracking(&mut self, request: RequestId, target: TargetIndex, mode: Option<&str>) -> bool {
        if request.is_search() || self.requests.contains_key(&request) {
            return false;
        }
        let index = match mode {
            Some(name) => self
                .modes
                .index_of(name)
                .filter(|&i| self.modes.get(i).is_some_and(|m| m.common.has_request_capacity())),
            None => self
                .modes
                .iter()
                .find(|m| m.common.has_request_capacity())
                .map(|m| m.common.index),
        };
        let Some(index) = index else {
            warn!(sensor = %self.name, %request, "no mode can accept another tracking request");
            return false;
        };
        if let Some(m) = self.modes.get_mut(index) {
            m.common.active_requests += 1;
        }
        self.requests.insert(request, TrackingRequest { target, mode: index });
        info!(sensor = %self.name, %request, %target, mode = index, "tracking request started");
        true
    }

    pub fn stop_tracking(&mut self, ctx: &mut SimContext, request: RequestId) {
        let Some(req) = self.requests.remove(&request) else {
            return;
        };
        if let Some(m) = self.modes.get_mut(req.mode) {
            m.common.active_requests = m.common.active_requests.saturating_sub(1);
        }
        let mut hooks = TrackHooks::drops_only(&self.name, &mut self.components);
        for event in self.tracker.stop_tracking(ctx.sim_time, request, &mut hooks) {
            publish(&mut ctx.events, &mut self.track_events, &self.name, ctx.sim_time, event);
        }
    }

    /// Move a request to another mode if that mode has room.
    fn transfer_request(&mut self, request: RequestId, to: usize) -> bool {
        let Some(from) = self.requests.get(&request).map(|r| r.mode) else {
            return false;
        };
        if from == to || !self.modes.get(to).is_some_and(|m| m.common.has_request_capacity()) {
            return false;
        }
        if let Some(m) = self.modes.get_mut(from) {
            m.common.active_requests = m.common.active_requests.saturating_sub(1);
        }
        if let Some(m) = self.modes.get_mut(to) {
            m.common.active_requests += 1;
        }
        if let Some(r) = self.requests.get_mut(&request) {
            r.mode = to;
        }
        true
    }

    // -----------------------------------------------------------------------
    // Update
    // -----------------------------------------------------------------------

    /// Shortest frame time among the selected modes; 0 updates every call.
    fn frame_interval(&self) -> f64 {
        self.modes
            .iter()
            .filter(|m| m.common.selected && m.common.frame_time > 0.0)
            .map(|m| m.common.frame_time)
            .reduce(f64::min)
            .unwrap_or(0.0)
    }

    /// One scheduled update: search, tracking requests, SAR collection.
    pub fn update(&mut self, ctx: &mut SimContext) {
        let t = ctx.sim_time;
        if !self.on || t + 1.0e-9 < self.next_update_time {
            return;
        }
        self.next_update_time = t + self.frame_interval();

        let Some(host_index) = self.host else {
            return;
        };
        let Some(host) = ctx.platforms.get(host_index) else {
            warn!(sensor = %self.name, "host platform is gone");
            return;
        };
        let host = host.clone();
        let transitions = self.detect(ctx, &host);
        for (request, to) in transitions {
            if self.transfer_request(request, to) {
                debug!(sensor = %self.name, %request, mode = to, "request changed mode");
                self.select_mode_index(ctx, to);
            }
        }
        if let Some(index) = self.sar_mode {
            self.update_sar(ctx, &host, index);
        }
    }

    /// Search and request opportunities. Returns the mode transitions the
    /// requests asked for.
    fn detect(&mut self, ctx: &mut SimContext, host: &Platform) -> Vec<(RequestId, usize)> {
        let SimContext {
            sim_time,
            platforms,
            rng,
            events,
            use_constant_required_pd,
            epoch,
        } = ctx;
        let attempt = Attempt {
            sensor: &self.name,
            host,
            mount: host.body_frame().rotated(self.yaw, self.pitch),
            sim_time: *sim_time,
            epoch: *epoch,
        };
        let constant_pd = *use_constant_required_pd;

        let searching: Vec<usize> = (0..self.modes.len())
            .filter(|&i| {
                self.modes.is_searching(i)
                    && self.modes.get(i).is_some_and(|m| m.kind.as_sar().is_none())
            })
            .collect();
        if !searching.is_empty() {
            for target in platforms.iter() {
                if !self.filter.allows(host, target) {
                    continue;
                }
                let mut outcome: Option<(usize, DetectionResult)> = None;
                for &index in &searching {
                    let Some(mode) = self.modes.get(index) else {
                        continue;
                    };
                    let required_pd = draw_required_pd(rng, constant_pd, mode.common.required_pd);
                    let range = (target.location_wcs - host.location_wcs).norm();
                    let result = if mode.capability().antenna().within_range(range) {
                        attempt.run(mode, target, required_pd, &mut self.components)
                    } else {
                        attempt.range_miss(target, required_pd)
                    };
                    let detected = result.detected();
                    outcome = Some((index, result));
                    if detected {
                        break;
                    }
                }
                let Some((index, result)) = outcome else {
                    continue;
                };
                let Some(mode) = self.modes.get(index) else {
                    continue;
                };
                let key = TrackKey::search(target.index);
                let event = attempt.report(
                    mode,
                    target,
                    key,
                    result,
                    &mut self.tracker,
                    &mut self.components,
                    rng,
                );
                if let Some(event) = event {
                    publish(events, &mut self.track_events, &self.name, *sim_time, event);
                }
            }
        }

        let mut transitions = Vec::new();
        let requests: Vec<(RequestId, TrackingRequest)> =
            self.requests.iter().map(|(id, r)| (*id, *r)).collect();
        for (request, req) in requests {
            let Some(mode) = self.modes.get(req.mode) else {
                continue;
            };
            if !mode.common.selected || mode.kind.as_sar().is_some() {
                continue;
            }
            let Some(target) = platforms.get(req.target) else {
                continue;
            };
            let required_pd = draw_required_pd(rng, constant_pd, mode.common.required_pd);
            let result = attempt.run(mode, target, required_pd, &mut self.components);
            let next = if result.detected() {
                mode.common.on_success_index
            } else {
                mode.common.on_failure_index
            };
            let key = TrackKey::new(request, req.target);
            let event = attempt.report(
                mode,
                target,
                key,
                result,
                &mut self.tracker,
                &mut self.components,
                rng,
            );
            if let Some(event) = event {
                publish(events, &mut self.track_events, &self.name, *sim_time, event);
            }
            if next != req.mode {
                transitions.push((request, next));
            }
        }
        transitions
    }

    // -----------------------------------------------------------------------
    // SAR
    // -----------------------------------------------------------------------

    fn begin_sar(&mut self, ctx: &mut SimContext, index: usize) {
        let Some(host) = self.host.and_then(|h| ctx.platforms.get(h)) else {
            return;
        };
        let mount = self.mount(host);
        let Some(mode) = self.modes.get_mut(index) else {
            return;
        };
        let mode_name = mode.common.name.clone();
        let Some(sar) = mode.kind.as_sar_mut() else {
            return;
        };
        match sar.operating_mode {
            OperatingMode::Spot => {
                let filter = &self.filter;
                let candidates = ctx.platforms.iter().filter(|p| filter.allows(host, p));
                match self.sar.begin_spot(ctx.sim_time, sar, host, &mount, candidates) {
                    Ok(()) => {
                        self.sar_mode = Some(index);
                        info!(
                            sensor = %self.name,
                            mode = %mode_name,
                            stream = self.sar.stream(),
                            expiry = self.sar.expiry(),
                            "SAR spot collection started"
                        );
                    }
                    Err(failures) => {
                        self.sar_mode = None;
                        ctx.events.push(SensorEvent::SarCollectionAborted {
                            time: ctx.sim_time,
                            sensor: self.name.clone(),
                            mode: mode_name,
                            reason: failures.describe(),
                        });
                    }
                }
            }
            OperatingMode::Strip => {
                self.sar.begin_strip(ctx.sim_time, sar, host, &mount);
                self.sar_mode = Some(index);
                info!(sensor = %self.name, mode = %mode_name, stream = self.sar.stream(), "SAR strip collection started");
            }
        }
    }

    fn update_sar(&mut self, ctx: &mut SimContext, host: &Platform, index: usize) {
        match self.sar.collecting() {
            Some(OperatingMode::Spot) => {
                if !self.sar.dwell_complete(ctx.sim_time) {
                    self.sample_sar(ctx, host, index);
                    return;
                }
                let automatic = self
                    .modes
                    .get(index)
                    .and_then(|m| m.kind.as_sar())
                    .is_some_and(|s| s.automatic_turn_off);
                if automatic {
                    info!(sensor = %self.name, "dwell complete, turning off");
                    self.turn_off(ctx);
                }
            }
            Some(OperatingMode::Strip) => self.strip_frame(ctx, host, index),
            None => {}
        }
    }

    fn sample_sar(&mut self, ctx: &mut SimContext, host: &Platform, index: usize) {
        let Some(mode) = self.modes.get(index) else {
            return;
        };
        let Some(sar) = mode.kind.as_sar() else {
            return;
        };
        let SimContext {
            sim_time,
            platforms,
            rng,
            use_constant_required_pd,
            epoch,
            ..
        } = ctx;
        let attempt = Attempt {
            sensor: &self.name,
            host,
            mount: host.body_frame().rotated(self.yaw, self.pitch),
            sim_time: *sim_time,
            epoch: *epoch,
        };
        let components = &mut self.components;
        self.sar.sample(*sim_time, sar, platforms, |target| {
            let required_pd = draw_required_pd(rng, *use_constant_required_pd, mode.common.required_pd);
            attempt.run(mode, target, required_pd, components)
        });
    }

    fn strip_frame(&mut self, ctx: &mut SimContext, host: &Platform, index: usize) {
        let Some(mode) = self.modes.get(index) else {
            return;
        };
        let Some(sar) = mode.kind.as_sar() else {
            return;
        };
        let SimContext {
            sim_time,
            platforms,
            rng,
            events,
            use_constant_required_pd,
            epoch,
        } = ctx;
        let mount = host.body_frame().rotated(self.yaw, self.pitch);
        let attempt = Attempt {
            sensor: &self.name,
            host,
            mount,
            sim_time: *sim_time,
            epoch: *epoch,
        };
        let source = ImageSource {
            sensor: &self.name,
            mode: mode.name(),
        };
        let filter = &self.filter;
        let candidates = platforms.iter().filter(|p| filter.allows(host, p));
        let components = &mut self.components;
        let image = self.sar.strip_frame(
            *sim_time,
            source,
            sar,
            host,
            &mount,
            platforms,
            candidates,
            |target| {
                let required_pd =
                    draw_required_pd(rng, *use_constant_required_pd, mode.common.required_pd);
                attempt.run(mode, target, required_pd, components)
            },
        );
        Self::deliver_image(events, &mut self.images, image);
    }

    /// End the open collection of mode `index`: form the image when the
    /// dwell is complete or substandard images are rescaled, otherwise abort.
    fn finish_sar(&mut self, ctx: &mut SimContext, index: usize) {
        self.sar_mode = None;
        let Some(mode) = self.modes.get(index) else {
            self.sar.abort();
            return;
        };
        let Some(sar) = mode.kind.as_sar() else {
            self.sar.abort();
            return;
        };
        match self.sar.collecting() {
            Some(OperatingMode::Strip) => {
                self.sar.end_strip();
                return;
            }
            Some(OperatingMode::Spot) => {}
            None => return,
        }
        if !self.sar.dwell_complete(ctx.sim_time) && !sar.rescale_substandard_image {
            self.sar.abort();
            ctx.events.push(SensorEvent::SarCollectionAborted {
                time: ctx.sim_time,
                sensor: self.name.clone(),
                mode: mode.name().to_string(),
                reason: "dwell_incomplete".into(),
            });
            return;
        }

        let host = self.host.and_then(|h| ctx.platforms.get(h)).cloned();
        let SimContext {
            sim_time,
            platforms,
            rng,
            events,
            use_constant_required_pd,
            epoch,
        } = ctx;
        let source = ImageSource {
            sensor: &self.name,
            mode: mode.name(),
        };
        let image = match &host {
            Some(host) => {
                let attempt = Attempt {
                    sensor: &self.name,
                    host,
                    mount: host.body_frame().rotated(self.yaw, self.pitch),
                    sim_time: *sim_time,
                    epoch: *epoch,
                };
                let components = &mut self.components;
                self.sar.end_spot(*sim_time, source, sar, platforms, |target| {
                    let required_pd =
                        draw_required_pd(rng, *use_constant_required_pd, mode.common.required_pd);
                    attempt.run(mode, target, required_pd, components)
                })
            }
            // Without a host no further samples can be taken
            None => self.sar.end_spot(*sim_time, source, sar, platforms, |_| {
                let mut miss = DetectionResult::new(1.0);
                miss.fail(FailureStatus::TARGET_DELETED);
                miss
            }),
        };
        Self::deliver_image(events, &mut self.images, image);
    }

    fn deliver_image(events: &mut EventLog, images: &mut Vec<SarImage>, image: SarImage) {
        events.push(SensorEvent::SarImageFormed {
            time: image.end_time,
            sensor: image.sensor.clone(),
            mode: image.mode.clone(),
            stream: image.stream,
            frame: image.frame,
            objects: image.objects.len(),
        });
        images.push(image);
    }

    // -----------------------------------------------------------------------
    // Platform removal
    // -----------------------------------------------------------------------

    /// Forget everything held against a platform that left the simulation.
    pub fn platform_deleted(&mut self, ctx: &mut SimContext, target: TargetIndex) {
        let mut hooks = TrackHooks::drops_only(&self.name, &mut self.components);
        for event in self.tracker.target_deleted(ctx.sim_time, target, &mut hooks) {
            publish(&mut ctx.events, &mut self.track_events, &self.name, ctx.sim_time, event);
        }
        let orphaned: Vec<RequestId> = self
            .requests
            .iter()
            .filter(|(_, r)| r.target == target)
            .map(|(id, _)| *id)
            .collect();
        for request in orphaned {
            if let Some(req) = self.requests.remove(&request) {
                if let Some(m) = self.modes.get_mut(req.mode) {
                    m.common.active_requests = m.common.active_requests.saturating_sub(1);
                }
            }
        }
        self.sar.remove_target(target);
        self.components.platform_deleted(ctx.sim_time, target);
    }
}

/// Read every `sensor ... end_sensor` block in `text`.
pub fn read_sensors(text: &str, factories: &[Arc<dyn ComponentFactory>]) -> Result<Vec<Sensor>> {
    let mut input = InputReader::new(text);
    let mut sensors = Vec::new();
    while let Some(command) = input.read_command() {
        if command != "sensor" {
            return Err(SensorError::Input {
                sensor: String::new(),
                source: input.unknown_command(),
            });
        }
        sensors.push(Sensor::from_input(&mut input, factories)?);
    }
    Ok(sensors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{SolarIlluminationComponent, SolarIlluminationFactory};
    use crate::mode::ModeState;
    use approx::assert_relative_eq;
    use sensor_models::{Attitude, GeoPoint, Vec3};
    use tracker_core::TrackState;

    const RADAR: &str = "
        sensor radar1 radar
          platform site
          frequency 3 GHz peak_power 1 MW pulse_width 1 us bandwidth 1 MHz
          detection_threshold 13 dB beamwidth 2 deg
          maximum_range 400 km
          frame_time 1 s
          hits_to_establish_track 2 3
          reports_location reports_range reports_bearing
        end_sensor";

    fn scene() -> (SimContext, TargetIndex) {
        let mut ctx = SimContext::new(11);
        ctx.use_constant_required_pd = true;
        let mut site = Platform::new("site", GeoPoint::from_degrees(0.0, 0.0, 10.0).to_wcs());
        site.side = "blue".into();
        ctx.platforms.add(site);
        let mut jet = Platform::new("jet", GeoPoint::from_degrees(0.5, 0.0, 8000.0).to_wcs());
        jet.side = "red".into();
        jet.radar_cross_section = 10.0;
        let jet = ctx.platforms.add(jet);
        (ctx, jet)
    }

    fn sensor(text: &str, ctx: &mut SimContext) -> Sensor {
        let mut sensors = read_sensors(text, &[]).unwrap();
        let mut sensor = sensors.remove(0);
        sensor.initialize(ctx).unwrap();
        sensor
    }

    fn step(sensor: &mut Sensor, ctx: &mut SimContext, t: f64) {
        ctx.sim_time = t;
        sensor.update(ctx);
    }

    #[test]
    fn reads_definition() {
        let text = "sensor eo1 eo platform site yaw 45 deg ignore_side green ignore missile
                    ignore_domain land mode wide end_mode mode narrow end_mode end_sensor";
        let sensors = read_sensors(text, &[]).unwrap();
        let s = &sensors[0];
        assert_eq!(s.name(), "eo1");
        assert_eq!(s.sensor_type(), SensorType::Optical);
        assert_eq!(s.modes().names(), ["wide", "narrow"]);
        assert_eq!(s.filter().sides, ["green"]);
        assert_eq!(s.filter().categories, ["missile"]);
        assert_eq!(s.filter().domains, [SpatialDomain::Land]);

        assert!(matches!(
            read_sensors("sensor s1 sonar end_sensor", &[]),
            Err(SensorError::UnknownSensorType { .. })
        ));
        let err = read_sensors("sensor s1 radar bogus end_sensor", &[]).unwrap_err();
        assert!(err.to_string().contains("bogus"));
        assert!(read_sensors("sensor s1 radar platform site", &[]).is_err());
    }

    #[test]
    fn unknown_platform_fails_initialize() {
        let mut ctx = SimContext::new(1);
        let mut sensors = read_sensors("sensor s1 radar platform nowhere end_sensor", &[]).unwrap();
        assert!(matches!(
            sensors[0].initialize(&mut ctx),
            Err(SensorError::UnknownPlatform { .. })
        ));
    }

    #[test]
    fn ignore_lists() {
        let mut host = Platform::new("host", Vec3::zeros());
        host.index = TargetIndex(1);
        host.side = "blue".into();
        let mut target = Platform::new("t", Vec3::zeros());
        target.index = TargetIndex(2);
        target.side = "blue".into();
        target.categories.push("decoy".into());

        let mut filter = DetectionFilter::default();
        assert!(filter.allows(&host, &target));
        assert!(!filter.allows(&host, &host));
        filter.same_side = true;
        assert!(!filter.allows(&host, &target));
        filter = DetectionFilter {
            categories: vec!["decoy".into()],
            ..Default::default()
        };
        assert!(!filter.allows(&host, &target));
        filter = DetectionFilter {
            domains: vec![SpatialDomain::Air],
            ..Default::default()
        };
        assert!(!filter.allows(&host, &target));

        let mut input = InputReader::new("ignore_nothing");
        input.read_command();
        assert!(filter.process_input(&mut input).unwrap());
        assert_eq!(filter, DetectionFilter::default());
    }

    #[test]
    fn establishes_then_updates_track() {
        let (mut ctx, jet) = scene();
        let mut s = sensor(RADAR, &mut ctx);
        s.turn_on(&mut ctx);
        assert_eq!(ctx.events.count("mode_activated"), 1);

        step(&mut s, &mut ctx, 0.0);
        assert_eq!(s.tracker().state(TrackKey::search(jet)), TrackState::Pending);
        // Not due again until a frame has passed
        step(&mut s, &mut ctx, 0.5);
        assert_eq!(s.tracker().hit_history(TrackKey::search(jet)).unwrap().bits(), 0b1);
        step(&mut s, &mut ctx, 1.0);
        assert_eq!(ctx.events.count("track_initiated"), 1);
        step(&mut s, &mut ctx, 2.0);
        assert_eq!(ctx.events.count("track_updated"), 1);

        let track = s.tracker().track(TrackKey::search(jet)).unwrap();
        assert_eq!(track.target_name, "jet");
        assert_eq!(track.sensor_name, "radar1");
        assert!(track.range.is_some());
        assert!(track.range_rate.is_none());
        let events = s.drain_track_events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], TrackEvent::Initiated(_)));
    }

    #[test]
    fn turn_off_drops_tracks() {
        let (mut ctx, _) = scene();
        let mut s = sensor(RADAR, &mut ctx);
        s.turn_on(&mut ctx);
        for t in 0..3 {
            step(&mut s, &mut ctx, f64::from(t));
        }
        assert_eq!(s.track_count(), 1);
        s.turn_off(&mut ctx);
        assert_eq!(s.track_count(), 0);
        assert_eq!(ctx.events.count("track_dropped"), 1);
        assert_eq!(ctx.events.count("mode_deactivated"), 1);
        assert!(!s.is_on());
        // Updates while off do nothing
        step(&mut s, &mut ctx, 10.0);
        assert_eq!(s.tracker().history_count(), 0);
    }

    #[test]
    fn deleted_platform_drops_track() {
        let (mut ctx, jet) = scene();
        let mut s = sensor(RADAR, &mut ctx);
        s.turn_on(&mut ctx);
        step(&mut s, &mut ctx, 0.0);
        step(&mut s, &mut ctx, 1.0);
        assert_eq!(s.track_count(), 1);
        ctx.platforms.remove(jet);
        s.platform_deleted(&mut ctx, jet);
        assert_eq!(s.track_count(), 0);
        assert_eq!(ctx.events.count("track_dropped"), 1);
    }

    #[test]
    fn out_of_range_target_is_a_miss() {
        let (mut ctx, jet) = scene();
        let text = RADAR.replace("maximum_range 400 km", "maximum_range 20 km");
        let mut s = sensor(&text, &mut ctx);
        s.turn_on(&mut ctx);
        step(&mut s, &mut ctx, 0.0);
        assert_eq!(s.tracker().state(TrackKey::search(jet)), TrackState::NoTrack);
    }

    #[test]
    fn first_detecting_mode_wins() {
        let (mut ctx, jet) = scene();
        let text = "
            sensor radar1 radar
              platform site
              frequency 3 GHz peak_power 1 MW pulse_width 1 us bandwidth 1 MHz beamwidth 2 deg
              selection_mode multiple
              mode short maximum_range 20 km end_mode
              mode long maximum_range 400 km end_mode
            end_sensor";
        let mut s = sensor(text, &mut ctx);
        s.turn_on(&mut ctx);
        s.select_mode(&mut ctx, "long").unwrap();
        assert_eq!(s.modes().selected_indices(), [0, 1]);
        step(&mut s, &mut ctx, 0.0);
        let track = s.tracker().track(TrackKey::search(jet)).unwrap();
        assert_eq!(track.mode_name, "long");
    }

    #[test]
    fn single_select_replaces_mode() {
        let (mut ctx, _) = scene();
        let text = "sensor radar1 radar platform site mode a end_mode mode b end_mode end_sensor";
        let mut s = sensor(text, &mut ctx);
        s.turn_on(&mut ctx);
        s.select_mode(&mut ctx, "b").unwrap();
        assert_eq!(s.modes().selected_indices(), [1]);
        assert_eq!(ctx.events.count("mode_deactivated"), 1);
        assert_eq!(ctx.events.count("mode_activated"), 2);
        assert!(matches!(
            s.select_mode(&mut ctx, "c"),
            Err(SensorError::UnknownMode { .. })
        ));
    }

    #[test]
    fn tracking_requests_respect_capacity() {
        let (mut ctx, jet) = scene();
        let text = "sensor radar1 radar platform site
                      mode search end_mode
                      mode stt maximum_request_count 1 end_mode
                    end_sensor";
        let mut s = sensor(text, &mut ctx);
        assert!(!s.start_tracking(RequestId::SEARCH, jet, None));
        assert!(s.start_tracking(RequestId(1), jet, None));
        assert_eq!(s.requests()[&RequestId(1)].mode, 1);
        assert!(!s.start_tracking(RequestId(2), jet, Some("stt")));
        assert_eq!(s.modes().get(1).unwrap().common.state(), ModeState::Deselected);

        s.stop_tracking(&mut ctx, RequestId(1));
        assert!(s.requests().is_empty());
        assert_eq!(s.modes().get(1).unwrap().common.active_requests, 0);
    }

    #[test]
    fn request_opportunities_use_request_key() {
        let (mut ctx, jet) = scene();
        let text = "sensor radar1 radar platform site
                      frequency 3 GHz peak_power 1 MW pulse_width 1 us bandwidth 1 MHz beamwidth 2 deg
                      mode stt maximum_request_count 1 end_mode
                    end_sensor";
        let mut s = sensor(text, &mut ctx);
        s.turn_on(&mut ctx);
        assert!(s.start_tracking(RequestId(7), jet, Some("stt")));
        step(&mut s, &mut ctx, 0.0);
        assert!(s.tracker().track(TrackKey::new(RequestId(7), jet)).is_some());
        // A tracking mode that cannot search while tracking makes no search chances
        assert!(s.tracker().track(TrackKey::search(jet)).is_none());
    }

    #[test]
    fn solar_component_conceals_at_night() {
        let (mut ctx, jet) = scene();
        // Midnight UTC at longitude 0
        ctx.epoch.utc_seconds = 0.0;
        let text = RADAR.replace(
            "frame_time 1 s",
            "frame_time 1 s mode day target_solar_illumination_angle 10 deg 90 deg end_mode",
        );
        let factories: Vec<Arc<dyn ComponentFactory>> = vec![Arc::new(SolarIlluminationFactory)];
        let mut s = read_sensors(&text, &factories).unwrap().remove(0);
        s.initialize(&mut ctx).unwrap();
        assert!(s.components().find_by_role::<SolarIlluminationComponent>().is_some());
        s.turn_on(&mut ctx);
        step(&mut s, &mut ctx, 0.0);
        assert_eq!(s.tracker().state(TrackKey::search(jet)), TrackState::NoTrack);
    }

    // -----------------------------------------------------------------------
    // SAR
    // -----------------------------------------------------------------------

    const SAR: &str = "
        sensor sar1 sar
          platform jstars
          yaw 90 deg
          frequency 10 GHz peak_power 10 kW bandwidth 150 MHz beamwidth 2 deg
          antenna_tilt -30 deg resolution 1 m
          required_pd 0.5
        end_sensor";

    fn sar_scene(text: &str) -> (SimContext, Sensor) {
        let mut ctx = SimContext::new(3);
        ctx.use_constant_required_pd = true;
        let location = GeoPoint::from_degrees(0.0, 0.0, 8000.0).to_wcs();
        let mut host = Platform::new("jstars", location);
        host.attitude = Attitude::heading(0.0);
        host.velocity_wcs = host.ned_frame().to_wcs(&Vec3::new(200.0, 0.0, 0.0)) - location;
        ctx.platforms.add(host);
        let mut truck = Platform::new("truck", GeoPoint::from_degrees(0.0, 0.1247, 0.0).to_wcs());
        truck.domain = SpatialDomain::Land;
        truck.radar_cross_section = 10.0;
        ctx.platforms.add(truck);
        let s = sensor(text, &mut ctx);
        (ctx, s)
    }

    #[test]
    fn spot_image_on_turn_off() {
        let (mut ctx, mut s) = sar_scene(SAR);
        s.turn_on(&mut ctx);
        assert!(s.sar().is_collecting());
        assert_eq!(s.sar().chances().len(), 1);
        step(&mut s, &mut ctx, 0.0);
        step(&mut s, &mut ctx, 1.0);
        step(&mut s, &mut ctx, 2.0);
        // Dwell complete but the sensor waits to be turned off
        assert!(s.is_on());
        s.turn_off(&mut ctx);

        let images = s.drain_images();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].stream, 1);
        assert_eq!(images[0].objects.len(), 1);
        assert_eq!(images[0].objects[0].name, "truck");
        assert_eq!(ctx.events.count("sar_image_formed"), 1);
        // Images never feed the tracker
        assert_eq!(s.tracker().history_count(), 0);
    }

    #[test]
    fn early_turn_off_aborts() {
        let (mut ctx, mut s) = sar_scene(SAR);
        s.turn_on(&mut ctx);
        step(&mut s, &mut ctx, 0.0);
        ctx.sim_time = 0.5;
        s.turn_off(&mut ctx);
        assert!(s.drain_images().is_empty());
        assert_eq!(ctx.events.count("sar_collection_aborted"), 1);
        assert!(!s.sar().is_collecting());
    }

    #[test]
    fn early_turn_off_forms_rescaled_image() {
        let text = SAR.replace("required_pd 0.5", "rescale_substandard_image");
        let (mut ctx, mut s) = sar_scene(&text);
        s.turn_on(&mut ctx);
        step(&mut s, &mut ctx, 0.0);
        ctx.sim_time = 0.5;
        s.turn_off(&mut ctx);

        assert_eq!(ctx.events.count("sar_collection_aborted"), 0);
        let images = s.drain_images();
        assert_eq!(images.len(), 1);
        let sar = s.modes().get(0).and_then(|m| m.kind.as_sar()).unwrap();
        let image = &images[0];
        assert!(image.azimuth_resolution > sar.current_azimuth_resolution);
        assert_relative_eq!(
            image.ground_range_resolution,
            sar.current_ground_range_resolution * image.azimuth_resolution / sar.current_azimuth_resolution,
            max_relative = 1e-9
        );
        assert!(image.collection_factor < 1.0);
    }

    #[test]
    fn automatic_turn_off_at_expiry() {
        let text = SAR.replace("required_pd 0.5", "automatic_turn_off");
        let (mut ctx, mut s) = sar_scene(&text);
        s.turn_on(&mut ctx);
        for t in 0..3 {
            step(&mut s, &mut ctx, f64::from(t));
        }
        assert!(!s.is_on());
        assert_eq!(s.drain_images().len(), 1);
        assert_eq!(ctx.events.count("sensor_turned_off"), 1);
    }

    #[test]
    fn each_spot_collection_is_a_new_stream() {
        let (mut ctx, mut s) = sar_scene(SAR);
        for cycle in 0..2 {
            let start = f64::from(cycle) * 10.0;
            ctx.sim_time = start;
            s.turn_on(&mut ctx);
            step(&mut s, &mut ctx, start);
            ctx.sim_time = start + 5.0;
            s.turn_off(&mut ctx);
        }
        let streams: Vec<u32> = s.drain_images().iter().map(|i| i.stream).collect();
        assert_eq!(streams, [1, 2]);
    }

    #[test]
    fn inhibited_collection_reports_reasons() {
        let text = SAR.replace("required_pd 0.5", "maximum_dwell_time 0.5 s inhibit_substandard_collection");
        let (mut ctx, mut s) = sar_scene(&text);
        s.turn_on(&mut ctx);
        assert!(!s.sar().is_collecting());
        let reason = ctx.events.events().iter().find_map(|e| match e {
            SensorEvent::SarCollectionAborted { reason, .. } => Some(reason.clone()),
            _ => None,
        });
        assert!(reason.unwrap().contains("dwell_time_limit_exceeded"));
    }

    #[test]
    fn strip_emits_image_per_frame() {
        let text = SAR.replace("resolution 1 m", "resolution 1 m operating_mode strip frame_time 1 s");
        let (mut ctx, mut s) = sar_scene(&text);
        s.turn_on(&mut ctx);
        for t in 0..3 {
            step(&mut s, &mut ctx, f64::from(t));
        }
        let frames: Vec<u32> = s.drain_images().iter().map(|i| i.frame).collect();
        assert_eq!(frames, [1, 2, 3]);
        s.turn_off(&mut ctx);
        assert!(!s.sar().is_collecting());
    }
}
