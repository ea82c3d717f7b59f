//! Sensor modes.
//!
//! A mode is one named operating configuration of a sensor. The parameters
//! every family shares live in [`ModeCommon`]; the physics lives in the
//! family-specific [`ModeKind`] variant, reached through the
//! [`ModeCapability`] interface.
//!
//! # Mode Policy
//! - Keywords outside a `mode ... end_mode` block edit the template. A
//!   `mode <name>` block edits that mode, creating it from a copy of the
//!   template the first time the name appears.
//! - A sensor without explicit modes gets a single mode named `default`.
//! - Indices follow definition order and never change after initialize.
//! - `maximum_request_count 0` means a pure search mode: it can always
//!   search while tracking and never disables search.
//! - A selected mode with active requests is tracking. It keeps searching
//!   only if `search_while_track` is set, and a tracking mode with
//!   `disables_search` stops every other mode from searching.

use crate::component::ComponentList;
use crate::context::Platform;
use crate::error::{Result, SensorError};
use crate::optical::OpticalMode;
use crate::radar::RadarMode;
use crate::sar::SarMode;
use crate::sensor::SensorType;
use sensor_models::{
    Antenna, DetectionResult, ErrorModel, InputReader, InputResult, LocalFrame,
    RadarErrorInputs, ReportingFlags, ValueType,
};
use tracing::warn;
use tracker_core::{IffStatus, Track, TrackerSettings};

/// Name of the template mode and of the implicit single mode.
pub const DEFAULT_MODE: &str = "default";

/// Selection state of a mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeState {
    Deselected,
    Searching,
    Tracking,
}

/// What the sensor passes to a family's detection physics.
#[derive(Clone, Copy)]
pub struct DetectEnv<'a> {
    pub sim_time: f64,
    pub host: &'a Platform,
}

// ---------------------------------------------------------------------------
// Family interface
// ---------------------------------------------------------------------------

/// The operations each sensor family implements.
pub trait ModeCapability {
    /// Everything this family could ever report.
    fn capabilities(&self) -> ReportingFlags;

    /// Reporting used when a mode names no `reports_*` keyword.
    fn default_reporting(&self) -> ReportingFlags;

    /// True for families that may carry a radar error model.
    fn is_radar(&self) -> bool {
        false
    }

    fn antenna(&self) -> &Antenna;

    /// Antenna frame for a mount frame. Families that steer their beam
    /// electronically rotate further.
    fn antenna_frame(&self, mount: &LocalFrame) -> LocalFrame {
        self.antenna().frame(mount)
    }

    fn process_input(&mut self, input: &mut InputReader) -> InputResult<bool>;

    fn initialize(&mut self, sensor: &str, common: &ModeCommon) -> Result<()>;

    fn select(&mut self, _sim_time: f64) {}

    fn deselect(&mut self, _sim_time: f64) {}

    /// Detection physics. `result` arrives with the geometry filled in and
    /// leaves with failure bits, SNR and Pd set. Must not touch tracker state.
    fn attempt_to_detect(&self, env: &DetectEnv<'_>, target: &Platform, result: &mut DetectionResult);

    /// Inputs for radar-derived measurement errors.
    fn radar_error_inputs(&self) -> Option<RadarErrorInputs> {
        None
    }
}

/// Family-specific part of a mode.
#[derive(Clone, Debug)]
pub enum ModeKind {
    Radar(RadarMode),
    Optical(OpticalMode),
    Sar(SarMode),
}

impl ModeKind {
    pub fn for_type(sensor_type: SensorType) -> Self {
        match sensor_type {
            SensorType::Radar => ModeKind::Radar(RadarMode::default()),
            SensorType::Optical => ModeKind::Optical(OpticalMode::default()),
            SensorType::Sar => ModeKind::Sar(SarMode::default()),
        }
    }

    pub fn capability(&self) -> &dyn ModeCapability {
        match self {
            ModeKind::Radar(m) => m,
            ModeKind::Optical(m) => m,
            ModeKind::Sar(m) => m,
        }
    }

    pub fn capability_mut(&mut self) -> &mut dyn ModeCapability {
        match self {
            ModeKind::Radar(m) => m,
            ModeKind::Optical(m) => m,
            ModeKind::Sar(m) => m,
        }
    }

    pub fn as_sar(&self) -> Option<&SarMode> {
        match self {
            ModeKind::Sar(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_sar_mut(&mut self) -> Option<&mut SarMode> {
        match self {
            ModeKind::Sar(m) => Some(m),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Common parameters
// ---------------------------------------------------------------------------

/// Parameters shared by the modes of every family.
#[derive(Clone, Debug)]
pub struct ModeCommon {
    pub name: String,
    /// Position in the owning mode list
    pub index: usize,
    /// Tracking requests this mode can serve at once (0 = search only)
    pub maximum_request_count: u32,
    /// Time between detection chances (s)
    pub frame_time: f64,
    pub revisit_time: f64,
    pub dwell_time: f64,
    pub disables_search: bool,
    pub can_search_while_track: bool,
    /// Pd an attempt must reach when required Pd is constant
    pub required_pd: f64,
    pub track_quality: f64,
    pub tracker_settings: TrackerSettings,
    pub on_success: Option<String>,
    pub on_failure: Option<String>,
    pub on_success_index: usize,
    pub on_failure_index: usize,
    /// Size of produced messages (bits)
    pub message_length: u32,
    pub message_priority: u32,
    pub reporting: ReportingFlags,
    /// True once any `reports_*` keyword has been seen
    pub reporting_specified: bool,
    pub error_model: ErrorModel,
    pub selected: bool,
    pub active_requests: u32,
}

impl Default for ModeCommon {
    fn default() -> Self {
        Self {
            name: DEFAULT_MODE.to_string(),
            index: 0,
            maximum_request_count: 0,
            frame_time: 0.0,
            revisit_time: 0.0,
            dwell_time: 0.0,
            disables_search: false,
            can_search_while_track: false,
            required_pd: 0.5,
            track_quality: 0.5,
            tracker_settings: TrackerSettings::default(),
            on_success: None,
            on_failure: None,
            on_success_index: 0,
            on_failure_index: 0,
            message_length: 0,
            message_priority: 0,
            reporting: ReportingFlags::empty(),
            reporting_specified: false,
            error_model: ErrorModel::default(),
            selected: false,
            active_requests: 0,
        }
    }
}

impl ModeCommon {
    pub fn process_input(&mut self, input: &mut InputReader) -> InputResult<bool> {
        match input.command() {
            "maximum_request_count" => {
                self.maximum_request_count = input.read_value()?;
            }
            "frame_time" => {
                self.frame_time = input.read_value_of_type(ValueType::Time)?;
                input.value_greater(self.frame_time, 0.0)?;
            }
            "revisit_time" => {
                self.revisit_time = input.read_value_of_type(ValueType::Time)?;
                input.value_greater(self.revisit_time, 0.0)?;
            }
            "dwell_time" => {
                self.dwell_time = input.read_value_of_type(ValueType::Time)?;
                input.value_greater(self.dwell_time, 0.0)?;
            }
            "search_while_track" | "can_search_while_track" => {
                self.can_search_while_track = input.read_optional_bool();
            }
            "disables_search" => {
                self.disables_search = input.read_optional_bool();
            }
            "required_pd" => {
                self.required_pd = input.read_value()?;
                input.value_greater_or_equal(self.required_pd, 0.0)?;
                input.value_less(self.required_pd, 1.0)?;
            }
            "track_quality" => {
                self.track_quality = input.read_value()?;
                input.value_in_closed_range(self.track_quality, 0.0, 1.0)?;
            }
            "on_success" => {
                self.on_success = Some(input.read_string()?);
            }
            "on_failure" => {
                self.on_failure = Some(input.read_string()?);
            }
            "message_length" => {
                self.message_length = input.read_value()?;
            }
            "message_priority" => {
                self.message_priority = input.read_value()?;
            }
            _ => {
                if self.tracker_settings.process_input(input)? {
                    return Ok(true);
                }
                if self.reporting.process_input(input)? {
                    self.reporting_specified = true;
                    return Ok(true);
                }
                return self.error_model.process_input(input);
            }
        }
        Ok(true)
    }

    /// Resolve defaults and cross-references; `modes` are the names of every
    /// mode of the sensor in index order.
    pub fn initialize(
        &mut self,
        sensor: &str,
        sensor_type: SensorType,
        modes: &[String],
        capability: &dyn ModeCapability,
    ) -> Result<()> {
        if self.maximum_request_count == 0 {
            self.can_search_while_track = true;
            self.disables_search = false;
        }

        if self.frame_time <= 0.0 {
            self.frame_time = self.revisit_time;
        }
        if self.revisit_time <= 0.0 {
            self.revisit_time = self.frame_time;
        }

        self.on_success_index = self.resolve(sensor, modes, self.on_success.as_deref())?;
        self.on_failure_index = self.resolve(sensor, modes, self.on_failure.as_deref())?;

        if !self.reporting_specified {
            self.reporting = capability.default_reporting();
        }
        self.initialize_reporting(sensor, capability.capabilities())?;

        self.error_model
            .initialize(sensor_type.name(), capability.is_radar())
            .map_err(|source| SensorError::IncompatibleErrorModel {
                sensor: sensor.to_string(),
                mode: self.name.clone(),
                source,
            })
    }

    fn resolve(&self, sensor: &str, modes: &[String], name: Option<&str>) -> Result<usize> {
        match name {
            None => Ok(self.index),
            Some(name) => modes
                .iter()
                .position(|m| m == name)
                .ok_or_else(|| SensorError::UnknownMode {
                    sensor: sensor.to_string(),
                    mode: name.to_string(),
                }),
        }
    }

    /// Keep only what the family can report; warn about the rest.
    fn initialize_reporting(&mut self, sensor: &str, capabilities: ReportingFlags) -> Result<()> {
        if self.reporting.is_empty() {
            warn!(sensor, mode = %self.name, "mode reports nothing");
            return Ok(());
        }
        let will = self.reporting & capabilities;
        let cannot = self.reporting - capabilities;
        if !cannot.is_empty() {
            if will.is_empty() {
                return Err(SensorError::NothingReportable {
                    sensor: sensor.to_string(),
                    mode: self.name.clone(),
                });
            }
            for flag in cannot.iter() {
                warn!(
                    sensor,
                    mode = %self.name,
                    flag = ReportingFlags::keyword(flag),
                    "sensor cannot report requested quantity"
                );
            }
        }
        self.reporting = will;
        Ok(())
    }

    pub fn state(&self) -> ModeState {
        if !self.selected {
            ModeState::Deselected
        } else if self.active_requests > 0 {
            ModeState::Tracking
        } else {
            ModeState::Searching
        }
    }

    /// True if another tracking request fits in this mode.
    pub fn has_request_capacity(&self) -> bool {
        self.active_requests < self.maximum_request_count
    }

    /// Project a (possibly error-perturbed) measurement into a track.
    pub fn update_track(
        &self,
        sim_time: f64,
        track: &mut Track,
        sensor: &str,
        host: &Platform,
        target: Option<&Platform>,
        result: &DetectionResult,
    ) {
        let flags = self.reporting;
        let m = &result.measurement;
        track.clear_reported();
        track.update_time = sim_time;
        track.reporting = flags;
        track.quality = self.track_quality;
        track.sensor_name = sensor.to_string();
        track.mode_name = self.name.clone();

        if flags.reports_location() {
            track.location_wcs = m.location_wcs;
        }

        // Range, bearing and elevation are from the receiver in its NED frame
        let ned = LocalFrame::ned_at(result.receiver_location);
        let aspect = m.location_wcs.map(|loc| ned.aspect(&loc));
        if flags.reports_range() {
            track.range = aspect.map(|a| a.range).or(m.range);
        }
        if flags.reports_bearing() {
            track.bearing = aspect.map(|a| a.azimuth).or(m.azimuth);
        }
        if flags.reports_elevation() {
            track.elevation = aspect.map(|a| a.elevation).or(m.elevation);
        }
        if flags.reports_velocity() {
            track.velocity_wcs = m.velocity_wcs.or(Some(result.target_velocity));
        }
        if flags.reports_range_rate() {
            track.range_rate = m.range_rate.or(Some(result.range_rate));
        }
        if flags.reports_signal_to_noise() && result.signal_to_noise > 0.0 {
            track.signal_to_noise = Some(result.signal_to_noise);
        }
        if flags.reports_frequency() {
            track.frequency = m.frequency;
        }
        track.errors = m.sigmas;

        if let Some(target) = target {
            track.target_name = target.name.clone();
            if flags.reports_side() {
                track.side = Some(target.side.clone());
            }
            if flags.reports_type() {
                track.type_name = Some(target.type_name.clone());
            }
            if flags.reports_iff() {
                track.iff = Some(if target.side == host.side {
                    IffStatus::Friend
                } else {
                    IffStatus::Foe
                });
            }
        }
    }
}

// ---------------------------------------------------------------------------
// SensorMode and ModeList
// ---------------------------------------------------------------------------

/// One mode: shared parameters plus family physics.
#[derive(Clone, Debug)]
pub struct SensorMode {
    pub common: ModeCommon,
    pub kind: ModeKind,
}

impl SensorMode {
    pub fn new(kind: ModeKind) -> Self {
        Self {
            common: ModeCommon::default(),
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.common.name
    }

    pub fn index(&self) -> usize {
        self.common.index
    }

    pub fn capability(&self) -> &dyn ModeCapability {
        self.kind.capability()
    }

    /// Family keywords first, then shared keywords, then components.
    pub fn process_input(
        &mut self,
        input: &mut InputReader,
        components: &mut ComponentList,
    ) -> InputResult<bool> {
        if input.command() == "beam" {
            self.process_beam_block(input, components)?;
            return Ok(true);
        }
        if self.kind.capability_mut().process_input(input)? {
            return Ok(true);
        }
        if self.common.process_input(input)? {
            return Ok(true);
        }
        components.process_mode_input(&self.common.name, input)
    }

    /// `beam <n> ... end_beam`. Each mode has a single beam; the block
    /// holds beam keywords and whatever components claim per beam.
    fn process_beam_block(
        &mut self,
        input: &mut InputReader,
        components: &mut ComponentList,
    ) -> InputResult<()> {
        let beam: usize = input.read_value()?;
        input.value_greater_or_equal(beam, 1)?;
        while input.read_block_command("beam", "end_beam")?.is_some() {
            if self.kind.capability_mut().process_input(input)? {
                continue;
            }
            if !components.process_beam_input(&self.common.name, beam, input)? {
                return Err(input.unknown_command());
            }
        }
        Ok(())
    }

    pub fn initialize(&mut self, sensor: &str, sensor_type: SensorType, modes: &[String]) -> Result<()> {
        self.common
            .initialize(sensor, sensor_type, modes, self.kind.capability())?;
        self.kind.capability_mut().initialize(sensor, &self.common)
    }
}

/// The modes of one sensor.
#[derive(Clone, Debug)]
pub struct ModeList {
    template: SensorMode,
    modes: Vec<SensorMode>,
    initial_mode: Option<String>,
    multi_select: bool,
}

impl ModeList {
    pub fn new(sensor_type: SensorType) -> Self {
        Self {
            template: SensorMode::new(ModeKind::for_type(sensor_type)),
            modes: Vec::new(),
            initial_mode: None,
            multi_select: false,
        }
    }

    pub fn template(&self) -> &SensorMode {
        &self.template
    }

    pub fn template_mut(&mut self) -> &mut SensorMode {
        &mut self.template
    }

    pub fn multi_select(&self) -> bool {
        self.multi_select
    }

    pub fn process_input(
        &mut self,
        sensor: &str,
        input: &mut InputReader,
        components: &mut ComponentList,
    ) -> Result<bool> {
        let input_error = |source| SensorError::Input {
            sensor: sensor.to_string(),
            source,
        };
        match input.command() {
            "mode" => {
                let name = input.read_string().map_err(input_error)?;
                let index = match self.modes.iter().position(|m| m.common.name == name) {
                    Some(i) => i,
                    None => {
                        let mut mode = self.template.clone();
                        mode.common.name = name.clone();
                        self.modes.push(mode);
                        self.modes.len() - 1
                    }
                };
                let mode_error = |source| SensorError::ModeInput {
                    sensor: sensor.to_string(),
                    mode: name.clone(),
                    source,
                };
                let mode = &mut self.modes[index];
                while input
                    .read_block_command("mode", "end_mode")
                    .map_err(mode_error)?
                    .is_some()
                {
                    if !mode.process_input(input, components).map_err(mode_error)? {
                        return Err(mode_error(input.unknown_command()));
                    }
                }
                Ok(true)
            }
            "initial_mode" => {
                self.initial_mode = Some(input.read_string().map_err(input_error)?);
                Ok(true)
            }
            "selection_mode" => {
                let value = input.read_string().map_err(input_error)?;
                self.multi_select = match value.as_str() {
                    "single" => false,
                    "multiple" => true,
                    _ => return Err(input_error(input.bad_value(&value))),
                };
                Ok(true)
            }
            _ => self
                .template
                .process_input(input, components)
                .map_err(input_error),
        }
    }

    /// Create the implicit mode if needed, number the modes and initialize
    /// each one.
    pub fn initialize(&mut self, sensor: &str, sensor_type: SensorType) -> Result<()> {
        if self.modes.is_empty() {
            self.modes.push(self.template.clone());
        }
        for (index, mode) in self.modes.iter_mut().enumerate() {
            mode.common.index = index;
        }
        let names = self.names();
        for mode in &mut self.modes {
            mode.initialize(sensor, sensor_type, &names)?;
        }
        if let Some(initial) = &self.initial_mode {
            if self.index_of(initial).is_none() {
                return Err(SensorError::UnknownMode {
                    sensor: sensor.to_string(),
                    mode: initial.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn names(&self) -> Vec<String> {
        self.modes.iter().map(|m| m.common.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.modes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.modes.iter().position(|m| m.common.name == name)
    }

    /// Mode selected at turn-on: `initial_mode`, else the first.
    pub fn initial_index(&self) -> usize {
        self.initial_mode
            .as_deref()
            .and_then(|name| self.index_of(name))
            .unwrap_or(0)
    }

    pub fn get(&self, index: usize) -> Option<&SensorMode> {
        self.modes.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut SensorMode> {
        self.modes.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SensorMode> {
        self.modes.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut SensorMode> {
        self.modes.iter_mut()
    }

    pub fn selected_indices(&self) -> Vec<usize> {
        self.modes
            .iter()
            .filter(|m| m.common.selected)
            .map(|m| m.common.index)
            .collect()
    }

    /// True if the mode at `index` gets search chances this frame.
    pub fn is_searching(&self, index: usize) -> bool {
        let Some(mode) = self.modes.get(index) else {
            return false;
        };
        let c = &mode.common;
        if !c.selected || (c.active_requests > 0 && !c.can_search_while_track) {
            return false;
        }
        !self.modes.iter().any(|other| {
            let o = &other.common;
            o.index != index && o.selected && o.disables_search && o.active_requests > 0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Platform;
    use approx::assert_abs_diff_eq;
    use sensor_models::GeoPoint;
    use tracker_core::{RequestId, TargetIndex, TrackId};

    fn read(list: &mut ModeList, text: &str) -> Result<()> {
        let mut components = ComponentList::new();
        let mut input = InputReader::new(text);
        while input.read_command().is_some() {
            if !list.process_input("s1", &mut input, &mut components)? {
                panic!("unrecognized: {}", input.command());
            }
        }
        Ok(())
    }

    #[test]
    fn template_settings_flow_into_later_modes() {
        let mut list = ModeList::new(SensorType::Radar);
        read(
            &mut list,
            "frame_time 2 s
             mode search hits_to_establish_track 3 4 end_mode
             mode track maximum_request_count 2 revisit_time 0.5 s on_failure search end_mode",
        )
        .unwrap();
        list.initialize("s1", SensorType::Radar).unwrap();
        assert_eq!(list.names(), ["search", "track"]);

        let search = &list.get(0).unwrap().common;
        assert_eq!(search.frame_time, 2.0);
        assert_eq!(search.revisit_time, 2.0);
        assert_eq!(search.tracker_settings.hits_to_establish, 3);
        assert!(search.can_search_while_track);
        assert_eq!(search.on_success_index, 0);

        let track = &list.get(1).unwrap().common;
        assert_eq!(track.frame_time, 2.0);
        assert_eq!(track.revisit_time, 0.5);
        assert_eq!(track.on_failure_index, 0);
        assert_eq!(track.on_success_index, 1);
    }

    #[test]
    fn implicit_default_mode() {
        let mut list = ModeList::new(SensorType::Radar);
        read(&mut list, "frame_time 1 s").unwrap();
        list.initialize("s1", SensorType::Radar).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list.get(0).unwrap().name(), DEFAULT_MODE);
    }

    #[test]
    fn search_only_mode_cannot_disable_search() {
        let mut list = ModeList::new(SensorType::Radar);
        read(&mut list, "disables_search").unwrap();
        list.initialize("s1", SensorType::Radar).unwrap();
        let c = &list.get(0).unwrap().common;
        assert!(!c.disables_search);
        assert!(c.can_search_while_track);
    }

    #[test]
    fn unknown_transition_target_fails() {
        let mut list = ModeList::new(SensorType::Radar);
        read(&mut list, "mode a on_success nowhere end_mode").unwrap();
        assert!(matches!(
            list.initialize("s1", SensorType::Radar),
            Err(SensorError::UnknownMode { .. })
        ));
    }

    #[test]
    fn bad_values_carry_mode_context() {
        let mut list = ModeList::new(SensorType::Radar);
        let err = read(&mut list, "mode a required_pd 1.0 end_mode").unwrap_err();
        assert!(matches!(err, SensorError::ModeInput { ref mode, .. } if mode == "a"));

        let mut list = ModeList::new(SensorType::Radar);
        let err = read(&mut list, "mode a no_such_keyword end_mode").unwrap_err();
        assert!(err.to_string().contains("no_such_keyword"));

        let mut list = ModeList::new(SensorType::Radar);
        assert!(read(&mut list, "mode a frame_time 1 s").is_err());
    }

    #[test]
    fn unsupported_reporting_is_dropped() {
        let mut list = ModeList::new(SensorType::Optical);
        read(&mut list, "reports_range reports_bearing").unwrap();
        list.initialize("eo", SensorType::Optical).unwrap();
        let flags = list.get(0).unwrap().common.reporting;
        assert!(flags.reports_bearing());
        assert!(!flags.reports_range());

        let mut list = ModeList::new(SensorType::Optical);
        read(&mut list, "reports_range reports_range_rate").unwrap();
        assert!(matches!(
            list.initialize("eo", SensorType::Optical),
            Err(SensorError::NothingReportable { .. })
        ));
    }

    #[test]
    fn radar_error_model_rejected_on_optical() {
        let mut list = ModeList::new(SensorType::Optical);
        read(&mut list, "error_model radar").unwrap();
        assert!(matches!(
            list.initialize("eo", SensorType::Optical),
            Err(SensorError::IncompatibleErrorModel { .. })
        ));
    }

    #[test]
    fn tracking_mode_search_rules() {
        let mut list = ModeList::new(SensorType::Radar);
        read(
            &mut list,
            "selection_mode multiple
             mode search end_mode
             mode stt maximum_request_count 1 disables_search end_mode",
        )
        .unwrap();
        list.initialize("s1", SensorType::Radar).unwrap();
        for m in list.iter_mut() {
            m.common.selected = true;
        }
        assert!(list.is_searching(0));
        assert!(list.is_searching(1));

        list.get_mut(1).unwrap().common.active_requests = 1;
        assert_eq!(list.get(1).unwrap().common.state(), ModeState::Tracking);
        assert!(!list.is_searching(1));
        // The tracking mode suspends search in the others
        assert!(!list.is_searching(0));
    }

    #[test]
    fn update_track_honors_reporting_flags() {
        let mut common = ModeCommon {
            reporting: ReportingFlags::LOCATION | ReportingFlags::RANGE | ReportingFlags::IFF,
            ..Default::default()
        };
        common.name = "search".into();

        let host_loc = GeoPoint::from_degrees(0.0, 0.0, 1000.0).to_wcs();
        let tgt_loc = GeoPoint::from_degrees(0.1, 0.0, 1000.0).to_wcs();
        let mut host = Platform::new("host", host_loc);
        host.side = "blue".into();
        let mut target = Platform::new("tgt", tgt_loc);
        target.side = "red".into();

        let mut result = DetectionResult::new(0.5);
        result.receiver_location = host_loc;
        result.target_location = tgt_loc;
        result.range_rate = -10.0;
        result.signal_to_noise = 20.0;
        result.rcvr_to_tgt.range = (tgt_loc - host_loc).norm();
        result.set_true_measurement();

        let mut track = Track::new(TrackId(1), RequestId::SEARCH, TargetIndex(2), 0.0);
        common.update_track(3.0, &mut track, "s1", &host, Some(&target), &result);

        assert_eq!(track.update_time, 3.0);
        assert_eq!(track.mode_name, "search");
        assert_eq!(track.target_name, "tgt");
        assert_eq!(track.location_wcs, Some(tgt_loc));
        assert_abs_diff_eq!(track.range.unwrap(), (tgt_loc - host_loc).norm(), epsilon = 1e-6);
        assert_eq!(track.iff, Some(IffStatus::Foe));
        assert!(track.bearing.is_none());
        assert!(track.range_rate.is_none());
        assert!(track.signal_to_noise.is_none());
        assert!(track.side.is_none());
    }
}
