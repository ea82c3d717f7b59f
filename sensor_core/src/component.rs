//! Pluggable sensor components.
//!
//! A component adds cross-cutting behaviour to a sensor without touching the
//! sensor's own code: it can read extra keywords, veto detections, widen
//! measurement errors and observe the track lifecycle.
//!
//! # Policy
//! - A sensor holds at most one component per [`ComponentRole`]. Adding a
//!   component whose role is taken hands it back to the caller.
//! - Every hook has a no-op default. The sensor calls each hook through one
//!   [`ComponentList`] wrapper, whatever number of components is attached.
//! - Vetoes combine with AND: any component can fail a detection or a
//!   tracking opportunity, none can rescue one.
//! - Keyword hooks return `Ok(false)` for commands they do not know.

use crate::context::{Platform, SimEpoch};
use crate::error::{Result, SensorError};
use crate::sensor::SensorType;
use sensor_models::{DetectionResult, InputReader, InputResult, SphericalErrors};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracker_core::{TargetIndex, Track, TrackKey};

/// Stable identifier of a component's role on a sensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentRole {
    SolarIllumination,
    /// Roles defined outside this crate
    Custom(u32),
}

impl fmt::Display for ComponentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentRole::SolarIllumination => write!(f, "solar_illumination"),
            ComponentRole::Custom(id) => write!(f, "custom_{id}"),
        }
    }
}

/// What a component sees of a detection attempt in progress.
#[derive(Clone, Copy)]
pub struct AttemptContext<'a> {
    pub sim_time: f64,
    pub epoch: SimEpoch,
    pub sensor: &'a str,
    pub mode: &'a str,
    pub host: &'a Platform,
    pub target: &'a Platform,
}

/// Extension attached to a sensor.
pub trait SensorComponent: Any + Send {
    /// Roles this component fills; must not be empty.
    fn roles(&self) -> &[ComponentRole];

    fn clone_component(&self) -> Box<dyn SensorComponent>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn process_input(&mut self, _input: &mut InputReader) -> InputResult<bool> {
        Ok(false)
    }

    fn process_mode_input(&mut self, _mode: &str, _input: &mut InputReader) -> InputResult<bool> {
        Ok(false)
    }

    fn process_beam_input(
        &mut self,
        _mode: &str,
        _beam: usize,
        _input: &mut InputReader,
    ) -> InputResult<bool> {
        Ok(false)
    }

    fn initialize(&mut self, _sim_time: f64, _sensor: &str, _modes: &[String]) -> Result<()> {
        Ok(())
    }

    fn turn_on(&mut self, _sim_time: f64) {}

    fn turn_off(&mut self, _sim_time: f64) {}

    fn select_mode(&mut self, _sim_time: f64, _mode: &str) {}

    fn deselect_mode(&mut self, _sim_time: f64, _mode: &str) {}

    /// Runs after the detection physics. May set failure bits; returning
    /// false fails the detection.
    fn post_attempt_to_detect(
        &mut self,
        _ctx: &AttemptContext<'_>,
        _result: &mut DetectionResult,
    ) -> bool {
        true
    }

    /// May adjust the sigmas chosen by the mode's error model.
    fn compute_spherical_measurement_errors(
        &mut self,
        _ctx: &AttemptContext<'_>,
        _result: &DetectionResult,
        _sigmas: &mut SphericalErrors,
    ) {
    }

    /// Runs after the mode has filled the track's reported fields.
    fn update_track(&mut self, _sim_time: f64, _track: &mut Track, _result: &DetectionResult) {}

    /// Return false to turn this detection into a miss for the tracker.
    fn tracker_allow_tracking(
        &mut self,
        _sim_time: f64,
        _key: TrackKey,
        _result: &DetectionResult,
    ) -> bool {
        true
    }

    fn tracker_initialize_track(&mut self, _sim_time: f64, _track: &mut Track) {}

    fn tracker_update_track(&mut self, _sim_time: f64, _track: &mut Track) {}

    fn tracker_drop_track(&mut self, _sim_time: f64, _track: &Track) {}

    fn platform_deleted(&mut self, _sim_time: f64, _target: TargetIndex) {}
}

/// A component type with a single, statically known role.
pub trait RoleComponent: SensorComponent + Sized {
    const ROLE: ComponentRole;
}

/// Creates components for sensors that need them.
pub trait ComponentFactory: Send + Sync {
    /// Called before the sensor reads its definition.
    fn pre_input(&self, _sensor_type: SensorType, _components: &mut ComponentList) {}

    /// Offered mode keywords that no attached component claimed, so a
    /// factory can create its component on first use.
    fn process_mode_input(
        &self,
        _mode: &str,
        _input: &mut InputReader,
        _components: &mut ComponentList,
    ) -> InputResult<bool> {
        Ok(false)
    }
}

// ---------------------------------------------------------------------------
// ComponentList
// ---------------------------------------------------------------------------

/// The components of one sensor, in attachment order.
#[derive(Default)]
pub struct ComponentList {
    components: Vec<Box<dyn SensorComponent>>,
    factories: Vec<Arc<dyn ComponentFactory>>,
}

impl Clone for ComponentList {
    fn clone(&self) -> Self {
        Self {
            components: self.components.iter().map(|c| c.clone_component()).collect(),
            factories: self.factories.clone(),
        }
    }
}

impl fmt::Debug for ComponentList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.components.iter().map(|c| c.roles().to_vec()))
            .finish()
    }
}

impl ComponentList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_factories(factories: Vec<Arc<dyn ComponentFactory>>) -> Self {
        Self {
            components: Vec::new(),
            factories,
        }
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn has_role(&self, role: ComponentRole) -> bool {
        self.components.iter().any(|c| c.roles().contains(&role))
    }

    /// Take ownership of `component` unless one of its roles is already
    /// filled, in which case it is handed back untouched.
    pub fn add_component(
        &mut self,
        component: Box<dyn SensorComponent>,
    ) -> std::result::Result<(), Box<dyn SensorComponent>> {
        if component.roles().is_empty() || component.roles().iter().any(|r| self.has_role(*r)) {
            return Err(component);
        }
        self.components.push(component);
        Ok(())
    }

    /// Like [`add_component`](Self::add_component), reporting a rejection as
    /// a configuration error.
    pub fn attach(&mut self, sensor: &str, component: Box<dyn SensorComponent>) -> Result<()> {
        self.add_component(component).map_err(|rejected| {
            let role = rejected
                .roles()
                .first()
                .map_or_else(|| "<none>".to_string(), ToString::to_string);
            SensorError::DuplicateRole {
                sensor: sensor.to_string(),
                role,
            }
        })
    }

    pub fn find_role(&self, role: ComponentRole) -> Option<&dyn SensorComponent> {
        self.components
            .iter()
            .find(|c| c.roles().contains(&role))
            .map(|c| c.as_ref())
    }

    pub fn find_by_role<T: RoleComponent>(&self) -> Option<&T> {
        self.find_role(T::ROLE)
            .and_then(|c| c.as_any().downcast_ref::<T>())
    }

    pub fn find_by_role_mut<T: RoleComponent>(&mut self) -> Option<&mut T> {
        self.components
            .iter_mut()
            .find(|c| c.roles().contains(&T::ROLE))
            .and_then(|c| c.as_any_mut().downcast_mut::<T>())
    }

    /// The component of type `T`, created with its default configuration if
    /// the sensor does not have one yet. `None` when another component
    /// already fills one of the new component's roles.
    pub fn find_or_create<T: RoleComponent + Default>(&mut self) -> Option<&mut T> {
        if !self.has_role(T::ROLE) {
            self.add_component(Box::new(T::default())).ok()?;
        }
        self.find_by_role_mut::<T>()
    }

    // -----------------------------------------------------------------------
    // Hook wrappers
    // -----------------------------------------------------------------------

    pub fn pre_input(&mut self, sensor_type: SensorType) {
        let factories = self.factories.clone();
        for factory in &factories {
            factory.pre_input(sensor_type, self);
        }
    }

    pub fn process_input(&mut self, input: &mut InputReader) -> InputResult<bool> {
        for c in &mut self.components {
            if c.process_input(input)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn process_mode_input(&mut self, mode: &str, input: &mut InputReader) -> InputResult<bool> {
        for c in &mut self.components {
            if c.process_mode_input(mode, input)? {
                return Ok(true);
            }
        }
        let factories = self.factories.clone();
        for factory in &factories {
            if factory.process_mode_input(mode, input, self)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn process_beam_input(
        &mut self,
        mode: &str,
        beam: usize,
        input: &mut InputReader,
    ) -> InputResult<bool> {
        for c in &mut self.components {
            if c.process_beam_input(mode, beam, input)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn initialize(&mut self, sim_time: f64, sensor: &str, modes: &[String]) -> Result<()> {
        for c in &mut self.components {
            c.initialize(sim_time, sensor, modes)?;
        }
        Ok(())
    }

    pub fn turn_on(&mut self, sim_time: f64) {
        self.components.iter_mut().for_each(|c| c.turn_on(sim_time));
    }

    pub fn turn_off(&mut self, sim_time: f64) {
        self.components.iter_mut().for_each(|c| c.turn_off(sim_time));
    }

    pub fn select_mode(&mut self, sim_time: f64, mode: &str) {
        self.components
            .iter_mut()
            .for_each(|c| c.select_mode(sim_time, mode));
    }

    pub fn deselect_mode(&mut self, sim_time: f64, mode: &str) {
        self.components
            .iter_mut()
            .for_each(|c| c.deselect_mode(sim_time, mode));
    }

    /// Every component runs, even after one has vetoed.
    pub fn post_attempt_to_detect(
        &mut self,
        ctx: &AttemptContext<'_>,
        result: &mut DetectionResult,
    ) -> bool {
        let mut allowed = true;
        for c in &mut self.components {
            allowed &= c.post_attempt_to_detect(ctx, result);
        }
        allowed
    }

    pub fn compute_spherical_measurement_errors(
        &mut self,
        ctx: &AttemptContext<'_>,
        result: &DetectionResult,
        sigmas: &mut SphericalErrors,
    ) {
        for c in &mut self.components {
            c.compute_spherical_measurement_errors(ctx, result, sigmas);
        }
    }

    pub fn update_track(&mut self, sim_time: f64, track: &mut Track, result: &DetectionResult) {
        for c in &mut self.components {
            c.update_track(sim_time, track, result);
        }
    }

    pub fn tracker_allow_tracking(
        &mut self,
        sim_time: f64,
        key: TrackKey,
        result: &DetectionResult,
    ) -> bool {
        let mut allowed = true;
        for c in &mut self.components {
            allowed &= c.tracker_allow_tracking(sim_time, key, result);
        }
        allowed
    }

    pub fn tracker_initialize_track(&mut self, sim_time: f64, track: &mut Track) {
        for c in &mut self.components {
            c.tracker_initialize_track(sim_time, track);
        }
    }

    pub fn tracker_update_track(&mut self, sim_time: f64, track: &mut Track) {
        for c in &mut self.components {
            c.tracker_update_track(sim_time, track);
        }
    }

    pub fn tracker_drop_track(&mut self, sim_time: f64, track: &Track) {
        for c in &mut self.components {
            c.tracker_drop_track(sim_time, track);
        }
    }

    pub fn platform_deleted(&mut self, sim_time: f64, target: TargetIndex) {
        for c in &mut self.components {
            c.platform_deleted(sim_time, target);
        }
    }
}
