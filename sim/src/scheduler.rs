//! Fixed-step scenario driver.
//!
//! # Step Policy
//! 1. Operator commands due at the current time run first, in file order.
//! 2. Every sensor gets its scheduled update against the current truth.
//! 3. Platforms in the catalog move to the next step. Platforms that leave
//!    are removed and every sensor is told, which drops their tracks.
//!    Platforms that join are added at their initial state.

use crate::platform::{make_platform, PlatformMotion, PlatformSpec};
use crate::scenarios::{Action, Command, Scenario};
use anyhow::Context;
use sensor_core::{read_sensors, ComponentFactory, SarImage, Sensor, SensorEvent, SimContext};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracker_core::{RequestId, TargetIndex, Track, TrackEvent};

/// Tolerance when comparing scheduled times to the clock.
const TIME_EPSILON: f64 = 1.0e-9;

/// One tracker output as seen by the scenario.
#[derive(Clone, Debug, Serialize)]
pub struct TrackRecord {
    pub time: f64,
    pub sensor: String,
    /// `initiated`, `updated` or `dropped`
    pub kind: &'static str,
    pub track: Track,
}

/// Everything a run produced.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RunSummary {
    pub scenario: String,
    pub seed: u64,
    pub end_time: f64,
    pub track_events: Vec<TrackRecord>,
    pub images: Vec<SarImage>,
    pub events: Vec<SensorEvent>,
    /// Tracks alive at the end of the run
    pub final_tracks: Vec<Track>,
}

impl RunSummary {
    pub fn count(&self, kind: &str) -> usize {
        self.track_events.iter().filter(|r| r.kind == kind).count()
    }
}

struct Entry {
    spec: PlatformSpec,
    motion: PlatformMotion,
    index: Option<TargetIndex>,
}

/// A scenario in progress.
pub struct Simulation {
    name: String,
    seed: u64,
    duration: f64,
    dt: f64,
    ctx: SimContext,
    sensors: Vec<Sensor>,
    platforms: Vec<Entry>,
    commands: VecDeque<Command>,
    summary: RunSummary,
}

impl Simulation {
    pub fn new(scenario: &Scenario) -> anyhow::Result<Self> {
        Self::with_factories(scenario, &[])
    }

    /// Build the catalog, read and initialize the sensors.
    pub fn with_factories(
        scenario: &Scenario,
        factories: &[Arc<dyn ComponentFactory>],
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(scenario.sim_dt > 0.0, "sim_dt must be positive");
        let mut ctx = SimContext::new(scenario.seed);
        ctx.use_constant_required_pd = scenario.use_constant_required_pd;
        ctx.epoch = scenario.epoch;

        let mut platforms = Vec::with_capacity(scenario.platforms.len());
        for spec in &scenario.platforms {
            let motion = PlatformMotion::from_spec(spec);
            let index = spec
                .is_active(0.0)
                .then(|| ctx.platforms.add(make_platform(spec, 0.0)));
            platforms.push(Entry {
                spec: spec.clone(),
                motion,
                index,
            });
        }

        let mut sensors = read_sensors(&scenario.sensors, factories)
            .with_context(|| format!("reading sensors of scenario {}", scenario.name))?;
        for sensor in &mut sensors {
            sensor
                .initialize(&mut ctx)
                .with_context(|| format!("initializing sensor {}", sensor.name()))?;
        }

        let mut commands = scenario.commands.clone();
        commands.sort_by(|a, b| a.time.total_cmp(&b.time));
        info!(
            scenario = %scenario.name,
            platforms = ctx.platforms.len(),
            sensors = sensors.len(),
            "scenario loaded"
        );

        Ok(Self {
            name: scenario.name.clone(),
            seed: scenario.seed,
            duration: scenario.duration,
            dt: scenario.sim_dt,
            ctx,
            sensors,
            platforms,
            commands: commands.into(),
            summary: RunSummary::default(),
        })
    }

    pub fn sim_time(&self) -> f64 {
        self.ctx.sim_time
    }

    pub fn context(&self) -> &SimContext {
        &self.ctx
    }

    pub fn sensors(&self) -> &[Sensor] {
        &self.sensors
    }

    pub fn sensor(&self, name: &str) -> Option<&Sensor> {
        self.sensors.iter().find(|s| s.name() == name)
    }

    pub fn is_finished(&self) -> bool {
        self.ctx.sim_time > self.duration + TIME_EPSILON
    }

    /// Run to the end and return everything produced.
    pub fn run(mut self) -> anyhow::Result<RunSummary> {
        while !self.is_finished() {
            self.step()?;
        }
        Ok(self.finish())
    }

    /// Commands, sensor updates, then platform motion.
    pub fn step(&mut self) -> anyhow::Result<()> {
        let t = self.ctx.sim_time;
        while self
            .commands
            .front()
            .is_some_and(|c| c.time <= t + TIME_EPSILON)
        {
            if let Some(command) = self.commands.pop_front() {
                self.execute(&command)
                    .with_context(|| format!("command at t={} for sensor {}", command.time, command.sensor))?;
            }
        }

        for sensor in &mut self.sensors {
            sensor.update(&mut self.ctx);
        }
        self.collect();
        self.move_platforms(t, self.dt);
        self.ctx.sim_time = t + self.dt;
        Ok(())
    }

    fn execute(&mut self, command: &Command) -> anyhow::Result<()> {
        let Some(sensor) = self.sensors.iter_mut().find(|s| s.name() == command.sensor) else {
            anyhow::bail!("unknown sensor {}", command.sensor);
        };
        debug!(t = self.ctx.sim_time, sensor = %command.sensor, action = ?command.action, "command");
        match &command.action {
            Action::TurnOn => sensor.turn_on(&mut self.ctx),
            Action::TurnOff => sensor.turn_off(&mut self.ctx),
            Action::SelectMode { mode } => sensor.select_mode(&mut self.ctx, mode)?,
            Action::DeselectMode { mode } => sensor.deselect_mode(&mut self.ctx, mode)?,
            Action::StartTracking {
                request,
                target,
                mode,
            } => {
                let index = self
                    .ctx
                    .platforms
                    .by_name(target)
                    .map(|p| p.index)
                    .with_context(|| format!("unknown platform {target}"))?;
                if !sensor.start_tracking(RequestId(*request), index, mode.as_deref()) {
                    warn!(sensor = %command.sensor, request, "tracking request refused");
                }
            }
            Action::StopTracking { request } => sensor.stop_tracking(&mut self.ctx, RequestId(*request)),
        }
        Ok(())
    }

    fn collect(&mut self) {
        let t = self.ctx.sim_time;
        for sensor in &mut self.sensors {
            for event in sensor.drain_track_events() {
                let (kind, track) = match event {
                    TrackEvent::Initiated(track) => ("initiated", track),
                    TrackEvent::Updated(track) => ("updated", track),
                    TrackEvent::Dropped(track) => ("dropped", track),
                };
                self.summary.track_events.push(TrackRecord {
                    time: t,
                    sensor: sensor.name().to_string(),
                    kind,
                    track,
                });
            }
            self.summary.images.extend(sensor.drain_images());
        }
        self.summary.events.extend(self.ctx.events.drain());
    }

    fn move_platforms(&mut self, t: f64, dt: f64) {
        let next = t + dt;
        let mut departed = Vec::new();
        for entry in &mut self.platforms {
            if entry.index.is_some() {
                entry.motion.step(t, dt);
            }
            match (entry.index, entry.spec.is_active(next)) {
                (Some(index), true) => {
                    if let Some(platform) = self.ctx.platforms.get_mut(index) {
                        entry.motion.apply(next, platform);
                    }
                }
                (Some(index), false) => {
                    self.ctx.platforms.remove(index);
                    entry.index = None;
                    departed.push(index);
                    info!(t = next, platform = %entry.spec.name, "platform left");
                }
                (None, true) => {
                    let platform = make_platform(&entry.spec, next);
                    entry.index = Some(self.ctx.platforms.add(platform));
                    info!(t = next, platform = %entry.spec.name, "platform joined");
                }
                (None, false) => {}
            }
        }
        if departed.is_empty() {
            return;
        }
        self.ctx.sim_time = next;
        for index in departed {
            for sensor in &mut self.sensors {
                sensor.platform_deleted(&mut self.ctx, index);
            }
        }
        self.collect();
    }

    /// Stop the clock and hand back the summary.
    pub fn finish(mut self) -> RunSummary {
        self.collect();
        self.summary.scenario = self.name;
        self.summary.seed = self.seed;
        self.summary.end_time = self.ctx.sim_time;
        self.summary.final_tracks = self
            .sensors
            .iter()
            .flat_map(|s| s.tracker().tracks().cloned())
            .collect();
        self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MotionSpec;
    use crate::scenarios::ScenarioKind;
    use clap::ValueEnum;

    /// Site radar and one aircraft that pops above the radar's altitude
    /// ceiling for exactly one frame.
    fn ceiling_scenario() -> Scenario {
        let site = PlatformSpec::new("site", 0.0, 0.0, 10.0);
        let mut jet = PlatformSpec::new("jet", 0.2, 0.0, 1000.0);
        jet.radar_cross_section = 10.0;
        jet.motion = MotionSpec::Segmented {
            segments: vec![
                (0.0, MotionSpec::Climb { rate: 80.0 }),
                (2.0, MotionSpec::Climb { rate: -80.0 }),
            ],
        };
        Scenario {
            name: "ceiling".into(),
            seed: 1,
            duration: 4.0,
            sim_dt: 1.0,
            use_constant_required_pd: true,
            epoch: Default::default(),
            platforms: vec![site, jet],
            sensors: "
                sensor radar1 radar
                  platform site on
                  frequency 3 GHz peak_power 1 MW pulse_width 1 us bandwidth 1 MHz beamwidth 2 deg
                  maximum_altitude 1120 m
                  frame_time 1 s
                  hits_to_establish_track 3 4
                end_sensor"
                .into(),
            commands: Vec::new(),
        }
    }

    #[test]
    fn three_of_four_establishes_on_fourth_opportunity() {
        let mut sim = Simulation::new(&ceiling_scenario()).unwrap();
        // hit, hit, miss
        for _ in 0..3 {
            sim.step().unwrap();
        }
        assert_eq!(sim.sensor("radar1").unwrap().track_count(), 0);
        // hit
        sim.step().unwrap();
        let summary = sim.finish();
        assert_eq!(summary.count("initiated"), 1);
        let initiated = &summary.track_events[0];
        assert_eq!(initiated.time, 3.0);
        assert_eq!(initiated.track.target_name, "jet");
        assert_eq!(summary.final_tracks.len(), 1);
    }

    #[test]
    fn departing_platform_drops_track() {
        let mut scenario = ceiling_scenario();
        scenario.platforms[1].motion = MotionSpec::Stationary;
        scenario.platforms[1].disappear_at = Some(2.5);
        scenario.sensors = scenario.sensors.replace("hits_to_establish_track 3 4", "");
        let summary = Simulation::new(&scenario).unwrap().run().unwrap();
        assert_eq!(summary.count("initiated"), 1);
        assert_eq!(summary.count("dropped"), 1);
        assert!(summary.final_tracks.is_empty());
    }

    #[test]
    fn late_platform_joins() {
        let mut scenario = ceiling_scenario();
        scenario.platforms[1].motion = MotionSpec::Stationary;
        scenario.platforms[1].appear_at = Some(2.0);
        let mut sim = Simulation::new(&scenario).unwrap();
        assert_eq!(sim.context().platforms.len(), 1);
        sim.step().unwrap();
        sim.step().unwrap();
        assert_eq!(sim.context().platforms.len(), 2);
    }

    #[test]
    fn commands_drive_the_sensor() {
        let mut scenario = ceiling_scenario();
        scenario.sensors = scenario.sensors.replace("platform site on", "platform site");
        scenario.commands = vec![Command {
            time: 1.0,
            sensor: "radar1".into(),
            action: Action::TurnOn,
        }];
        let mut sim = Simulation::new(&scenario).unwrap();
        sim.step().unwrap();
        assert!(!sim.sensor("radar1").unwrap().is_on());
        sim.step().unwrap();
        assert!(sim.sensor("radar1").unwrap().is_on());

        scenario.commands[0].sensor = "nobody".into();
        let mut sim = Simulation::new(&scenario).unwrap();
        sim.step().unwrap();
        assert!(sim.step().is_err());
    }

    #[test]
    fn bad_sensor_text_fails_to_load() {
        let mut scenario = ceiling_scenario();
        scenario.sensors.push_str(" sensor broken radar platform nowhere end_sensor");
        assert!(Simulation::new(&scenario).is_err());
    }

    #[test]
    fn sar_spot_forms_one_image() {
        let scenario = Scenario::build(ScenarioKind::SarSpot, 5);
        let summary = Simulation::new(&scenario).unwrap().run().unwrap();
        assert_eq!(summary.images.len(), 1);
        let image = &summary.images[0];
        assert_eq!(image.sensor, "sar1");
        assert_eq!(image.stream, 1);
        let names: Vec<&str> = image.objects.iter().map(|o| o.name.as_str()).collect();
        assert!(names.contains(&"truck1"), "{names:?}");
        // Moving targets smear out of a SAR image
        assert!(!names.contains(&"mover"));
        assert!(summary.events.iter().any(|e| matches!(e, SensorEvent::SensorTurnedOff { .. })));
        assert!(summary.track_events.is_empty());
    }

    #[test]
    fn sar_strip_numbers_frames() {
        let scenario = Scenario::build(ScenarioKind::SarStrip, 5);
        let summary = Simulation::new(&scenario).unwrap().run().unwrap();
        let frames: Vec<u32> = summary.images.iter().map(|i| i.frame).collect();
        assert_eq!(frames, [1, 2, 3]);
        assert!(summary.images.iter().all(|i| i.stream == 1));
    }

    #[test]
    fn builtins_run() {
        for kind in ScenarioKind::value_variants() {
            let scenario = Scenario::build(*kind, 11);
            let summary = Simulation::new(&scenario).unwrap().run().unwrap();
            assert_eq!(summary.scenario, scenario.name);
        }
    }

    #[test]
    fn runs_are_reproducible() {
        let scenario = Scenario::build(ScenarioKind::RadarSearch, 42);
        let a = Simulation::new(&scenario).unwrap().run().unwrap();
        let b = Simulation::new(&scenario).unwrap().run().unwrap();
        assert_eq!(a.track_events.len(), b.track_events.len());
        assert_eq!(
            serde_json::to_string(&a.final_tracks).unwrap(),
            serde_json::to_string(&b.final_tracks).unwrap()
        );
    }
}
