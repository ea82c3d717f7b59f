//! Solar illumination gate for passive sensors.
//!
//! A mode configured with `target_solar_illumination_angle <min> <max>` only
//! detects targets whose local sun elevation lies within those limits.
//! Outside them the target is marked concealed and its Pd is zeroed.

use crate::component::{
    AttemptContext, ComponentFactory, ComponentList, ComponentRole, RoleComponent,
    SensorComponent,
};
use crate::context::SimEpoch;
use crate::mode::DEFAULT_MODE;
use sensor_models::{DetectionResult, FailureStatus, GeoPoint, InputReader, InputResult, ValueType};
use std::any::Any;
use std::collections::BTreeMap;
use std::f64::consts::{FRAC_PI_2, PI};
use tracing::debug;

/// Earth's axial tilt (rad)
const OBLIQUITY: f64 = 23.44 * PI / 180.0;

/// Sun elevation (rad) at a point for a day of year and UTC hour.
///
/// Low-precision model: cosine declination, hour angle from mean solar
/// time, no equation of time or refraction.
pub fn sun_elevation(point: &GeoPoint, day_of_year: u32, utc_hours: f64) -> f64 {
    let declination =
        -OBLIQUITY * (2.0 * PI / 365.0 * (f64::from(day_of_year) + 10.0)).cos();
    let solar_hours = utc_hours + point.lon.to_degrees() / 15.0;
    let hour_angle = (solar_hours - 12.0) * 15.0_f64.to_radians();
    let sin_el = point.lat.sin() * declination.sin()
        + point.lat.cos() * declination.cos() * hour_angle.cos();
    sin_el.clamp(-1.0, 1.0).asin()
}

/// Per-mode sun elevation limits.
#[derive(Clone, Debug, Default)]
pub struct SolarIlluminationComponent {
    limits: BTreeMap<String, (f64, f64)>,
}

impl SolarIlluminationComponent {
    /// Limits of `mode`, else those given outside any mode block.
    pub fn limits(&self, mode: &str) -> Option<(f64, f64)> {
        self.limits
            .get(mode)
            .or_else(|| self.limits.get(DEFAULT_MODE))
            .copied()
    }

    pub fn set_limits(&mut self, mode: &str, min: f64, max: f64) {
        self.limits.insert(mode.to_string(), (min, max));
    }

    /// True if a target at `point` is lit within the mode's limits.
    pub fn is_illuminated(&self, mode: &str, point: &GeoPoint, epoch: &SimEpoch, sim_time: f64) -> bool {
        let Some((min, max)) = self.limits(mode) else {
            return true;
        };
        let (day, hours) = epoch.at(sim_time);
        let elevation = sun_elevation(point, day, hours);
        elevation >= min && elevation <= max
    }
}

impl SensorComponent for SolarIlluminationComponent {
    fn roles(&self) -> &[ComponentRole] {
        &[ComponentRole::SolarIllumination]
    }

    fn clone_component(&self) -> Box<dyn SensorComponent> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn process_mode_input(&mut self, mode: &str, input: &mut InputReader) -> InputResult<bool> {
        if input.command() != "target_solar_illumination_angle" {
            return Ok(false);
        }
        let min = input
            .read_value_of_type(ValueType::Angle)?
            .clamp(-FRAC_PI_2, FRAC_PI_2);
        let max = input
            .read_value_of_type(ValueType::Angle)?
            .clamp(-FRAC_PI_2, FRAC_PI_2);
        input.value_greater_or_equal(max, min)?;
        self.set_limits(mode, min, max);
        Ok(true)
    }

    fn post_attempt_to_detect(
        &mut self,
        ctx: &AttemptContext<'_>,
        result: &mut DetectionResult,
    ) -> bool {
        if self.limits(ctx.mode).is_none() {
            return true;
        }
        let lit = self.is_illuminated(ctx.mode, &ctx.target.geo(), &ctx.epoch, ctx.sim_time);
        if !lit {
            debug!(sensor = ctx.sensor, target = %ctx.target.name, "target not illuminated");
            result.fail(FailureStatus::TARGET_CONCEALED);
            result.pd = 0.0;
        }
        lit
    }
}

impl RoleComponent for SolarIlluminationComponent {
    const ROLE: ComponentRole = ComponentRole::SolarIllumination;
}

/// Attaches the solar illumination component the first time a mode uses
/// `target_solar_illumination_angle`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SolarIlluminationFactory;

impl ComponentFactory for SolarIlluminationFactory {
    fn process_mode_input(
        &self,
        mode: &str,
        input: &mut InputReader,
        components: &mut ComponentList,
    ) -> InputResult<bool> {
        if input.command() != "target_solar_illumination_angle" {
            return Ok(false);
        }
        match components.find_or_create::<SolarIlluminationComponent>() {
            Some(component) => component.process_mode_input(mode, input),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn noon_at_solstice_on_tropic() {
        // Tropic of Cancer, Greenwich, noon UTC on the June solstice
        let point = GeoPoint::from_degrees(23.44, 0.0, 0.0);
        let el = sun_elevation(&point, 172, 12.0);
        assert_abs_diff_eq!(el.to_degrees(), 90.0, epsilon = 0.5);
    }

    #[test]
    fn midnight_is_dark() {
        let point = GeoPoint::from_degrees(45.0, 0.0, 0.0);
        assert!(sun_elevation(&point, 172, 0.0) < 0.0);
        assert!(sun_elevation(&point, 172, 12.0) > 0.0);
    }

    #[test]
    fn reads_limits_per_mode() {
        let mut list = ComponentList::with_factories(vec![std::sync::Arc::new(SolarIlluminationFactory)]);
        let mut input = InputReader::new("target_solar_illumination_angle 10 deg 90 deg");
        input.read_command();
        assert!(list.process_mode_input("day", &mut input).unwrap());
        let component = list.find_by_role::<SolarIlluminationComponent>().unwrap();
        let (min, max) = component.limits("day").unwrap();
        assert_abs_diff_eq!(min, 10f64.to_radians(), epsilon = 1e-12);
        assert_abs_diff_eq!(max, FRAC_PI_2, epsilon = 1e-12);
        assert!(component.limits("night").is_none());

        let mut bad = InputReader::new("target_solar_illumination_angle 30 deg 10 deg");
        bad.read_command();
        assert!(list.process_mode_input("day", &mut bad).is_err());
    }

    #[test]
    fn unlit_target_is_concealed() {
        let mut component = SolarIlluminationComponent::default();
        component.set_limits("eo", 0.0, FRAC_PI_2);
        let epoch = SimEpoch {
            day_of_year: 172,
            utc_seconds: 0.0,
        };
        let point = GeoPoint::from_degrees(45.0, 0.0, 0.0);
        assert!(!component.is_illuminated("eo", &point, &epoch, 0.0));
        assert!(component.is_illuminated("eo", &point, &epoch, 12.0 * 3600.0));
        assert!(component.is_illuminated("other", &point, &epoch, 0.0));

        component.set_limits(DEFAULT_MODE, 0.0, FRAC_PI_2);
        assert!(!component.is_illuminated("other", &point, &epoch, 0.0));
    }
}
