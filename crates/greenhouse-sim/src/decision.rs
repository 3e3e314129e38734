//! ---
//! gh_section: "11-simulation"
//! gh_subsection: "module"
//! gh_type: "source"
//! gh_scope: "code"
//! gh_description: "Threshold and hysteresis equipment controller."
//! gh_version: "v0.1.0"
//! gh_owner: "tbd"
//! ---
use greenhouse_common::config::ThresholdConfig;

use crate::model::{Conditions, EquipmentSet};

/// Setpoints and hysteresis bands used by [`DecisionModel`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionThresholds {
    pub temp_min: f64,
    pub temp_max: f64,
    pub temp_buffer: f64,
    pub humidity_min: f64,
    pub humidity_max: f64,
    pub humidity_buffer: f64,
    pub soil_min: f64,
    pub soil_buffer: f64,
    pub co2_min: f64,
    pub co2_buffer: f64,
    pub light_min_growth: f64,
    pub light_max_stress: f64,
}

impl Default for DecisionThresholds {
    fn default() -> Self {
        Self::from(&ThresholdConfig::default())
    }
}

impl From<&ThresholdConfig> for DecisionThresholds {
    fn from(config: &ThresholdConfig) -> Self {
        Self {
            temp_min: config.temp_min,
            temp_max: config.temp_max,
            temp_buffer: config.temp_buffer,
            humidity_min: config.humidity_min,
            humidity_max: config.humidity_max,
            humidity_buffer: config.humidity_buffer,
            soil_min: config.soil_min,
            soil_buffer: config.soil_buffer,
            co2_min: config.co2_min,
            co2_buffer: config.co2_buffer,
            light_min_growth: config.light_min_growth,
            light_max_stress: config.light_max_stress,
        }
    }
}

/// Rule based controller mapping a reading and the previous command to a new command.
#[derive(Debug, Clone, Default)]
pub struct DecisionModel {
    thresholds: DecisionThresholds,
}

impl DecisionModel {
    pub fn new(thresholds: DecisionThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &DecisionThresholds {
        &self.thresholds
    }

    /// Decide the command for `reading`. A missing previous command counts as all-off.
    pub fn decide(&self, reading: &Conditions, previous: Option<&EquipmentSet>) -> EquipmentSet {
        let previous = previous.copied().unwrap_or_default();
        let t = &self.thresholds;
        let mut command = EquipmentSet::all_off();

        // Temperature is evaluated first; ventilation also lowers humidity.
        command.heater = latch_below(
            reading.temperature,
            t.temp_min,
            t.temp_min + t.temp_buffer,
            previous.heater,
        );
        command.ventilation = latch_above(
            reading.temperature,
            t.temp_max,
            t.temp_max - t.temp_buffer,
            previous.ventilation,
        );

        command.dehumidifier = if reading.humidity > t.humidity_max {
            !command.ventilation
        } else if reading.humidity < t.humidity_min {
            false
        } else {
            previous.dehumidifier && reading.humidity >= t.humidity_max - t.humidity_buffer
        };

        command.irrigation = latch_below(
            reading.soil_moisture,
            t.soil_min,
            t.soil_min + t.soil_buffer,
            previous.irrigation,
        );

        if reading.light_intensity < t.light_min_growth {
            command.light_blinds = false;
            command.lights = !previous.light_blinds;
        } else if reading.light_intensity > t.light_max_stress {
            command.lights = false;
            command.light_blinds = !previous.lights;
        } else {
            command.lights = previous.lights;
            command.light_blinds = previous.light_blinds;
        }

        command.co2_injector = latch_below(
            reading.co2_concentration,
            t.co2_min,
            t.co2_min + t.co2_buffer,
            previous.co2_injector,
        );

        command
    }
}

/// On below `on_below`; once on, stays on until the value exceeds `release_above`.
fn latch_below(value: f64, on_below: f64, release_above: f64, was_on: bool) -> bool {
    value < on_below || (was_on && value <= release_above)
}

/// On above `on_above`; once on, stays on until the value drops under `release_below`.
fn latch_above(value: f64, on_above: f64, release_below: f64, was_on: bool) -> bool {
    value > on_above || (was_on && value >= release_below)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Equipment;

    fn optimal() -> Conditions {
        Conditions::new(22.0, 65.0, 60.0, 10_000.0, 900.0)
    }

    fn with(change: impl FnOnce(&mut Conditions)) -> Conditions {
        let mut conditions = optimal();
        change(&mut conditions);
        conditions
    }

    #[test]
    fn optimal_conditions_keep_everything_off() {
        let model = DecisionModel::default();
        assert_eq!(model.decide(&optimal(), None), EquipmentSet::all_off());
    }

    #[test]
    fn heater_hysteresis() {
        let model = DecisionModel::default();
        let cold = with(|c| c.temperature = 19.0);
        assert!(model.decide(&cold, None).heater);

        let inside_band = with(|c| c.temperature = 21.0);
        assert!(!model.decide(&inside_band, None).heater);
        let heating = EquipmentSet::all_off().with(Equipment::Heater, true);
        assert!(model.decide(&inside_band, Some(&heating)).heater);

        let warm = with(|c| c.temperature = 21.6);
        assert!(!model.decide(&warm, Some(&heating)).heater);
    }

    #[test]
    fn ventilation_hysteresis() {
        let model = DecisionModel::default();
        let hot = with(|c| c.temperature = 26.0);
        assert!(model.decide(&hot, None).ventilation);

        let venting = EquipmentSet::all_off().with(Equipment::Ventilation, true);
        let cooling = with(|c| c.temperature = 24.0);
        assert!(model.decide(&cooling, Some(&venting)).ventilation);
        let cooled = with(|c| c.temperature = 23.4);
        assert!(!model.decide(&cooled, Some(&venting)).ventilation);
    }

    #[test]
    fn dehumidifier_defers_to_ventilation() {
        let model = DecisionModel::default();
        let humid = with(|c| c.humidity = 85.0);
        assert!(model.decide(&humid, None).dehumidifier);

        let hot_humid = with(|c| {
            c.humidity = 85.0;
            c.temperature = 27.0;
        });
        let command = model.decide(&hot_humid, None);
        assert!(command.ventilation);
        assert!(!command.dehumidifier);
    }

    #[test]
    fn dehumidifier_hysteresis_and_low_humidity() {
        let model = DecisionModel::default();
        let running = EquipmentSet::all_off().with(Equipment::Dehumidifier, true);
        let band = with(|c| c.humidity = 77.0);
        assert!(model.decide(&band, Some(&running)).dehumidifier);
        let released = with(|c| c.humidity = 74.0);
        assert!(!model.decide(&released, Some(&running)).dehumidifier);
        let dry = with(|c| c.humidity = 45.0);
        assert!(!model.decide(&dry, Some(&running)).dehumidifier);
    }

    #[test]
    fn irrigation_stays_on_inside_band() {
        let model = DecisionModel::default();
        let dry = with(|c| c.soil_moisture = 35.0);
        assert!(model.decide(&dry, None).irrigation);

        let watering = EquipmentSet::all_off().with(Equipment::Irrigation, true);
        let band = with(|c| c.soil_moisture = 43.0);
        assert!(model.decide(&band, Some(&watering)).irrigation);
        let wet = with(|c| c.soil_moisture = 46.0);
        assert!(!model.decide(&wet, Some(&watering)).irrigation);
    }

    #[test]
    fn co2_injector_stays_on_inside_band() {
        let model = DecisionModel::default();
        let low = with(|c| c.co2_concentration = 500.0);
        assert!(model.decide(&low, None).co2_injector);

        let injecting = EquipmentSet::all_off().with(Equipment::Co2Injector, true);
        let band = with(|c| c.co2_concentration = 830.0);
        assert!(model.decide(&band, Some(&injecting)).co2_injector);
        let rich = with(|c| c.co2_concentration = 860.0);
        assert!(!model.decide(&rich, Some(&injecting)).co2_injector);
    }

    #[test]
    fn lights_and_blinds_exclude_each_other() {
        let model = DecisionModel::default();
        let dark = with(|c| c.light_intensity = 3_000.0);
        let command = model.decide(&dark, None);
        assert!(command.lights);
        assert!(!command.light_blinds);

        let blinds_closed = EquipmentSet::all_off().with(Equipment::LightBlinds, true);
        let command = model.decide(&dark, Some(&blinds_closed));
        assert!(!command.lights);
        assert!(!command.light_blinds);

        let bright = with(|c| c.light_intensity = 60_000.0);
        let command = model.decide(&bright, None);
        assert!(command.light_blinds);
        assert!(!command.lights);

        let lights_on = EquipmentSet::all_off().with(Equipment::Lights, true);
        let command = model.decide(&bright, Some(&lights_on));
        assert!(!command.light_blinds);
        assert!(!command.lights);
    }

    #[test]
    fn light_keeps_previous_state_in_range() {
        let model = DecisionModel::default();
        let previous = EquipmentSet::all_off().with(Equipment::Lights, true);
        let command = model.decide(&optimal(), Some(&previous));
        assert!(command.lights);
        assert!(!command.light_blinds);
    }

    #[test]
    fn thresholds_follow_configuration() {
        let config = ThresholdConfig {
            temp_min: 10.0,
            ..ThresholdConfig::default()
        };
        let model = DecisionModel::new(DecisionThresholds::from(&config));
        let cool = with(|c| c.temperature = 15.0);
        assert!(!model.decide(&cool, None).heater);
    }
}
