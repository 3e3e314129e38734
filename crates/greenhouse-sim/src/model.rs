//! ---
//! gh_section: "11-simulation"
//! gh_subsection: "module"
//! gh_type: "source"
//! gh_scope: "code"
//! gh_description: "Environment model: metrics, weather, equipment and persisted records."
//! gh_version: "v0.1.0"
//! gh_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

/// Environmental quantity tracked by the simulator.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Metric {
    Temperature,
    Humidity,
    SoilMoisture,
    LightIntensity,
    #[serde(rename = "co2_concentration")]
    #[strum(serialize = "co2_concentration")]
    Co2Concentration,
}

impl Metric {
    /// Fraction of the remaining distance to the target covered per tick.
    pub fn convergence_rate(self) -> f64 {
        match self {
            Metric::Temperature => 0.08,
            Metric::Humidity => 0.10,
            Metric::SoilMoisture => 0.05,
            Metric::LightIntensity => 0.15,
            Metric::Co2Concentration => 0.12,
        }
    }

    /// Physical range the internal state is clamped to.
    pub fn bounds(self) -> (f64, f64) {
        match self {
            Metric::Temperature => (0.0, 50.0),
            Metric::Humidity => (0.0, 100.0),
            Metric::SoilMoisture => (0.0, 100.0),
            Metric::LightIntensity => (0.0, 100_000.0),
            Metric::Co2Concentration => (300.0, 2_000.0),
        }
    }

    /// Sensor noise amplitude as a percentage of the true value.
    pub fn noise_percent(self) -> f64 {
        match self {
            Metric::Temperature => 0.5,
            Metric::Humidity => 1.0,
            Metric::SoilMoisture => 1.5,
            Metric::LightIntensity => 2.0,
            Metric::Co2Concentration => 1.0,
        }
    }

    pub fn clamp(self, value: f64) -> f64 {
        let (low, high) = self.bounds();
        value.clamp(low, high)
    }
}

/// One value per metric.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Conditions {
    pub temperature: f64,
    pub humidity: f64,
    pub soil_moisture: f64,
    pub light_intensity: f64,
    pub co2_concentration: f64,
}

impl Conditions {
    pub const fn new(
        temperature: f64,
        humidity: f64,
        soil_moisture: f64,
        light_intensity: f64,
        co2_concentration: f64,
    ) -> Self {
        Self {
            temperature,
            humidity,
            soil_moisture,
            light_intensity,
            co2_concentration,
        }
    }

    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Temperature => self.temperature,
            Metric::Humidity => self.humidity,
            Metric::SoilMoisture => self.soil_moisture,
            Metric::LightIntensity => self.light_intensity,
            Metric::Co2Concentration => self.co2_concentration,
        }
    }

    pub fn set(&mut self, metric: Metric, value: f64) {
        match metric {
            Metric::Temperature => self.temperature = value,
            Metric::Humidity => self.humidity = value,
            Metric::SoilMoisture => self.soil_moisture = value,
            Metric::LightIntensity => self.light_intensity = value,
            Metric::Co2Concentration => self.co2_concentration = value,
        }
    }
}

/// Outside weather driving the natural equilibrium of the greenhouse.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    AsRefStr,
    EnumIter,
    EnumString,
)]
pub enum Weather {
    Sunny,
    #[serde(rename = "Clear_sky")]
    #[strum(serialize = "Clear_sky")]
    ClearSky,
    Cloudy,
    Rainy,
    Windy,
}

impl Weather {
    /// Conditions the greenhouse settles at under this weather with all equipment off.
    pub fn targets(self) -> Conditions {
        match self {
            Weather::Sunny => Conditions::new(28.0, 45.0, 50.0, 35_000.0, 400.0),
            Weather::ClearSky => Conditions::new(23.0, 60.0, 55.0, 15_000.0, 400.0),
            Weather::Cloudy => Conditions::new(19.0, 75.0, 58.0, 5_000.0, 400.0),
            Weather::Rainy => Conditions::new(16.0, 90.0, 75.0, 2_000.0, 400.0),
            Weather::Windy => Conditions::new(20.0, 50.0, 48.0, 12_000.0, 380.0),
        }
    }

    /// Weathers reachable from this one at a weather change.
    pub fn transitions(self) -> &'static [Weather] {
        match self {
            Weather::Sunny => &[Weather::Cloudy, Weather::ClearSky, Weather::Windy],
            Weather::ClearSky => &[Weather::Cloudy, Weather::Sunny, Weather::Windy],
            Weather::Cloudy => &[
                Weather::Sunny,
                Weather::ClearSky,
                Weather::Rainy,
                Weather::Windy,
            ],
            Weather::Rainy => &[Weather::Cloudy, Weather::Windy],
            Weather::Windy => &[Weather::Cloudy, Weather::ClearSky, Weather::Rainy],
        }
    }
}

/// Actuators that shift the environmental targets while active.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    AsRefStr,
    EnumIter,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Equipment {
    Heater,
    Ventilation,
    Irrigation,
    #[serde(rename = "co2_injector")]
    #[strum(serialize = "co2_injector")]
    Co2Injector,
    Lights,
    Dehumidifier,
    LightBlinds,
}

impl Equipment {
    /// Shift applied to the target of `metric` while this equipment is on.
    pub fn offset(self, metric: Metric) -> f64 {
        match (self, metric) {
            (Equipment::Heater, Metric::Temperature) => 8.0,
            (Equipment::Ventilation, Metric::Temperature) => -4.0,
            (Equipment::Ventilation, Metric::Humidity) => -15.0,
            (Equipment::Ventilation, Metric::Co2Concentration) => -50.0,
            (Equipment::Irrigation, Metric::SoilMoisture) => 25.0,
            (Equipment::Irrigation, Metric::Humidity) => 5.0,
            (Equipment::Co2Injector, Metric::Co2Concentration) => 400.0,
            (Equipment::Lights, Metric::LightIntensity) => 15_000.0,
            (Equipment::Lights, Metric::Temperature) => 2.0,
            (Equipment::Dehumidifier, Metric::Humidity) => -20.0,
            (Equipment::Dehumidifier, Metric::Temperature) => 1.5,
            (Equipment::LightBlinds, Metric::LightIntensity) => -10_000.0,
            _ => 0.0,
        }
    }

    /// Human readable name used in console output.
    pub fn label(self) -> &'static str {
        match self {
            Equipment::Heater => "Heater",
            Equipment::Ventilation => "Ventilation",
            Equipment::Irrigation => "Irrigation",
            Equipment::Co2Injector => "CO2 Injector",
            Equipment::Lights => "Grow Lights",
            Equipment::Dehumidifier => "Dehumidifier",
            Equipment::LightBlinds => "Light Blinds",
        }
    }
}

/// On/off state of every piece of equipment. Also the shape of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EquipmentSet {
    pub heater: bool,
    pub ventilation: bool,
    pub irrigation: bool,
    pub co2_injector: bool,
    pub lights: bool,
    pub dehumidifier: bool,
    pub light_blinds: bool,
}

impl EquipmentSet {
    /// Every actuator switched off.
    pub fn all_off() -> Self {
        Self::default()
    }

    pub fn with(mut self, equipment: Equipment, on: bool) -> Self {
        self.set(equipment, on);
        self
    }

    pub fn get(&self, equipment: Equipment) -> bool {
        match equipment {
            Equipment::Heater => self.heater,
            Equipment::Ventilation => self.ventilation,
            Equipment::Irrigation => self.irrigation,
            Equipment::Co2Injector => self.co2_injector,
            Equipment::Lights => self.lights,
            Equipment::Dehumidifier => self.dehumidifier,
            Equipment::LightBlinds => self.light_blinds,
        }
    }

    pub fn set(&mut self, equipment: Equipment, on: bool) {
        match equipment {
            Equipment::Heater => self.heater = on,
            Equipment::Ventilation => self.ventilation = on,
            Equipment::Irrigation => self.irrigation = on,
            Equipment::Co2Injector => self.co2_injector = on,
            Equipment::Lights => self.lights = on,
            Equipment::Dehumidifier => self.dehumidifier = on,
            Equipment::LightBlinds => self.light_blinds = on,
        }
    }

    /// Equipment currently switched on, in declaration order.
    pub fn active(&self) -> impl Iterator<Item = Equipment> + '_ {
        Equipment::iter().filter(move |equipment| self.get(*equipment))
    }

    /// Ordered view of every equipment state, used for reporting.
    pub fn states(&self) -> IndexMap<Equipment, bool> {
        Equipment::iter()
            .map(|equipment| (equipment, self.get(equipment)))
            .collect()
    }
}

/// One environmental sample, persisted once per tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub tick: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub conditions: Conditions,
    pub weather: Weather,
}

/// Equipment command chosen by the decision model for a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub tick: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub equipment: EquipmentSet,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn weather_names_round_trip_through_strings() {
        assert_eq!(Weather::ClearSky.to_string(), "Clear_sky");
        assert_eq!(Weather::from_str("Clear_sky").unwrap(), Weather::ClearSky);
        assert!(Weather::from_str("Foggy").is_err());
        assert_eq!(
            serde_json::to_string(&Weather::ClearSky).unwrap(),
            "\"Clear_sky\""
        );
    }

    #[test]
    fn every_transition_leads_somewhere_else() {
        for weather in Weather::iter() {
            let next = weather.transitions();
            assert!(!next.is_empty());
            assert!(!next.contains(&weather));
        }
    }

    #[test]
    fn equipment_names_are_snake_case() {
        assert_eq!(Equipment::Co2Injector.to_string(), "co2_injector");
        assert_eq!(Equipment::LightBlinds.as_ref(), "light_blinds");
        assert_eq!(Metric::Co2Concentration.as_ref(), "co2_concentration");
        assert_eq!(Metric::SoilMoisture.to_string(), "soil_moisture");
    }

    #[test]
    fn equipment_set_tracks_active_units() {
        let set = EquipmentSet::all_off()
            .with(Equipment::Heater, true)
            .with(Equipment::LightBlinds, true);
        let active: Vec<_> = set.active().collect();
        assert_eq!(active, vec![Equipment::Heater, Equipment::LightBlinds]);
        assert_eq!(set.states().len(), 7);
        assert_eq!(set.states().get_index(0), Some((&Equipment::Heater, &true)));
    }

    #[test]
    fn offsets_follow_equipment_effects() {
        assert_eq!(Equipment::Heater.offset(Metric::Temperature), 8.0);
        assert_eq!(Equipment::Heater.offset(Metric::Humidity), 0.0);
        assert_eq!(Equipment::Ventilation.offset(Metric::Co2Concentration), -50.0);
        assert_eq!(Equipment::LightBlinds.offset(Metric::LightIntensity), -10_000.0);
    }

    #[test]
    fn reading_serializes_flat() {
        let reading = Reading {
            tick: 3,
            timestamp: Utc::now(),
            conditions: Conditions::new(22.0, 65.0, 60.0, 5_000.0, 400.0),
            weather: Weather::Cloudy,
        };
        let value = serde_json::to_value(&reading).unwrap();
        assert_eq!(value["temperature"], 22.0);
        assert_eq!(value["weather"], "Cloudy");
        let back: Reading = serde_json::from_value(value).unwrap();
        assert_eq!(back, reading);
    }
}
