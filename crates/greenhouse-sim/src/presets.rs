//! ---
//! gh_section: "11-simulation"
//! gh_subsection: "module"
//! gh_type: "source"
//! gh_scope: "code"
//! gh_description: "Named starting configurations for a simulation run."
//! gh_version: "v0.1.0"
//! gh_owner: "tbd"
//! ---
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::model::{Conditions, Equipment, EquipmentSet, Weather};

/// Starting configuration selected with `--config`.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    AsRefStr,
    EnumIter,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Preset {
    #[default]
    Optimal,
    ColdStart,
    HotHumid,
    Random,
}

/// Concrete starting state produced from a preset.
#[derive(Debug, Clone, PartialEq)]
pub struct PresetState {
    pub conditions: Conditions,
    pub weather: Weather,
    pub equipment: EquipmentSet,
}

impl Preset {
    /// Resolve the starting state. Only `Random` draws from the generator.
    pub fn starting_state<R: Rng>(self, rng: &mut R) -> PresetState {
        match self {
            Preset::Optimal => PresetState {
                conditions: Conditions::new(22.0, 65.0, 60.0, 5_000.0, 400.0),
                weather: Weather::ClearSky,
                equipment: EquipmentSet::all_off(),
            },
            Preset::ColdStart => PresetState {
                conditions: Conditions::new(15.0, 80.0, 45.0, 1_000.0, 350.0),
                weather: Weather::Cloudy,
                equipment: EquipmentSet::all_off()
                    .with(Equipment::Heater, true)
                    .with(Equipment::Irrigation, true)
                    .with(Equipment::Lights, true),
            },
            Preset::HotHumid => PresetState {
                conditions: Conditions::new(30.0, 85.0, 70.0, 8_000.0, 450.0),
                weather: Weather::Sunny,
                equipment: EquipmentSet::all_off()
                    .with(Equipment::Ventilation, true)
                    .with(Equipment::Dehumidifier, true),
            },
            Preset::Random => {
                let conditions = Conditions::new(
                    rng.gen_range(18.0..=28.0),
                    rng.gen_range(50.0..=80.0),
                    rng.gen_range(40.0..=70.0),
                    rng.gen_range(2_000.0..=8_000.0),
                    rng.gen_range(350.0..=500.0),
                );
                let weathers: Vec<Weather> = Weather::iter().collect();
                let weather = weathers
                    .choose(rng)
                    .copied()
                    .unwrap_or(Weather::ClearSky);
                let equipment = Equipment::iter().fold(EquipmentSet::all_off(), |set, unit| {
                    set.with(unit, rng.gen_bool(0.5))
                });
                PresetState {
                    conditions,
                    weather,
                    equipment,
                }
            }
        }
    }

    /// Every preset name accepted on the command line.
    pub fn names() -> Vec<&'static str> {
        Preset::iter().map(Into::into).collect()
    }
}
