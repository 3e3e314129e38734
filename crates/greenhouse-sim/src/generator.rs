//! ---
//! gh_section: "11-simulation"
//! gh_subsection: "module"
//! gh_type: "source"
//! gh_scope: "code"
//! gh_description: "Convergent sensor reading generator driven by weather and equipment."
//! gh_version: "v0.1.0"
//! gh_owner: "tbd"
//! ---
use chrono::Utc;
use greenhouse_logging::{gh_info, LogContext};
use rand::prelude::*;
use strum::IntoEnumIterator;

use crate::model::{Conditions, EquipmentSet, Metric, Reading, Weather};
use crate::presets::Preset;

/// Weather is re-drawn on every tick divisible by this period.
pub const WEATHER_PERIOD: u64 = 10;

/// Produces one reading per tick. Each metric moves a fixed fraction of the way
/// toward its weather target shifted by the active equipment, then noise is
/// applied to the emitted reading only.
#[derive(Debug)]
pub struct GreenhouseGenerator {
    preset: Preset,
    rng: StdRng,
    tick: u64,
    weather: Weather,
    state: Conditions,
    equipment: EquipmentSet,
}

impl GreenhouseGenerator {
    /// Build a generator; without a seed the RNG is seeded from entropy.
    pub fn new(preset: Preset, seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let start = preset.starting_state(&mut rng);
        Self {
            preset,
            rng,
            tick: 0,
            weather: start.weather,
            state: start.conditions,
            equipment: start.equipment,
        }
    }

    /// Reset to the preset's starting state and return the tick-0 reading.
    pub fn initialize(&mut self) -> Reading {
        let start = self.preset.starting_state(&mut self.rng);
        self.tick = 0;
        self.weather = start.weather;
        self.state = start.conditions;
        self.equipment = start.equipment;
        self.sample_reading()
    }

    /// Continue from a previously persisted reading and equipment state.
    pub fn resume(&mut self, latest: &Reading, equipment: EquipmentSet) {
        self.tick = latest.tick;
        self.weather = latest.weather;
        self.state = clamp_all(latest.conditions);
        self.equipment = equipment;
    }

    /// Advance one tick and emit the resulting reading.
    pub fn next_reading(&mut self) -> Reading {
        self.tick += 1;
        if self.tick % WEATHER_PERIOD == 0 {
            self.change_weather();
        }
        for metric in Metric::iter() {
            let current = self.state.get(metric);
            let next = current + (self.target(metric) - current) * metric.convergence_rate();
            self.state.set(metric, metric.clamp(next));
        }
        self.sample_reading()
    }

    /// Equilibrium value of `metric` under the current weather and equipment.
    pub fn target(&self, metric: Metric) -> f64 {
        self.equipment
            .active()
            .fold(self.weather.targets().get(metric), |target, unit| {
                target + unit.offset(metric)
            })
    }

    pub fn set_equipment(&mut self, equipment: EquipmentSet) {
        self.equipment = equipment;
    }

    pub fn equipment(&self) -> EquipmentSet {
        self.equipment
    }

    pub fn preset(&self) -> Preset {
        self.preset
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn weather(&self) -> Weather {
        self.weather
    }

    /// Noise-free internal state.
    pub fn state(&self) -> &Conditions {
        &self.state
    }

    fn change_weather(&mut self) {
        let previous = self.weather;
        if let Some(next) = previous.transitions().choose(&mut self.rng) {
            self.weather = *next;
        }
        let ctx = LogContext::new()
            .with_preset(self.preset.as_ref())
            .with_tick(self.tick)
            .with_weather(self.weather.as_ref());
        gh_info!(context = ctx, "weather changed: {} -> {}", previous, self.weather);
    }

    fn sample_reading(&mut self) -> Reading {
        let mut conditions = self.state;
        for metric in Metric::iter() {
            let value = self.state.get(metric);
            let amplitude = (value * metric.noise_percent() / 100.0).abs();
            conditions.set(metric, value + self.rng.gen_range(-amplitude..=amplitude));
        }
        Reading {
            tick: self.tick,
            timestamp: Utc::now(),
            conditions,
            weather: self.weather,
        }
    }
}

fn clamp_all(mut conditions: Conditions) -> Conditions {
    for metric in Metric::iter() {
        conditions.set(metric, metric.clamp(conditions.get(metric)));
    }
    conditions
}
