//! Canonical event schema shared by the cleaned, normalized and labeled tables.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::taxonomy::EventType;

/// One cleaned Storm Events record.
///
/// Numeric columns are `f64` so the same row type carries both the canonical
/// and the normalized tables. `None` marks a missing value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct EventRecord {
    pub event_id: u64,
    pub episode_id: Option<u64>,
    pub event_type: EventType,
    pub fips: String,
    pub loc_name: String,
    pub cz_type: String,
    pub begin_loc: Option<String>,
    pub end_loc: Option<String>,
    pub begin_date_time: NaiveDateTime,
    pub end_date_time: NaiveDateTime,
    pub duration: f64,

    pub injuries_direct: Option<f64>,
    pub injuries_indirect: Option<f64>,
    pub deaths_direct: Option<f64>,
    pub deaths_indirect: Option<f64>,
    pub damage_property: Option<f64>,
    pub damage_crops: Option<f64>,
    pub wind_speed: f64,
    pub hail_size: f64,
    pub tor_f_scale: Option<f64>,
    pub tor_length: f64,
    pub tor_width: f64,

    /// Archetype rank, set only on labeled tables.
    pub rank: Option<u32>,
}

/// Numeric columns that take part in statistics and normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NumericColumn {
    InjuriesDirect,
    InjuriesIndirect,
    DeathsDirect,
    DeathsIndirect,
    DamageProperty,
    DamageCrops,
    WindSpeed,
    HailSize,
    TorFScale,
    TorLength,
    TorWidth,
    Duration,
}

impl NumericColumn {
    pub const ALL: [NumericColumn; 12] = [
        NumericColumn::InjuriesDirect,
        NumericColumn::InjuriesIndirect,
        NumericColumn::DeathsDirect,
        NumericColumn::DeathsIndirect,
        NumericColumn::DamageProperty,
        NumericColumn::DamageCrops,
        NumericColumn::WindSpeed,
        NumericColumn::HailSize,
        NumericColumn::TorFScale,
        NumericColumn::TorLength,
        NumericColumn::TorWidth,
        NumericColumn::Duration,
    ];

    /// Columns used in the clustering feature vector. The tornado scale is
    /// null for every non-tornado event, so it is normalized but not clustered.
    pub const CLUSTERED: [NumericColumn; 11] = [
        NumericColumn::InjuriesDirect,
        NumericColumn::InjuriesIndirect,
        NumericColumn::DeathsDirect,
        NumericColumn::DeathsIndirect,
        NumericColumn::DamageProperty,
        NumericColumn::DamageCrops,
        NumericColumn::WindSpeed,
        NumericColumn::HailSize,
        NumericColumn::TorLength,
        NumericColumn::TorWidth,
        NumericColumn::Duration,
    ];

    pub fn name(self) -> &'static str {
        match self {
            NumericColumn::InjuriesDirect => "INJURIES_DIRECT",
            NumericColumn::InjuriesIndirect => "INJURIES_INDIRECT",
            NumericColumn::DeathsDirect => "DEATHS_DIRECT",
            NumericColumn::DeathsIndirect => "DEATHS_INDIRECT",
            NumericColumn::DamageProperty => "DAMAGE_PROPERTY",
            NumericColumn::DamageCrops => "DAMAGE_CROPS",
            NumericColumn::WindSpeed => "WIND_SPEED",
            NumericColumn::HailSize => "HAIL_SIZE",
            NumericColumn::TorFScale => "TOR_F_SCALE",
            NumericColumn::TorLength => "TOR_LENGTH",
            NumericColumn::TorWidth => "TOR_WIDTH",
            NumericColumn::Duration => "DURATION",
        }
    }
}

impl fmt::Display for NumericColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl EventRecord {
    /// Reads a numeric column. Missing values are `None`.
    pub fn get(&self, column: NumericColumn) -> Option<f64> {
        match column {
            NumericColumn::InjuriesDirect => self.injuries_direct,
            NumericColumn::InjuriesIndirect => self.injuries_indirect,
            NumericColumn::DeathsDirect => self.deaths_direct,
            NumericColumn::DeathsIndirect => self.deaths_indirect,
            NumericColumn::DamageProperty => self.damage_property,
            NumericColumn::DamageCrops => self.damage_crops,
            NumericColumn::WindSpeed => Some(self.wind_speed),
            NumericColumn::HailSize => Some(self.hail_size),
            NumericColumn::TorFScale => self.tor_f_scale,
            NumericColumn::TorLength => Some(self.tor_length),
            NumericColumn::TorWidth => Some(self.tor_width),
            NumericColumn::Duration => Some(self.duration),
        }
    }

    /// Rewrites a present value of `column` in place; missing values stay missing.
    pub fn map_column(&mut self, column: NumericColumn, f: impl Fn(f64) -> f64) {
        fn apply(slot: &mut Option<f64>, f: impl Fn(f64) -> f64) {
            if let Some(v) = slot.as_mut() {
                *v = f(*v);
            }
        }

        match column {
            NumericColumn::InjuriesDirect => apply(&mut self.injuries_direct, f),
            NumericColumn::InjuriesIndirect => apply(&mut self.injuries_indirect, f),
            NumericColumn::DeathsDirect => apply(&mut self.deaths_direct, f),
            NumericColumn::DeathsIndirect => apply(&mut self.deaths_indirect, f),
            NumericColumn::DamageProperty => apply(&mut self.damage_property, f),
            NumericColumn::DamageCrops => apply(&mut self.damage_crops, f),
            NumericColumn::WindSpeed => self.wind_speed = f(self.wind_speed),
            NumericColumn::HailSize => self.hail_size = f(self.hail_size),
            NumericColumn::TorFScale => apply(&mut self.tor_f_scale, f),
            NumericColumn::TorLength => self.tor_length = f(self.tor_length),
            NumericColumn::TorWidth => self.tor_width = f(self.tor_width),
            NumericColumn::Duration => self.duration = f(self.duration),
        }
    }

    /// True when every clustering column holds a value.
    pub fn is_complete(&self) -> bool {
        NumericColumn::CLUSTERED
            .iter()
            .all(|&c| self.get(c).is_some_and(|v| !v.is_nan()))
    }
}
