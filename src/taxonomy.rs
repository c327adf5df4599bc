//! Storm Events event-type taxonomy.
//!
//! [`EventType`] covers every type NOAA publishes in the details files.
//! [`CLUSTERED_EVENT_TYPES`] is the ordered subset expanded into one-hot
//! columns for clustering; its order fixes the feature layout for every year.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! event_types {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// A Storm Events event type. Names outside the published list are
        /// kept verbatim in [`EventType::Other`].
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum EventType {
            $($variant,)+
            Other(String),
        }

        impl EventType {
            /// The name as written in the raw files.
            pub fn name(&self) -> &str {
                match self {
                    $(EventType::$variant => $name,)+
                    EventType::Other(name) => name,
                }
            }

            /// Parses a raw event-type name. Surrounding whitespace is ignored.
            pub fn parse(raw: &str) -> Self {
                match raw.trim() {
                    $($name => EventType::$variant,)+
                    other => EventType::Other(other.to_string()),
                }
            }
        }
    };
}

event_types! {
    AstronomicalLowTide => "Astronomical Low Tide",
    Avalanche => "Avalanche",
    Blizzard => "Blizzard",
    CoastalFlood => "Coastal Flood",
    ColdWindChill => "Cold/Wind Chill",
    DebrisFlow => "Debris Flow",
    DenseFog => "Dense Fog",
    DenseSmoke => "Dense Smoke",
    Drought => "Drought",
    DustDevil => "Dust Devil",
    DustStorm => "Dust Storm",
    ExcessiveHeat => "Excessive Heat",
    ExtremeColdWindChill => "Extreme Cold/Wind Chill",
    FlashFlood => "Flash Flood",
    Flood => "Flood",
    FreezingFog => "Freezing Fog",
    FrostFreeze => "Frost/Freeze",
    FunnelCloud => "Funnel Cloud",
    Hail => "Hail",
    Heat => "Heat",
    HeavyRain => "Heavy Rain",
    HeavySnow => "Heavy Snow",
    HighSurf => "High Surf",
    HighWind => "High Wind",
    Hurricane => "Hurricane (Typhoon)",
    IceStorm => "Ice Storm",
    LakeEffectSnow => "Lake-Effect Snow",
    LakeshoreFlood => "Lakeshore Flood",
    Lightning => "Lightning",
    RipCurrent => "Rip Current",
    Seiche => "Seiche",
    Sleet => "Sleet",
    StormSurgeTide => "Storm Surge/Tide",
    StrongWind => "Strong Wind",
    ThunderstormWind => "Thunderstorm Wind",
    Tornado => "Tornado",
    TropicalDepression => "Tropical Depression",
    TropicalStorm => "Tropical Storm",
    Tsunami => "Tsunami",
    VolcanicAsh => "Volcanic Ash",
    Wildfire => "Wildfire",
    WinterStorm => "Winter Storm",
    WinterWeather => "Winter Weather",
}

/// Number of one-hot event-type columns.
pub const CLUSTERED_TYPE_COUNT: usize = 23;

/// Event types that get a one-hot column in the clustering feature vector,
/// in column order. Every other type contributes an all-zero block.
pub static CLUSTERED_EVENT_TYPES: [EventType; CLUSTERED_TYPE_COUNT] = [
    EventType::Avalanche,
    EventType::Blizzard,
    EventType::Sleet,
    EventType::Drought,
    EventType::StormSurgeTide,
    EventType::StrongWind,
    EventType::DustStorm,
    EventType::ThunderstormWind,
    EventType::ExcessiveHeat,
    EventType::Tornado,
    EventType::ExtremeColdWindChill,
    EventType::TropicalDepression,
    EventType::FlashFlood,
    EventType::TropicalStorm,
    EventType::Wildfire,
    EventType::Hail,
    EventType::WinterStorm,
    EventType::HeavyRain,
    EventType::HeavySnow,
    EventType::HighWind,
    EventType::Hurricane,
    EventType::IceStorm,
    EventType::LakeEffectSnow,
];

impl EventType {
    /// Position of this type's one-hot column, if it is clustered.
    pub fn one_hot_index(&self) -> Option<usize> {
        CLUSTERED_EVENT_TYPES.iter().position(|t| t == self)
    }
}

impl From<String> for EventType {
    fn from(raw: String) -> Self {
        EventType::parse(&raw)
    }
}

impl From<EventType> for String {
    fn from(event_type: EventType) -> Self {
        event_type.name().to_string()
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
