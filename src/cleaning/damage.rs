//! Decoding of the free-text damage estimates (`"10K"`, `"2.5M"`, `"?"`).

use serde::{Deserialize, Serialize};

/// How the `M` unit suffix is read.
///
/// The historical decoder expanded `M` and `B` to the same number of
/// thousands, so a million-dollar estimate was read as a billion. `Legacy`
/// reproduces that for comparison with older severity tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageSuffixMode {
    /// `M` = 10^6.
    #[default]
    Corrected,
    /// `M` = 10^9, same as `B`.
    Legacy,
}

impl DamageSuffixMode {
    fn multiplier(self, suffix: char) -> Option<f64> {
        match suffix {
            'H' => Some(1e2),
            'K' => Some(1e3),
            'M' => match self {
                DamageSuffixMode::Corrected => Some(1e6),
                DamageSuffixMode::Legacy => Some(1e9),
            },
            'B' => Some(1e9),
            'T' => Some(1e12),
            _ => None,
        }
    }
}

/// Decodes a raw damage amount.
///
/// An absent field is an unreported amount and decodes to `0.0`. A field
/// that is present but carries no parseable number (e.g. `"?"`) is missing.
pub fn decode_damage(raw: Option<&str>, mode: DamageSuffixMode) -> Option<f64> {
    let Some(raw) = raw else {
        return Some(0.0);
    };
    let cleaned: String = raw
        .trim()
        .to_uppercase()
        .chars()
        .filter(|c| *c != '?')
        .collect();

    let (number, multiplier) = match cleaned.chars().last() {
        Some(c) if c.is_ascii_alphabetic() => {
            (&cleaned[..cleaned.len() - 1], mode.multiplier(c)?)
        }
        _ => (cleaned.as_str(), 1.0),
    };
    if !number.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let value: f64 = number.trim().parse().ok()?;
    if value.is_finite() && value >= 0.0 {
        Some(value * multiplier)
    } else {
        None
    }
}
