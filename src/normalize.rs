//! Rescaling of canonical tables by the global variance.

use crate::cleaning::{EventRecord, NumericColumn};
use crate::stats::GlobalStatistics;

/// Divides each numeric column by its global standard deviation.
///
/// Columns with zero global variance collapse to 0. Missing values stay
/// missing; nothing is imputed here.
pub fn normalize(records: &mut [EventRecord], stats: &GlobalStatistics) {
    for column in NumericColumn::ALL {
        let variance = stats.variance_of(column);
        if variance == 0.0 {
            for record in records.iter_mut() {
                record.map_column(column, |_| 0.0);
            }
        } else {
            let scale = variance.sqrt();
            for record in records.iter_mut() {
                record.map_column(column, |v| v / scale);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaning::record::fixtures::record;
    use crate::stats::VarianceCombine;
    use std::collections::BTreeMap;

    fn stats_with(variance: f64) -> GlobalStatistics {
        GlobalStatistics {
            years: vec![2020],
            method: VarianceCombine::Unweighted,
            mean: BTreeMap::new(),
            variance: NumericColumn::ALL.iter().map(|&c| (c, variance)).collect(),
        }
    }

    #[test]
    fn test_divides_by_standard_deviation() {
        let mut records = vec![record(1, "19169")];
        normalize(&mut records, &stats_with(4.0));
        assert_eq!(records[0].wind_speed, 30.0);
        assert_eq!(records[0].damage_property, Some(2500.0));
        assert_eq!(records[0].duration, 1.0);
    }

    #[test]
    fn test_zero_variance_column_maps_to_zero() {
        let mut records = vec![record(1, "19169"), record(2, "19153")];
        records[1].wind_speed = 80.0;
        let mut stats = stats_with(4.0);
        stats.variance.insert(NumericColumn::WindSpeed, 0.0);

        normalize(&mut records, &stats);
        assert!(records.iter().all(|r| r.wind_speed == 0.0));
        assert_eq!(records[1].duration, 1.0);
    }

    #[test]
    fn test_missing_values_stay_missing() {
        let mut records = vec![record(1, "19169")];
        records[0].damage_crops = None;
        normalize(&mut records, &stats_with(0.0));
        assert_eq!(records[0].damage_crops, None);
        assert_eq!(records[0].tor_f_scale, None);
        assert_eq!(records[0].damage_property, Some(0.0));
    }

    #[test]
    fn test_identity_columns_untouched() {
        let mut records = vec![record(1, "19169")];
        let before = records[0].clone();
        normalize(&mut records, &stats_with(9.0));
        assert_eq!(records[0].fips, before.fips);
        assert_eq!(records[0].begin_date_time, before.begin_date_time);
        assert_eq!(records[0].event_type, before.event_type);
    }
}
