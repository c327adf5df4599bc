//! Clustering feature layout: normalized numeric columns followed by a
//! one-hot block over [`CLUSTERED_EVENT_TYPES`].

use anyhow::Result;
use ndarray::Array2;

use crate::cleaning::{EventRecord, NumericColumn};
use crate::taxonomy::{CLUSTERED_EVENT_TYPES, CLUSTERED_TYPE_COUNT};

/// Width of every feature vector, identical for all years.
pub const FEATURE_DIM: usize = NumericColumn::CLUSTERED.len() + CLUSTERED_TYPE_COUNT;

/// Column names in feature order.
pub fn feature_columns() -> Vec<String> {
    NumericColumn::CLUSTERED
        .iter()
        .map(|c| c.name().to_string())
        .chain(CLUSTERED_EVENT_TYPES.iter().map(|t| t.name().to_string()))
        .collect()
}

/// Builds the feature vector for one record, or `None` if any numeric
/// feature is missing. Event types outside the clustered set leave the
/// one-hot block all zero.
pub fn feature_vector(record: &EventRecord) -> Option<Vec<f64>> {
    let mut features = Vec::with_capacity(FEATURE_DIM);
    for column in NumericColumn::CLUSTERED {
        match record.get(column) {
            Some(v) if !v.is_nan() => features.push(v),
            _ => return None,
        }
    }
    let mut one_hot = [0.0; CLUSTERED_TYPE_COUNT];
    if let Some(i) = record.event_type.one_hot_index() {
        one_hot[i] = 1.0;
    }
    features.extend_from_slice(&one_hot);
    Some(features)
}

/// Feature vectors of a table's complete rows.
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    pub data: Array2<f64>,
    /// Source-table index of each matrix row.
    pub rows: Vec<usize>,
}

impl FeatureMatrix {
    pub fn from_records(records: &[EventRecord]) -> Result<Self> {
        let mut flat = Vec::with_capacity(records.len() * FEATURE_DIM);
        let mut rows = Vec::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            if let Some(features) = feature_vector(record) {
                flat.extend(features);
                rows.push(i);
            }
        }
        let data = Array2::from_shape_vec((rows.len(), FEATURE_DIM), flat)?;
        Ok(Self { data, rows })
    }
}
