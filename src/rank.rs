//! Archetype ranking, per-event labeling and per-region severity totals.

use anyhow::{Result, bail};
use ndarray::{ArrayView1, ArrayView2};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::cleaning::EventRecord;
use crate::clustering::{ArchetypeModel, FeatureMatrix};

/// Severity score per FIPS key.
pub type GeoSeverity = BTreeMap<String, f64>;

/// A final cluster center with its severity rank.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchetypeCenter {
    pub label: usize,
    pub rank: u32,
    pub norm: f64,
    pub center: Vec<f64>,
}

fn norm(v: ArrayView1<f64>) -> f64 {
    v.dot(&v).sqrt()
}

/// Maps model labels to ranks; rank 0 is the center with the smallest
/// Euclidean norm.
#[derive(Debug, Clone, PartialEq)]
pub struct Ranking {
    label_to_rank: Vec<u32>,
}

impl Ranking {
    pub fn from_centers(centers: ArrayView2<f64>) -> Self {
        let mut order: Vec<(usize, f64)> = centers
            .rows()
            .into_iter()
            .enumerate()
            .map(|(label, c)| (label, norm(c)))
            .collect();
        order.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

        let mut label_to_rank = vec![0; order.len()];
        for (rank, (label, _)) in order.into_iter().enumerate() {
            label_to_rank[label] = rank as u32;
        }
        Self { label_to_rank }
    }

    pub fn rank_of(&self, label: usize) -> u32 {
        self.label_to_rank[label]
    }

    /// Every center with its rank, ordered by rank.
    pub fn archetypes(&self, centers: ArrayView2<f64>) -> Vec<ArchetypeCenter> {
        let mut out: Vec<ArchetypeCenter> = centers
            .rows()
            .into_iter()
            .enumerate()
            .map(|(label, c)| ArchetypeCenter {
                label,
                rank: self.rank_of(label),
                norm: norm(c),
                center: c.to_vec(),
            })
            .collect();
        out.sort_by_key(|a| a.rank);
        out
    }
}

/// Labels events with the rank of their nearest archetype.
pub struct Ranker {
    model: ArchetypeModel,
    ranking: Ranking,
}

impl Ranker {
    pub fn new(model: ArchetypeModel) -> Result<Self> {
        model.check_layout()?;
        let ranking = Ranking::from_centers(model.model.centers());
        Ok(Self { model, ranking })
    }

    pub fn ranking(&self) -> &Ranking {
        &self.ranking
    }

    pub fn archetypes(&self) -> Vec<ArchetypeCenter> {
        self.ranking.archetypes(self.model.model.centers())
    }

    /// Attaches ranks to a year's canonical records.
    ///
    /// `normalized` must be the same table after normalization (same rows,
    /// same order). Rows whose normalized features are incomplete are left
    /// out of the result.
    pub fn label(
        &self,
        canonical: Vec<EventRecord>,
        normalized: &[EventRecord],
    ) -> Result<Vec<EventRecord>> {
        if canonical.len() != normalized.len() {
            bail!(
                "canonical table has {} rows but normalized table has {}",
                canonical.len(),
                normalized.len()
            );
        }

        for (record, scaled) in canonical.iter().zip(normalized) {
            if record.event_id != scaled.event_id {
                bail!(
                    "row mismatch: canonical event {} vs normalized event {}",
                    record.event_id,
                    scaled.event_id
                );
            }
        }

        let total = canonical.len();
        let features = FeatureMatrix::from_records(normalized)?;
        let labels = self.model.predict(features.data.view());
        let mut ranks = vec![None; total];
        for (&row, &label) in features.rows.iter().zip(&labels) {
            ranks[row] = Some(self.ranking.rank_of(label));
        }

        let labeled: Vec<EventRecord> = canonical
            .into_iter()
            .zip(ranks)
            .filter_map(|(mut record, rank)| {
                record.rank = Some(rank?);
                Some(record)
            })
            .collect();
        debug!(total, labeled = labeled.len(), "Year labeled");
        Ok(labeled)
    }
}

/// Adds a labeled table's ranks into the running per-region totals.
/// Unlabeled rows contribute nothing.
pub fn accumulate_severity(severity: &mut GeoSeverity, labeled: &[EventRecord]) {
    for record in labeled {
        if let Some(rank) = record.rank {
            *severity.entry(record.fips.clone()).or_insert(0.0) += f64::from(rank);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaning::record::fixtures::record;
    use crate::clustering::{FEATURE_DIM, KMeans, feature_columns};
    use crate::taxonomy::EventType;
    use ndarray::{Array2, array};

    #[test]
    fn test_ranks_are_a_permutation_by_norm() {
        let centers = array![[3.0, 4.0], [0.0, 1.0], [10.0, 0.0], [0.0, -2.0]];
        let ranking = Ranking::from_centers(centers.view());
        assert_eq!(ranking.rank_of(0), 2);
        assert_eq!(ranking.rank_of(1), 0);
        assert_eq!(ranking.rank_of(2), 3);
        assert_eq!(ranking.rank_of(3), 1);

        let mut ranks: Vec<u32> = (0..4).map(|l| ranking.rank_of(l)).collect();
        ranks.sort_unstable();
        assert_eq!(ranks, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_single_center_gets_rank_zero() {
        let ranking = Ranking::from_centers(array![[5.0, 5.0]].view());
        assert_eq!(ranking.rank_of(0), 0);
    }

    #[test]
    fn test_archetypes_are_ordered_by_rank() {
        let centers = array![[3.0, 4.0], [0.0, 1.0]];
        let archetypes = Ranking::from_centers(centers.view()).archetypes(centers.view());
        assert_eq!(archetypes[0].label, 1);
        assert_eq!(archetypes[0].norm, 1.0);
        assert_eq!(archetypes[1].norm, 5.0);
    }

    /// Two archetypes in the full feature layout: calm (all zero) and a
    /// high-wind thunderstorm.
    fn two_archetype_model() -> ArchetypeModel {
        let mut centers = Array2::<f64>::zeros((2, FEATURE_DIM));
        centers[[0, 6]] = 100.0;
        let tsw = 11 + EventType::ThunderstormWind.one_hot_index().unwrap();
        centers[[0, tsw]] = 1.0;
        ArchetypeModel {
            columns: feature_columns(),
            pooled_centers: 2,
            model: KMeans::from_centers(centers),
        }
    }

    #[test]
    fn test_label_attaches_rank_to_canonical_rows() {
        let ranker = Ranker::new(two_archetype_model()).unwrap();
        let mut calm = record(2, "19153");
        calm.event_type = EventType::Lightning;
        calm.wind_speed = 0.0;
        calm.damage_property = Some(0.0);
        calm.duration = 0.0;
        let canonical = vec![record(1, "19169"), calm.clone()];

        let mut normalized = canonical.clone();
        normalized[0].wind_speed = 90.0;

        let labeled = ranker.label(canonical, &normalized).unwrap();
        assert_eq!(labeled.len(), 2);
        assert_eq!(labeled[0].rank, Some(1));
        assert_eq!(labeled[0].wind_speed, 60.0);
        assert_eq!(labeled[1].rank, Some(0));
    }

    #[test]
    fn test_label_drops_incomplete_rows() {
        let ranker = Ranker::new(two_archetype_model()).unwrap();
        let canonical = vec![record(1, "19169"), record(2, "19169")];
        let mut normalized = canonical.clone();
        normalized[1].damage_property = None;

        let labeled = ranker.label(canonical, &normalized).unwrap();
        assert_eq!(labeled.len(), 1);
        assert_eq!(labeled[0].event_id, 1);
    }

    #[test]
    fn test_label_rejects_misaligned_tables() {
        let ranker = Ranker::new(two_archetype_model()).unwrap();
        let canonical = vec![record(1, "19169")];
        let normalized = vec![record(9, "19169")];
        assert!(ranker.label(canonical.clone(), &normalized).is_err());
        assert!(ranker.label(canonical, &[]).is_err());
    }

    #[test]
    fn test_severity_sums_ranks_per_region() {
        let with_rank = |id, fips, rank| {
            let mut r = record(id, fips);
            r.rank = rank;
            r
        };
        let year_one = vec![
            with_rank(1, "19169", Some(3)),
            with_rank(2, "19169", Some(1)),
            with_rank(3, "19153", Some(0)),
        ];
        let year_two = vec![
            with_rank(4, "19169", Some(2)),
            with_rank(5, "17031", Some(2)),
            with_rank(6, "17031", None),
        ];

        let mut severity = GeoSeverity::new();
        accumulate_severity(&mut severity, &year_one);
        accumulate_severity(&mut severity, &year_two);

        assert_eq!(severity.len(), 3);
        assert_eq!(severity["19169"], 6.0);
        assert_eq!(severity["19153"], 0.0);
        assert_eq!(severity["17031"], 2.0);
        assert!(!severity.contains_key("01001"));
    }
}
