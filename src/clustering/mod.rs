//! Feature construction, per-year clustering and meta-clustering.

pub mod features;
pub mod kmeans;
pub mod meta;
pub mod year;

pub use features::{FEATURE_DIM, FeatureMatrix, feature_columns, feature_vector};
pub use kmeans::{KMeans, KMeansParams};
pub use meta::{ArchetypeModel, MetaClusterer};
pub use year::YearClusterer;
