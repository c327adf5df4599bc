pub mod cleaning;
pub mod clustering;
pub mod config;
pub mod fetch;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod pool;
pub mod rank;
pub mod stats;
pub mod taxonomy;
