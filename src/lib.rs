//! Post-processing for Monte-Carlo age-depth modeling ensembles.
//!
//! Independent modeling procedures each produce a per-realization age table
//! for a sediment core. This crate reduces those ensembles to calibrated
//! summary statistics, derives sedimentation-rate ensembles under several
//! finite-difference schemes, reconciles the results across procedures into
//! envelope and equal-weighted estimates, and bins them on the age axis for
//! multi-core comparison. It is a pure batch transformation library: tables
//! in, tables out.

pub mod binning;
pub mod combine;
pub mod config;
pub mod ensemble;
pub mod key;
pub mod output;
pub mod procedure;
pub mod sedrate;
pub mod stats;

use thiserror::Error;

pub use binning::{bin_points, combine_binned, pair_points, BinnedRecord, CombinedBinnedRecord, RatePoint};
pub use combine::{collapse_sub_variants, collapse_summary_variants, combine_age, combine_rate, CombinedRecord};
pub use config::BatchConfig;
pub use ensemble::Ensemble;
pub use key::MeasurementKey;
pub use output::create_timestamped_output_dir;
pub use procedure::{ModelTag, Procedure};
pub use sedrate::{rate_ensemble, rate_matrix, rate_summaries, RateEngine, RateScheme};
pub use stats::{row_summary, RowSummary, SummaryRecord};

#[derive(Debug, Error)]
pub enum SedError {
    #[error("malformed measurement id {raw:?}: {reason}")]
    MalformedKey { raw: String, reason: &'static str },
    #[error("empty ensemble: {context}")]
    EmptyEnsemble { context: String },
    #[error("unknown procedure name {0:?}")]
    UnknownProcedure(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("{context} length mismatch: expected {expected}, got {got}")]
    LengthMismatch {
        context: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
