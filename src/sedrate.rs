use std::fmt;

use log::{error, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::BatchConfig;
use crate::ensemble::Ensemble;
use crate::stats::SummaryRecord;
use crate::SedError;

/// Finite-difference scheme for deriving sedimentation rates from an age
/// ensemble.
///
/// The numerator is the count of depth steps spanned by the window (1, 2 or
/// 4), which assumes unit spacing between successive measurement rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateScheme {
    /// rate(i) = 1 / (age(i+1) - age(i))
    Naive,
    /// rate(i) = 2 / (age(i+1) - age(i-1))
    MoveThree,
    /// rate(i) = 4 / (age(i+2) - age(i-2))
    MoveFive,
}

impl RateScheme {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Naive => "naive",
            Self::MoveThree => "move_three",
            Self::MoveFive => "move_five",
        }
    }

    /// (rows needed before, rows needed after, depth steps spanned)
    fn window(&self) -> (usize, usize, f64) {
        match self {
            Self::Naive => (0, 1, 1.0),
            Self::MoveThree => (1, 1, 2.0),
            Self::MoveFive => (2, 2, 4.0),
        }
    }
}

impl fmt::Display for RateScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-realization rate matrix for one core's age ensemble, same shape as
/// the input.
///
/// Three recovery policies apply, each by zero-filling rather than erroring:
/// rows whose window leaves the available depth range, rows whose mean rate
/// across realizations is negative (age reversal with depth), and, after the
/// full matrix exists, any non-finite cell left by a zero age difference.
pub fn rate_matrix(ages: &Ensemble, scheme: RateScheme) -> Vec<Vec<f64>> {
    let (before, after, span) = scheme.window();
    let n = ages.n_rows();
    let draws = ages.n_draws();
    let mut matrix: Vec<Vec<f64>> = Vec::with_capacity(n);

    for i in 0..n {
        if i < before || i + after >= n {
            matrix.push(vec![0.0; draws]);
            continue;
        }
        let hi = ages.row(i + after);
        let lo = ages.row(i - before);
        let row: Vec<f64> = hi.iter().zip(lo).map(|(h, l)| span / (h - l)).collect();
        let mean = row.iter().sum::<f64>() / draws as f64;
        if mean < 0.0 {
            matrix.push(vec![0.0; draws]);
        } else {
            matrix.push(row);
        }
    }

    for row in &mut matrix {
        for value in row {
            if !value.is_finite() {
                *value = 0.0;
            }
        }
    }
    matrix
}

/// Rate ensemble with the same keys and tag as the age ensemble.
pub fn rate_ensemble(ages: &Ensemble, scheme: RateScheme) -> Result<Ensemble, SedError> {
    Ensemble::new(
        ages.tag().clone(),
        ages.keys().to_vec(),
        rate_matrix(ages, scheme),
    )
}

/// Rate summary table for one core, each record tagged with the scheme.
pub fn rate_summaries(ages: &Ensemble, scheme: RateScheme) -> Result<Vec<SummaryRecord>, SedError> {
    let rates = rate_ensemble(ages, scheme)?;
    let mut records = rates.summarize()?;
    for record in &mut records {
        record.mode = Some(scheme);
    }
    Ok(records)
}

/// Multi-core batch engine.
///
/// Work is partitioned strictly by core id; each core's ensemble is one
/// indivisible unit. Large invocations are split into contiguous near-equal
/// batches that run sequentially, each internally parallel across the pool.
#[derive(Debug, Clone)]
pub struct RateEngine {
    config: BatchConfig,
}

impl RateEngine {
    pub fn new(config: BatchConfig) -> Result<Self, SedError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Computes rate summaries for every core in `ages`.
    ///
    /// Any failure inside a parallel batch discards the whole invocation,
    /// including batches that already completed, and yields an empty table
    /// with a diagnostic asking the caller to restart the run. Single-core
    /// input bypasses the pool and runs in the calling context.
    pub fn run(&self, ages: &Ensemble, scheme: RateScheme) -> Vec<SummaryRecord> {
        let cores = ages.partition_by_core();
        if cores.len() <= 1 {
            return match cores.first().map(|core| rate_summaries(core, scheme)) {
                Some(Ok(records)) => records,
                Some(Err(err)) => {
                    error!("sedimentation rate calculation failed: {err}");
                    Vec::new()
                }
                None => Vec::new(),
            };
        }

        let workers = self.config.effective_workers();
        let pool = match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
            Ok(pool) => pool,
            Err(err) => {
                error!("could not acquire worker pool: {err}");
                return Vec::new();
            }
        };

        let mut out: Vec<SummaryRecord> = Vec::new();
        for (index, batch) in split_batches(cores, workers).into_iter().enumerate() {
            info!(
                "calculating batch {} with {} sediment cores",
                index + 1,
                batch.len()
            );
            let results: Result<Vec<Vec<SummaryRecord>>, SedError> = pool.install(|| {
                batch
                    .par_iter()
                    .map(|core| rate_summaries(core, scheme))
                    .collect()
            });
            match results {
                Ok(per_core) => out.extend(per_core.into_iter().flatten()),
                Err(err) => {
                    error!("batch computation failed: {err} - discarding all results, restart the run");
                    return Vec::new();
                }
            }
        }

        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    /// Treats an absent procedure output as "no contribution".
    pub fn run_optional(&self, ages: Option<&Ensemble>, scheme: RateScheme) -> Vec<SummaryRecord> {
        match ages {
            Some(ages) => self.run(ages, scheme),
            None => {
                info!("no sedimentation rate data available");
                Vec::new()
            }
        }
    }
}

/// Contiguous near-equal batches: four of them when the core count exceeds
/// four times the worker capacity, two when it exceeds twice, otherwise one.
fn split_batches<T>(cores: Vec<T>, workers: usize) -> Vec<Vec<T>> {
    let n = cores.len();
    if n > 4 * workers {
        let (a, b) = split_half(cores);
        let (first, second) = split_half(a);
        let (third, fourth) = split_half(b);
        vec![first, second, third, fourth]
    } else if n > 2 * workers {
        let (first, second) = split_half(cores);
        vec![first, second]
    } else {
        vec![cores]
    }
}

fn split_half<T>(mut items: Vec<T>) -> (Vec<T>, Vec<T>) {
    let tail = items.split_off(items.len() / 2);
    (items, tail)
}
