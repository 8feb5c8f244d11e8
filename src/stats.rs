use serde::Serialize;

use crate::key::MeasurementKey;
use crate::procedure::ModelTag;
use crate::sedrate::RateScheme;
use crate::SedError;

/// Nominal probabilities of the 2-sigma and 1-sigma cut points of a normal
/// distribution.
pub const TWO_SIGMA_LO: f64 = 0.046;
pub const ONE_SIGMA_LO: f64 = 0.317;
pub const ONE_SIGMA_HI: f64 = 0.683;
pub const TWO_SIGMA_HI: f64 = 0.954;

/// Six-value reduction of one ensemble row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RowSummary {
    pub median: f64,
    pub mean: f64,
    pub lower_2_sigma: f64,
    pub lower_1_sigma: f64,
    pub upper_1_sigma: f64,
    pub upper_2_sigma: f64,
}

/// One summarized measurement from a single procedure's ensemble.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryRecord {
    pub id: MeasurementKey,
    pub summary: RowSummary,
    pub tag: ModelTag,
    /// Set on sedimentation-rate output, absent on age output.
    pub mode: Option<RateScheme>,
}

/// Reduces one row of realizations to its confidence-interval summary.
///
/// The sigma bounds use a nearest-rank quantile: the value returned is an
/// existing realization, never an interpolation between two realizations.
pub fn row_summary(values: &[f64]) -> Result<RowSummary, SedError> {
    if values.is_empty() {
        return Err(SedError::EmptyEnsemble {
            context: "row has no realizations".to_string(),
        });
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    Ok(RowSummary {
        median: median_of_sorted(&sorted),
        mean,
        lower_2_sigma: nearest_rank(&sorted, TWO_SIGMA_LO),
        lower_1_sigma: nearest_rank(&sorted, ONE_SIGMA_LO),
        upper_1_sigma: nearest_rank(&sorted, ONE_SIGMA_HI),
        upper_2_sigma: nearest_rank(&sorted, TWO_SIGMA_HI),
    })
}

fn median_of_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        0.5 * (sorted[n / 2 - 1] + sorted[n / 2])
    }
}

/// Quantile snapped to the nearest existing order statistic.
fn nearest_rank(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let idx = (pos.round() as usize).min(sorted.len() - 1);
    sorted[idx]
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::row_summary;
    use crate::SedError;

    #[test]
    fn small_row_snaps_to_existing_realizations() {
        let summary = row_summary(&[5.0, 1.0, 3.0, 2.0, 4.0]).unwrap();
        assert_eq!(summary.median, 3.0);
        assert_eq!(summary.mean, 3.0);
        assert_eq!(summary.lower_2_sigma, 1.0);
        assert_eq!(summary.lower_1_sigma, 2.0);
        assert_eq!(summary.upper_1_sigma, 4.0);
        assert_eq!(summary.upper_2_sigma, 5.0);
    }

    #[test]
    fn even_row_median_averages_the_middle_pair() {
        let summary = row_summary(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert!((summary.median - 2.5).abs() < 1e-12);
    }

    #[test]
    fn quantile_bounds_are_ordered() {
        let mut rng = StdRng::seed_from_u64(2026);
        for _ in 0..50 {
            let row: Vec<f64> = (0..1000).map(|_| rng.gen_range(-500.0..9000.0)).collect();
            let s = row_summary(&row).unwrap();
            assert!(s.lower_2_sigma <= s.lower_1_sigma);
            assert!(s.lower_1_sigma <= s.median);
            assert!(s.median <= s.upper_1_sigma);
            assert!(s.upper_1_sigma <= s.upper_2_sigma);
        }
    }

    #[test]
    fn degenerate_all_equal_row_is_tolerated() {
        let summary = row_summary(&[0.0; 100]).unwrap();
        assert_eq!(summary.median, 0.0);
        assert_eq!(summary.lower_2_sigma, 0.0);
        assert_eq!(summary.upper_2_sigma, 0.0);
    }

    #[test]
    fn empty_row_is_an_error() {
        let err = row_summary(&[]).unwrap_err();
        assert!(matches!(err, SedError::EmptyEnsemble { .. }));
    }
}
