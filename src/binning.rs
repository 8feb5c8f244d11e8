use std::collections::BTreeMap;

use serde::Serialize;

use crate::stats::SummaryRecord;

/// One (age, rate-summary) point: the modeled median age paired with the
/// rate summary at the same measurement.
#[derive(Debug, Clone, Copy)]
pub struct RatePoint {
    pub age: f64,
    pub sr_median: f64,
    pub sr_lower_1_sigma: f64,
    pub sr_upper_1_sigma: f64,
    pub sr_lower_2_sigma: f64,
    pub sr_upper_2_sigma: f64,
}

/// Inner-joins one procedure's age and rate summary tables on measurement
/// id, pairing each modeled median age with its rate summary.
pub fn pair_points(ages: &[SummaryRecord], rates: &[SummaryRecord]) -> Vec<RatePoint> {
    let rates_by_id: BTreeMap<_, _> = rates.iter().map(|record| (&record.id, record)).collect();
    ages.iter()
        .filter_map(|age| {
            let rate = rates_by_id.get(&age.id)?;
            Some(RatePoint {
                age: age.summary.median,
                sr_median: rate.summary.median,
                sr_lower_1_sigma: rate.summary.lower_1_sigma,
                sr_upper_1_sigma: rate.summary.upper_1_sigma,
                sr_lower_2_sigma: rate.summary.lower_2_sigma,
                sr_upper_2_sigma: rate.summary.upper_2_sigma,
            })
        })
        .collect()
}

/// One non-empty fixed-width age bin for a single core and procedure.
///
/// Fields are `None` when every contributing cell was missing under the
/// zero-as-missing sentinel.
#[derive(Debug, Clone, Serialize)]
pub struct BinnedRecord {
    pub mid_age: i64,
    pub sr_median: Option<f64>,
    pub sr_lower_1_sigma: Option<f64>,
    pub sr_upper_1_sigma: Option<f64>,
    pub sr_lower_2_sigma: Option<f64>,
    pub sr_upper_2_sigma: Option<f64>,
    pub core: String,
    pub model_name: String,
}

/// Combined-across-procedures bin: envelope on the sigma bounds, equal
/// weight on the central estimate.
#[derive(Debug, Clone, Serialize)]
pub struct CombinedBinnedRecord {
    pub mid_age: i64,
    pub weighted_sr_median: Option<f64>,
    pub sr_lower_1_sigma: Option<f64>,
    pub sr_upper_1_sigma: Option<f64>,
    pub sr_lower_2_sigma: Option<f64>,
    pub sr_upper_2_sigma: Option<f64>,
    pub core: String,
}

#[derive(Debug, Clone, Copy, Default)]
struct FieldAccumulator {
    sum: f64,
    present: usize,
}

impl FieldAccumulator {
    fn add(&mut self, value: f64) {
        // exact zero encodes "no estimate" and is excluded from the sum but
        // still occupies its 1/count share of the bin
        if value != 0.0 && value.is_finite() {
            self.sum += value;
            self.present += 1;
        }
    }

    fn average_over(&self, count: usize) -> Option<f64> {
        if self.present == 0 {
            None
        } else {
            Some(self.sum / count as f64)
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct BinAccumulator {
    count: usize,
    sr_median: FieldAccumulator,
    sr_lower_1_sigma: FieldAccumulator,
    sr_upper_1_sigma: FieldAccumulator,
    sr_lower_2_sigma: FieldAccumulator,
    sr_upper_2_sigma: FieldAccumulator,
}

/// Buckets one core's (age, rate) points into fixed-width age bins.
///
/// Bins tile `[floor(min/w)*w, ceil(max/w)*w)` contiguously; a point exactly
/// on a bin's upper edge belongs to the bin on its left; empty bins are
/// dropped. Each field is the equal-weighted average over all points in the
/// bin, with exact zeros treated as missing beforehand.
pub fn bin_points(
    points: &[RatePoint],
    width: f64,
    core: &str,
    model_name: &str,
) -> Vec<BinnedRecord> {
    if points.is_empty() || !(width > 0.0) {
        return Vec::new();
    }

    let min_age = points.iter().map(|p| p.age).fold(f64::INFINITY, f64::min);
    let max_age = points.iter().map(|p| p.age).fold(f64::NEG_INFINITY, f64::max);
    let lower = if min_age == 0.0 {
        0.0
    } else {
        (min_age / width).floor() * width
    };
    let mut upper = (max_age / width).ceil() * width;
    if upper <= lower {
        upper = lower + width;
    }
    let n_bins = ((upper - lower) / width).round() as usize;

    let mut bins = vec![BinAccumulator::default(); n_bins];
    for point in points {
        let index = (((point.age - lower) / width).ceil() - 1.0)
            .clamp(0.0, (n_bins - 1) as f64) as usize;
        let bin = &mut bins[index];
        bin.count += 1;
        bin.sr_median.add(point.sr_median);
        bin.sr_lower_1_sigma.add(point.sr_lower_1_sigma);
        bin.sr_upper_1_sigma.add(point.sr_upper_1_sigma);
        bin.sr_lower_2_sigma.add(point.sr_lower_2_sigma);
        bin.sr_upper_2_sigma.add(point.sr_upper_2_sigma);
    }

    bins.iter()
        .enumerate()
        .filter(|(_, bin)| bin.count > 0)
        .map(|(index, bin)| {
            let lo = lower + index as f64 * width;
            let hi = lo + width;
            BinnedRecord {
                mid_age: ((lo + hi) / 2.0) as i64,
                sr_median: bin.sr_median.average_over(bin.count),
                sr_lower_1_sigma: bin.sr_lower_1_sigma.average_over(bin.count),
                sr_upper_1_sigma: bin.sr_upper_1_sigma.average_over(bin.count),
                sr_lower_2_sigma: bin.sr_lower_2_sigma.average_over(bin.count),
                sr_upper_2_sigma: bin.sr_upper_2_sigma.average_over(bin.count),
                core: core.to_string(),
                model_name: model_name.to_string(),
            }
        })
        .collect()
}

/// Collapses per-procedure binned tables into one combined table per core:
/// lower-bound fields take the minimum across procedures, upper-bound
/// fields the maximum, and the central estimate the equal-weighted average.
pub fn combine_binned(binned: &[BinnedRecord]) -> Vec<CombinedBinnedRecord> {
    let mut groups: BTreeMap<(String, i64), Vec<&BinnedRecord>> = BTreeMap::new();
    for record in binned {
        groups
            .entry((record.core.clone(), record.mid_age))
            .or_default()
            .push(record);
    }

    groups
        .into_iter()
        .map(|((core, mid_age), members)| CombinedBinnedRecord {
            mid_age,
            weighted_sr_median: equal_weight_mean(members.iter().map(|m| m.sr_median)),
            sr_lower_1_sigma: fold_present(members.iter().map(|m| m.sr_lower_1_sigma), f64::min),
            sr_upper_1_sigma: fold_present(members.iter().map(|m| m.sr_upper_1_sigma), f64::max),
            sr_lower_2_sigma: fold_present(members.iter().map(|m| m.sr_lower_2_sigma), f64::min),
            sr_upper_2_sigma: fold_present(members.iter().map(|m| m.sr_upper_2_sigma), f64::max),
            core,
        })
        .collect()
}

fn equal_weight_mean(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let present: Vec<f64> = values.flatten().collect();
    if present.is_empty() {
        None
    } else {
        Some(present.iter().sum::<f64>() / present.len() as f64)
    }
}

fn fold_present(
    values: impl Iterator<Item = Option<f64>>,
    pick: fn(f64, f64) -> f64,
) -> Option<f64> {
    values.flatten().reduce(pick)
}
