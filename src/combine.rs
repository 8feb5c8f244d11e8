use std::collections::{BTreeMap, BTreeSet};

use log::info;
use serde::Serialize;

use crate::ensemble::Ensemble;
use crate::key::MeasurementKey;
use crate::procedure::{ModelTag, Procedure};
use crate::stats::{RowSummary, SummaryRecord};
use crate::SedError;

/// Cross-procedure envelope and equal-weighted estimate at one measurement.
#[derive(Debug, Clone, Serialize)]
pub struct CombinedRecord {
    pub id: MeasurementKey,
    pub max: f64,
    pub min: f64,
    pub weighted_mean: f64,
}

/// Sentinel convention for the point estimates being combined. Procedures
/// encode "no rate estimate at this depth" as the literal value 0, so rate
/// combination must drop exact zeros before reducing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sentinel {
    None,
    ZeroIsMissing,
}

/// Combines per-procedure age summary tables for one core.
pub fn combine_age(tables: &[Vec<SummaryRecord>]) -> Vec<CombinedRecord> {
    combine_tables(tables, Sentinel::None)
}

/// Combines per-procedure rate summary tables for one core, treating exact
/// zeros as missing.
pub fn combine_rate(tables: &[Vec<SummaryRecord>]) -> Vec<CombinedRecord> {
    combine_tables(tables, Sentinel::ZeroIsMissing)
}

fn combine_tables(tables: &[Vec<SummaryRecord>], sentinel: Sentinel) -> Vec<CombinedRecord> {
    // Outer join on measurement id. The canonical id set is the union over
    // contributing procedures; the first key seen for an id is the one kept.
    let mut by_id: BTreeMap<MeasurementKey, Vec<f64>> = BTreeMap::new();
    for table in tables {
        if table.is_empty() {
            info!("procedure reported no output, skipping its contribution");
            continue;
        }
        for record in table {
            let value = record.summary.median;
            if sentinel == Sentinel::ZeroIsMissing && value == 0.0 {
                continue;
            }
            by_id.entry(record.id.clone()).or_default().push(value);
        }
    }

    by_id
        .into_iter()
        .map(|(id, values)| {
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let weighted_mean = values.iter().sum::<f64>() / values.len() as f64;
            CombinedRecord {
                id,
                max,
                min,
                weighted_mean,
            }
        })
        .collect()
}

/// Collapses sub-variant ensembles into one synthetic ensemble per
/// (procedure, core).
///
/// Ensembles for the same core from the same procedure under differing
/// variant labels are averaged realization-by-realization and re-tagged with
/// the combined pseudo-procedure; everything else passes through unchanged.
pub fn collapse_sub_variants(ensembles: Vec<Ensemble>) -> Result<Vec<Ensemble>, SedError> {
    let mut groups: Vec<(Procedure, String, Vec<Ensemble>)> = Vec::new();
    for ensemble in ensembles {
        let procedure = ensemble.tag().procedure;
        let core = ensemble.keys()[0].core.clone();
        match groups
            .iter_mut()
            .find(|(p, c, _)| *p == procedure && *c == core)
        {
            Some((_, _, members)) => members.push(ensemble),
            None => groups.push((procedure, core, vec![ensemble])),
        }
    }

    let mut out = Vec::new();
    for (_, _, members) in groups {
        let variants: BTreeSet<Option<String>> = members
            .iter()
            .map(|member| member.tag().variant.clone())
            .collect();
        if members.len() == 1 || variants.len() <= 1 {
            out.extend(members);
        } else {
            out.push(average_ensembles(&members)?);
        }
    }
    Ok(out)
}

fn average_ensembles(members: &[Ensemble]) -> Result<Ensemble, SedError> {
    let draws = members[0].n_draws();
    for member in members {
        if member.n_draws() != draws {
            return Err(SedError::LengthMismatch {
                context: "sub-variant realization columns",
                expected: draws,
                got: member.n_draws(),
            });
        }
    }

    let lookups: Vec<BTreeMap<&MeasurementKey, &[f64]>> = members
        .iter()
        .map(|member| {
            member
                .keys()
                .iter()
                .zip(member.rows())
                .map(|(key, row)| (key, row.as_slice()))
                .collect()
        })
        .collect();

    // Ids present in every sub-variant contribute to the synthetic ensemble.
    let mut keys = Vec::new();
    let mut rows = Vec::new();
    for key in members[0].keys() {
        let member_rows: Vec<&[f64]> = match lookups
            .iter()
            .map(|lookup| lookup.get(key).copied())
            .collect::<Option<Vec<_>>>()
        {
            Some(rows) => rows,
            None => continue,
        };
        let averaged: Vec<f64> = (0..draws)
            .map(|col| {
                member_rows.iter().map(|row| row[col]).sum::<f64>() / member_rows.len() as f64
            })
            .collect();
        keys.push(key.clone());
        rows.push(averaged);
    }

    Ensemble::new(ModelTag::new(Procedure::Combined), keys, rows)
}

/// Summary-level variant collapse for consumers that only hold summary
/// tables: records for the same measurement under differing variant labels
/// are averaged field-by-field and re-tagged with the combined
/// pseudo-procedure.
pub fn collapse_summary_variants(records: Vec<SummaryRecord>) -> Vec<SummaryRecord> {
    let mut by_id: BTreeMap<MeasurementKey, Vec<SummaryRecord>> = BTreeMap::new();
    for record in records {
        by_id.entry(record.id.clone()).or_default().push(record);
    }

    by_id
        .into_values()
        .map(|group| {
            let variants: BTreeSet<Option<String>> =
                group.iter().map(|record| record.tag.variant.clone()).collect();
            if group.len() == 1 || variants.len() <= 1 {
                return group.into_iter().next().expect("group is non-empty");
            }
            let k = group.len() as f64;
            let summary = RowSummary {
                median: group.iter().map(|r| r.summary.median).sum::<f64>() / k,
                mean: group.iter().map(|r| r.summary.mean).sum::<f64>() / k,
                lower_2_sigma: group.iter().map(|r| r.summary.lower_2_sigma).sum::<f64>() / k,
                lower_1_sigma: group.iter().map(|r| r.summary.lower_1_sigma).sum::<f64>() / k,
                upper_1_sigma: group.iter().map(|r| r.summary.upper_1_sigma).sum::<f64>() / k,
                upper_2_sigma: group.iter().map(|r| r.summary.upper_2_sigma).sum::<f64>() / k,
            };
            SummaryRecord {
                id: group[0].id.clone(),
                summary,
                tag: ModelTag::new(Procedure::Combined),
                mode: group[0].mode,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{collapse_sub_variants, collapse_summary_variants, combine_age, combine_rate};
    use crate::ensemble::Ensemble;
    use crate::key::MeasurementKey;
    use crate::procedure::{ModelTag, Procedure};
    use crate::stats::{RowSummary, SummaryRecord};

    fn record(raw: &str, procedure: Procedure, median: f64) -> SummaryRecord {
        SummaryRecord {
            id: MeasurementKey::parse(raw).unwrap(),
            summary: RowSummary {
                median,
                mean: median,
                lower_2_sigma: median,
                lower_1_sigma: median,
                upper_1_sigma: median,
                upper_2_sigma: median,
            },
            tag: ModelTag::new(procedure),
            mode: None,
        }
    }

    #[test]
    fn age_combination_forms_envelope_and_equal_weighted_mean() {
        let a = vec![record("C1 1", Procedure::Bacon, 100.0)];
        let b = vec![record("C1 1", Procedure::Bchron, 120.0)];
        let combined = combine_age(&[a, b]);
        assert_eq!(combined.len(), 1);
        assert_eq!(combined[0].max, 120.0);
        assert_eq!(combined[0].min, 100.0);
        assert!((combined[0].weighted_mean - 110.0).abs() < 1e-12);
        assert!(combined[0].max >= combined[0].weighted_mean);
        assert!(combined[0].weighted_mean >= combined[0].min);
    }

    #[test]
    fn zero_rate_is_missing_not_a_contribution() {
        let a = vec![record("C1 1", Procedure::Bacon, 0.0)];
        let b = vec![record("C1 1", Procedure::Bchron, 0.5)];
        let combined = combine_rate(&[a, b]);
        assert_eq!(combined.len(), 1);
        assert!((combined[0].weighted_mean - 0.5).abs() < 1e-12);
        assert_eq!(combined[0].max, 0.5);
        assert_eq!(combined[0].min, 0.5);
    }

    #[test]
    fn all_zero_rate_id_is_absent_from_output() {
        let a = vec![record("C1 1", Procedure::Bacon, 0.0)];
        let b = vec![record("C1 1", Procedure::Bchron, 0.0)];
        assert!(combine_rate(&[a, b]).is_empty());
    }

    #[test]
    fn outer_join_keeps_single_contributor_ids() {
        let a = vec![
            record("C1 1", Procedure::Bacon, 100.0),
            record("C1 2", Procedure::Bacon, 200.0),
        ];
        let b = vec![record("C1 1", Procedure::Bchron, 110.0)];
        let combined = combine_age(&[a, b]);
        assert_eq!(combined.len(), 2);
        assert!((combined[1].weighted_mean - 200.0).abs() < 1e-12);
        assert_eq!(combined[1].max, combined[1].min);
    }

    #[test]
    fn empty_procedure_table_is_skipped_not_fatal() {
        let a = vec![record("C1 1", Procedure::Bacon, 100.0)];
        let combined = combine_age(&[a, Vec::new()]);
        assert_eq!(combined.len(), 1);
        assert!((combined[0].weighted_mean - 100.0).abs() < 1e-12);
    }

    #[test]
    fn sub_variant_ensembles_average_realization_by_realization() {
        let v1 = Ensemble::from_raw_ids(
            ModelTag::with_variant(Procedure::Clam, "T1 S0.1"),
            &["C1 1", "C1 2"],
            vec![vec![100.0, 110.0], vec![200.0, 210.0]],
        )
        .unwrap();
        let v2 = Ensemble::from_raw_ids(
            ModelTag::with_variant(Procedure::Clam, "T2 S0.3"),
            &["C1 1", "C1 2"],
            vec![vec![120.0, 130.0], vec![220.0, 230.0]],
        )
        .unwrap();
        let collapsed = collapse_sub_variants(vec![v1, v2]).unwrap();
        assert_eq!(collapsed.len(), 1);
        let combined = &collapsed[0];
        assert_eq!(combined.tag().procedure, Procedure::Combined);
        assert_eq!(combined.row(0), &[110.0, 120.0]);
        assert_eq!(combined.row(1), &[210.0, 220.0]);
    }

    #[test]
    fn single_variant_passes_through_unchanged() {
        let only = Ensemble::from_raw_ids(
            ModelTag::new(Procedure::Bacon),
            &["C1 1"],
            vec![vec![100.0, 110.0]],
        )
        .unwrap();
        let collapsed = collapse_sub_variants(vec![only]).unwrap();
        assert_eq!(collapsed.len(), 1);
        assert_eq!(collapsed[0].tag().procedure, Procedure::Bacon);
    }

    #[test]
    fn summary_variant_collapse_averages_every_field() {
        let mut a = record("C1 1", Procedure::Clam, 100.0);
        a.tag = ModelTag::with_variant(Procedure::Clam, "T1 S0.1");
        a.summary.upper_2_sigma = 140.0;
        let mut b = record("C1 1", Procedure::Clam, 120.0);
        b.tag = ModelTag::with_variant(Procedure::Clam, "T2 S0.3");
        b.summary.upper_2_sigma = 160.0;
        let collapsed = collapse_summary_variants(vec![a, b]);
        assert_eq!(collapsed.len(), 1);
        assert_eq!(collapsed[0].tag.procedure, Procedure::Combined);
        assert!((collapsed[0].summary.median - 110.0).abs() < 1e-12);
        assert!((collapsed[0].summary.upper_2_sigma - 150.0).abs() < 1e-12);
    }
}
