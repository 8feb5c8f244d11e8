use crate::key::MeasurementKey;
use crate::procedure::ModelTag;
use crate::stats::{row_summary, SummaryRecord};
use crate::SedError;

/// Realization table produced by one procedure invocation.
///
/// Rows are measurements, held in ascending (core, depth) order; columns are
/// independent stochastic draws, typically thousands. Construction sorts the
/// rows so that row order always corresponds 1:1 with the ordered
/// measurement identifiers.
#[derive(Debug, Clone)]
pub struct Ensemble {
    tag: ModelTag,
    keys: Vec<MeasurementKey>,
    rows: Vec<Vec<f64>>,
    n_draws: usize,
}

impl Ensemble {
    pub fn new(
        tag: ModelTag,
        keys: Vec<MeasurementKey>,
        rows: Vec<Vec<f64>>,
    ) -> Result<Self, SedError> {
        if keys.is_empty() || rows.is_empty() {
            return Err(SedError::EmptyEnsemble {
                context: format!("{} reported zero rows", tag.model_name()),
            });
        }
        if keys.len() != rows.len() {
            return Err(SedError::LengthMismatch {
                context: "ensemble rows",
                expected: keys.len(),
                got: rows.len(),
            });
        }
        let n_draws = rows[0].len();
        if n_draws == 0 {
            return Err(SedError::EmptyEnsemble {
                context: format!("{} reported zero realizations", tag.model_name()),
            });
        }
        for row in &rows {
            if row.len() != n_draws {
                return Err(SedError::LengthMismatch {
                    context: "realization columns",
                    expected: n_draws,
                    got: row.len(),
                });
            }
        }

        let mut order: Vec<usize> = (0..keys.len()).collect();
        order.sort_by(|&a, &b| keys[a].cmp(&keys[b]));
        let keys = order.iter().map(|&i| keys[i].clone()).collect();
        let mut rows_by_index: Vec<Option<Vec<f64>>> = rows.into_iter().map(Some).collect();
        let rows = order
            .iter()
            .map(|&i| rows_by_index[i].take().unwrap_or_default())
            .collect();

        Ok(Self {
            tag,
            keys,
            rows,
            n_draws,
        })
    }

    /// Builds an ensemble from raw identifier strings as reported upstream.
    pub fn from_raw_ids(
        tag: ModelTag,
        ids: &[&str],
        rows: Vec<Vec<f64>>,
    ) -> Result<Self, SedError> {
        let keys = ids
            .iter()
            .map(|raw| MeasurementKey::parse(raw))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(tag, keys, rows)
    }

    pub fn tag(&self) -> &ModelTag {
        &self.tag
    }

    pub fn keys(&self) -> &[MeasurementKey] {
        &self.keys
    }

    pub fn row(&self, index: usize) -> &[f64] {
        &self.rows[index]
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.keys.len()
    }

    pub fn n_draws(&self) -> usize {
        self.n_draws
    }

    /// Distinct core ids, in key order.
    pub fn core_ids(&self) -> Vec<String> {
        let mut cores: Vec<String> = Vec::new();
        for key in &self.keys {
            if cores.last().map(String::as_str) != Some(key.core.as_str()) {
                cores.push(key.core.clone());
            }
        }
        cores
    }

    /// Splits a multi-core table into one ensemble per core. Each slice
    /// owns a private copy of its rows.
    pub fn partition_by_core(&self) -> Vec<Ensemble> {
        let mut parts: Vec<Ensemble> = Vec::new();
        for (key, row) in self.keys.iter().zip(&self.rows) {
            match parts.last_mut() {
                Some(part) if part.keys[0].core == key.core => {
                    part.keys.push(key.clone());
                    part.rows.push(row.clone());
                }
                _ => parts.push(Ensemble {
                    tag: self.tag.clone(),
                    keys: vec![key.clone()],
                    rows: vec![row.clone()],
                    n_draws: self.n_draws,
                }),
            }
        }
        parts
    }

    /// Reduces every row via the confidence-interval statistics, yielding
    /// the per-procedure summary table.
    pub fn summarize(&self) -> Result<Vec<SummaryRecord>, SedError> {
        self.keys
            .iter()
            .zip(&self.rows)
            .map(|(key, row)| {
                Ok(SummaryRecord {
                    id: key.clone(),
                    summary: row_summary(row)?,
                    tag: self.tag.clone(),
                    mode: None,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::Ensemble;
    use crate::procedure::{ModelTag, Procedure};
    use crate::SedError;

    fn tag() -> ModelTag {
        ModelTag::new(Procedure::Bacon)
    }

    #[test]
    fn rows_are_sorted_by_numeric_depth_on_construction() {
        let ensemble = Ensemble::from_raw_ids(
            tag(),
            &["C1 10", "C1 2", "C1 9"],
            vec![vec![10.0, 10.0], vec![2.0, 2.0], vec![9.0, 9.0]],
        )
        .unwrap();
        let depths: Vec<f64> = ensemble.keys().iter().map(|k| k.depth).collect();
        assert_eq!(depths, vec![2.0, 9.0, 10.0]);
        assert_eq!(ensemble.row(0), &[2.0, 2.0]);
        assert_eq!(ensemble.row(2), &[10.0, 10.0]);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let err = Ensemble::from_raw_ids(
            tag(),
            &["C1 1", "C1 2"],
            vec![vec![1.0, 2.0], vec![1.0]],
        )
        .unwrap_err();
        assert!(matches!(err, SedError::LengthMismatch { .. }));
    }

    #[test]
    fn empty_table_is_rejected() {
        let err = Ensemble::from_raw_ids(tag(), &[], vec![]).unwrap_err();
        assert!(matches!(err, SedError::EmptyEnsemble { .. }));
    }

    #[test]
    fn partition_splits_strictly_by_core() {
        let ensemble = Ensemble::from_raw_ids(
            tag(),
            &["B 1", "A 2", "A 1", "B 2"],
            vec![vec![4.0], vec![2.0], vec![1.0], vec![5.0]],
        )
        .unwrap();
        let parts = ensemble.partition_by_core();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].core_ids(), vec!["A".to_string()]);
        assert_eq!(parts[1].core_ids(), vec!["B".to_string()]);
        assert_eq!(parts[0].n_rows(), 2);
        assert_eq!(parts[1].n_rows(), 2);
    }

    #[test]
    fn summarize_attaches_keys_and_tag() {
        let ensemble = Ensemble::from_raw_ids(
            tag(),
            &["C1 1", "C1 2"],
            vec![vec![100.0, 102.0, 101.0], vec![150.0, 149.0, 152.0]],
        )
        .unwrap();
        let records = ensemble.summarize().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id.raw(), "C1 1");
        assert_eq!(records[0].summary.median, 101.0);
        assert_eq!(records[0].tag.model_name(), "Bacon");
        assert!(records[0].mode.is_none());
    }
}
