use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::SedError;

/// Composite measurement identifier: a core id and a numeric depth, parsed
/// from the raw form `"<core> <depth>"`.
///
/// Ordering is by core id, then by numeric depth. Depth must never be
/// compared as a string: `"C1 10"` sorts after `"C1 9"`, not before
/// `"C1 2"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementKey {
    pub core: String,
    pub depth: f64,
    raw: String,
}

impl MeasurementKey {
    /// Splits on the first space and parses the remainder as a depth.
    pub fn parse(raw: &str) -> Result<Self, SedError> {
        let Some((core, depth_str)) = raw.split_once(' ') else {
            return Err(SedError::MalformedKey {
                raw: raw.to_string(),
                reason: "no space separator",
            });
        };
        if core.is_empty() {
            return Err(SedError::MalformedKey {
                raw: raw.to_string(),
                reason: "empty core id",
            });
        }
        let depth: f64 = depth_str.trim().parse().map_err(|_| SedError::MalformedKey {
            raw: raw.to_string(),
            reason: "depth is not numeric",
        })?;
        Ok(Self {
            core: core.to_string(),
            depth,
            raw: raw.to_string(),
        })
    }

    /// The identifier exactly as the upstream procedure reported it.
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for MeasurementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for MeasurementKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MeasurementKey {}

impl PartialOrd for MeasurementKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MeasurementKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.core
            .cmp(&other.core)
            .then_with(|| self.depth.total_cmp(&other.depth))
    }
}

#[cfg(test)]
mod tests {
    use super::MeasurementKey;
    use crate::SedError;

    #[test]
    fn depth_sorts_numerically_not_lexicographically() {
        let mut keys: Vec<MeasurementKey> = ["C1 2", "C1 10", "C1 9"]
            .iter()
            .map(|raw| MeasurementKey::parse(raw).unwrap())
            .collect();
        keys.sort();
        let depths: Vec<f64> = keys.iter().map(|k| k.depth).collect();
        assert_eq!(depths, vec![2.0, 9.0, 10.0]);
    }

    #[test]
    fn cores_sort_before_depth() {
        let mut keys: Vec<MeasurementKey> = ["B 1", "A 500", "A 2"]
            .iter()
            .map(|raw| MeasurementKey::parse(raw).unwrap())
            .collect();
        keys.sort();
        let raws: Vec<&str> = keys.iter().map(|k| k.raw()).collect();
        assert_eq!(raws, vec!["A 2", "A 500", "B 1"]);
    }

    #[test]
    fn fractional_depths_parse() {
        let key = MeasurementKey::parse("PG1351 12.5").unwrap();
        assert_eq!(key.core, "PG1351");
        assert!((key.depth - 12.5).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_space_is_rejected() {
        let err = MeasurementKey::parse("PG1351").unwrap_err();
        assert!(matches!(err, SedError::MalformedKey { .. }));
    }

    #[test]
    fn non_numeric_depth_is_rejected() {
        let err = MeasurementKey::parse("PG1351 top").unwrap_err();
        assert!(matches!(err, SedError::MalformedKey { .. }));
    }
}
