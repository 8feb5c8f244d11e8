use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::SedError;

/// Execution settings for multi-core batch runs.
///
/// Passed explicitly into the batch engine; the worker pool is acquired per
/// invocation and torn down on every exit path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Worker pool size; 0 selects the available parallelism.
    pub workers: usize,
    /// Timeout for worker coordination, in seconds.
    pub comm_timeout_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            comm_timeout_secs: 90,
        }
    }
}

impl BatchConfig {
    pub fn validate(&self) -> Result<(), SedError> {
        if self.comm_timeout_secs == 0 {
            return Err(SedError::InvalidConfig(
                "comm_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Pool size after resolving the `0 = auto` sentinel.
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self, SedError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::BatchConfig;
    use crate::SedError;

    #[test]
    fn default_carries_the_90s_coordination_timeout() {
        let config = BatchConfig::default();
        assert_eq!(config.comm_timeout_secs, 90);
        assert!(config.validate().is_ok());
        assert!(config.effective_workers() >= 1);
    }

    #[test]
    fn explicit_worker_count_is_respected() {
        let config = BatchConfig {
            workers: 4,
            ..BatchConfig::default()
        };
        assert_eq!(config.effective_workers(), 4);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = BatchConfig {
            comm_timeout_secs: 0,
            ..BatchConfig::default()
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, SedError::InvalidConfig(_)));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config = BatchConfig::from_json_str("{\"workers\": 2}").unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.comm_timeout_secs, 90);
    }
}
