use citrine_timing::MAX_SLICE_LENGTH;
use thiserror::Error;

/// Catch-up threshold, in ticks. A core further behind the global clock than this runs alone.
pub const CATCH_UP_THRESHOLD: u64 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SchedulerConfigError {
    #[error("max_slice_length must be non-zero")]
    ZeroSliceLength,
}

/// Tunables of the round scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Upper bound on a synchronized round, in ticks.
    pub max_slice_length: u64,
    /// Largest lag behind the global clock that a synchronized round tolerates.
    pub catch_up_threshold: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_slice_length: MAX_SLICE_LENGTH,
            catch_up_threshold: CATCH_UP_THRESHOLD,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), SchedulerConfigError> {
        if self.max_slice_length == 0 {
            return Err(SchedulerConfigError::ZeroSliceLength);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_are_valid() {
        let config = SchedulerConfig::default();
        assert_eq!(config.max_slice_length, 20_000);
        assert_eq!(config.catch_up_threshold, 4096);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn zero_slice_is_rejected() {
        let config = SchedulerConfig {
            max_slice_length: 0,
            ..SchedulerConfig::default()
        };
        assert_eq!(config.validate(), Err(SchedulerConfigError::ZeroSliceLength));
    }
}
