use thiserror::Error;

use crate::collab::LoaderError;

/// Outcome of a session operation.
///
/// `Success` doubles as the liveness flag of a [`crate::System`]: anything else means no program is
/// loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ResultStatus {
    #[error("success")]
    Success,

    #[error("shutdown requested")]
    ShutdownRequested,

    #[error("system is not initialized")]
    ErrorNotInitialized,

    #[error("no loader accepts the file")]
    ErrorGetLoader,

    #[error("failed to determine the system mode")]
    ErrorSystemMode,

    #[error("failed to load the program")]
    ErrorLoader,

    #[error("program is encrypted")]
    ErrorLoaderErrorEncrypted,

    #[error("program has an invalid format")]
    ErrorLoaderErrorInvalidFormat,

    #[error("system files are missing")]
    ErrorSystemFiles,

    #[error("video core failed to initialize")]
    ErrorVideoCore,

    #[error("video core failed to initialize: generic graphics drivers")]
    ErrorVideoCoreErrorGenericDrivers,

    #[error("video core failed to initialize: OpenGL 3.3 is not supported")]
    ErrorVideoCoreErrorBelowGl33,

    #[error("unknown error")]
    ErrorUnknown,
}

impl ResultStatus {
    pub fn is_success(self) -> bool {
        self == ResultStatus::Success
    }

    /// Status for a loader failure while determining the system mode.
    pub fn from_system_mode_error(err: &LoaderError) -> Self {
        match err {
            LoaderError::Encrypted => ResultStatus::ErrorLoaderErrorEncrypted,
            LoaderError::InvalidFormat => ResultStatus::ErrorLoaderErrorInvalidFormat,
            LoaderError::Other(_) => ResultStatus::ErrorSystemMode,
        }
    }

    /// Status for a loader failure while loading the program into the kernel.
    pub fn from_load_error(err: &LoaderError) -> Self {
        match err {
            LoaderError::Encrypted => ResultStatus::ErrorLoaderErrorEncrypted,
            LoaderError::InvalidFormat => ResultStatus::ErrorLoaderErrorInvalidFormat,
            LoaderError::Other(_) => ResultStatus::ErrorLoader,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn loader_errors_map_by_phase() {
        assert_eq!(
            ResultStatus::from_system_mode_error(&LoaderError::Encrypted),
            ResultStatus::ErrorLoaderErrorEncrypted
        );
        assert_eq!(
            ResultStatus::from_system_mode_error(&LoaderError::Other(7)),
            ResultStatus::ErrorSystemMode
        );
        assert_eq!(
            ResultStatus::from_load_error(&LoaderError::InvalidFormat),
            ResultStatus::ErrorLoaderErrorInvalidFormat
        );
        assert_eq!(
            ResultStatus::from_load_error(&LoaderError::Other(7)),
            ResultStatus::ErrorLoader
        );
    }

    #[test]
    fn only_success_is_live() {
        assert!(ResultStatus::Success.is_success());
        assert!(!ResultStatus::ShutdownRequested.is_success());
        assert_eq!(ResultStatus::ErrorGetLoader.to_string(), "no loader accepts the file");
    }
}
