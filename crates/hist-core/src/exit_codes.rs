//! Exit codes for the `historian` CLI.
//!
//! Stable; scripts may rely on them without parsing output.

use hist_common::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success
    Clean = 0,

    /// At least one ingest batch was not acknowledged and must be redelivered
    BatchNotAcknowledged = 2,

    /// Configuration error
    ConfigError = 10,

    /// Storage unreachable or failing
    StorageError = 11,

    /// Bad input: unreadable file, malformed record, bad query argument
    InputError = 12,

    /// Internal/unknown error
    InternalError = 99,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Clean)
    }

    /// Check if this exit code indicates an error requiring attention.
    pub fn is_error(self) -> bool {
        (self as i32) >= 10
    }
}

impl From<&Error> for ExitCode {
    fn from(err: &Error) -> Self {
        match err {
            Error::Config(_) => ExitCode::ConfigError,
            Error::InvalidTimestamp(_)
            | Error::InvalidQuery(_)
            | Error::InvalidTopic(_)
            | Error::InvalidRecord(_)
            | Error::Io(_)
            | Error::Json(_) => ExitCode::InputError,
            Error::Connectivity(_) | Error::Storage(_) | Error::CorruptRow(_) | Error::NotReady(_) => {
                ExitCode::StorageError
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        assert_eq!(ExitCode::from(&Error::Config("x".into())), ExitCode::ConfigError);
        assert_eq!(
            ExitCode::from(&Error::InvalidTimestamp("x".into())),
            ExitCode::InputError
        );
        assert_eq!(
            ExitCode::from(&Error::Connectivity("x".into())),
            ExitCode::StorageError
        );
    }

    #[test]
    fn test_classification() {
        assert!(ExitCode::Clean.is_success());
        assert!(!ExitCode::BatchNotAcknowledged.is_success());
        assert!(!ExitCode::BatchNotAcknowledged.is_error());
        assert!(ExitCode::InternalError.is_error());
        assert_eq!(ExitCode::InputError.as_i32(), 12);
    }
}
