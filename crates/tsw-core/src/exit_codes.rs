//! Exit codes for the `tsw` binary.
//!
//! - 0-9: push outcomes
//! - 10-19: input, schema and configuration errors
//! - 20-29: internal and I/O errors

use tsw_common::{Error, ErrorCategory};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Push accepted, or config valid.
    Clean = 0,
    /// Store still busy after all retries.
    StoreBusy = 3,
    /// Store rejected the push.
    StoreRejected = 4,

    ArgsError = 10,
    ConfigError = 11,
    /// Data cannot be converted into the declared column types.
    ConversionError = 12,
    SchemaError = 13,

    InternalError = 20,
    IoError = 21,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        self == ExitCode::Clean
    }

    pub fn from_error(err: &Error) -> Self {
        match err {
            Error::TransientStore { .. } => ExitCode::StoreBusy,
            Error::TerminalStore { .. } => ExitCode::StoreRejected,
            Error::TableNotFound { .. } => ExitCode::SchemaError,
            Error::RetriesExhausted => ExitCode::InternalError,
            Error::Json(_) => ExitCode::ArgsError,
            _ => match err.category() {
                ErrorCategory::Conversion => ExitCode::ConversionError,
                ErrorCategory::Argument => ExitCode::ArgsError,
                ErrorCategory::Config => ExitCode::ConfigError,
                ErrorCategory::Io => ExitCode::IoError,
                ErrorCategory::Store => ExitCode::StoreRejected,
            },
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code.as_i32()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        let busy = Error::TransientStore {
            status: "try again".into(),
            attempts: 3,
        };
        assert_eq!(ExitCode::from_error(&busy), ExitCode::StoreBusy);
        assert_eq!(
            ExitCode::from_error(&Error::IncompatibleType("x".into())),
            ExitCode::ConversionError
        );
        assert_eq!(
            ExitCode::from_error(&Error::Config("x".into())),
            ExitCode::ConfigError
        );
        assert_eq!(
            ExitCode::from_error(&Error::InvalidArgument("x".into())),
            ExitCode::ArgsError
        );
    }

    #[test]
    fn test_only_clean_is_success() {
        assert!(ExitCode::Clean.is_success());
        assert!(!ExitCode::StoreBusy.is_success());
        assert_eq!(i32::from(ExitCode::IoError), 21);
    }
}
