use std::time::Duration;

use thiserror::Error;
use tracing::{error, warn};

/// Error severity for UI display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,    // Blue - informational
    Warning, // Yellow - recoverable
    Error,   // Red - operation failed
}

/// Failures reported by a history [`Store`](crate::history::Store).
///
/// `Canceled` is bookkeeping: it is produced when a search observes its
/// cancel token and is absorbed by the browser, never shown to the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("History store unavailable: {0}")]
    Unavailable(String),

    #[error("History store timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("History store operation canceled")]
    Canceled,
}

impl StoreError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Unavailable(_) => ErrorSeverity::Error,
            Self::Timeout(_) => ErrorSeverity::Warning,
            Self::Canceled => ErrorSeverity::Info,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::Unavailable(msg) => format!("History is unavailable: {}", msg),
            Self::Timeout(_) => "Loading history took too long, try again".to_string(),
            Self::Canceled => "Canceled".to_string(),
        }
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match e.sqlite_error_code() {
            Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked) => {
                // busy_timeout already elapsed inside SQLite; the exact wait is not reported
                StoreError::Timeout(Duration::ZERO)
            }
            _ => StoreError::Unavailable(e.to_string()),
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Extension trait for silent error logging with caller location tracking.
/// Use when the operation is recoverable and user doesn't need to know.
///
/// # Examples
///
/// ```ignore
/// use history_browser::error::ResultExt;
///
/// // The worker may already have exited
/// let _ = sender.send(Request::Shutdown).warn_on_err();
/// ```
pub trait ResultExt<T> {
    /// Log error with caller location and return None. Use for recoverable failures.
    fn log_err(self) -> Option<T>;
    /// Log as warning with caller location and return None. Use for expected failures.
    fn warn_on_err(self) -> Option<T>;
}

impl<T, E: std::fmt::Debug> ResultExt<T> for std::result::Result<T, E> {
    #[track_caller]
    fn log_err(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(error) => {
                let caller = std::panic::Location::caller();
                error!(
                    error = ?error,
                    file = caller.file(),
                    line = caller.line(),
                    "Operation failed"
                );
                None
            }
        }
    }

    #[track_caller]
    fn warn_on_err(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(error) => {
                let caller = std::panic::Location::caller();
                warn!(
                    error = ?error,
                    file = caller.file(),
                    line = caller.line(),
                    "Operation had warning"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_by_variant() {
        assert_eq!(
            StoreError::Unavailable("gone".into()).severity(),
            ErrorSeverity::Error
        );
        assert_eq!(
            StoreError::Timeout(Duration::from_millis(5)).severity(),
            ErrorSeverity::Warning
        );
        assert_eq!(StoreError::Canceled.severity(), ErrorSeverity::Info);
    }

    #[test]
    fn test_timeout_display_uses_millis() {
        let e = StoreError::Timeout(Duration::from_millis(1500));
        assert_eq!(e.to_string(), "History store timed out after 1500ms");
    }

    #[test]
    fn test_is_canceled() {
        assert!(StoreError::Canceled.is_canceled());
        assert!(!StoreError::Unavailable("x".into()).is_canceled());
    }

    #[test]
    fn test_sqlite_error_maps_to_unavailable() {
        let e: StoreError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(e, StoreError::Unavailable(_)));
    }

    #[test]
    fn test_log_err_returns_none_on_error() {
        let r: Result<u32, &str> = Err("boom");
        assert_eq!(r.log_err(), None);
        let ok: Result<u32, &str> = Ok(3);
        assert_eq!(ok.warn_on_err(), Some(3));
    }
}
