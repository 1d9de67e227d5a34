//! Unified error taxonomy for the client.
//!
//! Every fallible boundary in the crate returns [`CoreError`] (aliased as
//! [`CoreResult`]) so callers get one enum to match against regardless of
//! which layer — channel, router, lock — raised it.

use std::fmt;

/// Crate-wide result alias.
pub type CoreResult<T> = Result<T, CoreError>;

/// The error kinds observable at the public API boundary.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("illegal argument: {0}")]
    IllegalArgument(String),

    #[error("illegal state: {0}")]
    IllegalState(String),

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("redis server error: {0}")]
    RedisServerError(String),

    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("distributed lock error: {0}")]
    DistributedLockError(String),

    #[error("protocol error: {0}")]
    Protocol(#[from] crate::resp::RespError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

/// Severity classification used by monitor hooks to bucket counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Critical,
    Error,
    Warning,
    Info,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorSeverity::Critical => "critical",
            ErrorSeverity::Error => "error",
            ErrorSeverity::Warning => "warning",
            ErrorSeverity::Info => "info",
        };
        write!(f, "{s}")
    }
}

impl CoreError {
    pub fn illegal_argument(msg: impl Into<String>) -> Self {
        CoreError::IllegalArgument(msg.into())
    }

    pub fn illegal_state(msg: impl Into<String>) -> Self {
        CoreError::IllegalState(msg.into())
    }

    pub fn unexpected(msg: impl Into<String>) -> Self {
        CoreError::Unexpected(msg.into())
    }

    /// Whether a caller could plausibly retry this error against a
    /// different node/connection and expect a different outcome.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CoreError::Timeout(_) | CoreError::Io(_) | CoreError::IllegalState(_)
        )
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            CoreError::IllegalArgument(_) => ErrorSeverity::Warning,
            CoreError::IllegalState(_) => ErrorSeverity::Error,
            CoreError::Timeout(_) => ErrorSeverity::Warning,
            CoreError::RedisServerError(_) => ErrorSeverity::Error,
            CoreError::KeyNotFound(_) => ErrorSeverity::Info,
            CoreError::DistributedLockError(_) => ErrorSeverity::Error,
            CoreError::Protocol(_) => ErrorSeverity::Critical,
            CoreError::Io(_) => ErrorSeverity::Error,
            CoreError::Unexpected(_) => ErrorSeverity::Critical,
        }
    }

    /// Stable label for the variant, used to bucket per-host error counts
    /// in [`crate::monitor::Monitor`] without collapsing them into one
    /// aggregate count.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::IllegalArgument(_) => "illegal_argument",
            CoreError::IllegalState(_) => "illegal_state",
            CoreError::Timeout(_) => "timeout",
            CoreError::RedisServerError(_) => "redis_server_error",
            CoreError::KeyNotFound(_) => "key_not_found",
            CoreError::DistributedLockError(_) => "distributed_lock_error",
            CoreError::Protocol(_) => "protocol",
            CoreError::Io(_) => "io",
            CoreError::Unexpected(_) => "unexpected",
        }
    }

    /// True iff this is a `RedisServerError` carrying a `MOVED` or `ASK`
    /// redirection, as opposed to any other server-side error text.
    pub fn as_redirection(&self) -> Option<&str> {
        match self {
            CoreError::RedisServerError(text)
                if text.starts_with("MOVED ") || text.starts_with("ASK ") =>
            {
                Some(text)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirection_detection() {
        let e = CoreError::RedisServerError("MOVED 3999 127.0.0.1:7001".into());
        assert!(e.as_redirection().is_some());

        let e = CoreError::RedisServerError("WRONGTYPE Operation against a key".into());
        assert!(e.as_redirection().is_none());
    }

    #[test]
    fn recoverable_classification() {
        assert!(CoreError::Timeout(std::time::Duration::from_millis(1)).is_recoverable());
        assert!(!CoreError::IllegalArgument("x".into()).is_recoverable());
    }

    #[test]
    fn severity_levels() {
        assert_eq!(
            CoreError::KeyNotFound("k".into()).severity(),
            ErrorSeverity::Info
        );
        assert_eq!(
            CoreError::Unexpected("boom".into()).severity(),
            ErrorSeverity::Critical
        );
    }
}
