//! Unified error handling for proxycore.
//!
//! Mirrors the teacher's centralized `ProxyError` so the header filter and
//! keepalive pool don't each invent their own error type.

use std::fmt;

/// Unified error type for the header filter and keepalive pool.
#[derive(Debug)]
pub enum ProxyError {
    /// Rejected at config load time: duplicate directive, bad enum value,
    /// wildcard paired with a non-empty value, out-of-range numerics.
    Configuration(String),

    /// Runtime template evaluation failed (allocation, I/O, or the
    /// evaluator itself erroring).
    TemplateEval(String),

    /// I/O failure from a connection or socket operation.
    Io(std::io::Error),

    /// A value produced by host code failed validation (e.g. a bad `Host`
    /// header injected via `add_input_header`).
    ProtocolInvalid(String),
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyError::Configuration(msg) => write!(f, "configuration error: {msg}"),
            ProxyError::TemplateEval(msg) => write!(f, "template evaluation failed: {msg}"),
            ProxyError::Io(err) => write!(f, "I/O error: {err}"),
            ProxyError::ProtocolInvalid(msg) => write!(f, "protocol invalid: {msg}"),
        }
    }
}

impl std::error::Error for ProxyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProxyError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ProxyError {
    fn from(err: std::io::Error) -> Self {
        ProxyError::Io(err)
    }
}

/// Result type alias for proxy operations.
pub type ProxyResult<T> = std::result::Result<T, ProxyError>;

/// Helper trait for adding context to errors, mirroring the teacher's.
pub trait ErrorContext<T> {
    fn with_context(self, context: &str) -> ProxyResult<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: fmt::Display,
{
    fn with_context(self, context: &str) -> ProxyResult<T> {
        self.map_err(|e| ProxyError::TemplateEval(format!("{context}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_prefixed_by_kind() {
        let err = ProxyError::Configuration("duplicate expires".to_string());
        assert!(err.to_string().contains("configuration error"));
    }

    #[test]
    fn io_error_converts_and_keeps_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ProxyError = io_err.into();
        assert!(matches!(err, ProxyError::Io(_)));
        assert!(std::error::Error::source(&err).is_some());
    }
}
