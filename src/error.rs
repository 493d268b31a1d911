//! Error taxonomy shared by every component of the engine.

use std::fmt;

use thiserror::Error;

/// Why an exponential search gave up before reaching a verdict.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Exhaustion {
    /// The step limit of the [`Budget`](crate::budget::Budget) was reached.
    StepLimit,
    /// The wall-clock deadline passed.
    Deadline,
    /// The caller raised the cancellation flag.
    Cancelled,
}

impl fmt::Display for Exhaustion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exhaustion::StepLimit => write!(f, "step limit reached"),
            Exhaustion::Deadline => write!(f, "deadline passed"),
            Exhaustion::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Errors produced by the engine.
///
/// `ResourceExhausted` means "could not determine" and must never be read as a negative
/// verdict.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    /// Empty profile, zero seats, more seats than candidates, unknown candidates, ...
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// A search ran out of budget before reaching a verdict.
    #[error("search budget exhausted ({reason}) after {steps} steps")]
    ResourceExhausted {
        /// Which limit was hit.
        reason: Exhaustion,
        /// Steps consumed when the search stopped.
        steps: u64,
    },
    /// Malformed profile or committee text.
    #[error("parse error on line {line}: {message}")]
    Parse {
        /// 1-based line number (0 for single-line inputs).
        line: usize,
        /// What went wrong.
        message: String,
    },
    /// Reading input failed.
    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    /// Shorthand for [`Error::InvalidConfiguration`].
    pub fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidConfiguration(message.into())
    }

    /// Returns `true` for [`Error::ResourceExhausted`].
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Error::ResourceExhausted { .. })
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_errors_are_distinguishable() {
        let e = Error::ResourceExhausted {
            reason: Exhaustion::StepLimit,
            steps: 10,
        };
        assert!(e.is_exhausted());
        assert!(!Error::invalid("zero seats").is_exhausted());
        assert!(e.to_string().contains("step limit"));
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.txt");
        let e: Error = io.into();
        assert!(matches!(e, Error::Io(ref m) if m.contains("missing.txt")));
    }
}
