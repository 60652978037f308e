//! Failure classification
//!
//! A pure mapping from what the transport observed to how the failure should
//! be treated. The classification is returned next to the fault instead of
//! being stored inside it.

use super::FetchFault;
use serde::Serialize;

/// Broad failure family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Timeout or connection failure
    TransientNetwork,
    /// Upstream overloaded, broken or returned a malformed envelope
    TransientUpstream,
    /// The query itself is unusable
    PermanentInput,
    /// Upstream rejected the request
    PermanentUpstream,
    /// Anything not recognized
    Unknown,
}

impl ErrorKind {
    /// Stable lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TransientNetwork => "transient_network",
            Self::TransientUpstream => "transient_upstream",
            Self::PermanentInput => "permanent_input",
            Self::PermanentUpstream => "permanent_upstream",
            Self::Unknown => "unknown",
        }
    }
}

/// How loudly a failure should be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Expected outcome, e.g. bad user input
    Info,
    /// Degraded but likely to recover
    Warning,
    /// Needs attention
    Error,
}

/// Classification attached to every failed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ErrorClassification {
    /// Failure family
    pub kind: ErrorKind,
    /// Whether retrying may succeed
    pub retryable: bool,
    /// Reporting severity
    pub severity: Severity,
}

impl ErrorClassification {
    const fn new(kind: ErrorKind, retryable: bool, severity: Severity) -> Self {
        Self {
            kind,
            retryable,
            severity,
        }
    }
}

/// Classify a transport fault. Total over [`FetchFault`].
///
/// ```
/// use platebot_core::upstream::{classify, ErrorKind, FetchFault};
///
/// let c = classify(&FetchFault::Status(503));
/// assert_eq!(c.kind, ErrorKind::TransientUpstream);
/// assert!(c.retryable);
/// assert!(!classify(&FetchFault::Status(400)).retryable);
/// ```
#[must_use]
pub fn classify(fault: &FetchFault) -> ErrorClassification {
    use ErrorKind::{PermanentInput, PermanentUpstream, TransientNetwork, TransientUpstream, Unknown};

    match fault {
        FetchFault::Timeout => ErrorClassification::new(TransientNetwork, true, Severity::Warning),
        FetchFault::Unreachable(_) => ErrorClassification::new(TransientNetwork, true, Severity::Error),
        FetchFault::Status(429) => ErrorClassification::new(TransientUpstream, true, Severity::Warning),
        FetchFault::Status(500..=599) => {
            ErrorClassification::new(TransientUpstream, true, Severity::Error)
        }
        FetchFault::Status(400..=499) => {
            ErrorClassification::new(PermanentUpstream, false, Severity::Info)
        }
        // Retried like a transient fault up to the attempt budget
        FetchFault::InvalidResponse(_) => {
            ErrorClassification::new(TransientUpstream, true, Severity::Error)
        }
        FetchFault::InvalidInput(_) => ErrorClassification::new(PermanentInput, false, Severity::Info),
        FetchFault::Status(_) | FetchFault::Other(_) => {
            ErrorClassification::new(Unknown, false, Severity::Error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy() {
        let cases = [
            (FetchFault::Timeout, ErrorKind::TransientNetwork, true, Severity::Warning),
            (
                FetchFault::Unreachable("refused".into()),
                ErrorKind::TransientNetwork,
                true,
                Severity::Error,
            ),
            (FetchFault::Status(500), ErrorKind::TransientUpstream, true, Severity::Error),
            (FetchFault::Status(503), ErrorKind::TransientUpstream, true, Severity::Error),
            (FetchFault::Status(429), ErrorKind::TransientUpstream, true, Severity::Warning),
            (FetchFault::Status(400), ErrorKind::PermanentUpstream, false, Severity::Info),
            (FetchFault::Status(404), ErrorKind::PermanentUpstream, false, Severity::Info),
            (
                FetchFault::InvalidResponse("success=false".into()),
                ErrorKind::TransientUpstream,
                true,
                Severity::Error,
            ),
            (
                FetchFault::InvalidInput("empty".into()),
                ErrorKind::PermanentInput,
                false,
                Severity::Info,
            ),
            (FetchFault::Status(302), ErrorKind::Unknown, false, Severity::Error),
            (FetchFault::Other("tls".into()), ErrorKind::Unknown, false, Severity::Error),
        ];

        for (fault, kind, retryable, severity) in cases {
            let c = classify(&fault);
            assert_eq!(c.kind, kind, "{fault:?}");
            assert_eq!(c.retryable, retryable, "{fault:?}");
            assert_eq!(c.severity, severity, "{fault:?}");
        }
    }

    #[test]
    fn test_classification_is_deterministic() {
        let fault = FetchFault::Status(502);
        assert_eq!(classify(&fault), classify(&fault));
    }
}
