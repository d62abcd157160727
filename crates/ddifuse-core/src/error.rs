use std::fmt;

/// Machine-readable error codes shared by every ddifuse crate.
///
/// Recoverable kinds (`CollaboratorUnavailable`, `MalformedEvidence`,
/// `CacheCorruption`, `BudgetOverflow`) never surface as `Err` from the
/// fusion API; they are logged with their code and recorded as caveats or
/// flags. The rest propagate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    CollaboratorUnavailable,
    MalformedEvidence,
    CacheCorruption,
    CacheWriteFailed,
    BudgetOverflow,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1002",
            Self::CollaboratorUnavailable => "E2001",
            Self::MalformedEvidence => "E2002",
            Self::CacheCorruption => "E3001",
            Self::CacheWriteFailed => "E5001",
            Self::BudgetOverflow => "E6001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::CollaboratorUnavailable => "Evidence source unavailable",
            Self::MalformedEvidence => "Malformed evidence item",
            Self::CacheCorruption => "Corrupt cache entry",
            Self::CacheWriteFailed => "Cache write failed",
            Self::BudgetOverflow => "Context budget exceeded",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in .ddifuse/config.toml and retry."),
            Self::CollaboratorUnavailable => {
                Some("Check the source's availability; results fall back to remaining sources.")
            }
            Self::MalformedEvidence => None,
            Self::CacheCorruption => Some("The entry was discarded and will be rebuilt."),
            Self::CacheWriteFailed => Some("Check disk space and write permissions on the cache dir."),
            Self::BudgetOverflow => None,
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
