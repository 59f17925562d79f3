//! Error kinds shared by every layer of the client.

use std::fmt;

/// Coarse failure class every layer-specific error maps onto.
///
/// Callers that only need to decide on retry or messaging policy can match on this instead of
/// the per-layer enums.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    /// Transport, connectivity, or non-success status on a read path.
    Network,
    /// Response arrived but did not have the expected structure.
    MalformedResponse,
    /// Query response carried no `responseData` field.
    MissingResponseData,
    /// Caller-supplied value violates a width, range, or shape invariant.
    Validation,
    /// Contract call payload could not be encoded.
    Encoding,
    /// Key derivation or signing failed.
    Signing,
    /// The network explicitly refused the transaction.
    Rejected,
}

impl ErrorKind {
    /// Returns a stable lowercase label, used in log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::MalformedResponse => "malformed_response",
            Self::MissingResponseData => "missing_response_data",
            Self::Validation => "validation",
            Self::Encoding => "encoding",
            Self::Signing => "signing",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
