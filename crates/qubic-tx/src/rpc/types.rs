//! Shared transport types, errors, and transport traits.

use async_trait::async_trait;
use thiserror::Error;

use crate::{builder::SignedTransaction, error::ErrorKind, query::ContractQuery};

/// Low-level transport errors surfaced by gateway backends.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum TransportError {
    /// Invalid transport configuration.
    #[error("transport configuration invalid: {message}")]
    Config {
        /// Human-readable description.
        message: String,
    },
    /// Request could not be sent or the response body could not be read.
    #[error("request to `{endpoint}` failed: {message}")]
    Network {
        /// Gateway path.
        endpoint: &'static str,
        /// Human-readable description.
        message: String,
    },
    /// Read endpoint answered with a non-success status.
    #[error("`{endpoint}` returned status {status} {reason}")]
    Status {
        /// Gateway path.
        endpoint: &'static str,
        /// HTTP status code.
        status: u16,
        /// Canonical status text.
        reason: String,
    },
    /// Broadcast endpoint refused the transaction.
    #[error("transaction rejected with status {status} {reason}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Canonical status text.
        reason: String,
        /// Response body, possibly empty.
        body: String,
    },
    /// Response body did not match the expected schema.
    #[error("`{endpoint}` returned a malformed response: {message}")]
    MalformedResponse {
        /// Gateway path.
        endpoint: &'static str,
        /// Human-readable description.
        message: String,
    },
    /// Query response carried no `responseData` field.
    #[error("contract query response has no responseData")]
    MissingResponseData,
}

impl TransportError {
    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Config { .. } | Self::Network { .. } | Self::Status { .. } => {
                ErrorKind::Network
            }
            Self::Rejected { .. } => ErrorKind::Rejected,
            Self::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            Self::MissingResponseData => ErrorKind::MissingResponseData,
        }
    }
}

/// Acknowledgement returned for an accepted broadcast.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct BroadcastAck {
    /// Identifier the network assigned to the transaction.
    pub transaction_id: String,
    /// Number of peers the gateway relayed the transaction to, when reported.
    pub peers_broadcasted: Option<u32>,
}

/// Broadcast transport interface.
#[async_trait]
pub trait BroadcastTransport: Send + Sync {
    /// Submits one signed transaction and returns the acknowledgement.
    async fn broadcast(&self, tx: &SignedTransaction) -> Result<BroadcastAck, TransportError>;
}

/// Read-only contract query transport interface.
#[async_trait]
pub trait ContractQueryTransport: Send + Sync {
    /// Runs one query and returns the base64-decoded response bytes.
    async fn query_contract(&self, query: &ContractQuery) -> Result<Vec<u8>, TransportError>;
}
