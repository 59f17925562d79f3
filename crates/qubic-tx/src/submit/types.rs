//! Submission stages, errors, and receipts.

use std::fmt;

use thiserror::Error;

use crate::{
    builder::BuilderError, codec::CodecError, error::ErrorKind, rpc::TransportError,
    signing::SigningError,
};

/// Stage of one submission attempt.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum SubmitStage {
    /// Request received, nothing sent yet.
    Idle,
    /// Current tick read from the network.
    TickRead,
    /// Contract call encoded.
    PayloadBuilt,
    /// Envelope built and signed.
    TransactionSigned,
    /// Broadcast in flight.
    Broadcasting,
    /// Network acknowledged the transaction.
    Confirmed,
    /// Attempt ended with an error.
    Failed,
}

impl SubmitStage {
    /// Returns true for `Confirmed` and `Failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }

    /// Stable label used in log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::TickRead => "tick_read",
            Self::PayloadBuilt => "payload_built",
            Self::TransactionSigned => "transaction_signed",
            Self::Broadcasting => "broadcasting",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SubmitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Submission-level errors. Every variant ends the attempt.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum SubmitError {
    /// Caller-supplied fields were rejected before any network call.
    #[error("invalid submission request: {source}")]
    InvalidRequest {
        /// Builder-layer validation failure.
        source: BuilderError,
    },
    /// Seed-derived key does not belong to the source identity.
    #[error("signer does not match source identity: {source}")]
    SignerMismatch {
        /// Signing-layer failure.
        source: SigningError,
    },
    /// Current tick could not be read.
    #[error("failed to read current tick: {source}")]
    TickRead {
        /// Transport failure.
        source: TransportError,
    },
    /// Current tick plus offset does not fit in a tick.
    #[error("target tick overflows: current tick {current_tick} + offset {offset}")]
    TickOverflow {
        /// Tick read from the network.
        current_tick: u32,
        /// Configured offset.
        offset: u32,
    },
    /// Contract call could not be encoded.
    #[error("failed to encode contract call: {source}")]
    Encode {
        /// Codec failure.
        source: CodecError,
    },
    /// Envelope could not be built or signed.
    #[error("failed to build/sign transaction: {source}")]
    Build {
        /// Builder-layer failure.
        source: BuilderError,
    },
    /// Broadcast failed or was refused.
    #[error("broadcast failed: {source}")]
    Broadcast {
        /// Transport failure.
        source: TransportError,
    },
}

impl SubmitError {
    /// Returns the error kind, passing through the underlying layer's kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRequest { source } | Self::Build { source } => source.kind(),
            Self::SignerMismatch { source } => source.kind(),
            Self::TickRead { source } | Self::Broadcast { source } => source.kind(),
            Self::TickOverflow { .. } => ErrorKind::Validation,
            Self::Encode { source } => source.kind(),
        }
    }

    /// Last stage reached before the attempt failed.
    #[must_use]
    pub const fn failed_stage(&self) -> SubmitStage {
        match self {
            Self::InvalidRequest { .. } | Self::SignerMismatch { .. } | Self::TickRead { .. } => {
                SubmitStage::Idle
            }
            Self::TickOverflow { .. } | Self::Encode { .. } => SubmitStage::TickRead,
            Self::Build { .. } => SubmitStage::PayloadBuilt,
            Self::Broadcast { .. } => SubmitStage::Broadcasting,
        }
    }

    /// Returns true when the transaction may have reached the network.
    #[must_use]
    pub const fn may_have_broadcast(&self) -> bool {
        matches!(self, Self::Broadcast { .. })
    }
}

/// Summary of a confirmed submission.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SubmitReceipt {
    /// Identifier the network returned for the transaction.
    pub transaction_id: String,
    /// Tick carried in the signed envelope.
    pub scheduled_tick: u32,
    /// Tick observed when the attempt started.
    pub observed_tick: u32,
    /// Id computed locally from the signed bytes.
    pub local_transaction_id: String,
    /// Relay fan-out reported by the gateway.
    pub peers_broadcasted: Option<u32>,
}

/// Tracks the stage of one attempt and logs transitions.
#[derive(Debug)]
pub(crate) struct SubmitAttempt {
    /// Current stage.
    stage: SubmitStage,
}

impl SubmitAttempt {
    /// Starts an attempt in [`SubmitStage::Idle`].
    pub(crate) const fn start() -> Self {
        Self {
            stage: SubmitStage::Idle,
        }
    }

    /// Returns the current stage.
    pub(crate) const fn stage(&self) -> SubmitStage {
        self.stage
    }

    /// Moves to `next`.
    pub(crate) fn advance(&mut self, next: SubmitStage) {
        tracing::debug!(from = %self.stage, to = %next, "submission stage");
        self.stage = next;
    }

    /// Moves to [`SubmitStage::Failed`] and hands the error back.
    pub(crate) fn fail(&mut self, error: SubmitError) -> SubmitError {
        tracing::warn!(
            stage = %self.stage,
            kind = %error.kind(),
            error = %error,
            "submission failed"
        );
        self.stage = SubmitStage::Failed;
        error
    }
}
