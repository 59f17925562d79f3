//! Submission client: tick read, build, sign, broadcast.

use std::sync::Arc;

use super::types::{SubmitAttempt, SubmitError, SubmitReceipt, SubmitStage};
use crate::{
    builder::{BuilderError, SignedTransaction, TxBuilder},
    codec::{ContractCall, MAX_INPUT_SIZE, encode},
    config::{ClientConfig, DEFAULT_TICK_OFFSET},
    identity::{Identity, Seed},
    providers::TickSource,
    rpc::{BroadcastTransport, HttpRpcTransport, TransportError},
    signing::{SeedSigner, SigningError, TransactionSigner},
};

/// Schedules, signs, and broadcasts contract-call transactions.
///
/// Each call reads its own tick; the client holds no state between calls.
pub struct SubmitClient {
    /// Source of the current network tick.
    tick_source: Arc<dyn TickSource>,
    /// Transport that relays signed transactions.
    broadcaster: Arc<dyn BroadcastTransport>,
    /// Ticks added to the observed tick.
    tick_offset: u32,
}

impl SubmitClient {
    /// Creates a client with the default scheduling offset.
    #[must_use]
    pub fn new(tick_source: Arc<dyn TickSource>, broadcaster: Arc<dyn BroadcastTransport>) -> Self {
        Self {
            tick_source,
            broadcaster,
            tick_offset: DEFAULT_TICK_OFFSET,
        }
    }

    /// Creates a client backed by one HTTP gateway.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Config`] when the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self, TransportError> {
        let config = config.clone().normalized();
        let transport = Arc::new(HttpRpcTransport::from_config(&config)?);
        Ok(Self::new(transport.clone(), transport).with_tick_offset(config.tick_offset))
    }

    /// Sets the scheduling offset. Zero is raised to one.
    #[must_use]
    pub fn with_tick_offset(mut self, tick_offset: u32) -> Self {
        self.tick_offset = tick_offset.max(1);
        self
    }

    /// Returns the scheduling offset.
    #[must_use]
    pub const fn tick_offset(&self) -> u32 {
        self.tick_offset
    }

    /// Submits `call` from `source` to `destination`, signing with a key derived from `seed`.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError`] naming the failed stage. Request validation failures never
    /// reach the network.
    pub async fn submit<C>(
        &self,
        call: &C,
        source: &Identity,
        seed: &Seed,
        destination: &Identity,
        amount: i64,
    ) -> Result<SubmitReceipt, SubmitError>
    where
        C: ContractCall + Sync,
    {
        let signer = SeedSigner::from_seed(seed);
        self.submit_with_signer(call, source, &signer, destination, amount)
            .await
    }

    /// Same as [`Self::submit`] with a caller-provided signer.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError`] naming the failed stage.
    pub async fn submit_with_signer<C>(
        &self,
        call: &C,
        source: &Identity,
        signer: &dyn TransactionSigner,
        destination: &Identity,
        amount: i64,
    ) -> Result<SubmitReceipt, SubmitError>
    where
        C: ContractCall + Sync,
    {
        let mut attempt = SubmitAttempt::start();
        if let Err(error) = validate_request(source, signer, amount, C::ABI_SIZE) {
            return Err(attempt.fail(error));
        }

        let observed_tick = match self.tick_source.current_tick().await {
            Ok(tick) => tick,
            Err(source) => return Err(attempt.fail(SubmitError::TickRead { source })),
        };
        attempt.advance(SubmitStage::TickRead);
        let Some(target_tick) = observed_tick.checked_add(self.tick_offset) else {
            return Err(attempt.fail(SubmitError::TickOverflow {
                current_tick: observed_tick,
                offset: self.tick_offset,
            }));
        };
        tracing::debug!(tick = observed_tick, target_tick, "scheduling transaction");

        let payload = match encode(call) {
            Ok(payload) => payload,
            Err(source) => return Err(attempt.fail(SubmitError::Encode { source })),
        };
        attempt.advance(SubmitStage::PayloadBuilt);

        let signed = TxBuilder::new(*source)
            .destination(*destination)
            .amount(amount)
            .tick(target_tick)
            .input_type(C::INPUT_TYPE)
            .input_size(C::ABI_SIZE)
            .payload(payload)
            .build_and_sign(signer);
        let signed = match signed {
            Ok(signed) => signed,
            Err(source) => return Err(attempt.fail(SubmitError::Build { source })),
        };
        attempt.advance(SubmitStage::TransactionSigned);

        self.broadcast_signed(attempt, signed, observed_tick).await
    }

    /// Broadcasts an externally built transaction.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::Broadcast`] when the gateway fails or refuses the transaction.
    pub async fn submit_signed(
        &self,
        signed: SignedTransaction,
    ) -> Result<SubmitReceipt, SubmitError> {
        let mut attempt = SubmitAttempt::start();
        attempt.advance(SubmitStage::TransactionSigned);
        let tick = signed.tick();
        self.broadcast_signed(attempt, signed, tick).await
    }

    /// Runs the broadcast stage and assembles the receipt.
    async fn broadcast_signed(
        &self,
        mut attempt: SubmitAttempt,
        signed: SignedTransaction,
        observed_tick: u32,
    ) -> Result<SubmitReceipt, SubmitError> {
        attempt.advance(SubmitStage::Broadcasting);
        let local_transaction_id = signed.transaction_id();
        let ack = match self.broadcaster.broadcast(&signed).await {
            Ok(ack) => ack,
            Err(source) => return Err(attempt.fail(SubmitError::Broadcast { source })),
        };
        attempt.advance(SubmitStage::Confirmed);
        if ack.transaction_id != local_transaction_id {
            tracing::debug!(
                transaction_id = %ack.transaction_id,
                local_transaction_id = %local_transaction_id,
                "gateway id differs from locally computed id"
            );
        }
        tracing::info!(
            transaction_id = %ack.transaction_id,
            tick = signed.tick(),
            stage = %attempt.stage(),
            "transaction broadcast"
        );
        Ok(SubmitReceipt {
            transaction_id: ack.transaction_id,
            scheduled_tick: signed.tick(),
            observed_tick,
            local_transaction_id,
            peers_broadcasted: ack.peers_broadcasted,
        })
    }
}

impl std::fmt::Debug for SubmitClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmitClient")
            .field("tick_offset", &self.tick_offset)
            .finish_non_exhaustive()
    }
}

/// Checks caller-supplied fields before any network call.
fn validate_request(
    source: &Identity,
    signer: &dyn TransactionSigner,
    amount: i64,
    input_size: usize,
) -> Result<(), SubmitError> {
    if amount < 0 {
        return Err(SubmitError::InvalidRequest {
            source: BuilderError::NegativeAmount { amount },
        });
    }
    if input_size > MAX_INPUT_SIZE {
        return Err(SubmitError::InvalidRequest {
            source: BuilderError::PayloadTooLarge { len: input_size },
        });
    }
    let signer_identity = signer.identity();
    if signer_identity != *source {
        return Err(SubmitError::SignerMismatch {
            source: SigningError::KeyMismatch {
                expected: *source,
                actual: signer_identity,
            },
        });
    }
    Ok(())
}
