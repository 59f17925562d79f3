//! Transaction envelope builder and wire serialization.
//!
//! Wire layout, all integers little-endian:
//! source key (32) | destination key (32) | amount i64 (8) | tick u32 (4) |
//! input type u16 (2) | input size u16 (2) | payload (input size) | signature (64).
//!
//! The signature covers the K12 digest of everything before it.

use thiserror::Error;

use crate::{
    codec::{CodecError, ContractCall, MAX_INPUT_SIZE, Payload, PayloadReader, encode},
    digest::{DIGEST_LEN, k12},
    error::ErrorKind,
    identity::{Identity, PUBLIC_KEY_LEN, Seed},
    signing::{SIGNATURE_LEN, SeedSigner, SigningError, TransactionSigner},
};

/// Bytes preceding the payload.
pub const HEADER_LEN: usize = PUBLIC_KEY_LEN * 2 + 8 + 4 + 2 + 2;

/// Builder-layer errors.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum BuilderError {
    /// No destination identity was set.
    #[error("transaction destination is not set")]
    MissingDestination,
    /// No target tick was set.
    #[error("transaction tick is not set")]
    MissingTick,
    /// Amount cannot be negative.
    #[error("amount {amount} is negative")]
    NegativeAmount {
        /// Rejected amount.
        amount: i64,
    },
    /// Declared input size differs from the payload length.
    #[error("input size {declared} does not match payload length {actual}")]
    InputSizeMismatch {
        /// Declared input size.
        declared: usize,
        /// Actual payload length.
        actual: usize,
    },
    /// Payload exceeds [`MAX_INPUT_SIZE`].
    #[error("payload of {len} bytes exceeds maximum input size {MAX_INPUT_SIZE}")]
    PayloadTooLarge {
        /// Payload length.
        len: usize,
    },
    /// Contract call could not be encoded.
    #[error("failed to encode contract call: {source}")]
    Encode {
        /// Codec-layer failure.
        source: CodecError,
    },
    /// Signing failed.
    #[error("failed to sign transaction: {source}")]
    SignTransaction {
        /// Signer-level failure.
        source: SigningError,
    },
    /// Signed bytes are not a well-formed envelope.
    #[error("malformed signed transaction: {source}")]
    MalformedEnvelope {
        /// Decode failure.
        source: CodecError,
    },
    /// Signed bytes continue past the signature.
    #[error("signed transaction has {extra} trailing bytes")]
    TrailingBytes {
        /// Number of unexpected bytes.
        extra: usize,
    },
}

impl BuilderError {
    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Encode { .. } => ErrorKind::Encoding,
            Self::SignTransaction { .. } => ErrorKind::Signing,
            Self::MissingDestination
            | Self::MissingTick
            | Self::NegativeAmount { .. }
            | Self::InputSizeMismatch { .. }
            | Self::PayloadTooLarge { .. }
            | Self::MalformedEnvelope { .. }
            | Self::TrailingBytes { .. } => ErrorKind::Validation,
        }
    }
}

/// Validated transaction fields, before or after signing.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TransactionEnvelope {
    /// Paying and signing identity.
    pub source: Identity,
    /// Receiving identity or contract address.
    pub destination: Identity,
    /// Transferred amount in network units.
    pub amount: i64,
    /// Tick the transaction is scheduled for.
    pub tick: u32,
    /// Contract procedure selector.
    pub input_type: u16,
    /// Call arguments.
    pub payload: Payload,
}

impl TransactionEnvelope {
    /// Payload length as carried on the wire.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::PayloadTooLarge`] when the payload exceeds [`MAX_INPUT_SIZE`].
    pub fn input_size(&self) -> Result<u16, BuilderError> {
        let len = self.payload.len();
        if len > MAX_INPUT_SIZE {
            return Err(BuilderError::PayloadTooLarge { len });
        }
        u16::try_from(len).map_err(|_| BuilderError::PayloadTooLarge { len })
    }

    /// Serializes every field the signature covers.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::PayloadTooLarge`] when the payload exceeds [`MAX_INPUT_SIZE`].
    pub fn encode_unsigned(&self) -> Result<Vec<u8>, BuilderError> {
        let input_size = self.input_size()?;
        let mut bytes = Vec::with_capacity(
            HEADER_LEN
                .saturating_add(self.payload.len())
                .saturating_add(SIGNATURE_LEN),
        );
        bytes.extend_from_slice(self.source.as_bytes());
        bytes.extend_from_slice(self.destination.as_bytes());
        bytes.extend_from_slice(&self.amount.to_le_bytes());
        bytes.extend_from_slice(&self.tick.to_le_bytes());
        bytes.extend_from_slice(&self.input_type.to_le_bytes());
        bytes.extend_from_slice(&input_size.to_le_bytes());
        bytes.extend_from_slice(self.payload.as_bytes());
        Ok(bytes)
    }
}

/// Envelope serialized and ready to sign.
#[derive(Debug, Clone)]
pub struct UnsignedTx {
    /// Validated fields.
    envelope: TransactionEnvelope,
    /// Serialized unsigned bytes.
    bytes: Vec<u8>,
}

impl UnsignedTx {
    /// Returns the envelope fields.
    #[must_use]
    pub const fn envelope(&self) -> &TransactionEnvelope {
        &self.envelope
    }

    /// Returns the serialized bytes the signature covers.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Digest handed to the signer.
    #[must_use]
    pub fn digest(&self) -> [u8; DIGEST_LEN] {
        k12(&self.bytes)
    }

    /// Signs the envelope.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::SignTransaction`] when the signer key is not the source key or
    /// the signature primitive fails.
    pub fn sign(self, signer: &dyn TransactionSigner) -> Result<SignedTransaction, BuilderError> {
        let signer_identity = signer.identity();
        if signer_identity != self.envelope.source {
            return Err(BuilderError::SignTransaction {
                source: SigningError::KeyMismatch {
                    expected: self.envelope.source,
                    actual: signer_identity,
                },
            });
        }
        let signature = signer
            .sign_digest(&self.digest())
            .map_err(|source| BuilderError::SignTransaction { source })?;
        let mut bytes = self.bytes;
        bytes.extend_from_slice(&signature);
        Ok(SignedTransaction {
            envelope: self.envelope,
            signature,
            bytes,
        })
    }
}

/// Signed transaction in wire form.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SignedTransaction {
    /// Fields covered by the signature.
    envelope: TransactionEnvelope,
    /// Signature over the unsigned digest.
    signature: [u8; SIGNATURE_LEN],
    /// Full wire bytes including the signature.
    bytes: Vec<u8>,
}

impl SignedTransaction {
    /// Parses externally signed wire bytes.
    ///
    /// Only the structure is checked; the signature is not verified.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::MalformedEnvelope`] for truncated input,
    /// [`BuilderError::PayloadTooLarge`] for an out-of-range input size, and
    /// [`BuilderError::TrailingBytes`] when bytes follow the signature.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, BuilderError> {
        let malformed = |source| BuilderError::MalformedEnvelope { source };
        let mut reader = PayloadReader::new(&bytes);
        let source = Identity::from_bytes(reader.read_array().map_err(malformed)?);
        let destination = Identity::from_bytes(reader.read_array().map_err(malformed)?);
        let amount = reader.read_i64().map_err(malformed)?;
        let tick = reader.read_u32().map_err(malformed)?;
        let input_type = reader.read_u16().map_err(malformed)?;
        let input_size = usize::from(reader.read_u16().map_err(malformed)?);
        if input_size > MAX_INPUT_SIZE {
            return Err(BuilderError::PayloadTooLarge { len: input_size });
        }
        let payload_start = reader.offset();
        reader.skip(input_size).map_err(malformed)?;
        let payload = bytes
            .get(payload_start..reader.offset())
            .map(<[u8]>::to_vec)
            .unwrap_or_default();
        let signature = reader.read_array::<SIGNATURE_LEN>().map_err(malformed)?;
        let extra = bytes.len().saturating_sub(reader.offset());
        if extra > 0 {
            return Err(BuilderError::TrailingBytes { extra });
        }
        if amount < 0 {
            return Err(BuilderError::NegativeAmount { amount });
        }
        Ok(Self {
            envelope: TransactionEnvelope {
                source,
                destination,
                amount,
                tick,
                input_type,
                payload: Payload::from_bytes(payload),
            },
            signature,
            bytes,
        })
    }

    /// Returns the signed fields.
    #[must_use]
    pub const fn envelope(&self) -> &TransactionEnvelope {
        &self.envelope
    }

    /// Tick the transaction is scheduled for.
    #[must_use]
    pub const fn tick(&self) -> u32 {
        self.envelope.tick
    }

    /// Returns the signature bytes.
    #[must_use]
    pub const fn signature(&self) -> &[u8; SIGNATURE_LEN] {
        &self.signature
    }

    /// Returns the full wire bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the transaction and returns its wire bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Digest the signature was computed over.
    #[must_use]
    pub fn signing_digest(&self) -> [u8; DIGEST_LEN] {
        let unsigned_len = self.bytes.len().saturating_sub(SIGNATURE_LEN);
        k12(self.bytes.get(..unsigned_len).unwrap_or_default())
    }

    /// Transaction id as the network displays it: the lowercase rendering of the K12 digest of
    /// the signed bytes.
    #[must_use]
    pub fn transaction_id(&self) -> String {
        Identity::digest_display(&k12(&self.bytes))
    }
}

/// Builder for one transaction envelope.
#[derive(Debug, Clone)]
pub struct TxBuilder {
    /// Paying and signing identity.
    source: Identity,
    /// Receiving identity.
    destination: Option<Identity>,
    /// Transferred amount.
    amount: i64,
    /// Target tick.
    tick: Option<u32>,
    /// Contract procedure selector.
    input_type: u16,
    /// Explicit input size, checked against the payload when set.
    input_size: Option<usize>,
    /// Call arguments.
    payload: Payload,
}

impl TxBuilder {
    /// Creates a builder for a source identity.
    #[must_use]
    pub const fn new(source: Identity) -> Self {
        Self {
            source,
            destination: None,
            amount: 0,
            tick: None,
            input_type: 0,
            input_size: None,
            payload: Payload::empty(),
        }
    }

    /// Sets the destination identity.
    #[must_use]
    pub const fn destination(mut self, destination: Identity) -> Self {
        self.destination = Some(destination);
        self
    }

    /// Sets the transferred amount.
    #[must_use]
    pub const fn amount(mut self, amount: i64) -> Self {
        self.amount = amount;
        self
    }

    /// Sets the target tick.
    #[must_use]
    pub const fn tick(mut self, tick: u32) -> Self {
        self.tick = Some(tick);
        self
    }

    /// Sets the contract procedure selector.
    #[must_use]
    pub const fn input_type(mut self, input_type: u16) -> Self {
        self.input_type = input_type;
        self
    }

    /// Declares the input size explicitly.
    #[must_use]
    pub const fn input_size(mut self, input_size: usize) -> Self {
        self.input_size = Some(input_size);
        self
    }

    /// Sets raw payload bytes.
    #[must_use]
    pub fn payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Encodes a contract call and sets both input type and payload.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::Encode`] when the call does not fit its ABI.
    pub fn call<C: ContractCall>(self, call: &C) -> Result<Self, BuilderError> {
        let payload = encode(call).map_err(|source| BuilderError::Encode { source })?;
        Ok(self.input_type(C::INPUT_TYPE).payload(payload))
    }

    /// Validates fields and serializes the unsigned envelope.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError`] when a field is missing or violates a range invariant.
    pub fn build_unsigned(self) -> Result<UnsignedTx, BuilderError> {
        let destination = self.destination.ok_or(BuilderError::MissingDestination)?;
        let tick = self.tick.ok_or(BuilderError::MissingTick)?;
        if self.amount < 0 {
            return Err(BuilderError::NegativeAmount {
                amount: self.amount,
            });
        }
        if let Some(declared) = self.input_size
            && declared != self.payload.len()
        {
            return Err(BuilderError::InputSizeMismatch {
                declared,
                actual: self.payload.len(),
            });
        }
        let envelope = TransactionEnvelope {
            source: self.source,
            destination,
            amount: self.amount,
            tick,
            input_type: self.input_type,
            payload: self.payload,
        };
        let bytes = envelope.encode_unsigned()?;
        Ok(UnsignedTx { envelope, bytes })
    }

    /// Builds and signs in one step.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError`] on validation or signing failure.
    pub fn build_and_sign(
        self,
        signer: &dyn TransactionSigner,
    ) -> Result<SignedTransaction, BuilderError> {
        self.build_unsigned()?.sign(signer)
    }

    /// Builds and signs with a key derived from `seed`.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError`] on validation or signing failure.
    pub fn build_with_seed(self, seed: &Seed) -> Result<SignedTransaction, BuilderError> {
        self.build_and_sign(&SeedSigner::from_seed(seed))
    }
}
