#![forbid(unsafe_code)]
#![cfg_attr(
    test,
    allow(
        clippy::arithmetic_side_effects,
        clippy::expect_used,
        clippy::indexing_slicing,
        clippy::missing_docs_in_private_items,
        clippy::panic,
        missing_docs
    )
)]

//! Client SDK for tick-scheduled Qubic transactions and smart-contract queries.
//!
//! External users should start from:
//! - [`crate::submit::SubmitClient`] to schedule, sign, and broadcast a contract call.
//! - [`crate::query::ContractQueryClient`] to run read-only contract functions.
//! - [`crate::builder::TxBuilder`] to build and sign transactions offline.

/// Transaction envelope builder and signed wire form.
pub mod builder;
/// Contract call payload codec and response decoding.
pub mod codec;
/// Client configuration and environment loading.
pub mod config;
/// Bindings for deployed contracts.
pub mod contracts;
/// KangarooTwelve digest helpers.
pub mod digest;
/// Error classification shared by every layer.
pub mod error;
/// FourQ curve arithmetic and SchnorrQ signatures.
mod fourq;
/// Identity and seed encodings.
pub mod identity;
/// Tracing subscriber setup.
pub mod logging;
/// Tick source trait and simple tick sources.
pub mod providers;
/// Read-only contract query client.
pub mod query;
/// HTTP gateway transport and transport traits.
pub mod rpc;
/// Signing boundary types.
pub mod signing;
/// Submission client and stage tracking.
pub mod submit;

pub use builder::{BuilderError, SignedTransaction, TransactionEnvelope, TxBuilder, UnsignedTx};
pub use codec::{
    CodecError, ContractCall, DecodedValue, MAX_INPUT_SIZE, Payload, QueryResponse, ResponseShape,
};
pub use config::ClientConfig;
pub use error::ErrorKind;
pub use identity::{Identity, IdentityError, Seed, SeedError};
pub use providers::{TickInfo, TickSource};
pub use query::{ContractFunction, ContractQuery, ContractQueryClient, QueryError};
pub use rpc::{BroadcastAck, HttpRpcTransport, TransportError};
pub use signing::{SeedSigner, SigningError, TransactionSigner};
pub use submit::{SubmitClient, SubmitError, SubmitReceipt, SubmitStage};
