//! RPC gateway transports: tick status, transaction broadcast, and contract queries.

/// `reqwest`-backed gateway client.
mod http;
/// Shared transport types, errors, and traits.
mod types;

pub use http::HttpRpcTransport;
pub use types::{BroadcastAck, BroadcastTransport, ContractQueryTransport, TransportError};
