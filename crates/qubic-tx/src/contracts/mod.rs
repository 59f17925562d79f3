//! Typed bindings for deployed contracts.

/// Sustainable-projects funding contract.
pub mod hm25;
