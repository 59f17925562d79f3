//! Transaction submission orchestration.

/// Submission client implementation.
mod client;
/// Submission stages, errors, and receipts.
mod types;

pub use client::SubmitClient;
pub use types::{SubmitError, SubmitReceipt, SubmitStage};
