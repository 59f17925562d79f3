//! Ledger clock provider trait and simple in-memory adapters.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use serde::Deserialize;

use crate::rpc::TransportError;

/// Snapshot of ledger time reported by the status endpoint.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickInfo {
    /// Current tick.
    pub tick: u32,
    /// Duration of the last tick in seconds, when reported.
    #[serde(default)]
    pub duration: Option<u32>,
    /// Current epoch, when reported.
    #[serde(default)]
    pub epoch: Option<u32>,
    /// First tick of the current epoch, when reported.
    #[serde(default)]
    pub initial_tick: Option<u32>,
}

impl TickInfo {
    /// Tick info carrying only the tick.
    #[must_use]
    pub const fn at(tick: u32) -> Self {
        Self {
            tick,
            duration: None,
            epoch: None,
            initial_tick: None,
        }
    }
}

/// Source of current ledger time.
#[async_trait]
pub trait TickSource: Send + Sync {
    /// Reads the current tick. Implementations do not retry.
    async fn tick_info(&self) -> Result<TickInfo, TransportError>;

    /// Reads only the tick number.
    async fn current_tick(&self) -> Result<u32, TransportError> {
        self.tick_info().await.map(|info| info.tick)
    }
}

/// Tick source returning a fixed value, for tests and offline signing.
#[derive(Debug, Clone, Copy)]
pub struct StaticTickSource {
    /// Value reported on every read.
    info: TickInfo,
}

impl StaticTickSource {
    /// Creates a source that always reports `tick`.
    #[must_use]
    pub const fn new(tick: u32) -> Self {
        Self {
            info: TickInfo::at(tick),
        }
    }
}

#[async_trait]
impl TickSource for StaticTickSource {
    async fn tick_info(&self) -> Result<TickInfo, TransportError> {
        Ok(self.info)
    }
}

/// Tick source that advances by one on every read, simulating a live ledger.
#[derive(Debug)]
pub struct AdvancingTickSource {
    /// Next value to report.
    next: AtomicU32,
}

impl AdvancingTickSource {
    /// Creates a source whose first read reports `start`.
    #[must_use]
    pub const fn new(start: u32) -> Self {
        Self {
            next: AtomicU32::new(start),
        }
    }
}

#[async_trait]
impl TickSource for AdvancingTickSource {
    async fn tick_info(&self) -> Result<TickInfo, TransportError> {
        let tick = self
            .next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |tick| {
                Some(tick.saturating_add(1))
            })
            .unwrap_or_else(|tick| tick);
        Ok(TickInfo::at(tick))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_source_repeats_value() {
        let source = StaticTickSource::new(1_000);
        assert_eq!(source.current_tick().await, Ok(1_000));
        assert_eq!(source.current_tick().await, Ok(1_000));
    }

    #[tokio::test]
    async fn advancing_source_never_decrements() {
        let source = AdvancingTickSource::new(10);
        assert_eq!(source.current_tick().await, Ok(10));
        assert_eq!(source.current_tick().await, Ok(11));

        let saturated = AdvancingTickSource::new(u32::MAX);
        assert_eq!(saturated.current_tick().await, Ok(u32::MAX));
        assert_eq!(saturated.current_tick().await, Ok(u32::MAX));
    }
}
