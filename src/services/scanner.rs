//! Adaptive log-range scanner.
//!
//! Walks a block range in closed, non-overlapping chunks and collects every
//! matching log. Providers impose undocumented range/result limits, so the
//! chunk size halves when a capacity error comes back (the same range is
//! retried, blocks are never skipped) and regrows after successes. Transient
//! transport faults get capped exponential backoff with a bounded attempt
//! count. The cursor/chunk state is an explicit value so the shrink logic is
//! testable without a network.

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::models::vote::ChainLog;
use crate::services::rpc::{LogSource, RpcClientError};

/// Upper bound and starting point for the block-range chunk size.
pub const MAX_CHUNK_BLOCKS: u64 = 50_000;

/// Attempts per chunk before a transient fault becomes fatal.
pub const MAX_TRANSIENT_RETRIES: u32 = 5;

const BASE_RETRY_DELAY_MS: u64 = 500;
const MAX_RETRY_DELAY_MS: u64 = 30_000;

#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub max_chunk: u64,
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            max_chunk: MAX_CHUNK_BLOCKS,
            max_retries: MAX_TRANSIENT_RETRIES,
            base_delay: Duration::from_millis(BASE_RETRY_DELAY_MS),
            max_delay: Duration::from_millis(MAX_RETRY_DELAY_MS),
        }
    }
}

/// Cursor state threaded through the chunk loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanState {
    pub cursor: u64,
    pub chunk_size: u64,
}

impl ScanState {
    pub fn new(start_block: u64, chunk_size: u64) -> Self {
        Self {
            cursor: start_block,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Inclusive end of the next range to query.
    pub fn chunk_end(&self, end_block: u64) -> u64 {
        self.cursor.saturating_add(self.chunk_size - 1).min(end_block)
    }

    /// Advance past a successfully queried range and regrow the chunk
    /// toward the upper bound.
    pub fn advance(&mut self, queried_end: u64, max_chunk: u64) {
        self.cursor = queried_end.saturating_add(1);
        self.chunk_size = self.chunk_size.saturating_mul(2).min(max_chunk.max(1));
    }

    /// Halve the chunk after a capacity error. Returns false when the range
    /// is already a single block and cannot shrink further.
    pub fn shrink(&mut self) -> bool {
        if self.chunk_size <= 1 {
            return false;
        }
        self.chunk_size = (self.chunk_size / 2).max(1);
        true
    }
}

#[derive(Debug)]
pub enum ScanError {
    /// Transient failures exhausted the retry budget on one sub-range.
    RetriesExhausted {
        from_block: u64,
        to_block: u64,
        cause: RpcClientError,
    },
    /// A single-block query still exceeds the provider's limits.
    IrreducibleRange { block: u64, cause: RpcClientError },
    Rpc(RpcClientError),
}

impl std::fmt::Display for ScanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanError::RetriesExhausted {
                from_block,
                to_block,
                cause,
            } => write!(
                f,
                "retries exhausted for blocks {}-{}: {}",
                from_block, to_block, cause
            ),
            ScanError::IrreducibleRange { block, cause } => {
                write!(f, "provider rejects even a single block {}: {}", block, cause)
            }
            ScanError::Rpc(cause) => write!(f, "{}", cause),
        }
    }
}

impl std::error::Error for ScanError {}

/// Drives a [`LogSource`] across a full block range.
pub struct LogScanner<S> {
    source: S,
    config: ScannerConfig,
}

impl<S: LogSource> LogScanner<S> {
    pub fn new(source: S) -> Self {
        Self::with_config(source, ScannerConfig::default())
    }

    pub fn with_config(source: S, config: ScannerConfig) -> Self {
        Self { source, config }
    }

    /// Fetch every matching log in `[start_block, end_block]`, inclusive.
    ///
    /// The union of all queried sub-ranges covers the range exactly: no
    /// gaps, no double-counted boundaries.
    pub async fn scan(
        &self,
        start_block: u64,
        end_block: u64,
    ) -> Result<Vec<ChainLog>, ScanError> {
        let mut state = ScanState::new(start_block, self.config.max_chunk);
        let mut logs = Vec::new();
        let mut attempts = 0u32;
        let mut delay = self.config.base_delay;

        while state.cursor <= end_block {
            let to_block = state.chunk_end(end_block);
            match self.source.fetch_logs(state.cursor, to_block).await {
                Ok(batch) => {
                    debug!(
                        from_block = state.cursor,
                        to_block,
                        count = batch.len(),
                        "Fetched log chunk"
                    );
                    logs.extend(batch);
                    state.advance(to_block, self.config.max_chunk);
                    attempts = 0;
                    delay = self.config.base_delay;
                }
                Err(cause @ RpcClientError::RangeTooLarge(_)) => {
                    // Retry the same range with a smaller chunk, never skip
                    if !state.shrink() {
                        return Err(ScanError::IrreducibleRange {
                            block: state.cursor,
                            cause,
                        });
                    }
                    warn!(
                        from_block = state.cursor,
                        to_block,
                        chunk_size = state.chunk_size,
                        "Provider range limit hit, halving chunk"
                    );
                }
                Err(cause @ RpcClientError::Transient(_)) => {
                    attempts += 1;
                    if attempts >= self.config.max_retries {
                        return Err(ScanError::RetriesExhausted {
                            from_block: state.cursor,
                            to_block,
                            cause,
                        });
                    }
                    warn!(
                        from_block = state.cursor,
                        to_block,
                        attempt = attempts,
                        max_attempts = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %cause,
                        "Transient RPC failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(self.config.max_delay);
                }
                Err(cause) => return Err(ScanError::Rpc(cause)),
            }
        }

        info!(
            start_block,
            end_block,
            count = logs.len(),
            "Log scan complete"
        );
        Ok(logs)
    }
}
