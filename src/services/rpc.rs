//! Governor RPC transport.
//!
//! Wraps an alloy provider over HTTP(S) or WS(S), selected by URL scheme,
//! and exposes the chain-head, vote-cast log range and voting-window
//! queries the scanner drives. Provider errors are classified so the
//! scanner can tell capacity limits apart from transient faults.

use alloy::{
    eips::BlockNumberOrTag,
    primitives::{Address, B256, U256},
    providers::{Provider, ProviderBuilder, RootProvider},
    rpc::types::Filter,
    sol,
    transports::{BoxTransport, RpcError, TransportErrorKind},
};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::models::vote::ChainLog;
use crate::services::decoder::{vote_cast_topic, vote_cast_with_params_topic};

/// Maximum retry attempts for a single RPC round trip
const MAX_RETRIES: u32 = 3;

/// Base delay between retries (will be exponentially increased)
const RETRY_BASE_DELAY_MS: u64 = 1000;

// Minimal governor interface for resolving the voting window
sol! {
    #[sol(rpc)]
    interface IGovernor {
        function proposalSnapshot(uint256 proposalId) external view returns (uint256);
        function proposalDeadline(uint256 proposalId) external view returns (uint256);
    }
}

/// Error taxonomy of the transport layer.
#[derive(Debug)]
pub enum RpcClientError {
    InvalidConfig(String),
    /// Provider refused the query because the range or result set is too
    /// big. Handled by the scanner, never surfaced to the user.
    RangeTooLarge(String),
    /// Connection-level fault or malformed response worth retrying.
    Transient(String),
    Fatal(String),
    MaxRetriesExceeded(String),
}

impl std::fmt::Display for RpcClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RpcClientError::InvalidConfig(msg) => write!(f, "Invalid config: {}", msg),
            RpcClientError::RangeTooLarge(msg) => write!(f, "Range too large: {}", msg),
            RpcClientError::Transient(msg) => write!(f, "Transient RPC error: {}", msg),
            RpcClientError::Fatal(msg) => write!(f, "RPC error: {}", msg),
            RpcClientError::MaxRetriesExceeded(msg) => {
                write!(f, "Max retries exceeded: {}", msg)
            }
        }
    }
}

impl std::error::Error for RpcClientError {}

/// Source of chain logs, as the scanner sees it. Kept as a trait so the
/// scanner can run against stub sources in tests.
#[async_trait]
pub trait LogSource {
    async fn latest_block(&self) -> Result<u64, RpcClientError>;
    async fn fetch_logs(&self, from_block: u64, to_block: u64)
        -> Result<Vec<ChainLog>, RpcClientError>;
}

#[async_trait]
impl<T: LogSource + Sync> LogSource for &T {
    async fn latest_block(&self) -> Result<u64, RpcClientError> {
        (**self).latest_block().await
    }

    async fn fetch_logs(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<ChainLog>, RpcClientError> {
        (**self).fetch_logs(from_block, to_block).await
    }
}

/// Block timestamp lookup, as the voting-window binary search sees it.
/// Implemented by the live client; tests use fixed clocks.
#[async_trait]
pub trait BlockTimestamps {
    async fn timestamp(&self, block_number: u64) -> Result<u64, RpcClientError>;
}

/// Resolved block range during which votes could be cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VotingWindow {
    pub start_block: u64,
    pub end_block: u64,
    /// True when the proposal deadline has not been reached yet; results
    /// are incomplete until the proposal closes.
    pub deadline_in_future: bool,
}

/// Governor RPC client over a scheme-selected transport.
pub struct GovernorClient {
    provider: RootProvider<BoxTransport>,
    governor: Address,
    proposal_id: U256,
}

impl GovernorClient {
    /// Connect to an RPC endpoint. `http(s)` URLs use a request-response
    /// transport, `ws(s)` URLs a persistent socket; selection is by scheme.
    pub async fn connect(
        url: &str,
        governor: Address,
        proposal_id: U256,
    ) -> Result<Self, RpcClientError> {
        let provider = ProviderBuilder::new().on_builtin(url).await.map_err(|e| {
            RpcClientError::InvalidConfig(format!("Cannot connect to RPC URL {}: {}", url, e))
        })?;

        // Verify the connection before any real work
        let chain_id = provider.get_chain_id().await.map_err(classify)?;
        info!(chain_id, governor = %governor, "Connected to RPC endpoint");

        Ok(Self {
            provider,
            governor,
            proposal_id,
        })
    }

    /// Resolve the block range during which votes could be cast.
    ///
    /// Governors with a timestamp clock report snapshot/deadline as unix
    /// timestamps rather than block numbers; those are mapped back to
    /// block numbers by binary search over block timestamps.
    pub async fn voting_window(&self) -> Result<VotingWindow, RpcClientError> {
        let snapshot = with_retry("proposalSnapshot", || async {
            let governor = IGovernor::new(self.governor, &self.provider);
            governor
                .proposalSnapshot(self.proposal_id)
                .call()
                .await
                .map(|r| r._0)
                .map_err(classify_contract)
        })
        .await?;
        let deadline = with_retry("proposalDeadline", || async {
            let governor = IGovernor::new(self.governor, &self.provider);
            governor
                .proposalDeadline(self.proposal_id)
                .call()
                .await
                .map(|r| r._0)
                .map_err(classify_contract)
        })
        .await?;

        let latest_block = self.latest_block().await?;
        resolve_voting_window(
            self,
            snapshot.saturating_to::<u64>(),
            deadline.saturating_to::<u64>(),
            latest_block,
        )
        .await
    }

    /// Raw JSON-RPC call for anything the typed provider surface does not
    /// cover. Transient faults are retried like any other round trip.
    pub async fn call(
        &self,
        method: &'static str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, RpcClientError> {
        with_retry(method, || async {
            self.provider
                .client()
                .request(method, params.clone())
                .await
                .map_err(classify)
        })
        .await
    }

    /// Log filter for this client's governor/proposal: both vote-cast
    /// topic0 values plus the proposal-id topic, ABI left-padded.
    fn vote_filter(&self, from_block: u64, to_block: u64) -> Filter {
        Filter::new()
            .address(self.governor)
            .event_signature(vec![vote_cast_topic(), vote_cast_with_params_topic()])
            .topic2(B256::from(self.proposal_id))
            .from_block(BlockNumberOrTag::Number(from_block))
            .to_block(BlockNumberOrTag::Number(to_block))
    }
}

#[async_trait]
impl BlockTimestamps for GovernorClient {
    /// Read a block timestamp via raw `eth_getBlockByNumber`.
    async fn timestamp(&self, block_number: u64) -> Result<u64, RpcClientError> {
        let params = serde_json::json!([format!("0x{:x}", block_number), false]);
        let response = self.call("eth_getBlockByNumber", params).await?;

        response["timestamp"]
            .as_str()
            .and_then(|s| u64::from_str_radix(s.trim_start_matches("0x"), 16).ok())
            .ok_or_else(|| {
                RpcClientError::Fatal(format!("block {} has no parsable timestamp", block_number))
            })
    }
}

#[async_trait]
impl LogSource for GovernorClient {
    async fn latest_block(&self) -> Result<u64, RpcClientError> {
        with_retry("eth_blockNumber", || async {
            self.provider.get_block_number().await.map_err(classify)
        })
        .await
    }

    async fn fetch_logs(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<ChainLog>, RpcClientError> {
        // No retry here: the scanner owns backoff and chunk shrinking for
        // log queries, and needs the classified error to decide which.
        let filter = self.vote_filter(from_block, to_block);
        let logs = self.provider.get_logs(&filter).await.map_err(classify)?;
        debug!(from_block, to_block, count = logs.len(), "Fetched logs");
        logs.into_iter().map(chain_log_from_rpc).collect()
    }
}

/// Map proposal snapshot/deadline values onto a block range.
///
/// Block-clocked governors report block numbers directly. Timestamp-clocked
/// governors report unix times, recognizable because the snapshot lies far
/// beyond the head block number; those are mapped back by binary search
/// over block timestamps.
async fn resolve_voting_window<C: BlockTimestamps + Sync>(
    clock: &C,
    snapshot: u64,
    deadline: u64,
    latest_block: u64,
) -> Result<VotingWindow, RpcClientError> {
    if snapshot <= latest_block {
        return Ok(VotingWindow {
            start_block: snapshot,
            end_block: deadline,
            deadline_in_future: latest_block < deadline,
        });
    }

    let latest_ts = clock.timestamp(latest_block).await?;
    debug!(snapshot, deadline, latest_ts, "Mapping voting timestamps to blocks");

    let start_block = if snapshot > latest_ts {
        latest_block
    } else {
        block_at_or_after_timestamp(clock, snapshot, latest_block).await?
    };

    if deadline > latest_ts {
        Ok(VotingWindow {
            start_block,
            end_block: latest_block,
            deadline_in_future: true,
        })
    } else {
        let end_block = block_at_or_before_timestamp(clock, deadline, latest_block).await?;
        Ok(VotingWindow {
            start_block,
            end_block,
            deadline_in_future: false,
        })
    }
}

/// Binary search the first block whose timestamp is >= `target`.
async fn block_at_or_after_timestamp<C: BlockTimestamps + Sync>(
    clock: &C,
    target: u64,
    latest_block: u64,
) -> Result<u64, RpcClientError> {
    let mut low = 0u64;
    let mut high = latest_block;
    while low < high {
        let mid = (low + high) / 2;
        if clock.timestamp(mid).await? < target {
            low = mid + 1;
        } else {
            high = mid;
        }
    }
    Ok(low)
}

/// Binary search the last block whose timestamp is <= `target`.
async fn block_at_or_before_timestamp<C: BlockTimestamps + Sync>(
    clock: &C,
    target: u64,
    latest_block: u64,
) -> Result<u64, RpcClientError> {
    let mut low = 0u64;
    let mut high = latest_block;
    while low < high {
        let mid = (low + high + 1) / 2;
        if clock.timestamp(mid).await? <= target {
            low = mid;
        } else {
            high = mid - 1;
        }
    }
    Ok(low)
}

/// Execute an operation with exponential backoff retry on transient
/// failures. Fatal classifications propagate immediately.
async fn with_retry<T, F, Fut>(operation: &str, f: F) -> Result<T, RpcClientError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, RpcClientError>>,
{
    with_retry_after(operation, Duration::from_millis(RETRY_BASE_DELAY_MS), f).await
}

async fn with_retry_after<T, F, Fut>(
    operation: &str,
    base_delay: Duration,
    f: F,
) -> Result<T, RpcClientError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, RpcClientError>>,
{
    let mut attempts = 0;
    let mut last_error = None;

    while attempts < MAX_RETRIES {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e @ RpcClientError::Transient(_)) => {
                attempts += 1;
                last_error = Some(e);

                if attempts < MAX_RETRIES {
                    let delay = base_delay * (1u32 << attempts);
                    warn!(
                        operation = %operation,
                        attempt = attempts,
                        max_attempts = MAX_RETRIES,
                        delay_ms = delay.as_millis() as u64,
                        "RPC call failed, retrying..."
                    );
                    tokio::time::sleep(delay).await;
                }
            }
            Err(e) => return Err(e),
        }
    }

    Err(RpcClientError::MaxRetriesExceeded(format!(
        "{}: {}",
        operation,
        last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".to_string())
    )))
}

fn chain_log_from_rpc(log: alloy::rpc::types::Log) -> Result<ChainLog, RpcClientError> {
    let block_number = log
        .block_number
        .ok_or_else(|| RpcClientError::Fatal("log without block number".to_string()))?;
    let log_index = log
        .log_index
        .ok_or_else(|| RpcClientError::Fatal("log without log index".to_string()))?;
    Ok(ChainLog {
        block_number,
        log_index,
        transaction_hash: log.transaction_hash,
        topics: log.inner.topics().to_vec(),
        data: log.inner.data.data.to_vec(),
    })
}

/// Classify a contract call failure: wrapped transport errors go through
/// the provider taxonomy, reverts and ABI mismatches are fatal.
fn classify_contract(err: alloy::contract::Error) -> RpcClientError {
    match err {
        alloy::contract::Error::TransportError(e) => classify(e),
        other => RpcClientError::Fatal(format!("governor call failed: {}", other)),
    }
}

/// Classify a provider error into the scanner-facing taxonomy.
fn classify(err: RpcError<TransportErrorKind>) -> RpcClientError {
    match err {
        RpcError::ErrorResp(payload) => {
            let message = payload.message.to_lowercase();
            // Providers signal capacity limits with varying codes and
            // wording; -32005 (Infura), -32614 (QuickNode), or a
            // range/result-size message on an otherwise generic code.
            let capacity_hit = matches!(payload.code, -32005 | -32614)
                || message.contains("too large")
                || message.contains("too many")
                || message.contains("more than")
                || message.contains("response size")
                || message.contains("block range")
                || message.contains("limit exceeded");
            if capacity_hit {
                RpcClientError::RangeTooLarge(format!("{} {}", payload.code, payload.message))
            } else if message.contains("rate limit") || payload.code == 429 {
                RpcClientError::Transient(format!("{} {}", payload.code, payload.message))
            } else {
                // Invalid params, unknown methods and other protocol-level
                // rejections will not heal on retry
                RpcClientError::Fatal(format!("{} {}", payload.code, payload.message))
            }
        }
        RpcError::Transport(kind) => RpcClientError::Transient(kind.to_string()),
        RpcError::DeserError { err, .. } => {
            RpcClientError::Transient(format!("malformed response: {}", err))
        }
        other => RpcClientError::Fatal(other.to_string()),
    }
}
