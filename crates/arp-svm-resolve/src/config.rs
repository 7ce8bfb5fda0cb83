//! Protocol constants and tunables for the resolver.

use std::time::Duration;

/// Size of the preflight response payload, in bytes.
pub const PAYLOAD_LEN: usize = 1024;

/// The only payload version this client understands.
pub const PROTOCOL_VERSION: u8 = 0;

/// Maximum number of accounts a single preflight round can report.
pub const MAX_ACCOUNTS_PER_ROUND: usize = 30;

/// Offset of the account count (`u32`, little-endian) in the payload.
pub const ACCOUNT_COUNT_OFFSET: usize = 4;

/// Offset of the first packed pubkey in the payload.
pub const ACCOUNTS_OFFSET: usize = 8;

/// Offset of the per-account writability flags in the payload.
pub const WRITABLE_FLAGS_OFFSET: usize = ACCOUNTS_OFFSET + MAX_ACCOUNTS_PER_ROUND * 32;

/// Maximum resolver rounds before giving up.
pub const MAX_RESOLVER_ROUNDS: usize = 32;

/// Discovered-account count at which a lookup table is created and extended.
pub const LOOKUP_TABLE_THRESHOLD: usize = 10;

/// Maximum addresses added by one `extend_lookup_table` transaction.
pub const MAX_EXTEND_BATCH: usize = 29;

/// Compute unit limit requested for every preflight simulation.
pub const COMPUTE_UNIT_LIMIT: u32 = 1_400_000;

/// Heap frame requested for every preflight simulation.
pub const HEAP_FRAME_BYTES: u32 = 256 * 1024;

/// Send attempts when a transaction expires before confirmation.
pub const MAX_SEND_ATTEMPTS: usize = 3;

/// Backoff parameters for "wait until the chain catches up" loops.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay before the second check.
    pub initial_interval: Duration,
    /// Upper bound on the delay between two checks.
    pub max_interval: Duration,
    /// Total time slept before giving up.
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(8),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Tunables for a resolution run. `Default` matches the on-chain protocol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolverConfig {
    pub max_rounds: usize,
    pub lookup_table_threshold: usize,
    pub max_extend_batch: usize,
    pub compute_unit_limit: u32,
    pub heap_frame_bytes: u32,
    pub max_send_attempts: usize,
    pub poll: PollConfig,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_rounds: MAX_RESOLVER_ROUNDS,
            lookup_table_threshold: LOOKUP_TABLE_THRESHOLD,
            max_extend_batch: MAX_EXTEND_BATCH,
            compute_unit_limit: COMPUTE_UNIT_LIMIT,
            heap_frame_bytes: HEAP_FRAME_BYTES,
            max_send_attempts: MAX_SEND_ATTEMPTS,
            poll: PollConfig::default(),
        }
    }
}
