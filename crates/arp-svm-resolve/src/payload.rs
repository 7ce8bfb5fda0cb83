//! Preflight response payload: extraction from simulation logs and decoding.
//!
//! A cooperating program's `preflight_<name>` handler reports the accounts the
//! real instruction still needs as a fixed 1024-byte blob, base64-encoded into
//! its log output. Layout:
//!
//! | offset      | size    | field                                  |
//! |-------------|---------|----------------------------------------|
//! | 0           | 1       | protocol version (must be 0)           |
//! | 1           | 1       | has-more flag                          |
//! | 4           | 4       | account count, `u32` little-endian     |
//! | 8           | 30 * 32 | packed pubkeys                         |
//! | 968         | 30      | writability flag per account           |
//!
//! Everything past the flags is padding. Return data is not used because RPC
//! nodes trim its trailing zero bytes.

use base64::Engine;
use solana_sdk::{instruction::AccountMeta, pubkey::Pubkey};
use thiserror::Error;

use crate::config::{
    ACCOUNTS_OFFSET, ACCOUNT_COUNT_OFFSET, MAX_ACCOUNTS_PER_ROUND, PAYLOAD_LEN, PROTOCOL_VERSION,
    WRITABLE_FLAGS_OFFSET,
};
use crate::connection::SimulationOutcome;
use crate::ResolveError;

/// Position of the payload line, counted back from the last log line.
const PAYLOAD_LINE_FROM_END: usize = 2;

/// Whitespace-delimited token of the payload line holding the base64 data.
const PAYLOAD_TOKEN_INDEX: usize = 2;

/// Errors raised while decoding a preflight payload.
#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("preflight payload line not found in simulation logs")]
    MissingToken,

    #[error("preflight payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("preflight payload is empty")]
    EmptyReturnData,

    #[error("preflight payload has wrong size: got {actual} bytes, expected {expected}")]
    WrongSize { actual: usize, expected: usize },

    #[error("unsupported preflight protocol version: {0}")]
    UnsupportedVersion(u8),

    #[error("preflight payload reports {0} accounts, at most {} fit", MAX_ACCOUNTS_PER_ROUND)]
    TooManyAccounts(usize),
}

/// One decoded preflight round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreflightResponse {
    /// Accounts to append. Never signers.
    pub accounts: Vec<AccountMeta>,
    /// Whether the program needs another round to finish discovery.
    pub has_more: bool,
}

impl PreflightResponse {
    pub fn decode(bytes: &[u8]) -> Result<Self, PayloadError> {
        if bytes.is_empty() {
            return Err(PayloadError::EmptyReturnData);
        }
        if bytes.len() != PAYLOAD_LEN {
            return Err(PayloadError::WrongSize {
                actual: bytes.len(),
                expected: PAYLOAD_LEN,
            });
        }
        if bytes[0] != PROTOCOL_VERSION {
            return Err(PayloadError::UnsupportedVersion(bytes[0]));
        }

        let has_more = bytes[1] != 0;

        let mut count_bytes = [0u8; 4];
        count_bytes.copy_from_slice(&bytes[ACCOUNT_COUNT_OFFSET..ACCOUNT_COUNT_OFFSET + 4]);
        let count = u32::from_le_bytes(count_bytes) as usize;
        if count > MAX_ACCOUNTS_PER_ROUND {
            return Err(PayloadError::TooManyAccounts(count));
        }

        let accounts = (0..count)
            .map(|i| {
                let start = ACCOUNTS_OFFSET + i * 32;
                let mut key = [0u8; 32];
                key.copy_from_slice(&bytes[start..start + 32]);
                let pubkey = Pubkey::new_from_array(key);
                if bytes[WRITABLE_FLAGS_OFFSET + i] != 0 {
                    AccountMeta::new(pubkey, false)
                } else {
                    AccountMeta::new_readonly(pubkey, false)
                }
            })
            .collect();

        Ok(Self { accounts, has_more })
    }

    /// Serialize into the on-chain layout. Signer flags are not representable
    /// and are dropped.
    pub fn encode(&self) -> Result<[u8; PAYLOAD_LEN], PayloadError> {
        if self.accounts.len() > MAX_ACCOUNTS_PER_ROUND {
            return Err(PayloadError::TooManyAccounts(self.accounts.len()));
        }

        let mut out = [0u8; PAYLOAD_LEN];
        out[0] = PROTOCOL_VERSION;
        out[1] = u8::from(self.has_more);
        out[ACCOUNT_COUNT_OFFSET..ACCOUNT_COUNT_OFFSET + 4]
            .copy_from_slice(&(self.accounts.len() as u32).to_le_bytes());
        for (i, meta) in self.accounts.iter().enumerate() {
            let start = ACCOUNTS_OFFSET + i * 32;
            out[start..start + 32].copy_from_slice(meta.pubkey.as_ref());
            out[WRITABLE_FLAGS_OFFSET + i] = u8::from(meta.is_writable);
        }
        Ok(out)
    }
}

/// Pull the raw payload bytes out of a preflight simulation's logs.
///
/// The payload is the third whitespace-delimited token of the second-to-last
/// log line. This is the only place that knows about log positions.
pub fn extract_payload(logs: &[String]) -> Result<Vec<u8>, PayloadError> {
    let line = logs
        .len()
        .checked_sub(PAYLOAD_LINE_FROM_END)
        .and_then(|idx| logs.get(idx))
        .ok_or(PayloadError::MissingToken)?;
    let token = line
        .split_whitespace()
        .nth(PAYLOAD_TOKEN_INDEX)
        .ok_or(PayloadError::MissingToken)?;
    Ok(base64::engine::general_purpose::STANDARD.decode(token)?)
}

/// Decode the preflight response carried by a simulation outcome.
pub fn parse_simulation(outcome: &SimulationOutcome) -> Result<PreflightResponse, ResolveError> {
    let logs = match outcome.logs.as_deref() {
        Some(logs) if !logs.is_empty() => logs,
        _ => return Err(ResolveError::MissingLogs),
    };

    extract_payload(logs)
        .and_then(|bytes| PreflightResponse::decode(&bytes))
        .map_err(|source| ResolveError::PayloadParse {
            source,
            logs: logs.to_vec(),
        })
}
