//! Client for the Account Resolution Protocol (ARP).
//!
//! Anchor programs that speak ARP expose a `preflight_<name>` variant of an
//! instruction which, under simulation, reports the remaining accounts the
//! real instruction needs. This crate drives that discovery:
//!
//! 1. Simulate the preflight instruction ([`probe`])
//! 2. Decode the fixed-size payload from the simulation logs ([`payload`])
//! 3. Append the reported accounts and repeat until the program is done
//!    ([`resolve`]), optionally packing them into an address lookup table
//!    ([`lookup_table`])
//!
//! All chain access goes through the [`SolanaConnection`] trait, implemented
//! for `RpcClient` behind the default `rpc` feature.

use std::time::Duration;

pub mod config;
pub mod connection;
pub mod discriminator;
pub mod lookup_table;
pub mod payload;
pub mod poll;
pub mod probe;
pub mod resolve;
pub mod send;

pub use config::{PollConfig, ResolverConfig};
pub use connection::{LookupTableState, SimulationOutcome, SolanaConnection};
pub use discriminator::{discriminator, preflight_discriminator};
pub use lookup_table::LookupTablePacker;
pub use payload::{PayloadError, PreflightResponse};
pub use poll::{Sleep, ThreadSleep};
pub use resolve::{resolve_additional_accounts, ResolvedInstruction, Resolver};

/// Errors that can occur while resolving accounts.
#[derive(thiserror::Error, Debug)]
pub enum ResolveError {
    #[error("no logs found in preflight simulation; likely an RPC error")]
    MissingLogs,

    #[error("failed to parse preflight response: {source}\nlogs:\n{}", .logs.join("\n"))]
    PayloadParse {
        #[source]
        source: PayloadError,
        logs: Vec<String>,
    },

    #[error("account resolution did not finish after {limit} rounds")]
    IterationLimitExceeded { limit: usize },

    #[error("instruction data is {0} bytes, too short for a discriminator")]
    InstructionDataTooShort(usize),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Preflight simulation error: {0}")]
    Simulation(String),

    #[error("Failed to build transaction: {0}")]
    Compile(String),

    #[error("Transaction send error: {0}")]
    Send(String),

    #[error("timed out after {waited:?} waiting for {what}")]
    Timeout { what: String, waited: Duration },
}
