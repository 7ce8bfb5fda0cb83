//! Testing utilities for programs and clients speaking the Account Resolution
//! Protocol.
//!
//! With the `litesvm` feature (on by default) this crate adapts [`LiteSVM`]
//! to [`arp_svm_resolve::SolanaConnection`], so the resolver and its send
//! helper can run against an in-process SVM instead of an RPC node.
//!
//! [`LiteSVM`]: ::litesvm::LiteSVM

#[cfg(feature = "litesvm")]
pub mod litesvm;
#[cfg(feature = "litesvm")]
pub mod resolver;

#[cfg(feature = "litesvm")]
pub use crate::litesvm::{funded_svm, LiteSvmConnection, LiteSvmError};
#[cfg(feature = "litesvm")]
pub use crate::resolver::resolve_additional_accounts;
