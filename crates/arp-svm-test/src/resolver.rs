//! Convenience wrapper running the resolver against LiteSVM.
//!
//! # Example
//!
//! ```ignore
//! use arp_svm_test::{funded_svm, resolve_additional_accounts};
//!
//! let mut svm = funded_svm(&payer)?;
//! svm.add_program(my_program::ID, &program_bytes)?;
//!
//! let resolved = resolve_additional_accounts(&mut svm, &payer, &ix, "do_thing")
//!     .expect("resolution should succeed");
//! assert_eq!(resolved.rounds, 2);
//! ```

use litesvm::LiteSVM;
use solana_sdk::{instruction::Instruction, signature::Keypair};

use crate::litesvm::LiteSvmConnection;

pub use arp_svm_resolve::{ResolveError, ResolvedInstruction};

/// Resolve the remaining accounts of `ix` against the programs loaded in
/// `svm`, with verbose simulation logging and no lookup table.
pub fn resolve_additional_accounts(
    svm: &mut LiteSVM,
    payer: &Keypair,
    ix: &Instruction,
    instruction_name: &str,
) -> Result<ResolvedInstruction, ResolveError> {
    let mut conn = LiteSvmConnection(svm);
    arp_svm_resolve::resolve_additional_accounts(&mut conn, payer, ix, instruction_name, true, false)
}
