//! LiteSVM adapter for the [`SolanaConnection`] trait.

use arp_svm_resolve::{LookupTableState, SimulationOutcome, SolanaConnection};
use litesvm::LiteSVM;
use solana_sdk::{
    address_lookup_table::state::AddressLookupTable,
    clock::{Clock, Slot},
    commitment_config::CommitmentConfig,
    hash::Hash,
    native_token::LAMPORTS_PER_SOL,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::{TransactionError, VersionedTransaction},
};

/// Lamports airdropped to the payer by [`funded_svm`].
pub const PAYER_AIRDROP: u64 = 10 * LAMPORTS_PER_SOL;

/// Error type for the LiteSVM connection adapter.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct LiteSvmError {
    pub message: String,
    /// The transaction error, when the failure came from executing one.
    pub transaction_error: Option<TransactionError>,
}

impl LiteSvmError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transaction_error: None,
        }
    }
}

/// Adapter that implements [`SolanaConnection`] for LiteSVM.
///
/// LiteSVM has a single bank, so every commitment level sees the same state.
pub struct LiteSvmConnection<'a>(pub &'a mut LiteSVM);

impl SolanaConnection for LiteSvmConnection<'_> {
    type Error = LiteSvmError;

    fn get_latest_blockhash(&self) -> Result<Hash, Self::Error> {
        Ok(self.0.latest_blockhash())
    }

    fn get_slot(&self) -> Result<Slot, Self::Error> {
        Ok(self.0.get_sysvar::<Clock>().slot)
    }

    fn simulate(&self, tx: &VersionedTransaction) -> Result<SimulationOutcome, Self::Error> {
        let outcome = match self.0.simulate_transaction(tx.clone()) {
            Ok(info) => SimulationOutcome {
                logs: Some(info.meta.logs),
                units_consumed: Some(info.meta.compute_units_consumed),
                err: None,
            },
            // A failed simulation is still an answer: the payload decoder
            // decides what the logs are worth.
            Err(failed) => SimulationOutcome {
                logs: Some(failed.meta.logs),
                units_consumed: Some(failed.meta.compute_units_consumed),
                err: Some(format!("{:?}", failed.err)),
            },
        };
        Ok(outcome)
    }

    fn send_and_confirm(&mut self, tx: &VersionedTransaction) -> Result<Signature, Self::Error> {
        self.0
            .send_transaction(tx.clone())
            .map(|_| tx.signatures[0])
            .map_err(|failed| LiteSvmError {
                message: format!("Transaction failed: {:?}", failed.err),
                transaction_error: Some(failed.err),
            })
    }

    fn get_address_lookup_table(
        &self,
        address: &Pubkey,
        _commitment: CommitmentConfig,
    ) -> Result<Option<LookupTableState>, Self::Error> {
        let Some(account) = self.0.get_account(address) else {
            return Ok(None);
        };
        let table = AddressLookupTable::deserialize(&account.data)
            .map_err(|e| LiteSvmError::new(format!("invalid lookup table {}: {}", address, e)))?;

        Ok(Some(LookupTableState {
            addresses: table.addresses.to_vec(),
            active: table.meta.deactivation_slot == Slot::MAX,
        }))
    }

    fn is_blockhash_expired(err: &Self::Error) -> bool {
        matches!(
            err.transaction_error,
            Some(TransactionError::BlockhashNotFound)
        )
    }
}

/// A fresh LiteSVM with signature verification off and `payer` funded with
/// [`PAYER_AIRDROP`] lamports.
///
/// Preflight simulations carry placeholder signatures, so they only run
/// with verification disabled.
pub fn funded_svm(payer: &Keypair) -> Result<LiteSVM, LiteSvmError> {
    let mut svm = LiteSVM::new().with_sigverify(false);
    svm.airdrop(&payer.pubkey(), PAYER_AIRDROP)
        .map_err(|failed| LiteSvmError {
            message: format!("airdrop failed: {:?}", failed.err),
            transaction_error: Some(failed.err),
        })?;
    Ok(svm)
}
