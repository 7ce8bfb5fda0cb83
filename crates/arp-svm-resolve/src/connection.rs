//! The [`SolanaConnection`] trait and its implementation for [`RpcClient`].

use solana_sdk::{
    clock::Slot, commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey,
    signature::Signature, transaction::VersionedTransaction,
};

/// What a preflight simulation reported. Only `logs` is needed to decode the
/// payload; the rest is kept for diagnostics.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SimulationOutcome {
    pub logs: Option<Vec<String>>,
    pub units_consumed: Option<u64>,
    pub err: Option<String>,
}

/// Decoded view of an address lookup table account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LookupTableState {
    pub addresses: Vec<Pubkey>,
    /// `false` once the table has been deactivated.
    pub active: bool,
}

/// Abstraction over Solana connectivity for the resolver.
///
/// Implemented for [`RpcClient`] (production) and for LiteSVM adapters (testing).
pub trait SolanaConnection {
    type Error: std::error::Error + Send + 'static;

    fn get_latest_blockhash(&self) -> Result<Hash, Self::Error>;

    fn get_slot(&self) -> Result<Slot, Self::Error>;

    /// Simulate without committing and without signature verification.
    fn simulate(&self, tx: &VersionedTransaction) -> Result<SimulationOutcome, Self::Error>;

    /// Send a transaction and wait for confirmation.
    fn send_and_confirm(&mut self, tx: &VersionedTransaction) -> Result<Signature, Self::Error>;

    /// Fetch a lookup table, returning `None` if it isn't visible yet.
    fn get_address_lookup_table(
        &self,
        address: &Pubkey,
        commitment: CommitmentConfig,
    ) -> Result<Option<LookupTableState>, Self::Error>;

    /// Whether a send failed because the transaction's blockhash expired.
    fn is_blockhash_expired(_err: &Self::Error) -> bool {
        false
    }
}

#[cfg(feature = "rpc")]
mod rpc_impl {
    use solana_client::client_error::{ClientError, ClientErrorKind};
    use solana_client::rpc_client::RpcClient;
    use solana_client::rpc_config::RpcSimulateTransactionConfig;
    use solana_client::rpc_request::RpcError;
    use solana_sdk::{
        address_lookup_table::state::AddressLookupTable,
        clock::Slot,
        commitment_config::CommitmentConfig,
        hash::Hash,
        pubkey::Pubkey,
        signature::Signature,
        transaction::{TransactionError, VersionedTransaction},
    };

    use super::{LookupTableState, SimulationOutcome, SolanaConnection};

    impl SolanaConnection for RpcClient {
        type Error = ClientError;

        fn get_latest_blockhash(&self) -> Result<Hash, Self::Error> {
            RpcClient::get_latest_blockhash(self)
        }

        fn get_slot(&self) -> Result<Slot, Self::Error> {
            RpcClient::get_slot(self)
        }

        fn simulate(&self, tx: &VersionedTransaction) -> Result<SimulationOutcome, Self::Error> {
            let sim_result = self.simulate_transaction_with_config(
                tx,
                RpcSimulateTransactionConfig {
                    sig_verify: false,
                    replace_recent_blockhash: false,
                    commitment: Some(CommitmentConfig::confirmed()),
                    ..Default::default()
                },
            )?;

            let sim_value = sim_result.value;
            Ok(SimulationOutcome {
                logs: sim_value.logs,
                units_consumed: sim_value.units_consumed,
                err: sim_value.err.map(|e| format!("{:?}", e)),
            })
        }

        fn send_and_confirm(&mut self, tx: &VersionedTransaction) -> Result<Signature, Self::Error> {
            self.send_and_confirm_transaction_with_spinner_and_commitment(
                tx,
                CommitmentConfig::confirmed(),
            )
        }

        fn get_address_lookup_table(
            &self,
            address: &Pubkey,
            commitment: CommitmentConfig,
        ) -> Result<Option<LookupTableState>, Self::Error> {
            let Some(account) = self.get_account_with_commitment(address, commitment)?.value
            else {
                return Ok(None);
            };

            let table = AddressLookupTable::deserialize(&account.data).map_err(|e| {
                ClientError::from(RpcError::ForUser(format!(
                    "Account {} is not an address lookup table: {}",
                    address, e
                )))
            })?;

            Ok(Some(LookupTableState {
                addresses: table.addresses.to_vec(),
                active: table.meta.deactivation_slot == Slot::MAX,
            }))
        }

        fn is_blockhash_expired(err: &Self::Error) -> bool {
            matches!(
                err.get_transaction_error(),
                Some(TransactionError::BlockhashNotFound)
            ) || confirmation_outlived_blockhash(err.kind())
        }
    }

    /// Prefix of the `ForUser` error RpcClient returns once the blockhash a
    /// transaction was sent with is no longer valid and no status showed up.
    const UNCONFIRMED_PREFIX: &str = "unable to confirm transaction";

    /// An underfunded payer fails preflight with a `TransactionError`, so
    /// only this exact `ForUser` variant is treated as expiry.
    fn confirmation_outlived_blockhash(kind: &ClientErrorKind) -> bool {
        matches!(
            kind,
            ClientErrorKind::RpcError(RpcError::ForUser(message))
                if message.starts_with(UNCONFIRMED_PREFIX)
        )
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        const UNCONFIRMED: &str = "unable to confirm transaction. This can happen in situations \
            such as transaction expiration and insufficient fee-payer funds";

        #[test]
        fn test_unconfirmed_send_is_expiry() {
            let err = ClientError::from(RpcError::ForUser(UNCONFIRMED.to_string()));
            assert!(RpcClient::is_blockhash_expired(&err));

            let err = ClientError::from(TransactionError::BlockhashNotFound);
            assert!(RpcClient::is_blockhash_expired(&err));
        }

        #[test]
        fn test_underfunded_payer_is_not_expiry() {
            let err = ClientError::from(TransactionError::InsufficientFundsForFee);
            assert!(!RpcClient::is_blockhash_expired(&err));

            // Same wording outside the ForUser variant does not count.
            let err = ClientError::from(ClientErrorKind::Custom(UNCONFIRMED.to_string()));
            assert!(!RpcClient::is_blockhash_expired(&err));

            let err = ClientError::from(RpcError::ForUser(
                "insufficient fee-payer funds, transaction expiration unknown".to_string(),
            ));
            assert!(!RpcClient::is_blockhash_expired(&err));
        }
    }
}
