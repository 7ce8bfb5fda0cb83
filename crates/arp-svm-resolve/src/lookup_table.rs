//! Address lookup table holding the accounts discovered during resolution.
//!
//! A legacy transaction can name at most 32 account keys, so once enough
//! accounts pile up they are packed into a lookup table owned by the payer
//! and later simulations reference them by index.

use solana_sdk::{
    address_lookup_table::instruction::{create_lookup_table, extend_lookup_table},
    commitment_config::CommitmentConfig,
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};
use tracing::info;

use crate::config::ResolverConfig;
use crate::connection::SolanaConnection;
use crate::poll::{poll_until, Sleep};
use crate::send::send_instructions;
use crate::ResolveError;

/// Split `pending` addresses into `extend_lookup_table` batches of at most
/// `ceiling` addresses each, full batches first.
pub fn batch_sizes(pending: usize, ceiling: usize) -> Vec<usize> {
    let ceiling = ceiling.max(1);
    let mut sizes = vec![ceiling; pending / ceiling];
    if pending % ceiling != 0 {
        sizes.push(pending % ceiling);
    }
    sizes
}

/// A lookup table created by this resolver and how much of the discovered
/// account list it already holds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LookupTablePacker {
    address: Pubkey,
    packed: usize,
}

impl LookupTablePacker {
    /// Create a fresh, empty table with `payer` as authority.
    pub fn create<C: SolanaConnection>(
        conn: &mut C,
        payer: &Keypair,
        config: &ResolverConfig,
    ) -> Result<Self, ResolveError> {
        let recent_slot = conn
            .get_slot()
            .map_err(|e| ResolveError::Connection(e.to_string()))?;
        let (create_ix, address) = create_lookup_table(payer.pubkey(), payer.pubkey(), recent_slot);

        let sig = send_instructions(conn, payer, &[create_ix], config.max_send_attempts)?;
        info!("Created lookup table {} ({})", address, sig);

        Ok(Self { address, packed: 0 })
    }

    pub fn address(&self) -> Pubkey {
        self.address
    }

    /// Number of addresses already in the table.
    pub fn packed(&self) -> usize {
        self.packed
    }

    /// Extend the table with the not-yet-packed tail of `addresses` while at
    /// least `min_pending` (and at least one) addresses are outstanding.
    ///
    /// Every batch is sent on its own and awaited until the table is active
    /// with exactly the expected length at `finalized`, so the next batch and
    /// the next simulation never race ahead of the table. Returns the batch
    /// sizes in the order they were sent.
    pub fn extend_pending<C, S>(
        &mut self,
        conn: &mut C,
        payer: &Keypair,
        addresses: &[Pubkey],
        min_pending: usize,
        config: &ResolverConfig,
        sleeper: &S,
    ) -> Result<Vec<usize>, ResolveError>
    where
        C: SolanaConnection,
        S: Sleep + ?Sized,
    {
        let min_pending = min_pending.max(1);
        let pending = addresses.len().saturating_sub(self.packed);
        let mut sent = Vec::new();

        for batch_len in batch_sizes(pending, config.max_extend_batch) {
            if addresses.len() - self.packed < min_pending {
                break;
            }
            let end = self.packed + batch_len;
            let batch = addresses[self.packed..end].to_vec();

            let extend_ix =
                extend_lookup_table(self.address, payer.pubkey(), Some(payer.pubkey()), batch);
            let sig = send_instructions(conn, payer, &[extend_ix], config.max_send_attempts)?;
            self.packed = end;
            sent.push(batch_len);
            info!(
                "Extended lookup table {} by {} addresses ({} total, {})",
                self.address, batch_len, self.packed, sig
            );

            self.wait_until_active(conn, config, sleeper)?;
        }

        Ok(sent)
    }

    /// Pack every outstanding address.
    pub fn flush<C, S>(
        &mut self,
        conn: &mut C,
        payer: &Keypair,
        addresses: &[Pubkey],
        config: &ResolverConfig,
        sleeper: &S,
    ) -> Result<Vec<usize>, ResolveError>
    where
        C: SolanaConnection,
        S: Sleep + ?Sized,
    {
        self.extend_pending(conn, payer, addresses, 1, config, sleeper)
    }

    fn wait_until_active<C, S>(
        &self,
        conn: &C,
        config: &ResolverConfig,
        sleeper: &S,
    ) -> Result<(), ResolveError>
    where
        C: SolanaConnection,
        S: Sleep + ?Sized,
    {
        let expected = self.packed;
        poll_until(
            sleeper,
            &config.poll,
            &format!(
                "lookup table {} to hold {} active addresses",
                self.address, expected
            ),
            || {
                let state = conn
                    .get_address_lookup_table(&self.address, CommitmentConfig::finalized())
                    .map_err(|e| ResolveError::Connection(e.to_string()))?;
                Ok(state
                    .filter(|s| s.active && s.addresses.len() == expected)
                    .map(|_| ()))
            },
        )
    }
}
