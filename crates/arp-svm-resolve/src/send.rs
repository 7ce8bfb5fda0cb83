//! Signed transaction submission with retry on blockhash expiry.

use solana_sdk::{
    instruction::Instruction,
    message::{v0, VersionedMessage},
    signature::{Keypair, Signature, Signer},
    transaction::VersionedTransaction,
};
use tracing::warn;

use crate::connection::SolanaConnection;
use crate::ResolveError;

/// Build, sign and send `instructions` as one transaction paid by `payer`.
///
/// A fresh blockhash is fetched for every attempt. Only expiry is retried, up
/// to `max_attempts` sends in total; any other failure is returned as-is.
pub fn send_instructions<C: SolanaConnection>(
    conn: &mut C,
    payer: &Keypair,
    instructions: &[Instruction],
    max_attempts: usize,
) -> Result<Signature, ResolveError> {
    let mut attempt = 0;
    loop {
        attempt += 1;

        let blockhash = conn
            .get_latest_blockhash()
            .map_err(|e| ResolveError::Connection(e.to_string()))?;
        let message = v0::Message::try_compile(&payer.pubkey(), instructions, &[], blockhash)
            .map_err(|e| ResolveError::Compile(e.to_string()))?;
        let tx = VersionedTransaction::try_new(VersionedMessage::V0(message), &[payer])
            .map_err(|e| ResolveError::Compile(e.to_string()))?;

        match conn.send_and_confirm(&tx) {
            Ok(sig) => return Ok(sig),
            Err(e) if C::is_blockhash_expired(&e) && attempt < max_attempts => {
                warn!(
                    "Transaction expired (attempt {}/{}), retrying: {}",
                    attempt, max_attempts, e
                );
            }
            Err(e) => {
                return Err(ResolveError::Send(format!(
                    "attempt {}/{}: {}",
                    attempt, max_attempts, e
                )))
            }
        }
    }
}
