//! One non-committing preflight simulation round.

use solana_sdk::{
    address_lookup_table::AddressLookupTableAccount,
    commitment_config::CommitmentConfig,
    compute_budget::ComputeBudgetInstruction,
    instruction::Instruction,
    message::{v0, VersionedMessage},
    pubkey::Pubkey,
    signature::Signature,
    transaction::VersionedTransaction,
};
use tracing::info;

use crate::config::ResolverConfig;
use crate::connection::{SimulationOutcome, SolanaConnection};
use crate::poll::{poll_until, Sleep};
use crate::ResolveError;

/// Compute-budget instructions put in front of every preflight simulation.
/// Account discovery can be expensive, so ask for the maximum.
pub fn compute_budget_instructions(config: &ResolverConfig) -> [Instruction; 2] {
    [
        ComputeBudgetInstruction::set_compute_unit_limit(config.compute_unit_limit),
        ComputeBudgetInstruction::request_heap_frame(config.heap_frame_bytes),
    ]
}

/// Simulate `instructions` (after the compute-budget prelude) with `payer` as
/// fee payer and return what the node reported.
///
/// With a `lookup_table`, waits until the table is visible at `confirmed`
/// and compresses account keys through it. The payload is not decoded here.
pub fn simulate_round<C, S>(
    conn: &C,
    payer: &Pubkey,
    instructions: &[Instruction],
    verbose: bool,
    lookup_table: Option<&Pubkey>,
    config: &ResolverConfig,
    sleeper: &S,
) -> Result<SimulationOutcome, ResolveError>
where
    C: SolanaConnection,
    S: Sleep + ?Sized,
{
    let lookup_tables = match lookup_table {
        Some(address) => {
            let state = poll_until(
                sleeper,
                &config.poll,
                &format!("lookup table {} to become visible", address),
                || {
                    conn.get_address_lookup_table(address, CommitmentConfig::confirmed())
                        .map_err(|e| ResolveError::Connection(e.to_string()))
                },
            )?;
            vec![AddressLookupTableAccount {
                key: *address,
                addresses: state.addresses,
            }]
        }
        None => Vec::new(),
    };

    let mut ixs = compute_budget_instructions(config).to_vec();
    ixs.extend_from_slice(instructions);

    let blockhash = conn
        .get_latest_blockhash()
        .map_err(|e| ResolveError::Connection(e.to_string()))?;
    let message = v0::Message::try_compile(payer, &ixs, &lookup_tables, blockhash)
        .map_err(|e| ResolveError::Compile(e.to_string()))?;

    // Signatures are never verified during preflight, placeholders suffice.
    let num_signers = usize::from(message.header.num_required_signatures);
    let tx = VersionedTransaction {
        signatures: vec![Signature::default(); num_signers],
        message: VersionedMessage::V0(message),
    };

    let outcome = conn
        .simulate(&tx)
        .map_err(|e| ResolveError::Simulation(e.to_string()))?;

    if verbose {
        info!(
            "Preflight simulation consumed {:?} units (error: {:?})",
            outcome.units_consumed, outcome.err
        );
        for log in outcome.logs.iter().flatten() {
            info!("  SIM LOG: {}", log);
        }
    }

    Ok(outcome)
}
