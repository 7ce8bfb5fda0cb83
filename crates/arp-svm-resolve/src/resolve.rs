//! Iterative resolver loop for the Account Resolution Protocol.
//!
//! Repeatedly simulates the `preflight_<name>` variant of an Anchor
//! instruction, appending the accounts each round reports, until the program
//! says nothing more is needed. Optionally packs discovered accounts into an
//! address lookup table so the final instruction can exceed the legacy
//! account-key limit.

use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};
use tracing::debug;

use crate::config::ResolverConfig;
use crate::connection::SolanaConnection;
use crate::discriminator::{discriminator, preflight_discriminator};
use crate::lookup_table::LookupTablePacker;
use crate::payload::parse_simulation;
use crate::poll::{Sleep, ThreadSleep};
use crate::probe::simulate_round;
use crate::ResolveError;

/// Result of running the resolver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedInstruction {
    /// The instruction with its real discriminator and every account, original
    /// accounts first.
    pub ix: Instruction,
    /// The lookup table holding the discovered accounts, if one was created.
    pub lookup_table: Option<Pubkey>,
    /// How many preflight rounds it took to resolve.
    pub rounds: usize,
}

/// Where a resolution run is. Only used for tracing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Discovering,
    ExtendingTable,
    Finalizing,
    Done,
    Failed,
}

/// Everything a round needs to rebuild its instruction from scratch.
struct ResolutionState {
    program_id: Pubkey,
    original_accounts: Vec<AccountMeta>,
    /// Instruction data after the discriminator.
    args: Vec<u8>,
    discovered: Vec<AccountMeta>,
}

impl ResolutionState {
    fn new(ix: &Instruction) -> Result<Self, ResolveError> {
        if ix.data.len() < 8 {
            return Err(ResolveError::InstructionDataTooShort(ix.data.len()));
        }
        Ok(Self {
            program_id: ix.program_id,
            original_accounts: ix.accounts.clone(),
            args: ix.data[8..].to_vec(),
            discovered: Vec::new(),
        })
    }

    fn instruction(&self, discriminator: [u8; 8]) -> Instruction {
        let mut data = Vec::with_capacity(8 + self.args.len());
        data.extend_from_slice(&discriminator);
        data.extend_from_slice(&self.args);

        let mut accounts =
            Vec::with_capacity(self.original_accounts.len() + self.discovered.len());
        accounts.extend_from_slice(&self.original_accounts);
        accounts.extend_from_slice(&self.discovered);

        Instruction {
            program_id: self.program_id,
            accounts,
            data,
        }
    }

    fn discovered_keys(&self) -> Vec<Pubkey> {
        self.discovered.iter().map(|meta| meta.pubkey).collect()
    }
}

/// Drives resolution for one instruction at a time.
///
/// ```ignore
/// let resolved = Resolver::new(&mut rpc_client, &payer)
///     .use_lookup_table(true)
///     .resolve(&ix, "do_thing")?;
/// ```
pub struct Resolver<'a, C, S = ThreadSleep> {
    conn: &'a mut C,
    payer: &'a Keypair,
    config: ResolverConfig,
    sleeper: S,
    verbose: bool,
    use_lookup_table: bool,
}

impl<'a, C: SolanaConnection> Resolver<'a, C> {
    pub fn new(conn: &'a mut C, payer: &'a Keypair) -> Self {
        Self {
            conn,
            payer,
            config: ResolverConfig::default(),
            sleeper: ThreadSleep,
            verbose: false,
            use_lookup_table: false,
        }
    }
}

impl<'a, C: SolanaConnection, S: Sleep> Resolver<'a, C, S> {
    /// Log every simulation's logs and compute usage.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Pack discovered accounts into a lookup table once enough accumulate.
    pub fn use_lookup_table(mut self, use_lookup_table: bool) -> Self {
        self.use_lookup_table = use_lookup_table;
        self
    }

    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_sleeper<T: Sleep>(self, sleeper: T) -> Resolver<'a, C, T> {
        Resolver {
            conn: self.conn,
            payer: self.payer,
            config: self.config,
            sleeper,
            verbose: self.verbose,
            use_lookup_table: self.use_lookup_table,
        }
    }

    /// Resolve the remaining accounts of `ix`, an invocation of the Anchor
    /// instruction `instruction_name`.
    ///
    /// `ix` itself is never modified. Its first 8 data bytes are replaced by
    /// the discriminator of `instruction_name` in the returned instruction.
    pub fn resolve(
        &mut self,
        ix: &Instruction,
        instruction_name: &str,
    ) -> Result<ResolvedInstruction, ResolveError> {
        self.run(ix, instruction_name).inspect_err(|err| {
            debug!("{:?} resolving {}: {}", Phase::Failed, instruction_name, err);
        })
    }

    fn run(
        &mut self,
        ix: &Instruction,
        instruction_name: &str,
    ) -> Result<ResolvedInstruction, ResolveError> {
        let mut state = ResolutionState::new(ix)?;
        let preflight = preflight_discriminator(instruction_name);
        let mut table: Option<LookupTablePacker> = None;
        let mut phase = Phase::Discovering;

        for round in 1..=self.config.max_rounds {
            let round_ix = state.instruction(preflight);
            let table_address = table.as_ref().map(LookupTablePacker::address);
            let outcome = simulate_round(
                &*self.conn,
                &self.payer.pubkey(),
                &[round_ix],
                self.verbose,
                table_address.as_ref(),
                &self.config,
                &self.sleeper,
            )?;
            let response = parse_simulation(&outcome)?;

            debug!(
                "Round {} ({:?}): {} new accounts, has_more={}",
                round,
                phase,
                response.accounts.len(),
                response.has_more
            );
            state.discovered.extend(response.accounts);

            if self.use_lookup_table
                && state.discovered.len() >= self.config.lookup_table_threshold
            {
                phase = Phase::ExtendingTable;
                debug!("{:?} at {} discovered accounts", phase, state.discovered.len());

                if table.is_none() {
                    table = Some(LookupTablePacker::create(
                        &mut *self.conn,
                        self.payer,
                        &self.config,
                    )?);
                }
                if let Some(packer) = table.as_mut() {
                    packer.extend_pending(
                        &mut *self.conn,
                        self.payer,
                        &state.discovered_keys(),
                        self.config.lookup_table_threshold,
                        &self.config,
                        &self.sleeper,
                    )?;
                }
                phase = Phase::Discovering;
            }

            if !response.has_more {
                phase = Phase::Finalizing;
                debug!("{:?} after {} rounds", phase, round);
                if let Some(packer) = table.as_mut() {
                    packer.flush(
                        &mut *self.conn,
                        self.payer,
                        &state.discovered_keys(),
                        &self.config,
                        &self.sleeper,
                    )?;
                }

                phase = Phase::Done;
                debug!(
                    "{:?}: {} accounts discovered",
                    phase,
                    state.discovered.len()
                );
                return Ok(ResolvedInstruction {
                    ix: state.instruction(discriminator(instruction_name)),
                    lookup_table: table.map(|t| t.address()),
                    rounds: round,
                });
            }
        }

        Err(ResolveError::IterationLimitExceeded {
            limit: self.config.max_rounds,
        })
    }
}

/// Resolve the remaining accounts of `ix` with default settings.
///
/// Convenience wrapper around [`Resolver`].
pub fn resolve_additional_accounts<C: SolanaConnection>(
    conn: &mut C,
    payer: &Keypair,
    ix: &Instruction,
    instruction_name: &str,
    verbose: bool,
    use_lookup_table: bool,
) -> Result<ResolvedInstruction, ResolveError> {
    Resolver::new(conn, payer)
        .verbose(verbose)
        .use_lookup_table(use_lookup_table)
        .resolve(ix, instruction_name)
}
