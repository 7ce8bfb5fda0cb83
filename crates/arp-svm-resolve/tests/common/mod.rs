//! Scripted in-memory [`SolanaConnection`] for driving the resolver in tests.
//!
//! Preflight simulations answer from a queue of scripted rounds. Sent
//! transactions are inspected for address lookup table instructions, which
//! are applied to an in-memory table map so the packer can observe them.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use arp_svm_resolve::{
    LookupTableState, PreflightResponse, SimulationOutcome, Sleep, SolanaConnection,
};
use base64::Engine;
use solana_sdk::{
    address_lookup_table,
    clock::Slot,
    commitment_config::CommitmentConfig,
    hash::Hash,
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    signature::Signature,
    transaction::VersionedTransaction,
};

const CREATE_LOOKUP_TABLE_TAG: u32 = 0;
const EXTEND_LOOKUP_TABLE_TAG: u32 = 2;

/// Error returned by [`ScriptedConnection`].
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct MockError {
    pub message: String,
    pub expired: bool,
}

impl MockError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            expired: false,
        }
    }
}

/// One scripted answer to a preflight simulation.
#[derive(Clone, Debug)]
pub enum Script {
    Respond(PreflightResponse),
    Logs(Option<Vec<String>>),
    Fail(String),
}

pub fn respond(accounts: Vec<AccountMeta>, has_more: bool) -> Script {
    Script::Respond(PreflightResponse { accounts, has_more })
}

/// Log lines a cooperating program emits for `response`.
pub fn preflight_logs(program_id: &Pubkey, response: &PreflightResponse) -> Vec<String> {
    let payload = response.encode().expect("encodable response");
    vec![
        format!("Program {} invoke [1]", program_id),
        "Program log: Instruction: Preflight".to_string(),
        format!(
            "Program data: {}",
            base64::engine::general_purpose::STANDARD.encode(payload)
        ),
        format!("Program {} success", program_id),
    ]
}

pub struct ScriptedConnection {
    pub program_id: Pubkey,
    pub script: RefCell<VecDeque<Script>>,
    /// Answer used once the script runs dry.
    pub fallback: Option<Script>,
    pub simulated: RefCell<Vec<VersionedTransaction>>,
    pub sent: Vec<VersionedTransaction>,
    pub tables: HashMap<Pubkey, LookupTableState>,
    pub extend_batches: Vec<usize>,
    pub table_lookups: RefCell<Vec<(Pubkey, CommitmentConfig)>>,
    /// Lookup table reads that still answer "not found".
    pub hidden_lookups: Cell<usize>,
    /// Sends that still fail with an expired blockhash.
    pub expire_sends: usize,
    /// Fail every send with a non-retryable error.
    pub reject_sends: bool,
    /// Report every table as deactivated.
    pub deactivated_tables: bool,
    pub blockhash_calls: Cell<usize>,
    pub slot: Slot,
}

impl ScriptedConnection {
    pub fn new(program_id: Pubkey, script: Vec<Script>) -> Self {
        Self {
            program_id,
            script: RefCell::new(script.into()),
            fallback: None,
            simulated: RefCell::new(Vec::new()),
            sent: Vec::new(),
            tables: HashMap::new(),
            extend_batches: Vec::new(),
            table_lookups: RefCell::new(Vec::new()),
            hidden_lookups: Cell::new(0),
            expire_sends: 0,
            reject_sends: false,
            deactivated_tables: false,
            blockhash_calls: Cell::new(0),
            slot: 1_000,
        }
    }

    pub fn simulation_count(&self) -> usize {
        self.simulated.borrow().len()
    }

    /// Data and account count of the target program's instruction in the
    /// `round`-th simulation.
    pub fn simulated_program_ix(&self, round: usize) -> (Vec<u8>, usize) {
        let simulated = self.simulated.borrow();
        let tx = &simulated[round];
        let keys = tx.message.static_account_keys();
        tx.message
            .instructions()
            .iter()
            .find(|ix| keys[usize::from(ix.program_id_index)] == self.program_id)
            .map(|ix| (ix.data.clone(), ix.accounts.len()))
            .expect("target program instruction in simulation")
    }

    /// Program ids of every instruction in the `round`-th simulation.
    pub fn simulated_program_ids(&self, round: usize) -> Vec<Pubkey> {
        let simulated = self.simulated.borrow();
        let tx = &simulated[round];
        let keys = tx.message.static_account_keys();
        tx.message
            .instructions()
            .iter()
            .map(|ix| keys[usize::from(ix.program_id_index)])
            .collect()
    }

    pub fn simulation_used_lookup_table(&self, round: usize) -> bool {
        self.simulated.borrow()[round]
            .message
            .address_table_lookups()
            .is_some_and(|lookups| !lookups.is_empty())
    }

    fn apply_lookup_table_ix(&mut self, table: Pubkey, data: &[u8]) {
        let mut tag = [0u8; 4];
        tag.copy_from_slice(&data[0..4]);

        match u32::from_le_bytes(tag) {
            CREATE_LOOKUP_TABLE_TAG => {
                self.tables.insert(
                    table,
                    LookupTableState {
                        addresses: Vec::new(),
                        active: true,
                    },
                );
            }
            EXTEND_LOOKUP_TABLE_TAG => {
                let mut len = [0u8; 8];
                len.copy_from_slice(&data[4..12]);
                let count = u64::from_le_bytes(len) as usize;
                let new_addresses: Vec<Pubkey> = (0..count)
                    .map(|i| {
                        let start = 12 + i * 32;
                        let mut key = [0u8; 32];
                        key.copy_from_slice(&data[start..start + 32]);
                        Pubkey::new_from_array(key)
                    })
                    .collect();
                self.extend_batches.push(new_addresses.len());
                self.tables
                    .get_mut(&table)
                    .expect("extend of unknown table")
                    .addresses
                    .extend(new_addresses);
            }
            other => panic!("unexpected lookup table instruction {}", other),
        }
    }
}

impl SolanaConnection for ScriptedConnection {
    type Error = MockError;

    fn get_latest_blockhash(&self) -> Result<Hash, Self::Error> {
        self.blockhash_calls.set(self.blockhash_calls.get() + 1);
        Ok(Hash::default())
    }

    fn get_slot(&self) -> Result<Slot, Self::Error> {
        Ok(self.slot)
    }

    fn simulate(&self, tx: &VersionedTransaction) -> Result<SimulationOutcome, Self::Error> {
        self.simulated.borrow_mut().push(tx.clone());

        let next = self
            .script
            .borrow_mut()
            .pop_front()
            .or_else(|| self.fallback.clone())
            .ok_or_else(|| MockError::new("script exhausted"))?;

        match next {
            Script::Respond(response) => Ok(SimulationOutcome {
                logs: Some(preflight_logs(&self.program_id, &response)),
                units_consumed: Some(5_000),
                err: None,
            }),
            Script::Logs(logs) => Ok(SimulationOutcome {
                logs,
                units_consumed: None,
                err: Some("InstructionError(2, Custom(1))".to_string()),
            }),
            Script::Fail(message) => Err(MockError::new(message)),
        }
    }

    fn send_and_confirm(&mut self, tx: &VersionedTransaction) -> Result<Signature, Self::Error> {
        if self.reject_sends {
            return Err(MockError::new("insufficient funds for fee"));
        }
        if self.expire_sends > 0 {
            self.expire_sends -= 1;
            return Err(MockError {
                message: "blockhash not found".to_string(),
                expired: true,
            });
        }

        let keys = tx.message.static_account_keys().to_vec();
        for ix in tx.message.instructions() {
            if keys[usize::from(ix.program_id_index)] == address_lookup_table::program::id() {
                self.apply_lookup_table_ix(keys[usize::from(ix.accounts[0])], &ix.data);
            }
        }
        self.sent.push(tx.clone());
        Ok(tx.signatures[0])
    }

    fn get_address_lookup_table(
        &self,
        address: &Pubkey,
        commitment: CommitmentConfig,
    ) -> Result<Option<LookupTableState>, Self::Error> {
        self.table_lookups.borrow_mut().push((*address, commitment));
        if self.hidden_lookups.get() > 0 {
            self.hidden_lookups.set(self.hidden_lookups.get() - 1);
            return Ok(None);
        }
        Ok(self.tables.get(address).cloned().map(|mut state| {
            state.active &= !self.deactivated_tables;
            state
        }))
    }

    fn is_blockhash_expired(err: &Self::Error) -> bool {
        err.expired
    }
}

/// Sleeper that records requested naps instead of sleeping.
#[derive(Default)]
pub struct RecordingSleep(pub RefCell<Vec<Duration>>);

impl Sleep for RecordingSleep {
    fn sleep(&self, duration: Duration) {
        self.0.borrow_mut().push(duration);
    }
}

/// An invocation of `do_thing` with a signer and one known account.
pub fn candidate_ix(program_id: Pubkey, payer: Pubkey, name: &str) -> Instruction {
    let mut data = arp_svm_resolve::discriminator(name).to_vec();
    data.extend_from_slice(&[1, 2, 3, 4]);
    Instruction {
        program_id,
        accounts: vec![
            AccountMeta::new(payer, true),
            AccountMeta::new_readonly(Pubkey::new_unique(), false),
        ],
        data,
    }
}

pub fn unique_accounts(count: usize) -> Vec<AccountMeta> {
    (0..count)
        .map(|i| {
            if i % 2 == 0 {
                AccountMeta::new(Pubkey::new_unique(), false)
            } else {
                AccountMeta::new_readonly(Pubkey::new_unique(), false)
            }
        })
        .collect()
}
