use std::io::{self, IsTerminal, Read};
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use arp_svm_resolve::{
    discriminator, preflight_discriminator, PreflightResponse, ResolvedInstruction, Resolver,
    ResolverConfig,
};
use base64::Engine;
use clap::{Parser, Subcommand};
use serde::Serialize;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::read_keypair_file;

#[derive(Parser)]
#[command(name = "arp")]
#[command(about = "Resolve remaining accounts for Anchor instructions")]
struct Cli {
    /// Solana RPC URL
    #[arg(
        long,
        env = "SOLANA_RPC_URL",
        default_value = "https://api.devnet.solana.com",
        global = true
    )]
    rpc_url: String,

    /// Log simulation output and resolver progress
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve the remaining accounts of an instruction
    ///
    /// Examples:
    ///   arp resolve --name do_thing --data 0102 --account <PAYER>:w:s
    ///   arp resolve --name settle --account <VAULT>:w --lookup-table
    Resolve {
        /// Program ID implementing the preflight instruction
        #[arg(long, env = "PROGRAM_ID")]
        program_id: String,

        /// Payer keypair file
        #[arg(long, env = "PAYER_KEYPAIR")]
        payer: String,

        /// Anchor instruction name, e.g. `do_thing`
        #[arg(long)]
        name: String,

        /// Instruction arguments after the discriminator (hex)
        #[arg(long, default_value = "")]
        data: String,

        /// Known account as PUBKEY[:w][:s] (writable, signer); repeatable
        #[arg(long = "account")]
        accounts: Vec<String>,

        /// Pack discovered accounts into an address lookup table
        #[arg(long)]
        lookup_table: bool,

        /// Give up after this many preflight rounds
        #[arg(long)]
        max_rounds: Option<usize>,
    },

    /// Print the real and preflight discriminators of an instruction
    Discriminator {
        /// Anchor instruction name
        name: String,
    },

    /// Decode a preflight payload (base64 string, @file, or stdin)
    Decode { payload: Option<String> },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    match &cli.command {
        Command::Resolve {
            program_id,
            payer,
            name,
            data,
            accounts,
            lookup_table,
            max_rounds,
        } => cmd_resolve(
            &cli,
            ResolveArgs {
                program_id,
                payer_path: payer,
                name,
                data,
                accounts,
                lookup_table: *lookup_table,
                max_rounds: *max_rounds,
            },
        ),
        Command::Discriminator { name } => cmd_discriminator(name),
        Command::Decode { payload } => cmd_decode(payload.clone()),
    }
}

struct ResolveArgs<'a> {
    program_id: &'a str,
    payer_path: &'a str,
    name: &'a str,
    data: &'a str,
    accounts: &'a [String],
    lookup_table: bool,
    max_rounds: Option<usize>,
}

fn cmd_resolve(cli: &Cli, args: ResolveArgs<'_>) -> Result<()> {
    let payer = read_keypair_file(args.payer_path)
        .map_err(|e| anyhow::anyhow!("failed to read payer keypair: {}", e))?;
    let program_id = Pubkey::from_str(args.program_id).context("invalid program ID")?;
    let accounts = args
        .accounts
        .iter()
        .map(|spec| parse_account_meta(spec))
        .collect::<Result<Vec<_>>>()?;

    let mut data = discriminator(args.name).to_vec();
    data.extend(hex::decode(args.data.trim()).context("decoding instruction data")?);
    let ix = Instruction {
        program_id,
        accounts,
        data,
    };

    let mut config = ResolverConfig::default();
    if let Some(max_rounds) = args.max_rounds {
        config.max_rounds = max_rounds;
    }

    let mut rpc_client = solana_client::rpc_client::RpcClient::new(&cli.rpc_url);

    eprintln!("Resolving {} on {}...", args.name, program_id);
    eprintln!("  Payer: {}", solana_sdk::signer::Signer::pubkey(&payer));
    eprintln!("  Known accounts: {}", ix.accounts.len());
    eprintln!("  RPC: {}", cli.rpc_url);

    let resolved = Resolver::new(&mut rpc_client, &payer)
        .verbose(cli.verbose)
        .use_lookup_table(args.lookup_table)
        .with_config(config)
        .resolve(&ix, args.name)?;

    eprintln!(
        "Resolved {} accounts in {} rounds",
        resolved.ix.accounts.len(),
        resolved.rounds
    );
    println!(
        "{}",
        serde_json::to_string_pretty(&ResolvedJson::from(&resolved))?
    );
    Ok(())
}

fn cmd_discriminator(name: &str) -> Result<()> {
    println!("{}", hex::encode(discriminator(name)));
    println!("{}", hex::encode(preflight_discriminator(name)));
    Ok(())
}

fn cmd_decode(arg: Option<String>) -> Result<()> {
    let raw = read_input(arg)?;
    let response = PreflightResponse::decode(&raw)?;

    for line in format_decoded(&raw, &response) {
        println!("{}", line);
    }
    Ok(())
}

/// Lines printed by `arp decode`: the header fields read from `raw`, then
/// one line per account.
fn format_decoded(raw: &[u8], response: &PreflightResponse) -> Vec<String> {
    let mut lines = vec![
        format!("version:  {}", raw.first().copied().unwrap_or_default()),
        format!("has_more: {}", response.has_more),
        format!("accounts: {}", response.accounts.len()),
    ];
    lines.extend(response.accounts.iter().map(|meta| {
        format!(
            "{}{}",
            meta.pubkey,
            if meta.is_writable { " (writable)" } else { "" }
        )
    }));
    lines
}

/// Parse `PUBKEY[:w][:s]` into an account meta.
fn parse_account_meta(spec: &str) -> Result<AccountMeta> {
    let mut parts = spec.split(':');
    let pubkey = parts.next().unwrap_or_default();
    let pubkey =
        Pubkey::from_str(pubkey).with_context(|| format!("invalid account address: {}", spec))?;

    let mut is_writable = false;
    let mut is_signer = false;
    for flag in parts {
        match flag {
            "w" => is_writable = true,
            "s" => is_signer = true,
            other => bail!("unknown account flag '{}' in {}; expected w or s", other, spec),
        }
    }

    Ok(AccountMeta {
        pubkey,
        is_signer,
        is_writable,
    })
}

/// Read a base64 payload from the argument, an @file reference, or stdin.
fn read_input(arg: Option<String>) -> Result<Vec<u8>> {
    let text = match arg {
        Some(s) if s.starts_with('@') => {
            let path = &s[1..];
            std::fs::read_to_string(path).with_context(|| format!("reading file: {}", path))?
        }
        Some(s) => s,
        None => {
            if io::stdin().is_terminal() {
                bail!("no payload provided; pass as argument, @file, or pipe to stdin");
            }
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    base64::engine::general_purpose::STANDARD
        .decode(text.trim())
        .context("decoding base64 payload")
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResolvedJson {
    ix: InstructionJson,
    lookup_table: Option<String>,
    rounds: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InstructionJson {
    program_id: String,
    keys: Vec<AccountMetaJson>,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AccountMetaJson {
    pubkey: String,
    is_signer: bool,
    is_writable: bool,
}

impl From<&ResolvedInstruction> for ResolvedJson {
    fn from(resolved: &ResolvedInstruction) -> Self {
        Self {
            ix: InstructionJson {
                program_id: resolved.ix.program_id.to_string(),
                keys: resolved
                    .ix
                    .accounts
                    .iter()
                    .map(|meta| AccountMetaJson {
                        pubkey: meta.pubkey.to_string(),
                        is_signer: meta.is_signer,
                        is_writable: meta.is_writable,
                    })
                    .collect(),
                data: base64::engine::general_purpose::STANDARD.encode(&resolved.ix.data),
            },
            lookup_table: resolved.lookup_table.map(|table| table.to_string()),
            rounds: resolved.rounds,
        }
    }
}
