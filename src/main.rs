use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::{rngs::OsRng, RngCore};
use serde::Serialize;
use tracing::info;

use meme_court::{
    config::{CliOverrides, Config},
    logging::init_logging_with_config,
    store::SnapshotStore,
    submission::read_submissions,
    Address, CallContext, ErrorKind, LedgerEvent, LedgerState, Timestamp,
};

//==================== CLI ====================//

#[derive(Parser, Debug)]
#[command(name = "meme-court")]
#[command(author, version, about = "Local host for the meme-court voting ledger", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Ledger snapshot file (overrides config)
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    /// trace, debug, info, warn, error (overrides config)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate an ed25519 keypair and print its address
    Keygen {
        #[arg(long)]
        out_dir: PathBuf,
    },
    /// Print the address of a hex-encoded ed25519 public key
    Address { pk_hex: String },
    /// Create an empty ledger owned by OWNER
    Init {
        #[arg(long)]
        owner: Option<Address>,
    },
    /// Apply submissions from a JSONL file, one per line, in file order
    Apply { ops: PathBuf },
    /// Tallies for a post
    Stats { post_id: String },
    /// Registration record of a post
    Post { post_id: String },
    /// A voter's vote on a post
    Vote { voter: Address, post_id: String },
    /// Posts a user has voted on, in voting order
    User { user: Address },
    /// Global counters, owner and pause flag
    Totals,
    /// Notifications from sequence number SINCE onward
    Events {
        #[arg(long, default_value_t = 0)]
        since: u64,
    },
    /// Load and validate the snapshot, print its root
    Verify,
}

//==================== Wire types ====================//

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum SubmissionResult {
    Ok {
        line: usize,
        op: &'static str,
        event: Option<LedgerEvent>,
    },
    Rejected {
        line: usize,
        op: &'static str,
        kind: ErrorKind,
        error: String,
    },
}

#[derive(Serialize)]
struct TotalsReport {
    total_posts: u64,
    total_votes: u64,
    owner: Address,
    paused: bool,
    height: u64,
}

//==================== helpers ====================//

fn now_secs() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn write_all(p: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = p.parent() {
        fs::create_dir_all(parent).with_context(|| format!("mkdir {}", parent.display()))?;
    }
    let mut f = fs::File::create(p).with_context(|| format!("create {}", p.display()))?;
    f.write_all(bytes)
        .with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

//==================== commands ====================//

fn keygen_cmd(out_dir: &Path) -> Result<()> {
    fs::create_dir_all(out_dir).with_context(|| format!("mkdir {}", out_dir.display()))?;

    let mut sk_bytes = [0u8; 32];
    OsRng.fill_bytes(&mut sk_bytes);
    let sk = SigningKey::from_bytes(&sk_bytes);
    let pk = sk.verifying_key();
    let address = Address::from_verifying_key(&pk);

    write_all(&out_dir.join("sk.hex"), hex::encode(sk_bytes).as_bytes())?;
    write_all(&out_dir.join("pk.hex"), hex::encode(pk.as_bytes()).as_bytes())?;
    write_all(&out_dir.join("address"), address.to_string().as_bytes())?;
    println!("{address}");
    info!(out_dir = %out_dir.display(), %address, "Keypair written");
    Ok(())
}

fn address_cmd(pk_hex: &str) -> Result<()> {
    let bytes = hex::decode(pk_hex.trim()).context("public key is not valid hex")?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|b: Vec<u8>| anyhow::anyhow!("public key must be 32 bytes, got {}", b.len()))?;
    let pk = VerifyingKey::from_bytes(&bytes).context("not a valid ed25519 public key")?;
    println!("{}", Address::from_verifying_key(&pk));
    Ok(())
}

fn init_cmd(store: &SnapshotStore, owner: Address) -> Result<()> {
    let ledger = LedgerState::new(owner);
    store.create(&ledger)?;
    info!(path = %store.path().display(), %owner, "Ledger initialized");
    println!("{}", hex::encode(ledger.state_root()));
    Ok(())
}

fn apply_cmd(store: &SnapshotStore, ops: &Path) -> Result<()> {
    // the whole batch must parse before anything is applied
    let submissions =
        read_submissions(ops).with_context(|| format!("batch {}", ops.display()))?;
    let mut ledger = store.load()?;

    let mut accepted = 0usize;
    for (line, sub) in &submissions {
        let ctx = CallContext::new(sub.caller, sub.timestamp.unwrap_or_else(now_secs));
        let result = match ledger.apply(&ctx, &sub.op) {
            Ok(event) => {
                accepted += 1;
                SubmissionResult::Ok {
                    line: *line,
                    op: sub.op.name(),
                    event,
                }
            }
            Err(err) => SubmissionResult::Rejected {
                line: *line,
                op: sub.op.name(),
                kind: err.kind(),
                error: err.to_string(),
            },
        };
        println!("{}", serde_json::to_string(&result)?);
    }

    store.save(&ledger)?;
    info!(
        submitted = submissions.len(),
        accepted,
        height = ledger.meta().height,
        "Batch applied"
    );
    Ok(())
}

fn verify_cmd(store: &SnapshotStore) -> Result<()> {
    let ledger = store.load()?;
    println!(
        "height={} root={}",
        ledger.meta().height,
        hex::encode(ledger.state_root())
    );
    Ok(())
}

//==================== main ====================//

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_cli(CliOverrides {
        state_path: cli.state,
        log_level: cli.log_level,
        json_logs: cli.json_logs,
    })?;
    init_logging_with_config(config.log_config())?;

    let store = SnapshotStore::new(&config.ledger.state_path);

    match cli.command {
        Command::Keygen { out_dir } => keygen_cmd(&out_dir),
        Command::Address { pk_hex } => address_cmd(&pk_hex),
        Command::Init { owner } => {
            let Some(owner) = owner.or(config.ledger.owner) else {
                bail!("no owner given: pass --owner or set ledger.owner");
            };
            init_cmd(&store, owner)
        }
        Command::Apply { ops } => apply_cmd(&store, &ops),
        Command::Stats { post_id } => print_json(&store.load()?.query().post_stats(&post_id)),
        Command::Post { post_id } => {
            let ledger = store.load()?;
            match ledger.query().post(&post_id) {
                Some(post) => print_json(post),
                None => bail!("post {post_id} is not registered"),
            }
        }
        Command::Vote { voter, post_id } => {
            print_json(&store.load()?.query().vote(&voter, &post_id))
        }
        Command::User { user } => {
            print_json(&store.load()?.query().user_voted_posts(&user))
        }
        Command::Totals => {
            let ledger = store.load()?;
            let query = ledger.query();
            print_json(&TotalsReport {
                total_posts: query.total_posts(),
                total_votes: query.total_votes(),
                owner: query.owner(),
                paused: query.is_paused(),
                height: ledger.meta().height,
            })
        }
        Command::Events { since } => {
            let ledger = store.load()?;
            for entry in ledger.events().since(since) {
                println!("{}", serde_json::to_string(&entry)?);
            }
            Ok(())
        }
        Command::Verify => verify_cmd(&store),
    }
}
