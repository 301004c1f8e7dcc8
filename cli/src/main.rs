//! scriptgate command-line runner.
//!
//! Validates and runs script directories through the full engine pipeline
//! (security gate, schema checks, credential resolution, timeout), plus the
//! operator tools around it: TOTP codes, signed assertions, and journal
//! checks.
//!
//! Usage:
//!   scriptgate validate ./scripts/award-search
//!   scriptgate run ./scripts/award-search --inputs inputs.json --journal runs.jsonl
//!   scriptgate totp generate --secret JBSWY3DPEHPK3PXP
//!   scriptgate assertion issue --user +14155550123
//!   scriptgate journal verify runs.jsonl
//!   scriptgate demo

mod settings;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

use scriptgate_contracts::error::{ScriptGateError, ScriptGateResult};
use scriptgate_core::{loader::ProcessLoader, Engine};
use scriptgate_credentials::ChainedResolver;
use scriptgate_journal::{read_entries, verify_chain, JsonlJournal};
use scriptgate_ref_scripts::{scenarios, scripts};
use scriptgate_security::{
    create_assertion,
    totp::{self, DEFAULT_DIGITS, DEFAULT_DRIFT_STEPS, DEFAULT_PERIOD},
    AssertionRequest, SecurityGate,
};
use scriptgate_verify::JsonSchemaValidator;

use settings::Settings;

// ── CLI definition ────────────────────────────────────────────────────────────

/// scriptgate: gated execution of automation scripts.
#[derive(Parser)]
#[command(
    name = "scriptgate",
    about = "Validate and run automation scripts behind a human-verification gate",
    long_about = "Runs script directories through manifest and schema checks, the security\n\
                  gate, credential resolution, and a wall-clock timeout. Every run prints\n\
                  a JSON envelope."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check a script directory's manifest, schemas, and entrypoint.
    Validate {
        script_dir: PathBuf,
    },
    /// Run a script directory and print its envelope.
    Run(RunArgs),
    /// Generate or check TOTP codes.
    Totp {
        #[command(subcommand)]
        command: TotpCommand,
    },
    /// Issue signed security assertions.
    Assertion {
        #[command(subcommand)]
        command: AssertionCommand,
    },
    /// Inspect run journals.
    Journal {
        #[command(subcommand)]
        command: JournalCommand,
    },
    /// Run the reference scenarios against scratch script directories.
    Demo,
}

#[derive(Args)]
struct RunArgs {
    script_dir: PathBuf,
    /// JSON file with the script inputs. Defaults to `{}`.
    #[arg(long)]
    inputs: Option<PathBuf>,
    /// scriptgate TOML configuration.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Append the envelope to this JSONL journal.
    #[arg(long)]
    journal: Option<PathBuf>,
}

#[derive(Subcommand)]
enum TotpCommand {
    /// Print the code for the current time step.
    Generate {
        #[arg(long)]
        secret: String,
        /// Unix timestamp to generate for. Defaults to now.
        #[arg(long)]
        at: Option<i64>,
        #[arg(long, default_value_t = DEFAULT_PERIOD)]
        period: u64,
        #[arg(long, default_value_t = DEFAULT_DIGITS)]
        digits: u32,
    },
    /// Check a code against the secret, allowing clock drift.
    Verify {
        #[arg(long)]
        secret: String,
        #[arg(long)]
        code: String,
        #[arg(long)]
        at: Option<i64>,
        /// Steps accepted on either side of now. Capped at 10.
        #[arg(long, default_value_t = DEFAULT_DRIFT_STEPS)]
        drift: u32,
    },
}

#[derive(Subcommand)]
enum AssertionCommand {
    /// Sign an assertion that `user` just verified out of band.
    Issue {
        #[arg(long)]
        user: String,
        /// Signing key. Defaults to the configured gate key.
        #[arg(long)]
        signing_key: Option<String>,
        #[arg(long)]
        method: Option<String>,
        #[arg(long)]
        ttl_secs: Option<i64>,
        #[arg(long)]
        session_binding: Option<String>,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum JournalCommand {
    /// Re-hash every entry and check the chain links.
    Verify { path: PathBuf },
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Set RUST_LOG=debug for per-stage engine logs.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Validate { script_dir } => validate(&script_dir),
        Command::Run(args) => run(args).await,
        Command::Totp { command } => run_totp(command),
        Command::Assertion { command } => run_assertion(command),
        Command::Journal { command } => run_journal(command),
        Command::Demo => run_demo().await,
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("scriptgate error: {}", e);
            std::process::exit(2);
        }
    }
}

/// Every command returns `Ok(false)` when it completed but the outcome was
/// negative (blocked run, wrong code, broken chain).
type Outcome = ScriptGateResult<bool>;

// ── Engine wiring ─────────────────────────────────────────────────────────────

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Registered reference scripts first; anything else runs as a child process.
fn build_engine(settings: &Settings) -> Engine {
    let loader = scripts::registry().with_fallback(Box::new(ProcessLoader::new()));
    Engine::new(
        settings.engine.clone(),
        Box::new(SecurityGate::new(settings.gate.clone())),
        Box::new(JsonSchemaValidator::new()),
        Box::new(loader),
        Arc::new(ChainedResolver::from_env(settings.credentials.clone())),
    )
}

fn validate(script_dir: &Path) -> Outcome {
    let settings = Settings::load(None, env_lookup)?;
    let manifest = build_engine(&settings).validate_script(script_dir)?;
    print_json(&json!({ "ok": true, "manifest": manifest }))?;
    Ok(true)
}

async fn run(args: RunArgs) -> Outcome {
    let settings = Settings::load(args.config.as_deref(), env_lookup)?;
    let inputs = match &args.inputs {
        Some(path) => read_inputs(path)?,
        None => json!({}),
    };

    let mut engine = build_engine(&settings);
    if let Some(path) = &args.journal {
        engine = engine.with_sink(Box::new(JsonlJournal::open(path)?));
    }

    let envelope = engine.run(&args.script_dir, inputs).await;
    info!(run_id = %envelope.run_id, ok = envelope.ok, "run finished");
    print_json(&envelope)?;
    Ok(envelope.ok)
}

fn read_inputs(path: &Path) -> ScriptGateResult<Value> {
    let raw = std::fs::read_to_string(path).map_err(|e| ScriptGateError::Config {
        reason: format!("failed to read inputs '{}': {}", path.display(), e),
    })?;
    serde_json::from_str(&raw).map_err(|e| ScriptGateError::Config {
        reason: format!("inputs '{}' are not valid JSON: {}", path.display(), e),
    })
}

// ── Operator tools ────────────────────────────────────────────────────────────

fn run_totp(command: TotpCommand) -> Outcome {
    let now = Utc::now().timestamp();
    match command {
        TotpCommand::Generate { secret, at, period, digits } => {
            let code = totp::generate_totp(&secret, at.unwrap_or(now), period, digits)
                .map_err(|e| ScriptGateError::Config { reason: e.to_string() })?;
            println!("{code}");
            Ok(true)
        }
        TotpCommand::Verify { secret, code, at, drift } => {
            let valid = totp::verify_totp(&secret, &code, at.unwrap_or(now), drift);
            println!("{}", if valid { "valid" } else { "invalid" });
            Ok(valid)
        }
    }
}

fn run_assertion(command: AssertionCommand) -> Outcome {
    let AssertionCommand::Issue { user, signing_key, method, ttl_secs, session_binding, config } =
        command;
    let settings = Settings::load(config.as_deref(), env_lookup)?;
    let key = match signing_key {
        Some(key) => key,
        None => settings.gate.signing_key().map(str::to_string).ok_or_else(|| {
            ScriptGateError::Config {
                reason: "no signing key: pass --signing-key or set SCRIPTGATE_SIGNING_KEY"
                    .to_string(),
            }
        })?,
    };

    let mut request =
        AssertionRequest::new(user).with_ttl_secs(ttl_secs.unwrap_or(settings.gate.assertion_ttl_secs));
    if let Some(method) = method {
        request = request.with_method(method);
    }
    if let Some(binding) = session_binding {
        request = request.with_session_binding(binding);
    }

    let assertion = create_assertion(&request, &key, Utc::now().timestamp())
        .map_err(|e| ScriptGateError::Config { reason: format!("cannot issue assertion: {e}") })?;
    print_json(&assertion)?;
    Ok(true)
}

fn run_journal(command: JournalCommand) -> Outcome {
    let JournalCommand::Verify { path } = command;
    let entries = read_entries(&path)?;
    match verify_chain(&entries) {
        Ok(()) => {
            println!("Journal integrity: VERIFIED ({} entries)", entries.len());
            Ok(true)
        }
        Err(broken) => {
            println!("Journal integrity: BROKEN at entry {} ({})", broken.index, broken.reason);
            Ok(false)
        }
    }
}

async fn run_demo() -> Outcome {
    print_banner();
    let scratch = tempfile::tempdir().map_err(|e| ScriptGateError::Config {
        reason: format!("cannot create scratch directory: {e}"),
    })?;
    scenarios::run_all(scratch.path()).await?;
    println!("All scenarios completed.");
    Ok(true)
}

fn print_json(value: &impl serde::Serialize) -> ScriptGateResult<()> {
    let text = serde_json::to_string_pretty(value).map_err(|e| ScriptGateError::Config {
        reason: format!("cannot encode output: {e}"),
    })?;
    println!("{text}");
    Ok(())
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("scriptgate reference demo");
    println!("=========================");
    println!();
    println!("Pipeline per run:");
    println!("  [1] Manifest, schema files, and entrypoint are checked");
    println!("  [2] Security gate: risky runs need a fresh signed assertion");
    println!("  [3] Inputs validated against the input schema");
    println!("  [4] Credential refs resolved (environment, then secret store)");
    println!("  [5] Script runs under a wall-clock timeout");
    println!("  [6] Result validated against the output schema, envelope journaled");
    println!();
}
