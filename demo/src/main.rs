//! Instar — Demo CLI
//!
//! Runs one or all of the three demo scenarios against real instar
//! components (stage graph, gate, store, governance, handoff) with a
//! scripted completion service standing in for a language-model gateway.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- pipeline
//!   cargo run -p demo -- governance
//!   cargo run -p demo -- handoff

use std::collections::HashMap;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use instar_contracts::config::{GovernanceConfig, RunOptions, SigningConfig};
use instar_contracts::error::InstarResult;
use instar_contracts::role::{ChatMessage, Role};
use instar_gate::Gate;
use instar_governance::{is_paused, pause, resume, trigger_molt};
use instar_graph::{StageEdge, StageGraph, StageNode};
use instar_handoff::{receive_artifacts, send_artifact};
use instar_runner::{CompletionService, Runner};
use instar_store::Store;

// ── CLI definition ────────────────────────────────────────────────────────────

/// Instar — gated agent-pipeline engine demo.
///
/// Each subcommand exercises one slice of the engine: the full run
/// pipeline with verification, the molt governance round trip, or a
/// signed handoff between two entities.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "Instar engine demo",
    long_about = "Runs instar demo scenarios showing stage-graph execution,\n\
                  gate-only memory admission, molt governance, and signed handoff."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run all three scenarios in sequence.
    RunAll,
    /// Scenario 1: one task through generator → critic → judge → gate.
    Pipeline,
    /// Scenario 2: molt rate limit, human veto, and resume.
    Governance,
    /// Scenario 3: signed artifact handoff between two entities.
    Handoff,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Initialize structured logging.  Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    print_banner();

    let result = match cli.command {
        Command::RunAll => run_all(),
        Command::Pipeline => run_pipeline(),
        Command::Governance => run_governance(),
        Command::Handoff => run_handoff(),
    };

    match result {
        Ok(()) => {
            println!("All selected scenarios completed successfully.");
        }
        Err(e) => {
            eprintln!("Demo error: {}", e);
            std::process::exit(1);
        }
    }
}

fn run_all() -> InstarResult<()> {
    run_pipeline()?;
    run_governance()?;
    run_handoff()?;
    Ok(())
}

// ── Scripted completion service ───────────────────────────────────────────────

/// Returns a fixed response regardless of input, standing in for an
/// external model gateway.
struct ScriptedService {
    response: &'static str,
}

impl CompletionService for ScriptedService {
    fn complete(&self, _messages: &[ChatMessage], _max_tokens: u32) -> InstarResult<String> {
        Ok(self.response.to_string())
    }
}

fn demo_graph() -> StageGraph {
    let node = |id: &str, role: Role, binding: &str| StageNode {
        id: id.to_string(),
        role,
        binding: binding.to_string(),
    };
    let edge = |from: &str, to: &str| StageEdge { from: from.to_string(), to: to.to_string() };
    StageGraph {
        nodes: vec![
            node("generator", Role::Generator, "gen"),
            node("critic", Role::Critic, "crit"),
            node("judge", Role::Judge, "judge"),
            node("verify", Role::Verifier, ""),
        ],
        edges: vec![
            edge("generator", "critic"),
            edge("critic", "judge"),
            edge("judge", "verify"),
        ],
        final_node: Some("judge".to_string()),
    }
}

fn demo_services() -> HashMap<String, Box<dyn CompletionService>> {
    let mut services: HashMap<String, Box<dyn CompletionService>> = HashMap::new();
    services.insert(
        "gen".to_string(),
        Box::new(ScriptedService { response: "def add(a, b):\n    return a + b" }),
    );
    services.insert(
        "crit".to_string(),
        Box::new(ScriptedService {
            response: "Handles the basic case. No type checks, which is fine for this task.",
        }),
    );
    services.insert(
        "judge".to_string(),
        Box::new(ScriptedService { response: "def add(a, b):\n    return a + b\n" }),
    );
    services
}

// ── Scenario 1: pipeline ──────────────────────────────────────────────────────

fn run_pipeline() -> InstarResult<()> {
    println!("── Scenario 1: pipeline run ─────────────────────────────");
    let store = Store::in_memory("demo-entity")?;
    let runner = Runner::new(demo_graph(), demo_services())?;

    let options = RunOptions { write_checkpoint: true, ..RunOptions::default() };
    let state = runner.execute(
        "Implement a function add(a, b) that returns a + b.",
        None,
        Some(&store),
        &Gate::default(),
        &options,
    )?;

    println!("draft:      {}", state.slot("generator"));
    println!("critique:   {}", state.slot("critic"));
    println!("verified:   {}", state.verification_passed);
    println!("evidence:   {}", state.verification_evidence.trim());
    if state.verification_passed {
        let verified = store.get_recent_verified(1)?;
        let checkpoints = store.list_checkpoints(1)?;
        println!("admitted:   {}", verified[0].artifact_ref);
        println!(
            "checkpoint: graph={} memory={}",
            checkpoints[0].graph_hash, checkpoints[0].memory_hash
        );
    }
    println!();
    Ok(())
}

// ── Scenario 2: governance ────────────────────────────────────────────────────

fn run_governance() -> InstarResult<()> {
    println!("── Scenario 2: molt governance ──────────────────────────");
    let store = Store::in_memory("demo-entity")?;
    let config = GovernanceConfig { molt_rate_limit: Duration::from_secs(60) };
    let refs = vec!["artifact_demo".to_string()];

    let first = trigger_molt(&store, &config, "0.2.0", "graphhash", "memhash", &refs)?;
    println!("first molt:   allowed={}", first.allowed);

    let second = trigger_molt(&store, &config, "0.3.0", "graphhash", "memhash", &refs)?;
    println!("second molt:  allowed={} ({})", second.allowed, second.reason);

    pause(&store)?;
    let vetoed = trigger_molt(&store, &config, "0.3.0", "graphhash", "memhash", &refs)?;
    println!("under veto:   allowed={} ({})", vetoed.allowed, vetoed.reason);

    resume(&store)?;
    println!("paused now:   {}", is_paused(&store)?);

    println!("audit trail:");
    for record in store.recent_audit(10)? {
        println!("  {} {}", record.event_type, record.detail);
    }
    println!();
    Ok(())
}

// ── Scenario 3: handoff ───────────────────────────────────────────────────────

fn run_handoff() -> InstarResult<()> {
    println!("── Scenario 3: signed handoff ───────────────────────────");
    let mut signing = SigningConfig::default();
    signing
        .entity_secrets
        .insert("alpha".to_string(), "alpha-demo-secret".to_string());

    let beta = Store::in_memory("beta")?;
    let reference = send_artifact(
        &signing,
        "alpha",
        &beta,
        "def add(a, b):\n    return a + b\n",
        None,
    )?;
    println!("sent:     {}", reference);

    for artifact in receive_artifacts(&signing, &beta, 10, true)? {
        println!(
            "received: {} from {} verified={}",
            artifact.artifact_ref, artifact.from_entity_id, artifact.verified
        );
    }
    println!();
    Ok(())
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("Instar — Gated Agent-Pipeline Engine");
    println!("Demo");
    println!("====================================");
    println!();
    println!("Engine guarantees demonstrated per scenario:");
    println!("  [1] Stages run in dependency order; malformed graphs never schedule");
    println!("  [2] Only a gate pass admits an artifact into verified memory");
    println!("  [3] Molts respect the rate limit and the human veto");
    println!("  [4] Handoffs carry HMAC-SHA256 signatures verified on read");
    println!();
}
