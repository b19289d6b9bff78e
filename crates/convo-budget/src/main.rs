//! Replay a recorded conversation through the context budget engine and
//! report what it would send.
//!
//! # Examples
//!
//! ```sh
//! # Stats for a transcript under the default 180k-token budget
//! convo-budget session.json
//!
//! # Tight budget, custom system prompt, stats as JSON
//! convo-budget session.json --max-tokens 8000 --reserve-tokens 1000 \
//!   --system "You are a careful reviewer." --json
//!
//! # Settings from a file, force a compaction pass, print outbound messages
//! convo-budget session.json --config context.json --compact --messages
//!
//! # Inspect per-turn estimates and which turns were folded
//! convo-budget session.json --max-tokens 20000 --turns
//!
//! # Show compaction decisions as they happen
//! RUST_LOG=convo_budget=debug convo-budget session.json
//! ```

use std::path::PathBuf;
use std::process;

use clap::Parser;
use convo_budget::context::{ContextConfig, ContextManager};
use convo_budget::error::ContextResult;
use convo_budget::transcript::{load_transcript, replay};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Replay a recorded conversation through the context budget engine.
#[derive(Parser)]
#[command(name = "convo-budget")]
struct Cli {
    // ── Input ──────────────────────────────────────────────────
    /// JSON transcript: an array of {user, assistant, usage?} entries
    transcript: PathBuf,

    /// JSON file with context settings (missing keys use defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// System prompt counted against the budget
    #[arg(long)]
    system: Option<String>,

    // ── Budget overrides ───────────────────────────────────────
    /// Model context window in tokens
    #[arg(long)]
    max_tokens: Option<usize>,

    /// Tokens held back for the model's reply
    #[arg(long)]
    reserve_tokens: Option<usize>,

    /// Fill ratio (0.0 – 1.0) that triggers automatic compaction
    #[arg(long)]
    threshold: Option<f64>,

    /// Number of recent turns never compacted
    #[arg(long)]
    keep_recent: Option<usize>,

    /// Character limit for tool output compressed on arrival
    #[arg(long)]
    tool_output_max_chars: Option<usize>,

    /// Do not compress tool output as turns are added
    #[arg(long)]
    no_compression: bool,

    // ── Actions ────────────────────────────────────────────────
    /// Run one forced compaction pass after replaying
    #[arg(long)]
    compact: bool,

    // ── Output mode ────────────────────────────────────────────
    /// Print stats and usage as JSON
    #[arg(long)]
    json: bool,

    /// Print the outbound message sequence as JSON
    #[arg(long, conflicts_with = "json")]
    messages: bool,

    /// Print every stored turn (estimates, flags, summaries) as JSON
    #[arg(long, conflicts_with_all = ["json", "messages"])]
    turns: bool,

    /// Log compaction decisions to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Defaults, then the config file, then flag overrides. Validated by
/// [`ContextManager::try_new`].
fn build_config(cli: &Cli) -> ContextResult<ContextConfig> {
    let mut config = match &cli.config {
        Some(path) => ContextConfig::from_json_file(path)?,
        None => ContextConfig::default(),
    };

    if let Some(tokens) = cli.max_tokens {
        config = config.with_max_tokens(tokens);
    }
    if let Some(tokens) = cli.reserve_tokens {
        config = config.with_reserve_tokens(tokens);
    }
    if let Some(threshold) = cli.threshold {
        config = config.with_summarize_threshold(threshold);
    }
    if let Some(turns) = cli.keep_recent {
        config = config.with_keep_recent(turns);
    }
    if let Some(chars) = cli.tool_output_max_chars {
        config = config.with_tool_output_max_chars(chars);
    }
    if cli.no_compression {
        config = config.with_incremental_compression(false);
    }
    Ok(config)
}

fn run(cli: &Cli) -> ContextResult<()> {
    let mut manager = ContextManager::try_new(build_config(cli)?)?;
    if let Some(ref system) = cli.system {
        manager.set_system_prompt(system.clone());
    }

    let turns = load_transcript(&cli.transcript)?;
    let added = replay(&mut manager, turns);
    info!("Replayed {} turn(s)", added);

    if cli.compact && !manager.compact() {
        info!("Forced compaction had nothing to fold");
    }

    if cli.messages {
        println!("{}", serde_json::to_string_pretty(&manager.get_messages())?);
        return Ok(());
    }
    if cli.turns {
        println!("{}", serde_json::to_string_pretty(manager.turns())?);
        return Ok(());
    }

    let stats = manager.get_stats();
    let usage = manager.usage();
    if cli.json {
        let report = serde_json::json!({
            "turns": added,
            "stats": stats,
            "usage": usage,
            "reported_usage": manager.usage_totals(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{added} turn(s) replayed");
        println!("{}", stats.to_log_string());
        println!("{}", usage.to_log_string());
        if manager.usage_totals().calls > 0 {
            println!("{}", manager.usage_totals().summary());
        }
    }
    Ok(())
}
