mod config;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use memeval_core::{validate_placement, EvidenceCategory, EvidenceCore, MatcherConfig};
use memeval_gen::{GenerationSupervisor, RuntimeContext};
use memeval_llm::HttpLlmClient;
use memeval_store::{load_evidence_items, load_personas};

#[derive(Parser)]
#[command(
    name = "memeval",
    version,
    about = "Evidence generation pipeline for conversational-memory benchmarks"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate evidence items for a set of personas
    Generate {
        /// Directory of persona JSON files
        #[arg(short, long)]
        personas: PathBuf,

        /// Output directory for evidence files
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Process only the first N personas
        #[arg(long)]
        people: Option<usize>,

        /// Use cases per person
        #[arg(short, long)]
        use_cases: Option<usize>,

        /// Evidence category: user_facts, changing_facts, abstention, preference
        #[arg(short, long, default_value = "user_facts")]
        category: EvidenceCategory,

        /// Require an extra consecutive judge pass per item
        #[arg(long)]
        extensive: bool,
    },

    /// Re-run the deterministic placement validator on a persisted evidence file
    Validate {
        /// Evidence JSON file
        file: PathBuf,
    },

    /// Summarize persisted evidence files
    Stats {
        /// Directory of evidence JSON files
        dir: PathBuf,
    },

    /// Show current configuration
    Config,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .with_env_var("MEMEVAL_LOG")
                .from_env_lossy(),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            personas,
            out,
            people,
            use_cases,
            category,
            extensive,
        } => cmd_generate(&personas, out, people, use_cases, category, extensive),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Stats { dir } => cmd_stats(&dir),
        Commands::Config => cmd_config(),
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_generate(
    personas_dir: &Path,
    out: Option<PathBuf>,
    people: Option<usize>,
    use_cases: Option<usize>,
    category: EvidenceCategory,
    extensive: bool,
) -> Result<()> {
    let cfg = config::load_config()?;
    let mut gen_cfg = cfg.gen_config();
    if let Some(n) = use_cases {
        gen_cfg.use_cases_per_person = n;
    }
    if extensive {
        gen_cfg.extensive = true;
    }

    let api_key = std::env::var(&cfg.llm.api_key_env)
        .with_context(|| format!("api key environment variable {} not set", cfg.llm.api_key_env))?;
    let generator = HttpLlmClient::new(&cfg.llm.base_url, &api_key, &cfg.llm.generator_model)
        .with_temperature(cfg.llm.temperature)
        .with_max_tokens(cfg.llm.max_tokens);
    // The judge only grades; keep it deterministic.
    let judge = HttpLlmClient::new(&cfg.llm.base_url, &api_key, &cfg.llm.judge_model)
        .with_temperature(0.0)
        .with_max_tokens(cfg.llm.max_tokens);

    let mut personas = load_personas(personas_dir)?;
    if personas.is_empty() {
        bail!("no personas found in {}", personas_dir.display());
    }
    if let Some(n) = people {
        personas.truncate(n);
    }

    let out_dir = out
        .or_else(|| cfg.output.dir.as_ref().map(PathBuf::from))
        .unwrap_or_else(default_output_dir);

    let ctx = Arc::new(RuntimeContext::new(
        gen_cfg,
        Arc::new(generator),
        Arc::new(judge),
        out_dir.clone(),
    ));
    let supervisor = GenerationSupervisor::new(Arc::clone(&ctx));

    let started = Instant::now();
    let summary = supervisor.run(personas, category)?;
    drop(supervisor);

    println!(
        "Run complete in {:.1}s",
        started.elapsed().as_secs_f64()
    );
    println!("People processed: {}", summary.people_processed);
    println!("Items accepted:   {}", summary.items_accepted);
    println!("Output dir:       {}", out_dir.display());

    if let Ok(ctx) = Arc::try_unwrap(ctx) {
        ctx.shutdown();
    }
    Ok(())
}

fn cmd_validate(file: &Path) -> Result<()> {
    let items = load_evidence_items(file)?;
    if items.is_empty() {
        println!("No evidence items in {}", file.display());
        return Ok(());
    }

    let matcher = MatcherConfig::default();
    let mut failed = 0;
    for (i, item) in items.iter().enumerate() {
        let core = EvidenceCore {
            question: item.question.clone(),
            answer: item.answer.clone(),
            evidence_messages: item.evidence_messages.clone(),
            generating_model: None,
        };
        let report = validate_placement(&core, &item.conversations, &matcher);
        if report.is_valid {
            println!("[{i}] PASS  {}", item.question);
        } else {
            failed += 1;
            println!("[{i}] FAIL  {}", item.question);
            for err in &report.errors {
                println!("      {err}");
            }
        }
    }

    println!();
    println!("{} of {} items valid.", items.len() - failed, items.len());
    if failed > 0 {
        bail!("{failed} items failed placement validation");
    }
    Ok(())
}

fn cmd_stats(dir: &Path) -> Result<()> {
    let mut files = 0usize;
    let mut total_items = 0usize;
    let mut total_conversations = 0usize;
    let mut total_messages = 0usize;
    let mut by_category: BTreeMap<String, usize> = BTreeMap::new();

    let entries =
        fs::read_dir(dir).with_context(|| format!("cannot read {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let items = load_evidence_items(&path)
            .with_context(|| format!("loading {}", path.display()))?;
        files += 1;
        total_items += items.len();
        for item in &items {
            total_conversations += item.conversations.len();
            total_messages += item
                .conversations
                .iter()
                .map(|c| c.messages.len())
                .sum::<usize>();
            *by_category.entry(item.category.to_string()).or_default() += 1;
        }
    }

    if files == 0 {
        println!("No evidence files in {}", dir.display());
        return Ok(());
    }

    println!("Files:          {files}");
    println!("Items:          {total_items}");
    println!("Conversations:  {total_conversations}");
    println!("Messages:       {total_messages}");
    println!();
    println!("{:<16} Count", "Category");
    println!("{}", "-".repeat(24));
    for (category, count) in &by_category {
        println!("{category:<16} {count}");
    }
    Ok(())
}

fn cmd_config() -> Result<()> {
    let cfg = config::load_config()?;
    println!("Config: {}", config::show_config_path());
    println!();
    println!("[llm]");
    println!("  base_url = {}", cfg.llm.base_url);
    println!("  api_key_env = {}", cfg.llm.api_key_env);
    println!("  generator_model = {}", cfg.llm.generator_model);
    println!("  judge_model = {}", cfg.llm.judge_model);
    println!("  temperature = {}", cfg.llm.temperature);
    println!("  max_tokens = {}", cfg.llm.max_tokens);
    println!();
    println!("[generation]");
    println!("  evidence_count = {}", cfg.generation.evidence_count);
    println!(
        "  use_cases_per_person = {}",
        cfg.generation.use_cases_per_person
    );
    println!("  core_retries = {}", cfg.generation.core_retries);
    println!("  embed_retries = {}", cfg.generation.embed_retries);
    println!(
        "  scenario_max_calls = {}",
        cfg.generation.scenario_max_calls
    );
    println!(
        "  use_case_timeout_secs = {}",
        cfg.generation.use_case_timeout_secs
    );
    println!(
        "  person_timeout_secs = {}",
        cfg.generation.person_timeout_secs
    );
    println!("  person_threads = {}", cfg.generation.person_threads);
    println!("  use_case_threads = {}", cfg.generation.use_case_threads);
    println!("  extensive = {}", cfg.generation.extensive);
    println!();
    println!("[matcher]");
    println!("  min_distance = {}", cfg.matcher.min_distance);
    println!("  distance_ratio = {}", cfg.matcher.distance_ratio);
    println!("  partial_ratio = {}", cfg.matcher.partial_ratio);
    println!();
    println!("[verification]");
    println!(
        "  consecutive_passes = {}",
        cfg.verification.consecutive_passes
    );
    println!(
        "  extensive_consecutive_passes = {}",
        cfg.verification.extensive_consecutive_passes
    );
    println!();
    println!("[output]");
    println!(
        "  dir = {}",
        cfg.output
            .dir
            .as_deref()
            .unwrap_or("(default platform path)")
    );
    Ok(())
}

fn default_output_dir() -> PathBuf {
    directories::ProjectDirs::from("dev", "memeval", "memeval")
        .map(|dirs| dirs.data_dir().join("evidence"))
        .unwrap_or_else(|| PathBuf::from("evidence"))
}
