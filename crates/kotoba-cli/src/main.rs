mod collector;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::IndexedRandom;

use kotoba_core::{
    Answer, QuizEngine, RoundOutcome, RoundReport, SetId, UserId, VocabId, VocabRepository,
    VocabularyItem, unlock_set,
};
use kotoba_store::{QuizConfig, Store, resolve_base_dir};

use crate::collector::LineCollector;

#[derive(Parser)]
#[command(name = "kotoba", about = "Adaptive kana and vocabulary quiz")]
struct Cli {
    /// Data directory (default: $KOTOBA_DATA_DIR or ~/.kotoba)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import sets and items from a catalog JSON file
    ImportCatalog {
        /// Catalog file path
        path: PathBuf,
    },

    /// Import progress from a legacy users.json file
    ImportLegacy {
        /// users.json path
        path: PathBuf,
    },

    /// List sets in the catalog
    Sets,

    /// Manage users
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Unlock a set for a user
    Unlock {
        #[arg(long)]
        user: UserId,
        set_id: SetId,
    },

    /// Make an unlocked set the one a user is quizzed on
    Activate {
        #[arg(long)]
        user: UserId,
        set_id: SetId,
    },

    /// Run quiz rounds interactively, one answer per line on stdin
    Quiz {
        #[arg(long)]
        user: UserId,

        /// Number of rounds
        #[arg(long, default_value_t = 10)]
        rounds: u32,

        /// Seconds to wait for each answer (overrides config)
        #[arg(long)]
        timeout: Option<u64>,

        /// Seed for question selection
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Pick the next question without waiting for an answer
    Ask {
        #[arg(long)]
        user: UserId,

        #[arg(long)]
        seed: Option<u64>,
    },

    /// Grade and record one answer
    Answer {
        #[arg(long)]
        user: UserId,
        vocab_id: VocabId,
        text: String,
    },

    /// Show levels and familiarity per unlocked set
    Progress {
        #[arg(long)]
        user: UserId,
    },

    /// Show a random item from a set
    Random {
        set_id: SetId,

        #[arg(long)]
        seed: Option<u64>,
    },

    /// Show database statistics
    Stats,
}

#[derive(Subcommand)]
enum UserCommands {
    /// Register a user
    Add { user_id: UserId },
}

fn open_store(cli: &Cli) -> Result<(Store, QuizConfig)> {
    let base_dir = resolve_base_dir(cli.data_dir.as_deref());
    std::fs::create_dir_all(&base_dir)
        .with_context(|| format!("failed to create {}", base_dir.display()))?;
    let config = QuizConfig::load(&base_dir).context("failed to load config")?;
    let db_path = config.database_path(&base_dir);
    let store = Store::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    Ok((store, config))
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn make_rng(seed: Option<u64>) -> SmallRng {
    match seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_os_rng(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::ImportCatalog { path } => cmd_import_catalog(&cli, path),
        Commands::ImportLegacy { path } => cmd_import_legacy(&cli, path),
        Commands::Sets => cmd_sets(&cli),
        Commands::User {
            command: UserCommands::Add { user_id },
        } => cmd_user_add(&cli, *user_id),
        Commands::Unlock { user, set_id } => cmd_unlock(&cli, *user, *set_id),
        Commands::Activate { user, set_id } => cmd_activate(&cli, *user, *set_id),
        Commands::Quiz {
            user,
            rounds,
            timeout,
            seed,
        } => cmd_quiz(&cli, *user, *rounds, *timeout, *seed).await,
        Commands::Ask { user, seed } => cmd_ask(&cli, *user, *seed),
        Commands::Answer {
            user,
            vocab_id,
            text,
        } => cmd_answer(&cli, *user, *vocab_id, text),
        Commands::Progress { user } => cmd_progress(&cli, *user),
        Commands::Random { set_id, seed } => cmd_random(&cli, *set_id, *seed),
        Commands::Stats => cmd_stats(&cli),
    }
}

fn describe(item: &VocabularyItem) -> String {
    match &item.definition {
        Some(definition) => format!("{} = {} ({definition})", item.native_form, item.romanization),
        None => format!("{} = {}", item.native_form, item.romanization),
    }
}

fn print_report(report: &RoundReport) {
    let verdict = if report.timed_out() {
        "time's up"
    } else if report.correct {
        "correct"
    } else {
        "wrong"
    };
    println!(
        "{verdict}: {}  [familiarity {} -> {}]",
        describe(&report.item),
        report.familiarity_before,
        report.familiarity_after
    );
    if let Some(level) = report.level_up.new_level {
        println!("level up! now at level {level}");
    }
}

fn cmd_import_catalog(cli: &Cli, path: &Path) -> Result<()> {
    let (store, _) = open_store(cli)?;
    let counts = store
        .import_catalog_file(path)
        .context("failed to import catalog")?;
    println!(
        "imported {} sets, {} items from {}",
        counts.sets,
        counts.items,
        path.display()
    );
    Ok(())
}

fn cmd_import_legacy(cli: &Cli, path: &Path) -> Result<()> {
    let (store, _) = open_store(cli)?;
    let report = store
        .import_legacy_file(path)
        .context("failed to import legacy progress")?;
    println!(
        "imported {} items for {} users ({} skipped)",
        report.items,
        report.users,
        report.skipped_users + report.skipped_sets + report.skipped_items
    );
    Ok(())
}

fn cmd_sets(cli: &Cli) -> Result<()> {
    let (store, _) = open_store(cli)?;
    let sets = store.list_sets().context("failed to list sets")?;
    if sets.is_empty() {
        println!("(no sets)");
    }
    for summary in sets {
        println!(
            "{}\t{}\t{} levels\t{} items",
            summary.set.set_id, summary.set.name, summary.set.total_levels, summary.item_count
        );
    }
    Ok(())
}

fn cmd_user_add(cli: &Cli, user_id: UserId) -> Result<()> {
    let (store, _) = open_store(cli)?;
    if store.ensure_user(user_id)? {
        println!("added user {user_id}");
    } else {
        println!("user {user_id} already exists");
    }
    Ok(())
}

fn cmd_unlock(cli: &Cli, user_id: UserId, set_id: SetId) -> Result<()> {
    let (store, _) = open_store(cli)?;
    let created = unlock_set(&store, user_id, set_id)
        .with_context(|| format!("failed to unlock set {set_id}"))?;
    if created == 0 {
        println!("set {set_id} already unlocked for user {user_id}");
    } else {
        println!("unlocked set {set_id} for user {user_id}: {created} new items");
    }
    Ok(())
}

fn cmd_activate(cli: &Cli, user_id: UserId, set_id: SetId) -> Result<()> {
    let (store, _) = open_store(cli)?;
    store
        .set_active_set(user_id, set_id)
        .with_context(|| format!("failed to activate set {set_id}"))?;
    let set = store.get_set(set_id)?;
    println!("active set for user {user_id}: {}", set.name);
    Ok(())
}

async fn cmd_quiz(
    cli: &Cli,
    user_id: UserId,
    rounds: u32,
    timeout: Option<u64>,
    seed: Option<u64>,
) -> Result<()> {
    let (store, config) = open_store(cli)?;
    let timeout = timeout
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.answer_timeout());
    let engine = QuizEngine::new(store)
        .with_weights(config.weights)
        .with_answer_timeout(timeout);
    let collector = LineCollector::stdin();
    let mut rng = make_rng(seed);

    let mut asked = 0u32;
    let mut correct = 0u32;
    for _ in 0..rounds {
        let outcome = tokio::select! {
            outcome = engine.run_round(user_id, &collector, &mut rng) => outcome,
            _ = tokio::signal::ctrl_c() => {
                println!();
                tracing::info!(user_id, "quiz interrupted");
                break;
            }
        };
        match outcome.context("quiz round failed")? {
            RoundOutcome::Busy => bail!("a quiz is already running for user {user_id}"),
            RoundOutcome::Abandoned => break,
            RoundOutcome::Completed(report) => {
                asked += 1;
                if report.correct {
                    correct += 1;
                }
                print_report(&report);
            }
        }
    }

    println!("score: {correct}/{asked}");
    Ok(())
}

fn cmd_ask(cli: &Cli, user_id: UserId, seed: Option<u64>) -> Result<()> {
    let (store, config) = open_store(cli)?;
    let engine = QuizEngine::new(store).with_weights(config.weights);
    let item = engine
        .select(user_id, &mut make_rng(seed))
        .context("failed to select a question")?;
    println!("{}\t{}", item.vocab_id, item.native_form);
    Ok(())
}

fn cmd_answer(cli: &Cli, user_id: UserId, vocab_id: VocabId, text: &str) -> Result<()> {
    let (store, config) = open_store(cli)?;
    let Some(item) = store.get_vocab(vocab_id)? else {
        bail!("unknown vocab id {vocab_id}");
    };
    let engine = QuizEngine::new(store).with_weights(config.weights);
    let outcome = engine
        .grade(user_id, &item, Answer::Response(text.to_string()))
        .context("failed to record answer")?;
    match outcome {
        RoundOutcome::Completed(report) => print_report(&report),
        RoundOutcome::Busy | RoundOutcome::Abandoned => {
            bail!("a quiz is already running for user {user_id}")
        }
    }
    Ok(())
}

fn cmd_progress(cli: &Cli, user_id: UserId) -> Result<()> {
    let (store, _) = open_store(cli)?;
    let progress = store
        .set_progress(user_id)
        .with_context(|| format!("failed to load progress for user {user_id}"))?;
    if progress.is_empty() {
        println!("(no sets unlocked)");
        return Ok(());
    }
    let active = store.active_set(user_id).ok();

    for row in progress {
        let set = store.get_set(row.set_id)?;
        let marker = if active == Some(row.set_id) { " *" } else { "" };
        println!(
            "{} (set {}){marker}: level {}/{}",
            set.name, set.set_id, row.current_level, set.total_levels
        );
        let histogram = store.familiarity_histogram(user_id, row.set_id)?;
        let buckets: Vec<String> = histogram
            .iter()
            .enumerate()
            .map(|(bucket, count)| format!("{bucket}:{count}"))
            .collect();
        println!("  familiarity {}", buckets.join(" "));
    }
    Ok(())
}

fn cmd_random(cli: &Cli, set_id: SetId, seed: Option<u64>) -> Result<()> {
    let (store, _) = open_store(cli)?;
    let items = store
        .items_in_set(set_id)
        .with_context(|| format!("failed to load set {set_id}"))?;
    let Some(item) = items.choose(&mut make_rng(seed)) else {
        bail!("set {set_id} has no items");
    };
    println!("{}", describe(item));
    Ok(())
}

fn cmd_stats(cli: &Cli) -> Result<()> {
    let (store, _) = open_store(cli)?;
    let stats = store.stats().context("failed to read stats")?;
    println!("sets:     {}", stats.sets);
    println!("vocab:    {}", stats.vocab);
    println!("users:    {}", stats.users);
    println!("tracked:  {}", stats.tracked_items);
    Ok(())
}
