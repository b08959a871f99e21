// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

#[cfg(not(feature = "tui"))]
use anyhow::anyhow;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

use crm_reconcile::{
    approve, commit, init_logging, merge_candidates, prepare, reject, search, Account, Contact,
    FieldPatch, Mergeable, Opportunity, RecordStore, ReviewConfig, Stored,
};

/// Review agent-proposed CRM records
#[derive(Parser, Debug)]
#[command(name = "crm-reconcile", version)]
#[command(about = "Approve, reject or merge agent-proposed CRM records")]
struct Cli {
    #[command(flatten)]
    config: ReviewConfig,

    /// Write the resulting records to this file as seed JSON
    #[arg(long, global = true)]
    save: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List records, optionally filtered by a search query
    List {
        kind: KindArg,
        query: Option<String>,
        /// Only records awaiting review
        #[arg(long)]
        pending: bool,
    },
    /// Print one record as JSON
    Show { kind: KindArg, id: String },
    /// Approve a proposal, optionally with field edits
    Approve {
        kind: KindArg,
        id: String,
        /// Field edit as field=value (repeatable)
        #[arg(long = "set", value_parser = parse_key_val)]
        edits: Vec<(String, String)>,
    },
    /// Reject (delete) a proposal
    Reject { kind: KindArg, id: String },
    /// Merge a proposal into an existing record
    Merge {
        kind: KindArg,
        source: String,
        /// Target record; omit to list merge candidates
        target: Option<String>,
        /// Keep the target's value for this field (repeatable)
        #[arg(long = "keep-target")]
        keep_target: Vec<String>,
        /// Take the proposal's value for this field (repeatable)
        #[arg(long = "take-source")]
        take_source: Vec<String>,
        /// Set a field to an explicit value as field=value (repeatable)
        #[arg(long = "set", value_parser = parse_key_val)]
        overrides: Vec<(String, String)>,
        /// Show the merge plan without committing
        #[arg(long)]
        dry_run: bool,
    },
    /// List inbound email threads, optionally filtered by a search query
    Inbox { query: Option<String> },
    /// Report dangling references and references into proposals
    Check,
    /// Interactive review console (default)
    Ui,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KindArg {
    #[value(alias = "accounts")]
    Account,
    #[value(alias = "contacts")]
    Contact,
    #[value(alias = "opportunities", alias = "opp")]
    Opportunity,
}

/// Parse key=value pairs from command line
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("Invalid field=value pair: {}", s))?;
    Ok((s[..pos].trim().to_string(), s[pos + 1..].to_string()))
}

/// Dispatch a generic operation on the record type named by `kind`
macro_rules! with_kind {
    ($kind:expr, $func:ident ( $($arg:expr),* )) => {
        match $kind {
            KindArg::Account => $func::<Account>($($arg),*),
            KindArg::Contact => $func::<Contact>($($arg),*),
            KindArg::Opportunity => $func::<Opportunity>($($arg),*),
        }
    };
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Ui);

    // The console owns the terminal; keep log lines out of it
    let filter = match command {
        Command::Ui => "off",
        _ => cli.config.log_filter.as_str(),
    };
    init_logging(filter)?;

    let mut store = cli.config.load_store()?;

    match command {
        Command::List { kind, query, pending } => {
            with_kind!(kind, run_list(&store, query.as_deref().unwrap_or(""), pending))
        }
        Command::Show { kind, id } => with_kind!(kind, run_show(&store, &id))?,
        Command::Approve { kind, id, edits } => {
            let edits: FieldPatch = edits.into_iter().collect();
            with_kind!(kind, run_approve(&mut store, &id, &edits))?
        }
        Command::Reject { kind, id } => with_kind!(kind, run_reject(&mut store, &id))?,
        Command::Merge {
            kind,
            source,
            target,
            keep_target,
            take_source,
            overrides,
            dry_run,
        } => {
            let choices = MergeChoices {
                keep_target,
                take_source,
                overrides,
                dry_run,
            };
            match target {
                Some(target) => {
                    with_kind!(kind, run_merge(&mut store, &source, &target, &choices))?
                }
                None => with_kind!(kind, run_candidates(&store, &source)),
            }
        }
        Command::Inbox { query } => run_inbox(&store, query.as_deref().unwrap_or("")),
        Command::Check => run_check(&store),
        Command::Ui => store = run_ui_mode(store)?,
    }

    if let Some(path) = &cli.save {
        let json = serde_json::to_string_pretty(&store.snapshot())?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write records to {}", path.display()))?;
        println!("💾 Saved records to {}", path.display());
    }

    Ok(())
}

// ============================================================================
// Commands
// ============================================================================

fn run_list<T: Stored>(store: &RecordStore, query: &str, pending_only: bool) {
    let records: Vec<&T> = search::<T>(store, query)
        .into_iter()
        .filter(|r| !pending_only || r.is_pending())
        .collect();

    println!("📋 {} ({} of {})", T::KIND.plural(), records.len(), store.count(T::KIND));
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for record in records {
        println!(
            "{:<4} {:<10} {:<18} {}",
            record.initials(),
            record.id(),
            record.status().as_str(),
            record.display_name()
        );
    }
}

fn run_show<T: Stored + Serialize>(store: &RecordStore, id: &str) -> Result<()> {
    let record = store.get::<T>(id)?;
    println!("{}", serde_json::to_string_pretty(record)?);
    if let Some(thread) = store.inbox.source_of(T::KIND, id) {
        println!("📬 Extracted from {} \"{}\" ({})", thread.id, thread.subject, thread.from.name);
    }
    Ok(())
}

fn run_approve<T: Stored>(store: &mut RecordStore, id: &str, edits: &FieldPatch) -> Result<()> {
    let approved = approve::<T>(store, id, edits)?;
    println!(
        "✅ Approved {} {} ({}) → {}",
        T::KIND,
        approved.id(),
        approved.display_name(),
        approved.status()
    );
    Ok(())
}

fn run_reject<T: Stored>(store: &mut RecordStore, id: &str) -> Result<()> {
    let rejection = reject::<T>(store, id)?;
    let removed = &rejection.record;
    println!("🗑️  Rejected {} {} ({})", T::KIND, removed.id(), removed.display_name());
    for dependent in &rejection.dependents {
        println!("   ↳ also rejected {} {}", dependent.kind, dependent.id);
    }
    Ok(())
}

struct MergeChoices {
    keep_target: Vec<String>,
    take_source: Vec<String>,
    overrides: Vec<(String, String)>,
    dry_run: bool,
}

fn run_candidates<T: Stored>(store: &RecordStore, source_id: &str) {
    println!("🔍 Merge candidates for {} {}", T::KIND, source_id);
    for record in merge_candidates::<T>(store, source_id, "") {
        println!("   {:<10} {}", record.id(), record.display_name());
    }
}

fn run_merge<T: Mergeable>(
    store: &mut RecordStore,
    source_id: &str,
    target_id: &str,
    choices: &MergeChoices,
) -> Result<()> {
    let mut plan = prepare::<T>(store, source_id, target_id)?;
    for key in &choices.keep_target {
        plan.take_target(key)?;
    }
    for key in &choices.take_source {
        plan.take_source(key)?;
    }
    for (key, value) in &choices.overrides {
        plan.set(key, value.as_str())?;
    }

    println!("🔀 Merge {} {} → {} ({})", T::KIND, source_id, target_id, plan.target_name);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for field in &plan.fields {
        println!(
            "{:<18} {:<10} existing: {:<24} incoming: {:<24} → {}",
            field.label,
            field.conflict.as_str(),
            field.existing,
            field.incoming,
            field.resolved
        );
    }
    println!("Nested entries transferring: {}", plan.transferred_nested);

    if choices.dry_run {
        println!("\n(dry run, nothing committed)");
        return Ok(());
    }

    let outcome = commit::<T>(store, source_id, target_id, &plan.resolved_fields())?;
    println!(
        "\n✅ Merged into {} ({}): {} nested entries moved, {} references rewritten",
        outcome.survivor_id, outcome.survivor_name, outcome.nested_transferred, outcome.references_rewritten
    );
    Ok(())
}

fn run_inbox(store: &RecordStore, query: &str) {
    let counts = store.inbox.counts();
    let threads = store.inbox.search(query);

    println!(
        "📬 Inbox ({} of {}): {} unread · {} quote requests · {} processed",
        threads.len(),
        store.inbox.len(),
        counts.unread,
        counts.quotes,
        counts.processed
    );
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for thread in threads {
        let marker = if thread.is_read { ' ' } else { '●' };
        println!(
            "{} {:<6} {:<16} {:<22} {}",
            marker,
            thread.id,
            thread.analysis_status.as_str(),
            thread.from.name,
            thread.subject
        );
        for link in &thread.proposals {
            println!("         ↳ {} {}", link.kind, link.id);
        }
    }
}

fn run_check(store: &RecordStore) {
    let violations = store.integrity_violations();
    if violations.is_empty() {
        println!("✓ All references resolve");
        return;
    }
    println!("❌ {} integrity problems", violations.len());
    for violation in violations {
        println!("   {}", violation);
    }
}

#[cfg(feature = "tui")]
fn run_ui_mode(store: RecordStore) -> Result<RecordStore> {
    let mut app = ui::App::new(store);
    ui::run_ui(&mut app)?;

    println!("\n✅ Review console closed ({} actions)", app.store.journal.len());
    for event in app.store.journal.events() {
        println!("   {}", event.summary());
    }

    Ok(app.store)
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_store: RecordStore) -> Result<RecordStore> {
    Err(anyhow!(
        "TUI mode not available; rebuild with `--features tui` or use the list/approve/merge commands"
    ))
}
