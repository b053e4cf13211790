use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use patch_timeline::{
    generate_state_diff, load_from_path, EditError, EditSession, EngineConfig, JsonlSink,
    MatchTier, RawEdit, Snapshot,
};
use similar::{ChangeTag, TextDiff};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "patch-timeline")]
#[command(about = "Apply model-authored edits to a project snapshot", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a batch of edits to a snapshot
    Apply {
        /// Project directory, or a JSON object mapping paths to contents
        #[arg(short, long)]
        snapshot: PathBuf,

        /// JSON array of edit descriptors, or a .diff/.patch file
        #[arg(short, long)]
        edits: PathBuf,

        /// Engine configuration (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,

        /// Write changed files back to the snapshot source
        #[arg(short, long)]
        write: bool,

        /// Append the committed history entry to this JSON-lines file
        #[arg(long)]
        history: Option<PathBuf>,

        /// Explanation recorded with the history entry
        #[arg(long)]
        explanation: Option<String>,
    },

    /// Print the unified diff between two snapshots
    Diff {
        /// Snapshot before (directory or JSON file)
        before: PathBuf,

        /// Snapshot after (directory or JSON file)
        after: PathBuf,
    },
}

fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Apply {
            snapshot,
            edits,
            config,
            diff,
            write,
            history,
            explanation,
        } => cmd_apply(ApplyArgs {
            snapshot,
            edits,
            config,
            show_diff: diff,
            write,
            history,
            explanation,
        }),

        Commands::Diff { before, after } => cmd_diff(&before, &after),
    }
}

struct ApplyArgs {
    snapshot: PathBuf,
    edits: PathBuf,
    config: Option<PathBuf>,
    show_diff: bool,
    write: bool,
    history: Option<PathBuf>,
    explanation: Option<String>,
}

/// Load a snapshot from a directory or from a JSON `path -> content` object.
fn load_snapshot(path: &Path) -> Result<Snapshot> {
    if path.is_dir() {
        return Snapshot::from_dir(path)
            .with_context(|| format!("failed to load snapshot from {}", path.display()));
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse snapshot JSON {}", path.display()))
}

/// Load edits from a JSON array, or wrap a raw unified diff as a single edit.
fn load_edits(path: &Path) -> Result<Vec<RawEdit>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read edits {}", path.display()))?;

    let is_diff = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("diff") | Some("patch")
    );
    if is_diff {
        let edit = RawEdit::from_diff_text(&contents).with_context(|| {
            format!("no target path in diff headers of {}", path.display())
        })?;
        return Ok(vec![edit]);
    }

    serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse edits JSON {}", path.display()))
}

/// Helper: Show unified diff between original and modified content
fn display_diff(file: &str, original: &str, modified: &str) {
    println!("\n{}", format!("--- {} (original)", file).dimmed());
    println!("{}", format!("+++ {} (patched)", file).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}

fn cmd_apply(args: ApplyArgs) -> Result<()> {
    // 1. Load configuration
    let config = match &args.config {
        Some(path) => load_from_path(path)?,
        None => EngineConfig::default(),
    };

    // 2. Load inputs
    let before = load_snapshot(&args.snapshot)?;
    let raw_edits = load_edits(&args.edits)?;

    println!("Snapshot: {} ({} files)", args.snapshot.display(), before.len());
    println!("Edits: {}", raw_edits.len());
    println!();

    // 3. Apply
    let mut session = EditSession::new(&config);
    if let Some(history) = &args.history {
        session = session.with_sink(Arc::new(JsonlSink::new(history)));
    }
    let outcome = session.apply(&before, &raw_edits, args.explanation.clone())?;
    let batch = &outcome.batch;

    // 4. Report results
    for issue in &outcome.skipped {
        eprintln!("{} Skipped - {}", "⚠".yellow(), issue);
    }

    let mut total_applied = 0;
    let mut total_failed = 0;

    for (index, result) in batch.results.iter().enumerate() {
        match &result.outcome {
            Ok(_) => {
                let via = match result.tier {
                    Some(MatchTier::WhitespaceTolerant) => " (whitespace-tolerant match)",
                    _ => "",
                };
                println!(
                    "{} #{}: Applied to {} [{}/{} hunks]{}",
                    "✓".green(),
                    index,
                    result.file_path,
                    result.hunks_applied,
                    result.hunks_total,
                    via.dimmed()
                );
                total_applied += 1;
            }
            Err(e) => {
                eprintln!("{} #{}: Failed - {}", "✗".red(), index, e);
                if let EditError::FileNotFound {
                    near_miss: Some(candidate),
                    ..
                } = e
                {
                    eprintln!("  Did you mean: {}", candidate);
                }
                total_failed += 1;
            }
        }
    }

    if args.show_diff {
        for path in batch.changed_paths(&before) {
            let original = before.get(path).unwrap_or_default();
            let modified = batch.files.get(path).unwrap_or_default();
            display_diff(path, original, modified);
        }
    }

    // 5. Write back
    if args.write {
        if args.snapshot.is_dir() {
            let written = batch.files.write_changes(&before, &args.snapshot)?;
            println!();
            for path in written {
                println!("{} {}", "Wrote".cyan(), path);
            }
        } else {
            let json = serde_json::to_string_pretty(&batch.files)?;
            fs::write(&args.snapshot, json)
                .with_context(|| format!("failed to write {}", args.snapshot.display()))?;
            println!("\n{} {}", "Wrote".cyan(), args.snapshot.display());
        }
    }

    if let Some(id) = outcome.committed {
        println!("\n{} {}", "Committed history entry".green(), id);
    }
    if let Some(persist) = outcome.persist {
        persist.wait();
    }

    // 6. Summary
    println!();
    println!("{}", "Summary:".bold());
    println!("  {} applied", format!("{}", total_applied).green());
    println!("  {} failed", format!("{}", total_failed).red());
    if !outcome.skipped.is_empty() {
        println!("  {} skipped", format!("{}", outcome.skipped.len()).yellow());
    }

    if total_failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_diff(before: &Path, after: &Path) -> Result<()> {
    let before = load_snapshot(before)?;
    let after = load_snapshot(after)?;
    print!("{}", generate_state_diff(&before, &after));
    Ok(())
}
