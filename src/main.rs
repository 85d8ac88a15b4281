use anyhow::{Context, Result, anyhow};
use clap::{ArgAction, Parser, Subcommand};
use dedupe::core::frame::{FrameDecoder, MIN_HEIF_GRID_VERSION};
use dedupe::core::resolution::Resolution;
use dedupe::logging::init_logging;
use dedupe::{Action, Config, Deduplicator, ProgressReporter, RunSummary};
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const BAR_STEPS: u64 = 1000;

#[derive(Parser, Debug)]
#[command(
    name = "dedupe",
    version,
    about = "Find duplicate photos and videos by perceptual hash and cull them"
)]
struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors and hide the progress bar
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file (default: `<config dir>/dedupe/config.toml`)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Number of hashing threads (default: one per CPU)
    #[arg(long, value_name = "N", global = true)]
    workers: Option<usize>,

    /// ffmpeg binary used for videos and HEIC images
    #[arg(long, value_name = "PATH", global = true)]
    ffmpeg: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Find and list duplicate groups without changing anything
    Scan {
        /// Directory to scan
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,
        /// Print the groups as JSON
        #[arg(long)]
        json: bool,
    },

    /// Move duplicates into `<dir>/duplicates`, keeping subdirectories
    Move {
        /// Directory to cull
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,
        /// Only show what would be moved
        #[arg(long)]
        dry_run: bool,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Permanently delete duplicates
    Delete {
        /// Directory to cull
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,
        /// Only show what would be deleted
        #[arg(long)]
        dry_run: bool,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

/// Renders engine progress on an indicatif bar.
struct BarReporter {
    bar: ProgressBar,
}

impl BarReporter {
    fn new(quiet: bool) -> Result<Self> {
        if quiet {
            return Ok(Self {
                bar: ProgressBar::hidden(),
            });
        }
        let bar = ProgressBar::new(BAR_STEPS);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {msg}")?
                .progress_chars("=> "),
        );
        Ok(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish();
    }
}

impl ProgressReporter for BarReporter {
    fn report(&self, fraction: f64, message: &str) {
        self.bar
            .set_position((fraction.clamp(0.0, 1.0) * BAR_STEPS as f64) as u64);
        self.bar.set_message(message.to_string());
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    if let Some(ffmpeg) = cli.ffmpeg {
        config.ffmpeg = ffmpeg;
    }
    let decoder = FrameDecoder::new(config.ffmpeg.clone());
    if !decoder.is_available() {
        log::warn!(
            "{} is not available; videos and HEIC images will be skipped",
            config.ffmpeg.display()
        );
    } else if !decoder.version().is_some_and(|v| v.assembles_heif_grids()) {
        log::warn!(
            "{} is older than {} or of unknown version; HEIC images will be skipped",
            config.ffmpeg.display(),
            MIN_HEIF_GRID_VERSION
        );
    }

    match cli.command {
        Commands::Scan { path, json } => {
            println!("▶ Scanning for duplicates in: {}", path.display());
            let summary = run_engine(&path, config, None, false, cli.quiet)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary.resolutions)?);
            } else {
                print_groups(&summary.resolutions);
            }
        }

        Commands::Move { path, dry_run, yes } => {
            if !dry_run && !yes && !confirm(Action::Move, &path, &config)? {
                println!("Aborted.");
                return Ok(());
            }
            println!("▶ Moving duplicates in: {}", path.display());
            let summary = run_engine(&path, config, Some(Action::Move), dry_run, cli.quiet)?;
            print_summary(&summary);
        }

        Commands::Delete { path, dry_run, yes } => {
            if !dry_run && !yes && !confirm(Action::Delete, &path, &config)? {
                println!("Aborted.");
                return Ok(());
            }
            println!("▶ Deleting duplicates in: {}", path.display());
            let summary = run_engine(&path, config, Some(Action::Delete), dry_run, cli.quiet)?;
            print_summary(&summary);
        }
    }

    Ok(())
}

fn confirm(action: Action, path: &Path, config: &Config) -> Result<bool> {
    let prompt = match action {
        Action::Delete => format!(
            "Permanently delete duplicate media under {}?",
            path.display()
        ),
        Action::Move => format!(
            "Move duplicate media under {} into {}?",
            path.display(),
            path.join(&config.duplicates_dir).display()
        ),
    };
    Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .context("Failed to read confirmation")
}

/// Run the engine on its own thread and wait for it.
fn run_engine(
    path: &Path,
    config: Config,
    action: Option<Action>,
    dry_run: bool,
    quiet: bool,
) -> Result<RunSummary> {
    let reporter = Arc::new(BarReporter::new(quiet)?);
    let handle = Deduplicator::new(path, config)
        .with_dry_run(dry_run)
        .spawn(action, reporter.clone())
        .context("Failed to start engine thread")?;

    let result = handle
        .join()
        .map_err(|_| anyhow!("Engine thread terminated unexpectedly"))?;
    reporter.finish();

    result.with_context(|| format!("Failed to process {}", path.display()))
}

fn print_groups(resolutions: &[Resolution]) {
    if resolutions.is_empty() {
        println!("No duplicates found.");
        return;
    }
    println!("Found {} duplicate group(s):", resolutions.len());
    for (i, resolution) in resolutions.iter().enumerate() {
        println!("\n✨ Group {} [{}]:", i + 1, resolution.fingerprint);
        println!("   🏆 Keeping → {}", resolution.original.path.display());
        for dup in &resolution.duplicates {
            println!("   ▶ {}", dup.path.display());
        }
    }
}

fn print_summary(summary: &RunSummary) {
    if summary.is_empty() {
        println!("Selected folder is empty.");
        return;
    }
    print_groups(&summary.resolutions);

    let actions = &summary.actions;
    if summary.dry_run {
        println!(
            "\n⚠️  Dry-run only; {} file(s) would be affected, no files were changed.",
            actions.planned
        );
    } else {
        println!(
            "\n✅ Deleted {}, moved {}, failed {} ({} files scanned in {}ms)",
            actions.deleted, actions.moved, actions.failed, summary.files_seen, summary.elapsed_ms
        );
    }
}
