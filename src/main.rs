use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use console::Emoji;
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use podpub::{
    DEFAULT_CONFIG_FILE, FfmpegConverter, NoopReporter, ProgressEvent, ProgressReporter,
    PublishContext, RunOptions, SharedProgressReporter, discover_sources, format_duration,
    load_config, process_run,
};

// Emoji with fallback for terminals without Unicode support
static MICROPHONE: Emoji<'_, '_> = Emoji("🎙️  ", "");
static GEAR: Emoji<'_, '_> = Emoji("⚙️  ", "[~] ");
static BOOKS: Emoji<'_, '_> = Emoji("📚 ", "[i] ");
static UPLOAD: Emoji<'_, '_> = Emoji("📤 ", "[^] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static WARNING: Emoji<'_, '_> = Emoji("⚠️  ", "[!] ");
static BROOM: Emoji<'_, '_> = Emoji("🧹 ", "[-] ");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");
static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "x ");

/// Publish podcast episodes to object storage and keep the feed up to date
#[derive(Parser, Debug)]
#[command(name = "podpub")]
#[command(about = "Publish podcast episodes to object storage and keep the feed up to date")]
#[command(version)]
struct Args {
    /// Audio files to publish (default: everything in the episodes directory)
    sources: Vec<PathBuf>,

    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Title for the episodes of this run
    #[arg(short, long)]
    title: Option<String>,

    /// Description for the episodes of this run
    #[arg(short, long)]
    description: Option<String>,

    /// Quiet mode - suppress progress output
    #[arg(short, long)]
    quiet: bool,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Progress reporter using an indicatif spinner for terminal output
struct IndicatifReporter {
    main_bar: ProgressBar,
}

impl IndicatifReporter {
    fn new() -> Self {
        let main_style = ProgressStyle::default_spinner()
            .template("{spinner:.green} {wide_msg}")
            .unwrap();

        let main_bar = ProgressBar::new_spinner();
        main_bar.set_style(main_style);
        main_bar.enable_steady_tick(std::time::Duration::from_millis(100));

        Self { main_bar }
    }
}

impl ProgressReporter for IndicatifReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::ProcessingEpisode {
                source,
                index,
                total,
            } => {
                self.main_bar.set_message(format!(
                    "{GEAR}[{}/{}] Processing {}",
                    (index + 1).to_string().cyan(),
                    total.to_string().cyan(),
                    truncate_title(&source, 50)
                ));
            }

            ProgressEvent::EpisodePublished {
                filename,
                size_bytes,
                duration_ms,
            } => {
                self.main_bar.println(format!(
                    "{SUCCESS}{} {}",
                    filename.green(),
                    format!(
                        "({}, {})",
                        HumanBytes(size_bytes),
                        format_duration(duration_ms)
                    )
                    .dimmed()
                ));
            }

            ProgressEvent::EpisodeFailed { source, error } => {
                self.main_bar.println(format!(
                    "{FAILURE}{} - {}",
                    truncate_title(&source, 30).red(),
                    error.red()
                ));
            }

            ProgressEvent::Reconciled {
                total_episodes,
                degraded,
            } => {
                if degraded {
                    self.main_bar.println(format!(
                        "{WARNING}{}",
                        "Episode metadata unreachable, feed rebuilt from local files".yellow()
                    ));
                }
                self.main_bar.set_message(format!(
                    "{BOOKS}{} episodes in feed",
                    total_episodes.to_string().cyan()
                ));
            }

            ProgressEvent::ArtifactUploaded { key } => {
                self.main_bar
                    .println(format!("{UPLOAD}Uploaded {}", key.cyan()));
            }

            ProgressEvent::ArtifactUnchanged { key } => {
                self.main_bar
                    .set_message(format!("Unchanged {}", key.dimmed()));
            }

            ProgressEvent::FeedRendered { episode_count } => {
                self.main_bar.set_message(format!(
                    "{BOOKS}Feed rendered with {} episodes",
                    episode_count.to_string().cyan()
                ));
            }

            ProgressEvent::InvalidationRequested {
                invalidation_id,
                path_count,
            } => {
                self.main_bar.println(format!(
                    "{BROOM}Invalidating {} paths {}",
                    path_count.to_string().cyan(),
                    format!("({invalidation_id})").dimmed()
                ));
            }

            ProgressEvent::RunCompleted {
                published_count,
                failed_count,
                uploaded_count,
            } => {
                self.main_bar.finish_and_clear();
                println!(
                    "\n{PARTY}{} {} published, {} uploads, {} failed",
                    "Publish complete:".bold().green(),
                    published_count.to_string().green().bold(),
                    uploaded_count.to_string().yellow(),
                    if failed_count > 0 {
                        failed_count.to_string().red().bold()
                    } else {
                        failed_count.to_string().green()
                    }
                );
            }
        }
    }
}

fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() <= max_len {
        title.to_string()
    } else {
        let truncated: String = title.chars().take(max_len.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}

fn init_tracing(quiet: bool, verbose: u8) {
    let default_filter = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "podpub=info,warn",
        (false, _) => "podpub=debug,info",
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.quiet, args.verbose);

    if !args.quiet {
        println!(
            "\n{}{} {}\n",
            MICROPHONE,
            "podpub".bold().magenta(),
            "- Podcast Publisher".dimmed()
        );
    }

    let config = load_config(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;

    let store = config
        .storage
        .open()
        .context("Failed to open object store")?;
    let converter = FfmpegConverter::new(config.audio.clone());
    let invalidator = config
        .cdn
        .invalidator(&config.feed.base_url)
        .context("Failed to set up cache invalidation")?;

    let sources = if args.sources.is_empty() {
        discover_sources(&config.directories.episodes)
            .await
            .context("Failed to scan episodes directory")?
    } else {
        args.sources.clone()
    };

    let reporter: SharedProgressReporter = if args.quiet {
        NoopReporter::shared()
    } else {
        Arc::new(IndicatifReporter::new())
    };

    let ctx = PublishContext {
        config: &config,
        store: store.as_ref(),
        converter: &converter,
        invalidator: invalidator.as_deref(),
        reporter,
    };

    let options = RunOptions {
        title: args.title,
        description: args.description,
    };

    let report = process_run(&ctx, &sources, &options)
        .await
        .context("Publish run failed")?;

    if !args.quiet && !report.episodes_failed.is_empty() {
        println!("\n{}", "Failed episodes:".red().bold());
        for (source, error) in &report.episodes_failed {
            println!("  {}{} - {}", CROSS, source.yellow(), error.dimmed());
        }
    }

    if !args.quiet {
        println!(
            "\n{FOLDER}Feed: {} ({} episodes)\n",
            report.feed_path.display().to_string().cyan(),
            report.total_episodes
        );
    }

    Ok(())
}
