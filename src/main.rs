mod analyzer;
mod cache;
mod commands;
mod config;
mod date_range;
mod github;
mod http;
mod slack;
mod sync;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;

use commands::analyze::AnalyzeOptions;
use github::RepoTarget;

#[derive(Parser, Debug)]
#[command(name = "ai-pm")]
#[command(about = "Mirror GitHub issues and Slack conversations, and propose missing issues")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./ai-pm.yaml, then $XDG_CONFIG_HOME/ai-pm/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Also write logs to <output_dir>/logs, rotated daily
  #[arg(long, global = true)]
  log_file: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// GitHub issue cache
  Github {
    #[command(subcommand)]
    action: SyncAction,
  },
  /// Slack message cache
  Slack {
    #[command(subcommand)]
    action: SlackAction,
  },
  /// Propose issues for recent Slack conversations
  Analyze {
    /// How many days of messages to analyze
    #[arg(short, long, default_value_t = 7)]
    days: u32,
    /// Analyze one channel instead of every configured one
    #[arg(long)]
    channel: Option<String>,
    /// Repository to create issues in (owner/repo)
    #[arg(long)]
    repo: Option<RepoTarget>,
    /// Create every proposal without asking
    #[arg(short, long)]
    yes: bool,
  },
  /// Propose issues from a Markdown document
  MdIssues {
    file: PathBuf,
    /// Repository to create issues in (owner/repo)
    #[arg(long)]
    repo: Option<RepoTarget>,
    /// Create every proposal without asking
    #[arg(short, long)]
    yes: bool,
  },
}

#[derive(Subcommand, Debug)]
enum SyncAction {
  /// Full fetch for scopes without a cache
  Init,
  /// Fetch what changed since the last run
  Update,
}

#[derive(Subcommand, Debug)]
enum SlackAction {
  /// Full fetch for channels without a cache
  Init {
    /// Days of history to fetch (default: slack.initial_days)
    #[arg(short, long)]
    days: Option<u32>,
  },
  /// Fetch what changed since the last run
  Update,
}

fn init_logging(log_dir: Option<&Path>) -> Option<WorkerGuard> {
  use tracing_subscriber::{fmt, prelude::*, EnvFilter};

  let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let stderr_layer = fmt::layer()
    .with_target(false)
    .with_writer(std::io::stderr);

  let (file_layer, guard) = match log_dir {
    Some(dir) => {
      let appender = tracing_appender::rolling::daily(dir, "ai-pm.log");
      let (writer, guard) = tracing_appender::non_blocking(appender);
      let layer = fmt::layer().with_ansi(false).with_writer(writer);
      (Some(layer), Some(guard))
    }
    None => (None, None),
  };

  tracing_subscriber::registry()
    .with(env_filter)
    .with(stderr_layer)
    .with(file_layer)
    .init();

  guard
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  dotenvy::dotenv().ok();

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;

  let log_dir = config.output_dir.join("logs");
  let _guard = init_logging(args.log_file.then_some(log_dir.as_path()));

  let cache = commands::open_cache(&config.storage)?;

  match args.command {
    Command::Github { action } => {
      match action {
        SyncAction::Init => commands::github::init(&config, &cache).await?,
        SyncAction::Update => commands::github::update(&config, &cache).await?,
      };
    }
    Command::Slack { action } => {
      match action {
        SlackAction::Init { days } => commands::slack::init(&config, &cache, days).await?,
        SlackAction::Update => commands::slack::update(&config, &cache).await?,
      };
    }
    Command::Analyze {
      days,
      channel,
      repo,
      yes,
    } => {
      let options = AnalyzeOptions {
        days,
        channel,
        repo,
        yes,
      };
      commands::analyze::run(&config, &cache, options).await?;
    }
    Command::MdIssues { file, repo, yes } => {
      commands::markdown::run(&config, &file, repo, yes).await?;
    }
  }

  Ok(())
}
