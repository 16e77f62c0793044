use clap::Parser;
use git_auto_pusher::pusher::config::ConfigStore;
use git_auto_pusher::pusher::credentials::CredentialStore;
use git_auto_pusher::pusher::errors::Result;
use git_auto_pusher::pusher::git_ops::{self, GitWorkspace};
use git_auto_pusher::pusher::notifier::{DesktopNotifier, Notifier, SilentNotifier};
use git_auto_pusher::pusher::session::{Session, DEFAULT_INTERVAL_SECS};
use git_auto_pusher::pusher::setup::{ensure_credentials, setup_credentials, TerminalPrompt};
use git_auto_pusher::pusher::watcher::{interrupt_signal, Pusher};
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

const EXAMPLES: &str = "\
Examples:
  git-auto-pusher                          # Run once in current directory
  git-auto-pusher --watch                  # Watch current directory
  git-auto-pusher --path /path/to/repo --watch --interval 60
  git-auto-pusher --setup-credentials";

/// Automatically commit and push git changes.
#[derive(Parser)]
#[command(version, after_help = EXAMPLES)]
struct Cli {
    /// Path to git repository (default: current directory)
    #[arg(short, long)]
    path: Option<PathBuf>,
    /// Continuously watch for changes
    #[arg(short, long)]
    watch: bool,
    /// Check interval in seconds
    #[arg(short, long, default_value_t = DEFAULT_INTERVAL_SECS,
          value_parser = clap::value_parser!(u64).range(1..))]
    interval: u64,
    /// Setup GitHub credentials, then exit
    #[arg(long)]
    setup_credentials: bool,
    /// Remove stored GitHub credentials, then exit
    #[arg(long)]
    clear_credentials: bool,
    /// Check that the OS keychain is usable, then exit
    #[arg(long)]
    check_keychain: bool,
    /// Print recently used repositories, then exit
    #[arg(long)]
    recent: bool,
    /// Log instead of showing desktop notifications
    #[arg(long)]
    no_notify: bool,
    /// Path to config JSON (default: ~/.git_auto_pusher.json)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Cli::parse();

    match run(args).await {
        Ok(code) => code,
        Err(error) => {
            error!("Fatal error: {error}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Cli) -> Result<ExitCode> {
    let config = match &args.config {
        Some(path) => ConfigStore::new(path),
        None => ConfigStore::at_default_location()?,
    };
    if args.recent {
        for repo in config.load()?.recent_repos {
            println!("{}", repo.display());
        }
        return Ok(ExitCode::SUCCESS);
    }

    let session = Session::new(args.path.as_deref(), Duration::from_secs(args.interval))?;
    config.add_recent(&session.repo_path)?;
    if !git_ops::status(&session.repo_path)?.is_repo() {
        error!("Error: {} is not a git repository", session.repo_path.display());
        return Ok(ExitCode::FAILURE);
    }

    let credentials = CredentialStore::keychain();
    if args.check_keychain {
        return Ok(match credentials.self_test() {
            Ok(()) => {
                info!("Keychain access: ok");
                ExitCode::SUCCESS
            }
            Err(cause) => {
                error!("Keychain access failed: {cause}");
                ExitCode::FAILURE
            }
        });
    }
    if args.clear_credentials {
        return Ok(match credentials.clear() {
            Ok(()) => {
                info!("Credentials cleared.");
                ExitCode::SUCCESS
            }
            Err(cause) => {
                error!("Could not clear credentials: {cause}");
                ExitCode::FAILURE
            }
        });
    }
    if args.setup_credentials {
        return Ok(match setup_credentials(&credentials, &mut TerminalPrompt) {
            Ok(_) => {
                info!("Credentials setup completed.");
                ExitCode::SUCCESS
            }
            Err(cause) => {
                error!("Credentials setup failed: {cause}");
                ExitCode::FAILURE
            }
        });
    }

    let credentials = match ensure_credentials(&credentials, &mut TerminalPrompt) {
        Ok(credentials) => credentials,
        Err(cause) => {
            error!("Cannot proceed without valid credentials: {cause}");
            return Ok(ExitCode::FAILURE);
        }
    };

    let workspace = GitWorkspace::new(&session.repo_path, Some(credentials));
    let code = if args.no_notify {
        drive(Pusher::new(session, workspace, SilentNotifier), args.watch).await
    } else {
        drive(Pusher::new(session, workspace, DesktopNotifier::default()), args.watch).await
    };
    Ok(code)
}

async fn drive<N: Notifier>(mut pusher: Pusher<GitWorkspace, N>, watch: bool) -> ExitCode {
    if watch {
        let interrupted = interrupt_signal().await;
        pusher.watch(interrupted).await;
        ExitCode::SUCCESS
    } else if pusher.run_once() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
