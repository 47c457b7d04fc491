//! CLI entry point for dirwatch.
//!
//! Watches one or more directory trees and prints a line for every
//! classified change until interrupted.
//!
//! # Usage
//!
//! ```bash
//! dirwatch [OPTIONS] <PATHS>...
//!
//! # Watch two trees, newest directories included
//! dirwatch ./src ./assets
//!
//! # Only the top level, JSON lines
//! dirwatch --no-subdirs --format json /srv/inbox
//!
//! # Load timings from a file, then override one
//! dirwatch --config dirwatch.json --settle-ms 250 .
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

use std::io::Write;

use camino::Utf8PathBuf;
use clap::{Parser, ValueEnum};
use dw_core::{Config, ReactiveAdd, WatchConfig};
use dw_watcher::{FileWatcher, WatchEvent, WatchHandler};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// CLI ARGUMENT TYPES
// =============================================================================

/// Watch directory trees and report file changes, new directories and
/// removals.
#[derive(Parser)]
#[command(name = "dirwatch", version, about, long_about = None)]
struct Cli {
    /// Directories to watch.
    #[arg(required = true)]
    paths: Vec<Utf8PathBuf>,

    /// Watch only the given directories, not their existing subdirectories.
    #[arg(long)]
    no_subdirs: bool,

    /// Subscribe only the new directory itself when one appears. By default
    /// the subdirectories it already holds are subscribed too.
    #[arg(long)]
    shallow: bool,

    /// Window in milliseconds for dropping repeated events on one path.
    #[arg(long)]
    debounce_ms: Option<u64>,

    /// Delay in milliseconds before a change is classified.
    #[arg(long)]
    settle_ms: Option<u64>,

    /// JSON configuration file. Flags override its values.
    #[arg(short, long, env = "DIRWATCH_CONFIG")]
    config: Option<Utf8PathBuf>,

    /// Output format for events.
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Enable verbose logging (debug level).
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored output.
    #[arg(long)]
    no_color: bool,
}

/// Event output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// One human-readable line per event.
    Text,
    /// One JSON object per line.
    Json,
}

// =============================================================================
// INITIALIZATION FUNCTIONS
// =============================================================================

/// Initializes the tracing subscriber for logging.
///
/// Respects the `RUST_LOG` environment variable if set. Otherwise, uses
/// `debug` level if `--verbose` is set, or `info` level by default.
/// The `notify` backend is filtered to `warn` level.
fn init_tracing(verbose: bool, no_color: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { "info" };
        EnvFilter::new(format!("{level},notify=warn"))
    });

    // Check if colors should be disabled (flag or NO_COLOR env var)
    let use_ansi = !no_color && std::env::var("NO_COLOR").is_err();

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(use_ansi)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

/// Builds the watcher configuration from the config file (if any) and flags.
///
/// # Errors
///
/// Returns an error if the config file cannot be loaded or the merged
/// configuration is invalid.
fn build_config(cli: &Cli) -> color_eyre::Result<WatchConfig> {
    let mut config = match &cli.config {
        Some(path) => Config::from_json_file(path)?.watch,
        None => WatchConfig::default(),
    };

    if let Some(debounce_ms) = cli.debounce_ms {
        config.debounce_ms = debounce_ms;
        // Keep the bookkeeping TTL valid when only the window is raised.
        config.debounce_ttl_ms = config.debounce_ttl_ms.max(debounce_ms);
    }
    if let Some(settle_ms) = cli.settle_ms {
        config.settle_ms = settle_ms;
    }
    if cli.no_subdirs {
        config.recursive = false;
    }
    if cli.shallow {
        config.reactive_add = ReactiveAdd::Shallow;
    }

    config.validate()?;
    Ok(config)
}

// =============================================================================
// OUTPUT
// =============================================================================

/// Prints every classified event to stdout.
struct EventPrinter {
    format: OutputFormat,
}

impl EventPrinter {
    fn render(&self, event: &WatchEvent) -> String {
        match self.format {
            OutputFormat::Text => event.to_string(),
            OutputFormat::Json => serde_json::to_string(event).unwrap_or_else(|error| {
                warn!(error = %error, "Failed to serialize event");
                event.to_string()
            }),
        }
    }
}

impl WatchHandler for EventPrinter {
    fn on_any(&self, event: &WatchEvent) {
        let line = self.render(event);
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        let _ = writeln!(handle, "{line}");
    }
}

// =============================================================================
// COMMAND IMPLEMENTATION
// =============================================================================

/// Watches every path until Ctrl-C (or SIGTERM on Unix), then closes all
/// roots and waits for them to drain.
///
/// # Errors
///
/// Returns an error if a path cannot be watched.
async fn run(cli: Cli) -> color_eyre::Result<()> {
    let config = build_config(&cli)?;
    let watcher = FileWatcher::with_config(config)?;
    watcher.set_handler(EventPrinter { format: cli.format });

    for path in &cli.paths {
        let root = watcher.watch_dir_with_defaults(path).await?;
        let subscribed = watcher.subscribed_paths(&root).len();
        info!(root = %root, directories = subscribed, "Watching");
    }

    wait_for_shutdown().await?;
    info!("Shutting down");

    watcher.close_all();
    watcher.wait().await;
    Ok(())
}

async fn wait_for_shutdown() -> color_eyre::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = sigterm.recv() => info!("Received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }

    Ok(())
}

// =============================================================================
// MAIN ENTRY POINT
// =============================================================================

/// Application entry point.
#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // 1. Install color-eyre FIRST (before any potential panics)
    color_eyre::install()?;

    // 2. Parse CLI arguments
    let cli = Cli::parse();

    // 3. Initialize tracing (handles --no-color for log output)
    init_tracing(cli.verbose, cli.no_color);

    // 4. Watch until interrupted
    run(cli).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use dw_watcher::{ChangeKind, Op};

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("dirwatch").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_paths_required() {
        assert!(Cli::try_parse_from(["dirwatch"]).is_err());
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = parse(&["--no-subdirs", "--shallow", "--settle-ms", "250", "/tmp"]);
        let config = build_config(&cli).unwrap();

        assert!(!config.recursive);
        assert_eq!(config.reactive_add, ReactiveAdd::Shallow);
        assert_eq!(config.settle_ms, 250);
        assert_eq!(config.debounce_ms, 100);
    }

    #[test]
    fn test_shallow_help_states_default() {
        let command = Cli::command();
        let shallow = command
            .get_arguments()
            .find(|arg| arg.get_id() == "shallow")
            .unwrap();
        let help = shallow.get_help().unwrap().to_string();
        assert!(help.contains("By default"), "{help}");

        let config = build_config(&parse(&["/tmp"])).unwrap();
        assert_eq!(config.reactive_add, ReactiveAdd::Recursive);
    }

    #[test]
    fn test_large_debounce_keeps_ttl_valid() {
        let cli = parse(&["--debounce-ms", "20000", "/tmp"]);
        let config = build_config(&cli).unwrap();
        assert_eq!(config.debounce_ttl_ms, 20_000);
    }

    #[test]
    fn test_config_file_then_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dirwatch.json");
        std::fs::write(&path, r#"{"watch": {"settle_ms": 500, "max_in_flight": 8}}"#).unwrap();
        let path = path.to_str().unwrap();

        let cli = parse(&["--config", path, "--settle-ms", "50", "/tmp"]);
        let config = build_config(&cli).unwrap();

        assert_eq!(config.settle_ms, 50);
        assert_eq!(config.max_in_flight, 8);
    }

    #[test]
    fn test_render_formats() {
        let event = WatchEvent::new(
            Utf8PathBuf::from("/srv/a.txt"),
            Op::Write,
            ChangeKind::FileChanged,
        );

        let text = EventPrinter { format: OutputFormat::Text }.render(&event);
        assert_eq!(text, "WRITE /srv/a.txt (file changed)");

        let json = EventPrinter { format: OutputFormat::Json }.render(&event);
        assert_eq!(
            json,
            r#"{"path":"/srv/a.txt","op":"WRITE","kind":"file_changed"}"#
        );
    }
}
