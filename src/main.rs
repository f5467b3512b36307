//! Diktat - voice dictation and AI-assisted text editing for the clipboard
//!
//! Run with `diktat` or `diktat daemon` to start the daemon.
//! Press the toggle hotkey, speak, press again: the recognized text lands
//! on the clipboard. Select text somewhere first and the recording becomes
//! an editing command applied to that selection instead.

use anyhow::Context;
use clap::{Parser, Subcommand};
use diktat::config::{self, DEFAULT_CONFIG};
use diktat::{Config, Daemon};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "diktat")]
#[command(author, version, about = "Voice dictation and AI text editing for the clipboard")]
#[command(long_about = "
Diktat is a voice capture and editing daemon for Wayland Linux systems.
Press the toggle hotkey, speak, press again: the transcript is copied to
the clipboard. Select text in any application right before pressing the
hotkey and your speech is treated as an editing command instead; the
edited text replaces the clipboard content.

SETUP:
  1. Add yourself to the input group: sudo usermod -aG input $USER
  2. Log out and back in
  3. Start the ydotool daemon: systemctl --user enable --now ydotool
  4. Set your API key: export DIKTAT_API_KEY=...
  5. Run: diktat
")]
struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daemon (default when no subcommand is given)
    Daemon,

    /// Toggle recording in a running daemon (sends SIGUSR1)
    Toggle,

    /// Stop recording in a running daemon (sends SIGUSR2)
    Stop,

    /// Configuration helpers
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Write the default config template to the config path
    Init,
}

fn init_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();
}

/// Send a control signal to the running daemon via its PID file
fn signal_daemon(signal: i32, name: &str) -> anyhow::Result<()> {
    let pid_path = Config::runtime_dir().join("pid");
    let pid_str = std::fs::read_to_string(&pid_path)
        .with_context(|| format!("No running daemon found (missing {:?})", pid_path))?;
    let pid: i32 = pid_str
        .trim()
        .parse()
        .with_context(|| format!("Invalid PID file contents: {:?}", pid_str))?;

    let result = unsafe { libc::kill(pid, signal) };
    if result != 0 {
        anyhow::bail!("Failed to send {} to pid {}", name, pid);
    }

    println!("Sent {} to daemon (pid {})", name, pid);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command.unwrap_or(Commands::Daemon) {
        Commands::Daemon => {
            let config = config::load_config(cli.config.as_deref())?;
            let mut daemon = Daemon::new(config);
            daemon.run().await?;
        }

        Commands::Toggle => signal_daemon(libc::SIGUSR1, "SIGUSR1")?,

        Commands::Stop => signal_daemon(libc::SIGUSR2, "SIGUSR2")?,

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let config = config::load_config(cli.config.as_deref())?;
                let rendered =
                    toml::to_string_pretty(&config).context("Failed to render config")?;
                print!("{}", rendered);
            }
            ConfigAction::Init => {
                let path = cli
                    .config
                    .clone()
                    .or_else(Config::default_path)
                    .context("Cannot determine config path")?;

                if path.exists() {
                    anyhow::bail!("Config already exists at {:?}", path);
                }
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("Failed to create {:?}", parent))?;
                }
                std::fs::write(&path, DEFAULT_CONFIG)
                    .with_context(|| format!("Failed to write {:?}", path))?;
                println!("Wrote default config to {:?}", path);
            }
        },
    }

    Ok(())
}
