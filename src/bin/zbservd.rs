//! zbserv daemon - live stamina countdowns for the desktop overlay
//!
//! Watches the configured game executables, keeps one countdown per title
//! and streams updates to overlay clients on `ws://<addr>/ws`.
//!
//! # Usage
//!
//! ```bash
//! # Start the daemon (foreground)
//! zbservd start
//!
//! # Start the daemon (background/daemonized, unix only)
//! zbservd start -d
//!
//! # Use a specific config and the cookie from a KEY=VALUE file
//! zbservd start --config ./config.toml --env-file ./conf.env
//!
//! # Stop the daemon
//! zbservd stop
//!
//! # Check daemon status
//! zbservd status
//!
//! # Enable debug logging
//! RUST_LOG=zbservd=debug zbservd start
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT (Ctrl+C elsewhere): Graceful shutdown

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use zbserv_core::ProcessFilter;
use zbserv_hoyolab::HoyolabProvider;
use zbservd::config::{self, Config};
use zbservd::control::LogPlaybackControl;
use zbservd::lifecycle::{LifecycleMonitor, SysinfoEventSource};
use zbservd::registry::spawn_registry;
use zbservd::scheduler::CountdownScheduler;
use zbservd::server::{DaemonServer, UPDATE_CHANNEL_CAPACITY, WS_PATH};

/// zbserv daemon - stamina countdowns for HoYoverse titles
#[derive(Parser, Debug)]
#[command(name = "zbservd", version, about)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the daemon
    Start(StartArgs),
    /// Stop the running daemon
    Stop,
    /// Show daemon status
    Status,
}

#[derive(clap::Args, Debug, Default)]
struct StartArgs {
    /// Run as a background daemon (fork to background)
    #[arg(short = 'd', long)]
    daemon: bool,

    /// Config file (default: $ZBSERV_CONFIG or <config_dir>/zbserv/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// KEY=VALUE file providing HOYOLAB_COOKIE
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Listen address, overriding [server] addr
    #[arg(long)]
    addr: Option<String>,
}

fn state_dir() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join("zbserv")
}

/// Returns the path to the PID file.
fn pid_file_path() -> PathBuf {
    state_dir().join("zbservd.pid")
}

/// Returns the path to the log file.
fn log_file_path() -> PathBuf {
    state_dir().join("zbservd.log")
}

/// Reads the PID from the PID file, if it exists.
fn read_pid() -> Option<u32> {
    let mut file = File::open(pid_file_path()).ok()?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).ok()?;
    contents.trim().parse().ok()
}

/// Writes the current PID to the PID file.
fn write_pid() -> Result<()> {
    let path = pid_file_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create state directory")?;
    }
    let mut file = File::create(&path).context("Failed to create PID file")?;
    write!(file, "{}", process::id()).context("Failed to write PID")?;
    Ok(())
}

/// Removes the PID file.
fn remove_pid_file() {
    let _ = fs::remove_file(pid_file_path());
}

/// Checks if a process with the given PID is running.
fn is_process_running(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    system.process(pid).is_some()
}

/// Checks if the daemon is already running.
fn is_daemon_running() -> Option<u32> {
    if let Some(pid) = read_pid() {
        if is_process_running(pid) {
            return Some(pid);
        }
        // Stale PID file
        remove_pid_file();
    }
    None
}

/// Sends SIGTERM to the daemon process.
fn stop_daemon(pid: u32) -> Result<()> {
    #[cfg(unix)]
    {
        let Ok(raw_pid) = i32::try_from(pid) else {
            bail!("Invalid PID {}", pid);
        };
        let result = unsafe { libc::kill(raw_pid, libc::SIGTERM) };
        if result != 0 {
            bail!("Failed to send SIGTERM to process {}", pid);
        }
    }
    #[cfg(not(unix))]
    {
        bail!("Stop command is only supported on Unix systems (PID {})", pid);
    }
    Ok(())
}

/// Resolves and loads the configuration for `start`.
fn load_config(args: &StartArgs) -> Result<Config> {
    let path = args.config.clone().or_else(config::default_config_path);
    let mut config = match &path {
        Some(path) => config::load_or_default(path)?,
        None => Config::default(),
    };
    if let Some(addr) = &args.addr {
        config.server.addr = addr.clone();
    }
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let command = args.command.unwrap_or(Command::Start(StartArgs::default()));

    match command {
        Command::Start(start) => {
            if let Some(pid) = is_daemon_running() {
                eprintln!("Daemon is already running (PID {})", pid);
                eprintln!("Use 'zbservd stop' to stop it first.");
                process::exit(1);
            }

            // Fail before forking so config errors reach the terminal.
            let config = load_config(&start)?;
            let cookie = config::resolve_cookie(&config, start.env_file.as_deref())?;

            if start.daemon {
                // Daemonize before starting tokio runtime
                daemonize()?;
            }

            write_pid()?;
            let result = run_daemon(config, cookie);
            remove_pid_file();

            result
        }
        Command::Stop => {
            if let Some(pid) = is_daemon_running() {
                println!("Stopping daemon (PID {})...", pid);
                stop_daemon(pid)?;

                // Wait for process to exit (up to 5 seconds)
                for _ in 0..50 {
                    if !is_process_running(pid) {
                        println!("Daemon stopped.");
                        return Ok(());
                    }
                    std::thread::sleep(std::time::Duration::from_millis(100));
                }

                eprintln!("Daemon did not stop within 5 seconds.");
                process::exit(1);
            } else {
                println!("Daemon is not running.");
                Ok(())
            }
        }
        Command::Status => {
            if let Some(pid) = is_daemon_running() {
                println!("Daemon is running (PID {})", pid);
                if let Some(path) = config::default_config_path() {
                    println!("Config: {}", path.display());
                }
                println!("Log: {}", log_file_path().display());
                Ok(())
            } else {
                println!("Daemon is not running.");
                process::exit(1);
            }
        }
    }
}

/// Daemonizes the current process.
#[cfg(unix)]
fn daemonize() -> Result<()> {
    use daemonize::Daemonize;

    let log_path = log_file_path();
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent).context("Failed to create log directory")?;
    }

    let stdout = File::create(&log_path).context("Failed to create log file for stdout")?;
    let stderr = stdout
        .try_clone()
        .context("Failed to create log file for stderr")?;

    Daemonize::new()
        .working_directory("/")
        .stdout(stdout)
        .stderr(stderr)
        .start()
        .context("Failed to daemonize")?;

    Ok(())
}

#[cfg(not(unix))]
fn daemonize() -> Result<()> {
    bail!("Daemon mode is only supported on Unix systems; run in the foreground instead")
}

/// Runs the daemon (async entry point).
#[tokio::main]
async fn run_daemon(config: Config, cookie: Option<String>) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("zbservd=info".parse()?)
                .add_directive("zbserv_hoyolab=info".parse()?)
                .add_directive("zbserv_core=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        domains = config.domains.len(),
        "zbserv daemon starting"
    );

    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let provider = HoyolabProvider::new(cookie).context("Failed to build HTTP client")?;
    if !provider.has_credentials() {
        warn!("No HoYoLAB cookie configured; countdowns will not be fetched");
    }

    let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
    let scheduler = CountdownScheduler::new(
        Arc::new(provider),
        Arc::new(updates.clone()),
        config.domains.clone(),
    );

    let registry = spawn_registry();
    info!("Subscriber registry started");

    let monitor = Arc::new(
        LifecycleMonitor::new(
            Arc::new(SysinfoEventSource::new(config.monitor.poll_interval())),
            ProcessFilter::new(config.process_names()),
            registry.clone(),
            cancel_token.child_token(),
        )
        .with_wait_timeout(config.monitor.wait_timeout()),
    );
    let monitor_task = tokio::spawn({
        let monitor = Arc::clone(&monitor);
        async move { monitor.run().await }
    });
    info!("Lifecycle monitor started");

    let server = DaemonServer::new(
        config.server.addr.clone(),
        scheduler.clone(),
        registry,
        updates,
        Arc::new(LogPlaybackControl),
        cancel_token.clone(),
    );

    info!(addr = %server.addr(), path = WS_PATH, "Starting server");
    let result = server.run().await;

    // Stop background work whether the server exited cleanly or not.
    cancel_token.cancel();
    monitor.stop();
    scheduler.shutdown();
    if monitor_task.await.is_err() {
        warn!("Lifecycle monitor task panicked");
    }

    if let Err(e) = result {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("zbserv daemon stopped");
    Ok(())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
