//! Gallery Rotator - keeps a photo frame folder fresh
//!
//! A CLI tool that rotates a bounded set of photos from a large library
//! folder into a gallery folder, once or on a daily schedule.

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use gallery_rotator::config::TIME_FORMAT;
use gallery_rotator::{
    Admission, Cli, Command, Config, ConsoleCommand, Coordinator, OperationEvent, OperationKind,
    OperationStatus, Rotator, Scheduler, next_switch,
};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{Level, debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

// CLI Output Module
mod cli_output {
    //! Colored, consistently formatted terminal output.

    use crossterm::{
        ExecutableCommand,
        style::{Color, Print, Stylize, style},
    };
    use std::io::stdout;

    /// CLI theme colors
    pub struct CliTheme;

    impl CliTheme {
        pub const SUCCESS: Color = Color::Green;
        pub const WARNING: Color = Color::Yellow;
        pub const ERROR: Color = Color::Red;
        pub const HINT: Color = Color::DarkGrey;
        pub const ACCENT: Color = Color::Cyan;
    }

    pub fn print_separator() {
        let _ = stdout().execute(Print(&format!("{}\n", "─".repeat(60))));
    }

    pub fn print_success(msg: &str) {
        let _ = stdout().execute(Print(style("✓ ").with(CliTheme::SUCCESS).bold()));
        let _ = stdout().execute(Print(format!("{}\n", msg)));
    }

    pub fn print_warning(msg: &str) {
        let _ = stdout().execute(Print(style("⚠ ").with(CliTheme::WARNING).bold()));
        let _ = stdout().execute(Print(format!("{}\n", msg)));
    }

    pub fn print_error(msg: &str) {
        let _ = stdout().execute(Print(style("✗ ").with(CliTheme::ERROR).bold()));
        let _ = stdout().execute(Print(format!("{}\n", msg)));
    }

    pub fn print_hint(msg: &str) {
        let _ = stdout().execute(Print(style("→ ").with(CliTheme::HINT)));
        let _ = stdout().execute(Print(format!("{}\n", msg)));
    }

    /// Print a key-value pair
    pub fn print_key_value(key: &str, value: &str, value_color: Option<Color>) {
        let key_styled = style(key).with(CliTheme::HINT);
        let value_styled = match value_color {
            Some(color) => style(value).with(color),
            None => style(value).bold(),
        };
        let _ = stdout().execute(Print("  "));
        let _ = stdout().execute(Print(key_styled));
        let _ = stdout().execute(Print(": "));
        let _ = stdout().execute(Print(value_styled));
        let _ = stdout().execute(Print("\n"));
    }

    pub fn print_log_path(path: &str) {
        let _ = stdout().execute(Print(style("  📁 ").with(CliTheme::ACCENT)));
        let _ = stdout().execute(Print(style("Log file: ").with(CliTheme::HINT)));
        let _ = stdout().execute(Print(format!("{}\n", path)));
    }
}

use cli_output::*;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    if let Command::InitConfig { ref path } = cli.command {
        return init_config(path);
    }

    // Get the executable directory for Config and default state directories
    let exe_dir = get_executable_dir()?;
    let mut config = load_config(&cli, &exe_dir)?;
    if config.state_dir.is_none() {
        config.state_dir = Some(exe_dir.clone());
    }

    let log_path = get_log_path(&config.state_path(), &cli);
    let _guard = setup_logging(&cli, &log_path)?;

    info!(version = env!("CARGO_PKG_VERSION"), command = cli.command_name(), "Gallery Rotator starting");
    if cli.verbose {
        info!(?config, "Configuration loaded");
    }
    info!(log_file = %log_path.display(), "Log file location");

    let code = match cli.command {
        Command::Next => show_next(&config)?,
        Command::Rotate | Command::Clear | Command::Reset => run_once(&cli.command, &config)?,
        Command::Run => run_scheduler(&config)?,
        Command::InitConfig { .. } => ExitCode::SUCCESS,
    };

    print_log_path(&log_path.display().to_string());
    Ok(code)
}

/// Write the sample configuration, refusing to overwrite
fn init_config(path: &Path) -> Result<ExitCode> {
    if path.exists() {
        print_error(&format!("{} already exists", path.display()));
        return Ok(ExitCode::FAILURE);
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, Config::sample_config())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    print_success(&format!("Sample configuration written to {}", path.display()));
    Ok(ExitCode::SUCCESS)
}

fn show_next(config: &Config) -> Result<ExitCode> {
    if let Err(e) = config.validate_schedule() {
        report_invalid(&e);
        return Ok(ExitCode::FAILURE);
    }
    let Some(main_time) = config.parsed_main_time() else {
        return Ok(ExitCode::FAILURE);
    };

    let now = Local::now().naive_local();
    let next = next_switch(main_time, config.switches_per_day, now);
    print_key_value("Next Switch", &next.to_string(), Some(CliTheme::ACCENT));
    Ok(ExitCode::SUCCESS)
}

/// Run one operation to completion
fn run_once(command: &Command, config: &Config) -> Result<ExitCode> {
    let (coordinator, events) = Coordinator::new(Rotator::new(config.clone()));

    let admission = match command {
        Command::Rotate => coordinator.start_rotation(config),
        Command::Clear => coordinator.start_clear(config),
        _ => {
            let result = coordinator.reset_history();
            if matches!(result, Ok(Admission::Accepted)) {
                print_success("History and metadata cache cleared");
            }
            result
        }
    };

    match admission {
        Ok(Admission::Accepted) => {}
        Ok(Admission::Busy) => {
            print_warning("Operation already in progress");
            return Ok(ExitCode::FAILURE);
        }
        Err(gallery_rotator::Error::Config(e)) => {
            report_invalid(&e);
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e.into()),
    }

    if matches!(command, Command::Reset) {
        return Ok(ExitCode::SUCCESS);
    }

    let status = loop {
        match events.recv().context("Worker stopped without reporting")? {
            OperationEvent::Started(_) => print_hint("Working..."),
            OperationEvent::Finished { status, .. } => break status,
        }
    };
    coordinator.shutdown();

    print_separator();
    print_status(&status);
    Ok(match status {
        OperationStatus::Failed(_) => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    })
}

/// Rotate on schedule and obey console commands until `quit`
fn run_scheduler(config: &Config) -> Result<ExitCode> {
    if let Err(e) = config.validate() {
        report_invalid(&e);
        return Ok(ExitCode::FAILURE);
    }
    let main_time = config
        .parsed_main_time()
        .context("Main time must be in HH:MM format")?;

    let (coordinator, events) = Coordinator::new(Rotator::new(config.clone()));
    let now = Local::now().naive_local();
    let mut scheduler = Scheduler::new(main_time, config.switches_per_day, now);
    print_key_value("Next Switch", &scheduler.next(now).to_string(), Some(CliTheme::ACCENT));
    print_hint("Commands: now, clear, reset, next, cancel, quit");

    let mut commands = Some(spawn_stdin_reader());
    let poll_interval = config.poll_interval();
    let mut next_poll = Instant::now() + poll_interval;

    loop {
        while let Ok(event) = events.try_recv() {
            report_event(&event);
        }

        if Instant::now() >= next_poll {
            next_poll = Instant::now() + poll_interval;
            let now = Local::now().naive_local();
            if let Some(due) = scheduler.tick(now) {
                if coordinator.is_busy() {
                    warn!(at = %due.format(TIME_FORMAT), "Scheduled switch skipped, operation in progress");
                } else {
                    info!(at = %due.format(TIME_FORMAT), "Scheduled switch");
                    start(&coordinator, OperationKind::Rotate, config);
                }
            }
            debug!(next = %scheduler.next(now), "Next switch");
        }

        let received = commands
            .as_ref()
            .map(|rx| rx.recv_timeout(Duration::from_millis(200)));
        let command = match received {
            Some(Ok(line)) => Some(line),
            Some(Err(RecvTimeoutError::Timeout)) => None,
            Some(Err(RecvTimeoutError::Disconnected)) => {
                // EOF only stops command reading
                info!("Console input closed, continuing on schedule");
                commands = None;
                None
            }
            None => {
                thread::sleep(Duration::from_millis(200));
                None
            }
        };

        let Some(line) = command else {
            continue;
        };
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<ConsoleCommand>() {
            Ok(ConsoleCommand::Now) => start(&coordinator, OperationKind::Rotate, config),
            Ok(ConsoleCommand::Clear) => start(&coordinator, OperationKind::Clear, config),
            Ok(ConsoleCommand::Reset) => match coordinator.reset_history() {
                Ok(Admission::Accepted) => print_success("History and metadata cache cleared"),
                Ok(Admission::Busy) => print_warning("Cannot reset during operation"),
                Err(e) => print_error(&e.to_string()),
            },
            Ok(ConsoleCommand::Next) => {
                let next = scheduler.next(Local::now().naive_local());
                print_key_value("Next Switch", &next.to_string(), Some(CliTheme::ACCENT));
            }
            Ok(ConsoleCommand::Cancel) => coordinator.cancel(),
            Ok(ConsoleCommand::Quit) => break,
            Err(message) => print_warning(&message),
        }
    }

    info!("Shutting down");
    if !coordinator.shutdown() {
        print_warning("Worker did not stop in time, latest cache updates may be lost");
    }
    while let Ok(event) = events.try_recv() {
        report_event(&event);
    }
    Ok(ExitCode::SUCCESS)
}

fn start(coordinator: &Coordinator, kind: OperationKind, config: &Config) {
    let result = match kind {
        OperationKind::Rotate => coordinator.start_rotation(config),
        OperationKind::Clear => coordinator.start_clear(config),
    };
    match result {
        Ok(Admission::Accepted) => {}
        Ok(Admission::Busy) => print_warning("Operation already in progress"),
        Err(gallery_rotator::Error::Config(e)) => report_invalid(&e),
        Err(e) => {
            error!(error = %e, "Failed to start operation");
            print_error(&e.to_string());
        }
    }
}

/// Lines from stdin, read on their own thread
fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn report_event(event: &OperationEvent) {
    match event {
        OperationEvent::Started(kind) => print_hint(&format!("Working ({:?})...", kind)),
        OperationEvent::Finished { status, .. } => print_status(status),
    }
}

fn print_status(status: &OperationStatus) {
    let text = status.to_string();
    match status {
        OperationStatus::Completed(_) => print_success(&text),
        OperationStatus::Cancelled => print_warning(&text),
        OperationStatus::Failed(_) => print_error(&text),
    }
}

fn report_invalid(error: &gallery_rotator::ConfigError) {
    error!(error = %error, "Invalid settings");
    if error.messages().is_empty() {
        print_error(&error.to_string());
        return;
    }
    for message in error.messages() {
        print_error(message);
    }
}

/// Get the directory where the executable is located
fn get_executable_dir() -> Result<PathBuf> {
    let exe_path = std::env::current_exe()?;
    Ok(exe_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".")))
}

/// Determine the log file path based on config file or command name
fn get_log_path(state_dir: &Path, cli: &Cli) -> PathBuf {
    let log_dir = state_dir.join("Log");
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");

    if let Some(config_name) = cli.config_name() {
        log_dir
            .join(&config_name)
            .join(format!("{}_{}_{}.log", config_name, cli.command_name(), timestamp))
    } else {
        log_dir.join(format!("{}_{}.log", cli.command_name(), timestamp))
    }
}

/// Resolve config path - supports shorthand syntax
fn resolve_config_path(exe_dir: &Path, config_path: &Path) -> PathBuf {
    if config_path.exists() {
        return config_path.to_path_buf();
    }

    let with_extension = if config_path.extension().is_none() {
        config_path.with_extension("toml")
    } else {
        config_path.to_path_buf()
    };

    if with_extension.exists() {
        return with_extension;
    }

    let config_dir = exe_dir.join("Config");
    let filename = config_path.file_name().unwrap_or(config_path.as_os_str());

    let mut in_config_dir = config_dir.join(filename);
    if in_config_dir.extension().is_none() {
        in_config_dir = in_config_dir.with_extension("toml");
    }

    if in_config_dir.exists() {
        return in_config_dir;
    }

    config_path.to_path_buf()
}

/// Load configuration from file or CLI arguments
fn load_config(cli: &Cli, exe_dir: &Path) -> Result<Config> {
    let config = if let Some(ref config_path) = cli.config {
        let resolved_path = resolve_config_path(exe_dir, config_path);
        let file_config = Config::load_from_file(&resolved_path)?;
        cli.merge_with_config(file_config)
    } else {
        cli.to_config()
    };

    Ok(config)
}

/// Setup logging (file + console)
fn setup_logging(cli: &Cli, log_path: &Path) -> Result<WorkerGuard> {
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(log_path)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);
    let timer = || fmt::time::ChronoLocal::new("%m-%d %H:%M:%S".to_string());

    let subscriber = tracing_subscriber::registry().with(env_filter);

    if cli.json_log {
        subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_timer(timer())
                    .with_ansi(false)
                    .with_writer(non_blocking),
            )
            .with(fmt::layer().with_timer(timer()).with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_timer(timer())
                    .with_ansi(false)
                    .with_writer(non_blocking),
            )
            .with(fmt::layer().with_timer(timer()).with_writer(std::io::stderr))
            .init();
    }

    Ok(guard)
}
