use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use roomrec_core::{ExclusionSet, SessionController};
use roomrec_driver::{RecordingDriver, RemoteConfig, TcpRecorderDriver};
use roomrec_logging::{init_tracing, LogEvent, LogFormat, Logger};
use roomrec_osc::OscListener;
use roomrec_tail::{discover_log_path, LogTailer};

mod config;

use config::Config;

#[derive(Parser, Debug)]
#[command(
    name = "roomrec",
    about = "Starts and stops a recording backend as people enter and leave the room",
    version,
    author
)]
struct Cli {
    /// Path to the config file (default: ./roomrec.toml)
    #[arg(short, long, default_value = config::CONFIG_FILE_NAME)]
    config: PathBuf,

    /// Host app log file to watch (overrides the config file)
    #[arg(long)]
    log_path: Option<PathBuf>,

    /// Also append structured events to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty")]
    log_format: LogFormatChoice,

    /// Check backend connectivity and exit
    #[arg(long)]
    check: bool,

    /// Dry run: show the effective settings without connecting
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(&cli.config)?.unwrap_or_default();

    let log_format: LogFormat = cli.log_format.into();
    init_tracing(&config.logging.level, log_format);

    let logger = match &cli.log_file {
        Some(path) => Logger::with_file(log_format, path)
            .with_context(|| format!("Failed to open event log {}", path.display()))?,
        None => Logger::new(log_format),
    };
    let logger = Arc::new(logger);

    // CLI override beats config beats discovery
    let log_path = cli
        .log_path
        .clone()
        .or_else(|| config.watch.log_path.clone())
        .or_else(discover_log_path);

    let remote = RemoteConfig {
        host: config.backend.host.clone(),
        port: config.backend.port,
        secret: config.backend.secret.clone().unwrap_or_default(),
        request_timeout: Duration::from_millis(config.backend.request_timeout_ms),
    };

    if cli.dry_run {
        println!("=== Dry Run ===");
        println!("Backend: {}:{}", remote.host, remote.port);
        println!(
            "Auth: {}",
            if remote.secret.is_empty() { "none" } else { "shared secret" }
        );
        match &log_path {
            Some(path) => println!("Log file: {}", path.display()),
            None => println!("Log file: not found (would exit with an error)"),
        }
        println!("Poll interval: {}ms", config.watch.poll_interval_ms);
        if config.osc.enabled {
            println!("OSC listener: 127.0.0.1:{}", config.osc.port);
        } else {
            println!("OSC listener: disabled");
        }
        println!(
            "Exclusions: {} name(s), {} id(s)",
            config.exclude.names.len(),
            config.exclude.ids.len()
        );
        return Ok(());
    }

    let driver = TcpRecorderDriver::new(remote);

    if cli.check {
        driver
            .connect()
            .await
            .context("Backend connection check failed")?;
        let version = driver.version().await.ok();
        driver.disconnect().await;
        println!(
            "Backend reachable at {}:{} ({})",
            config.backend.host,
            config.backend.port,
            version.as_deref().unwrap_or("version unknown")
        );
        return Ok(());
    }

    let log_path = log_path.context(
        "No host app log file found. Set [watch].log_path in roomrec.toml or pass --log-path.",
    )?;

    logger.log(&LogEvent::MonitorStarted {
        log_path: Some(log_path.clone()),
        poll_interval_ms: config.watch.poll_interval_ms,
        osc_enabled: config.osc.enabled,
    });

    let exclusions = ExclusionSet::new(
        config.exclude.names.clone(),
        config.exclude.ids.clone(),
    );
    let tailer = LogTailer::new(&log_path);

    let controller = Arc::new(
        SessionController::new(driver, tailer, Arc::clone(&logger))
            .with_poll_interval(Duration::from_millis(config.watch.poll_interval_ms))
            .with_exclusions(exclusions),
    );

    // Bind before connecting so a port collision fails fast
    let osc_listener = if config.osc.enabled {
        Some(
            OscListener::bind(config.osc.port)
                .await
                .context("Failed to start OSC listener")?,
        )
    } else {
        None
    };

    controller
        .clone()
        .start()
        .await
        .context("Failed to start the monitor")?;

    if let Some(listener) = osc_listener {
        let sink: Arc<dyn roomrec_core::ParticipantSink> = controller.clone();
        let shutdown = controller.shutdown_handle();
        tokio::spawn(listener.run(sink, shutdown));
    }

    // Ctrl+C flips the shared flag; every producer notices it within
    // one poll interval and the main task finishes the shutdown.
    let interrupt_handle = controller.shutdown_handle();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupted. Shutting down...");
        interrupt_handle.store(true, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    let shutdown = controller.shutdown_handle();
    while !shutdown.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    controller.stop().await;

    let status = controller.status().await;
    eprintln!();
    eprintln!("=== STOPPED ===");
    eprintln!("Recording transitions: {}", status.transition_seq);

    Ok(())
}
