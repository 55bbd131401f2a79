//! Pciewatch Daemon (pciewatchd)
//!
//! Standalone host for the Pciewatch core: polls PCIe devices and the kernel
//! log on a fixed interval and emits every notification through structured
//! logging, optionally mirroring them to a JSON-lines file.
//!
//! The core itself is single-threaded and cooperative; the daemon only
//! decides the cadence.

use std::fs;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pw_core::constants::paths;
use pw_core::{Notification, NotificationSink, PcieErrors, PluginConfig, Severity};
use tracing::{error, info, warn};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default seconds between polls
const DEFAULT_INTERVAL_SECS: u64 = 10;

struct Options {
    config_path: PathBuf,
    interval: Duration,
    oneshot: bool,
    jsonl_path: Option<PathBuf>,
}

/// Sink used by the daemon: logs every notification and optionally appends
/// it as one JSON object per line.
struct DaemonSink {
    jsonl: Option<fs::File>,
}

impl DaemonSink {
    fn new(jsonl_path: Option<&Path>) -> Self {
        let jsonl = jsonl_path.and_then(|path| {
            match OpenOptions::new().create(true).append(true).open(path) {
                Ok(file) => Some(file),
                Err(e) => {
                    error!(path = ?path, error = %e, "Cannot open notification output file");
                    None
                }
            }
        });
        Self { jsonl }
    }
}

impl NotificationSink for DaemonSink {
    fn dispatch(&mut self, notification: Notification) {
        match notification.severity {
            Severity::Failure => error!(
                device = %notification.plugin_instance,
                kind = %notification.type_instance,
                "{}",
                notification.message
            ),
            Severity::Warning => warn!(
                device = %notification.plugin_instance,
                kind = %notification.type_instance,
                "{}",
                notification.message
            ),
            Severity::Okay => info!(
                device = %notification.plugin_instance,
                kind = %notification.type_instance,
                "{}",
                notification.message
            ),
        }

        if let Some(file) = self.jsonl.as_mut() {
            match serde_json::to_string(&notification) {
                Ok(line) => {
                    if let Err(e) = writeln!(file, "{}", line) {
                        error!(error = %e, "Failed to write notification");
                    }
                }
                Err(e) => error!(error = %e, "Failed to serialize notification"),
            }
        }
    }
}

/// Read the system hostname
fn read_hostname() -> String {
    for path in ["/proc/sys/kernel/hostname", "/etc/hostname"] {
        if let Ok(hostname) = fs::read_to_string(path) {
            let hostname = hostname.trim();
            if !hostname.is_empty() {
                return hostname.to_string();
            }
        }
    }
    "localhost".to_string()
}

fn print_help() {
    eprintln!("pciewatchd {} - PCIe error monitoring daemon", VERSION);
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    pciewatchd [OPTIONS]");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -c, --config PATH    Configuration file (default: {}/{})", paths::CONFIG_DIR, paths::CONFIG_FILE);
    eprintln!("    -i, --interval SECS  Seconds between polls (default: {})", DEFAULT_INTERVAL_SECS);
    eprintln!("    -o, --output PATH    Append notifications as JSON lines to PATH");
    eprintln!("    -1, --oneshot        Run a single poll and exit");
    eprintln!("    -v, --version        Print version");
    eprintln!("    -h, --help           Print this help");
    eprintln!();
    eprintln!("ENVIRONMENT:");
    eprintln!("    PCIEWATCH_LOG        Log level (trace, debug, info, warn, error)");
}

fn parse_args() -> Options {
    let args: Vec<String> = std::env::args().collect();
    let mut options = Options {
        config_path: Path::new(paths::CONFIG_DIR).join(paths::CONFIG_FILE),
        interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
        oneshot: false,
        jsonl_path: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                println!("pciewatchd {}", VERSION);
                std::process::exit(0);
            }
            "-1" | "--oneshot" => options.oneshot = true,
            "-c" | "--config" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
                options.config_path = PathBuf::from(&args[i]);
            }
            "-i" | "--interval" => {
                i += 1;
                let secs = args.get(i).and_then(|s| s.parse::<u64>().ok());
                match secs {
                    Some(secs) if secs > 0 => options.interval = Duration::from_secs(secs),
                    _ => {
                        eprintln!("Error: --interval requires a positive number of seconds");
                        std::process::exit(1);
                    }
                }
            }
            "-o" | "--output" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --output requires a path argument");
                    std::process::exit(1);
                }
                options.jsonl_path = Some(PathBuf::from(&args[i]));
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    options
}

fn load_config(path: &Path) -> PluginConfig {
    if path.exists() {
        match PluginConfig::load(path) {
            Ok(config) => {
                info!(path = ?path, "Loaded configuration");
                config
            }
            Err(e) => {
                error!(path = ?path, error = %e, "Error in configuration, failed to init");
                std::process::exit(1);
            }
        }
    } else {
        info!(path = ?path, "No configuration file, using defaults");
        PluginConfig::default()
    }
}

fn main() {
    let options = parse_args();

    let log_level = std::env::var("PCIEWATCH_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(tracing_subscriber::EnvFilter::new(&log_level))
        .init();

    info!("pciewatchd {} starting", VERSION);

    let config = load_config(&options.config_path);
    let host = read_hostname();
    info!(host = %host, "Monitoring as");

    let mut monitor = match PcieErrors::init(config, host) {
        Ok(monitor) => monitor,
        Err(e) => {
            error!(error = %e, "Failed to initialize monitor");
            std::process::exit(1);
        }
    };

    let mut sink = DaemonSink::new(options.jsonl_path.as_deref());

    if options.oneshot {
        let result = monitor.poll(&mut sink);
        std::process::exit(if result.is_ok() { 0 } else { 1 });
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::SeqCst);
        }) {
            warn!(error = %e, "Failed to set signal handler");
        }
    }

    info!(interval = ?options.interval, "Entering poll loop");
    while !shutdown.load(Ordering::SeqCst) {
        if let Err(e) = monitor.poll(&mut sink) {
            // Per-poll failures are retried on the next cycle
            error!(error = %e, "Poll failed");
        }

        // Sleep in short slices so shutdown stays responsive
        let mut remaining = options.interval;
        while !shutdown.load(Ordering::SeqCst) && !remaining.is_zero() {
            let slice = remaining.min(Duration::from_millis(200));
            std::thread::sleep(slice);
            remaining -= slice;
        }
    }

    info!("Daemon terminated gracefully");
}
