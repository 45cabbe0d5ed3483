//! ISO 11783 task controller bridging an ISOBUS implement to AgOpenGPS.

use aog_tc_linux::{Application, CanAdapter, SocketCanDriver};
use clap::Parser;
use log::{error, warn, LevelFilter};
use nix::sys::signal::{self, SigHandler, Signal};
use std::fs::File;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

const LOG_FILE: &str = "aog-task-controller.log";

/// ISOBUS task controller server for AgOpenGPS.
#[derive(Parser, Debug)]
#[command(name = "aog-task-controller", version, about, long_about = None)]
struct Args {
    /// CAN adapter: peak-pcan, innomaker-usb2can, rusoku-toucan or
    /// sys-tec-usb2can
    #[arg(long = "can_adapter")]
    can_adapter: Option<String>,

    /// SocketCAN channel index (canN)
    #[arg(long = "can_channel", default_value_t = 0)]
    can_channel: u32,

    /// Write the log to a file instead of stderr
    #[arg(long = "log2file", default_value_t = false)]
    log2file: bool,

    /// Log level: debug, info, warning, error or critical
    #[arg(long = "log_level", default_value = "info")]
    log_level: String,
}

static RUNNING: AtomicBool = AtomicBool::new(true);

extern "C" fn handle_shutdown_signal(_signal: i32) {
    RUNNING.store(false, Ordering::SeqCst);
}

fn init_logging(args: &Args) {
    let level = match args.log_level.as_str() {
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warning" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "critical" => LevelFilter::Error,
        other => {
            eprintln!("Unknown log level '{}', falling back to info", other);
            LevelFilter::Info
        }
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    if args.log2file {
        match File::create(LOG_FILE) {
            Ok(log_file) => {
                builder.target(env_logger::Target::Pipe(Box::new(log_file)));
            }
            Err(e) => eprintln!("Could not open {}: {}, logging to stderr", LOG_FILE, e),
        }
    }
    builder.init();
}

fn install_signal_handlers() {
    let handler = SigHandler::Handler(handle_shutdown_signal);
    // Safety: the handler only touches an atomic flag.
    unsafe {
        if let Err(e) = signal::signal(Signal::SIGINT, handler) {
            warn!("Could not install SIGINT handler: {}", e);
        }
        if let Err(e) = signal::signal(Signal::SIGTERM, handler) {
            warn!("Could not install SIGTERM handler: {}", e);
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args);

    let adapter_name = match args.can_adapter.as_deref() {
        Some(name) => name,
        None => {
            error!("Unable to find a CAN driver. Pass --can_adapter to select one.");
            return ExitCode::FAILURE;
        }
    };
    let adapter = match CanAdapter::from_name(adapter_name) {
        Ok(adapter) => adapter,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let driver = match SocketCanDriver::open(adapter, args.can_channel) {
        Ok(driver) => driver,
        Err(e) => {
            error!("Failed to start CAN hardware interface: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut app = match Application::new(Box::new(driver)) {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = app.initialize() {
        error!("Startup failed: {}", e);
        return ExitCode::FAILURE;
    }

    install_signal_handlers();
    while RUNNING.load(Ordering::SeqCst) {
        app.update();
        // Yield so the loop does not spin a core.
        thread::sleep(Duration::from_millis(2));
    }

    app.stop();
    ExitCode::SUCCESS
}
