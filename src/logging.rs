use crate::constants::SERVICE_NAME;
use log::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Where log records ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSink {
    Syslog,
    Stderr,
}

pub fn level_for(debug: bool) -> LevelFilter {
    if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Install the process logger: syslog when reachable, stderr otherwise.
///
/// The stderr fallback honors `RUST_LOG` and also collects the `tracing`
/// request spans emitted by the HTTP layer.
pub fn init(debug: bool) -> LogSink {
    let level = level_for(debug);

    let formatter = syslog::Formatter3164 {
        facility: syslog::Facility::LOG_DAEMON,
        hostname: None,
        process: SERVICE_NAME.into(),
        pid: std::process::id(),
    };
    match syslog::unix(formatter) {
        Ok(logger) => match log::set_boxed_logger(Box::new(syslog::BasicLogger::new(logger))) {
            Ok(()) => {
                log::set_max_level(level);
                return LogSink::Syslog;
            }
            Err(e) => eprintln!("Failed to set syslog logger: {}, falling back to stderr", e),
        },
        Err(e) => eprintln!("Failed to connect to syslog: {}, falling back to stderr", e),
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));
    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
    {
        eprintln!("Failed to install stderr logger: {}", e);
    }
    LogSink::Stderr
}
