// This file implements the application's logging system.
// It provides macros for different log levels (INFO, WARN, ERROR, DEBUG)
// and handles conditional output for debug messages, with colored terminal output.
// Everything goes to stderr so that command output (status tables, JSON) stays clean on stdout.

use colored::{ColoredString, Colorize};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// Log levels, used only to pick the color of the line prefix.
#[derive(Debug, Clone, Copy)]
pub enum Level {
    Info,
    Warn,
    Error,
    Debug,
}

/// Colors a level prefix such as `[INFO]`.
pub fn tag(label: &str, level: Level) -> ColoredString {
    match level {
        Level::Info => label.bright_green(),
        Level::Warn => label.bright_yellow(),
        Level::Error => label.bright_red(),
        Level::Debug => label.dimmed(),
    }
}

// `log_info!` for general progress and informational messages.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => (eprintln!("{} {}", $crate::logger::tag("[INFO]", $crate::logger::Level::Info), format!($($arg)*)));
}

// `log_warn!` for non-critical issues or noteworthy conditions.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => (eprintln!("{} {}", $crate::logger::tag("[WARN]", $crate::logger::Level::Warn), format!($($arg)*)));
}

// `log_error!` for failures that stop the run.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => (eprintln!("{} {}", $crate::logger::tag("[ERROR]", $crate::logger::Level::Error), format!($($arg)*)));
}

// `log_debug!` for detailed internal tracing.
// Printed only when debug mode was enabled through `init`.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if $crate::logger::is_debug_enabled() {
           eprintln!("{} {}", $crate::logger::tag("[DEBUG]", $crate::logger::Level::Debug), format!($($arg)*));
        }
    };
}

// Global flag to control debug logging, initialized once.
static DEBUG_ENABLED: OnceLock<AtomicBool> = OnceLock::new();

/// Initializes the logger, setting the global debug mode.
/// Call once at startup, before any command runs.
pub fn init(debug: bool) {
    DEBUG_ENABLED
        .get_or_init(|| AtomicBool::new(debug))
        .store(debug, Ordering::Relaxed);

    log_debug!("Logger initialized in DEBUG mode");
}

/// Checks if debug logging is currently enabled.
/// Used by the `log_debug!` macro.
pub fn is_debug_enabled() -> bool {
    DEBUG_ENABLED
        .get()
        .map(|f| f.load(Ordering::Relaxed))
        .unwrap_or(false)
}
