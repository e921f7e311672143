/// Strata Engine - process-wide logging services
///
/// The logger is the only global in the crate. Renderer state is owned by an
/// explicit `RendererContext` and passed by reference.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{OnceLock, RwLock};
use std::time::SystemTime;
use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};

// ===== INTERNAL STATE =====

/// Global logger (initialized with DefaultLogger)
static LOGGER: OnceLock<RwLock<Box<dyn Logger>>> = OnceLock::new();

/// Entries below this severity are dropped before reaching the logger
static MIN_SEVERITY: AtomicU8 = AtomicU8::new(0);

fn severity_rank(severity: LogSeverity) -> u8 {
    match severity {
        LogSeverity::Trace => 0,
        LogSeverity::Debug => 1,
        LogSeverity::Info => 2,
        LogSeverity::Warn => 3,
        LogSeverity::Error => 4,
    }
}

fn logger() -> &'static RwLock<Box<dyn Logger>> {
    LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)))
}

// ===== PUBLIC API =====

/// Logger registry shared by every component
///
/// # Example
///
/// ```no_run
/// use strata_engine::strata::Engine;
/// use strata_engine::strata::log::LogSeverity;
///
/// Engine::set_min_severity(LogSeverity::Info);
/// Engine::log(LogSeverity::Info, "app", "renderer ready".to_string());
/// Engine::reset_logger();
/// ```
pub struct Engine;

impl Engine {
    /// Replace the global logger
    pub fn set_logger<L: Logger + 'static>(logger: L) {
        if let Ok(mut lock) = self::logger().write() {
            *lock = Box::new(logger);
        }
    }

    /// Reset logger to default (DefaultLogger) and re-enable every severity
    pub fn reset_logger() {
        if let Ok(mut lock) = self::logger().write() {
            *lock = Box::new(DefaultLogger);
        }
        MIN_SEVERITY.store(0, Ordering::Relaxed);
    }

    /// Drop entries below `severity`
    pub fn set_min_severity(severity: LogSeverity) {
        MIN_SEVERITY.store(severity_rank(severity), Ordering::Relaxed);
    }

    fn enabled(severity: LogSeverity) -> bool {
        severity_rank(severity) >= MIN_SEVERITY.load(Ordering::Relaxed)
    }

    /// Internal logging method (for simple logs without file:line)
    ///
    /// Used by macros like engine_info!, engine_warn!, etc.
    ///
    /// # Arguments
    ///
    /// * `severity` - Log severity level
    /// * `source` - Source component (e.g., "strata::frame")
    /// * `message` - Log message
    pub fn log(severity: LogSeverity, source: &str, message: String) {
        if !Self::enabled(severity) {
            return;
        }
        if let Ok(lock) = self::logger().read() {
            lock.log(&LogEntry {
                severity,
                timestamp: SystemTime::now(),
                source: source.to_string(),
                message,
                file: None,
                line: None,
            });
        }
    }

    /// Internal logging method with file:line information (for ERROR logs)
    pub fn log_detailed(
        severity: LogSeverity,
        source: &str,
        message: String,
        file: &'static str,
        line: u32,
    ) {
        if !Self::enabled(severity) {
            return;
        }
        if let Ok(lock) = self::logger().read() {
            lock.log(&LogEntry {
                severity,
                timestamp: SystemTime::now(),
                source: source.to_string(),
                message,
                file: Some(file),
                line: Some(line),
            });
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
