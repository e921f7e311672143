//! Unit tests for the Engine logger registry
//!
//! The logger is a process-wide OnceLock, so every test is #[serial].

use super::*;
use crate::strata::StrataError;
use std::sync::{Arc, Mutex};
use serial_test::serial;

// ============================================================================
// TEST HELPERS
// ============================================================================

/// Test logger that captures log entries for verification
struct TestLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl Logger for TestLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

fn install_test_logger() -> Arc<Mutex<Vec<LogEntry>>> {
    let entries = Arc::new(Mutex::new(Vec::new()));
    Engine::set_logger(TestLogger { entries: entries.clone() });
    entries
}

// ============================================================================
// LOGGER REGISTRY TESTS
// ============================================================================

#[test]
#[serial]
fn test_custom_logger_receives_entries() {
    let entries = install_test_logger();

    Engine::log(LogSeverity::Info, "strata::frame", "begin".to_string());

    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].source, "strata::frame");
    assert!(captured[0].file.is_none());
    drop(captured);
    Engine::reset_logger();
}

#[test]
#[serial]
fn test_log_detailed_carries_location() {
    let entries = install_test_logger();

    crate::engine_error!("strata::arena", "chunk {} failed", 3);

    let captured = entries.lock().unwrap();
    assert_eq!(captured[0].severity, LogSeverity::Error);
    assert_eq!(captured[0].message, "chunk 3 failed");
    assert!(captured[0].file.is_some());
    assert!(captured[0].line.is_some());
    drop(captured);
    Engine::reset_logger();
}

#[test]
#[serial]
fn test_min_severity_filters_lower_entries() {
    let entries = install_test_logger();
    Engine::set_min_severity(LogSeverity::Warn);

    crate::engine_debug!("strata::geometry", "dropped");
    crate::engine_warn!("strata::geometry", "kept");

    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].message, "kept");
    drop(captured);
    Engine::reset_logger();
}

// ============================================================================
// ERROR MACRO TESTS
// ============================================================================

#[test]
#[serial]
fn test_engine_err_logs_and_builds_backend_error() {
    let entries = install_test_logger();

    let err = crate::engine_err!("strata::vulkan", "submit failed: {}", -4);

    assert!(matches!(err, StrataError::BackendError(ref msg) if msg == "submit failed: -4"));
    assert_eq!(entries.lock().unwrap().len(), 1);
    Engine::reset_logger();
}

#[test]
#[serial]
fn test_engine_bail_returns_early() {
    let entries = install_test_logger();

    fn failing(flag: bool) -> crate::strata::StrataResult<u32> {
        if flag {
            crate::engine_bail!("strata::pipeline", "table full");
        }
        Ok(1)
    }

    assert!(failing(true).is_err());
    assert_eq!(failing(false).unwrap(), 1);
    assert_eq!(entries.lock().unwrap().len(), 1);
    Engine::reset_logger();
}
