//! Integration tests for the process-wide logger registry
//!
//! No GPU required.
//!
//! Run with: cargo test --test logging_integration_tests

use strata_engine::strata::Engine;
use strata_engine::strata::log::{format_entry, Logger, LogEntry, LogSeverity};
use strata_engine::{engine_err, engine_info, engine_warn};
use std::sync::{Arc, Mutex};
use serial_test::serial;

// ============================================================================
// TEST LOGGER IMPLEMENTATION
// ============================================================================

/// Test logger that captures log entries for verification
struct TestLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl TestLogger {
    fn new() -> (Self, Arc<Mutex<Vec<LogEntry>>>) {
        let entries = Arc::new(Mutex::new(Vec::new()));
        (Self { entries: entries.clone() }, entries)
    }
}

impl Logger for TestLogger {
    fn log(&self, entry: &LogEntry) {
        let mut entries = self.entries.lock().unwrap();
        entries.push(LogEntry {
            severity: entry.severity,
            timestamp: entry.timestamp,
            source: entry.source.clone(),
            message: entry.message.clone(),
            file: entry.file,
            line: entry.line,
        });
    }
}

// ============================================================================
// LOGGING TESTS
// ============================================================================

#[test]
#[serial]
fn test_integration_custom_logger() {
    let (test_logger, entries) = TestLogger::new();
    Engine::set_logger(test_logger);

    Engine::log(LogSeverity::Info, "test::module", "Test info message".to_string());
    Engine::log(LogSeverity::Warn, "test::module", "Test warning message".to_string());
    Engine::log(LogSeverity::Error, "test::module", "Test error message".to_string());

    // Verify logs were captured
    let captured_entries = entries.lock().unwrap();
    assert_eq!(captured_entries.len(), 3);

    // Verify first log (Info)
    assert_eq!(captured_entries[0].severity, LogSeverity::Info);
    assert_eq!(captured_entries[0].source, "test::module");
    assert_eq!(captured_entries[0].message, "Test info message");

    // Verify second log (Warn)
    assert_eq!(captured_entries[1].severity, LogSeverity::Warn);
    assert_eq!(captured_entries[1].source, "test::module");
    assert_eq!(captured_entries[1].message, "Test warning message");

    // Verify third log (Error)
    assert_eq!(captured_entries[2].severity, LogSeverity::Error);
    assert_eq!(captured_entries[2].source, "test::module");
    assert_eq!(captured_entries[2].message, "Test error message");

    // Reset to default logger
    Engine::reset_logger();
}

#[test]
#[serial]
fn test_integration_error_logging_with_location() {
    let (test_logger, entries) = TestLogger::new();
    Engine::set_logger(test_logger);

    Engine::log_detailed(
        LogSeverity::Error,
        "strata::arena",
        "Image request exceeds chunk size".to_string(),
        "image_arena.rs",
        42,
    );

    let captured_entries = entries.lock().unwrap();
    assert_eq!(captured_entries.len(), 1);

    let entry = &captured_entries[0];
    assert_eq!(entry.severity, LogSeverity::Error);
    assert_eq!(entry.source, "strata::arena");
    assert_eq!(entry.message, "Image request exceeds chunk size");
    assert_eq!(entry.file, Some("image_arena.rs"));
    assert_eq!(entry.line, Some(42));
    assert!(format_entry(entry).ends_with("[ERROR] [strata::arena] Image request exceeds chunk size (image_arena.rs:42)"));

    // Reset to default logger
    Engine::reset_logger();
}

#[test]
#[serial]
fn test_integration_logger_reset() {
    let (test_logger, entries) = TestLogger::new();
    Engine::set_logger(test_logger);

    // Log a message
    Engine::log(LogSeverity::Info, "test", "Message 1".to_string());

    // Verify log was captured
    {
        let captured = entries.lock().unwrap();
        assert_eq!(captured.len(), 1);
    }

    // Reset to default logger
    Engine::reset_logger();

    // Log another message (will go to default logger, not captured)
    Engine::log(LogSeverity::Info, "test", "Message 2".to_string());

    // Verify no new logs in test logger
    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), 1); // Still only one message
}

#[test]
#[serial]
fn test_integration_logging_different_severities() {
    let (test_logger, entries) = TestLogger::new();
    Engine::set_logger(test_logger);

    Engine::log(LogSeverity::Trace, "test", "Trace message".to_string());
    Engine::log(LogSeverity::Debug, "test", "Debug message".to_string());
    Engine::log(LogSeverity::Info, "test", "Info message".to_string());
    Engine::log(LogSeverity::Warn, "test", "Warn message".to_string());
    Engine::log(LogSeverity::Error, "test", "Error message".to_string());

    let captured_entries = entries.lock().unwrap();
    assert_eq!(captured_entries.len(), 5);

    assert_eq!(captured_entries[0].severity, LogSeverity::Trace);
    assert_eq!(captured_entries[1].severity, LogSeverity::Debug);
    assert_eq!(captured_entries[2].severity, LogSeverity::Info);
    assert_eq!(captured_entries[3].severity, LogSeverity::Warn);
    assert_eq!(captured_entries[4].severity, LogSeverity::Error);

    // Reset to default logger
    Engine::reset_logger();
}

#[test]
#[serial]
fn test_integration_min_severity_filters_entries() {
    let (test_logger, entries) = TestLogger::new();
    Engine::set_logger(test_logger);
    Engine::set_min_severity(LogSeverity::Warn);

    engine_info!("strata::frame", "Dropped frame in slot {}", 0);
    engine_warn!("strata::frame", "Device lost at present; continuing");

    {
        let captured = entries.lock().unwrap();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].severity, LogSeverity::Warn);
        assert_eq!(captured[0].source, "strata::frame");
    }

    // reset re-enables every severity
    Engine::reset_logger();
    let (test_logger, entries) = TestLogger::new();
    Engine::set_logger(test_logger);
    engine_info!("strata::frame", "visible");
    assert_eq!(entries.lock().unwrap().len(), 1);
    Engine::reset_logger();
}

#[test]
#[serial]
fn test_integration_engine_err_logs_and_builds_error() {
    let (test_logger, entries) = TestLogger::new();
    Engine::set_logger(test_logger);

    let error = engine_err!("strata::vulkan", "vkQueueSubmit failed: {}", -4);
    assert_eq!(error.to_string(), "Backend error: vkQueueSubmit failed: -4");

    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].severity, LogSeverity::Error);
    assert!(captured[0].file.is_some());
    assert!(captured[0].line.is_some());
    drop(captured);

    Engine::reset_logger();
}
