use patchloop_logging::{init_tracing, LogFormat};

// Installs the global subscriber, so this binary holds a single test.
#[test]
fn test_trace_file_is_flushed_when_guard_drops() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.log");

    let guard = init_tracing("warn", LogFormat::Compact, Some(&path));
    assert!(guard.is_some());

    tracing::warn!("run failed before the first scan");
    drop(guard);

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("run failed before the first scan"));
}
