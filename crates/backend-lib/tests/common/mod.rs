//! Test utilities shared by the integration tests
#![allow(dead_code)]

use livepad_backend_lib::{config::Settings, AppState};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Sets up an `AppState` backed by a flat-file store in a temporary directory.
///
/// Keep the returned `TempDir` in scope for the duration of the test.
pub fn setup_test_env() -> (Arc<AppState>, TempDir) {
    let temp_dir = TempDir::new().unwrap();

    let mut settings = Settings::default();
    settings.storage.path = Some(temp_dir.path().to_path_buf());
    settings.max_document_bytes = 1024;

    let state = AppState::new(settings).expect("Failed to create AppState for test");
    (Arc::new(state), temp_dir)
}

/// Polls `check` until it holds or two seconds pass
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
