//! Custom test assertions for integration tests

use std::path::Path;
use tokio::sync::broadcast;

/// Drain every event already buffered in `events`
pub fn drain_events(events: &mut broadcast::Receiver<social_dl::Event>) -> Vec<social_dl::Event> {
    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    received
}

/// Names of the entries directly inside `dir`, sorted
pub fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", dir.display(), e))
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Assert that no `.part` file is left anywhere below `dir`
pub fn assert_no_partial_files(dir: &Path) {
    for entry in std::fs::read_dir(dir).into_iter().flatten().flatten() {
        let path = entry.path();
        if path.is_dir() {
            assert_no_partial_files(&path);
        } else {
            assert!(
                !path.to_string_lossy().ends_with(social_dl::utils::PART_SUFFIX),
                "Partial file left behind: {}",
                path.display()
            );
        }
    }
}
