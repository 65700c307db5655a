//! Benchmark utilities.

use std::fs;
use std::path::Path;

/// Generate deterministic save data of the specified size.
pub fn save_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

/// Relative paths of a save with `count` files spread over a few map
/// directories.
pub fn save_paths(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| match i {
            0 => "world.sav".to_string(),
            _ => format!("maps/{}.0/{i}.map", i % 8),
        })
        .collect()
}

/// Populate `root` with `count` files of `size` bytes.
pub fn populate_save(root: &Path, count: usize, size: usize) {
    let data = save_data(size);
    for rel in save_paths(count) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, &data).unwrap();
    }
}
