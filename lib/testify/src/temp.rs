use std::path::PathBuf;

use crate::random::random_string;

/// Returns a unique path under the system temp dir, nothing is created.
pub fn temp_file() -> PathBuf {
    let path = std::env::temp_dir();
    let file_name = random_string(16);
    path.join(file_name)
}

/// Returns a unique path with the given extension under the system temp dir.
pub fn temp_file_with_extension(ext: &str) -> PathBuf {
    let mut path = temp_file();
    path.set_extension(ext);
    path
}
