use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Read a file to string, replacing invalid UTF-8 sequences with the replacement character.
///
/// Manifest scripts are occasionally saved in legacy encodings; evaluation
/// should see best-effort text rather than a hard decode error.
///
/// # Errors
/// Returns an error if the file cannot be read.
pub fn read_to_string_lossy(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Normalize a path to a forward-slash string.
///
/// Keel scripts always see forward slashes regardless of host platform.
#[must_use]
pub fn forward_slash(path: &Path) -> String {
    let s = path.to_string_lossy();
    if s.contains('\\') {
        s.replace('\\', "/")
    } else {
        s.into_owned()
    }
}

/// List files named exactly `basename` under `root`.
///
/// Non-recursive mode inspects only the immediate directory; recursive mode
/// descends subdirectories. Unreadable directories are skipped silently, in
/// enumeration order (no sort is applied).
#[must_use]
pub fn find_named_files(root: &Path, basename: &str, recursive: bool) -> Vec<PathBuf> {
    let mut found = Vec::new();

    if recursive {
        for entry in WalkDir::new(root)
            .follow_links(true)
            .into_iter()
            .filter_map(Result::ok)
        {
            if entry.file_type().is_file() && entry.file_name() == basename {
                found.push(entry.into_path());
            }
        }
    } else {
        let Ok(entries) = fs::read_dir(root) else {
            return found;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_file() && entry.file_name() == *basename {
                found.push(path);
            }
        }
    }

    found
}
