//! Map an absolute script path back to a package-relative identifier.

use super::cache::IndexCache;
use super::error::IndexError;
use super::evaluator::is_remote_uri;
use super::HOST_PREFIX;
use std::path::Path;

/// How package roots are compared against the input path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathComparison {
    CaseSensitive,
    /// Windows-style comparison; ASCII case is ignored.
    CaseInsensitive,
}

/// Resolve `absolute` to an identifier relative to the most specific known
/// package root.
///
/// Candidate roots are the containing directories of every local manifest in
/// `cache`, deepest first; equal-depth roots are tried in lexicographic
/// order. The result is slash-normalized.
///
/// # Errors
/// [`IndexError::NoMatchingRoot`] when no known root is a prefix of the
/// input path.
pub fn relative_file_name(
    cache: &IndexCache,
    absolute: &Path,
    comparison: PathComparison,
) -> Result<String, IndexError> {
    let normalized = keel_util::fs::forward_slash(absolute);

    let mut roots: Vec<(usize, String)> = Vec::new();
    for identifier in cache.identifiers() {
        if is_remote_uri(identifier) || identifier.starts_with(HOST_PREFIX) {
            continue;
        }
        let Some(parent) = Path::new(identifier).parent() else {
            continue;
        };
        let mut dir = keel_util::fs::forward_slash(parent);
        if dir.is_empty() {
            continue;
        }
        if !dir.ends_with('/') {
            dir.push('/');
        }
        let depth = dir.matches('/').count();
        roots.push((depth, dir));
    }

    // Deepest root wins; lexicographic among equal depths.
    roots.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    roots.dedup();

    for (_, dir) in &roots {
        let matched = match comparison {
            PathComparison::CaseSensitive => normalized.starts_with(dir.as_str()),
            PathComparison::CaseInsensitive => normalized
                .to_ascii_lowercase()
                .starts_with(&dir.to_ascii_lowercase()),
        };
        if matched {
            if let Some(rest) = normalized.get(dir.len()..) {
                if !rest.is_empty() {
                    return Ok(rest.to_string());
                }
            }
        }
    }

    Err(IndexError::NoMatchingRoot(absolute.to_path_buf()))
}
