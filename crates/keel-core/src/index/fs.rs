//! Filesystem discovery: scan search roots for manifest files and integrate
//! all of them.

use super::cache::IndexCache;
use super::context::DiscoveryContext;
use super::error::IndexError;
use super::evaluator::IndexCallback;
use super::flags::{FlagScope, IndexFlags, MatchMode};
use super::MANIFEST_FILE;
use std::path::PathBuf;
use tracing::debug;

/// Scan `roots` for `pkgIndex.keel` files and merge them into `cache`.
///
/// Roots that do not resolve to an existing directory are skipped silently;
/// callers may pass speculative paths drawn from environment configuration.
/// Files within one directory are processed in enumeration order and roots
/// in caller order — callers wanting determinism pre-sort the root list.
///
/// A hard evaluation failure aborts the remaining scan, but entries already
/// confirmed by this pass are retained (no rollback).
pub fn find_filesystem(
    ctx: &mut DiscoveryContext<'_>,
    roots: &[PathBuf],
    cache: &mut IndexCache,
    callback: &mut dyn IndexCallback,
    flags: IndexFlags,
) -> Result<(), IndexError> {
    let trace = flags.contains(IndexFlags::TRACE);

    if ctx.discovery_suppressed() {
        if trace {
            debug!(target: "keel::index", "filesystem discovery suppressed (re-entrant)");
        }
        return Ok(());
    }

    // Phase one: every non-host entry is no longer confirmed.
    let non_host = FlagScope::new().not_has(IndexFlags::HOST, MatchMode::Any);
    cache.mark_entries(&non_host, IndexFlags::FOUND, false, None);

    // This is a filesystem pass regardless of what the caller passed in.
    let pass = (flags - IndexFlags::HOST) | IndexFlags::NORMAL;
    let recursive = pass.contains(IndexFlags::RECURSIVE);

    for root in roots {
        if !root.is_dir() {
            if trace {
                debug!(target: "keel::index", root = %root.display(), "skipping non-directory root");
            }
            continue;
        }

        for file in keel_util::fs::find_named_files(root, MANIFEST_FILE, recursive) {
            let identifier = file.to_string_lossy().into_owned();

            let invoke = pass.contains(IndexFlags::REFRESH) || !cache.contains(&identifier);

            if invoke {
                let mut entry_flags = pass;
                let outcome = {
                    let _guard = ctx.suppress_discovery();
                    callback.invoke(ctx, &identifier, &mut entry_flags)?
                };

                if outcome.evaluated {
                    if let Some(adjusted) = outcome.cache_identifier {
                        cache.insert(
                            adjusted,
                            (entry_flags & IndexFlags::STATE)
                                | IndexFlags::NORMAL
                                | IndexFlags::FOUND,
                        );
                    }
                }
            } else {
                // Already known, no refresh: reconfirm the original path.
                cache.mark_entries(&non_host, IndexFlags::FOUND, true, Some(&identifier));
            }
        }
    }

    // Phase two: drop normal entries that were not reconfirmed.
    let stale = FlagScope::new()
        .has(IndexFlags::NORMAL, MatchMode::All)
        .not_has(IndexFlags::HOST | IndexFlags::FOUND, MatchMode::Any);
    let purged = cache.purge_entries(&stale);

    if trace {
        debug!(target: "keel::index", roots = roots.len(), purged, "filesystem discovery pass complete");
    }

    Ok(())
}
