//! Host discovery: integrate the single manifest the embedding host may
//! supply.

use super::cache::IndexCache;
use super::context::DiscoveryContext;
use super::error::IndexError;
use super::evaluator::{host_qualified, IndexCallback};
use super::flags::{FlagScope, IndexFlags, MatchMode};
use super::MANIFEST_FILE;
use std::path::PathBuf;
use tracing::debug;

/// Discover the host-provided package index and merge it into `cache`.
///
/// The search roots are unused by this strategy but kept for the uniform
/// discovery signature. At most one `HOST` entry is gained or lost per call.
pub fn find_host(
    ctx: &mut DiscoveryContext<'_>,
    _roots: &[PathBuf],
    cache: &mut IndexCache,
    callback: &mut dyn IndexCallback,
    flags: IndexFlags,
) -> Result<(), IndexError> {
    let trace = flags.contains(IndexFlags::TRACE);

    // Nested discovery triggered from inside an evaluating manifest.
    if ctx.discovery_suppressed() {
        if trace {
            debug!(target: "keel::index", "host discovery suppressed (re-entrant)");
        }
        return Ok(());
    }

    let bare = MANIFEST_FILE;
    let qualified = host_qualified(bare);

    // Phase one: the host entry, if cached, is no longer confirmed.
    let category = FlagScope::new().has(IndexFlags::HOST | IndexFlags::NORMAL, MatchMode::Any);
    cache.mark_entries(&category, IndexFlags::FOUND, false, Some(bare));
    cache.mark_entries(&category, IndexFlags::FOUND, false, Some(&qualified));

    // This is a host pass regardless of what the caller passed in.
    let pass = (flags - IndexFlags::NORMAL) | IndexFlags::HOST;

    let invoke = pass.contains(IndexFlags::REFRESH)
        || (!cache.contains(bare) && !cache.contains(&qualified));

    if invoke {
        let mut entry_flags = pass;
        let outcome = {
            let _guard = ctx.suppress_discovery();
            callback.invoke(ctx, bare, &mut entry_flags)?
        };

        if outcome.evaluated {
            if let Some(identifier) = outcome.cache_identifier {
                cache.insert(
                    identifier,
                    (entry_flags & IndexFlags::STATE) | IndexFlags::HOST | IndexFlags::FOUND,
                );
            }
            // No concrete identifier: nothing materialized; the purge below
            // drops whatever was cached before.
        }
    } else {
        // Already known and no refresh requested: reconfirm so the entry
        // survives the purge.
        let host_scope = FlagScope::new().has(IndexFlags::HOST, MatchMode::All);
        cache.mark_entries(&host_scope, IndexFlags::FOUND, true, Some(bare));
        cache.mark_entries(&host_scope, IndexFlags::FOUND, true, Some(&qualified));
    }

    // Phase two: drop host entries that were not reconfirmed.
    let stale = FlagScope::new()
        .has(IndexFlags::HOST, MatchMode::All)
        .not_has(IndexFlags::FOUND, MatchMode::Any);
    let purged = cache.purge_entries(&stale);

    if trace {
        debug!(target: "keel::index", invoked = invoke, purged, "host discovery pass complete");
    }

    Ok(())
}
