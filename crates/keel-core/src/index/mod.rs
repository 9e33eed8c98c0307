//! Package-index discovery.
//!
//! Provides:
//! - The index cache mapping manifest identifiers to status flags
//! - Generational mark-and-purge cache maintenance
//! - Host and filesystem discovery strategies
//! - The discovery orchestrator with configurable precedence
//! - The manifest evaluator adapter (callback contract)
//! - Relative path resolution against discovered package roots

pub mod cache;
pub mod context;
pub mod error;
pub mod evaluator;
pub mod flags;
pub mod fs;
pub mod host;
pub mod relative;

pub use cache::IndexCache;
pub use context::{DiscoveryContext, SuppressDiscovery};
pub use error::IndexError;
pub use evaluator::{
    is_remote_uri, CallbackOutcome, HostManifest, HostServices, IndexCallback, ManifestEvaluator,
    ScriptEngine, ScriptSource, Trust, VariableStore,
};
pub use flags::{FlagScope, IndexFlags, MatchMode};
pub use fs::find_filesystem;
pub use host::find_host;
pub use relative::{relative_file_name, PathComparison};

use std::path::PathBuf;

/// Fixed basename of package index manifests.
pub const MANIFEST_FILE: &str = "pkgIndex.keel";

/// Prefix marking identifiers resolved through the host rather than disk.
pub const HOST_PREFIX: &str = "host:";

/// Variable published to an evaluating manifest, holding its containing
/// directory with forward slashes.
pub const PKG_DIR_VAR: &str = "::keel::pkg::dir";

/// Run the discovery strategies selected by `flags` and merge results into
/// `cache`.
///
/// `HOST`/`NORMAL` membership in `flags` selects which strategies run at
/// all. Order is chosen by `PREFER_FILE_SYSTEM`/`PREFER_HOST`; the default
/// is host-first, so the single compiled-in manifest wins ties before the
/// slower filesystem scan runs. The first hard failure short-circuits the
/// remaining strategy.
pub fn find_all(
    ctx: &mut DiscoveryContext<'_>,
    roots: &[PathBuf],
    cache: &mut IndexCache,
    callback: &mut dyn IndexCallback,
    flags: IndexFlags,
) -> Result<(), IndexError> {
    let host_in_scope = flags.contains(IndexFlags::HOST);
    let normal_in_scope = flags.contains(IndexFlags::NORMAL);

    let filesystem_first = flags.contains(IndexFlags::PREFER_FILE_SYSTEM)
        && !flags.contains(IndexFlags::PREFER_HOST);

    if filesystem_first {
        if normal_in_scope {
            find_filesystem(ctx, roots, cache, callback, flags)?;
        }
        if host_in_scope {
            find_host(ctx, roots, cache, callback, flags)?;
        }
    } else {
        if host_in_scope {
            find_host(ctx, roots, cache, callback, flags)?;
        }
        if normal_in_scope {
            find_filesystem(ctx, roots, cache, callback, flags)?;
        }
    }

    Ok(())
}
