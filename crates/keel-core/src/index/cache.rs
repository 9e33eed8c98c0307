//! The package-index cache and its mark/purge maintenance primitives.
//!
//! The cache maps a manifest identifier (absolute path, remote URI, or
//! host-logical name) to its status flags. It is owned by the caller's
//! long-lived context and passed `&mut` into every discovery call; an entry
//! is removed exactly when a discovery pass in its category completes
//! without reconfirming it.
//!
//! Maintenance is two-phase: a pass first *marks* every entry in scope as
//! not-yet-reconfirmed (clearing [`IndexFlags::FOUND`]), re-sets the flag on
//! each entry it still finds, then *purges* everything left unconfirmed.
//! A pass is therefore idempotent and self-healing, and the common
//! nothing-changed case touches no manifest at all.

use super::flags::{FlagScope, IndexFlags};
use std::collections::BTreeMap;

/// Mapping from manifest identifier to status flags.
///
/// Iteration order is the identifier order, so snapshots and purge sweeps
/// are deterministic regardless of discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexCache {
    entries: BTreeMap<String, IndexFlags>,
}

impl IndexCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Flags for a cached identifier, if present.
    #[must_use]
    pub fn get(&self, identifier: &str) -> Option<IndexFlags> {
        self.entries.get(identifier).copied()
    }

    #[must_use]
    pub fn contains(&self, identifier: &str) -> bool {
        self.entries.contains_key(identifier)
    }

    /// Insert or replace an entry. Identifiers are never mutated in place;
    /// a refresh replaces the entry wholesale.
    pub fn insert(&mut self, identifier: impl Into<String>, flags: IndexFlags) {
        self.entries.insert(identifier.into(), flags);
    }

    /// Iterate over cached identifiers in order.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Snapshot the cache contents for diagnostics or path resolution.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, IndexFlags)> {
        self.entries
            .iter()
            .map(|(id, flags)| (id.clone(), *flags))
            .collect()
    }

    /// Set or clear `mark` on every entry matching `scope`.
    ///
    /// With `only`, the operation is restricted to that single identifier;
    /// a named identifier absent from the cache is a no-op, not an error.
    /// Returns the number of entries touched.
    pub fn mark_entries(
        &mut self,
        scope: &FlagScope,
        mark: IndexFlags,
        set: bool,
        only: Option<&str>,
    ) -> usize {
        let mut touched = 0;

        let mut apply = |flags: &mut IndexFlags| {
            if scope.matches(*flags) {
                if set {
                    flags.insert(mark);
                } else {
                    flags.remove(mark);
                }
                touched += 1;
            }
        };

        if let Some(identifier) = only {
            if let Some(flags) = self.entries.get_mut(identifier) {
                apply(flags);
            }
        } else {
            for flags in self.entries.values_mut() {
                apply(flags);
            }
        }

        touched
    }

    /// Remove every entry matching `scope`. Returns the number removed.
    pub fn purge_entries(&mut self, scope: &FlagScope) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, flags| !scope.matches(*flags));
        before - self.entries.len()
    }
}
