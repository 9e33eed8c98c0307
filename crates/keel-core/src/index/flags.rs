//! Status flags for cached manifest entries and discovery pass control.

use bitflags::bitflags;

bitflags! {
    /// Flags attached to cached manifest identifiers and used to steer a
    /// discovery pass.
    ///
    /// `HOST`, `NORMAL`, `FOUND` and `EVALUATED` persist in the cache; the
    /// rest are pass-control inputs and never stored.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct IndexFlags: u16 {
        /// Entry is owned by host discovery.
        const HOST = 1 << 0;
        /// Entry is owned by filesystem discovery.
        const NORMAL = 1 << 1;
        /// Reconfirmed by the current pass; cleared at the start of each pass
        /// for entries in scope.
        const FOUND = 1 << 2;
        /// The evaluator has run against this identifier at least once.
        const EVALUATED = 1 << 3;

        /// Force re-evaluation even if already cached.
        const REFRESH = 1 << 4;
        /// Canonicalize identifiers to absolute form before evaluating.
        const RESOLVE = 1 << 5;
        /// Filesystem scan descends subdirectories.
        const RECURSIVE = 1 << 6;
        /// Run filesystem discovery before host discovery.
        const PREFER_FILE_SYSTEM = 1 << 7;
        /// Run host discovery first (the default when neither is given).
        const PREFER_HOST = 1 << 8;
        /// Evaluate under the restricted trust level.
        const SAFE = 1 << 9;
        /// A host manifest miss must not fall back to the filesystem.
        const NO_NORMAL = 1 << 10;
        /// Emit a diagnostic event for every evaluation decision.
        const TRACE = 1 << 11;
        /// Swallow evaluation failure as a soft no-op.
        const NO_COMPLAIN = 1 << 12;

        /// Flags that persist as cache state.
        const STATE = Self::HOST.bits()
            | Self::NORMAL.bits()
            | Self::FOUND.bits()
            | Self::EVALUATED.bits();
    }
}

/// How a flag set in a [`FlagScope`] is matched against entry flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Every flag in the set must be present (or, for the `not_has` side,
    /// the entry is rejected only when it carries *all* of them).
    All,
    /// At least one flag in the set must be present (for the `not_has` side,
    /// the entry is rejected when it carries *any* of them).
    Any,
}

/// Predicate over entry flags used to scope mark and purge operations.
///
/// An empty scope matches everything.
#[derive(Debug, Clone, Copy)]
pub struct FlagScope {
    has: IndexFlags,
    has_mode: MatchMode,
    not_has: IndexFlags,
    not_has_mode: MatchMode,
}

impl Default for FlagScope {
    fn default() -> Self {
        Self::new()
    }
}

impl FlagScope {
    /// A scope that matches every entry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            has: IndexFlags::empty(),
            has_mode: MatchMode::All,
            not_has: IndexFlags::empty(),
            not_has_mode: MatchMode::Any,
        }
    }

    /// Require the entry to carry `flags`, matched per `mode`.
    #[must_use]
    pub fn has(mut self, flags: IndexFlags, mode: MatchMode) -> Self {
        self.has = flags;
        self.has_mode = mode;
        self
    }

    /// Reject entries carrying `flags`, matched per `mode`.
    #[must_use]
    pub fn not_has(mut self, flags: IndexFlags, mode: MatchMode) -> Self {
        self.not_has = flags;
        self.not_has_mode = mode;
        self
    }

    /// Whether `flags` falls inside this scope.
    #[must_use]
    pub fn matches(&self, flags: IndexFlags) -> bool {
        let has_ok = self.has.is_empty()
            || match self.has_mode {
                MatchMode::All => flags.contains(self.has),
                MatchMode::Any => flags.intersects(self.has),
            };

        let not_has_ok = self.not_has.is_empty()
            || match self.not_has_mode {
                MatchMode::All => !flags.contains(self.not_has),
                MatchMode::Any => !flags.intersects(self.not_has),
            };

        has_ok && not_has_ok
    }
}
