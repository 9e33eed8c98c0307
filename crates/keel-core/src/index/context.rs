//! Discovery context and the re-entrancy guard.
//!
//! Evaluating a manifest can itself trigger nested discovery (a manifest
//! loading another package). The context carries a suppression flag that
//! nested calls observe and return early on; the flag is held through a
//! scoped guard so it is released on every exit path.

use super::evaluator::{HostServices, ScriptEngine, VariableStore};
use std::cell::Cell;
use std::rc::Rc;

/// Borrowed collaborators for one sequence of discovery calls.
///
/// The context does not synchronize anything; the caller serializes
/// concurrent discovery against the same cache.
pub struct DiscoveryContext<'a> {
    /// Evaluates manifest script text.
    pub engine: &'a mut dyn ScriptEngine,
    /// Supplies the host-provided manifest, if any.
    pub host: &'a dyn HostServices,
    /// Publishes the transient directory binding and script-location stack.
    pub vars: &'a mut dyn VariableStore,
    suppressed: Rc<Cell<bool>>,
}

impl<'a> DiscoveryContext<'a> {
    pub fn new(
        engine: &'a mut dyn ScriptEngine,
        host: &'a dyn HostServices,
        vars: &'a mut dyn VariableStore,
    ) -> Self {
        Self {
            engine,
            host,
            vars,
            suppressed: Rc::new(Cell::new(false)),
        }
    }

    /// Whether discovery is currently suppressed (a manifest is being
    /// evaluated higher up the stack).
    #[must_use]
    pub fn discovery_suppressed(&self) -> bool {
        self.suppressed.get()
    }

    /// Suppress nested discovery for the lifetime of the returned guard.
    #[must_use]
    pub fn suppress_discovery(&self) -> SuppressDiscovery {
        let prior = self.suppressed.replace(true);
        SuppressDiscovery {
            flag: Rc::clone(&self.suppressed),
            prior,
        }
    }
}

/// Scoped re-entrancy guard; restores the prior suppression state on drop.
pub struct SuppressDiscovery {
    flag: Rc<Cell<bool>>,
    prior: bool,
}

impl Drop for SuppressDiscovery {
    fn drop(&mut self) {
        self.flag.set(self.prior);
    }
}
