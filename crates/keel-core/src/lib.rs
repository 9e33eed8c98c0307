#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

//! Package-index discovery and caching for the keel runtime.
//!
//! When the runtime needs to know which packages are installable it discovers
//! `pkgIndex.keel` manifests from two sources: a single host-provided manifest
//! (compiled into the embedding application) and zero or more manifests found
//! by scanning filesystem search roots. Discovered manifests are evaluated
//! once and tracked in an [`index::IndexCache`] held by the caller, so that
//! repeated discovery passes are cheap and stale entries disappear on their
//! own.

pub mod index;
pub mod version;

pub use index::{
    find_all, find_filesystem, find_host, relative_file_name, CallbackOutcome, DiscoveryContext,
    FlagScope, HostManifest, HostServices, IndexCache, IndexCallback, IndexError, IndexFlags,
    ManifestEvaluator, MatchMode, PathComparison, ScriptEngine, ScriptSource, Trust,
    VariableStore, HOST_PREFIX, MANIFEST_FILE, PKG_DIR_VAR,
};
pub use version::{compare, satisfies, PackageVersion, VersionParseError};
