//! The manifest evaluator adapter and the external collaborator traits.
//!
//! Discovery hands every candidate manifest to an [`IndexCallback`]. The
//! default implementation, [`ManifestEvaluator`], resolves the identifier to
//! literal script text (local file, remote URI, or host-embedded text),
//! publishes the transient directory binding, evaluates under the correct
//! trust level, and reports whether a concrete identifier should be cached.

use super::context::DiscoveryContext;
use super::error::IndexError;
use super::flags::IndexFlags;
use super::{HOST_PREFIX, PKG_DIR_VAR};
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

/// Trust level for manifest evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trust {
    /// Restricted/sandboxed evaluation.
    Safe,
    /// Unrestricted evaluation.
    Unrestricted,
}

/// Script text resolved from a manifest identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptSource {
    /// Literal script text, read from a local file or supplied by the host.
    Text(String),
    /// A remote manifest location; transport is owned by the engine.
    Remote(String),
}

/// The script evaluator embedded in the runtime.
///
/// Evaluation is synchronous and blocking; failure detail is carried as
/// opaque text belonging to the script language, not to this engine.
pub trait ScriptEngine {
    fn evaluate(&mut self, source: &ScriptSource, trust: Trust) -> Result<(), String>;

    /// Whether the engine is already running with restricted capabilities.
    /// A restricted engine never needs the separate safe evaluation path.
    fn is_restricted(&self) -> bool;
}

/// Manifest text supplied by the embedding host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostManifest {
    /// Inline script, or a file reference when `is_file` is set.
    pub text: String,
    pub is_file: bool,
}

/// The host abstraction supplying the host-provided manifest.
pub trait HostServices {
    /// Script text for `identifier`, or `None` when the host provides
    /// nothing. A missing host manifest is not an error.
    fn manifest_text(&self, identifier: &str) -> Option<HostManifest>;
}

/// The runtime variable store used to publish the transient directory
/// binding while a manifest evaluates.
pub trait VariableStore {
    fn set_scoped(&mut self, name: &str, value: &str);
    fn unset(&mut self, name: &str);

    /// Push the evaluating script's location for `info script`-style
    /// introspection, independent of the plain variable binding.
    fn push_script_location(&mut self, path: &str);
    fn pop_script_location(&mut self);
}

/// Outcome reported by an [`IndexCallback`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackOutcome {
    /// Whether an evaluation attempt actually occurred.
    pub evaluated: bool,
    /// Concrete identifier to cache, when one materialized. Discovery purges
    /// the entry when this is `None`.
    pub cache_identifier: Option<String>,
}

impl CallbackOutcome {
    /// No manifest materialized; nothing to cache.
    #[must_use]
    pub fn skipped() -> Self {
        Self {
            evaluated: false,
            cache_identifier: None,
        }
    }

    /// An evaluation attempt occurred for the given concrete identifier.
    #[must_use]
    pub fn evaluated(cache_identifier: impl Into<String>) -> Self {
        Self {
            evaluated: true,
            cache_identifier: Some(cache_identifier.into()),
        }
    }
}

/// Evaluation hook invoked by discovery for each candidate manifest.
pub trait IndexCallback {
    fn invoke(
        &mut self,
        ctx: &mut DiscoveryContext<'_>,
        identifier: &str,
        flags: &mut IndexFlags,
    ) -> Result<CallbackOutcome, IndexError>;
}

/// Whether a manifest identifier is a remote location rather than a local
/// path. Plain paths (including Windows drive letters) are not URIs.
#[must_use]
pub fn is_remote_uri(identifier: &str) -> bool {
    match Url::parse(identifier) {
        Ok(url) => url.has_host() && url.scheme() != "file",
        Err(_) => false,
    }
}

/// Prefix a host-logical identifier, unless already prefixed.
pub(crate) fn host_qualified(identifier: &str) -> String {
    if identifier.starts_with(HOST_PREFIX) {
        identifier.to_string()
    } else {
        format!("{HOST_PREFIX}{identifier}")
    }
}

/// Scoped binding of the transient directory variable and the script
/// location stack; unbound on every exit path.
struct DirBinding<'v> {
    vars: &'v mut dyn VariableStore,
}

impl<'v> DirBinding<'v> {
    fn bind(vars: &'v mut dyn VariableStore, location: &str, dir: &str) -> Self {
        vars.set_scoped(PKG_DIR_VAR, dir);
        vars.push_script_location(location);
        Self { vars }
    }
}

impl Drop for DirBinding<'_> {
    fn drop(&mut self) {
        self.vars.pop_script_location();
        self.vars.unset(PKG_DIR_VAR);
    }
}

/// A manifest resolved to evaluatable form.
struct Located {
    source: ScriptSource,
    /// Concrete identifier to record in the cache.
    cache_identifier: String,
    /// Location published to the evaluating script.
    location: String,
}

/// Canonicalize `path`, falling back to the original spelling when
/// canonicalization fails.
fn canonical_or_original(path: &Path) -> PathBuf {
    dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Default [`IndexCallback`]: the manifest evaluator adapter.
#[derive(Debug, Default, Clone, Copy)]
pub struct ManifestEvaluator;

impl ManifestEvaluator {
    /// Resolve a file-or-URI identifier to script text.
    fn locate_file(name: &str, flags: IndexFlags) -> Result<Located, IndexError> {
        if is_remote_uri(name) {
            return Ok(Located {
                source: ScriptSource::Remote(name.to_string()),
                cache_identifier: name.to_string(),
                location: name.to_string(),
            });
        }

        let path = Path::new(name);
        if !path.is_file() {
            return Err(IndexError::ManifestNotFound(name.to_string()));
        }

        let path: PathBuf = if flags.contains(IndexFlags::RESOLVE) {
            canonical_or_original(path)
        } else {
            path.to_path_buf()
        };

        let text = keel_util::fs::read_to_string_lossy(&path)?;
        let location = path.to_string_lossy().into_owned();

        Ok(Located {
            source: ScriptSource::Text(text),
            cache_identifier: location.clone(),
            location,
        })
    }

    /// Resolve `identifier` per the host/file rules, or `None` when the
    /// manifest is optional and absent.
    fn locate(
        ctx: &DiscoveryContext<'_>,
        identifier: &str,
        flags: IndexFlags,
    ) -> Result<Option<Located>, IndexError> {
        if !flags.contains(IndexFlags::HOST) {
            return Self::locate_file(identifier, flags).map(Some);
        }

        // Host-pass entries are always cached under the host-qualified
        // identifier, even when the host hands back a file reference, so a
        // later pass recognizes the entry as already known without
        // re-evaluating.
        match ctx.host.manifest_text(identifier) {
            Some(manifest) if manifest.is_file => {
                let mut located = Self::locate_file(&manifest.text, flags)?;
                located.cache_identifier = host_qualified(identifier);
                Ok(Some(located))
            }
            Some(manifest) => Ok(Some(Located {
                source: ScriptSource::Text(manifest.text),
                cache_identifier: host_qualified(identifier),
                location: identifier.to_string(),
            })),
            None => {
                // Host has nothing. Unless forbidden, a same-named file on
                // disk may still satisfy the host manifest.
                if !flags.contains(IndexFlags::NO_NORMAL) && Path::new(identifier).is_file() {
                    let mut located = Self::locate_file(identifier, flags)?;
                    located.cache_identifier = host_qualified(identifier);
                    Ok(Some(located))
                } else {
                    Ok(None)
                }
            }
        }
    }
}

impl IndexCallback for ManifestEvaluator {
    fn invoke(
        &mut self,
        ctx: &mut DiscoveryContext<'_>,
        identifier: &str,
        flags: &mut IndexFlags,
    ) -> Result<CallbackOutcome, IndexError> {
        if identifier.is_empty() {
            return Err(IndexError::InvalidArgument(
                "empty manifest identifier".to_string(),
            ));
        }

        let trace = flags.contains(IndexFlags::TRACE);
        let no_complain = flags.contains(IndexFlags::NO_COMPLAIN);

        let located = match Self::locate(ctx, identifier, *flags) {
            Ok(Some(located)) => located,
            Ok(None) => {
                if trace {
                    debug!(target: "keel::index", identifier, "optional manifest not present");
                }
                return Ok(CallbackOutcome::skipped());
            }
            Err(IndexError::ManifestNotFound(name)) if no_complain => {
                if trace {
                    debug!(target: "keel::index", identifier = %name, "missing manifest ignored");
                }
                return Ok(CallbackOutcome::skipped());
            }
            Err(err) => return Err(err),
        };

        let dir = Path::new(&located.location)
            .parent()
            .map(keel_util::fs::forward_slash)
            .unwrap_or_default();

        let trust = if flags.contains(IndexFlags::SAFE) && !ctx.engine.is_restricted() {
            Trust::Safe
        } else {
            Trust::Unrestricted
        };

        let result = {
            let _binding = DirBinding::bind(&mut *ctx.vars, &located.location, &dir);
            ctx.engine.evaluate(&located.source, trust)
        };

        flags.insert(IndexFlags::EVALUATED);

        if trace {
            debug!(
                target: "keel::index",
                identifier,
                cached = %located.cache_identifier,
                ?trust,
                ok = result.is_ok(),
                "manifest evaluated"
            );
        }

        match result {
            Ok(()) => Ok(CallbackOutcome::evaluated(located.cache_identifier)),
            Err(_) if no_complain => Ok(CallbackOutcome::evaluated(located.cache_identifier)),
            Err(detail) => Err(IndexError::EvaluationFailure {
                identifier: identifier.to_string(),
                detail,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::tempdir;

    #[derive(Default)]
    struct RecordingEngine {
        evaluated: Vec<(ScriptSource, Trust)>,
        fail_with: Option<String>,
        restricted: bool,
    }

    impl ScriptEngine for RecordingEngine {
        fn evaluate(&mut self, source: &ScriptSource, trust: Trust) -> Result<(), String> {
            self.evaluated.push((source.clone(), trust));
            match &self.fail_with {
                Some(detail) => Err(detail.clone()),
                None => Ok(()),
            }
        }
        fn is_restricted(&self) -> bool {
            self.restricted
        }
    }

    #[derive(Default)]
    struct MapHost {
        manifests: HashMap<String, HostManifest>,
    }

    impl HostServices for MapHost {
        fn manifest_text(&self, identifier: &str) -> Option<HostManifest> {
            self.manifests.get(identifier).cloned()
        }
    }

    #[derive(Default)]
    struct RecordingVars {
        bindings: HashMap<String, String>,
        locations: Vec<String>,
        max_depth: usize,
    }

    impl VariableStore for RecordingVars {
        fn set_scoped(&mut self, name: &str, value: &str) {
            self.bindings.insert(name.to_string(), value.to_string());
        }
        fn unset(&mut self, name: &str) {
            self.bindings.remove(name);
        }
        fn push_script_location(&mut self, path: &str) {
            self.locations.push(path.to_string());
            self.max_depth = self.max_depth.max(self.locations.len());
        }
        fn pop_script_location(&mut self) {
            self.locations.pop();
        }
    }

    #[test]
    fn test_is_remote_uri() {
        assert!(is_remote_uri("https://example.com/pkgIndex.keel"));
        assert!(is_remote_uri("ftp://mirror.example.org/x"));
        assert!(!is_remote_uri("/lib/pkgA/pkgIndex.keel"));
        assert!(!is_remote_uri(r"C:\lib\pkgIndex.keel"));
        assert!(!is_remote_uri("file:///lib/pkgIndex.keel"));
        assert!(!is_remote_uri("pkgIndex.keel"));
    }

    #[test]
    fn test_local_file_is_read_and_evaluated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pkgIndex.keel");
        fs::write(&path, "package provide demo 1.0").unwrap();

        let mut engine = RecordingEngine::default();
        let host = MapHost::default();
        let mut vars = RecordingVars::default();
        let mut ctx = DiscoveryContext::new(&mut engine, &host, &mut vars);

        let mut flags = IndexFlags::NORMAL;
        let outcome = ManifestEvaluator
            .invoke(&mut ctx, &path.to_string_lossy(), &mut flags)
            .unwrap();

        assert!(outcome.evaluated);
        assert_eq!(outcome.cache_identifier.as_deref(), Some(&*path.to_string_lossy()));
        assert!(flags.contains(IndexFlags::EVALUATED));
        assert_eq!(engine.evaluated.len(), 1);
        assert_eq!(
            engine.evaluated[0].0,
            ScriptSource::Text("package provide demo 1.0".to_string())
        );
    }

    #[test]
    fn test_missing_file_fails() {
        let mut engine = RecordingEngine::default();
        let host = MapHost::default();
        let mut vars = RecordingVars::default();
        let mut ctx = DiscoveryContext::new(&mut engine, &host, &mut vars);

        let mut flags = IndexFlags::NORMAL;
        let err = ManifestEvaluator
            .invoke(&mut ctx, "/no/such/pkgIndex.keel", &mut flags)
            .unwrap_err();

        assert!(matches!(err, IndexError::ManifestNotFound(_)));
        assert!(engine.evaluated.is_empty());
        assert!(!flags.contains(IndexFlags::EVALUATED));
    }

    #[test]
    fn test_missing_file_with_no_complain_is_skipped() {
        let mut engine = RecordingEngine::default();
        let host = MapHost::default();
        let mut vars = RecordingVars::default();
        let mut ctx = DiscoveryContext::new(&mut engine, &host, &mut vars);

        let mut flags = IndexFlags::NORMAL | IndexFlags::NO_COMPLAIN;
        let outcome = ManifestEvaluator
            .invoke(&mut ctx, "/no/such/pkgIndex.keel", &mut flags)
            .unwrap();

        assert_eq!(outcome, CallbackOutcome::skipped());
    }

    #[test]
    fn test_host_inline_text_gets_qualified_identifier() {
        let mut engine = RecordingEngine::default();
        let mut host = MapHost::default();
        host.manifests.insert(
            "pkgIndex.keel".to_string(),
            HostManifest {
                text: "package provide embedded 2.0".to_string(),
                is_file: false,
            },
        );
        let mut vars = RecordingVars::default();
        let mut ctx = DiscoveryContext::new(&mut engine, &host, &mut vars);

        let mut flags = IndexFlags::HOST;
        let outcome = ManifestEvaluator
            .invoke(&mut ctx, "pkgIndex.keel", &mut flags)
            .unwrap();

        assert!(outcome.evaluated);
        assert_eq!(
            outcome.cache_identifier.as_deref(),
            Some("host:pkgIndex.keel")
        );
    }

    #[test]
    fn test_host_file_reference_gets_qualified_identifier() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("embedded.keel");
        fs::write(&path, "package provide embedded 2.0").unwrap();

        let mut engine = RecordingEngine::default();
        let mut host = MapHost::default();
        host.manifests.insert(
            "pkgIndex.keel".to_string(),
            HostManifest {
                text: path.to_string_lossy().into_owned(),
                is_file: true,
            },
        );
        let mut vars = RecordingVars::default();
        let mut ctx = DiscoveryContext::new(&mut engine, &host, &mut vars);

        let mut flags = IndexFlags::HOST;
        let outcome = ManifestEvaluator
            .invoke(&mut ctx, "pkgIndex.keel", &mut flags)
            .unwrap();

        assert!(outcome.evaluated);
        // Cached under the host name, not the backing file path, so a later
        // pass sees the entry as already known.
        assert_eq!(
            outcome.cache_identifier.as_deref(),
            Some("host:pkgIndex.keel")
        );
        assert_eq!(
            engine.evaluated[0].0,
            ScriptSource::Text("package provide embedded 2.0".to_string())
        );
    }

    #[test]
    fn test_resolve_canonicalizes_cached_identifier() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        let path = dir.path().join("pkgIndex.keel");
        fs::write(&path, "x").unwrap();

        // A spelling with a parent-dir hop; canonicalization removes it.
        let dotted = dir.path().join("sub").join("..").join("pkgIndex.keel");

        let mut engine = RecordingEngine::default();
        let host = MapHost::default();
        let mut vars = RecordingVars::default();
        let mut ctx = DiscoveryContext::new(&mut engine, &host, &mut vars);

        let mut flags = IndexFlags::NORMAL | IndexFlags::RESOLVE;
        let outcome = ManifestEvaluator
            .invoke(&mut ctx, &dotted.to_string_lossy(), &mut flags)
            .unwrap();

        let canonical = dunce::canonicalize(&path).unwrap();
        assert_eq!(
            outcome.cache_identifier.as_deref(),
            Some(&*canonical.to_string_lossy())
        );
    }

    #[test]
    fn test_without_resolve_keeps_given_spelling() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        let path = dir.path().join("pkgIndex.keel");
        fs::write(&path, "x").unwrap();

        let dotted = dir.path().join("sub").join("..").join("pkgIndex.keel");
        let id = dotted.to_string_lossy().into_owned();

        let mut engine = RecordingEngine::default();
        let host = MapHost::default();
        let mut vars = RecordingVars::default();
        let mut ctx = DiscoveryContext::new(&mut engine, &host, &mut vars);

        let mut flags = IndexFlags::NORMAL;
        let outcome = ManifestEvaluator.invoke(&mut ctx, &id, &mut flags).unwrap();
        assert_eq!(outcome.cache_identifier.as_deref(), Some(id.as_str()));
    }

    #[test]
    fn test_canonicalize_falls_back_to_original_spelling() {
        let missing = Path::new("/no/such/dir/pkgIndex.keel");
        assert_eq!(canonical_or_original(missing), missing);
    }

    #[test]
    fn test_host_miss_is_not_an_error() {
        let mut engine = RecordingEngine::default();
        let host = MapHost::default();
        let mut vars = RecordingVars::default();
        let mut ctx = DiscoveryContext::new(&mut engine, &host, &mut vars);

        let mut flags = IndexFlags::HOST | IndexFlags::NO_NORMAL;
        let outcome = ManifestEvaluator
            .invoke(&mut ctx, "pkgIndex.keel", &mut flags)
            .unwrap();

        assert_eq!(outcome, CallbackOutcome::skipped());
        assert!(engine.evaluated.is_empty());
    }

    #[test]
    fn test_host_miss_falls_back_to_filesystem_without_no_normal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pkgIndex.keel");
        fs::write(&path, "package provide ondisk 1.0").unwrap();

        let mut engine = RecordingEngine::default();
        let host = MapHost::default();
        let mut vars = RecordingVars::default();
        let mut ctx = DiscoveryContext::new(&mut engine, &host, &mut vars);

        let mut flags = IndexFlags::HOST;
        let outcome = ManifestEvaluator
            .invoke(&mut ctx, &path.to_string_lossy(), &mut flags)
            .unwrap();

        assert!(outcome.evaluated);
        assert_eq!(engine.evaluated.len(), 1);
    }

    #[test]
    fn test_safe_flag_selects_safe_trust() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pkgIndex.keel");
        fs::write(&path, "x").unwrap();

        let mut engine = RecordingEngine::default();
        let host = MapHost::default();
        let mut vars = RecordingVars::default();
        let mut ctx = DiscoveryContext::new(&mut engine, &host, &mut vars);

        let mut flags = IndexFlags::NORMAL | IndexFlags::SAFE;
        ManifestEvaluator
            .invoke(&mut ctx, &path.to_string_lossy(), &mut flags)
            .unwrap();
        assert_eq!(engine.evaluated[0].1, Trust::Safe);
    }

    #[test]
    fn test_restricted_engine_skips_safe_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pkgIndex.keel");
        fs::write(&path, "x").unwrap();

        let mut engine = RecordingEngine {
            restricted: true,
            ..RecordingEngine::default()
        };
        let host = MapHost::default();
        let mut vars = RecordingVars::default();
        let mut ctx = DiscoveryContext::new(&mut engine, &host, &mut vars);

        let mut flags = IndexFlags::NORMAL | IndexFlags::SAFE;
        ManifestEvaluator
            .invoke(&mut ctx, &path.to_string_lossy(), &mut flags)
            .unwrap();
        assert_eq!(engine.evaluated[0].1, Trust::Unrestricted);
    }

    #[test]
    fn test_dir_binding_unbound_on_success_and_failure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pkgIndex.keel");
        fs::write(&path, "x").unwrap();
        let id = path.to_string_lossy().into_owned();

        let host = MapHost::default();

        for fail in [false, true] {
            let mut engine = RecordingEngine {
                fail_with: fail.then(|| "script blew up".to_string()),
                ..RecordingEngine::default()
            };
            let mut vars = RecordingVars::default();
            let mut ctx = DiscoveryContext::new(&mut engine, &host, &mut vars);

            let mut flags = IndexFlags::NORMAL;
            let _ = ManifestEvaluator.invoke(&mut ctx, &id, &mut flags);

            assert!(vars.bindings.is_empty(), "binding must be unset (fail={fail})");
            assert!(vars.locations.is_empty());
            assert_eq!(vars.max_depth, 1, "location was pushed during eval");
        }
    }

    #[test]
    fn test_no_complain_swallows_evaluation_failure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pkgIndex.keel");
        fs::write(&path, "x").unwrap();
        let id = path.to_string_lossy().into_owned();

        let host = MapHost::default();
        let mut engine = RecordingEngine {
            fail_with: Some("bad manifest".to_string()),
            ..RecordingEngine::default()
        };
        let mut vars = RecordingVars::default();
        let mut ctx = DiscoveryContext::new(&mut engine, &host, &mut vars);

        let mut flags = IndexFlags::NORMAL | IndexFlags::NO_COMPLAIN;
        let outcome = ManifestEvaluator.invoke(&mut ctx, &id, &mut flags).unwrap();
        assert!(outcome.evaluated);
        assert!(flags.contains(IndexFlags::EVALUATED));

        // Without NO_COMPLAIN the same manifest hard-fails with detail.
        let mut flags = IndexFlags::NORMAL;
        let err = ManifestEvaluator.invoke(&mut ctx, &id, &mut flags).unwrap_err();
        match err {
            IndexError::EvaluationFailure { detail, .. } => assert_eq!(detail, "bad manifest"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
