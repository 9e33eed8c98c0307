//! Package version comparison.
//!
//! Keel package versions are dotted tuples of up to four numeric components
//! (`major.minor.build.revision`). Build and revision are optional; an absent
//! component sorts below a present one. Callers frequently deal in *optional*
//! versions ("any version will do"), so the comparison entry points are total
//! over `Option<&PackageVersion>` with `None` sorting below everything.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A keel package version: `major.minor[.build[.revision]]`.
///
/// Ordering is component-wise; absent components sort below zero
/// (`1.2 < 1.2.0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackageVersion {
    major: u64,
    minor: u64,
    build: Option<u64>,
    revision: Option<u64>,
}

/// Error parsing a dotted version string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid version \"{input}\": {reason}")]
pub struct VersionParseError {
    input: String,
    reason: String,
}

impl VersionParseError {
    fn new(input: &str, reason: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

impl PackageVersion {
    /// Create a two-component version.
    #[must_use]
    pub fn new(major: u64, minor: u64) -> Self {
        Self {
            major,
            minor,
            build: None,
            revision: None,
        }
    }

    /// Set the build component.
    #[must_use]
    pub fn with_build(mut self, build: u64) -> Self {
        self.build = Some(build);
        self
    }

    /// Set the revision component.
    #[must_use]
    pub fn with_revision(mut self, revision: u64) -> Self {
        self.revision = Some(revision);
        self
    }

    #[must_use]
    pub fn major(&self) -> u64 {
        self.major
    }

    #[must_use]
    pub fn minor(&self) -> u64 {
        self.minor
    }

    #[must_use]
    pub fn build(&self) -> Option<u64> {
        self.build
    }

    #[must_use]
    pub fn revision(&self) -> Option<u64> {
        self.revision
    }
}

impl FromStr for PackageVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(VersionParseError::new(s, "empty string"));
        }

        let mut parts = Vec::with_capacity(4);
        for part in s.split('.') {
            if parts.len() == 4 {
                return Err(VersionParseError::new(s, "more than four components"));
            }
            let n: u64 = part
                .parse()
                .map_err(|_| VersionParseError::new(s, format!("bad component \"{part}\"")))?;
            parts.push(n);
        }

        Ok(Self {
            major: parts[0],
            minor: parts.get(1).copied().unwrap_or(0),
            build: parts.get(2).copied(),
            revision: parts.get(3).copied(),
        })
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)?;
        if let Some(build) = self.build {
            write!(f, ".{build}")?;
        }
        if let Some(revision) = self.revision {
            write!(f, ".{revision}")?;
        }
        Ok(())
    }
}

/// Null-aware three-way comparison.
///
/// `None` sorts below every version; `None == None`. Total over all inputs.
#[must_use]
pub fn compare(v1: Option<&PackageVersion>, v2: Option<&PackageVersion>) -> Ordering {
    match (v1, v2) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a.cmp(b),
    }
}

/// Whether `have` satisfies a request for `want`.
///
/// With `exact` the versions must compare equal; otherwise `have` must be at
/// least as new as `want`.
#[must_use]
pub fn satisfies(have: Option<&PackageVersion>, want: Option<&PackageVersion>, exact: bool) -> bool {
    let ordering = compare(have, want);
    if exact {
        ordering == Ordering::Equal
    } else {
        ordering != Ordering::Less
    }
}
