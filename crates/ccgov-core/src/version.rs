//! Semantic version parsing and precedence.
//!
//! Parsing is lenient: a malformed numeric segment becomes `0` and a missing
//! pre-release or build becomes empty. Nothing here returns an error, so any
//! string recorded against a chaincode can still be ordered. Use
//! [`SemVer::is_strict`] to find out whether a string is canonical semver.
//!
//! Precedence follows semver for the numeric core and for the "release sorts
//! after pre-release" rule. Two pre-release strings are compared as plain
//! strings, not identifier by identifier.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A parsed version: `major.minor.patch[-prerelease][+build]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SemVer {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub prerelease: String,
    pub build: String,
}

impl SemVer {
    /// Parse a version string leniently.
    ///
    /// A leading `v` or `V` is ignored (`v1.2.0` == `1.2.0`).
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        let trimmed = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);

        let (rest, build) = match trimmed.split_once('+') {
            Some((rest, build)) => (rest, build.to_string()),
            None => (trimmed, String::new()),
        };
        let (core, prerelease) = match rest.split_once('-') {
            Some((core, pre)) => (core, pre.to_string()),
            None => (rest, String::new()),
        };

        let mut segments = core.split('.').map(|s| s.trim().parse::<u64>().unwrap_or(0));
        Self {
            major: segments.next().unwrap_or(0),
            minor: segments.next().unwrap_or(0),
            patch: segments.next().unwrap_or(0),
            prerelease,
            build,
        }
    }

    /// Whether `input` is a canonical semver string (no leniency applied).
    pub fn is_strict(input: &str) -> bool {
        semver::Version::parse(input).is_ok()
    }

    pub fn is_prerelease(&self) -> bool {
        !self.prerelease.is_empty()
    }
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if !self.prerelease.is_empty() {
            write!(f, "-{}", self.prerelease)?;
        }
        if !self.build.is_empty() {
            write!(f, "+{}", self.build)?;
        }
        Ok(())
    }
}

// Build metadata never takes part in precedence, so equality ignores it too.
impl PartialEq for SemVer {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SemVer {}

impl PartialOrd for SemVer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SemVer {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
            .then_with(|| match (self.is_prerelease(), other.is_prerelease()) {
                (false, false) => Ordering::Equal,
                (false, true) => Ordering::Greater,
                (true, false) => Ordering::Less,
                (true, true) => self.prerelease.cmp(&other.prerelease),
            })
    }
}

/// Compare two version strings by semver precedence.
pub fn compare(a: &str, b: &str) -> Ordering {
    SemVer::parse(a).cmp(&SemVer::parse(b))
}

/// Direction of a move from one version to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonKind {
    Upgrade,
    Downgrade,
    Sidegrade,
}

impl ComparisonKind {
    /// Classify `compare(from, to)`: moving to a greater version is an upgrade.
    pub fn classify(from_vs_to: Ordering) -> Self {
        match from_vs_to {
            Ordering::Less => ComparisonKind::Upgrade,
            Ordering::Greater => ComparisonKind::Downgrade,
            Ordering::Equal => ComparisonKind::Sidegrade,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonKind::Upgrade => "upgrade",
            ComparisonKind::Downgrade => "downgrade",
            ComparisonKind::Sidegrade => "sidegrade",
        }
    }
}

impl fmt::Display for ComparisonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown comparison kind: {0}")]
pub struct UnknownComparisonKind(String);

impl FromStr for ComparisonKind {
    type Err = UnknownComparisonKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upgrade" => Ok(ComparisonKind::Upgrade),
            "downgrade" => Ok(ComparisonKind::Downgrade),
            "sidegrade" => Ok(ComparisonKind::Sidegrade),
            other => Err(UnknownComparisonKind(other.to_string())),
        }
    }
}
