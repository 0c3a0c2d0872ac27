//! Version parsing and ordering.
//!
//! Accepts tags as they appear on release feeds and in the package database:
//! an optional `v`, dot-separated numeric segments, an optional pre-release and
//! optional `+build` metadata. Anything else is rejected rather than given a
//! fallback position in the ordering.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static VERSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^v?(?P<segments>[0-9]+(?:\.[0-9]+)*)",
        r"(?:-(?P<pre>[0-9A-Za-z~-]+(?:\.[0-9A-Za-z~-]+)*)",
        r"|(?P<pre_attached>[A-Za-z~][0-9A-Za-z~-]*(?:\.[0-9A-Za-z~-]+)*))?",
        r"(?:\+(?P<build>[0-9A-Za-z~-]+(?:\.[0-9A-Za-z~-]+)*))?$",
    ))
    .expect("version pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("version string is empty")]
    Empty,
    #[error("malformed version: {0}")]
    Malformed(String),
    #[error("version segment out of range in {0}")]
    SegmentOverflow(String),
}

/// A parsed, totally ordered version.
///
/// Equality and ordering ignore build metadata and trailing zero segments,
/// so `v1.2`, `1.2.0` and `1.2.0+build.7` are all equal.
#[derive(Debug, Clone)]
pub struct Version {
    original: String,
    segments: Vec<u64>,
    pre: Vec<String>,
}

impl Version {
    pub fn parse(raw: &str) -> Result<Self, VersionError> {
        if raw.is_empty() {
            return Err(VersionError::Empty);
        }

        let caps = VERSION_PATTERN
            .captures(raw)
            .ok_or_else(|| VersionError::Malformed(raw.to_string()))?;

        let segments = caps["segments"]
            .split('.')
            .map(|s| s.parse::<u64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| VersionError::SegmentOverflow(raw.to_string()))?;

        let pre = caps
            .name("pre")
            .or_else(|| caps.name("pre_attached"))
            .map(|m| m.as_str().split('.').map(str::to_string).collect())
            .unwrap_or_default();

        Ok(Self {
            original: raw.to_string(),
            segments,
            pre,
        })
    }
}

/// Compare two versions.
pub fn compare(a: &Version, b: &Version) -> Ordering {
    a.cmp(b)
}

fn compare_segments(a: &[u64], b: &[u64]) -> Ordering {
    let len = a.len().max(b.len());
    (0..len)
        .map(|i| {
            let x = a.get(i).copied().unwrap_or(0);
            let y = b.get(i).copied().unwrap_or(0);
            x.cmp(&y)
        })
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
}

fn compare_identifier(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

fn compare_prerelease(a: &[String], b: &[String]) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return Ordering::Equal,
        // A release outranks any of its pre-releases.
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }

    a.iter()
        .zip(b.iter())
        .map(|(x, y)| compare_identifier(x, y))
        .find(|o| o.is_ne())
        .unwrap_or_else(|| a.len().cmp(&b.len()))
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_segments(&self.segments, &other.segments)
            .then_with(|| compare_prerelease(&self.pre, &other.pre))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}
