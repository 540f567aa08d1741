//! Hierarchical locators
//!
//! A locator names a live component by its path from the root of the
//! instance store. The root is written `$`, descendants append `.segment`:
//! `$.assets.camera1`.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Textual name of the root locator
pub const ROOT: &str = "$";

/// Path of a component instance inside the instance store
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Locator {
    segments: Vec<Box<str>>,
}

impl Locator {
    /// The root locator (`$`)
    pub fn root() -> Self {
        Self { segments: Vec::new() }
    }

    /// Build a locator from segments below the root
    pub fn from_segments<I, S>(segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut locator = Self::root();
        for segment in segments {
            locator = locator.child(segment.as_ref())?;
        }
        Ok(locator)
    }

    /// Parse `$.a.b` or the relative form `a.b`
    pub fn parse(s: &str) -> Result<Self> {
        let rest = if s == ROOT {
            return Ok(Self::root());
        } else if let Some(rest) = s.strip_prefix("$.") {
            rest
        } else {
            s
        };
        Self::from_segments(rest.split('.'))
    }

    /// Locator of a direct child
    pub fn child(&self, name: &str) -> Result<Self> {
        validate_segment(name)?;
        let mut segments = self.segments.clone();
        segments.push(name.into());
        Ok(Self { segments })
    }

    /// Parent locator, `None` for the root
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        let mut segments = self.segments.clone();
        segments.pop();
        Some(Self { segments })
    }

    /// Last segment, `None` for the root
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(|s| &**s)
    }

    /// Segments below the root
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(|s| &**s)
    }

    /// Number of segments below the root
    #[inline]
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// True if `other` lies strictly below this locator
    pub fn is_ancestor_of(&self, other: &Locator) -> bool {
        other.segments.len() > self.segments.len()
            && other.segments[..self.segments.len()] == self.segments[..]
    }
}

/// Check a single path segment
///
/// Segments must be non-empty and consist of `[A-Za-z0-9_:-]`.
pub fn validate_segment(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_name(name, "empty segment"));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | ':' | '-')))
    {
        return Err(Error::invalid_name(name, format!("character '{}' is not allowed", c)));
    }
    Ok(())
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(ROOT)?;
        for segment in &self.segments {
            write!(f, ".{}", segment)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Locator({})", self)
    }
}

impl FromStr for Locator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl serde::Serialize for Locator {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for Locator {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Locator::parse(&s).map_err(serde::de::Error::custom)
    }
}
