//! Implementation keys
//!
//! Every registered implementation is addressed by an interface name and a
//! variant name, written `interface::variant` (e.g. `material::diffuse`).

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Separator between interface and variant in the textual form
pub const KEY_SEPARATOR: &str = "::";

/// Identifies one implementation of a component interface
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImplementationKey {
    interface: Box<str>,
    variant: Box<str>,
}

impl ImplementationKey {
    /// Create a key from its two parts
    pub fn new(interface: &str, variant: &str) -> Result<Self> {
        validate_part(interface, "interface")?;
        validate_part(variant, "variant")?;
        Ok(Self {
            interface: interface.into(),
            variant: variant.into(),
        })
    }

    /// Parse `interface::variant`
    pub fn parse(s: &str) -> Result<Self> {
        let (interface, variant) = s.split_once(KEY_SEPARATOR).ok_or_else(|| Error::InvalidKey {
            key: s.to_string(),
            reason: format!("expected 'interface{}variant'", KEY_SEPARATOR),
        })?;
        Self::new(interface, variant).map_err(|_| Error::InvalidKey {
            key: s.to_string(),
            reason: "parts must be non-empty and consist of [A-Za-z0-9_]".into(),
        })
    }

    /// Interface name (e.g. `material`)
    #[inline]
    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Variant name (e.g. `diffuse`)
    #[inline]
    pub fn variant(&self) -> &str {
        &self.variant
    }
}

fn validate_part(part: &str, what: &str) -> Result<()> {
    if part.is_empty() {
        return Err(Error::InvalidKey {
            key: part.to_string(),
            reason: format!("{} name is empty", what),
        });
    }
    if !part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(Error::InvalidKey {
            key: part.to_string(),
            reason: format!("{} name contains invalid characters", what),
        });
    }
    Ok(())
}

impl fmt::Display for ImplementationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.interface, KEY_SEPARATOR, self.variant)
    }
}

impl fmt::Debug for ImplementationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImplementationKey({})", self)
    }
}

impl FromStr for ImplementationKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
