//! Absolute path codec for the naming tree.
//!
//! Every path on the wire is an absolute, `/`-separated string. The root is
//! `/` and decodes to the empty component list; all other paths are a
//! non-empty sequence of non-empty components. Colons are reserved by the
//! endpoint syntax and never valid inside a path.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error parsing a path string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathParseError {
    /// The input was the empty string
    #[error("Path is empty")]
    Empty,

    /// The input did not start with `/`
    #[error("Path does not begin with '/': {0:?}")]
    NotAbsolute(String),

    /// The input contained a `:`
    #[error("Path contains a colon: {0:?}")]
    ContainsColon(String),

    /// The input contained an empty component (`//` or trailing `/`)
    #[error("Path contains an empty component: {0:?}")]
    EmptyComponent(String),
}

/// An absolute path in the naming tree.
///
/// Stored as its decoded component list; the root is the empty list.
/// `parse` and `Display` round-trip for every valid path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DfsPath {
    components: Vec<String>,
}

impl DfsPath {
    /// The root path `/`.
    pub fn root() -> Self {
        Self { components: Vec::new() }
    }

    /// Parses a path string, rejecting invalid forms.
    pub fn parse(s: &str) -> Result<Self, PathParseError> {
        if s.is_empty() {
            return Err(PathParseError::Empty);
        }
        if !s.starts_with('/') {
            return Err(PathParseError::NotAbsolute(s.to_string()));
        }
        if s.contains(':') {
            return Err(PathParseError::ContainsColon(s.to_string()));
        }
        if s == "/" {
            return Ok(Self::root());
        }

        let mut components = Vec::new();
        for segment in s[1..].split('/') {
            if segment.is_empty() {
                return Err(PathParseError::EmptyComponent(s.to_string()));
            }
            components.push(segment.to_string());
        }

        Ok(Self { components })
    }

    /// Returns true if this is the root path.
    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// Returns the path components, root-first.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Returns the number of components.
    pub fn depth(&self) -> usize {
        self.components.len()
    }

    /// Returns the final component, or `None` for the root.
    pub fn last(&self) -> Option<&str> {
        self.components.last().map(String::as_str)
    }

    /// Returns the parent path, or `None` for the root.
    pub fn parent(&self) -> Option<DfsPath> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            components: self.components[..self.components.len() - 1].to_vec(),
        })
    }

    /// Returns the path extended by one component.
    pub fn child(&self, name: &str) -> DfsPath {
        let mut components = self.components.clone();
        components.push(name.to_string());
        Self { components }
    }

    /// Returns true if `self` is a strict prefix of `other`.
    pub fn is_strict_prefix_of(&self, other: &DfsPath) -> bool {
        self.depth() < other.depth()
            && other.components[..self.depth()] == self.components[..]
    }
}

impl fmt::Display for DfsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return write!(f, "/");
        }
        for component in &self.components {
            write!(f, "/{}", component)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for DfsPath {
    type Err = PathParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for DfsPath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DfsPath {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
