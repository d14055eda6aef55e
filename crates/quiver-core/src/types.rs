//! Core data types for the Quiver write path

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Nanosecond-precision Unix epoch timestamp
pub type Timestamp = i64;

/// A tag is a key-value pair attached to a series
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    /// Create a new tag
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Validate the tag
    pub fn validate(&self) -> Result<()> {
        if self.key.is_empty() {
            return Err(CoreError::EmptyTagKey);
        }
        Ok(())
    }
}

impl PartialOrd for Tag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tag {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.key.cmp(&other.key) {
            Ordering::Equal => self.value.cmp(&other.value),
            other => other,
        }
    }
}

/// Identity of a series: an opaque, byte-comparable ID plus ordered tags.
///
/// Tags are sorted by key and keys are unique. Only the ID participates in
/// shard routing; tags travel with the write as metadata.
///
/// Writers share an identity through an `Arc` so the replica fan-out never
/// copies the ID or the tag list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeriesIdentity {
    id: Vec<u8>,
    tags: Vec<Tag>,
}

impl SeriesIdentity {
    /// Create an untagged series identity
    pub fn new(id: impl Into<Vec<u8>>) -> Result<Self> {
        Self::builder(id).build()
    }

    /// Create a new identity builder
    pub fn builder(id: impl Into<Vec<u8>>) -> SeriesIdentityBuilder {
        SeriesIdentityBuilder::new(id)
    }

    /// The opaque series ID
    pub fn id(&self) -> &[u8] {
        &self.id
    }

    /// Tags sorted by key
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Get a tag value by key
    pub fn get_tag(&self, key: &str) -> Option<&str> {
        self.tags
            .binary_search_by(|t| t.key.as_str().cmp(key))
            .ok()
            .map(|idx| self.tags[idx].value.as_str())
    }
}

impl fmt::Display for SeriesIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.id))?;
        if !self.tags.is_empty() {
            write!(f, "{{")?;
            for (i, tag) in self.tags.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{}={}", tag.key, tag.value)?;
            }
            write!(f, "}}")?;
        }
        Ok(())
    }
}

/// Builder for constructing series identities
pub struct SeriesIdentityBuilder {
    id: Vec<u8>,
    tags: Vec<Tag>,
}

impl SeriesIdentityBuilder {
    /// Create a new builder
    pub fn new(id: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            tags: Vec::new(),
        }
    }

    /// Add a tag
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push(Tag::new(key, value));
        self
    }

    /// Build the identity, sorting tags and rejecting duplicate keys
    pub fn build(mut self) -> Result<SeriesIdentity> {
        if self.id.is_empty() {
            return Err(CoreError::EmptySeriesId);
        }
        for tag in &self.tags {
            tag.validate()?;
        }

        self.tags.sort();
        if let Some(dup) = self.tags.windows(2).find(|w| w[0].key == w[1].key) {
            return Err(CoreError::DuplicateTagKey(dup[0].key.clone()));
        }

        Ok(SeriesIdentity {
            id: self.id,
            tags: self.tags,
        })
    }
}

/// A single timestamped value
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Datapoint {
    /// Timestamp in nanoseconds since Unix epoch
    pub timestamp: Timestamp,
    /// Sample value
    pub value: f64,
}

impl Datapoint {
    /// Create a new datapoint
    pub fn new(timestamp: Timestamp, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Namespace name, shared rather than copied between in-flight writes
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamespaceId(Arc<str>);

impl NamespaceId {
    /// Create a namespace ID
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// Namespace name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NamespaceId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for NamespaceId {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
