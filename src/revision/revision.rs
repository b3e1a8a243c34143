//! Revision - `<height>-<hash>` identity of one document version
//!
//! - Height counts the versions in a document's lineage, starting at 1
//! - Hash is content-derived (see `RevisionManager::next`)
//! - Ordering is height first, then hash lexicographically, which gives
//!   every replica the same winner between two same-height branches

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::errors::{RevisionError, RevisionResult};

/// Sentinel accepted in place of a previous revision to mean "this is a new document"
pub const NEW_DOCUMENT_SENTINEL: &str = "1-new";

/// A document revision.
///
/// Constructed only through `parse` or `RevisionManager::next`, so every
/// value in circulation is well formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Revision {
    height: u64,
    hash: String,
}

impl Revision {
    /// Build a revision from parts, validating both.
    pub fn new(height: u64, hash: impl Into<String>) -> RevisionResult<Self> {
        let hash = hash.into();
        if height == 0 {
            return Err(RevisionError::InvalidHeight(format!("{}-{}", height, hash)));
        }
        if !is_valid_hash(&hash) {
            return Err(RevisionError::InvalidHash(format!("{}-{}", height, hash)));
        }
        Ok(Self { height, hash })
    }

    /// Parse a `<height>-<hash>` string.
    pub fn parse(s: &str) -> RevisionResult<Self> {
        let (height, hash) = s
            .split_once('-')
            .ok_or_else(|| RevisionError::Malformed(s.to_string()))?;

        let height: u64 = height
            .parse()
            .map_err(|_| RevisionError::InvalidHeight(s.to_string()))?;
        if height == 0 {
            return Err(RevisionError::InvalidHeight(s.to_string()));
        }
        if !is_valid_hash(hash) {
            return Err(RevisionError::InvalidHash(s.to_string()));
        }

        Ok(Self {
            height,
            hash: hash.to_string(),
        })
    }

    pub(crate) fn from_parts_unchecked(height: u64, hash: String) -> Self {
        Self { height, hash }
    }

    /// Number of versions in the lineage up to and including this one
    pub fn height(&self) -> u64 {
        self.height
    }

    /// Content-derived hash component
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// True when both revisions sit at the same height but differ in content
    pub fn is_sibling_of(&self, other: &Revision) -> bool {
        self.height == other.height && self.hash != other.hash
    }
}

fn is_valid_hash(hash: &str) -> bool {
    !hash.is_empty() && hash.chars().all(|c| c.is_ascii_alphanumeric())
}

impl Ord for Revision {
    fn cmp(&self, other: &Self) -> Ordering {
        self.height
            .cmp(&other.height)
            .then_with(|| self.hash.cmp(&other.hash))
    }
}

impl PartialOrd for Revision {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.height, self.hash)
    }
}

impl FromStr for Revision {
    type Err = RevisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Revision {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Revision {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Revision::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Optimistic-concurrency precondition carried by every write.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Precondition {
    /// The document must not exist yet
    #[default]
    NewDocument,
    /// The document's current revision must equal this one
    UpdateOf(Revision),
}

impl Precondition {
    /// Parse an optional previous-revision string.
    ///
    /// `None` and the `1-new` sentinel both mean `NewDocument`.
    pub fn parse(previous: Option<&str>) -> RevisionResult<Self> {
        match previous {
            None => Ok(Self::NewDocument),
            Some(NEW_DOCUMENT_SENTINEL) => Ok(Self::NewDocument),
            Some(s) => Revision::parse(s).map(Self::UpdateOf),
        }
    }

    /// Revision the write claims to extend, if any
    pub fn revision(&self) -> Option<&Revision> {
        match self {
            Self::NewDocument => None,
            Self::UpdateOf(rev) => Some(rev),
        }
    }
}

impl From<Revision> for Precondition {
    fn from(rev: Revision) -> Self {
        Self::UpdateOf(rev)
    }
}

impl Serialize for Precondition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::NewDocument => serializer.serialize_none(),
            Self::UpdateOf(rev) => serializer.collect_str(rev),
        }
    }
}

impl<'de> Deserialize<'de> for Precondition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let previous = Option::<String>::deserialize(deserializer)?;
        Precondition::parse(previous.as_deref()).map_err(serde::de::Error::custom)
    }
}
