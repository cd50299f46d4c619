//! Domain types for the dependency crawler.
//!
//! A crawl starts from a [`RepositoryReference`], receives [`Repository`]
//! records from a dependency source, and persists them as [`GraphNode`]s joined
//! by [`Relationship::DependsOn`] edges.

use crate::error::MalformedReferenceError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Separator between organization and name in the canonical form.
pub const REFERENCE_SEPARATOR: char = '/';

/// Identifies a hostable repository by organization and name.
///
/// Both parts are non-empty and free of `/`, so the canonical `org/name`
/// string always parses back to the same reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepositoryReference {
    organization: String,
    name: String,
}

impl RepositoryReference {
    /// Build a reference from its two parts.
    ///
    /// # Errors
    ///
    /// Returns `MalformedReferenceError` if either part is empty or contains `/`.
    pub fn new(
        organization: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self, MalformedReferenceError> {
        let organization = organization.into();
        let name = name.into();

        for part in [&organization, &name] {
            if part.is_empty() || part.contains(REFERENCE_SEPARATOR) {
                return Err(MalformedReferenceError::new(
                    format!("{organization}{REFERENCE_SEPARATOR}{name}"),
                    "organization and name must be non-empty and contain no '/'",
                ));
            }
        }

        Ok(Self { organization, name })
    }

    /// Parse the canonical `org/name` form.
    ///
    /// No character or casing validation is done beyond the separator rule.
    ///
    /// # Errors
    ///
    /// Returns `MalformedReferenceError` unless `text` splits into exactly two
    /// non-empty segments on `/`.
    pub fn parse(text: &str) -> Result<Self, MalformedReferenceError> {
        let mut parts = text.split(REFERENCE_SEPARATOR);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(organization), Some(name), None)
                if !organization.is_empty() && !name.is_empty() =>
            {
                Ok(Self {
                    organization: organization.to_string(),
                    name: name.to_string(),
                })
            }
            (_, _, Some(_)) => Err(MalformedReferenceError::new(
                text,
                "must have exactly one slash",
            )),
            (_, None, _) => Err(MalformedReferenceError::new(
                text,
                "must be in the form org/repo",
            )),
            _ => Err(MalformedReferenceError::new(
                text,
                "organization and name must be non-empty",
            )),
        }
    }

    /// The owning organization or user.
    pub fn organization(&self) -> &str {
        &self.organization
    }

    /// The repository name within the organization.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for RepositoryReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{REFERENCE_SEPARATOR}{}", self.organization, self.name)
    }
}

impl FromStr for RepositoryReference {
    type Err = MalformedReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RepositoryReference {
    type Error = MalformedReferenceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RepositoryReference> for String {
    fn from(reference: RepositoryReference) -> Self {
        reference.to_string()
    }
}

/// A dependency (or dependent) as reported by a dependency source.
///
/// Only `fully_qualified_name` is guaranteed. It is the key the record is
/// stored under: a canonical reference for hosted repositories, or an
/// ecosystem package name such as `serde` or `org.apache.commons:commons-lang3`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// Graph key for this record.
    pub fully_qualified_name: String,

    /// Owning organization, when resolved to a hosted repository.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,

    /// Repository name, when resolved to a hosted repository.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Web URL of the hosted repository.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Version requirement declared by the manifest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Package ecosystem or language (e.g. `NPM`, `RUST`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl Repository {
    /// A record carrying only its fully-qualified name.
    pub fn new(fully_qualified_name: impl Into<String>) -> Self {
        Self {
            fully_qualified_name: fully_qualified_name.into(),
            organization: None,
            name: None,
            url: None,
            version: None,
            language: None,
        }
    }

    /// A record for a hosted repository, keyed by its canonical reference.
    pub fn from_reference(reference: &RepositoryReference) -> Self {
        Self {
            organization: Some(reference.organization().to_string()),
            name: Some(reference.name().to_string()),
            ..Self::new(reference.to_string())
        }
    }
}

/// Relationship kinds stored between graph nodes.
///
/// Edges always point from the dependent to the dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Relationship {
    /// Source depends on target.
    #[serde(rename = "DEPENDS_ON")]
    DependsOn,
}

impl Relationship {
    /// Label used by graph databases for this relationship.
    pub fn label(self) -> &'static str {
        match self {
            Relationship::DependsOn => "DEPENDS_ON",
        }
    }
}

/// A persisted graph node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Unique key: a canonical reference or a package's fully-qualified name.
    pub full_name: String,

    /// When this node was last the subject of a crawl. `None` for nodes only
    /// ever seen as someone else's neighbor.
    pub last_targeted: Option<DateTime<Utc>>,
}

impl GraphNode {
    /// A node that has never been crawled.
    pub fn untargeted(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            last_targeted: None,
        }
    }

    /// Whether this node belongs to the crawl frontier.
    pub fn is_frontier_candidate(&self) -> bool {
        self.last_targeted.is_none() && is_crawlable_name(&self.full_name)
    }
}

/// Whether a node key looks like a hostable repository.
///
/// Names containing `.` are treated as external ecosystem packages (they
/// usually embed a domain or group separator). Names that are not a
/// well-formed `org/repo` reference cannot be crawled either.
pub fn is_crawlable_name(full_name: &str) -> bool {
    !full_name.contains('.') && RepositoryReference::parse(full_name).is_ok()
}

/// Aggregate counts over a graph store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    /// Total nodes.
    pub nodes: usize,

    /// Total `DEPENDS_ON` edges.
    pub edges: usize,

    /// Nodes with `last_targeted` set.
    pub targeted: usize,
}
