// src/model.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// The repository or code base under analysis
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Project(String);

impl Project {
    pub fn new(value: impl Into<String>) -> Self {
        Project(value.into())
    }

    pub fn value(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A person who committed a change, identified by display name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Contributor(String);

impl Contributor {
    pub fn new(name: impl Into<String>) -> Self {
        Contributor(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Contributor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Uniquely identifies a contribution: the hash of the commit it came from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ContributionId(String);

impl ContributionId {
    pub fn new(value: impl Into<String>) -> Self {
        ContributionId(value.into())
    }

    pub fn value(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContributionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One text file touched within a contribution.
///
/// Either side may be empty: an added file has no old content, a deleted
/// file has no new content. Binary files never become items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContributionItem {
    path: String,
    old_content: String,
    new_content: String,
}

impl ContributionItem {
    pub fn new(
        path: impl Into<String>,
        old_content: impl Into<String>,
        new_content: impl Into<String>,
    ) -> Self {
        ContributionItem {
            path: path.into(),
            old_content: old_content.into(),
            new_content: new_content.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn old_content(&self) -> &str {
        &self.old_content
    }

    pub fn new_content(&self) -> &str {
        &self.new_content
    }
}

/// The effect of one commit relative to its predecessor in the analyzed window
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contribution {
    id: ContributionId,
    project: Project,
    contributor: Contributor,
    time: DateTime<Utc>,
    message: String,
    items: Vec<ContributionItem>,
}

impl Contribution {
    pub fn builder(
        id: ContributionId,
        project: Project,
        contributor: Contributor,
        time: DateTime<Utc>,
    ) -> ContributionBuilder {
        ContributionBuilder {
            id,
            project,
            contributor,
            time,
            message: String::new(),
            items: Vec::new(),
        }
    }

    pub fn id(&self) -> &ContributionId {
        &self.id
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn contributor(&self) -> &Contributor {
        &self.contributor
    }

    /// Commit time, second precision
    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn items(&self) -> &[ContributionItem] {
        &self.items
    }
}

/// Incrementally assembles a [`Contribution`]. Identity, project, contributor
/// and time are fixed up front; items and the message accumulate until
/// [`ContributionBuilder::build`] consumes the builder.
#[derive(Debug)]
pub struct ContributionBuilder {
    id: ContributionId,
    project: Project,
    contributor: Contributor,
    time: DateTime<Utc>,
    message: String,
    items: Vec<ContributionItem>,
}

impl ContributionBuilder {
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn item(mut self, item: ContributionItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn items(mut self, items: impl IntoIterator<Item = ContributionItem>) -> Self {
        self.items.extend(items);
        self
    }

    pub fn build(self) -> Contribution {
        Contribution {
            id: self.id,
            project: self.project,
            contributor: self.contributor,
            time: self.time,
            message: self.message,
            items: self.items,
        }
    }
}
