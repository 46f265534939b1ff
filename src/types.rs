//! Domain types shared by the directory, the collectors and the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::iter;
use std::str::FromStr;

/// A unique identifier for a GitHub repository, written as `owner/repo`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoId {
    /// The owner of the repository (e.g., "snowdrop").
    pub owner: String,
    /// The name of the repository (e.g., "spring-boot-bom").
    pub repo: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    fn id_bytes(&self) -> impl Iterator<Item = u8> + '_ {
        self.owner
            .bytes()
            .chain(iter::once(b'/'))
            .chain(self.repo.bytes())
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

// Ordered by the `owner/repo` string, not field by field: "a-b/x" sorts before "a/x".
impl Ord for RepoId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id_bytes().cmp(other.id_bytes())
    }
}

impl PartialOrd for RepoId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid repository identifier '{0}', expected owner/repo")]
pub struct InvalidRepoId(pub String);

impl FromStr for RepoId {
    type Err = InvalidRepoId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('/').collect();
        match parts.as_slice() {
            [owner, repo] if !owner.trim().is_empty() && !repo.trim().is_empty() => {
                Ok(RepoId::new(owner.trim(), repo.trim()))
            }
            _ => Err(InvalidRepoId(s.to_string())),
        }
    }
}

impl TryFrom<String> for RepoId {
    type Error = InvalidRepoId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RepoId> for String {
    fn from(id: RepoId) -> Self {
        id.to_string()
    }
}

/// A repository as enumerated for a user or organization.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Repository {
    pub owner: String,
    pub name: String,
    pub fork: bool,
    /// Only ever set for forks.
    pub parent: Option<RepoId>,
}

impl Repository {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            fork: false,
            parent: None,
        }
    }

    pub fn fork_of(owner: impl Into<String>, name: impl Into<String>, parent: RepoId) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            fork: true,
            parent: Some(parent),
        }
    }

    pub fn is_fork(&self) -> bool {
        self.fork
    }

    pub fn id(&self) -> RepoId {
        RepoId::new(&self.owner, &self.name)
    }

    /// The identifier activity is reported under.
    ///
    /// Forks report under their parent so the same work is not counted twice.
    /// `None` means a fork whose parent is unknown.
    pub fn reporting_id(&self) -> Option<RepoId> {
        if self.fork {
            self.parent.clone()
        } else {
            Some(self.id())
        }
    }
}

/// Whose repositories to enumerate.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Owner {
    User(String),
    Organization(String),
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::User(login) => write!(f, "user {}", login),
            Owner::Organization(org) => write!(f, "organization {}", org),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemKind {
    Issue,
    PullRequest,
}

impl ItemKind {
    pub const ALL: [ItemKind; 2] = [ItemKind::Issue, ItemKind::PullRequest];

    /// Plural form, as used in URLs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Issue => "issues",
            ItemKind::PullRequest => "pull-requests",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown item kind '{0}'")]
pub struct UnknownItemKind(pub String);

impl FromStr for ItemKind {
    type Err = UnknownItemKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "issues" | "issue" => Ok(ItemKind::Issue),
            "pull-requests" | "pull-request" | "pulls" => Ok(ItemKind::PullRequest),
            other => Err(UnknownItemKind(other.to_string())),
        }
    }
}

/// Lifecycle filter passed to the hosting API.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemState {
    #[default]
    All,
    Open,
    Closed,
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ItemState::All => "all",
            ItemState::Open => "open",
            ItemState::Closed => "closed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown item state '{0}', expected all, open or closed")]
pub struct UnknownItemState(pub String);

impl FromStr for ItemState {
    type Err = UnknownItemState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(ItemState::All),
            "open" => Ok(ItemState::Open),
            "closed" => Ok(ItemState::Closed),
            _ => Err(UnknownItemState(s.to_string())),
        }
    }
}

impl From<ItemState> for octocrab::params::State {
    fn from(state: ItemState) -> Self {
        match state {
            ItemState::All => octocrab::params::State::All,
            ItemState::Open => octocrab::params::State::Open,
            ItemState::Closed => octocrab::params::State::Closed,
        }
    }
}

/// An issue or pull request as returned by the hosting API, before it is tied to a repository.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawItem {
    pub number: u64,
    pub title: String,
    pub url: String,
    pub open: bool,
    pub creator: String,
    pub assignee: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// A normalized issue or pull request attributed to a reporting repository.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Item {
    pub kind: ItemKind,
    pub number: u64,
    pub title: String,
    pub url: String,
    pub open: bool,
    pub creator: String,
    pub assignee: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub repository: RepoId,
}

impl Item {
    pub fn from_raw(kind: ItemKind, repository: RepoId, raw: RawItem) -> Self {
        Self {
            kind,
            number: raw.number,
            title: raw.title,
            url: raw.url,
            open: raw.open,
            creator: raw.creator,
            assignee: raw.assignee,
            created_at: raw.created_at,
            updated_at: raw.updated_at,
            closed_at: raw.closed_at,
            repository,
        }
    }

    /// True if the item was created, updated or closed within `[start, end]`.
    pub fn is_active_during(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        let within = |t: DateTime<Utc>| t >= start && t <= end;
        within(self.created_at)
            || self.updated_at.is_some_and(within)
            || self.closed_at.is_some_and(within)
    }
}
