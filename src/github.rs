//! Access to the hosting API.
//!
//! `HostingApi` is the narrow seam the collectors depend on. `GitHubClient` implements it
//! with octocrab, which takes care of authentication and pagination. `SerializedApi` wraps
//! any implementation so that only one request is ever in flight.

use crate::types::{ItemState, Owner, RawItem, RepoId, Repository};
use anyhow::{Context, Result};
use async_trait::async_trait;
use octocrab::models::{self, IssueState};
use octocrab::{Octocrab, Page};
use tokio::sync::Mutex;

const PER_PAGE: u8 = 100;

#[async_trait]
pub trait HostingApi: Send + Sync {
    /// Repositories owned by a user or an organization, with fork parents resolved.
    async fn list_repositories(&self, owner: &Owner) -> Result<Vec<Repository>>;

    /// Issues of a repository in the given state. Pull requests are not included.
    async fn list_issues(&self, repo: &RepoId, state: ItemState) -> Result<Vec<RawItem>>;

    async fn list_pull_requests(&self, repo: &RepoId, state: ItemState) -> Result<Vec<RawItem>>;
}

/// Serializes every call into the wrapped API behind a single lock.
pub struct SerializedApi<A> {
    inner: A,
    in_flight: Mutex<()>,
}

impl<A: HostingApi> SerializedApi<A> {
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            in_flight: Mutex::new(()),
        }
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }
}

#[async_trait]
impl<A: HostingApi> HostingApi for SerializedApi<A> {
    async fn list_repositories(&self, owner: &Owner) -> Result<Vec<Repository>> {
        let _guard = self.in_flight.lock().await;
        self.inner.list_repositories(owner).await
    }

    async fn list_issues(&self, repo: &RepoId, state: ItemState) -> Result<Vec<RawItem>> {
        let _guard = self.in_flight.lock().await;
        self.inner.list_issues(repo, state).await
    }

    async fn list_pull_requests(&self, repo: &RepoId, state: ItemState) -> Result<Vec<RawItem>> {
        let _guard = self.in_flight.lock().await;
        self.inner.list_pull_requests(repo, state).await
    }
}

pub struct GitHubClient {
    octocrab: Octocrab,
}

impl GitHubClient {
    pub fn new(token: Option<String>) -> Result<Self> {
        let mut builder = Octocrab::builder();
        if let Some(token) = token {
            builder = builder.personal_token(token);
        }

        Ok(Self {
            octocrab: builder.build()?,
        })
    }

    /// The listing endpoints omit `parent`, so forks are looked up one by one.
    async fn resolve_parent(&self, owner: &str, name: &str) -> Result<Option<RepoId>> {
        let full = self.octocrab.repos(owner, name).get().await?;
        Ok(full.parent.and_then(|parent| repo_id_of(&parent)))
    }
}

#[async_trait]
impl HostingApi for GitHubClient {
    async fn list_repositories(&self, owner: &Owner) -> Result<Vec<Repository>> {
        let route = match owner {
            Owner::User(login) => format!("/users/{}/repos", login),
            Owner::Organization(org) => format!("/orgs/{}/repos", org),
        };
        let per_page = PER_PAGE.to_string();
        let first: Page<models::Repository> = self
            .octocrab
            .get(route, Some(&[("per_page", per_page.as_str())]))
            .await
            .with_context(|| format!("listing repositories of {}", owner))?;
        let listed = self.octocrab.all_pages(first).await?;

        let mut repositories = Vec::with_capacity(listed.len());
        for repo in listed {
            let Some(id) = repo_id_of(&repo) else {
                tracing::warn!(name = %repo.name, "Skipping repository without an owner");
                continue;
            };

            if repo.fork.unwrap_or(false) {
                let parent = self.resolve_parent(&id.owner, &id.repo).await?;
                if parent.is_none() {
                    tracing::warn!(repo = %id, "Fork has no resolvable parent");
                }
                repositories.push(Repository {
                    owner: id.owner,
                    name: id.repo,
                    fork: true,
                    parent,
                });
            } else {
                repositories.push(Repository::new(id.owner, id.repo));
            }
        }

        Ok(repositories)
    }

    async fn list_issues(&self, repo: &RepoId, state: ItemState) -> Result<Vec<RawItem>> {
        let first = self
            .octocrab
            .issues(&repo.owner, &repo.repo)
            .list()
            .state(state.into())
            .per_page(PER_PAGE)
            .send()
            .await?;
        let issues = self.octocrab.all_pages(first).await?;

        Ok(issues.into_iter().filter_map(raw_issue).collect())
    }

    async fn list_pull_requests(&self, repo: &RepoId, state: ItemState) -> Result<Vec<RawItem>> {
        let first = self
            .octocrab
            .pulls(&repo.owner, &repo.repo)
            .list()
            .state(state.into())
            .per_page(PER_PAGE)
            .send()
            .await?;
        let pulls = self.octocrab.all_pages(first).await?;

        Ok(pulls
            .into_iter()
            .filter_map(|pr| {
                let created_at = pr.created_at?;
                Some(RawItem {
                    number: pr.number,
                    title: pr.title.unwrap_or_default(),
                    url: pr.html_url.map(|u| u.to_string()).unwrap_or_default(),
                    open: matches!(pr.state, Some(IssueState::Open)),
                    creator: pr.user.map(|u| u.login).unwrap_or_default(),
                    assignee: pr.assignee.map(|a| a.login),
                    created_at,
                    updated_at: pr.updated_at,
                    closed_at: pr.closed_at,
                })
            })
            .collect())
    }
}

/// Converts a listed issue, or returns `None` for the pull requests the issues endpoint
/// also returns.
fn raw_issue(issue: models::issues::Issue) -> Option<RawItem> {
    if issue.pull_request.is_some() {
        return None;
    }
    Some(RawItem {
        number: issue.number,
        title: issue.title,
        url: issue.html_url.to_string(),
        open: matches!(issue.state, IssueState::Open),
        creator: issue.user.login,
        assignee: issue.assignee.map(|a| a.login),
        created_at: issue.created_at,
        updated_at: Some(issue.updated_at),
        closed_at: issue.closed_at,
    })
}

fn repo_id_of(repo: &models::Repository) -> Option<RepoId> {
    if let Some(owner) = &repo.owner {
        return Some(RepoId::new(&owner.login, &repo.name));
    }
    repo.full_name.as_deref().and_then(|full| full.parse().ok())
}
