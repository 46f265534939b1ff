//! Collection of issues and pull requests across the tracked repositories.
//!
//! One `Collector` handles one item kind. Every collection pass:
//! 1. Lists the tracked repositories.
//! 2. Fetches the items of each repository in the requested state.
//! 3. Keeps items assigned to a configured user and active since the retention floor.
//! 4. Groups what is left by assignee (or creator).
//!
//! A failed request aborts the pass; nothing gathered before it is returned.

use crate::directory::RepositoryDirectory;
use crate::error::CollectionFailure;
use crate::github::HostingApi;
use crate::types::{Item, ItemKind, ItemState, RawItem, RepoId, Repository};
use crate::window::ReportingWindow;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

const LOG_DATE_FORMAT: &str = "%d/%m/%Y";

pub type ItemsByActor = BTreeMap<String, HashSet<Item>>;

/// The outcome of one refresh.
#[derive(Clone, Debug, Serialize)]
pub struct Report {
    pub kind: ItemKind,
    pub state: ItemState,
    pub window: ReportingWindow,
    pub generated_at: DateTime<Utc>,
    pub by_assignee: ItemsByActor,
}

impl Report {
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.by_assignee.values().flatten()
    }
}

#[derive(Clone)]
pub struct Collector {
    kind: ItemKind,
    api: Arc<dyn HostingApi>,
    directory: RepositoryDirectory,
    users: BTreeSet<String>,
    organizations: BTreeSet<String>,
    window: ReportingWindow,
}

impl Collector {
    pub fn new(
        kind: ItemKind,
        api: Arc<dyn HostingApi>,
        directory: RepositoryDirectory,
        users: BTreeSet<String>,
        organizations: BTreeSet<String>,
        window: ReportingWindow,
    ) -> Self {
        Self {
            kind,
            api,
            directory,
            users,
            organizations,
            window,
        }
    }

    /// Collects everything assigned to the configured users, in any state.
    pub async fn refresh(&self) -> Result<Report, CollectionFailure> {
        tracing::info!(kind = %self.kind, "Refreshing reporting data");
        let state = ItemState::All;
        let by_assignee = self.collect_by_assignee(state).await?;

        Ok(Report {
            kind: self.kind,
            state,
            window: self.window,
            generated_at: Utc::now(),
            by_assignee,
        })
    }

    pub async fn collect_by_assignee(
        &self,
        state: ItemState,
    ) -> Result<ItemsByActor, CollectionFailure> {
        let mut grouped = ItemsByActor::new();
        for repository in self.directory.tracked_repositories().await? {
            for item in self.team_items(&repository, state).await? {
                if let Some(assignee) = item.assignee.clone() {
                    grouped.entry(assignee).or_default().insert(item);
                }
            }
        }
        Ok(grouped)
    }

    /// Team items of a single repository, grouped by who opened them.
    pub async fn collect_by_creator(
        &self,
        repository: &RepoId,
        state: ItemState,
    ) -> Result<ItemsByActor, CollectionFailure> {
        let mut grouped = ItemsByActor::new();
        for item in self.team_items(repository, state).await? {
            grouped.entry(item.creator.clone()).or_default().insert(item);
        }
        Ok(grouped)
    }

    /// Every recent item of one repository, queried on behalf of `user`.
    ///
    /// Unlike the team views, items are not checked against the configured users.
    pub async fn collect_by_user(
        &self,
        user: &str,
        repository: &Repository,
        state: ItemState,
    ) -> Result<HashSet<Item>, CollectionFailure> {
        let id = repository
            .reporting_id()
            .unwrap_or_else(|| repository.id());
        tracing::info!(
            kind = %self.kind,
            %state,
            repository = %id,
            user,
            from = %self.window.min_start.format(LOG_DATE_FORMAT),
            to = %self.window.min_end.format(LOG_DATE_FORMAT),
            "Querying user items"
        );

        let items = self
            .fetch(&id, state)
            .await?
            .into_iter()
            .map(|raw| Item::from_raw(self.kind, id.clone(), raw))
            .filter(|item| self.is_recent(item))
            .inspect(log_item)
            .collect();
        Ok(items)
    }

    async fn team_items(
        &self,
        repository: &RepoId,
        state: ItemState,
    ) -> Result<Vec<Item>, CollectionFailure> {
        tracing::info!(kind = %self.kind, %state, %repository, "Querying repository");

        Ok(self
            .fetch(repository, state)
            .await?
            .into_iter()
            .filter(|raw| {
                raw.assignee
                    .as_ref()
                    .is_some_and(|login| self.users.contains(login))
            })
            .map(|raw| Item::from_raw(self.kind, repository.clone(), raw))
            .filter(|item| self.is_recent(item))
            .inspect(log_item)
            .collect())
    }

    async fn fetch(
        &self,
        repository: &RepoId,
        state: ItemState,
    ) -> Result<Vec<RawItem>, CollectionFailure> {
        let result = match self.kind {
            ItemKind::Issue => self.api.list_issues(repository, state).await,
            ItemKind::PullRequest => self.api.list_pull_requests(repository, state).await,
        };
        result.map_err(|e| {
            tracing::error!(kind = %self.kind, %repository, error = %e, "Query failed");
            CollectionFailure::new(format!("{} {} for {}", state, self.kind, repository), e)
        })
    }

    fn is_recent(&self, item: &Item) -> bool {
        item.is_active_during(self.window.min_start, self.window.min_end)
    }

    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    pub fn users(&self) -> &BTreeSet<String> {
        &self.users
    }

    pub fn organizations(&self) -> &BTreeSet<String> {
        &self.organizations
    }

    pub fn window(&self) -> &ReportingWindow {
        &self.window
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.window.start
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.window.end
    }
}

fn log_item(item: &Item) {
    tracing::info!(
        number = item.number,
        title = %item.title,
        repository = %item.repository,
        assignee = item.assignee.as_deref().unwrap_or("-"),
        created = %item.created_at.format(LOG_DATE_FORMAT),
        updated = %log_date(item.updated_at),
        closed = %log_date(item.closed_at),
        "Retained item"
    );
}

fn log_date(t: Option<DateTime<Utc>>) -> String {
    t.map(|t| t.format(LOG_DATE_FORMAT).to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::fake::FakeApi;
    use crate::types::Owner;
    use crate::window::ReportingSchedule;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 15, 10, 0, 0).unwrap()
    }

    fn window() -> ReportingWindow {
        ReportingWindow::compute(now(), &ReportingSchedule::new(4, 12).unwrap())
    }

    fn raw(
        number: u64,
        creator: &str,
        assignee: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> RawItem {
        RawItem {
            number,
            title: format!("Item {}", number),
            url: format!("https://github.com/org/repo/issues/{}", number),
            open: true,
            creator: creator.to_string(),
            assignee: assignee.map(str::to_string),
            created_at,
            updated_at: None,
            closed_at: None,
        }
    }

    fn users(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn collector(
        kind: ItemKind,
        api: Arc<dyn HostingApi>,
        team: &[&str],
        orgs: &[&str],
    ) -> Collector {
        let directory = RepositoryDirectory::new(api.clone(), users(team), users(orgs));
        Collector::new(kind, api, directory, users(team), users(orgs), window())
    }

    fn org_repo() -> RepoId {
        RepoId::new("org", "repo")
    }

    fn single_repo_api() -> FakeApi {
        FakeApi::default().with_repositories(
            Owner::Organization("org".to_string()),
            vec![Repository::new("org", "repo")],
        )
    }

    #[tokio::test]
    async fn test_collect_by_assignee_keeps_only_team_members() {
        let three_days_ago = now() - Duration::days(3);
        let api = single_repo_api().with_issues(
            org_repo(),
            vec![
                raw(1, "carol", Some("alice"), three_days_ago),
                raw(2, "carol", Some("bob"), three_days_ago),
                raw(3, "carol", None, three_days_ago),
            ],
        );
        let collector = collector(ItemKind::Issue, Arc::new(api), &["alice"], &["org"]);

        let grouped = collector.collect_by_assignee(ItemState::Open).await.unwrap();

        assert_eq!(grouped.len(), 1);
        let alice = &grouped["alice"];
        assert_eq!(alice.len(), 1);
        let issue = alice.iter().next().unwrap();
        assert_eq!(issue.number, 1);
        assert_eq!(issue.kind, ItemKind::Issue);
        assert_eq!(issue.repository, org_repo());
    }

    #[tokio::test]
    async fn test_collect_by_assignee_attributes_forks_to_parent() {
        let api = FakeApi::default()
            .with_repositories(
                Owner::User("alice".to_string()),
                vec![Repository::fork_of("alice", "repo", org_repo())],
            )
            .with_pulls(
                org_repo(),
                vec![raw(7, "alice", Some("alice"), now() - Duration::days(1))],
            );
        let api = Arc::new(api);
        let collector = collector(ItemKind::PullRequest, api.clone(), &["alice"], &[]);

        let grouped = collector.collect_by_assignee(ItemState::All).await.unwrap();

        let pr = grouped["alice"].iter().next().unwrap();
        assert_eq!(pr.repository, org_repo());
        assert_eq!(pr.kind, ItemKind::PullRequest);
        assert!(api.calls().contains(&"pulls org/repo all".to_string()));
        assert!(!api.calls().iter().any(|c| c.contains("alice/repo")));
    }

    #[tokio::test]
    async fn test_collect_excludes_items_older_than_retention_floor() {
        let w = window();
        let too_old = w.start - Duration::days(7 * 30);
        let just_inside = w.min_start + Duration::hours(1);
        let api = single_repo_api().with_issues(
            org_repo(),
            vec![
                raw(1, "alice", Some("alice"), too_old),
                raw(2, "alice", Some("alice"), just_inside),
            ],
        );
        let collector = collector(ItemKind::Issue, Arc::new(api), &["alice"], &["org"]);

        let grouped = collector.collect_by_assignee(ItemState::All).await.unwrap();

        let numbers: Vec<u64> = grouped["alice"].iter().map(|i| i.number).collect();
        assert_eq!(numbers, vec![2]);
    }

    #[tokio::test]
    async fn test_old_item_closed_recently_is_kept() {
        let w = window();
        let mut item = raw(4, "alice", Some("alice"), w.min_start - Duration::days(30));
        item.open = false;
        item.closed_at = Some(w.end - Duration::days(2));
        let api = single_repo_api().with_issues(org_repo(), vec![item]);
        let collector = collector(ItemKind::Issue, Arc::new(api), &["alice"], &["org"]);

        let grouped = collector.collect_by_assignee(ItemState::Closed).await.unwrap();
        assert_eq!(grouped["alice"].len(), 1);
    }

    #[tokio::test]
    async fn test_collect_by_assignee_fails_without_partial_result() {
        let recent = now() - Duration::days(2);
        let repos: Vec<Repository> = (1..=5)
            .map(|i| Repository::new("org", format!("repo{}", i)))
            .collect();
        let mut api = FakeApi::default()
            .with_repositories(Owner::Organization("org".to_string()), repos)
            .failing_on(RepoId::new("org", "repo3"));
        for i in [1, 2, 4, 5] {
            api = api.with_issues(
                RepoId::new("org", format!("repo{}", i)),
                vec![raw(i, "alice", Some("alice"), recent)],
            );
        }
        let api = Arc::new(api);
        let collector = collector(ItemKind::Issue, api.clone(), &["alice"], &["org"]);

        let err = collector
            .collect_by_assignee(ItemState::All)
            .await
            .unwrap_err();

        assert!(err.target().contains("org/repo3"));
        assert!(err.cause().to_string().contains("connection reset"));
        // Nothing past the failing repository is queried.
        assert!(!api.calls().iter().any(|c| c.contains("org/repo4")));
    }

    #[tokio::test]
    async fn test_directory_failure_aborts_collection() {
        struct Broken;

        #[async_trait::async_trait]
        impl HostingApi for Broken {
            async fn list_repositories(&self, _owner: &Owner) -> anyhow::Result<Vec<Repository>> {
                Err(anyhow::anyhow!("rate limited"))
            }
            async fn list_issues(&self, _: &RepoId, _: ItemState) -> anyhow::Result<Vec<RawItem>> {
                Ok(vec![])
            }
            async fn list_pull_requests(
                &self,
                _: &RepoId,
                _: ItemState,
            ) -> anyhow::Result<Vec<RawItem>> {
                Ok(vec![])
            }
        }

        let collector = collector(ItemKind::Issue, Arc::new(Broken), &["alice"], &[]);
        let err = collector.refresh().await.unwrap_err();
        assert!(err.target().contains("user alice"));
    }

    #[tokio::test]
    async fn test_duplicate_items_collapse() {
        let recent = now() - Duration::days(1);
        let api = single_repo_api().with_issues(
            org_repo(),
            vec![
                raw(1, "alice", Some("alice"), recent),
                raw(1, "alice", Some("alice"), recent),
            ],
        );
        let collector = collector(ItemKind::Issue, Arc::new(api), &["alice"], &["org"]);

        let grouped = collector.collect_by_assignee(ItemState::All).await.unwrap();
        assert_eq!(grouped["alice"].len(), 1);
    }

    #[tokio::test]
    async fn test_collect_by_creator_groups_by_opener() {
        let recent = now() - Duration::days(1);
        let api = FakeApi::default().with_issues(
            org_repo(),
            vec![
                raw(1, "carol", Some("alice"), recent),
                raw(2, "dave", Some("bob"), recent),
                raw(3, "carol", Some("bob"), recent),
                raw(4, "erin", Some("mallory"), recent),
            ],
        );
        let collector = collector(ItemKind::Issue, Arc::new(api), &["alice", "bob"], &[]);

        let grouped = collector
            .collect_by_creator(&org_repo(), ItemState::All)
            .await
            .unwrap();

        assert_eq!(grouped.keys().collect::<Vec<_>>(), vec!["carol", "dave"]);
        assert_eq!(grouped["carol"].len(), 2);
    }

    #[tokio::test]
    async fn test_collect_by_user_resolves_fork_and_skips_membership() {
        let recent = now() - Duration::days(1);
        let api = FakeApi::default().with_pulls(
            org_repo(),
            vec![
                raw(10, "zoe", None, recent),
                raw(11, "carol", Some("zoe"), recent),
                raw(12, "carol", Some("alice"), recent),
                raw(13, "carol", None, window().min_start - Duration::days(1)),
            ],
        );
        let api = Arc::new(api);
        let collector = collector(ItemKind::PullRequest, api.clone(), &["alice"], &[]);
        let fork = Repository::fork_of("zoe", "repo", org_repo());

        let items = collector
            .collect_by_user("zoe", &fork, ItemState::Open)
            .await
            .unwrap();

        let mut numbers: Vec<u64> = items.iter().map(|i| i.number).collect();
        numbers.sort();
        assert_eq!(numbers, vec![10, 11, 12]);
        assert!(items.iter().all(|i| i.repository == org_repo()));
        assert_eq!(api.calls(), vec!["pulls org/repo open"]);
    }

    #[tokio::test]
    async fn test_collect_by_user_returns_items_of_any_actor() {
        let api = FakeApi::default().with_issues(
            org_repo(),
            vec![raw(20, "carol", Some("alice"), now() - Duration::days(2))],
        );
        let collector = collector(ItemKind::Issue, Arc::new(api), &["alice"], &[]);

        let items = collector
            .collect_by_user("zoe", &Repository::new("org", "repo"), ItemState::All)
            .await
            .unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items.iter().next().unwrap().creator, "carol");
    }

    #[tokio::test]
    async fn test_collect_by_user_uses_own_id_for_orphan_fork() {
        let api = Arc::new(FakeApi::default());
        let collector = collector(ItemKind::Issue, api.clone(), &["alice"], &[]);
        let orphan = Repository {
            parent: None,
            ..Repository::fork_of("zoe", "repo", org_repo())
        };

        collector
            .collect_by_user("zoe", &orphan, ItemState::All)
            .await
            .unwrap();
        assert_eq!(api.calls(), vec!["issues zoe/repo all"]);
    }

    #[tokio::test]
    async fn test_refresh_builds_report() {
        let api = single_repo_api().with_issues(
            org_repo(),
            vec![raw(1, "alice", Some("alice"), now() - Duration::days(1))],
        );
        let collector = collector(ItemKind::Issue, Arc::new(api), &["alice"], &["org"]);

        let report = collector.refresh().await.unwrap();

        assert_eq!(report.kind, ItemKind::Issue);
        assert_eq!(report.state, ItemState::All);
        assert_eq!(report.window, window());
        assert_eq!(report.items().count(), 1);
        assert_eq!(collector.start_time(), window().start);
        assert_eq!(collector.end_time(), window().end);
    }
}
