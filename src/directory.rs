use crate::error::CollectionFailure;
use crate::github::HostingApi;
use crate::types::{Owner, RepoId};
use futures::future::try_join_all;
use std::collections::BTreeSet;
use std::sync::Arc;

/// The repositories whose issues and pull requests are reported.
#[derive(Clone)]
pub struct RepositoryDirectory {
    api: Arc<dyn HostingApi>,
    users: BTreeSet<String>,
    organizations: BTreeSet<String>,
}

impl RepositoryDirectory {
    pub fn new(
        api: Arc<dyn HostingApi>,
        users: BTreeSet<String>,
        organizations: BTreeSet<String>,
    ) -> Self {
        Self {
            api,
            users,
            organizations,
        }
    }

    fn owners(&self) -> impl Iterator<Item = Owner> + '_ {
        self.users
            .iter()
            .cloned()
            .map(Owner::User)
            .chain(self.organizations.iter().cloned().map(Owner::Organization))
    }

    /// Reporting identifiers of every repository owned by the configured users and
    /// organizations, sorted and without duplicates.
    ///
    /// Forks are replaced by their parent. A fork whose parent is unknown is left out.
    pub async fn tracked_repositories(&self) -> Result<Vec<RepoId>, CollectionFailure> {
        let listings = try_join_all(self.owners().map(|owner| async move {
            self.api
                .list_repositories(&owner)
                .await
                .map_err(|e| CollectionFailure::new(format!("repositories of {}", owner), e))
        }))
        .await?;

        let tracked: BTreeSet<RepoId> = listings
            .into_iter()
            .flatten()
            .filter_map(|repository| repository.reporting_id())
            .collect();

        tracing::debug!(count = tracked.len(), "Resolved tracked repositories");
        Ok(tracked.into_iter().collect())
    }
}
