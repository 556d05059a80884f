//! Retrieval of commit history. A [HistorySource] lists the raw changesets of a repository, and
//! [collect_history] turns those into [CommitRecord]s belonging to the configured projects.

pub mod git;
pub mod mercurial;

use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use futures::{stream, StreamExt, TryStreamExt};
use tracing::{debug, instrument, warn};

use crate::{
    config::{ProjectConfig, Vcs},
    timetable::entities::CommitRecord,
};

#[cfg(test)]
use mockall::automock;

/// A changeset as reported by version control, before it's attributed to a project.
#[derive(Debug, Clone, PartialEq)]
pub struct Changeset {
    pub revision_id: String,
    pub changeset_id: String,
    pub user: String,
    pub timestamp: NaiveDateTime,
    pub summary: String,
}

/// Interface for abstracting version control backends.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Lists every changeset of the repository located at `repository`.
    async fn changesets(&self, repository: &Path, vcs: Vcs) -> Result<Vec<Changeset>>;
}

/// The main realization of [HistorySource]. Shells out to `hg` or `git`.
pub struct CommandHistorySource;

#[async_trait]
impl HistorySource for CommandHistorySource {
    async fn changesets(&self, repository: &Path, vcs: Vcs) -> Result<Vec<Changeset>> {
        match vcs {
            Vcs::Hg => mercurial::load_history(repository).await,
            Vcs::Git => git::load_history(repository).await,
        }
    }
}

/// Both bounds are exclusive.
#[derive(Debug, Clone, Copy)]
pub struct HistoryRange {
    pub after: NaiveDateTime,
    pub before: NaiveDateTime,
}

impl HistoryRange {
    pub fn contains(&self, time: NaiveDateTime) -> bool {
        self.after < time && time < self.before
    }
}

/// Loads history of every project, keeping changesets made by the project's users inside
/// `range`. Repositories are queried concurrently.
#[instrument(skip(source, projects))]
pub async fn collect_history(
    source: &impl HistorySource,
    projects: &[ProjectConfig],
    range: HistoryRange,
) -> Result<Vec<CommitRecord>> {
    let per_project = stream::iter(projects)
        .map(|project| async move {
            let changesets = source
                .changesets(&project.path, project.vcs)
                .await
                .with_context(|| format!("Failed to load history of {}", project.name))?;
            debug!(
                "Loaded {} changesets for {}",
                changesets.len(),
                project.name
            );
            Ok::<_, anyhow::Error>(attribute_to_project(project, changesets, range))
        })
        .buffered(4)
        .try_collect::<Vec<_>>()
        .await?;

    let mut history = per_project.into_iter().flatten().collect::<Vec<_>>();
    history.sort_by_key(|commit| commit.timestamp);
    Ok(history)
}

fn attribute_to_project(
    project: &ProjectConfig,
    changesets: Vec<Changeset>,
    range: HistoryRange,
) -> Vec<CommitRecord> {
    let name: Arc<str> = project.name.as_str().into();
    changesets
        .into_iter()
        .filter(|changeset| project.users.iter().any(|user| *user == changeset.user))
        .filter(|changeset| range.contains(changeset.timestamp))
        .filter_map(|changeset| {
            CommitRecord::new(
                name.clone(),
                changeset.revision_id,
                changeset.changeset_id,
                changeset.timestamp,
                changeset.summary,
            )
            .inspect_err(|e| warn!("Rejected changeset of {}: {e}", project.name))
            .ok()
        })
        .collect()
}

/// Returns the commits made during `date`.
pub fn commits_for_day(history: &[CommitRecord], date: NaiveDate) -> Vec<CommitRecord> {
    history
        .iter()
        .filter(|commit| commit.timestamp.date() == date)
        .cloned()
        .collect()
}

/// Drops changesets that couldn't be parsed, warning about each of them.
pub(crate) fn keep_parsed(
    parsed: impl IntoIterator<Item = Result<Changeset>>,
    repository: &Path,
) -> Vec<Changeset> {
    parsed
        .into_iter()
        .filter_map(|v| {
            v.inspect_err(|e| warn!("Skipping changeset in {repository:?}: {e}"))
                .ok()
        })
        .collect()
}
