use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDateTime;
use tokio::process::Command;
use tracing::{debug, instrument};

use super::{keep_parsed, Changeset};

const HG_DATE_FORMAT: &str = "%a %b %d %H:%M:%S %Y";

/// Runs `hg history` inside `repository` and parses its output.
#[instrument]
pub async fn load_history(repository: &Path) -> Result<Vec<Changeset>> {
    let output = Command::new("hg")
        .arg("history")
        .env("HGPLAIN", "1")
        .current_dir(repository)
        .output()
        .await
        .with_context(|| format!("Failed to run hg in {repository:?}"))?;

    if !output.status.success() {
        bail!(
            "hg history failed in {repository:?} with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let changesets = keep_parsed(parse_history(&stdout), repository);
    debug!("Parsed {} changesets", changesets.len());
    Ok(changesets)
}

#[derive(Default)]
struct PendingChangeset {
    changeset: Option<String>,
    user: Option<String>,
    date: Option<String>,
    summary: Option<String>,
}

impl PendingChangeset {
    fn is_empty(&self) -> bool {
        self.changeset.is_none()
            && self.user.is_none()
            && self.date.is_none()
            && self.summary.is_none()
    }

    fn finish(self) -> Result<Changeset> {
        let changeset_id = self.changeset.ok_or_else(|| anyhow!("Missing changeset line"))?;
        let revision_id = changeset_id
            .split_once(':')
            .map(|(revision, _)| revision.trim().to_string())
            .ok_or_else(|| anyhow!("Changeset {changeset_id:?} has no revision number"))?;
        let user = self
            .user
            .ok_or_else(|| anyhow!("Changeset {changeset_id} has no user"))?;
        let date = self
            .date
            .ok_or_else(|| anyhow!("Changeset {changeset_id} has no date"))?;
        let timestamp = parse_hg_date(&date)
            .with_context(|| format!("Changeset {changeset_id} has a malformed date"))?;
        let summary = self
            .summary
            .ok_or_else(|| anyhow!("Changeset {changeset_id} has no summary"))?;

        Ok(Changeset {
            revision_id,
            changeset_id,
            user,
            timestamp,
            summary,
        })
    }
}

/// Parses output of `hg history`. Blocks are separated by empty lines and look like
///
/// ```text
/// changeset:   12:3f9a1c0e2b4d
/// user:        John Doe <john@example.com>
/// date:        Wed Mar 05 10:15:00 2014 +0100
/// summary:     Fix the parser
/// ```
///
/// Other fields (tag, branch, parent) are ignored.
pub fn parse_history(output: &str) -> Vec<Result<Changeset>> {
    let mut changesets = vec![];
    let mut pending = PendingChangeset::default();

    for line in output.lines() {
        if line.trim().is_empty() {
            if !pending.is_empty() {
                changesets.push(std::mem::take(&mut pending).finish());
            }
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim().to_string();
        match key {
            "changeset" => pending.changeset = Some(value),
            "user" => pending.user = Some(value),
            "date" => pending.date = Some(value),
            "summary" => pending.summary = Some(value),
            _ => {}
        }
    }

    if !pending.is_empty() {
        changesets.push(pending.finish());
    }

    changesets
}

/// Dates come with a timezone offset, e.g. `Wed Mar 05 10:15:00 2014 +0100`. The offset is
/// dropped so that the time stays the one the author saw on their clock.
fn parse_hg_date(value: &str) -> Result<NaiveDateTime> {
    let without_offset = match value.rsplit_once(' ') {
        Some((rest, offset)) if offset.starts_with(['+', '-']) => rest,
        _ => value,
    };
    Ok(NaiveDateTime::parse_from_str(
        without_offset.trim(),
        HG_DATE_FORMAT,
    )?)
}
