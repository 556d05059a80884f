use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDateTime;
use tokio::process::Command;
use tracing::{debug, instrument};

use super::{keep_parsed, Changeset};

const FIELD_SEPARATOR: char = '\u{1f}';
const GIT_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Runs `git log` inside `repository` and parses its output. Dates are taken in the author's own
/// timezone, same as with mercurial.
#[instrument]
pub async fn load_history(repository: &Path) -> Result<Vec<Changeset>> {
    let output = Command::new("git")
        .arg("log")
        .arg("--all")
        .arg("--format=%H%x1f%h%x1f%an <%ae>%x1f%ad%x1f%s")
        .arg("--date=format:%Y-%m-%dT%H:%M:%S")
        .current_dir(repository)
        .output()
        .await
        .with_context(|| format!("Failed to run git in {repository:?}"))?;

    if !output.status.success() {
        bail!(
            "git log failed in {repository:?} with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let changesets = keep_parsed(parse_log(&stdout), repository);
    debug!("Parsed {} commits", changesets.len());
    Ok(changesets)
}

/// Parses `git log` output where each line is
/// `full hash \x1f short hash \x1f author \x1f date \x1f subject`.
pub fn parse_log(output: &str) -> Vec<Result<Changeset>> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_line)
        .collect()
}

fn parse_line(line: &str) -> Result<Changeset> {
    let mut fields = line.splitn(5, FIELD_SEPARATOR);
    let mut next = |name: &'static str| {
        fields
            .next()
            .map(str::trim)
            .ok_or_else(|| anyhow!("Missing {name} in {line:?}"))
    };
    let changeset_id = next("hash")?.to_string();
    let revision_id = next("short hash")?.to_string();
    let user = next("author")?.to_string();
    let date = next("date")?;
    let summary = next("subject")?.to_string();

    let timestamp = NaiveDateTime::parse_from_str(date, GIT_DATE_FORMAT)
        .with_context(|| format!("Commit {changeset_id} has a malformed date {date:?}"))?;

    Ok(Changeset {
        revision_id,
        changeset_id,
        user,
        timestamp,
        summary,
    })
}
