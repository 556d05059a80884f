use std::{collections::BTreeMap, fmt::Display, sync::Arc};

use anyhow::{bail, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};

/// A single change event attributed to exactly one project. Records are created by the history
/// ingestion and are never modified afterwards.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Clone)]
pub struct CommitRecord {
    pub project: Arc<str>,
    pub revision_id: Arc<str>,
    pub changeset_id: Arc<str>,
    pub timestamp: NaiveDateTime,
    pub summary: Arc<str>,
}

impl CommitRecord {
    pub fn new(
        project: impl Into<Arc<str>>,
        revision_id: impl Into<Arc<str>>,
        changeset_id: impl Into<Arc<str>>,
        timestamp: NaiveDateTime,
        summary: impl Into<Arc<str>>,
    ) -> Result<Self> {
        let project = project.into();
        if project.trim().is_empty() {
            bail!("Commit {timestamp} has an empty project label");
        }
        let summary = summary.into();
        if summary.trim().is_empty() {
            bail!("Commit {timestamp} of {project} has an empty summary");
        }
        Ok(Self {
            project,
            revision_id: revision_id.into(),
            changeset_id: changeset_id.into(),
            timestamp,
            summary,
        })
    }

    /// Line used in the comments column of a report.
    pub fn comment(&self) -> String {
        format!("[{}] {}", self.project, self.summary)
    }
}

/// Longest workday accepted from the configuration or the review prompt.
pub const MAX_WORKDAY_LENGTH: f64 = 24.;

pub fn is_valid_workday_length(hours: f64) -> bool {
    hours.is_finite() && hours > 0. && hours <= MAX_WORKDAY_LENGTH
}

/// Parameters that govern the timetable of one day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayWindow {
    pub day_start: NaiveDateTime,
    pub workday_length: f64,
    pub truncate: bool,
}

impl DayWindow {
    pub fn new(day_start: NaiveDateTime, workday_length: f64, truncate: bool) -> Self {
        Self {
            day_start,
            workday_length,
            truncate,
        }
    }

    /// Lengths outside of `[-MAX_WORKDAY_LENGTH, MAX_WORKDAY_LENGTH]` are clamped to it.
    pub fn day_end(&self) -> NaiveDateTime {
        let hours = self
            .workday_length
            .clamp(-MAX_WORKDAY_LENGTH, MAX_WORKDAY_LENGTH);
        let length = hours_to_duration(hours);
        self.day_start
            .checked_add_signed(length)
            .unwrap_or(if hours < 0. {
                NaiveDateTime::MIN
            } else {
                NaiveDateTime::MAX
            })
    }
}

impl Display for DayWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Start day at {}", self.day_start.format("%Y-%m-%d %H:%M"))?;
        writeln!(f, "Day length is {}", self.workday_length)?;
        if self.truncate {
            write!(f, "We truncate to the day length")
        } else {
            write!(f, "We do not truncate to the day length")
        }
    }
}

fn hours_to_duration(hours: f64) -> Duration {
    Duration::microseconds((hours * 3_600_000_000.0).round() as i64)
}

/// Hours spent per project during a day. Ordered by project name so that printing and
/// comparisons are stable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectHours(BTreeMap<Arc<str>, f64>);

impl ProjectHours {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, project: &str) -> Option<f64> {
        self.0.get(project).copied()
    }

    pub fn total(&self) -> f64 {
        self.0.values().fold(0., |total, hours| total + hours)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Arc<str>, f64)> {
        self.0.iter().map(|(k, v)| (k, *v))
    }

    /// Returns the mapping with `hours` added to `project`, creating the entry if needed.
    pub fn with_added(mut self, project: &Arc<str>, hours: f64) -> Self {
        *self.0.entry(project.clone()).or_insert(0.) += hours;
        self
    }

    /// Rescales every entry proportionally when the total exceeds `limit`, so that the new total
    /// equals `limit`. Mappings at or below the limit are returned unchanged.
    pub fn truncated_to(self, limit: f64) -> Self {
        let total = self.total();
        if total <= limit {
            return self;
        }
        Self(
            self.0
                .into_iter()
                .map(|(project, value)| (project, value / total * limit))
                .collect(),
        )
    }
}

impl<K: Into<Arc<str>>> FromIterator<(K, f64)> for ProjectHours {
    fn from_iter<T: IntoIterator<Item = (K, f64)>>(iter: T) -> Self {
        iter.into_iter()
            .fold(Self::new(), |hours, (project, value)| {
                hours.with_added(&project.into(), value)
            })
    }
}

impl Display for ProjectHours {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (index, (project, hours)) in self.0.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{project}: {hours:.2}")?;
        }
        write!(f, "}}")
    }
}

/// Everything that ends up in a single row of the report.
#[derive(Debug, Clone, PartialEq)]
pub struct DayReport {
    pub date: NaiveDate,
    pub project_hours: ProjectHours,
    pub comments: Vec<String>,
}

impl DayReport {
    /// `commits` are expected to be the commits of `date`. Comments follow chronological order.
    pub fn new(date: NaiveDate, project_hours: ProjectHours, commits: &[CommitRecord]) -> Self {
        let mut ordered = commits.iter().collect::<Vec<_>>();
        ordered.sort_by_key(|commit| commit.timestamp);
        Self {
            date,
            project_hours,
            comments: ordered.into_iter().map(CommitRecord::comment).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

    use super::{is_valid_workday_length, CommitRecord, DayReport, DayWindow, ProjectHours};

    const TEST_DATE: NaiveDate = NaiveDate::from_ymd_opt(2014, 3, 5).unwrap();

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDateTime::new(TEST_DATE, NaiveTime::from_hms_opt(hour, minute, 0).unwrap())
    }

    #[test]
    fn empty_project_is_rejected() {
        assert!(CommitRecord::new("  ", "1", "1:aa", at(10, 0), "summary").is_err());
    }

    #[test]
    fn empty_summary_is_rejected() {
        assert!(CommitRecord::new("core", "1", "1:aa", at(10, 0), "").is_err());
        assert!(CommitRecord::new("core", "1", "1:aa", at(10, 0), " \t").is_err());
    }

    #[test]
    fn day_end_supports_fractional_hours() {
        let window = DayWindow::new(at(9, 0), 7.5, false);
        assert_eq!(window.day_end(), at(16, 30));
    }

    #[test]
    fn huge_workday_ends_a_day_later() {
        let window = DayWindow::new(at(9, 0), 3e9, false);
        assert_eq!(window.day_end(), at(9, 0) + chrono::Days::new(1));

        let window = DayWindow::new(at(9, 0), f64::INFINITY, false);
        assert_eq!(window.day_end(), at(9, 0) + chrono::Days::new(1));
    }

    #[test]
    fn workday_length_bounds() {
        assert!(is_valid_workday_length(7.5));
        assert!(is_valid_workday_length(24.));
        assert!(!is_valid_workday_length(24.5));
        assert!(!is_valid_workday_length(0.));
        assert!(!is_valid_workday_length(f64::NAN));
    }

    #[test]
    fn truncation_keeps_shares() {
        let hours: ProjectHours = [("A", 6.), ("B", 8.)].into_iter().collect();
        let truncated = hours.truncated_to(8.);
        assert!((truncated.total() - 8.).abs() < 1e-9);
        assert!((truncated.get("A").unwrap() - 6. / 14. * 8.).abs() < 1e-9);
        assert_eq!(format!("{truncated}"), "{A: 3.43, B: 4.57}");
    }

    #[test]
    fn comments_are_chronological() -> Result<()> {
        let commits = [
            CommitRecord::new("web", "2", "2:bb", at(12, 0), "later")?,
            CommitRecord::new("core", "1", "1:aa", at(10, 0), "earlier")?,
        ];
        let report = DayReport::new(TEST_DATE, ProjectHours::new(), &commits);
        assert_eq!(report.comments, vec!["[core] earlier", "[web] later"]);
        Ok(())
    }
}
