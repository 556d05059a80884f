use anyhow::{bail, Result};
use chrono::{Days, NaiveDate, NaiveTime};
use clap::Parser;

use crate::{
    config::Config,
    history::{collect_history, commits_for_day, HistoryRange, HistorySource},
    timetable::{
        compute_day_timetable,
        entities::{CommitRecord, DayWindow, ProjectHours},
    },
    utils::{
        clock::Clock,
        time::{compose_date, parse_human_date, weekday_name},
    },
};

#[derive(Debug, Parser)]
pub struct PreviewCommand {
    #[arg(
        long = "start",
        short,
        help = "First day to preview. Examples are \"yesterday\", \"15/03/2025\", \"2025-03-15\". Defaults to a week ago"
    )]
    start_date: Option<String>,
    #[arg(
        long = "end",
        short,
        help = "Last day to preview, inclusive. Defaults to yesterday"
    )]
    end_date: Option<String>,
    #[arg(long, help = "Override truncation to the workday length")]
    truncate: Option<bool>,
}

const DEFAULT_PREVIEW_DAYS: u64 = 7;

/// Renders the timetable of every day between the dates. Without dates the week ending
/// yesterday is shown.
pub async fn process_preview_command(
    PreviewCommand {
        start_date,
        end_date,
        truncate,
    }: PreviewCommand,
    config: &Config,
    history: &impl HistorySource,
    clock: &dyn Clock,
) -> Result<String> {
    let style = config.general.date_style;
    let end = match end_date {
        Some(v) => parse_human_date(&v, style)?,
        None => clock.today() - Days::new(1),
    };
    let start = match start_date {
        Some(v) => parse_human_date(&v, style)?,
        None => end - Days::new(DEFAULT_PREVIEW_DAYS - 1),
    };
    if start > end {
        bail!("Start {start} is after end {end}");
    }

    let range = HistoryRange {
        after: compose_date(start - Days::new(1), NaiveTime::MIN),
        before: compose_date(end + Days::new(1), NaiveTime::MIN),
    };
    let commits = collect_history(history, &config.projects, range).await?;
    let truncate = truncate.unwrap_or(config.general.truncate_to_workday);

    let mut output = String::new();
    for date in start.iter_days().take_while(|date| *date <= end) {
        let day = commits_for_day(&commits, date);
        let window = DayWindow::new(
            compose_date(date, config.general.workday_start),
            config.general.workday_length,
            truncate,
        );
        let hours = compute_day_timetable(&day, &window);
        output += &format_day(date, &hours, &day);
    }
    Ok(output)
}

fn format_day(date: NaiveDate, hours: &ProjectHours, commits: &[CommitRecord]) -> String {
    let mut output = format!("{date} {}\t{:.2}h\n", weekday_name(date), hours.total());
    for (project, value) in hours.iter() {
        output += &format!("\t{value:.2}h\t{project}\n");
    }
    for commit in commits {
        output += &format!("\t{}\t{}\n", commit.timestamp.format("%H:%M"), commit.comment());
    }
    output
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use anyhow::Result;
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

    use super::{format_day, process_preview_command, PreviewCommand};
    use crate::{
        config::tests::test_config,
        history::{Changeset, MockHistorySource},
        timetable::entities::{CommitRecord, ProjectHours},
        utils::clock::FixedClock,
    };

    // A Wednesday.
    const TEST_DATE: NaiveDate = NaiveDate::from_ymd_opt(2014, 3, 5).unwrap();

    fn at(date: NaiveDate, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDateTime::new(date, NaiveTime::from_hms_opt(hour, minute, 0).unwrap())
    }

    #[test]
    fn formats_a_day() {
        let commit =
            CommitRecord::new("Backend", "1", "1:aa", at(TEST_DATE, 10, 5), "Fix parser").unwrap();
        let hours: ProjectHours = [("Backend", 8.)].into_iter().collect();

        assert_eq!(
            format_day(TEST_DATE, &hours, &[commit]),
            "2014-03-05 Wednesday\t8.00h\n\t8.00h\tBackend\n\t10:05\t[Backend] Fix parser\n"
        );
    }

    #[tokio::test]
    async fn defaults_to_the_week_before_today() -> Result<()> {
        let mut source = MockHistorySource::new();
        source.expect_changesets().returning(|path: &Path, _| {
            if path.ends_with("backend") {
                Ok(vec![Changeset {
                    revision_id: "1".into(),
                    changeset_id: "1:aa".into(),
                    user: "john <john@example.com>".into(),
                    timestamp: at(TEST_DATE, 10, 5),
                    summary: "Fix parser".into(),
                }])
            } else {
                Ok(vec![])
            }
        });
        let command = PreviewCommand {
            start_date: None,
            end_date: None,
            truncate: None,
        };

        let clock = FixedClock(TEST_DATE + chrono::Days::new(1));
        let output = process_preview_command(command, &test_config(), &source, &clock).await?;

        let days = output
            .lines()
            .filter(|line| !line.starts_with('\t'))
            .collect::<Vec<_>>();
        assert_eq!(days.len(), 7);
        assert!(days[0].starts_with("2014-02-27 Thursday"));
        assert_eq!(days[6], "2014-03-05 Wednesday\t8.00h");
        assert!(output.contains("\t10:05\t[Backend] Fix parser"));
        Ok(())
    }
}
