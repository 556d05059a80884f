//! A report run: resume after the last day present in the sheet and fill every missing day up to
//! yesterday, one row per day.

pub mod review;
pub mod shortcuts;

use anyhow::{bail, Result};
use chrono::{Days, NaiveDate, NaiveTime};
use tracing::{info, instrument, warn};

use crate::{
    config::Config,
    history::{collect_history, commits_for_day, HistoryRange, HistorySource},
    sheet::{compose_row, ColumnLayout, ReportSink},
    timetable::entities::{DayReport, DayWindow},
    utils::{
        clock::Clock,
        time::{compose_date, is_workday},
    },
};

use review::{DayReview, DayReviewer, ReviewOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub days_written: usize,
    /// The user asked to stop before every day was written.
    pub interrupted: bool,
}

pub struct ReportRunner<H, S, R> {
    history: H,
    sink: S,
    reviewer: R,
    clock: Box<dyn Clock>,
}

impl<H: HistorySource, S: ReportSink, R: DayReviewer> ReportRunner<H, S, R> {
    pub fn new(history: H, sink: S, reviewer: R, clock: Box<dyn Clock>) -> Self {
        Self {
            history,
            sink,
            reviewer,
            clock,
        }
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Fills every day after the last date of the sheet up to yesterday. `first_day` is only used
    /// when the sheet has no dates yet.
    #[instrument(skip(self, config))]
    pub async fn run(&mut self, config: &Config, first_day: Option<NaiveDate>) -> Result<RunSummary> {
        let header = self.sink.header().await?;
        let layout = ColumnLayout::for_config(&header, config)?;
        for project in config.project_names() {
            if !layout.projects.iter().any(|(name, _)| *name == project) {
                warn!("Project {project} has no column in the sheet, its hours won't be written");
            }
        }

        self.sink.trim_trailing_blank_rows(layout.date).await?;

        let start = match (self.sink.last_date(layout.date).await?, first_day) {
            (Some(last), _) => last + Days::new(1),
            (None, Some(first_day)) => first_day,
            (None, None) => bail!("The sheet has no dates yet, please specify the first day to fill"),
        };
        let today = self.clock.today();
        if start >= today {
            info!("Nothing to fill, the sheet is up to date");
            return Ok(RunSummary {
                days_written: 0,
                interrupted: false,
            });
        }

        let range = HistoryRange {
            after: compose_date(start - Days::new(1), NaiveTime::MIN),
            before: compose_date(today, NaiveTime::MIN),
        };
        let history = collect_history(&self.history, &config.projects, range).await?;
        info!(
            "Filling days {start} to {} using {} commits",
            today - Days::new(1),
            history.len()
        );

        let mut days_written = 0;
        for date in start.iter_days().take_while(|date| *date < today) {
            let commits = commits_for_day(&history, date);
            let window = DayWindow::new(
                compose_date(date, config.general.workday_start),
                config.general.workday_length,
                config.general.truncate_to_workday,
            );
            let review = DayReview::new(date, commits.clone(), window);
            if review.hours().is_empty() && is_workday(date) {
                warn!("No commits were found on {date} although it's a working day");
            }
            for segment in review.backwards_segments() {
                warn!(
                    "Negative interval of {} minutes for {} on {date}",
                    segment.minutes, segment.project
                );
            }

            match self.reviewer.review(review).await? {
                ReviewOutcome::Accepted(project_hours) => {
                    let report = DayReport::new(date, project_hours, &commits);
                    let row = compose_row(&config.sheet.user_to_fill, &report, &layout);
                    self.sink.append_row(row).await?;
                    days_written += 1;
                    info!("Written {date}");
                }
                ReviewOutcome::Exit => {
                    info!("Stopped before {date}");
                    return Ok(RunSummary {
                        days_written,
                        interrupted: true,
                    });
                }
            }
        }

        Ok(RunSummary {
            days_written,
            interrupted: false,
        })
    }
}
