//! Review of a day's timetable before it's written. The review is driven by [DayCommand]s applied
//! to a [DayReview]; every change of the window recomputes the timetable.

use std::io::Write;

use ansi_term::Colour;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{info, warn};

use crate::{
    timetable::{
        compute_day_timetable,
        entities::{is_valid_workday_length, CommitRecord, DayWindow, ProjectHours},
        find_backwards_segments, BackwardsSegment,
    },
    utils::time::{compose_date, is_workday, parse_day_start, weekday_name},
};

use super::shortcuts::{ManualInput, ShortcutTable};

#[derive(Debug, Clone, PartialEq)]
pub enum DayCommand {
    Accept,
    SetDayStart(NaiveTime),
    SetWorkdayLength(f64),
    SetTruncation(bool),
    ManualOverride(ProjectHours),
    ShowConfig,
    Exit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReviewOutcome {
    Accepted(ProjectHours),
    Exit,
}

/// Draft of a single day. Hours are either computed from the window or set manually; a manual
/// timetable is dropped as soon as the window changes.
#[derive(Debug, Clone)]
pub struct DayReview {
    date: NaiveDate,
    commits: Vec<CommitRecord>,
    window: DayWindow,
    manual: Option<ProjectHours>,
    computed: ProjectHours,
}

impl DayReview {
    pub fn new(date: NaiveDate, commits: Vec<CommitRecord>, window: DayWindow) -> Self {
        let computed = compute_day_timetable(&commits, &window);
        Self {
            date,
            commits,
            window,
            manual: None,
            computed,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn window(&self) -> &DayWindow {
        &self.window
    }

    pub fn commits(&self) -> &[CommitRecord] {
        &self.commits
    }

    pub fn hours(&self) -> &ProjectHours {
        self.manual.as_ref().unwrap_or(&self.computed)
    }

    /// Weekday that has nothing in its timetable.
    pub fn looks_missing(&self) -> bool {
        self.hours().is_empty() && is_workday(self.date)
    }

    pub fn backwards_segments(&self) -> Vec<BackwardsSegment> {
        find_backwards_segments(&self.commits, &self.window)
    }

    /// Applies `command`, returning the outcome once the review is over.
    pub fn apply(&mut self, command: DayCommand) -> Option<ReviewOutcome> {
        match command {
            DayCommand::Accept => return Some(ReviewOutcome::Accepted(self.hours().clone())),
            DayCommand::Exit => return Some(ReviewOutcome::Exit),
            DayCommand::ShowConfig => return None,
            DayCommand::ManualOverride(hours) => {
                self.manual = Some(hours);
                return None;
            }
            DayCommand::SetDayStart(time) => {
                self.window.day_start = compose_date(self.date, time);
            }
            DayCommand::SetWorkdayLength(length) => {
                self.window.workday_length = length;
            }
            DayCommand::SetTruncation(truncate) => {
                self.window.truncate = truncate;
            }
        }
        self.manual = None;
        self.computed = compute_day_timetable(&self.commits, &self.window);
        None
    }
}

/// Decides what ends up in the report for a day.
#[async_trait]
pub trait DayReviewer: Send {
    async fn review(&mut self, review: DayReview) -> Result<ReviewOutcome>;
}

/// Accepts every computed timetable.
pub struct SilentReviewer;

#[async_trait]
impl DayReviewer for SilentReviewer {
    async fn review(&mut self, mut review: DayReview) -> Result<ReviewOutcome> {
        info!("Timetable for {}: {}", review.date(), review.hours());
        Ok(review
            .apply(DayCommand::Accept)
            .unwrap_or(ReviewOutcome::Exit))
    }
}

const MENU: &str = "[A]gree. [E]xit. Change [S]tart of the day. Change workday [L]ength. Change \
                    [T]runcation to workday rule. [M]anually set a timetable for this day. Show \
                    current [C]onfiguration.";

/// Asks the user about every day through a console. End of input counts as exit.
pub struct ConsoleReviewer<R, W> {
    input: Lines<R>,
    output: W,
    shortcuts: ShortcutTable,
}

impl ConsoleReviewer<BufReader<Stdin>, std::io::Stdout> {
    pub fn stdio(shortcuts: ShortcutTable) -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), std::io::stdout(), shortcuts)
    }
}

impl<R: AsyncBufRead + Unpin + Send, W: Write + Send> ConsoleReviewer<R, W> {
    pub fn new(input: R, output: W, shortcuts: ShortcutTable) -> Self {
        Self {
            input: input.lines(),
            output,
            shortcuts,
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    async fn ask(&mut self, question: &str) -> Result<Option<String>> {
        writeln!(self.output, "{question}")?;
        self.output.flush()?;
        Ok(self
            .input
            .next_line()
            .await?
            .map(|line| line.trim().to_string()))
    }

    fn warn(&mut self, message: &str) -> Result<()> {
        warn!("{message}");
        writeln!(self.output, "{}", Colour::Yellow.paint(message))?;
        Ok(())
    }

    fn print_day(&mut self, review: &DayReview) -> Result<()> {
        writeln!(self.output)?;
        writeln!(
            self.output,
            "I choose the following configuration for a day {}. This is {}",
            review.date(),
            weekday_name(review.date())
        )?;
        writeln!(self.output, "{}", review.hours())?;

        if review.looks_missing() {
            self.warn("Warning! Looks like a working day, but no commits were found. Please check")?;
        }
        for segment in review.backwards_segments() {
            self.warn(&format!(
                "Warning! {} gets {} minutes between {} and {}",
                segment.project,
                segment.minutes,
                segment.from.format("%H:%M"),
                segment.to.format("%H:%M")
            ))?;
        }
        Ok(())
    }

    /// Reads a command, asking follow-up questions where needed. `None` means there is nothing to
    /// apply and the menu should be shown again.
    async fn next_command(&mut self) -> Result<Option<DayCommand>> {
        let Some(option) = self.ask(MENU).await? else {
            return Ok(Some(DayCommand::Exit));
        };

        let command = match option.to_lowercase().as_str() {
            "a" => DayCommand::Accept,
            "e" => DayCommand::Exit,
            "c" => DayCommand::ShowConfig,
            "s" => {
                let Some(answer) = self.ask("Please enter a proposed workday start.").await? else {
                    return Ok(Some(DayCommand::Exit));
                };
                match parse_day_start(&answer) {
                    Ok(time) => DayCommand::SetDayStart(time),
                    Err(e) => {
                        self.warn(&e.to_string())?;
                        return Ok(None);
                    }
                }
            }
            "l" => {
                let Some(answer) = self.ask("Please enter a proposed workday length.").await?
                else {
                    return Ok(Some(DayCommand::Exit));
                };
                match answer.parse::<f64>() {
                    Ok(length) if is_valid_workday_length(length) => {
                        DayCommand::SetWorkdayLength(length)
                    }
                    _ => {
                        self.warn(&format!("{answer:?} is not a valid number of hours"))?;
                        return Ok(None);
                    }
                }
            }
            "t" => {
                let Some(answer) = self.ask("[E]nable or [D]isable the truncation?").await? else {
                    return Ok(Some(DayCommand::Exit));
                };
                match answer.to_lowercase().as_str() {
                    "e" => DayCommand::SetTruncation(true),
                    "d" => DayCommand::SetTruncation(false),
                    _ => return Ok(None),
                }
            }
            "m" => {
                writeln!(self.output, "Currently supported shortcuts:")?;
                write!(self.output, "{}", self.shortcuts)?;
                writeln!(self.output)?;
                writeln!(
                    self.output,
                    "Example of using shortcuts: 'a3b5'. This will set a project with shortcut a \
                     for 3 hours, and a project with shortcut b for 5 hours. Type 'exit' to exit. \
                     Type 'back' to go back to selection mode."
                )?;
                let Some(answer) = self.ask("Please enter your shortcut string").await? else {
                    return Ok(Some(DayCommand::Exit));
                };
                match self.shortcuts.parse(&answer) {
                    Ok(ManualInput::Exit) => DayCommand::Exit,
                    Ok(ManualInput::Back) => return Ok(None),
                    Ok(ManualInput::Hours(hours)) => DayCommand::ManualOverride(hours),
                    Err(e) => {
                        self.warn(&e.to_string())?;
                        return Ok(None);
                    }
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(command))
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send, W: Write + Send> DayReviewer for ConsoleReviewer<R, W> {
    async fn review(&mut self, mut review: DayReview) -> Result<ReviewOutcome> {
        loop {
            self.print_day(&review)?;
            let Some(command) = self.next_command().await? else {
                continue;
            };
            if command == DayCommand::ShowConfig {
                writeln!(self.output, "{}", review.window())?;
            }
            if let Some(outcome) = review.apply(command) {
                return Ok(outcome);
            }
        }
    }
}
