//! Turns the commits of a single day into hours per project.
//!
//! The day is split into intervals `(day_start, commit1), (commit1, commit2), ... (commitN,
//! day_end)`. Each interval is attributed to the project of the commit that closes it, and the
//! last interval is attributed to the last commit's project, assuming work on it continued until
//! the end of the workday. Only hours and minutes take part in the arithmetic.

pub mod entities;

use std::sync::Arc;

use chrono::{NaiveDateTime, Timelike};

use entities::{CommitRecord, DayWindow, ProjectHours};

/// Computes the timetable for a day. `commits` must all belong to the day of
/// `window.day_start` and may come in any order.
pub fn compute_day_timetable(commits: &[CommitRecord], window: &DayWindow) -> ProjectHours {
    let intervals = attributed_intervals(commits, window);
    let hours = intervals
        .iter()
        .fold(ProjectHours::new(), |hours, interval| {
            hours.with_added(&interval.project, interval.minutes as f64 / 60.)
        });

    if window.truncate {
        hours.truncated_to(window.workday_length)
    } else {
        hours
    }
}

/// An interval that ends earlier (by time of day) than it starts. These add negative hours to
/// their project, which usually means a commit was made before the workday started or the
/// workday spans midnight.
#[derive(Debug, Clone, PartialEq)]
pub struct BackwardsSegment {
    pub project: Arc<str>,
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
    pub minutes: i64,
}

/// Lists every interval of the day with negative duration. The arithmetic of
/// [compute_day_timetable] is not affected; this exists so that callers can warn about it.
pub fn find_backwards_segments(
    commits: &[CommitRecord],
    window: &DayWindow,
) -> Vec<BackwardsSegment> {
    attributed_intervals(commits, window)
        .into_iter()
        .filter(|interval| interval.minutes < 0)
        .map(|interval| BackwardsSegment {
            project: interval.project,
            from: interval.from,
            to: interval.to,
            minutes: interval.minutes,
        })
        .collect()
}

struct Interval {
    project: Arc<str>,
    from: NaiveDateTime,
    to: NaiveDateTime,
    minutes: i64,
}

impl Interval {
    fn new(project: Arc<str>, from: NaiveDateTime, to: NaiveDateTime) -> Self {
        Self {
            minutes: minutes_of_day(to) - minutes_of_day(from),
            project,
            from,
            to,
        }
    }
}

fn attributed_intervals(commits: &[CommitRecord], window: &DayWindow) -> Vec<Interval> {
    let mut sorted = commits.iter().collect::<Vec<_>>();
    // Ties are ordered by project so that the last commit does not depend on input order.
    sorted.sort_by(|a, b| {
        (a.timestamp, &a.project, &a.revision_id).cmp(&(b.timestamp, &b.project, &b.revision_id))
    });

    let mut current_time = window.day_start;
    let mut intervals = Vec::with_capacity(sorted.len() + 1);
    for commit in &sorted {
        intervals.push(Interval::new(
            commit.project.clone(),
            current_time,
            commit.timestamp,
        ));
        current_time = commit.timestamp;
    }

    let day_end = window.day_end();
    match sorted.last() {
        Some(last) if current_time < day_end => {
            intervals.push(Interval::new(last.project.clone(), current_time, day_end));
        }
        Some(_) | None => {}
    }

    intervals
}

fn minutes_of_day(time: NaiveDateTime) -> i64 {
    time.hour() as i64 * 60 + time.minute() as i64
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

    use super::{compute_day_timetable, entities::CommitRecord, find_backwards_segments};
    use crate::timetable::entities::DayWindow;

    const TEST_DATE: NaiveDate = NaiveDate::from_ymd_opt(2014, 3, 5).unwrap();

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        at_seconds(hour, minute, 0)
    }

    fn at_seconds(hour: u32, minute: u32, second: u32) -> NaiveDateTime {
        NaiveDateTime::new(
            TEST_DATE,
            NaiveTime::from_hms_opt(hour, minute, second).unwrap(),
        )
    }

    fn commit(project: &str, time: NaiveDateTime) -> CommitRecord {
        CommitRecord::new(project, "0", "0:000000", time, format!("work on {project}")).unwrap()
    }

    fn window(truncate: bool) -> DayWindow {
        DayWindow::new(at(9, 0), 8., truncate)
    }

    fn assert_close(left: f64, right: f64) {
        assert!((left - right).abs() < 1e-9, "{left} != {right}");
    }

    #[test]
    fn attributes_intervals_to_closing_commit() {
        let commits = [commit("P1", at(10, 0)), commit("P2", at(12, 0))];

        let hours = compute_day_timetable(&commits, &window(false));

        assert_eq!(hours.len(), 2);
        assert_close(hours.get("P1").unwrap(), 1.);
        assert_close(hours.get("P2").unwrap(), 7.);
    }

    #[test]
    fn empty_day_is_empty_regardless_of_truncation() {
        assert!(compute_day_timetable(&[], &window(false)).is_empty());
        assert!(compute_day_timetable(&[], &window(true)).is_empty());
    }

    #[test]
    fn single_commit_at_day_start_takes_whole_day() {
        let hours = compute_day_timetable(&[commit("P1", at(9, 0))], &window(false));

        assert_close(hours.get("P1").unwrap(), 8.);
        assert_eq!(hours.len(), 1);
    }

    #[test]
    fn oversized_workday_does_not_overflow() {
        let window = DayWindow::new(at(9, 0), 3e9, true);
        let hours = compute_day_timetable(&[commit("P1", at(10, 0))], &window);

        assert_eq!(hours.len(), 1);
        assert!(hours.get("P1").unwrap().is_finite());
    }

    #[test]
    fn input_order_does_not_matter() {
        let commits = vec![
            commit("A", at(11, 15)),
            commit("B", at(9, 40)),
            commit("C", at(14, 5)),
            commit("A", at(14, 5)),
            commit("B", at(18, 30)),
        ];
        let expected = compute_day_timetable(&commits, &window(true));

        let mut reversed = commits.clone();
        reversed.reverse();
        assert_eq!(compute_day_timetable(&reversed, &window(true)), expected);

        let mut rotated = commits.clone();
        rotated.rotate_left(2);
        assert_eq!(compute_day_timetable(&rotated, &window(true)), expected);
    }

    #[test]
    fn untruncated_total_matches_elapsed_time() {
        // Last commit is after the day end so there is no extension.
        let commits = [
            commit("A", at(10, 30)),
            commit("B", at(13, 0)),
            commit("A", at(19, 45)),
        ];

        let hours = compute_day_timetable(&commits, &window(false));

        assert_close(hours.total(), (19. * 60. + 45. - 9. * 60.) / 60.);
        assert_close(hours.get("A").unwrap(), 1.5 + 6.75);
        assert_close(hours.get("B").unwrap(), 2.5);
    }

    #[test]
    fn truncation_normalizes_total_and_keeps_shares() {
        let commits = [commit("A", at(15, 0)), commit("B", at(23, 0))];

        let raw = compute_day_timetable(&commits, &window(false));
        let truncated = compute_day_timetable(&commits, &window(true));

        assert_close(raw.get("A").unwrap(), 6.);
        assert_close(raw.get("B").unwrap(), 8.);
        assert_close(truncated.total(), 8.);
        for (project, value) in truncated.iter() {
            assert_close(value / 8., raw.get(project).unwrap() / raw.total());
        }
        assert_eq!(format!("{truncated}"), "{A: 3.43, B: 4.57}");
    }

    #[test]
    fn no_truncation_below_limit() {
        let commits = [commit("A", at(10, 0)), commit("B", at(11, 0))];
        let short_day = DayWindow::new(at(9, 0), 2., true);

        let hours = compute_day_timetable(&commits, &short_day);

        assert_eq!(
            hours,
            compute_day_timetable(&commits, &DayWindow::new(at(9, 0), 2., false))
        );
        assert_close(hours.total(), 2.);
    }

    #[test]
    fn seconds_are_ignored() {
        let commits = [commit("A", at_seconds(10, 0, 59)), commit("B", at_seconds(10, 30, 1))];

        let hours = compute_day_timetable(&commits, &window(false));

        assert_close(hours.get("A").unwrap(), 1.);
        assert_close(hours.get("B").unwrap(), 0.5 + 6.5);
    }

    #[test]
    fn commit_before_day_start_goes_negative() -> Result<()> {
        let commits = [commit("A", at(8, 0)), commit("B", at(10, 0))];

        let hours = compute_day_timetable(&commits, &window(false));

        assert_close(hours.get("A").unwrap(), -1.);
        assert_close(hours.get("B").unwrap(), 2. + 7.);

        let backwards = find_backwards_segments(&commits, &window(false));
        assert_eq!(backwards.len(), 1);
        assert_eq!(&*backwards[0].project, "A");
        assert_eq!(backwards[0].minutes, -60);
        Ok(())
    }

    #[test]
    fn workday_past_midnight_is_reported() {
        let late = DayWindow::new(at(20, 0), 8., false);
        let commits = [commit("A", at(21, 0))];

        let hours = compute_day_timetable(&commits, &late);

        // 21:00 -> 04:00 compared by time of day only.
        assert_close(hours.get("A").unwrap(), 1. - 17.);
        assert_eq!(find_backwards_segments(&commits, &late).len(), 1);
    }
}
