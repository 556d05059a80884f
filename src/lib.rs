//! Fills version control history into a daily timesheet.
//! Commits of every day are turned into hours per project, assuming each interval between two
//! commits was spent on the project of the later one, and written as a row of a sheet.
//!

pub mod cli;
pub mod config;
pub mod history;
pub mod report;
pub mod sheet;
pub mod timetable;
pub mod utils;
