//! Everything related to the destination table: the layout of its columns, composing a row for a
//! day and the [ReportSink] abstraction over where rows end up.

pub mod file_sheet;

use std::fmt::Display;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    config::{Config, SheetConfig},
    timetable::entities::DayReport,
    utils::time::date_to_cell,
};

/// Value of a single cell. Formulas are stored as text starting with `=`, the same way
/// spreadsheets accept them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Cell {
    #[default]
    Blank,
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Blank => true,
            Cell::Text(text) => text.trim().is_empty(),
            Cell::Number(_) => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(text) => Some(text),
            Cell::Blank | Cell::Number(_) => None,
        }
    }
}

impl Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::Blank => Ok(()),
            Cell::Number(v) => write!(f, "{v}"),
            Cell::Text(v) => write!(f, "{v}"),
        }
    }
}

/// Titles of the fixed columns, as they appear in the header row.
#[derive(Debug, Clone)]
pub struct ColumnNames {
    pub name: String,
    pub date: String,
    pub total: String,
    pub other: String,
    pub comments: Option<String>,
}

impl From<&SheetConfig> for ColumnNames {
    fn from(sheet: &SheetConfig) -> Self {
        Self {
            name: sheet.name_column.clone(),
            date: sheet.date_column.clone(),
            total: sheet.total_column.clone(),
            other: sheet.other_column.clone(),
            comments: sheet.comments_column.clone(),
        }
    }
}

impl ColumnNames {
    /// Header for a brand new sheet: name, date, total, every project, other and comments.
    pub fn default_header(&self, projects: &[String]) -> Vec<String> {
        let mut header = vec![self.name.clone(), self.date.clone(), self.total.clone()];
        header.extend(projects.iter().cloned());
        header.push(self.other.clone());
        header.extend(self.comments.clone());
        header
    }
}

/// Positions of the columns, 1-based like spreadsheet columns.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnLayout {
    pub name: usize,
    pub date: usize,
    pub total: usize,
    pub other: usize,
    pub other_name: String,
    pub comments: Option<usize>,
    /// Project columns in the order they appear in the header.
    pub projects: Vec<(String, usize)>,
}

impl ColumnLayout {
    /// Finds the configured columns in `header`. Projects without a column are skipped, the
    /// fixed columns are required. The comments column is only used when it's both configured and
    /// present.
    pub fn from_header(header: &[String], names: &ColumnNames, projects: &[String]) -> Result<Self> {
        let find = |title: &str| {
            header
                .iter()
                .position(|cell| cell.trim() == title)
                .map(|index| index + 1)
        };
        let require = |title: &str| {
            find(title).ok_or_else(|| anyhow!("Column {title:?} is missing from the sheet header"))
        };

        let project_columns = header
            .iter()
            .enumerate()
            .filter(|(_, cell)| projects.iter().any(|p| p == cell.trim()))
            .map(|(index, cell)| (cell.trim().to_string(), index + 1))
            .collect();

        Ok(Self {
            name: require(names.name.as_str())?,
            date: require(names.date.as_str())?,
            total: require(names.total.as_str())?,
            other: require(names.other.as_str())?,
            other_name: names.other.clone(),
            comments: names.comments.as_deref().and_then(find),
            projects: project_columns,
        })
    }

    pub fn for_config(header: &[String], config: &Config) -> Result<Self> {
        Self::from_header(
            header,
            &ColumnNames::from(&config.sheet),
            &config.project_names(),
        )
    }

    fn row_length(&self) -> usize {
        [self.name, self.date, self.total, self.other]
            .into_iter()
            .chain(self.comments)
            .chain(self.projects.iter().map(|(_, column)| *column))
            .max()
            .unwrap_or(0)
    }

    /// Formula in R1C1 notation that sums project columns and the other column of the same row.
    /// Keeping the total as a formula means later edits of single cells are still summed up.
    fn total_formula(&self) -> String {
        let references = self
            .projects
            .iter()
            .map(|(_, column)| *column)
            .chain([self.other])
            .map(|column| format!("R[0]C[{}]", column as i64 - self.total as i64))
            .collect::<Vec<_>>();
        format!("={}", references.join("+"))
    }
}

fn rounded(hours: f64) -> Cell {
    Cell::Number((hours * 100.).round() / 100.)
}

/// Composes the row describing `report`.
pub fn compose_row(user: &str, report: &DayReport, layout: &ColumnLayout) -> Vec<Cell> {
    let mut row = vec![Cell::Blank; layout.row_length()];

    row[layout.name - 1] = Cell::Text(user.to_string());
    row[layout.date - 1] = Cell::Text(date_to_cell(report.date));
    row[layout.total - 1] = Cell::Text(layout.total_formula());

    for (project, column) in &layout.projects {
        if let Some(hours) = report.project_hours.get(project) {
            row[column - 1] = rounded(hours);
        }
    }
    if let Some(hours) = report.project_hours.get(&layout.other_name) {
        row[layout.other - 1] = rounded(hours);
    }

    if let Some(comments) = layout.comments {
        row[comments - 1] = Cell::Text(report.comments.join("\n"));
    }

    row
}

/// Destination of composed rows. Rows are kept in date order; new ones are only ever appended.
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Titles of the columns.
    async fn header(&self) -> Result<Vec<String>>;

    /// Removes rows at the end of the table that have nothing in `date_column`. Returns how many
    /// rows were removed.
    async fn trim_trailing_blank_rows(&mut self, date_column: usize) -> Result<usize>;

    /// Date of the last row, `None` if the table has no rows besides the header.
    async fn last_date(&self, date_column: usize) -> Result<Option<NaiveDate>>;

    async fn append_row(&mut self, row: Vec<Cell>) -> Result<()>;
}
