//! Configuration of a report run. Everything the engine and the report need is read from a single
//! TOML file:
//!
//! ```toml
//! [general]
//! workday_start = "9:00"
//! workday_length = 8
//! truncate_to_workday = true
//! silent_mode = false
//! date_style = "uk"
//!
//! [sheet]
//! path = "timesheet.jsonl"
//! user_to_fill = "John"
//! name_column = "Name"
//! date_column = "Date"
//! total_column = "Total"
//! other_column = "Other"
//! other_shortcut = "o"
//! comments_column = "Comments"
//!
//! [[projects]]
//! name = "Backend"
//! path = "/home/john/backend"
//! users = ["John Doe <john@example.com>"]
//! shortcut = "b"
//! vcs = "hg"
//! ```

use std::{collections::HashSet, path::{Path, PathBuf}, str::FromStr};

use anyhow::{bail, Context, Result};
use chrono::NaiveTime;
use serde::{Deserialize, Deserializer};

use crate::{
    timetable::entities::{is_valid_workday_length, MAX_WORKDAY_LENGTH},
    utils::time::{parse_day_start, DateStyle},
};

pub const DEFAULT_CONFIG_PATH: &str = "commitsheet.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub general: GeneralConfig,
    pub sheet: SheetConfig,
    #[serde(default)]
    pub projects: Vec<ProjectConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    #[serde(deserialize_with = "deserialize_day_start")]
    pub workday_start: NaiveTime,
    pub workday_length: f64,
    #[serde(default)]
    pub truncate_to_workday: bool,
    #[serde(default)]
    pub silent_mode: bool,
    #[serde(default)]
    pub date_style: DateStyle,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SheetConfig {
    pub path: PathBuf,
    pub user_to_fill: String,
    pub name_column: String,
    pub date_column: String,
    pub total_column: String,
    pub other_column: String,
    pub other_shortcut: String,
    pub comments_column: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vcs {
    #[default]
    #[serde(alias = "mercurial")]
    Hg,
    Git,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    pub path: PathBuf,
    pub users: Vec<String>,
    pub shortcut: String,
    #[serde(default)]
    pub vcs: Vcs,
}

fn deserialize_day_start<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_day_start(&s).map_err(serde::de::Error::custom)
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read configuration {path:?}"))?;
        content
            .parse()
            .with_context(|| format!("Invalid configuration {path:?}"))
    }

    pub fn project_names(&self) -> Vec<String> {
        self.projects.iter().map(|p| p.name.clone()).collect()
    }

    fn validate(&self) -> Result<()> {
        let length = self.general.workday_length;
        if !is_valid_workday_length(length) {
            bail!(
                "workday_length should be a positive number of hours up to {MAX_WORKDAY_LENGTH}, \
                 got {length}"
            );
        }

        let mut names = HashSet::new();
        let mut shortcuts = HashSet::new();
        shortcuts.insert(self.sheet.other_shortcut.as_str());
        for project in &self.projects {
            if project.name.trim().is_empty() {
                bail!("Project names can't be empty");
            }
            if !names.insert(project.name.as_str()) {
                bail!("Project {} is configured twice", project.name);
            }
            if project.shortcut.is_empty() || project.shortcut.chars().any(|c| c.is_ascii_digit()) {
                bail!(
                    "Shortcut {:?} of {} should be non-empty and contain no digits",
                    project.shortcut,
                    project.name
                );
            }
            if !shortcuts.insert(project.shortcut.as_str()) {
                bail!("Shortcut {:?} is used more than once", project.shortcut);
            }
        }
        let mut fixed_columns = vec![
            &self.sheet.name_column,
            &self.sheet.date_column,
            &self.sheet.total_column,
            &self.sheet.other_column,
        ];
        fixed_columns.extend(self.sheet.comments_column.as_ref());
        let mut columns = HashSet::new();
        for column in fixed_columns {
            if names.contains(column.as_str()) {
                bail!("Column {column:?} is both a project and a fixed column of the sheet");
            }
            if !columns.insert(column.as_str()) {
                bail!("Column {column:?} is configured for more than one purpose");
            }
        }
        if self.sheet.other_shortcut.is_empty()
            || self.sheet.other_shortcut.chars().any(|c| c.is_ascii_digit())
        {
            bail!("other_shortcut should be non-empty and contain no digits");
        }
        Ok(())
    }
}

impl FromStr for Config {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::path::PathBuf;

    use anyhow::Result;
    use chrono::NaiveTime;

    use super::{Config, Vcs};
    use crate::utils::time::DateStyle;

    pub const TEST_CONFIG: &str = r#"
        [general]
        workday_start = "9:00"
        workday_length = 8
        truncate_to_workday = true

        [sheet]
        path = "sheet.jsonl"
        user_to_fill = "John"
        name_column = "Name"
        date_column = "Date"
        total_column = "Total"
        other_column = "Other"
        other_shortcut = "o"
        comments_column = "Comments"

        [[projects]]
        name = "Backend"
        path = "/repos/backend"
        users = ["john <john@example.com>"]
        shortcut = "b"

        [[projects]]
        name = "Frontend"
        path = "/repos/frontend"
        users = ["john <john@example.com>", "John Doe"]
        shortcut = "f"
        vcs = "git"
    "#;

    pub fn test_config() -> Config {
        TEST_CONFIG.parse().unwrap()
    }

    #[test]
    fn parses_full_config() -> Result<()> {
        let config: Config = TEST_CONFIG.parse()?;

        assert_eq!(
            config.general.workday_start,
            NaiveTime::from_hms_opt(9, 0, 0).unwrap()
        );
        assert_eq!(config.general.workday_length, 8.);
        assert!(config.general.truncate_to_workday);
        assert!(!config.general.silent_mode);
        assert_eq!(config.general.date_style, DateStyle::Uk);
        assert_eq!(config.sheet.path, PathBuf::from("sheet.jsonl"));
        assert_eq!(config.projects.len(), 2);
        assert_eq!(config.projects[0].vcs, Vcs::Hg);
        assert_eq!(config.projects[1].vcs, Vcs::Git);
        assert_eq!(config.project_names(), vec!["Backend", "Frontend"]);
        Ok(())
    }

    #[test]
    fn rejects_duplicate_shortcuts() {
        let config = TEST_CONFIG.replace("shortcut = \"f\"", "shortcut = \"o\"");
        assert!(config.parse::<Config>().is_err());
    }

    #[test]
    fn rejects_project_named_like_fixed_column() {
        let config = TEST_CONFIG.replace("other_column = \"Other\"", "other_column = \"Backend\"");
        assert!(config.parse::<Config>().is_err());

        let config =
            TEST_CONFIG.replace("comments_column = \"Comments\"", "comments_column = \"Frontend\"");
        assert!(config.parse::<Config>().is_err());

        let config = TEST_CONFIG.replace("total_column = \"Total\"", "total_column = \"Date\"");
        assert!(config.parse::<Config>().is_err());
    }

    #[test]
    fn rejects_bad_workday() {
        let config = TEST_CONFIG.replace("workday_length = 8", "workday_length = -1");
        assert!(config.parse::<Config>().is_err());

        let config = TEST_CONFIG.replace("workday_length = 8", "workday_length = 3e9");
        assert!(config.parse::<Config>().is_err());

        let config = TEST_CONFIG.replace("workday_length = 8", "workday_length = 24");
        assert!(config.parse::<Config>().is_ok());

        let config = TEST_CONFIG.replace("\"9:00\"", "\"morning\"");
        assert!(config.parse::<Config>().is_err());
    }
}
