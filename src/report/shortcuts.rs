use std::{collections::BTreeMap, fmt::Display, sync::{Arc, LazyLock}};

use anyhow::{anyhow, bail, Result};
use regex::Regex;

use crate::{config::Config, timetable::entities::ProjectHours};

static ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<shortcut>[^\d\s]+)\s*(?P<hours>\d+(?:\.\d+)?)").unwrap()
});

/// What the user typed when asked for a manual timetable.
#[derive(Debug, Clone, PartialEq)]
pub enum ManualInput {
    Exit,
    Back,
    Hours(ProjectHours),
}

/// Maps short input tokens to projects and to the "other" category.
#[derive(Debug, Clone)]
pub struct ShortcutTable {
    shortcuts: BTreeMap<String, Arc<str>>,
}

impl ShortcutTable {
    pub fn new(shortcuts: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            shortcuts: shortcuts
                .into_iter()
                .map(|(shortcut, name)| (shortcut, name.into()))
                .collect(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config
                .projects
                .iter()
                .map(|project| (project.shortcut.clone(), project.name.clone()))
                .chain([(
                    config.sheet.other_shortcut.clone(),
                    config.sheet.other_column.clone(),
                )]),
        )
    }

    /// Parses `exit`, `back` or a sequence of `<shortcut><hours>` entries like `a3b5` or
    /// `a 2.5 o 1`. Hours of a repeated shortcut are summed.
    pub fn parse(&self, input: &str) -> Result<ManualInput> {
        let input = input.trim();
        match input.to_lowercase().as_str() {
            "exit" => return Ok(ManualInput::Exit),
            "back" => return Ok(ManualInput::Back),
            _ => {}
        }

        let mut hours = ProjectHours::new();
        let mut last_end = 0;
        for captures in ENTRY.captures_iter(input) {
            let whole = captures.get(0).expect("Group 0 is always present");
            check_gap(&input[last_end..whole.start()])?;
            last_end = whole.end();

            let shortcut = &captures["shortcut"];
            let project = self
                .shortcuts
                .get(shortcut)
                .ok_or_else(|| anyhow!("Unknown shortcut {shortcut:?}"))?;
            let value = captures["hours"].parse::<f64>()?;
            hours = hours.with_added(project, value);
        }
        check_gap(&input[last_end..])?;

        if hours.is_empty() {
            bail!("Expected entries like 'a3b5'");
        }
        Ok(ManualInput::Hours(hours))
    }
}

fn check_gap(gap: &str) -> Result<()> {
    if gap.trim().is_empty() {
        Ok(())
    } else {
        Err(anyhow!("Can't understand {:?}", gap.trim()))
    }
}

impl Display for ShortcutTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (shortcut, name) in &self.shortcuts {
            writeln!(f, "{name} as '{shortcut}'")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::{ManualInput, ShortcutTable};
    use crate::config::tests::test_config;

    fn table() -> ShortcutTable {
        ShortcutTable::from_config(&test_config())
    }

    fn hours(input: &str) -> Vec<(String, f64)> {
        match table().parse(input).unwrap() {
            ManualInput::Hours(hours) => hours.iter().map(|(k, v)| (k.to_string(), v)).collect(),
            other => panic!("Expected hours, got {other:?}"),
        }
    }

    #[test]
    fn parses_compact_entries() {
        assert_eq!(
            hours("b3f5"),
            vec![("Backend".to_string(), 3.), ("Frontend".to_string(), 5.)]
        );
    }

    #[test]
    fn parses_spaces_decimals_and_other() {
        assert_eq!(
            hours(" b 2.5 o1 b1 "),
            vec![("Backend".to_string(), 3.5), ("Other".to_string(), 1.)]
        );
    }

    #[test]
    fn sentinels() -> Result<()> {
        assert_eq!(table().parse("exit")?, ManualInput::Exit);
        assert_eq!(table().parse(" BACK ")?, ManualInput::Back);
        Ok(())
    }

    #[test]
    fn rejects_unknown_and_garbage() {
        assert!(table().parse("z3").is_err());
        assert!(table().parse("b3 5").is_err());
        assert!(table().parse("b").is_err());
        assert!(table().parse("").is_err());
    }

    #[test]
    fn lists_shortcuts() {
        let listing = table().to_string();
        assert!(listing.contains("Backend as 'b'"));
        assert!(listing.contains("Other as 'o'"));
    }
}
