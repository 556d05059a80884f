use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
};
use tracing::{debug, info, instrument};

use crate::utils::time::{parse_human_date, DateStyle};

use super::{Cell, ReportSink};

/// Sheet stored in a local file. The first line is the header, every other line is a JSON array
/// with the cells of a row. Reads take a shared lock on the file, writes an exclusive one.
pub struct FileSheet {
    path: PathBuf,
    date_style: DateStyle,
}

impl FileSheet {
    pub fn new(path: PathBuf, date_style: DateStyle) -> Self {
        Self { path, date_style }
    }

    /// Creates a new sheet containing only `header`. Fails if the file already exists.
    pub async fn create(path: PathBuf, header: &[String], date_style: DateStyle) -> Result<Self> {
        let mut file = File::options()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .with_context(|| format!("Failed to create sheet {path:?}"))?;
        let header = header.iter().cloned().map(Cell::Text).collect::<Vec<_>>();
        file.write_all(&encode_rows([&header])?).await?;
        file.flush().await?;
        info!("Created sheet {path:?}");
        Ok(Self::new(path, date_style))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns every row including the header.
    async fn read_rows(&self) -> Result<Vec<Vec<Cell>>> {
        let mut file = File::open(&self.path)
            .await
            .with_context(|| format!("Failed to open sheet {:?}", self.path))?;
        file.lock_shared()?;
        let mut content = String::new();
        let read = file.read_to_string(&mut content).await;
        file.unlock_async().await?;
        read?;

        content
            .lines()
            .enumerate()
            .map(|(index, line)| {
                if line.trim().is_empty() {
                    return Ok(vec![]);
                }
                serde_json::from_str::<Vec<Cell>>(line).with_context(|| {
                    format!("Row {} of sheet {:?} is not valid", index + 1, self.path)
                })
            })
            .collect()
    }

    async fn rewrite(&self, rows: &[Vec<Cell>]) -> Result<()> {
        let mut file = File::options()
            .write(true)
            .read(true)
            .truncate(false)
            .open(&self.path)
            .await?;
        file.lock_exclusive()?;
        let result = Self::rewrite_with_file(&mut file, rows).await;
        file.unlock_async().await?;
        result
    }

    async fn rewrite_with_file(file: &mut File, rows: &[Vec<Cell>]) -> Result<()> {
        let buffer = encode_rows(rows)?;
        file.set_len(0).await?;
        file.rewind().await?;
        file.write_all(&buffer).await?;
        file.flush().await?;
        Ok(())
    }
}

fn encode_rows<'a>(rows: impl IntoIterator<Item = &'a Vec<Cell>>) -> Result<Vec<u8>> {
    let mut buffer = Vec::<u8>::new();
    for row in rows {
        serde_json::to_writer(&mut buffer, row)?;
        buffer.push(b'\n');
    }
    Ok(buffer)
}

fn has_date(row: &[Cell], date_column: usize) -> bool {
    row.get(date_column - 1).is_some_and(|cell| !cell.is_blank())
}

#[async_trait]
impl ReportSink for FileSheet {
    async fn header(&self) -> Result<Vec<String>> {
        let rows = self.read_rows().await?;
        let header = rows
            .into_iter()
            .next()
            .filter(|header| !header.is_empty())
            .ok_or_else(|| anyhow!("Sheet {:?} has no header", self.path))?;
        Ok(header.iter().map(ToString::to_string).collect())
    }

    #[instrument(skip(self), fields(path = ?self.path))]
    async fn trim_trailing_blank_rows(&mut self, date_column: usize) -> Result<usize> {
        let rows = self.read_rows().await?;
        let keep = rows.len()
            - rows
                .iter()
                .skip(1)
                .rev()
                .take_while(|row| !has_date(row, date_column))
                .count();

        let removed = rows.len() - keep;
        if removed > 0 {
            self.rewrite(&rows[..keep]).await?;
            info!("Removed {removed} trailing blank rows");
        }
        Ok(removed)
    }

    async fn last_date(&self, date_column: usize) -> Result<Option<NaiveDate>> {
        let rows = self.read_rows().await?;
        let Some(cell) = rows
            .iter()
            .skip(1)
            .rev()
            .find(|row| has_date(row, date_column))
            .map(|row| &row[date_column - 1])
        else {
            return Ok(None);
        };

        let Some(text) = cell.as_text() else {
            bail!("Last date {cell} of sheet {:?} is not text", self.path);
        };
        parse_human_date(text, self.date_style).map(Some)
    }

    async fn append_row(&mut self, row: Vec<Cell>) -> Result<()> {
        let mut file = File::options()
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open sheet {:?}", self.path))?;
        let buffer = encode_rows([&row])?;

        file.lock_exclusive()?;
        let result = async {
            file.write_all(&buffer).await?;
            file.flush().await
        }
        .await;
        file.unlock_async().await?;
        result?;

        debug!("Appended row {row:?}");
        Ok(())
    }
}
