/*!
    Spreadsheet export. The board turns tasks into flat, already formatted
    rows; an `Exporter` turns rows into file contents.
!*/
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use chrono::format::{Item, StrftimeItems};
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use serde::Deserialize;
use thiserror::Error;

use crate::task::Task;

pub const HEADERS: [&str; 5] = ["Task", "Status", "Due Date", "Created At", "Highlighted"];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("couldn't build workbook: {0}")]
    Xlsx(#[from] XlsxError),
    #[error("couldn't write csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("couldn't write export file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Xlsx,
    Csv,
}

/// strftime patterns used for the human-readable date columns.
#[derive(Debug, Clone)]
pub struct DateFormats {
    pub date: String,
    pub datetime: String,
}

impl DateFormats {
    pub fn new(date: &str, datetime: &str) -> Result<Self, String> {
        for pattern in [date, datetime] {
            if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
                return Err(format!("invalid date format `{pattern}`"));
            }
        }
        // Time fields parse fine but can't be rendered from a bare date.
        if !renders(NaiveDate::default().format(date)) {
            return Err(format!("date format `{date}` needs more than a date"));
        }
        if !renders(Local::now().format(datetime)) {
            return Err(format!("invalid date-time format `{datetime}`"));
        }
        Ok(DateFormats {
            date: date.to_string(),
            datetime: datetime.to_string(),
        })
    }
}

fn renders(value: impl std::fmt::Display) -> bool {
    use std::fmt::Write as _;
    write!(String::new(), "{value}").is_ok()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportRow {
    pub task: String,
    pub status: String,
    pub due_date: String,
    pub created_at: String,
    pub highlighted: String,
}

impl ExportRow {
    pub fn from_task(task: &Task, formats: &DateFormats) -> Self {
        ExportRow {
            task: task.text.clone(),
            status: task.status.label().to_string(),
            due_date: task
                .due
                .map(|d| d.format(&formats.date).to_string())
                .unwrap_or_default(),
            created_at: task
                .created_at
                .with_timezone(&Local)
                .format(&formats.datetime)
                .to_string(),
            highlighted: if task.highlighted { "Yes" } else { "No" }.to_string(),
        }
    }

    fn cells(&self) -> [&str; 5] {
        [
            &self.task,
            &self.status,
            &self.due_date,
            &self.created_at,
            &self.highlighted,
        ]
    }
}

pub trait Exporter {
    /// File extension the rendered bytes belong under.
    fn extension(&self) -> &'static str;
    fn render(&self, rows: &[ExportRow]) -> Result<Vec<u8>, ExportError>;
}

pub struct XlsxExporter {
    pub sheet_name: String,
}

impl Exporter for XlsxExporter {
    fn extension(&self) -> &'static str {
        "xlsx"
    }

    fn render(&self, rows: &[ExportRow]) -> Result<Vec<u8>, ExportError> {
        let mut workbook = Workbook::new();
        let bold = Format::new().set_bold();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&self.sheet_name)?;

        for (col, header) in HEADERS.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, *header, &bold)?;
        }
        for (i, row) in rows.iter().enumerate() {
            for (col, cell) in row.cells().iter().enumerate() {
                worksheet.write_string(i as u32 + 1, col as u16, *cell)?;
            }
        }
        worksheet.autofit();

        Ok(workbook.save_to_buffer()?)
    }
}

pub struct CsvExporter;

impl Exporter for CsvExporter {
    fn extension(&self) -> &'static str {
        "csv"
    }

    fn render(&self, rows: &[ExportRow]) -> Result<Vec<u8>, ExportError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(HEADERS)?;
        for row in rows {
            writer.write_record(row.cells())?;
        }
        writer
            .into_inner()
            .map_err(|e| ExportError::Io(e.into_error()))
    }
}

pub fn exporter_for(format: ExportFormat, sheet_name: &str) -> Box<dyn Exporter> {
    match format {
        ExportFormat::Xlsx => Box::new(XlsxExporter {
            sheet_name: sheet_name.to_string(),
        }),
        ExportFormat::Csv => Box::new(CsvExporter),
    }
}

/// Renders `rows` and writes them next to `path`, swapping the extension
/// for the exporter's. The file is renamed into place once complete.
pub fn write_rows(
    exporter: &dyn Exporter,
    rows: &[ExportRow],
    path: &Path,
) -> Result<PathBuf, ExportError> {
    let bytes = exporter.render(rows)?;
    let target = path.with_extension(exporter.extension());
    let dir = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".taskboard-export")
        .tempfile_in(&dir)?;
    tmp.write_all(&bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(&target).map_err(|e| e.error)?;

    tracing::info!(path = %target.display(), rows = rows.len(), "exported tasks");
    Ok(target)
}
