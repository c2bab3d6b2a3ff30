use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, XlsxError};
use tempfile::NamedTempFile;
use tracing::{error, info};

use crate::error::{Error, Result};
use crate::models::overtime::Report;

pub const TICKET_HEADER: &str = "TICKET";
pub const MINUTES_HEADER: &str = "MINUTOS";
pub const TOTAL_LABEL: &str = "TOTAL";

/// Writes a report to a file and returns its path.
///
/// The table has one row per report line, in report order, after a
/// `TICKET`/`MINUTOS` header, followed by a `TOTAL` row.
#[cfg_attr(test, mockall::automock)]
pub trait ReportRenderer: Send + Sync {
    fn render(&self, report: &Report) -> Result<PathBuf>;
}

impl<T: ReportRenderer + ?Sized> ReportRenderer for Box<T> {
    fn render(&self, report: &Report) -> Result<PathBuf> {
        (**self).render(report)
    }
}

pub struct CsvRenderer {
    output_dir: PathBuf,
}

impl CsvRenderer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

impl ReportRenderer for CsvRenderer {
    fn render(&self, report: &Report) -> Result<PathBuf> {
        let mut csv = String::new();
        push_row(&mut csv, TICKET_HEADER, MINUTES_HEADER);
        for line in report.lines() {
            push_row(&mut csv, &line.ticket, &line.minutes.to_string());
        }
        push_row(&mut csv, TOTAL_LABEL, &report.total_minutes().to_string());

        let path = artifact_path(&self.output_dir, "csv");
        write_atomically(&self.output_dir, &path, csv.as_bytes())?;

        info!(
            "Rendered CSV report for {} to {}",
            report.period(),
            path.display()
        );
        Ok(path)
    }
}

fn push_row(out: &mut String, ticket: &str, minutes: &str) {
    out.push_str(&csv_field(ticket));
    out.push(',');
    out.push_str(&csv_field(minutes));
    out.push_str("\r\n");
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub struct XlsxRenderer {
    output_dir: PathBuf,
}

impl XlsxRenderer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

impl ReportRenderer for XlsxRenderer {
    fn render(&self, report: &Report) -> Result<PathBuf> {
        let workbook = build_workbook(report).map_err(|e| {
            error!("Failed to build spreadsheet for {}: {}", report.period(), e);
            Error::Render(e.to_string())
        })?;

        let path = artifact_path(&self.output_dir, "xlsx");
        write_atomically(&self.output_dir, &path, &workbook)?;

        info!(
            "Rendered spreadsheet report for {} to {} ({} bytes)",
            report.period(),
            path.display(),
            workbook.len()
        );
        Ok(path)
    }
}

fn build_workbook(report: &Report) -> Result<Vec<u8>, XlsxError> {
    let header = Format::new()
        .set_bold()
        .set_font_size(12)
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(0x4472C4))
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
        .set_border(FormatBorder::Thin);
    let data = Format::new().set_border(FormatBorder::Thin);
    let total = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(0xD9D9D9))
        .set_border(FormatBorder::Thin);

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_column_width(0, 50)?;
    sheet.set_column_width(1, 15)?;

    sheet.write_string_with_format(0, 0, TICKET_HEADER, &header)?;
    sheet.write_string_with_format(0, 1, MINUTES_HEADER, &header)?;

    let mut row = 1;
    for line in report.lines() {
        sheet.write_string_with_format(row, 0, &line.ticket, &data)?;
        sheet.write_number_with_format(row, 1, line.minutes, &data)?;
        row += 1;
    }

    sheet.write_string_with_format(row, 0, TOTAL_LABEL, &total)?;
    sheet.write_number_with_format(row, 1, report.total_minutes() as f64, &total)?;

    workbook.save_to_buffer()
}

fn artifact_path(dir: &Path, extension: &str) -> PathBuf {
    dir.join(format!(
        "overtime_{}.{}",
        Local::now().format("%Y-%m-%d"),
        extension
    ))
}

/// Writes into a temporary file next to `path` and renames it into place.
fn write_atomically(dir: &Path, path: &Path, contents: &[u8]) -> Result<()> {
    let mut file = NamedTempFile::new_in(dir).map_err(|e| {
        error!("Failed to create temporary file in {}: {}", dir.display(), e);
        e
    })?;
    file.write_all(contents)?;
    file.flush()?;
    file.persist(path).map_err(|e| {
        error!("Failed to move report into {}: {}", path.display(), e);
        Error::Io(e.error)
    })?;
    Ok(())
}
