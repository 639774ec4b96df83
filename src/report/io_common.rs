// Primitives shared by the readers: cells, dates and file names.

use std::path::Path;

use chrono::{Duration, NaiveDate};

/// A cell of a loaded table, independent of the file format it came from.
#[derive(PartialEq, Debug, Clone)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
    Bool(bool),
}

/// A loaded table, row-major, positions as in the source file.
pub type Grid = Vec<Vec<Cell>>;

/// Numbers in this range are accepted as Excel date serials.
const MIN_EXCEL_SERIAL: f64 = 1.0;
const MAX_EXCEL_SERIAL: f64 = 100_000.0;

const DATE_FORMATS_4: [&str; 4] = ["%d-%m-%Y", "%d/%m/%Y", "%m-%d-%Y", "%m/%d/%Y"];
const DATE_FORMATS_2: [&str; 4] = ["%d-%m-%y", "%d/%m/%y", "%m-%d-%y", "%m/%d/%y"];

impl Cell {
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// The text of the cell, as it would be displayed.
    pub fn text(&self) -> String {
        match self {
            Cell::Empty => "".to_string(),
            Cell::Text(s) => s.clone(),
            Cell::Number(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
            Cell::Number(f) => f.to_string(),
            Cell::Date(d) => d.format("%d-%m-%Y").to_string(),
            Cell::Bool(b) => b.to_string(),
        }
    }

    /// Trimmed, lowercase text. Used for matching labels and headers.
    pub fn label(&self) -> String {
        self.text().trim().to_lowercase()
    }
}

pub fn cell_at(row: &[Cell], idx: usize) -> &Cell {
    row.get(idx).unwrap_or(&Cell::Empty)
}

/// Converts an Excel date serial (days since 1899-12-30) to a date.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || !(MIN_EXCEL_SERIAL..=MAX_EXCEL_SERIAL).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.floor() as i64))
}

/// Parses a date written day first, then month first, with `-` or `/`.
///
/// The year must have either 2 or 4 digits.
pub fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let s = text.trim();
    let year_part = s.rsplit(|c: char| c == '-' || c == '/').next()?;
    let formats = match year_part.len() {
        4 => DATE_FORMATS_4,
        2 => DATE_FORMATS_2,
        _ => return None,
    };
    formats
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

pub fn parse_date_cell(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::Date(d) => Some(*d),
        Cell::Number(f) => excel_serial_to_date(*f),
        Cell::Text(s) => parse_date_text(s),
        _ => None,
    }
}

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn day_first_then_month_first() {
        assert_eq!(parse_date_text("01-04-2025"), Some(ymd(2025, 4, 1)));
        assert_eq!(parse_date_text("30/04/2025"), Some(ymd(2025, 4, 30)));
        // No 13th month: read month first.
        assert_eq!(parse_date_text("04-13-2025"), Some(ymd(2025, 4, 13)));
        assert_eq!(parse_date_text(" 01-04-25 "), Some(ymd(2025, 4, 1)));
        assert_eq!(parse_date_text("31-31-2025"), None);
        assert_eq!(parse_date_text("April 2025"), None);
        assert_eq!(parse_date_text(""), None);
    }

    #[test]
    fn excel_serials() {
        assert_eq!(excel_serial_to_date(45748.0), Some(ymd(2025, 4, 1)));
        assert_eq!(excel_serial_to_date(45748.75), Some(ymd(2025, 4, 1)));
        assert_eq!(excel_serial_to_date(0.0), None);
        assert_eq!(excel_serial_to_date(f64::NAN), None);
        assert_eq!(
            parse_date_cell(&Cell::Number(45777.0)),
            Some(ymd(2025, 4, 30))
        );
    }

    #[test]
    fn cell_text() {
        assert_eq!(Cell::Number(12.0).text(), "12");
        assert_eq!(Cell::Number(1.5).text(), "1.5");
        assert_eq!(Cell::Text("  First Name ".to_string()).label(), "first name");
        assert!(Cell::Text("   ".to_string()).is_blank());
        assert!(!Cell::Number(0.0).is_blank());
        assert_eq!(simplify_file_name("/tmp/a/april.xlsx"), "april.xlsx");
    }
}
