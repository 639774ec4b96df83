// Locating the header row and the reporting dates in the metadata block.

use chrono::NaiveDate;

use crate::report::io_common::*;
use crate::report::*;

pub const MAIN_SCAN_ROWS: usize = 50;
pub const TRAINING_SCAN_ROWS: usize = 60;

/// How the header row of a report is recognized.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum HeaderRule {
    /// The first cell of the row is `First Name`.
    FirstCell,
    /// `First Name` appears somewhere in the row.
    AnyCell,
}

impl HeaderRule {
    fn matches(&self, row: &[Cell]) -> bool {
        match self {
            HeaderRule::FirstCell => cell_at(row, 0).label() == "first name",
            HeaderRule::AnyCell => row.iter().any(|c| c.label() == "first name"),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ReportMetadata {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub header_row: Option<usize>,
}

impl ReportMetadata {
    pub fn total_weeks(&self) -> f64 {
        compute_total_weeks(self.from, self.to)
    }

    pub fn total_months(&self) -> f64 {
        compute_total_months(self.from, self.to)
    }
}

/// The date following a `From`/`To` label: the next non-blank cell on the
/// right. None if that cell is not a date.
fn date_after(row: &[Cell], label_idx: usize) -> Option<NaiveDate> {
    row.iter()
        .skip(label_idx + 1)
        .find(|c| !c.is_blank())
        .and_then(parse_date_cell)
}

/// Scans at most `max_rows` rows for the reporting dates and the header row.
///
/// The scan stops at the header row. A date label followed by something that
/// is not a date is ignored, and a later label can still provide the date.
pub fn find_metadata(grid: &Grid, rule: HeaderRule, max_rows: usize) -> ReportMetadata {
    let mut res = ReportMetadata {
        from: None,
        to: None,
        header_row: None,
    };
    for (idx, row) in grid.iter().take(max_rows).enumerate() {
        for (cidx, cell) in row.iter().enumerate() {
            let label = match cell {
                Cell::Text(_) => cell.label(),
                _ => continue,
            };
            match label.as_str() {
                "from" | "from:" => {
                    if let Some(d) = date_after(row, cidx) {
                        debug!("find_metadata: row {}: from {}", idx, d);
                        res.from = Some(d);
                    }
                }
                "to" | "to:" => {
                    if let Some(d) = date_after(row, cidx) {
                        debug!("find_metadata: row {}: to {}", idx, d);
                        res.to = Some(d);
                    }
                }
                _ => {}
            }
        }
        if rule.matches(row) {
            res.header_row = Some(idx);
            break;
        }
    }
    res
}

/// Same as [find_metadata], but fails if no header row was found.
pub fn scan_metadata(grid: &Grid, rule: HeaderRule, max_rows: usize) -> ReportResult<ReportMetadata> {
    let meta = find_metadata(grid, rule, max_rows);
    if meta.header_row.is_none() {
        warn!(
            "scan_metadata: no header row ({:?}) in the first {} rows",
            rule, max_rows
        );
        return HeaderNotFoundSnafu { scanned: max_rows }.fail();
    }
    info!(
        "scan_metadata: header row: {:?} from: {:?} to: {:?}",
        meta.header_row, meta.from, meta.to
    );
    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn april_grid() -> Grid {
        vec![
            vec![t("Chapter Summary Report")],
            vec![],
            vec![t("From:"), Cell::Empty, t("01-04-2025"), t("To:"), t("30-04-2025")],
            vec![t("Run by"), t("admin")],
            vec![t("First Name"), t("Last Name"), t("P"), t("A")],
            vec![t("Jane"), t("Doe"), t("4"), t("0")],
        ]
    }

    #[test]
    fn finds_dates_and_header() {
        let meta = scan_metadata(&april_grid(), HeaderRule::FirstCell, MAIN_SCAN_ROWS).unwrap();
        assert_eq!(meta.header_row, Some(4));
        assert_eq!(meta.from, Some(ymd(2025, 4, 1)));
        assert_eq!(meta.to, Some(ymd(2025, 4, 30)));
        assert!((meta.total_weeks() - 29.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn date_cells_and_serials() {
        let grid = vec![
            vec![t("FROM"), Cell::Date(ymd(2025, 3, 1))],
            vec![t("to"), Cell::Number(45747.0)],
            vec![t("First Name")],
        ];
        let meta = find_metadata(&grid, HeaderRule::FirstCell, MAIN_SCAN_ROWS);
        assert_eq!(meta.from, Some(ymd(2025, 3, 1)));
        assert_eq!(meta.to, Some(ymd(2025, 3, 31)));
        assert_eq!(meta.header_row, Some(2));
    }

    #[test]
    fn label_without_date_is_ignored() {
        let grid = vec![
            vec![t("From:"), t("last month")],
            vec![t("To:")],
            vec![t("First Name")],
        ];
        let meta = find_metadata(&grid, HeaderRule::FirstCell, MAIN_SCAN_ROWS);
        assert_eq!(meta.from, None);
        assert_eq!(meta.to, None);
        assert_eq!(meta.total_weeks(), 1.0);
        assert_eq!(meta.total_months(), 1.0);
    }

    #[test]
    fn header_must_be_first_cell_for_main_report() {
        let grid = vec![vec![Cell::Empty, t("First Name"), t("Last Name")]];
        assert_eq!(
            find_metadata(&grid, HeaderRule::FirstCell, MAIN_SCAN_ROWS).header_row,
            None
        );
        assert_eq!(
            find_metadata(&grid, HeaderRule::AnyCell, TRAINING_SCAN_ROWS).header_row,
            Some(0)
        );
    }

    #[test]
    fn header_beyond_the_window() {
        let mut grid: Grid = vec![vec![t("noise")]; TRAINING_SCAN_ROWS];
        grid.push(vec![t("First Name"), t("Last Name")]);
        let res = scan_metadata(&grid, HeaderRule::AnyCell, TRAINING_SCAN_ROWS);
        assert!(matches!(
            res,
            Err(ReportError::HeaderNotFound { scanned: 60 })
        ));
    }

    #[test]
    fn dates_after_the_header_are_not_read() {
        let mut grid = april_grid();
        grid.swap(2, 4);
        let meta = find_metadata(&grid, HeaderRule::FirstCell, MAIN_SCAN_ROWS);
        assert_eq!(meta.header_row, Some(2));
        assert_eq!(meta.from, None);
    }
}
