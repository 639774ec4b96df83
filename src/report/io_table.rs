// Loading the raw tables from Excel and CSV files.

use std::io::Cursor;

use calamine::{DataType, Range, Reader, Xls, Xlsx};

use crate::report::io_common::*;
use crate::report::*;

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum TableFormat {
    Xlsx,
    Xls,
    Csv,
}

pub fn detect_format(filename: &str) -> ReportResult<TableFormat> {
    let lower = filename.trim().to_lowercase();
    if lower.ends_with(".xlsx") {
        Ok(TableFormat::Xlsx)
    } else if lower.ends_with(".xls") {
        Ok(TableFormat::Xls)
    } else if lower.ends_with(".csv") {
        Ok(TableFormat::Csv)
    } else {
        UnsupportedFormatSnafu { filename }.fail()
    }
}

/// Loads the content of a report as a grid of cells.
///
/// No row is treated as a header. For Excel files, the first worksheet is used
/// unless `worksheet` is given. If the engine matching the extension fails, the
/// other Excel engine is tried once before giving up.
pub fn load_table(bytes: &[u8], filename: &str, worksheet: Option<&str>) -> ReportResult<Grid> {
    let format = detect_format(filename)?;
    debug!(
        "load_table: filename: {:?} format: {:?} worksheet: {:?} size: {}",
        filename,
        format,
        worksheet,
        bytes.len()
    );
    let grid = match format {
        TableFormat::Csv => load_csv(bytes, filename)?,
        TableFormat::Xlsx | TableFormat::Xls => {
            let alt = if format == TableFormat::Xlsx {
                TableFormat::Xls
            } else {
                TableFormat::Xlsx
            };
            let range = match read_workbook(bytes, format, worksheet) {
                Ok(r) => r,
                Err(e1) => {
                    warn!(
                        "load_table: {:?} could not be read as {:?}: {}. Trying {:?}",
                        filename, format, e1, alt
                    );
                    read_workbook(bytes, alt, worksheet).map_err(|e2| {
                        ReportError::UnreadableFile {
                            filename: filename.to_string(),
                            message: format!("{}; retry as {:?}: {}", e1, alt, e2),
                        }
                    })?
                }
            };
            range_to_grid(&range)
        }
    };
    info!(
        "load_table: {:?}: {} rows loaded",
        simplify_file_name(filename),
        grid.len()
    );
    Ok(grid)
}

fn read_workbook(
    bytes: &[u8],
    format: TableFormat,
    worksheet: Option<&str>,
) -> Result<Range<DataType>, String> {
    match format {
        TableFormat::Xlsx => read_xlsx(bytes, worksheet),
        TableFormat::Xls => read_xls(bytes, worksheet),
        TableFormat::Csv => Err("not a workbook".to_string()),
    }
}

fn read_xlsx(bytes: &[u8], worksheet: Option<&str>) -> Result<Range<DataType>, String> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes)).map_err(|e| e.to_string())?;
    let range = match worksheet {
        Some(name) => workbook.worksheet_range(name),
        None => workbook.worksheet_range_at(0),
    };
    sheet_or_message(range, worksheet)
}

fn read_xls(bytes: &[u8], worksheet: Option<&str>) -> Result<Range<DataType>, String> {
    let mut workbook: Xls<_> = Xls::new(Cursor::new(bytes)).map_err(|e| e.to_string())?;
    let range = match worksheet {
        Some(name) => workbook.worksheet_range(name),
        None => workbook.worksheet_range_at(0),
    };
    sheet_or_message(range, worksheet)
}

fn sheet_or_message<E: std::fmt::Display>(
    range: Option<Result<Range<DataType>, E>>,
    worksheet: Option<&str>,
) -> Result<Range<DataType>, String> {
    match range {
        Some(Ok(r)) => Ok(r),
        Some(Err(e)) => Err(e.to_string()),
        None => match worksheet {
            Some(name) => Err(format!("worksheet {:?} not found", name)),
            None => Err("the workbook has no worksheet".to_string()),
        },
    }
}

/// Converts a worksheet range, keeping the cells at their position in the
/// sheet: leading empty rows and columns are kept as empty cells.
fn range_to_grid(range: &Range<DataType>) -> Grid {
    let (row_offset, col_offset) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));
    let mut grid: Grid = vec![Vec::new(); row_offset];
    for row in range.rows() {
        let mut cells: Vec<Cell> = vec![Cell::Empty; col_offset];
        cells.extend(row.iter().map(read_cell_calamine));
        grid.push(cells);
    }
    grid
}

fn read_cell_calamine(cell: &DataType) -> Cell {
    match cell {
        DataType::String(s) if s.trim().is_empty() => Cell::Empty,
        DataType::String(s) => Cell::Text(s.clone()),
        DataType::Float(f) => Cell::Number(*f),
        DataType::Int(i) => Cell::Number(*i as f64),
        DataType::Bool(b) => Cell::Bool(*b),
        DataType::DateTime(serial) => match excel_serial_to_date(*serial) {
            Some(d) => Cell::Date(d),
            None => Cell::Number(*serial),
        },
        // Error cells
        _ => Cell::Empty,
    }
}

fn load_csv(bytes: &[u8], filename: &str) -> ReportResult<Grid> {
    let grid = match read_csv(bytes, b',', false) {
        Ok(g) => g,
        Err(e) => {
            warn!(
                "load_csv: {:?} is not valid UTF-8 ({}), decoding it lossily",
                filename, e
            );
            read_csv(bytes, b',', true).map_err(|message| ReportError::UnreadableFile {
                filename: filename.to_string(),
                message,
            })?
        }
    };
    // A file separated with ';' reads as a single column.
    if grid.iter().all(|row| row.len() <= 1) && bytes.contains(&b';') {
        debug!("load_csv: {:?}: single column, retrying with ';'", filename);
        return read_csv(bytes, b';', true).map_err(|message| ReportError::UnreadableFile {
            filename: filename.to_string(),
            message,
        });
    }
    Ok(grid)
}

fn read_csv(bytes: &[u8], delimiter: u8, lossy: bool) -> Result<Grid, String> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(bytes);
    let mut grid: Grid = Vec::new();
    for (lineno, record_r) in rdr.byte_records().enumerate() {
        let record = record_r.map_err(|e| e.to_string())?;
        let mut cells: Vec<Cell> = Vec::with_capacity(record.len());
        for field in record.iter() {
            let s = if lossy {
                String::from_utf8_lossy(field).to_string()
            } else {
                String::from_utf8(field.to_vec())
                    .map_err(|e| format!("line {}: {}", lineno + 1, e))?
            };
            cells.push(read_cell_csv(&s));
        }
        grid.push(cells);
    }
    Ok(grid)
}

fn read_cell_csv(field: &str) -> Cell {
    let s = field.trim_start_matches('\u{feff}');
    if s.trim().is_empty() {
        Cell::Empty
    } else {
        Cell::Text(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::metadata::{scan_metadata, HeaderRule, MAIN_SCAN_ROWS};
    use chrono::NaiveDate;

    // Summary sheet starting at A2: a title row, From:/To: dates, the header
    // and two members (Jane Doe, John Smith). Cells are inline strings and
    // plain numbers.
    const APRIL_XLSX: &[u8] = include_bytes!("../../testdata/april_report.xlsx");

    #[test]
    fn formats_by_extension() {
        assert_eq!(detect_format("April.XLSX").unwrap(), TableFormat::Xlsx);
        assert_eq!(detect_format("old.xls").unwrap(), TableFormat::Xls);
        assert_eq!(detect_format("/tmp/report.csv").unwrap(), TableFormat::Csv);
        assert!(matches!(
            detect_format("report.pdf"),
            Err(ReportError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            load_table(b"", "notes.txt", None),
            Err(ReportError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn csv_without_header_inference() {
        let data = "Chapter Report,,\nFirst Name,Last Name,P\nJane,Doe,4\nJohn,Smith\n";
        let grid = load_table(data.as_bytes(), "r.csv", None).unwrap();
        assert_eq!(grid.len(), 4);
        assert_eq!(grid[0][0], Cell::Text("Chapter Report".to_string()));
        assert_eq!(grid[0][1], Cell::Empty);
        assert_eq!(grid[2][2], Cell::Text("4".to_string()));
        // Ragged rows are kept as they are.
        assert_eq!(grid[3].len(), 2);
    }

    #[test]
    fn csv_with_semicolons() {
        let data = "First Name;Last Name;P\nJane;Doe;4\n";
        let grid = load_table(data.as_bytes(), "r.csv", None).unwrap();
        assert_eq!(grid[1].len(), 3);
        assert_eq!(grid[1][1], Cell::Text("Doe".to_string()));
    }

    #[test]
    fn csv_latin1_is_decoded_lossily() {
        let data: &[u8] = b"First Name,Last Name\nJos\xe9,Doe\n";
        let grid = load_table(data, "r.csv", None).unwrap();
        assert_eq!(grid[1][1], Cell::Text("Doe".to_string()));
        assert!(grid[1][0].text().starts_with("Jos"));
    }

    #[test]
    fn worksheet_offsets_and_dates() {
        // Used cells start at B2.
        let mut range: Range<DataType> = Range::new((1, 1), (3, 4));
        range.set_value((1, 1), DataType::String("From:".to_string()));
        range.set_value((1, 2), DataType::DateTime(45748.0));
        range.set_value((1, 3), DataType::String("To:".to_string()));
        range.set_value((1, 4), DataType::Float(45777.0));
        range.set_value((3, 1), DataType::String("First Name".to_string()));
        range.set_value((3, 2), DataType::String("Last Name".to_string()));
        range.set_value((3, 3), DataType::Int(4));
        range.set_value((3, 4), DataType::Bool(true));

        let grid = range_to_grid(&range);
        assert_eq!(grid.len(), 4);
        assert!(grid[0].is_empty());
        assert_eq!(grid[1][0], Cell::Empty);
        assert_eq!(
            grid[1][2],
            Cell::Date(NaiveDate::from_ymd_opt(2025, 4, 1).unwrap())
        );
        assert_eq!(grid[1][4], Cell::Number(45777.0));
        assert!(grid[2].iter().all(|c| *c == Cell::Empty));
        assert_eq!(grid[3][3], Cell::Number(4.0));
        assert_eq!(grid[3][4], Cell::Bool(true));

        // The header is in the second column: only the any-cell rule finds it.
        let meta = scan_metadata(&grid, HeaderRule::AnyCell, 10).unwrap();
        assert_eq!(meta.from, NaiveDate::from_ymd_opt(2025, 4, 1));
        assert_eq!(meta.to, NaiveDate::from_ymd_opt(2025, 4, 30));
        assert_eq!(meta.header_row, Some(3));
        assert!(scan_metadata(&grid, HeaderRule::FirstCell, 10).is_err());
    }

    #[test]
    fn xlsx_summary_sheet() {
        let grid = load_table(APRIL_XLSX, "april.xlsx", None).unwrap();
        // The empty first row is kept.
        assert_eq!(grid.len(), 6);
        assert!(grid[0].is_empty());
        assert_eq!(grid[1][0], Cell::Text("Chapter Summary Report".to_string()));
        assert_eq!(grid[3][0], Cell::Text("First Name".to_string()));
        assert_eq!(grid[4][13], Cell::Number(600000.0));

        let meta = scan_metadata(&grid, HeaderRule::FirstCell, MAIN_SCAN_ROWS).unwrap();
        assert_eq!(meta.header_row, Some(3));
        assert_eq!(meta.from, NaiveDate::from_ymd_opt(2025, 4, 1));
        assert_eq!(meta.to, NaiveDate::from_ymd_opt(2025, 4, 30));

        let by_name = load_table(APRIL_XLSX, "april.xlsx", Some("Summary")).unwrap();
        assert_eq!(by_name, grid);
        match load_table(APRIL_XLSX, "april.xlsx", Some("Missing")) {
            Err(ReportError::UnreadableFile { message, .. }) => {
                assert!(message.contains("worksheet \"Missing\" not found"));
            }
            x => panic!("unexpected result {:?}", x),
        }
    }

    #[test]
    fn misnamed_workbook_is_read_with_the_other_engine() {
        let grid = load_table(APRIL_XLSX, "april.xls", None).unwrap();
        assert_eq!(grid, load_table(APRIL_XLSX, "april.xlsx", None).unwrap());
    }

    #[test]
    fn broken_workbook_is_unreadable() {
        let res = load_table(b"definitely not a zip file", "april.xlsx", None);
        match res {
            Err(ReportError::UnreadableFile { filename, message }) => {
                assert_eq!(filename, "april.xlsx");
                assert!(message.contains("retry as Xls"));
            }
            x => panic!("unexpected result {:?}", x),
        }
    }
}
