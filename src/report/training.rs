// Counting the training events per member.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::report::io_common::*;
use crate::report::metadata::{scan_metadata, HeaderRule};
use crate::report::*;

const FIRST_NAME_HEADERS: [&str; 4] = ["first name", "firstname", "first", "first_name"];
const LAST_NAME_HEADERS: [&str; 4] = ["last name", "lastname", "last", "last_name"];

#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct TrainingCounts {
    /// Number of events, by member key.
    pub counts: HashMap<String, u32>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl TrainingCounts {
    pub fn get(&self, name: &str) -> Option<u32> {
        self.counts.get(&normalize_name_key(name)).cloned()
    }

    pub fn total_events(&self) -> u32 {
        self.counts.values().sum()
    }

    /// The period of the training report, if both dates were readable and in
    /// order.
    pub fn period(&self) -> Option<ReportingPeriod> {
        match (self.from, self.to) {
            (Some(f), Some(t)) => ReportingPeriod::new(f, t).ok(),
            _ => None,
        }
    }

    /// The counts as (key, count) pairs, sorted by key.
    pub fn as_pairs(&self) -> Vec<(String, u32)> {
        let mut res: Vec<(String, u32)> = self
            .counts
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        res.sort();
        res
    }
}

/// The column of the first name in `names` found in the header. Earlier names
/// win over earlier columns.
fn find_column(header: &[Cell], names: &[&str]) -> Option<usize> {
    let labels: Vec<String> = header.iter().map(|c| c.label()).collect();
    names
        .iter()
        .find_map(|name| labels.iter().position(|l| l == name))
}

/// Counts one training event per data row, by member name.
pub fn reconcile_training(grid: &Grid, max_rows: usize) -> ReportResult<TrainingCounts> {
    let meta = scan_metadata(grid, HeaderRule::AnyCell, max_rows)?;
    let header_idx = match meta.header_row {
        Some(x) => x,
        None => return HeaderNotFoundSnafu { scanned: max_rows }.fail(),
    };
    let header: &[Cell] = grid.get(header_idx).map(|r| r.as_slice()).unwrap_or(&[]);
    let (first_idx, last_idx) = match (
        find_column(header, &FIRST_NAME_HEADERS),
        find_column(header, &LAST_NAME_HEADERS),
    ) {
        (Some(f), Some(l)) => (f, l),
        _ => return MissingNameColumnsSnafu {}.fail(),
    };

    let mut counts: HashMap<String, u32> = HashMap::new();
    for row in grid.iter().skip(header_idx + 1) {
        let key = normalize_name_key(&format!(
            "{} {}",
            cell_at(row, first_idx).text(),
            cell_at(row, last_idx).text()
        ));
        if key.is_empty() {
            continue;
        }
        *counts.entry(key).or_insert(0) += 1;
    }
    debug!("reconcile_training: counts: {:?}", counts);
    Ok(TrainingCounts {
        counts,
        from: meta.from,
        to: meta.to,
    })
}

/// Loads a training report and counts the events in it.
pub fn read_training(
    bytes: &[u8],
    filename: &str,
    worksheet: Option<&str>,
    max_rows: usize,
) -> ReportResult<TrainingCounts> {
    let grid = io_table::load_table(bytes, filename, worksheet)?;
    let res = reconcile_training(&grid, max_rows)?;
    info!(
        "read_training: {:?}: {} events for {} members",
        simplify_file_name(filename),
        res.total_events(),
        res.counts.len()
    );
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::io_table::load_table;
    use crate::report::metadata::TRAINING_SCAN_ROWS;

    fn load(data: &str) -> Grid {
        load_table(data.as_bytes(), "training.csv", None).unwrap()
    }

    #[test]
    fn counts_events_by_name() {
        let grid = load(
            "Training Attendance\n\
             From:,01-04-2025,To:,30-04-2025\n\
             Session,First Name,Last Name\n\
             MSP,Jane,Doe\n\
             Networking, jane ,DOE\n\
             MSP,John,Smith\n\
             ,,\n",
        );
        let res = reconcile_training(&grid, TRAINING_SCAN_ROWS).unwrap();
        assert_eq!(res.get("Jane Doe"), Some(2));
        assert_eq!(res.get("john smith"), Some(1));
        assert_eq!(res.get("Jon Smith"), None);
        assert_eq!(res.total_events(), 3);
        assert_eq!(res.period().unwrap().label(), "Apr 2025");
        assert_eq!(
            res.as_pairs(),
            vec![("jane doe".to_string(), 2), ("john smith".to_string(), 1)]
        );
    }

    #[test]
    fn header_found_late_in_the_window() {
        let mut data = String::new();
        for i in 0..40 {
            data.push_str(&format!("note {}\n", i));
        }
        data.push_str("First Name,Last Name\nJane,Doe\n");
        let res = reconcile_training(&load(&data), TRAINING_SCAN_ROWS).unwrap();
        assert_eq!(res.get("jane doe"), Some(1));
        assert_eq!(res.period(), None);
    }

    #[test]
    fn missing_header_row() {
        let grid = load("Name,Session\nJane Doe,MSP\n");
        assert!(matches!(
            reconcile_training(&grid, TRAINING_SCAN_ROWS),
            Err(ReportError::HeaderNotFound { scanned: 60 })
        ));
    }

    #[test]
    fn missing_last_name_column() {
        let grid = load("First Name,Surname\nJane,Doe\n");
        assert!(matches!(
            reconcile_training(&grid, TRAINING_SCAN_ROWS),
            Err(ReportError::MissingNameColumns {})
        ));
    }

    #[test]
    fn name_columns_resolution() {
        let header = vec![
            Cell::Text("Session".to_string()),
            Cell::Text("FirstName".to_string()),
            Cell::Text("LAST".to_string()),
        ];
        assert_eq!(find_column(&header, &FIRST_NAME_HEADERS), Some(1));
        assert_eq!(find_column(&header, &LAST_NAME_HEADERS), Some(2));
        assert_eq!(find_column(&header[..1], &LAST_NAME_HEADERS), None);
    }

    #[test]
    fn exact_name_headers_win_over_column_order() {
        let header: Vec<Cell> = ["First", "Last", "Last Name", "First Name"]
            .iter()
            .map(|s| Cell::Text(s.to_string()))
            .collect();
        assert_eq!(find_column(&header, &FIRST_NAME_HEADERS), Some(3));
        assert_eq!(find_column(&header, &LAST_NAME_HEADERS), Some(2));

        let grid = load("First,Last,Last Name,First Name
MSP,Room 2,Doe,Jane
");
        let res = reconcile_training(&grid, TRAINING_SCAN_ROWS).unwrap();
        assert_eq!(res.get("Jane Doe"), Some(1));
        assert_eq!(res.get("MSP Room 2"), None);
    }
}
