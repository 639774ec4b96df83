// Mapping the columns of a report onto the member records.

use chrono::NaiveDate;

use crate::report::io_common::*;
use crate::report::metadata::ReportMetadata;
use crate::report::*;

/// The columns that a main report can provide.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
enum Field {
    FirstName,
    LastName,
    P,
    A,
    L,
    M,
    S,
    Rgi,
    Rgo,
    Rri,
    Rro,
    V,
    OneToOne,
    Tyfcb,
    Ceu,
    T,
}

const ALL_FIELDS: [Field; 16] = [
    Field::FirstName,
    Field::LastName,
    Field::P,
    Field::A,
    Field::L,
    Field::M,
    Field::S,
    Field::Rgi,
    Field::Rgo,
    Field::Rri,
    Field::Rro,
    Field::V,
    Field::OneToOne,
    Field::Tyfcb,
    Field::Ceu,
    Field::T,
];

impl Field {
    fn column_name(&self) -> &'static str {
        match self {
            Field::FirstName => "First Name",
            Field::LastName => "Last Name",
            Field::P => "P",
            Field::A => "A",
            Field::L => "L",
            Field::M => "M",
            Field::S => "S",
            Field::Rgi => "RGI",
            Field::Rgo => "RGO",
            Field::Rri => "RRI",
            Field::Rro => "RRO",
            Field::V => "V",
            Field::OneToOne => "1-2-1",
            Field::Tyfcb => "TYFCB",
            Field::Ceu => "CEU",
            Field::T => "T",
        }
    }

    fn set(&self, record: &mut MemberRecord, value: f64) {
        let slot = match self {
            Field::FirstName | Field::LastName => return,
            Field::P => &mut record.p,
            Field::A => &mut record.a,
            Field::L => &mut record.l,
            Field::M => &mut record.m,
            Field::S => &mut record.s,
            Field::Rgi => &mut record.rgi,
            Field::Rgo => &mut record.rgo,
            Field::Rri => &mut record.rri,
            Field::Rro => &mut record.rro,
            Field::V => &mut record.v,
            Field::OneToOne => &mut record.one_to_one,
            Field::Tyfcb => &mut record.tyfcb,
            Field::Ceu => &mut record.ceu,
            Field::T => &mut record.t,
        };
        *slot = value;
    }
}

/// Resolves a header cell to a field. Matching ignores case and surrounding
/// whitespace, and accepts a few alternative spellings.
fn canonical_field(header: &str) -> Option<Field> {
    let h = header.trim().to_lowercase();
    let direct = ALL_FIELDS
        .iter()
        .find(|f| f.column_name().to_lowercase() == h)
        .cloned();
    direct.or(match h.as_str() {
        "firstname" | "first" | "first_name" => Some(Field::FirstName),
        "lastname" | "last" | "last_name" => Some(Field::LastName),
        "121" | "1-2-1s" | "one to one" => Some(Field::OneToOne),
        "visitors" => Some(Field::V),
        "testimonials" => Some(Field::T),
        "business" => Some(Field::Tyfcb),
        _ => None,
    })
}

/// Converts a cell to a number. Blank and invalid values are 0.
///
/// Text is trimmed and the thousands separators are removed. Inner spaces make
/// the value invalid.
pub fn coerce_number(cell: &Cell) -> f64 {
    match cell {
        Cell::Number(f) if f.is_finite() => *f,
        Cell::Text(s) => {
            let cleaned: String = s.trim().replace(',', "");
            match cleaned.parse::<f64>() {
                Ok(f) if f.is_finite() => f,
                _ => 0.0,
            }
        }
        _ => 0.0,
    }
}

/// A main report after normalization.
#[derive(PartialEq, Debug, Clone)]
pub struct NormalizedReport {
    pub records: Vec<MemberRecord>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub weeks: f64,
    pub months: f64,
    /// Rows skipped because both names were empty.
    pub dropped_rows: usize,
    /// The canonical columns that were not found in the header.
    pub missing_columns: Vec<&'static str>,
}

/// Reads the member rows below the header row found by the metadata scan.
pub fn normalize(grid: &Grid, meta: &ReportMetadata) -> ReportResult<NormalizedReport> {
    let header_idx = match meta.header_row {
        Some(x) => x,
        None => whatever!("normalize: the header row is not known"),
    };
    let header = match grid.get(header_idx) {
        Some(h) => h,
        None => whatever!("normalize: header row {} is out of the table", header_idx),
    };

    // The first column matching a field wins.
    let mut columns: Vec<(Field, usize)> = Vec::new();
    for (cidx, cell) in header.iter().enumerate() {
        if let Some(field) = canonical_field(&cell.text()) {
            if !columns.iter().any(|(f, _)| *f == field) {
                columns.push((field, cidx));
            }
        }
    }
    let missing_columns: Vec<&'static str> = ALL_FIELDS
        .iter()
        .filter(|f| !columns.iter().any(|(x, _)| x == *f))
        .map(|f| f.column_name())
        .collect();
    if !missing_columns.is_empty() {
        debug!("normalize: missing columns: {:?}", missing_columns);
    }
    debug!("normalize: columns: {:?}", columns);

    let column_of = |field: Field| {
        columns
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, idx)| *idx)
    };
    let first_idx = column_of(Field::FirstName);
    let last_idx = column_of(Field::LastName);

    let mut records: Vec<MemberRecord> = Vec::new();
    let mut dropped_rows: usize = 0;
    for (ridx, row) in grid.iter().enumerate().skip(header_idx + 1) {
        let first = first_idx.map(|i| cell_at(row, i).text()).unwrap_or_default();
        let last = last_idx.map(|i| cell_at(row, i).text()).unwrap_or_default();
        if first.trim().is_empty() && last.trim().is_empty() {
            if row.iter().any(|c| !c.is_blank()) {
                debug!("normalize: row {}: no member name, skipping {:?}", ridx, row);
            }
            dropped_rows += 1;
            continue;
        }
        let mut record = MemberRecord::new(&first, &last);
        for (field, cidx) in columns.iter() {
            field.set(&mut record, coerce_number(cell_at(row, *cidx)));
        }
        debug!("normalize: row {}: {:?}", ridx, record);
        records.push(record);
    }
    if dropped_rows > 0 {
        info!("normalize: {} rows without a member name", dropped_rows);
    }

    Ok(NormalizedReport {
        records,
        from: meta.from,
        to: meta.to,
        weeks: meta.total_weeks(),
        months: meta.total_months(),
        dropped_rows,
        missing_columns,
    })
}
