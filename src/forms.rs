//! Form-data records built from monthly report tables

use std::collections::BTreeMap;

use csv::StringRecord;
use serde::Serialize;

use crate::errors::Error;

/// Time level the form-data service uses for monthly periods
pub const MONTHLY_TIMELEVEL: u8 = 4;

/// Number of leading columns (month, year) that identify the period of a row
const PERIOD_COLUMNS: usize = 2;

/// Last day of each month, keyed by the month number as written in the tables.
///
/// February is always 28, including in leap years.
const LAST_DAY: [(&str, &str); 12] = [
    ("1", "31"),
    ("2", "28"),
    ("3", "31"),
    ("4", "30"),
    ("5", "31"),
    ("6", "30"),
    ("7", "31"),
    ("8", "31"),
    ("9", "30"),
    ("10", "31"),
    ("11", "30"),
    ("12", "31"),
];

/// Returns the last day of a month, if `month` is one of `1` to `12`
#[must_use]
pub fn last_day(month: &str) -> Option<&'static str> {
    LAST_DAY
        .iter()
        .find(|(number, _)| *number == month)
        .map(|(_, day)| *day)
}

/// One form-data record, as posted to the service
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct FormLine {
    /// Submitting user
    pub user: u64,
    /// Form schema the data belongs to
    pub schema: u64,
    /// Always [`MONTHLY_TIMELEVEL`]
    pub timelevel: u8,
    /// First day of the period, `year-month-1`
    pub date_start: String,
    /// Last day of the period, from the month-length table
    pub date_end: String,
    /// Always `false`; lines are uploaded as drafts
    pub submitted: bool,
    /// Column name to cell value, for every non-empty data cell
    pub data: BTreeMap<String, String>,
}

/// The fields shared by every form line of an upload
#[derive(Debug, Clone, Copy)]
pub struct FormTemplate {
    /// Submitting user
    pub user: u64,
    /// Form schema the data belongs to
    pub schema: u64,
}

impl FormTemplate {
    /// Builds the form line for one table row.
    ///
    /// Column 0 holds the month and column 1 the year. Every other column becomes a `data`
    /// entry named after its header, unless the cell is empty.
    ///
    /// # Errors
    /// [`Error::ShortRow`] if the row has no year column, [`Error::UnknownMonth`] if the month
    /// is not in the month-length table.
    pub fn line(&self, headers: &StringRecord, record: &StringRecord) -> Result<FormLine, Error> {
        if record.len() < PERIOD_COLUMNS {
            return Err(Error::ShortRow {
                line: record.position().map_or(0, csv::Position::line),
                expected: PERIOD_COLUMNS,
                found: record.len(),
            });
        }
        let month = record[0].trim();
        let year = record[1].trim();
        let last = last_day(month).ok_or_else(|| Error::UnknownMonth(month.to_owned()))?;

        let mut data = BTreeMap::new();
        for (index, cell) in record.iter().enumerate().skip(PERIOD_COLUMNS) {
            if cell.is_empty() {
                continue;
            }
            match headers.get(index) {
                Some(name) => {
                    data.insert(name.to_owned(), cell.to_owned());
                }
                None => tracing::warn!(index, cell, "dropping cell without a column name"),
            }
        }

        Ok(FormLine {
            user: self.user,
            schema: self.schema,
            timelevel: MONTHLY_TIMELEVEL,
            date_start: format!("{year}-{month}-1"),
            date_end: format!("{year}-{month}-{last}"),
            submitted: false,
            data,
        })
    }
}

/// An interface to the form-data service
pub trait FormApi {
    /// Creates one form-data record
    fn submit(&self, line: &FormLine) -> Result<(), Error>;
}

/// Submits lines in order, stopping at the first failure. Returns how many were submitted.
pub fn upload_form_lines<A: FormApi>(api: &A, lines: &[FormLine]) -> Result<usize, Error> {
    for (index, line) in lines.iter().enumerate() {
        tracing::debug!(index, start = %line.date_start, "submitting form line");
        api.submit(line)?;
    }
    Ok(lines.len())
}
