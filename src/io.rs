//! Helpers for reading attendance exports and form tables, and for outputting ledger summaries

use std::io::{Read, Write};

use csv::Trim;
use serde::Serialize;

use crate::{
    errors::Error,
    forms::{FormLine, FormTemplate},
    ops::date_key,
    types::{
        AttendanceId, AttendanceLedger, AttendanceRecord, ImportReport, StudentDirectory,
        UnresolvedPolicy, ABSENT_STATUS,
    },
};

/// Number of columns an attendance export row must have
const ATTENDANCE_COLUMNS: usize = 3;

/// Loads attendance rows from a CSV-formatted file stream.
///
/// Every row is resolved against the supplied [`StudentDirectory`] and applied to the
/// supplied [`AttendanceLedger`]. Rows naming an unknown student are handled according to
/// `policy`.
///
/// Expects input data in this format (no header, extra columns are ignored):
/// ```csv
/// Jane Doe,  2024-03-01, presente
/// John Roe,  2024-03-01, assente
/// Jane Doe,  2024-03-02, presente
/// ```
///
/// # Errors
/// [`Error::ShortRow`] for a row with fewer than three columns, [`Error::Load`] if the stream
/// is not valid CSV, and [`Error::UnknownStudent`] under [`UnresolvedPolicy::Abort`].
pub fn load_attendance_from_csv<R, D, L>(
    reader: &mut R,
    directory: &D,
    ledger: &mut L,
    policy: UnresolvedPolicy,
) -> Result<ImportReport, Error>
where
    R: Read,
    D: StudentDirectory,
    L: AttendanceLedger,
    for<'a> &'a L: IntoIterator<Item = &'a AttendanceRecord>,
{
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);
    let mut report = ImportReport::default();
    for record in csv_reader.records() {
        let record = record?;
        if record.len() < ATTENDANCE_COLUMNS {
            return Err(Error::ShortRow {
                line: record.position().map_or(0, csv::Position::line),
                expected: ATTENDANCE_COLUMNS,
                found: record.len(),
            });
        }
        report.rows += 1;
        let (name, date, status) = (&record[0], &record[1], &record[2]);
        let Some(student) = directory.resolve(name) else {
            match policy {
                UnresolvedPolicy::Abort => return Err(Error::UnknownStudent(name.to_owned())),
                UnresolvedPolicy::Collect => {
                    tracing::debug!(name, date, "skipping row for unknown student");
                    report.unresolved.insert(name.to_owned());
                    continue;
                }
            }
        };
        ledger.upsert(
            date_key(date),
            student.id(),
            student.gender(),
            status != ABSENT_STATUS,
        );
        report.applied += 1;
    }
    Ok(report)
}

/// Loads the rows of a form table from a CSV-formatted file stream.
///
/// The first row holds the column names. See [`FormTemplate::line`] for how each following row
/// becomes a [`FormLine`]. Every row is checked before any line is returned.
pub fn load_form_lines_from_csv<R>(
    reader: &mut R,
    template: &FormTemplate,
) -> Result<Vec<FormLine>, Error>
where
    R: Read,
{
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let mut lines = Vec::new();
    for record in csv_reader.records() {
        lines.push(template.line(&headers, &record?)?);
    }
    Ok(lines)
}

/// Type used for serializing an [`AttendanceRecord`] as a single summary row
#[derive(Serialize, Debug)]
struct RecordSummary<'a> {
    /// Date of the record
    date: &'a str,
    /// Remote identifier, empty if the record would be created
    id: Option<AttendanceId>,
    /// Male students present
    male: u32,
    /// Female students present
    female: u32,
    /// Register entries marked present
    present: usize,
    /// Register entries marked absent
    absent: usize,
}

impl<'a> From<&'a AttendanceRecord> for RecordSummary<'a> {
    fn from(record: &'a AttendanceRecord) -> Self {
        let present = record
            .register()
            .iter()
            .filter(|entry| entry.is_present())
            .count();
        Self {
            date: date_key(record.date()),
            id: record.remote_id(),
            male: record.male_count(),
            female: record.female_count(),
            present,
            absent: record.register().len() - present,
        }
    }
}

/// Outputs a summary of the supplied ledger to CSV, one row per record.
///
/// Output data will be in the form:
/// ```csv
/// date,id,male,female,present,absent
/// 2024-03-01,42,1,1,2,0
/// 2024-03-02,,0,1,1,1
/// ```
pub fn write_ledger_to_csv<W, L>(writer: &mut W, ledger: &L) -> Result<(), Error>
where
    W: Write,
    for<'a> &'a L: IntoIterator<Item = &'a AttendanceRecord>,
{
    let mut csv_writer = csv::Writer::from_writer(writer);
    for record in ledger {
        csv_writer.serialize(RecordSummary::from(record))?;
    }
    csv_writer.flush().map_err(csv::Error::from)?;
    Ok(())
}
