//! Common datatypes shared by the attendance reconciler and the form uploader

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt::Display,
};

use serde::{Deserialize, Serialize};

use crate::ops;

/// Status word used by the attendance export to mark a student as absent.
/// Any other status counts as present.
pub const ABSENT_STATUS: &str = "assente";

/// Creator assigned to attendance records created by this tool (the admin user)
pub const DEFAULT_CREATOR: u64 = 1;

/// Unique identifier for a student
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StudentId(u64);

impl From<u64> for StudentId {
    fn from(student_id: u64) -> Self {
        Self(student_id)
    }
}

impl Display for StudentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a class
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(u64);

impl From<u64> for ClassId {
    fn from(class_id: u64) -> Self {
        Self(class_id)
    }
}

impl Display for ClassId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Remote identifier of an attendance record
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttendanceId(u64);

impl From<u64> for AttendanceId {
    fn from(attendance_id: u64) -> Self {
        Self(attendance_id)
    }
}

impl Display for AttendanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the user that created a record on the remote service
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct UserId(u64);

impl From<u64> for UserId {
    fn from(user_id: u64) -> Self {
        Self(user_id)
    }
}

/// Gender of a student. The remote service spells it `m` or `f`.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(from = "Option<String>")]
pub enum Gender {
    /// Counted in an attendance record's `male` total
    Male,
    /// Counted in an attendance record's `female` total
    Female,
    /// Anything else the service sends; never counted
    Unspecified,
}

impl From<Option<String>> for Gender {
    fn from(gender: Option<String>) -> Self {
        match gender.as_deref() {
            Some("m") => Self::Male,
            Some("f") => Self::Female,
            _ => Self::Unspecified,
        }
    }
}

/// A student as listed by the remote service
#[derive(Debug, Deserialize, Clone)]
pub struct Student {
    /// Unique identifier for this student
    pub(crate) id: StudentId,
    /// Display name, matched against the names in the attendance export
    #[serde(rename = "identifier")]
    pub(crate) name: String,
    /// Class the student is enrolled in
    #[serde(rename = "student_class_id")]
    pub(crate) class_id: ClassId,
    /// Used to keep the per-gender totals of attendance records
    pub(crate) gender: Gender,
}

impl Student {
    /// Creates a new student record
    #[must_use]
    pub fn new(id: StudentId, name: impl Into<String>, class_id: ClassId, gender: Gender) -> Self {
        Self {
            id,
            name: name.into(),
            class_id,
            gender,
        }
    }

    /// Returns the unique identifier for the student
    #[must_use]
    #[inline]
    pub fn id(&self) -> StudentId {
        self.id
    }

    /// Returns the student's display name
    #[must_use]
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the class the student belongs to
    #[must_use]
    #[inline]
    pub fn class_id(&self) -> ClassId {
        self.class_id
    }

    /// Returns the student's gender
    #[must_use]
    #[inline]
    pub fn gender(&self) -> Gender {
        self.gender
    }
}

/// Whether one student attended on the date of the enclosing [`AttendanceRecord`]
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct PresenceEntry {
    #[serde(rename = "id")]
    pub(crate) student_id: StudentId,
    #[serde(rename = "attendant")]
    pub(crate) present: bool,
}

impl PresenceEntry {
    /// Returns the student this entry refers to
    #[must_use]
    #[inline]
    pub fn student_id(&self) -> StudentId {
        self.student_id
    }

    /// Returns whether the student was present
    #[must_use]
    #[inline]
    pub fn is_present(&self) -> bool {
        self.present
    }
}

/// The attendance register of one class on one date.
///
/// The same type is used on the wire, for both the remote listing and the
/// create/update request bodies.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AttendanceRecord {
    /// Remote identifier. Absent (or zero) until the record has been created remotely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) id: Option<AttendanceId>,
    #[serde(
        rename = "created_by_id",
        default,
        deserialize_with = "deserialize_null_default"
    )]
    pub(crate) created_by: UserId,
    #[serde(rename = "student_class_id")]
    pub(crate) class_id: ClassId,
    /// Number of male students present
    #[serde(rename = "male", default, deserialize_with = "deserialize_null_default")]
    pub(crate) male_count: u32,
    /// Number of female students present
    #[serde(rename = "female", default, deserialize_with = "deserialize_null_default")]
    pub(crate) female_count: u32,
    /// As sent by the service, which may append a time of day to `YYYY-MM-DD`.
    /// Ledgers key records by the date part only.
    #[serde(rename = "attendance_date")]
    pub(crate) date: String,
    /// At most one entry per student, in insertion order
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub(crate) register: Vec<PresenceEntry>,
}

/// Function to help [`serde`] treat an explicit `null` as the field's default value
fn deserialize_null_default<'de, D, T>(value: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(value)?.unwrap_or_default())
}

impl AttendanceRecord {
    /// Creates an empty record that does not exist remotely yet
    #[must_use]
    pub fn new(date: impl Into<String>, class_id: ClassId, created_by: UserId) -> Self {
        Self {
            id: None,
            created_by,
            class_id,
            male_count: 0,
            female_count: 0,
            date: date.into(),
            register: Vec::new(),
        }
    }

    /// Returns the remote identifier, if the record was already created remotely
    #[must_use]
    pub fn remote_id(&self) -> Option<AttendanceId> {
        self.id.filter(|id| id.0 > 0)
    }

    /// Returns the class this record belongs to
    #[must_use]
    #[inline]
    pub fn class_id(&self) -> ClassId {
        self.class_id
    }

    /// Returns the date of the record
    #[must_use]
    #[inline]
    pub fn date(&self) -> &str {
        &self.date
    }

    /// Returns the number of male students present
    #[must_use]
    #[inline]
    pub fn male_count(&self) -> u32 {
        self.male_count
    }

    /// Returns the number of female students present
    #[must_use]
    #[inline]
    pub fn female_count(&self) -> u32 {
        self.female_count
    }

    /// Returns the presence entries in insertion order
    #[must_use]
    #[inline]
    pub fn register(&self) -> &[PresenceEntry] {
        &self.register
    }

    /// Returns the recorded presence of a student, if there is an entry for them
    #[must_use]
    pub fn presence(&self, student_id: StudentId) -> Option<bool> {
        self.register
            .iter()
            .find(|entry| entry.student_id == student_id)
            .map(|entry| entry.present)
    }
}

/// What to do with an export row whose student is not in the directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnresolvedPolicy {
    /// Skip the row and report the name once the import is done
    #[default]
    Collect,
    /// Fail the import on the first unknown name
    Abort,
}

/// How the per-gender totals of remotely fetched records are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CountPolicy {
    /// Discard the remote totals and recount them from the fetched register
    #[default]
    Recompute,
    /// Keep the remote totals as the starting point
    KeepRemote,
}

/// Outcome of importing an attendance export into a ledger
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportReport {
    /// Rows read from the export
    pub rows: usize,
    /// Rows applied to the ledger
    pub applied: usize,
    /// Raw names that could not be resolved to a student
    pub unresolved: BTreeSet<String>,
}

/// An interface to the students of the remote service, looked up by name
pub trait StudentDirectory {
    /// Indexes every student, returning how many were loaded.
    ///
    /// Students whose names canonicalize to the same key overwrite each other; the last one wins.
    fn load<I>(&mut self, students: I) -> usize
    where
        I: IntoIterator<Item = Student>,
    {
        let mut loaded = 0;
        for student in students {
            self.insert(student);
            loaded += 1;
        }
        loaded
    }

    /// Adds a student, returning the one previously stored under the same name key
    fn insert(&mut self, student: Student) -> Option<Student>;

    /// Fetches a student by canonical name key
    fn student(&self, key: &str) -> Option<&Student>;

    /// Fetches a student by identifier
    fn student_by_id(&self, student_id: StudentId) -> Option<&Student>;

    /// Canonicalizes a raw name from an export and looks it up
    fn resolve(&self, raw_name: &str) -> Option<&Student> {
        self.student(&ops::canonicalize_name(raw_name))
    }
}

/// An interface to the attendance records of a single class, keyed by date
pub trait AttendanceLedger: IntoIterator<Item = AttendanceRecord>
where
    for<'a> &'a Self: IntoIterator<Item = &'a AttendanceRecord>,
    Self: Sized,
{
    /// Inserts every fetched record belonging to this ledger's class, returning how many were kept.
    ///
    /// Records are keyed by the first 10 characters of their date. See [`CountPolicy`] for how
    /// their per-gender totals are treated.
    fn seed<D>(&mut self, records: Vec<AttendanceRecord>, counts: CountPolicy, directory: &D) -> usize
    where
        D: StudentDirectory,
    {
        ops::seed_ledger(self, records, counts, directory)
    }

    /// Records the presence of a student on a date, creating the record if needed
    fn upsert(&mut self, date: &str, student_id: StudentId, gender: Gender, present: bool) {
        self.record_mut(date)
            .set_presence(student_id, gender, present);
    }

    /// Returns the class all records of this ledger belong to
    fn class_id(&self) -> ClassId;

    /// Fetches the record for a date (`YYYY-MM-DD`), if there is one
    fn record(&self, date: &str) -> Option<&AttendanceRecord>;

    /// Fetches the record for a date, returning a mutable reference. If no record exists yet,
    /// one that has not been created remotely will be added.
    fn record_mut(&mut self, date: &str) -> &mut AttendanceRecord;

    /// Stores a record under the date part of its date, replacing any record with the same key
    fn insert(&mut self, record: AttendanceRecord);
}

/// Holds all fetched students in an in-memory structure.
///
/// # Limitations
/// No persistence; the directory lives for a single run.
#[derive(Default, Debug)]
pub struct MemoryDirectory {
    /// Students keyed by canonical name
    pub(crate) by_name: HashMap<String, Student>,
    /// Students keyed by identifier
    pub(crate) by_id: HashMap<StudentId, Student>,
}

impl MemoryDirectory {
    /// Creates a new, empty [`MemoryDirectory`].
    #[must_use]
    pub fn new() -> Self {
        MemoryDirectory::default()
    }
}

/// Holds the attendance records of one class in an in-memory structure, in date order.
///
/// # Limitations
/// No persistence, and no way to delete a record.
#[derive(Debug)]
pub struct MemoryLedger {
    pub(crate) class_id: ClassId,
    /// Creator of records that are added by this ledger
    pub(crate) created_by: UserId,
    pub(crate) records: BTreeMap<String, AttendanceRecord>,
}

impl MemoryLedger {
    /// Creates a new, empty [`MemoryLedger`] for a class
    #[must_use]
    pub fn new(class_id: ClassId, created_by: UserId) -> Self {
        Self {
            class_id,
            created_by,
            records: BTreeMap::new(),
        }
    }

    /// Returns the number of records in the ledger
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns whether the ledger holds no records
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
