//! One attendance synchronization run: fetch, import, push

use std::{collections::BTreeSet, io::Read};

use crate::{
    client::AttendanceApi,
    errors::Error,
    io,
    types::{
        AttendanceLedger, ClassId, CountPolicy, ImportReport, MemoryDirectory, MemoryLedger,
        StudentDirectory, UnresolvedPolicy, UserId, DEFAULT_CREATOR,
    },
};

/// Settings of a synchronization run
#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    /// The only class whose records are fetched, imported and pushed
    pub class_id: ClassId,
    /// Creator of records that do not exist remotely yet
    pub created_by: UserId,
    /// What to do with export rows naming an unknown student
    pub unresolved: UnresolvedPolicy,
    /// How the totals of fetched records are treated
    pub counts: CountPolicy,
}

impl SyncOptions {
    /// Options for a class, with the default policies
    #[must_use]
    pub fn new(class_id: ClassId) -> Self {
        Self {
            class_id,
            created_by: DEFAULT_CREATOR.into(),
            unresolved: UnresolvedPolicy::default(),
            counts: CountPolicy::default(),
        }
    }
}

/// Number of records pushed to the service, by call
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PushReport {
    /// Records created with a POST
    pub created: usize,
    /// Records updated with a PATCH
    pub updated: usize,
}

/// The state of one run.
///
/// Stages must be called in order: [`fetch`](Self::fetch), then
/// [`import_csv`](Self::import_csv) (any number of times), then [`push`](Self::push).
#[derive(Debug)]
pub struct Reconciliation {
    options: SyncOptions,
    directory: MemoryDirectory,
    ledger: MemoryLedger,
    unresolved: BTreeSet<String>,
}

impl Reconciliation {
    /// Creates an empty run
    #[must_use]
    pub fn new(options: SyncOptions) -> Self {
        Self {
            options,
            directory: MemoryDirectory::new(),
            ledger: MemoryLedger::new(options.class_id, options.created_by),
            unresolved: BTreeSet::new(),
        }
    }

    /// Loads the student directory, then seeds the ledger with the class's existing records
    pub fn fetch<A: AttendanceApi>(&mut self, api: &A) -> Result<(), Error> {
        tracing::info!("reading student list");
        let students = api.students()?;
        for student in students
            .iter()
            .filter(|student| student.class_id() == self.options.class_id)
        {
            tracing::debug!(id = %student.id(), name = student.name(), "student in class");
        }
        let loaded = self.directory.load(students);
        tracing::info!(loaded, "student directory ready");

        tracing::info!("reading attendance list");
        let records = api.attendances()?;
        let fetched = records.len();
        let seeded = self
            .ledger
            .seed(records, self.options.counts, &self.directory);
        tracing::info!(fetched, seeded, class = %self.options.class_id, "attendance ledger seeded");
        Ok(())
    }

    /// Applies an attendance export to the ledger. Unresolved names accumulate across calls.
    pub fn import_csv<R: Read>(&mut self, reader: &mut R) -> Result<ImportReport, Error> {
        tracing::info!("reading attendance data from csv");
        let report = io::load_attendance_from_csv(
            reader,
            &self.directory,
            &mut self.ledger,
            self.options.unresolved,
        )?;
        for name in &report.unresolved {
            tracing::warn!(name = name.as_str(), "student could not be found");
        }
        self.unresolved.extend(report.unresolved.iter().cloned());
        tracing::info!(rows = report.rows, applied = report.applied, "csv imported");
        Ok(report)
    }

    /// Creates or updates every record of the ledger, in date order.
    ///
    /// Stops at the first failure. Records pushed before it stay pushed.
    pub fn push<A: AttendanceApi>(&self, api: &A) -> Result<PushReport, Error> {
        tracing::info!(records = self.ledger.len(), "posting/patching attendances");
        let mut report = PushReport::default();
        for record in &self.ledger {
            match record.remote_id() {
                Some(id) => {
                    tracing::debug!(date = record.date(), %id, "updating attendance");
                    api.update_attendance(id, record)?;
                    report.updated += 1;
                }
                None => {
                    tracing::debug!(date = record.date(), "creating attendance");
                    api.create_attendance(record)?;
                    report.created += 1;
                }
            }
        }
        tracing::info!(
            created = report.created,
            updated = report.updated,
            "attendances synchronized"
        );
        Ok(report)
    }

    /// Returns the options of this run
    #[must_use]
    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Returns the student directory
    #[must_use]
    pub fn directory(&self) -> &MemoryDirectory {
        &self.directory
    }

    /// Returns the attendance ledger
    #[must_use]
    pub fn ledger(&self) -> &MemoryLedger {
        &self.ledger
    }

    /// Returns every name that could not be resolved so far
    #[must_use]
    pub fn unresolved(&self) -> &BTreeSet<String> {
        &self.unresolved
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, io::Cursor};

    use crate::types::{
        AttendanceId, AttendanceRecord, Gender, PresenceEntry, Student, StudentId,
    };

    use super::*;

    #[derive(Debug, PartialEq)]
    enum Call {
        Create(AttendanceRecord),
        Update(AttendanceId, AttendanceRecord),
    }

    #[derive(Default)]
    struct FakeApi {
        students: Vec<Student>,
        attendances: Vec<AttendanceRecord>,
        calls: RefCell<Vec<Call>>,
    }

    impl AttendanceApi for FakeApi {
        fn students(&self) -> Result<Vec<Student>, Error> {
            Ok(self.students.clone())
        }

        fn attendances(&self) -> Result<Vec<AttendanceRecord>, Error> {
            Ok(self.attendances.clone())
        }

        fn create_attendance(&self, record: &AttendanceRecord) -> Result<(), Error> {
            self.calls.borrow_mut().push(Call::Create(record.clone()));
            Ok(())
        }

        fn update_attendance(&self, id: AttendanceId, record: &AttendanceRecord) -> Result<(), Error> {
            self.calls
                .borrow_mut()
                .push(Call::Update(id, record.clone()));
            Ok(())
        }
    }

    fn api() -> FakeApi {
        FakeApi {
            students: vec![Student::new(
                1.into(),
                "Jane Doe",
                ClassId::from(7),
                Gender::Female,
            )],
            ..FakeApi::default()
        }
    }

    fn run(api: &FakeApi, options: SyncOptions, csv: &str) -> Result<PushReport, Error> {
        let mut run = Reconciliation::new(options);
        run.fetch(api)?;
        run.import_csv(&mut Cursor::new(csv.as_bytes()))?;
        run.push(api)
    }

    #[test]
    fn test_present_student_is_created() {
        let api = api();
        let report = run(
            &api,
            SyncOptions::new(7.into()),
            "Jane Doe,2024-03-01,presente\n",
        )
        .unwrap();
        assert_eq!(report, PushReport { created: 1, updated: 0 });
        let calls = api.calls.borrow();
        let Call::Create(record) = &calls[0] else {
            panic!("Expected a create call, got {calls:?}");
        };
        assert_eq!(record.date(), "2024-03-01");
        assert_eq!((record.male_count(), record.female_count()), (0, 1));
        assert_eq!(
            record.register(),
            [PresenceEntry {
                student_id: StudentId::from(1),
                present: true
            }]
        );
    }

    #[test]
    fn test_absent_student_is_not_counted() {
        let api = api();
        run(
            &api,
            SyncOptions::new(7.into()),
            "Jane Doe,2024-03-01,assente\n",
        )
        .unwrap();
        let calls = api.calls.borrow();
        let Call::Create(record) = &calls[0] else {
            panic!("Expected a create call, got {calls:?}");
        };
        assert_eq!(record.female_count(), 0);
        assert_eq!(record.presence(1.into()), Some(false));
    }

    #[test]
    fn test_existing_record_is_updated() {
        let mut api = api();
        let mut existing = AttendanceRecord::new("2024-03-01T00:00:00", 7.into(), 4.into());
        existing.id = Some(42.into());
        api.attendances = vec![existing];
        let report = run(
            &api,
            SyncOptions::new(7.into()),
            "Jane Doe,2024-03-01,presente\n",
        )
        .unwrap();
        assert_eq!(report, PushReport { created: 0, updated: 1 });
        let calls = api.calls.borrow();
        let Call::Update(id, record) = &calls[0] else {
            panic!("Expected an update call, got {calls:?}");
        };
        assert_eq!(*id, AttendanceId::from(42));
        assert_eq!(record.date(), "2024-03-01T00:00:00");
        assert_eq!(record.female_count(), 1);
    }

    #[test]
    fn test_unresolved_name_is_collected() {
        let api = api();
        let mut run = Reconciliation::new(SyncOptions::new(7.into()));
        run.fetch(&api).unwrap();
        run.import_csv(&mut Cursor::new(
            &b"Jane Doe,2024-03-01,presente\nMark Twain,2024-03-01,presente\n"[..],
        ))
        .unwrap();
        assert!(run.unresolved().contains("Mark Twain"));
        let report = run.push(&api).unwrap();
        assert_eq!(report.created, 1);
    }

    #[test]
    fn test_unresolved_name_aborts_before_push() {
        let api = api();
        let options = SyncOptions {
            unresolved: UnresolvedPolicy::Abort,
            ..SyncOptions::new(7.into())
        };
        let err = run(
            &api,
            options,
            "Jane Doe,2024-03-01,presente\nMark Twain,2024-03-01,presente\n",
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnknownStudent(name) if name == "Mark Twain"));
        assert!(api.calls.borrow().is_empty());
    }

    #[test]
    fn test_other_class_records_are_never_pushed() {
        let mut api = api();
        let mut foreign = AttendanceRecord::new("2024-03-01", 8.into(), 4.into());
        foreign.id = Some(50.into());
        api.attendances = vec![foreign];
        let report = run(&api, SyncOptions::new(7.into()), "").unwrap();
        assert_eq!(report, PushReport::default());
        assert!(api.calls.borrow().is_empty());
    }
}
