use crate::types::{
    AttendanceLedger, AttendanceRecord, ClassId, CountPolicy, Gender, MemoryDirectory,
    MemoryLedger, PresenceEntry, Student, StudentDirectory, StudentId,
};

/// Normalizes a free-text student name into a directory lookup key.
///
/// Trims, lowercases, and replaces double spaces with single ones in two passes. Runs of five
/// or more spaces are therefore not reduced to a single space.
#[must_use]
pub fn canonicalize_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .replace("  ", " ")
        .replace("  ", " ")
}

/// Returns the ledger key for a date, dropping any time-of-day suffix
pub(crate) fn date_key(date: &str) -> &str {
    date.get(..10).unwrap_or(date)
}

impl AttendanceRecord {
    /// Sets the presence of a student, keeping the per-gender totals in step.
    ///
    /// Totals only move when the student is added as present, or when an existing entry
    /// flips, so applying the same presence again changes nothing.
    pub(crate) fn set_presence(&mut self, student_id: StudentId, gender: Gender, present: bool) {
        match self
            .register
            .iter()
            .position(|entry| entry.student_id == student_id)
        {
            Some(index) => {
                let entry = &mut self.register[index];
                if entry.present == present {
                    return;
                }
                entry.present = present;
                self.count(gender, present);
            }
            None => {
                self.register.push(PresenceEntry {
                    student_id,
                    present,
                });
                if present {
                    self.count(gender, true);
                }
            }
        }
    }

    /// Adds (or removes) one student of the given gender to the present totals
    fn count(&mut self, gender: Gender, present: bool) {
        let total = match gender {
            Gender::Male => &mut self.male_count,
            Gender::Female => &mut self.female_count,
            Gender::Unspecified => return,
        };
        if present {
            *total += 1;
        } else {
            // Remote totals kept under CountPolicy::KeepRemote may be lower than the register says
            *total = total.saturating_sub(1);
        }
    }

    /// Resets the per-gender totals and recounts them from the register
    fn recount<D: StudentDirectory>(&mut self, directory: &D) {
        self.male_count = 0;
        self.female_count = 0;
        let genders: Vec<Gender> = self
            .register
            .iter()
            .filter(|entry| entry.present)
            .filter_map(|entry| directory.student_by_id(entry.student_id))
            .map(Student::gender)
            .collect();
        for gender in genders {
            self.count(gender, true);
        }
    }
}

/// Does the work of seeding a ledger with fetched records.
///
/// Records of other classes are skipped. Records keep their date as sent; only the ledger key
/// is cut to the first 10 characters.
pub(crate) fn seed_ledger<L, D>(
    ledger: &mut L,
    records: Vec<AttendanceRecord>,
    counts: CountPolicy,
    directory: &D,
) -> usize
where
    L: AttendanceLedger,
    for<'a> &'a L: IntoIterator<Item = &'a AttendanceRecord>,
    D: StudentDirectory,
{
    let class_id = ledger.class_id();
    let mut seeded = 0;
    for mut record in records {
        if record.class_id != class_id {
            continue;
        }
        if counts == CountPolicy::Recompute {
            record.recount(directory);
        }
        tracing::debug!(
            date = %record.date,
            id = ?record.id,
            male = record.male_count,
            female = record.female_count,
            "seeded attendance record"
        );
        ledger.insert(record);
        seeded += 1;
    }
    seeded
}

impl StudentDirectory for MemoryDirectory {
    fn insert(&mut self, student: Student) -> Option<Student> {
        self.by_id.insert(student.id, student.clone());
        self.by_name
            .insert(canonicalize_name(&student.name), student)
    }

    fn student(&self, key: &str) -> Option<&Student> {
        self.by_name.get(key)
    }

    fn student_by_id(&self, student_id: StudentId) -> Option<&Student> {
        self.by_id.get(&student_id)
    }
}

impl AttendanceLedger for MemoryLedger {
    fn class_id(&self) -> ClassId {
        self.class_id
    }

    fn record(&self, date: &str) -> Option<&AttendanceRecord> {
        self.records.get(date)
    }

    fn record_mut(&mut self, date: &str) -> &mut AttendanceRecord {
        let (class_id, created_by) = (self.class_id, self.created_by);
        self.records
            .entry(date.to_owned())
            .or_insert_with(|| AttendanceRecord::new(date, class_id, created_by))
    }

    fn insert(&mut self, record: AttendanceRecord) {
        self.records
            .insert(date_key(&record.date).to_owned(), record);
    }
}

impl<'a> IntoIterator for &'a MemoryLedger {
    type Item = &'a AttendanceRecord;

    type IntoIter = std::collections::btree_map::Values<'a, String, AttendanceRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.values()
    }
}

impl IntoIterator for MemoryLedger {
    type Item = AttendanceRecord;
    type IntoIter = std::collections::btree_map::IntoValues<String, AttendanceRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_values()
    }
}

#[cfg(test)]
mod tests {
    use crate::types::{AttendanceId, UserId};

    use super::*;

    fn class() -> ClassId {
        ClassId::from(7)
    }

    fn directory() -> MemoryDirectory {
        let mut directory = MemoryDirectory::new();
        directory.load([
            Student::new(1.into(), "Jane Doe", class(), Gender::Female),
            Student::new(2.into(), "John Roe", class(), Gender::Male),
            Student::new(3.into(), "Alex Poe", class(), Gender::Unspecified),
        ]);
        directory
    }

    fn remote(id: u64, class_id: ClassId, date: &str, register: &[(u64, bool)]) -> AttendanceRecord {
        AttendanceRecord {
            id: Some(AttendanceId::from(id)),
            created_by: UserId::from(9),
            class_id,
            male_count: 5,
            female_count: 5,
            date: date.to_owned(),
            register: register
                .iter()
                .map(|&(student_id, present)| PresenceEntry {
                    student_id: student_id.into(),
                    present,
                })
                .collect(),
        }
    }

    #[test]
    fn test_canonicalize_trims_and_lowercases() {
        assert_eq!(canonicalize_name("  Jane DOE \t"), "jane doe");
        assert_eq!(canonicalize_name(""), "");
        assert_eq!(canonicalize_name("   "), "");
    }

    #[test]
    fn test_canonicalize_collapses_short_space_runs() {
        assert_eq!(canonicalize_name("Jane  Doe"), "jane doe");
        assert_eq!(canonicalize_name("Jane   Doe"), "jane doe");
        assert_eq!(canonicalize_name("Jane    Doe"), "jane doe");
    }

    #[test]
    fn test_canonicalize_leaves_long_space_runs() {
        assert_eq!(canonicalize_name("Jane     Doe"), "jane  doe");
        assert_ne!(
            canonicalize_name("Jane     Doe"),
            canonicalize_name(&canonicalize_name("Jane     Doe"))
        );
    }

    #[test]
    fn test_directory_resolves_by_canonical_name() {
        let directory = directory();
        let student = directory.resolve(" JANE  doe").unwrap();
        assert_eq!(student.id(), StudentId::from(1));
        assert!(directory.resolve("Janet Doe").is_none());
        assert_eq!(
            directory.student_by_id(2.into()).unwrap().gender(),
            Gender::Male
        );
    }

    #[test]
    fn test_directory_collision_last_wins() {
        let mut directory = MemoryDirectory::new();
        let loaded = directory.load([
            Student::new(1.into(), "Sam Lee", class(), Gender::Male),
            Student::new(8.into(), "sam  LEE", class(), Gender::Female),
        ]);
        assert_eq!(loaded, 2);
        let student = directory.resolve("Sam Lee").unwrap();
        assert_eq!(student.id(), StudentId::from(8));
        assert_eq!(student.gender(), Gender::Female);
    }

    #[test]
    fn test_upsert_creates_record_on_demand() {
        let mut ledger = MemoryLedger::new(class(), UserId::from(1));
        ledger.upsert("2024-03-01", 1.into(), Gender::Female, true);
        let record = ledger.record("2024-03-01").unwrap();
        assert_eq!(record.remote_id(), None);
        assert_eq!(record.class_id(), class());
        assert_eq!(record.female_count(), 1);
        assert_eq!(record.male_count(), 0);
        assert_eq!(record.presence(1.into()), Some(true));
    }

    #[test]
    fn test_upsert_absent_is_not_counted() {
        let mut ledger = MemoryLedger::new(class(), UserId::from(1));
        ledger.upsert("2024-03-01", 2.into(), Gender::Male, false);
        let record = ledger.record("2024-03-01").unwrap();
        assert_eq!(record.male_count(), 0);
        assert_eq!(record.presence(2.into()), Some(false));
    }

    #[test]
    fn test_repeated_upsert_does_not_double_count() {
        let mut ledger = MemoryLedger::new(class(), UserId::from(1));
        ledger.upsert("2024-03-01", 2.into(), Gender::Male, true);
        ledger.upsert("2024-03-01", 2.into(), Gender::Male, true);
        let record = ledger.record("2024-03-01").unwrap();
        assert_eq!(record.male_count(), 1);
        assert_eq!(record.register().len(), 1);
    }

    #[test]
    fn test_upsert_flip_adjusts_counts() {
        let mut ledger = MemoryLedger::new(class(), UserId::from(1));
        ledger.upsert("2024-03-01", 1.into(), Gender::Female, true);
        ledger.upsert("2024-03-01", 1.into(), Gender::Female, false);
        assert_eq!(ledger.record("2024-03-01").unwrap().female_count(), 0);
        ledger.upsert("2024-03-01", 1.into(), Gender::Female, true);
        let record = ledger.record("2024-03-01").unwrap();
        assert_eq!(record.female_count(), 1);
        assert_eq!(record.register().len(), 1);
    }

    #[test]
    fn test_unspecified_gender_is_never_counted() {
        let mut ledger = MemoryLedger::new(class(), UserId::from(1));
        ledger.upsert("2024-03-01", 3.into(), Gender::Unspecified, true);
        let record = ledger.record("2024-03-01").unwrap();
        assert_eq!((record.male_count(), record.female_count()), (0, 0));
        assert_eq!(record.presence(3.into()), Some(true));
    }

    #[test]
    fn test_seed_skips_other_classes_and_truncates_dates() {
        let mut ledger = MemoryLedger::new(class(), UserId::from(1));
        let seeded = ledger.seed(
            vec![
                remote(42, class(), "2024-03-01T08:00:00Z", &[]),
                remote(43, ClassId::from(8), "2024-03-02", &[]),
            ],
            CountPolicy::Recompute,
            &directory(),
        );
        assert_eq!(seeded, 1);
        assert_eq!(ledger.len(), 1);
        let record = ledger.record("2024-03-01").unwrap();
        assert_eq!(record.remote_id(), Some(AttendanceId::from(42)));
        assert_eq!(record.date(), "2024-03-01T08:00:00Z");
        assert!(ledger.record("2024-03-02").is_none());
    }

    #[test]
    fn test_seed_recompute_counts_from_register() {
        let mut ledger = MemoryLedger::new(class(), UserId::from(1));
        ledger.seed(
            vec![remote(
                42,
                class(),
                "2024-03-01",
                &[(1, true), (2, false), (3, true), (99, true)],
            )],
            CountPolicy::Recompute,
            &directory(),
        );
        let record = ledger.record("2024-03-01").unwrap();
        assert_eq!(record.female_count(), 1);
        assert_eq!(record.male_count(), 0);

        // Re-marking an already present student leaves the recount alone
        ledger.upsert("2024-03-01", 1.into(), Gender::Female, true);
        assert_eq!(ledger.record("2024-03-01").unwrap().female_count(), 1);
        ledger.upsert("2024-03-01", 2.into(), Gender::Male, true);
        assert_eq!(ledger.record("2024-03-01").unwrap().male_count(), 1);
    }

    #[test]
    fn test_seed_keep_remote_counts() {
        let mut ledger = MemoryLedger::new(class(), UserId::from(1));
        ledger.seed(
            vec![remote(42, class(), "2024-03-01", &[(1, true)])],
            CountPolicy::KeepRemote,
            &directory(),
        );
        let record = ledger.record("2024-03-01").unwrap();
        assert_eq!((record.male_count(), record.female_count()), (5, 5));

        ledger.upsert("2024-03-01", 2.into(), Gender::Male, true);
        ledger.upsert("2024-03-01", 1.into(), Gender::Female, false);
        let record = ledger.record("2024-03-01").unwrap();
        assert_eq!((record.male_count(), record.female_count()), (6, 4));
    }

    #[test]
    fn test_upsert_reaches_seeded_record_with_time_suffix() {
        let mut ledger = MemoryLedger::new(class(), UserId::from(1));
        ledger.seed(
            vec![remote(42, class(), "2024-03-01T08:00:00Z", &[])],
            CountPolicy::Recompute,
            &directory(),
        );
        ledger.upsert("2024-03-01", 1.into(), Gender::Female, true);
        assert_eq!(ledger.len(), 1);
        let record = ledger.record("2024-03-01").unwrap();
        assert_eq!(record.date(), "2024-03-01T08:00:00Z");
        assert_eq!(record.female_count(), 1);
    }

    #[test]
    fn test_ledger_iterates_in_date_order() {
        let mut ledger = MemoryLedger::new(class(), UserId::from(1));
        ledger.upsert("2024-03-05", 1.into(), Gender::Female, true);
        ledger.upsert("2024-02-28", 1.into(), Gender::Female, true);
        ledger.upsert("2024-03-01", 1.into(), Gender::Female, true);
        let dates: Vec<&str> = (&ledger).into_iter().map(AttendanceRecord::date).collect();
        assert_eq!(dates, ["2024-02-28", "2024-03-01", "2024-03-05"]);
    }
}
