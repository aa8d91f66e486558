// 🎒 Student Entity - roster of students and their current membership
//
// The student's membership is *live* state: it changes through edits and
// contract cancellation. Check-ins never point at it; they copy the category
// that applied at check-in time (see `store::CheckinRecord`).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::membership::Membership;
use crate::error::{require_reason, AttendanceError, Result};

// ============================================================================
// STUDENT ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    /// Stable identity (UUID)
    pub id: String,

    /// Display name
    pub name: String,

    /// Class label (e.g. "5A")
    pub class_label: String,

    /// Current membership category
    pub membership: Membership,

    /// First day of the monthly contract
    #[serde(default)]
    pub membership_start: Option<NaiveDate>,

    /// Last day of the monthly contract (None = open-ended)
    #[serde(default)]
    pub membership_end: Option<NaiveDate>,

    /// Free-text notes, including the cancellation audit trail
    #[serde(default)]
    pub note: String,
}

impl Student {
    /// Create a student with a fresh UUID and no contract dates
    pub fn new(name: &str, class_label: &str, membership: Membership) -> Self {
        Student {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            class_label: class_label.to_string(),
            membership,
            membership_start: None,
            membership_end: None,
            note: String::new(),
        }
    }

    /// Set contract dates (builder style)
    pub fn with_contract(mut self, start: NaiveDate, end: Option<NaiveDate>) -> Self {
        self.membership_start = Some(start);
        self.membership_end = end;
        self
    }

    pub fn with_note(mut self, note: &str) -> Self {
        self.note = note.to_string();
        self
    }

    pub fn is_monthly_contract(&self) -> bool {
        self.membership == Membership::MonthlyContract
    }

    pub fn is_cancelled(&self) -> bool {
        self.membership == Membership::Cancelled
    }

    /// Whether the monthly contract covers `date`.
    ///
    /// Requires a MonthlyContract membership with a start date on or before
    /// `date` and either no end date or an end date on or after it. A contract
    /// without a start date is never active.
    pub fn is_contract_active(&self, date: NaiveDate) -> bool {
        self.is_monthly_contract()
            && self.membership_start.map_or(false, |start| start <= date)
            && self.membership_end.map_or(true, |end| end >= date)
    }
}

/// Field changes for an existing student; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentChanges {
    pub name: Option<String>,
    pub class_label: Option<String>,
    pub membership: Option<Membership>,
    pub membership_start: Option<NaiveDate>,
    /// `Some(None)` clears the end date
    pub membership_end: Option<Option<NaiveDate>>,
    pub note: Option<String>,
}

impl StudentChanges {
    fn apply_to(self, student: &mut Student) {
        if let Some(name) = self.name {
            student.name = name;
        }
        if let Some(class_label) = self.class_label {
            student.class_label = class_label;
        }
        if let Some(membership) = self.membership {
            student.membership = membership;
        }
        if let Some(start) = self.membership_start {
            student.membership_start = Some(start);
        }
        if let Some(end) = self.membership_end {
            student.membership_end = end;
        }
        if let Some(note) = self.note {
            student.note = note;
        }
    }
}

// ============================================================================
// STUDENT REGISTRY
// ============================================================================

/// In-memory roster.
///
/// Owned by a single mutator; edits go through `&mut self`.
#[derive(Debug, Clone, Default)]
pub struct StudentRegistry {
    students: Vec<Student>,
}

impl StudentRegistry {
    pub fn new() -> Self {
        StudentRegistry {
            students: Vec::new(),
        }
    }

    pub fn from_students(students: Vec<Student>) -> Self {
        StudentRegistry { students }
    }

    /// Add a student, returning its id
    pub fn add(&mut self, student: Student) -> String {
        let id = student.id.clone();
        self.students.push(student);
        id
    }

    /// Add many students at once (roster import)
    pub fn add_batch(&mut self, students: Vec<Student>) -> usize {
        let added = students.len();
        self.students.extend(students);
        added
    }

    /// Replace a student's values, keeping its identity
    pub fn update(&mut self, updated: Student) -> Result<()> {
        let slot = self
            .students
            .iter_mut()
            .find(|s| s.id == updated.id)
            .ok_or_else(|| AttendanceError::UnknownStudent(updated.id.clone()))?;
        *slot = updated;
        Ok(())
    }

    /// Apply field changes to a student, keeping its identity
    pub fn edit(&mut self, id: &str, changes: StudentChanges) -> Result<&Student> {
        let mut student = self.require(id)?.clone();
        changes.apply_to(&mut student);
        self.update(student)?;
        info!(student_id = %id, "student edited");
        self.require(id)
    }

    pub fn get(&self, id: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.id == id)
    }

    /// Like `get`, but a missing id is an error
    pub fn require(&self, id: &str) -> Result<&Student> {
        self.get(id)
            .ok_or_else(|| AttendanceError::UnknownStudent(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn all(&self) -> &[Student] {
        &self.students
    }

    /// Case-insensitive substring search on the display name
    pub fn search(&self, term: &str) -> Vec<&Student> {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.students
            .iter()
            .filter(|s| s.name.to_lowercase().contains(&needle))
            .collect()
    }

    pub fn by_membership(&self, membership: Membership) -> Vec<&Student> {
        self.students
            .iter()
            .filter(|s| s.membership == membership)
            .collect()
    }

    /// Students with a cancelled contract, latest contract end first
    /// (students without an end date last)
    pub fn cancelled(&self) -> Vec<&Student> {
        let mut cancelled = self.by_membership(Membership::Cancelled);
        cancelled.sort_by(|a, b| b.membership_end.cmp(&a.membership_end));
        cancelled
    }

    /// Roster size per membership category, in `Membership::ALL` order
    pub fn count_by_membership(&self) -> Vec<(Membership, usize)> {
        Membership::ALL
            .iter()
            .map(|m| (*m, self.students.iter().filter(|s| s.membership == *m).count()))
            .collect()
    }

    /// Cancel a monthly contract.
    ///
    /// One-way transition MonthlyContract → Cancelled. Sets the contract end
    /// date and prepends an audit line to the student's note. `today` is the
    /// date the cancellation is recorded on, `end_date` the last covered day.
    pub fn cancel_contract(
        &mut self,
        id: &str,
        end_date: NaiveDate,
        reason: &str,
        today: NaiveDate,
    ) -> Result<&Student> {
        let reason = require_reason(reason)?;
        let student = self
            .students
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| AttendanceError::UnknownStudent(id.to_string()))?;

        if !student.is_monthly_contract() {
            return Err(AttendanceError::NotMonthlyContract {
                student_id: id.to_string(),
                current: student.membership,
            });
        }

        student.membership = Membership::Cancelled;
        student.membership_end = Some(end_date);
        student.note = format!(
            "[Contract cancelled on {}] Reason: {}\n\n{}",
            today.format("%Y-%m-%d"),
            reason,
            student.note
        )
        .trim()
        .to_string();

        info!(student_id = %id, end = %end_date, "monthly contract cancelled");
        Ok(&*student)
    }

    /// Administrative wipe of the whole roster
    pub fn clear(&mut self) -> usize {
        let removed = self.students.len();
        self.students.clear();
        removed
    }

    pub fn len(&self) -> usize {
        self.students.len()
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_student_creation() {
        let student = Student::new("Ana Souza", "5A", Membership::DailyBasis);

        assert!(!student.id.is_empty());
        assert_eq!(student.name, "Ana Souza");
        assert_eq!(student.class_label, "5A");
        assert_eq!(student.membership, Membership::DailyBasis);
        assert!(student.membership_start.is_none());
        assert!(student.note.is_empty());
    }

    #[test]
    fn test_contract_active_window() {
        let student = Student::new("Bia", "3B", Membership::MonthlyContract)
            .with_contract(date(2024, 1, 1), Some(date(2024, 5, 1)));

        assert!(!student.is_contract_active(date(2023, 12, 31)));
        assert!(student.is_contract_active(date(2024, 1, 1)));
        assert!(student.is_contract_active(date(2024, 5, 1)));
        assert!(!student.is_contract_active(date(2024, 5, 2)));
    }

    #[test]
    fn test_contract_without_start_is_inactive() {
        let student = Student::new("Caio", "2C", Membership::MonthlyContract);
        assert!(!student.is_contract_active(date(2024, 6, 1)));
    }

    #[test]
    fn test_non_contract_never_active() {
        let student = Student::new("Davi", "1A", Membership::DailyBasis)
            .with_contract(date(2024, 1, 1), None);
        assert!(!student.is_contract_active(date(2024, 6, 1)));
    }

    #[test]
    fn test_registry_add_get_update() {
        let mut registry = StudentRegistry::new();
        let id = registry.add(Student::new("Eva", "4A", Membership::Observation));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&id).unwrap().name, "Eva");

        let mut edited = registry.get(&id).unwrap().clone();
        edited.class_label = "4B".to_string();
        registry.update(edited).unwrap();
        assert_eq!(registry.get(&id).unwrap().class_label, "4B");

        let ghost = Student::new("Ghost", "0", Membership::Observation);
        assert_eq!(
            registry.update(ghost.clone()),
            Err(AttendanceError::UnknownStudent(ghost.id))
        );
    }

    #[test]
    fn test_edit_changes_only_given_fields() {
        let mut registry = StudentRegistry::new();
        let id = registry.add(
            Student::new("Lia", "5A", Membership::DailyBasis).with_note("vegetarian"),
        );

        let edited = registry
            .edit(
                &id,
                StudentChanges {
                    membership: Some(Membership::MonthlyContract),
                    membership_start: Some(date(2024, 1, 1)),
                    membership_end: Some(Some(date(2024, 5, 1))),
                    ..StudentChanges::default()
                },
            )
            .unwrap();
        assert_eq!(edited.name, "Lia");
        assert_eq!(edited.note, "vegetarian");
        assert!(edited.is_contract_active(date(2024, 3, 1)));
        assert!(!edited.is_contract_active(date(2024, 6, 1)));

        let reopened = registry
            .edit(
                &id,
                StudentChanges {
                    membership_end: Some(None),
                    ..StudentChanges::default()
                },
            )
            .unwrap();
        assert!(reopened.is_contract_active(date(2024, 6, 1)));

        assert_eq!(
            registry.edit("nope", StudentChanges::default()).unwrap_err(),
            AttendanceError::UnknownStudent("nope".to_string())
        );
    }

    #[test]
    fn test_registry_search_is_case_insensitive() {
        let mut registry = StudentRegistry::new();
        registry.add(Student::new("Ana Souza", "5A", Membership::DailyBasis));
        registry.add(Student::new("Mariana Lima", "5B", Membership::DailyBasis));
        registry.add(Student::new("Pedro", "5C", Membership::DailyBasis));

        assert_eq!(registry.search("ANA").len(), 2);
        assert_eq!(registry.search("pedro").len(), 1);
        assert!(registry.search("   ").is_empty());
    }

    #[test]
    fn test_count_by_membership() {
        let mut registry = StudentRegistry::new();
        registry.add_batch(vec![
            Student::new("A", "1", Membership::MonthlyContract),
            Student::new("B", "1", Membership::MonthlyContract),
            Student::new("C", "1", Membership::Observation),
        ]);

        let counts = registry.count_by_membership();
        assert_eq!(counts[0], (Membership::MonthlyContract, 2));
        assert_eq!(counts[1], (Membership::DailyBasis, 0));
        assert_eq!(counts[2], (Membership::Observation, 1));
        assert_eq!(counts[3], (Membership::Cancelled, 0));
    }

    #[test]
    fn test_cancel_contract() {
        let mut registry = StudentRegistry::new();
        let id = registry.add(
            Student::new("Lia", "2A", Membership::MonthlyContract)
                .with_contract(date(2024, 1, 1), None)
                .with_note("Allergic to peanuts"),
        );

        let cancelled = registry
            .cancel_contract(&id, date(2024, 6, 30), "Moved schools", date(2024, 6, 20))
            .unwrap();

        assert_eq!(cancelled.membership, Membership::Cancelled);
        assert_eq!(cancelled.membership_end, Some(date(2024, 6, 30)));
        assert_eq!(
            cancelled.note,
            "[Contract cancelled on 2024-06-20] Reason: Moved schools\n\nAllergic to peanuts"
        );
        assert_eq!(registry.cancelled().len(), 1);
    }

    #[test]
    fn test_cancelled_sorted_by_latest_end() {
        let mut registry = StudentRegistry::new();
        registry.add(Student::new("Undated", "1A", Membership::Cancelled));
        for (name, end) in [("Early", date(2024, 3, 1)), ("Late", date(2024, 6, 1))] {
            let id = registry.add(
                Student::new(name, "1A", Membership::MonthlyContract)
                    .with_contract(date(2024, 1, 1), None),
            );
            registry.cancel_contract(&id, end, "left", end).unwrap();
        }
        registry.add(Student::new("Still here", "1A", Membership::Observation));

        let names: Vec<&str> = registry.cancelled().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Late", "Early", "Undated"]);
    }

    #[test]
    fn test_cancel_contract_note_trimmed_when_empty() {
        let mut registry = StudentRegistry::new();
        let id = registry.add(
            Student::new("Rui", "2A", Membership::MonthlyContract)
                .with_contract(date(2024, 1, 1), None),
        );

        let cancelled = registry
            .cancel_contract(&id, date(2024, 6, 30), "Plan change", date(2024, 6, 30))
            .unwrap();
        assert_eq!(
            cancelled.note,
            "[Contract cancelled on 2024-06-30] Reason: Plan change"
        );
    }

    #[test]
    fn test_cancel_contract_rejections_leave_state() {
        let mut registry = StudentRegistry::new();
        let daily = registry.add(Student::new("Tom", "1A", Membership::DailyBasis));
        let monthly = registry.add(
            Student::new("Ivo", "1A", Membership::MonthlyContract)
                .with_contract(date(2024, 1, 1), None),
        );

        assert_eq!(
            registry
                .cancel_contract(&monthly, date(2024, 6, 1), "  ", date(2024, 6, 1))
                .unwrap_err(),
            AttendanceError::EmptyReason
        );
        assert_eq!(
            registry
                .cancel_contract(&daily, date(2024, 6, 1), "why", date(2024, 6, 1))
                .unwrap_err(),
            AttendanceError::NotMonthlyContract {
                student_id: daily.clone(),
                current: Membership::DailyBasis,
            }
        );
        assert!(matches!(
            registry.cancel_contract("nope", date(2024, 6, 1), "why", date(2024, 6, 1)),
            Err(AttendanceError::UnknownStudent(_))
        ));

        let ivo = registry.get(&monthly).unwrap();
        assert_eq!(ivo.membership, Membership::MonthlyContract);
        assert!(ivo.membership_end.is_none());
    }

    #[test]
    fn test_clear() {
        let mut registry = StudentRegistry::new();
        registry.add(Student::new("A", "1", Membership::Observation));
        registry.add(Student::new("B", "1", Membership::Observation));

        assert_eq!(registry.clear(), 2);
        assert!(registry.is_empty());
    }
}
