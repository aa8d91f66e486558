// 🧾 Check-in Desk - roster, authorizations and record store behind one clock
//
// The desk is the single mutator of the attendance data. Resolution reads
// the store, commit appends to it, and both happen through `&mut self`, so a
// duplicate check always sees every previously accepted check-in.

use chrono::{NaiveDate, NaiveDateTime};
use tracing::info;

use crate::clock::Clock;
use crate::entities::{AuthorizationRegistry, Membership, Student, StudentRegistry};
use crate::error::{AttendanceError, Result};
use crate::report::{daily_report, monthly_report, DailyReport, MonthlyReport};
use crate::store::{AttendanceStore, CheckinRecord};
use crate::vinculo::{resolve_checkin, ConfirmationRequest, PendingCheckin, Resolution};

/// Result of a check-in attempt that was not refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckinOutcome {
    Recorded(CheckinRecord),
    NeedsConfirmation(ConfirmationRequest),
}

pub struct CheckinDesk<C: Clock> {
    pub roster: StudentRegistry,
    pub authorizations: AuthorizationRegistry,
    pub store: AttendanceStore,
    clock: C,
}

impl<C: Clock> CheckinDesk<C> {
    pub fn new(clock: C) -> Self {
        CheckinDesk {
            roster: StudentRegistry::new(),
            authorizations: AuthorizationRegistry::new(),
            store: AttendanceStore::new(),
            clock,
        }
    }

    pub fn with_data(
        clock: C,
        roster: StudentRegistry,
        authorizations: AuthorizationRegistry,
        store: AttendanceStore,
    ) -> Self {
        CheckinDesk {
            roster,
            authorizations,
            store,
            clock,
        }
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Check a student in at the clock's current instant
    pub fn check_in(&mut self, student_id: &str) -> Result<CheckinOutcome> {
        let now = self.clock.now();
        self.check_in_at(student_id, now)
    }

    /// Check a student in at an explicit reference instant.
    ///
    /// Accepted check-ins are appended immediately. A confirmation request is
    /// handed back untouched; pass it to `confirm` to record it.
    pub fn check_in_at(&mut self, student_id: &str, at: NaiveDateTime) -> Result<CheckinOutcome> {
        let student = self.roster.require(student_id)?;
        let resolution = resolve_checkin(
            student,
            at,
            self.store.all(),
            self.authorizations.all(),
        )?;

        match resolution {
            Resolution::Accepted(pending) => self.commit(pending).map(CheckinOutcome::Recorded),
            Resolution::ConfirmationRequired(request) => {
                info!(
                    student_id = %student_id,
                    fallback = request.fallback().as_str(),
                    meal = request.pending().meal.as_str(),
                    "monthly contract inactive, confirmation required"
                );
                Ok(CheckinOutcome::NeedsConfirmation(request))
            }
        }
    }

    /// Record a check-in whose fallback category the operator accepted.
    ///
    /// The student is looked up again: a contract cancelled in the meantime
    /// still refuses the check-in, and the store re-checks duplicates.
    pub fn confirm(&mut self, request: ConfirmationRequest) -> Result<CheckinRecord> {
        let pending = request.accept();
        let student = self.roster.require(&pending.student_id)?;
        if student.is_cancelled() {
            return Err(AttendanceError::CancelledMembership {
                student_id: student.id.clone(),
            });
        }
        self.commit(pending)
    }

    fn commit(&mut self, pending: PendingCheckin) -> Result<CheckinRecord> {
        self.store.add(pending.into_record()).cloned()
    }

    pub fn invalidate(&mut self, checkin_id: &str, reason: &str) -> Result<CheckinRecord> {
        self.store.invalidate(checkin_id, reason).cloned()
    }

    pub fn correct_membership(
        &mut self,
        checkin_id: &str,
        membership: Membership,
        reason: &str,
    ) -> Result<CheckinRecord> {
        self.store
            .correct_membership(checkin_id, membership, reason)
            .cloned()
    }

    /// Cancel a student's contract, recorded as of today
    pub fn cancel_contract(
        &mut self,
        student_id: &str,
        end_date: NaiveDate,
        reason: &str,
    ) -> Result<Student> {
        let today = self.clock.today();
        self.roster
            .cancel_contract(student_id, end_date, reason, today)
            .cloned()
    }

    /// Grant a one-day authorization for today
    pub fn authorize_today(&mut self, student_id: &str, note: &str) -> Result<String> {
        let today = self.clock.today();
        self.authorizations
            .authorize(&self.roster, student_id, today, note)
    }

    pub fn daily_report(&self, date: NaiveDate) -> DailyReport {
        daily_report(self.store.all(), date)
    }

    /// Today's running totals (check-in screen counters)
    pub fn today_report(&self) -> DailyReport {
        self.daily_report(self.clock.today())
    }

    pub fn monthly_report(&self, year: i32, month: u32) -> MonthlyReport {
        monthly_report(self.store.all(), self.roster.all(), year, month)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::meal::MealType;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn desk_at(day: NaiveDate, hour: u32) -> CheckinDesk<FixedClock> {
        CheckinDesk::new(FixedClock::new(day.and_hms_opt(hour, 5, 0).unwrap()))
    }

    #[test]
    fn test_check_in_uses_clock() {
        let mut desk = desk_at(date(2024, 6, 15), 8);
        let id = desk.roster.add(Student::new("Ana", "5A", Membership::Observation));

        match desk.check_in(&id).unwrap() {
            CheckinOutcome::Recorded(record) => {
                assert_eq!(record.date, date(2024, 6, 15));
                assert_eq!(record.meal, MealType::MorningSnack);
                assert_eq!(record.membership_at_checkin, Membership::Observation);
            }
            other => panic!("expected a recorded check-in, got {:?}", other),
        }
        assert_eq!(desk.store.len(), 1);
    }

    #[test]
    fn test_second_check_in_same_window_is_duplicate() {
        let mut desk = desk_at(date(2024, 6, 15), 11);
        let id = desk.roster.add(Student::new("Ana", "5A", Membership::Observation));

        desk.check_in(&id).unwrap();
        assert!(matches!(
            desk.check_in(&id),
            Err(AttendanceError::DuplicateCheckin { .. })
        ));
        assert_eq!(desk.store.len(), 1);
    }

    #[test]
    fn test_unknown_student() {
        let mut desk = desk_at(date(2024, 6, 15), 11);
        assert_eq!(
            desk.check_in("ghost"),
            Err(AttendanceError::UnknownStudent("ghost".to_string()))
        );
    }

    #[test]
    fn test_confirmation_flow() {
        let mut desk = desk_at(date(2024, 6, 1), 11);
        let id = desk.roster.add(
            Student::new("Lia", "5A", Membership::MonthlyContract)
                .with_contract(date(2024, 1, 1), Some(date(2024, 5, 1))),
        );
        desk.authorize_today(&id, "").unwrap();

        let request = match desk.check_in(&id).unwrap() {
            CheckinOutcome::NeedsConfirmation(request) => request,
            other => panic!("expected confirmation, got {:?}", other),
        };
        assert!(desk.store.is_empty());

        let record = desk.confirm(request).unwrap();
        assert_eq!(record.membership_at_checkin, Membership::DailyBasis);
        assert_eq!(desk.store.len(), 1);
    }

    #[test]
    fn test_declined_confirmation_records_nothing() {
        let mut desk = desk_at(date(2024, 6, 1), 11);
        let id = desk.roster.add(
            Student::new("Lia", "5A", Membership::MonthlyContract)
                .with_contract(date(2024, 1, 1), Some(date(2024, 5, 1))),
        );

        if let CheckinOutcome::NeedsConfirmation(request) = desk.check_in(&id).unwrap() {
            request.decline();
        }
        assert!(desk.store.is_empty());
        assert!(desk.store.events().is_empty());
    }

    #[test]
    fn test_confirm_after_cancellation_is_refused() {
        let mut desk = desk_at(date(2024, 6, 1), 11);
        let id = desk.roster.add(
            Student::new("Lia", "5A", Membership::MonthlyContract)
                .with_contract(date(2024, 1, 1), Some(date(2024, 5, 1))),
        );

        let request = match desk.check_in(&id).unwrap() {
            CheckinOutcome::NeedsConfirmation(request) => request,
            other => panic!("expected confirmation, got {:?}", other),
        };
        desk.cancel_contract(&id, date(2024, 5, 31), "left").unwrap();

        assert!(matches!(
            desk.confirm(request),
            Err(AttendanceError::CancelledMembership { .. })
        ));
        assert!(desk.store.is_empty());
    }

    #[test]
    fn test_snapshot_survives_membership_change() {
        let mut desk = desk_at(date(2024, 6, 3), 11);
        let id = desk.roster.add(
            Student::new("Rui", "5A", Membership::MonthlyContract)
                .with_contract(date(2024, 1, 1), None),
        );
        desk.check_in(&id).unwrap();

        desk.cancel_contract(&id, date(2024, 6, 3), "moved away").unwrap();

        let record = &desk.store.all()[0];
        assert_eq!(record.membership_at_checkin, Membership::MonthlyContract);
        assert_eq!(
            desk.daily_report(date(2024, 6, 3)).get(Membership::MonthlyContract).lunch,
            1
        );
    }

    #[test]
    fn test_reports_through_desk() {
        let mut desk = desk_at(date(2024, 6, 3), 8);
        let id = desk.roster.add(Student::new("Eva", "5A", Membership::Observation));

        desk.check_in(&id).unwrap();
        desk.clock_mut()
            .set(date(2024, 6, 3).and_hms_opt(15, 0, 0).unwrap());
        desk.check_in(&id).unwrap();

        let today = desk.today_report();
        assert_eq!(today.get(Membership::Observation).combo, 1);
        assert_eq!(today.total_combos_across_categories, 1);

        let month = desk.monthly_report(2024, 6);
        assert_eq!(month.entries(Membership::Observation)[0].totals.combo, 1);
    }

    #[test]
    fn test_invalidate_and_correct_through_desk() {
        let mut desk = desk_at(date(2024, 6, 3), 11);
        let id = desk.roster.add(Student::new("Eva", "5A", Membership::Observation));
        let record = match desk.check_in(&id).unwrap() {
            CheckinOutcome::Recorded(record) => record,
            other => panic!("unexpected {:?}", other),
        };

        let corrected = desk
            .correct_membership(&record.id, Membership::DailyBasis, "paid at the door")
            .unwrap();
        assert_eq!(corrected.membership_at_checkin, Membership::DailyBasis);

        let invalid = desk.invalidate(&record.id, "duplicate card").unwrap();
        assert!(!invalid.valid);
        assert!(desk.today_report().totals().is_empty());
    }
}
