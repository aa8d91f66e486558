// ⚖️ Vínculo Resolution Engine - which membership a new check-in is stamped with
//
// Decision order for a student checking in at a reference instant:
//   1. cancelled contract          → refused
//   2. valid check-in in same slot → refused (duplicate)
//   3. active monthly contract     → MonthlyContract
//   4. daily authorization today   → DailyBasis
//   5. otherwise                   → Observation
//
// A student who is nominally on a monthly contract that does not cover the
// date is not silently downgraded: the engine hands back a confirmation
// request carrying the fallback category, and nothing is recorded unless the
// caller accepts it.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use tracing::{debug, warn};

use crate::entities::{DailyAuthorization, Membership, Student};
use crate::error::{AttendanceError, Result};
use crate::meal::{meal_type_for, MealType};
use crate::store::CheckinRecord;

// ============================================================================
// RESOLUTION RESULT
// ============================================================================

/// A check-in that passed every rule and is ready to be appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingCheckin {
    pub student_id: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub meal: MealType,
    pub membership: Membership,
}

impl PendingCheckin {
    /// Materialize the record with a fresh id; the membership is copied
    pub fn into_record(self) -> CheckinRecord {
        CheckinRecord::new(
            &self.student_id,
            self.date,
            self.time,
            self.meal,
            self.membership,
        )
    }
}

/// Human-in-the-loop override point.
///
/// Returned when the student's monthly contract does not cover the date.
/// `accept` yields the pending check-in stamped with the fallback category;
/// dropping the request (or calling `decline`) records nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmationRequest {
    pub student_name: String,
    pub nominal: Membership,
    pending: PendingCheckin,
}

impl ConfirmationRequest {
    /// Category the check-in will carry if accepted
    pub fn fallback(&self) -> Membership {
        self.pending.membership
    }

    pub fn pending(&self) -> &PendingCheckin {
        &self.pending
    }

    pub fn accept(self) -> PendingCheckin {
        self.pending
    }

    pub fn decline(self) {}

    /// Prompt text for interactive callers
    pub fn message(&self) -> String {
        format!(
            "The monthly contract of {} is not active on {}. Record the check-in as {}?",
            self.student_name,
            self.pending.date,
            self.fallback()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Resolution {
    Accepted(PendingCheckin),
    ConfirmationRequired(ConfirmationRequest),
}

impl Resolution {
    /// Category that would be stamped, whether or not confirmation is needed
    pub fn membership(&self) -> Membership {
        match self {
            Resolution::Accepted(pending) => pending.membership,
            Resolution::ConfirmationRequired(request) => request.fallback(),
        }
    }

    pub fn needs_confirmation(&self) -> bool {
        matches!(self, Resolution::ConfirmationRequired(_))
    }
}

// ============================================================================
// ENGINE
// ============================================================================

/// Category a check-in on `date` is stamped with, ignoring refusal rules.
pub fn stamped_membership(
    student: &Student,
    date: NaiveDate,
    authorizations: &[DailyAuthorization],
) -> Membership {
    if student.is_contract_active(date) {
        Membership::MonthlyContract
    } else if authorizations.iter().any(|a| a.covers(&student.id, date)) {
        Membership::DailyBasis
    } else {
        Membership::Observation
    }
}

/// Decide whether `student` may check in at `at`, and with which category.
///
/// Pure: reads the existing records and authorizations, mutates nothing.
pub fn resolve_checkin(
    student: &Student,
    at: NaiveDateTime,
    existing: &[CheckinRecord],
    authorizations: &[DailyAuthorization],
) -> Result<Resolution> {
    if student.is_cancelled() {
        warn!(student_id = %student.id, "check-in refused: cancelled contract");
        return Err(AttendanceError::CancelledMembership {
            student_id: student.id.clone(),
        });
    }

    let date = at.date();
    let meal = meal_type_for(&at);

    if existing
        .iter()
        .any(|r| r.valid && r.same_slot(&student.id, date, meal))
    {
        warn!(student_id = %student.id, %date, meal = meal.as_str(), "check-in refused: duplicate");
        return Err(AttendanceError::DuplicateCheckin {
            student_id: student.id.clone(),
            date,
            meal,
        });
    }

    let membership = stamped_membership(student, date, authorizations);
    let pending = PendingCheckin {
        student_id: student.id.clone(),
        date,
        time: at.time(),
        meal,
        membership,
    };

    debug!(
        student_id = %student.id,
        nominal = student.membership.as_str(),
        stamped = membership.as_str(),
        "membership resolved"
    );

    if student.is_monthly_contract() && membership != Membership::MonthlyContract {
        return Ok(Resolution::ConfirmationRequired(ConfirmationRequest {
            student_name: student.name.clone(),
            nominal: student.membership,
            pending,
        }));
    }

    Ok(Resolution::Accepted(pending))
}

// ============================================================================
// TESTS
// ============================================================================
