// Error taxonomy for check-ins, corrections and roster changes
//
// Every variant is recoverable at the call site. Operations that return one
// of these leave the store, roster and authorizations untouched.

use chrono::NaiveDate;
use thiserror::Error;

use crate::entities::Membership;
use crate::meal::MealType;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttendanceError {
    #[error("student {student_id} has a cancelled contract and cannot check in")]
    CancelledMembership { student_id: String },

    #[error("student {student_id} already checked in for {meal} on {date}")]
    DuplicateCheckin {
        student_id: String,
        date: NaiveDate,
        meal: MealType,
    },

    #[error("a non-empty reason is required")]
    EmptyReason,

    #[error("unknown student: {0}")]
    UnknownStudent(String),

    #[error("unknown check-in: {0}")]
    UnknownCheckin(String),

    #[error("check-in {0} is already invalid")]
    AlreadyInvalid(String),

    #[error("check-ins cannot be moved to the {0} membership")]
    CancelledNotAllowed(Membership),

    #[error("student {student_id} has no monthly contract to cancel (current: {current})")]
    NotMonthlyContract {
        student_id: String,
        current: Membership,
    },
}

pub type Result<T> = std::result::Result<T, AttendanceError>;

/// Failures while importing a roster CSV.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("CSV file is empty or only has a header")]
    Empty,

    #[error("column \"{0}\" not found in CSV header")]
    MissingColumn(&'static str),

    #[error("no valid students to import")]
    NoValidRows,

    #[error("failed to read CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Normalise a human-entered reason, rejecting blank input.
pub(crate) fn require_reason(reason: &str) -> Result<String> {
    let trimmed = reason.trim();
    if trimmed.is_empty() {
        return Err(AttendanceError::EmptyReason);
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_reason_rejects_blank() {
        assert_eq!(require_reason(""), Err(AttendanceError::EmptyReason));
        assert_eq!(require_reason("   \n"), Err(AttendanceError::EmptyReason));
        assert_eq!(require_reason("  wrong card ").unwrap(), "wrong card");
    }

    #[test]
    fn test_error_messages() {
        let err = AttendanceError::DuplicateCheckin {
            student_id: "s1".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(),
            meal: MealType::Lunch,
        };
        assert_eq!(
            err.to_string(),
            "student s1 already checked in for Lunch on 2024-06-15"
        );

        let err = AttendanceError::CancelledNotAllowed(Membership::Cancelled);
        assert_eq!(
            err.to_string(),
            "check-ins cannot be moved to the Cancelled membership"
        );
    }
}
