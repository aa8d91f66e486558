// 📅 Daily Authorization - one-day permission to bill a student as DailyBasis
//
// An authorization names exactly one calendar date. There is no expiry logic
// beyond that date; authorizations are created and deleted explicitly.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::student::StudentRegistry;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyAuthorization {
    pub id: String,
    pub student_id: String,
    pub authorized_date: NaiveDate,
    #[serde(default)]
    pub note: String,
}

impl DailyAuthorization {
    pub fn new(student_id: &str, authorized_date: NaiveDate, note: &str) -> Self {
        DailyAuthorization {
            id: uuid::Uuid::new_v4().to_string(),
            student_id: student_id.to_string(),
            authorized_date,
            note: note.to_string(),
        }
    }

    pub fn covers(&self, student_id: &str, date: NaiveDate) -> bool {
        self.student_id == student_id && self.authorized_date == date
    }
}

/// Set of daily authorizations.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationRegistry {
    authorizations: Vec<DailyAuthorization>,
}

impl AuthorizationRegistry {
    pub fn new() -> Self {
        AuthorizationRegistry {
            authorizations: Vec::new(),
        }
    }

    pub fn from_authorizations(authorizations: Vec<DailyAuthorization>) -> Self {
        AuthorizationRegistry { authorizations }
    }

    /// Grant a one-day authorization.
    ///
    /// The student must exist in the roster. Granting the same (student, date)
    /// twice returns the id of the existing authorization.
    pub fn authorize(
        &mut self,
        roster: &StudentRegistry,
        student_id: &str,
        date: NaiveDate,
        note: &str,
    ) -> Result<String> {
        roster.require(student_id)?;

        if let Some(existing) = self.authorizations.iter().find(|a| a.covers(student_id, date)) {
            return Ok(existing.id.clone());
        }

        let auth = DailyAuthorization::new(student_id, date, note);
        let id = auth.id.clone();
        self.authorizations.push(auth);

        info!(student_id = %student_id, date = %date, "daily authorization granted");
        Ok(id)
    }

    /// Remove an authorization by id; returns whether one was removed
    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.authorizations.len();
        self.authorizations.retain(|a| a.id != id);
        let removed = self.authorizations.len() != before;
        if removed {
            info!(authorization_id = %id, "daily authorization deleted");
        }
        removed
    }

    /// Authorizations for one calendar date
    pub fn for_date(&self, date: NaiveDate) -> Vec<&DailyAuthorization> {
        self.authorizations
            .iter()
            .filter(|a| a.authorized_date == date)
            .collect()
    }

    pub fn is_authorized(&self, student_id: &str, date: NaiveDate) -> bool {
        self.authorizations.iter().any(|a| a.covers(student_id, date))
    }

    pub fn all(&self) -> &[DailyAuthorization] {
        &self.authorizations
    }

    pub fn len(&self) -> usize {
        self.authorizations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.authorizations.is_empty()
    }
}
