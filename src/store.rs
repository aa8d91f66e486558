// 🗂️ Attendance Record Store - append-only check-in log with soft corrections
//
// Records are never deleted one by one. A record is either left valid,
// invalidated, or has its stamped membership corrected; both corrections
// carry a human-readable reason and append an audit event.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::entities::Membership;
use crate::error::{require_reason, AttendanceError, Result};
use crate::meal::MealType;

// ============================================================================
// CHECK-IN RECORD
// ============================================================================

/// One meal check-in.
///
/// `membership_at_checkin` is a copy of the category resolved when the record
/// was created. It does not follow later changes to the student and only
/// changes through `AttendanceStore::correct_membership`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckinRecord {
    pub id: String,
    pub student_id: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub meal: MealType,
    pub membership_at_checkin: Membership,
    #[serde(default = "default_valid")]
    pub valid: bool,
    #[serde(default)]
    pub correction_reason: String,
}

fn default_valid() -> bool {
    true
}

impl CheckinRecord {
    pub fn new(
        student_id: &str,
        date: NaiveDate,
        time: NaiveTime,
        meal: MealType,
        membership_at_checkin: Membership,
    ) -> Self {
        CheckinRecord {
            id: uuid::Uuid::new_v4().to_string(),
            student_id: student_id.to_string(),
            date,
            time,
            meal,
            membership_at_checkin,
            valid: true,
            correction_reason: String::new(),
        }
    }

    /// Same student, same day, same meal window
    pub fn same_slot(&self, student_id: &str, date: NaiveDate, meal: MealType) -> bool {
        self.student_id == student_id && self.date == date && self.meal == meal
    }
}

// ============================================================================
// AUDIT EVENTS
// ============================================================================

/// Audit trail entry ("every change is an event")
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
}

impl Event {
    pub fn new(event_type: &str, entity_id: &str, data: serde_json::Value) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
        }
    }
}

pub const EVENT_CHECKIN_ADDED: &str = "checkin_added";
pub const EVENT_CHECKIN_INVALIDATED: &str = "checkin_invalidated";
pub const EVENT_MEMBERSHIP_CORRECTED: &str = "checkin_membership_corrected";

// ============================================================================
// QUERY
// ============================================================================

/// Read filter; unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct CheckinQuery {
    pub student_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub valid: Option<bool>,
}

impl CheckinQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn student(mut self, student_id: &str) -> Self {
        self.student_id = Some(student_id.to_string());
        self
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn valid_only(mut self) -> Self {
        self.valid = Some(true);
        self
    }

    pub fn invalid_only(mut self) -> Self {
        self.valid = Some(false);
        self
    }

    pub fn matches(&self, record: &CheckinRecord) -> bool {
        self.student_id
            .as_deref()
            .map_or(true, |id| record.student_id == id)
            && self.date.map_or(true, |d| record.date == d)
            && self.valid.map_or(true, |v| record.valid == v)
    }
}

// ============================================================================
// STORE
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct AttendanceStore {
    records: Vec<CheckinRecord>,
    events: Vec<Event>,
}

impl AttendanceStore {
    pub fn new() -> Self {
        AttendanceStore {
            records: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Rebuild a store from previously saved records (no events replayed)
    pub fn from_records(records: Vec<CheckinRecord>) -> Self {
        AttendanceStore {
            records,
            events: Vec::new(),
        }
    }

    /// Rebuild a store from saved records and their saved audit trail
    pub fn from_parts(records: Vec<CheckinRecord>, events: Vec<Event>) -> Self {
        AttendanceStore { records, events }
    }

    /// The valid record occupying (student, date, meal), if any
    pub fn find_valid(
        &self,
        student_id: &str,
        date: NaiveDate,
        meal: MealType,
    ) -> Option<&CheckinRecord> {
        self.records
            .iter()
            .find(|r| r.valid && r.same_slot(student_id, date, meal))
    }

    /// Append a record.
    ///
    /// The duplicate check and the push happen under the same `&mut self`
    /// borrow, so two submissions for the same slot cannot both pass.
    pub fn add(&mut self, record: CheckinRecord) -> Result<&CheckinRecord> {
        if record.valid
            && self
                .find_valid(&record.student_id, record.date, record.meal)
                .is_some()
        {
            warn!(
                student_id = %record.student_id,
                date = %record.date,
                meal = record.meal.as_str(),
                "duplicate check-in rejected"
            );
            return Err(AttendanceError::DuplicateCheckin {
                student_id: record.student_id,
                date: record.date,
                meal: record.meal,
            });
        }

        self.events.push(Event::new(
            EVENT_CHECKIN_ADDED,
            &record.id,
            serde_json::json!({
                "student_id": record.student_id,
                "date": record.date,
                "meal": record.meal,
                "membership": record.membership_at_checkin,
            }),
        ));
        info!(
            checkin_id = %record.id,
            student_id = %record.student_id,
            meal = record.meal.as_str(),
            membership = record.membership_at_checkin.as_str(),
            "check-in recorded"
        );

        self.records.push(record);
        Ok(&self.records[self.records.len() - 1])
    }

    /// Mark a record invalid.
    ///
    /// An already-invalid record is rejected with `AlreadyInvalid`; its
    /// reason and validity stay as they were and no event is logged.
    pub fn invalidate(&mut self, id: &str, reason: &str) -> Result<&CheckinRecord> {
        let reason = require_reason(reason)?;
        let idx = self.index_of(id)?;

        if !self.records[idx].valid {
            return Err(AttendanceError::AlreadyInvalid(id.to_string()));
        }

        let record = &mut self.records[idx];
        record.valid = false;
        record.correction_reason = reason.clone();

        self.events.push(Event::new(
            EVENT_CHECKIN_INVALIDATED,
            id,
            serde_json::json!({ "reason": reason }),
        ));
        info!(checkin_id = %id, "check-in invalidated");

        Ok(&self.records[idx])
    }

    /// Change the stamped membership of a record.
    ///
    /// Cancelled is not a valid target: cancelled students cannot check in.
    pub fn correct_membership(
        &mut self,
        id: &str,
        membership: Membership,
        reason: &str,
    ) -> Result<&CheckinRecord> {
        let reason = require_reason(reason)?;
        if membership == Membership::Cancelled {
            return Err(AttendanceError::CancelledNotAllowed(membership));
        }
        let idx = self.index_of(id)?;

        let record = &mut self.records[idx];
        let previous = record.membership_at_checkin;
        record.membership_at_checkin = membership;
        record.correction_reason = reason.clone();

        self.events.push(Event::new(
            EVENT_MEMBERSHIP_CORRECTED,
            id,
            serde_json::json!({
                "from": previous,
                "to": membership,
                "reason": reason,
            }),
        ));
        info!(
            checkin_id = %id,
            from = previous.as_str(),
            to = membership.as_str(),
            "check-in membership corrected"
        );

        Ok(&self.records[idx])
    }

    fn index_of(&self, id: &str) -> Result<usize> {
        self.records
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| AttendanceError::UnknownCheckin(id.to_string()))
    }

    pub fn get(&self, id: &str) -> Option<&CheckinRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn all(&self) -> &[CheckinRecord] {
        &self.records
    }

    pub fn query(&self, query: &CheckinQuery) -> Vec<&CheckinRecord> {
        self.records.iter().filter(|r| query.matches(r)).collect()
    }

    pub fn for_student(&self, student_id: &str) -> Vec<&CheckinRecord> {
        self.query(&CheckinQuery::new().student(student_id))
    }

    pub fn for_date(&self, date: NaiveDate) -> Vec<&CheckinRecord> {
        self.query(&CheckinQuery::new().on(date))
    }

    pub fn valid(&self) -> Vec<&CheckinRecord> {
        self.query(&CheckinQuery::new().valid_only())
    }

    /// Records of one day, newest first (history view)
    pub fn history(&self, date: NaiveDate) -> Vec<&CheckinRecord> {
        let mut day = self.for_date(date);
        day.sort_by(|a, b| b.time.cmp(&a.time));
        day
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn events_for(&self, checkin_id: &str) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.entity_id == checkin_id)
            .collect()
    }

    /// Administrative bulk clear; returns how many records were dropped
    pub fn clear(&mut self) -> usize {
        let removed = self.records.len();
        self.records.clear();
        warn!(removed, "all check-ins cleared");
        removed
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================
