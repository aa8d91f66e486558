// 📊 Report Aggregation Engine - daily and monthly meal consumption
//
// Building block is the per-student-day count:
//   lunch = number of lunch check-ins
//   combo = min(morning snacks, afternoon snacks)
//   snack = snacks left over after pairing
//
// A combo pairs one morning snack with one afternoon snack of the same
// student on the same day. Pairing is by count, not by time of day.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::{Add, AddAssign};

use crate::entities::{ByMembership, Membership, Student};
use crate::meal::MealType;
use crate::store::CheckinRecord;

// ============================================================================
// MEAL TOTALS
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MealTotals {
    pub lunch: u32,
    pub snack: u32,
    pub combo: u32,
}

impl MealTotals {
    pub fn new(lunch: u32, snack: u32, combo: u32) -> Self {
        MealTotals { lunch, snack, combo }
    }

    /// Billable items (lunches + loose snacks + combos)
    pub fn total(&self) -> u32 {
        self.lunch + self.snack + self.combo
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

impl Add for MealTotals {
    type Output = MealTotals;

    fn add(self, other: MealTotals) -> MealTotals {
        MealTotals {
            lunch: self.lunch + other.lunch,
            snack: self.snack + other.snack,
            combo: self.combo + other.combo,
        }
    }
}

impl AddAssign for MealTotals {
    fn add_assign(&mut self, other: MealTotals) {
        *self = *self + other;
    }
}

impl std::iter::Sum for MealTotals {
    fn sum<I: Iterator<Item = MealTotals>>(iter: I) -> MealTotals {
        iter.fold(MealTotals::default(), Add::add)
    }
}

/// Count one student's meals for one day.
///
/// Callers pass the records of a single student and a single day; invalid
/// records are ignored.
pub fn day_count<'a, I>(records: I) -> MealTotals
where
    I: IntoIterator<Item = &'a CheckinRecord>,
{
    let mut lunch: u32 = 0;
    let mut morning: u32 = 0;
    let mut afternoon: u32 = 0;

    for record in records.into_iter().filter(|r| r.valid) {
        match record.meal {
            MealType::Lunch => lunch += 1,
            MealType::MorningSnack => morning += 1,
            MealType::AfternoonSnack => afternoon += 1,
        }
    }

    let combo = morning.min(afternoon);
    let snack = (morning - combo) + (afternoon - combo);

    MealTotals { lunch, snack, combo }
}

/// Group records by student id
fn by_student<'a>(records: &[&'a CheckinRecord]) -> HashMap<&'a str, Vec<&'a CheckinRecord>> {
    let mut groups: HashMap<&str, Vec<&CheckinRecord>> = HashMap::new();
    for &record in records {
        groups.entry(record.student_id.as_str()).or_default().push(record);
    }
    groups
}

// ============================================================================
// DAILY REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyReport {
    pub date: NaiveDate,

    /// Per-category sums of each student's `day_count`
    pub by_membership: ByMembership<MealTotals>,

    /// Distinct students with at least one morning and one afternoon snack,
    /// counted across categories.
    ///
    /// Not reconciled with the per-category `combo` sums: a student whose
    /// snacks sit in two different categories (after a correction) counts
    /// here once but forms no combo in either bucket.
    pub total_combos_across_categories: u32,
}

impl DailyReport {
    pub fn get(&self, membership: Membership) -> MealTotals {
        *self.by_membership.get(membership)
    }

    /// Sum of every category
    pub fn totals(&self) -> MealTotals {
        self.by_membership.iter().map(|(_, t)| *t).sum()
    }

    pub fn summary(&self) -> String {
        let mc = self.by_membership.monthly_contract;
        let db = self.by_membership.daily_basis;
        let ob = self.by_membership.observation;
        format!(
            "{}: monthly {} | daily {} | observation {} | combos across categories {}",
            self.date,
            mc.total(),
            db.total(),
            ob.total(),
            self.total_combos_across_categories
        )
    }
}

/// Aggregate the valid check-ins of `date`.
pub fn daily_report(records: &[CheckinRecord], date: NaiveDate) -> DailyReport {
    let day: Vec<&CheckinRecord> = records
        .iter()
        .filter(|r| r.valid && r.date == date)
        .collect();

    let total_combos_across_categories = by_student(&day)
        .values()
        .filter(|student_records| {
            let has_morning = student_records.iter().any(|r| r.meal == MealType::MorningSnack);
            let has_afternoon = student_records.iter().any(|r| r.meal == MealType::AfternoonSnack);
            has_morning && has_afternoon
        })
        .count() as u32;

    let by_membership = ByMembership::from_fn(|membership| {
        let bucket: Vec<&CheckinRecord> = day
            .iter()
            .copied()
            .filter(|r| r.membership_at_checkin == membership)
            .collect();
        by_student(&bucket)
            .values()
            .map(|student_records| day_count(student_records.iter().copied()))
            .sum::<MealTotals>()
    });

    DailyReport {
        date,
        by_membership,
        total_combos_across_categories,
    }
}

// ============================================================================
// MONTHLY REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyEntry {
    pub student: Student,
    pub totals: MealTotals,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyReport {
    pub year: i32,
    pub month: u32,

    /// One entry per (student, stamped category) pair seen in the month
    pub by_membership: ByMembership<Vec<MonthlyEntry>>,
}

impl MonthlyReport {
    pub fn entries(&self, membership: Membership) -> &[MonthlyEntry] {
        self.by_membership.get(membership)
    }

    /// Column totals for one category (the TOTAL row of the export)
    pub fn total(&self, membership: Membership) -> MealTotals {
        self.entries(membership).iter().map(|e| e.totals).sum()
    }

    pub fn entry_count(&self) -> usize {
        self.by_membership.iter().map(|(_, entries)| entries.len()).sum()
    }
}

pub fn in_month(date: NaiveDate, year: i32, month: u32) -> bool {
    date.year() == year && date.month() == month
}

/// Aggregate the valid check-ins of a calendar month (`month` is 1-12).
///
/// A student stamped with two categories during the month yields one entry
/// under each. Entries appear in the order their pair first shows up in
/// `records`. Records of students missing from `students` are skipped.
pub fn monthly_report(
    records: &[CheckinRecord],
    students: &[Student],
    year: i32,
    month: u32,
) -> MonthlyReport {
    let mut pair_order: Vec<(&str, Membership)> = Vec::new();
    let mut pairs: HashMap<(&str, Membership), Vec<&CheckinRecord>> = HashMap::new();

    for record in records
        .iter()
        .filter(|r| r.valid && in_month(r.date, year, month))
    {
        let key = (record.student_id.as_str(), record.membership_at_checkin);
        pairs
            .entry(key)
            .or_insert_with(|| {
                pair_order.push(key);
                Vec::new()
            })
            .push(record);
    }

    let mut by_membership: ByMembership<Vec<MonthlyEntry>> = ByMembership::default();

    for key in pair_order {
        let Some(student) = students.iter().find(|s| s.id == key.0) else {
            continue;
        };

        let mut days: HashMap<NaiveDate, Vec<&CheckinRecord>> = HashMap::new();
        for &record in &pairs[&key] {
            days.entry(record.date).or_default().push(record);
        }

        let totals: MealTotals = days
            .values()
            .map(|day_records| day_count(day_records.iter().copied()))
            .sum();

        by_membership.get_mut(key.1).push(MonthlyEntry {
            student: student.clone(),
            totals,
        });
    }

    MonthlyReport {
        year,
        month,
        by_membership,
    }
}

// ============================================================================
// TESTS
// ============================================================================
