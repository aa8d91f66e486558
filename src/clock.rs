// ⏰ Clock provider
//
// Check-ins take their date and meal window from "now". Keeping that behind a
// trait lets the desk run against a fixed instant in tests.

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};

pub trait Clock {
    /// Current local date and time.
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }

    fn time_of_day(&self) -> NaiveTime {
        self.now().time()
    }
}

/// Wall clock in the machine's local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Clock frozen at a given instant (CLI `--at`, tests).
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl FixedClock {
    pub fn new(at: NaiveDateTime) -> Self {
        FixedClock(at)
    }

    /// Move the frozen instant.
    pub fn set(&mut self, at: NaiveDateTime) {
        self.0 = at;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}
