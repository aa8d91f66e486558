// Meal Attendance - Core Library
// Exposes all modules for use in the CLI and tests

pub mod clock;
pub mod config;
pub mod csv_io;
pub mod desk;
pub mod entities;
pub mod error;
pub mod logging;
pub mod meal;
pub mod report;
pub mod store;
pub mod vinculo;

// Re-export commonly used types
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{AppConfig, ConfigError};
pub use csv_io::{
    DataDir, import_students, write_import_template,
    export_history, export_daily, export_monthly, export_cancelled, export_to_file,
};
pub use desk::{CheckinDesk, CheckinOutcome};
pub use entities::{
    AuthorizationRegistry, DailyAuthorization, ByMembership, Membership,
    Student, StudentChanges, StudentRegistry,
};
pub use error::{AttendanceError, ImportError, Result};
pub use logging::init_tracing;
pub use meal::{MealType, meal_type_for};
pub use report::{
    MealTotals, DailyReport, MonthlyEntry, MonthlyReport,
    day_count, daily_report, monthly_report, in_month,
};
pub use store::{AttendanceStore, CheckinQuery, CheckinRecord, Event};
pub use vinculo::{
    ConfirmationRequest, PendingCheckin, Resolution,
    resolve_checkin, stamped_membership,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
