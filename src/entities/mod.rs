// Entity Models
//
// Each entity has a stable UUID identity and a registry that owns the
// in-memory collection:
// - Student: roster with the student's *current* membership
// - DailyAuthorization: one-day DailyBasis grants
// - Membership: the closed set of billing categories

pub mod authorization;
pub mod membership;
pub mod student;

pub use authorization::{AuthorizationRegistry, DailyAuthorization};
pub use membership::{ByMembership, Membership};
pub use student::{Student, StudentChanges, StudentRegistry};
