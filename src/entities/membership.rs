// 🎫 Membership (vínculo) - billing relationship between a student and the school
//
// Closed set of four categories. Per-category aggregates use `ByMembership`,
// a four-slot struct, so adding a category is a compile error everywhere a
// bucket is read instead of a silent fall-through.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Membership {
    /// Monthly contract, active between `membership_start` and `membership_end`
    #[serde(rename = "contrato_mensal")]
    MonthlyContract,

    /// Billed per day, only on dates with a daily authorization
    #[serde(rename = "diaria")]
    DailyBasis,

    /// No billing arrangement for the day; recorded for follow-up
    #[serde(rename = "observacao")]
    Observation,

    /// Contract cancelled; check-ins refused
    #[serde(rename = "cancelado")]
    Cancelled,
}

impl Membership {
    pub const ALL: [Membership; 4] = [
        Membership::MonthlyContract,
        Membership::DailyBasis,
        Membership::Observation,
        Membership::Cancelled,
    ];

    /// Categories a check-in may be stamped with or corrected to.
    pub const CHECKIN_CATEGORIES: [Membership; 3] = [
        Membership::MonthlyContract,
        Membership::DailyBasis,
        Membership::Observation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Membership::MonthlyContract => "contrato_mensal",
            Membership::DailyBasis => "diaria",
            Membership::Observation => "observacao",
            Membership::Cancelled => "cancelado",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Membership::MonthlyContract => "Monthly contract",
            Membership::DailyBasis => "Daily basis",
            Membership::Observation => "Observation",
            Membership::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for Membership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Membership {
    type Err = String;

    /// Accepts the storage tags and kebab/snake English names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        match normalized.as_str() {
            "contrato_mensal" | "monthly_contract" | "monthly" => Ok(Membership::MonthlyContract),
            "diaria" | "diária" | "daily_basis" | "daily" => Ok(Membership::DailyBasis),
            "observacao" | "observação" | "observation" => Ok(Membership::Observation),
            "cancelado" | "cancelled" | "canceled" => Ok(Membership::Cancelled),
            _ => Err(format!("unknown membership: {}", s)),
        }
    }
}

// ============================================================================
// PER-CATEGORY BUCKETS
// ============================================================================

/// One value per membership category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByMembership<T> {
    pub monthly_contract: T,
    pub daily_basis: T,
    pub observation: T,
    pub cancelled: T,
}

impl<T> ByMembership<T> {
    pub fn from_fn<F>(mut f: F) -> Self
    where
        F: FnMut(Membership) -> T,
    {
        ByMembership {
            monthly_contract: f(Membership::MonthlyContract),
            daily_basis: f(Membership::DailyBasis),
            observation: f(Membership::Observation),
            cancelled: f(Membership::Cancelled),
        }
    }

    pub fn get(&self, membership: Membership) -> &T {
        match membership {
            Membership::MonthlyContract => &self.monthly_contract,
            Membership::DailyBasis => &self.daily_basis,
            Membership::Observation => &self.observation,
            Membership::Cancelled => &self.cancelled,
        }
    }

    pub fn get_mut(&mut self, membership: Membership) -> &mut T {
        match membership {
            Membership::MonthlyContract => &mut self.monthly_contract,
            Membership::DailyBasis => &mut self.daily_basis,
            Membership::Observation => &mut self.observation,
            Membership::Cancelled => &mut self.cancelled,
        }
    }

    /// Buckets in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (Membership, &T)> {
        Membership::ALL.into_iter().map(move |m| (m, self.get(m)))
    }
}
