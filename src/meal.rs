// 🍽️ Meal windows - which meal a check-in counts toward
//
// The window is a pure function of the local hour:
//   [07:00, 10:00) → morning snack
//   [10:00, 13:00) → lunch
//   anything else  → afternoon snack (also covers early arrivals before 07:00)

use chrono::Timelike;
use serde::{Deserialize, Serialize};
use std::fmt;

/// First hour of the morning snack window.
pub const MORNING_SNACK_START_HOUR: u32 = 7;

/// First hour of the lunch window (end of the morning snack window).
pub const LUNCH_START_HOUR: u32 = 10;

/// First hour of the afternoon snack window (end of the lunch window).
pub const AFTERNOON_SNACK_START_HOUR: u32 = 13;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MealType {
    #[serde(rename = "lanche_manha")]
    MorningSnack,

    #[serde(rename = "almoco", alias = "almoço")]
    Lunch,

    #[serde(rename = "lanche_tarde")]
    AfternoonSnack,
}

impl MealType {
    pub const ALL: [MealType; 3] = [
        MealType::MorningSnack,
        MealType::Lunch,
        MealType::AfternoonSnack,
    ];

    /// Storage tag, stable across exports.
    pub fn as_str(&self) -> &'static str {
        match self {
            MealType::MorningSnack => "lanche_manha",
            MealType::Lunch => "almoco",
            MealType::AfternoonSnack => "lanche_tarde",
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            MealType::MorningSnack => "Morning snack",
            MealType::Lunch => "Lunch",
            MealType::AfternoonSnack => "Afternoon snack",
        }
    }
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Resolve the meal window for a local timestamp (or time of day).
pub fn meal_type_for<T: Timelike>(timestamp: &T) -> MealType {
    let hour = timestamp.hour();
    if (MORNING_SNACK_START_HOUR..LUNCH_START_HOUR).contains(&hour) {
        MealType::MorningSnack
    } else if (LUNCH_START_HOUR..AFTERNOON_SNACK_START_HOUR).contains(&hour) {
        MealType::Lunch
    } else {
        MealType::AfternoonSnack
    }
}
