use chrono::{
    DateTime,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::fmt;

/// Table holding persisted flips.
pub const FLIP_HISTORY_TABLE: &str = "flip_history";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Heads,
    Tails,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Heads => "heads",
            Side::Tails => "tails",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two user options mapped onto the two faces for one flip.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlipAssignment {
    pub heads: String,
    pub tails: String,
}

impl FlipAssignment {
    /// `heads_first` keeps the input order, otherwise the options are swapped.
    pub fn new(option_1: &str, option_2: &str, heads_first: bool) -> Self {
        if heads_first {
            Self {
                heads: option_1.to_string(),
                tails: option_2.to_string(),
            }
        } else {
            Self {
                heads: option_2.to_string(),
                tails: option_1.to_string(),
            }
        }
    }

    pub fn option_for(&self, side: Side) -> &str {
        match side {
            Side::Heads => &self.heads,
            Side::Tails => &self.tails,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlipOutcome {
    pub side: Side,
    pub winner: String,
}

impl FlipOutcome {
    pub fn from_assignment(assignment: &FlipAssignment, side: Side) -> Self {
        Self {
            side,
            winner: assignment.option_for(side).to_string(),
        }
    }
}

/// Insert payload for a flip; `id` and `created_at` are assigned by the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFlipRecord {
    pub user_id: String,
    pub option_1: String,
    pub option_2: String,
    pub heads_option: String,
    pub tails_option: String,
    pub result: Side,
    pub winner: String,
}

impl NewFlipRecord {
    pub fn new(
        user_id: impl Into<String>,
        option_1: impl Into<String>,
        option_2: impl Into<String>,
        assignment: &FlipAssignment,
        outcome: &FlipOutcome,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            option_1: option_1.into(),
            option_2: option_2.into(),
            heads_option: assignment.heads.clone(),
            tails_option: assignment.tails.clone(),
            result: outcome.side,
            winner: outcome.winner.clone(),
        }
    }

    pub fn into_record(self, id: impl Into<String>, created_at: DateTime<Utc>) -> FlipRecord {
        FlipRecord {
            id: id.into(),
            user_id: self.user_id,
            option_1: self.option_1,
            option_2: self.option_2,
            heads_option: self.heads_option,
            tails_option: self.tails_option,
            result: self.result,
            winner: self.winner,
            created_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlipRecord {
    pub id: String,
    pub user_id: String,
    pub option_1: String,
    pub option_2: String,
    pub heads_option: String,
    pub tails_option: String,
    pub result: Side,
    pub winner: String,
    pub created_at: DateTime<Utc>,
}

/// Aggregate counts over a set of records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HistoryStats {
    pub total: usize,
    pub heads: usize,
    pub tails: usize,
}

impl HistoryStats {
    pub fn from_records(records: &[FlipRecord]) -> Self {
        let heads = records.iter().filter(|r| r.result == Side::Heads).count();
        let tails = records.iter().filter(|r| r.result == Side::Tails).count();
        Self {
            total: heads + tails,
            heads,
            tails,
        }
    }
}

/// Orders records newest first.
pub fn sort_newest_first(records: &mut [FlipRecord]) {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
