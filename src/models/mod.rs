use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::VoteError;

// Class of voter a code was issued to. Each class carries a fixed influence weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoterCategory {
    GrandJury,
    OtherTeam,
    GeneralPublic,
}

impl VoterCategory {
    pub const ALL: [VoterCategory; 3] = [
        VoterCategory::GrandJury,
        VoterCategory::OtherTeam,
        VoterCategory::GeneralPublic,
    ];

    pub fn weight(self) -> f64 {
        match self {
            VoterCategory::GrandJury => 0.5,
            VoterCategory::OtherTeam => 0.3,
            VoterCategory::GeneralPublic => 0.2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VoterCategory::GrandJury => "grand_jury",
            VoterCategory::OtherTeam => "other_team",
            VoterCategory::GeneralPublic => "general_public",
        }
    }
}

impl fmt::Display for VoterCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoterCategory {
    type Err = VoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "grand_jury" => Ok(VoterCategory::GrandJury),
            "other_team" => Ok(VoterCategory::OtherTeam),
            "general_public" => Ok(VoterCategory::GeneralPublic),
            _ => Err(VoteError::InvalidInput(format!("invalid category: {}", s))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingCode {
    pub code: String,
    pub category: VoterCategory,
    pub created_at: DateTime<Utc>,
    pub used: bool,
    pub team_id: Option<i64>,
}

impl VotingCode {
    pub fn new(code: String, category: VoterCategory) -> Self {
        Self {
            code,
            category,
            created_at: Utc::now(),
            used: false,
            team_id: None,
        }
    }
}

// A judging criterion. The weight multiplies every rating cast in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VotingCategory {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub members: Vec<String>,
}

// One persisted rating. (code, category_id, team_id) is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRecord {
    pub code: String,
    pub category_id: i64,
    pub team_id: i64,
    pub rating: i32,
    pub timestamp: DateTime<Utc>,
}

impl VoteRecord {
    pub fn new(code: &str, entry: &BallotEntry) -> Self {
        Self {
            code: code.to_string(),
            category_id: entry.category_id,
            team_id: entry.team_id,
            rating: entry.rating,
            timestamp: Utc::now(),
        }
    }

    pub fn sort_key(&self) -> String {
        sort_key(self.category_id, self.team_id)
    }
}

// Secondary key of a vote within its ballot
pub fn sort_key(category_id: i64, team_id: i64) -> String {
    format!("{}#{}", category_id, team_id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BallotEntry {
    pub category_id: i64,
    pub team_id: i64,
    pub rating: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitBallotRequest {
    pub code: String,
    pub votes: Vec<BallotEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BallotView {
    pub code: String,
    pub votes: Vec<BallotViewEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BallotViewEntry {
    #[serde(flatten)]
    pub entry: BallotEntry,
    pub team: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeValidation {
    pub valid: bool,
    pub category: VoterCategory,
    pub used: bool,
    pub created_at: DateTime<Utc>,
    pub code: String,
}

impl From<&VotingCode> for CodeValidation {
    fn from(code: &VotingCode) -> Self {
        Self {
            valid: true,
            category: code.category,
            used: code.used,
            created_at: code.created_at,
            code: code.code.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCodesRequest {
    pub category: String,
    pub count: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryUpdateRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeamUpdateRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub members: Vec<String>,
}
