pub mod admin;
pub mod ballot;
pub mod results;

use serde::Serialize;

// Weighted score of one team in one judging category
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryScore {
    pub category_id: i64,
    #[serde(rename = "category")]
    pub category_name: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamResult {
    pub team_id: i64,
    pub team_name: String,
    pub total_score: f64,
    pub team_members: Vec<String>,
    pub categories: Vec<CategoryScore>,
}

// Standings plus the raw counters shown next to them
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResults {
    pub total_votes: usize,
    pub used_codes: usize,
    pub results: Vec<TeamResult>,
}
