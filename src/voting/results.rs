use crate::db::Storage;
use crate::error::VoteError;
use crate::models::{Team, VoteRecord, VoterCategory, VotingCategory, VotingCode};
use crate::voting::{CategoryScore, TeamResult, VoteResults};
use log::{info, warn};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

// Running sum of contributions and how many votes made it up
#[derive(Default, Clone, Copy)]
struct Accumulator {
    sum: f64,
    count: u32,
}

pub fn calculate_results(
    votes: &[VoteRecord],
    codes: &[VotingCode],
    categories: &[VotingCategory],
    teams: &[Team],
) -> VoteResults {
    // Step 1: lookup maps
    let voter_classes: HashMap<&str, VoterCategory> = codes
        .iter()
        .map(|code| (code.code.as_str(), code.category))
        .collect();
    let category_by_id: HashMap<i64, &VotingCategory> =
        categories.iter().map(|category| (category.id, category)).collect();
    let team_by_id: HashMap<i64, &Team> = teams.iter().map(|team| (team.id, team)).collect();

    // Step 2: accumulate weighted contributions per (team, category).
    // BTreeMap keeps iteration independent of the order votes arrive in.
    let mut totals: BTreeMap<(i64, i64), Accumulator> = BTreeMap::new();
    let mut skipped = 0usize;

    for vote in votes {
        let Some(voter_class) = voter_classes.get(vote.code.as_str()) else {
            skipped += 1;
            continue;
        };
        let Some(category) = category_by_id.get(&vote.category_id) else {
            skipped += 1;
            continue;
        };
        if !team_by_id.contains_key(&vote.team_id) {
            skipped += 1;
            continue;
        }

        let contribution = vote.rating as f64 * voter_class.weight() * category.weight;
        let acc = totals.entry((vote.team_id, vote.category_id)).or_default();
        acc.sum += contribution;
        acc.count += 1;
    }

    if skipped > 0 {
        warn!("Skipped {} vote(s) referencing unknown codes, categories or teams", skipped);
    }

    // Step 3: averages per pair, grouped by team
    let mut per_team: BTreeMap<i64, Vec<CategoryScore>> = BTreeMap::new();
    for ((team_id, category_id), acc) in totals {
        let category_name = category_by_id
            .get(&category_id)
            .map(|category| category.name.clone())
            .unwrap_or_default();
        per_team.entry(team_id).or_default().push(CategoryScore {
            category_id,
            category_name,
            score: acc.sum / acc.count as f64,
        });
    }

    // Step 4: every known team appears, even with no votes yet
    let mut results: Vec<TeamResult> = teams
        .iter()
        .map(|team| {
            // Total is summed in category id order, before the breakdown is sorted
            let mut scores = per_team.remove(&team.id).unwrap_or_default();
            let total_score = scores.iter().map(|s| s.score).sum();
            scores.sort_by(|a, b| by_score_desc(a.score, b.score).then(a.category_id.cmp(&b.category_id)));
            TeamResult {
                team_id: team.id,
                team_name: team.name.clone(),
                total_score,
                team_members: team.members.clone(),
                categories: scores,
            }
        })
        .collect();

    // Highest total first, ties go to the lower team id
    results.sort_by(|a, b| by_score_desc(a.total_score, b.total_score).then(a.team_id.cmp(&b.team_id)));

    VoteResults {
        total_votes: votes.len(),
        used_codes: codes.iter().filter(|code| code.used).count(),
        results,
    }
}

fn by_score_desc(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}

// Full scans of every table, then a fresh computation. Nothing is cached.
pub async fn compute_results(store: &dyn Storage) -> Result<VoteResults, VoteError> {
    let votes = store.all_votes().await?;
    let codes = store.all_codes().await?;
    let categories = store.all_categories().await?;
    let teams = store.all_teams().await?;

    let results = calculate_results(&votes, &codes, &categories, &teams);
    info!(
        "Computed results for {} team(s) from {} vote(s), {} used code(s)",
        results.results.len(),
        results.total_votes,
        results.used_codes
    );
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BallotEntry;

    const EPSILON: f64 = 1e-9;

    fn code(value: &str, category: VoterCategory, used: bool) -> VotingCode {
        let mut code = VotingCode::new(value.to_string(), category);
        code.used = used;
        code
    }

    fn category(id: i64, weight: f64) -> VotingCategory {
        VotingCategory {
            id,
            name: format!("Category {}", id),
            description: String::new(),
            weight,
        }
    }

    fn team(id: i64) -> Team {
        Team {
            id,
            name: format!("Team {}", id),
            description: String::new(),
            members: vec![format!("member-{}", id)],
        }
    }

    fn vote(code: &str, category_id: i64, team_id: i64, rating: i32) -> VoteRecord {
        VoteRecord::new(code, &BallotEntry { category_id, team_id, rating })
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < EPSILON,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn single_public_ballot_scales_by_both_weights() {
        let codes = vec![code("PUB01", VoterCategory::GeneralPublic, true)];
        let categories = vec![category(1, 0.5)];
        let teams: Vec<Team> = (1..=5).map(team).collect();
        let votes: Vec<VoteRecord> = (1..=5)
            .map(|team_id| vote("PUB01", 1, team_id, 6 - team_id as i32))
            .collect();

        let results = calculate_results(&votes, &codes, &categories, &teams);

        let ids: Vec<i64> = results.results.iter().map(|r| r.team_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        for (result, expected) in results.results.iter().zip([0.5, 0.4, 0.3, 0.2, 0.1]) {
            assert_close(result.total_score, expected);
            assert_eq!(result.categories.len(), 1);
            assert_close(result.categories[0].score, expected);
        }
        assert_eq!(results.total_votes, 5);
        assert_eq!(results.used_codes, 1);
    }

    #[test]
    fn two_ballots_two_categories_average_per_pair() {
        // Two jury ballots with opposite preferences across categories 0.4 and 0.6
        let codes = vec![
            code("JURY1", VoterCategory::GrandJury, true),
            code("JURY2", VoterCategory::GrandJury, true),
        ];
        let categories = vec![category(1, 0.4), category(2, 0.6)];
        let teams = vec![team(1), team(2)];
        let votes = vec![
            vote("JURY1", 1, 1, 5),
            vote("JURY1", 1, 2, 1),
            vote("JURY1", 2, 1, 1),
            vote("JURY1", 2, 2, 5),
            vote("JURY2", 1, 1, 4),
            vote("JURY2", 1, 2, 2),
            vote("JURY2", 2, 1, 2),
            vote("JURY2", 2, 2, 4),
        ];

        let results = calculate_results(&votes, &codes, &categories, &teams);
        let jury = VoterCategory::GrandJury.weight();

        // (r1*0.4 + r1b*0.6 + r2*0.4 + r2b*0.6) / 2, scaled by the voter weight
        let team1 = jury * (5.0 * 0.4 + 1.0 * 0.6 + 4.0 * 0.4 + 2.0 * 0.6) / 2.0;
        let team2 = jury * (1.0 * 0.4 + 5.0 * 0.6 + 2.0 * 0.4 + 4.0 * 0.6) / 2.0;

        assert_eq!(results.results[0].team_id, 2);
        assert_close(results.results[0].total_score, team2);
        assert_eq!(results.results[1].team_id, 1);
        assert_close(results.results[1].total_score, team1);

        // Team 1 is strongest in category 1
        let breakdown = &results.results[1].categories;
        assert_eq!(breakdown[0].category_id, 1);
        assert_close(breakdown[0].score, jury * (5.0 + 4.0) * 0.4 / 2.0);
        assert_eq!(breakdown[0].category_name, "Category 1");
    }

    #[test]
    fn vote_order_does_not_matter() {
        let codes = vec![
            code("A0001", VoterCategory::GrandJury, true),
            code("B0001", VoterCategory::OtherTeam, true),
            code("C0001", VoterCategory::GeneralPublic, false),
        ];
        let categories = vec![category(1, 0.3), category(2, 0.7)];
        let teams = vec![team(1), team(2), team(3)];
        let mut votes = Vec::new();
        for (i, c) in ["A0001", "B0001", "C0001"].iter().enumerate() {
            for team_id in 1..=3 {
                for category_id in 1..=2 {
                    let rating = ((i as i64 + team_id * category_id) % 5 + 1) as i32;
                    votes.push(vote(c, category_id, team_id, rating));
                }
            }
        }

        let forward = calculate_results(&votes, &codes, &categories, &teams);
        votes.reverse();
        let backward = calculate_results(&votes, &codes, &categories, &teams);
        votes.rotate_left(7);
        let rotated = calculate_results(&votes, &codes, &categories, &teams);

        for other in [&backward, &rotated] {
            assert_eq!(forward.results.len(), other.results.len());
            for (a, b) in forward.results.iter().zip(other.results.iter()) {
                assert_eq!(a.team_id, b.team_id);
                assert_close(a.total_score, b.total_score);
            }
        }
    }

    #[test]
    fn voter_classes_carry_distinct_weights() {
        let codes = vec![
            code("JURY1", VoterCategory::GrandJury, true),
            code("TEAM1", VoterCategory::OtherTeam, true),
            code("PUBL1", VoterCategory::GeneralPublic, true),
        ];
        let categories = vec![category(1, 1.0)];
        let teams = vec![team(1), team(2), team(3)];
        let votes = vec![
            vote("JURY1", 1, 1, 5),
            vote("TEAM1", 1, 2, 5),
            vote("PUBL1", 1, 3, 5),
        ];

        let results = calculate_results(&votes, &codes, &categories, &teams);
        let scores: Vec<(i64, f64)> = results
            .results
            .iter()
            .map(|r| (r.team_id, r.total_score))
            .collect();
        assert_eq!(scores[0].0, 1);
        assert_close(scores[0].1, 2.5);
        assert_eq!(scores[1].0, 2);
        assert_close(scores[1].1, 1.5);
        assert_eq!(scores[2].0, 3);
        assert_close(scores[2].1, 1.0);
    }

    #[test]
    fn partial_participation_averages_over_existing_ratings() {
        let codes = vec![
            code("JURY1", VoterCategory::GrandJury, true),
            code("JURY2", VoterCategory::GrandJury, true),
        ];
        let categories = vec![category(1, 1.0)];
        let teams = vec![team(1), team(2)];
        // JURY2 skipped team 2
        let votes = vec![vote("JURY1", 1, 1, 2), vote("JURY1", 1, 2, 4), vote("JURY2", 1, 1, 4)];

        let results = calculate_results(&votes, &codes, &categories, &teams);
        assert_eq!(results.results[0].team_id, 2);
        assert_close(results.results[0].total_score, 2.0);
        assert_close(results.results[1].total_score, 1.5);
    }

    #[test]
    fn ties_break_on_lower_id() {
        let codes = vec![code("JURY1", VoterCategory::GrandJury, true)];
        let categories = vec![category(2, 0.5), category(1, 0.5)];
        let teams = vec![team(9), team(4), team(7)];
        let votes = vec![
            vote("JURY1", 1, 9, 3),
            vote("JURY1", 1, 4, 3),
            vote("JURY1", 1, 7, 3),
            vote("JURY1", 2, 9, 3),
            vote("JURY1", 2, 4, 3),
            vote("JURY1", 2, 7, 3),
        ];

        let results = calculate_results(&votes, &codes, &categories, &teams);
        let ids: Vec<i64> = results.results.iter().map(|r| r.team_id).collect();
        assert_eq!(ids, vec![4, 7, 9]);
        let category_ids: Vec<i64> = results.results[0].categories.iter().map(|c| c.category_id).collect();
        assert_eq!(category_ids, vec![1, 2]);
    }

    #[test]
    fn total_is_summed_in_category_id_order() {
        let codes = vec![code("JURY1", VoterCategory::GrandJury, true)];
        let weights = [0.2, 0.4, 0.6];
        let categories: Vec<VotingCategory> = (1..=3)
            .map(|id| category(id, weights[id as usize - 1]))
            .collect();
        let teams = vec![team(1)];
        let votes: Vec<VoteRecord> = (1..=3).map(|id| vote("JURY1", id, 1, 1)).collect();

        let results = calculate_results(&votes, &codes, &categories, &teams);
        let result = &results.results[0];

        // Breakdown is highest first, the total follows category ids
        let category_ids: Vec<i64> = result.categories.iter().map(|c| c.category_id).collect();
        assert_eq!(category_ids, vec![3, 2, 1]);
        let expected: f64 = weights.iter().map(|w| 1.0 * VoterCategory::GrandJury.weight() * w).sum();
        assert_eq!(result.total_score.to_bits(), expected.to_bits());
    }

    #[test]
    fn teams_without_votes_are_listed_with_zero() {
        let codes = vec![code("JURY1", VoterCategory::GrandJury, false)];
        let categories = vec![category(1, 1.0)];
        let teams = vec![team(1), team(2)];
        let votes = vec![vote("JURY1", 1, 2, 1)];

        let results = calculate_results(&votes, &codes, &categories, &teams);
        assert_eq!(results.results[0].team_id, 2);
        assert_eq!(results.results[1].team_id, 1);
        assert_eq!(results.results[1].total_score, 0.0);
        assert!(results.results[1].categories.is_empty());
        assert_eq!(results.results[1].team_members, vec!["member-1"]);
        assert_eq!(results.used_codes, 0);
    }

    #[test]
    fn votes_with_unknown_references_are_counted_but_not_scored() {
        let codes = vec![code("JURY1", VoterCategory::GrandJury, true)];
        let categories = vec![category(1, 1.0)];
        let teams = vec![team(1)];
        let votes = vec![
            vote("JURY1", 1, 1, 4),
            vote("GONE1", 1, 1, 1),
            vote("JURY1", 99, 1, 1),
            vote("JURY1", 1, 99, 1),
        ];

        let results = calculate_results(&votes, &codes, &categories, &teams);
        assert_eq!(results.total_votes, 4);
        assert_eq!(results.results.len(), 1);
        assert_close(results.results[0].total_score, 2.0);
    }

    #[test]
    fn empty_input_yields_empty_standings() {
        let results = calculate_results(&[], &[], &[], &[]);
        assert_eq!(results.total_votes, 0);
        assert_eq!(results.used_codes, 0);
        assert!(results.results.is_empty());
    }
}
