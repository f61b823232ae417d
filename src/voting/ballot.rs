use crate::db::Storage;
use crate::error::{StoreError, VoteError};
use crate::models::{BallotEntry, BallotView, BallotViewEntry, CodeValidation, VoteRecord};
use log::{error, info, warn};
use std::collections::{HashMap, HashSet};

pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 5;

const CODE_REJECTED: &str = "code not valid or already used";

fn duplicate_vote(entry: &BallotEntry) -> VoteError {
    VoteError::Conflict(format!("duplicate vote for {}/{}", entry.category_id, entry.team_id))
}

pub async fn validate_code(store: &dyn Storage, code: &str) -> Result<CodeValidation, VoteError> {
    match store.get_code(code).await {
        Ok(voting_code) => Ok(CodeValidation::from(&voting_code)),
        Err(StoreError::NotFound) => {
            warn!("code not found in storage: {}", code);
            Err(VoteError::NotFound(format!("code not found in storage: {}", code)))
        }
        Err(e) => {
            error!("error trying to get code from storage: {}", e);
            Err(e.into())
        }
    }
}

// Rejects malformed ballots before anything is written.
async fn check_ballot(store: &dyn Storage, entries: &[BallotEntry]) -> Result<(), VoteError> {
    if entries.is_empty() {
        return Err(VoteError::InvalidInput("ballot contains no votes".to_string()));
    }

    if let Some(entry) = entries
        .iter()
        .find(|e| !(MIN_RATING..=MAX_RATING).contains(&e.rating))
    {
        return Err(VoteError::InvalidInput(format!(
            "rating {} for {}/{} is outside {}..{}",
            entry.rating, entry.category_id, entry.team_id, MIN_RATING, MAX_RATING
        )));
    }

    let category_ids: HashSet<i64> = store.all_categories().await?.iter().map(|c| c.id).collect();
    let team_ids: HashSet<i64> = store.all_teams().await?.iter().map(|t| t.id).collect();

    for entry in entries {
        if !category_ids.contains(&entry.category_id) {
            return Err(VoteError::InvalidInput(format!("unknown category {}", entry.category_id)));
        }
        if !team_ids.contains(&entry.team_id) {
            return Err(VoteError::InvalidInput(format!("unknown team {}", entry.team_id)));
        }
    }
    Ok(())
}

// Writes one ballot and consumes its code.
//
// Order of operations: check the code is unused, insert every rating with a
// conditional put, then claim the code with a conditional update. Nothing is
// rolled back. A stored rating identical to the submitted one is accepted as a
// replay, so resubmitting the same ballot after a failed claim completes it.
// A key written earlier in this same call, or a stored rating that differs,
// is a duplicate vote.
pub async fn submit_ballot(
    store: &dyn Storage,
    code: &str,
    entries: &[BallotEntry],
) -> Result<(), VoteError> {
    check_ballot(store, entries).await?;

    match store.get_code(code).await {
        Ok(voting_code) if !voting_code.used => {}
        Ok(_) => {
            warn!("ballot rejected, code {} already used", code);
            return Err(VoteError::Conflict(CODE_REJECTED.to_string()));
        }
        Err(StoreError::NotFound) => {
            warn!("ballot rejected, code {} not found", code);
            return Err(VoteError::Conflict(CODE_REJECTED.to_string()));
        }
        Err(e) => return Err(e.into()),
    }

    let mut written: HashSet<(i64, i64)> = HashSet::new();
    for entry in entries {
        let key = (entry.category_id, entry.team_id);
        if written.contains(&key) {
            warn!("duplicate entry {}/{} within ballot for code {}", key.0, key.1, code);
            return Err(duplicate_vote(entry));
        }

        let record = VoteRecord::new(code, entry);
        match store.insert_if_absent(&record).await {
            Ok(()) => {}
            Err(StoreError::KeyConflict) => {
                let existing = store
                    .get_vote(code, entry.category_id, entry.team_id)
                    .await?;
                if existing.rating != entry.rating {
                    warn!(
                        "conflicting vote {}/{} for code {} (stored {}, submitted {})",
                        key.0, key.1, code, existing.rating, entry.rating
                    );
                    return Err(duplicate_vote(entry));
                }
                info!("vote {}/{} for code {} already stored, continuing", key.0, key.1, code);
            }
            Err(e) => {
                error!("failed to store vote {}/{} for code {}: {}", key.0, key.1, code, e);
                return Err(e.into());
            }
        }
        written.insert(key);
    }

    match store.claim_code(code).await {
        Ok(()) => {
            info!("recorded {} vote(s) for code {}", entries.len(), code);
            Ok(())
        }
        Err(StoreError::AlreadyUsed) | Err(StoreError::NotFound) => {
            warn!("lost the claim on code {}", code);
            Err(VoteError::Conflict(CODE_REJECTED.to_string()))
        }
        Err(e) => {
            error!("votes for code {} stored but claim failed: {}", code, e);
            Err(e.into())
        }
    }
}

pub async fn get_ballot(store: &dyn Storage, code: &str) -> Result<BallotView, VoteError> {
    let votes = store.votes_for_code(code).await?;
    if votes.is_empty() {
        return Err(VoteError::NotFound("no votes for code".to_string()));
    }

    let team_names: HashMap<i64, String> = store
        .all_teams()
        .await?
        .into_iter()
        .map(|t| (t.id, t.name))
        .collect();
    let category_names: HashMap<i64, String> = store
        .all_categories()
        .await?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect();

    let votes = votes
        .into_iter()
        .map(|vote| BallotViewEntry {
            entry: BallotEntry {
                category_id: vote.category_id,
                team_id: vote.team_id,
                rating: vote.rating,
            },
            team: team_names.get(&vote.team_id).cloned().unwrap_or_default(),
            category: category_names.get(&vote.category_id).cloned().unwrap_or_default(),
        })
        .collect();

    Ok(BallotView {
        code: code.to_string(),
        votes,
    })
}
