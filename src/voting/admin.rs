use crate::db::Storage;
use crate::error::{StoreError, VoteError};
use crate::models::{Team, VoterCategory, VotingCategory, VotingCode};
use lazy_static::lazy_static;
use log::{error, info, warn};
use regex::Regex;
use serde::Serialize;
use uuid::Uuid;

pub const CODE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

// Attempts per code before giving up on finding an unused value
const MAX_CREATE_ATTEMPTS: usize = 5;

pub const MAX_CODES_PER_BATCH: usize = 1000;

lazy_static! {
    static ref CODE_PATTERN: Regex = Regex::new(r"^[0-9A-Z]{1,64}$").unwrap();
}

pub fn is_well_formed(code: &str) -> bool {
    CODE_PATTERN.is_match(code)
}

// Bytes of a v4 UUID that carry the version and variant bits
const FIXED_UUID_BYTES: [usize; 2] = [6, 8];

// Random code over CODE_ALPHABET. Only the fully random UUID bytes are used
// and bytes >= 252 are dropped, so each symbol is drawn uniformly.
pub fn generate_code(length: usize) -> String {
    let limit = (256 / CODE_ALPHABET.len() * CODE_ALPHABET.len()) as u8;
    let mut code = String::with_capacity(length);
    while code.len() < length {
        let uuid = Uuid::new_v4();
        let random_bytes = uuid
            .as_bytes()
            .iter()
            .enumerate()
            .filter(|(i, _)| !FIXED_UUID_BYTES.contains(i))
            .map(|(_, byte)| *byte);
        for byte in random_bytes {
            if code.len() == length {
                break;
            }
            if byte < limit {
                code.push(CODE_ALPHABET[byte as usize % CODE_ALPHABET.len()] as char);
            }
        }
    }
    code
}

pub async fn create_codes(
    store: &dyn Storage,
    category: VoterCategory,
    count: usize,
    length: usize,
) -> Result<Vec<VotingCode>, VoteError> {
    if count < 1 {
        return Err(VoteError::InvalidInput(
            "invalid request, missing category or count".to_string(),
        ));
    }
    if count > MAX_CODES_PER_BATCH {
        return Err(VoteError::InvalidInput(format!(
            "count {} exceeds the limit of {} codes per batch",
            count, MAX_CODES_PER_BATCH
        )));
    }

    let mut created = Vec::new();
    for _ in 0..count {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let code = VotingCode::new(generate_code(length), category);
            match store.create_code(&code).await {
                Ok(()) => {
                    info!("ADMIN: created code: {} with category {}", code.code, code.category);
                    created.push(code);
                    break;
                }
                Err(StoreError::KeyConflict) if attempts < MAX_CREATE_ATTEMPTS => continue,
                Err(e) => {
                    error!("ADMIN: failed to store code: {}", e);
                    return Err(e.into());
                }
            }
        }
    }
    Ok(created)
}

pub async fn codes_by_category(
    store: &dyn Storage,
    category: VoterCategory,
) -> Result<Vec<VotingCode>, VoteError> {
    let codes: Vec<VotingCode> = store
        .all_codes()
        .await?
        .into_iter()
        .filter(|code| code.category == category)
        .collect();
    info!("ADMIN: listed {} codes for category: {}", codes.len(), category);
    Ok(codes)
}

// Out-of-protocol override: puts a used code back into play.
pub async fn reset_code(store: &dyn Storage, code: &str) -> Result<(), VoteError> {
    match store.set_used(code, false).await {
        Ok(()) => {
            info!("ADMIN: reset code: {}", code);
            Ok(())
        }
        Err(StoreError::NotFound) => Err(VoteError::NotFound("code not found".to_string())),
        Err(e) => Err(e.into()),
    }
}

pub async fn reset_all_codes(store: &dyn Storage) -> Result<usize, VoteError> {
    let codes = store.all_codes().await?;
    let mut updated = 0;
    for code in codes.iter().filter(|code| code.used) {
        match store.set_used(&code.code, false).await {
            Ok(()) => updated += 1,
            Err(e) => error!("ADMIN: failed to reset code {}: {}", code.code, e),
        }
    }
    info!("ADMIN: reset {} codes", updated);
    Ok(updated)
}

pub async fn attach_team(store: &dyn Storage, code: &str, team_id: i64) -> Result<(), VoteError> {
    match store.get_team(team_id).await {
        Ok(_) => {}
        Err(StoreError::NotFound) => return Err(VoteError::NotFound("team not found".to_string())),
        Err(e) => return Err(e.into()),
    }

    match store.attach_team(code, team_id).await {
        Ok(()) => {
            info!("ADMIN: attached team {} to code {}", team_id, code);
            Ok(())
        }
        Err(StoreError::NotFound) => Err(VoteError::NotFound("code not found".to_string())),
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VoterCategoryInfo {
    pub key: VoterCategory,
    pub label: &'static str,
    pub weight: f64,
}

pub fn voter_categories() -> Vec<VoterCategoryInfo> {
    VoterCategory::ALL
        .iter()
        .map(|category| VoterCategoryInfo {
            key: *category,
            label: category.as_str(),
            weight: category.weight(),
        })
        .collect()
}

fn check_category(category: &VotingCategory) -> Result<(), VoteError> {
    if category.name.trim().is_empty() {
        return Err(VoteError::InvalidInput("invalid request empty name".to_string()));
    }
    if !category.weight.is_finite() || category.weight < 0.0 {
        return Err(VoteError::InvalidInput(format!(
            "invalid weight {}, must be a non-negative number",
            category.weight
        )));
    }
    Ok(())
}

fn check_team(team: &Team) -> Result<(), VoteError> {
    if team.name.trim().is_empty() {
        return Err(VoteError::InvalidInput("invalid request empty name".to_string()));
    }
    Ok(())
}

pub async fn create_category(store: &dyn Storage, category: &VotingCategory) -> Result<(), VoteError> {
    check_category(category)?;
    match store.create_category(category).await {
        Ok(()) => Ok(()),
        Err(StoreError::KeyConflict) => {
            warn!("META: category with ID {} already exists", category.id);
            Err(VoteError::Conflict("category with ID already exists".to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn update_category(store: &dyn Storage, category: &VotingCategory) -> Result<(), VoteError> {
    check_category(category)?;
    store.update_category(category).await?;
    Ok(())
}

pub async fn get_category(store: &dyn Storage, id: i64) -> Result<VotingCategory, VoteError> {
    match store.get_category(id).await {
        Err(StoreError::NotFound) => Err(VoteError::NotFound("category not found".to_string())),
        other => Ok(other?),
    }
}

pub async fn create_team(store: &dyn Storage, team: &Team) -> Result<(), VoteError> {
    check_team(team)?;
    match store.create_team(team).await {
        Ok(()) => Ok(()),
        Err(StoreError::KeyConflict) => {
            warn!("META: team with ID {} already exists", team.id);
            Err(VoteError::Conflict("team with ID already exists".to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn update_team(store: &dyn Storage, team: &Team) -> Result<(), VoteError> {
    check_team(team)?;
    store.update_team(team).await?;
    Ok(())
}

pub async fn get_team(store: &dyn Storage, id: i64) -> Result<Team, VoteError> {
    match store.get_team(id).await {
        Err(StoreError::NotFound) => Err(VoteError::NotFound("team not found".to_string())),
        other => Ok(other?),
    }
}
