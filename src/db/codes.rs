use async_trait::async_trait;
use log::{info, warn};
use sqlx::{sqlite::SqliteRow, Row};

use super::{parse_timestamp, CodeStore, Database};
use crate::error::StoreError;
use crate::models::{VoterCategory, VotingCode};

fn code_from_row(row: &SqliteRow) -> Result<VotingCode, StoreError> {
    let category_str: String = row.try_get("voter_category")?;
    let category = category_str
        .parse::<VoterCategory>()
        .map_err(|_| StoreError::Corrupt(format!("unknown voter category '{}'", category_str)))?;
    let created_at_str: String = row.try_get("created_at")?;

    Ok(VotingCode {
        code: row.try_get("code")?,
        category,
        created_at: parse_timestamp(&created_at_str)?,
        used: row.try_get("used")?,
        team_id: row.try_get("team_id")?,
    })
}

#[async_trait]
impl CodeStore for Database {
    async fn get_code(&self, code: &str) -> Result<VotingCode, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT code, voter_category, created_at, used, team_id
            FROM codes
            WHERE code = ?
            "#,
        )
        .bind(code)
        .fetch_optional(self.pool())
        .await?;

        match row {
            Some(row) => code_from_row(&row),
            None => Err(StoreError::NotFound),
        }
    }

    async fn all_codes(&self) -> Result<Vec<VotingCode>, StoreError> {
        sqlx::query(
            r#"
            SELECT code, voter_category, created_at, used, team_id
            FROM codes
            ORDER BY created_at, code
            "#,
        )
        .fetch_all(self.pool())
        .await?
        .iter()
        .map(code_from_row)
        .collect()
    }

    async fn create_code(&self, code: &VotingCode) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO codes (code, voter_category, created_at, used, team_id)
            VALUES (?, ?, ?, FALSE, ?)
            ON CONFLICT(code) DO NOTHING
            "#,
        )
        .bind(&code.code)
        .bind(code.category.as_str())
        .bind(code.created_at.to_rfc3339())
        .bind(code.team_id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            warn!("code {} already exists", code.code);
            return Err(StoreError::KeyConflict);
        }
        Ok(())
    }

    async fn set_used(&self, code: &str, used: bool) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE codes SET used = ? WHERE code = ?")
            .bind(used)
            .bind(code)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn claim_code(&self, code: &str) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE codes SET used = TRUE WHERE code = ? AND used = FALSE")
            .bind(code)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        // Nothing changed: either the code vanished or somebody claimed it first
        match self.get_code(code).await {
            Ok(_) => Err(StoreError::AlreadyUsed),
            Err(e) => Err(e),
        }
    }

    async fn attach_team(&self, code: &str, team_id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE codes SET team_id = ? WHERE code = ?")
            .bind(team_id)
            .bind(code)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_code(&self, code: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM codes WHERE code = ?")
            .bind(code)
            .execute(self.pool())
            .await?;
        info!("deleted code {} ({} row(s))", code, result.rows_affected());
        Ok(())
    }
}
