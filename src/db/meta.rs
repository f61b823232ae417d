use async_trait::async_trait;
use log::{info, warn};
use sqlx::{sqlite::SqliteRow, Row};

use super::{CategoryStore, Database, TeamStore};
use crate::error::StoreError;
use crate::models::{Team, VotingCategory};

fn category_from_row(row: &SqliteRow) -> Result<VotingCategory, StoreError> {
    Ok(VotingCategory {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        weight: row.try_get("weight")?,
    })
}

fn team_from_row(row: &SqliteRow) -> Result<Team, StoreError> {
    let members_json: String = row.try_get("members")?;
    let members = serde_json::from_str(&members_json)
        .map_err(|e| StoreError::Corrupt(format!("failed to parse team members: {}", e)))?;

    Ok(Team {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        members,
    })
}

fn members_to_json(team: &Team) -> Result<String, StoreError> {
    serde_json::to_string(&team.members)
        .map_err(|e| StoreError::Corrupt(format!("failed to encode team members: {}", e)))
}

#[async_trait]
impl CategoryStore for Database {
    async fn get_category(&self, id: i64) -> Result<VotingCategory, StoreError> {
        let row = sqlx::query("SELECT id, name, description, weight FROM categories WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        match row {
            Some(row) => category_from_row(&row),
            None => {
                warn!("CATEGORY: no category found with ID {}", id);
                Err(StoreError::NotFound)
            }
        }
    }

    async fn all_categories(&self) -> Result<Vec<VotingCategory>, StoreError> {
        sqlx::query("SELECT id, name, description, weight FROM categories ORDER BY id")
            .fetch_all(self.pool())
            .await?
            .iter()
            .map(category_from_row)
            .collect()
    }

    async fn create_category(&self, category: &VotingCategory) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO categories (id, name, description, weight)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(category.id)
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.weight)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            warn!("CATEGORY: item with ID {} already exists", category.id);
            return Err(StoreError::KeyConflict);
        }
        Ok(())
    }

    async fn update_category(&self, category: &VotingCategory) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO categories (id, name, description, weight)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE
            SET name = excluded.name, description = excluded.description, weight = excluded.weight
            "#,
        )
        .bind(category.id)
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.weight)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn delete_category(&self, id: i64) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        info!("CATEGORY: deleted category with ID {}", id);
        Ok(())
    }
}

#[async_trait]
impl TeamStore for Database {
    async fn get_team(&self, id: i64) -> Result<Team, StoreError> {
        let row = sqlx::query("SELECT id, name, description, members FROM teams WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        match row {
            Some(row) => team_from_row(&row),
            None => {
                warn!("TEAM: no team found with ID {}", id);
                Err(StoreError::NotFound)
            }
        }
    }

    async fn all_teams(&self) -> Result<Vec<Team>, StoreError> {
        sqlx::query("SELECT id, name, description, members FROM teams ORDER BY id")
            .fetch_all(self.pool())
            .await?
            .iter()
            .map(team_from_row)
            .collect()
    }

    async fn create_team(&self, team: &Team) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO teams (id, name, description, members)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(team.id)
        .bind(&team.name)
        .bind(&team.description)
        .bind(members_to_json(team)?)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            warn!("TEAM: item with ID {} already exists", team.id);
            return Err(StoreError::KeyConflict);
        }
        Ok(())
    }

    async fn update_team(&self, team: &Team) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO teams (id, name, description, members)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE
            SET name = excluded.name, description = excluded.description, members = excluded.members
            "#,
        )
        .bind(team.id)
        .bind(&team.name)
        .bind(&team.description)
        .bind(members_to_json(team)?)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn delete_team(&self, id: i64) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM teams WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        info!("TEAM: deleted team with ID {}", id);
        Ok(())
    }
}
