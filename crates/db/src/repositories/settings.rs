use sqlx::Row;

use relaybot_core::domain::setting::Setting;
use relaybot_core::errors::StoreError;
use relaybot_core::settings::SettingsStore;

use super::RepositoryError;
use crate::DbPool;

pub struct SqlSettingsRepository {
    pool: DbPool,
}

impl SqlSettingsRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_setting(row: &sqlx::sqlite::SqliteRow) -> Result<Setting, RepositoryError> {
    let user: String = row.try_get("user").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let value: String =
        row.try_get("value").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    Ok(Setting { user, name, value })
}

#[async_trait::async_trait]
impl SettingsStore for SqlSettingsRepository {
    async fn list(&self, user: &str) -> Result<Vec<Setting>, StoreError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT user, name, value FROM settings WHERE user = ? ORDER BY name ASC",
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.iter().map(row_to_setting).collect::<Result<Vec<_>, _>>()?)
    }

    async fn get(&self, user: &str, name: &str) -> Result<Option<Setting>, StoreError> {
        let row =
            sqlx::query("SELECT user, name, value FROM settings WHERE user = ? AND name = ?")
                .bind(user)
                .bind(name)
                .fetch_optional(&self.pool)
                .await
                .map_err(RepositoryError::from)?;

        match row {
            Some(ref r) => Ok(Some(row_to_setting(r)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, user: &str, name: &str, value: &str) -> Result<Setting, StoreError> {
        sqlx::query(
            "INSERT INTO settings (user, name, value) VALUES (?, ?, ?)
             ON CONFLICT(user, name) DO UPDATE SET value = excluded.value",
        )
        .bind(user)
        .bind(name)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(Setting { user: user.to_owned(), name: name.to_owned(), value: value.to_owned() })
    }

    async fn remove(&self, user: &str, name: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM settings WHERE user = ? AND name = ?")
            .bind(user)
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(result.rows_affected() > 0)
    }
}
