use chrono::NaiveDate;
use sqlx::Row;

use relaybot_core::domain::vacation::{Vacation, VacationId};
use relaybot_core::errors::StoreError;
use relaybot_core::vacation::VacationStore;

use super::RepositoryError;
use crate::DbPool;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqlVacationRepository {
    pool: DbPool,
}

impl SqlVacationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_date(column: &str, raw: &str) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| RepositoryError::Decode(format!("{column}: {e}")))
}

fn row_to_vacation(row: &sqlx::sqlite::SqliteRow) -> Result<Vacation, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let user: String = row.try_get("user").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let description: String =
        row.try_get("description").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let start_date_str: String =
        row.try_get("start_date").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let end_date_str: String =
        row.try_get("end_date").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Vacation {
        id: VacationId(id),
        user,
        description,
        start_date: parse_date("start_date", &start_date_str)?,
        end_date: parse_date("end_date", &end_date_str)?,
    })
}

#[async_trait::async_trait]
impl VacationStore for SqlVacationRepository {
    async fn create(
        &self,
        user: &str,
        description: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vacation, StoreError> {
        let result = sqlx::query(
            "INSERT INTO vacations (user, description, start_date, end_date) VALUES (?, ?, ?, ?)",
        )
        .bind(user)
        .bind(description)
        .bind(start_date.format(DATE_FORMAT).to_string())
        .bind(end_date.format(DATE_FORMAT).to_string())
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(Vacation {
            id: VacationId(result.last_insert_rowid()),
            user: user.to_owned(),
            description: description.to_owned(),
            start_date,
            end_date,
        })
    }

    async fn upcoming(&self, today: NaiveDate) -> Result<Vec<Vacation>, StoreError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, user, description, start_date, end_date
             FROM vacations
             WHERE end_date >= ?
             ORDER BY start_date ASC, id ASC",
        )
        .bind(today.format(DATE_FORMAT).to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.iter().map(row_to_vacation).collect::<Result<Vec<_>, _>>()?)
    }

    async fn current(&self, today: NaiveDate) -> Result<Vec<Vacation>, StoreError> {
        let today = today.format(DATE_FORMAT).to_string();
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, user, description, start_date, end_date
             FROM vacations
             WHERE start_date <= ? AND end_date >= ?
             ORDER BY start_date ASC, id ASC",
        )
        .bind(&today)
        .bind(&today)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.iter().map(row_to_vacation).collect::<Result<Vec<_>, _>>()?)
    }
}
