use chrono::Utc;
use sqlx::Row;

use relaybot_core::domain::poker::{
    PokerSession, PokerStory, PokerVote, Roster, SessionId, StoryId, VoteId,
};
use relaybot_core::errors::{parse_number, StoreError};
use relaybot_core::poker::PokerStore;

use super::{parse_timestamp, timestamp, RepositoryError};
use crate::DbPool;

pub struct SqlPokerRepository {
    pool: DbPool,
}

impl SqlPokerRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> Result<PokerSession, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let channel: String =
        row.try_get("channel").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let title: String =
        row.try_get("title").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let users: String =
        row.try_get("users").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let finished_at_str: Option<String> =
        row.try_get("finished_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let finished_at = match finished_at_str {
        Some(raw) => Some(parse_timestamp("finished_at", &raw)?),
        None => None,
    };

    Ok(PokerSession {
        id: SessionId(id),
        channel,
        title,
        roster: Roster::from_csv(&users),
        created_at: parse_timestamp("created_at", &created_at_str)?,
        finished_at,
    })
}

fn row_to_story(row: &sqlx::sqlite::SqliteRow) -> Result<PokerStory, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let session_id: i64 =
        row.try_get("poker_session_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let title: String =
        row.try_get("title").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let estimation: Option<f64> =
        row.try_get("estimation").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(PokerStory {
        id: StoryId(id),
        session_id: SessionId(session_id),
        title,
        estimation,
        created_at: parse_timestamp("created_at", &created_at_str)?,
    })
}

fn row_to_vote(row: &sqlx::sqlite::SqliteRow) -> Result<PokerVote, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let story_id: i64 =
        row.try_get("poker_story_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let user: String = row.try_get("user").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let value: f64 = row.try_get("vote").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(PokerVote {
        id: VoteId(id),
        story_id: StoryId(story_id),
        user,
        value,
        created_at: parse_timestamp("created_at", &created_at_str)?,
    })
}

#[async_trait::async_trait]
impl PokerStore for SqlPokerRepository {
    async fn start_session(
        &self,
        channel: &str,
        title: &str,
        roster_csv: &str,
    ) -> Result<PokerSession, StoreError> {
        let roster = Roster::from_csv(roster_csv);
        let created_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO poker_sessions (channel, title, users, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(channel)
        .bind(title)
        .bind(roster.to_csv())
        .bind(timestamp(created_at))
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(PokerSession {
            id: SessionId(result.last_insert_rowid()),
            channel: channel.to_owned(),
            title: title.to_owned(),
            roster,
            created_at,
            finished_at: None,
        })
    }

    async fn current_session(&self, channel: &str) -> Result<Option<PokerSession>, StoreError> {
        let row = sqlx::query(
            "SELECT id, channel, title, users, created_at, finished_at
             FROM poker_sessions
             WHERE channel = ? AND finished_at IS NULL
             ORDER BY created_at DESC, id DESC
             LIMIT 1",
        )
        .bind(channel)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        match row {
            Some(ref r) => Ok(Some(row_to_session(r)?)),
            None => Ok(None),
        }
    }

    async fn start_story(
        &self,
        session_id: SessionId,
        title: &str,
    ) -> Result<PokerStory, StoreError> {
        let created_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO poker_stories (poker_session_id, title, created_at) VALUES (?, ?, ?)",
        )
        .bind(session_id.0)
        .bind(title)
        .bind(timestamp(created_at))
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(PokerStory {
            id: StoryId(result.last_insert_rowid()),
            session_id,
            title: title.to_owned(),
            estimation: None,
            created_at,
        })
    }

    async fn current_story(
        &self,
        session_id: SessionId,
    ) -> Result<Option<PokerStory>, StoreError> {
        let row = sqlx::query(
            "SELECT id, poker_session_id, title, estimation, created_at
             FROM poker_stories
             WHERE poker_session_id = ? AND estimation IS NULL
             ORDER BY created_at DESC, id DESC
             LIMIT 1",
        )
        .bind(session_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        match row {
            Some(ref r) => Ok(Some(row_to_story(r)?)),
            None => Ok(None),
        }
    }

    async fn cast_vote(
        &self,
        story_id: StoryId,
        user: &str,
        value: &str,
    ) -> Result<PokerVote, StoreError> {
        let value = parse_number("vote", value)?;
        let created_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO poker_votes (poker_story_id, user, vote, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(story_id.0)
        .bind(user)
        .bind(value)
        .bind(timestamp(created_at))
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(PokerVote {
            id: VoteId(result.last_insert_rowid()),
            story_id,
            user: user.to_owned(),
            value,
            created_at,
        })
    }

    async fn votes_for(&self, story_id: StoryId) -> Result<Vec<PokerVote>, StoreError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, poker_story_id, user, vote, created_at
             FROM poker_votes
             WHERE poker_story_id = ?
             ORDER BY created_at ASC, id ASC",
        )
        .bind(story_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.iter().map(row_to_vote).collect::<Result<Vec<_>, _>>()?)
    }

    async fn set_estimation(&self, story_id: StoryId, hours: &str) -> Result<(), StoreError> {
        let hours = parse_number("estimation", hours)?;
        sqlx::query("UPDATE poker_stories SET estimation = ? WHERE id = ?")
            .bind(hours)
            .bind(story_id.0)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(())
    }

    async fn finish_session(&self, session_id: SessionId) -> Result<(), StoreError> {
        sqlx::query("UPDATE poker_sessions SET finished_at = ? WHERE id = ?")
            .bind(timestamp(Utc::now()))
            .bind(session_id.0)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(())
    }

    async fn stories_for(&self, session_id: SessionId) -> Result<Vec<PokerStory>, StoreError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, poker_session_id, title, estimation, created_at
             FROM poker_stories
             WHERE poker_session_id = ?
             ORDER BY created_at ASC, id ASC",
        )
        .bind(session_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.iter().map(row_to_story).collect::<Result<Vec<_>, _>>()?)
    }

    async fn estimated_stories_for(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<PokerStory>, StoreError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, poker_session_id, title, estimation, created_at
             FROM poker_stories
             WHERE poker_session_id = ? AND estimation IS NOT NULL
             ORDER BY created_at ASC, id ASC",
        )
        .bind(session_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.iter().map(row_to_story).collect::<Result<Vec<_>, _>>()?)
    }
}
