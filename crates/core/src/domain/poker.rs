use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoryId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoteId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Open,
    Finished,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoryState {
    Pending,
    Estimated,
}

/// Expected voters for a session, parsed from the comma-separated `users:` param.
///
/// An empty roster disables the auto-reveal check.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster(Vec<String>);

impl Roster {
    pub fn from_csv(csv: &str) -> Self {
        Self(
            csv.split(',')
                .map(str::trim)
                .filter(|user| !user.is_empty())
                .map(str::to_owned)
                .collect(),
        )
    }

    pub fn to_csv(&self) -> String {
        self.0.join(",")
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn users(&self) -> &[String] {
        &self.0
    }

    /// Roster members with no vote among `votes`, in roster order.
    pub fn outstanding(&self, votes: &[PokerVote]) -> Vec<String> {
        let voted: HashSet<&str> = votes.iter().map(|vote| vote.user.as_str()).collect();
        self.0.iter().filter(|user| !voted.contains(user.as_str())).cloned().collect()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PokerSession {
    pub id: SessionId,
    pub channel: String,
    pub title: String,
    pub roster: Roster,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl PokerSession {
    pub fn state(&self) -> SessionState {
        if self.finished_at.is_some() {
            SessionState::Finished
        } else {
            SessionState::Open
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PokerStory {
    pub id: StoryId,
    pub session_id: SessionId,
    pub title: String,
    /// Agreed estimate in hours.
    pub estimation: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl PokerStory {
    pub fn state(&self) -> StoryState {
        if self.estimation.is_some() {
            StoryState::Estimated
        } else {
            StoryState::Pending
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PokerVote {
    pub id: VoteId,
    pub story_id: StoryId,
    pub user: String,
    pub value: f64,
    pub created_at: DateTime<Utc>,
}
