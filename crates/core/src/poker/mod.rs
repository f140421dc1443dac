//! Planning-poker state machine.
//!
//! `PokerTable` resolves the current session and story through a [`PokerStore`] on every
//! call. It keeps no state of its own, so concurrent commands on the same channel race at
//! the storage layer exactly as they would without it.

pub mod store;

use std::sync::Arc;

use serde::Serialize;

use crate::domain::poker::{PokerSession, PokerStory, PokerVote};
use crate::errors::StoreError;

pub use store::{InMemoryPokerStore, PokerStore};

/// Result of asking to start a story.
#[derive(Clone, Debug, PartialEq)]
pub enum StoryStart {
    Started(PokerStory),
    /// Another story of the session still awaits its estimation. Nothing was inserted.
    Blocked { pending: PokerStory },
}

/// Roster bookkeeping performed after a vote lands.
#[derive(Clone, Debug, PartialEq)]
pub enum RosterCheck {
    /// The session has no roster, so votes never auto-reveal.
    Untracked,
    Waiting { outstanding: Vec<String> },
    /// Every roster member voted; carries the revealed votes.
    Complete { votes: Vec<PokerVote> },
}

#[derive(Clone, Debug, PartialEq)]
pub struct VoteReceipt {
    pub vote: PokerVote,
    pub roster: RosterCheck,
}

impl VoteReceipt {
    pub fn revealed(&self) -> Option<&[PokerVote]> {
        match &self.roster {
            RosterCheck::Complete { votes } => Some(votes),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CurrentStoryStatus {
    pub story: PokerStory,
    pub votes: Vec<PokerVote>,
}

impl CurrentStoryStatus {
    /// Distinct voters in first-vote order.
    pub fn voters(&self) -> Vec<&str> {
        let mut voters: Vec<&str> = Vec::new();
        for vote in &self.votes {
            if !voters.contains(&vote.user.as_str()) {
                voters.push(vote.user.as_str());
            }
        }
        voters
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SessionStatus {
    pub session: PokerSession,
    pub estimated_count: usize,
    pub current: Option<CurrentStoryStatus>,
}

/// Read-only view of a session and all of its stories.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub session: PokerSession,
    pub stories: Vec<PokerStory>,
}

#[derive(Clone)]
pub struct PokerTable {
    store: Arc<dyn PokerStore>,
}

impl PokerTable {
    pub fn new(store: Arc<dyn PokerStore>) -> Self {
        Self { store }
    }

    /// Opens a session without checking for an already open one in `channel`.
    pub async fn start_session(
        &self,
        channel: &str,
        title: &str,
        roster_csv: &str,
    ) -> Result<PokerSession, StoreError> {
        self.store.start_session(channel, title, roster_csv).await
    }

    pub async fn current_session(&self, channel: &str) -> Result<Option<PokerSession>, StoreError> {
        self.store.current_session(channel).await
    }

    pub async fn start_story(
        &self,
        session: &PokerSession,
        title: &str,
    ) -> Result<StoryStart, StoreError> {
        if let Some(pending) = self.store.current_story(session.id).await? {
            return Ok(StoryStart::Blocked { pending });
        }
        let story = self.store.start_story(session.id, title).await?;
        Ok(StoryStart::Started(story))
    }

    pub async fn current_story(
        &self,
        session: &PokerSession,
    ) -> Result<Option<PokerStory>, StoreError> {
        self.store.current_story(session.id).await
    }

    /// Appends a vote, then auto-reveals once every roster member has voted.
    pub async fn cast_vote(
        &self,
        session: &PokerSession,
        story: &PokerStory,
        user: &str,
        value: &str,
    ) -> Result<VoteReceipt, StoreError> {
        let vote = self.store.cast_vote(story.id, user, value).await?;
        if session.roster.is_empty() {
            return Ok(VoteReceipt { vote, roster: RosterCheck::Untracked });
        }

        let votes = self.store.votes_for(story.id).await?;
        let outstanding = session.roster.outstanding(&votes);
        let roster = if outstanding.is_empty() {
            RosterCheck::Complete { votes: self.reveal_votes(story).await? }
        } else {
            RosterCheck::Waiting { outstanding }
        };
        Ok(VoteReceipt { vote, roster })
    }

    pub async fn reveal_votes(&self, story: &PokerStory) -> Result<Vec<PokerVote>, StoreError> {
        self.store.votes_for(story.id).await
    }

    pub async fn set_estimation(&self, story: &PokerStory, hours: &str) -> Result<(), StoreError> {
        self.store.set_estimation(story.id, hours).await
    }

    pub async fn finish_session(&self, session: &PokerSession) -> Result<(), StoreError> {
        self.store.finish_session(session.id).await
    }

    pub async fn stories(&self, session: &PokerSession) -> Result<Vec<PokerStory>, StoreError> {
        self.store.stories_for(session.id).await
    }

    pub async fn estimated_stories(
        &self,
        session: &PokerSession,
    ) -> Result<Vec<PokerStory>, StoreError> {
        self.store.estimated_stories_for(session.id).await
    }

    pub async fn status(&self, channel: &str) -> Result<Option<SessionStatus>, StoreError> {
        let Some(session) = self.current_session(channel).await? else {
            return Ok(None);
        };
        let estimated_count = self.estimated_stories(&session).await?.len();
        let current = match self.current_story(&session).await? {
            Some(story) => {
                let votes = self.reveal_votes(&story).await?;
                Some(CurrentStoryStatus { story, votes })
            }
            None => None,
        };
        Ok(Some(SessionStatus { session, estimated_count, current }))
    }

    pub async fn snapshot(&self, channel: &str) -> Result<Option<SessionSnapshot>, StoreError> {
        let Some(session) = self.current_session(channel).await? else {
            return Ok(None);
        };
        let stories = self.stories(&session).await?;
        Ok(Some(SessionSnapshot { session, stories }))
    }
}
