use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::poker::{
    PokerSession, PokerStory, PokerVote, Roster, SessionId, StoryId, VoteId,
};
use crate::errors::{parse_number, StoreError};

/// Persistence port for planning-poker state.
///
/// Every call re-reads the backing store; nothing is cached between calls.
#[async_trait]
pub trait PokerStore: Send + Sync {
    async fn start_session(
        &self,
        channel: &str,
        title: &str,
        roster_csv: &str,
    ) -> Result<PokerSession, StoreError>;

    /// The open session for `channel`, newest first if several raced in.
    async fn current_session(&self, channel: &str) -> Result<Option<PokerSession>, StoreError>;

    async fn start_story(&self, session_id: SessionId, title: &str)
        -> Result<PokerStory, StoreError>;

    /// The most recent story of the session that has no estimation yet.
    async fn current_story(&self, session_id: SessionId)
        -> Result<Option<PokerStory>, StoreError>;

    /// Appends a vote. `value` is coerced to a number by the store.
    async fn cast_vote(
        &self,
        story_id: StoryId,
        user: &str,
        value: &str,
    ) -> Result<PokerVote, StoreError>;

    /// Votes in insertion order.
    async fn votes_for(&self, story_id: StoryId) -> Result<Vec<PokerVote>, StoreError>;

    async fn set_estimation(&self, story_id: StoryId, hours: &str) -> Result<(), StoreError>;

    async fn finish_session(&self, session_id: SessionId) -> Result<(), StoreError>;

    /// Every story of the session ordered by creation.
    async fn stories_for(&self, session_id: SessionId) -> Result<Vec<PokerStory>, StoreError>;

    async fn estimated_stories_for(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<PokerStory>, StoreError>;
}

#[derive(Default)]
struct InMemoryPokerState {
    next_id: i64,
    sessions: Vec<PokerSession>,
    stories: Vec<PokerStory>,
    votes: Vec<PokerVote>,
    failure: Option<StoreError>,
}

impl InMemoryPokerState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn check(&self) -> Result<(), StoreError> {
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

/// Process-local `PokerStore` used by tests and dry runs.
#[derive(Default)]
pub struct InMemoryPokerStore {
    state: Mutex<InMemoryPokerState>,
}

impl InMemoryPokerStore {
    /// Makes every subsequent call fail with `error`.
    pub fn fail_with(&self, error: StoreError) {
        self.lock().failure = Some(error);
    }

    pub fn story_count(&self) -> usize {
        self.lock().stories.len()
    }

    fn lock(&self) -> MutexGuard<'_, InMemoryPokerState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl PokerStore for InMemoryPokerStore {
    async fn start_session(
        &self,
        channel: &str,
        title: &str,
        roster_csv: &str,
    ) -> Result<PokerSession, StoreError> {
        let mut state = self.lock();
        state.check()?;
        let session = PokerSession {
            id: SessionId(state.next_id()),
            channel: channel.to_owned(),
            title: title.to_owned(),
            roster: Roster::from_csv(roster_csv),
            created_at: Utc::now(),
            finished_at: None,
        };
        state.sessions.push(session.clone());
        Ok(session)
    }

    async fn current_session(&self, channel: &str) -> Result<Option<PokerSession>, StoreError> {
        let state = self.lock();
        state.check()?;
        Ok(state
            .sessions
            .iter()
            .rev()
            .find(|session| session.channel == channel && session.finished_at.is_none())
            .cloned())
    }

    async fn start_story(
        &self,
        session_id: SessionId,
        title: &str,
    ) -> Result<PokerStory, StoreError> {
        let mut state = self.lock();
        state.check()?;
        let story = PokerStory {
            id: StoryId(state.next_id()),
            session_id,
            title: title.to_owned(),
            estimation: None,
            created_at: Utc::now(),
        };
        state.stories.push(story.clone());
        Ok(story)
    }

    async fn current_story(
        &self,
        session_id: SessionId,
    ) -> Result<Option<PokerStory>, StoreError> {
        let state = self.lock();
        state.check()?;
        Ok(state
            .stories
            .iter()
            .rev()
            .find(|story| story.session_id == session_id && story.estimation.is_none())
            .cloned())
    }

    async fn cast_vote(
        &self,
        story_id: StoryId,
        user: &str,
        value: &str,
    ) -> Result<PokerVote, StoreError> {
        let mut state = self.lock();
        state.check()?;
        let value = parse_number("vote", value)?;
        let vote = PokerVote {
            id: VoteId(state.next_id()),
            story_id,
            user: user.to_owned(),
            value,
            created_at: Utc::now(),
        };
        state.votes.push(vote.clone());
        Ok(vote)
    }

    async fn votes_for(&self, story_id: StoryId) -> Result<Vec<PokerVote>, StoreError> {
        let state = self.lock();
        state.check()?;
        Ok(state.votes.iter().filter(|vote| vote.story_id == story_id).cloned().collect())
    }

    async fn set_estimation(&self, story_id: StoryId, hours: &str) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.check()?;
        let hours = parse_number("estimation", hours)?;
        if let Some(story) = state.stories.iter_mut().find(|story| story.id == story_id) {
            story.estimation = Some(hours);
        }
        Ok(())
    }

    async fn finish_session(&self, session_id: SessionId) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.check()?;
        if let Some(session) = state.sessions.iter_mut().find(|session| session.id == session_id) {
            session.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn stories_for(&self, session_id: SessionId) -> Result<Vec<PokerStory>, StoreError> {
        let state = self.lock();
        state.check()?;
        Ok(state.stories.iter().filter(|story| story.session_id == session_id).cloned().collect())
    }

    async fn estimated_stories_for(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<PokerStory>, StoreError> {
        let state = self.lock();
        state.check()?;
        Ok(state
            .stories
            .iter()
            .filter(|story| story.session_id == session_id && story.estimation.is_some())
            .cloned()
            .collect())
    }
}
