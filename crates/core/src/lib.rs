pub mod config;
pub mod domain;
pub mod errors;
pub mod poker;
pub mod settings;
pub mod vacation;

pub use domain::poker::{
    PokerSession, PokerStory, PokerVote, Roster, SessionId, SessionState, StoryId, StoryState,
    VoteId,
};
pub use domain::setting::Setting;
pub use domain::vacation::{Vacation, VacationId};
pub use errors::StoreError;
pub use poker::{
    CurrentStoryStatus, InMemoryPokerStore, PokerStore, PokerTable, RosterCheck, SessionSnapshot,
    SessionStatus, StoryStart, VoteReceipt,
};
pub use settings::{InMemorySettingsStore, SettingsStore};
pub use vacation::{InMemoryVacationStore, VacationStore};
