use std::sync::Arc;

use async_trait::async_trait;

use relaybot_core::poker::{PokerStore, PokerTable, RosterCheck, StoryStart};
use relaybot_core::{PokerSession, PokerStory, PokerVote};

use crate::commands::{Command, CommandHandler, CommandRouter};
use crate::errors::RobotError;
use crate::events::Payload;
use crate::messages::BotIdentity;
use crate::reply::{Messenger, ReplySink};
use crate::robots::Robot;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PokerAction {
    Status,
    StartSession,
    StartStory,
    Vote,
    Reveal,
    Estimate,
    Finish,
}

/// Planning poker over the session/story/vote table.
pub struct PokerRobot {
    handler: PokerHandler,
    router: CommandRouter<PokerAction>,
}

struct PokerHandler {
    table: PokerTable,
    messenger: Messenger,
}

impl PokerRobot {
    pub fn new(store: Arc<dyn PokerStore>, sink: Arc<dyn ReplySink>) -> Self {
        let messenger = Messenger::new(BotIdentity::new("Poker", ":game_die:"), sink);
        let mut router = CommandRouter::new("poker", messenger.clone());
        router
            .register("status", PokerAction::Status)
            .register_many(&["start", "session"], PokerAction::StartSession)
            .register_many(&["story", "s"], PokerAction::StartStory)
            .register_many(&["vote", "v"], PokerAction::Vote)
            .register("reveal", PokerAction::Reveal)
            .register_many(&["estimate", "set", "track"], PokerAction::Estimate)
            .register("finish", PokerAction::Finish);

        Self { handler: PokerHandler { table: PokerTable::new(store), messenger }, router }
    }

    /// Team domain stamped on messages sent outside of a request.
    pub fn with_team_domain(mut self, team_domain: Option<String>) -> Self {
        self.handler.messenger = self.handler.messenger.with_team_domain(team_domain);
        self
    }
}

#[async_trait]
impl Robot for PokerRobot {
    fn name(&self) -> &str {
        "Poker"
    }

    fn description(&self) -> &str {
        "Planning poker sessions, stories and votes"
    }

    fn messenger(&self) -> &Messenger {
        &self.handler.messenger
    }

    async fn run(&self, payload: &Payload) {
        self.router.dispatch(&self.handler, payload, &payload.text).await;
    }
}

#[async_trait]
impl CommandHandler<PokerAction> for PokerHandler {
    async fn handle(
        &self,
        action: PokerAction,
        payload: &Payload,
        command: &Command,
    ) -> Result<(), RobotError> {
        match action {
            PokerAction::Status => self.status(payload).await,
            PokerAction::StartSession => self.start_session(payload, command).await,
            PokerAction::StartStory => self.start_story(payload, command).await,
            PokerAction::Vote => self.vote(payload, command).await,
            PokerAction::Reveal => self.reveal(payload).await,
            PokerAction::Estimate => self.estimate(payload, command).await,
            PokerAction::Finish => self.finish(payload).await,
        }
    }
}

impl PokerHandler {
    async fn status(&self, payload: &Payload) -> Result<(), RobotError> {
        let Some(status) = self.table.status(&payload.channel_name).await? else {
            self.messenger
                .send(payload, format!("No active poker session on *{}*.", payload.channel_name))
                .await?;
            return Ok(());
        };

        let mut lines =
            vec![format!("We are playing a poker planning session called *{}*", status.session.title)];
        if status.estimated_count > 0 {
            lines.push(format!(
                "We have estimated {} {} so far.",
                status.estimated_count,
                if status.estimated_count == 1 { "story" } else { "stories" }
            ));
        }
        match &status.current {
            None => lines.push(
                "There are no stories waiting for estimations. You can use `/poker story` to \
                 start a new one or `/poker finish` to finish this session."
                    .to_owned(),
            ),
            Some(current) => {
                lines.push(format!("We are estimating the story *{}*", current.story.title));
                let voters = current.voters();
                if voters.is_empty() {
                    lines.push("No one voted yet".to_owned());
                } else {
                    lines.push(format!("The following users already voted: {}", voters.join(", ")));
                }
            }
        }

        self.messenger.send(payload, lines.join("\n")).await?;
        Ok(())
    }

    async fn start_session(&self, payload: &Payload, command: &Command) -> Result<(), RobotError> {
        let title = command.str_from(0);
        if title.is_empty() {
            self.messenger
                .send(payload, "You need to give the session a title: `/poker session <title>`")
                .await?;
            return Ok(());
        }

        let session =
            self.table.start_session(&payload.channel_name, &title, command.param("users")).await?;
        self.messenger
            .send(payload, format!("Started poker session for *{}*", session.title))
            .await?;
        Ok(())
    }

    async fn start_story(&self, payload: &Payload, command: &Command) -> Result<(), RobotError> {
        let Some(session) = self.require_session(payload).await? else {
            return Ok(());
        };
        let title = command.str_from(0);
        if title.is_empty() {
            self.messenger
                .send(payload, "You need to give the story a title: `/poker story <title>`")
                .await?;
            return Ok(());
        }

        let reply = match self.table.start_story(&session, &title).await? {
            StoryStart::Started(story) => format!("We can now vote for *{}*", story.title),
            StoryStart::Blocked { pending } => {
                format!("Cannot start a new story until you estimate *{}*", pending.title)
            }
        };
        self.messenger.send(payload, reply).await?;
        Ok(())
    }

    async fn vote(&self, payload: &Payload, command: &Command) -> Result<(), RobotError> {
        let Some((session, story)) = self.require_story(payload).await? else {
            return Ok(());
        };
        let value = command.require_args(&["vote"])?[0];

        let receipt = self.table.cast_vote(&session, &story, &payload.user_name, value).await?;
        self.messenger.send(payload, format!("Vote cast for *{}*", payload.user_name)).await?;

        if let RosterCheck::Complete { votes } = &receipt.roster {
            self.messenger.send(payload, "Everyone voted, revealing votes.").await?;
            self.messenger.send(payload, reveal_listing(&story, votes)).await?;
        }
        Ok(())
    }

    async fn reveal(&self, payload: &Payload) -> Result<(), RobotError> {
        let Some((_, story)) = self.require_story(payload).await? else {
            return Ok(());
        };
        let votes = self.table.reveal_votes(&story).await?;
        self.messenger.send(payload, reveal_listing(&story, &votes)).await?;
        Ok(())
    }

    async fn estimate(&self, payload: &Payload, command: &Command) -> Result<(), RobotError> {
        let Some((_, story)) = self.require_story(payload).await? else {
            return Ok(());
        };
        let hours = command.require_args(&["hours"])?[0];

        self.table.set_estimation(&story, hours).await?;
        self.messenger
            .send(payload, format!("Tracked estimation of *{hours}* hours for *{}*", story.title))
            .await?;
        Ok(())
    }

    async fn finish(&self, payload: &Payload) -> Result<(), RobotError> {
        let Some(session) = self.require_session(payload).await? else {
            return Ok(());
        };
        self.table.finish_session(&session).await?;
        let stories = self.table.stories(&session).await?;

        let mut text = format!("Finished poker session for *{}*.", session.title);
        if !stories.is_empty() {
            text.push_str("\n\nThe following stories were estimated:");
            for story in &stories {
                text.push_str(&format!("\n*{}* - Hours: {}", story.title, hours_label(story)));
            }
        }
        self.messenger.send(payload, text).await?;
        Ok(())
    }

    /// Replies with guidance and yields `None` when the channel has no open session.
    async fn require_session(&self, payload: &Payload) -> Result<Option<PokerSession>, RobotError> {
        let session = self.table.current_session(&payload.channel_name).await?;
        if session.is_none() {
            self.messenger
                .send(
                    payload,
                    format!(
                        "No active poker session on *{}*. Use `/poker session` to start a new \
                         session.",
                        payload.channel_name
                    ),
                )
                .await?;
        }
        Ok(session)
    }

    async fn require_story(
        &self,
        payload: &Payload,
    ) -> Result<Option<(PokerSession, PokerStory)>, RobotError> {
        let Some(session) = self.require_session(payload).await? else {
            return Ok(None);
        };
        match self.table.current_story(&session).await? {
            Some(story) => Ok(Some((session, story))),
            None => {
                self.messenger
                    .send(
                        payload,
                        format!(
                            "No current story on *{}*. Use `/poker story` to start a new story.",
                            payload.channel_name
                        ),
                    )
                    .await?;
                Ok(None)
            }
        }
    }
}

fn reveal_listing(story: &PokerStory, votes: &[PokerVote]) -> String {
    let mut text = format!("Votes for *{}*:", story.title);
    for vote in votes {
        text.push_str(&format!("\n- *{}* voted *{:.2}* hours", vote.user, vote.value));
    }
    text
}

fn hours_label(story: &PokerStory) -> String {
    match story.estimation {
        Some(hours) => format!("{hours:.2}"),
        None => "not estimated".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use relaybot_core::errors::StoreError;
    use relaybot_core::poker::InMemoryPokerStore;

    use super::PokerRobot;
    use crate::events::Payload;
    use crate::reply::RecordingReplySink;
    use crate::robots::Robot;

    struct Fixture {
        store: Arc<InMemoryPokerStore>,
        sink: RecordingReplySink,
        robot: PokerRobot,
    }

    impl Fixture {
        fn new() -> Self {
            let store = Arc::new(InMemoryPokerStore::default());
            let sink = RecordingReplySink::default();
            let robot = PokerRobot::new(store.clone(), Arc::new(sink.clone()));
            Self { store, sink, robot }
        }

        async fn say(&self, user: &str, text: &str) -> Vec<String> {
            let before = self.sink.texts().len();
            self.robot.run(&payload(user, text)).await;
            self.sink.texts().split_off(before)
        }
    }

    fn payload(user: &str, text: &str) -> Payload {
        Payload {
            team_domain: "acme".to_owned(),
            channel_id: "C024BE91L".to_owned(),
            channel_name: "eng".to_owned(),
            user_id: format!("U-{user}"),
            user_name: user.to_owned(),
            robot: "poker".to_owned(),
            text: text.to_owned(),
            correlation_id: "req-test".to_owned(),
        }
    }

    #[tokio::test]
    async fn status_without_session_is_guidance() {
        let fixture = Fixture::new();
        assert_eq!(fixture.say("alice", "status").await, vec!["No active poker session on *eng*."]);
    }

    #[tokio::test]
    async fn fresh_session_status_omits_estimated_count() {
        let fixture = Fixture::new();
        fixture.say("alice", "session Sprint 9").await;

        assert_eq!(
            fixture.say("alice", "status").await,
            vec![
                "We are playing a poker planning session called *Sprint 9*\n\
                 There are no stories waiting for estimations. You can use `/poker story` to \
                 start a new one or `/poker finish` to finish this session."
            ]
        );
    }

    #[tokio::test]
    async fn dependent_verbs_guide_when_nothing_is_open() {
        let fixture = Fixture::new();
        assert_eq!(
            fixture.say("alice", "story Login").await,
            vec!["No active poker session on *eng*. Use `/poker session` to start a new session."]
        );

        fixture.say("alice", "session Sprint 9").await;
        assert_eq!(
            fixture.say("alice", "vote 3").await,
            vec!["No current story on *eng*. Use `/poker story` to start a new story."]
        );
    }

    #[tokio::test]
    async fn full_round_without_roster() {
        let fixture = Fixture::new();

        assert_eq!(
            fixture.say("alice", "session Sprint 9").await,
            vec!["Started poker session for *Sprint 9*"]
        );
        assert_eq!(fixture.say("alice", "s Login page").await, vec!["We can now vote for *Login page*"]);
        assert_eq!(
            fixture.say("carol", "story Signup").await,
            vec!["Cannot start a new story until you estimate *Login page*"]
        );
        assert_eq!(fixture.store.story_count(), 1);

        assert_eq!(fixture.say("alice", "v 3").await, vec!["Vote cast for *alice*"]);
        assert_eq!(fixture.say("bob", "vote 5").await, vec!["Vote cast for *bob*"]);
        assert_eq!(
            fixture.say("alice", "status").await,
            vec![
                "We are playing a poker planning session called *Sprint 9*\n\
                 We are estimating the story *Login page*\n\
                 The following users already voted: alice, bob"
            ]
        );
        assert_eq!(
            fixture.say("alice", "reveal").await,
            vec!["Votes for *Login page*:\n- *alice* voted *3.00* hours\n- *bob* voted *5.00* hours"]
        );
        assert_eq!(
            fixture.say("alice", "estimate 5").await,
            vec!["Tracked estimation of *5* hours for *Login page*"]
        );
        assert_eq!(
            fixture.say("alice", "status").await,
            vec![
                "We are playing a poker planning session called *Sprint 9*\n\
                 We have estimated 1 story so far.\n\
                 There are no stories waiting for estimations. You can use `/poker story` to \
                 start a new one or `/poker finish` to finish this session."
            ]
        );

        fixture.say("alice", "story Signup").await;
        assert_eq!(
            fixture.say("alice", "finish").await,
            vec![
                "Finished poker session for *Sprint 9*.\n\n\
                 The following stories were estimated:\n\
                 *Login page* - Hours: 5.00\n\
                 *Signup* - Hours: not estimated"
            ]
        );
        assert_eq!(fixture.say("alice", "status").await, vec!["No active poker session on *eng*."]);
    }

    #[tokio::test]
    async fn roster_completion_reveals_votes() {
        let fixture = Fixture::new();
        fixture.say("alice", "start Sprint 10 users:alice,bob").await;
        fixture.say("alice", "story Search").await;

        assert_eq!(fixture.say("alice", "vote 2").await, vec!["Vote cast for *alice*"]);
        assert_eq!(
            fixture.say("bob", "vote 8").await,
            vec![
                "Vote cast for *bob*",
                "Everyone voted, revealing votes.",
                "Votes for *Search*:\n- *alice* voted *2.00* hours\n- *bob* voted *8.00* hours",
            ]
        );
    }

    #[tokio::test]
    async fn late_vote_on_complete_roster_reveals_again() {
        let fixture = Fixture::new();
        fixture.say("alice", "start Sprint 10 users:alice,bob").await;
        fixture.say("alice", "story Search").await;
        fixture.say("alice", "vote 1").await;
        fixture.say("bob", "vote 2").await;

        assert_eq!(
            fixture.say("alice", "vote 3").await,
            vec![
                "Vote cast for *alice*",
                "Everyone voted, revealing votes.",
                "Votes for *Search*:\n- *alice* voted *1.00* hours\n- *bob* voted *2.00* hours\n- *alice* voted *3.00* hours",
            ]
        );
    }

    #[tokio::test]
    async fn missing_vote_value_is_reported_as_error() {
        let fixture = Fixture::new();
        fixture.say("alice", "session Sprint 9").await;
        fixture.say("alice", "story Login").await;

        assert_eq!(
            fixture.say("alice", "vote").await,
            vec!["Error running Poker command: missing arguments, expected: <vote>"]
        );
    }

    #[tokio::test]
    async fn non_numeric_vote_surfaces_storage_coercion_error() {
        let fixture = Fixture::new();
        fixture.say("alice", "session Sprint 9").await;
        fixture.say("alice", "story Login").await;

        assert_eq!(
            fixture.say("alice", "vote lots").await,
            vec!["Error running Poker command: invalid numeric value for vote: `lots`"]
        );
    }

    #[tokio::test]
    async fn storage_failures_become_one_error_reply() {
        let fixture = Fixture::new();
        fixture.store.fail_with(StoreError::Storage("database is locked".to_owned()));

        assert_eq!(
            fixture.say("alice", "status").await,
            vec!["Error running Poker command: storage failure: database is locked"]
        );
    }

    #[tokio::test]
    async fn session_without_title_is_guidance() {
        let fixture = Fixture::new();
        assert_eq!(
            fixture.say("alice", "session").await,
            vec!["You need to give the session a title: `/poker session <title>`"]
        );
        assert_eq!(fixture.say("alice", "status").await, vec!["No active poker session on *eng*."]);
    }

    #[tokio::test]
    async fn unknown_verb_lists_poker_commands() {
        let fixture = Fixture::new();
        assert_eq!(
            fixture.say("alice", "shuffle").await,
            vec![
                "Invalid command *shuffle*\n*Usage:* `/poker <command>`\n*Commands:* `estimate`, \
                 `finish`, `reveal`, `s`, `session`, `set`, `start`, `status`, `story`, `track`, \
                 `v`, `vote`"
            ]
        );
    }
}
