use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::errors::RobotError;
use crate::events::Payload;
use crate::reply::{Messenger, ReplyError};

/// One parsed line of command text: `<verb> [positional...] [key:value...]`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Command {
    verb: String,
    args: Vec<String>,
    params: BTreeMap<String, String>,
    raw_args: String,
}

impl Command {
    /// Parsing never fails. Empty input yields the default (empty) verb.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let raw_args = raw.split_once(' ').map(|(_, rest)| rest.trim()).unwrap_or_default();
        let mut tokens = raw.split(' ');
        let verb = tokens.next().unwrap_or_default().to_owned();

        let mut args = Vec::new();
        let mut params = BTreeMap::new();
        for token in tokens.filter(|token| !token.is_empty()) {
            match token.split_once(':') {
                Some((key, value)) => {
                    params.insert(key.to_owned(), value.to_owned());
                }
                None => args.push(token.to_owned()),
            }
        }

        Self { verb, args, params, raw_args: raw_args.to_owned() }
    }

    pub fn verb(&self) -> &str {
        &self.verb
    }

    /// Positional argument `index`, or `""` when absent.
    pub fn arg(&self, index: usize) -> &str {
        self.args.get(index).map(String::as_str).unwrap_or("")
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Everything after the verb, unsplit.
    pub fn raw_args(&self) -> &str {
        &self.raw_args
    }

    pub fn has_args(&self) -> bool {
        !self.args.is_empty()
    }

    /// Named parameter `key`, or `""` when absent.
    pub fn param(&self, key: &str) -> &str {
        self.params.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    pub fn is_default(&self) -> bool {
        self.verb.is_empty()
    }

    pub fn is(&self, verbs: &[&str]) -> bool {
        verbs.iter().any(|verb| *verb == self.verb)
    }

    /// Positional arguments from `index` on, joined with single spaces.
    pub fn str_from(&self, index: usize) -> String {
        self.args.get(index..).map(|rest| rest.join(" ")).unwrap_or_default()
    }

    pub fn require_args(&self, names: &[&str]) -> Result<Vec<&str>, RobotError> {
        if self.args.len() < names.len() {
            let usage = names.iter().map(|name| format!("<{name}>")).collect::<Vec<_>>().join(" ");
            return Err(RobotError::MissingArguments { usage });
        }
        Ok(self.args.iter().take(names.len()).map(String::as_str).collect())
    }
}

/// Runs the action a verb was registered under.
#[async_trait]
pub trait CommandHandler<A>: Send + Sync {
    async fn handle(&self, action: A, payload: &Payload, command: &Command)
        -> Result<(), RobotError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled,
    Failed,
    Default,
    Help,
    MissingCommand,
    Unknown(String),
}

/// Verb table for one robot. Populated at construction, read-only afterwards.
pub struct CommandRouter<A> {
    name: String,
    messenger: Messenger,
    verbs: BTreeMap<String, A>,
    default: Option<A>,
}

impl<A: Copy + Send + Sync> CommandRouter<A> {
    pub fn new(name: impl Into<String>, messenger: Messenger) -> Self {
        Self { name: name.into(), messenger, verbs: BTreeMap::new(), default: None }
    }

    pub fn register(&mut self, verb: &str, action: A) -> &mut Self {
        self.verbs.insert(verb.to_owned(), action);
        self
    }

    pub fn register_many(&mut self, verbs: &[&str], action: A) -> &mut Self {
        for verb in verbs {
            self.register(verb, action);
        }
        self
    }

    pub fn register_default(&mut self, action: A) -> &mut Self {
        self.default = Some(action);
        self
    }

    pub fn help_text(&self) -> String {
        let verbs = self.verbs.keys().map(|verb| format!("`{verb}`")).collect::<Vec<_>>();
        format!("*Usage:* `/{} <command>`\n*Commands:* {}", self.name, verbs.join(", "))
    }

    pub async fn dispatch<H>(&self, handler: &H, payload: &Payload, raw: &str) -> DispatchOutcome
    where
        H: CommandHandler<A>,
    {
        let command = Command::parse(raw);

        if command.is_default() {
            return match self.default {
                Some(action) => {
                    self.run(handler, action, payload, &command).await;
                    DispatchOutcome::Default
                }
                None => {
                    self.reply(payload, format!("You must enter a command.\n{}", self.help_text()))
                        .await;
                    DispatchOutcome::MissingCommand
                }
            };
        }

        if command.verb() == "help" {
            self.reply(payload, self.help_text()).await;
            return DispatchOutcome::Help;
        }

        match self.verbs.get(command.verb()).copied() {
            Some(action) => self.run(handler, action, payload, &command).await,
            None => {
                self.reply(
                    payload,
                    format!("Invalid command *{}*\n{}", command.verb(), self.help_text()),
                )
                .await;
                DispatchOutcome::Unknown(command.verb().to_owned())
            }
        }
    }

    async fn run<H>(
        &self,
        handler: &H,
        action: A,
        payload: &Payload,
        command: &Command,
    ) -> DispatchOutcome
    where
        H: CommandHandler<A>,
    {
        info!(
            event_name = "robot.command.dispatched",
            correlation_id = %payload.correlation_id,
            robot = %self.name,
            channel = %payload.channel_name,
            verb = %command.verb(),
            "dispatching robot command"
        );

        match handler.handle(action, payload, command).await {
            Ok(()) => DispatchOutcome::Handled,
            Err(error) => {
                warn!(
                    event_name = "robot.command.failed",
                    correlation_id = %payload.correlation_id,
                    robot = %self.name,
                    channel = %payload.channel_name,
                    error = %error,
                    "robot command failed"
                );
                if let Err(reply_error) = self.messenger.send_error(payload, &error).await {
                    self.log_reply_failure(payload, &reply_error);
                }
                DispatchOutcome::Failed
            }
        }
    }

    async fn reply(&self, payload: &Payload, text: String) {
        if let Err(error) = self.messenger.send(payload, text).await {
            self.log_reply_failure(payload, &error);
        }
    }

    fn log_reply_failure(&self, payload: &Payload, error: &ReplyError) {
        warn!(
            event_name = "robot.reply.failed",
            correlation_id = %payload.correlation_id,
            robot = %self.name,
            channel = %payload.channel_name,
            error = %error,
            "failed to deliver robot reply"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::{Command, CommandHandler, CommandRouter, DispatchOutcome};
    use crate::errors::RobotError;
    use crate::events::Payload;
    use crate::messages::BotIdentity;
    use crate::reply::{Messenger, RecordingReplySink};

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum Action {
        List,
        Vote,
        Fail,
    }

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(Action, Vec<String>)>>,
    }

    impl Recorder {
        fn calls(&self) -> Vec<(Action, Vec<String>)> {
            self.calls.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl CommandHandler<Action> for Recorder {
        async fn handle(
            &self,
            action: Action,
            _payload: &Payload,
            command: &Command,
        ) -> Result<(), RobotError> {
            self.calls.lock().expect("lock").push((action, command.args().to_vec()));
            match action {
                Action::Fail => Err(RobotError::InvalidInput("boom".to_owned())),
                _ => Ok(()),
            }
        }
    }

    fn payload() -> Payload {
        Payload {
            team_domain: "acme".to_owned(),
            channel_id: "C1".to_owned(),
            channel_name: "eng".to_owned(),
            user_id: "U1".to_owned(),
            user_name: "alice".to_owned(),
            robot: "poker".to_owned(),
            text: String::new(),
            correlation_id: "req-test".to_owned(),
        }
    }

    fn router(sink: &RecordingReplySink) -> CommandRouter<Action> {
        let messenger =
            Messenger::new(BotIdentity::new("Poker", ":game_die:"), Arc::new(sink.clone()));
        let mut router = CommandRouter::new("poker", messenger);
        router.register_many(&["vote", "v"], Action::Vote).register("fail", Action::Fail);
        router
    }

    #[test]
    fn parses_verb_and_positional_args() {
        let command = Command::parse("vote 5");
        assert_eq!(command.verb(), "vote");
        assert_eq!(command.args(), ["5".to_owned()]);
        assert!(command.params().is_empty());
    }

    #[test]
    fn parses_named_params_on_first_colon() {
        let command = Command::parse("link acme mvn:123 pvt:456 url:https://x.test:8080");
        assert_eq!(command.verb(), "link");
        assert_eq!(command.args(), ["acme".to_owned()]);
        assert_eq!(command.param("mvn"), "123");
        assert_eq!(command.param("pvt"), "456");
        assert_eq!(command.param("url"), "https://x.test:8080");
        assert_eq!(command.param("missing"), "");
    }

    #[test]
    fn later_params_overwrite_earlier_ones() {
        let command = Command::parse("start users:a users:b,c");
        assert_eq!(command.param("users"), "b,c");
    }

    #[test]
    fn empty_input_is_the_default_command() {
        let command = Command::parse("");
        assert!(command.is_default());
        assert_eq!(command.verb(), "");
        assert!(!command.has_args());
        assert_eq!(command.arg(0), "");
    }

    #[test]
    fn verb_keeps_its_colons() {
        assert_eq!(Command::parse("a:b c").verb(), "a:b");
    }

    #[test]
    fn str_from_joins_remaining_args() {
        let command = Command::parse("story Login  page users:x");
        assert_eq!(command.str_from(0), "Login page");
        assert_eq!(command.str_from(1), "page");
        assert_eq!(command.str_from(5), "");
        assert!(command.is(&["s", "story"]));
        assert_eq!(command.raw_args(), "Login  page users:x");
    }

    #[test]
    fn require_args_reports_usage() {
        let command = Command::parse("set 2026-07-01");
        let error = command.require_args(&["start-date", "end-date"]).expect_err("must fail");
        assert_eq!(error.to_string(), "missing arguments, expected: <start-date> <end-date>");
        assert_eq!(command.require_args(&["start-date"]).expect("present"), vec!["2026-07-01"]);
    }

    #[tokio::test]
    async fn registered_verbs_reach_handler() {
        let sink = RecordingReplySink::default();
        let handler = Recorder::default();

        let outcome = router(&sink).dispatch(&handler, &payload(), "v 3").await;

        assert_eq!(outcome, DispatchOutcome::Handled);
        assert_eq!(handler.calls(), vec![(Action::Vote, vec!["3".to_owned()])]);
        assert!(sink.messages().is_empty());
    }

    #[tokio::test]
    async fn unknown_verb_sends_one_reply_with_help() {
        let sink = RecordingReplySink::default();
        let handler = Recorder::default();

        let outcome = router(&sink).dispatch(&handler, &payload(), "dance now").await;

        assert_eq!(outcome, DispatchOutcome::Unknown("dance".to_owned()));
        assert!(handler.calls().is_empty());
        assert_eq!(
            sink.texts(),
            vec!["Invalid command *dance*\n*Usage:* `/poker <command>`\n*Commands:* `fail`, `v`, `vote`"]
        );
    }

    #[tokio::test]
    async fn help_wins_over_registered_help_handler() {
        let sink = RecordingReplySink::default();
        let handler = Recorder::default();
        let mut router = router(&sink);
        router.register("help", Action::List);

        let outcome = router.dispatch(&handler, &payload(), "help").await;

        assert_eq!(outcome, DispatchOutcome::Help);
        assert!(handler.calls().is_empty());
        assert_eq!(sink.texts().len(), 1);
        assert!(sink.texts()[0].starts_with("*Usage:* `/poker <command>`"));
    }

    #[tokio::test]
    async fn empty_input_without_default_asks_for_a_command() {
        let sink = RecordingReplySink::default();
        let outcome = router(&sink).dispatch(&Recorder::default(), &payload(), "   ").await;

        assert_eq!(outcome, DispatchOutcome::MissingCommand);
        assert_eq!(sink.texts().len(), 1);
        assert!(sink.texts()[0].starts_with("You must enter a command.\n*Usage:*"));
    }

    #[tokio::test]
    async fn empty_input_runs_default_handler() {
        let sink = RecordingReplySink::default();
        let handler = Recorder::default();
        let mut router = router(&sink);
        router.register_default(Action::List);

        let outcome = router.dispatch(&handler, &payload(), "").await;

        assert_eq!(outcome, DispatchOutcome::Default);
        assert_eq!(handler.calls(), vec![(Action::List, Vec::new())]);
        assert!(sink.messages().is_empty());
    }

    #[tokio::test]
    async fn handler_errors_become_error_replies() {
        let sink = RecordingReplySink::default();
        let outcome = router(&sink).dispatch(&Recorder::default(), &payload(), "fail").await;

        assert_eq!(outcome, DispatchOutcome::Failed);
        assert_eq!(sink.texts(), vec!["Error running Poker command: boom"]);
    }

    #[tokio::test]
    async fn verbs_are_case_sensitive() {
        let sink = RecordingReplySink::default();
        let outcome = router(&sink).dispatch(&Recorder::default(), &payload(), "VOTE 3").await;
        assert_eq!(outcome, DispatchOutcome::Unknown("VOTE".to_owned()));
    }
}
