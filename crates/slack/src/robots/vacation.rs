use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use relaybot_core::domain::vacation::Vacation;
use relaybot_core::vacation::VacationStore;

use crate::commands::{Command, CommandHandler, CommandRouter};
use crate::errors::RobotError;
use crate::events::Payload;
use crate::messages::BotIdentity;
use crate::reply::{Messenger, ReplySink};
use crate::robots::Robot;

const INPUT_DATE_FORMAT: &str = "%Y-%m-%d";
const DISPLAY_DATE_FORMAT: &str = "%a, %b %-d";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VacationAction {
    Set,
    List,
    WhoIsOut,
}

pub struct VacationRobot {
    handler: VacationHandler,
    router: CommandRouter<VacationAction>,
}

struct VacationHandler {
    vacations: Arc<dyn VacationStore>,
    messenger: Messenger,
    today: fn() -> NaiveDate,
}

fn utc_today() -> NaiveDate {
    Utc::now().date_naive()
}

impl VacationRobot {
    pub fn new(vacations: Arc<dyn VacationStore>, sink: Arc<dyn ReplySink>) -> Self {
        let messenger = Messenger::new(BotIdentity::new("Vacation", ":surfer:"), sink);
        let mut router = CommandRouter::new("vacation", messenger.clone());
        router
            .register("set", VacationAction::Set)
            .register("list", VacationAction::List)
            .register("whoisout", VacationAction::WhoIsOut);

        Self { handler: VacationHandler { vacations, messenger, today: utc_today }, router }
    }

    /// Replaces the clock used to decide what is current.
    pub fn with_clock(mut self, today: fn() -> NaiveDate) -> Self {
        self.handler.today = today;
        self
    }

    pub fn with_team_domain(mut self, team_domain: Option<String>) -> Self {
        self.handler.messenger = self.handler.messenger.with_team_domain(team_domain);
        self
    }
}

#[async_trait]
impl Robot for VacationRobot {
    fn name(&self) -> &str {
        "Vacation"
    }

    fn description(&self) -> &str {
        "Tracks who is out of office"
    }

    fn messenger(&self) -> &Messenger {
        &self.handler.messenger
    }

    async fn run(&self, payload: &Payload) {
        self.router.dispatch(&self.handler, payload, &payload.text).await;
    }
}

#[async_trait]
impl CommandHandler<VacationAction> for VacationHandler {
    async fn handle(
        &self,
        action: VacationAction,
        payload: &Payload,
        command: &Command,
    ) -> Result<(), RobotError> {
        let reply = match action {
            VacationAction::Set => self.set(payload, command).await?,
            VacationAction::List => self.list().await?,
            VacationAction::WhoIsOut => self.who_is_out().await?,
        };
        self.messenger.send(payload, reply).await?;
        Ok(())
    }
}

impl VacationHandler {
    async fn set(&self, payload: &Payload, command: &Command) -> Result<String, RobotError> {
        let dates = command.require_args(&["start-date", "end-date"])?;
        let start_date = parse_date(dates[0])?;
        let end_date = parse_date(dates[1])?;
        if end_date < start_date {
            return Ok(format!(
                "The end date *{}* is before the start date *{}*.",
                display_date(end_date),
                display_date(start_date)
            ));
        }

        self.vacations
            .create(&payload.user_name, &command.str_from(2), start_date, end_date)
            .await?;
        Ok("Vacation created".to_owned())
    }

    async fn list(&self) -> Result<String, RobotError> {
        let vacations = self.vacations.upcoming((self.today)()).await?;
        if vacations.is_empty() {
            return Ok("No current or upcoming vacations".to_owned());
        }
        let lines = vacations.iter().map(vacation_line).collect::<Vec<_>>();
        Ok(format!("Here is a list of current and upcoming vacations:\n{}", lines.join("\n")))
    }

    async fn who_is_out(&self) -> Result<String, RobotError> {
        let today = (self.today)();
        let vacations = self.vacations.current(today).await?;
        if vacations.is_empty() {
            return Ok("No one is out right now".to_owned());
        }
        let lines = vacations
            .iter()
            .map(|vacation| {
                format!(
                    "{}. They're out for another *{}* days.",
                    vacation_line(vacation),
                    vacation.days_remaining(today)
                )
            })
            .collect::<Vec<_>>();
        Ok(format!("Here is a list of people that are out:\n{}", lines.join("\n")))
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, RobotError> {
    NaiveDate::parse_from_str(raw, INPUT_DATE_FORMAT)
        .map_err(|_| RobotError::InvalidInput(format!("invalid date `{raw}`, expected YYYY-MM-DD")))
}

fn display_date(date: NaiveDate) -> String {
    date.format(DISPLAY_DATE_FORMAT).to_string()
}

fn vacation_line(vacation: &Vacation) -> String {
    format!(
        "- *{}* is out from *{}* to *{}*",
        vacation.user,
        display_date(vacation.start_date),
        display_date(vacation.end_date)
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;

    use relaybot_core::vacation::InMemoryVacationStore;

    use super::VacationRobot;
    use crate::events::Payload;
    use crate::reply::RecordingReplySink;
    use crate::robots::Robot;

    fn july_fourth() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 7, 4).expect("valid date")
    }

    fn payload(user: &str, text: &str) -> Payload {
        Payload {
            team_domain: "acme".to_owned(),
            channel_id: "C1".to_owned(),
            channel_name: "eng".to_owned(),
            user_id: format!("U-{user}"),
            user_name: user.to_owned(),
            robot: "vacation".to_owned(),
            text: text.to_owned(),
            correlation_id: "req-test".to_owned(),
        }
    }

    fn robot(sink: &RecordingReplySink) -> VacationRobot {
        VacationRobot::new(Arc::new(InMemoryVacationStore::default()), Arc::new(sink.clone()))
            .with_clock(july_fourth)
    }

    #[tokio::test]
    async fn empty_listings_have_friendly_replies() {
        let sink = RecordingReplySink::default();
        let robot = robot(&sink);
        robot.run(&payload("alice", "list")).await;
        robot.run(&payload("alice", "whoisout")).await;

        assert_eq!(sink.texts(), vec!["No current or upcoming vacations", "No one is out right now"]);
    }

    #[tokio::test]
    async fn created_vacations_show_in_list_and_whoisout() {
        let sink = RecordingReplySink::default();
        let robot = robot(&sink);
        robot.run(&payload("alice", "set 2026-07-01 2026-07-10 beach week")).await;
        robot.run(&payload("bob", "set 2026-08-03 2026-08-07")).await;
        robot.run(&payload("carol", "set 2026-06-01 2026-06-02")).await;
        robot.run(&payload("alice", "list")).await;
        robot.run(&payload("alice", "whoisout")).await;

        let texts = sink.texts();
        assert_eq!(texts[..3], ["Vacation created", "Vacation created", "Vacation created"]);
        assert_eq!(
            texts[3],
            "Here is a list of current and upcoming vacations:\n\
             - *alice* is out from *Wed, Jul 1* to *Fri, Jul 10*\n\
             - *bob* is out from *Mon, Aug 3* to *Fri, Aug 7*"
        );
        assert_eq!(
            texts[4],
            "Here is a list of people that are out:\n\
             - *alice* is out from *Wed, Jul 1* to *Fri, Jul 10*. They're out for another *6* days."
        );
    }

    #[tokio::test]
    async fn bad_input_is_rejected() {
        let sink = RecordingReplySink::default();
        let robot = robot(&sink);
        robot.run(&payload("alice", "set 2026-07-01")).await;
        robot.run(&payload("alice", "set 07/01/2026 2026-07-10")).await;
        robot.run(&payload("alice", "set 2026-07-10 2026-07-01")).await;

        assert_eq!(
            sink.texts(),
            vec![
                "Error running Vacation command: missing arguments, expected: <start-date> <end-date>",
                "Error running Vacation command: invalid date `07/01/2026`, expected YYYY-MM-DD",
                "The end date *Wed, Jul 1* is before the start date *Fri, Jul 10*.",
            ]
        );
    }
}
