use std::sync::Arc;

use async_trait::async_trait;

use relaybot_core::domain::setting::parse_assignment;
use relaybot_core::settings::SettingsStore;

use crate::commands::{Command, CommandHandler, CommandRouter};
use crate::errors::RobotError;
use crate::events::Payload;
use crate::messages::BotIdentity;
use crate::reply::{Messenger, ReplySink};
use crate::robots::Robot;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreAction {
    List,
    Set,
    Remove,
}

/// Per-user settings, never echoing stored values back to the channel.
pub struct StoreRobot {
    handler: StoreHandler,
    router: CommandRouter<StoreAction>,
}

struct StoreHandler {
    settings: Arc<dyn SettingsStore>,
    messenger: Messenger,
}

impl StoreRobot {
    pub fn new(settings: Arc<dyn SettingsStore>, sink: Arc<dyn ReplySink>) -> Self {
        let messenger = Messenger::new(BotIdentity::new("Store", ":floppy_disk:"), sink);
        let mut router = CommandRouter::new("store", messenger.clone());
        router
            .register_default(StoreAction::List)
            .register("list", StoreAction::List)
            .register("set", StoreAction::Set)
            .register_many(&["rem", "del", "remove", "delete"], StoreAction::Remove);

        Self { handler: StoreHandler { settings, messenger }, router }
    }

    /// Team domain stamped on messages sent outside of a request.
    pub fn with_team_domain(mut self, team_domain: Option<String>) -> Self {
        self.handler.messenger = self.handler.messenger.with_team_domain(team_domain);
        self
    }
}

#[async_trait]
impl Robot for StoreRobot {
    fn name(&self) -> &str {
        "Store"
    }

    fn description(&self) -> &str {
        "Stores per-user settings used by other robots"
    }

    fn messenger(&self) -> &Messenger {
        &self.handler.messenger
    }

    async fn run(&self, payload: &Payload) {
        self.router.dispatch(&self.handler, payload, &payload.text).await;
    }
}

#[async_trait]
impl CommandHandler<StoreAction> for StoreHandler {
    async fn handle(
        &self,
        action: StoreAction,
        payload: &Payload,
        command: &Command,
    ) -> Result<(), RobotError> {
        let reply = match action {
            StoreAction::List => self.list(payload).await?,
            StoreAction::Set => self.set(payload, command).await?,
            StoreAction::Remove => self.remove(payload, command).await?,
        };
        self.messenger.send(payload, reply).await?;
        Ok(())
    }
}

impl StoreHandler {
    async fn list(&self, payload: &Payload) -> Result<String, RobotError> {
        let settings = self.settings.list(&payload.user_name).await?;
        if settings.is_empty() {
            return Ok(format!("No settings for @{}", payload.user_name));
        }
        let names = settings.iter().map(|setting| setting.name.as_str()).collect::<Vec<_>>();
        Ok(format!("You have the following settings configured:\n{}", names.join("\n")))
    }

    async fn set(&self, payload: &Payload, command: &Command) -> Result<String, RobotError> {
        let Some((name, value)) = parse_assignment(command.raw_args()) else {
            return Ok("Malformed setting. Use /store set PARAM=value.".to_owned());
        };
        self.settings.set(&payload.user_name, &name, &value).await?;
        Ok(format!("Successfully set {name}"))
    }

    async fn remove(&self, payload: &Payload, command: &Command) -> Result<String, RobotError> {
        let name = command.raw_args().trim();
        if name.is_empty() {
            return Ok("Use /store remove PARAM.".to_owned());
        }
        if self.settings.remove(&payload.user_name, name).await? {
            Ok(format!("Successfully removed {name}"))
        } else {
            Ok(format!("Setting {name} not found"))
        }
    }
}
