//! Chat robots and the registry that addresses them by key.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::events::Payload;
use crate::reply::Messenger;

pub mod poker;
pub mod store;
pub mod vacation;

pub use poker::PokerRobot;
pub use store::StoreRobot;
pub use vacation::VacationRobot;

#[async_trait]
pub trait Robot: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn messenger(&self) -> &Messenger;
    /// Handles one payload and sends its own replies.
    async fn run(&self, payload: &Payload);
}

#[derive(Debug)]
pub enum Dispatch {
    Spawned { task: JoinHandle<()> },
    UnknownRobot,
}

/// Immutable key to robot map, built once at startup.
#[derive(Clone, Default)]
pub struct RobotRegistry {
    robots: HashMap<String, Arc<dyn Robot>>,
}

impl RobotRegistry {
    pub fn builder() -> RobotRegistryBuilder {
        RobotRegistryBuilder::default()
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn Robot>> {
        self.robots.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.robots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.robots.is_empty()
    }

    pub fn keys(&self) -> Vec<&str> {
        let mut keys = self.robots.keys().map(String::as_str).collect::<Vec<_>>();
        keys.sort_unstable();
        keys
    }

    /// Runs the robot registered under `payload.robot` on its own task.
    ///
    /// A panicking robot still produces an error reply.
    pub fn spawn(&self, payload: Payload) -> Dispatch {
        let Some(robot) = self.get(&payload.robot) else {
            return Dispatch::UnknownRobot;
        };

        info!(
            event_name = "ingress.slack.command_received",
            correlation_id = %payload.correlation_id,
            robot = %payload.robot,
            channel = %payload.channel_name,
            "spawning robot task"
        );

        let task = tokio::spawn(async move {
            let inner = {
                let robot = Arc::clone(&robot);
                let payload = payload.clone();
                tokio::spawn(async move { robot.run(&payload).await })
            };

            if let Err(join_error) = inner.await {
                error!(
                    event_name = "robot.task.panicked",
                    correlation_id = %payload.correlation_id,
                    robot = %payload.robot,
                    channel = %payload.channel_name,
                    error = %join_error,
                    "robot task did not complete"
                );
                let reason = "the robot crashed while handling this command";
                if let Err(reply_error) = robot.messenger().send_error(&payload, &reason).await {
                    warn!(
                        event_name = "robot.reply.failed",
                        correlation_id = %payload.correlation_id,
                        robot = %payload.robot,
                        channel = %payload.channel_name,
                        error = %reply_error,
                        "failed to deliver robot reply"
                    );
                }
            }
        });

        Dispatch::Spawned { task }
    }
}

#[derive(Default)]
pub struct RobotRegistryBuilder {
    robots: HashMap<String, Arc<dyn Robot>>,
}

impl RobotRegistryBuilder {
    /// Later registrations replace earlier ones for the same key.
    pub fn register(mut self, keys: &[&str], robot: Arc<dyn Robot>) -> Self {
        for key in keys {
            self.robots.insert((*key).to_owned(), Arc::clone(&robot));
        }
        self
    }

    pub fn build(self) -> RobotRegistry {
        RobotRegistry { robots: self.robots }
    }
}
