//! Chat integration for relaybot
//!
//! This crate turns inbound chat requests into robot runs and robot output into
//! incoming-webhook posts:
//! - **Ingress** (`events`) - slash-command and outgoing-webhook forms, normalized to a `Payload`
//! - **Commands** (`commands`) - the `<verb> [args] [key:value]` parser and per-robot router
//! - **Replies** (`reply`, `messages`) - `ReplySink` implementations and the per-robot `Messenger`
//! - **Robots** (`robots`) - `poker`, `store`, `vacation` and the registry that spawns them
//!
//! # Architecture
//!
//! ```text
//! HTTP form → Payload → RobotRegistry::spawn → Robot::run → CommandRouter → handler
//!                                                                      ↓
//!                                              ReplySink ← Messenger ← reply
//! ```

pub mod commands;
pub mod errors;
pub mod events;
pub mod messages;
pub mod reply;
pub mod robots;

pub use commands::{Command, CommandHandler, CommandRouter, DispatchOutcome};
pub use errors::RobotError;
pub use events::{IngressError, OutgoingWebhookForm, Payload, SlashCommandForm};
pub use messages::{Attachment, BotIdentity, OutgoingMessage};
pub use reply::{Messenger, RecordingReplySink, ReplyError, ReplySink, WebhookReplySink};
pub use robots::{Dispatch, PokerRobot, Robot, RobotRegistry, StoreRobot, VacationRobot};
