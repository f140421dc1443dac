use std::fmt::Display;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use crate::events::Payload;
use crate::messages::{Attachment, BotIdentity, OutgoingMessage};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReplyError {
    #[error("webhook transport failed: {0}")]
    Transport(String),
    #[error("webhook rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Delivers one message to the chat platform.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn deliver(&self, message: OutgoingMessage) -> Result<(), ReplyError>;
}

pub struct WebhookReplySink {
    client: reqwest::Client,
    webhook_url: SecretString,
}

impl WebhookReplySink {
    pub fn new(webhook_url: SecretString) -> Self {
        Self::with_client(reqwest::Client::new(), webhook_url)
    }

    pub fn with_client(client: reqwest::Client, webhook_url: SecretString) -> Self {
        Self { client, webhook_url }
    }
}

#[async_trait]
impl ReplySink for WebhookReplySink {
    async fn deliver(&self, message: OutgoingMessage) -> Result<(), ReplyError> {
        let response = self
            .client
            .post(self.webhook_url.expose_secret())
            .json(&message)
            .send()
            .await
            .map_err(|error| ReplyError::Transport(error.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(ReplyError::Rejected { status: status.as_u16(), body })
    }
}

#[derive(Default)]
struct RecordingState {
    messages: Vec<OutgoingMessage>,
    failure: Option<ReplyError>,
}

/// Keeps every delivered message in memory.
#[derive(Clone, Default)]
pub struct RecordingReplySink {
    state: Arc<Mutex<RecordingState>>,
}

impl RecordingReplySink {
    pub fn messages(&self) -> Vec<OutgoingMessage> {
        match self.state.lock() {
            Ok(state) => state.messages.clone(),
            Err(poisoned) => poisoned.into_inner().messages.clone(),
        }
    }

    pub fn texts(&self) -> Vec<String> {
        self.messages().into_iter().map(|message| message.text).collect()
    }

    /// Rejects every later delivery with `error`.
    pub fn fail_with(&self, error: ReplyError) {
        match self.state.lock() {
            Ok(mut state) => state.failure = Some(error),
            Err(poisoned) => poisoned.into_inner().failure = Some(error),
        }
    }
}

#[async_trait]
impl ReplySink for RecordingReplySink {
    async fn deliver(&self, message: OutgoingMessage) -> Result<(), ReplyError> {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(error) = &state.failure {
            return Err(error.clone());
        }
        state.messages.push(message);
        Ok(())
    }
}

/// One robot's voice: its identity bound to a shared sink.
#[derive(Clone)]
pub struct Messenger {
    identity: BotIdentity,
    sink: Arc<dyn ReplySink>,
    team_domain: Option<String>,
}

impl Messenger {
    pub fn new(identity: BotIdentity, sink: Arc<dyn ReplySink>) -> Self {
        Self { identity, sink, team_domain: None }
    }

    /// Domain used by [`Messenger::send_to_channel`].
    pub fn with_team_domain(mut self, team_domain: Option<String>) -> Self {
        self.team_domain = team_domain;
        self
    }

    pub fn identity(&self) -> &BotIdentity {
        &self.identity
    }

    pub async fn send(&self, payload: &Payload, text: impl Into<String>) -> Result<(), ReplyError> {
        self.send_with_attachments(payload, text, Vec::new()).await
    }

    pub async fn send_with_attachments(
        &self,
        payload: &Payload,
        text: impl Into<String>,
        attachments: Vec<Attachment>,
    ) -> Result<(), ReplyError> {
        let message =
            OutgoingMessage::new(&self.identity, &payload.team_domain, &payload.channel_id, text)
                .with_attachments(attachments);
        self.sink.deliver(message).await
    }

    /// Prefixes the text with a mention of the requesting user.
    pub async fn direct_send(
        &self,
        payload: &Payload,
        text: impl Display,
    ) -> Result<(), ReplyError> {
        self.send(payload, format!("@{}: {text}", payload.user_name)).await
    }

    pub async fn send_error(
        &self,
        payload: &Payload,
        error: &(dyn Display + Sync),
    ) -> Result<(), ReplyError> {
        self.send(payload, format!("Error running {} command: {error}", self.identity.name)).await
    }

    /// Posts outside of any request, e.g. from a scheduled job.
    pub async fn send_to_channel(
        &self,
        channel_id: &str,
        text: impl Into<String>,
    ) -> Result<(), ReplyError> {
        let team_domain = self.team_domain.clone().unwrap_or_default();
        let message = OutgoingMessage::new(&self.identity, team_domain, channel_id, text);
        self.sink.deliver(message).await
    }
}
