use std::collections::BTreeMap;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

/// A normalized inbound command, independent of how it arrived.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Payload {
    pub team_domain: String,
    pub channel_id: String,
    pub channel_name: String,
    pub user_id: String,
    pub user_name: String,
    pub robot: String,
    pub text: String,
    pub correlation_id: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IngressError {
    #[error("request carried no command")]
    MissingCommand,
    #[error("request carried no token")]
    MissingToken,
    #[error("token does not match the one configured for `{robot}`")]
    TokenMismatch { robot: String },
}

/// Form body of a slash-command request.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct SlashCommandForm {
    pub token: String,
    pub team_domain: String,
    pub channel_id: String,
    pub channel_name: String,
    pub user_id: String,
    pub user_name: String,
    pub command: String,
    pub text: String,
}

impl SlashCommandForm {
    /// Validates the request and maps `/poker` onto the `poker` robot.
    ///
    /// A token is only compared when one is configured for that robot.
    pub fn accept(self, tokens: &BTreeMap<String, SecretString>) -> Result<Payload, IngressError> {
        let robot = self.command.trim().trim_start_matches('/').to_owned();
        if robot.is_empty() {
            return Err(IngressError::MissingCommand);
        }
        if self.token.is_empty() {
            return Err(IngressError::MissingToken);
        }
        if let Some(expected) = tokens.get(&robot.to_lowercase()) {
            if expected.expose_secret() != self.token {
                return Err(IngressError::TokenMismatch { robot });
            }
        }

        Ok(Payload {
            team_domain: self.team_domain,
            channel_id: self.channel_id,
            channel_name: self.channel_name,
            user_id: self.user_id,
            user_name: self.user_name,
            robot,
            text: self.text.trim().to_owned(),
            correlation_id: new_correlation_id(),
        })
    }
}

/// Form body posted by an outgoing webhook (trigger-word integration).
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct OutgoingWebhookForm {
    pub token: String,
    pub team_domain: String,
    pub channel_id: String,
    pub channel_name: String,
    pub user_id: String,
    pub user_name: String,
    pub text: String,
    pub trigger_word: String,
}

impl OutgoingWebhookForm {
    /// `"bot poker status"` with trigger `bot` becomes robot `poker`, text `status`.
    pub fn into_payload(self) -> Payload {
        let text = self.text.trim();
        let text = text.strip_prefix(self.trigger_word.as_str()).unwrap_or(text).trim();
        let (robot, rest) = match text.split_once(' ') {
            Some((robot, rest)) => (robot, rest.trim()),
            None => (text, ""),
        };

        Payload {
            team_domain: self.team_domain,
            channel_id: self.channel_id,
            channel_name: self.channel_name,
            user_id: self.user_id,
            user_name: self.user_name,
            robot: robot.to_owned(),
            text: rest.to_owned(),
            correlation_id: new_correlation_id(),
        }
    }
}

fn new_correlation_id() -> String {
    format!("req-{}", Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use secrecy::SecretString;

    use super::{IngressError, OutgoingWebhookForm, SlashCommandForm};

    fn form(command: &str, token: &str) -> SlashCommandForm {
        SlashCommandForm {
            token: token.to_owned(),
            team_domain: "acme".to_owned(),
            channel_id: "C024BE91L".to_owned(),
            channel_name: "eng".to_owned(),
            user_id: "U1".to_owned(),
            user_name: "alice".to_owned(),
            command: command.to_owned(),
            text: " vote 3 ".to_owned(),
        }
    }

    fn tokens() -> BTreeMap<String, SecretString> {
        BTreeMap::from([("poker".to_owned(), SecretString::from("s3cret".to_owned()))])
    }

    #[test]
    fn slash_command_maps_to_robot_name() {
        let payload = form("/poker", "s3cret").accept(&tokens()).expect("accepted");
        assert_eq!(payload.robot, "poker");
        assert_eq!(payload.text, "vote 3");
        assert_eq!(payload.channel_name, "eng");
        assert!(payload.correlation_id.starts_with("req-"));
    }

    #[test]
    fn robots_without_configured_token_accept_any_token() {
        let payload = form("/store", "anything").accept(&tokens()).expect("accepted");
        assert_eq!(payload.robot, "store");
    }

    #[test]
    fn ingress_rejects_bad_requests() {
        assert_eq!(form("", "s3cret").accept(&tokens()), Err(IngressError::MissingCommand));
        assert_eq!(form("/poker", "").accept(&tokens()), Err(IngressError::MissingToken));
        assert_eq!(
            form("/poker", "wrong").accept(&tokens()),
            Err(IngressError::TokenMismatch { robot: "poker".to_owned() })
        );
    }

    #[test]
    fn webhook_strips_trigger_word() {
        let payload = OutgoingWebhookForm {
            text: "bot  poker story Login page".to_owned(),
            trigger_word: "bot".to_owned(),
            ..OutgoingWebhookForm::default()
        }
        .into_payload();

        assert_eq!(payload.robot, "poker");
        assert_eq!(payload.text, "story Login page");
    }

    #[test]
    fn webhook_with_only_robot_has_empty_text() {
        let payload = OutgoingWebhookForm {
            text: "bot store".to_owned(),
            trigger_word: "bot".to_owned(),
            ..OutgoingWebhookForm::default()
        }
        .into_payload();

        assert_eq!(payload.robot, "store");
        assert_eq!(payload.text, "");
    }
}
