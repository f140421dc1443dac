use serde::Serialize;

pub const DEFAULT_ATTACHMENT_COLOR: &str = "#7CD197";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BotIcon {
    Emoji(String),
    Url(String),
}

/// Display name and avatar a robot posts under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BotIdentity {
    pub name: String,
    pub icon: BotIcon,
}

impl BotIdentity {
    /// `icon` is treated as an image URL when it starts with `http://` or `https://`.
    pub fn new(name: impl Into<String>, icon: impl Into<String>) -> Self {
        let icon = icon.into();
        let icon = if icon.starts_with("http://") || icon.starts_with("https://") {
            BotIcon::Url(icon)
        } else {
            BotIcon::Emoji(icon)
        };
        Self { name: name.into(), icon }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub color: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_link: Option<String>,
    pub fallback: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Attachment {
    pub fn new(fallback: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            color: DEFAULT_ATTACHMENT_COLOR.to_owned(),
            title: title.into(),
            title_link: None,
            fallback: fallback.into(),
            text: None,
        }
    }

    pub fn title_link(mut self, url: impl Into<String>) -> Self {
        self.title_link = Some(url.into());
        self
    }

    /// Blank text leaves the body out.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.text = if text.is_empty() { None } else { Some(text) };
        self
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }
}

/// Incoming-webhook request body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OutgoingMessage {
    #[serde(skip)]
    pub team_domain: String,
    pub channel: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_emoji: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    pub parse: &'static str,
    pub unfurl_links: bool,
}

impl OutgoingMessage {
    pub fn new(
        identity: &BotIdentity,
        team_domain: impl Into<String>,
        channel: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        let (icon_emoji, icon_url) = match &identity.icon {
            BotIcon::Emoji(emoji) => (Some(emoji.clone()), None),
            BotIcon::Url(url) => (None, Some(url.clone())),
        };
        Self {
            team_domain: team_domain.into(),
            channel: channel.into(),
            username: identity.name.clone(),
            icon_emoji,
            icon_url,
            text: text.into(),
            attachments: Vec::new(),
            parse: "full",
            unfurl_links: true,
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Attachment, BotIcon, BotIdentity, OutgoingMessage};

    #[test]
    fn identity_detects_icon_urls() {
        assert_eq!(BotIdentity::new("Poker", ":game_die:").icon, BotIcon::Emoji(":game_die:".into()));
        assert_eq!(
            BotIdentity::new("Poker", "https://cdn.example.test/die.png").icon,
            BotIcon::Url("https://cdn.example.test/die.png".into())
        );
    }

    #[test]
    fn outgoing_message_serializes_webhook_body() {
        let identity = BotIdentity::new("Store", ":floppy_disk:");
        let message = OutgoingMessage::new(&identity, "acme", "C024BE91L", "Successfully set TOKEN")
            .with_attachments(vec![Attachment::new("fallback", "Story 12")
                .title_link("https://tracker.example.test/12")
                .text("")]);

        let body = serde_json::to_value(&message).expect("serialize");
        assert_eq!(
            body,
            json!({
                "channel": "C024BE91L",
                "username": "Store",
                "icon_emoji": ":floppy_disk:",
                "text": "Successfully set TOKEN",
                "attachments": [{
                    "color": "#7CD197",
                    "title": "Story 12",
                    "title_link": "https://tracker.example.test/12",
                    "fallback": "fallback"
                }],
                "parse": "full",
                "unfurl_links": true
            })
        );
    }
}
