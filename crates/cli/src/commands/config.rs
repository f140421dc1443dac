use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use relaybot_core::config::{AppConfig, LoadOptions, COMMAND_TOKEN_ENV_PREFIX};
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::CommandResult;

/// One printed setting: dotted key, rendered value, env keys that can set it.
struct Field {
    key: String,
    value: String,
    env_keys: Vec<String>,
}

impl Field {
    fn new(key: &str, value: impl Into<String>, env_keys: &[&str]) -> Self {
        Self {
            key: key.to_string(),
            value: value.into(),
            env_keys: env_keys.iter().map(|key| key.to_string()).collect(),
        }
    }
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            );
        }
    };

    let file_path = detect_config_path();
    let file_doc = file_path.as_deref().and_then(load_config_file_doc);

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(&field, file_doc.as_ref(), file_path.as_deref());
        lines.push(format!("- {} = {} (source: {source})", field.key, field.value));
    }

    CommandResult::text(0, lines.join("\n"))
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let mut fields = vec![
        Field::new("database.url", &config.database.url, &["RELAYBOT_DATABASE_URL"]),
        Field::new(
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["RELAYBOT_DATABASE_MAX_CONNECTIONS"],
        ),
        Field::new(
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["RELAYBOT_DATABASE_TIMEOUT_SECS"],
        ),
        Field::new(
            "slack.webhook_url",
            redact_url(config.slack.webhook_url.expose_secret()),
            &["RELAYBOT_SLACK_WEBHOOK_URL"],
        ),
        Field::new(
            "slack.team_domain",
            config.slack.team_domain.as_deref().unwrap_or("<unset>"),
            &["RELAYBOT_SLACK_TEAM_DOMAIN"],
        ),
    ];

    for robot in config.slack.command_tokens.keys() {
        let env_key = format!("{COMMAND_TOKEN_ENV_PREFIX}{}", robot.to_ascii_uppercase());
        fields.push(Field::new(
            &format!("slack.command_tokens.{robot}"),
            "<redacted>",
            &[env_key.as_str()],
        ));
    }

    fields.extend([
        Field::new(
            "server.bind_address",
            &config.server.bind_address,
            &["RELAYBOT_SERVER_BIND_ADDRESS"],
        ),
        Field::new("server.port", config.server.port.to_string(), &["RELAYBOT_SERVER_PORT"]),
        Field::new(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["RELAYBOT_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        Field::new(
            "logging.level",
            &config.logging.level,
            &["RELAYBOT_LOGGING_LEVEL", "RELAYBOT_LOG_LEVEL"],
        ),
        Field::new(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["RELAYBOT_LOGGING_FORMAT", "RELAYBOT_LOG_FORMAT"],
        ),
    ]);

    fields
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("relaybot.toml"), PathBuf::from("config/relaybot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: &Path) -> Option<Value> {
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(field: &Field, file_doc: Option<&Value>, file_path: Option<&Path>) -> String {
    if let Some(env_key) = field.env_keys.iter().find(|key| env::var_os(key.as_str()).is_some()) {
        return format!("env ({env_key})");
    }

    if file_doc.is_some_and(|doc| contains_path(doc, &field.key)) {
        let file_path = file_path
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "config file".to_string());
        return format!("file ({file_path})");
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

/// Keeps scheme and host; webhook paths carry the credential.
fn redact_url(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    match trimmed.split_once("://") {
        Some((scheme, rest)) => {
            let host = rest.split('/').next().unwrap_or_default();
            format!("{scheme}://{host}/***")
        }
        None => "<redacted>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, redact_url};

    #[test]
    fn webhook_path_is_hidden() {
        assert_eq!(
            redact_url("https://hooks.slack.com/services/T000/B000/XXXX"),
            "https://hooks.slack.com/***"
        );
        assert_eq!(redact_url("  "), "<empty>");
        assert_eq!(redact_url("not-a-url"), "<redacted>");
    }

    #[test]
    fn nested_keys_are_found_in_file() {
        let doc: Value = "[slack.command_tokens]\npoker = \"abc\"\n".parse().expect("toml");
        assert!(contains_path(&doc, "slack.command_tokens.poker"));
        assert!(!contains_path(&doc, "slack.webhook_url"));
    }
}
