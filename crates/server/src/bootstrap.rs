use std::sync::Arc;

use relaybot_core::config::{AppConfig, ConfigError, LoadOptions};
use relaybot_core::poker::PokerTable;
use relaybot_db::{
    connect_with_config, migrations, DbPool, SqlPokerRepository, SqlSettingsRepository,
    SqlVacationRepository,
};
use relaybot_slack::reply::{ReplySink, WebhookReplySink};
use relaybot_slack::robots::{PokerRobot, RobotRegistry, StoreRobot, VacationRobot};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub registry: Arc<RobotRegistry>,
    pub poker: PokerTable,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let sink: Arc<dyn ReplySink> =
        Arc::new(WebhookReplySink::new(config.slack.webhook_url.clone()));
    let registry = Arc::new(build_registry(&db_pool, sink, config.slack.team_domain.clone()));
    info!(
        event_name = "system.bootstrap.robots_registered",
        correlation_id = "bootstrap",
        robots = %registry.keys().join(","),
        "robot registry built"
    );

    let poker = PokerTable::new(Arc::new(SqlPokerRepository::new(db_pool.clone())));
    Ok(Application { config, db_pool, registry, poker })
}

/// Registers every robot against SQL-backed stores and one shared reply sink.
pub fn build_registry(
    db_pool: &DbPool,
    sink: Arc<dyn ReplySink>,
    team_domain: Option<String>,
) -> RobotRegistry {
    let poker = PokerRobot::new(Arc::new(SqlPokerRepository::new(db_pool.clone())), sink.clone())
        .with_team_domain(team_domain.clone());
    let store = StoreRobot::new(Arc::new(SqlSettingsRepository::new(db_pool.clone())), sink.clone())
        .with_team_domain(team_domain.clone());
    let vacation = VacationRobot::new(Arc::new(SqlVacationRepository::new(db_pool.clone())), sink)
        .with_team_domain(team_domain);

    RobotRegistry::builder()
        .register(&["poker"], Arc::new(poker))
        .register(&["store"], Arc::new(store))
        .register(&["vacation"], Arc::new(vacation))
        .build()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use relaybot_core::config::{ConfigOverrides, LoadOptions};
    use relaybot_db::{connect, migrations};
    use relaybot_slack::reply::RecordingReplySink;

    use crate::bootstrap::{bootstrap, build_registry};

    fn overrides(database_url: &str, webhook_url: Option<&str>) -> LoadOptions {
        LoadOptions {
            config_path: Some("does-not-exist/relaybot.toml".into()),
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                slack_webhook_url: webhook_url.map(str::to_string),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_with_invalid_webhook_url() {
        let result = bootstrap(overrides("sqlite::memory:", Some("ftp://hooks.example.test"))).await;

        let message = result.err().expect("error").to_string();
        assert!(message.contains("slack.webhook_url"), "unexpected error: {message}");
    }

    #[tokio::test]
    async fn bootstrap_registers_robots_and_applies_migrations() {
        let app = bootstrap(overrides(
            "sqlite::memory:",
            Some("https://hooks.example.test/services/T000/B000/XXXX"),
        ))
        .await
        .expect("bootstrap should succeed with valid overrides");

        assert_eq!(app.registry.keys(), vec!["poker", "store", "vacation"]);

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('poker_sessions', 'poker_stories', 'poker_votes', 'settings', 'vacations')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("schema query");
        assert_eq!(table_count, 5);

        assert!(app.poker.current_session("eng").await.expect("lookup").is_none());
        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn configured_team_domain_reaches_out_of_band_messages() {
        let pool = connect("sqlite::memory:").await.expect("pool");
        migrations::run_pending(&pool).await.expect("migrations");
        let sink = RecordingReplySink::default();
        let registry = build_registry(&pool, Arc::new(sink.clone()), Some("acme".to_string()));

        for key in registry.keys() {
            let robot = registry.get(&key).expect("registered robot");
            robot.messenger().send_to_channel("C024BE91L", "standup in 5").await.expect("send");
        }

        let messages = sink.messages();
        assert_eq!(messages.len(), 3);
        assert!(messages.iter().all(|message| message.team_domain == "acme"));
        assert!(messages.iter().all(|message| message.channel == "C024BE91L"));
        pool.close().await;
    }
}
