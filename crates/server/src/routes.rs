use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Form, Json, Router,
};
use relaybot_core::poker::{PokerTable, SessionSnapshot};
use relaybot_slack::events::{OutgoingWebhookForm, SlashCommandForm};
use relaybot_slack::robots::{Dispatch, RobotRegistry};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const UNKNOWN_COMMAND_REPLY: &str = "No robot for that command yet :(";

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<RobotRegistry>,
    pub command_tokens: Arc<BTreeMap<String, SecretString>>,
    pub poker: PokerTable,
}

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub channel: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HookReply {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/slack", post(slash_command))
        .route("/slack_hook", post(outgoing_webhook))
        .route("/poker/session", get(poker_session))
        .with_state(state)
}

/// Acknowledges immediately; the robot replies through the webhook later.
pub async fn slash_command(
    State(state): State<AppState>,
    Form(form): Form<SlashCommandForm>,
) -> (StatusCode, String) {
    let payload = match form.accept(&state.command_tokens) {
        Ok(payload) => payload,
        Err(error) => {
            warn!(
                event_name = "ingress.slack.command_rejected",
                correlation_id = "unassigned",
                error = %error,
                "rejected slash command request"
            );
            return (StatusCode::BAD_REQUEST, error.to_string());
        }
    };

    let correlation_id = payload.correlation_id.clone();
    let robot = payload.robot.clone();
    match state.registry.spawn(payload) {
        Dispatch::Spawned { .. } => (StatusCode::OK, String::new()),
        Dispatch::UnknownRobot => {
            info!(
                event_name = "ingress.slack.unknown_robot",
                correlation_id = %correlation_id,
                robot = %robot,
                "no robot registered for slash command"
            );
            (StatusCode::OK, UNKNOWN_COMMAND_REPLY.to_string())
        }
    }
}

pub async fn outgoing_webhook(
    State(state): State<AppState>,
    Form(form): Form<OutgoingWebhookForm>,
) -> Json<HookReply> {
    let payload = form.into_payload();
    let unknown = format!("No robot for {} ({})", payload.robot, payload.text);

    match state.registry.spawn(payload) {
        Dispatch::Spawned { .. } => Json(HookReply { text: String::new() }),
        Dispatch::UnknownRobot => Json(HookReply { text: unknown }),
    }
}

pub async fn poker_session(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<SessionSnapshot>, (StatusCode, Json<ErrorBody>)> {
    match state.poker.snapshot(&query.channel).await {
        Ok(Some(snapshot)) => Ok(Json(snapshot)),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorBody { error: format!("no current session for channel {}", query.channel) }),
        )),
        Err(error) => {
            warn!(
                event_name = "http.poker.session_failed",
                correlation_id = "unassigned",
                channel = %query.channel,
                error = %error,
                "failed to load poker session"
            );
            Err((StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody { error: error.to_string() })))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use relaybot_core::poker::{InMemoryPokerStore, PokerTable};
    use relaybot_core::settings::InMemorySettingsStore;
    use relaybot_slack::reply::RecordingReplySink;
    use relaybot_slack::robots::{PokerRobot, RobotRegistry, StoreRobot};
    use secrecy::SecretString;
    use tower::ServiceExt;

    use super::{router, AppState, ErrorBody, HookReply};

    struct Harness {
        state: AppState,
        sink: RecordingReplySink,
    }

    fn harness() -> Harness {
        let store = Arc::new(InMemoryPokerStore::default());
        let sink = RecordingReplySink::default();
        let registry = RobotRegistry::builder()
            .register(&["poker"], Arc::new(PokerRobot::new(store.clone(), Arc::new(sink.clone()))))
            .register(
                &["store"],
                Arc::new(StoreRobot::new(
                    Arc::new(InMemorySettingsStore::default()),
                    Arc::new(sink.clone()),
                )),
            )
            .build();
        let command_tokens =
            BTreeMap::from([("poker".to_string(), SecretString::from("poker-token".to_string()))]);

        Harness {
            state: AppState {
                registry: Arc::new(registry),
                command_tokens: Arc::new(command_tokens),
                poker: PokerTable::new(store),
            },
            sink,
        }
    }

    fn form_request(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        String::from_utf8(bytes.to_vec()).expect("utf8")
    }

    async fn wait_for_replies(sink: &RecordingReplySink, count: usize) -> Vec<String> {
        for _ in 0..100 {
            let texts = sink.texts();
            if texts.len() >= count {
                return texts;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        sink.texts()
    }

    #[tokio::test]
    async fn slash_command_acks_and_robot_replies_out_of_band() {
        let harness = harness();
        let response = router(harness.state.clone())
            .oneshot(form_request(
                "/slack",
                "token=poker-token&team_domain=acme&channel_id=C1&channel_name=eng\
                 &user_id=U1&user_name=alice&command=%2Fpoker&text=session+Sprint+9",
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "");
        assert_eq!(
            wait_for_replies(&harness.sink, 1).await,
            vec!["Started poker session for *Sprint 9*"]
        );
    }

    #[tokio::test]
    async fn slash_command_rejects_bad_tokens_and_missing_fields() {
        let harness = harness();

        let mismatch = router(harness.state.clone())
            .oneshot(form_request("/slack", "token=wrong&command=%2Fpoker&text=status"))
            .await
            .expect("response");
        assert_eq!(mismatch.status(), StatusCode::BAD_REQUEST);

        let missing = router(harness.state.clone())
            .oneshot(form_request("/slack", "command=%2Fpoker&text=status"))
            .await
            .expect("response");
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(missing).await, "request carried no token");
    }

    #[tokio::test]
    async fn slash_command_for_unknown_robot_says_so() {
        let harness = harness();
        let response = router(harness.state)
            .oneshot(form_request("/slack", "token=t&command=%2Fdeploy&text=now"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "No robot for that command yet :(");
    }

    #[tokio::test]
    async fn outgoing_webhook_routes_by_first_word() {
        let harness = harness();

        let unknown = router(harness.state.clone())
            .oneshot(form_request("/slack_hook", "trigger_word=bot&text=bot+deploy+now"))
            .await
            .expect("response");
        let reply: HookReply = serde_json::from_str(&body_text(unknown).await).expect("json");
        assert_eq!(reply.text, "No robot for deploy (now)");

        let known = router(harness.state.clone())
            .oneshot(form_request(
                "/slack_hook",
                "trigger_word=bot&user_name=alice&channel_name=eng&text=bot+store+set+BOARD%3Deng",
            ))
            .await
            .expect("response");
        let reply: HookReply = serde_json::from_str(&body_text(known).await).expect("json");
        assert_eq!(reply.text, "");
        assert_eq!(wait_for_replies(&harness.sink, 1).await, vec!["Successfully set BOARD"]);
    }

    #[tokio::test]
    async fn poker_session_view_reads_current_session() {
        let harness = harness();

        let missing = router(harness.state.clone())
            .oneshot(
                Request::builder()
                    .uri("/poker/session?channel=eng")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        let error: ErrorBody = serde_json::from_str(&body_text(missing).await).expect("json");
        assert_eq!(error.error, "no current session for channel eng");

        let session = harness.state.poker.start_session("eng", "Sprint 9", "alice,bob").await.expect("start");
        harness.state.poker.start_story(&session, "Login page").await.expect("story");

        let found = router(harness.state.clone())
            .oneshot(
                Request::builder()
                    .uri("/poker/session?channel=eng")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(found.status(), StatusCode::OK);
        let snapshot: serde_json::Value =
            serde_json::from_str(&body_text(found).await).expect("json");
        assert_eq!(snapshot["session"]["title"], "Sprint 9");
        assert_eq!(snapshot["session"]["roster"], serde_json::json!(["alice", "bob"]));
        assert_eq!(snapshot["stories"][0]["title"], "Login page");
        assert!(snapshot["stories"][0]["estimation"].is_null());
    }
}
