mod common;

use std::time::Duration;

use httpmock::Method::POST;
use httpmock::MockServer;
use serde_json::json;
use tokio::sync::oneshot;

use common::{harness_with, RecordingGateway, CHAT};
use habit_tracker::daemon::{run_polling, AppState};
use habit_tracker::error::HabitTrackerError;
use habit_tracker::interfaces::gateway::{ChoiceButton, MessagingGateway, SendOptions};
use habit_tracker::telegram::TelegramGateway;

// Telegram method names are case-insensitive; match on everything past the
// first letter so either spelling hits.
fn method(name: &str) -> &str {
    &name[1..]
}

fn sent_message(message_id: i64) -> serde_json::Value {
    json!({
        "ok": true,
        "result": {
            "message_id": message_id,
            "date": 1717200000,
            "chat": { "id": CHAT, "type": "private", "first_name": "Ana" },
            "text": "x"
        }
    })
}

fn text_update(update_id: i64, text: &str) -> serde_json::Value {
    json!({
        "update_id": update_id,
        "message": {
            "message_id": update_id,
            "date": 1717200000,
            "chat": { "id": CHAT, "type": "private", "first_name": "Ana" },
            "from": { "id": CHAT, "is_bot": false, "first_name": "Ana" },
            "text": text
        }
    })
}

fn gateway(server: &MockServer) -> TelegramGateway {
    TelegramGateway::with_api_url(&server.base_url(), "token").unwrap()
}

#[test]
fn empty_token_is_a_config_error() {
    let err = TelegramGateway::with_api_url("http://localhost", " ").err().unwrap();
    assert!(matches!(err, HabitTrackerError::Config(_)));
}

#[test]
fn malformed_api_url_is_a_config_error() {
    let err = TelegramGateway::with_api_url("not a url", "token").err().unwrap();
    assert!(matches!(err, HabitTrackerError::Config(_)));
}

#[tokio::test]
async fn choice_prompt_sends_inline_keyboard() {
    let server = MockServer::start_async().await;
    let send_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path_contains(method("sendMessage"))
                .json_body_partial(
                    json!({
                        "chat_id": CHAT,
                        "text": "🎯 Exercise",
                        "reply_markup": {
                            "inline_keyboard": [[
                                { "text": "👍 I'll do it", "callback_data": "plan_yes_1" },
                                { "text": "⏭️ Not today", "callback_data": "plan_no_1" }
                            ]]
                        }
                    })
                    .to_string(),
                );
            then.status(200).json_body(sent_message(31));
        })
        .await;

    let sent = gateway(&server)
        .send_choice_prompt(
            CHAT,
            "🎯 Exercise",
            [
                ChoiceButton::new("👍 I'll do it", "plan_yes_1"),
                ChoiceButton::new("⏭️ Not today", "plan_no_1"),
            ],
        )
        .await
        .unwrap();

    assert_eq!(sent.message_id, 31);
    assert_eq!(sent.chat_id, CHAT);
    send_mock.assert_hits(1);
}

#[tokio::test]
async fn markdown_text_carries_parse_mode() {
    let server = MockServer::start_async().await;
    let send_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path_contains(method("sendMessage"))
                .json_body_partial(json!({ "parse_mode": "Markdown" }).to_string());
            then.status(200).json_body(sent_message(4));
        })
        .await;

    gateway(&server)
        .send_text(CHAT, "*bold*", SendOptions::markdown())
        .await
        .unwrap();

    send_mock.assert_hits(1);
}

#[tokio::test]
async fn rejected_call_names_the_method_but_not_the_token() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path_contains(method("answerCallbackQuery"));
            then.status(400).json_body(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: message to answer is gone"
            }));
        })
        .await;

    let err = gateway(&server)
        .acknowledge_interaction("cb-1", "done")
        .await
        .unwrap_err();

    match err {
        HabitTrackerError::Http(message) => {
            assert!(message.starts_with("answerCallbackQuery"));
            assert!(message.contains("message to answer is gone"));
            assert!(!message.contains("bottoken"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn edit_and_acknowledge_hit_their_methods() {
    let server = MockServer::start_async().await;
    let ack_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path_contains(method("answerCallbackQuery"))
                .json_body_partial(json!({ "callback_query_id": "cb-2" }).to_string());
            then.status(200).json_body(json!({ "ok": true, "result": true }));
        })
        .await;
    let edit_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path_contains(method("editMessageText"))
                .json_body_partial(
                    json!({ "chat_id": CHAT, "message_id": 8, "text": "✅ Completed: 'Read'" })
                        .to_string(),
                );
            then.status(200).json_body(sent_message(8));
        })
        .await;

    let telegram = gateway(&server);
    telegram
        .acknowledge_interaction("cb-2", "✅ Completed: 'Read'")
        .await
        .unwrap();
    telegram
        .edit_message(CHAT, 8, "✅ Completed: 'Read'")
        .await
        .unwrap();

    ack_mock.assert_hits(1);
    edit_mock.assert_hits(1);
}

#[tokio::test]
async fn webhook_info_is_decoded() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path_contains(method("getWebhookInfo"));
            then.status(200).json_body(json!({
                "ok": true,
                "result": {
                    "url": "https://example.org/hook",
                    "has_custom_certificate": false,
                    "pending_update_count": 3,
                    "last_error_message": "Connection refused"
                }
            }));
        })
        .await;

    let info = gateway(&server).webhook_info().await.unwrap();

    assert_eq!(
        info.url.as_ref().map(|url| url.as_str()),
        Some("https://example.org/hook")
    );
    assert_eq!(info.pending_update_count, 3);
    assert_eq!(info.last_error_message.as_deref(), Some("Connection refused"));
    assert_eq!(info.max_connections, None);
}

#[tokio::test]
async fn username_comes_from_get_me() {
    let server = MockServer::start_async().await;
    let me_mock = server
        .mock_async(|when, then| {
            when.method(POST).path_contains(method("getMe"));
            then.status(200).json_body(get_me());
        })
        .await;

    assert_eq!(gateway(&server).username().await.unwrap(), "habit_bot");
    me_mock.assert_hits(1);
}

fn get_me() -> serde_json::Value {
    json!({
        "ok": true,
        "result": {
            "id": 1,
            "is_bot": true,
            "first_name": "Habits",
            "username": "habit_bot",
            "can_join_groups": false,
            "can_read_all_group_messages": false,
            "supports_inline_queries": false,
            "can_connect_to_business": false,
            "has_main_web_app": false
        }
    })
}

#[tokio::test]
async fn polling_finishes_the_update_in_hand_before_stopping() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path_contains(method("getMe"));
            then.status(200).json_body(get_me());
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path_contains(method("deleteWebhook"));
            then.status(200).json_body(json!({ "ok": true, "result": true }));
        })
        .await;
    // Once update 100 is confirmed only empty batches come back.
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path_contains(method("getUpdates"))
                .json_body_partial(json!({ "offset": 101 }).to_string());
            then.status(200).json_body(json!({ "ok": true, "result": [] }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path_contains(method("getUpdates"));
            then.status(200).json_body(json!({
                "ok": true,
                "result": [text_update(100, "/addhabit Read")]
            }));
        })
        .await;

    let h = harness_with(
        None,
        RecordingGateway::with_send_delay(Duration::from_millis(300)),
    );
    let state = AppState {
        bot: h.bot.clone(),
        bot_username: "habit_bot".to_string(),
    };
    let telegram = gateway(&server);
    let (stop, stopped) = oneshot::channel::<()>();
    let polling = tokio::spawn(async move {
        run_polling(&telegram, state, async move {
            let _ = stopped.await;
        })
        .await
    });

    tokio::time::timeout(Duration::from_secs(5), async {
        while h.store.list_habits().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    // The habit is saved but its confirmation is still being sent.
    assert!(h.gateway.texts().await.is_empty());

    stop.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), polling)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    let texts = h.gateway.texts().await;
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("Name: Read"));
    assert_eq!(h.store.list_habits().len(), 1);
    assert_eq!(h.bot.identity().chat_id(), Some(CHAT));
}
